use std::path::{Path, PathBuf};

use chrono::Utc;
use clap::{ArgAction, Parser, Subcommand};
use domexp_core::cache::DEFAULT_CACHE_FILE;
use domexp_core::config::DEFAULT_SETTINGS_FILE;
use domexp_core::{
    filter_domains, CacheStore, CertificateChecker, DomexpError, ExpirationChecker,
    ExpirationResolver, FileZoneSource, Route53ZoneSource, Settings, StaticZones, TlsProbe,
    ZoneMethod, ZoneSource,
};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

/// Exit status when the settings template had to be created.
const EXIT_SETTINGS_CREATED: i32 = 2;
/// Exit status for any other setup failure (monitoring UNKNOWN).
const EXIT_SETUP_FAILED: i32 = 3;

#[derive(Parser)]
#[command(name = "domexp")]
#[command(about = "Domain registration and TLS certificate expiration checker")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Settings file (default: settings.toml next to the executable)
    #[arg(short, long, global = true)]
    settings: Option<PathBuf>,

    /// Cache file (default: .expcache next to the executable)
    #[arg(short, long, global = true)]
    cache: Option<PathBuf>,

    /// Check these domains instead of the configured zone source
    #[arg(short = 'd', long = "domain", global = true)]
    domains: Vec<String>,

    /// More logging on stderr (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand, Clone, Copy)]
enum Commands {
    /// Days until domain registrations expire (default)
    Domains,
    /// Days until TLS certificates expire
    Certs,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let code = match run(cli).await {
        Ok(code) => code,
        Err(e @ DomexpError::SettingsCreated { .. }) => {
            println!("{}", e);
            EXIT_SETTINGS_CREATED
        }
        Err(e) => {
            println!("UNKNOWN: {}", e);
            EXIT_SETUP_FAILED
        }
    };

    std::process::exit(code);
}

/// Logs go to stderr; stdout carries only the status line.
fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> domexp_core::Result<i32> {
    let base = exe_dir();
    let settings_path = cli
        .settings
        .unwrap_or_else(|| base.join(DEFAULT_SETTINGS_FILE));
    let settings = Settings::load(&settings_path)?;
    let thresholds = settings.thresholds()?;

    let listed = if cli.domains.is_empty() {
        let settings_dir = settings_path.parent().unwrap_or(Path::new("."));
        zone_source(&settings, settings_dir)?.list_domains().await?
    } else {
        StaticZones(cli.domains).list_domains().await?
    };
    let selection = filter_domains(listed, &settings.reserved_suffixes());
    debug!(
        count = selection.domains.len(),
        invalid = selection.invalid.len(),
        "Domains to check"
    );

    let store = CacheStore::new(cli.cache.unwrap_or_else(|| base.join(DEFAULT_CACHE_FILE)));
    let cache = store.load();
    let now = Utc::now();

    let (message, code, cache) = match cli.command.unwrap_or(Commands::Domains) {
        Commands::Domains => {
            let resolver = ExpirationResolver::with_timeout(settings.lookup_timeout());
            let checker = ExpirationChecker::new(resolver, thresholds).with_store(store.clone());
            let (mut report, cache) = checker.run(&selection.domains, cache, now).await;
            report.add_unknown(&selection.invalid, thresholds);
            (report.message.clone(), report.exit_code(), cache)
        }
        Commands::Certs => {
            let probe = TlsProbe::new().with_timeout(settings.lookup_timeout());
            let checker = CertificateChecker::new(probe, thresholds).with_store(store.clone());
            let (mut report, cache) = checker.run(&selection.domains, cache, now).await;
            report.add_unknown(&selection.invalid, thresholds);
            (report.message.clone(), report.exit_code(), cache)
        }
    };

    if let Err(e) = store.save(&cache) {
        warn!(error = %e, "Could not save cache");
    }

    println!("{}", message);
    Ok(code)
}

fn zone_source(settings: &Settings, settings_dir: &Path) -> domexp_core::Result<Box<dyn ZoneSource>> {
    Ok(match settings.main.method {
        ZoneMethod::Route53 => Box::new(Route53ZoneSource::new(settings.route53_credentials())),
        ZoneMethod::File => Box::new(FileZoneSource::new(settings.domains_file(settings_dir)?)),
    })
}

fn exe_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."))
}
