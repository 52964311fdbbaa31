mod client;
mod parser;
mod servers;
mod shell;

pub(crate) use client::DEFAULT_TIMEOUT;
pub use client::{WhoisClient, WhoisQuery};
pub use parser::{parse_shell_expiration, WhoisResponse};
pub use servers::{get_tld, get_whois_server};
pub use shell::{SystemWhois, WhoisCommand};
