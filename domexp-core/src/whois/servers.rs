use once_cell::sync::Lazy;
use std::collections::HashMap;

/// WHOIS servers for TLDs whose registry does not answer on
/// `<tld>.whois-servers.net`, or answers with a thin record.
static WHOIS_SERVERS: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    let mut m = HashMap::new();

    // Generic TLDs
    m.insert("com", "whois.verisign-grs.com");
    m.insert("net", "whois.verisign-grs.com");
    m.insert("org", "whois.pir.org");
    m.insert("info", "whois.nic.info");
    m.insert("biz", "whois.nic.biz");
    m.insert("name", "whois.nic.name");
    m.insert("mobi", "whois.nic.mobi");
    m.insert("pro", "whois.nic.pro");
    m.insert("edu", "whois.educause.edu");
    m.insert("gov", "whois.dotgov.gov");
    m.insert("int", "whois.iana.org");

    // New gTLDs
    m.insert("app", "whois.nic.google");
    m.insert("dev", "whois.nic.google");
    m.insert("page", "whois.nic.google");
    m.insert("io", "whois.nic.io");
    m.insert("co", "whois.nic.co");
    m.insert("me", "whois.nic.me");
    m.insert("tv", "whois.nic.tv");
    m.insert("cc", "ccwhois.verisign-grs.com");
    m.insert("xyz", "whois.nic.xyz");
    m.insert("online", "whois.nic.online");
    m.insert("site", "whois.nic.site");
    m.insert("tech", "whois.nic.tech");
    m.insert("store", "whois.nic.store");
    m.insert("cloud", "whois.nic.cloud");
    m.insert("ai", "whois.nic.ai");

    // Country codes
    m.insert("uk", "whois.nic.uk");
    m.insert("de", "whois.denic.de");
    m.insert("fr", "whois.nic.fr");
    m.insert("nl", "whois.domain-registry.nl");
    m.insert("eu", "whois.eu");
    m.insert("ru", "whois.tcinet.ru");
    m.insert("ua", "whois.ua");
    m.insert("pl", "whois.dns.pl");
    m.insert("ca", "whois.cira.ca");
    m.insert("us", "whois.nic.us");
    m.insert("au", "whois.auda.org.au");
    m.insert("jp", "whois.jprs.jp");
    m.insert("br", "whois.registro.br");
    m.insert("in", "whois.registry.in");

    m
});

/// Returns the WHOIS server to ask first for a TLD.
///
/// TLDs missing from the table fall back to the `whois-servers.net` alias.
pub fn get_whois_server(tld: &str) -> String {
    let tld = tld.to_lowercase();
    match WHOIS_SERVERS.get(tld.as_str()) {
        Some(server) => server.to_string(),
        None => format!("{}.whois-servers.net", tld),
    }
}

pub fn get_tld(domain: &str) -> Option<&str> {
    domain.rsplit('.').next().filter(|tld| !tld.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_tld() {
        assert_eq!(get_tld("example.co.uk"), Some("uk"));
        assert_eq!(get_tld("example.com"), Some("com"));
        assert_eq!(get_tld("example."), None);
    }

    #[test]
    fn test_known_and_fallback_servers() {
        assert_eq!(get_whois_server("COM"), "whois.verisign-grs.com");
        assert_eq!(get_whois_server("museum"), "museum.whois-servers.net");
    }
}
