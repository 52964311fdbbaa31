use std::path::PathBuf;

use async_trait::async_trait;
use tracing::debug;

use super::ZoneSource;
use crate::error::{DomexpError, Result};

/// Domain list kept in a plain text file.
#[derive(Debug, Clone)]
pub struct FileZoneSource {
    path: PathBuf,
}

impl FileZoneSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ZoneSource for FileZoneSource {
    async fn list_domains(&self) -> Result<Vec<String>> {
        let content = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            DomexpError::ZoneSourceError(format!("{}: {}", self.path.display(), e))
        })?;
        let domains = parse_domains_from_file(&content);
        debug!(path = %self.path.display(), count = domains.len(), "Read domain list");
        Ok(domains)
    }
}

/// One domain per line, `#` for comments, or CSV (first column).
pub fn parse_domains_from_file(content: &str) -> Vec<String> {
    content
        .lines()
        .map(|line| line.trim())
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|line| line.split(',').next().unwrap_or(line).trim().to_string())
        .filter(|domain| domain.contains('.'))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_domains_from_file() {
        let content = r#"
# zones we own
example.com
example.org.
  whitespace.net
invalid
csv.io,registrar,notes
"#;

        let domains = parse_domains_from_file(content);
        assert_eq!(
            domains,
            vec!["example.com", "example.org.", "whitespace.net", "csv.io"]
        );
    }

    #[tokio::test]
    async fn test_file_source_reads_list() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("domains.txt");
        std::fs::write(&path, "a.com\nb.test\n").unwrap();

        let domains = FileZoneSource::new(&path).list_domains().await.unwrap();
        assert_eq!(domains, vec!["a.com", "b.test"]);
    }

    #[tokio::test]
    async fn test_missing_file_is_error() {
        let err = FileZoneSource::new("/nonexistent/domains.txt")
            .list_domains()
            .await
            .unwrap_err();
        assert!(matches!(err, DomexpError::ZoneSourceError(_)));
    }
}
