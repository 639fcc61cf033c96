//! Sources of disallowed passwords.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::config::{DenyListConfig, DenyListRefresh};

#[async_trait]
pub trait DenyListSource: Send + Sync + std::fmt::Debug {
    /// The current set of disallowed passwords.
    async fn disallowed(&self) -> Arc<[String]>;
}

/// A deny-list fixed at construction.
#[derive(Debug, Clone)]
pub struct StaticDenyList {
    entries: Arc<[String]>,
}

impl Default for StaticDenyList {
    fn default() -> Self {
        Self { entries: Arc::from([]) }
    }
}

impl StaticDenyList {
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            entries: entries.into_iter().map(Into::into).collect(),
        }
    }

    /// Read `path` once.
    pub async fn load(path: &Path) -> Self {
        Self {
            entries: read_entries(path).await.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl DenyListSource for StaticDenyList {
    async fn disallowed(&self) -> Arc<[String]> {
        self.entries.clone()
    }
}

/// A deny-list re-read from disk on every call.
#[derive(Debug, Clone)]
pub struct FileDenyList {
    path: PathBuf,
}

impl FileDenyList {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl DenyListSource for FileDenyList {
    async fn disallowed(&self) -> Arc<[String]> {
        read_entries(&self.path).await.into()
    }
}

/// Newline-separated entries; blank lines are skipped. An unreadable file is an empty list.
async fn read_entries(path: &Path) -> Vec<String> {
    match tokio::fs::read_to_string(path).await {
        Ok(contents) => {
            let entries: Vec<String> = contents
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_string)
                .collect();
            debug!(path = %path.display(), count = entries.len(), "Loaded password deny-list");
            entries
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Could not read password deny-list, treating it as empty");
            Vec::new()
        }
    }
}

/// Build the configured deny-list source.
pub async fn from_config(config: &DenyListConfig) -> Arc<dyn DenyListSource> {
    match (&config.path, config.refresh) {
        (None, _) => Arc::new(StaticDenyList::default()),
        (Some(path), DenyListRefresh::Startup) => Arc::new(StaticDenyList::load(path).await),
        (Some(path), DenyListRefresh::EveryCall) => Arc::new(FileDenyList::new(path.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn deny_file(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[tokio::test]
    async fn test_static_list_returns_injected_entries() {
        let list = StaticDenyList::new(["password", "12345678"]);
        assert_eq!(&*list.disallowed().await, &["password".to_string(), "12345678".to_string()]);
    }

    #[tokio::test]
    async fn test_file_entries_skip_blank_lines() {
        let file = deny_file("password\n\n  qwertyuiop  \n");
        let list = StaticDenyList::load(file.path()).await;
        assert_eq!(list.len(), 2);
        assert!(list.disallowed().await.contains(&"qwertyuiop".to_string()));
    }

    #[tokio::test]
    async fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let list = FileDenyList::new(dir.path().join("nope.txt"));
        assert!(list.disallowed().await.is_empty());
    }

    #[tokio::test]
    async fn test_refresh_policy() {
        let mut file = deny_file("password\n");

        let startup = from_config(&DenyListConfig {
            path: Some(file.path().to_path_buf()),
            refresh: DenyListRefresh::Startup,
        })
        .await;
        let every_call = from_config(&DenyListConfig {
            path: Some(file.path().to_path_buf()),
            refresh: DenyListRefresh::EveryCall,
        })
        .await;

        file.write_all(b"iloveyou1\n").unwrap();
        file.flush().unwrap();

        assert_eq!(startup.disallowed().await.len(), 1);
        assert_eq!(every_call.disallowed().await.len(), 2);
    }

    #[tokio::test]
    async fn test_no_path_is_empty() {
        let list = from_config(&DenyListConfig::default()).await;
        assert!(list.disallowed().await.is_empty());
    }
}
