//! Declarative source store: one JSON document per entity plus a modification timestamp.

use async_trait::async_trait;
use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::RwLock;
use std::time::SystemTime;

#[async_trait]
pub trait ConfigSource: Send + Sync {
    /// Modification timestamp of the entity's source. `NotFound` when absent.
    async fn stat(&self, entity: &str) -> io::Result<SystemTime>;

    async fn read(&self, entity: &str) -> io::Result<Vec<u8>>;
}

/// `<dir>/<entity>.json` files.
#[derive(Clone, Debug)]
pub struct FsConfigSource {
    dir: PathBuf,
}

impl FsConfigSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        FsConfigSource { dir: dir.into() }
    }

    fn path_of(&self, entity: &str) -> io::Result<PathBuf> {
        if entity.is_empty() || entity.contains(['/', '\\']) || entity.starts_with('.') {
            return Err(io::Error::new(io::ErrorKind::NotFound, format!("invalid entity name {:?}", entity)));
        }
        Ok(self.dir.join(format!("{}.json", entity)))
    }
}

#[async_trait]
impl ConfigSource for FsConfigSource {
    async fn stat(&self, entity: &str) -> io::Result<SystemTime> {
        let meta = tokio::fs::metadata(self.path_of(entity)?).await?;
        meta.modified()
    }

    async fn read(&self, entity: &str) -> io::Result<Vec<u8>> {
        tokio::fs::read(self.path_of(entity)?).await
    }
}

/// In-memory sources, for embedding configurations in a binary and for tests.
#[derive(Default)]
pub struct MemoryConfigSource {
    entries: RwLock<HashMap<String, (Vec<u8>, SystemTime)>>,
}

impl MemoryConfigSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an entity source with the given timestamp.
    pub fn set(&self, entity: &str, json: impl Into<Vec<u8>>, modified: SystemTime) {
        let mut guard = self.entries.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.insert(entity.to_string(), (json.into(), modified));
    }

    fn get(&self, entity: &str) -> io::Result<(Vec<u8>, SystemTime)> {
        let guard = self.entries.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        guard
            .get(entity)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, format!("no source for entity {:?}", entity)))
    }
}

#[async_trait]
impl ConfigSource for MemoryConfigSource {
    async fn stat(&self, entity: &str) -> io::Result<SystemTime> {
        Ok(self.get(entity)?.1)
    }

    async fn read(&self, entity: &str) -> io::Result<Vec<u8>> {
        Ok(self.get(entity)?.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reads_files_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Order.json"), br#"{"pageTitle": "Orders"}"#).unwrap();
        let src = FsConfigSource::new(dir.path());
        assert!(src.stat("Order").await.is_ok());
        assert_eq!(src.read("Order").await.unwrap(), br#"{"pageTitle": "Orders"}"#.to_vec());
        assert_eq!(src.stat("Missing").await.unwrap_err().kind(), io::ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn rejects_path_like_names() {
        let dir = tempfile::tempdir().unwrap();
        let src = FsConfigSource::new(dir.path());
        assert!(src.stat("../etc/passwd").await.is_err());
        assert!(src.stat(".hidden").await.is_err());
    }

    #[tokio::test]
    async fn memory_source_reports_timestamps() {
        let src = MemoryConfigSource::new();
        let t = SystemTime::UNIX_EPOCH + std::time::Duration::from_secs(10);
        src.set("Order", "{}", t);
        assert_eq!(src.stat("Order").await.unwrap(), t);
        assert!(src.read("Nope").await.is_err());
    }
}
