//! Local filesystem artifact store.
//!
//! Writes are atomic (temp file, then rename). Deletion goes through a gate
//! that only accepts names this store could have produced.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::models::{ArtifactKey, ArtifactKind, is_valid_stem};
use crate::storage::{ArtifactStore, Removal};

/// Local filesystem storage backend for one artifact kind.
#[derive(Debug, Clone)]
pub struct LocalArtifactStore {
    root_dir: PathBuf,
    kind: ArtifactKind,
}

impl LocalArtifactStore {
    /// Create a store over `root_dir` (created lazily on first write).
    pub fn new(root_dir: impl Into<PathBuf>, kind: ArtifactKind) -> Self {
        Self {
            root_dir: root_dir.into(),
            kind,
        }
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    /// Get the full path for an artifact.
    fn path(&self, key: &ArtifactKey) -> PathBuf {
        self.root_dir.join(key.file_name())
    }

    /// Whether a key may be deleted from this store.
    fn passes_gate(&self, key: &ArtifactKey) -> bool {
        let file_name = key.file_name();
        key.kind() == self.kind
            && file_name.ends_with(self.kind.suffix())
            && is_valid_stem(key.stem())
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_bytes(&self, path: &Path, bytes: &[u8]) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.root_dir).await?;

        let tmp = path.with_extension("html.tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        drop(file);

        if let Err(e) = tokio::fs::rename(&tmp, path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e);
        }
        Ok(())
    }
}

#[async_trait]
impl ArtifactStore for LocalArtifactStore {
    fn kind(&self) -> ArtifactKind {
        self.kind
    }

    async fn enumerate(&self) -> Result<Vec<ArtifactKey>> {
        let mut entries = match tokio::fs::read_dir(&self.root_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::warn!("Artifact directory {:?} not found", self.root_dir);
                return Ok(Vec::new());
            }
            Err(e) => return Err(AppError::Io(e)),
        };

        let mut keys = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
                continue;
            };
            if let Some(key) = ArtifactKey::from_file_name(self.kind, &name) {
                keys.push(key);
            }
        }
        keys.sort();

        log::debug!("Found {} existing {} file(s)", keys.len(), self.kind);
        Ok(keys)
    }

    async fn write(&self, key: &ArtifactKey, content: &str) -> Result<()> {
        let path = self.path(key);
        self.write_bytes(&path, content.as_bytes())
            .await
            .map_err(|e| AppError::write(key.file_name(), e))
    }

    async fn remove(&self, key: &ArtifactKey) -> Result<Removal> {
        if !self.passes_gate(key) {
            log::warn!("🛡 PROTECTED: Refusing to delete {key}");
            return Ok(Removal::Refused);
        }

        match tokio::fs::remove_file(self.path(key)).await {
            Ok(()) => Ok(Removal::Deleted),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Removal::Missing),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    async fn exists(&self, key: &ArtifactKey) -> Result<bool> {
        Ok(tokio::fs::try_exists(self.path(key)).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn student_key(name: &str) -> ArtifactKey {
        ArtifactKey::new(ArtifactKind::StudentPage, name)
    }

    #[tokio::test]
    async fn test_write_and_enumerate() {
        let tmp = TempDir::new().unwrap();
        let store = LocalArtifactStore::new(tmp.path().join("Students"), ArtifactKind::StudentPage);

        store.write(&student_key("John Doe"), "<html>1</html>").await.unwrap();
        store.write(&student_key("John Doe"), "<html>2</html>").await.unwrap();
        store.write(&student_key("Ana"), "<html>a</html>").await.unwrap();

        let content = std::fs::read_to_string(tmp.path().join("Students/John-Doe-Page.html")).unwrap();
        assert_eq!(content, "<html>2</html>");

        let keys = store.enumerate().await.unwrap();
        let stems: Vec<&str> = keys.iter().map(|k| k.stem()).collect();
        assert_eq!(stems, vec!["Ana", "John-Doe"]);
    }

    #[tokio::test]
    async fn test_enumerate_missing_dir_is_empty() {
        let tmp = TempDir::new().unwrap();
        let store = LocalArtifactStore::new(tmp.path().join("nope"), ArtifactKind::StudentPage);
        assert!(store.enumerate().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_enumerate_ignores_foreign_files() {
        let tmp = TempDir::new().unwrap();
        for name in [
            "Template.html",
            "John-Doe-Page.html",
            "-Page.html",
            "notes.txt",
            "Ms-Smith-Teacher-Dashboard.html",
        ] {
            std::fs::write(tmp.path().join(name), "x").unwrap();
        }
        let store = LocalArtifactStore::new(tmp.path(), ArtifactKind::TeacherDashboard);

        let keys = store.enumerate().await.unwrap();
        assert_eq!(keys.len(), 1);
        assert_eq!(keys[0].approximate_name(), "Ms Smith");
    }

    #[tokio::test]
    async fn test_remove_outcomes() {
        let tmp = TempDir::new().unwrap();
        let store = LocalArtifactStore::new(tmp.path(), ArtifactKind::StudentPage);
        let key = student_key("John Doe");

        store.write(&key, "x").await.unwrap();
        assert!(store.exists(&key).await.unwrap());
        assert_eq!(store.remove(&key).await.unwrap(), Removal::Deleted);
        assert!(!store.exists(&key).await.unwrap());
        assert_eq!(store.remove(&key).await.unwrap(), Removal::Missing);
        assert!(!store.delete(&key).await);
    }

    #[tokio::test]
    async fn test_gate_refuses_foreign_keys() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("Template.html"), "keep").unwrap();
        std::fs::write(tmp.path().join("Ms-Smith-Teacher-Dashboard.html"), "keep").unwrap();
        let store = LocalArtifactStore::new(tmp.path(), ArtifactKind::StudentPage);

        // Wrong kind for this store.
        let teacher = ArtifactKey::new(ArtifactKind::TeacherDashboard, "Ms Smith");
        assert_eq!(store.remove(&teacher).await.unwrap(), Removal::Refused);

        // A name that normalizes to nothing.
        let empty = student_key("!!!");
        assert_eq!(store.remove(&empty).await.unwrap(), Removal::Refused);

        assert!(tmp.path().join("Template.html").exists());
        assert!(tmp.path().join("Ms-Smith-Teacher-Dashboard.html").exists());
    }
}
