//! Storage abstractions for generated artifacts.
//!
//! One store holds one artifact kind in one directory:
//!
//! ```text
//! {repo_root}/
//! ├── Students/
//! │   ├── John-Doe-Page.html
//! │   └── Mary-OBrien-Page.html
//! └── Teachers/
//!     └── Ms-Smith-Teacher-Dashboard.html
//! ```
//!
//! Identity is recovered from the file name alone, so the directory listing
//! is the only state a store needs.

pub mod local;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{ArtifactKey, ArtifactKind};

// Re-export for convenience
pub use local::LocalArtifactStore;

/// Result of a removal request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Removal {
    /// The file existed and was deleted
    Deleted,
    /// Nothing to delete
    Missing,
    /// The key failed the safety gate; nothing was touched
    Refused,
}

/// Trait for artifact storage backends.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// The kind this store holds.
    fn kind(&self) -> ArtifactKind;

    /// Keys of every artifact currently present.
    ///
    /// A missing directory is an empty inventory.
    async fn enumerate(&self) -> Result<Vec<ArtifactKey>>;

    /// Create or fully overwrite an artifact.
    async fn write(&self, key: &ArtifactKey, content: &str) -> Result<()>;

    /// Remove an artifact if the key passes the safety gate.
    async fn remove(&self, key: &ArtifactKey) -> Result<Removal>;

    /// Convenience wrapper: `true` only when a file was actually deleted.
    async fn delete(&self, key: &ArtifactKey) -> bool {
        match self.remove(key).await {
            Ok(Removal::Deleted) => true,
            Ok(_) => false,
            Err(e) => {
                log::error!("✗ Failed to delete {key}: {e}");
                false
            }
        }
    }

    async fn exists(&self, key: &ArtifactKey) -> Result<bool>;
}
