//! Reconciliation diff between the sheet and the artifact inventory.
//!
//! Computes which artifacts to write (new or regenerated) and which known
//! artifacts no longer have a record. Identity is the [`ArtifactKey`], never
//! the raw name, so a lossy inventory name cannot cause a fresh page to be
//! deleted.

use std::collections::{BTreeSet, HashMap};

use crate::models::{ArtifactKey, Record};

/// One artifact to render and write.
#[derive(Debug, Clone)]
pub struct Upsert<'a, R> {
    pub key: ArtifactKey,
    pub record: &'a R,
    /// Already in the inventory (counts as an update)
    pub known: bool,
}

/// Two records that normalize to the same artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collision {
    pub key: ArtifactKey,
    pub kept: String,
    pub dropped: String,
}

/// The planned changes for one cycle.
#[derive(Debug, Clone)]
pub struct DiffResult<'a, R> {
    pub upserts: Vec<Upsert<'a, R>>,
    /// Known keys with no current record, in key order
    pub removals: Vec<ArtifactKey>,
    pub collisions: Vec<Collision>,
    /// Names that normalize to nothing and cannot be materialized
    pub unnamed: Vec<String>,
}

impl<R> DiffResult<'_, R> {
    /// Check if there are any changes.
    pub fn has_changes(&self) -> bool {
        !self.upserts.is_empty() || !self.removals.is_empty()
    }

    pub fn created(&self) -> usize {
        self.upserts.iter().filter(|u| !u.known).count()
    }

    pub fn updated(&self) -> usize {
        self.upserts.iter().filter(|u| u.known).count()
    }

    /// Keys the sheet currently asks for.
    pub fn wanted(&self) -> BTreeSet<ArtifactKey> {
        self.upserts.iter().map(|u| u.key.clone()).collect()
    }
}

/// Calculator for the record set ↔ inventory diff.
///
/// Every current record is planned for a write, known or not.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiffCalculator;

impl DiffCalculator {
    pub fn new() -> Self {
        Self
    }

    /// Diff current records against the known keys.
    ///
    /// Records keep sheet order. When two records share a key the first one
    /// wins and the clash is reported.
    pub fn calculate<'a, R: Record>(
        &self,
        known: &BTreeSet<ArtifactKey>,
        current: &'a [R],
    ) -> DiffResult<'a, R> {
        let mut upserts = Vec::new();
        let mut collisions = Vec::new();
        let mut unnamed = Vec::new();
        let mut owners: HashMap<ArtifactKey, &str> = HashMap::new();
        let mut wanted: BTreeSet<ArtifactKey> = BTreeSet::new();

        for record in current {
            let key = record.artifact_key();
            if key.stem().is_empty() {
                unnamed.push(record.name().to_string());
                continue;
            }
            if let Some(owner) = owners.get(&key) {
                collisions.push(Collision {
                    key,
                    kept: owner.to_string(),
                    dropped: record.name().to_string(),
                });
                continue;
            }
            owners.insert(key.clone(), record.name());
            wanted.insert(key.clone());

            upserts.push(Upsert {
                known: known.contains(&key),
                key,
                record,
            });
        }

        let removals = known.difference(&wanted).cloned().collect();

        DiffResult {
            upserts,
            removals,
            collisions,
            unnamed,
        }
    }
}
