// src/models/mod.rs

//! Domain models for the sync engine.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod artifact;
mod config;
mod record;
mod schema;

// Re-export all public types
pub use artifact::{
    ArtifactKey, ArtifactKind, denormalize_stem, is_valid_stem, normalize_name,
};
pub use config::{
    Config, DashboardConfig, DirectoryConfig, FetchConfig, LoggingConfig, PathsConfig, PublishConfig,
    ScheduleConfig, SourceConfig,
};
pub use record::{GENERIC_LINK_ICON, Record, Student, Teacher};
pub use schema::{Column, ColumnSpec, RowView, SCHEMA_VERSION, SheetSchema};

/// Per-cycle counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct SyncTally {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    pub total: usize,
}
