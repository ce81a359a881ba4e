//! Pipeline stages for roster synchronization.
//!
//! - `parse`: CSV text → header + rows
//! - `map`: rows → students and teachers
//! - `render`: template model and page rendering
//! - `diff`: records ↔ inventory reconciliation plan
//! - `sync`: the reconciliation engine
//! - `publish`: git commit-and-push
//! - `schedule`: fixed-interval cycle driver

pub mod diff;
pub mod map;
pub mod parse;
pub mod publish;
pub mod render;
pub mod schedule;
pub mod sync;

pub use diff::{DiffCalculator, DiffResult};
pub use map::{group_teachers, map_students};
pub use parse::{Table, parse_line, parse_table};
pub use publish::{ChangedFile, GitPublisher, PublishOutcome, Publisher, commit_message};
pub use render::{SiteInfo, Template, render_text};
pub use schedule::{
    CycleJob, PublishJob, PublishStatus, StatsSnapshot, SyncJob, SyncRun, SyncScheduler,
};
pub use sync::{
    Inventory, ListingEntry, PageBuilder, StudentPages, SyncEngine, SyncState, TeacherDashboards,
};
