//! Service layer for the sync engine.
//!
//! This module contains the external collaborators:
//! - Sheet fetching (`SheetClient`)

mod sheets;

pub use sheets::{SheetClient, SheetSource};
