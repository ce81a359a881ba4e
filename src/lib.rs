// src/lib.rs

//! Roster Sync Library
//!
//! Keeps one HTML page per student and one dashboard per teacher in sync
//! with a Google Sheets roster, and publishes the result with git.

pub mod error;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod storage;
pub mod utils;
