//! Change attribution and self-healing target resolution.
//!
//! A unified diff plus the current source is turned into a per-file map
//! of changed declarations and impact tags, then into test targets whose
//! locators heal through ordered fallback tiers at run time.

pub mod config;
pub mod detectors;
pub mod error;
pub mod executor;
pub mod git;
pub mod healing;
pub mod logger;
pub mod persistence;
pub mod state;
pub mod testgen;

pub use config::Config;
pub use detectors::diff_analyzer::{analyze_diff_text, analyze_file, analyze_repository, FileFilter};
pub use state::{ChangeAnalysis, ChangeRecord, ChangeType, FileChange, LineChangeSet};
