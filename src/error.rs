//! Error types for analysis, resolution and persistence.
//!
//! Per-file and per-target failures are isolated: `DiffParseError` and
//! `AnalysisError::Parse` degrade a single file, `ResolveError` fails a
//! single target. Only `AnalysisError::Unavailable` without a usable
//! fallback, configuration and persistence errors abort a run.

use std::path::PathBuf;

use thiserror::Error;

use crate::testgen::candidate::SelectorDescriptor;

/* ============================================================
   Diff parsing
   ============================================================ */

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DiffParseError {
    #[error("malformed hunk header at diff line {line}: {header:?}")]
    MalformedHunkHeader { line: usize, header: String },
}

/* ============================================================
   Analysis
   ============================================================ */

#[derive(Debug, Error)]
pub enum AnalysisError {
    /// No source-control history reachable. Callers switch to fallback mode.
    #[error("source control unavailable: {0}")]
    Unavailable(String),

    /// Syntax tree could not be produced for a file.
    #[error("cannot parse {file}: {reason}")]
    Parse { file: String, reason: String },

    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/* ============================================================
   Resolution collaborators
   ============================================================ */

/// Failure reported by a UI automation surface for a single query.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SurfaceError {
    #[error("query timed out")]
    Timeout,

    #[error("invalid locator: {0}")]
    InvalidLocator(String),

    #[error("surface error: {0}")]
    Driver(String),
}

/// Network-level failure from the HTTP collaborator. Any response that
/// carries a status code is not a transport error.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("request to {url} timed out")]
    Timeout { url: String },

    #[error("invalid url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("request to {url} failed: {reason}")]
    Network { url: String, reason: String },
}

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("element not found for {descriptor}")]
    ElementNotFound { descriptor: Box<SelectorDescriptor> },

    #[error("endpoint {path} unresolved after {tiers} tiers: {source}")]
    EndpointUnresolved {
        path: String,
        tiers: usize,
        #[source]
        source: TransportError,
    },
}

/* ============================================================
   Ambient
   ============================================================ */

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("cannot write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid json in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: String, value: String },
}
