//! Error types for overlay operations.
//!
//! All fallible functions in this crate return [`Result<T>`], which uses [`Error`]
//! as the error type. Only conditions that stop a whole operation are errors;
//! per-file problems during a build or restore are collected as data in
//! [`ApplyFailure`] and [`RestoreFailure`] and returned inside the reports.

use camino::Utf8PathBuf;
use serde::Serialize;
use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that abort an engine operation.
#[derive(Error, Debug)]
pub enum Error {
    /// Filesystem I/O failed outside of a per-file step (creating the store, listing the tree).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse or serialize the snapshot index.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A backup of the original file could not be persisted.
    ///
    /// The build stops before touching `path`, because without the backup the
    /// file could never be restored.
    #[error("Could not back up '{path}' before overwriting it: {source}")]
    StoreWrite {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The asset tree root is missing or is not a directory.
    #[error("Invalid asset tree: {0}")]
    InvalidAssetTree(Utf8PathBuf),

    /// The snapshot store on disk belongs to another tree or uses an unknown format.
    #[error("Invalid snapshot store: {0}")]
    InvalidStore(String),
}

/// Classification of a non-fatal, per-file failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum FailureKind {
    /// A recorded path could not be put back; its record is kept for the next restore.
    RestoreIo,
    /// A mod file could not be copied into the asset tree.
    Copy,
    /// A mod directory or file disappeared after planning; the mod contributes nothing for it.
    PlanInput,
}

/// A path the restore operation could not reach.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoreFailure {
    pub relative_path: Utf8PathBuf,
    pub message: String,
}

/// A planned overlay file that could not be applied.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyFailure {
    pub relative_path: Utf8PathBuf,
    pub kind: FailureKind,
    pub message: String,
}
