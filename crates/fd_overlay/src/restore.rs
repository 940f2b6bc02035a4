//! Returning an asset tree to its pre-mod state.
//!
//! Restoring is a thin, logged wrapper around
//! [`SnapshotStore::restore_all`](crate::snapshot::SnapshotStore::restore_all).
//! It is best effort: paths that cannot be put back are reported and retried
//! by the next restore, everything else is restored regardless.

use crate::error::{RestoreFailure, Result};
use crate::snapshot::SnapshotStore;
use camino::Utf8PathBuf;
use serde::Serialize;

/// Outcome of a restore.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoreReport {
    /// Paths whose original bytes were written back.
    pub restored: Vec<Utf8PathBuf>,
    /// Paths introduced by an overlay that were deleted.
    pub deleted: Vec<Utf8PathBuf>,
    /// Paths that could not be restored; their records are kept.
    pub failures: Vec<RestoreFailure>,
}

impl RestoreReport {
    /// `true` if every recorded path was restored.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// Paths the restore actually changed on disk.
    pub fn touched(&self) -> usize {
        self.restored.len() + self.deleted.len()
    }
}

/// Restore every path recorded in `store`.
pub fn restore(store: &mut SnapshotStore) -> Result<RestoreReport> {
    if store.is_empty() {
        tracing::info!("Restore: {} is already clean", store.asset_root());
        return Ok(RestoreReport::default());
    }

    tracing::info!(
        "Restore: putting back {} recorded path(s) in {}",
        store.len(),
        store.asset_root()
    );

    let report = store.restore_all()?;

    for failure in &report.failures {
        tracing::warn!(
            "Couldn't restore {} ({}); it will be retried on the next restore",
            failure.relative_path,
            failure.message
        );
    }

    tracing::info!(
        "Restore: restored={} deleted={} failed={}",
        report.restored.len(),
        report.deleted.len(),
        report.failures.len()
    );

    Ok(report)
}
