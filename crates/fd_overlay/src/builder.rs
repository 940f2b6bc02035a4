//! Main overlay builder implementation.
//!
//! The [`OverlayBuilder`] orchestrates the full build pipeline against a live
//! asset tree.
//!
//! # Build Algorithm
//!
//! 1. Validate that the asset root exists and open its [`SnapshotStore`]
//!    (keyed by the canonical root path).
//! 2. Restore the tree from the store (best effort). Every build starts from the
//!    base state, never from the previous overlay.
//! 3. Plan the overlay from the enabled mods with [`plan_overlay`].
//! 4. For each planned path, in path order:
//!    - If the store has no record for it yet, record the live file (or a
//!      tombstone if nothing is there). Failing to record aborts the build,
//!      and the files applied so far are restored before the error returns.
//!    - Create missing parent directories, recording each one first.
//!    - Copy the winning mod file over the asset path. Copy failures are
//!      collected and the build moves on. If the path was left untouched its
//!      record is dropped again.
//! 5. Persist the loadout (only if something was recorded) and emit a
//!    completion progress event.

use crate::error::{ApplyFailure, Error, FailureKind, Result};
use crate::planner::{plan_overlay, Conflict, EnabledMod, PlanEntry};
use crate::restore::{restore, RestoreReport};
use crate::snapshot::{OriginalState, SnapshotStore};
use crate::utils::copy_hashed;
use camino::{Utf8Path, Utf8PathBuf};
use std::io;
use std::sync::Arc;
use std::time::Duration;

/// Progress information emitted during overlay building.
///
/// The `current`/`total` fields are only meaningful during the
/// [`Applying`](OverlayStage::Applying) stage.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverlayProgress {
    /// Current stage of the build process.
    pub stage: OverlayStage,
    /// Relative path of the file currently being applied.
    pub current_file: Option<String>,
    /// 1-based index of the file currently being applied.
    pub current: u32,
    /// Total number of planned files.
    pub total: u32,
}

/// Stages of the build pipeline.
///
/// Emitted in order: `Restoring` -> `Planning` -> `Applying` (repeated) -> `Complete`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub enum OverlayStage {
    /// Putting the previous overlay's files back.
    Restoring,
    /// Scanning enabled mods and resolving conflicts.
    Planning,
    /// Copying a mod file into the asset tree.
    Applying,
    /// Build finished.
    Complete,
}

/// How completely a build was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub enum BuildStatus {
    /// Every planned file was applied and the preceding restore was complete.
    Clean,
    /// Some files failed; the game is launchable but the loadout is incomplete.
    Partial,
}

/// Summary returned after a build completes.
#[derive(Debug)]
pub struct OverlayBuildResult {
    /// The asset tree that was built.
    pub asset_root: Utf8PathBuf,
    /// Relative paths that now hold a mod file.
    pub applied: Vec<Utf8PathBuf>,
    /// Planned paths that could not be applied.
    pub failures: Vec<ApplyFailure>,
    /// Outcome of the restore that started the build.
    pub restore: RestoreReport,
    /// Paths provided by more than one enabled mod.
    pub conflicts: Vec<Conflict>,
    pub status: BuildStatus,
    /// Wall-clock time for the entire build.
    pub build_time: Duration,
}

impl OverlayBuildResult {
    /// Relative paths of every failed entry, in plan order.
    pub fn failed_paths(&self) -> Vec<Utf8PathBuf> {
        self.failures
            .iter()
            .map(|f| f.relative_path.clone())
            .collect()
    }
}

type ProgressCallback = Arc<dyn Fn(OverlayProgress) + Send + Sync>;

/// Per-file failure while applying one plan entry.
enum ApplyError {
    /// Losing the ability to restore; stops the build.
    Fatal(Error),
    /// Only this file is affected.
    File(FailureKind, io::Error),
}

impl From<Error> for ApplyError {
    fn from(e: Error) -> Self {
        ApplyError::Fatal(e)
    }
}

/// Orchestrates restore and overlay builds for one asset tree.
///
/// Create a builder with [`new`](Self::new), configure it with
/// [`set_enabled_mods`](Self::set_enabled_mods) and optionally
/// [`with_progress`](Self::with_progress), then call [`build`](Self::build) or
/// [`restart`](Self::restart).
///
/// The builder is not reentrant: callers must not run two operations against the
/// same asset tree at once, and nothing else may write to the tree meanwhile.
pub struct OverlayBuilder {
    asset_root: Utf8PathBuf,
    data_dir: Utf8PathBuf,
    enabled_mods: Vec<EnabledMod>,
    progress_callback: Option<ProgressCallback>,
}

impl OverlayBuilder {
    /// Create a new builder.
    ///
    /// # Arguments
    ///
    /// * `asset_root` - The game's asset directory that mods are applied to.
    /// * `data_dir` - The manager's data directory; the snapshot store lives in
    ///   `data_dir/snapshots/`.
    pub fn new(asset_root: Utf8PathBuf, data_dir: Utf8PathBuf) -> Self {
        Self {
            asset_root,
            data_dir,
            enabled_mods: Vec::new(),
            progress_callback: None,
        }
    }

    /// Register a progress callback.
    pub fn with_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(OverlayProgress) + Send + Sync + 'static,
    {
        self.progress_callback = Some(Arc::new(callback));
        self
    }

    /// Set the mods to apply, lowest priority first.
    ///
    /// When two mods provide the same path, the mod that appears later in this
    /// list wins.
    pub fn set_enabled_mods(&mut self, mods: Vec<EnabledMod>) {
        self.enabled_mods = mods;
    }

    pub fn asset_root(&self) -> &Utf8Path {
        &self.asset_root
    }

    /// Open the snapshot store for this builder's asset tree.
    pub fn open_store(&self) -> Result<SnapshotStore> {
        self.validate_asset_root()?;
        SnapshotStore::open(&self.data_dir, &self.asset_root)
    }

    /// Return the asset tree to its base state.
    pub fn restart(&self) -> Result<RestoreReport> {
        let mut store = self.open_store()?;
        self.emit_progress(OverlayProgress {
            stage: OverlayStage::Restoring,
            current_file: None,
            current: 0,
            total: store.len() as u32,
        });
        let report = restore(&mut store)?;
        self.emit_progress(OverlayProgress {
            stage: OverlayStage::Complete,
            current_file: None,
            current: 0,
            total: 0,
        });
        Ok(report)
    }

    /// Restore the asset tree, then apply the enabled mods. See module-level
    /// docs for the full algorithm.
    ///
    /// Returns `Err` only when the build had to stop to keep the tree
    /// restorable (or never got started). A stopped build restores what it had
    /// applied first, so the tree is left in its base state. Per-file problems
    /// are reported in the result instead.
    pub fn build(&mut self) -> Result<OverlayBuildResult> {
        let start_time = std::time::Instant::now();

        tracing::info!("Building loadout...");
        tracing::info!("Asset root: {}", self.asset_root);
        tracing::info!("Enabled mods: {}", self.enabled_mods.len());

        let mut store = self.open_store()?;

        self.emit_progress(OverlayProgress {
            stage: OverlayStage::Restoring,
            current_file: None,
            current: 0,
            total: store.len() as u32,
        });
        let restore_report = restore(&mut store)?;

        self.emit_progress(OverlayProgress {
            stage: OverlayStage::Planning,
            current_file: None,
            current: 0,
            total: 0,
        });
        let plan = plan_overlay(&self.enabled_mods);
        let conflicts = plan.conflicts();
        tracing::info!(
            "Planned {} file(s) from {} mod(s), {} conflict(s)",
            plan.len(),
            self.enabled_mods.len(),
            conflicts.len()
        );

        let mut failures: Vec<ApplyFailure> = plan.skipped.clone();
        let mut applied = Vec::with_capacity(plan.len());
        let total = plan.len() as u32;

        for (idx, entry) in plan.entries().enumerate() {
            self.emit_progress(OverlayProgress {
                stage: OverlayStage::Applying,
                current_file: Some(entry.relative_path.to_string()),
                current: (idx + 1) as u32,
                total,
            });

            match self.apply_entry(&mut store, entry) {
                Ok(()) => applied.push(entry.relative_path.clone()),
                Err(ApplyError::File(kind, e)) => {
                    tracing::warn!(
                        "Couldn't apply {} from {} ({})",
                        entry.relative_path,
                        entry.winner,
                        e
                    );
                    failures.push(ApplyFailure {
                        relative_path: entry.relative_path.clone(),
                        kind,
                        message: e.to_string(),
                    });
                }
                Err(ApplyError::Fatal(e)) => {
                    tracing::error!("Build aborted at {}: {}", entry.relative_path, e);
                    match restore(&mut store) {
                        Ok(report) if report.is_clean() => {
                            tracing::info!("Rolled back {} file(s) after the abort", report.touched())
                        }
                        Ok(report) => tracing::warn!(
                            "Rolled back the abort, {} file(s) still need a restore",
                            report.failures.len()
                        ),
                        Err(rollback) => {
                            tracing::error!("Couldn't roll back the aborted build: {}", rollback)
                        }
                    }
                    return Err(e);
                }
            }
        }

        if !store.is_empty() {
            let loadout = self.enabled_mods.iter().map(|m| m.id.clone()).collect();
            if let Err(e) = store.set_loadout(loadout) {
                tracing::warn!("Couldn't persist the loadout names: {}", e);
            }
        }

        let status = if failures.is_empty() && restore_report.is_clean() {
            BuildStatus::Clean
        } else {
            BuildStatus::Partial
        };

        tracing::info!(
            "Build finished: applied={} failed={} status={:?}",
            applied.len(),
            failures.len(),
            status
        );

        self.emit_progress(OverlayProgress {
            stage: OverlayStage::Complete,
            current_file: None,
            current: total,
            total,
        });

        Ok(OverlayBuildResult {
            asset_root: store.asset_root().to_path_buf(),
            applied,
            failures,
            restore: restore_report,
            conflicts,
            status,
            build_time: start_time.elapsed(),
        })
    }

    /// Record, then overwrite, one planned path.
    fn apply_entry(
        &self,
        store: &mut SnapshotStore,
        entry: &PlanEntry,
    ) -> std::result::Result<(), ApplyError> {
        match std::fs::metadata(entry.source.as_std_path()) {
            Ok(meta) if meta.is_file() => {}
            Ok(_) => {
                return Err(ApplyError::File(
                    FailureKind::PlanInput,
                    io::Error::other(format!("{} is no longer a file", entry.source)),
                ))
            }
            Err(e) => return Err(ApplyError::File(FailureKind::PlanInput, e)),
        }

        let target = store.asset_root().join(&entry.relative_path);

        if !store.contains(&entry.relative_path) {
            let original = OriginalState::observe(&target)
                .map_err(|e| ApplyError::File(FailureKind::Copy, e))?;
            store.record(&entry.relative_path, original)?;
        }

        let outcome = self
            .ensure_parent_dirs(store, &entry.relative_path)
            .and_then(|()| {
                tracing::debug!("Applying {} from {}", entry.relative_path, entry.winner);
                copy_hashed(entry.source.as_std_path(), target.as_std_path())
                    .map(|_| ())
                    .map_err(|e| ApplyError::File(FailureKind::Copy, e))
            });

        // A failed overwrite that left the path untouched must not leave a record behind.
        if let Err(ApplyError::File(..)) = &outcome {
            match store.forget_unchanged(&entry.relative_path) {
                Ok(true) => tracing::debug!("{} is unchanged, dropped its record", entry.relative_path),
                Ok(false) => {}
                Err(e) => tracing::warn!("Couldn't drop the record of {}: {}", entry.relative_path, e),
            }
        }

        outcome
    }

    /// Create every missing ancestor of `relative_path`, recording each one.
    fn ensure_parent_dirs(
        &self,
        store: &mut SnapshotStore,
        relative_path: &Utf8Path,
    ) -> std::result::Result<(), ApplyError> {
        let Some(parent) = relative_path.parent() else {
            return Ok(());
        };

        let mut ancestors: Vec<&Utf8Path> = parent
            .ancestors()
            .filter(|p| !p.as_str().is_empty())
            .collect();
        ancestors.reverse();

        let asset_root = store.asset_root().to_path_buf();
        for relative_dir in ancestors {
            let dir = asset_root.join(relative_dir);
            match std::fs::symlink_metadata(dir.as_std_path()) {
                Ok(meta) if meta.is_dir() => continue,
                Ok(_) => {
                    return Err(ApplyError::File(
                        FailureKind::Copy,
                        io::Error::other(format!("{} exists and is not a directory", relative_dir)),
                    ))
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    store.record_created_dir(relative_dir)?;
                    std::fs::create_dir(dir.as_std_path())
                        .map_err(|e| ApplyError::File(FailureKind::Copy, e))?;
                }
                Err(e) => return Err(ApplyError::File(FailureKind::Copy, e)),
            }
        }

        Ok(())
    }

    fn validate_asset_root(&self) -> Result<()> {
        if !self.asset_root.as_std_path().is_dir() {
            return Err(Error::InvalidAssetTree(self.asset_root.clone()));
        }
        Ok(())
    }

    /// Emit a progress event if a callback was registered.
    fn emit_progress(&self, progress: OverlayProgress) {
        if let Some(callback) = &self.progress_callback {
            callback(progress);
        }
    }
}

/// Restore `asset_root` to its base state using the store under `data_dir`.
pub fn restart(asset_root: &Utf8Path, data_dir: &Utf8Path) -> Result<RestoreReport> {
    OverlayBuilder::new(asset_root.to_path_buf(), data_dir.to_path_buf()).restart()
}

/// Build `asset_root` from `mod_dirs`, given lowest priority first.
///
/// Each directory's folder name is used as the mod id.
pub fn build(
    asset_root: &Utf8Path,
    data_dir: &Utf8Path,
    mod_dirs: &[Utf8PathBuf],
) -> Result<OverlayBuildResult> {
    let mut builder = OverlayBuilder::new(asset_root.to_path_buf(), data_dir.to_path_buf());
    builder.set_enabled_mods(mod_dirs.iter().cloned().map(EnabledMod::from_dir).collect());
    builder.build()
}
