//! Reversible mod overlay builder for game asset trees.
//!
//! This crate applies an ordered list of mod folders on top of a game's asset
//! directory and can always put the directory back the way it was. It
//! supports:
//!
//! - **Priority resolution**: When several mods provide the same file, the
//!   highest-priority mod wins
//! - **Snapshots**: Every overwritten file is backed up (or tombstoned) before
//!   it is touched, in a store kept outside the asset tree
//! - **Crash safety**: The snapshot index is persisted after every change, so an
//!   interrupted build is restorable on the next launch
//! - **Best-effort I/O**: Per-file failures are reported, never silently dropped,
//!   and never abort a build that can still be undone
//!
//! Every build restores the tree first and then applies the whole loadout, so
//! the result depends only on the enabled mod list.
//!
//! # Example
//!
//! ```no_run
//! use fd_overlay::{EnabledMod, OverlayBuilder};
//! use camino::Utf8PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let asset_root = Utf8PathBuf::from("C:/Games/FNF/assets");
//! let data_dir = Utf8PathBuf::from("C:/Users/.../FileDaddy");
//!
//! let mut builder = OverlayBuilder::new(asset_root, data_dir)
//!     .with_progress(|progress| {
//!         println!("Stage: {:?}, Progress: {}/{}",
//!             progress.stage, progress.current, progress.total);
//!     });
//!
//! // Lowest priority first: "Hard" wins over "Easy".
//! builder.set_enabled_mods(vec![
//!     EnabledMod::new("Easy", "C:/FileDaddy/Mods/Easy"),
//!     EnabledMod::new("Hard", "C:/FileDaddy/Mods/Hard"),
//! ]);
//!
//! let result = builder.build()?;
//! println!("Applied {} files, {} failed",
//!     result.applied.len(), result.failures.len());
//!
//! // Back to the unmodified game.
//! builder.restart()?;
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod error;
pub mod planner;
pub mod restore;
pub mod snapshot;
pub mod state;
pub mod utils;

// Re-export main types
pub use builder::{
    build, restart, BuildStatus, OverlayBuildResult, OverlayBuilder, OverlayProgress,
    OverlayStage,
};
pub use error::{ApplyFailure, Error, FailureKind, RestoreFailure, Result};
pub use planner::{plan_overlay, Conflict, EnabledMod, OverlayPlan, PlanEntry};
pub use restore::RestoreReport;
pub use snapshot::{OriginalState, SnapshotStore};
pub use state::{SnapshotIndex, SnapshotRecord};

#[cfg(test)]
mod tests;
