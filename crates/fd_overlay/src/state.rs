//! Snapshot index persistence.
//!
//! The [`SnapshotIndex`] is the on-disk half of the snapshot store. It is
//! serialized to `snapshot.json` inside the store directory and rewritten after
//! every change, so a build interrupted by a crash can still be restored on the
//! next launch.
//!
//! The index tracks *what* has to be undone (one [`SnapshotRecord`] per touched
//! path, plus the directories a build created). The original bytes themselves
//! live next to it in `backups/`.

use crate::error::Result;
use crate::utils::write_atomic;
use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Current schema version of `snapshot.json`.
pub const INDEX_VERSION: u32 = 1;

/// How to put one path back the way it was.
///
/// # JSON format
///
/// ```json
/// { "kind": "backup", "size": 1024, "hash": 1234567890 }
/// { "kind": "tombstone" }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum SnapshotRecord {
    /// The path held a file; its original bytes are kept in the store's `backups/` directory.
    Backup {
        /// Length of the original file in bytes.
        size: u64,
        /// xxHash3 of the original bytes, checked before writing them back.
        hash: u64,
    },
    /// The path did not exist in the base tree and must be deleted on restore.
    Tombstone,
}

/// Persisted state of a snapshot store, saved as `snapshot.json`.
///
/// # JSON format
///
/// ```json
/// {
///   "version": 1,
///   "assetRoot": "C:/Games/FNF/assets",
///   "loadout": ["Easy", "Hard"],
///   "records": {
///     "songs/bopeebo/Inst.ogg": { "kind": "backup", "size": 3, "hash": 42 },
///     "data/extra.json": { "kind": "tombstone" }
///   },
///   "createdDirs": ["data/custom"]
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotIndex {
    /// Schema version (current: `1`).
    pub version: u32,

    /// Asset tree this store belongs to.
    pub asset_root: Utf8PathBuf,

    /// Names of the mods in the last applied loadout, in application order.
    ///
    /// Informational only; restore never consults it.
    #[serde(default)]
    pub loadout: Vec<String>,

    /// One record per relative path that currently differs from the base tree.
    #[serde(default)]
    pub records: BTreeMap<Utf8PathBuf, SnapshotRecord>,

    /// Directories (relative to the asset root) that a build had to create.
    #[serde(default)]
    pub created_dirs: BTreeSet<Utf8PathBuf>,
}

impl SnapshotIndex {
    /// Create an empty index for the given asset tree.
    pub fn new(asset_root: Utf8PathBuf) -> Self {
        Self {
            version: INDEX_VERSION,
            asset_root,
            loadout: Vec::new(),
            records: BTreeMap::new(),
            created_dirs: BTreeSet::new(),
        }
    }

    /// Load an index from a file.
    ///
    /// Returns `Ok(None)` if the file doesn't exist and `Err` if it exists but
    /// cannot be parsed.
    pub fn load(path: &Utf8Path) -> Result<Option<Self>> {
        if !path.as_std_path().exists() {
            return Ok(None);
        }

        let contents = std::fs::read_to_string(path.as_std_path())?;
        let index: Self = serde_json::from_str(&contents)?;
        Ok(Some(index))
    }

    /// Save the index atomically, creating parent directories if needed.
    pub fn save(&self, path: &Utf8Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent.as_std_path())?;
        }

        let contents = serde_json::to_string_pretty(self)?;
        write_atomic(path.as_std_path(), contents.as_bytes())?;
        Ok(())
    }

    /// `true` when nothing needs to be undone.
    pub fn is_clean(&self) -> bool {
        self.records.is_empty() && self.created_dirs.is_empty()
    }
}
