//! The snapshot store: everything needed to undo an applied overlay.
//!
//! A store lives under `<data_dir>/snapshots/<key>/`, where `key` is derived
//! from the asset tree root (see [`store_key`]). It is never placed inside the
//! asset tree itself. Layout:
//!
//! ```text
//! <data_dir>/snapshots/<key>/
//!   snapshot.json          # SnapshotIndex: records, created dirs, last loadout
//!   backups/
//!     songs/bopeebo/Inst.ogg   # original bytes, mirroring the relative path
//! ```
//!
//! Every mutation of the index is persisted before the caller is allowed to
//! touch the asset tree, which is what makes a crashed build restorable.

use crate::error::{Error, RestoreFailure, Result};
use crate::restore::RestoreReport;
use crate::state::{SnapshotIndex, SnapshotRecord, INDEX_VERSION};
use crate::utils::{
    canonicalize_utf8, copy_hashed, hash_file, prune_empty_dirs, store_key, write_atomic,
};
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;
use std::io;

const INDEX_FILE: &str = "snapshot.json";
const BACKUP_DIR: &str = "backups";

/// What a path looked like before the engine first overwrote it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OriginalState {
    /// A regular file whose current bytes must be kept.
    File(Utf8PathBuf),
    /// Nothing was there; restoring means deleting the path.
    Absent,
}

impl OriginalState {
    /// Inspect the live file at `path`.
    ///
    /// A directory occupying the path is an error, since the engine only ever
    /// replaces whole files.
    pub fn observe(path: &Utf8Path) -> io::Result<Self> {
        match fs::symlink_metadata(path.as_std_path()) {
            Ok(meta) if meta.is_dir() => Err(io::Error::other(format!(
                "a directory occupies '{}'",
                path
            ))),
            Ok(_) => Ok(OriginalState::File(path.to_path_buf())),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(OriginalState::Absent),
            Err(e) => Err(e),
        }
    }
}

/// Persistent record of every path an overlay has changed in one asset tree.
#[derive(Debug)]
pub struct SnapshotStore {
    store_dir: Utf8PathBuf,
    asset_root: Utf8PathBuf,
    index: SnapshotIndex,
}

impl SnapshotStore {
    /// Open the store for `asset_root` under `data_dir`.
    ///
    /// The root is canonicalized first, so every spelling of the same directory
    /// (relative, through `..` or a symlink) opens the same store. Nothing is
    /// written to disk until the first record is made, so opening a store for a
    /// clean tree has no side effects.
    pub fn open(data_dir: &Utf8Path, asset_root: &Utf8Path) -> Result<Self> {
        let asset_root = canonicalize_utf8(asset_root).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound | io::ErrorKind::InvalidData => {
                Error::InvalidAssetTree(asset_root.to_path_buf())
            }
            _ => Error::Io(e),
        })?;
        let asset_root = asset_root.as_path();

        let store_dir = data_dir.join("snapshots").join(store_key(asset_root));
        let index = match SnapshotIndex::load(&store_dir.join(INDEX_FILE))? {
            Some(index) => {
                if index.version != INDEX_VERSION {
                    return Err(Error::InvalidStore(format!(
                        "unsupported snapshot version {} in {}",
                        index.version, store_dir
                    )));
                }
                if index.asset_root != asset_root {
                    return Err(Error::InvalidStore(format!(
                        "store {} belongs to '{}', not '{}'",
                        store_dir, index.asset_root, asset_root
                    )));
                }
                index
            }
            None => SnapshotIndex::new(asset_root.to_path_buf()),
        };

        tracing::debug!(
            "Snapshot store {} opened with {} record(s)",
            store_dir,
            index.records.len()
        );

        Ok(Self {
            store_dir,
            asset_root: asset_root.to_path_buf(),
            index,
        })
    }

    pub fn store_dir(&self) -> &Utf8Path {
        &self.store_dir
    }

    pub fn asset_root(&self) -> &Utf8Path {
        &self.asset_root
    }

    /// `true` if no overlay is currently applied.
    pub fn is_empty(&self) -> bool {
        self.index.is_clean()
    }

    /// Number of recorded paths.
    pub fn len(&self) -> usize {
        self.index.records.len()
    }

    pub fn contains(&self, relative_path: &Utf8Path) -> bool {
        self.index.records.contains_key(relative_path)
    }

    pub fn get(&self, relative_path: &Utf8Path) -> Option<&SnapshotRecord> {
        self.index.records.get(relative_path)
    }

    /// Recorded paths and how each will be restored, in path order.
    pub fn records(&self) -> impl Iterator<Item = (&Utf8PathBuf, &SnapshotRecord)> {
        self.index.records.iter()
    }

    /// Mods of the last applied loadout, in application order.
    pub fn loadout(&self) -> &[String] {
        &self.index.loadout
    }

    /// Capture the original state of `relative_path` before it is overwritten.
    ///
    /// Does nothing if the path already has a record, so the first observed
    /// state is the one that survives. The backup and the updated index are on
    /// disk when this returns `Ok`.
    pub fn record(&mut self, relative_path: &Utf8Path, original: OriginalState) -> Result<()> {
        if self.contains(relative_path) {
            return Ok(());
        }

        let record = match original {
            OriginalState::File(live_path) => {
                let backup_path = self.backup_path(relative_path);
                let (size, hash) = self
                    .write_backup(&live_path, &backup_path)
                    .map_err(|source| Error::StoreWrite {
                        path: relative_path.to_path_buf(),
                        source,
                    })?;
                SnapshotRecord::Backup { size, hash }
            }
            OriginalState::Absent => SnapshotRecord::Tombstone,
        };

        tracing::debug!("Snapshot: recording {} as {:?}", relative_path, record);
        self.index
            .records
            .insert(relative_path.to_path_buf(), record);

        if let Err(source) = self.persist_index() {
            self.index.records.remove(relative_path);
            return Err(Error::StoreWrite {
                path: relative_path.to_path_buf(),
                source,
            });
        }

        Ok(())
    }

    /// Drop the record of `relative_path` if the live path still matches it.
    ///
    /// For an overwrite that failed before changing anything: a backed-up file
    /// whose bytes still hash to the backup, or a tombstoned path that is still
    /// absent, is already in its base state and must not stay recorded.
    /// Returns `true` if the record was dropped.
    pub fn forget_unchanged(&mut self, relative_path: &Utf8Path) -> Result<bool> {
        let Some(record) = self.index.records.get(relative_path).cloned() else {
            return Ok(false);
        };

        let target = self.asset_root.join(relative_path);
        let unchanged = match &record {
            SnapshotRecord::Backup { size, hash } => {
                matches!(hash_file(target.as_std_path()), Ok(actual) if actual == (*size, *hash))
            }
            SnapshotRecord::Tombstone => matches!(
                fs::symlink_metadata(target.as_std_path()),
                Err(ref e) if e.kind() == io::ErrorKind::NotFound
            ),
        };
        if !unchanged {
            return Ok(false);
        }

        self.index.records.remove(relative_path);
        let saved = if self.index.is_clean() {
            fs::remove_dir_all(self.store_dir.as_std_path())
        } else {
            self.persist_index()
        };
        if let Err(source) = saved {
            self.index.records.insert(relative_path.to_path_buf(), record);
            return Err(Error::StoreWrite {
                path: relative_path.to_path_buf(),
                source,
            });
        }

        if matches!(record, SnapshotRecord::Backup { .. }) && !self.index.is_clean() {
            let backup = self.backup_path(relative_path);
            if fs::remove_file(backup.as_std_path()).is_ok() {
                if let Some(parent) = backup.parent() {
                    let backup_root = self.store_dir.join(BACKUP_DIR);
                    prune_empty_dirs(parent.as_std_path(), backup_root.as_std_path());
                }
            }
        }

        tracing::debug!("Snapshot: {} is back in its base state, record dropped", relative_path);
        Ok(true)
    }

    /// Remember that the engine is about to create `relative_dir`, so restore removes it again.
    pub fn record_created_dir(&mut self, relative_dir: &Utf8Path) -> Result<()> {
        if !self.index.created_dirs.insert(relative_dir.to_path_buf()) {
            return Ok(());
        }

        if let Err(source) = self.persist_index() {
            self.index.created_dirs.remove(relative_dir);
            return Err(Error::StoreWrite {
                path: relative_dir.to_path_buf(),
                source,
            });
        }

        Ok(())
    }

    /// Remember which mods the current overlay was built from.
    pub fn set_loadout(&mut self, loadout: Vec<String>) -> Result<()> {
        self.index.loadout = loadout;
        self.persist_index()?;
        Ok(())
    }

    /// Put every recorded path back and clear the records that succeeded.
    ///
    /// Backups are written back over their paths, tombstoned paths are deleted,
    /// and directories created by a build are removed once empty. A path that
    /// cannot be restored keeps its record and is reported, and the remaining
    /// records are still processed. On an empty store this performs no
    /// filesystem writes at all.
    pub fn restore_all(&mut self) -> Result<RestoreReport> {
        let mut report = RestoreReport::default();
        if self.is_empty() {
            return Ok(report);
        }

        let records: Vec<(Utf8PathBuf, SnapshotRecord)> = self
            .index
            .records
            .iter()
            .map(|(path, record)| (path.clone(), record.clone()))
            .collect();
        let mut spent_backups = Vec::new();

        for (relative_path, record) in records {
            let target = self.asset_root.join(&relative_path);
            let outcome = match &record {
                SnapshotRecord::Backup { size, hash } => {
                    self.restore_backup(&relative_path, &target, *size, *hash)
                }
                SnapshotRecord::Tombstone => remove_tombstoned(&target),
            };

            match outcome {
                Ok(changed) => {
                    self.index.records.remove(&relative_path);
                    match record {
                        SnapshotRecord::Backup { .. } => {
                            spent_backups.push(self.backup_path(&relative_path));
                            report.restored.push(relative_path);
                        }
                        SnapshotRecord::Tombstone if changed => report.deleted.push(relative_path),
                        SnapshotRecord::Tombstone => {}
                    }
                }
                Err(e) => {
                    report.failures.push(RestoreFailure {
                        relative_path,
                        message: e.to_string(),
                    });
                }
            }
        }

        self.remove_created_dirs();

        // Whatever was restored, the previous overlay is gone.
        self.index.loadout.clear();

        if self.index.is_clean() {
            if self.store_dir.as_std_path().exists() {
                fs::remove_dir_all(self.store_dir.as_std_path())?;
            }
        } else {
            self.persist_index()?;
            let backup_root = self.store_dir.join(BACKUP_DIR);
            for backup in spent_backups {
                if fs::remove_file(backup.as_std_path()).is_ok() {
                    if let Some(parent) = backup.parent() {
                        prune_empty_dirs(parent.as_std_path(), backup_root.as_std_path());
                    }
                }
            }
        }

        Ok(report)
    }

    fn backup_path(&self, relative_path: &Utf8Path) -> Utf8PathBuf {
        self.store_dir.join(BACKUP_DIR).join(relative_path)
    }

    fn write_backup(&self, live_path: &Utf8Path, backup_path: &Utf8Path) -> io::Result<(u64, u64)> {
        if let Some(parent) = backup_path.parent() {
            fs::create_dir_all(parent.as_std_path())?;
        }
        copy_hashed(live_path.as_std_path(), backup_path.as_std_path())
    }

    fn restore_backup(
        &self,
        relative_path: &Utf8Path,
        target: &Utf8Path,
        size: u64,
        hash: u64,
    ) -> io::Result<bool> {
        let backup_path = self.backup_path(relative_path);
        let actual = hash_file(backup_path.as_std_path())?;
        if actual != (size, hash) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("backup {} does not match the recorded original", backup_path),
            ));
        }

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent.as_std_path())?;
        }
        copy_hashed(backup_path.as_std_path(), target.as_std_path())?;
        Ok(true)
    }

    fn remove_created_dirs(&mut self) {
        let dirs: Vec<Utf8PathBuf> = self.index.created_dirs.iter().rev().cloned().collect();
        for relative_dir in dirs {
            let dir = self.asset_root.join(&relative_dir);
            let removed = match fs::remove_dir(dir.as_std_path()) {
                Ok(()) => true,
                Err(e) if e.kind() == io::ErrorKind::NotFound => true,
                Err(_) => !self
                    .index
                    .records
                    .keys()
                    .any(|path| path.starts_with(&relative_dir)),
            };

            if removed {
                self.index.created_dirs.remove(&relative_dir);
            } else {
                tracing::debug!("Snapshot: keeping created dir {} for a later restore", relative_dir);
            }
        }
    }

    fn persist_index(&self) -> io::Result<()> {
        fs::create_dir_all(self.store_dir.as_std_path())?;
        let contents = serde_json::to_vec_pretty(&self.index).map_err(io::Error::other)?;
        write_atomic(self.store_dir.join(INDEX_FILE).as_std_path(), &contents)
    }
}

fn remove_tombstoned(target: &Utf8Path) -> io::Result<bool> {
    match fs::remove_file(target.as_std_path()) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}
