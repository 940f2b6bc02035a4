//! The ordered mod list.
//!
//! The registry is kept in display order: the first entry has the highest
//! priority. Membership follows the mods folder: every subdirectory is a mod,
//! and [`ModRegistry::refresh`] is the single point where the list is brought
//! in line with the folder. The build engine never sees the registry itself,
//! only the stable list returned by [`ModRegistry::enabled_mod_dirs`].

use crate::error::{Error, Result};
use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;

/// One mod folder and whether it is part of the loadout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModEntry {
    /// Folder name under the mods directory; unique.
    pub name: String,
    #[serde(default)]
    pub enabled: bool,
}

impl ModEntry {
    pub fn new(name: impl Into<String>, enabled: bool) -> Self {
        Self {
            name: name.into(),
            enabled,
        }
    }
}

/// What a refresh changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshSummary {
    pub added: Vec<String>,
    pub removed: Vec<String>,
}

impl RefreshSummary {
    pub fn is_unchanged(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Ordered list of mods, highest priority first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModRegistry {
    mods: Vec<ModEntry>,
}

impl ModRegistry {
    pub fn new(mods: Vec<ModEntry>) -> Self {
        Self { mods }
    }

    pub fn mods(&self) -> &[ModEntry] {
        &self.mods
    }

    pub fn len(&self) -> usize {
        self.mods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mods.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&ModEntry> {
        self.mods.iter().find(|m| m.name == name)
    }

    /// Bring the list in line with the subdirectories of `mods_dir`.
    ///
    /// New folders are appended as disabled mods, entries whose folder is gone
    /// are dropped, and enabled mods are then moved above disabled ones while
    /// keeping their relative order. Creates `mods_dir` if it does not exist.
    pub fn refresh(&mut self, mods_dir: &Utf8Path) -> Result<RefreshSummary> {
        fs::create_dir_all(mods_dir.as_std_path())?;

        let mut on_disk = Vec::new();
        for entry in fs::read_dir(mods_dir.as_std_path())? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            match entry.file_name().into_string() {
                Ok(name) => on_disk.push(name),
                Err(name) => tracing::warn!("Ignoring mod folder with a non UTF-8 name: {:?}", name),
            }
        }
        on_disk.sort();

        let mut summary = RefreshSummary::default();

        let known: HashSet<String> = self.mods.iter().map(|m| m.name.clone()).collect();
        for name in &on_disk {
            if !known.contains(name) {
                tracing::info!("Adding {}", name);
                self.mods.push(ModEntry::new(name.clone(), false));
                summary.added.push(name.clone());
            }
        }

        let present: HashSet<&str> = on_disk.iter().map(String::as_str).collect();
        self.mods.retain(|m| {
            let keep = present.contains(m.name.as_str());
            if !keep {
                tracing::info!("{} was deleted.", m.name);
                summary.removed.push(m.name.clone());
            }
            keep
        });

        // Stable: enabled mods keep their order above the disabled ones.
        self.mods.sort_by_key(|m| !m.enabled);

        Ok(summary)
    }

    /// Enable or disable a mod.
    pub fn set_enabled(&mut self, name: &str, enabled: bool) -> Result<()> {
        let entry = self
            .mods
            .iter_mut()
            .find(|m| m.name == name)
            .ok_or_else(|| Error::ModNotFound(name.to_string()))?;
        entry.enabled = enabled;
        Ok(())
    }

    /// Move a mod to `position` (0 = top, highest priority).
    pub fn move_to(&mut self, name: &str, position: usize) -> Result<()> {
        let len = self.mods.len();
        if position >= len {
            return Err(Error::InvalidPosition { position, len });
        }
        let from = self
            .mods
            .iter()
            .position(|m| m.name == name)
            .ok_or_else(|| Error::ModNotFound(name.to_string()))?;

        let entry = self.mods.remove(from);
        self.mods.insert(position, entry);
        Ok(())
    }

    /// Remove a mod from the list without touching the disk.
    pub fn remove(&mut self, name: &str) -> Option<ModEntry> {
        let idx = self.mods.iter().position(|m| m.name == name)?;
        Some(self.mods.remove(idx))
    }

    /// Directories of the enabled mods in application order.
    ///
    /// The list is reversed from display order, so the first returned mod has
    /// the lowest priority and the top of the list is applied last.
    pub fn enabled_mod_dirs(&self, mods_dir: &Utf8Path) -> Vec<Utf8PathBuf> {
        self.mods
            .iter()
            .rev()
            .filter(|m| m.enabled)
            .map(|m| mods_dir.join(&m.name))
            .collect()
    }
}

/// Delete a mod folder from disk and drop it from the registry.
pub fn delete_mod(registry: &mut ModRegistry, mods_dir: &Utf8Path, name: &str) -> Result<()> {
    if registry.get(name).is_none() {
        return Err(Error::ModNotFound(name.to_string()));
    }

    let dir = mods_dir.join(name);
    if dir.as_std_path().exists() {
        fs::remove_dir_all(dir.as_std_path())?;
    }
    registry.remove(name);

    tracing::info!("Deleting {}.", name);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(registry: &ModRegistry) -> Vec<&str> {
        registry.mods().iter().map(|m| m.name.as_str()).collect()
    }

    fn mods_dir_with(folders: &[&str]) -> (tempfile::TempDir, Utf8PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let mods_dir = Utf8PathBuf::from_path_buf(dir.path().join("Mods")).unwrap();
        for folder in folders {
            fs::create_dir_all(mods_dir.join(folder)).unwrap();
        }
        (dir, mods_dir)
    }

    #[test]
    fn test_refresh_adds_new_folders_disabled() {
        let (_dir, mods_dir) = mods_dir_with(&["Hard", "Easy"]);
        let mut registry = ModRegistry::default();

        let summary = registry.refresh(&mods_dir).unwrap();

        assert_eq!(summary.added, vec!["Easy", "Hard"]);
        assert_eq!(names(&registry), vec!["Easy", "Hard"]);
        assert!(registry.mods().iter().all(|m| !m.enabled));
    }

    #[test]
    fn test_refresh_ignores_plain_files() {
        let (_dir, mods_dir) = mods_dir_with(&["Easy"]);
        fs::write(mods_dir.join("readme.txt"), b"hi").unwrap();
        let mut registry = ModRegistry::default();

        registry.refresh(&mods_dir).unwrap();

        assert_eq!(names(&registry), vec!["Easy"]);
    }

    #[test]
    fn test_refresh_removes_deleted_folders() {
        let (_dir, mods_dir) = mods_dir_with(&["Easy"]);
        let mut registry = ModRegistry::new(vec![
            ModEntry::new("Gone", true),
            ModEntry::new("Easy", false),
        ]);

        let summary = registry.refresh(&mods_dir).unwrap();

        assert_eq!(summary.removed, vec!["Gone"]);
        assert_eq!(names(&registry), vec!["Easy"]);
    }

    #[test]
    fn test_refresh_moves_enabled_to_top_stably() {
        let (_dir, mods_dir) = mods_dir_with(&["A", "B", "C", "D"]);
        let mut registry = ModRegistry::new(vec![
            ModEntry::new("A", false),
            ModEntry::new("B", true),
            ModEntry::new("C", false),
            ModEntry::new("D", true),
        ]);

        let summary = registry.refresh(&mods_dir).unwrap();

        assert!(summary.is_unchanged());
        assert_eq!(names(&registry), vec!["B", "D", "A", "C"]);
    }

    #[test]
    fn test_refresh_creates_missing_mods_dir() {
        let (_dir, mods_dir) = mods_dir_with(&[]);
        let mut registry = ModRegistry::default();

        registry.refresh(&mods_dir).unwrap();

        assert!(mods_dir.as_std_path().is_dir());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_enabled_mod_dirs_reverses_and_filters() {
        let registry = ModRegistry::new(vec![
            ModEntry::new("Hard", true),
            ModEntry::new("Disabled", false),
            ModEntry::new("Easy", true),
        ]);

        let dirs = registry.enabled_mod_dirs(Utf8Path::new("/mods"));

        assert_eq!(
            dirs,
            vec![Utf8PathBuf::from("/mods/Easy"), Utf8PathBuf::from("/mods/Hard")]
        );
    }

    #[test]
    fn test_set_enabled_unknown_mod() {
        let mut registry = ModRegistry::default();
        assert!(matches!(
            registry.set_enabled("Nope", true),
            Err(Error::ModNotFound(_))
        ));
    }

    #[test]
    fn test_move_to() {
        let mut registry = ModRegistry::new(vec![
            ModEntry::new("A", true),
            ModEntry::new("B", true),
            ModEntry::new("C", true),
        ]);

        registry.move_to("C", 0).unwrap();
        assert_eq!(names(&registry), vec!["C", "A", "B"]);

        registry.move_to("C", 2).unwrap();
        assert_eq!(names(&registry), vec!["A", "B", "C"]);

        assert!(matches!(
            registry.move_to("A", 3),
            Err(Error::InvalidPosition { position: 3, len: 3 })
        ));
    }

    #[test]
    fn test_delete_mod_removes_folder_and_entry() {
        let (_dir, mods_dir) = mods_dir_with(&["Easy", "Hard"]);
        fs::write(mods_dir.join("Hard/song.ogg"), b"H1").unwrap();
        let mut registry = ModRegistry::default();
        registry.refresh(&mods_dir).unwrap();

        delete_mod(&mut registry, &mods_dir, "Hard").unwrap();

        assert!(!mods_dir.join("Hard").as_std_path().exists());
        assert_eq!(names(&registry), vec!["Easy"]);
        assert!(matches!(
            delete_mod(&mut registry, &mods_dir, "Hard"),
            Err(Error::ModNotFound(_))
        ));
    }

    #[test]
    fn test_serializes_as_plain_list() {
        let registry = ModRegistry::new(vec![ModEntry::new("Easy", true)]);
        let json = serde_json::to_string(&registry).unwrap();
        assert_eq!(json, r#"[{"name":"Easy","enabled":true}]"#);

        let parsed: ModRegistry = serde_json::from_str(r#"[{"name":"Hard"}]"#).unwrap();
        assert_eq!(parsed.get("Hard"), Some(&ModEntry::new("Hard", false)));
    }
}
