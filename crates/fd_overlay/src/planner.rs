//! Overlay planning: deciding which mod file ends up at each asset path.
//!
//! Planning is pure with respect to the asset tree: it only reads the mod
//! directories. Mods are given in *application order*, lowest priority first,
//! and a later mod that provides the same relative path replaces the earlier
//! one (last-writer-wins). Paths that no enabled mod provides get no entry, so
//! the base file stays in place.

use crate::error::{ApplyFailure, FailureKind};
use crate::utils::normalize_rel_path;
use camino::{Utf8Path, Utf8PathBuf};
use std::collections::BTreeMap;
use walkdir::WalkDir;

/// A mod to be included in the overlay build.
///
/// `mod_dir` mirrors the asset tree's layout: a file at `mod_dir/a/b.png`
/// overrides `asset_root/a/b.png`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnabledMod {
    /// Unique identifier for the mod (its folder name).
    pub id: String,
    /// Directory holding the mod's files.
    pub mod_dir: Utf8PathBuf,
}

impl EnabledMod {
    pub fn new(id: impl Into<String>, mod_dir: impl Into<Utf8PathBuf>) -> Self {
        Self {
            id: id.into(),
            mod_dir: mod_dir.into(),
        }
    }

    /// Build an entry from a mod directory, using its folder name as the id.
    pub fn from_dir(mod_dir: impl Into<Utf8PathBuf>) -> Self {
        let mod_dir = mod_dir.into();
        let id = mod_dir
            .file_name()
            .map(str::to_string)
            .unwrap_or_else(|| mod_dir.to_string());
        Self { id, mod_dir }
    }
}

/// The winning source for one relative path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanEntry {
    /// Path relative to both the mod directory and the asset root.
    pub relative_path: Utf8PathBuf,
    /// Absolute path of the file that will be copied.
    pub source: Utf8PathBuf,
    /// Id of the mod that provides `source`.
    pub winner: String,
    /// Other mods that provide the same path, highest priority first.
    pub overridden: Vec<String>,
}

/// A path provided by more than one enabled mod.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conflict {
    pub relative_path: Utf8PathBuf,
    /// Every mod providing the path, highest priority first (the winner is first).
    pub contributing_mods: Vec<String>,
    pub winner: String,
}

/// The result of planning: one winner per relative path.
#[derive(Debug, Clone, Default)]
pub struct OverlayPlan {
    entries: BTreeMap<Utf8PathBuf, PlanEntry>,
    /// Mods whose directory was missing; they contribute nothing.
    pub missing_mods: Vec<String>,
    /// Entries inside mod directories that could not be read.
    pub skipped: Vec<ApplyFailure>,
}

impl OverlayPlan {
    /// Plan entries in path order.
    pub fn entries(&self) -> impl Iterator<Item = &PlanEntry> {
        self.entries.values()
    }

    pub fn get(&self, relative_path: &Utf8Path) -> Option<&PlanEntry> {
        self.entries.get(relative_path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Paths provided by more than one mod, with the mod that won each.
    pub fn conflicts(&self) -> Vec<Conflict> {
        self.entries
            .values()
            .filter(|entry| !entry.overridden.is_empty())
            .map(|entry| {
                let mut contributing_mods = Vec::with_capacity(entry.overridden.len() + 1);
                contributing_mods.push(entry.winner.clone());
                contributing_mods.extend(entry.overridden.iter().cloned());
                Conflict {
                    relative_path: entry.relative_path.clone(),
                    contributing_mods,
                    winner: entry.winner.clone(),
                }
            })
            .collect()
    }
}

/// Compute the overlay plan for `enabled_mods`, given lowest priority first.
pub fn plan_overlay(enabled_mods: &[EnabledMod]) -> OverlayPlan {
    let mut plan = OverlayPlan::default();

    for enabled_mod in enabled_mods {
        if !enabled_mod.mod_dir.as_std_path().is_dir() {
            tracing::warn!(
                "Mod={} directory {} is missing, it contributes nothing",
                enabled_mod.id,
                enabled_mod.mod_dir
            );
            plan.missing_mods.push(enabled_mod.id.clone());
            continue;
        }

        let before = plan.entries.len();
        let mut provided = 0usize;

        for entry in WalkDir::new(enabled_mod.mod_dir.as_std_path())
            .follow_links(true)
            .sort_by_file_name()
        {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    let relative_path = e
                        .path()
                        .and_then(|p| p.strip_prefix(enabled_mod.mod_dir.as_std_path()).ok())
                        .and_then(normalize_rel_path)
                        .unwrap_or_else(|| Utf8PathBuf::from(enabled_mod.id.as_str()));
                    tracing::warn!("Mod={} couldn't read {}: {}", enabled_mod.id, relative_path, e);
                    plan.skipped.push(ApplyFailure {
                        relative_path,
                        kind: FailureKind::PlanInput,
                        message: e.to_string(),
                    });
                    continue;
                }
            };

            if !entry.file_type().is_file() {
                continue;
            }

            let Some(relative_path) = entry
                .path()
                .strip_prefix(enabled_mod.mod_dir.as_std_path())
                .ok()
                .and_then(normalize_rel_path)
            else {
                tracing::warn!(
                    "Mod={} skipping non UTF-8 path {}",
                    enabled_mod.id,
                    entry.path().display()
                );
                continue;
            };

            let source = enabled_mod.mod_dir.join(&relative_path);
            provided += 1;

            match plan.entries.get_mut(&relative_path) {
                Some(existing) => {
                    tracing::debug!(
                        "{} overridden: {} replaces {}",
                        relative_path,
                        enabled_mod.id,
                        existing.winner
                    );
                    let previous = std::mem::replace(&mut existing.winner, enabled_mod.id.clone());
                    existing.overridden.insert(0, previous);
                    existing.source = source;
                }
                None => {
                    plan.entries.insert(
                        relative_path.clone(),
                        PlanEntry {
                            relative_path,
                            source,
                            winner: enabled_mod.id.clone(),
                            overridden: Vec::new(),
                        },
                    );
                }
            }
        }

        tracing::info!(
            "Mod={} files={} new_paths={} total_paths={}",
            enabled_mod.id,
            provided,
            plan.entries.len().saturating_sub(before),
            plan.entries.len()
        );
    }

    plan
}
