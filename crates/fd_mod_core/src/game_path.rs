//! Game path validation and asset tree resolution.

use crate::error::{Error, Result};
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;
use sysinfo::System;

/// Name of the asset directory next to the game executable.
const ASSETS_DIR: &str = "assets";

/// Validates if a path points to an existing game executable file.
pub fn is_valid_game_path(path: &Utf8Path) -> bool {
    path.as_std_path().is_file()
}

/// Resolve the asset tree of the game at `exe_path`.
///
/// The asset tree is the `assets` directory next to the executable. The name is
/// matched case-insensitively, since builds of the game ship both `assets` and
/// `Assets`.
pub fn resolve_asset_tree(exe_path: &Utf8Path) -> Result<Utf8PathBuf> {
    if !is_valid_game_path(exe_path) {
        return Err(Error::InvalidGamePath(exe_path.to_path_buf()));
    }

    let game_dir = exe_path
        .parent()
        .ok_or_else(|| Error::InvalidGamePath(exe_path.to_path_buf()))?;

    let exact = game_dir.join(ASSETS_DIR);
    if exact.as_std_path().is_dir() {
        return Ok(exact);
    }

    for entry in fs::read_dir(game_dir.as_std_path())? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            continue;
        };
        if name.eq_ignore_ascii_case(ASSETS_DIR) {
            return Ok(game_dir.join(name));
        }
    }

    Err(Error::AssetTreeNotFound(exe_path.to_path_buf()))
}

/// Check whether the game at `exe_path` is currently running.
///
/// Builds must not run while the game holds its asset files open.
pub fn is_game_running(exe_path: &Utf8Path) -> bool {
    let wanted = fs::canonicalize(exe_path.as_std_path())
        .unwrap_or_else(|_| exe_path.as_std_path().to_path_buf());
    let system = System::new_all();

    let running = system.processes().values().any(|process| {
        process.exe().is_some_and(|exe| {
            let exe = fs::canonicalize(exe).unwrap_or_else(|_| exe.to_path_buf());
            exe == wanted
        })
    });

    if running {
        tracing::debug!("Found running process for {}", exe_path);
    }
    running
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_game(assets_name: Option<&str>) -> (tempfile::TempDir, Utf8PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        let exe = root.join("Funkin.exe");
        fs::write(&exe, b"MZ").unwrap();
        if let Some(name) = assets_name {
            fs::create_dir_all(root.join(name)).unwrap();
        }
        (dir, exe)
    }

    #[test]
    fn test_valid_game_path() {
        let (_dir, exe) = temp_game(None);
        assert!(is_valid_game_path(&exe));
        assert!(!is_valid_game_path(exe.parent().unwrap()));
        assert!(!is_valid_game_path(&exe.with_file_name("missing.exe")));
    }

    #[test]
    fn test_resolve_lowercase_assets() {
        let (_dir, exe) = temp_game(Some("assets"));
        let assets = resolve_asset_tree(&exe).unwrap();
        assert_eq!(assets.file_name(), Some("assets"));
    }

    #[test]
    fn test_resolve_capitalized_assets() {
        let (_dir, exe) = temp_game(Some("Assets"));
        let assets = resolve_asset_tree(&exe).unwrap();
        assert!(assets.as_std_path().is_dir());
        assert!(assets.file_name().unwrap().eq_ignore_ascii_case("assets"));
    }

    #[test]
    fn test_resolve_without_assets() {
        let (_dir, exe) = temp_game(None);
        assert!(matches!(
            resolve_asset_tree(&exe),
            Err(Error::AssetTreeNotFound(_))
        ));
    }

    #[test]
    fn test_resolve_invalid_exe() {
        assert!(matches!(
            resolve_asset_tree(Utf8Path::new("/definitely/not/here.exe")),
            Err(Error::InvalidGamePath(_))
        ));
    }

    #[test]
    fn test_fake_exe_is_not_running() {
        let (_dir, exe) = temp_game(None);
        assert!(!is_game_running(&exe));
    }
}
