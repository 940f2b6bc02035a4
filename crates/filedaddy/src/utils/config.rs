//! Application configuration management utilities.

use camino::{Utf8Path, Utf8PathBuf};
use directories_next::ProjectDirs;
use fd_mod_core::ModRegistry;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::io;

/// Application-wide configuration stored in config.toml.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct AppConfig {
    /// Path to the game executable; its `assets` folder is the build target.
    pub game_exe: Option<Utf8PathBuf>,
    /// Folder holding one subdirectory per mod. Defaults to `Mods` next to the executable.
    pub mods_dir: Option<Utf8PathBuf>,
    /// Where snapshots are kept. Defaults to the per-user local data directory.
    pub data_dir: Option<Utf8PathBuf>,
    /// Mod list in display order, highest priority first.
    #[serde(default)]
    pub mods: ModRegistry,
}

/// Returns the directory where the current executable resides.
pub fn install_dir() -> Option<Utf8PathBuf> {
    let exe = env::current_exe().ok()?;
    let parent = exe.parent()?;
    Utf8PathBuf::from_path_buf(parent.to_path_buf()).ok()
}

/// Returns a config file path located next to the executable.
pub fn config_path(file_name: &str) -> Option<Utf8PathBuf> {
    install_dir().map(|dir| dir.join(file_name))
}

/// Returns the default configuration file path (config.toml).
pub fn default_config_path() -> Option<Utf8PathBuf> {
    config_path("config.toml")
}

/// Loads a configuration file, returning defaults if it doesn't exist or cannot be parsed.
pub fn load_config_from(path: &Utf8Path) -> AppConfig {
    if !path.as_std_path().exists() {
        return AppConfig::default();
    }

    match fs::read_to_string(path.as_std_path()) {
        Ok(content) => match toml::from_str(&content) {
            Ok(cfg) => cfg,
            Err(e) => {
                tracing::error!("Failed to parse {}: {}", path, e);
                AppConfig::default()
            }
        },
        Err(e) => {
            tracing::error!("Failed to read {}: {}", path, e);
            AppConfig::default()
        }
    }
}

/// Saves a configuration file, creating its parent directory if needed.
pub fn save_config_to(path: &Utf8Path, cfg: &AppConfig) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent.as_std_path())?;
    }
    let content = toml::to_string_pretty(cfg).map_err(io::Error::other)?;
    fs::write(path.as_std_path(), content)
}

/// Loads the application configuration from config.toml.
/// Returns default configuration if file doesn't exist or cannot be parsed.
pub fn load_config() -> AppConfig {
    match default_config_path() {
        Some(path) => load_config_from(&path),
        None => AppConfig::default(),
    }
}

/// Saves the application configuration to config.toml.
pub fn save_config(cfg: &AppConfig) -> io::Result<()> {
    if let Some(path) = default_config_path() {
        save_config_to(&path, cfg)
    } else {
        Err(io::Error::new(
            io::ErrorKind::NotFound,
            "Could not determine config path",
        ))
    }
}

/// Resolves the mods folder: the configured one, or `Mods` next to the executable.
pub fn mods_dir(cfg: &AppConfig) -> Option<Utf8PathBuf> {
    cfg.mods_dir
        .clone()
        .or_else(|| install_dir().map(|dir| dir.join("Mods")))
}

/// Resolves the data directory holding snapshot stores.
pub fn data_dir(cfg: &AppConfig) -> Option<Utf8PathBuf> {
    cfg.data_dir.clone().or_else(|| {
        let dirs = ProjectDirs::from("", "", "FileDaddy")?;
        Utf8PathBuf::from_path_buf(dirs.data_local_dir().to_path_buf()).ok()
    })
}
