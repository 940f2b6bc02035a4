use crate::errors::CliError;
use crate::utils::config::AppConfig;
use camino::Utf8PathBuf;
use miette::Result;

pub mod config;

#[macro_export]
macro_rules! println_pad {
    ($($arg:tt)*) => {{
        let __s = format!($($arg)*);
        for __line in __s.lines() {
            println!("    {}", __line);
        }
    }};
}

/// Everything a build or restore needs, resolved from the configuration.
#[derive(Debug, Clone)]
pub struct GamePaths {
    pub game_exe: Utf8PathBuf,
    pub asset_root: Utf8PathBuf,
    pub data_dir: Utf8PathBuf,
}

/// Resolve the configured game into its asset tree and the snapshot data directory.
pub fn resolve_game_paths(cfg: &AppConfig) -> Result<GamePaths> {
    let game_exe = cfg.game_exe.clone().ok_or(CliError::GamePathNotSet)?;
    if !fd_mod_core::is_valid_game_path(&game_exe) {
        return Err(CliError::invalid_game_path(game_exe).into());
    }

    let asset_root = fd_mod_core::resolve_asset_tree(&game_exe).map_err(CliError::from)?;
    let data_dir = config::data_dir(cfg).ok_or_else(|| CliError::directory_unknown("data"))?;

    Ok(GamePaths {
        game_exe,
        asset_root,
        data_dir,
    })
}

/// Resolve the mods folder.
pub fn resolve_mods_dir(cfg: &AppConfig) -> Result<Utf8PathBuf> {
    Ok(config::mods_dir(cfg).ok_or_else(|| CliError::directory_unknown("mods"))?)
}

/// Refuse to continue while the game is running.
pub fn ensure_game_closed(paths: &GamePaths) -> Result<()> {
    if fd_mod_core::is_game_running(&paths.game_exe) {
        return Err(CliError::game_running(paths.game_exe.clone()).into());
    }
    Ok(())
}

/// Persist the configuration, turning failures into a diagnostic.
pub fn save_config(cfg: &AppConfig) -> Result<()> {
    Ok(config::save_config(cfg).map_err(CliError::config_save_failed)?)
}
