use crate::errors::CliError;
use crate::utils::config::{self, AppConfig};
use camino::Utf8PathBuf;
use colored::Colorize;
use fd_overlay::utils::canonicalize_utf8;
use miette::Result;

/// Print a config path entry with status indicator
fn print_path_config(
    name: &str,
    path: Option<&Utf8PathBuf>,
    validator: impl Fn(&Utf8PathBuf) -> bool,
) {
    match path {
        Some(p) => {
            let status = if validator(p) {
                "✓".bright_green()
            } else {
                "✗".bright_red()
            };
            println!("  {} {} {}", format!("{}:", name).bright_white(), p, status);
        }
        None => {
            println!(
                "  {} {}",
                format!("{}:", name).bright_white(),
                "(not set)".bright_yellow()
            );
        }
    }
}

pub fn show_config() -> Result<()> {
    let cfg = config::load_config();
    let config_path = config::default_config_path()
        .map(|p| p.to_string())
        .unwrap_or_else(|| "Unknown".to_string());

    println!();
    println!("  {} {}", "config_file:".bright_white(), config_path);

    print_path_config("game_exe", cfg.game_exe.as_ref(), |p| {
        fd_mod_core::resolve_asset_tree(p).is_ok()
    });
    print_path_config("mods_dir", config::mods_dir(&cfg).as_ref(), |p| {
        p.as_std_path().is_dir()
    });
    print_path_config("data_dir", config::data_dir(&cfg).as_ref(), |p| {
        p.as_std_path().is_dir()
    });

    println!();
    Ok(())
}

pub fn set_game_path(path: String) -> Result<()> {
    let path = Utf8PathBuf::from(&path);
    // Store the canonical spelling; a missing path is reported just below.
    let path = canonicalize_utf8(&path).unwrap_or(path);
    let asset_root = match fd_mod_core::resolve_asset_tree(&path) {
        Ok(asset_root) => asset_root,
        Err(e) => {
            eprintln!(
                "  {}",
                "The path must point to the game executable.".bright_yellow()
            );
            eprintln!(
                "  {}",
                "Example: C:\\Games\\Friday Night Funkin\\Funkin.exe".bright_yellow()
            );
            eprintln!();
            eprintln!("  {} {}", "•".bright_red(), e);

            return Err(CliError::invalid_game_path(path).into());
        }
    };

    let mut cfg = config::load_config();
    cfg.game_exe = Some(path.clone());
    crate::utils::save_config(&cfg)?;
    tracing::info!("Current Game Path set as {}", path);

    println!("{}", "✓ Game path set successfully!".bright_green().bold());
    println!();
    println!(
        "  {} {}",
        "Path:".bright_white().bold(),
        path.as_str().bright_green()
    );
    println!(
        "  {} {}",
        "Assets:".bright_white().bold(),
        asset_root.as_str().bright_green()
    );

    Ok(())
}

pub fn set_mods_dir(path: String) -> Result<()> {
    let path = Utf8PathBuf::from(&path);
    let path = canonicalize_utf8(&path).unwrap_or(path);
    let mut cfg = config::load_config();
    cfg.mods_dir = Some(path.clone());
    crate::utils::save_config(&cfg)?;

    println!("{}", "✓ Mods folder set successfully!".bright_green().bold());
    println!();
    println!(
        "  {} {}",
        "Path:".bright_white().bold(),
        path.as_str().bright_green()
    );
    Ok(())
}

pub fn reset_config() -> Result<()> {
    let config_path = config::default_config_path()
        .map(|p| p.to_string())
        .unwrap_or_else(|| "Unknown".to_string());

    // The mod list is derived from the mods folder, so keep its order and toggles.
    let mods = config::load_config().mods;
    let default_cfg = AppConfig {
        mods,
        ..AppConfig::default()
    };
    crate::utils::save_config(&default_cfg)?;

    println!(
        "{}",
        "✓ Configuration reset to defaults".bright_green().bold()
    );
    println!();
    println!("  {} {}", "Config file:".bright_white().bold(), config_path);
    println!();
    println!(
        "  {}",
        "Run 'filedaddy config set-game-path <path>' to point at your game".bright_cyan()
    );

    Ok(())
}
