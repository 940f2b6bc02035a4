use crate::errors::CliError;
use crate::println_pad;
use crate::utils::{self, config};
use camino::Utf8Path;
use colored::Colorize;
use fd_mod_core::ModRegistry;
use inquire::Confirm;
use miette::Result;

pub struct MoveModArgs {
    pub name: String,
    /// 1-based position; 1 is the top of the list (highest priority).
    pub position: usize,
}

pub struct DeleteModArgs {
    pub name: String,
    pub yes: bool,
}

/// Sync the mod list with the mods folder.
pub(crate) fn refresh_registry(registry: &mut ModRegistry, mods_dir: &Utf8Path) -> Result<()> {
    let summary = registry.refresh(mods_dir).map_err(CliError::from)?;
    if !summary.is_unchanged() {
        tracing::debug!(
            "Refreshed mod list: added={:?} removed={:?}",
            summary.added,
            summary.removed
        );
    }
    tracing::info!("Refreshed!");
    Ok(())
}

pub fn list_mods() -> Result<()> {
    let mut cfg = config::load_config();
    let mods_dir = utils::resolve_mods_dir(&cfg)?;
    refresh_registry(&mut cfg.mods, &mods_dir)?;
    utils::save_config(&cfg)?;

    println!();
    println!(
        "  {} {}",
        "Mods folder:".bright_white().bold(),
        mods_dir.as_str().bright_cyan()
    );
    println!();

    if cfg.mods.is_empty() {
        println_pad!(
            "{}",
            "No mods found. Drop mod folders into the mods folder.".bright_yellow()
        );
        println!();
        return Ok(());
    }

    for (idx, entry) in cfg.mods.mods().iter().enumerate() {
        let marker = if entry.enabled {
            "[x]".bright_green()
        } else {
            "[ ]".dimmed()
        };
        let name = if entry.enabled {
            entry.name.bright_white().bold()
        } else {
            entry.name.dimmed()
        };
        println_pad!("{} {} {}", format!("{:>3}.", idx + 1).dimmed(), marker, name);
    }

    println!();
    println_pad!(
        "{}",
        "Mods higher in the list win when they provide the same file.".dimmed()
    );
    println!();
    Ok(())
}

pub fn toggle_mod(name: String, enabled: bool) -> Result<()> {
    let mut cfg = config::load_config();
    let mods_dir = utils::resolve_mods_dir(&cfg)?;
    refresh_registry(&mut cfg.mods, &mods_dir)?;

    cfg.mods
        .set_enabled(&name, enabled)
        .map_err(CliError::from)?;
    utils::save_config(&cfg)?;

    let state = if enabled {
        "enabled".bright_green()
    } else {
        "disabled".bright_yellow()
    };
    println!("{} {} {}", "✓".bright_green(), name.bright_white().bold(), state);
    Ok(())
}

pub fn move_mod(args: MoveModArgs) -> Result<()> {
    let mut cfg = config::load_config();
    let mods_dir = utils::resolve_mods_dir(&cfg)?;
    refresh_registry(&mut cfg.mods, &mods_dir)?;

    let position = args.position.checked_sub(1).ok_or(CliError::Mods(
        fd_mod_core::Error::InvalidPosition {
            position: args.position,
            len: cfg.mods.len(),
        },
    ))?;
    cfg.mods
        .move_to(&args.name, position)
        .map_err(CliError::from)?;
    utils::save_config(&cfg)?;

    println!(
        "{} {} moved to position {}",
        "✓".bright_green(),
        args.name.bright_white().bold(),
        args.position
    );
    Ok(())
}

pub fn delete_mod(args: DeleteModArgs) -> Result<()> {
    let mut cfg = config::load_config();
    let mods_dir = utils::resolve_mods_dir(&cfg)?;
    refresh_registry(&mut cfg.mods, &mods_dir)?;

    if cfg.mods.get(&args.name).is_none() {
        return Err(CliError::from(fd_mod_core::Error::ModNotFound(args.name)).into());
    }

    if !args.yes {
        let confirmed = Confirm::new(&format!(
            "Are you sure you want to delete {}? This cannot be undone.",
            args.name
        ))
        .with_default(false)
        .prompt()
        .map_err(|source| CliError::Prompt { source })?;

        if !confirmed {
            println!("{}", "Nothing deleted.".bright_yellow());
            return Ok(());
        }
    }

    if let Err(e) = fd_mod_core::delete_mod(&mut cfg.mods, &mods_dir, &args.name) {
        tracing::error!("Couldn't delete {} ({})", args.name, e);
        return Err(CliError::from(e).into());
    }
    utils::save_config(&cfg)?;

    println!(
        "{} {} deleted",
        "✓".bright_green(),
        args.name.bright_white().bold()
    );
    Ok(())
}
