use crate::commands::mods::refresh_registry;
use crate::errors::CliError;
use crate::println_pad;
use crate::utils::{self, config};
use colored::Colorize;
use fd_overlay::{
    BuildStatus, EnabledMod, OverlayBuilder, OverlayProgress, OverlayStage, RestoreReport,
    SnapshotStore,
};
use miette::Result;

fn report_progress(progress: OverlayProgress) {
    match progress.stage {
        OverlayStage::Restoring => {
            println!("{}", "Restoring the original game files...".bright_cyan());
        }
        OverlayStage::Planning => {
            println!("{}", "Collecting files from enabled mods...".bright_cyan());
        }
        OverlayStage::Applying => {
            if let Some(file) = progress.current_file {
                tracing::debug!("[{}/{}] {}", progress.current, progress.total, file);
            }
        }
        OverlayStage::Complete => {}
    }
}

fn print_restore_report(report: &RestoreReport) {
    println_pad!(
        "{} {}",
        "Restored:".bright_white(),
        report.restored.len()
    );
    println_pad!("{} {}", "Removed:".bright_white(), report.deleted.len());
    if !report.failures.is_empty() {
        println_pad!(
            "{} {}",
            "Could not restore:".bright_red(),
            report.failures.len()
        );
        for failure in &report.failures {
            println_pad!(
                "  {} {} ({})",
                "•".bright_red(),
                failure.relative_path,
                failure.message
            );
        }
    }
}

pub fn build_loadout() -> Result<()> {
    let mut cfg = config::load_config();
    let paths = utils::resolve_game_paths(&cfg)?;
    utils::ensure_game_closed(&paths)?;

    let mods_dir = utils::resolve_mods_dir(&cfg)?;
    refresh_registry(&mut cfg.mods, &mods_dir)?;
    utils::save_config(&cfg)?;

    let enabled: Vec<EnabledMod> = cfg
        .mods
        .enabled_mod_dirs(&mods_dir)
        .into_iter()
        .map(EnabledMod::from_dir)
        .collect();

    println!(
        "{} {} mod(s) into {}",
        "Building".bright_white().bold(),
        enabled.len(),
        paths.asset_root.as_str().bright_cyan()
    );

    let mut builder = OverlayBuilder::new(paths.asset_root.clone(), paths.data_dir.clone())
        .with_progress(report_progress);
    builder.set_enabled_mods(enabled);

    let result = builder.build().map_err(CliError::from)?;

    println!();
    match result.status {
        BuildStatus::Clean => println!("{}", "✓ Build complete".bright_green().bold()),
        BuildStatus::Partial => println!(
            "{}",
            "! Build finished with problems".bright_yellow().bold()
        ),
    }
    println!();
    println_pad!(
        "{} {}",
        "Files applied:".bright_white(),
        result.applied.len()
    );
    println_pad!(
        "{} {:.2}s",
        "Time:".bright_white(),
        result.build_time.as_secs_f64()
    );

    if !result.conflicts.is_empty() {
        println_pad!(
            "{} {}",
            "Conflicts:".bright_white(),
            result.conflicts.len()
        );
        for conflict in &result.conflicts {
            tracing::debug!(
                "{} provided by {:?}, {} wins",
                conflict.relative_path,
                conflict.contributing_mods,
                conflict.winner
            );
        }
    }

    if !result.restore.failures.is_empty() {
        println_pad!(
            "{} {}",
            "Could not restore:".bright_red(),
            result.restore.failures.len()
        );
        for failure in &result.restore.failures {
            println_pad!(
                "  {} {} ({})",
                "•".bright_red(),
                failure.relative_path,
                failure.message
            );
        }
    }

    if !result.failures.is_empty() {
        println_pad!(
            "{} {}",
            "Failed files:".bright_red(),
            result.failures.len()
        );
        for failure in &result.failures {
            println_pad!(
                "  {} {} [{:?}] ({})",
                "•".bright_red(),
                failure.relative_path,
                failure.kind,
                failure.message
            );
        }
    }

    println!();
    Ok(())
}

pub fn restart_game() -> Result<()> {
    let cfg = config::load_config();
    let paths = utils::resolve_game_paths(&cfg)?;
    utils::ensure_game_closed(&paths)?;

    let builder = OverlayBuilder::new(paths.asset_root.clone(), paths.data_dir.clone())
        .with_progress(report_progress);
    let report = builder.restart().map_err(CliError::from)?;

    println!();
    if report.is_clean() {
        println!("{}", "✓ Game files restored".bright_green().bold());
    } else {
        println!(
            "{}",
            "! Some files could not be restored; run restart again once they are free"
                .bright_yellow()
                .bold()
        );
    }
    println!();
    print_restore_report(&report);
    println!();
    Ok(())
}

pub fn show_status() -> Result<()> {
    let cfg = config::load_config();
    let paths = utils::resolve_game_paths(&cfg)?;
    let store = SnapshotStore::open(&paths.data_dir, &paths.asset_root).map_err(CliError::from)?;

    println!();
    println!(
        "  {} {}",
        "Assets:".bright_white().bold(),
        paths.asset_root.as_str().bright_cyan()
    );
    println!(
        "  {} {}",
        "Snapshot:".bright_white().bold(),
        store.store_dir().as_str()
    );
    println!();

    if store.is_empty() {
        println_pad!("{}", "The game files are unmodified.".bright_green());
    } else {
        println_pad!(
            "{} {}",
            "Modified files:".bright_white(),
            store.len()
        );
        if store.loadout().is_empty() {
            println_pad!(
                "{}",
                "Left over from an unfinished build or restore; run restart or build again.".bright_yellow()
            );
        } else {
            println_pad!("{}", "Loadout:".bright_white());
            for name in store.loadout() {
                println_pad!("  {} {}", "•".bright_green(), name);
            }
        }
    }
    println!();
    Ok(())
}
