use clap::builder::{styling::AnsiColor, Styles};
use clap::ColorChoice;
use clap::{CommandFactory, FromArgMatches, Parser, Subcommand};
use commands::{
    build_loadout, delete_mod, list_mods, move_mod, reset_config, restart_game, set_game_path,
    set_mods_dir, show_config, show_status, toggle_mod, DeleteModArgs, MoveModArgs,
};
use miette::Result;
use tracing_subscriber::EnvFilter;

mod commands;
mod errors;
mod utils;

#[derive(Parser, Debug)]
#[command(version, about = "Mod manager for Friday Night Funkin'", long_about = None)]
struct Args {
    /// Show debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show or change where the game and mods live
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// List installed mods, highest priority first
    List,
    /// Enable a mod for the next build
    Enable {
        /// The mod's folder name
        name: String,
    },
    /// Disable a mod for the next build
    Disable {
        /// The mod's folder name
        name: String,
    },
    /// Move a mod to a position in the list (1 is the highest priority)
    Move {
        /// The mod's folder name
        name: String,
        /// The new position, starting at 1
        position: usize,
    },
    /// Delete a mod folder from disk
    Delete {
        /// The mod's folder name
        name: String,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// Restore the game files, then apply every enabled mod
    Build,
    /// Restore the game files to their unmodded state
    Restart,
    /// Show what the current build changed
    Status,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the current configuration
    Show,
    /// Point at the game executable
    SetGamePath {
        /// Path to the game executable
        path: String,
    },
    /// Use a different mods folder
    SetModsDir {
        /// Folder containing one subfolder per mod
        path: String,
    },
    /// Reset paths to their defaults, keeping the mod list
    Reset,
}

fn parse_args() -> Args {
    // Configure colored/styled help output
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default().bold())
        .usage(AnsiColor::Green.on_default().bold())
        .literal(AnsiColor::Cyan.on_default())
        .placeholder(AnsiColor::Blue.on_default());

    let matches = Args::command()
        .styles(styles)
        .color(ColorChoice::Auto)
        .get_matches();

    Args::from_arg_matches(&matches).unwrap_or_else(|e| e.exit())
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let args = parse_args();
    init_logging(args.verbose);

    match args.command {
        Commands::Config { action } => match action {
            ConfigAction::Show => show_config(),
            ConfigAction::SetGamePath { path } => set_game_path(path),
            ConfigAction::SetModsDir { path } => set_mods_dir(path),
            ConfigAction::Reset => reset_config(),
        },
        Commands::List => list_mods(),
        Commands::Enable { name } => toggle_mod(name, true),
        Commands::Disable { name } => toggle_mod(name, false),
        Commands::Move { name, position } => move_mod(MoveModArgs { name, position }),
        Commands::Delete { name, yes } => delete_mod(DeleteModArgs { name, yes }),
        Commands::Build => build_loadout(),
        Commands::Restart => restart_game(),
        Commands::Status => show_status(),
    }
}
