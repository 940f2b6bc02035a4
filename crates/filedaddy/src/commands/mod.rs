mod build;
mod config;
mod mods;

pub use build::{build_loadout, restart_game, show_status};
pub use config::{reset_config, set_game_path, set_mods_dir, show_config};
pub use mods::{delete_mod, list_mods, move_mod, toggle_mod, DeleteModArgs, MoveModArgs};
