//! Core shared logic for FileDaddy mod management.
//!
//! This crate provides the pieces the command-line front end needs around the
//! build engine: the ordered mod registry and game path handling.

mod error;
mod game_path;
mod registry;

pub use error::{Error, Result};
pub use game_path::{is_game_running, is_valid_game_path, resolve_asset_tree};
pub use registry::{delete_mod, ModEntry, ModRegistry, RefreshSummary};
