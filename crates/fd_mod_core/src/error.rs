use camino::Utf8PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Mod not found: {0}")]
    ModNotFound(String),

    #[error("Invalid position {position} (the list has {len} mods)")]
    InvalidPosition { position: usize, len: usize },

    #[error("Invalid game path: {0}")]
    InvalidGamePath(Utf8PathBuf),

    #[error("No assets folder next to {0}")]
    AssetTreeNotFound(Utf8PathBuf),
}
