use camino::Utf8PathBuf;
use miette::Diagnostic;
use thiserror::Error;

#[derive(Error, Debug, Diagnostic)]
pub enum CliError {
    #[error("Game path is not set")]
    #[diagnostic(
        code(config::game_path_missing),
        help("Run 'filedaddy config set-game-path <path to the game executable>'")
    )]
    GamePathNotSet,

    #[error("Invalid game path: {path}")]
    #[diagnostic(
        code(config::invalid_game_path),
        help("The path must point to the game executable, next to its assets folder")
    )]
    InvalidGamePath { path: Utf8PathBuf },

    #[error("Could not determine the {what} directory")]
    #[diagnostic(
        code(config::directory_unknown),
        help("Set it explicitly in config.toml")
    )]
    DirectoryUnknown { what: &'static str },

    #[error("The game is running: {path}")]
    #[diagnostic(
        code(game::running),
        help("Close the game before building or restoring; it keeps its asset files open")
    )]
    GameRunning { path: Utf8PathBuf },

    #[error("Failed to save config")]
    #[diagnostic(
        code(config::save_failed),
        help("Check file permissions next to the executable")
    )]
    ConfigSaveFailed {
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    #[diagnostic(code(mods::error))]
    Mods(#[from] fd_mod_core::Error),

    #[error("The build was stopped to keep the game files restorable")]
    #[diagnostic(
        code(build::aborted),
        help("Files applied before the stop were put back. Check free space and permissions of the data directory, then build again")
    )]
    BuildAborted {
        #[source]
        source: fd_overlay::Error,
    },

    #[error("The game's asset folder is missing")]
    #[diagnostic(
        code(build::asset_tree_missing),
        help("Check the game path with 'filedaddy config show'")
    )]
    AssetTreeMissing {
        #[source]
        source: fd_overlay::Error,
    },

    #[error("The snapshot data for this game cannot be used")]
    #[diagnostic(
        code(build::invalid_snapshot),
        help("It was written by another version or for another folder. Move it out of the data directory and verify the game files")
    )]
    InvalidSnapshot {
        #[source]
        source: fd_overlay::Error,
    },

    #[error(transparent)]
    #[diagnostic(code(build::error))]
    Build(fd_overlay::Error),

    #[error("Interactive prompt failed")]
    #[diagnostic(code(io::prompt_failed))]
    Prompt {
        #[source]
        source: inquire::InquireError,
    },
}

impl From<fd_overlay::Error> for CliError {
    fn from(e: fd_overlay::Error) -> Self {
        match e {
            fd_overlay::Error::StoreWrite { .. } => Self::BuildAborted { source: e },
            fd_overlay::Error::InvalidAssetTree(_) => Self::AssetTreeMissing { source: e },
            fd_overlay::Error::InvalidStore(_) => Self::InvalidSnapshot { source: e },
            e => Self::Build(e),
        }
    }
}

impl CliError {
    pub fn invalid_game_path(path: Utf8PathBuf) -> Self {
        Self::InvalidGamePath { path }
    }

    pub fn directory_unknown(what: &'static str) -> Self {
        Self::DirectoryUnknown { what }
    }

    pub fn game_running(path: Utf8PathBuf) -> Self {
        Self::GameRunning { path }
    }

    pub fn config_save_failed(source: std::io::Error) -> Self {
        Self::ConfigSaveFailed { source }
    }
}
