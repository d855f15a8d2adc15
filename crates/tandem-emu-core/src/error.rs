use std::io;

use thiserror::Error;

/// Reasons a cartridge cannot be loaded. Nothing is partially loaded when one
/// of these is returned.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error("malformed manifest: {0}")]
    Manifest(#[from] toml::de::Error),

    #[error("required resource '{name}' is missing")]
    RequiredResourceMissing { name: String },

    #[error("failed to read '{name}': {source}")]
    Io {
        name: String,
        #[source]
        source: io::Error,
    },
}

#[derive(Error, Debug)]
pub enum SaveError {
    #[error("'{name}' could not be opened for writing")]
    Unavailable { name: String },

    #[error("failed to write '{name}': {source}")]
    Io {
        name: String,
        #[source]
        source: io::Error,
    },
}

/// Reasons a save state cannot be restored. The machine is left untouched
/// when one of these is returned.
#[derive(Error, Debug)]
pub enum StateError {
    #[error("not a save state")]
    BadMagic,

    #[error("unsupported save state version {found}")]
    Version { found: u32 },

    #[error("save state was taken from a different cartridge")]
    Mismatch,

    #[error("save state is {found} bytes, expected {expected}")]
    Size { expected: usize, found: usize },

    #[error("save state ended early")]
    Truncated,

    #[error("save state has {remaining} unread bytes")]
    TrailingData { remaining: usize },
}
