//! Error types for the streaming core.
//!
//! Precondition violations are errors returned to the caller. Buffer exhaustion has its
//! own type because callers are expected to retry it. Stale requests are not errors at all;
//! they travel back to the consumer as ignored requests.

use thiserror::Error;

/// Misuse of a voxel chunk by its caller.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChunkError {
    #[error("block coordinate out of range: {x},{y},{z}")]
    BlockOutOfBounds { x: i32, y: i32, z: i32 },

    #[error("height field for column {cx},{cz} has not been generated")]
    HeightFieldNotGenerated { cx: i32, cz: i32 },
}

/// Every mesh buffer is checked out. Retry once the consumer returns one.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("no free mesh buffer")]
pub struct BufferUnavailable;

#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("chunk loader thread is already running")]
    AlreadyRunning,

    #[error("failed to spawn chunk loader thread: {0}")]
    Spawn(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("failed to read settings: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse settings: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid settings: {0}")]
    Invalid(String),
}
