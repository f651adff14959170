use thiserror::Error;

/// Errors raised by the simulation core.
#[derive(Debug, Error)]
pub enum SimError {
    /// Elapsed time that is zero, negative or not a number. The tick is
    /// dropped and state is left untouched.
    #[error("malformed tick: dt = {dt}")]
    MalformedTick { dt: f32 },
    /// Settings that cannot describe a playable arena.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// Settings JSON that failed to parse.
    #[error("settings: {0}")]
    Settings(#[from] serde_json::Error),
}
