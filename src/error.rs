use thiserror::Error;

use crate::settings::SettingsError;

/// errors surfaced to the caller before (or while starting) a run.
/// nothing in here is produced mid-run: degenerate proposals and stalls are
/// handled inside the engine.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("invalid raster dimensions {width}x{height}: expected width*height*4 bytes, got {len}")]
    InvalidDimensions { width: u32, height: u32, len: usize },

    #[error("invalid settings: {0}")]
    Settings(#[from] SettingsError),

    #[error("failed to spawn engine thread: {0}")]
    Spawn(#[source] std::io::Error),
}
