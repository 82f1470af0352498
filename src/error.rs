//! Error types for the analysis engine

use thiserror::Error;

use crate::analysis::pipeline::Step;

/// Errors that can occur while configuring or running an analysis
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("frame size {0} is not a power of two")]
    FrameSizeNotPowerOfTwo(usize),

    #[error("hop size must be non-zero")]
    ZeroHopSize,

    #[error("hop size {hop_size} exceeds frame size {frame_size}")]
    HopExceedsFrame { hop_size: usize, frame_size: usize },

    #[error("band '{id}': low cutoff {low_hz} Hz must be below high cutoff {high_hz} Hz")]
    InvalidBandRange { id: String, low_hz: f32, high_hz: f32 },

    #[error("band '{0}' cannot use the structure category")]
    StructureBand(String),

    #[error("duplicate band id '{0}'")]
    DuplicateBand(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("failed to decode audio: {0}")]
    Decode(String),

    #[error("{stage} stage ran without {missing}")]
    MissingStageOutput { stage: Step, missing: &'static str },

    #[error("invalid config file: {0}")]
    Config(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<symphonia::core::errors::Error> for AnalysisError {
    fn from(err: symphonia::core::errors::Error) -> Self {
        match err {
            symphonia::core::errors::Error::IoError(e) => AnalysisError::Io(e),
            other => AnalysisError::Decode(other.to_string()),
        }
    }
}
