use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error(transparent)]
    IoError(#[from] std::io::Error),

    #[error(transparent)]
    BinRWError(#[from] binrw::Error),

    #[error("Invalid {format} data: {reason}")]
    InvalidFormat { format: &'static str, reason: String },

    #[error("No track types were supplied for the binary image")]
    MissingTrackTypes,

    #[error("Track types with different sector sizes supplied: {0:?}")]
    MixedSectorSizes(Vec<usize>),

    #[error("Probe tool {0} could not be started")]
    ToolUnavailable(String),

    #[error("Probe tool did not finish within {0:?}")]
    ProbeTimedOut(Duration),
}

impl DecodeError {
    pub fn invalid(format: &'static str, reason: impl Into<String>) -> Self {
        DecodeError::InvalidFormat {
            format,
            reason: reason.into(),
        }
    }

    /// The data carried the decoder's signature but failed structural validation.
    pub fn is_format_invalid(&self) -> bool {
        matches!(
            self,
            DecodeError::InvalidFormat { .. } | DecodeError::BinRWError(_)
        )
    }
}

pub type DecodeResult<T> = Result<T, DecodeError>;
