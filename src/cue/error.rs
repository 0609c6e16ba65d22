use crate::cd::msf::MsfError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CueError {
    #[error(transparent)]
    IoError(#[from] std::io::Error),

    #[error("Unknown file type: {0}")]
    InvalidFileType(String),

    #[error("Unknown track type: {0}")]
    InvalidTrackType(String),

    #[error(transparent)]
    Msf(#[from] MsfError),

    #[error("Invalid quoted string: {0}")]
    InvalidQuotedString(String),

    #[error(transparent)]
    ParseIntError(#[from] std::num::ParseIntError),

    #[error("{0}")]
    MissingQuoteError(String),

    #[error("Line {line}: {keyword} is missing its argument")]
    MissingArgument { line: usize, keyword: String },

    #[error("Line {line}: TRACK {number} appears before any FILE")]
    TrackOutsideFile { line: usize, number: u8 },
}

pub type CueResult<T> = Result<T, CueError>;
