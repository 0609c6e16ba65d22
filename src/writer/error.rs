use thiserror::Error;

#[derive(Debug, Error)]
pub enum WriteError {
    #[error(transparent)]
    IoError(#[from] std::io::Error),

    #[error("The cue sheet has no destination path")]
    MissingDestination,

    #[error("Character {character:?} cannot be encoded as {encoding}")]
    Unencodable {
        character: char,
        encoding: &'static str,
    },

    #[error("Unknown text encoding: {0}")]
    UnknownEncoding(String),
}

pub type WriteResult<T> = Result<T, WriteError>;
