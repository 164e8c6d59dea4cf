use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum JpwError {
    #[error("Cannot read '{}': {source}", path.display())]
    InputUnavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Cannot decode '{}': not UTF-8 or UTF-16 text", path.display())]
    Decode { path: PathBuf },

    #[error("Invalid metadata: {0}")]
    MetadataError(String),

    #[error("Invalid decoration vocabulary: {0}")]
    VocabularyError(String),

    #[error("Invalid MIDI input: {0}")]
    MidiError(String),

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, JpwError>;
