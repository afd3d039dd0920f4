use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum ArgoError {
    #[error("invalid float identifier: {0}")]
    InvalidWmo(String),

    #[error("invalid region: {0}")]
    InvalidRegion(String),

    #[error("invalid time range: {0}")]
    InvalidTimeRange(String),

    #[error("invalid chunking config: {0}")]
    InvalidChunkingConfig(String),

    #[error("invalid parallel method: {0}")]
    InvalidParallelMethod(String),

    #[error("no cache entry for {0}")]
    CacheFileNotFound(String),

    #[error("file system has no cache")]
    FileSystemHasNoCache,

    #[error("request to {uri} failed: {message}")]
    RemoteHttp { uri: String, message: String },

    #[error("{uri} returned status {status}: {message}")]
    RemoteStatus {
        uri: String,
        status: u16,
        message: String,
    },

    #[error("failed to decode payload from {uri}: {message}")]
    Decode { uri: String, message: String },

    #[error("failed to merge chunk results: {0}")]
    Merge(String),

    #[error("failed to read options file at {0}")]
    OptionsRead(PathBuf),

    #[error("failed to parse options: {0}")]
    OptionsParse(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),
}
