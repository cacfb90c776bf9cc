use std::io;
use std::path::PathBuf;

/// Failures at the hook boundaries.
///
/// None of these ever change the verdict: the binary logs them and allows.
#[derive(Debug, thiserror::Error)]
pub enum HookError {
    #[error("failed to read hook input from stdin: {0}")]
    ReadInput(#[source] io::Error),

    #[error("hook input is not valid JSON: {0}")]
    ParseInput(#[source] serde_json::Error),

    #[error("failed to open transcript {}: {source}", path.display())]
    OpenTranscript {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to read transcript {}: {source}", path.display())]
    ReadTranscript {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to read config {}: {source}", path.display())]
    ReadConfig {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid config {}: {source}", path.display())]
    ParseConfig {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid config {}: {reason}", path.display())]
    InvalidConfig { path: PathBuf, reason: String },

    #[error("failed to write hook output: {0}")]
    WriteOutput(#[source] io::Error),

    #[error("failed to encode hook output: {0}")]
    EncodeOutput(#[source] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, HookError>;
