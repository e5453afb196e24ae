use std::path::PathBuf;

/// Core error type for the whisper bot.
///
/// Adapter crates should map their specific errors into this type. Nothing in the
/// whisper flow is fatal: these surface either at startup (config) or in logs.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("persistence error: {path}: {reason}")]
    Persistence { path: PathBuf, reason: String },

    #[error("external error: {0}")]
    External(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Recoverable validation outcomes of composing a whisper.
///
/// None of these ever creates a pending whisper; each maps to a prompt shown
/// back to the sender as an inline result.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum WhisperError {
    #[error("no recipient found in the query")]
    ExtractionAmbiguous,

    #[error("message is empty")]
    MessageEmpty,

    #[error("message is {len} characters, limit is {max}")]
    MessageTooLong { len: usize, max: usize },
}

/// Failure modes of an entity lookup. All of them trigger the synthesized
/// recipient fallback; none is shown to the user.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum LookupError {
    #[error("entity not found")]
    NotFound,

    #[error("invalid reference format")]
    InvalidFormat,

    #[error("rate limited")]
    RateLimited,

    #[error("lookup timed out")]
    Timeout,

    #[error("lookup unavailable: {0}")]
    Unavailable(String),
}
