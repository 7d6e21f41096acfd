use std::path::PathBuf;

/// Core error type for the bot.
///
/// Adapter crates map their specific errors into this type so the scan loop
/// can decide consistently between "abort this cycle" and "fatal at startup".
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("failed to persist {}: {source}", path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt ledger {} at line {line}: {content:?}", path.display())]
    CorruptLedger {
        path: PathBuf,
        line: usize,
        content: String,
    },

    #[error("messaging error: {0}")]
    Messaging(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn persistence(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Persistence {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
