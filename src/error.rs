//! Per-command refusal codes and session-level failures.

use thiserror::Error;

/// Why a single command was refused. `Display` is the `reason=` code.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("bad_args")]
    BadArgs,

    #[error("unknown_command")]
    UnknownCommand,

    #[error("unknown_queue")]
    UnknownQueue,

    #[error("unknown_item")]
    UnknownItem,

    #[error("full")]
    Full,

    #[error("bad_create")]
    BadCreate,

    #[error("bad_weight")]
    BadWeight,

    #[error("bad_burst")]
    BadBurst,

    #[error("bad_quantum")]
    BadQuantum,

    #[error("invalid_steps")]
    InvalidSteps,

    #[error("no_queues")]
    NoQueues,
}

pub type Result<T> = std::result::Result<T, SessionError>;

/// Failures that end a whole session or CLI run.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cannot open script {path}: {source}")]
    Script {
        path: std::path::PathBuf,
        source: std::io::Error,
    },

    #[error("invalid argument: {message}")]
    InvalidArgument { message: String },
}

impl SessionError {
    #[must_use]
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::InvalidArgument { .. } => 2,
            _ => 1,
        }
    }
}
