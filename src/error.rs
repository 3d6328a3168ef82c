use thiserror::Error;

use crate::webhook::{Level, Record};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store file error: {0}")]
    Io(#[from] std::io::Error),
    #[error("store file is not valid JSON: {0}")]
    Encoding(#[from] serde_json::Error),
    #[error("store lock was poisoned by a panicking command")]
    Poisoned,
}

#[derive(Debug, Error)]
pub enum CommandError {
    /// Soft failure. The reply goes back to chat and nothing was written.
    #[error("{reply}")]
    Rejected {
        reply: String,
        record: Option<Box<Record>>,
    },

    /// The host did not supply who is calling. Logged locally only.
    #[error("missing '{0}' argument")]
    MissingArgument(&'static str),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("{0}")]
    Internal(String),
}

impl CommandError {
    pub fn reject(reply: impl Into<String>) -> Self {
        CommandError::Rejected {
            reply: reply.into(),
            record: None,
        }
    }

    /// Attach a webhook record to a rejection. Only meaningful on `Rejected`.
    pub fn logged(self, level: Level, title: impl Into<String>, description: impl Into<String>) -> Self {
        match self {
            CommandError::Rejected { reply, .. } => CommandError::Rejected {
                reply,
                record: Some(Box::new(Record::new(level, title, description))),
            },
            other => other,
        }
    }

    pub fn warned(self, title: impl Into<String>, description: impl Into<String>) -> Self {
        self.logged(Level::Warning, title, description)
    }
}
