use std::error::Error as StdError;

/// Common error type for `capitol_core`.
///
/// Run-fatal conditions (missing API key, auth failure, missing table,
/// invalid configuration) are dedicated variants so the run driver can unwind
/// immediately. Item-level outcomes (a rejected record, a skipped duplicate)
/// are never expressed through this type; they are outcome tags on the
/// pipeline stages.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("Congress.gov API key not found in environment")]
    MissingApiKey,

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("table missing: {0}")]
    TableMissing(String),

    #[error("run cancelled")]
    Cancelled,

    #[error("backend error: {context}")]
    Backend {
        context: String,
        #[source]
        source: Box<dyn StdError + Send + Sync + 'static>,
    },

    #[error("backend error: {0}")]
    BackendMessage(String),
}

impl Error {
    pub fn backend(
        context: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self::Backend {
            context: context.into(),
            source: Box::new(source),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
