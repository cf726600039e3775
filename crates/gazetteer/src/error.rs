use gazetteer_store::StoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GazetteerError {
    #[error("Language code error: {0}")]
    Language(#[from] crate::language::LanguageError),
    #[error("Store request '{operation}' failed for '{input}': {source}")]
    Store {
        operation: &'static str,
        input: String,
        #[source]
        source: StoreError,
    },
    #[error("DataFrame error: {0}")]
    DataFrame(#[from] polars::prelude::PolarsError),
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("Init Logging error: {0}")]
    InitLoggingError(#[from] tracing_subscriber::filter::ParseError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl GazetteerError {
    pub fn store(operation: &'static str, input: impl Into<String>, source: StoreError) -> Self {
        Self::Store {
            operation,
            input: input.into(),
            source,
        }
    }

    /// Whether the data store reported itself unreachable.
    pub fn is_connection_failure(&self) -> bool {
        matches!(
            self,
            Self::Store {
                source: StoreError::Connection(_),
                ..
            }
        )
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            Self::Store {
                source: StoreError::Cancelled,
                ..
            }
        )
    }
}

pub type Result<T> = std::result::Result<T, GazetteerError>;
