use thiserror::Error;

#[derive(Error, Debug)]
pub enum GdstoreError {
    #[error("Config error: {0}")]
    Config(String),
    #[error("Authentication error: {0}")]
    Auth(String),
    #[error("Transport error (status {status:?}): {message}")]
    Transport { status: Option<u16>, message: String },
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Decode error for {tag}: {message}")]
    Decode { tag: &'static str, message: String },
    #[error("Invalid query: {0}")]
    InvalidQuery(String),
    #[error("Store is closed")]
    Closed,
    #[error("Internal invariant violated: {0}")]
    Invariant(String),
    #[error("Lock poisoned: {0}")]
    Lock(String),
}

pub type Result<T> = std::result::Result<T, GdstoreError>;

// Helper conversions
impl From<::config::ConfigError> for GdstoreError {
    fn from(e: ::config::ConfigError) -> Self { Self::Config(e.to_string()) }
}

impl<T> From<std::sync::PoisonError<T>> for GdstoreError {
    fn from(e: std::sync::PoisonError<T>) -> Self { Self::Lock(e.to_string()) }
}
