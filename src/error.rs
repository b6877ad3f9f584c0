use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScgError {
    #[error("Config error: {0}")]
    Config(String),
    #[error("Pattern error: {message}")]
    Pattern { message: String },
    #[error("Construction '{cxn}' is malformed: {message}")]
    Definition { cxn: String, message: String },
    #[error("Schema error: {0}")]
    Schema(String),
    #[error("Unknown construction: {0}")]
    UnknownConstruction(String),
    #[error("Unknown node: {0}")]
    UnknownNode(u64),
    #[error("Knowledge base error: {0}")]
    Knowledge(String),
    #[error("Runtime error: {0}")]
    Runtime(String),
    #[error("Internal invariant violated: {0}")]
    Invariant(String),
    #[error("Lock poisoned: {0}")]
    Lock(String),
}

pub type Result<T> = std::result::Result<T, ScgError>;

impl ScgError {
    pub(crate) fn pattern(message: impl Into<String>) -> Self {
        Self::Pattern { message: message.into() }
    }
    // Pattern errors raised while compiling a construction are reported against it.
    pub(crate) fn in_construction(self, cxn: &str) -> Self {
        match self {
            Self::Pattern { message } => Self::Definition { cxn: cxn.to_string(), message },
            other => other,
        }
    }
}

// Helper conversions
impl From<config::ConfigError> for ScgError {
    fn from(e: config::ConfigError) -> Self { Self::Config(e.to_string()) }
}

impl<T> From<std::sync::PoisonError<T>> for ScgError {
    fn from(e: std::sync::PoisonError<T>) -> Self { Self::Lock(e.to_string()) }
}
