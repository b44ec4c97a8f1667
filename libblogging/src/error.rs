//! Error types for the blogging app
//!
//! Two families reach the screens: `ValidationError` is raised locally and
//! synchronously before any backend call, `BackendError` comes back from an
//! awaited backend operation. Both are rendered into a screen's error effect
//! through their `Display` text.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, BlogError>;

/// Result type returned by every `Backend` operation
pub type BackendResult<T> = std::result::Result<T, BackendError>;

#[derive(Error, Debug)]
pub enum BlogError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("Invalid input: {0}")]
    Validation(#[from] ValidationError),
}

impl BlogError {
    /// Returns the appropriate exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            BlogError::Validation(_) => 3,
            BlogError::Backend(BackendError::InvalidCredentials) => 2,
            BlogError::Backend(_) => 1,
            BlogError::Config(_) => 1,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid duration for {field}: {value}")]
    InvalidDuration { field: String, value: String },
}

/// Blank or inconsistent form input, detected without contacting the backend
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("credentials required")]
    CredentialsRequired,

    #[error("comment cannot be empty")]
    EmptyComment,

    #[error("title and content cannot be empty")]
    EmptyTitleOrContent,

    #[error("name, email and password are required")]
    IncompleteRegistration,

    #[error("passwords do not match")]
    PasswordMismatch,
}

/// A backend operation failed or was refused
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("request rejected: {0}")]
    Rejected(String),

    /// The call or its task died before producing a result
    #[error("operation aborted: {0}")]
    Aborted(String),
}

impl BackendError {
    /// Whether retrying the same request may succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, BackendError::Network(_))
    }
}
