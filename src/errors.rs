use thiserror::Error;

#[derive(Error, Debug)]
pub enum AutofillError {
    #[error("Browser launch failed: {0}")]
    LaunchFailed(String),

    #[error("Browser not launched")]
    BrowserNotLaunched,

    #[error("Tab creation failed: {0}")]
    TabCreationFailed(String),

    #[error("Navigation failed: {0}")]
    NavigationFailed(String),

    #[error("JavaScript execution failed: {0}")]
    JavaScriptFailed(String),

    #[error("JavaScript execution timeout")]
    JavaScriptTimeout,

    #[error("Invalid selector: {0}")]
    InvalidSelector(String),

    #[error("Element is detached or unknown: {0}")]
    StaleElement(u64),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("Value store error: {0}")]
    ValueStore(String),

    #[error("Missing precondition: required value '{0}' is absent")]
    MissingPrecondition(String),

    #[error("An automation run is already in progress")]
    RunInProgress,

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AutofillError>;

impl AutofillError {
    pub fn from_any_error<E: std::fmt::Display>(err: E) -> Self {
        AutofillError::JavaScriptFailed(err.to_string())
    }

    /// Errors that end a run before any field is attempted.
    pub fn is_run_fatal(&self) -> bool {
        matches!(
            self,
            AutofillError::MissingPrecondition(_) | AutofillError::RunInProgress
        )
    }
}
