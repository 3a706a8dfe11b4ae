use dragnet_journal::JournalError;
use thiserror::Error;

/// Failures that abort the whole `execute` call. Everything here points
/// at a caller or environment problem that retrying tasks cannot fix.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("duplicate task keys: {0:?}")]
    DuplicateKeys(Vec<String>),
    #[error("invalid task key: {0}")]
    InvalidKey(String),
    #[error(transparent)]
    Journal(#[from] JournalError),
    #[error("missing required param '{param}' for task {key}")]
    MissingParam { key: String, param: &'static str },
    #[error("scratch file error at {path}: {detail}")]
    Scratch { path: String, detail: String },
    #[error("failed to build http client: {0}")]
    HttpClient(#[source] reqwest::Error),
    #[error("engine invariant violated: {0}")]
    InvariantViolation(String),
}

/// Failures raised by a single executor run. Every variant except
/// `Fatal` is captured into the task's journal entry as
/// `ERROR <kind>::<message>` and ends that task's pipeline only.
#[derive(Debug, Error)]
pub enum StepError {
    /// Domain-level rejection signalled by executor code.
    #[error("{0}")]
    Runtime(String),
    /// Transport-level failure from the HTTP client.
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    /// The per-task pipeline deadline expired.
    #[error("task pipeline deadline expired")]
    Timeout,
    /// The task was cancelled while an executor was in flight.
    #[error("task was cancelled")]
    Cancelled,
    /// Escapes the run instead of being journaled.
    #[error(transparent)]
    Fatal(#[from] EngineError),
}

impl StepError {
    /// The kind tag recorded in the journal's status string.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Runtime(_) => "RuntimeError",
            Self::Timeout => "TimeoutError",
            Self::Cancelled => "CancelledError",
            Self::Fatal(_) => "FatalError",
            Self::Http(error) => {
                if error.is_timeout() {
                    "TimeoutError"
                } else if error.is_connect() {
                    "ConnectError"
                } else if error.is_body() || error.is_decode() {
                    "PayloadError"
                } else if error.is_request() {
                    "RequestError"
                } else {
                    "HttpError"
                }
            }
        }
    }
}
