//! Error types for the batch pipeline.
//!
//! [`TaskError`] is one failed attempt at one task and never escapes the
//! executor; it is folded into a failed `TaskResult`. [`PipelineError`]
//! aborts a whole batch.

use clipcart_core::retry;
use clipcart_core::types::Credits;

/// Failure reported by an external collaborator.
///
/// Collaborators come from several crates with unrelated error types, so
/// only the rendered message is kept, plus a flag for failures the
/// collaborator knows can never succeed on another attempt. Everything
/// else is classified from the message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ServiceError {
    pub message: String,
    pub permanent: bool,
}

impl ServiceError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            permanent: false,
        }
    }

    /// A failure that retrying cannot fix, whatever its message says.
    pub fn permanent(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            permanent: true,
        }
    }

    /// Render an error together with its source chain, so causes such
    /// as "operation timed out" remain visible.
    pub fn from_error(err: &(dyn std::error::Error + 'static)) -> Self {
        let mut message = err.to_string();
        let mut source = err.source();
        while let Some(cause) = source {
            let text = cause.to_string();
            if !message.contains(&text) {
                message.push_str(": ");
                message.push_str(&text);
            }
            source = cause.source();
        }
        Self::new(message)
    }

    /// Same as [`ServiceError::from_error`], flagged permanent.
    pub fn permanent_from_error(err: &(dyn std::error::Error + 'static)) -> Self {
        Self {
            permanent: true,
            ..Self::from_error(err)
        }
    }
}

/// One failed attempt at a task.
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    #[error("Insufficient credits: required {required}, available {available}")]
    InsufficientCredits { required: Credits, available: Credits },

    #[error("Credit check failed: {0}")]
    CreditCheck(ServiceError),

    #[error("Submit failed: {0}")]
    Submit(ServiceError),

    #[error("Status check failed: {0}")]
    Status(ServiceError),

    /// The provider reported the render as failed.
    #[error("Generation failed: {0}")]
    GenerationFailed(String),

    #[error("Generation completed without a result URL")]
    MissingResultUrl,

    #[error("Generation timeout after {attempts} polling attempts")]
    PollTimeout { attempts: u32 },

    #[error("Download failed: {0}")]
    Download(ServiceError),

    #[error("Upload failed: {0}")]
    Upload(ServiceError),

    #[error("Credit debit failed: {0}")]
    Debit(ServiceError),

    #[error("Asset record failed: {0}")]
    Record(ServiceError),
}

impl TaskError {
    /// Whether another attempt may succeed.
    ///
    /// Failures known to be permanent are decided by type; the rest are
    /// judged from the message.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::InsufficientCredits { .. } | Self::MissingResultUrl => false,
            Self::CreditCheck(e)
            | Self::Submit(e)
            | Self::Status(e)
            | Self::Download(e)
            | Self::Upload(e)
            | Self::Debit(e)
            | Self::Record(e)
                if e.permanent =>
            {
                false
            }
            _ => retry::is_retryable_message(&self.to_string()),
        }
    }
}

/// Errors that abort a whole batch.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Insufficient credits for batch: required {required}, available {available}")]
    InsufficientCredits { required: Credits, available: Credits },

    #[error("Credit service error: {0}")]
    Credits(ServiceError),

    #[error("Job store error: {0}")]
    JobStore(ServiceError),
}

impl PipelineError {
    /// Short machine-readable label stored in the job's error report.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InsufficientCredits { .. } => "insufficient_credits",
            Self::Credits(_) => "credit_service",
            Self::JobStore(_) => "job_store",
        }
    }
}
