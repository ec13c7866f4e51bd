use thiserror::Error;

/// A call to the identity provider, profile store or OTP service was rejected.
///
/// The message is whatever the provider answered with and is shown to the user as is.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct BackendError {
    message: String,
}

impl BackendError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Outcome of a user action that did not go through.
///
/// None of these are retried; the user re-triggers the action.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FlowError {
    /// A required field is missing; raised before any backend call.
    #[error("{0}")]
    Validation(&'static str),
    #[error("{0}")]
    Backend(#[from] BackendError),
    /// The OTP service answered normally but refused the code.
    #[error("{0}")]
    Rejected(String),
    /// The resend control is still disabled.
    #[error("a new code can be requested in {remaining}s")]
    CoolingDown { remaining: u32 },
    #[error("email address is not verified, check your inbox")]
    EmailNotVerified,
}

impl FlowError {
    /// Stable identifier for clients.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Backend(_) => "backend",
            Self::Rejected(_) => "rejected",
            Self::CoolingDown { .. } => "cooling_down",
            Self::EmailNotVerified => "email_not_verified",
        }
    }
}
