use async_trait::async_trait;
use serde::Deserialize;

use super::error::BackendError;

/// Answer of the verify endpoint.
///
/// A normal answer may still refuse the code; only `success` lets the
/// registration move on.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OtpVerdict {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
}

impl OtpVerdict {
    #[must_use]
    pub fn accepted() -> Self {
        Self {
            success: true,
            message: None,
        }
    }

    #[must_use]
    pub fn refused(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
        }
    }
}

/// Hosted one-time-passcode endpoints gating registration.
#[async_trait]
pub trait OtpService: Send + Sync {
    async fn send_otp(&self, email: &str) -> Result<(), BackendError>;

    async fn verify_otp(&self, email: &str, code: &str) -> Result<OtpVerdict, BackendError>;

    fn kind(&self) -> &'static str;
}
