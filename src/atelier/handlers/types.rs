use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::gate::{PendingRegistration, RegistrationState, VerificationMode, ViewState};

#[derive(ToSchema, Serialize, Debug)]
pub struct VisitResponse {
    pub visit_id: String,
    pub view: ViewState,
}

/// What a page shows after an action, and where it navigates next.
#[derive(ToSchema, Serialize, Debug)]
pub struct PageResponse {
    pub view: ViewState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registration: Option<RegistrationView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<String>,
}

impl PageResponse {
    #[must_use]
    pub fn new(view: ViewState) -> Self {
        Self {
            view,
            registration: None,
            redirect: None,
            notice: None,
        }
    }

    #[must_use]
    pub fn with_registration(mut self, registration: RegistrationView) -> Self {
        self.registration = Some(registration);
        self
    }

    #[must_use]
    pub fn with_redirect(mut self, redirect: &str) -> Self {
        self.redirect = Some(redirect.to_string());
        self
    }

    #[must_use]
    pub fn with_notice(mut self, notice: impl Into<String>) -> Self {
        self.notice = Some(notice.into());
        self
    }
}

#[derive(ToSchema, Serialize, Debug)]
pub struct RegistrationView {
    pub state: RegistrationState,
    pub email: String,
    pub otp_requested: bool,
    pub otp_verified: bool,
    /// Seconds until the resend control is enabled again.
    pub resend_in: u32,
    pub resend_label: String,
    pub mode: String,
}

impl RegistrationView {
    #[must_use]
    pub fn new(pending: &PendingRegistration, mode: VerificationMode) -> Self {
        Self {
            state: pending.state(),
            email: pending.email().to_string(),
            otp_requested: pending.otp_requested(),
            otp_verified: pending.otp_verified(),
            resend_in: pending.resend_in(),
            resend_label: pending.resend_label(),
            mode: mode.to_string(),
        }
    }
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
}

#[derive(ToSchema, Deserialize, Debug)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(ToSchema, Deserialize, Debug)]
pub struct OtpRequest {
    #[serde(default)]
    pub email: String,
}

#[derive(ToSchema, Deserialize, Debug)]
pub struct RegisterRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub privacy_agreed: bool,
}
