//! Registration flow.
//!
//! With one-time passcodes the flow walks `Idle -> OtpRequested ->
//! OtpVerified -> AccountCreated`; with email links it goes straight from
//! `Idle` to `AccountCreated`. Nothing is written to the backend before the
//! identity account is created. A failure after that point drops the flow
//! back to `Idle`; an account left without a profile gets one from the
//! session gate on its first sign-in.

use serde::Serialize;
use std::sync::Arc;
use tokio::time::Duration;
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;

use super::{
    cooldown::Cooldown,
    dispatch::IdentityClient,
    error::FlowError,
    normalize_email,
    otp::OtpService,
    profiles::{ensure_profile, ProfileStore},
    session::Session,
    valid_email, VerificationMode,
};

const DEFAULT_RESEND_COOLDOWN_UNITS: u32 = 60;
const DEFAULT_COOLDOWN_TICK: Duration = Duration::from_secs(1);

#[derive(ToSchema, Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationState {
    #[default]
    Idle,
    OtpRequested,
    OtpVerified,
    AccountCreated,
}

#[derive(Clone, Copy, Debug)]
pub struct RegistrationSettings {
    mode: VerificationMode,
    resend_cooldown_units: u32,
    cooldown_tick: Duration,
}

impl RegistrationSettings {
    #[must_use]
    pub fn new(mode: VerificationMode) -> Self {
        Self {
            mode,
            resend_cooldown_units: DEFAULT_RESEND_COOLDOWN_UNITS,
            cooldown_tick: DEFAULT_COOLDOWN_TICK,
        }
    }

    #[must_use]
    pub fn with_resend_cooldown_units(mut self, units: u32) -> Self {
        self.resend_cooldown_units = units;
        self
    }

    #[must_use]
    pub fn with_cooldown_tick(mut self, tick: Duration) -> Self {
        self.cooldown_tick = tick;
        self
    }

    #[must_use]
    pub fn mode(&self) -> VerificationMode {
        self.mode
    }

    #[must_use]
    pub fn resend_cooldown_units(&self) -> u32 {
        self.resend_cooldown_units
    }
}

/// Fields of the registration form.
#[derive(Clone, Debug, Default)]
pub struct RegistrationForm {
    pub email: String,
    pub password: String,
    /// Ignored by the email-link variant.
    pub code: String,
    pub privacy_agreed: bool,
}

/// In-memory state of one registration page visit.
#[derive(Debug, Default)]
pub struct PendingRegistration {
    email: String,
    state: RegistrationState,
    cooldown: Option<Cooldown>,
}

impl PendingRegistration {
    #[must_use]
    pub fn email(&self) -> &str {
        &self.email
    }

    #[must_use]
    pub fn state(&self) -> RegistrationState {
        self.state
    }

    #[must_use]
    pub fn otp_requested(&self) -> bool {
        matches!(
            self.state,
            RegistrationState::OtpRequested | RegistrationState::OtpVerified
        )
    }

    #[must_use]
    pub fn otp_verified(&self) -> bool {
        self.state == RegistrationState::OtpVerified
    }

    /// Seconds until a new code may be requested.
    #[must_use]
    pub fn resend_in(&self) -> u32 {
        self.cooldown.as_ref().map_or(0, Cooldown::remaining)
    }

    #[must_use]
    pub fn resend_label(&self) -> String {
        match &self.cooldown {
            Some(cooldown) => cooldown.label(),
            None => "Send code".to_string(),
        }
    }

    // The cooldown keeps running; it belongs to the control, not the state.
    fn reset(&mut self) {
        self.state = RegistrationState::Idle;
    }
}

pub struct RegistrationFlow {
    identity: IdentityClient,
    profiles: Arc<dyn ProfileStore>,
    otp: Arc<dyn OtpService>,
    settings: RegistrationSettings,
    pending: PendingRegistration,
}

impl RegistrationFlow {
    #[must_use]
    pub fn new(
        identity: IdentityClient,
        profiles: Arc<dyn ProfileStore>,
        otp: Arc<dyn OtpService>,
        settings: RegistrationSettings,
    ) -> Self {
        Self {
            identity,
            profiles,
            otp,
            settings,
            pending: PendingRegistration::default(),
        }
    }

    #[must_use]
    pub fn pending(&self) -> &PendingRegistration {
        &self.pending
    }

    #[must_use]
    pub fn state(&self) -> RegistrationState {
        self.pending.state
    }

    #[must_use]
    pub fn settings(&self) -> &RegistrationSettings {
        &self.settings
    }

    /// Send a one-time passcode to `email` and start the resend cooldown.
    ///
    /// # Errors
    /// Validation errors and an active cooldown are returned before the OTP
    /// service is called. A service failure leaves the state unchanged.
    #[instrument(skip(self))]
    pub async fn request_otp(&mut self, email: &str) -> Result<(), FlowError> {
        self.require_mode(VerificationMode::Otp)?;

        let email = normalize_email(email);
        if email.is_empty() {
            return Err(FlowError::Validation("Enter your email address."));
        }
        if !valid_email(&email) {
            return Err(FlowError::Validation("Email address looks invalid."));
        }

        if let Some(cooldown) = self.pending.cooldown.as_ref().filter(|c| c.is_active()) {
            return Err(FlowError::CoolingDown {
                remaining: cooldown.remaining(),
            });
        }

        if let Err(err) = self.otp.send_otp(&email).await {
            warn!("Failed to send one-time passcode: {err}");
            return Err(err.into());
        }

        info!("one-time passcode sent");
        self.pending.email = email;
        self.pending.state = RegistrationState::OtpRequested;
        self.pending.cooldown = Some(Cooldown::start(
            self.settings.resend_cooldown_units,
            self.settings.cooldown_tick,
        ));

        Ok(())
    }

    /// Check `code` against the address the code was sent to.
    ///
    /// # Errors
    /// `Rejected` when the service refuses the code; the flow stays at
    /// `OtpRequested` in that case and on service failures.
    #[instrument(skip(self, code))]
    pub async fn verify_otp(&mut self, code: &str, privacy_agreed: bool) -> Result<(), FlowError> {
        self.require_mode(VerificationMode::Otp)?;
        if self.pending.state == RegistrationState::OtpVerified {
            return Ok(());
        }
        let code = Self::check_verify_inputs(&self.pending, code, privacy_agreed)?;

        let verdict = self.otp.verify_otp(&self.pending.email, code).await?;
        if !verdict.success {
            info!("one-time passcode refused");
            return Err(FlowError::Rejected(
                verdict
                    .message
                    .unwrap_or_else(|| "The code is not valid.".to_string()),
            ));
        }

        self.pending.state = RegistrationState::OtpVerified;
        Ok(())
    }

    /// Create the identity account and its profile after a verified code.
    ///
    /// # Errors
    /// Any failure here resets the flow to `Idle`.
    #[instrument(skip(self, password))]
    pub async fn create_account(&mut self, password: &str) -> Result<Session, FlowError> {
        self.require_mode(VerificationMode::Otp)?;
        if self.pending.state != RegistrationState::OtpVerified {
            return Err(FlowError::Validation("Verify the code from the email first."));
        }
        if password.is_empty() {
            return Err(FlowError::Validation("Enter a password."));
        }

        let email = self.pending.email.clone();
        let session = self.provision(&email, password, true).await?;
        self.pending.state = RegistrationState::AccountCreated;
        Ok(session)
    }

    /// Handle a submitted registration form for the configured variant.
    ///
    /// Every field is checked before the first backend call.
    ///
    /// # Errors
    /// See [`Self::verify_otp`] and [`Self::create_account`].
    #[instrument(skip_all, fields(mode = %self.settings.mode))]
    pub async fn register(&mut self, form: &RegistrationForm) -> Result<Session, FlowError> {
        match self.settings.mode {
            VerificationMode::Otp => {
                if self.pending.state != RegistrationState::OtpVerified {
                    Self::check_verify_inputs(&self.pending, &form.code, form.privacy_agreed)?;
                    let email = normalize_email(&form.email);
                    if !email.is_empty() && email != self.pending.email {
                        return Err(FlowError::Validation(
                            "The email address changed, request a new code.",
                        ));
                    }
                }
                if form.password.is_empty() {
                    return Err(FlowError::Validation("Enter a password."));
                }

                self.verify_otp(&form.code, form.privacy_agreed).await?;
                self.create_account(&form.password).await
            }
            VerificationMode::EmailLink => self.register_with_link(form).await,
        }
    }

    async fn register_with_link(&mut self, form: &RegistrationForm) -> Result<Session, FlowError> {
        if !form.privacy_agreed {
            return Err(FlowError::Validation(
                "Accept the privacy policy to register.",
            ));
        }
        let email = normalize_email(&form.email);
        if email.is_empty() {
            return Err(FlowError::Validation("Enter your email address."));
        }
        if !valid_email(&email) {
            return Err(FlowError::Validation("Email address looks invalid."));
        }
        if form.password.is_empty() {
            return Err(FlowError::Validation("Enter a password."));
        }

        self.pending.email.clone_from(&email);
        let session = self.provision(&email, &form.password, false).await?;
        self.pending.state = RegistrationState::AccountCreated;
        Ok(session)
    }

    /// Sign-up followed by profile creation; resets to `Idle` on failure.
    async fn provision(
        &mut self,
        email: &str,
        password: &str,
        otp_verified: bool,
    ) -> Result<Session, FlowError> {
        let account = match self.identity.sign_up(email, password).await {
            Ok(account) => account,
            Err(err) => {
                warn!("Failed to create account: {err}");
                self.pending.reset();
                return Err(err.into());
            }
        };

        if !otp_verified {
            if let Err(err) = self.identity.send_email_verification(&account).await {
                error!(user_id = %account.user_id, "Failed to send verification email: {err}");
                self.pending.reset();
                return Err(err.into());
            }
        }

        if let Err(err) = ensure_profile(
            self.profiles.as_ref(),
            &account.user_id,
            &account.email,
            otp_verified,
        )
        .await
        {
            // The gate provisions the profile on the first sign-in.
            error!(user_id = %account.user_id, "Account created without profile: {err}");
            self.pending.reset();
            return Err(err.into());
        }

        info!(user_id = %account.user_id, "account created");
        Ok(account.session())
    }

    fn check_verify_inputs<'a>(
        pending: &PendingRegistration,
        code: &'a str,
        privacy_agreed: bool,
    ) -> Result<&'a str, FlowError> {
        if !privacy_agreed {
            return Err(FlowError::Validation(
                "Accept the privacy policy to register.",
            ));
        }
        if pending.state != RegistrationState::OtpRequested {
            return Err(FlowError::Validation(
                "Request a code and enter it before registering.",
            ));
        }
        let code = code.trim();
        if code.is_empty() {
            return Err(FlowError::Validation("Enter the code from the email."));
        }
        Ok(code)
    }

    fn require_mode(&self, mode: VerificationMode) -> Result<(), FlowError> {
        if self.settings.mode == mode {
            Ok(())
        } else {
            Err(FlowError::Validation(match self.settings.mode {
                VerificationMode::Otp => "This site registers with one-time passcodes.",
                VerificationMode::EmailLink => "This site registers with email links.",
            }))
        }
    }
}
