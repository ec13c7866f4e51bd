//! Sign-in and admin gating core.
//!
//! The identity provider, profile store and OTP service are reached through
//! traits; everything else here is the flow logic that decides what a
//! client is allowed to see.

pub mod context;
pub mod cooldown;
pub mod dispatch;
pub mod error;
pub mod identity;
pub mod otp;
pub mod profiles;
pub mod registration;
pub mod session;
pub mod session_gate;
pub mod sign_in;

pub use context::{Capabilities, SessionContext, ViewState};
pub use dispatch::{IdentityClient, SessionEvents};
pub use error::{BackendError, FlowError};
pub use identity::IdentityProvider;
pub use otp::{OtpService, OtpVerdict};
pub use profiles::{ensure_profile, CreateOutcome, Profile, ProfileStore};
pub use registration::{
    PendingRegistration, RegistrationFlow, RegistrationForm, RegistrationSettings,
    RegistrationState,
};
pub use session::{Account, Session};
pub use session_gate::SessionGate;
pub use sign_in::sign_in;

use regex::Regex;
use std::{fmt, str::FromStr};

/// How new accounts prove ownership of their email address.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum VerificationMode {
    /// A one-time passcode is verified before the account is created.
    #[default]
    Otp,
    /// The provider mails a verification link after the account is created;
    /// sign-in is refused until the link was followed.
    EmailLink,
}

impl VerificationMode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Otp => "otp",
            Self::EmailLink => "email-link",
        }
    }
}

impl fmt::Display for VerificationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VerificationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "otp" => Ok(Self::Otp),
            "email-link" | "link" => Ok(Self::EmailLink),
            other => Err(format!("unknown verification mode: {other}")),
        }
    }
}

#[must_use]
pub fn normalize_email(email: &str) -> String {
    email.trim().to_string()
}

#[must_use]
pub fn valid_email(email: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").map_or(false, |re| re.is_match(email))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_email() {
        assert!(valid_email("a@example.com"));
        assert!(!valid_email("a@example"));
        assert!(!valid_email("a example.com"));
        assert!(!valid_email(""));
    }

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("  a@example.com \n"), "a@example.com");
    }

    #[test]
    fn test_verification_mode_parse() {
        assert_eq!("otp".parse::<VerificationMode>(), Ok(VerificationMode::Otp));
        assert_eq!(
            "Email-Link".parse::<VerificationMode>(),
            Ok(VerificationMode::EmailLink)
        );
        assert!("sms".parse::<VerificationMode>().is_err());
        assert_eq!(VerificationMode::EmailLink.to_string(), "email-link");
    }
}
