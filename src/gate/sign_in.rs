use tracing::{info, instrument};

use super::{
    dispatch::IdentityClient, error::FlowError, normalize_email, session::Session,
    VerificationMode,
};

/// Sign in with email and password.
///
/// Under the email-link variant an unverified session is signed straight
/// back out, so the client is never left authenticated.
///
/// # Errors
/// Missing fields are validation errors; provider failures carry the
/// provider's message.
#[instrument(skip(identity, password))]
pub async fn sign_in(
    identity: &IdentityClient,
    mode: VerificationMode,
    email: &str,
    password: &str,
) -> Result<Session, FlowError> {
    let email = normalize_email(email);
    if email.is_empty() || password.is_empty() {
        return Err(FlowError::Validation("Enter your email address and password."));
    }

    let session = identity.sign_in(&email, password).await?;

    if mode == VerificationMode::EmailLink && !session.email_verified {
        info!(user_id = %session.user_id, "unverified sign-in refused");
        identity.sign_out();
        return Err(FlowError::EmailNotVerified);
    }

    Ok(session)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::MemoryIdentity;
    use anyhow::Result;
    use std::sync::Arc;

    fn client(verified: bool) -> IdentityClient {
        let provider = Arc::new(MemoryIdentity::new());
        provider.insert_account("a@example.com", "secret", verified);
        IdentityClient::new(provider)
    }

    #[tokio::test]
    async fn unverified_link_session_is_signed_out() {
        let identity = client(false);

        let result = sign_in(&identity, VerificationMode::EmailLink, "a@example.com", "secret").await;

        assert_eq!(result, Err(FlowError::EmailNotVerified));
        assert!(identity.current_session().is_none());
    }

    #[tokio::test]
    async fn unverified_otp_session_is_kept() -> Result<()> {
        let identity = client(false);

        let session = sign_in(&identity, VerificationMode::Otp, "a@example.com", "secret").await?;

        assert_eq!(identity.current_session(), Some(session));
        Ok(())
    }

    #[tokio::test]
    async fn verified_link_session_is_kept() -> Result<()> {
        let identity = client(true);
        let session =
            sign_in(&identity, VerificationMode::EmailLink, " a@example.com ", "secret").await?;
        assert_eq!(session.email, "a@example.com");
        assert!(identity.current_session().is_some());
        Ok(())
    }

    #[tokio::test]
    async fn provider_message_is_surfaced() {
        let identity = client(true);
        let result = sign_in(&identity, VerificationMode::Otp, "a@example.com", "wrong").await;
        assert_eq!(
            result.map_err(|e| e.to_string()),
            Err("INVALID_LOGIN_CREDENTIALS".to_string())
        );
    }

    #[tokio::test]
    async fn missing_fields_are_validation_errors() {
        let identity = client(true);
        let result = sign_in(&identity, VerificationMode::Otp, "", "secret").await;
        assert!(matches!(result, Err(FlowError::Validation(_))));
    }
}
