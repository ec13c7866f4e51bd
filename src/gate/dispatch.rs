//! Session-change dispatch.
//!
//! Each client owns one [`IdentityClient`]. Signing in or out replaces the
//! current session and notifies every [`SessionEvents`] subscriber. A
//! subscriber sees the session that was current when it subscribed first,
//! then each later change; changes that land while it is busy collapse into
//! the most recent one.

use secrecy::SecretString;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, instrument};

use super::{
    error::BackendError,
    VerificationMode,
    identity::IdentityProvider,
    session::{Account, Session},
};

#[derive(Clone)]
pub struct IdentityClient {
    provider: Arc<dyn IdentityProvider>,
    current: Arc<watch::Sender<Option<Session>>>,
}

impl IdentityClient {
    #[must_use]
    pub fn new(provider: Arc<dyn IdentityProvider>) -> Self {
        let (current, _) = watch::channel(None);
        Self {
            provider,
            current: Arc::new(current),
        }
    }

    /// Start a client with a session recovered from an id token, or signed out
    /// when the token no longer resolves. Under [`VerificationMode::EmailLink`]
    /// an unverified account stays signed out, as it would on sign-in.
    #[instrument(skip_all, fields(mode = %mode))]
    pub async fn restore(
        provider: Arc<dyn IdentityProvider>,
        id_token: &SecretString,
        mode: VerificationMode,
    ) -> Self {
        let client = Self::new(provider);
        match client.provider.lookup(id_token).await {
            Ok(account) if mode == VerificationMode::EmailLink && !account.email_verified => {
                debug!(user_id = %account.user_id, "session not restored: email not verified");
            }
            Ok(account) => {
                debug!(user_id = %account.user_id, "session restored");
                client.current.send_replace(Some(account.session()));
            }
            Err(err) => debug!("session not restored: {err}"),
        }
        client
    }

    #[must_use]
    pub fn on_session_change(&self) -> SessionEvents {
        SessionEvents {
            rx: self.current.subscribe(),
        }
    }

    #[must_use]
    pub fn current_session(&self) -> Option<Session> {
        self.current.borrow().clone()
    }

    /// Create the provider account. The current session is left untouched.
    pub async fn sign_up(&self, email: &str, password: &str) -> Result<Account, BackendError> {
        self.provider.sign_up(email, password).await
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Session, BackendError> {
        let session = self.provider.sign_in(email, password).await?.session();
        info!(user_id = %session.user_id, "signed in");
        self.current.send_replace(Some(session.clone()));
        Ok(session)
    }

    pub fn sign_out(&self) {
        if let Some(session) = self.current.send_replace(None) {
            info!(user_id = %session.user_id, "signed out");
        }
    }

    pub async fn send_email_verification(&self, account: &Account) -> Result<(), BackendError> {
        self.provider.send_email_verification(account).await
    }
}

/// Subscription to session changes of one [`IdentityClient`].
pub struct SessionEvents {
    rx: watch::Receiver<Option<Session>>,
}

impl SessionEvents {
    /// The session as of now, marking it seen.
    pub fn current(&mut self) -> Option<Session> {
        self.rx.borrow_and_update().clone()
    }

    /// Wait for the next change. Returns `None` once the client is gone.
    pub async fn next(&mut self) -> Option<Option<Session>> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::MemoryIdentity;
    use anyhow::Result;

    #[tokio::test]
    async fn subscriber_sees_initial_then_changes() -> Result<()> {
        let provider = Arc::new(MemoryIdentity::new());
        provider.insert_account("a@example.com", "secret", true);
        let client = IdentityClient::new(provider);

        let mut events = client.on_session_change();
        assert_eq!(events.current(), None);

        let session = client.sign_in("a@example.com", "secret").await?;
        assert_eq!(events.next().await, Some(Some(session)));

        client.sign_out();
        assert_eq!(events.next().await, Some(None));
        assert!(client.current_session().is_none());
        Ok(())
    }

    #[tokio::test]
    async fn failed_sign_in_keeps_session() {
        let provider = Arc::new(MemoryIdentity::new());
        let client = IdentityClient::new(provider);

        let result = client.sign_in("nobody@example.com", "secret").await;
        assert!(result.is_err());
        assert!(client.current_session().is_none());
    }

    #[tokio::test]
    async fn events_end_when_client_dropped() {
        let provider = Arc::new(MemoryIdentity::new());
        let client = IdentityClient::new(provider);
        let mut events = client.on_session_change();
        drop(client);
        assert_eq!(events.next().await, None);
    }

    #[tokio::test]
    async fn restore_with_unknown_token_is_signed_out() {
        let provider = Arc::new(MemoryIdentity::new());
        let client =
            IdentityClient::restore(provider, &SecretString::from("stale"), VerificationMode::Otp)
                .await;
        assert!(client.current_session().is_none());
    }

    #[tokio::test]
    async fn restore_unverified_account_depends_on_mode() {
        let provider = Arc::new(MemoryIdentity::new());
        let account = provider.insert_account("u@example.com", "secret", false);
        let token = account.id_token.clone();

        let client =
            IdentityClient::restore(provider.clone(), &token, VerificationMode::EmailLink).await;
        assert!(client.current_session().is_none());

        let client = IdentityClient::restore(provider, &token, VerificationMode::Otp).await;
        assert_eq!(
            client.current_session().map(|s| s.user_id),
            Some(account.user_id)
        );
    }
}
