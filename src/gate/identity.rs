use async_trait::async_trait;
use secrecy::SecretString;

use super::{error::BackendError, session::Account};

/// Hosted identity provider.
///
/// Implementations are stateless; the current session of a client lives in
/// [`IdentityClient`](super::dispatch::IdentityClient).
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_up(&self, email: &str, password: &str) -> Result<Account, BackendError>;

    async fn sign_in(&self, email: &str, password: &str) -> Result<Account, BackendError>;

    /// Resolve a previously issued id token back into its account.
    async fn lookup(&self, id_token: &SecretString) -> Result<Account, BackendError>;

    /// Mail the verification link for the email-link variant.
    async fn send_email_verification(&self, account: &Account) -> Result<(), BackendError>;

    /// Short name used in logs and the health endpoint.
    fn kind(&self) -> &'static str;
}
