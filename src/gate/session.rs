use secrecy::SecretString;
use serde::Serialize;

/// The live, authenticated identity of the current client.
///
/// Owned by the identity client; the gate only observes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    pub user_id: String,
    pub email: String,
    pub email_verified: bool,
}

/// An identity-provider account as returned by sign-up and sign-in.
#[derive(Debug, Clone)]
pub struct Account {
    pub user_id: String,
    pub email: String,
    pub email_verified: bool,
    /// Short-lived provider token, needed for follow-up calls such as
    /// sending the verification email.
    pub id_token: SecretString,
}

impl Account {
    #[must_use]
    pub fn session(&self) -> Session {
        Session {
            user_id: self.user_id.clone(),
            email: self.email.clone(),
            email_verified: self.email_verified,
        }
    }
}
