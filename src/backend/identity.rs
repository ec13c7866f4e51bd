use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::{json, Value};
use tracing::instrument;

use super::{provider_error, transport_error, FirebaseConfig};
use crate::gate::{Account, BackendError, IdentityProvider};

/// Identity Toolkit REST client.
pub struct FirebaseIdentity {
    client: Client,
    config: FirebaseConfig,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenResponse {
    local_id: String,
    #[serde(default)]
    email: String,
    id_token: String,
}

#[derive(Deserialize)]
struct LookupResponse {
    #[serde(default)]
    users: Vec<LookupUser>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LookupUser {
    local_id: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    email_verified: bool,
}

impl FirebaseIdentity {
    #[must_use]
    pub fn new(client: Client, config: FirebaseConfig) -> Self {
        Self { client, config }
    }

    fn endpoint(&self, method: &str) -> String {
        format!("{}/accounts:{method}", self.config.identity_url())
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, body: &Value) -> Result<T, BackendError> {
        let response = self
            .client
            .post(self.endpoint(method))
            .query(&[("key", self.config.api_key().expose_secret())])
            .json(body)
            .send()
            .await
            .map_err(|e| transport_error(&e))?;

        if !response.status().is_success() {
            return Err(provider_error(response).await);
        }

        response.json::<T>().await.map_err(|e| transport_error(&e))
    }

    /// `signUp` and `signInWithPassword` do not report `emailVerified`.
    async fn resolve(&self, id_token: &SecretString) -> Result<Account, BackendError> {
        let lookup: LookupResponse = self
            .call("lookup", &json!({ "idToken": id_token.expose_secret() }))
            .await?;
        let user = lookup
            .users
            .into_iter()
            .next()
            .ok_or_else(|| BackendError::new("USER_NOT_FOUND"))?;

        Ok(Account {
            user_id: user.local_id,
            email: user.email,
            email_verified: user.email_verified,
            id_token: id_token.clone(),
        })
    }
}

#[async_trait]
impl IdentityProvider for FirebaseIdentity {
    #[instrument(skip(self, password))]
    async fn sign_up(&self, email: &str, password: &str) -> Result<Account, BackendError> {
        let token: TokenResponse = self
            .call(
                "signUp",
                &json!({ "email": email, "password": password, "returnSecureToken": true }),
            )
            .await?;

        Ok(Account {
            user_id: token.local_id,
            email: if token.email.is_empty() {
                email.to_string()
            } else {
                token.email
            },
            email_verified: false,
            id_token: SecretString::from(token.id_token),
        })
    }

    #[instrument(skip(self, password))]
    async fn sign_in(&self, email: &str, password: &str) -> Result<Account, BackendError> {
        let token: TokenResponse = self
            .call(
                "signInWithPassword",
                &json!({ "email": email, "password": password, "returnSecureToken": true }),
            )
            .await?;

        self.resolve(&SecretString::from(token.id_token)).await
    }

    #[instrument(skip_all)]
    async fn lookup(&self, id_token: &SecretString) -> Result<Account, BackendError> {
        self.resolve(id_token).await
    }

    #[instrument(skip_all, fields(user_id = %account.user_id))]
    async fn send_email_verification(&self, account: &Account) -> Result<(), BackendError> {
        let _: Value = self
            .call(
                "sendOobCode",
                &json!({
                    "requestType": "VERIFY_EMAIL",
                    "idToken": account.id_token.expose_secret(),
                }),
            )
            .await?;
        Ok(())
    }

    fn kind(&self) -> &'static str {
        "firebase"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    #[test]
    fn test_endpoint() -> Result<()> {
        let config = FirebaseConfig::new(
            SecretString::from("key"),
            "atelier-dev".to_string(),
            SecretString::from("token"),
        )
        .with_identity_url("http://localhost:9099/identitytoolkit.googleapis.com/v1/".to_string());
        let identity = FirebaseIdentity::new(super::super::http_client()?, config);
        assert_eq!(
            identity.endpoint("signUp"),
            "http://localhost:9099/identitytoolkit.googleapis.com/v1/accounts:signUp"
        );
        Ok(())
    }

    #[test]
    fn test_lookup_response() -> Result<()> {
        let body = r#"{"kind":"identitytoolkit#GetAccountInfoResponse","users":[{"localId":"abc","email":"a@example.com","emailVerified":true}]}"#;
        let lookup: LookupResponse = serde_json::from_str(body)?;
        assert_eq!(lookup.users.len(), 1);
        assert_eq!(lookup.users[0].local_id, "abc");
        assert!(lookup.users[0].email_verified);
        Ok(())
    }

    #[test]
    fn test_token_response() -> Result<()> {
        let body = r#"{"localId":"abc","email":"a@example.com","idToken":"t","refreshToken":"r","expiresIn":"3600"}"#;
        let token: TokenResponse = serde_json::from_str(body)?;
        assert_eq!(token.local_id, "abc");
        assert_eq!(token.id_token, "t");
        Ok(())
    }
}
