use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use secrecy::ExposeSecret;
use serde_json::{json, Value};
use tracing::{debug, instrument};

use super::{provider_error, transport_error, FirebaseConfig};
use crate::gate::{BackendError, CreateOutcome, Profile, ProfileStore};

/// Profiles kept in the Firestore `users` collection, one document per user id.
pub struct FirestoreProfiles {
    client: Client,
    config: FirebaseConfig,
}

impl FirestoreProfiles {
    #[must_use]
    pub fn new(client: Client, config: FirebaseConfig) -> Self {
        Self { client, config }
    }
}

/// Encode a profile as a Firestore document body.
#[must_use]
pub fn to_document(profile: &Profile) -> Value {
    json!({
        "fields": {
            "uid": { "stringValue": profile.user_id },
            "email": { "stringValue": profile.email },
            "isAdmin": { "booleanValue": profile.is_admin },
            "emailVerified": { "booleanValue": profile.email_verified },
        }
    })
}

/// Decode a Firestore document. Missing flags read as `false`.
///
/// # Errors
/// Returns an error if the document has no `fields` map.
pub fn from_document(user_id: &str, document: &Value) -> Result<Profile, BackendError> {
    let fields = document["fields"]
        .as_object()
        .ok_or_else(|| BackendError::new("profile document has no fields"))?;

    let string = |name: &str| {
        fields
            .get(name)
            .and_then(|v| v["stringValue"].as_str())
            .map(ToString::to_string)
    };
    let flag = |name: &str| {
        fields
            .get(name)
            .and_then(|v| v["booleanValue"].as_bool())
            .unwrap_or(false)
    };

    Ok(Profile {
        user_id: string("uid").unwrap_or_else(|| user_id.to_string()),
        email: string("email").unwrap_or_default(),
        is_admin: flag("isAdmin"),
        email_verified: flag("emailVerified"),
    })
}

#[async_trait]
impl ProfileStore for FirestoreProfiles {
    #[instrument(skip(self))]
    async fn get(&self, user_id: &str) -> Result<Option<Profile>, BackendError> {
        let url = format!("{}/{user_id}", self.config.users_collection_url());
        let response = self
            .client
            .get(&url)
            .bearer_auth(self.config.firestore_token().expose_secret())
            .send()
            .await
            .map_err(|e| transport_error(&e))?;

        if response.status() == StatusCode::NOT_FOUND {
            debug!("no profile document");
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(provider_error(response).await);
        }

        let document: Value = response.json().await.map_err(|e| transport_error(&e))?;
        from_document(user_id, &document).map(Some)
    }

    #[instrument(skip(self, profile), fields(user_id = %profile.user_id))]
    async fn create(&self, profile: &Profile) -> Result<CreateOutcome, BackendError> {
        // documentId makes the store reject a second record for the same user.
        let response = self
            .client
            .post(self.config.users_collection_url())
            .query(&[("documentId", profile.user_id.as_str())])
            .bearer_auth(self.config.firestore_token().expose_secret())
            .json(&to_document(profile))
            .send()
            .await
            .map_err(|e| transport_error(&e))?;

        match response.status() {
            StatusCode::CONFLICT => Ok(CreateOutcome::AlreadyExists),
            status if status.is_success() => Ok(CreateOutcome::Created),
            _ => Err(provider_error(response).await),
        }
    }

    fn kind(&self) -> &'static str {
        "firestore"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    #[test]
    fn test_document_round_trip() -> Result<()> {
        let mut profile = Profile::member("u1", "a@example.com", true);
        profile.is_admin = true;
        let decoded = from_document("u1", &to_document(&profile))?;
        assert_eq!(decoded, profile);
        Ok(())
    }

    #[test]
    fn test_document_without_admin_flag() -> Result<()> {
        // Records written by the old site carry only uid and email.
        let document = json!({
            "name": "projects/p/databases/(default)/documents/users/u1",
            "fields": {
                "uid": { "stringValue": "u1" },
                "email": { "stringValue": "a@example.com" }
            }
        });
        let profile = from_document("u1", &document)?;
        assert!(!profile.is_admin);
        assert_eq!(profile.email, "a@example.com");
        Ok(())
    }

    #[test]
    fn test_document_without_fields() {
        assert!(from_document("u1", &json!({"name": "x"})).is_err());
    }
}
