//! Backend implementations of the gate traits.
//!
//! `firebase` talks to the hosted identity, document and function endpoints
//! over REST; `memory` keeps everything in process.

pub mod firestore;
pub mod functions;
pub mod identity;
pub mod memory;

use reqwest::{Client, Response};
use secrecy::SecretString;
use serde_json::Value;
use std::{fmt, str::FromStr, sync::Arc};
use tracing::debug;

use crate::gate::{BackendError, IdentityProvider, OtpService, ProfileStore};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);

const DEFAULT_IDENTITY_URL: &str = "https://identitytoolkit.googleapis.com/v1";
const DEFAULT_FIRESTORE_URL: &str = "https://firestore.googleapis.com/v1";
const DEFAULT_FUNCTIONS_REGION: &str = "us-central1";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BackendKind {
    #[default]
    Memory,
    Firebase,
}

impl BackendKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Firebase => "firebase",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "firebase" => Ok(Self::Firebase),
            other => Err(format!("unknown backend: {other}")),
        }
    }
}

/// Connection parameters of the hosted project.
#[derive(Clone, Debug)]
pub struct FirebaseConfig {
    api_key: SecretString,
    project_id: String,
    firestore_token: SecretString,
    functions_region: String,
    identity_url: String,
    firestore_url: String,
    functions_url: Option<String>,
}

impl FirebaseConfig {
    #[must_use]
    pub fn new(api_key: SecretString, project_id: String, firestore_token: SecretString) -> Self {
        Self {
            api_key,
            project_id,
            firestore_token,
            functions_region: DEFAULT_FUNCTIONS_REGION.to_string(),
            identity_url: DEFAULT_IDENTITY_URL.to_string(),
            firestore_url: DEFAULT_FIRESTORE_URL.to_string(),
            functions_url: None,
        }
    }

    #[must_use]
    pub fn with_functions_region(mut self, region: String) -> Self {
        self.functions_region = region;
        self
    }

    /// Point the identity client at an emulator or proxy.
    #[must_use]
    pub fn with_identity_url(mut self, url: String) -> Self {
        self.identity_url = url;
        self
    }

    #[must_use]
    pub fn with_firestore_url(mut self, url: String) -> Self {
        self.firestore_url = url;
        self
    }

    #[must_use]
    pub fn with_functions_url(mut self, url: String) -> Self {
        self.functions_url = Some(url);
        self
    }

    #[must_use]
    pub fn api_key(&self) -> &SecretString {
        &self.api_key
    }

    #[must_use]
    pub fn firestore_token(&self) -> &SecretString {
        &self.firestore_token
    }

    #[must_use]
    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    #[must_use]
    pub fn identity_url(&self) -> &str {
        self.identity_url.trim_end_matches('/')
    }

    /// Base of the `users` collection.
    #[must_use]
    pub fn users_collection_url(&self) -> String {
        format!(
            "{}/projects/{}/databases/(default)/documents/users",
            self.firestore_url.trim_end_matches('/'),
            self.project_id
        )
    }

    #[must_use]
    pub fn function_url(&self, name: &str) -> String {
        match &self.functions_url {
            Some(url) => format!("{}/{name}", url.trim_end_matches('/')),
            None => format!(
                "https://{}-{}.cloudfunctions.net/{name}",
                self.functions_region, self.project_id
            ),
        }
    }
}

/// The three collaborators the gate needs, behind their traits.
#[derive(Clone)]
pub struct Backends {
    pub identity: Arc<dyn IdentityProvider>,
    pub profiles: Arc<dyn ProfileStore>,
    pub otp: Arc<dyn OtpService>,
}

impl Backends {
    #[must_use]
    pub fn memory() -> Self {
        Self {
            identity: Arc::new(memory::MemoryIdentity::new()),
            profiles: Arc::new(memory::MemoryProfiles::new()),
            otp: Arc::new(memory::MemoryOtp::new()),
        }
    }

    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn firebase(config: &FirebaseConfig) -> Result<Self, BackendError> {
        let client = http_client()?;
        Ok(Self {
            identity: Arc::new(identity::FirebaseIdentity::new(client.clone(), config.clone())),
            profiles: Arc::new(firestore::FirestoreProfiles::new(client.clone(), config.clone())),
            otp: Arc::new(functions::CallableOtp::new(client, config.clone())),
        })
    }
}

pub(crate) fn http_client() -> Result<Client, BackendError> {
    Client::builder()
        .user_agent(APP_USER_AGENT)
        .build()
        .map_err(|e| BackendError::new(format!("Error creating HTTP client: {e}")))
}

pub(crate) fn transport_error(err: &reqwest::Error) -> BackendError {
    debug!("transport error: {err:?}");
    BackendError::new(err.to_string())
}

/// Turn a non-success response into the provider's own message.
///
/// Google APIs answer `{"error": {"message": "..."}}`; anything else falls
/// back to the status line.
pub(crate) async fn provider_error(response: Response) -> BackendError {
    let status = response.status();
    match response.json::<Value>().await {
        Ok(body) => BackendError::new(error_message(&body).unwrap_or_else(|| status.to_string())),
        Err(_) => BackendError::new(status.to_string()),
    }
}

pub(crate) fn error_message(body: &Value) -> Option<String> {
    body["error"]["message"]
        .as_str()
        .or_else(|| body["error"].as_str())
        .map(ToString::to_string)
}
