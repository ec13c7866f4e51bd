use anyhow::{anyhow, Result};
use secrecy::{ExposeSecret, SecretString};

use crate::backend::FirebaseConfig;

/// Connection parameters of the hosted backends.
#[derive(Debug, Clone, Default)]
pub struct GlobalArgs {
    pub firebase_api_key: SecretString,
    pub firebase_project_id: String,
    pub functions_region: String,
    pub firestore_token: SecretString,
}

impl GlobalArgs {
    #[must_use]
    pub fn new(functions_region: String) -> Self {
        Self {
            functions_region,
            ..Self::default()
        }
    }

    pub fn set_firebase(
        &mut self,
        api_key: SecretString,
        project_id: String,
        firestore_token: SecretString,
    ) {
        self.firebase_api_key = api_key;
        self.firebase_project_id = project_id;
        self.firestore_token = firestore_token;
    }

    /// # Errors
    /// Returns an error if the API key, project id or access token is unset.
    pub fn firebase_config(&self) -> Result<FirebaseConfig> {
        if self.firebase_api_key.expose_secret().is_empty() {
            return Err(anyhow!("missing required argument: --firebase-api-key"));
        }
        if self.firebase_project_id.is_empty() {
            return Err(anyhow!("missing required argument: --firebase-project-id"));
        }
        if self.firestore_token.expose_secret().is_empty() {
            return Err(anyhow!("missing required argument: --firestore-token"));
        }

        let mut config = FirebaseConfig::new(
            self.firebase_api_key.clone(),
            self.firebase_project_id.clone(),
            self.firestore_token.clone(),
        );
        if !self.functions_region.is_empty() {
            config = config.with_functions_region(self.functions_region.clone());
        }

        Ok(config)
    }
}
