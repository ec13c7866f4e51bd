use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::instrument;

use super::{error_message, provider_error, transport_error, FirebaseConfig};
use crate::gate::{BackendError, OtpService, OtpVerdict};

/// OTP endpoints exposed as callable functions (`sendOtp`, `verifyOtp`).
pub struct CallableOtp {
    client: Client,
    config: FirebaseConfig,
}

impl CallableOtp {
    #[must_use]
    pub fn new(client: Client, config: FirebaseConfig) -> Self {
        Self { client, config }
    }

    /// Invoke a callable function; the payload travels under `data` and the
    /// answer comes back under `result`.
    async fn call(&self, name: &str, data: Value) -> Result<Value, BackendError> {
        let response = self
            .client
            .post(self.config.function_url(name))
            .json(&json!({ "data": data }))
            .send()
            .await
            .map_err(|e| transport_error(&e))?;

        if !response.status().is_success() {
            return Err(provider_error(response).await);
        }

        let body: Value = response.json().await.map_err(|e| transport_error(&e))?;
        unwrap_result(body)
    }
}

fn unwrap_result(mut body: Value) -> Result<Value, BackendError> {
    if let Some(message) = error_message(&body) {
        return Err(BackendError::new(message));
    }
    Ok(body["result"].take())
}

#[async_trait]
impl OtpService for CallableOtp {
    #[instrument(skip(self))]
    async fn send_otp(&self, email: &str) -> Result<(), BackendError> {
        self.call("sendOtp", json!({ "email": email })).await?;
        Ok(())
    }

    #[instrument(skip(self, code))]
    async fn verify_otp(&self, email: &str, code: &str) -> Result<OtpVerdict, BackendError> {
        let result = self
            .call("verifyOtp", json!({ "email": email, "otp": code }))
            .await?;
        serde_json::from_value(result)
            .map_err(|e| BackendError::new(format!("unexpected verifyOtp answer: {e}")))
    }

    fn kind(&self) -> &'static str {
        "callable"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    #[test]
    fn test_unwrap_result_refusal() -> Result<()> {
        let result = unwrap_result(json!({"result": {"success": false, "message": "expired"}}))?;
        let verdict: OtpVerdict = serde_json::from_value(result)?;
        assert_eq!(verdict, OtpVerdict::refused("expired"));
        Ok(())
    }

    #[test]
    fn test_unwrap_result_error() {
        let err = unwrap_result(json!({"error": {"status": "INTERNAL", "message": "INTERNAL"}}));
        assert_eq!(err, Err(BackendError::new("INTERNAL")));
    }
}
