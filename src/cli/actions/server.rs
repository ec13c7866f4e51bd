use crate::{
    atelier::{self, state::SiteState},
    backend::{BackendKind, Backends},
    cli::actions::Action,
    gate::RegistrationSettings,
};
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

/// Handle the server action
/// # Errors
/// Returns an error if the backends cannot be configured or the server fails to start.
pub async fn handle(action: Action) -> Result<()> {
    match action {
        Action::Server {
            port,
            backend,
            verification,
            resend_cooldown,
            globals,
        } => {
            let backends = match backend {
                BackendKind::Memory => Backends::memory(),
                BackendKind::Firebase => {
                    let config = globals.firebase_config()?;
                    Backends::firebase(&config).context("Failed to configure Firebase backends")?
                }
            };

            info!(
                backend = %backend,
                identity = backends.identity.kind(),
                profiles = backends.profiles.kind(),
                otp = backends.otp.kind(),
                verification = %verification,
                "backends ready"
            );

            let settings =
                RegistrationSettings::new(verification).with_resend_cooldown_units(resend_cooldown);

            atelier::new(port, Arc::new(SiteState::new(backends, settings))).await?;
        }
    }

    Ok(())
}
