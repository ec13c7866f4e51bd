use crate::{
    backend::BackendKind,
    cli::{actions::Action, globals::GlobalArgs},
    gate::VerificationMode,
};
use anyhow::{anyhow, Result};
use secrecy::SecretString;

pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let backend = matches
        .get_one::<BackendKind>("backend")
        .copied()
        .unwrap_or_default();

    let mut globals = GlobalArgs::new(
        matches
            .get_one::<String>("functions-region")
            .cloned()
            .unwrap_or_default(),
    );

    if backend == BackendKind::Firebase {
        let required = |name: &str| -> Result<String> {
            matches
                .get_one::<String>(name)
                .cloned()
                .ok_or_else(|| anyhow!("missing required argument: --{name}"))
        };

        globals.set_firebase(
            SecretString::from(required("firebase-api-key")?),
            required("firebase-project-id")?,
            SecretString::from(required("firestore-token")?),
        );
    }

    Ok(Action::Server {
        port: matches.get_one::<u16>("port").copied().unwrap_or(8080),
        backend,
        verification: matches
            .get_one::<VerificationMode>("verification")
            .copied()
            .unwrap_or_default(),
        resend_cooldown: matches
            .get_one::<u32>("otp-resend-cooldown")
            .copied()
            .unwrap_or(60),
        globals,
    })
}
