pub mod server;

use crate::{backend::BackendKind, cli::globals::GlobalArgs, gate::VerificationMode};

#[derive(Debug)]
pub enum Action {
    Server {
        port: u16,
        backend: BackendKind,
        verification: VerificationMode,
        /// Seconds before another one-time passcode may be requested.
        resend_cooldown: u32,
        globals: GlobalArgs,
    },
}
