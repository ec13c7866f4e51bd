//! # Atelier
//!
//! Sign-in and admin gating for a small community site: a public gallery of
//! artists and VTubers plus a discussion board.
//!
//! - [`gate`] holds the flow logic: the session gate that turns identity
//!   changes into a session context, the registration flow (one-time
//!   passcode or email link) and sign-in.
//! - [`backend`] implements the identity provider, profile store and OTP
//!   service, either against the hosted REST endpoints or in memory.
//! - [`atelier`] serves the flows over HTTP, one visit per browser page.
//! - [`cli`] parses configuration and starts the server.

pub mod atelier;
pub mod backend;
pub mod cli;
pub mod gate;
