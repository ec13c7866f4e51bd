use std::sync::Arc;
use tokio::{sync::watch, task::JoinHandle};
use tracing::{debug, instrument, warn};

use super::{
    context::SessionContext, dispatch::SessionEvents, profiles::ensure_profile,
    profiles::ProfileStore, session::Session,
};

/// Keeps the session context in step with the current session.
#[derive(Clone)]
pub struct SessionGate {
    profiles: Arc<dyn ProfileStore>,
}

impl SessionGate {
    #[must_use]
    pub fn new(profiles: Arc<dyn ProfileStore>) -> Self {
        Self { profiles }
    }

    /// Resolve the context for one session change.
    ///
    /// A missing profile is created on the spot. Store failures never block
    /// the signed-in view; they degrade it to non-admin with a warning.
    #[instrument(skip_all, fields(user_id = session.map(|s| s.user_id.as_str())))]
    pub async fn on_session_change(&self, session: Option<&Session>) -> SessionContext {
        let Some(session) = session else {
            debug!("signed out");
            return SessionContext::signed_out();
        };

        match ensure_profile(
            self.profiles.as_ref(),
            &session.user_id,
            &session.email,
            session.email_verified,
        )
        .await
        {
            Ok(profile) => {
                debug!(is_admin = profile.is_admin, "profile resolved");
                SessionContext::signed_in(session.clone(), profile.is_admin)
            }
            Err(err) => {
                warn!("Failed to resolve profile, falling back to member view: {err}");
                SessionContext::signed_in(session.clone(), false)
                    .with_warning(format!("profile unavailable: {err}"))
            }
        }
    }

    /// Follow `events` on a background task, publishing every resolved context.
    ///
    /// The first context is resolved from the session current at spawn time.
    /// Events are handled one at a time; the task ends with the identity client.
    #[must_use]
    pub fn spawn(
        self,
        mut events: SessionEvents,
    ) -> (watch::Receiver<SessionContext>, JoinHandle<()>) {
        let (tx, rx) = watch::channel(SessionContext::signed_out());

        let handle = tokio::spawn(async move {
            let initial = events.current();
            tx.send_replace(self.on_session_change(initial.as_ref()).await);

            while let Some(session) = events.next().await {
                tx.send_replace(self.on_session_change(session.as_ref()).await);
            }
        });

        (rx, handle)
    }
}
