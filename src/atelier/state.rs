//! Site state and the visit registry.
//!
//! A visit stands for one browser page lifetime: its own identity client,
//! the gate task following that client, and the registration form state.
//! Closing a visit (navigating away) drops all of it and abandons whatever
//! was in flight.

use secrecy::SecretString;
use std::{collections::BTreeMap, sync::Arc};
use tokio::{
    sync::{watch, Mutex, MutexGuard, RwLock},
    task::JoinHandle,
    time::{timeout, Duration},
};
use tracing::{debug, info, warn};
use ulid::{Generator, Ulid};

use crate::{
    backend::Backends,
    gate::{
        IdentityClient, RegistrationFlow, RegistrationSettings, SessionContext, SessionGate,
        VerificationMode,
    },
};

const DEFAULT_MAX_VISITS: usize = 10_000;
const SETTLE_TIMEOUT: Duration = Duration::from_secs(10);

pub struct Visit {
    identity: IdentityClient,
    context: watch::Receiver<SessionContext>,
    gate: JoinHandle<()>,
    registration: Mutex<RegistrationFlow>,
}

impl Visit {
    fn open(identity: IdentityClient, backends: &Backends, settings: RegistrationSettings) -> Self {
        let gate = SessionGate::new(backends.profiles.clone());
        let (context, handle) = gate.spawn(identity.on_session_change());
        let registration = RegistrationFlow::new(
            identity.clone(),
            backends.profiles.clone(),
            backends.otp.clone(),
            settings,
        );

        Self {
            identity,
            context,
            gate: handle,
            registration: Mutex::new(registration),
        }
    }

    #[must_use]
    pub fn identity(&self) -> &IdentityClient {
        &self.identity
    }

    /// Latest context published by the gate.
    #[must_use]
    pub fn context(&self) -> SessionContext {
        self.context.borrow().clone()
    }

    /// Wait until the gate has caught up with the current session.
    ///
    /// When it does not catch up in time, a signed-in client still gets a
    /// member view for its own session, never the previous user's context.
    pub async fn settled(&self) -> SessionContext {
        let current = self.identity.current_session();
        let expected = current.as_ref().map(|s| s.user_id.clone());
        let mut rx = self.context.clone();

        let caught_up = timeout(
            SETTLE_TIMEOUT,
            rx.wait_for(|c| c.user_id() == expected.as_deref()),
        )
        .await;

        match caught_up {
            Ok(Ok(context)) => context.clone(),
            Ok(Err(_)) | Err(_) => {
                let last = self.context();
                match current {
                    Some(session) if last.user_id() != Some(session.user_id.as_str()) => {
                        warn!("session gate did not settle, serving member view");
                        SessionContext::signed_in(session, false)
                            .with_warning("profile still loading")
                    }
                    Some(_) => last,
                    None => {
                        warn!("session gate did not settle, serving signed-out view");
                        SessionContext::signed_out()
                    }
                }
            }
        }
    }

    pub async fn registration(&self) -> MutexGuard<'_, RegistrationFlow> {
        self.registration.lock().await
    }
}

impl Drop for Visit {
    fn drop(&mut self) {
        self.gate.abort();
    }
}

struct Registry {
    visits: BTreeMap<Ulid, Arc<Visit>>,
    // Monotonic, so ids issued within one millisecond still sort by issue order
    // and the first entry is always the oldest visit.
    ids: Generator,
}

impl Default for Registry {
    fn default() -> Self {
        Self {
            visits: BTreeMap::new(),
            ids: Generator::new(),
        }
    }
}

impl Registry {
    fn next_id(&mut self) -> Ulid {
        match self.ids.generate() {
            Ok(id) => id,
            Err(err) => {
                warn!("visit id generator exhausted: {err}");
                self.visits
                    .last_key_value()
                    .and_then(|(last, _)| last.increment())
                    .unwrap_or_else(Ulid::new)
            }
        }
    }
}

#[derive(Default)]
pub struct Visits {
    inner: RwLock<Registry>,
}

impl Visits {
    async fn insert(&self, visit: Visit, max_visits: usize) -> (Ulid, Arc<Visit>) {
        let visit = Arc::new(visit);

        let mut registry = self.inner.write().await;
        let id = registry.next_id();
        registry.visits.insert(id, visit.clone());
        while registry.visits.len() > max_visits {
            if let Some((evicted, _)) = registry.visits.pop_first() {
                debug!(visit_id = %evicted, "visit evicted");
            }
        }

        (id, visit)
    }

    pub async fn get(&self, id: &Ulid) -> Option<Arc<Visit>> {
        self.inner.read().await.visits.get(id).cloned()
    }

    pub async fn remove(&self, id: &Ulid) -> bool {
        self.inner.write().await.visits.remove(id).is_some()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.visits.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

pub struct SiteState {
    backends: Backends,
    settings: RegistrationSettings,
    max_visits: usize,
    visits: Visits,
}

impl SiteState {
    #[must_use]
    pub fn new(backends: Backends, settings: RegistrationSettings) -> Self {
        Self {
            backends,
            settings,
            max_visits: DEFAULT_MAX_VISITS,
            visits: Visits::default(),
        }
    }

    #[must_use]
    pub fn with_max_visits(mut self, max_visits: usize) -> Self {
        self.max_visits = max_visits.max(1);
        self
    }

    #[must_use]
    pub fn backends(&self) -> &Backends {
        &self.backends
    }

    #[must_use]
    pub fn mode(&self) -> VerificationMode {
        self.settings.mode()
    }

    #[must_use]
    pub fn visits(&self) -> &Visits {
        &self.visits
    }

    /// Start a visit, restoring the session behind `id_token` when given.
    pub async fn open_visit(&self, id_token: Option<SecretString>) -> (Ulid, Arc<Visit>) {
        let identity = match id_token {
            Some(token) => {
                IdentityClient::restore(self.backends.identity.clone(), &token, self.mode()).await
            }
            None => IdentityClient::new(self.backends.identity.clone()),
        };

        let visit = Visit::open(identity, &self.backends, self.settings);
        let (id, visit) = self.visits.insert(visit, self.max_visits).await;
        info!(visit_id = %id, "visit opened");
        (id, visit)
    }

    /// Look up a visit by its textual id.
    pub async fn visit(&self, id: &str) -> Option<(Ulid, Arc<Visit>)> {
        let id = Ulid::from_string(id).ok()?;
        self.visits.get(&id).await.map(|visit| (id, visit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        backend::memory::MemoryIdentity,
        gate::{BackendError, CreateOutcome, Profile, ProfileStore},
    };
    use anyhow::Result;
    use async_trait::async_trait;

    /// A store that never answers.
    struct StalledProfiles;

    #[async_trait]
    impl ProfileStore for StalledProfiles {
        async fn get(&self, _user_id: &str) -> Result<Option<Profile>, BackendError> {
            std::future::pending().await
        }

        async fn create(&self, _profile: &Profile) -> Result<CreateOutcome, BackendError> {
            std::future::pending().await
        }

        fn kind(&self) -> &'static str {
            "stalled"
        }
    }

    fn site() -> SiteState {
        SiteState::new(
            Backends::memory(),
            RegistrationSettings::new(VerificationMode::Otp),
        )
    }

    #[tokio::test]
    async fn new_visit_is_signed_out() {
        let site = site();
        let (id, visit) = site.open_visit(None).await;
        assert!(!visit.settled().await.is_signed_in());
        assert!(site.visit(&id.to_string()).await.is_some());
    }

    #[tokio::test]
    async fn unknown_or_malformed_ids_are_not_found() {
        let site = site();
        assert!(site.visit("not-a-ulid").await.is_none());
        assert!(site.visit(&Ulid::new().to_string()).await.is_none());
    }

    #[tokio::test]
    async fn oldest_visit_is_evicted() {
        let site = site().with_max_visits(2);
        let (first, _) = site.open_visit(None).await;
        site.open_visit(None).await;
        site.open_visit(None).await;

        assert_eq!(site.visits().len().await, 2);
        assert!(site.visits().get(&first).await.is_none());
    }

    #[tokio::test]
    async fn eviction_follows_open_order_within_a_millisecond() {
        let site = site().with_max_visits(3);
        let mut opened = Vec::new();
        for _ in 0..50 {
            let (id, _) = site.open_visit(None).await;
            // the visit just opened is never the one evicted
            assert!(site.visits().get(&id).await.is_some());
            opened.push(id);
        }

        assert_eq!(site.visits().len().await, 3);
        for (i, id) in opened.iter().enumerate() {
            assert_eq!(site.visits().get(id).await.is_some(), i >= 47);
        }
    }

    #[tokio::test]
    async fn restored_visit_is_signed_in() -> Result<()> {
        let identity = Arc::new(MemoryIdentity::new());
        let account = identity.insert_account("a@example.com", "secret", true);
        let mut backends = Backends::memory();
        backends.identity = identity;
        let site = SiteState::new(backends, RegistrationSettings::new(VerificationMode::Otp));

        let (_, visit) = site.open_visit(Some(account.id_token.clone())).await;
        let context = visit.settled().await;

        assert_eq!(context.user_id(), Some(account.user_id.as_str()));
        Ok(())
    }

    #[tokio::test]
    async fn unverified_restore_is_signed_out_with_email_link() {
        let identity = Arc::new(MemoryIdentity::new());
        let account = identity.insert_account("u@example.com", "secret", false);
        let mut backends = Backends::memory();
        backends.identity = identity;
        let site = SiteState::new(
            backends,
            RegistrationSettings::new(VerificationMode::EmailLink),
        );

        let (_, visit) = site.open_visit(Some(account.id_token.clone())).await;
        let context = visit.settled().await;

        assert!(!context.is_signed_in());
        assert!(!context.capabilities().write_post);
        assert!(visit.identity().current_session().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn unsettled_gate_serves_member_view_of_current_session() -> Result<()> {
        let identity = Arc::new(MemoryIdentity::new());
        identity.insert_account("a@example.com", "secret", true);
        let mut backends = Backends::memory();
        backends.identity = identity;
        backends.profiles = Arc::new(StalledProfiles);
        let site = SiteState::new(backends, RegistrationSettings::new(VerificationMode::Otp));

        let (_, visit) = site.open_visit(None).await;
        let session = visit.identity().sign_in("a@example.com", "secret").await?;
        let context = visit.settled().await;

        assert_eq!(context.user_id(), Some(session.user_id.as_str()));
        assert!(!context.is_admin());
        assert_eq!(context.warning(), Some("profile still loading"));
        Ok(())
    }

    #[tokio::test]
    async fn closed_visit_is_gone() {
        let site = site();
        let (id, _) = site.open_visit(None).await;
        assert!(site.visits().remove(&id).await);
        assert!(!site.visits().remove(&id).await);
        assert!(site.visits().is_empty().await);
    }
}
