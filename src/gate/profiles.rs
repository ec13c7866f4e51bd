use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use utoipa::ToSchema;

use super::error::BackendError;

/// Persistent per-user record carrying the admin flag.
///
/// `is_admin` is only ever changed by an administrator out of band.
#[derive(ToSchema, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub user_id: String,
    pub email: String,
    #[serde(default)]
    pub is_admin: bool,
    /// Set when ownership of the address was proven before the account existed (OTP).
    #[serde(default)]
    pub email_verified: bool,
}

impl Profile {
    #[must_use]
    pub fn member(user_id: &str, email: &str, email_verified: bool) -> Self {
        Self {
            user_id: user_id.to_string(),
            email: email.to_string(),
            is_admin: false,
            email_verified,
        }
    }
}

/// Result of [`ProfileStore::create`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateOutcome {
    Created,
    /// A record with this user id was already there; nothing was written.
    AlreadyExists,
}

/// Hosted document store holding one [`Profile`] per user id.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn get(&self, user_id: &str) -> Result<Option<Profile>, BackendError>;

    async fn create(&self, profile: &Profile) -> Result<CreateOutcome, BackendError>;

    fn kind(&self) -> &'static str;
}

/// Return the profile of `user_id`, creating a non-admin one when missing.
///
/// Both registration and the session gate go through here so a user never
/// ends up with two records.
///
/// # Errors
/// Returns the store error when the lookup or the write fails.
#[instrument(skip(store))]
pub async fn ensure_profile(
    store: &dyn ProfileStore,
    user_id: &str,
    email: &str,
    email_verified: bool,
) -> Result<Profile, BackendError> {
    if let Some(profile) = store.get(user_id).await? {
        return Ok(profile);
    }

    let profile = Profile::member(user_id, email, email_verified);
    match store.create(&profile).await? {
        CreateOutcome::Created => {
            info!("profile created");
            Ok(profile)
        }
        // Lost a race with another writer; theirs is authoritative.
        CreateOutcome::AlreadyExists => store
            .get(user_id)
            .await?
            .ok_or_else(|| BackendError::new("profile vanished after create conflict")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::MemoryProfiles;
    use anyhow::Result;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Misses the first lookup, then loses the create to another writer
    /// whose record (if any) shows up on the next lookup.
    struct RacingStore {
        winner: Option<Profile>,
        gets: AtomicUsize,
    }

    impl RacingStore {
        fn new(winner: Option<Profile>) -> Self {
            Self {
                winner,
                gets: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ProfileStore for RacingStore {
        async fn get(&self, _user_id: &str) -> Result<Option<Profile>, BackendError> {
            if self.gets.fetch_add(1, Ordering::SeqCst) == 0 {
                Ok(None)
            } else {
                Ok(self.winner.clone())
            }
        }

        async fn create(&self, _profile: &Profile) -> Result<CreateOutcome, BackendError> {
            Ok(CreateOutcome::AlreadyExists)
        }

        fn kind(&self) -> &'static str {
            "racing"
        }
    }

    #[tokio::test]
    async fn ensure_creates_missing_profile_once() -> Result<()> {
        let store = MemoryProfiles::new();

        let first = ensure_profile(&store, "u1", "a@example.com", false).await?;
        let second = ensure_profile(&store, "u1", "a@example.com", false).await?;

        assert_eq!(first, second);
        assert!(!first.is_admin);
        assert_eq!(store.creates(), 1);
        assert_eq!(store.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn ensure_keeps_existing_profile() -> Result<()> {
        let store = MemoryProfiles::new();
        let mut admin = Profile::member("u1", "admin@example.com", true);
        admin.is_admin = true;
        store.insert(admin.clone());

        let profile = ensure_profile(&store, "u1", "other@example.com", false).await?;

        assert_eq!(profile, admin);
        assert_eq!(store.creates(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn ensure_rereads_after_losing_create_race() -> Result<()> {
        let mut admin = Profile::member("u1", "admin@example.com", true);
        admin.is_admin = true;
        let store = RacingStore::new(Some(admin.clone()));

        let profile = ensure_profile(&store, "u1", "a@example.com", false).await?;

        assert_eq!(profile, admin);
        assert_eq!(store.gets.load(Ordering::SeqCst), 2);
        Ok(())
    }

    #[tokio::test]
    async fn ensure_fails_when_conflicting_profile_vanished() {
        let store = RacingStore::new(None);

        let result = ensure_profile(&store, "u1", "a@example.com", false).await;

        assert!(result.is_err_and(|err| err.to_string().contains("vanished")));
    }

    #[test]
    fn profile_defaults_when_flags_absent() -> Result<()> {
        let profile: Profile =
            serde_json::from_str(r#"{"user_id":"u1","email":"a@example.com"}"#)?;
        assert!(!profile.is_admin);
        assert!(!profile.email_verified);
        Ok(())
    }
}
