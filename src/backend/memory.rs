//! In-process backends for local development and tests.
//!
//! Nothing survives a restart. The OTP service logs the codes it "sends"
//! instead of mailing them.

use async_trait::async_trait;
use rand::Rng;
use secrecy::{ExposeSecret, SecretString};
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex, MutexGuard,
    },
};
use tracing::info;
use uuid::Uuid;

use crate::gate::{
    Account, BackendError, CreateOutcome, IdentityProvider, OtpService, OtpVerdict, Profile,
    ProfileStore,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

#[derive(Debug, Clone)]
struct StoredAccount {
    user_id: String,
    email: String,
    password: String,
    email_verified: bool,
}

impl StoredAccount {
    fn account(&self) -> Account {
        Account {
            user_id: self.user_id.clone(),
            email: self.email.clone(),
            email_verified: self.email_verified,
            id_token: SecretString::from(format!("memory:{}", self.user_id)),
        }
    }
}

#[derive(Debug, Default)]
pub struct MemoryIdentity {
    accounts: Mutex<HashMap<String, StoredAccount>>,
    verification_mails: AtomicUsize,
}

impl MemoryIdentity {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an account directly, bypassing sign-up.
    pub fn insert_account(&self, email: &str, password: &str, email_verified: bool) -> Account {
        let stored = StoredAccount {
            user_id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            password: password.to_string(),
            email_verified,
        };
        let account = stored.account();
        lock(&self.accounts).insert(email.to_string(), stored);
        account
    }

    /// Mark the account as verified, as following the emailed link would.
    pub fn verify_email(&self, email: &str) {
        if let Some(account) = lock(&self.accounts).get_mut(email) {
            account.email_verified = true;
        }
    }

    #[must_use]
    pub fn accounts(&self) -> usize {
        lock(&self.accounts).len()
    }

    #[must_use]
    pub fn verification_mails(&self) -> usize {
        self.verification_mails.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IdentityProvider for MemoryIdentity {
    async fn sign_up(&self, email: &str, password: &str) -> Result<Account, BackendError> {
        if password.len() < 6 {
            return Err(BackendError::new(
                "WEAK_PASSWORD : Password should be at least 6 characters",
            ));
        }
        if lock(&self.accounts).contains_key(email) {
            return Err(BackendError::new("EMAIL_EXISTS"));
        }
        Ok(self.insert_account(email, password, false))
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Account, BackendError> {
        lock(&self.accounts)
            .get(email)
            .filter(|account| account.password == password)
            .map(StoredAccount::account)
            .ok_or_else(|| BackendError::new("INVALID_LOGIN_CREDENTIALS"))
    }

    async fn lookup(&self, id_token: &SecretString) -> Result<Account, BackendError> {
        let user_id = id_token
            .expose_secret()
            .strip_prefix("memory:")
            .ok_or_else(|| BackendError::new("INVALID_ID_TOKEN"))?;
        lock(&self.accounts)
            .values()
            .find(|account| account.user_id == user_id)
            .map(StoredAccount::account)
            .ok_or_else(|| BackendError::new("USER_NOT_FOUND"))
    }

    async fn send_email_verification(&self, account: &Account) -> Result<(), BackendError> {
        info!(email = %account.email, "verification link issued");
        self.verification_mails.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn kind(&self) -> &'static str {
        "memory"
    }
}

#[derive(Debug, Default)]
pub struct MemoryProfiles {
    profiles: Mutex<HashMap<String, Profile>>,
    failure: Mutex<Option<String>>,
    creates: AtomicUsize,
}

impl MemoryProfiles {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a profile as an administrator would.
    pub fn insert(&self, profile: Profile) {
        lock(&self.profiles).insert(profile.user_id.clone(), profile);
    }

    #[must_use]
    pub fn profile(&self, user_id: &str) -> Option<Profile> {
        lock(&self.profiles).get(user_id).cloned()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        lock(&self.profiles).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of records written through [`ProfileStore::create`].
    #[must_use]
    pub fn creates(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    /// Make every following call fail with `message`.
    pub fn fail_with(&self, message: &str) {
        *lock(&self.failure) = Some(message.to_string());
    }

    fn check(&self) -> Result<(), BackendError> {
        match lock(&self.failure).as_deref() {
            Some(message) => Err(BackendError::new(message)),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ProfileStore for MemoryProfiles {
    async fn get(&self, user_id: &str) -> Result<Option<Profile>, BackendError> {
        self.check()?;
        Ok(self.profile(user_id))
    }

    async fn create(&self, profile: &Profile) -> Result<CreateOutcome, BackendError> {
        self.check()?;
        let mut profiles = lock(&self.profiles);
        if profiles.contains_key(&profile.user_id) {
            return Ok(CreateOutcome::AlreadyExists);
        }
        profiles.insert(profile.user_id.clone(), profile.clone());
        self.creates.fetch_add(1, Ordering::SeqCst);
        Ok(CreateOutcome::Created)
    }

    fn kind(&self) -> &'static str {
        "memory"
    }
}

#[derive(Debug, Default)]
pub struct MemoryOtp {
    codes: Mutex<HashMap<String, String>>,
    failure: Mutex<Option<String>>,
    sends: AtomicUsize,
    verifications: AtomicUsize,
}

impl MemoryOtp {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Last code issued for `email`.
    #[must_use]
    pub fn code_for(&self, email: &str) -> Option<String> {
        lock(&self.codes).get(email).cloned()
    }

    #[must_use]
    pub fn sends(&self) -> usize {
        self.sends.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn verifications(&self) -> usize {
        self.verifications.load(Ordering::SeqCst)
    }

    pub fn fail_with(&self, message: &str) {
        *lock(&self.failure) = Some(message.to_string());
    }

    fn check(&self) -> Result<(), BackendError> {
        match lock(&self.failure).as_deref() {
            Some(message) => Err(BackendError::new(message)),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl OtpService for MemoryOtp {
    async fn send_otp(&self, email: &str) -> Result<(), BackendError> {
        self.check()?;
        let code = format!("{:06}", rand::thread_rng().gen_range(0..1_000_000));
        info!(%email, %code, "one-time passcode issued");
        lock(&self.codes).insert(email.to_string(), code);
        self.sends.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn verify_otp(&self, email: &str, code: &str) -> Result<OtpVerdict, BackendError> {
        self.check()?;
        self.verifications.fetch_add(1, Ordering::SeqCst);
        let mut codes = lock(&self.codes);
        match codes.get(email) {
            Some(expected) if expected == code => {
                codes.remove(email);
                Ok(OtpVerdict::accepted())
            }
            Some(_) => Ok(OtpVerdict::refused("The code does not match.")),
            None => Ok(OtpVerdict::refused("No code was requested for this address.")),
        }
    }

    fn kind(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    #[tokio::test]
    async fn sign_up_rejects_duplicates() -> Result<()> {
        let identity = MemoryIdentity::new();
        identity.sign_up("a@example.com", "secret").await?;
        let again = identity.sign_up("a@example.com", "secret").await;
        assert_eq!(again.err(), Some(BackendError::new("EMAIL_EXISTS")));
        Ok(())
    }

    #[tokio::test]
    async fn lookup_resolves_issued_token() -> Result<()> {
        let identity = MemoryIdentity::new();
        let account = identity.insert_account("a@example.com", "secret", true);
        let found = identity.lookup(&account.id_token).await?;
        assert_eq!(found.user_id, account.user_id);
        Ok(())
    }

    #[tokio::test]
    async fn code_is_single_use() -> Result<()> {
        let otp = MemoryOtp::new();
        otp.send_otp("a@example.com").await?;
        let code = otp.code_for("a@example.com").unwrap_or_default();
        assert_eq!(code.len(), 6);

        assert!(otp.verify_otp("a@example.com", &code).await?.success);
        assert!(!otp.verify_otp("a@example.com", &code).await?.success);
        Ok(())
    }

    #[tokio::test]
    async fn create_is_keyed_by_user_id() -> Result<()> {
        let store = MemoryProfiles::new();
        let profile = Profile::member("u1", "a@example.com", false);
        assert_eq!(store.create(&profile).await?, CreateOutcome::Created);
        assert_eq!(store.create(&profile).await?, CreateOutcome::AlreadyExists);
        assert_eq!(store.creates(), 1);
        Ok(())
    }
}
