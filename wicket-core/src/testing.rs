//! In-memory test doubles shared by the service unit tests.

use std::sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    Error,
    account::{Account, AccountId, NewAccount},
    error::{ConflictError, StorageError},
    notifier::{Delivery, Notifier},
    profile::{NewProfile, Profile},
    store::{CollisionField, CredentialStore, CredentialTx},
};

#[derive(Default)]
pub(crate) struct MemoryState {
    pub accounts: Vec<Account>,
    pub profiles: Vec<Profile>,
}

#[derive(Default)]
pub(crate) struct TxCounters {
    pub begins: AtomicUsize,
    pub commits: AtomicUsize,
    pub rollbacks: AtomicUsize,
    /// Number of upcoming commits to fail with a transient error.
    pub fail_commits: AtomicUsize,
}

impl TxCounters {
    fn take_fail_commit(&self) -> bool {
        self.fail_commits
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

/// Transactional in-memory credential store. Writes stage inside the
/// transaction and constraints are re-checked at commit, so racing
/// transactions behave like they do against a real database: the first
/// commit wins, the loser sees a conflict and leaves nothing behind.
#[derive(Default)]
pub(crate) struct MemoryStore {
    pub state: Arc<Mutex<MemoryState>>,
    pub counters: Arc<TxCounters>,
}

impl MemoryStore {
    pub fn fail_next_commits(&self, n: usize) {
        self.counters.fail_commits.store(n, Ordering::SeqCst);
    }

    pub fn begins(&self) -> usize {
        self.counters.begins.load(Ordering::SeqCst)
    }

    pub fn rollbacks(&self) -> usize {
        self.counters.rollbacks.load(Ordering::SeqCst)
    }

    pub fn account_count(&self) -> usize {
        self.state.lock().unwrap().accounts.len()
    }

    pub fn profile_count(&self) -> usize {
        self.state.lock().unwrap().profiles.len()
    }

    pub fn account_by_email(&self, email: &str) -> Option<Account> {
        self.state
            .lock()
            .unwrap()
            .accounts
            .iter()
            .find(|a| a.email == email)
            .cloned()
    }

    fn update_account<F>(&self, account_id: &AccountId, f: F) -> Result<(), Error>
    where
        F: FnOnce(&mut Account),
    {
        let mut state = self.state.lock().unwrap();
        let account = state
            .accounts
            .iter_mut()
            .find(|a| &a.id == account_id)
            .ok_or(Error::Storage(StorageError::Database(
                "no such account".to_string(),
            )))?;
        f(account);
        account.updated_at = Utc::now();
        Ok(())
    }
}

pub(crate) struct MemoryTx {
    state: Arc<Mutex<MemoryState>>,
    counters: Arc<TxCounters>,
    inserted_accounts: Vec<Account>,
    inserted_profiles: Vec<Profile>,
    bound: Vec<(AccountId, String, bool)>,
}

fn materialize_account(new: NewAccount) -> Account {
    let now = Utc::now();
    Account {
        id: new.id,
        email: new.email,
        password_hash: new.password_hash,
        provider_subject: new.provider_subject,
        email_verified_at: if new.email_verified { Some(now) } else { None },
        verification_token: new.verification_token,
        verification_expires_at: new.verification_expires_at,
        reset_token: None,
        reset_expires_at: None,
        created_at: now,
        updated_at: now,
    }
}

#[async_trait]
impl CredentialTx for MemoryTx {
    async fn insert_account(&mut self, account: NewAccount) -> Result<Account, Error> {
        {
            let state = self.state.lock().unwrap();
            let email_taken = state.accounts.iter().any(|a| a.email == account.email)
                || self.inserted_accounts.iter().any(|a| a.email == account.email);
            if email_taken {
                return Err(ConflictError::EmailTaken.into());
            }
            if let Some(subject) = &account.provider_subject {
                let linked = state
                    .accounts
                    .iter()
                    .any(|a| a.provider_subject.as_deref() == Some(subject));
                if linked {
                    return Err(ConflictError::SubjectAlreadyLinked.into());
                }
            }
        }

        let account = materialize_account(account);
        self.inserted_accounts.push(account.clone());
        Ok(account)
    }

    async fn insert_profile(&mut self, profile: NewProfile) -> Result<Profile, Error> {
        {
            let state = self.state.lock().unwrap();
            let username_taken = state.profiles.iter().any(|p| p.username == profile.username)
                || self
                    .inserted_profiles
                    .iter()
                    .any(|p| p.username == profile.username);
            if username_taken {
                return Err(ConflictError::UsernameTaken.into());
            }
        }

        let now = Utc::now();
        let profile = Profile {
            account_id: profile.account_id,
            username: profile.username,
            avatar_url: profile.avatar_url,
            created_at: now,
            updated_at: now,
        };
        self.inserted_profiles.push(profile.clone());
        Ok(profile)
    }

    async fn find_account_by_subject_or_email(
        &mut self,
        subject: &str,
        email: &str,
    ) -> Result<Option<Account>, Error> {
        let state = self.state.lock().unwrap();
        let by_subject = state
            .accounts
            .iter()
            .find(|a| a.provider_subject.as_deref() == Some(subject));
        let found = by_subject
            .or_else(|| state.accounts.iter().find(|a| a.email == email))
            .cloned();
        Ok(found)
    }

    async fn find_profile(&mut self, account_id: &AccountId) -> Result<Option<Profile>, Error> {
        let state = self.state.lock().unwrap();
        let found = state
            .profiles
            .iter()
            .chain(self.inserted_profiles.iter())
            .find(|p| &p.account_id == account_id)
            .cloned();
        Ok(found)
    }

    async fn bind_provider(
        &mut self,
        account_id: &AccountId,
        subject: &str,
        email_verified: bool,
    ) -> Result<(), Error> {
        self.bound
            .push((account_id.clone(), subject.to_string(), email_verified));
        Ok(())
    }

    async fn username_exists(&mut self, username: &str) -> Result<bool, Error> {
        let state = self.state.lock().unwrap();
        Ok(state.profiles.iter().any(|p| p.username == username)
            || self.inserted_profiles.iter().any(|p| p.username == username))
    }

    async fn commit(self) -> Result<(), Error> {
        self.counters.commits.fetch_add(1, Ordering::SeqCst);
        if self.counters.take_fail_commit() {
            return Err(StorageError::Transient("injected commit failure".to_string()).into());
        }

        let mut state = self.state.lock().unwrap();

        // Constraint re-check before any write, so a losing racer leaves
        // no partial account/profile pair behind.
        for account in &self.inserted_accounts {
            if state.accounts.iter().any(|a| a.email == account.email) {
                return Err(ConflictError::EmailTaken.into());
            }
            if let Some(subject) = &account.provider_subject {
                if state
                    .accounts
                    .iter()
                    .any(|a| a.provider_subject.as_deref() == Some(subject.as_str()))
                {
                    return Err(ConflictError::SubjectAlreadyLinked.into());
                }
            }
        }
        for profile in &self.inserted_profiles {
            if state.profiles.iter().any(|p| p.username == profile.username) {
                return Err(ConflictError::UsernameTaken.into());
            }
        }

        state.accounts.extend(self.inserted_accounts);
        state.profiles.extend(self.inserted_profiles);
        for (account_id, subject, verified) in self.bound {
            if let Some(account) = state.accounts.iter_mut().find(|a| a.id == account_id) {
                account.provider_subject = Some(subject);
                if verified && account.email_verified_at.is_none() {
                    account.email_verified_at = Some(Utc::now());
                }
                account.updated_at = Utc::now();
            }
        }
        Ok(())
    }

    async fn rollback(self) -> Result<(), Error> {
        self.counters.rollbacks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    type Tx = MemoryTx;

    async fn begin(&self) -> Result<Self::Tx, Error> {
        self.counters.begins.fetch_add(1, Ordering::SeqCst);
        Ok(MemoryTx {
            state: Arc::clone(&self.state),
            counters: Arc::clone(&self.counters),
            inserted_accounts: Vec::new(),
            inserted_profiles: Vec::new(),
            bound: Vec::new(),
        })
    }

    async fn find_account_by_id(&self, id: &AccountId) -> Result<Option<Account>, Error> {
        let state = self.state.lock().unwrap();
        Ok(state.accounts.iter().find(|a| &a.id == id).cloned())
    }

    async fn find_account_by_email(&self, email: &str) -> Result<Option<Account>, Error> {
        let state = self.state.lock().unwrap();
        Ok(state.accounts.iter().find(|a| a.email == email).cloned())
    }

    async fn find_account_by_verification_token(
        &self,
        token: &str,
    ) -> Result<Option<Account>, Error> {
        let state = self.state.lock().unwrap();
        Ok(state
            .accounts
            .iter()
            .find(|a| a.verification_token.as_deref() == Some(token))
            .cloned())
    }

    async fn find_account_by_reset_token(&self, token: &str) -> Result<Option<Account>, Error> {
        let state = self.state.lock().unwrap();
        Ok(state
            .accounts
            .iter()
            .find(|a| a.reset_token.as_deref() == Some(token))
            .cloned())
    }

    async fn find_profile(&self, account_id: &AccountId) -> Result<Option<Profile>, Error> {
        let state = self.state.lock().unwrap();
        Ok(state
            .profiles
            .iter()
            .find(|p| &p.account_id == account_id)
            .cloned())
    }

    async fn check_collision(
        &self,
        email: &str,
        username: &str,
    ) -> Result<Option<CollisionField>, Error> {
        let state = self.state.lock().unwrap();
        if state.accounts.iter().any(|a| a.email == email) {
            return Ok(Some(CollisionField::Email));
        }
        if state.profiles.iter().any(|p| p.username == username) {
            return Ok(Some(CollisionField::Username));
        }
        Ok(None)
    }

    async fn set_verification_token(
        &self,
        account_id: &AccountId,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), Error> {
        self.update_account(account_id, |a| {
            a.verification_token = Some(token.to_string());
            a.verification_expires_at = Some(expires_at);
        })
    }

    async fn mark_email_verified(&self, account_id: &AccountId) -> Result<(), Error> {
        self.update_account(account_id, |a| {
            a.email_verified_at = Some(Utc::now());
            a.verification_expires_at = None;
        })
    }

    async fn set_reset_token(
        &self,
        account_id: &AccountId,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), Error> {
        self.update_account(account_id, |a| {
            a.reset_token = Some(token.to_string());
            a.reset_expires_at = Some(expires_at);
        })
    }

    async fn complete_password_reset(
        &self,
        account_id: &AccountId,
        password_hash: &str,
    ) -> Result<(), Error> {
        self.update_account(account_id, |a| {
            a.password_hash = Some(password_hash.to_string());
            a.reset_token = None;
            a.reset_expires_at = None;
        })
    }
}

/// Notifier double: records every send, and can be told to fail or to
/// sleep past the caller's deadline.
#[derive(Default)]
pub(crate) struct TestNotifier {
    pub sent: Mutex<Vec<(String, String, String)>>,
    pub fail: bool,
    pub delay: Option<std::time::Duration>,
}

impl TestNotifier {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn slow(delay: std::time::Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Default::default()
        }
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    pub fn last_body(&self) -> Option<String> {
        self.sent.lock().unwrap().last().map(|(_, _, b)| b.clone())
    }
}

#[async_trait]
impl Notifier for TestNotifier {
    async fn send(&self, to: &str, subject: &str, html_body: &str) -> Delivery {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Delivery::failed("smtp unavailable");
        }
        self.sent
            .lock()
            .unwrap()
            .push((to.to_string(), subject.to_string(), html_body.to_string()));
        Delivery::sent()
    }
}
