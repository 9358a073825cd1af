//! In-memory store used for local development and tests.
//!
//! Mirrors the Postgres implementation's semantics, including single-use
//! token consumption and the atomic refresh-token swap.

use async_trait::async_trait;
use std::collections::HashMap;
use time::{Duration, OffsetDateTime};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{
    Account, ActivityKind, ActivityLogStore, ActivityRecord, CredentialStore, NewAccount,
    NewActivity, StoreError, generate_token, password, token_hash,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum TokenPurpose {
    EmailVerification,
    PasswordReset,
}

#[derive(Clone, Debug)]
struct StoredToken {
    account_id: Uuid,
    purpose: TokenPurpose,
    expires_at: OffsetDateTime,
    consumed: bool,
}

#[derive(Clone, Debug)]
struct StoredAccount {
    id: Uuid,
    email: String,
    first_name: String,
    last_name: String,
    email_confirmed: bool,
    password_hash: String,
    refresh_token_hash: Option<Vec<u8>>,
    refresh_token_expires_at: Option<OffsetDateTime>,
    created_at: OffsetDateTime,
    last_login_at: Option<OffsetDateTime>,
}

impl StoredAccount {
    fn to_account(&self) -> Account {
        Account {
            id: self.id,
            email: self.email.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            email_confirmed: self.email_confirmed,
            refresh_token_expires_at: self.refresh_token_expires_at,
            created_at: self.created_at,
            last_login_at: self.last_login_at,
        }
    }
}

#[derive(Default)]
pub struct MemoryCredentialStore {
    accounts: Mutex<HashMap<Uuid, StoredAccount>>,
    // Keyed by token hash, like the `account_tokens` table.
    tokens: Mutex<HashMap<Vec<u8>, StoredToken>>,
}

impl MemoryCredentialStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Test support: current refresh token hash for an account.
    pub async fn stored_refresh_token_hash(&self, id: Uuid) -> Option<Vec<u8>> {
        let accounts = self.accounts.lock().await;
        accounts.get(&id).and_then(|a| a.refresh_token_hash.clone())
    }

    async fn consume_token(
        &self,
        id: Uuid,
        token: &str,
        purpose: TokenPurpose,
    ) -> Result<bool, StoreError> {
        let hash = token_hash(token);
        let mut tokens = self.tokens.lock().await;
        let Some(stored) = tokens.get_mut(&hash) else {
            return Ok(false);
        };
        if stored.account_id != id
            || stored.purpose != purpose
            || stored.consumed
            || stored.expires_at <= OffsetDateTime::now_utc()
        {
            return Ok(false);
        }
        stored.consumed = true;
        Ok(true)
    }

    async fn mint_token(
        &self,
        id: Uuid,
        purpose: TokenPurpose,
        ttl_seconds: i64,
    ) -> Result<String, StoreError> {
        {
            let accounts = self.accounts.lock().await;
            if !accounts.contains_key(&id) {
                return Err(StoreError::NotFound);
            }
        }
        let token = generate_token(32)?;
        let mut tokens = self.tokens.lock().await;
        tokens.insert(
            token_hash(&token),
            StoredToken {
                account_id: id,
                purpose,
                expires_at: OffsetDateTime::now_utc() + Duration::seconds(ttl_seconds),
                consumed: false,
            },
        );
        Ok(token)
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, StoreError> {
        let accounts = self.accounts.lock().await;
        Ok(accounts
            .values()
            .find(|account| account.email == email)
            .map(StoredAccount::to_account))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>, StoreError> {
        let accounts = self.accounts.lock().await;
        Ok(accounts.get(&id).map(StoredAccount::to_account))
    }

    async fn create(&self, account: NewAccount) -> Result<Account, StoreError> {
        password::validate_policy(&account.password).map_err(StoreError::WeakPassword)?;
        let password_hash = password::hash(&account.password)?;

        let mut accounts = self.accounts.lock().await;
        if accounts.values().any(|a| a.email == account.email) {
            return Err(StoreError::EmailExists);
        }
        let stored = StoredAccount {
            id: Uuid::new_v4(),
            email: account.email,
            first_name: account.first_name,
            last_name: account.last_name,
            email_confirmed: false,
            password_hash,
            refresh_token_hash: None,
            refresh_token_expires_at: None,
            created_at: OffsetDateTime::now_utc(),
            last_login_at: None,
        };
        let result = stored.to_account();
        accounts.insert(stored.id, stored);
        Ok(result)
    }

    async fn verify_password(&self, id: Uuid, password_input: &str) -> Result<bool, StoreError> {
        let stored_hash = {
            let accounts = self.accounts.lock().await;
            accounts
                .get(&id)
                .map(|a| a.password_hash.clone())
                .ok_or(StoreError::NotFound)?
        };
        password::verify(password_input, &stored_hash)
    }

    async fn set_refresh_token(
        &self,
        id: Uuid,
        token_hash: &[u8],
        expires_at: OffsetDateTime,
    ) -> Result<(), StoreError> {
        let mut accounts = self.accounts.lock().await;
        let account = accounts.get_mut(&id).ok_or(StoreError::NotFound)?;
        account.refresh_token_hash = Some(token_hash.to_vec());
        account.refresh_token_expires_at = Some(expires_at);
        Ok(())
    }

    async fn rotate_refresh_token(
        &self,
        id: Uuid,
        presented_hash: &[u8],
        next_hash: &[u8],
        expires_at: OffsetDateTime,
    ) -> Result<bool, StoreError> {
        let mut accounts = self.accounts.lock().await;
        let Some(account) = accounts.get_mut(&id) else {
            return Ok(false);
        };
        let live = account.refresh_token_hash.as_deref() == Some(presented_hash)
            && account
                .refresh_token_expires_at
                .is_some_and(|at| at > OffsetDateTime::now_utc());
        if !live {
            return Ok(false);
        }
        account.refresh_token_hash = Some(next_hash.to_vec());
        account.refresh_token_expires_at = Some(expires_at);
        Ok(true)
    }

    async fn clear_refresh_token(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut accounts = self.accounts.lock().await;
        let account = accounts.get_mut(&id).ok_or(StoreError::NotFound)?;
        let had_token = account.refresh_token_hash.is_some();
        account.refresh_token_hash = None;
        account.refresh_token_expires_at = None;
        Ok(had_token)
    }

    async fn touch_last_login(&self, id: Uuid) -> Result<(), StoreError> {
        let mut accounts = self.accounts.lock().await;
        let account = accounts.get_mut(&id).ok_or(StoreError::NotFound)?;
        account.last_login_at = Some(OffsetDateTime::now_utc());
        Ok(())
    }

    async fn generate_email_token(
        &self,
        id: Uuid,
        ttl_seconds: i64,
    ) -> Result<String, StoreError> {
        self.mint_token(id, TokenPurpose::EmailVerification, ttl_seconds)
            .await
    }

    async fn confirm_email(&self, id: Uuid, token: &str) -> Result<bool, StoreError> {
        {
            let accounts = self.accounts.lock().await;
            let account = accounts.get(&id).ok_or(StoreError::NotFound)?;
            if account.email_confirmed {
                // Idempotent: re-verifying an already confirmed address succeeds.
                return Ok(true);
            }
        }
        if !self
            .consume_token(id, token, TokenPurpose::EmailVerification)
            .await?
        {
            return Ok(false);
        }
        let mut accounts = self.accounts.lock().await;
        let account = accounts.get_mut(&id).ok_or(StoreError::NotFound)?;
        account.email_confirmed = true;
        Ok(true)
    }

    async fn generate_reset_token(
        &self,
        id: Uuid,
        ttl_seconds: i64,
    ) -> Result<String, StoreError> {
        self.mint_token(id, TokenPurpose::PasswordReset, ttl_seconds)
            .await
    }

    async fn reset_password(
        &self,
        id: Uuid,
        token: &str,
        new_password: &str,
    ) -> Result<(), StoreError> {
        {
            let accounts = self.accounts.lock().await;
            if !accounts.contains_key(&id) {
                return Err(StoreError::NotFound);
            }
        }
        // Policy first so a weak password does not spend the token.
        password::validate_policy(new_password).map_err(StoreError::WeakPassword)?;
        if !self
            .consume_token(id, token, TokenPurpose::PasswordReset)
            .await?
        {
            return Err(StoreError::InvalidToken);
        }
        let password_hash = password::hash(new_password)?;
        let mut accounts = self.accounts.lock().await;
        let account = accounts.get_mut(&id).ok_or(StoreError::NotFound)?;
        account.password_hash = password_hash;
        Ok(())
    }

    async fn change_password(
        &self,
        id: Uuid,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), StoreError> {
        if !self.verify_password(id, current_password).await? {
            return Err(StoreError::PasswordMismatch);
        }
        password::validate_policy(new_password).map_err(StoreError::WeakPassword)?;
        let password_hash = password::hash(new_password)?;
        let mut accounts = self.accounts.lock().await;
        let account = accounts.get_mut(&id).ok_or(StoreError::NotFound)?;
        account.password_hash = password_hash;
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryActivityLog {
    records: Mutex<Vec<ActivityRecord>>,
}

impl MemoryActivityLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Test support: every record, including unattributed ones.
    pub async fn snapshot(&self) -> Vec<ActivityRecord> {
        self.records.lock().await.clone()
    }
}

#[async_trait]
impl ActivityLogStore for MemoryActivityLog {
    async fn append(&self, activity: NewActivity) -> Result<(), StoreError> {
        let mut records = self.records.lock().await;
        records.push(ActivityRecord {
            id: Uuid::new_v4(),
            account_id: activity.account_id,
            kind: activity.kind,
            description: activity.description,
            ip_address: activity.ip_address,
            user_agent: activity.user_agent,
            success: activity.success,
            detail: activity.detail,
            created_at: OffsetDateTime::now_utc(),
        });
        Ok(())
    }

    async fn list_for_account(
        &self,
        account_id: Uuid,
    ) -> Result<Vec<ActivityRecord>, StoreError> {
        let records = self.records.lock().await;
        let mut matching: Vec<ActivityRecord> = records
            .iter()
            .filter(|record| record.account_id == Some(account_id))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(matching)
    }
}
