//! Postgres-backed credential and activity stores.
//!
//! Every statement is wrapped in a `db.query` span. Single-use tokens are
//! consumed with conditional `UPDATE ... RETURNING`-style statements so two
//! concurrent confirmations cannot both succeed, and the refresh-token swap
//! is a single conditional `UPDATE` (the compare-and-swap).

use anyhow::Context;
use async_trait::async_trait;
use sqlx::{PgPool, Row, postgres::PgRow};
use time::OffsetDateTime;
use tracing::{Instrument, Span, info_span, warn};
use uuid::Uuid;

use super::{
    Account, ActivityKind, ActivityLogStore, ActivityRecord, CredentialStore, NewAccount,
    NewActivity, StoreError, password,
};

const PURPOSE_EMAIL_VERIFICATION: &str = "email_verification";
const PURPOSE_PASSWORD_RESET: &str = "password_reset";

const ACCOUNT_COLUMNS: &str = r"
    id, email, first_name, last_name, email_confirmed,
    refresh_token_expires_at, created_at, last_login_at
";

pub struct PgCredentialStore {
    pool: PgPool,
}

impl PgCredentialStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

pub struct PgActivityLog {
    pool: PgPool,
}

impl PgActivityLog {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn query_span(operation: &'static str, query: &str) -> Span {
    info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = operation,
        db.statement = query
    )
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}

fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23503"),
        _ => false,
    }
}

fn account_from_row(row: &PgRow) -> Account {
    Account {
        id: row.get("id"),
        email: row.get("email"),
        first_name: row.get("first_name"),
        last_name: row.get("last_name"),
        email_confirmed: row.get("email_confirmed"),
        refresh_token_expires_at: row.get("refresh_token_expires_at"),
        created_at: row.get("created_at"),
        last_login_at: row.get("last_login_at"),
    }
}

impl PgCredentialStore {
    async fn fetch_password_hash(&self, id: Uuid) -> Result<String, StoreError> {
        let query = "SELECT password_hash FROM accounts WHERE id = $1";
        let row = sqlx::query(query)
            .bind(id)
            .fetch_optional(&self.pool)
            .instrument(query_span("SELECT", query))
            .await
            .context("failed to load password hash")?
            .ok_or(StoreError::NotFound)?;
        Ok(row.get("password_hash"))
    }

    async fn mint_token(
        &self,
        id: Uuid,
        purpose: &'static str,
        ttl_seconds: i64,
    ) -> Result<String, StoreError> {
        let token = super::generate_token(32)?;
        let hash = super::token_hash(&token);
        let query = r"
            INSERT INTO account_tokens (account_id, purpose, token_hash, expires_at)
            VALUES ($1, $2, $3, NOW() + ($4 * INTERVAL '1 second'))
        ";
        sqlx::query(query)
            .bind(id)
            .bind(purpose)
            .bind(&hash)
            .bind(ttl_seconds)
            .execute(&self.pool)
            .instrument(query_span("INSERT", query))
            .await
            .map_err(|err| {
                if is_foreign_key_violation(&err) {
                    StoreError::NotFound
                } else {
                    StoreError::Internal(anyhow::Error::new(err).context("failed to mint token"))
                }
            })?;
        Ok(token)
    }

    /// Spend a token inside an open transaction. Returns `false` when no
    /// matching live token exists.
    async fn consume_token(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        id: Uuid,
        token: &str,
        purpose: &'static str,
    ) -> Result<bool, StoreError> {
        let hash = super::token_hash(token);
        let query = r"
            UPDATE account_tokens
            SET consumed_at = NOW()
            WHERE account_id = $1
              AND purpose = $2
              AND token_hash = $3
              AND consumed_at IS NULL
              AND expires_at > NOW()
        ";
        let result = sqlx::query(query)
            .bind(id)
            .bind(purpose)
            .bind(&hash)
            .execute(&mut **tx)
            .instrument(query_span("UPDATE", query))
            .await
            .context("failed to consume token")?;
        Ok(result.rows_affected() == 1)
    }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, StoreError> {
        let query = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE email = $1");
        let row = sqlx::query(&query)
            .bind(email)
            .fetch_optional(&self.pool)
            .instrument(query_span("SELECT", &query))
            .await
            .context("failed to load account by email")?;
        Ok(row.as_ref().map(account_from_row))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>, StoreError> {
        let query = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = $1");
        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .instrument(query_span("SELECT", &query))
            .await
            .context("failed to load account by id")?;
        Ok(row.as_ref().map(account_from_row))
    }

    async fn create(&self, account: NewAccount) -> Result<Account, StoreError> {
        password::validate_policy(&account.password).map_err(StoreError::WeakPassword)?;
        let password_hash = password::hash(&account.password)?;

        let query = format!(
            r"
            INSERT INTO accounts (email, first_name, last_name, password_hash)
            VALUES ($1, $2, $3, $4)
            RETURNING {ACCOUNT_COLUMNS}
        "
        );
        let row = sqlx::query(&query)
            .bind(&account.email)
            .bind(&account.first_name)
            .bind(&account.last_name)
            .bind(&password_hash)
            .fetch_one(&self.pool)
            .instrument(query_span("INSERT", &query))
            .await
            .map_err(|err| {
                if is_unique_violation(&err) {
                    StoreError::EmailExists
                } else {
                    StoreError::Internal(
                        anyhow::Error::new(err).context("failed to create account"),
                    )
                }
            })?;
        Ok(account_from_row(&row))
    }

    async fn verify_password(&self, id: Uuid, password_input: &str) -> Result<bool, StoreError> {
        let stored_hash = self.fetch_password_hash(id).await?;
        password::verify(password_input, &stored_hash)
    }

    async fn set_refresh_token(
        &self,
        id: Uuid,
        token_hash: &[u8],
        expires_at: OffsetDateTime,
    ) -> Result<(), StoreError> {
        let query = r"
            UPDATE accounts
            SET refresh_token_hash = $2, refresh_token_expires_at = $3
            WHERE id = $1
        ";
        let result = sqlx::query(query)
            .bind(id)
            .bind(token_hash)
            .bind(expires_at)
            .execute(&self.pool)
            .instrument(query_span("UPDATE", query))
            .await
            .context("failed to store refresh token")?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn rotate_refresh_token(
        &self,
        id: Uuid,
        presented_hash: &[u8],
        next_hash: &[u8],
        expires_at: OffsetDateTime,
    ) -> Result<bool, StoreError> {
        // Single conditional UPDATE: of N concurrent rotations with the same
        // presented token, exactly one matches the stored hash.
        let query = r"
            UPDATE accounts
            SET refresh_token_hash = $3, refresh_token_expires_at = $4
            WHERE id = $1
              AND refresh_token_hash = $2
              AND refresh_token_expires_at > NOW()
        ";
        let result = sqlx::query(query)
            .bind(id)
            .bind(presented_hash)
            .bind(next_hash)
            .bind(expires_at)
            .execute(&self.pool)
            .instrument(query_span("UPDATE", query))
            .await
            .context("failed to rotate refresh token")?;
        Ok(result.rows_affected() == 1)
    }

    async fn clear_refresh_token(&self, id: Uuid) -> Result<bool, StoreError> {
        let query = r"
            UPDATE accounts
            SET refresh_token_hash = NULL, refresh_token_expires_at = NULL
            WHERE id = $1 AND refresh_token_hash IS NOT NULL
        ";
        let result = sqlx::query(query)
            .bind(id)
            .execute(&self.pool)
            .instrument(query_span("UPDATE", query))
            .await
            .context("failed to clear refresh token")?;
        if result.rows_affected() == 1 {
            return Ok(true);
        }
        // Distinguish "no live token" from "no such account".
        let query = "SELECT 1 AS present FROM accounts WHERE id = $1";
        let exists = sqlx::query(query)
            .bind(id)
            .fetch_optional(&self.pool)
            .instrument(query_span("SELECT", query))
            .await
            .context("failed to load account for revocation")?;
        if exists.is_none() {
            return Err(StoreError::NotFound);
        }
        Ok(false)
    }

    async fn touch_last_login(&self, id: Uuid) -> Result<(), StoreError> {
        let query = "UPDATE accounts SET last_login_at = NOW() WHERE id = $1";
        let result = sqlx::query(query)
            .bind(id)
            .execute(&self.pool)
            .instrument(query_span("UPDATE", query))
            .await
            .context("failed to record login time")?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn generate_email_token(
        &self,
        id: Uuid,
        ttl_seconds: i64,
    ) -> Result<String, StoreError> {
        self.mint_token(id, PURPOSE_EMAIL_VERIFICATION, ttl_seconds)
            .await
    }

    async fn confirm_email(&self, id: Uuid, token: &str) -> Result<bool, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("failed to start confirm-email transaction")?;

        let query = "SELECT email_confirmed FROM accounts WHERE id = $1 FOR UPDATE";
        let row = sqlx::query(query)
            .bind(id)
            .fetch_optional(&mut *tx)
            .instrument(query_span("SELECT", query))
            .await
            .context("failed to load account for confirmation")?
            .ok_or(StoreError::NotFound)?;
        if row.get::<bool, _>("email_confirmed") {
            // Idempotent: a confirmed address stays confirmed.
            tx.commit()
                .await
                .context("failed to commit confirm-email transaction")?;
            return Ok(true);
        }

        if !Self::consume_token(&mut tx, id, token, PURPOSE_EMAIL_VERIFICATION).await? {
            let _ = tx.rollback().await;
            return Ok(false);
        }

        let query = "UPDATE accounts SET email_confirmed = TRUE WHERE id = $1";
        sqlx::query(query)
            .bind(id)
            .execute(&mut *tx)
            .instrument(query_span("UPDATE", query))
            .await
            .context("failed to mark email confirmed")?;

        tx.commit()
            .await
            .context("failed to commit confirm-email transaction")?;
        Ok(true)
    }

    async fn generate_reset_token(
        &self,
        id: Uuid,
        ttl_seconds: i64,
    ) -> Result<String, StoreError> {
        self.mint_token(id, PURPOSE_PASSWORD_RESET, ttl_seconds).await
    }

    async fn reset_password(
        &self,
        id: Uuid,
        token: &str,
        new_password: &str,
    ) -> Result<(), StoreError> {
        // Policy first so a weak password does not spend the token.
        password::validate_policy(new_password).map_err(StoreError::WeakPassword)?;
        let password_hash = password::hash(new_password)?;

        let mut tx = self
            .pool
            .begin()
            .await
            .context("failed to start reset-password transaction")?;

        let query = "SELECT 1 AS present FROM accounts WHERE id = $1 FOR UPDATE";
        let exists = sqlx::query(query)
            .bind(id)
            .fetch_optional(&mut *tx)
            .instrument(query_span("SELECT", query))
            .await
            .context("failed to load account for reset")?;
        if exists.is_none() {
            let _ = tx.rollback().await;
            return Err(StoreError::NotFound);
        }

        if !Self::consume_token(&mut tx, id, token, PURPOSE_PASSWORD_RESET).await? {
            let _ = tx.rollback().await;
            return Err(StoreError::InvalidToken);
        }

        let query = "UPDATE accounts SET password_hash = $2 WHERE id = $1";
        sqlx::query(query)
            .bind(id)
            .bind(&password_hash)
            .execute(&mut *tx)
            .instrument(query_span("UPDATE", query))
            .await
            .context("failed to replace password")?;

        tx.commit()
            .await
            .context("failed to commit reset-password transaction")?;
        Ok(())
    }

    async fn change_password(
        &self,
        id: Uuid,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), StoreError> {
        let stored_hash = self.fetch_password_hash(id).await?;
        if !password::verify(current_password, &stored_hash)? {
            return Err(StoreError::PasswordMismatch);
        }
        password::validate_policy(new_password).map_err(StoreError::WeakPassword)?;
        let password_hash = password::hash(new_password)?;

        let query = "UPDATE accounts SET password_hash = $2 WHERE id = $1";
        let result = sqlx::query(query)
            .bind(id)
            .bind(&password_hash)
            .execute(&self.pool)
            .instrument(query_span("UPDATE", query))
            .await
            .context("failed to replace password")?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

#[async_trait]
impl ActivityLogStore for PgActivityLog {
    async fn append(&self, activity: NewActivity) -> Result<(), StoreError> {
        let query = r"
            INSERT INTO activity_log
                (account_id, kind, description, ip_address, user_agent, success, detail)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
        ";
        sqlx::query(query)
            .bind(activity.account_id)
            .bind(activity.kind.as_str())
            .bind(&activity.description)
            .bind(&activity.ip_address)
            .bind(&activity.user_agent)
            .bind(activity.success)
            .bind(&activity.detail)
            .execute(&self.pool)
            .instrument(query_span("INSERT", query))
            .await
            .context("failed to append activity record")?;
        Ok(())
    }

    async fn list_for_account(
        &self,
        account_id: Uuid,
    ) -> Result<Vec<ActivityRecord>, StoreError> {
        let query = r"
            SELECT id, account_id, kind, description, ip_address, user_agent,
                   success, detail, created_at
            FROM activity_log
            WHERE account_id = $1
            ORDER BY created_at DESC
        ";
        let rows = sqlx::query(query)
            .bind(account_id)
            .fetch_all(&self.pool)
            .instrument(query_span("SELECT", query))
            .await
            .context("failed to list activity records")?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let kind_text: String = row.get("kind");
            let Some(kind) = ActivityKind::parse(&kind_text) else {
                warn!(kind = %kind_text, "skipping activity record with unknown kind");
                continue;
            };
            records.push(ActivityRecord {
                id: row.get("id"),
                account_id: row.get("account_id"),
                kind,
                description: row.get("description"),
                ip_address: row.get("ip_address"),
                user_agent: row.get("user_agent"),
                success: row.get("success"),
                detail: row.get("detail"),
                created_at: row.get("created_at"),
            });
        }
        Ok(records)
    }
}
