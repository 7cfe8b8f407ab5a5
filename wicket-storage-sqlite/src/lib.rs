//! SQLite credential store
//!
//! Implements [`CredentialStore`] over a `sqlx` connection pool. Each
//! [`SqliteTx`] wraps one `sqlx::Transaction`, which pins a single
//! pooled connection for the transaction's lifetime and releases it
//! exactly once: on commit, on rollback, or on drop (which rolls back).
//! Concurrent requests therefore never share transaction state.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Sqlite, Transaction};

pub use sqlx::SqlitePool;
use wicket_core::{
    Account, AccountId, CollisionField, CredentialStore, CredentialTx, Error, NewAccount,
    NewProfile, Profile,
    error::{ConflictError, StorageError},
};

mod rows;

use rows::{SqliteAccount, SqliteProfile};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS accounts (
    id TEXT PRIMARY KEY,
    email TEXT NOT NULL UNIQUE,
    password_hash TEXT,
    provider_subject TEXT UNIQUE,
    email_verified_at INTEGER,
    verification_token TEXT UNIQUE,
    verification_expires_at INTEGER,
    reset_token TEXT UNIQUE,
    reset_expires_at INTEGER,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS profiles (
    account_id TEXT PRIMARY KEY REFERENCES accounts(id),
    username TEXT NOT NULL UNIQUE,
    avatar_url TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);
"#;

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn connect(url: &str) -> Result<Self, Error> {
        let pool = SqlitePool::connect(url)
            .await
            .map_err(|e| Error::Storage(StorageError::Connection(e.to_string())))?;
        Ok(Self::new(pool))
    }

    /// Create the schema if it does not exist yet.
    pub async fn migrate(&self) -> Result<(), Error> {
        let mut conn = self.pool.acquire().await.map_err(map_sqlx_err)?;
        sqlx::raw_sql(SCHEMA)
            .execute(&mut *conn)
            .await
            .map_err(map_sqlx_err)?;
        tracing::debug!("sqlite schema ready");
        Ok(())
    }
}

/// Map driver errors onto the core taxonomy.
///
/// Unique-constraint violations become the specific conflict for the
/// column that collided; lock and pool errors become transient so the
/// signup orchestrator may retry them.
fn map_sqlx_err(e: sqlx::Error) -> Error {
    match &e {
        sqlx::Error::Database(db) => {
            let msg = db.message().to_string();
            if db.is_unique_violation() {
                if msg.contains("accounts.email") {
                    return ConflictError::EmailTaken.into();
                }
                if msg.contains("profiles.username") {
                    return ConflictError::UsernameTaken.into();
                }
                if msg.contains("accounts.provider_subject") {
                    return ConflictError::SubjectAlreadyLinked.into();
                }
                return StorageError::Database(msg).into();
            }
            if msg.contains("database is locked") || msg.contains("database table is locked") {
                return StorageError::Transient(msg).into();
            }
            StorageError::Database(msg).into()
        }
        sqlx::Error::PoolTimedOut => {
            StorageError::Transient("connection pool timed out".to_string()).into()
        }
        sqlx::Error::Io(_) => StorageError::Connection(e.to_string()).into(),
        _ => StorageError::Database(e.to_string()).into(),
    }
}

#[async_trait]
impl CredentialStore for SqliteStore {
    type Tx = SqliteTx;

    async fn begin(&self) -> Result<Self::Tx, Error> {
        let tx = self.pool.begin().await.map_err(map_sqlx_err)?;
        Ok(SqliteTx { tx })
    }

    async fn find_account_by_id(&self, id: &AccountId) -> Result<Option<Account>, Error> {
        let row = sqlx::query_as::<_, SqliteAccount>("SELECT * FROM accounts WHERE id = ?1")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_err)?;
        Ok(row.map(Into::into))
    }

    async fn find_account_by_email(&self, email: &str) -> Result<Option<Account>, Error> {
        let row = sqlx::query_as::<_, SqliteAccount>("SELECT * FROM accounts WHERE email = ?1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_err)?;
        Ok(row.map(Into::into))
    }

    async fn find_account_by_verification_token(
        &self,
        token: &str,
    ) -> Result<Option<Account>, Error> {
        let row = sqlx::query_as::<_, SqliteAccount>(
            "SELECT * FROM accounts WHERE verification_token = ?1",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_err)?;
        Ok(row.map(Into::into))
    }

    async fn find_account_by_reset_token(&self, token: &str) -> Result<Option<Account>, Error> {
        let row =
            sqlx::query_as::<_, SqliteAccount>("SELECT * FROM accounts WHERE reset_token = ?1")
                .bind(token)
                .fetch_optional(&self.pool)
                .await
                .map_err(map_sqlx_err)?;
        Ok(row.map(Into::into))
    }

    async fn find_profile(&self, account_id: &AccountId) -> Result<Option<Profile>, Error> {
        let row =
            sqlx::query_as::<_, SqliteProfile>("SELECT * FROM profiles WHERE account_id = ?1")
                .bind(account_id.as_str())
                .fetch_optional(&self.pool)
                .await
                .map_err(map_sqlx_err)?;
        Ok(row.map(Into::into))
    }

    async fn check_collision(
        &self,
        email: &str,
        username: &str,
    ) -> Result<Option<CollisionField>, Error> {
        // Both halves of the uniqueness domain in one round trip.
        let (email_taken, username_taken) = sqlx::query_as::<_, (bool, bool)>(
            r#"
            SELECT
                EXISTS(SELECT 1 FROM accounts WHERE email = ?1),
                EXISTS(SELECT 1 FROM profiles WHERE username = ?2)
            "#,
        )
        .bind(email)
        .bind(username)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        if email_taken {
            Ok(Some(CollisionField::Email))
        } else if username_taken {
            Ok(Some(CollisionField::Username))
        } else {
            Ok(None)
        }
    }

    async fn set_verification_token(
        &self,
        account_id: &AccountId,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), Error> {
        sqlx::query(
            r#"
            UPDATE accounts
            SET verification_token = ?2, verification_expires_at = ?3, updated_at = ?4
            WHERE id = ?1
            "#,
        )
        .bind(account_id.as_str())
        .bind(token)
        .bind(expires_at.timestamp())
        .bind(Utc::now().timestamp())
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_err)?;
        Ok(())
    }

    async fn mark_email_verified(&self, account_id: &AccountId) -> Result<(), Error> {
        // Verified flag set and expiry nulled in one write; the consumed
        // token value stays for idempotent re-redemption.
        sqlx::query(
            r#"
            UPDATE accounts
            SET email_verified_at = ?2, verification_expires_at = NULL, updated_at = ?2
            WHERE id = ?1
            "#,
        )
        .bind(account_id.as_str())
        .bind(Utc::now().timestamp())
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_err)?;
        Ok(())
    }

    async fn set_reset_token(
        &self,
        account_id: &AccountId,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), Error> {
        sqlx::query(
            r#"
            UPDATE accounts
            SET reset_token = ?2, reset_expires_at = ?3, updated_at = ?4
            WHERE id = ?1
            "#,
        )
        .bind(account_id.as_str())
        .bind(token)
        .bind(expires_at.timestamp())
        .bind(Utc::now().timestamp())
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_err)?;
        Ok(())
    }

    async fn complete_password_reset(
        &self,
        account_id: &AccountId,
        password_hash: &str,
    ) -> Result<(), Error> {
        // New hash and token invalidation share one write; a used reset
        // token must never survive the reset.
        sqlx::query(
            r#"
            UPDATE accounts
            SET password_hash = ?2, reset_token = NULL, reset_expires_at = NULL, updated_at = ?3
            WHERE id = ?1
            "#,
        )
        .bind(account_id.as_str())
        .bind(password_hash)
        .bind(Utc::now().timestamp())
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_err)?;
        Ok(())
    }
}

/// One open transaction on one pinned pooled connection.
pub struct SqliteTx {
    tx: Transaction<'static, Sqlite>,
}

#[async_trait]
impl CredentialTx for SqliteTx {
    async fn insert_account(&mut self, account: NewAccount) -> Result<Account, Error> {
        let now = Utc::now().timestamp();
        let email_verified_at = if account.email_verified { Some(now) } else { None };

        let row = sqlx::query_as::<_, SqliteAccount>(
            r#"
            INSERT INTO accounts (
                id, email, password_hash, provider_subject, email_verified_at,
                verification_token, verification_expires_at, created_at, updated_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)
            RETURNING *
            "#,
        )
        .bind(account.id.as_str())
        .bind(&account.email)
        .bind(&account.password_hash)
        .bind(&account.provider_subject)
        .bind(email_verified_at)
        .bind(&account.verification_token)
        .bind(account.verification_expires_at.map(|dt| dt.timestamp()))
        .bind(now)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(map_sqlx_err)?;

        Ok(row.into())
    }

    async fn insert_profile(&mut self, profile: NewProfile) -> Result<Profile, Error> {
        let now = Utc::now().timestamp();

        let row = sqlx::query_as::<_, SqliteProfile>(
            r#"
            INSERT INTO profiles (account_id, username, avatar_url, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?4)
            RETURNING *
            "#,
        )
        .bind(profile.account_id.as_str())
        .bind(&profile.username)
        .bind(&profile.avatar_url)
        .bind(now)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(map_sqlx_err)?;

        Ok(row.into())
    }

    async fn find_account_by_subject_or_email(
        &mut self,
        subject: &str,
        email: &str,
    ) -> Result<Option<Account>, Error> {
        // Subject match takes precedence over an email match.
        let row = sqlx::query_as::<_, SqliteAccount>(
            r#"
            SELECT * FROM accounts
            WHERE provider_subject = ?1 OR email = ?2
            ORDER BY CASE WHEN provider_subject = ?1 THEN 0 ELSE 1 END
            LIMIT 1
            "#,
        )
        .bind(subject)
        .bind(email)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(map_sqlx_err)?;
        Ok(row.map(Into::into))
    }

    async fn find_profile(&mut self, account_id: &AccountId) -> Result<Option<Profile>, Error> {
        let row =
            sqlx::query_as::<_, SqliteProfile>("SELECT * FROM profiles WHERE account_id = ?1")
                .bind(account_id.as_str())
                .fetch_optional(&mut *self.tx)
                .await
                .map_err(map_sqlx_err)?;
        Ok(row.map(Into::into))
    }

    async fn bind_provider(
        &mut self,
        account_id: &AccountId,
        subject: &str,
        email_verified: bool,
    ) -> Result<(), Error> {
        sqlx::query(
            r#"
            UPDATE accounts
            SET provider_subject = ?2,
                email_verified_at = CASE
                    WHEN email_verified_at IS NULL AND ?3 THEN ?4
                    ELSE email_verified_at
                END,
                updated_at = ?4
            WHERE id = ?1
            "#,
        )
        .bind(account_id.as_str())
        .bind(subject)
        .bind(email_verified)
        .bind(Utc::now().timestamp())
        .execute(&mut *self.tx)
        .await
        .map_err(map_sqlx_err)?;
        Ok(())
    }

    async fn username_exists(&mut self, username: &str) -> Result<bool, Error> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM profiles WHERE username = ?1)",
        )
        .bind(username)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(map_sqlx_err)?;
        Ok(exists)
    }

    async fn commit(self) -> Result<(), Error> {
        self.tx.commit().await.map_err(map_sqlx_err)
    }

    async fn rollback(self) -> Result<(), Error> {
        self.tx.rollback().await.map_err(map_sqlx_err)
    }
}
