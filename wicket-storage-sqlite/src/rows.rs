//! Row structs mirroring the SQLite schema.
//!
//! Timestamps live as unix seconds in INTEGER columns and convert at
//! the boundary.

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use wicket_core::{Account, AccountId, Profile};

fn from_unix(ts: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(ts, 0).unwrap_or_default()
}

#[derive(Debug, FromRow)]
pub(crate) struct SqliteAccount {
    id: String,
    email: String,
    password_hash: Option<String>,
    provider_subject: Option<String>,
    email_verified_at: Option<i64>,
    verification_token: Option<String>,
    verification_expires_at: Option<i64>,
    reset_token: Option<String>,
    reset_expires_at: Option<i64>,
    created_at: i64,
    updated_at: i64,
}

impl From<SqliteAccount> for Account {
    fn from(row: SqliteAccount) -> Self {
        Account {
            id: AccountId::new(&row.id),
            email: row.email,
            password_hash: row.password_hash,
            provider_subject: row.provider_subject,
            email_verified_at: row.email_verified_at.map(from_unix),
            verification_token: row.verification_token,
            verification_expires_at: row.verification_expires_at.map(from_unix),
            reset_token: row.reset_token,
            reset_expires_at: row.reset_expires_at.map(from_unix),
            created_at: from_unix(row.created_at),
            updated_at: from_unix(row.updated_at),
        }
    }
}

#[derive(Debug, FromRow)]
pub(crate) struct SqliteProfile {
    account_id: String,
    username: String,
    avatar_url: String,
    created_at: i64,
    updated_at: i64,
}

impl From<SqliteProfile> for Profile {
    fn from(row: SqliteProfile) -> Self {
        Profile {
            account_id: AccountId::new(&row.account_id),
            username: row.username,
            avatar_url: row.avatar_url,
            created_at: from_unix(row.created_at),
            updated_at: from_unix(row.updated_at),
        }
    }
}
