//! CRUD operations for [`User`] records.

use chrono::Utc;
use rusqlite::params;

use banca_shared::constants::DEFAULT_STATUS_TEXT;
use banca_shared::types::UserId;

use crate::database::{format_timestamp, optional, parse_timestamp, Database};
use crate::error::Result;
use crate::models::{NewUser, User, UserUpdate};

const USER_COLUMNS: &str =
    "id, email, password_hash, username, avatar, status, verified, created_at";

impl Database {
    /// Insert a new user. Fails with a constraint error if the email is
    /// already registered.
    pub fn create_user(&self, user: &NewUser) -> Result<User> {
        let now = Utc::now();
        let status = user
            .status
            .clone()
            .unwrap_or_else(|| DEFAULT_STATUS_TEXT.to_string());

        self.conn().execute(
            "INSERT INTO users (email, password_hash, username, avatar, status, verified, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                user.email,
                user.password_hash,
                user.username,
                user.avatar,
                status,
                user.verified,
                format_timestamp(&now),
            ],
        )?;

        Ok(User {
            id: UserId(self.conn().last_insert_rowid()),
            email: user.email.clone(),
            password_hash: user.password_hash.clone(),
            username: user.username.clone(),
            avatar: user.avatar.clone(),
            status,
            verified: user.verified,
            created_at: now,
        })
    }

    pub fn get_user(&self, id: UserId) -> Result<Option<User>> {
        optional(self.conn().query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
            params![id.0],
            row_to_user,
        ))
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        optional(self.conn().query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1"),
            params![email],
            row_to_user,
        ))
    }

    /// Apply a partial update. Returns the updated user, or `None` if no
    /// user has this id.
    pub fn update_user(&self, id: UserId, update: &UserUpdate) -> Result<Option<User>> {
        let affected = self.conn().execute(
            "UPDATE users SET
                 password_hash = COALESCE(?1, password_hash),
                 username      = COALESCE(?2, username),
                 avatar        = COALESCE(?3, avatar),
                 status        = COALESCE(?4, status),
                 verified      = COALESCE(?5, verified)
             WHERE id = ?6",
            params![
                update.password_hash,
                update.username,
                update.avatar,
                update.status,
                update.verified,
                id.0,
            ],
        )?;

        if affected == 0 {
            return Ok(None);
        }
        self.get_user(id)
    }

    pub fn count_users(&self) -> Result<u64> {
        let count: i64 = self
            .conn()
            .query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

/// Map a `rusqlite::Row` selected with `USER_COLUMNS` to a [`User`].
pub(crate) fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    let created_str: String = row.get(7)?;

    Ok(User {
        id: UserId(row.get(0)?),
        email: row.get(1)?,
        password_hash: row.get(2)?,
        username: row.get(3)?,
        avatar: row.get(4)?,
        status: row.get(5)?,
        verified: row.get(6)?,
        created_at: parse_timestamp(7, &created_str)?,
    })
}
