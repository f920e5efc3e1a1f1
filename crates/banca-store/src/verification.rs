//! Time-boxed one-time codes keyed by email address.

use chrono::{DateTime, Utc};
use rusqlite::params;

use crate::database::{format_timestamp, optional, parse_timestamp, Database};
use crate::error::Result;
use crate::models::VerificationCode;

impl Database {
    /// Store a code for `email`, replacing any previous one.
    pub fn create_verification_code(
        &self,
        email: &str,
        code: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<VerificationCode> {
        let now = Utc::now();
        let tx = self.conn().unchecked_transaction()?;

        tx.execute(
            "DELETE FROM verification_codes WHERE email = ?1",
            params![email],
        )?;
        tx.execute(
            "INSERT INTO verification_codes (email, code, expires_at, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![email, code, format_timestamp(&expires_at), format_timestamp(&now)],
        )?;
        let id = tx.last_insert_rowid();
        tx.commit()?;

        Ok(VerificationCode {
            id,
            email: email.to_string(),
            code: code.to_string(),
            expires_at,
            created_at: now,
        })
    }

    pub fn get_verification_code(&self, email: &str) -> Result<Option<VerificationCode>> {
        optional(self.conn().query_row(
            "SELECT id, email, code, expires_at, created_at
             FROM verification_codes WHERE email = ?1",
            params![email],
            |row| {
                let expires_str: String = row.get(3)?;
                let created_str: String = row.get(4)?;
                Ok(VerificationCode {
                    id: row.get(0)?,
                    email: row.get(1)?,
                    code: row.get(2)?,
                    expires_at: parse_timestamp(3, &expires_str)?,
                    created_at: parse_timestamp(4, &created_str)?,
                })
            },
        ))
    }

    /// Returns `true` if a code was deleted.
    pub fn delete_verification_code(&self, email: &str) -> Result<bool> {
        let affected = self.conn().execute(
            "DELETE FROM verification_codes WHERE email = ?1",
            params![email],
        )?;
        Ok(affected > 0)
    }

    /// Delete every code that expired at or before `now`. Returns the number
    /// of rows removed.
    pub fn purge_expired_verification_codes(&self, now: DateTime<Utc>) -> Result<usize> {
        let affected = self.conn().execute(
            "DELETE FROM verification_codes WHERE expires_at <= ?1",
            params![format_timestamp(&now)],
        )?;
        Ok(affected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn create_replaces_previous_code() {
        let db = Database::open_in_memory().unwrap();
        let expires = Utc::now() + Duration::minutes(10);

        db.create_verification_code("sara@example.com", "111111", expires)
            .unwrap();
        db.create_verification_code("sara@example.com", "222222", expires)
            .unwrap();

        let stored = db.get_verification_code("sara@example.com").unwrap().unwrap();
        assert_eq!(stored.code, "222222");

        assert!(db.delete_verification_code("sara@example.com").unwrap());
        assert!(!db.delete_verification_code("sara@example.com").unwrap());
        assert!(db.get_verification_code("sara@example.com").unwrap().is_none());
    }

    #[test]
    fn purge_only_expired() {
        let db = Database::open_in_memory().unwrap();
        let now = Utc::now();

        db.create_verification_code("old@example.com", "111111", now - Duration::minutes(1))
            .unwrap();
        db.create_verification_code("new@example.com", "222222", now + Duration::minutes(9))
            .unwrap();

        assert_eq!(db.purge_expired_verification_codes(now).unwrap(), 1);
        assert!(db.get_verification_code("old@example.com").unwrap().is_none());
        assert!(db.get_verification_code("new@example.com").unwrap().is_some());
    }
}
