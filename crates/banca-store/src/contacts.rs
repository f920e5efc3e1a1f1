//! CRUD operations for [`Contact`] records.

use chrono::Utc;
use rusqlite::params;

use banca_shared::types::UserId;

use crate::database::{format_timestamp, parse_timestamp, Database};
use crate::error::Result;
use crate::models::{Contact, NewContact};

impl Database {
    pub fn create_contact(&self, contact: &NewContact) -> Result<Contact> {
        let now = Utc::now();

        self.conn().execute(
            "INSERT INTO contacts (user_id, contact_id, contact_name, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                contact.user_id.0,
                contact.contact_id.0,
                contact.contact_name,
                format_timestamp(&now),
            ],
        )?;

        Ok(Contact {
            id: self.conn().last_insert_rowid(),
            user_id: contact.user_id,
            contact_id: contact.contact_id,
            contact_name: contact.contact_name.clone(),
            created_at: now,
        })
    }

    /// All contacts owned by `user_id`, oldest first.
    pub fn list_contacts(&self, user_id: UserId) -> Result<Vec<Contact>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, user_id, contact_id, contact_name, created_at
             FROM contacts
             WHERE user_id = ?1
             ORDER BY id ASC",
        )?;

        let rows = stmt.query_map(params![user_id.0], row_to_contact)?;

        let mut contacts = Vec::new();
        for row in rows {
            contacts.push(row?);
        }
        Ok(contacts)
    }

    pub fn contact_exists(&self, user_id: UserId, contact_id: UserId) -> Result<bool> {
        let count: i64 = self.conn().query_row(
            "SELECT COUNT(*) FROM contacts WHERE user_id = ?1 AND contact_id = ?2",
            params![user_id.0, contact_id.0],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Remove `contact_id` from the contact list of `user_id`. Returns `true`
    /// if a row was deleted.
    pub fn delete_contact(&self, user_id: UserId, contact_id: UserId) -> Result<bool> {
        let affected = self.conn().execute(
            "DELETE FROM contacts WHERE user_id = ?1 AND contact_id = ?2",
            params![user_id.0, contact_id.0],
        )?;
        Ok(affected > 0)
    }
}

fn row_to_contact(row: &rusqlite::Row<'_>) -> rusqlite::Result<Contact> {
    let created_str: String = row.get(4)?;

    Ok(Contact {
        id: row.get(0)?,
        user_id: UserId(row.get(1)?),
        contact_id: UserId(row.get(2)?),
        contact_name: row.get(3)?,
        created_at: parse_timestamp(4, &created_str)?,
    })
}
