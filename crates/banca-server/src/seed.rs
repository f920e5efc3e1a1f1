//! Demo accounts for local development.

use banca_store::{Database, NewUser};
use tracing::info;

use crate::credentials::hash_password;

const DEMO_PASSWORD: &str = "password123";

/// (email, username, avatar, status)
const DEMO_USERS: [(&str, &str, &str, &str); 4] = [
    (
        "sara@example.com",
        "Sara Wilson",
        "https://images.unsplash.com/photo-1494790108377-be9c29b29330",
        "Hey there! I'm using BancaMessenger.",
    ),
    (
        "alex@example.com",
        "Alex Johnson",
        "https://images.unsplash.com/photo-1500648767791-00dcc994a43e",
        "Available",
    ),
    (
        "maya@example.com",
        "Maya Patel",
        "https://images.unsplash.com/photo-1607746882042-944635dfe10e",
        "At work",
    ),
    (
        "david@example.com",
        "David Kim",
        "https://images.unsplash.com/photo-1506794778202-cad84cf45f1d",
        "In a meeting",
    ),
];

/// Insert the demo users if the database has no users yet. Returns the
/// number of users inserted.
pub fn seed_demo_users(db: &Database) -> banca_store::Result<usize> {
    if db.count_users()? > 0 {
        return Ok(0);
    }

    for (email, username, avatar, status) in DEMO_USERS {
        db.create_user(&NewUser {
            email: email.to_string(),
            password_hash: hash_password(DEMO_PASSWORD),
            username: username.to_string(),
            avatar: Some(avatar.to_string()),
            status: Some(status.to_string()),
            verified: true,
        })?;
    }

    info!(count = DEMO_USERS.len(), "Seeded demo users");
    Ok(DEMO_USERS.len())
}
