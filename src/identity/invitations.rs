//! Invitation tokens: high-entropy opaque tokens, stored only as an
//! HMAC-SHA256 hash — the plaintext is returned once at creation and is
//! never re-derivable from the database.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use rand::RngCore;
use rusqlite::params;
use sha2::Sha256;

use crate::error::{AppError, AppResult};
use crate::models::Invitation;
use crate::store::Store;

type HmacSha256 = Hmac<Sha256>;

const TOKEN_BYTES: usize = 32;

fn hash_token(secret: &[u8], token: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC accepts any key length");
    mac.update(token.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Creates an invitation, returning the one-time plaintext token. Only the
/// HMAC hash is persisted.
pub fn create(store: &Store, secret: &[u8], email: &str, ttl_hours: i64) -> AppResult<String> {
    let mut raw = [0u8; TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut raw);
    let token = URL_SAFE_NO_PAD.encode(raw);
    let token_hash = hash_token(secret, &token);

    let expires_at = (chrono::Utc::now() + chrono::Duration::hours(ttl_hours)).to_rfc3339();
    let created_at = chrono::Utc::now().to_rfc3339();

    store.with_tx(move |tx| {
        tx.execute(
            "INSERT INTO invitations (email, token_hash, expires_at, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![email, token_hash, expires_at, created_at],
        )?;
        Ok(())
    })?;

    Ok(token)
}

/// Looks up an invitation by recomputing the HMAC of `token`. Returns
/// `None` if not found, already consumed, or expired.
pub fn lookup_valid(store: &Store, secret: &[u8], token: &str) -> AppResult<Option<Invitation>> {
    let token_hash = hash_token(secret, token);
    let now = chrono::Utc::now().to_rfc3339();

    store.with_conn(move |conn| {
        let result = conn.query_row(
            "SELECT id, email, expires_at, consumed_at, created_at FROM invitations
             WHERE token_hash = ?1 AND consumed_at IS NULL AND expires_at > ?2",
            params![token_hash, now],
            |row| {
                Ok(Invitation {
                    id: row.get(0)?,
                    email: row.get(1)?,
                    expires_at: row.get(2)?,
                    consumed_at: row.get(3)?,
                    created_at: row.get(4)?,
                })
            },
        );
        match result {
            Ok(invitation) => Ok(Some(invitation)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(other) => Err(AppError::from(other)),
        }
    })
}

/// Marks an invitation consumed. Callers run this in the same transaction
/// as user creation (spec §4.8) via [`crate::store::Store::with_tx`],
/// calling this helper with the open transaction's connection.
pub(crate) fn mark_consumed(conn: &rusqlite::Connection, invitation_id: i64) -> AppResult<()> {
    conn.execute(
        "UPDATE invitations SET consumed_at = ?1 WHERE id = ?2",
        params![chrono::Utc::now().to_rfc3339(), invitation_id],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn created_token_resolves_back_to_its_invitation() {
        let store = Store::open_in_memory().unwrap();
        let secret = b"x".repeat(32);
        let token = create(&store, &secret, "new@example.com", 48).unwrap();

        let found = lookup_valid(&store, &secret, &token).unwrap().unwrap();
        assert_eq!(found.email, "new@example.com");
    }

    #[test]
    fn wrong_token_does_not_resolve() {
        let store = Store::open_in_memory().unwrap();
        let secret = b"x".repeat(32);
        create(&store, &secret, "new@example.com", 48).unwrap();

        assert!(lookup_valid(&store, &secret, "not-the-token").unwrap().is_none());
    }

    #[test]
    fn consumed_invitation_is_no_longer_valid() {
        let store = Store::open_in_memory().unwrap();
        let secret = b"x".repeat(32);
        let token = create(&store, &secret, "new@example.com", 48).unwrap();
        let invitation = lookup_valid(&store, &secret, &token).unwrap().unwrap();

        store.with_tx(move |tx| mark_consumed(tx, invitation.id)).unwrap();

        assert!(lookup_valid(&store, &secret, &token).unwrap().is_none());
    }
}
