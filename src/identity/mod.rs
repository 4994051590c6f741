//! Identity: password hashing, session tokens, invitations, and the
//! registration/login flows that compose them.

pub mod invitations;
pub mod password;
pub mod tokens;

use rusqlite::params;

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::models::{AuthFlow, User};
use crate::store::Store;

pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub display_name: String,
    pub invitation_token: Option<String>,
}

/// Registers a new user, enforcing the configured auth flow and the
/// first-user-becomes-admin rule, all within one transaction.
pub fn register(store: &Store, config: &Config, req: RegisterRequest) -> AppResult<User> {
    let flow = crate::services::admin::auth_flow(store)?;

    let invitation_id = match flow {
        AuthFlow::Signup => None,
        AuthFlow::Invitation => {
            let token = req
                .invitation_token
                .as_deref()
                .ok_or_else(|| AppError::Authentication("an invitation token is required".into()))?;
            let invitation = invitations::lookup_valid(store, &config.jwt_secret, token)?
                .ok_or_else(|| AppError::Authentication("invitation is invalid or expired".into()))?;
            if invitation.email != req.email {
                return Err(AppError::Authentication("invitation does not match this email".into()));
            }
            Some(invitation.id)
        }
    };

    let password_hash = password::hash(&req.password)?;

    store.with_tx(move |tx| {
        let now = chrono::Utc::now().to_rfc3339();
        let user_count: i64 = tx.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;

        tx.execute(
            "INSERT INTO users (username, email, password_hash, display_name, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
            params![req.username, req.email, password_hash, req.display_name, now],
        )?;
        let user_id = tx.last_insert_rowid();

        let role_name = if user_count == 0 { "admin" } else { "user" };
        tx.execute(
            "INSERT INTO user_roles (user_id, role_id) SELECT ?1, id FROM roles WHERE name = ?2",
            params![user_id, role_name],
        )?;

        if let Some(invitation_id) = invitation_id {
            invitations::mark_consumed(tx, invitation_id)?;
        }

        tx.query_row(
            "SELECT id, username, email, password_hash, display_name, is_active, created_at, updated_at
             FROM users WHERE id = ?1",
            params![user_id],
            |row| {
                Ok(User {
                    id: row.get(0)?,
                    username: row.get(1)?,
                    email: row.get(2)?,
                    password_hash: row.get(3)?,
                    display_name: row.get(4)?,
                    is_active: row.get::<_, i64>(5)? != 0,
                    created_at: row.get(6)?,
                    updated_at: row.get(7)?,
                })
            },
        )
        .map_err(AppError::from)
    })
}

/// Verifies credentials, transparently rehashing the stored password if its
/// parameters are below the current minimum, and issues a session token.
pub fn login(store: &Store, config: &Config, email: &str, password: &str) -> AppResult<String> {
    let (user_id, stored_hash, is_active): (i64, String, bool) = store.with_conn(move |conn| {
        conn.query_row(
            "SELECT id, password_hash, is_active FROM users WHERE email = ?1",
            params![email],
            |row| Ok((row.get(0)?, row.get(1)?, row.get::<_, i64>(2)? != 0)),
        )
        .map_err(|_| AppError::Authentication("invalid credentials".into()))
    })?;

    if !is_active {
        return Err(AppError::Authentication("account is deactivated".into()));
    }

    if !password::verify(password, &stored_hash)? {
        return Err(AppError::Authentication("invalid credentials".into()));
    }

    if password::needs_rehash(&stored_hash) {
        let fresh = password::hash(password)?;
        store.with_tx(move |tx| {
            tx.execute("UPDATE users SET password_hash = ?1 WHERE id = ?2", params![fresh, user_id])?;
            Ok(())
        })?;
    }

    tokens::issue(&config.jwt_secret, user_id)
}
