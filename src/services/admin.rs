//! Administrative service: user management, role/permission catalogs,
//! invitation issuance, and the auth-flow switch.

use rusqlite::params;

use crate::error::{AppError, AppResult};
use crate::models::{AuthFlow, Permission, Role, User};
use crate::store::Store;

pub fn list_users(store: &Store) -> AppResult<Vec<User>> {
    store.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT id, username, email, password_hash, display_name, is_active, created_at, updated_at
             FROM users ORDER BY username",
        )?;
        stmt.query_map([], row_to_user)?.collect::<Result<Vec<_>, _>>().map_err(AppError::from)
    })
}

pub fn get_user(store: &Store, id: i64) -> AppResult<User> {
    store.with_conn(move |conn| {
        conn.query_row(
            "SELECT id, username, email, password_hash, display_name, is_active, created_at, updated_at
             FROM users WHERE id = ?1",
            params![id],
            row_to_user,
        )
        .map_err(AppError::from)
    })
}

pub fn deactivate_user(store: &Store, id: i64) -> AppResult<()> {
    store.with_tx(move |tx| {
        let updated = tx.execute(
            "UPDATE users SET is_active = 0, updated_at = ?1 WHERE id = ?2",
            params![chrono::Utc::now().to_rfc3339(), id],
        )?;
        if updated == 0 {
            return Err(AppError::NotFound(format!("user {id}")));
        }
        Ok(())
    })
}

pub fn list_roles(store: &Store) -> AppResult<Vec<Role>> {
    store.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT id, name, description FROM roles ORDER BY name")?;
        stmt.query_map([], |row| {
            Ok(Role { id: row.get(0)?, name: row.get(1)?, description: row.get(2)? })
        })?
        .collect::<Result<Vec<_>, _>>()
        .map_err(AppError::from)
    })
}

pub fn list_permissions(store: &Store) -> AppResult<Vec<Permission>> {
    store.with_conn(|conn| {
        let mut stmt =
            conn.prepare("SELECT id, name, resource_type, description FROM permissions ORDER BY name")?;
        stmt.query_map([], |row| {
            Ok(Permission {
                id: row.get(0)?,
                name: row.get(1)?,
                resource_type: row.get(2)?,
                description: row.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()
        .map_err(AppError::from)
    })
}

pub fn create_role(store: &Store, name: &str, description: &str) -> AppResult<i64> {
    store.with_tx(|tx| {
        tx.execute(
            "INSERT INTO roles (name, description) VALUES (?1, ?2)",
            params![name, description],
        )?;
        Ok(tx.last_insert_rowid())
    })
}

pub fn delete_role(store: &Store, id: i64) -> AppResult<()> {
    store.with_tx(|tx| {
        let removed = tx.execute("DELETE FROM roles WHERE id = ?1", params![id])?;
        if removed == 0 {
            return Err(AppError::NotFound(format!("role {id}")));
        }
        Ok(())
    })
}

/// Replaces the full set of permissions granted to `role_id` with
/// `permission_names`, atomically.
pub fn set_role_permissions(store: &Store, role_id: i64, permission_names: &[String]) -> AppResult<()> {
    let names = permission_names.to_vec();
    store.with_tx(move |tx| {
        tx.execute("DELETE FROM role_permissions WHERE role_id = ?1", params![role_id])?;
        for name in &names {
            tx.execute(
                "INSERT INTO role_permissions (role_id, permission_id)
                 SELECT ?1, id FROM permissions WHERE name = ?2",
                params![role_id, name],
            )?;
        }
        Ok(())
    })
}

pub fn set_auth_flow(store: &Store, flow: AuthFlow) -> AppResult<()> {
    store.with_tx(move |tx| {
        tx.execute(
            "UPDATE auth_settings SET auth_flow = ?1 WHERE id = 1",
            params![flow.as_str()],
        )?;
        Ok(())
    })
}

pub fn auth_flow(store: &Store) -> AppResult<AuthFlow> {
    store.with_conn(|conn| {
        let raw: String =
            conn.query_row("SELECT auth_flow FROM auth_settings WHERE id = 1", [], |row| row.get(0))?;
        AuthFlow::parse(&raw)
            .ok_or_else(|| AppError::Storage(format!("unrecognized auth_flow '{raw}' in auth_settings")))
    })
}

fn row_to_user(row: &rusqlite::Row) -> rusqlite::Result<User> {
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
}
