//! Tag service: catalog CRUD plus per-user preferences. Deleting a tag
//! cascades to `book_tags` (FK `ON DELETE CASCADE`) but never touches books.

use rusqlite::params;

use crate::error::{AppError, AppResult};
use crate::models::{Tag, TagPreferenceState};
use crate::store::Store;

pub fn list_categories(store: &Store) -> AppResult<Vec<Tag>> {
    store.with_conn(|conn| {
        let mut stmt =
            conn.prepare("SELECT id, name, category, requires_permission FROM tags ORDER BY category, name")?;
        let tags = stmt
            .query_map([], |row| {
                Ok(Tag {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    category: row.get(2)?,
                    requires_permission: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()
            .map_err(AppError::from)?;
        Ok(tags)
    })
}

pub fn list_by_category(store: &Store, category: &str) -> AppResult<Vec<Tag>> {
    store.with_conn(move |conn| {
        let mut stmt = conn.prepare(
            "SELECT id, name, category, requires_permission FROM tags WHERE category = ?1 ORDER BY name",
        )?;
        stmt.query_map(params![category], |row| {
            Ok(Tag {
                id: row.get(0)?,
                name: row.get(1)?,
                category: row.get(2)?,
                requires_permission: row.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()
        .map_err(AppError::from)
    })
}

pub fn create(store: &Store, name: &str, category: &str, requires_permission: Option<&str>) -> AppResult<i64> {
    store.with_tx(|tx| {
        tx.execute(
            "INSERT INTO tags (name, category, requires_permission) VALUES (?1, ?2, ?3)",
            params![name, category, requires_permission],
        )?;
        Ok(tx.last_insert_rowid())
    })
}

pub fn delete(store: &Store, id: i64) -> AppResult<()> {
    store.with_tx(|tx| {
        let removed = tx.execute("DELETE FROM tags WHERE id = ?1", params![id])?;
        if removed == 0 {
            return Err(AppError::NotFound(format!("tag {id}")));
        }
        Ok(())
    })
}

pub fn set_user_preference(
    store: &Store,
    user_id: i64,
    tag_id: i64,
    state: TagPreferenceState,
) -> AppResult<()> {
    let state_str = match state {
        TagPreferenceState::Allow => "allow",
        TagPreferenceState::Deny => "deny",
    };
    store.with_tx(move |tx| {
        tx.execute(
            "INSERT INTO user_tag_preferences (user_id, tag_id, state) VALUES (?1, ?2, ?3)
             ON CONFLICT(user_id, tag_id) DO UPDATE SET state = excluded.state",
            params![user_id, tag_id, state_str],
        )?;
        Ok(())
    })
}

/// Attaches `tag_name` to `book_id` on behalf of a user-facing request
/// (`auto_applied = false`, unlike the indexer's own auto-tagging pass).
pub fn add_tag_to_book(store: &Store, book_id: i64, tag_name: &str) -> AppResult<()> {
    store.with_tx(move |tx| apply_tag(tx, book_id, tag_name, false))
}

/// Detaches `tag_name` from `book_id`. A no-op if the tag or the
/// association doesn't exist.
pub fn remove_tag_from_book(store: &Store, book_id: i64, tag_name: &str) -> AppResult<()> {
    store.with_tx(move |tx| {
        tx.execute(
            "DELETE FROM book_tags WHERE book_id = ?1
             AND tag_id = (SELECT id FROM tags WHERE name = ?2)",
            params![book_id, tag_name],
        )?;
        Ok(())
    })
}

/// Apply `tag_name` to `book_id`, creating the `book_tags` row if absent.
/// Used both by admin tagging endpoints and by the indexer's auto-tagging
/// pass (with `auto_applied = true`).
pub(crate) fn apply_tag(
    conn: &rusqlite::Connection,
    book_id: i64,
    tag_name: &str,
    auto_applied: bool,
) -> AppResult<()> {
    let tag_id: Option<i64> = conn
        .query_row("SELECT id FROM tags WHERE name = ?1", params![tag_name], |row| row.get(0))
        .ok();
    let Some(tag_id) = tag_id else {
        return Ok(());
    };
    conn.execute(
        "INSERT OR IGNORE INTO book_tags (book_id, tag_id, auto_applied, applied_at)
         VALUES (?1, ?2, ?3, ?4)",
        params![book_id, tag_id, auto_applied, chrono::Utc::now().to_rfc3339()],
    )?;
    Ok(())
}
