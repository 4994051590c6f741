//! Composite access control: role→permission resolution plus per-tag
//! permission gates, deny preferences, and include/exclude tag filters.
//! Every user-facing book listing in the codebase goes through
//! [`visible_books`] rather than querying `books` directly.

use std::collections::HashSet;

use rusqlite::params;

use crate::error::{AppError, AppResult};
use crate::models::{AuthUser, Book, BookFilter};
use crate::store::Store;

/// Union of permissions granted by every role the user holds. Recomputed per
/// request — intentionally not cached across requests (spec §4.7).
pub fn effective_permissions(store: &Store, user_id: i64) -> AppResult<HashSet<String>> {
    store.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT DISTINCT p.name
             FROM user_roles ur
             JOIN role_permissions rp ON rp.role_id = ur.role_id
             JOIN permissions p ON p.id = rp.permission_id
             WHERE ur.user_id = ?1",
        )?;
        let names = stmt
            .query_map(params![user_id], |row| row.get::<_, String>(0))?
            .collect::<Result<HashSet<_>, _>>()
            .map_err(AppError::from)?;
        Ok(names)
    })
}

/// Books visible to `user` under `filter`, applying:
/// 1. status (archived books are visible only to holders of `admin.full`)
/// 2. tag permission gates (every gated tag on the book requires a granted permission)
/// 3. per-user tag deny preferences
/// 4. include/exclude tag filters
pub fn visible_books(store: &Store, user: &AuthUser, filter: &BookFilter) -> AppResult<Vec<Book>> {
    let permissions = effective_permissions(store, user.user_id)?;

    store.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT id, name, author_id, file_path, file_format, file_size, isbn,
                    description, page_count, publisher, publication_date,
                    cover_image_path, status, archived_at, archive_reason,
                    created_at, updated_at
             FROM books WHERE status != 'deleted' ORDER BY name",
        )?;
        let books = stmt
            .query_map([], |row| {
                Ok(Book {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    author_id: row.get(2)?,
                    file_path: row.get(3)?,
                    file_format: row.get(4)?,
                    file_size: row.get(5)?,
                    isbn: row.get(6)?,
                    description: row.get(7)?,
                    page_count: row.get(8)?,
                    publisher: row.get(9)?,
                    publication_date: row.get(10)?,
                    cover_image_path: row.get(11)?,
                    status: row.get(12)?,
                    archived_at: row.get(13)?,
                    archive_reason: row.get(14)?,
                    created_at: row.get(15)?,
                    updated_at: row.get(16)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()
            .map_err(AppError::from)?;

        let can_see_archived = permissions.contains("admin.full");

        let mut tag_stmt = conn.prepare(
            "SELECT t.name, t.category, t.requires_permission FROM book_tags bt
             JOIN tags t ON t.id = bt.tag_id WHERE bt.book_id = ?1",
        )?;
        let mut deny_stmt = conn.prepare(
            "SELECT t.name FROM user_tag_preferences utp
             JOIN tags t ON t.id = utp.tag_id
             WHERE utp.user_id = ?1 AND utp.state = 'deny'",
        )?;
        let denied: HashSet<String> = deny_stmt
            .query_map(params![user.user_id], |row| row.get::<_, String>(0))?
            .collect::<Result<_, _>>()
            .map_err(AppError::from)?;

        let mut visible = Vec::new();
        for book in books {
            if book.status != "active" && !can_see_archived {
                continue;
            }

            let tags: Vec<(String, String, Option<String>)> = tag_stmt
                .query_map(params![book.id], |row| {
                    Ok((row.get(0)?, row.get(1)?, row.get(2)?))
                })?
                .collect::<Result<Vec<_>, _>>()
                .map_err(AppError::from)?;
            let tag_names: HashSet<&str> = tags.iter().map(|(n, _, _)| n.as_str()).collect();
            let genre_names: HashSet<&str> = tags
                .iter()
                .filter(|(_, category, _)| category == "genre")
                .map(|(n, _, _)| n.as_str())
                .collect();

            let gated_out = tags.iter().any(|(_, _, requires)| match requires {
                Some(p) => !permissions.contains(p),
                None => false,
            });
            if gated_out {
                continue;
            }

            if tags.iter().any(|(name, _, _)| denied.contains(name)) {
                continue;
            }

            if !filter.include_tags.is_empty()
                && !filter.include_tags.iter().any(|t| tag_names.contains(t.as_str()))
            {
                continue;
            }

            if filter.exclude_tags.iter().any(|t| tag_names.contains(t.as_str())) {
                continue;
            }

            if !filter.include_genres.is_empty()
                && !filter.include_genres.iter().any(|g| genre_names.contains(g.as_str()))
            {
                continue;
            }

            if filter.exclude_genres.iter().any(|g| genre_names.contains(g.as_str())) {
                continue;
            }

            if let Some(search) = &filter.search {
                let needle = search.to_lowercase();
                if !book.name.to_lowercase().contains(&needle) {
                    continue;
                }
            }

            visible.push(book);
        }

        Ok(visible)
    })
}
