//! Book service: user-facing reads (routed through visibility) plus
//! administrative archive/unarchive/refresh operations.

use std::path::Path;

use rusqlite::params;

use crate::error::{AppError, AppResult};
use crate::metadata::{self, MetadataLookup};
use crate::models::{AuthUser, Book, BookFilter};
use crate::store::Store;

use super::visibility;

pub fn list(store: &Store, user: &AuthUser, filter: &BookFilter) -> AppResult<Vec<Book>> {
    visibility::visible_books(store, user, filter)
}

pub fn get(store: &Store, user: &AuthUser, id: i64) -> AppResult<Book> {
    let books = visibility::visible_books(store, user, &BookFilter::default())?;
    books
        .into_iter()
        .find(|b| b.id == id)
        .ok_or_else(|| AppError::NotFound(format!("book {id}")))
}

/// Resolve a book's absolute file path for streaming, verifying it is still
/// visible to `user` and lies under `library_roots` (path-safety check,
/// spec §4.9 — never leaks existence to an unauthorized caller).
pub fn resolve_stream_path(
    store: &Store,
    user: &AuthUser,
    id: i64,
    library_roots: &[std::path::PathBuf],
) -> AppResult<std::path::PathBuf> {
    let book = get(store, user, id)?;
    let path = Path::new(&book.file_path)
        .canonicalize()
        .map_err(|_| AppError::NotFound(format!("book {id}")))?;

    let under_root = library_roots.iter().any(|root| path.starts_with(root));
    if !under_root {
        return Err(AppError::NotFound(format!("book {id}")));
    }

    Ok(path)
}

/// Books visible to `user` carrying `tag_name`, regardless of category
/// (genre, format, or content-rating).
pub fn by_tag(store: &Store, user: &AuthUser, tag_name: &str) -> AppResult<Vec<Book>> {
    let filter = BookFilter { include_tags: vec![tag_name.to_string()], ..BookFilter::default() };
    visibility::visible_books(store, user, &filter)
}

pub fn archive(store: &Store, id: i64, reason: &str) -> AppResult<()> {
    store.with_tx(|tx| {
        let now = chrono::Utc::now().to_rfc3339();
        let updated = tx.execute(
            "UPDATE books SET status = 'archived', archived_at = ?1, archive_reason = ?2, updated_at = ?1
             WHERE id = ?3 AND status = 'active'",
            params![now, reason, id],
        )?;
        if updated == 0 {
            return Err(AppError::NotFound(format!("active book {id}")));
        }
        Ok(())
    })
}

pub fn unarchive(store: &Store, id: i64) -> AppResult<()> {
    store.with_tx(|tx| {
        let now = chrono::Utc::now().to_rfc3339();
        let updated = tx.execute(
            "UPDATE books SET status = 'active', archived_at = NULL, archive_reason = NULL, updated_at = ?1
             WHERE id = ?2 AND status = 'archived'",
            params![now, id],
        )?;
        if updated == 0 {
            return Err(AppError::NotFound(format!("archived book {id}")));
        }
        Ok(())
    })
}

/// Admin-triggered re-derivation: re-reads the path convention and re-runs
/// enrichment, overwriting previously stored values. The passive indexer
/// pass never does this on its own (spec §4.6 step 3 vs §9 resolution).
pub async fn refresh_metadata(
    store: &Store,
    id: i64,
    lookup: &dyn MetadataLookup,
) -> AppResult<()> {
    let file_path: String =
        store.with_conn(|conn| Ok(conn.query_row(
            "SELECT file_path FROM books WHERE id = ?1",
            params![id],
            |row| row.get(0),
        )?))?;

    let path = std::path::PathBuf::from(&file_path);
    let derived = metadata::derive(&path).ok_or_else(|| AppError::Validation(format!(
        "{file_path} does not match the author/title path convention"
    )))?;

    let enriched = match &derived.isbn {
        Some(isbn) => lookup.lookup(isbn).await.unwrap_or_default(),
        None => Default::default(),
    };

    store.with_tx(move |tx| {
        let now = chrono::Utc::now().to_rfc3339();
        tx.execute(
            "UPDATE books SET isbn = ?1, description = ?2, page_count = ?3,
                              publisher = ?4, publication_date = ?5, updated_at = ?6
             WHERE id = ?7",
            params![
                derived.isbn,
                enriched.description,
                enriched.page_count,
                enriched.publisher,
                enriched.publication_date,
                now,
                id,
            ],
        )?;
        Ok(())
    })
}
