//! Author service: listings scoped to the books a user can see, so totals
//! never leak the existence of gated content.

use rusqlite::params;

use crate::error::AppResult;
use crate::models::{Author, AuthUser, BookFilter};
use crate::store::Store;

use super::visibility;

#[derive(Debug, Clone, serde::Serialize)]
pub struct AuthorSummary {
    #[serde(flatten)]
    pub author: Author,
    pub visible_book_count: usize,
}

pub fn list(store: &Store, user: &AuthUser) -> AppResult<Vec<AuthorSummary>> {
    let visible = visibility::visible_books(store, user, &BookFilter::default())?;
    let mut counts = std::collections::HashMap::new();
    for book in &visible {
        *counts.entry(book.author_id).or_insert(0usize) += 1;
    }

    store.with_conn(move |conn| {
        let mut stmt = conn.prepare(
            "SELECT id, name, normalized_name, biography, birth_date, death_date, url FROM authors ORDER BY name",
        )?;
        let authors = stmt
            .query_map([], |row| {
                Ok(Author {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    normalized_name: row.get(2)?,
                    biography: row.get(3)?,
                    birth_date: row.get(4)?,
                    death_date: row.get(5)?,
                    url: row.get(6)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(authors
            .into_iter()
            .filter_map(|author| {
                counts.get(&author.id).map(|&count| AuthorSummary {
                    visible_book_count: count,
                    author,
                })
            })
            .collect())
    })
}

pub fn get(store: &Store, user: &AuthUser, id: i64) -> AppResult<Option<AuthorSummary>> {
    Ok(list(store, user)?.into_iter().find(|a| a.author.id == id))
}

/// Get-or-create by normalized name, used by the indexer when it encounters
/// a book under a new author directory.
pub(crate) fn get_or_create_author(conn: &rusqlite::Connection, name: &str) -> AppResult<i64> {
    let normalized = normalize(name);
    conn.execute(
        "INSERT OR IGNORE INTO authors (name, normalized_name) VALUES (?1, ?2)",
        params![name, normalized],
    )?;
    Ok(conn.query_row(
        "SELECT id FROM authors WHERE normalized_name = ?1",
        params![normalized],
        |row| row.get(0),
    )?)
}

pub(crate) fn normalize(name: &str) -> String {
    name.trim().to_lowercase()
}
