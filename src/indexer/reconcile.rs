//! Archive reconciliation: keeps `active`/`archived` status in sync with
//! whether a Book's file still exists on disk, and hard-deletes books that
//! have sat archived beyond the retention window.
//!
//! Shape grounded on the mark-then-sweep reconciliation pass in
//! `284ef86d_dshein-alt-ropds__src-scanner-mod.rs.rs`'s `run_scan`
//! (`logical_delete_unavailable` / `physical_delete_unavailable`), retargeted
//! from a single "unavailable" flag to the active↔archived transition this
//! spec requires.

use std::path::Path;

use chrono::Duration;
use rusqlite::params;
use serde::Serialize;
use tracing::info;

use crate::error::AppResult;
use crate::store::Store;

#[derive(Debug, Default, Clone, Copy, Serialize)]
pub struct ReconcileStats {
    pub archived: usize,
    pub restored: usize,
    pub hard_deleted: usize,
}

pub fn run(store: &Store, retention: Duration) -> AppResult<ReconcileStats> {
    let mut stats = ReconcileStats::default();

    let active: Vec<(i64, String)> = store.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT id, file_path FROM books WHERE status = 'active'")?;
        stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(crate::error::AppError::from)
    })?;

    for (id, file_path) in active {
        if !Path::new(&file_path).exists() {
            archive_missing(store, id)?;
            stats.archived += 1;
        }
    }

    let archived: Vec<(i64, String)> = store.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT id, file_path FROM books WHERE status = 'archived' AND archive_reason = 'file missing'",
        )?;
        stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(crate::error::AppError::from)
    })?;

    for (id, file_path) in archived {
        if Path::new(&file_path).exists() {
            restore(store, id)?;
            stats.restored += 1;
        }
    }

    let cutoff = (chrono::Utc::now() - retention).to_rfc3339();
    stats.hard_deleted = hard_delete_expired(store, &cutoff)?;

    info!(
        archived = stats.archived,
        restored = stats.restored,
        hard_deleted = stats.hard_deleted,
        "archive reconciliation complete"
    );

    Ok(stats)
}

fn archive_missing(store: &Store, id: i64) -> AppResult<()> {
    store.with_tx(move |tx| {
        let now = chrono::Utc::now().to_rfc3339();
        tx.execute(
            "UPDATE books SET status = 'archived', archived_at = ?1, archive_reason = 'file missing', updated_at = ?1
             WHERE id = ?2",
            params![now, id],
        )?;
        Ok(())
    })
}

fn restore(store: &Store, id: i64) -> AppResult<()> {
    store.with_tx(move |tx| {
        let now = chrono::Utc::now().to_rfc3339();
        tx.execute(
            "UPDATE books SET status = 'active', archived_at = NULL, archive_reason = NULL, updated_at = ?1
             WHERE id = ?2",
            params![now, id],
        )?;
        Ok(())
    })
}

/// Books archived due to a missing file, past the retention window, are
/// hard-deleted along with dependent `book_tags`/`reading_progress` rows
/// (FK `ON DELETE CASCADE`).
fn hard_delete_expired(store: &Store, cutoff: &str) -> AppResult<usize> {
    let cutoff = cutoff.to_string();
    store.with_tx(move |tx| {
        let removed = tx.execute(
            "DELETE FROM books WHERE status = 'archived' AND archive_reason = 'file missing' AND archived_at < ?1",
            params![cutoff],
        )?;
        Ok(removed)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn seed_book(store: &Store, path: &str, archived_at: Option<&str>) -> i64 {
        store
            .with_conn(|conn| {
                conn.execute("INSERT INTO authors (name, normalized_name) VALUES ('A', 'a')", []).ok();
                let author_id: i64 =
                    conn.query_row("SELECT id FROM authors WHERE normalized_name = 'a'", [], |r| r.get(0))?;
                Ok(author_id)
            })
            .unwrap();

        let status = if archived_at.is_some() { "archived" } else { "active" };
        store
            .with_conn({
                let path = path.to_string();
                let archived_at = archived_at.map(|s| s.to_string());
                move |conn| {
                    conn.execute(
                        "INSERT INTO books (name, author_id, file_path, file_format, file_size, status, archived_at, archive_reason, created_at, updated_at)
                         VALUES ('Book', 1, ?1, 'epub', 10, ?2, ?3, 'file missing', '2026-01-01', '2026-01-01')",
                        params![path, status, archived_at],
                    )?;
                    Ok(conn.last_insert_rowid())
                }
            })
            .unwrap()
    }

    #[test]
    fn archives_active_book_with_missing_file() {
        let store = Store::open_in_memory().unwrap();
        let id = seed_book(&store, "/tmp/does-not-exist-xyz.epub", None);

        run(&store, Duration::days(365)).unwrap();

        let status: String =
            store.with_conn(move |conn| Ok(conn.query_row("SELECT status FROM books WHERE id = ?1", params![id], |r| r.get(0))?)).unwrap();
        assert_eq!(status, "archived");
    }

    #[test]
    fn restores_archived_book_whose_file_reappeared() {
        let store = Store::open_in_memory().unwrap();
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let id = seed_book(&store, tmp.path().to_str().unwrap(), Some("2026-01-01T00:00:00Z"));

        run(&store, Duration::days(365)).unwrap();

        let status: String =
            store.with_conn(move |conn| Ok(conn.query_row("SELECT status FROM books WHERE id = ?1", params![id], |r| r.get(0))?)).unwrap();
        assert_eq!(status, "active");
    }

    #[test]
    fn hard_deletes_past_retention() {
        let store = Store::open_in_memory().unwrap();
        let id = seed_book(&store, "/tmp/does-not-exist-xyz.epub", Some("2000-01-01T00:00:00Z"));

        run(&store, Duration::days(365)).unwrap();

        let count: i64 = store
            .with_conn(move |conn| Ok(conn.query_row("SELECT COUNT(*) FROM books WHERE id = ?1", params![id], |r| r.get(0))?))
            .unwrap();
        assert_eq!(count, 0);
        let _ = fs::metadata("/tmp/does-not-exist-xyz.epub");
    }
}
