//! Library indexer: makes the `books` table reflect the filesystem,
//! idempotently and tolerant of partial failures.
//!
//! The per-root fan-out mirrors the teacher's
//! `repo_specs.par_iter().map(scan_repo_with_options...)` in
//! `server/src/main.rs`; per-file processing is a plain skip-on-error loop
//! like `server/src/scan.rs`'s `scan_files`.

pub mod reconcile;

use std::path::{Path, PathBuf};

use rayon::prelude::*;
use rusqlite::params;
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::cover;
use crate::metadata::{self, MetadataLookup};
use crate::services::{authors, tags};
use crate::store::Store;

#[derive(Debug, Default, Clone, Copy)]
pub struct IndexStats {
    pub discovered: usize,
    pub inserted: usize,
    pub skipped_existing: usize,
    pub errors: usize,
}

/// Auto-tag rules: a genre tag fires when a path component contains any of
/// its substrings, case-insensitive. A fixed, small table — admins can
/// still hand-tag anything it misses.
const GENRE_RULES: &[(&str, &[&str])] = &[
    ("Fantasy", &["fantasy"]),
    ("Science Fiction", &["sci-fi", "scifi", "science fiction"]),
    ("Mystery", &["mystery", "detective"]),
    ("Biography", &["biography", "memoir"]),
    ("Comics", &["comic", "graphic novel"]),
];

/// Scans every configured root in parallel, inserting new books and
/// refreshing stale metadata on known ones. Never clobbers a Book whose
/// `file_path` already exists (its row is externally authoritative).
pub async fn scan(store: &Store, roots: &[PathBuf], lookup: &dyn MetadataLookup) -> IndexStats {
    // `store`/`roots` are borrowed, not `'static`, so this can't move onto
    // `spawn_blocking`'s own pool; `block_in_place` tells the runtime to
    // hand this worker's other tasks to a fresh thread instead while the
    // rayon fan-out runs to completion here (same mechanism dashflow's
    // `consumer::commit` uses for a borrowed, synchronous checkpoint write).
    let per_root: Vec<IndexStats> = tokio::task::block_in_place(|| {
        roots.par_iter().map(|root| scan_root(store, root)).collect()
    });

    let mut total = IndexStats::default();
    for stats in per_root {
        total.discovered += stats.discovered;
        total.inserted += stats.inserted;
        total.skipped_existing += stats.skipped_existing;
        total.errors += stats.errors;
    }

    // Enrichment runs after insertion, sequentially, since it's network-bound
    // and best-effort (spec §4.5/§4.6 step 6).
    if total.inserted > 0 {
        enrich_pending(store, lookup).await;
    }

    info!(
        discovered = total.discovered,
        inserted = total.inserted,
        skipped = total.skipped_existing,
        errors = total.errors,
        "index scan complete"
    );
    total
}

fn scan_root(store: &Store, root: &Path) -> IndexStats {
    let mut stats = IndexStats::default();

    let walker = WalkDir::new(root).into_iter().filter_map(|entry| entry.ok());
    for entry in walker {
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let Some(ext) = path.extension().and_then(|e| e.to_str()) else { continue };
        if !metadata::is_supported_extension(ext) {
            continue;
        }
        stats.discovered += 1;

        match process_file(store, path) {
            Ok(true) => stats.inserted += 1,
            Ok(false) => stats.skipped_existing += 1,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to index file, skipping");
                stats.errors += 1;
            }
        }
    }

    stats
}

/// Returns `Ok(true)` if a new Book row was inserted, `Ok(false)` if an
/// existing row was left untouched (or only had empty fields refreshed).
fn process_file(store: &Store, path: &Path) -> crate::error::AppResult<bool> {
    let canonical = path.canonicalize()?;
    let file_path = canonical.to_string_lossy().to_string();

    let existing_id: Option<i64> = store.with_conn({
        let file_path = file_path.clone();
        move |conn| {
            Ok(conn
                .query_row(
                    "SELECT id FROM books WHERE file_path = ?1 AND status != 'deleted'",
                    params![file_path],
                    |row| row.get(0),
                )
                .ok())
        }
    })?;

    if let Some(book_id) = existing_id {
        refresh_empty_fields(store, book_id, &canonical)?;
        return Ok(false);
    }

    let derived = metadata::derive(&canonical).ok_or_else(|| {
        crate::error::AppError::Validation(format!(
            "{} does not match the author/title path convention",
            canonical.display()
        ))
    })?;
    let file_size = canonical.metadata()?.len() as i64;
    let cover_path = cover::resolve(&canonical).map(|p| p.to_string_lossy().to_string());
    let name = title_case_from_path(&canonical);

    store.with_tx(move |tx| {
        let author_id = authors::get_or_create_author(tx, &derived.author_name)?;
        let now = chrono::Utc::now().to_rfc3339();
        tx.execute(
            "INSERT INTO books (name, author_id, file_path, file_format, file_size, isbn, cover_image_path, status, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 'active', ?8, ?8)",
            params![
                name, author_id, file_path, derived.file_format, file_size, derived.isbn,
                cover_path, now,
            ],
        )?;
        let book_id = tx.last_insert_rowid();

        tags::apply_tag(tx, book_id, &derived.file_format.to_uppercase(), true)?;
        for (tag_name, needles) in GENRE_RULES {
            let haystack = file_path.to_lowercase();
            if needles.iter().any(|n| haystack.contains(n)) {
                tags::apply_tag(tx, book_id, tag_name, true)?;
            }
        }

        Ok(())
    })?;

    Ok(true)
}

fn refresh_empty_fields(store: &Store, book_id: i64, path: &Path) -> crate::error::AppResult<()> {
    let file_size = path.metadata()?.len() as i64;
    let cover_path = cover::resolve(path).map(|p| p.to_string_lossy().to_string());

    store.with_tx(move |tx| {
        tx.execute(
            "UPDATE books SET
                file_size = CASE WHEN file_size = 0 THEN ?1 ELSE file_size END,
                cover_image_path = COALESCE(cover_image_path, ?2)
             WHERE id = ?3",
            params![file_size, cover_path, book_id],
        )?;
        Ok(())
    })
}

fn title_case_from_path(path: &Path) -> String {
    path.parent()
        .and_then(|p| p.file_name())
        .and_then(|n| n.to_str())
        .unwrap_or("Unknown Title")
        .to_string()
}

async fn enrich_pending(store: &Store, lookup: &dyn MetadataLookup) {
    let pending: Vec<(i64, String)> = store
        .with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, isbn FROM books WHERE isbn IS NOT NULL AND description IS NULL",
            )?;
            stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
                .collect::<Result<Vec<_>, _>>()
                .map_err(crate::error::AppError::from)
        })
        .unwrap_or_default();

    for (book_id, isbn) in pending {
        if let Some(enriched) = lookup.lookup(&isbn).await {
            let result = store.with_tx(move |tx| {
                tx.execute(
                    "UPDATE books SET description = ?1, page_count = ?2, publisher = ?3, publication_date = ?4
                     WHERE id = ?5",
                    params![
                        enriched.description,
                        enriched.page_count,
                        enriched.publisher,
                        enriched.publication_date,
                        book_id,
                    ],
                )?;
                Ok(())
            });
            if let Err(e) = result {
                warn!(book_id, error = %e, "failed to persist metadata enrichment");
            }
        }
    }
}
