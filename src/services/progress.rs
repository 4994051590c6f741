//! Reading progress service: percentage recomputation, streak calculation,
//! and the aggregate views (recent / currently-reading / completed).

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::params;

use crate::error::{AppError, AppResult};
use crate::models::{ReadingProgress, ReadingStats};
use crate::store::Store;

fn recompute_percentage(current_page: i64, total_pages: Option<i64>) -> f64 {
    match total_pages {
        Some(total) if total > 0 => {
            (current_page as f64 / total as f64 * 100.0).clamp(0.0, 100.0)
        }
        _ => 0.0,
    }
}

pub fn get(store: &Store, user_id: i64, book_id: i64) -> AppResult<Option<ReadingProgress>> {
    store.with_conn(move |conn| {
        conn.query_row(
            "SELECT user_id, book_id, current_page, total_pages, percentage_complete,
                    started_at, completed_at, last_read_at
             FROM reading_progress WHERE user_id = ?1 AND book_id = ?2",
            params![user_id, book_id],
            row_to_progress,
        )
        .map(Some)
        .or_else(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => Ok(None),
            other => Err(AppError::from(other)),
        })
    })
}

fn row_to_progress(row: &rusqlite::Row) -> rusqlite::Result<ReadingProgress> {
    Ok(ReadingProgress {
        user_id: row.get(0)?,
        book_id: row.get(1)?,
        current_page: row.get(2)?,
        total_pages: row.get(3)?,
        percentage_complete: row.get(4)?,
        started_at: row.get(5)?,
        completed_at: row.get(6)?,
        last_read_at: row.get(7)?,
    })
}

pub fn start(store: &Store, user_id: i64, book_id: i64) -> AppResult<ReadingProgress> {
    store.with_tx(move |tx| {
        let now = Utc::now().to_rfc3339();
        tx.execute(
            "INSERT INTO reading_progress (user_id, book_id, current_page, percentage_complete, started_at, last_read_at)
             VALUES (?1, ?2, 0, 0.0, ?3, ?3)
             ON CONFLICT(user_id, book_id) DO NOTHING",
            params![user_id, book_id, now],
        )?;
        tx.query_row(
            "SELECT user_id, book_id, current_page, total_pages, percentage_complete,
                    started_at, completed_at, last_read_at
             FROM reading_progress WHERE user_id = ?1 AND book_id = ?2",
            params![user_id, book_id],
            row_to_progress,
        )
        .map_err(AppError::from)
    })
}

/// Updates current (and optionally total) page, recomputes the percentage,
/// and refreshes `last_read_at` to server time on every call.
pub fn update(
    store: &Store,
    user_id: i64,
    book_id: i64,
    current_page: i64,
    total_pages: Option<i64>,
) -> AppResult<ReadingProgress> {
    store.with_tx(move |tx| {
        let now = Utc::now().to_rfc3339();
        let existing_total: Option<i64> = tx
            .query_row(
                "SELECT total_pages FROM reading_progress WHERE user_id = ?1 AND book_id = ?2",
                params![user_id, book_id],
                |row| row.get(0),
            )
            .unwrap_or(None);
        let effective_total = total_pages.or(existing_total);
        let percentage = recompute_percentage(current_page, effective_total);

        tx.execute(
            "INSERT INTO reading_progress (user_id, book_id, current_page, total_pages, percentage_complete, started_at, last_read_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
             ON CONFLICT(user_id, book_id) DO UPDATE SET
                current_page = excluded.current_page,
                total_pages = COALESCE(excluded.total_pages, reading_progress.total_pages),
                percentage_complete = excluded.percentage_complete,
                last_read_at = excluded.last_read_at",
            params![user_id, book_id, current_page, total_pages, percentage, now],
        )?;

        tx.query_row(
            "SELECT user_id, book_id, current_page, total_pages, percentage_complete,
                    started_at, completed_at, last_read_at
             FROM reading_progress WHERE user_id = ?1 AND book_id = ?2",
            params![user_id, book_id],
            row_to_progress,
        )
        .map_err(AppError::from)
    })
}

/// Marks a book complete: sets `current_page` to `total_pages` when known,
/// percentage to 100, and stamps `completed_at`.
pub fn complete(store: &Store, user_id: i64, book_id: i64) -> AppResult<ReadingProgress> {
    store.with_tx(move |tx| {
        let now = Utc::now().to_rfc3339();
        let total_pages: Option<i64> = tx
            .query_row(
                "SELECT total_pages FROM reading_progress WHERE user_id = ?1 AND book_id = ?2",
                params![user_id, book_id],
                |row| row.get(0),
            )
            .unwrap_or(None);

        tx.execute(
            "UPDATE reading_progress SET
                current_page = COALESCE(?3, current_page),
                percentage_complete = 100.0,
                completed_at = ?4,
                last_read_at = ?4
             WHERE user_id = ?1 AND book_id = ?2",
            params![user_id, book_id, total_pages, now],
        )?;

        tx.query_row(
            "SELECT user_id, book_id, current_page, total_pages, percentage_complete,
                    started_at, completed_at, last_read_at
             FROM reading_progress WHERE user_id = ?1 AND book_id = ?2",
            params![user_id, book_id],
            row_to_progress,
        )
        .map_err(AppError::from)
    })
}

pub fn reset(store: &Store, user_id: i64, book_id: i64) -> AppResult<()> {
    store.with_tx(move |tx| {
        let removed =
            tx.execute("DELETE FROM reading_progress WHERE user_id = ?1 AND book_id = ?2", params![user_id, book_id])?;
        if removed == 0 {
            return Err(AppError::NotFound("reading progress".into()));
        }
        Ok(())
    })
}

/// Every reading-progress row for `user_id`, most recently read first.
pub fn all(store: &Store, user_id: i64) -> AppResult<Vec<ReadingProgress>> {
    list_where(store, user_id, "1 = 1")
}

pub fn currently_reading(store: &Store, user_id: i64) -> AppResult<Vec<ReadingProgress>> {
    list_where(store, user_id, "completed_at IS NULL AND current_page > 0")
}

pub fn completed(store: &Store, user_id: i64) -> AppResult<Vec<ReadingProgress>> {
    list_where(store, user_id, "completed_at IS NOT NULL")
}

pub fn recent(store: &Store, user_id: i64, limit: i64) -> AppResult<Vec<ReadingProgress>> {
    store.with_conn(move |conn| {
        let mut stmt = conn.prepare(
            "SELECT user_id, book_id, current_page, total_pages, percentage_complete,
                    started_at, completed_at, last_read_at
             FROM reading_progress WHERE user_id = ?1 ORDER BY last_read_at DESC LIMIT ?2",
        )?;
        stmt.query_map(params![user_id, limit], row_to_progress)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(AppError::from)
    })
}

fn list_where(store: &Store, user_id: i64, clause: &str) -> AppResult<Vec<ReadingProgress>> {
    let sql = format!(
        "SELECT user_id, book_id, current_page, total_pages, percentage_complete,
                started_at, completed_at, last_read_at
         FROM reading_progress WHERE user_id = ?1 AND {clause} ORDER BY last_read_at DESC"
    );
    store.with_conn(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        stmt.query_map(params![user_id], row_to_progress)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(AppError::from)
    })
}

/// Longest trailing run of distinct calendar days (server timezone) with at
/// least one progress update, ending today. `updates` is every
/// `last_read_at` timestamp for the user, any order.
pub fn streak(updates: &[DateTime<Utc>], today: NaiveDate) -> u32 {
    let mut days: Vec<NaiveDate> = updates.iter().map(|dt| dt.date_naive()).collect();
    days.sort_unstable();
    days.dedup();

    let mut streak = 0u32;
    let mut cursor = today;
    while days.contains(&cursor) {
        streak += 1;
        cursor = match cursor.pred_opt() {
            Some(d) => d,
            None => break,
        };
    }
    streak
}

/// Aggregate reading stats: current streak plus in-progress/completed counts.
pub fn stats(store: &Store, user_id: i64) -> AppResult<ReadingStats> {
    let last_read: Vec<String> = store.with_conn(move |conn| {
        let mut stmt =
            conn.prepare("SELECT last_read_at FROM reading_progress WHERE user_id = ?1")?;
        stmt.query_map(params![user_id], |row| row.get(0))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(AppError::from)
    })?;

    let updates: Vec<DateTime<Utc>> = last_read
        .iter()
        .filter_map(|raw| DateTime::parse_from_rfc3339(raw).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .collect();

    let current_streak_days = streak(&updates, Utc::now().date_naive());
    let currently_reading_count = currently_reading(store, user_id)?.len() as i64;
    let completed_count = completed(store, user_id)?.len() as i64;

    Ok(ReadingStats { current_streak_days, currently_reading_count, completed_count })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn percentage_clamped_at_boundaries() {
        assert_eq!(recompute_percentage(0, Some(100)), 0.0);
        assert_eq!(recompute_percentage(100, Some(100)), 100.0);
        assert_eq!(recompute_percentage(150, Some(100)), 100.0);
        assert_eq!(recompute_percentage(10, None), 0.0);
    }

    #[test]
    fn streak_counts_consecutive_trailing_days() {
        let today = NaiveDate::from_ymd_opt(2026, 7, 30).unwrap();
        let updates = vec![
            today.and_hms_opt(9, 0, 0).unwrap().and_utc(),
            (today - Duration::days(1)).and_hms_opt(9, 0, 0).unwrap().and_utc(),
            (today - Duration::days(2)).and_hms_opt(9, 0, 0).unwrap().and_utc(),
            (today - Duration::days(5)).and_hms_opt(9, 0, 0).unwrap().and_utc(),
        ];
        assert_eq!(streak(&updates, today), 3);
    }

    #[test]
    fn streak_is_zero_without_an_update_today() {
        let today = NaiveDate::from_ymd_opt(2026, 7, 30).unwrap();
        let updates = vec![(today - Duration::days(1)).and_hms_opt(9, 0, 0).unwrap().and_utc()];
        assert_eq!(streak(&updates, today), 0);
    }

    #[test]
    fn update_then_complete_roundtrip() {
        let store = Store::open_in_memory().unwrap();
        store
            .with_conn(|conn| {
                conn.execute(
                    "INSERT INTO users (username, email, password_hash, display_name, created_at, updated_at)
                     VALUES ('u', 'u@example.com', 'h', 'U', '2026-01-01', '2026-01-01')",
                    [],
                )?;
                conn.execute(
                    "INSERT INTO authors (name, normalized_name) VALUES ('A', 'a')",
                    [],
                )?;
                conn.execute(
                    "INSERT INTO books (name, author_id, file_path, file_format, file_size, status, created_at, updated_at)
                     VALUES ('Book', 1, '/lib/b.epub', 'epub', 10, 'active', '2026-01-01', '2026-01-01')",
                    [],
                )?;
                Ok(())
            })
            .unwrap();

        let updated = update(&store, 1, 1, 50, Some(200)).unwrap();
        assert_eq!(updated.percentage_complete, 25.0);

        let done = complete(&store, 1, 1).unwrap();
        assert_eq!(done.percentage_complete, 100.0);
        assert_eq!(done.current_page, 200);
        assert!(done.completed_at.is_some());
    }
}
