//! Embedded relational persistence.
//!
//! A single `rusqlite::Connection` opened in WAL mode, guarded by a mutex so
//! writes are always serialized — the "construct once, hand out an `Arc`"
//! shape the teacher uses for its shared server state, applied here to a
//! real embedded database instead of an in-memory `RwLock<ServerState>`.

mod migrations;

use std::path::Path;
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use rusqlite::Connection;
use tracing::warn;

use crate::error::{AppError, AppResult};

/// Number of times a write is retried on `SQLITE_BUSY` before giving up.
const BUSY_RETRY_COUNT: u32 = 5;
/// Cap on the exponential backoff between busy retries.
const BUSY_RETRY_CAP: Duration = Duration::from_millis(250);

pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    /// Open (creating if absent) the database file at `path`, enable WAL mode,
    /// and run all pending migrations.
    pub fn open(path: &Path) -> AppResult<Self> {
        let conn = Connection::open(path).map_err(AppError::from)?;
        conn.pragma_update(None, "journal_mode", "WAL").map_err(AppError::from)?;
        conn.pragma_update(None, "foreign_keys", "ON").map_err(AppError::from)?;
        let store = Store { conn: Mutex::new(conn) };
        store.migrate()?;
        Ok(store)
    }

    /// In-memory database, used by tests — still migrated, still
    /// single-writer, just not persisted to disk.
    pub fn open_in_memory() -> AppResult<Self> {
        let conn = Connection::open_in_memory().map_err(AppError::from)?;
        conn.pragma_update(None, "foreign_keys", "ON").map_err(AppError::from)?;
        let store = Store { conn: Mutex::new(conn) };
        store.migrate()?;
        Ok(store)
    }

    fn migrate(&self) -> AppResult<()> {
        let mut conn = self.conn.lock().expect("store mutex poisoned");
        migrations::run(&mut conn)
    }

    /// Run `f` with exclusive access to the connection, retrying on
    /// `SQLITE_BUSY` with bounded exponential backoff. This is the only way
    /// the rest of the codebase is allowed to touch the connection — it
    /// keeps the "single writer, readers coexist through WAL" discipline in
    /// one place.
    pub fn with_conn<T>(&self, f: impl Fn(&Connection) -> AppResult<T>) -> AppResult<T> {
        let mut attempt = 0;
        loop {
            let conn = self.conn.lock().expect("store mutex poisoned");
            match f(&conn) {
                Ok(v) => return Ok(v),
                Err(AppError::Storage(msg)) if is_busy(&msg) && attempt < BUSY_RETRY_COUNT => {
                    drop(conn);
                    let backoff = std::cmp::min(
                        Duration::from_millis(10 * 2u64.pow(attempt)),
                        BUSY_RETRY_CAP,
                    );
                    warn!(attempt, "store busy, retrying after backoff");
                    thread::sleep(backoff);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Run `f` inside a transaction, committing on `Ok` and rolling back on
    /// any `Err`. Every multi-statement write in the codebase goes through
    /// this rather than issuing bare statements.
    pub fn with_tx<T>(&self, f: impl Fn(&rusqlite::Transaction) -> AppResult<T>) -> AppResult<T> {
        self.with_conn(|conn| {
            // rusqlite's `Connection::transaction` needs `&mut Connection`,
            // but our contract is `&Connection` behind the mutex guard —
            // use `unchecked_transaction` which only requires shared access
            // and still gives us full commit/rollback semantics.
            let tx = conn.unchecked_transaction().map_err(AppError::from)?;
            match f(&tx) {
                Ok(v) => {
                    tx.commit().map_err(AppError::from)?;
                    Ok(v)
                }
                Err(e) => {
                    let _ = tx.rollback();
                    Err(e)
                }
            }
        })
    }
}

fn is_busy(msg: &str) -> bool {
    msg.contains("database is locked") || msg.contains("SQLITE_BUSY")
}
