//! Shared test harness: an in-memory `Store` plus a temp-dir library root.
//! Mirrors `server/tests/helpers/mod.rs`'s `TestHarness::from_fixture` — a
//! temp dir kept alive as a struct field so the guard doesn't drop early,
//! state built once up front.

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use stackhouse::config::Config;
use stackhouse::models::AuthUser;
use stackhouse::store::Store;
use tempfile::TempDir;

/// A `Config` that never touches the process environment, for tests that
/// need to drive `identity::register`/`login` or the indexer/reconciler
/// directly. Values line up with `Config::from_env`'s own defaults.
pub fn test_config(library_directories: Vec<PathBuf>) -> Config {
    Config {
        jwt_secret: b"test-secret-at-least-32-bytes-long!".to_vec(),
        library_directories,
        port: 0,
        database_path: PathBuf::from(":memory:"),
        scan_interval: Duration::from_secs(300),
        cleanup_interval: Duration::from_secs(3600),
        archive_retention: chrono::Duration::days(365),
        external_metadata_user_agent: None,
        google_books_api_key: None,
        dev_mode: true,
    }
}

pub struct TestHarness {
    pub store: Store,
    library_root: TempDir,
}

impl TestHarness {
    pub fn new() -> Self {
        let store = Store::open_in_memory().expect("open in-memory store");
        let library_root = TempDir::new().expect("create temp library root");
        TestHarness { store, library_root }
    }

    pub fn library_root(&self) -> PathBuf {
        self.library_root.path().to_path_buf()
    }

    /// Writes `<root>/<author>/<title>/<filename>` with `contents`, returning
    /// the absolute path.
    pub fn write_book(&self, author: &str, title: &str, filename: &str, contents: &[u8]) -> PathBuf {
        let dir = self.library_root.path().join(author).join(title);
        fs::create_dir_all(&dir).expect("create book directory");
        let path = dir.join(filename);
        fs::write(&path, contents).expect("write book file");
        path
    }

    /// Registers a user directly (bypassing the HTTP layer) and grants the
    /// named role. Returns an `AuthUser` usable with the visibility/service
    /// layer in tests.
    pub fn seed_user(&self, username: &str, role: &str) -> AuthUser {
        let user_id = self
            .store
            .with_conn({
                let username = username.to_string();
                move |conn| {
                    let now = chrono::Utc::now().to_rfc3339();
                    conn.execute(
                        "INSERT INTO users (username, email, password_hash, display_name, created_at, updated_at)
                         VALUES (?1, ?2, 'test-hash', ?1, ?3, ?3)",
                        rusqlite::params![username, format!("{username}@example.com"), now],
                    )?;
                    Ok(conn.last_insert_rowid())
                }
            })
            .expect("seed user");

        self.store
            .with_conn({
                let role = role.to_string();
                move |conn| {
                    conn.execute(
                        "INSERT INTO user_roles (user_id, role_id) SELECT ?1, id FROM roles WHERE name = ?2",
                        rusqlite::params![user_id, role],
                    )?;
                    Ok(())
                }
            })
            .expect("grant role");

        AuthUser { user_id, roles: vec![role.to_string()] }
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
