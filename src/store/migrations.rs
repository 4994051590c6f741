//! Ordered, idempotent schema migrations.
//!
//! Each migration is `(name, sql)`; `name` is permanent once shipped. A
//! `schema_migrations` table records what has already run, and `run()`
//! applies everything not yet recorded, each inside its own transaction —
//! matching the spec's "fails fast on any error" / "single transaction per
//! migration" rule (SPEC_FULL.md §4.1).

use rusqlite::Connection;

use crate::error::{AppError, AppResult};

type Migration = (&'static str, &'static str);

const MIGRATIONS: &[Migration] = &[
    ("0001_schema_migrations", "SELECT 1"), // placeholder; table is created unconditionally below
    (
        "0002_identity",
        "
        CREATE TABLE users (
            id            INTEGER PRIMARY KEY AUTOINCREMENT,
            username      TEXT NOT NULL UNIQUE,
            email         TEXT NOT NULL UNIQUE,
            password_hash TEXT NOT NULL,
            display_name  TEXT NOT NULL,
            is_active     INTEGER NOT NULL DEFAULT 1,
            created_at    TEXT NOT NULL,
            updated_at    TEXT NOT NULL
        );

        CREATE TABLE roles (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            name        TEXT NOT NULL UNIQUE,
            description TEXT NOT NULL DEFAULT ''
        );

        CREATE TABLE permissions (
            id            INTEGER PRIMARY KEY AUTOINCREMENT,
            name          TEXT NOT NULL UNIQUE,
            resource_type TEXT NOT NULL,
            description   TEXT NOT NULL DEFAULT ''
        );

        CREATE TABLE role_permissions (
            role_id       INTEGER NOT NULL REFERENCES roles(id) ON DELETE CASCADE,
            permission_id INTEGER NOT NULL REFERENCES permissions(id) ON DELETE CASCADE,
            PRIMARY KEY (role_id, permission_id)
        );

        CREATE TABLE user_roles (
            user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            role_id INTEGER NOT NULL REFERENCES roles(id) ON DELETE CASCADE,
            PRIMARY KEY (user_id, role_id)
        );

        CREATE TABLE invitations (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            email       TEXT NOT NULL,
            token_hash  TEXT NOT NULL UNIQUE,
            expires_at  TEXT NOT NULL,
            consumed_at TEXT,
            created_at  TEXT NOT NULL
        );

        CREATE TABLE auth_settings (
            id        INTEGER PRIMARY KEY CHECK (id = 1),
            auth_flow TEXT NOT NULL DEFAULT 'signup'
        );
        ",
    ),
    (
        "0003_library",
        "
        CREATE TABLE authors (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            name            TEXT NOT NULL,
            normalized_name TEXT NOT NULL UNIQUE,
            biography       TEXT,
            birth_date      TEXT,
            death_date      TEXT,
            url             TEXT
        );

        CREATE TABLE books (
            id                INTEGER PRIMARY KEY AUTOINCREMENT,
            name              TEXT NOT NULL,
            author_id         INTEGER NOT NULL REFERENCES authors(id),
            file_path         TEXT NOT NULL UNIQUE,
            file_format       TEXT NOT NULL,
            file_size         INTEGER NOT NULL,
            isbn              TEXT,
            description       TEXT,
            page_count        INTEGER,
            publisher         TEXT,
            publication_date  TEXT,
            cover_image_path  TEXT,
            status            TEXT NOT NULL DEFAULT 'active',
            archived_at       TEXT,
            archive_reason    TEXT,
            created_at        TEXT NOT NULL,
            updated_at        TEXT NOT NULL
        );

        CREATE INDEX idx_books_author ON books(author_id);
        CREATE INDEX idx_books_status ON books(status);
        ",
    ),
    (
        "0004_tags",
        "
        CREATE TABLE tags (
            id                  INTEGER PRIMARY KEY AUTOINCREMENT,
            name                TEXT NOT NULL UNIQUE,
            category            TEXT NOT NULL,
            requires_permission TEXT
        );

        CREATE TABLE book_tags (
            book_id      INTEGER NOT NULL REFERENCES books(id) ON DELETE CASCADE,
            tag_id       INTEGER NOT NULL REFERENCES tags(id) ON DELETE CASCADE,
            applied_by   INTEGER REFERENCES users(id),
            auto_applied INTEGER NOT NULL DEFAULT 0,
            applied_at   TEXT NOT NULL,
            PRIMARY KEY (book_id, tag_id)
        );

        CREATE TABLE user_tag_preferences (
            user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            tag_id  INTEGER NOT NULL REFERENCES tags(id) ON DELETE CASCADE,
            state   TEXT NOT NULL,
            PRIMARY KEY (user_id, tag_id)
        );
        ",
    ),
    (
        "0005_reading_progress",
        "
        CREATE TABLE reading_progress (
            user_id             INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            book_id             INTEGER NOT NULL REFERENCES books(id) ON DELETE CASCADE,
            current_page        INTEGER NOT NULL DEFAULT 0,
            total_pages         INTEGER,
            percentage_complete REAL NOT NULL DEFAULT 0.0,
            started_at          TEXT NOT NULL,
            completed_at        TEXT,
            last_read_at        TEXT NOT NULL,
            PRIMARY KEY (user_id, book_id)
        );
        ",
    ),
    (
        "0006_seed_permissions",
        "
        INSERT INTO permissions (name, resource_type, description) VALUES
            ('books.read',    'books', 'Read visible books'),
            ('books.write',   'books', 'Tag and archive books'),
            ('books.manage',  'books', 'Trigger archive reconciliation'),
            ('content.nsfw',  'tags',  'See books gated behind the NSFW tag'),
            ('admin.full',    'admin', 'Full administrative access');
        ",
    ),
    (
        "0007_seed_roles",
        "
        INSERT INTO roles (name, description) VALUES
            ('admin', 'Administrator — full access'),
            ('user',  'Standard library member');

        INSERT INTO role_permissions (role_id, permission_id)
        SELECT r.id, p.id FROM roles r, permissions p WHERE r.name = 'admin';

        INSERT INTO role_permissions (role_id, permission_id)
        SELECT r.id, p.id FROM roles r, permissions p
        WHERE r.name = 'user' AND p.name IN ('books.read');
        ",
    ),
    (
        "0008_seed_tags",
        "
        INSERT INTO tags (name, category, requires_permission) VALUES
            ('EPUB', 'format', NULL),
            ('PDF', 'format', NULL),
            ('MOBI', 'format', NULL),
            ('AZW3', 'format', NULL),
            ('CBZ', 'format', NULL),
            ('CBR', 'format', NULL),
            ('Fiction', 'genre', NULL),
            ('Non-Fiction', 'genre', NULL),
            ('Fantasy', 'genre', NULL),
            ('Science Fiction', 'genre', NULL),
            ('Mystery', 'genre', NULL),
            ('Biography', 'genre', NULL),
            ('Comics', 'genre', NULL),
            ('NSFW', 'content-rating', 'content.nsfw');
        ",
    ),
    (
        "0009_seed_auth_settings",
        "INSERT INTO auth_settings (id, auth_flow) VALUES (1, 'signup');",
    ),
];

pub fn run(conn: &mut Connection) -> AppResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            name TEXT PRIMARY KEY,
            applied_at TEXT NOT NULL
        );",
    )
    .map_err(AppError::from)?;

    for (name, sql) in MIGRATIONS {
        let already_applied: bool = conn
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM schema_migrations WHERE name = ?1)",
                [name],
                |row| row.get(0),
            )
            .map_err(AppError::from)?;
        if already_applied {
            continue;
        }

        let tx = conn.transaction().map_err(AppError::from)?;
        tx.execute_batch(sql).map_err(AppError::from)?;
        tx.execute(
            "INSERT INTO schema_migrations (name, applied_at) VALUES (?1, ?2)",
            rusqlite::params![name, chrono::Utc::now().to_rfc3339()],
        )
        .map_err(AppError::from)?;
        tx.commit().map_err(AppError::from)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_idempotent() {
        let mut conn = Connection::open_in_memory().unwrap();
        run(&mut conn).unwrap();
        run(&mut conn).unwrap();

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_migrations", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, MIGRATIONS.len() as i64);
    }

    #[test]
    fn seeds_catalog() {
        let mut conn = Connection::open_in_memory().unwrap();
        run(&mut conn).unwrap();

        let perms: i64 =
            conn.query_row("SELECT COUNT(*) FROM permissions", [], |r| r.get(0)).unwrap();
        assert_eq!(perms, 5);

        let admin_perms: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM role_permissions rp
                 JOIN roles r ON r.id = rp.role_id WHERE r.name = 'admin'",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(admin_perms, 5);

        let nsfw_gate: String = conn
            .query_row(
                "SELECT requires_permission FROM tags WHERE name = 'NSFW'",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(nsfw_gate, "content.nsfw");
    }
}
