//! HTTP-layer coverage: drives `build_router` directly with
//! `tower::ServiceExt::oneshot`, the way `dashflow-registry`'s
//! `tests/api_integration.rs` exercises its own router — so auth
//! middleware, status codes, and JSON (de)serialization are all actually
//! on the hook, not just the service functions underneath them.

mod common;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use serde_json::{json, Value};
use tower::util::ServiceExt;

use stackhouse::http::{build_router, AppContext, SharedContext};
use stackhouse::metadata::NullLookup;
use stackhouse::store::Store;

fn write_book(root: &Path, author: &str, title: &str, filename: &str, contents: &[u8]) -> PathBuf {
    let dir = root.join(author).join(title);
    fs::create_dir_all(&dir).expect("create book directory");
    let path = dir.join(filename);
    fs::write(&path, contents).expect("write book file");
    path
}

fn app(store: Store, config: stackhouse::config::Config) -> (axum::Router, SharedContext) {
    let ctx: SharedContext =
        Arc::new(AppContext { store, config, metadata_lookup: Box::new(NullLookup) });
    (build_router(ctx.clone(), None), ctx)
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn json_request(method: &str, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder =
        Request::builder().method(method).uri(uri).header(header::CONTENT_TYPE, "application/json");
    if let Some(t) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {t}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn get_request(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(t) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {t}"));
    }
    builder.body(Body::empty()).unwrap()
}

fn seed_reader(store: &Store) -> i64 {
    store
        .with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (username, email, password_hash, display_name, created_at, updated_at)
                 VALUES ('reader', 'reader@x', 'test-hash', 'reader', datetime('now'), datetime('now'))",
                [],
            )?;
            let id = conn.last_insert_rowid();
            conn.execute(
                "INSERT INTO user_roles (user_id, role_id) SELECT ?1, id FROM roles WHERE name = 'user'",
                rusqlite::params![id],
            )?;
            Ok(id)
        })
        .unwrap()
}

/// Scenario B: registering into an empty DB returns `201` and the first
/// user is an admin; logging in afterwards returns `200` with a token.
#[tokio::test]
async fn scenario_b_register_then_login() {
    let library_root = tempfile::TempDir::new().unwrap();
    let store = Store::open_in_memory().unwrap();
    let config = common::test_config(vec![library_root.path().to_path_buf()]);
    let (router, _ctx) = app(store, config);

    let register_body = json!({
        "username": "a",
        "email": "a@x",
        "password": "pw123456",
        "display_name": "A",
    });
    let response =
        router.clone().oneshot(json_request("POST", "/auth/register", None, register_body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let user = json_body(response).await;
    assert_eq!(user["display_name"], "A");

    let login_body = json!({ "email": "a@x", "password": "pw123456" });
    let response = router.oneshot(json_request("POST", "/auth/login", None, login_body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let token = json_body(response).await;
    assert!(!token["token"].as_str().unwrap().is_empty());
}

/// Scenario C: with `auth_flow=invitation`, an admin-issued invitation
/// token lets exactly one registration through and is then spent.
#[tokio::test]
async fn scenario_c_invitation_gated_registration() {
    let library_root = tempfile::TempDir::new().unwrap();
    let store = Store::open_in_memory().unwrap();
    let config = common::test_config(vec![library_root.path().to_path_buf()]);
    let (router, ctx) = app(store, config.clone());

    let admin_register = json!({
        "username": "admin",
        "email": "admin@x",
        "password": "pw123456",
        "display_name": "Admin",
    });
    router.clone().oneshot(json_request("POST", "/auth/register", None, admin_register)).await.unwrap();
    stackhouse::services::admin::set_auth_flow(&ctx.store, stackhouse::models::AuthFlow::Invitation).unwrap();

    let admin_login = json!({ "email": "admin@x", "password": "pw123456" });
    let response = router.clone().oneshot(json_request("POST", "/auth/login", None, admin_login)).await.unwrap();
    let admin_token = json_body(response).await["token"].as_str().unwrap().to_string();

    let invite_response = router
        .clone()
        .oneshot(json_request("POST", "/admin/invitations", Some(&admin_token), json!({ "email": "b@x" })))
        .await
        .unwrap();
    assert_eq!(invite_response.status(), StatusCode::OK);
    let invite_token = json_body(invite_response).await["token"].as_str().unwrap().to_string();

    let register_with_invite = json!({
        "username": "b",
        "email": "b@x",
        "password": "pw123456",
        "display_name": "B",
        "invitation_token": invite_token,
    });
    let response = router
        .clone()
        .oneshot(json_request("POST", "/auth/register", None, register_with_invite))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let repeat = json!({
        "username": "b2",
        "email": "b2@x",
        "password": "pw123456",
        "display_name": "B2",
        "invitation_token": invite_token,
    });
    let response = router.oneshot(json_request("POST", "/auth/register", None, repeat)).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

/// Scenario D: a book gated behind a tag's `requires_permission` is
/// invisible (list and 404 on direct fetch) until the viewer holds that
/// permission.
#[tokio::test]
async fn scenario_d_permission_gated_tag_hides_then_reveals_a_book() {
    let library_root = tempfile::TempDir::new().unwrap();
    write_book(library_root.path(), "Author", "Gated Book", "book.epub", b"abcd");
    let store = Store::open_in_memory().unwrap();
    let roots = vec![library_root.path().to_path_buf()];
    stackhouse::indexer::scan(&store, &roots, &NullLookup).await;

    store
        .with_conn(|conn| {
            conn.execute(
                "INSERT INTO tags (name, category, requires_permission)
                 VALUES ('NSFW', 'content-rating', 'content.nsfw')",
                [],
            )?;
            let book_id: i64 = conn.query_row("SELECT id FROM books LIMIT 1", [], |r| r.get(0))?;
            conn.execute(
                "INSERT INTO book_tags (book_id, tag_id) SELECT ?1, id FROM tags WHERE name = 'NSFW'",
                rusqlite::params![book_id],
            )?;
            Ok(())
        })
        .unwrap();
    let book_id: i64 =
        store.with_conn(|conn| conn.query_row("SELECT id FROM books LIMIT 1", [], |r| r.get(0))).unwrap();
    let reader = seed_reader(&store);

    let config = common::test_config(vec![library_root.path().to_path_buf()]);
    let reader_token = stackhouse::identity::tokens::issue(&config.jwt_secret, reader).unwrap();
    let (router, ctx) = app(store, config);

    let list_response = router.clone().oneshot(get_request("/books", Some(&reader_token))).await.unwrap();
    let books = json_body(list_response).await;
    assert_eq!(books.as_array().unwrap().len(), 0);

    let get_response =
        router.clone().oneshot(get_request(&format!("/books/{book_id}"), Some(&reader_token))).await.unwrap();
    assert_eq!(get_response.status(), StatusCode::NOT_FOUND);

    ctx.store
        .with_conn(|conn| {
            conn.execute(
                "INSERT INTO role_permissions (role_id, permission_id)
                 SELECT (SELECT id FROM roles WHERE name = 'user'), id FROM permissions WHERE name = 'content.nsfw'",
                [],
            )?;
            Ok(())
        })
        .unwrap();

    let list_response = router.clone().oneshot(get_request("/books", Some(&reader_token))).await.unwrap();
    let books = json_body(list_response).await;
    assert_eq!(books.as_array().unwrap().len(), 1);

    let get_response =
        router.oneshot(get_request(&format!("/books/{book_id}"), Some(&reader_token))).await.unwrap();
    assert_eq!(get_response.status(), StatusCode::OK);
}

/// Scenario F: a book whose file disappears is archived by reconciliation
/// (via `POST /books/archive/validate`) and hidden from non-admins, then
/// restored to `active` once the file reappears and reconciliation reruns.
#[tokio::test]
async fn scenario_f_archive_validate_hides_from_non_admins_then_restores() {
    let library_root = tempfile::TempDir::new().unwrap();
    let path = write_book(library_root.path(), "Author", "Disappearing Book", "book.epub", b"abcd");
    let store = Store::open_in_memory().unwrap();
    let roots = vec![library_root.path().to_path_buf()];
    stackhouse::indexer::scan(&store, &roots, &NullLookup).await;
    let book_id: i64 =
        store.with_conn(|conn| conn.query_row("SELECT id FROM books LIMIT 1", [], |r| r.get(0))).unwrap();
    let reader = seed_reader(&store);

    let config = common::test_config(vec![library_root.path().to_path_buf()]);
    let reader_token = stackhouse::identity::tokens::issue(&config.jwt_secret, reader).unwrap();
    let (router, _ctx) = app(store, config);

    let admin_register = json!({
        "username": "admin",
        "email": "admin@x",
        "password": "pw123456",
        "display_name": "Admin",
    });
    router.clone().oneshot(json_request("POST", "/auth/register", None, admin_register)).await.unwrap();
    let admin_login = json!({ "email": "admin@x", "password": "pw123456" });
    let response = router.clone().oneshot(json_request("POST", "/auth/login", None, admin_login)).await.unwrap();
    let admin_token = json_body(response).await["token"].as_str().unwrap().to_string();

    fs::remove_file(&path).unwrap();
    let validate_response = router
        .clone()
        .oneshot(json_request("POST", "/books/archive/validate", Some(&admin_token), json!({})))
        .await
        .unwrap();
    assert_eq!(validate_response.status(), StatusCode::OK);

    let admin_get =
        router.clone().oneshot(get_request(&format!("/books/{book_id}"), Some(&admin_token))).await.unwrap();
    let book = json_body(admin_get).await;
    assert_eq!(book["status"], "archived");

    let reader_get =
        router.clone().oneshot(get_request(&format!("/books/{book_id}"), Some(&reader_token))).await.unwrap();
    assert_eq!(reader_get.status(), StatusCode::NOT_FOUND);

    fs::write(&path, b"abcd").unwrap();
    router
        .clone()
        .oneshot(json_request("POST", "/books/archive/validate", Some(&admin_token), json!({})))
        .await
        .unwrap();

    let admin_get =
        router.oneshot(get_request(&format!("/books/{book_id}"), Some(&admin_token))).await.unwrap();
    let book = json_body(admin_get).await;
    assert_eq!(book["status"], "active");
}
