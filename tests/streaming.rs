//! Range-request streaming against a real file on disk, exercising
//! `http::stream::serve_file` the way the router hands it a resolved path.

mod common;

use axum::http::{header, HeaderMap, HeaderValue, StatusCode};

use stackhouse::http::stream::serve_file;

#[tokio::test]
async fn bounded_range_returns_206_with_matching_content_range() {
    let h = common::TestHarness::new();
    let payload = vec![0u8; 2048];
    let path = h.write_book("Author", "Title", "book.epub", &payload);

    let mut headers = HeaderMap::new();
    headers.insert(header::RANGE, HeaderValue::from_static("bytes=0-1023"));

    let response = serve_file(&path, &headers, "epub").await;

    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(response.headers().get(header::CONTENT_LENGTH).unwrap(), "1024");
    assert_eq!(
        response.headers().get(header::CONTENT_RANGE).unwrap(),
        "bytes 0-1023/2048"
    );
}

#[tokio::test]
async fn out_of_bounds_range_returns_416_with_content_range_star() {
    let h = common::TestHarness::new();
    let path = h.write_book("Author", "Title", "book.epub", &vec![0u8; 2048]);

    let mut headers = HeaderMap::new();
    headers.insert(header::RANGE, HeaderValue::from_static("bytes=5000-6000"));

    let response = serve_file(&path, &headers, "epub").await;

    assert_eq!(response.status(), StatusCode::RANGE_NOT_SATISFIABLE);
    assert_eq!(response.headers().get(header::CONTENT_RANGE).unwrap(), "bytes */2048");
}

#[tokio::test]
async fn no_range_header_returns_full_body_with_200() {
    let h = common::TestHarness::new();
    let path = h.write_book("Author", "Title", "book.epub", &vec![7u8; 512]);

    let response = serve_file(&path, &HeaderMap::new(), "epub").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get(header::CONTENT_LENGTH).unwrap(), "512");
    assert_eq!(response.headers().get(header::ACCEPT_RANGES).unwrap(), "bytes");
}
