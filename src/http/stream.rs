//! Range-capable file streaming. Never buffers a whole file in memory —
//! `tokio_util::io::ReaderStream` wraps a length-limited `AsyncRead`
//! adapter, the same streaming primitive already imported for book download
//! responses in `f1588bf3_liberodark-ebook-rs__src-server-handlers.rs.rs`.

use std::future::Future;
use std::io;
use std::path::Path;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeekExt, ReadBuf};
use tokio::time::Sleep;
use tokio_util::io::ReaderStream;

use crate::error::{AppError, AppResult};

/// How long a stream may go without forwarding any bytes before the
/// connection is cut. A fixed-duration timeout would also cap legitimate
/// large-file transfers, so this tracks idleness instead of total elapsed
/// time (spec §5).
const STREAM_IDLE_TIMEOUT: Duration = Duration::from_secs(60);

/// Wraps an `AsyncRead` so that a read which makes no progress for
/// `idle` resets into an I/O error instead of hanging the connection
/// forever, while a read that keeps producing bytes can run as long as it
/// likes.
struct IdleTimeoutReader<R> {
    inner: R,
    idle: Duration,
    sleep: Pin<Box<Sleep>>,
}

impl<R> IdleTimeoutReader<R> {
    fn new(inner: R, idle: Duration) -> Self {
        Self { inner, sleep: Box::pin(tokio::time::sleep(idle)), idle }
    }
}

impl<R: AsyncRead + Unpin> AsyncRead for IdleTimeoutReader<R> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        match Pin::new(&mut this.inner).poll_read(cx, buf) {
            Poll::Ready(result) => {
                this.sleep.as_mut().reset(tokio::time::Instant::now() + this.idle);
                Poll::Ready(result)
            }
            Poll::Pending => match this.sleep.as_mut().poll(cx) {
                Poll::Ready(()) => {
                    Poll::Ready(Err(io::Error::new(io::ErrorKind::TimedOut, "stream idle timeout")))
                }
                Poll::Pending => Poll::Pending,
            },
        }
    }
}

struct ByteRange {
    start: u64,
    end: u64,
}

/// Parses a single `bytes=a-b` range header against a known total length.
/// Multi-range requests are not supported (spec scope — §4.9 only promises
/// a single range window).
fn parse_range(header_value: &str, total_len: u64) -> AppResult<ByteRange> {
    let spec = header_value
        .strip_prefix("bytes=")
        .ok_or_else(|| AppError::Range("unsupported range unit".into()))?;
    let (start_s, end_s) =
        spec.split_once('-').ok_or_else(|| AppError::Range("malformed range".into()))?;

    let (start, end) = match (start_s, end_s) {
        ("", "") => return Err(AppError::Range("empty range".into())),
        ("", suffix) => {
            let suffix_len: u64 =
                suffix.parse().map_err(|_| AppError::Range("malformed range".into()))?;
            let start = total_len.saturating_sub(suffix_len);
            (start, total_len.saturating_sub(1))
        }
        (start, "") => {
            let start: u64 = start.parse().map_err(|_| AppError::Range("malformed range".into()))?;
            (start, total_len.saturating_sub(1))
        }
        (start, end) => {
            let start: u64 = start.parse().map_err(|_| AppError::Range("malformed range".into()))?;
            let end: u64 = end.parse().map_err(|_| AppError::Range("malformed range".into()))?;
            (start, end)
        }
    };

    if start > end || end >= total_len || total_len == 0 {
        return Err(AppError::Range(format!("range {start}-{end} not satisfiable for length {total_len}")));
    }

    Ok(ByteRange { start, end })
}

pub async fn serve_file(path: &Path, headers: &HeaderMap, file_format: &str) -> Response {
    let file = match File::open(path).await {
        Ok(f) => f,
        Err(_) => return AppError::NotFound("book file".into()).into_response(),
    };
    let total_len = match file.metadata().await {
        Ok(m) => m.len(),
        Err(e) => return AppError::Io(e.to_string()).into_response(),
    };

    let mime = mime_guess::from_ext(file_format).first_or_octet_stream();

    match headers.get(header::RANGE).and_then(|v| v.to_str().ok()) {
        None => {
            let stream = ReaderStream::new(IdleTimeoutReader::new(file, STREAM_IDLE_TIMEOUT));
            Response::builder()
                .status(StatusCode::OK)
                .header(header::CONTENT_TYPE, mime.as_ref())
                .header(header::CONTENT_LENGTH, total_len)
                .header(header::ACCEPT_RANGES, "bytes")
                .body(Body::from_stream(stream))
                .unwrap()
        }
        Some(range_header) => match parse_range(range_header, total_len) {
            Ok(range) => ranged_response(file, range, total_len, &mime).await,
            Err(e) => {
                let mut response = e.into_response();
                response.headers_mut().insert(
                    header::CONTENT_RANGE,
                    HeaderValue::from_str(&format!("bytes */{total_len}")).unwrap(),
                );
                response
            }
        },
    }
}

async fn ranged_response(
    mut file: File,
    range: ByteRange,
    total_len: u64,
    mime: &mime_guess::Mime,
) -> Response {
    if file.seek(std::io::SeekFrom::Start(range.start)).await.is_err() {
        return AppError::Io("seek failed".into()).into_response();
    }
    let window_len = range.end - range.start + 1;
    let limited = file.take(window_len);
    let stream = ReaderStream::new(IdleTimeoutReader::new(limited, STREAM_IDLE_TIMEOUT));

    Response::builder()
        .status(StatusCode::PARTIAL_CONTENT)
        .header(header::CONTENT_TYPE, mime.as_ref())
        .header(header::CONTENT_LENGTH, window_len)
        .header(header::ACCEPT_RANGES, "bytes")
        .header(
            header::CONTENT_RANGE,
            format!("bytes {}-{}/{total_len}", range.start, range.end),
        )
        .body(Body::from_stream(stream))
        .unwrap()
}
