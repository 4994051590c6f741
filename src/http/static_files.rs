//! Static client server: `ServeDir`/`ServeFile` with SPA fallback, composed
//! exactly as the teacher mounts its own web UI
//! (`ServeDir::new(&dist_dir).not_found_service(ServeFile::new(&index_html))`
//! in `server/src/main.rs`), generalized to a configurable asset root.

use std::path::Path;

use tower_http::services::{ServeDir, ServeFile};

pub fn service(assets_dir: &Path) -> ServeDir<ServeFile> {
    let index_html = assets_dir.join("index.html");
    ServeDir::new(assets_dir).not_found_service(ServeFile::new(index_html))
}
