//! Cover image resolution.
//!
//! Pure filesystem-metadata matching — no image is ever opened or decoded,
//! the same posture the teacher's `scan.rs` takes toward files it only
//! needs to classify, not read.

use std::path::{Path, PathBuf};

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp"];

/// Resolve a cover image for `book_path`, trying in order:
/// 1. a sibling file sharing the book's stem (`gatsby.jpg` next to `gatsby.epub`)
/// 2. `cover.<ext>` in the same directory
/// 3. a file named after the parent directory (the series/book folder)
pub fn resolve(book_path: &Path) -> Option<PathBuf> {
    let dir = book_path.parent()?;
    let stem = book_path.file_stem()?.to_str()?;

    first_existing(dir, stem)
        .or_else(|| first_existing(dir, "cover"))
        .or_else(|| {
            let folder_name = dir.file_name()?.to_str()?;
            first_existing(dir, folder_name)
        })
}

fn first_existing(dir: &Path, stem: &str) -> Option<PathBuf> {
    IMAGE_EXTENSIONS.iter().find_map(|ext| {
        let candidate = dir.join(format!("{stem}.{ext}"));
        candidate.metadata().ok().filter(|m| m.is_file()).map(|_| candidate)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn prefers_sibling_over_cover_file() {
        let dir = tempfile::tempdir().unwrap();
        let book = dir.path().join("gatsby.epub");
        fs::write(&book, b"x").unwrap();
        fs::write(dir.path().join("gatsby.jpg"), b"x").unwrap();
        fs::write(dir.path().join("cover.png"), b"x").unwrap();

        assert_eq!(resolve(&book), Some(dir.path().join("gatsby.jpg")));
    }

    #[test]
    fn falls_back_to_cover_file() {
        let dir = tempfile::tempdir().unwrap();
        let book = dir.path().join("gatsby.epub");
        fs::write(&book, b"x").unwrap();
        fs::write(dir.path().join("cover.webp"), b"x").unwrap();

        assert_eq!(resolve(&book), Some(dir.path().join("cover.webp")));
    }

    #[test]
    fn falls_back_to_folder_name() {
        let root = tempfile::tempdir().unwrap();
        let book_dir = root.path().join("The Great Gatsby");
        fs::create_dir(&book_dir).unwrap();
        let book = book_dir.join("gatsby.epub");
        fs::write(&book, b"x").unwrap();
        fs::write(book_dir.join("The Great Gatsby.png"), b"x").unwrap();

        assert_eq!(resolve(&book), Some(book_dir.join("The Great Gatsby.png")));
    }

    #[test]
    fn none_when_nothing_matches() {
        let dir = tempfile::tempdir().unwrap();
        let book = dir.path().join("gatsby.epub");
        fs::write(&book, b"x").unwrap();

        assert_eq!(resolve(&book), None);
    }
}
