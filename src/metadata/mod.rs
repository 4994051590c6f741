//! Metadata derivation from path conventions, plus optional external
//! enrichment behind a small trait seam — the same shape as the teacher's
//! `Tokenizer` trait with a default and a null implementation selected at
//! construction (`server/src/tokenizer.rs`).

pub mod isbn;

use std::path::Path;

use serde::Deserialize;

const SUPPORTED_EXTENSIONS: &[&str] =
    &["epub", "pdf", "mobi", "azw", "azw3", "cbz", "cbr", "djvu"];

/// Everything derivable from a book's path alone, before any enrichment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedMetadata {
    pub author_name: String,
    pub title: String,
    pub file_format: String,
    pub isbn: Option<String>,
}

/// Fields an external lookup may fill in; all optional since enrichment is
/// best-effort and non-fatal on failure.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnrichedMetadata {
    pub description: Option<String>,
    pub page_count: Option<u32>,
    pub publisher: Option<String>,
    pub publication_date: Option<String>,
}

pub fn is_supported_extension(ext: &str) -> bool {
    SUPPORTED_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str())
}

/// Derive author/title/format/ISBN from `path`, assuming the
/// `<root>/<Author>/<Title>/<file>` convention.
pub fn derive(path: &Path) -> Option<DerivedMetadata> {
    let file_format = path.extension()?.to_str()?.to_ascii_lowercase();
    let title_dir = path.parent()?;
    let title = title_dir.file_name()?.to_str()?.to_string();
    let author_name = title_dir.parent()?.file_name()?.to_str()?.to_string();
    let stem = path.file_stem()?.to_str()?;

    Some(DerivedMetadata { author_name, title, file_format, isbn: isbn::extract(stem) })
}

/// External enrichment seam. `NullLookup` is used whenever no API key is
/// configured and in tests; `GoogleBooksLookup` is the production impl.
#[async_trait::async_trait]
pub trait MetadataLookup: Send + Sync {
    async fn lookup(&self, isbn: &str) -> Option<EnrichedMetadata>;
}

pub struct NullLookup;

#[async_trait::async_trait]
impl MetadataLookup for NullLookup {
    async fn lookup(&self, _isbn: &str) -> Option<EnrichedMetadata> {
        None
    }
}

pub struct GoogleBooksLookup {
    client: reqwest::Client,
    api_key: Option<String>,
}

impl GoogleBooksLookup {
    pub fn new(client: reqwest::Client, api_key: Option<String>) -> Self {
        Self { client, api_key }
    }
}

#[derive(Debug, Deserialize)]
struct VolumesResponse {
    items: Option<Vec<VolumeItem>>,
}

#[derive(Debug, Deserialize)]
struct VolumeItem {
    #[serde(rename = "volumeInfo")]
    volume_info: VolumeInfo,
}

#[derive(Debug, Deserialize, Default)]
struct VolumeInfo {
    description: Option<String>,
    #[serde(rename = "pageCount")]
    page_count: Option<u32>,
    publisher: Option<String>,
    #[serde(rename = "publishedDate")]
    published_date: Option<String>,
}

#[async_trait::async_trait]
impl MetadataLookup for GoogleBooksLookup {
    async fn lookup(&self, isbn: &str) -> Option<EnrichedMetadata> {
        let mut url = format!(
            "https://www.googleapis.com/books/v1/volumes?q=isbn:{isbn}"
        );
        if let Some(key) = &self.api_key {
            url.push_str("&key=");
            url.push_str(key);
        }

        let resp = self.client.get(&url).send().await.ok()?;
        if !resp.status().is_success() {
            return None;
        }
        let parsed: VolumesResponse = resp.json().await.ok()?;
        let info = parsed.items?.into_iter().next()?.volume_info;

        Some(EnrichedMetadata {
            description: info.description,
            page_count: info.page_count,
            publisher: info.publisher,
            publication_date: info.published_date,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn derives_from_convention_path() {
        let path = PathBuf::from("/lib/F. Scott Fitzgerald/The Great Gatsby/gatsby-9780743273565.epub");
        let derived = derive(&path).unwrap();
        assert_eq!(derived.author_name, "F. Scott Fitzgerald");
        assert_eq!(derived.title, "The Great Gatsby");
        assert_eq!(derived.file_format, "epub");
        assert_eq!(derived.isbn, Some("9780743273565".into()));
    }

    #[test]
    fn recognizes_supported_extensions_case_insensitively() {
        assert!(is_supported_extension("EPUB"));
        assert!(is_supported_extension("cbz"));
        assert!(!is_supported_extension("txt"));
    }

    #[tokio::test]
    async fn null_lookup_always_returns_none() {
        assert_eq!(NullLookup.lookup("9780743273565").await, None);
    }
}
