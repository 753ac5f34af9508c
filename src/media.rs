//! Local persistence of post images.
//!
//! Files are named `{record_id}_image_{index}{ext}` inside the media
//! directory, so names never collide within one post. A repeated run
//! overwrites the same files.

use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{error, info, instrument};
use url::Url;

use crate::fetch::{Fetch, RetryFetch};

/// Used when neither the URL path nor its `format` query names an extension.
pub const DEFAULT_EXTENSION: &str = ".jpg";

/// Determine the file extension (with leading dot) for a media URL.
///
/// The path suffix wins. CDN URLs like `.../media/abc?format=png&name=small`
/// carry the type in the `format` query parameter instead.
pub fn extension_for(media_url: &str) -> String {
    let Ok(parsed) = Url::parse(media_url) else {
        return DEFAULT_EXTENSION.to_string();
    };

    let from_path = Path::new(parsed.path())
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty());
    if let Some(ext) = from_path {
        return format!(".{ext}");
    }

    parsed
        .query_pairs()
        .find(|(k, _)| k == "format")
        .map(|(_, v)| v.trim().to_string())
        .filter(|v| !v.is_empty() && v.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|v| format!(".{v}"))
        .unwrap_or_else(|| DEFAULT_EXTENSION.to_string())
}

pub fn media_file_name(record_id: &str, index: usize, ext: &str) -> String {
    format!("{record_id}_image_{index}{ext}")
}

pub struct MediaDownloader<T> {
    fetcher: RetryFetch<T>,
    media_dir: PathBuf,
}

impl<T: Fetch> MediaDownloader<T> {
    pub fn new(fetcher: RetryFetch<T>, media_dir: impl Into<PathBuf>) -> Self {
        Self {
            fetcher,
            media_dir: media_dir.into(),
        }
    }

    #[cfg(test)]
    pub fn fetcher(&self) -> &RetryFetch<T> {
        &self.fetcher
    }

    /// Download one media item and return its local path.
    ///
    /// `None` means this image is unavailable; the post carries on without it.
    #[instrument(level = "info", skip(self))]
    pub async fn download(&self, media_url: &str, record_id: &str, index: usize) -> Option<PathBuf> {
        let bytes = self.fetcher.fetch_with_retry(media_url).await?;

        if let Err(e) = fs::create_dir_all(&self.media_dir).await {
            error!(dir = %self.media_dir.display(), error = %e, "Failed to create media directory");
            return None;
        }

        let ext = extension_for(media_url);
        let path = self.media_dir.join(media_file_name(record_id, index, &ext));
        match fs::write(&path, &bytes).await {
            Ok(()) => {
                info!(path = %path.display(), bytes = bytes.len(), "Downloaded image");
                Some(path)
            }
            Err(e) => {
                error!(path = %path.display(), error = %e, "Failed to write image");
                None
            }
        }
    }
}
