//! Utility functions for link-file input, log formatting and file system checks.

use std::error::Error;
use std::fs as stdfs;
use std::path::Path;

use tokio::fs;
use tracing::{info, instrument};

use crate::error::{Result, ScrapeError};

/// Read a link list: one URL per line, surrounding whitespace trimmed,
/// blank lines skipped.
///
/// A missing file is a precondition failure; the run cannot start without it.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn read_links(path: &Path) -> Result<Vec<String>> {
    let content = match fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ScrapeError::precondition(format!(
                "links file not found: {}",
                path.display()
            )));
        }
        Err(e) => return Err(e.into()),
    };

    let links: Vec<String> = content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect();
    info!(count = links.len(), "Read links file");
    Ok(links)
}

/// Truncate a string for logging purposes.
///
/// Long strings are cut to at most `max` bytes (on a character boundary)
/// with `"…(+N bytes)"` appended.
pub fn truncate_for_log(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…(+{} bytes)", &s[..end], s.len() - end)
}

/// Ensure a directory exists and is writable.
///
/// Creates the directory if needed, then creates and deletes a scratch file.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn ensure_writable_dir(path: &Path) -> std::result::Result<(), Box<dyn Error>> {
    fs::create_dir_all(path).await?;
    // Sync write through std fs
    let check_path = path.join("..__write_check__");
    match stdfs::File::create(&check_path) {
        Ok(_) => {
            let _ = stdfs::remove_file(&check_path);
            info!("Output directory is writable");
            Ok(())
        }
        Err(e) => Err(Box::new(e)),
    }
}
