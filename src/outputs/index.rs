//! `index.md` table of contents for an issue folder.
//!
//! ```text
//! # AI News Issue 2025-05-20
//!
//! ## Posts
//!
//! - [tweet_123.md](./tweet_123.md) ([PDF](./123.pdf)): <https://x.com/u/status/123>
//!
//! ## Web Sources
//!
//! 12 links, see [sources.txt](./sources.txt).
//! ```

use std::fmt::Write;
use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{info, instrument};

use crate::error::Result;
use crate::models::{BatchSummary, PostOutcome};
use crate::outputs::issue::SOURCES_FILE;

pub const INDEX_FILE: &str = "index.md";

/// Build the index Markdown for one issue.
pub fn issue_index(local_date: &str, summary: &BatchSummary, web_sources: usize) -> String {
    let mut md = String::new();
    let _ = writeln!(md, "# AI News Issue {local_date}\n");

    md.push_str("## Posts\n\n");
    let mut listed = 0;
    for report in &summary.posts {
        if let PostOutcome::Written {
            artifact, document, ..
        } = &report.outcome
        {
            let name = file_name(artifact);
            let _ = write!(md, "- [{name}](./{name})");
            if let Some(document) = document {
                let pdf = file_name(document);
                let _ = write!(md, " ([PDF](./{pdf}))");
            }
            let _ = writeln!(md, ": <{}>", report.url);
            listed += 1;
        }
    }
    if listed == 0 {
        md.push_str("_No posts were extracted._\n");
    }

    md.push_str("\n## Web Sources\n\n");
    let noun = if web_sources == 1 { "link" } else { "links" };
    let _ = writeln!(md, "{web_sources} {noun}, see [{SOURCES_FILE}](./{SOURCES_FILE}).");
    md
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Write `index.md` into `issue_dir`, replacing any previous one.
#[instrument(level = "info", skip_all, fields(issue_dir = %issue_dir.display(), %local_date))]
pub async fn write_index(
    issue_dir: &Path,
    local_date: &str,
    summary: &BatchSummary,
    web_sources: usize,
) -> Result<PathBuf> {
    let path = issue_dir.join(INDEX_FILE);
    fs::write(&path, issue_index(local_date, summary, web_sources)).await?;
    info!(path = %path.display(), "Wrote issue index");
    Ok(path)
}
