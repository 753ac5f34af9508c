//! JSON manifest of a finished issue.
//!
//! The manifest sits next to the artifacts it describes:
//! ```text
//! 2025-05-20_AI_News_Issue/
//! ├── issue.json
//! ├── index.md
//! ├── sources.txt
//! ├── tweet_123.md
//! └── 123_image_0.jpg
//! ```

use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{error, info, instrument};

use crate::error::Result;
use crate::models::IssueManifest;

pub const MANIFEST_FILE: &str = "issue.json";

/// Write `manifest` as pretty JSON to `{issue_dir}/issue.json`.
#[instrument(level = "info", skip_all, fields(issue_dir = %issue_dir.display()))]
pub async fn write_manifest(issue_dir: &Path, manifest: &IssueManifest) -> Result<PathBuf> {
    let json = serde_json::to_string_pretty(manifest)?;

    if let Err(e) = fs::create_dir_all(issue_dir).await {
        error!(error = %e, "Failed to create issue dir");
        return Err(e.into());
    }

    let path = issue_dir.join(MANIFEST_FILE);
    fs::write(&path, json).await?;
    info!(path = %path.display(), posts = manifest.posts.len(), "Wrote issue manifest");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PostOutcome, PostReport};

    #[tokio::test]
    async fn test_manifest_round_trips_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = IssueManifest {
            local_date: "2025-05-20".into(),
            newsletter_url: Some("https://news.smol.ai/issues/25-05-20-google-io/".into()),
            web_sources: 12,
            excluded_links: 2,
            posts: vec![
                PostReport {
                    url: "https://x.com/u/status/1".into(),
                    outcome: PostOutcome::Written {
                        artifact: PathBuf::from("tweet_1.md"),
                        document: Some(PathBuf::from("1.pdf")),
                        media: 1,
                    },
                },
                PostReport {
                    url: "https://x.com/u/status/2".into(),
                    outcome: PostOutcome::Empty,
                },
            ],
        };

        let path = write_manifest(&dir.path().join("issue"), &manifest).await.unwrap();

        assert!(path.ends_with("issue/issue.json"));
        let raw = std::fs::read_to_string(&path).unwrap();
        let parsed: IssueManifest = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed, manifest);
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["posts"][0]["status"], "written");
        assert_eq!(value["posts"][1]["status"], "empty");
    }
}
