//! Data models for extracted posts and the assembled issue.
//!
//! - [`PostRecord`]: text and local media found for one post URL
//! - [`BatchSummary`]: what a batch run produced, post by post
//! - [`IssueManifest`]: serialisable description of a finished issue folder

use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Rendered in place of the post text when none was found.
pub const TEXT_ABSENT: &str = "N/A";

/// Identifier used when a URL carries no `status/<id>` segment.
pub const UNKNOWN_POST_ID: &str = "unknown_tweet";

static STATUS_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"status/(\d+)").expect("status id pattern is valid"));

/// Extract the numeric post id from a URL such as `https://x.com/user/status/123`.
pub fn post_id(url: &str) -> Option<&str> {
    STATUS_ID
        .captures(url)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

/// Post id, or [`UNKNOWN_POST_ID`] when the URL has none.
pub fn post_id_or_placeholder(url: &str) -> &str {
    post_id(url).unwrap_or(UNKNOWN_POST_ID)
}

/// Extraction result for one post.
///
/// Every path in `media` pointed at an existing file when the record was
/// returned by the renderer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PostRecord {
    pub url: String,
    /// `None` until a text fragment is found.
    pub text: Option<String>,
    pub media: Vec<PathBuf>,
}

impl PostRecord {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            text: None,
            media: Vec::new(),
        }
    }

    pub fn id(&self) -> &str {
        post_id_or_placeholder(&self.url)
    }

    pub fn text_or_absent(&self) -> &str {
        self.text.as_deref().unwrap_or(TEXT_ABSENT)
    }

    /// False when neither text nor media was found; such a post gets no artifact.
    pub fn has_content(&self) -> bool {
        self.text.is_some() || !self.media.is_empty()
    }
}

/// How a single post of a batch ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PostOutcome {
    /// Artifact written to `artifact`; `document` is the PDF, when one was produced.
    Written {
        artifact: PathBuf,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        document: Option<PathBuf>,
        media: usize,
    },
    /// Rendered but nothing was found.
    Empty,
    /// Render aborted by a session or unexpected error.
    Failed { reason: String },
    /// URL appeared earlier in the same batch.
    Duplicate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostReport {
    pub url: String,
    #[serde(flatten)]
    pub outcome: PostOutcome,
}

/// Per-URL outcomes of one batch run, in input order.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub posts: Vec<PostReport>,
}

impl BatchSummary {
    pub fn push(&mut self, url: &str, outcome: PostOutcome) {
        self.posts.push(PostReport {
            url: url.to_string(),
            outcome,
        });
    }

    pub fn artifacts(&self) -> impl Iterator<Item = &PathBuf> {
        self.posts.iter().filter_map(|p| match &p.outcome {
            PostOutcome::Written { artifact, .. } => Some(artifact),
            _ => None,
        })
    }

    pub fn written(&self) -> usize {
        self.artifacts().count()
    }

    pub fn empty(&self) -> usize {
        self.count(|o| matches!(o, PostOutcome::Empty))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, PostOutcome::Failed { .. }))
    }

    /// Point every written artifact and document at its file name inside
    /// `dir`, after they have been moved there.
    pub fn relocate_artifacts(&mut self, dir: &Path) {
        let relocate = |path: &mut PathBuf| {
            if let Some(name) = path.file_name() {
                *path = dir.join(name);
            }
        };
        for post in &mut self.posts {
            if let PostOutcome::Written {
                artifact, document, ..
            } = &mut post.outcome
            {
                relocate(artifact);
                if let Some(document) = document {
                    relocate(document);
                }
            }
        }
    }

    fn count(&self, pred: impl Fn(&PostOutcome) -> bool) -> usize {
        self.posts.iter().filter(|p| pred(&p.outcome)).count()
    }
}

/// Written as `issue.json` into the finished issue folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueManifest {
    /// Issue date in `YYYY-MM-DD` format.
    pub local_date: String,
    /// Newsletter page the links were scraped from, if any.
    pub newsletter_url: Option<String>,
    pub web_sources: usize,
    pub excluded_links: usize,
    pub posts: Vec<PostReport>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_post_id_from_status_url() {
        assert_eq!(post_id("https://x.com/user/status/1793364230056202389"), Some("1793364230056202389"));
        assert_eq!(post_id("https://twitter.com/a/status/42?s=20"), Some("42"));
        assert_eq!(post_id("https://x.com/user"), None);
    }

    #[test]
    fn test_placeholder_id() {
        assert_eq!(post_id_or_placeholder("https://x.com/home"), "unknown_tweet");
        assert_eq!(PostRecord::new("https://site.example/u/status/123").id(), "123");
    }

    #[test]
    fn test_new_record_is_empty() {
        let record = PostRecord::new("https://x.com/u/status/1");
        assert_eq!(record.text_or_absent(), "N/A");
        assert!(record.media.is_empty());
        assert!(!record.has_content());
    }

    #[test]
    fn test_media_only_record_has_content() {
        let mut record = PostRecord::new("https://x.com/u/status/1");
        record.media.push(PathBuf::from("1_image_0.jpg"));
        assert!(record.has_content());
    }

    #[test]
    fn test_summary_counts() {
        let mut summary = BatchSummary::default();
        summary.push(
            "a",
            PostOutcome::Written {
                artifact: PathBuf::from("tweet_1.md"),
                document: None,
                media: 2,
            },
        );
        summary.push("b", PostOutcome::Empty);
        summary.push("c", PostOutcome::Failed { reason: "boom".into() });
        summary.push("a", PostOutcome::Duplicate);

        assert_eq!(summary.written(), 1);
        assert_eq!(summary.empty(), 1);
        assert_eq!(summary.failed(), 1);
        assert_eq!(summary.posts.len(), 4);
    }

    #[test]
    fn test_relocate_artifacts() {
        let mut summary = BatchSummary::default();
        summary.push(
            "a",
            PostOutcome::Written {
                artifact: PathBuf::from("/work/tweet_1.md"),
                document: Some(PathBuf::from("/work/1.pdf")),
                media: 0,
            },
        );
        summary.push("b", PostOutcome::Empty);

        summary.relocate_artifacts(Path::new("/out/2025-05-20_AI_News_Issue"));

        assert_eq!(
            summary.artifacts().collect::<Vec<_>>(),
            vec![&PathBuf::from("/out/2025-05-20_AI_News_Issue/tweet_1.md")]
        );
        assert!(matches!(
            &summary.posts[0].outcome,
            PostOutcome::Written { document: Some(d), .. }
                if d == Path::new("/out/2025-05-20_AI_News_Issue/1.pdf")
        ));
        assert_eq!(summary.posts[1].outcome, PostOutcome::Empty);
    }

    #[test]
    fn test_post_report_serializes_flat() {
        let report = PostReport {
            url: "https://x.com/u/status/9".into(),
            outcome: PostOutcome::Failed { reason: "session".into() },
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["url"], "https://x.com/u/status/9");
        assert_eq!(json["status"], "failed");
        assert_eq!(json["reason"], "session");
    }
}
