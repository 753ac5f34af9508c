//! Run configuration.
//!
//! [`PipelineConfig`] is built once from the parsed [`Cli`] and passed down
//! explicitly. Core modules never read the environment themselves.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use rand::{Rng, rng};

use crate::cli::Cli;
use crate::error::{Result, ScrapeError};
use crate::retry::RetryPolicy;

/// Login credentials for the microblog site.
#[derive(Clone)]
pub struct Credentials {
    /// Account identifier (the e-mail address).
    pub email: String,
    /// Login handle, asked for by the unusual-activity challenge.
    pub username: String,
    pub password: String,
}

impl Credentials {
    /// Validate that all three values are present and non-blank.
    pub fn require(
        email: Option<&str>,
        username: Option<&str>,
        password: Option<&str>,
    ) -> Result<Self> {
        let missing: Vec<&str> = [
            ("TWITTER_EMAIL", email),
            ("TWITTER_USERNAME", username),
            ("TWITTER_PASSWORD", password),
        ]
        .into_iter()
        .filter(|(_, v)| v.is_none_or(|v| v.trim().is_empty()))
        .map(|(name, _)| name)
        .collect();

        if !missing.is_empty() {
            return Err(ScrapeError::precondition(format!(
                "missing credentials: {}",
                missing.join(", ")
            )));
        }

        Ok(Self {
            email: email.unwrap_or_default().trim().to_string(),
            username: username.unwrap_or_default().trim().to_string(),
            password: password.unwrap_or_default().to_string(),
        })
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct BrowserSettings {
    pub headless: bool,
    pub chrome_path: Option<PathBuf>,
    pub login_timeout: Duration,
}

/// Knobs of the per-post render state machine.
#[derive(Debug, Clone)]
pub struct RenderSettings {
    /// Marker for a rendered post.
    pub post_selector: String,
    pub text_selector: String,
    pub media_selector: String,
    /// Media URLs must contain this to be downloaded.
    pub media_marker: String,
    pub content_timeout: Duration,
    pub max_scrolls: usize,
    pub scroll_pause: Duration,
    pub retry: RetryPolicy,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            post_selector: "article[data-testid='tweet']".to_string(),
            text_selector: "div[data-testid='tweetText'] span".to_string(),
            media_selector: "div[data-testid='tweetPhoto'] img".to_string(),
            media_marker: "media".to_string(),
            content_timeout: Duration::from_secs(30),
            max_scrolls: 3,
            scroll_pause: Duration::from_secs(2),
            retry: RetryPolicy::default(),
        }
    }
}

/// Random pause between consecutive posts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacing {
    pub min: Duration,
    pub max: Duration,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            min: Duration::from_secs(2),
            max: Duration::from_secs(5),
        }
    }
}

impl Pacing {
    pub fn none() -> Self {
        Self {
            min: Duration::ZERO,
            max: Duration::ZERO,
        }
    }

    /// Random pause in `[min, max]`.
    pub fn sample(&self) -> Duration {
        if self.max <= self.min {
            return self.min;
        }
        let min = self.min.as_millis() as u64;
        let max = self.max.as_millis() as u64;
        Duration::from_millis(rng().random_range(min..=max))
    }
}

/// Whether `dir` is `path` or one of its ancestors, compared on absolute paths.
fn contains(dir: &Path, path: &Path) -> bool {
    let absolute = |p: &Path| std::path::absolute(p).unwrap_or_else(|_| p.to_path_buf());
    absolute(path).starts_with(absolute(dir))
}

/// Everything one run needs, built once at start-up.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub credentials: Credentials,
    pub browser: BrowserSettings,
    pub render: RenderSettings,
    pub fetch_retry: RetryPolicy,
    pub http_timeout: Duration,
    pub rotate_after: usize,
    pub pacing: Pacing,
    /// Where per-post artifacts are written before being moved into the issue.
    pub work_dir: PathBuf,
    pub media_dir: PathBuf,
    /// Parent of the dated issue folders.
    pub output_root: PathBuf,
    pub sources_file: PathBuf,
}

impl PipelineConfig {
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let credentials = Credentials::require(
            cli.twitter_email.as_deref(),
            cli.twitter_username.as_deref(),
            cli.twitter_password.as_deref(),
        )?;

        if cli.max_attempts == 0 {
            return Err(ScrapeError::precondition("--max-attempts must be at least 1"));
        }

        let retry = RetryPolicy {
            max_attempts: cli.max_attempts,
            base_wait: Duration::from_secs(cli.base_wait_secs),
            ..RetryPolicy::default()
        };

        let media_dir = cli.media_dir.clone().unwrap_or_else(|| cli.work_dir.clone());
        for dir in [&cli.work_dir, &media_dir] {
            if contains(dir, &cli.output_root) {
                return Err(ScrapeError::precondition(format!(
                    "{} cannot be or contain the output root {}",
                    dir.display(),
                    cli.output_root.display()
                )));
            }
        }

        Ok(Self {
            credentials,
            browser: BrowserSettings {
                headless: !cli.headed,
                chrome_path: cli.chrome_path.clone(),
                login_timeout: Duration::from_secs(30),
            },
            render: RenderSettings {
                retry,
                ..RenderSettings::default()
            },
            fetch_retry: retry,
            http_timeout: Duration::from_secs(30),
            rotate_after: cli.rotate_after,
            pacing: Pacing::default(),
            sources_file: cli.output_root.join("sources.txt"),
            work_dir: cli.work_dir.clone(),
            media_dir,
            output_root: cli.output_root.clone(),
        })
    }
}
