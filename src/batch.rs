//! Sequential processing of a batch of post URLs.
//!
//! For every URL the orchestrator acquires the live session (rotating it
//! when due), renders the post, writes a Markdown artifact when something
//! and PDF document when something was found, and pauses a random interval
//! before the next URL. The browser session is disposed when the batch ends,
//! whichever way it ends.

use std::collections::HashSet;
use std::path::PathBuf;

use tokio::fs;
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};

use crate::config::Pacing;
use crate::error::Result;
use crate::fetch::Fetch;
use crate::media::MediaDownloader;
use crate::models::{BatchSummary, PostOutcome, PostRecord};
use crate::outputs::{markdown, pdf};
use crate::render::PostRenderer;
use crate::session::{SessionFactory, SessionManager};

/// Artifact file name for a post: `tweet_<id>.md`.
pub fn artifact_file_name(record: &PostRecord) -> String {
    format!("tweet_{}.md", record.id())
}

pub struct BatchOrchestrator<F: SessionFactory, T> {
    sessions: SessionManager<F>,
    renderer: PostRenderer,
    downloader: MediaDownloader<T>,
    output_dir: PathBuf,
    pacing: Pacing,
    /// Every file written so far: artifacts, documents and downloaded media.
    produced: Vec<PathBuf>,
}

impl<F, T> BatchOrchestrator<F, T>
where
    F: SessionFactory,
    T: Fetch,
{
    pub fn new(
        sessions: SessionManager<F>,
        renderer: PostRenderer,
        downloader: MediaDownloader<T>,
        output_dir: impl Into<PathBuf>,
        pacing: Pacing,
    ) -> Self {
        Self {
            sessions,
            renderer,
            downloader,
            output_dir: output_dir.into(),
            pacing,
            produced: Vec::new(),
        }
    }

    /// Files this orchestrator has written, including those of a batch that
    /// was later aborted.
    pub fn produced_files(&self) -> &[PathBuf] {
        &self.produced
    }

    #[cfg(test)]
    pub fn sessions(&self) -> &SessionManager<F> {
        &self.sessions
    }

    /// Process every URL in order and write one artifact per extracted post.
    ///
    /// Each URL is rendered at most once, on the single live session. The
    /// session is rotated every `rotate_after` renders and after a fatal
    /// browser error, and disposed before this returns, whatever the outcome.
    ///
    /// # Arguments
    ///
    /// * `urls` - Post URLs in processing order. Repeats are reported as
    ///   [`PostOutcome::Duplicate`] and not rendered again.
    ///
    /// # Returns
    ///
    /// A [`BatchSummary`] with one [`PostReport`](crate::models::PostReport)
    /// per input URL, in input order.
    ///
    /// # Errors
    ///
    /// Fails only when no browser session can be created or the output
    /// directory cannot be made; every per-post problem is recorded in the
    /// summary instead. Files written before the failure stay listed in
    /// [`produced_files`](Self::produced_files).
    ///
    /// # Examples
    ///
    /// ```ignore
    /// let mut batch = BatchOrchestrator::new(sessions, renderer, downloader, "tweet_markdowns", Pacing::default());
    /// let summary = batch.run(&urls).await?;
    /// println!("{} of {} posts written", summary.written(), urls.len());
    /// ```
    #[instrument(level = "info", skip_all, fields(total = urls.len()))]
    pub async fn run(&mut self, urls: &[String]) -> Result<BatchSummary> {
        let outcome = self.process(urls).await;
        self.sessions.shutdown().await;

        match &outcome {
            Ok(summary) => info!(
                written = summary.written(),
                empty = summary.empty(),
                failed = summary.failed(),
                sessions = self.sessions.created(),
                "Batch complete"
            ),
            Err(e) => error!(error = %e, "Batch aborted"),
        }
        outcome
    }

    async fn process(&mut self, urls: &[String]) -> Result<BatchSummary> {
        let mut summary = BatchSummary::default();
        let mut seen = HashSet::new();

        fs::create_dir_all(&self.output_dir).await?;

        for (i, url) in urls.iter().enumerate() {
            if !seen.insert(url.as_str()) {
                debug!(%url, "Duplicate URL in batch; skipping");
                summary.push(url, PostOutcome::Duplicate);
                continue;
            }

            info!(%url, "Scraping ({}/{})", i + 1, urls.len());
            let outcome = self.process_one(url).await?;
            summary.push(url, outcome);

            if i + 1 < urls.len() {
                let pause = self.pacing.sample();
                debug!(?pause, "Pausing before next post");
                sleep(pause).await;
            }
        }

        Ok(summary)
    }

    async fn process_one(&mut self, url: &str) -> Result<PostOutcome> {
        let session = self.sessions.acquire().await?;

        let record = match self.renderer.render(session, url, &self.downloader).await {
            Ok(record) => {
                self.sessions.release();
                self.produced.extend(record.media.iter().cloned());
                record
            }
            Err(e) if e.is_fatal_session() => {
                error!(%url, error = %e, "Fatal browser error; restarting session and skipping post");
                self.sessions.rotate().await?;
                return Ok(PostOutcome::Failed {
                    reason: e.to_string(),
                });
            }
            Err(e) => {
                error!(%url, error = %e, "Unexpected error while scraping; skipping post");
                self.sessions.release();
                return Ok(PostOutcome::Failed {
                    reason: e.to_string(),
                });
            }
        };

        if !record.has_content() {
            warn!(%url, "Skipping artifact: no content scraped");
            return Ok(PostOutcome::Empty);
        }

        let artifact = match self.write_artifact(&record).await {
            Ok(artifact) => artifact,
            Err(e) => {
                error!(%url, error = %e, "Failed to write artifact");
                return Ok(PostOutcome::Failed {
                    reason: e.to_string(),
                });
            }
        };

        let document = match pdf::write_post_pdf(&record, &self.output_dir).await {
            Ok(path) => {
                self.produced.push(path.clone());
                Some(path)
            }
            Err(e) => {
                error!(%url, error = %e, "Failed to write PDF; keeping Markdown only");
                None
            }
        };

        Ok(PostOutcome::Written {
            artifact,
            document,
            media: record.media.len(),
        })
    }

    async fn write_artifact(&mut self, record: &PostRecord) -> Result<PathBuf> {
        fs::create_dir_all(&self.output_dir).await?;
        let path = self.output_dir.join(artifact_file_name(record));
        fs::write(&path, markdown::post_to_markdown(record)).await?;
        self.produced.push(path.clone());
        info!(path = %path.display(), "Generated Markdown");
        Ok(path)
    }
}
