//! Rendering and extraction of a single post.
//!
//! One render walks the stages
//!
//! ```text
//! Navigating -> WaitingForContent -> Scrolling -> ExtractingText -> ExtractingMedia -> done
//! ```
//!
//! A transient failure while navigating or waiting sends the whole sequence
//! back to the start after a backoff delay. Once the retry ceiling is reached
//! the record is returned as it stands: no text, no media, no error. Scroll
//! and extraction faults are logged and skipped; only a fatal session error
//! escapes at any stage.

use std::fmt;

use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};

use crate::config::RenderSettings;
use crate::error::{Result, ScrapeError};
use crate::fetch::Fetch;
use crate::media::MediaDownloader;
use crate::models::PostRecord;
use crate::session::BrowserSession;
use crate::utils::truncate_for_log;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Navigating,
    WaitingForContent,
    Scrolling,
    ExtractingText,
    ExtractingMedia,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Navigating => "navigating",
            Stage::WaitingForContent => "waiting_for_content",
            Stage::Scrolling => "scrolling",
            Stage::ExtractingText => "extracting_text",
            Stage::ExtractingMedia => "extracting_media",
        };
        f.write_str(name)
    }
}

/// Join text fragments in document order, dropping blanks and bare
/// mentions/hashtags. `None` when nothing is left.
pub fn join_fragments<I, S>(fragments: I) -> Option<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let kept: Vec<String> = fragments
        .into_iter()
        .map(|f| f.as_ref().trim().to_string())
        .filter(|f| !f.is_empty() && !f.starts_with('@') && !f.starts_with('#'))
        .collect();

    if kept.is_empty() {
        None
    } else {
        Some(kept.join(" "))
    }
}

#[derive(Debug, Clone)]
pub struct PostRenderer {
    settings: RenderSettings,
}

impl PostRenderer {
    pub fn new(settings: RenderSettings) -> Self {
        Self { settings }
    }

    /// Render `url` in `session` and extract its text and media.
    ///
    /// Each attempt walks every [`Stage`] in order. A timeout or page fault
    /// while navigating or waiting restarts the sequence after the policy's
    /// backoff delay, up to `max_attempts` attempts in total.
    ///
    /// # Arguments
    ///
    /// * `session` - The live browser session, borrowed for this post only.
    /// * `url` - Post URL; its `status/<id>` segment names the media files.
    /// * `downloader` - Persists every media URL that carries the configured
    ///   marker.
    ///
    /// # Returns
    ///
    /// The [`PostRecord`]. After the last failed attempt it comes back as it
    /// stands, with no text and no media; that is not an error.
    ///
    /// # Errors
    ///
    /// Returns the error of a fatal session failure, which the caller answers
    /// by rotating the session, or of a non-transient fault.
    ///
    /// # Examples
    ///
    /// ```ignore
    /// let renderer = PostRenderer::new(RenderSettings::default());
    /// let record = renderer.render(session, "https://x.com/user/status/123", &downloader).await?;
    /// if record.has_content() {
    ///     println!("{}", record.text_or_absent());
    /// }
    /// ```
    #[instrument(level = "info", skip(self, session, downloader))]
    pub async fn render<S, T>(
        &self,
        session: &S,
        url: &str,
        downloader: &MediaDownloader<T>,
    ) -> Result<PostRecord>
    where
        S: BrowserSession,
        T: Fetch,
    {
        let mut record = PostRecord::new(url);
        let mut retry = self.settings.retry.start();

        loop {
            let (stage, err) = match self.attempt(session, &mut record, downloader).await {
                Ok(()) => {
                    info!(
                        text = %truncate_for_log(record.text_or_absent(), 80),
                        media = record.media.len(),
                        "Post rendered"
                    );
                    return Ok(record);
                }
                Err(failure) => failure,
            };

            if err.is_fatal_session() || !err.is_transient() {
                error!(%stage, error = %err, "Render aborted");
                return Err(err);
            }

            match retry.record_failure() {
                Some(delay) => {
                    warn!(
                        %stage,
                        attempt = retry.attempt(),
                        max = retry.max_attempts(),
                        ?delay,
                        error = %err,
                        "Rate limit or browser error; retrying"
                    );
                    sleep(delay).await;
                }
                None => {
                    error!(
                        %stage,
                        attempt = retry.attempt(),
                        max = retry.max_attempts(),
                        error = %err,
                        "Max retries reached; skipping post"
                    );
                    return Ok(record);
                }
            }
        }
    }

    async fn attempt<S, T>(
        &self,
        session: &S,
        record: &mut PostRecord,
        downloader: &MediaDownloader<T>,
    ) -> std::result::Result<(), (Stage, ScrapeError)>
    where
        S: BrowserSession,
        T: Fetch,
    {
        *record = PostRecord::new(record.url.clone());

        debug!(stage = %Stage::Navigating);
        session
            .navigate(&record.url)
            .await
            .map_err(|e| (Stage::Navigating, e))?;

        debug!(stage = %Stage::WaitingForContent);
        session
            .wait_for(&self.settings.post_selector, self.settings.content_timeout)
            .await
            .map_err(|e| (Stage::WaitingForContent, e))?;

        debug!(stage = %Stage::Scrolling);
        if let Err(e) = self.scroll(session).await {
            if e.is_fatal_session() {
                return Err((Stage::Scrolling, e));
            }
            warn!(error = %e, "Scrolling failed; extracting what is loaded");
        }

        debug!(stage = %Stage::ExtractingText);
        match session.query_text(&self.settings.text_selector).await {
            Ok(fragments) => record.text = join_fragments(fragments),
            Err(e) if e.is_fatal_session() => return Err((Stage::ExtractingText, e)),
            Err(e) => warn!(error = %e, "Error extracting post text"),
        }
        if record.text.is_none() {
            warn!(url = %record.url, "Could not find post text");
        }

        debug!(stage = %Stage::ExtractingMedia);
        match session.query_media(&self.settings.media_selector).await {
            Ok(sources) => self.collect_media(record, sources, downloader).await,
            Err(e) if e.is_fatal_session() => return Err((Stage::ExtractingMedia, e)),
            Err(e) => warn!(error = %e, "Error extracting post images"),
        }

        if !record.has_content() {
            warn!(url = %record.url, "No post content (text or images) found; page may not be a post");
        }
        Ok(())
    }

    /// Scroll until the page stops growing or the scroll budget is spent.
    async fn scroll<S: BrowserSession>(&self, session: &S) -> Result<usize> {
        let mut last_height = session.page_height().await?;
        let mut scrolls = 0;
        while scrolls < self.settings.max_scrolls {
            session.scroll_to_bottom().await?;
            scrolls += 1;
            sleep(self.settings.scroll_pause).await;

            let height = session.page_height().await?;
            if height <= last_height {
                break;
            }
            last_height = height;
        }
        debug!(scrolls, height = last_height, "Scrolling done");
        Ok(scrolls)
    }

    async fn collect_media<T: Fetch>(
        &self,
        record: &mut PostRecord,
        sources: Vec<String>,
        downloader: &MediaDownloader<T>,
    ) {
        let id = record.id().to_string();
        let mut index = 0;
        for src in sources {
            if !src.contains(&self.settings.media_marker) {
                debug!(%src, "Skipping non-media image");
                continue;
            }
            if let Some(path) = downloader.download(&src, &id, index).await {
                record.media.push(path);
            }
            index += 1;
        }
        if record.media.is_empty() {
            debug!(url = %record.url, "No images found");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::RetryFetch;
    use crate::retry::RetryPolicy;
    use crate::test_helpers::{
        FakeFactory, FakeSession, FlakyFetcher, PageScript, fast_render_settings,
    };
    use std::path::Path;

    fn downloader(dir: &Path) -> MediaDownloader<FlakyFetcher> {
        MediaDownloader::new(
            RetryFetch::new(FlakyFetcher::succeeding_on(1), RetryPolicy::immediate(5)),
            dir,
        )
    }

    async fn session_with(script: PageScript) -> FakeSession {
        let mut factory = FakeFactory::default().with_page("https://x.com/u/status/42", script);
        crate::session::SessionFactory::create(&mut factory).await.unwrap()
    }

    #[test]
    fn test_join_fragments_filters_mentions_and_tags() {
        let text = join_fragments(["Hello", "  ", "@someone", "world", "#rust", " again "]);
        assert_eq!(text.as_deref(), Some("Hello world again"));
    }

    #[test]
    fn test_join_fragments_empty() {
        assert_eq!(join_fragments(Vec::<String>::new()), None);
        assert_eq!(join_fragments(["@a", "#b", ""]), None);
    }

    #[tokio::test]
    async fn test_render_extracts_text_and_media() {
        let dir = tempfile::tempdir().unwrap();
        let session = session_with(
            PageScript::post(&["Shipping", "@team", "today"])
                .with_media(&[
                    "https://pbs.twimg.com/media/a.jpg",
                    "https://pbs.twimg.com/profile_images/avatar.jpg",
                    "https://pbs.twimg.com/media/b?format=png",
                ])
                .with_heights(&[1000, 1500, 1500]),
        )
        .await;
        let renderer = PostRenderer::new(fast_render_settings());

        let record = renderer
            .render(&session, "https://x.com/u/status/42", &downloader(dir.path()))
            .await
            .unwrap();

        assert_eq!(record.text.as_deref(), Some("Shipping today"));
        assert_eq!(
            record.media,
            vec![dir.path().join("42_image_0.jpg"), dir.path().join("42_image_1.png")]
        );
        assert!(record.media.iter().all(|p| p.exists()));
        // grew once, then stabilised on the second scroll
        assert_eq!(session.scrolls(), 2);
    }

    #[tokio::test]
    async fn test_scrolling_is_capped() {
        let dir = tempfile::tempdir().unwrap();
        let session = session_with(
            PageScript::post(&["tall"]).with_heights(&[100, 200, 300, 400, 500, 600]),
        )
        .await;
        let renderer = PostRenderer::new(fast_render_settings());

        renderer
            .render(&session, "https://x.com/u/status/42", &downloader(dir.path()))
            .await
            .unwrap();
        assert_eq!(session.scrolls(), 3);
    }

    #[tokio::test]
    async fn test_wait_timeout_exhausts_retries_and_returns_empty_record() {
        let dir = tempfile::tempdir().unwrap();
        let session = session_with(PageScript::never_renders()).await;
        let renderer = PostRenderer::new(fast_render_settings());

        let record = renderer
            .render(&session, "https://x.com/u/status/42", &downloader(dir.path()))
            .await
            .unwrap();

        assert_eq!(session.navigations(), 5);
        assert_eq!(record.text, None);
        assert!(record.media.is_empty());
        assert!(!record.has_content());
    }

    #[tokio::test]
    async fn test_recovers_after_transient_failures() {
        let dir = tempfile::tempdir().unwrap();
        let session = session_with(PageScript::post(&["finally"]).failing_first(2)).await;
        let renderer = PostRenderer::new(fast_render_settings());

        let record = renderer
            .render(&session, "https://x.com/u/status/42", &downloader(dir.path()))
            .await
            .unwrap();

        assert_eq!(session.navigations(), 3);
        assert_eq!(record.text.as_deref(), Some("finally"));
    }

    #[tokio::test]
    async fn test_fatal_session_error_escapes() {
        let dir = tempfile::tempdir().unwrap();
        let session = session_with(PageScript::crashes()).await;
        let renderer = PostRenderer::new(fast_render_settings());

        let err = renderer
            .render(&session, "https://x.com/u/status/42", &downloader(dir.path()))
            .await
            .unwrap_err();

        assert!(err.is_fatal_session());
        assert_eq!(session.navigations(), 1);
    }

    #[tokio::test]
    async fn test_failed_image_keeps_index_sequence() {
        let dir = tempfile::tempdir().unwrap();
        let session = session_with(PageScript::post(&[]).with_media(&[
            "https://pbs.twimg.com/media/a.jpg",
            "https://pbs.twimg.com/media/b.jpg",
        ]))
        .await;
        let renderer = PostRenderer::new(fast_render_settings());
        let downloader = MediaDownloader::new(
            RetryFetch::new(
                FlakyFetcher::failing_for("https://pbs.twimg.com/media/a.jpg"),
                RetryPolicy::immediate(2),
            ),
            dir.path(),
        );

        let record = renderer
            .render(&session, "https://x.com/u/status/42", &downloader)
            .await
            .unwrap();

        assert_eq!(record.text, None);
        assert_eq!(record.media, vec![dir.path().join("42_image_1.jpg")]);
        assert!(record.has_content());
    }
}
