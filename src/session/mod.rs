//! Browser session abstraction and lifecycle.
//!
//! The renderer only talks to a [`BrowserSession`], the small set of
//! capabilities it needs from an automation engine. A [`SessionFactory`]
//! creates sessions, and the [`SessionManager`] owns the single live one:
//!
//! - created lazily on first [`acquire`](SessionManager::acquire)
//! - rotated after `rotate_after` recorded renders
//! - replaced immediately by [`rotate`](SessionManager::rotate) after a fatal error
//! - disposed by [`shutdown`](SessionManager::shutdown) at the end of a batch
//!
//! A session is consumed by [`BrowserSession::dispose`], so each one is
//! disposed at most once.

pub mod chrome;

use std::time::Duration;

use tracing::{info, instrument, warn};

use crate::error::Result;

/// Capabilities the post renderer needs from a live browser page.
pub trait BrowserSession {
    /// Load `url` in the session's page.
    async fn navigate(&self, url: &str) -> Result<()>;

    /// Wait until an element matching `selector` exists, for at most `timeout`.
    async fn wait_for(&self, selector: &str, timeout: Duration) -> Result<()>;

    /// Current scrollable height of the document.
    async fn page_height(&self) -> Result<u64>;

    /// Scroll to the bottom of the document.
    async fn scroll_to_bottom(&self) -> Result<()>;

    /// Visible text of every element matching `selector`, in document order.
    async fn query_text(&self, selector: &str) -> Result<Vec<String>>;

    /// `src` of every element matching `selector` that has one, in document order.
    async fn query_media(&self, selector: &str) -> Result<Vec<String>>;

    /// Release the session and everything it holds.
    async fn dispose(self) -> Result<()>;
}

/// Creates fresh browser sessions.
pub trait SessionFactory {
    type Session: BrowserSession;

    async fn create(&mut self) -> Result<Self::Session>;
}

/// Dispose `session`, logging a failure instead of returning it.
pub async fn discard<S: BrowserSession>(session: S) {
    if let Err(e) = session.dispose().await {
        warn!(error = %e, "Browser session did not shut down cleanly");
    }
}

/// Single owner of the live browser session.
pub struct SessionManager<F: SessionFactory> {
    factory: F,
    current: Option<F::Session>,
    uses: usize,
    rotate_after: usize,
    created: usize,
}

impl<F: SessionFactory> SessionManager<F> {
    pub fn new(factory: F, rotate_after: usize) -> Self {
        Self {
            factory,
            current: None,
            uses: 0,
            rotate_after: rotate_after.max(1),
            created: 0,
        }
    }

    /// Number of sessions created so far.
    pub fn created(&self) -> usize {
        self.created
    }

    /// Renders recorded on the current session.
    #[cfg(test)]
    pub fn uses(&self) -> usize {
        self.uses
    }

    pub fn is_live(&self) -> bool {
        self.current.is_some()
    }

    /// Return the live session, creating or rotating it first when needed.
    #[instrument(level = "debug", skip(self), fields(uses = self.uses, rotate_after = self.rotate_after))]
    pub async fn acquire(&mut self) -> Result<&F::Session> {
        if self.current.is_some() && self.uses >= self.rotate_after {
            info!(uses = self.uses, "Restarting browser session after rotation threshold");
            self.dispose_current().await;
        }

        let session = match self.current.take() {
            Some(session) => session,
            None => self.spawn().await?,
        };
        Ok(self.current.insert(session))
    }

    /// Hand the session back after a render; counts toward rotation.
    pub fn release(&mut self) {
        self.uses += 1;
    }

    /// Dispose the current session and create a replacement right away.
    #[instrument(level = "info", skip(self))]
    pub async fn rotate(&mut self) -> Result<()> {
        self.dispose_current().await;
        let session = self.spawn().await?;
        self.current = Some(session);
        Ok(())
    }

    /// Dispose the current session, if any.
    pub async fn shutdown(&mut self) {
        if self.current.is_some() {
            info!(created = self.created, "Shutting down browser session");
        }
        self.dispose_current().await;
    }

    async fn spawn(&mut self) -> Result<F::Session> {
        let session = self.factory.create().await?;
        self.created += 1;
        self.uses = 0;
        info!(session = self.created, "Browser session ready");
        Ok(session)
    }

    async fn dispose_current(&mut self) {
        if let Some(session) = self.current.take() {
            discard(session).await;
        }
        self.uses = 0;
    }
}
