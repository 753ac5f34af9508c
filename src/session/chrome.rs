//! Chromium session driven over CDP with `chromiumoxide`.
//!
//! [`ChromeLauncher`] launches a hardened headless Chromium, logs in with the
//! configured credentials and hands out a [`ChromeSession`] wrapping the
//! browser, its single page and the CDP handler task.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep};
use tracing::{debug, info, instrument, warn};

use crate::config::{BrowserSettings, Credentials};
use crate::error::{Result, ScrapeError};
use crate::fetch::USER_AGENT;
use crate::session::{BrowserSession, SessionFactory, discard};

const CHROME_PATHS: &[&str] = &[
    "/usr/bin/google-chrome",
    "/usr/bin/google-chrome-stable",
    "/usr/bin/chromium",
    "/usr/bin/chromium-browser",
    "/snap/bin/chromium",
    "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
    "/Applications/Chromium.app/Contents/MacOS/Chromium",
    "/opt/google/chrome/google-chrome",
];

const CHROME_ARGS: &[&str] = &[
    "--no-sandbox",
    "--disable-setuid-sandbox",
    "--disable-dev-shm-usage",
    "--disable-gpu",
    "--disable-extensions",
    "--disable-infobars",
    "--disable-notifications",
    "--disable-browser-side-navigation",
    "--disable-features=VizDisplayCompositor",
    "--log-level=3",
];

const LOGIN_URL: &str = "https://x.com/i/flow/login";
const USERNAME_INPUT: &str = "input[autocomplete='username']";
const CHALLENGE_INPUT: &str = "input[data-testid='ocfEnterTextTextInput']";
const PASSWORD_INPUT: &str = "input[name='password']";
const LOGGED_IN_MARKER: &str = "a[data-testid='AppTabBar_Home_Link']";

const POLL_INTERVAL: Duration = Duration::from_millis(250);

const SCROLL_HEIGHT_JS: &str = "document.body.scrollHeight";
const SCROLL_TO_BOTTOM_JS: &str = "window.scrollTo(0, document.body.scrollHeight); true";

/// Resolve the Chromium binary: explicit path first, then well-known locations.
pub fn find_chrome(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        if path.exists() {
            return Ok(path.to_path_buf());
        }
        return Err(ScrapeError::precondition(format!(
            "Chrome executable {} does not exist",
            path.display()
        )));
    }

    CHROME_PATHS
        .iter()
        .map(Path::new)
        .find(|p| p.exists())
        .map(Path::to_path_buf)
        .ok_or_else(|| {
            ScrapeError::precondition("Chrome/Chromium not found; install it or pass --chrome-path")
        })
}

/// Creates logged-in Chromium sessions.
#[derive(Debug)]
pub struct ChromeLauncher {
    settings: BrowserSettings,
    credentials: Credentials,
}

impl ChromeLauncher {
    pub fn new(settings: BrowserSettings, credentials: Credentials) -> Self {
        Self {
            settings,
            credentials,
        }
    }

    fn browser_config(&self) -> Result<BrowserConfig> {
        let chrome = find_chrome(self.settings.chrome_path.as_deref())?;
        let mut builder = BrowserConfig::builder()
            .chrome_executable(chrome)
            .window_size(1920, 1080)
            .arg(format!("--user-agent={USER_AGENT}"));
        if !self.settings.headless {
            builder = builder.with_head();
        }
        for arg in CHROME_ARGS {
            builder = builder.arg(*arg);
        }
        builder
            .build()
            .map_err(|e| ScrapeError::session(format!("invalid browser config: {e}")))
    }

    #[instrument(level = "info", skip_all, fields(username = %self.credentials.username))]
    async fn login(&self, session: &ChromeSession) -> Result<()> {
        let timeout = self.settings.login_timeout;
        session.navigate(LOGIN_URL).await?;

        session.wait_for(USERNAME_INPUT, timeout).await?;
        session
            .page
            .find_element(USERNAME_INPUT)
            .await?
            .click()
            .await?
            .type_str(&self.credentials.email)
            .await?
            .press_key("Enter")
            .await?;

        // An unusual-activity challenge may ask for the handle before the password.
        if session.wait_for(CHALLENGE_INPUT, Duration::from_secs(3)).await.is_ok() {
            debug!("Answering identifier challenge");
            session
                .page
                .find_element(CHALLENGE_INPUT)
                .await?
                .click()
                .await?
                .type_str(&self.credentials.username)
                .await?
                .press_key("Enter")
                .await?;
        }

        session.wait_for(PASSWORD_INPUT, timeout).await?;
        session
            .page
            .find_element(PASSWORD_INPUT)
            .await?
            .click()
            .await?
            .type_str(&self.credentials.password)
            .await?
            .press_key("Enter")
            .await?;

        session.wait_for(LOGGED_IN_MARKER, timeout).await?;
        info!("Logged in");
        Ok(())
    }
}

impl SessionFactory for ChromeLauncher {
    type Session = ChromeSession;

    #[instrument(level = "info", skip(self), fields(headless = self.settings.headless))]
    async fn create(&mut self) -> Result<ChromeSession> {
        let config = self.browser_config()?;
        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| ScrapeError::session(format!("failed to launch browser: {e}")))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                handler_task.abort();
                return Err(ScrapeError::session(format!("failed to open page: {e}")));
            }
        };

        let session = ChromeSession {
            browser,
            page,
            handler_task,
        };

        if let Err(e) = self.login(&session).await {
            discard(session).await;
            return Err(ScrapeError::session(format!("login failed: {e}")));
        }
        Ok(session)
    }
}

/// A launched browser with one page.
pub struct ChromeSession {
    browser: Browser,
    page: Page,
    handler_task: JoinHandle<()>,
}

impl ChromeSession {
    async fn height(&self) -> Result<u64> {
        let height: f64 = self
            .page
            .evaluate(SCROLL_HEIGHT_JS.to_string())
            .await?
            .into_value()
            .map_err(|e| ScrapeError::render(format!("unexpected scroll height: {e}")))?;
        Ok(height.max(0.0) as u64)
    }
}

impl BrowserSession for ChromeSession {
    async fn navigate(&self, url: &str) -> Result<()> {
        self.page.goto(url).await?;
        Ok(())
    }

    async fn wait_for(&self, selector: &str, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        loop {
            match self.page.find_element(selector).await {
                Ok(_) => return Ok(()),
                Err(e) => {
                    let err = ScrapeError::from(e);
                    if err.is_fatal_session() {
                        return Err(err);
                    }
                }
            }
            if Instant::now() >= deadline {
                return Err(ScrapeError::timeout(selector, timeout));
            }
            sleep(POLL_INTERVAL).await;
        }
    }

    async fn page_height(&self) -> Result<u64> {
        self.height().await
    }

    async fn scroll_to_bottom(&self) -> Result<()> {
        self.page.evaluate(SCROLL_TO_BOTTOM_JS.to_string()).await?;
        Ok(())
    }

    async fn query_text(&self, selector: &str) -> Result<Vec<String>> {
        let mut texts = Vec::new();
        for element in self.page.find_elements(selector).await? {
            if let Some(text) = element.inner_text().await? {
                texts.push(text);
            }
        }
        Ok(texts)
    }

    async fn query_media(&self, selector: &str) -> Result<Vec<String>> {
        let mut sources = Vec::new();
        for element in self.page.find_elements(selector).await? {
            if let Some(src) = element.attribute("src").await? {
                sources.push(src);
            }
        }
        Ok(sources)
    }

    async fn dispose(mut self) -> Result<()> {
        let closed = self.browser.close().await;
        if let Err(e) = self.browser.wait().await {
            warn!(error = %e, "Browser process did not exit cleanly");
        }
        self.handler_task.abort();
        closed.map(|_| ()).map_err(ScrapeError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_missing_chrome_is_precondition() {
        let err = find_chrome(Some(Path::new("/definitely/not/here/chrome"))).unwrap_err();
        assert!(matches!(err, ScrapeError::Precondition(_)));
    }

    #[test]
    fn test_explicit_existing_path_is_used() {
        let file = tempfile::NamedTempFile::new().unwrap();
        assert_eq!(find_chrome(Some(file.path())).unwrap(), file.path());
    }
}
