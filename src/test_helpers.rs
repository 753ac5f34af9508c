//! Test doubles for the browser session and the HTTP fetcher.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::config::RenderSettings;
use crate::error::{Result, ScrapeError};
use crate::fetch::Fetch;
use crate::retry::RetryPolicy;
use crate::session::{BrowserSession, SessionFactory};

/// Render settings with no real waiting.
pub fn fast_render_settings() -> RenderSettings {
    RenderSettings {
        content_timeout: Duration::from_millis(1),
        scroll_pause: Duration::ZERO,
        retry: RetryPolicy::immediate(5),
        ..RenderSettings::default()
    }
}

/// How a fake page behaves once navigated to.
#[derive(Debug, Clone, Default)]
pub struct PageScript {
    texts: Vec<String>,
    media: Vec<String>,
    heights: Vec<u64>,
    never_renders: bool,
    fail_first: usize,
    crashes: bool,
}

impl PageScript {
    pub fn post(texts: &[&str]) -> Self {
        Self {
            texts: texts.iter().map(|s| s.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn never_renders() -> Self {
        Self {
            never_renders: true,
            ..Self::default()
        }
    }

    /// Navigation breaks the session.
    pub fn crashes() -> Self {
        Self {
            crashes: true,
            ..Self::default()
        }
    }

    pub fn with_media(mut self, media: &[&str]) -> Self {
        self.media = media.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Successive `page_height` readings; the last one repeats.
    pub fn with_heights(mut self, heights: &[u64]) -> Self {
        self.heights = heights.to_vec();
        self
    }

    /// The post marker times out for the first `n` navigations.
    pub fn failing_first(mut self, n: usize) -> Self {
        self.fail_first = n;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Created(u64),
    Disposed(u64),
    Navigated(u64, String),
}

#[derive(Debug, Clone, Default)]
pub struct SessionLog(Arc<Mutex<Vec<SessionEvent>>>);

impl SessionLog {
    fn push(&self, event: SessionEvent) {
        self.0.lock().unwrap().push(event);
    }

    pub fn events(&self) -> Vec<SessionEvent> {
        self.0.lock().unwrap().clone()
    }

    pub fn disposed(&self) -> Vec<u64> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                SessionEvent::Disposed(id) => Some(id),
                _ => None,
            })
            .collect()
    }

    /// Session id of every navigation, in order.
    pub fn navigations(&self) -> Vec<(u64, String)> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                SessionEvent::Navigated(id, url) => Some((id, url)),
                _ => None,
            })
            .collect()
    }
}

#[derive(Debug, Default)]
pub struct FakeFactory {
    pages: Arc<HashMap<String, PageScript>>,
    default_page: PageScript,
    next_id: u64,
    failing: bool,
    failing_dispose: bool,
    log: SessionLog,
}

impl FakeFactory {
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    /// Sessions whose `dispose` reports an error after logging the disposal.
    pub fn with_failing_dispose(mut self) -> Self {
        self.failing_dispose = true;
        self
    }

    pub fn with_page(mut self, url: &str, script: PageScript) -> Self {
        Arc::make_mut(&mut self.pages).insert(url.to_string(), script);
        self
    }

    pub fn with_default_page(mut self, script: PageScript) -> Self {
        self.default_page = script;
        self
    }

    pub fn log(&self) -> SessionLog {
        self.log.clone()
    }
}

impl SessionFactory for FakeFactory {
    type Session = FakeSession;

    async fn create(&mut self) -> Result<FakeSession> {
        if self.failing {
            return Err(ScrapeError::session("browser failed to launch"));
        }
        self.next_id += 1;
        self.log.push(SessionEvent::Created(self.next_id));
        Ok(FakeSession {
            id: self.next_id,
            pages: Arc::clone(&self.pages),
            default_page: self.default_page.clone(),
            log: self.log.clone(),
            failing_dispose: self.failing_dispose,
            current: RefCell::new(None),
            visits: RefCell::new(HashMap::new()),
            heights: RefCell::new(VecDeque::new()),
            navigations: Cell::new(0),
            scrolls: Cell::new(0),
        })
    }
}

pub struct FakeSession {
    id: u64,
    pages: Arc<HashMap<String, PageScript>>,
    default_page: PageScript,
    log: SessionLog,
    failing_dispose: bool,
    /// Script of the loaded page and how often its URL has been visited.
    current: RefCell<Option<(PageScript, usize)>>,
    visits: RefCell<HashMap<String, usize>>,
    heights: RefCell<VecDeque<u64>>,
    navigations: Cell<usize>,
    scrolls: Cell<usize>,
}

impl FakeSession {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn navigations(&self) -> usize {
        self.navigations.get()
    }

    pub fn scrolls(&self) -> usize {
        self.scrolls.get()
    }

    fn page(&self) -> PageScript {
        self.current
            .borrow()
            .as_ref()
            .map(|(script, _)| script.clone())
            .unwrap_or_default()
    }
}

impl BrowserSession for FakeSession {
    async fn navigate(&self, url: &str) -> Result<()> {
        self.navigations.set(self.navigations.get() + 1);
        self.log.push(SessionEvent::Navigated(self.id, url.to_string()));

        let script = self
            .pages
            .get(url)
            .cloned()
            .unwrap_or_else(|| self.default_page.clone());
        if script.crashes {
            return Err(ScrapeError::session("websocket closed"));
        }

        let visit = {
            let mut visits = self.visits.borrow_mut();
            let count = visits.entry(url.to_string()).or_default();
            *count += 1;
            *count
        };
        *self.heights.borrow_mut() = script.heights.iter().copied().collect();
        *self.current.borrow_mut() = Some((script, visit));
        Ok(())
    }

    async fn wait_for(&self, selector: &str, timeout: Duration) -> Result<()> {
        let (page, visit) = self.current.borrow().clone().unwrap_or_default();
        if page.never_renders || visit <= page.fail_first {
            return Err(ScrapeError::timeout(selector, timeout));
        }
        Ok(())
    }

    async fn page_height(&self) -> Result<u64> {
        let mut heights = self.heights.borrow_mut();
        let height = match heights.len() {
            0 => 0,
            1 => heights[0],
            _ => heights.pop_front().unwrap_or_default(),
        };
        Ok(height)
    }

    async fn scroll_to_bottom(&self) -> Result<()> {
        self.scrolls.set(self.scrolls.get() + 1);
        Ok(())
    }

    async fn query_text(&self, _selector: &str) -> Result<Vec<String>> {
        Ok(self.page().texts)
    }

    async fn query_media(&self, _selector: &str) -> Result<Vec<String>> {
        Ok(self.page().media)
    }

    async fn dispose(self) -> Result<()> {
        self.log.push(SessionEvent::Disposed(self.id));
        if self.failing_dispose {
            return Err(ScrapeError::session("browser already gone"));
        }
        Ok(())
    }
}

/// Fetcher that fails with a 503 until a given attempt.
#[derive(Debug, Default)]
pub struct FlakyFetcher {
    succeed_on: Option<usize>,
    failing_url: Option<String>,
    calls: AtomicUsize,
}

impl FlakyFetcher {
    pub fn always_failing() -> Self {
        Self::default()
    }

    pub fn succeeding_on(attempt: usize) -> Self {
        Self {
            succeed_on: Some(attempt),
            ..Self::default()
        }
    }

    /// Succeeds immediately for every URL except `url`.
    pub fn failing_for(url: &str) -> Self {
        Self {
            succeed_on: Some(1),
            failing_url: Some(url.to_string()),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Fetch for FlakyFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        let unavailable = ScrapeError::Status {
            url: url.to_string(),
            status: 503,
        };
        if self.failing_url.as_deref() == Some(url) {
            return Err(unavailable);
        }
        match self.succeed_on {
            Some(k) if call >= k => Ok(b"image-bytes".to_vec()),
            _ => Err(unavailable),
        }
    }
}
