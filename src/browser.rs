//! Scripted browser sessions for dynamically loaded reviews
//!
//! Sessions are driven over the W3C WebDriver HTTP protocol (chromedriver,
//! geckodriver, selenium). A session lives for exactly one `fetch_reviews`
//! call: [`SessionGuard`] closes it on drop, which covers normal return,
//! timeout and early `?` exits alike.

use scraper::{Html, Selector};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::hash::Hash;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::config::PipelineConfig;
use crate::error::ExtractError;

const SCROLL_TO_BOTTOM: &str = "window.scrollTo(0, document.body.scrollHeight);";

/// One live browser
pub trait BrowserSession {
    fn goto(&mut self, url: &str) -> Result<(), ExtractError>;
    fn execute(&mut self, script: &str) -> Result<(), ExtractError>;
    fn page_source(&mut self) -> Result<String, ExtractError>;
    fn close(&mut self) -> Result<(), ExtractError>;
}

/// Creates sessions on demand
pub trait BrowserLauncher {
    fn launch(&self) -> Result<Box<dyn BrowserSession>, ExtractError>;
}

/// Scoped ownership of a session; closes it when dropped
pub struct SessionGuard {
    session: Box<dyn BrowserSession>,
}

impl SessionGuard {
    pub fn new(session: Box<dyn BrowserSession>) -> Self {
        Self { session }
    }

    pub fn session(&mut self) -> &mut dyn BrowserSession {
        self.session.as_mut()
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if let Err(e) = self.session.close() {
            warn!(error = %e, "failed to close browser session");
        }
    }
}

/// Timing knobs for dynamic content
#[derive(Debug, Clone, Copy)]
pub struct WaitPolicy {
    pub timeout: Duration,
    pub poll_interval: Duration,
    pub scroll_pause: Duration,
}

impl WaitPolicy {
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            timeout: config.wait_timeout(),
            poll_interval: Duration::from_millis(250),
            scroll_pause: config.scroll_pause(),
        }
    }
}

/// Where reviews live on a page and how to load more of them
#[derive(Debug, Clone, Copy)]
pub struct ReviewPage<'a> {
    pub url: &'a str,
    /// Selector whose first match signals that reviews have rendered
    pub ready_selector: &'a str,
    /// Whether more reviews load on scroll
    pub infinite_scroll: bool,
}

/// Poll the page until `selector` matches, up to `timeout`.
///
/// Returns the page source in which the selector first matched.
pub fn wait_for(
    session: &mut dyn BrowserSession,
    selector: &str,
    timeout: Duration,
    poll_interval: Duration,
) -> Result<String, ExtractError> {
    let parsed = Selector::parse(selector)
        .map_err(|e| ExtractError::browser("selector", format!("{e:?}")))?;
    let started = Instant::now();

    loop {
        let source = session.page_source()?;
        if Html::parse_document(&source).select(&parsed).next().is_some() {
            return Ok(source);
        }
        if started.elapsed() >= timeout {
            return Err(ExtractError::Timeout {
                selector: selector.to_string(),
                waited_secs: timeout.as_secs(),
            });
        }
        thread::sleep(poll_interval);
    }
}

/// Scroll-and-wait until `limit` distinct items are parsed or a scroll
/// brings nothing new.
///
/// Each round re-parses the whole page, so items already seen are skipped.
pub fn scroll_collect<T, F>(
    session: &mut dyn BrowserSession,
    first_source: &str,
    limit: usize,
    scroll_pause: Duration,
    parse: F,
) -> Result<Vec<T>, ExtractError>
where
    T: Eq + Hash + Clone,
    F: Fn(&str) -> Vec<T>,
{
    let mut seen = HashSet::new();
    let mut items = Vec::new();
    let mut absorb = |source: &str, items: &mut Vec<T>| {
        let mut added = 0;
        for item in parse(source) {
            if seen.insert(item.clone()) {
                items.push(item);
                added += 1;
            }
        }
        added
    };

    absorb(first_source, &mut items);
    while items.len() < limit {
        session.execute(SCROLL_TO_BOTTOM)?;
        thread::sleep(scroll_pause);
        let source = session.page_source()?;
        let added = absorb(&source, &mut items);
        debug!(added, total = items.len(), "scrolled for more reviews");
        if added == 0 {
            break;
        }
    }

    items.truncate(limit);
    Ok(items)
}

/// Open a page in a fresh session, wait for reviews and parse up to `limit`.
pub fn scrape_reviews<T, F>(
    launcher: &dyn BrowserLauncher,
    page: ReviewPage<'_>,
    limit: usize,
    policy: WaitPolicy,
    parse: F,
) -> Result<Vec<T>, ExtractError>
where
    T: Eq + Hash + Clone,
    F: Fn(&str) -> Vec<T>,
{
    let mut guard = SessionGuard::new(launcher.launch()?);
    let session = guard.session();

    session.goto(page.url)?;
    let source = wait_for(session, page.ready_selector, policy.timeout, policy.poll_interval)?;

    if page.infinite_scroll {
        scroll_collect(session, &source, limit, policy.scroll_pause, parse)
    } else {
        let mut items = parse(&source);
        items.truncate(limit);
        Ok(items)
    }
}

/// Launches headless Chrome sessions through a WebDriver server
#[derive(Clone)]
pub struct WebDriverLauncher {
    agent: ureq::Agent,
    base_url: String,
}

impl WebDriverLauncher {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            agent: config.http_agent(),
            base_url: config.webdriver_url.trim_end_matches('/').to_string(),
        }
    }
}

impl BrowserLauncher for WebDriverLauncher {
    fn launch(&self) -> Result<Box<dyn BrowserSession>, ExtractError> {
        let capabilities = json!({
            "capabilities": {
                "alwaysMatch": {
                    "browserName": "chrome",
                    "goog:chromeOptions": { "args": ["--headless", "--disable-gpu"] }
                }
            }
        });

        let url = format!("{}/session", self.base_url);
        let response: Value = self
            .agent
            .post(&url)
            .send_json(&capabilities)
            .map_err(|e| ExtractError::browser("new session", e))?
            .into_body()
            .read_json()
            .map_err(|e| ExtractError::browser("new session", e))?;

        let session_id = response["value"]["sessionId"]
            .as_str()
            .ok_or_else(|| ExtractError::browser("new session", "response has no sessionId"))?
            .to_string();
        debug!(%session_id, "browser session started");

        Ok(Box::new(WebDriverSession {
            agent: self.agent.clone(),
            session_url: format!("{}/session/{}", self.base_url, session_id),
            closed: false,
        }))
    }
}

struct WebDriverSession {
    agent: ureq::Agent,
    session_url: String,
    closed: bool,
}

impl WebDriverSession {
    fn command(&self, command: &str, path: &str, body: Value) -> Result<Value, ExtractError> {
        let url = format!("{}/{}", self.session_url, path);
        let mut response: Value = self
            .agent
            .post(&url)
            .send_json(&body)
            .map_err(|e| ExtractError::browser(command, e))?
            .into_body()
            .read_json()
            .map_err(|e| ExtractError::browser(command, e))?;
        Ok(response["value"].take())
    }
}

impl BrowserSession for WebDriverSession {
    fn goto(&mut self, url: &str) -> Result<(), ExtractError> {
        self.command("navigate", "url", json!({ "url": url }))?;
        Ok(())
    }

    fn execute(&mut self, script: &str) -> Result<(), ExtractError> {
        self.command("execute", "execute/sync", json!({ "script": script, "args": [] }))?;
        Ok(())
    }

    fn page_source(&mut self) -> Result<String, ExtractError> {
        let url = format!("{}/source", self.session_url);
        let response: Value = self
            .agent
            .get(&url)
            .call()
            .map_err(|e| ExtractError::browser("source", e))?
            .into_body()
            .read_json()
            .map_err(|e| ExtractError::browser("source", e))?;
        response["value"]
            .as_str()
            .map(String::from)
            .ok_or_else(|| ExtractError::browser("source", "response has no page source"))
    }

    fn close(&mut self) -> Result<(), ExtractError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.agent
            .delete(&self.session_url)
            .call()
            .map_err(|e| ExtractError::browser("delete session", e))?;
        debug!(session = %self.session_url, "browser session closed");
        Ok(())
    }
}
