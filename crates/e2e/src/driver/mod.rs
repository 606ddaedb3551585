//! Browser driver abstraction
//!
//! The harness never talks to a browser directly. Everything goes through
//! the [`Driver`] trait, which exposes the handful of primitives the
//! workflow needs (navigate, click, fill, query). Two implementations ship:
//!
//! - [`playwright::PlaywrightDriver`] keeps a `node` process running a
//!   Playwright page and speaks JSON lines to it.
//! - [`crate::sim::SimDriver`] is an in-process model of the wizard.
//!
//! [`Page`] wraps a driver together with the run's [`Timeouts`] and owns
//! every bounded wait. Components only ever block through `Page`.

pub mod playwright;

use std::fmt;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{E2eError, E2eResult};

/// How a locator matches element text or accessible names
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "value", rename_all = "snake_case")]
pub enum TextMatch {
    Exact(String),
    Contains(String),
    /// Case-insensitive regular expression
    Pattern(String),
}

impl TextMatch {
    pub fn matches(&self, candidate: &str) -> bool {
        let candidate = candidate.trim();
        match self {
            TextMatch::Exact(s) => candidate == s,
            TextMatch::Contains(s) => candidate.contains(s.as_str()),
            TextMatch::Pattern(p) => Regex::new(&format!("(?i){}", p))
                .map(|re| re.is_match(candidate))
                .unwrap_or(false),
        }
    }

    fn to_js(&self) -> String {
        match self {
            TextMatch::Exact(s) => format!("{}, {{ exact: true }}", js_str(s)),
            TextMatch::Contains(s) => js_str(s),
            TextMatch::Pattern(p) => format!("new RegExp({}, 'i')", js_str(p)),
        }
    }
}

impl fmt::Display for TextMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TextMatch::Exact(s) => write!(f, "\"{}\"", s),
            TextMatch::Contains(s) => write!(f, "*{}*", s),
            TextMatch::Pattern(p) => write!(f, "/{}/i", p),
        }
    }
}

/// Element query, modelled on Playwright's locator chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Locator {
    /// Simple CSS selector: `tag`, `#id`, `.class` or `[attr="value"]`,
    /// optionally prefixed by a tag name
    Css(String),
    Role { role: String, name: Option<TextMatch> },
    Text(TextMatch),
    Nth(Box<Locator>, usize),
    /// `inner` restricted to descendants of `scope`
    Within { scope: Box<Locator>, inner: Box<Locator> },
}

impl Locator {
    pub fn css(selector: impl Into<String>) -> Self {
        Locator::Css(selector.into())
    }

    pub fn role(role: impl Into<String>, name: impl Into<String>) -> Self {
        Locator::Role {
            role: role.into(),
            name: Some(TextMatch::Exact(name.into())),
        }
    }

    pub fn any_role(role: impl Into<String>) -> Self {
        Locator::Role {
            role: role.into(),
            name: None,
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Locator::Text(TextMatch::Exact(text.into()))
    }

    pub fn text_containing(text: impl Into<String>) -> Self {
        Locator::Text(TextMatch::Contains(text.into()))
    }

    pub fn pattern(pattern: impl Into<String>) -> Self {
        Locator::Text(TextMatch::Pattern(pattern.into()))
    }

    pub fn nth(self, index: usize) -> Self {
        Locator::Nth(Box::new(self), index)
    }

    pub fn first(self) -> Self {
        self.nth(0)
    }

    pub fn within(self, scope: Locator) -> Self {
        Locator::Within {
            scope: Box::new(scope),
            inner: Box::new(self),
        }
    }

    /// Render as a Playwright locator expression rooted at `root`
    pub fn to_js(&self, root: &str) -> String {
        match self {
            Locator::Css(sel) => format!("{}.locator({})", root, js_str(sel)),
            Locator::Role { role, name } => match name {
                Some(m) => format!("{}.getByRole({}, {{ name: {} }})", root, js_str(role), role_name_js(m)),
                None => format!("{}.getByRole({})", root, js_str(role)),
            },
            Locator::Text(m) => format!("{}.getByText({})", root, m.to_js()),
            Locator::Nth(inner, i) => format!("{}.nth({})", inner.to_js(root), i),
            Locator::Within { scope, inner } => inner.to_js(&scope.to_js(root)),
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Css(sel) => write!(f, "{}", sel),
            Locator::Role { role, name: Some(m) } => write!(f, "role={}[name={}]", role, m),
            Locator::Role { role, name: None } => write!(f, "role={}", role),
            Locator::Text(m) => write!(f, "text={}", m),
            Locator::Nth(inner, i) => write!(f, "{} >> nth={}", inner, i),
            Locator::Within { scope, inner } => write!(f, "{} >> {}", scope, inner),
        }
    }
}

fn js_str(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| "\"\"".to_string())
}

// getByRole takes `name` plus a separate `exact` flag, unlike getByText
fn role_name_js(m: &TextMatch) -> String {
    match m {
        TextMatch::Exact(s) => format!("{}, exact: true", js_str(s)),
        TextMatch::Contains(s) => js_str(s),
        TextMatch::Pattern(p) => format!("new RegExp({}, 'i')", js_str(p)),
    }
}

/// Browser primitives the workflow is composed from.
///
/// Actions (`click`, `fill`, `press`, `set_checked`) and single-element
/// reads resolve their locator strictly: exactly one element must match.
/// Queries (`count`, `is_visible`) sample the current state and never wait.
#[async_trait]
pub trait Driver: Send {
    async fn goto(&mut self, path: &str) -> E2eResult<()>;
    async fn click(&mut self, locator: &Locator) -> E2eResult<()>;
    /// Clear the input, then type `value`
    async fn fill(&mut self, locator: &Locator, value: &str) -> E2eResult<()>;
    async fn press(&mut self, locator: &Locator, key: &str) -> E2eResult<()>;
    async fn set_checked(&mut self, locator: &Locator, checked: bool) -> E2eResult<()>;
    async fn is_checked(&mut self, locator: &Locator) -> E2eResult<bool>;
    async fn count(&mut self, locator: &Locator) -> E2eResult<usize>;
    async fn is_visible(&mut self, locator: &Locator) -> E2eResult<bool>;
    async fn is_enabled(&mut self, locator: &Locator) -> E2eResult<bool>;
    async fn input_value(&mut self, locator: &Locator) -> E2eResult<String>;
    async fn attribute(&mut self, locator: &Locator, name: &str) -> E2eResult<Option<String>>;
    /// Path component of the current URL
    async fn current_path(&mut self) -> E2eResult<String>;
    async fn close(&mut self) -> E2eResult<()>;
}

/// Produces one isolated session per scenario
#[async_trait]
pub trait DriverFactory: Send + Sync {
    async fn launch(&self) -> E2eResult<Box<dyn Driver>>;
    fn name(&self) -> &str;
}

/// Bounds for every wait the harness performs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// Element appearance and actionability
    pub action: Duration,
    /// Route changes after submit, delete, login
    pub navigation: Duration,
    /// Quiet period a reactive reading must hold before it counts
    pub settle: Duration,
    pub poll_interval: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            action: Duration::from_secs(10),
            navigation: Duration::from_secs(15),
            settle: Duration::from_millis(500),
            poll_interval: Duration::from_millis(100),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitState {
    Visible,
    Hidden,
}

/// What a poll loop samples
#[derive(Debug, Clone, Copy)]
pub enum Probe<'a> {
    Count(&'a Locator),
    Enabled(&'a Locator),
    Checked(&'a Locator),
    Attribute(&'a Locator, &'a str),
    Path,
}

impl fmt::Display for Probe<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Probe::Count(l) => write!(f, "count of {}", l),
            Probe::Enabled(l) => write!(f, "enabled state of {}", l),
            Probe::Checked(l) => write!(f, "checked state of {}", l),
            Probe::Attribute(l, a) => write!(f, "attribute {} of {}", a, l),
            Probe::Path => write!(f, "current route"),
        }
    }
}

/// A sampled value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reading {
    Count(usize),
    Flag(bool),
    Text(Option<String>),
}

impl Reading {
    pub fn as_count(&self) -> usize {
        match self {
            Reading::Count(n) => *n,
            Reading::Flag(b) => usize::from(*b),
            Reading::Text(t) => usize::from(t.is_some()),
        }
    }

    pub fn as_flag(&self) -> bool {
        match self {
            Reading::Count(n) => *n > 0,
            Reading::Flag(b) => *b,
            Reading::Text(t) => t.is_some(),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Reading::Text(t) => t.as_deref(),
            _ => None,
        }
    }
}

impl fmt::Display for Reading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reading::Count(n) => write!(f, "{}", n),
            Reading::Flag(b) => write!(f, "{}", b),
            Reading::Text(Some(t)) => write!(f, "{:?}", t),
            Reading::Text(None) => write!(f, "<none>"),
        }
    }
}

/// Outcome of a bounded poll
#[derive(Debug, Clone)]
pub struct Polled {
    pub reading: Reading,
    pub met: bool,
    pub waited_ms: u64,
}

/// A driver plus the timeouts that bound every wait on it
pub struct Page {
    driver: Box<dyn Driver>,
    timeouts: Timeouts,
}

impl fmt::Debug for Page {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Page")
            .field("timeouts", &self.timeouts)
            .finish_non_exhaustive()
    }
}

impl Page {
    pub fn new(driver: Box<dyn Driver>, timeouts: Timeouts) -> Self {
        Self { driver, timeouts }
    }

    pub fn timeouts(&self) -> Timeouts {
        self.timeouts
    }

    pub async fn goto(&mut self, path: &str) -> E2eResult<()> {
        debug!(path, "goto");
        self.driver.goto(path).await
    }

    pub async fn click(&mut self, locator: &Locator) -> E2eResult<()> {
        debug!(%locator, "click");
        self.driver.click(locator).await
    }

    pub async fn fill(&mut self, locator: &Locator, value: &str) -> E2eResult<()> {
        debug!(%locator, "fill");
        self.driver.fill(locator, value).await
    }

    pub async fn press(&mut self, locator: &Locator, key: &str) -> E2eResult<()> {
        debug!(%locator, key, "press");
        self.driver.press(locator, key).await
    }

    pub async fn set_checked(&mut self, locator: &Locator, checked: bool) -> E2eResult<()> {
        debug!(%locator, checked, "set_checked");
        self.driver.set_checked(locator, checked).await
    }

    pub async fn is_checked(&mut self, locator: &Locator) -> E2eResult<bool> {
        self.driver.is_checked(locator).await
    }

    pub async fn count(&mut self, locator: &Locator) -> E2eResult<usize> {
        self.driver.count(locator).await
    }

    pub async fn is_visible(&mut self, locator: &Locator) -> E2eResult<bool> {
        self.driver.is_visible(locator).await
    }

    pub async fn is_enabled(&mut self, locator: &Locator) -> E2eResult<bool> {
        self.driver.is_enabled(locator).await
    }

    pub async fn input_value(&mut self, locator: &Locator) -> E2eResult<String> {
        self.driver.input_value(locator).await
    }

    pub async fn current_path(&mut self) -> E2eResult<String> {
        self.driver.current_path().await
    }

    pub async fn close(&mut self) -> E2eResult<()> {
        self.driver.close().await
    }

    pub async fn sample(&mut self, probe: Probe<'_>) -> E2eResult<Reading> {
        Ok(match probe {
            Probe::Count(l) => Reading::Count(self.driver.count(l).await?),
            Probe::Enabled(l) => Reading::Flag(self.driver.is_enabled(l).await?),
            Probe::Checked(l) => Reading::Flag(self.driver.is_checked(l).await?),
            Probe::Attribute(l, name) => Reading::Text(self.driver.attribute(l, name).await?),
            Probe::Path => Reading::Text(Some(self.driver.current_path().await?)),
        })
    }

    /// Sample `probe` until `accept` holds or `timeout` runs out. Running
    /// out is not an error here; callers decide what a miss means.
    pub async fn poll<F>(&mut self, probe: Probe<'_>, timeout: Duration, accept: F) -> E2eResult<Polled>
    where
        F: Fn(&Reading) -> bool,
    {
        let start = Instant::now();
        loop {
            let reading = self.sample(probe).await?;
            let waited_ms = start.elapsed().as_millis() as u64;
            if accept(&reading) {
                return Ok(Polled { reading, met: true, waited_ms });
            }
            if start.elapsed() >= timeout {
                debug!(%probe, last = %reading, waited_ms, "poll gave up");
                return Ok(Polled { reading, met: false, waited_ms });
            }
            tokio::time::sleep(self.timeouts.poll_interval).await;
        }
    }

    /// Sample `probe` until it holds the same value for the settle period.
    pub async fn settle(&mut self, probe: Probe<'_>) -> E2eResult<Reading> {
        let start = Instant::now();
        let mut last = self.sample(probe).await?;
        let mut stable_since = Instant::now();
        loop {
            if stable_since.elapsed() >= self.timeouts.settle {
                return Ok(last);
            }
            if start.elapsed() >= self.timeouts.action {
                return Err(E2eError::Timeout {
                    what: format!("{} to settle (last {})", probe, last),
                    waited_ms: start.elapsed().as_millis() as u64,
                });
            }
            tokio::time::sleep(self.timeouts.poll_interval).await;
            let next = self.sample(probe).await?;
            if next != last {
                last = next;
                stable_since = Instant::now();
            }
        }
    }

    /// Wait for an element to show up or go away. A missing element is a
    /// locator failure; one that refuses to leave is a timeout.
    pub async fn wait_for(&mut self, locator: &Locator, state: WaitState) -> E2eResult<()> {
        let timeout = self.timeouts.action;
        let polled = self
            .poll(Probe::Count(locator), timeout, |r| match state {
                WaitState::Visible => r.as_count() > 0,
                WaitState::Hidden => r.as_count() == 0,
            })
            .await?;
        if polled.met {
            return Ok(());
        }
        match state {
            WaitState::Visible => Err(E2eError::locator(
                locator,
                format!("not visible after {} ms", polled.waited_ms),
            )),
            WaitState::Hidden => Err(E2eError::Timeout {
                what: format!("{} to disappear ({} still present)", locator, polled.reading),
                waited_ms: polled.waited_ms,
            }),
        }
    }

    /// Wait until the route matches `pattern`; returns the matching path
    pub async fn wait_for_path(&mut self, pattern: &Regex) -> E2eResult<String> {
        let timeout = self.timeouts.navigation;
        let polled = self
            .poll(Probe::Path, timeout, |r| {
                r.as_text().map(|p| pattern.is_match(p)).unwrap_or(false)
            })
            .await?;
        let actual = polled.reading.as_text().unwrap_or_default().to_string();
        if polled.met {
            Ok(actual)
        } else {
            Err(E2eError::NavigationMismatch {
                expected: pattern.as_str().to_string(),
                actual,
            })
        }
    }

    /// Wait until the checked state of a checkbox reads `expected`
    pub async fn wait_for_checked(&mut self, locator: &Locator, expected: bool) -> E2eResult<()> {
        let timeout = self.timeouts.action;
        let polled = self
            .poll(Probe::Checked(locator), timeout, |r| r.as_flag() == expected)
            .await?;
        if polled.met {
            Ok(())
        } else {
            Err(E2eError::mismatch(
                format!("checked state of {}", locator),
                expected,
                polled.reading,
            ))
        }
    }
}
