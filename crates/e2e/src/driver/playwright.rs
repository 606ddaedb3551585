//! Playwright bridge driver
//!
//! Starts one `node` process per session running a generated script that
//! owns a Playwright browser context. Requests and replies are JSON
//! objects, one per line, over the child's stdin and stdout. Locators
//! travel as Playwright expressions built by [`Locator::to_js`].

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tracing::{debug, info, warn};

use super::{Driver, DriverFactory, Locator};
use crate::error::{E2eError, E2eResult};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Browser {
    #[default]
    Chromium,
    Firefox,
    Webkit,
}

impl Browser {
    pub fn as_str(&self) -> &'static str {
        match self {
            Browser::Chromium => "chromium",
            Browser::Firefox => "firefox",
            Browser::Webkit => "webkit",
        }
    }
}

/// Configuration for Playwright sessions
#[derive(Debug, Clone)]
pub struct PlaywrightConfig {
    pub base_url: String,
    pub browser: Browser,
    pub headless: bool,
    pub viewport_width: u32,
    pub viewport_height: u32,
    /// Playwright's own auto-wait bound for a single action
    pub action_timeout: Duration,
    pub navigation_timeout: Duration,
}

impl Default for PlaywrightConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:3000".to_string(),
            browser: Browser::Chromium,
            headless: true,
            viewport_width: 1280,
            viewport_height: 720,
            action_timeout: Duration::from_secs(10),
            navigation_timeout: Duration::from_secs(15),
        }
    }
}

/// Build the bridge script for one session
pub fn build_script(config: &PlaywrightConfig) -> String {
    let base_url = serde_json::to_string(&config.base_url).unwrap_or_else(|_| "\"\"".to_string());
    format!(
        r#"
const {{ chromium, firefox, webkit }} = require('playwright');
const readline = require('readline');

(async () => {{
  const browser = await {browser}.launch({{ headless: {headless} }});
  const context = await browser.newContext({{
    baseURL: {base_url},
    viewport: {{ width: {width}, height: {height} }}
  }});
  const page = await context.newPage();
  page.setDefaultTimeout({action_ms});
  page.setDefaultNavigationTimeout({navigation_ms});

  const locate = (expr) => new Function('page', 'return ' + expr + ';')(page);
  const handlers = {{
    goto: async (m) => {{ await page.goto(m.path); return null; }},
    click: async (m) => {{ await locate(m.target).click(); return null; }},
    fill: async (m) => {{ await locate(m.target).fill(m.value); return null; }},
    press: async (m) => {{ await locate(m.target).press(m.value); return null; }},
    set_checked: async (m) => {{ await locate(m.target).setChecked(m.checked); return null; }},
    is_checked: async (m) => locate(m.target).isChecked(),
    count: async (m) => locate(m.target).count(),
    is_visible: async (m) => locate(m.target).isVisible(),
    is_enabled: async (m) => locate(m.target).isEnabled(),
    input_value: async (m) => locate(m.target).inputValue(),
    attribute: async (m) => locate(m.target).getAttribute(m.name),
    path: async () => new URL(page.url()).pathname,
    close: async () => null,
  }};

  const reply = (obj) => process.stdout.write(JSON.stringify(obj) + '\n');
  reply({{ id: 0, ok: true, value: 'ready' }});

  const rl = readline.createInterface({{ input: process.stdin }});
  for await (const line of rl) {{
    let msg;
    try {{
      msg = JSON.parse(line);
    }} catch (e) {{
      reply({{ id: -1, ok: false, error: 'bad request: ' + e.message }});
      continue;
    }}
    const handler = handlers[msg.op];
    if (!handler) {{
      reply({{ id: msg.id, ok: false, error: 'unknown op ' + msg.op }});
      continue;
    }}
    try {{
      const value = await handler(msg);
      reply({{ id: msg.id, ok: true, value: value === undefined ? null : value }});
    }} catch (e) {{
      reply({{ id: msg.id, ok: false, error: e.message }});
    }}
    if (msg.op === 'close') break;
  }}
  await browser.close();
}})().catch((e) => {{
  process.stdout.write(JSON.stringify({{ id: 0, ok: false, error: e.message }}) + '\n');
  process.exit(1);
}});
"#,
        browser = config.browser.as_str(),
        headless = config.headless,
        base_url = base_url,
        width = config.viewport_width,
        height = config.viewport_height,
        action_ms = config.action_timeout.as_millis(),
        navigation_ms = config.navigation_timeout.as_millis(),
    )
}

#[derive(Debug, Default, Serialize)]
struct BridgeRequest<'a> {
    id: u64,
    op: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    target: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    value: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    checked: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    path: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct BridgeResponse {
    id: i64,
    ok: bool,
    #[serde(default)]
    value: Value,
    #[serde(default)]
    error: Option<String>,
}

/// Playwright reports missing, ambiguous or never-actionable targets with
/// these fragments
fn is_locator_failure(message: &str) -> bool {
    ["strict mode violation", "Timeout", "waiting for", "not visible", "not enabled"]
        .iter()
        .any(|m| message.contains(m))
}

/// One browser session behind a `node` bridge process
pub struct PlaywrightDriver {
    child: Child,
    stdin: ChildStdin,
    stdout: Lines<BufReader<ChildStdout>>,
    next_id: u64,
    reply_timeout: Duration,
    closed: bool,
    _script_dir: TempDir,
}

impl PlaywrightDriver {
    /// Check if Playwright is installed
    pub async fn check_installed() -> E2eResult<()> {
        let status = Command::new("npx")
            .args(["playwright", "--version"])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;
        match status {
            Ok(s) if s.success() => Ok(()),
            _ => Err(E2eError::PlaywrightNotFound),
        }
    }

    pub async fn launch(config: &PlaywrightConfig) -> E2eResult<Self> {
        let script_dir = tempfile::tempdir()?;
        let script_path = script_dir.path().join("bridge.js");
        std::fs::write(&script_path, build_script(config))?;
        debug!("Starting Playwright bridge: {}", script_path.display());

        let mut child = Command::new("node")
            .arg(&script_path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| E2eError::Driver(format!("failed to spawn node: {}", e)))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| E2eError::Driver("bridge stdin unavailable".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| E2eError::Driver("bridge stdout unavailable".to_string()))?;

        let mut driver = Self {
            child,
            stdin,
            stdout: BufReader::new(stdout).lines(),
            next_id: 1,
            reply_timeout: config.navigation_timeout.max(config.action_timeout) + Duration::from_secs(5),
            closed: false,
            _script_dir: script_dir,
        };

        // Browser startup can take a while on a cold machine
        let ready = driver.read_reply(Duration::from_secs(60)).await?;
        if !ready.ok {
            return Err(E2eError::Driver(format!(
                "bridge failed to start: {}",
                ready.error.unwrap_or_default()
            )));
        }
        info!(browser = config.browser.as_str(), "Playwright session ready");
        Ok(driver)
    }

    async fn read_reply(&mut self, wait: Duration) -> E2eResult<BridgeResponse> {
        let line = tokio::time::timeout(wait, self.stdout.next_line())
            .await
            .map_err(|_| E2eError::Timeout {
                what: "Playwright bridge reply".to_string(),
                waited_ms: wait.as_millis() as u64,
            })??
            .ok_or_else(|| E2eError::Driver("Playwright bridge exited".to_string()))?;
        Ok(serde_json::from_str(&line)?)
    }

    async fn call(&mut self, mut request: BridgeRequest<'_>, locator: Option<&Locator>) -> E2eResult<Value> {
        if self.closed {
            return Err(E2eError::Driver("session is closed".to_string()));
        }
        request.id = self.next_id;
        self.next_id += 1;
        let mut line = serde_json::to_string(&request)?;
        line.push('\n');
        self.stdin.write_all(line.as_bytes()).await?;
        self.stdin.flush().await?;

        let reply = self.read_reply(self.reply_timeout).await?;
        if reply.id != request.id as i64 {
            return Err(E2eError::Driver(format!(
                "bridge answered request {} while {} was pending",
                reply.id, request.id
            )));
        }
        if reply.ok {
            return Ok(reply.value);
        }
        let message = reply.error.unwrap_or_else(|| "unknown bridge error".to_string());
        match locator {
            Some(loc) if is_locator_failure(&message) => Err(E2eError::locator(loc, message)),
            _ => Err(E2eError::Driver(format!("{} failed: {}", request.op, message))),
        }
    }

    async fn on(&mut self, op: &'static str, locator: &Locator) -> E2eResult<Value> {
        let request = BridgeRequest {
            op,
            target: Some(locator.to_js("page")),
            ..Default::default()
        };
        self.call(request, Some(locator)).await
    }

    /// Shut the bridge down: ask nicely, then SIGTERM, then kill
    pub async fn stop(&mut self) -> E2eResult<()> {
        if !self.closed {
            let request = BridgeRequest {
                op: "close",
                ..Default::default()
            };
            if let Err(e) = self.call(request, None).await {
                warn!("Bridge close request failed: {}", e);
            }
            self.closed = true;
        }

        if tokio::time::timeout(Duration::from_secs(5), self.child.wait())
            .await
            .is_ok()
        {
            return Ok(());
        }

        #[cfg(unix)]
        if let Some(pid) = self.child.id() {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;

            if kill(Pid::from_raw(pid as i32), Signal::SIGTERM).is_ok()
                && tokio::time::timeout(Duration::from_millis(500), self.child.wait())
                    .await
                    .is_ok()
            {
                return Ok(());
            }
        }

        self.child.kill().await?;
        Ok(())
    }
}

fn as_bool(value: Value, op: &str) -> E2eResult<bool> {
    value
        .as_bool()
        .ok_or_else(|| E2eError::Driver(format!("{} returned {}", op, value)))
}

#[async_trait]
impl Driver for PlaywrightDriver {
    async fn goto(&mut self, path: &str) -> E2eResult<()> {
        let request = BridgeRequest {
            op: "goto",
            path: Some(path),
            ..Default::default()
        };
        self.call(request, None).await.map(|_| ())
    }

    async fn click(&mut self, locator: &Locator) -> E2eResult<()> {
        self.on("click", locator).await.map(|_| ())
    }

    async fn fill(&mut self, locator: &Locator, value: &str) -> E2eResult<()> {
        let request = BridgeRequest {
            op: "fill",
            target: Some(locator.to_js("page")),
            value: Some(value),
            ..Default::default()
        };
        self.call(request, Some(locator)).await.map(|_| ())
    }

    async fn press(&mut self, locator: &Locator, key: &str) -> E2eResult<()> {
        let request = BridgeRequest {
            op: "press",
            target: Some(locator.to_js("page")),
            value: Some(key),
            ..Default::default()
        };
        self.call(request, Some(locator)).await.map(|_| ())
    }

    async fn set_checked(&mut self, locator: &Locator, checked: bool) -> E2eResult<()> {
        let request = BridgeRequest {
            op: "set_checked",
            target: Some(locator.to_js("page")),
            checked: Some(checked),
            ..Default::default()
        };
        self.call(request, Some(locator)).await.map(|_| ())
    }

    async fn is_checked(&mut self, locator: &Locator) -> E2eResult<bool> {
        as_bool(self.on("is_checked", locator).await?, "is_checked")
    }

    async fn count(&mut self, locator: &Locator) -> E2eResult<usize> {
        let value = self.on("count", locator).await?;
        value
            .as_u64()
            .map(|n| n as usize)
            .ok_or_else(|| E2eError::Driver(format!("count returned {}", value)))
    }

    async fn is_visible(&mut self, locator: &Locator) -> E2eResult<bool> {
        as_bool(self.on("is_visible", locator).await?, "is_visible")
    }

    async fn is_enabled(&mut self, locator: &Locator) -> E2eResult<bool> {
        as_bool(self.on("is_enabled", locator).await?, "is_enabled")
    }

    async fn input_value(&mut self, locator: &Locator) -> E2eResult<String> {
        match self.on("input_value", locator).await? {
            Value::String(s) => Ok(s),
            other => Err(E2eError::Driver(format!("input_value returned {}", other))),
        }
    }

    async fn attribute(&mut self, locator: &Locator, name: &str) -> E2eResult<Option<String>> {
        let request = BridgeRequest {
            op: "attribute",
            target: Some(locator.to_js("page")),
            name: Some(name),
            ..Default::default()
        };
        match self.call(request, Some(locator)).await? {
            Value::Null => Ok(None),
            Value::String(s) => Ok(Some(s)),
            other => Err(E2eError::Driver(format!("attribute returned {}", other))),
        }
    }

    async fn current_path(&mut self) -> E2eResult<String> {
        let request = BridgeRequest {
            op: "path",
            ..Default::default()
        };
        match self.call(request, None).await? {
            Value::String(s) => Ok(s),
            other => Err(E2eError::Driver(format!("path returned {}", other))),
        }
    }

    async fn close(&mut self) -> E2eResult<()> {
        self.stop().await
    }
}

/// Hands out one fresh browser per scenario
pub struct PlaywrightFactory {
    config: PlaywrightConfig,
}

impl PlaywrightFactory {
    /// Fails when Playwright is not installed
    pub async fn new(config: PlaywrightConfig) -> E2eResult<Self> {
        PlaywrightDriver::check_installed().await?;
        Ok(Self { config })
    }
}

#[async_trait]
impl DriverFactory for PlaywrightFactory {
    async fn launch(&self) -> E2eResult<Box<dyn Driver>> {
        Ok(Box::new(PlaywrightDriver::launch(&self.config).await?))
    }

    fn name(&self) -> &str {
        "playwright"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_carries_config() {
        let config = PlaywrightConfig {
            base_url: "https://staging.example.com".to_string(),
            browser: Browser::Firefox,
            headless: false,
            ..Default::default()
        };
        let script = build_script(&config);
        assert!(script.contains("await firefox.launch({ headless: false })"));
        assert!(script.contains(r#"baseURL: "https://staging.example.com""#));
        assert!(script.contains("page.setDefaultTimeout(10000)"));
        assert!(script.contains("for await (const line of rl)"));
    }

    #[test]
    fn test_request_encoding() {
        let loc = Locator::css("[id=\"waypoints[0].city\"]");
        let request = BridgeRequest {
            id: 7,
            op: "fill",
            target: Some(loc.to_js("page")),
            value: Some("Bratislava"),
            ..Default::default()
        };
        let json: Value = serde_json::to_value(&request).unwrap();
        assert_eq!(json["op"], "fill");
        assert_eq!(json["target"], r#"page.locator("[id=\"waypoints[0].city\"]")"#);
        assert_eq!(json["value"], "Bratislava");
        assert!(json.get("checked").is_none());
    }

    #[test]
    fn test_response_decoding() {
        let ok: BridgeResponse = serde_json::from_str(r#"{"id":3,"ok":true,"value":2}"#).unwrap();
        assert!(ok.ok);
        assert_eq!(ok.value.as_u64(), Some(2));

        let failed: BridgeResponse =
            serde_json::from_str(r#"{"id":4,"ok":false,"error":"Timeout 10000ms exceeded"}"#).unwrap();
        assert!(!failed.ok);
        assert!(is_locator_failure(failed.error.as_deref().unwrap()));
        assert!(!is_locator_failure("net::ERR_CONNECTION_REFUSED"));
    }

    #[test]
    fn test_browser_names() {
        assert_eq!(Browser::default().as_str(), "chromium");
        let parsed: Browser = serde_json::from_str("\"webkit\"").unwrap();
        assert_eq!(parsed, Browser::Webkit);
    }
}
