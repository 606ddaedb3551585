//! Harness configuration

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::driver::playwright::{Browser, PlaywrightConfig};
use crate::driver::Timeouts;
use crate::error::{E2eError, E2eResult};

/// Harness configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Application under test
    pub app: AppConfig,

    /// Browser session settings
    pub browser: BrowserConfig,

    /// Wait bounds
    pub timeouts: TimeoutConfig,

    /// Runner settings
    pub run: RunConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub base_url: String,

    /// How long the preflight keeps trying to reach the login page
    pub preflight_timeout_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:3000".to_string(),
            preflight_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    pub browser: Browser,
    pub headless: bool,
    pub viewport_width: u32,
    pub viewport_height: u32,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            browser: Browser::Chromium,
            headless: true,
            viewport_width: 1280,
            viewport_height: 720,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    pub action_ms: u64,
    pub navigation_ms: u64,
    /// Quiet period before a reactive reading is trusted
    pub settle_ms: u64,
    pub poll_interval_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        let t = Timeouts::default();
        Self {
            action_ms: t.action.as_millis() as u64,
            navigation_ms: t.navigation.as_millis() as u64,
            settle_ms: t.settle.as_millis() as u64,
            poll_interval_ms: t.poll_interval.as_millis() as u64,
        }
    }
}

impl TimeoutConfig {
    pub fn to_timeouts(&self) -> Timeouts {
        Timeouts {
            action: Duration::from_millis(self.action_ms),
            navigation: Duration::from_millis(self.navigation_ms),
            settle: Duration::from_millis(self.settle_ms),
            poll_interval: Duration::from_millis(self.poll_interval_ms.max(1)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Scenarios allowed to run at the same time
    pub workers: usize,

    /// Where `test-results.json` is written
    pub output_dir: PathBuf,

    /// Extra YAML fixture sets; the built-in sets are used when unset
    pub fixtures_dir: Option<PathBuf>,

    /// Errors the negative cargo scenario expects for four negative values
    pub negative_expected_errors: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            workers: 2,
            output_dir: PathBuf::from("test-results"),
            fixtures_dir: None,
            negative_expected_errors: 1,
        }
    }
}

impl HarnessConfig {
    /// Load configuration from file; a missing file yields the defaults
    pub fn load(path: &Path) -> E2eResult<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = toml::from_str(&content)?;
            config.validate()?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> E2eResult<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| E2eError::Config(format!("cannot serialize config: {}", e)))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> E2eResult<()> {
        if self.run.workers == 0 {
            return Err(E2eError::Config("run.workers must be at least 1".to_string()));
        }
        if !self.app.base_url.starts_with("http://") && !self.app.base_url.starts_with("https://") {
            return Err(E2eError::Config(format!(
                "app.base_url must be an http(s) URL, got {:?}",
                self.app.base_url
            )));
        }
        let t = &self.timeouts;
        if t.settle_ms >= t.action_ms {
            return Err(E2eError::Config(
                "timeouts.settle_ms must be shorter than timeouts.action_ms".to_string(),
            ));
        }
        Ok(())
    }

    pub fn timeouts(&self) -> Timeouts {
        self.timeouts.to_timeouts()
    }

    pub fn playwright(&self) -> PlaywrightConfig {
        PlaywrightConfig {
            base_url: self.app.base_url.trim_end_matches('/').to_string(),
            browser: self.browser.browser,
            headless: self.browser.headless,
            viewport_width: self.browser.viewport_width,
            viewport_height: self.browser.viewport_height,
            action_timeout: Duration::from_millis(self.timeouts.action_ms),
            navigation_timeout: Duration::from_millis(self.timeouts.navigation_ms),
        }
    }

    pub fn preflight_timeout(&self) -> Duration {
        Duration::from_secs(self.app.preflight_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = HarnessConfig::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, HarnessConfig::default());
        assert_eq!(config.run.negative_expected_errors, 1);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("freightcheck.toml");
        std::fs::write(
            &path,
            r#"
[app]
base_url = "https://staging.example.com/"

[browser]
browser = "firefox"

[run]
workers = 4
"#,
        )
        .unwrap();

        let config = HarnessConfig::load(&path).unwrap();
        assert_eq!(config.run.workers, 4);
        assert_eq!(config.browser.browser, Browser::Firefox);
        assert!(config.browser.headless);
        assert_eq!(config.timeouts, TimeoutConfig::default());
        assert_eq!(config.playwright().base_url, "https://staging.example.com");
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("freightcheck.toml");
        let mut config = HarnessConfig::default();
        config.timeouts.settle_ms = 250;
        config.run.fixtures_dir = Some(PathBuf::from("fixtures"));
        config.save(&path).unwrap();
        assert_eq!(HarnessConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_rejects_zero_workers() {
        let mut config = HarnessConfig::default();
        config.run.workers = 0;
        assert!(matches!(config.validate(), Err(E2eError::Config(_))));
    }

    #[test]
    fn test_timeouts_conversion() {
        let config = TimeoutConfig {
            action_ms: 2000,
            navigation_ms: 3000,
            settle_ms: 100,
            poll_interval_ms: 0,
        };
        let t = config.to_timeouts();
        assert_eq!(t.action, Duration::from_secs(2));
        assert_eq!(t.settle, Duration::from_millis(100));
        assert_eq!(t.poll_interval, Duration::from_millis(1));
    }
}
