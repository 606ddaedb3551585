//! Error types for the acceptance harness

use thiserror::Error;

#[derive(Error, Debug)]
pub enum E2eError {
    #[error("Locator failed: {locator} - {reason}")]
    Locator { locator: String, reason: String },

    #[error("Validation mismatch on {what}: expected {expected}, got {actual}")]
    ValidationMismatch {
        what: String,
        expected: String,
        actual: String,
    },

    #[error("Navigation mismatch: expected route {expected}, got {actual}")]
    NavigationMismatch { expected: String, actual: String },

    #[error("Timeout after {waited_ms} ms waiting for: {what}")]
    Timeout { what: String, waited_ms: u64 },

    #[error("Invalid wizard transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Playwright not found. Install with: npx playwright install")]
    PlaywrightNotFound,

    #[error("Driver error: {0}")]
    Driver(String),

    #[error("Fixture error: {0}")]
    Fixture(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Application unreachable at {url} after {attempts} attempts")]
    AppUnreachable { url: String, attempts: usize },

    #[error("Fixture data: {0}")]
    Model(#[from] freightcheck_common::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl E2eError {
    pub fn locator(locator: impl std::fmt::Display, reason: impl Into<String>) -> Self {
        E2eError::Locator {
            locator: locator.to_string(),
            reason: reason.into(),
        }
    }

    pub fn mismatch(
        what: impl Into<String>,
        expected: impl std::fmt::Display,
        actual: impl std::fmt::Display,
    ) -> Self {
        E2eError::ValidationMismatch {
            what: what.into(),
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }

    /// Failures of the application under test, as opposed to harness or
    /// environment trouble.
    pub fn is_assertion(&self) -> bool {
        matches!(
            self,
            E2eError::ValidationMismatch { .. } | E2eError::NavigationMismatch { .. }
        )
    }
}

pub type E2eResult<T> = Result<T, E2eError>;
