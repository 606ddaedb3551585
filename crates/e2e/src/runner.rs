//! Scenario runner: fans scenarios out over isolated sessions and collects
//! the suite report

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, NaiveDate, Utc};
use freightcheck_common::Credentials;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::driver::{DriverFactory, Timeouts};
use crate::error::{E2eError, E2eResult};
use crate::scenario::{Scenario, ScenarioEnv, ScenarioResult};

/// Result of running all scenarios
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestSuiteResult {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub driver: String,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub duration_ms: u64,
    pub results: Vec<ScenarioResult>,
}

impl TestSuiteResult {
    pub fn all_passed(&self) -> bool {
        self.failed == 0
    }

    pub fn result(&self, name: &str) -> Option<&ScenarioResult> {
        self.results.iter().find(|r| r.name == name)
    }
}

/// Configuration for the runner
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub workers: usize,
    pub timeouts: Timeouts,
    pub credentials: Credentials,
    /// Defaults to the local date
    pub today: Option<NaiveDate>,
    pub output_dir: PathBuf,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            workers: 2,
            timeouts: Timeouts::default(),
            credentials: Credentials::new("", ""),
            today: None,
            output_dir: PathBuf::from("test-results"),
        }
    }
}

pub struct TestRunner {
    factory: Arc<dyn DriverFactory>,
    config: RunnerConfig,
}

impl TestRunner {
    pub fn new(factory: Arc<dyn DriverFactory>, config: RunnerConfig) -> Self {
        Self { factory, config }
    }

    fn env(&self) -> ScenarioEnv {
        ScenarioEnv {
            credentials: self.config.credentials.clone(),
            timeouts: self.config.timeouts,
            today: self
                .config
                .today
                .unwrap_or_else(|| chrono::Local::now().date_naive()),
        }
    }

    /// Run `scenarios`, at most `workers` at a time. Results come back in
    /// the order the scenarios were given.
    pub async fn run(&self, scenarios: Vec<Scenario>) -> E2eResult<TestSuiteResult> {
        if !self.config.credentials.is_complete() {
            return Err(E2eError::Config(
                "test credentials are not set (TEST_USER_EMAIL / TEST_USER_PASSWORD)".to_string(),
            ));
        }

        let start = Instant::now();
        let started_at = Utc::now();
        let run_id = Uuid::new_v4();
        let total = scenarios.len();
        let workers = self.config.workers.max(1);
        info!(%run_id, driver = self.factory.name(), workers, "Running {} scenario(s)...", total);

        let permits = Arc::new(Semaphore::new(workers));
        let env = Arc::new(self.env());
        let mut tasks = JoinSet::new();

        for (index, scenario) in scenarios.into_iter().enumerate() {
            let permits = permits.clone();
            let factory = self.factory.clone();
            let env = env.clone();
            tasks.spawn(async move {
                let result = match permits.acquire_owned().await {
                    Ok(_permit) => scenario.run(factory.as_ref(), &env).await,
                    Err(e) => ScenarioResult {
                        name: scenario.name.clone(),
                        success: false,
                        duration_ms: 0,
                        steps: Vec::new(),
                        error: Some(format!("worker pool closed: {}", e)),
                        assertion_failure: false,
                        cleanup_error: None,
                        request_id: None,
                    },
                };
                (index, result)
            });
        }

        let mut slots: Vec<Option<ScenarioResult>> = vec![None; total];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, result)) => {
                    report(&result);
                    slots[index] = Some(result);
                }
                // A panicking scenario loses its slot; counted below
                Err(e) => error!("Scenario task failed: {}", e),
            }
        }

        let results: Vec<ScenarioResult> = slots.into_iter().flatten().collect();
        let passed = results.iter().filter(|r| r.success).count();
        let failed = total - passed;
        let duration_ms = start.elapsed().as_millis() as u64;

        info!("");
        info!("Test Results: {} passed, {} failed ({} ms)", passed, failed, duration_ms);

        Ok(TestSuiteResult {
            run_id,
            started_at,
            driver: self.factory.name().to_string(),
            total,
            passed,
            failed,
            duration_ms,
            results,
        })
    }

    /// Write the suite report to `<output_dir>/test-results.json`
    pub fn write_results(&self, results: &TestSuiteResult) -> E2eResult<PathBuf> {
        write_results(&self.config.output_dir, results)
    }
}

fn report(result: &ScenarioResult) {
    if result.success {
        info!("✓ {} ({} ms)", result.name, result.duration_ms);
    } else {
        error!(
            "✗ {} - {}",
            result.name,
            result.error.as_deref().unwrap_or("unknown error")
        );
    }
    if let Some(cleanup) = &result.cleanup_error {
        warn!("  cleanup of {} failed: {}", result.name, cleanup);
    }
}

pub fn write_results(output_dir: &Path, results: &TestSuiteResult) -> E2eResult<PathBuf> {
    std::fs::create_dir_all(output_dir)?;

    let path = output_dir.join("test-results.json");
    let json = serde_json::to_string_pretty(results)?;
    std::fs::write(&path, json)?;

    info!("Results written to: {}", path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn suite() -> TestSuiteResult {
        TestSuiteResult {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            driver: "simulator".to_string(),
            total: 1,
            passed: 0,
            failed: 1,
            duration_ms: 12,
            results: vec![ScenarioResult {
                name: "date-order".to_string(),
                success: false,
                duration_ms: 12,
                steps: Vec::new(),
                error: Some("Validation mismatch".to_string()),
                assertion_failure: true,
                cleanup_error: None,
                request_id: None,
            }],
        }
    }

    #[test]
    fn test_write_results() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("reports");
        let path = write_results(&out, &suite()).unwrap();
        assert!(path.ends_with("test-results.json"));

        let back: TestSuiteResult =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert!(!back.all_passed());
        assert!(back.result("date-order").unwrap().assertion_failure);
    }

    #[tokio::test]
    async fn test_missing_credentials_rejected() {
        let world = crate::sim::SimWorld::new(Default::default());
        let runner = TestRunner::new(Arc::new(world), RunnerConfig::default());
        let err = runner.run(Vec::new()).await.unwrap_err();
        assert!(matches!(err, E2eError::Config(_)));
    }
}
