//! Reachability preflight: fail fast when the application is down instead
//! of letting every scenario time out on the login page

use std::time::{Duration, Instant};

use tokio::time::sleep;
use tracing::{info, warn};

use crate::error::{E2eError, E2eResult};
use crate::selectors;

/// Poll `<base_url>/login` until it answers with a success status
pub async fn wait_for_app(base_url: &str, timeout: Duration) -> E2eResult<()> {
    let url = login_url(base_url);
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(2))
        .build()?;

    let start = Instant::now();
    let mut attempts = 0;

    loop {
        attempts += 1;

        match client.get(&url).send().await {
            Ok(resp) if resp.status().is_success() => {
                info!(%url, attempts, "Application reachable");
                return Ok(());
            }
            Ok(resp) => {
                warn!("Preflight returned {}", resp.status());
            }
            Err(e) => {
                if attempts == 1 {
                    info!("Waiting for application at {}...", url);
                }
                if !e.is_connect() && !e.is_timeout() {
                    warn!("Preflight error: {}", e);
                }
            }
        }

        if start.elapsed() >= timeout {
            return Err(E2eError::AppUnreachable { url, attempts });
        }
        sleep(Duration::from_millis(250)).await;
    }
}

fn login_url(base_url: &str) -> String {
    format!("{}{}", base_url.trim_end_matches('/'), selectors::LOGIN_PATH)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_url() {
        assert_eq!(login_url("http://127.0.0.1:3000"), "http://127.0.0.1:3000/login");
        assert_eq!(login_url("https://qa.example.com/"), "https://qa.example.com/login");
    }

    #[tokio::test]
    async fn test_unreachable_app() {
        // Port 9 (discard) is closed on any sane test machine
        let err = wait_for_app("http://127.0.0.1:9", Duration::from_millis(300))
            .await
            .unwrap_err();
        match err {
            E2eError::AppUnreachable { url, attempts } => {
                assert_eq!(url, "http://127.0.0.1:9/login");
                assert!(attempts >= 1);
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
