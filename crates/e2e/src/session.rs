//! Session bootstrap: one authenticated page per scenario

use freightcheck_common::Credentials;
use tracing::{debug, info};

use crate::driver::{DriverFactory, Page, Timeouts, WaitState};
use crate::error::{E2eError, E2eResult};
use crate::selectors;
use crate::wizard::route;

/// Launch an isolated session and log in. The page comes back on the
/// request list.
pub async fn bootstrap(
    factory: &dyn DriverFactory,
    timeouts: Timeouts,
    credentials: &Credentials,
) -> E2eResult<Page> {
    let driver = factory.launch().await?;
    let mut page = Page::new(driver, timeouts);
    if let Err(e) = login(&mut page, credentials).await {
        if let Err(close) = page.close().await {
            debug!("Closing session failed: {}", close);
        }
        return Err(e);
    }
    Ok(page)
}

/// Log in through the login form
pub async fn login(page: &mut Page, credentials: &Credentials) -> E2eResult<()> {
    if !credentials.is_complete() {
        return Err(E2eError::Config(
            "test credentials are not set (TEST_USER_EMAIL / TEST_USER_PASSWORD)".to_string(),
        ));
    }

    page.goto(selectors::LOGIN_PATH).await?;
    let email = selectors::login_email();
    page.wait_for(&email, WaitState::Visible).await?;
    page.fill(&email, credentials.identifier()).await?;
    page.fill(&selectors::login_password(), credentials.secret())
        .await?;
    page.click(&selectors::login_button()).await?;

    let list = route(&format!("^{}$", regex::escape(selectors::LIST_PATH)))?;
    page.wait_for_path(&list).await?;
    info!("Session established");
    Ok(())
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::driver::{Driver, Locator};
    use crate::sim::{SimConfig, SimDriver, SimWorld};

    /// Simulator session whose browser refuses to close
    struct StuckClose(SimDriver);

    #[async_trait]
    impl Driver for StuckClose {
        async fn goto(&mut self, path: &str) -> E2eResult<()> {
            self.0.goto(path).await
        }
        async fn click(&mut self, locator: &Locator) -> E2eResult<()> {
            self.0.click(locator).await
        }
        async fn fill(&mut self, locator: &Locator, value: &str) -> E2eResult<()> {
            self.0.fill(locator, value).await
        }
        async fn press(&mut self, locator: &Locator, key: &str) -> E2eResult<()> {
            self.0.press(locator, key).await
        }
        async fn set_checked(&mut self, locator: &Locator, checked: bool) -> E2eResult<()> {
            self.0.set_checked(locator, checked).await
        }
        async fn is_checked(&mut self, locator: &Locator) -> E2eResult<bool> {
            self.0.is_checked(locator).await
        }
        async fn count(&mut self, locator: &Locator) -> E2eResult<usize> {
            self.0.count(locator).await
        }
        async fn is_visible(&mut self, locator: &Locator) -> E2eResult<bool> {
            self.0.is_visible(locator).await
        }
        async fn is_enabled(&mut self, locator: &Locator) -> E2eResult<bool> {
            self.0.is_enabled(locator).await
        }
        async fn input_value(&mut self, locator: &Locator) -> E2eResult<String> {
            self.0.input_value(locator).await
        }
        async fn attribute(&mut self, locator: &Locator, name: &str) -> E2eResult<Option<String>> {
            self.0.attribute(locator, name).await
        }
        async fn current_path(&mut self) -> E2eResult<String> {
            self.0.current_path().await
        }
        async fn close(&mut self) -> E2eResult<()> {
            Err(E2eError::Driver("browser already gone".to_string()))
        }
    }

    struct StuckFactory(SimWorld);

    #[async_trait]
    impl DriverFactory for StuckFactory {
        async fn launch(&self) -> E2eResult<Box<dyn Driver>> {
            Ok(Box::new(StuckClose(self.0.session())))
        }
        fn name(&self) -> &str {
            "stuck"
        }
    }

    fn factory() -> StuckFactory {
        StuckFactory(SimWorld::new(SimConfig {
            today: chrono::NaiveDate::from_ymd_opt(2026, 10, 19).unwrap(),
            settle_reads: 0,
            ..Default::default()
        }))
    }

    fn timeouts() -> Timeouts {
        Timeouts {
            action: std::time::Duration::from_millis(300),
            navigation: std::time::Duration::from_millis(300),
            settle: std::time::Duration::from_millis(5),
            poll_interval: std::time::Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn test_login_error_survives_failed_close() {
        let creds = Credentials::new("qa@example.com", "wrong");
        let err = bootstrap(&factory(), timeouts(), &creds).await.unwrap_err();
        assert!(matches!(err, E2eError::NavigationMismatch { .. }), "{err}");
    }

    #[tokio::test]
    async fn test_bootstrap_lands_on_list() {
        let creds = Credentials::new("qa@example.com", "secret");
        let mut page = bootstrap(&factory(), timeouts(), &creds).await.unwrap();
        assert_eq!(page.current_path().await.unwrap(), selectors::LIST_PATH);
        assert!(page.close().await.is_err());
    }
}
