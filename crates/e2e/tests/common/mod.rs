//! Shared setup for the simulator-backed integration tests

#![allow(dead_code)]

use std::time::Duration;

use chrono::NaiveDate;
use freightcheck_common::Credentials;
use freightcheck_e2e::driver::{Page, Timeouts};
use freightcheck_e2e::scenario::ScenarioEnv;
use freightcheck_e2e::{session, SimConfig, SimWorld, Wizard};

pub fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
}

pub fn credentials() -> Credentials {
    Credentials::new("qa@example.com", "secret")
}

/// Short bounds; the simulator answers instantly
pub fn timeouts() -> Timeouts {
    Timeouts {
        action: Duration::from_secs(2),
        navigation: Duration::from_secs(2),
        settle: Duration::from_millis(20),
        poll_interval: Duration::from_millis(1),
    }
}

pub fn world_with(settle_reads: u32) -> SimWorld {
    SimWorld::new(SimConfig {
        today: today(),
        settle_reads,
        credentials: credentials(),
        ..Default::default()
    })
}

pub fn world() -> SimWorld {
    world_with(2)
}

pub fn env() -> ScenarioEnv {
    ScenarioEnv {
        credentials: credentials(),
        timeouts: timeouts(),
        today: today(),
    }
}

/// Logged-in page with the create form open
pub async fn create_form(world: &SimWorld) -> (Page, Wizard) {
    let mut page = session::bootstrap(world, timeouts(), &credentials()).await.unwrap();
    let wizard = Wizard::open(&mut page).await.unwrap();
    (page, wizard)
}
