//! freightcheck acceptance harness
//!
//! Drives the "create transport request" wizard of the logistics web
//! application through a browser and checks what it shows:
//! - logs a test identity in and opens the create form
//! - fills waypoints, cargo and carrier tabs through typed field adapters
//! - observes reactive validation (error counts, Continue enablement)
//! - submits, checks the detail view and deletes the request again
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  TestRunner (JoinSet + Semaphore)           │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Scenario                                                   │
//! │    ├── session::bootstrap() -> Page                         │
//! │    ├── Wizard::open / attempt_continue / advance / discard  │
//! │    ├── WaypointComposer -> fields::{DatePicker, ...}        │
//! │    ├── observer::expect_rule_count / expect_control_enabled │
//! │    └── lifecycle::submit / verify_detail / delete           │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Page (timeouts, poll, settle)                              │
//! │    └── dyn Driver                                           │
//! │          ├── PlaywrightDriver (node bridge, JSON lines)     │
//! │          └── SimDriver (in-process model of the app)        │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod driver;
pub mod error;
pub mod fields;
pub mod fixtures;
pub mod lifecycle;
pub mod observer;
pub mod preflight;
pub mod runner;
pub mod scenario;
pub mod selectors;
pub mod session;
pub mod sim;
pub mod waypoint;
pub mod wizard;

pub use config::HarnessConfig;
pub use driver::{Driver, DriverFactory, Locator, Page, Timeouts};
pub use error::{E2eError, E2eResult};
pub use fixtures::FixtureSet;
pub use runner::{RunnerConfig, TestRunner, TestSuiteResult};
pub use scenario::{Scenario, ScenarioKind, ScenarioResult};
pub use sim::{SimConfig, SimWorld};
pub use wizard::{Wizard, WizardStage, WizardTab};
