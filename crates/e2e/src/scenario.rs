//! Scenario orchestration
//!
//! A scenario is one named workflow against a fresh session: log in, open
//! the create form, run its steps, then clean up whatever it left behind.
//! Steps are shared, parameterized building blocks (compose a route, fill
//! cargo, choose a carrier) rather than per-scenario copies.

use std::future::Future;
use std::time::Instant;

use chrono::{Datelike, Months, NaiveDate};
use freightcheck_common::{
    CargoDetails, CarrierSelection, Credentials, WaypointField, WaypointRecord, WaypointRole,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::driver::{DriverFactory, Page, Probe, Timeouts, WaitState};
use crate::error::{E2eError, E2eResult};
use crate::fields::{AutocompleteField, DatePicker, Field, NumericField, OptionalText, TextField};
use crate::fixtures::FixtureSet;
use crate::lifecycle::{self, SubmittedRequest};
use crate::observer::{self, Control, DATE_ORDER, EMAIL_FORMAT, NON_NEGATIVE, REQUIRED};
use crate::selectors;
use crate::session;
use crate::waypoint::WaypointComposer;
use crate::wizard::{Progression, Wizard, WizardStage, WizardTab};

/// Address the email scenario types before correcting it
pub const MALFORMED_EMAIL: &str = "invalid-email";
pub const CORRECTED_EMAIL: &str = "dispatch@example.com";

/// What a scenario exercises
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScenarioKind {
    /// Compose, submit, check the detail view, delete
    HappyPath,
    RequiredFields,
    EmailFormat,
    DateOrder,
    /// `-1` in every numeric cargo field; the form is known to flag fewer
    /// than all four, so the expected count is a parameter
    NegativeCargo { expected_errors: usize },
    ProgressionControl,
    DiscardChanges,
}

impl ScenarioKind {
    pub fn slug(&self) -> &'static str {
        match self {
            ScenarioKind::HappyPath => "happy-path",
            ScenarioKind::RequiredFields => "required-fields",
            ScenarioKind::EmailFormat => "email-format",
            ScenarioKind::DateOrder => "date-order",
            ScenarioKind::NegativeCargo { .. } => "negative-cargo",
            ScenarioKind::ProgressionControl => "progression-control",
            ScenarioKind::DiscardChanges => "discard-changes",
        }
    }

    fn default_tags(&self) -> &'static [&'static str] {
        match self {
            ScenarioKind::HappyPath => &["e2e"],
            ScenarioKind::DiscardChanges => &["navigation"],
            _ => &["validation"],
        }
    }
}

/// Outcome of one step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    pub step_name: String,
    pub success: bool,
    pub duration_ms: u64,
    pub error: Option<String>,
}

/// Ordered record of the steps a scenario ran
#[derive(Debug, Default)]
pub struct StepLog {
    steps: Vec<StepResult>,
}

impl StepLog {
    /// Await `step`, recording its name, duration and outcome
    pub async fn run<T, F>(&mut self, name: &str, step: F) -> E2eResult<T>
    where
        F: Future<Output = E2eResult<T>>,
    {
        let start = Instant::now();
        debug!(step = name, "Executing step");
        let result = step.await;
        self.steps.push(StepResult {
            step_name: name.to_string(),
            success: result.is_ok(),
            duration_ms: start.elapsed().as_millis() as u64,
            error: result.as_ref().err().map(|e| e.to_string()),
        });
        result
    }

    pub fn steps(&self) -> &[StepResult] {
        &self.steps
    }

    fn into_steps(self) -> Vec<StepResult> {
        self.steps
    }
}

/// Result of running a single scenario
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub name: String,
    pub success: bool,
    pub duration_ms: u64,
    pub steps: Vec<StepResult>,
    pub error: Option<String>,
    /// The application misbehaved, as opposed to the harness failing
    #[serde(default)]
    pub assertion_failure: bool,
    /// Cleanup trouble; never turns a passing scenario into a failure
    pub cleanup_error: Option<String>,
    pub request_id: Option<u64>,
}

/// Everything a scenario needs from the run
#[derive(Debug, Clone)]
pub struct ScenarioEnv {
    pub credentials: Credentials,
    pub timeouts: Timeouts,
    /// Date the calendars open on
    pub today: NaiveDate,
}

/// Per-scenario state. Owned by exactly one scenario and dropped with it.
pub struct ScenarioContext {
    pub page: Page,
    pub wizard: Wizard,
    pub composer: WaypointComposer,
    pub today: NaiveDate,
    pub submitted: Option<SubmittedRequest>,
    pub log: StepLog,
}

impl ScenarioContext {
    /// Best effort: delete a request this scenario created, or leave an
    /// open form through the discard dialog
    pub async fn cleanup(&mut self) -> E2eResult<()> {
        match (self.wizard.stage(), &self.submitted) {
            (WizardStage::Submitted, Some(req)) => {
                info!(id = req.id, "Cleanup: deleting request");
                lifecycle::delete_by_id(&mut self.page, req.id).await
            }
            (WizardStage::Editing(_), _) => {
                // A failed step may leave a calendar or suggestion list open
                let calendar = self.page.count(&selectors::calendar()).await?;
                let suggestions = self.page.count(&selectors::suggestion_list()).await?;
                if calendar + suggestions > 0 {
                    self.page.press(&selectors::requests_link(), "Escape").await?;
                }
                self.wizard.discard(&mut self.page).await
            }
            _ => Ok(()),
        }
    }
}

/// A named scenario with its fixture data
#[derive(Debug, Clone)]
pub struct Scenario {
    pub name: String,
    pub kind: ScenarioKind,
    pub tags: Vec<String>,
    pub fixtures: FixtureSet,
}

impl Scenario {
    pub fn new(kind: ScenarioKind, fixtures: FixtureSet) -> Self {
        let mut tags: Vec<String> = kind.default_tags().iter().map(|t| t.to_string()).collect();
        let name = match kind {
            ScenarioKind::HappyPath => {
                tags.extend(fixtures.tags.iter().cloned());
                format!("{}/{}", kind.slug(), fixtures.name)
            }
            _ => kind.slug().to_string(),
        };
        Self {
            name,
            kind,
            tags,
            fixtures,
        }
    }

    /// One happy path per fixture set plus every validation scenario,
    /// which run on the first set
    pub fn catalog(sets: &[FixtureSet], negative_expected_errors: usize) -> Vec<Scenario> {
        let base = sets.first().cloned().unwrap_or_else(FixtureSet::minimal);
        let mut out: Vec<Scenario> = sets
            .iter()
            .map(|s| Scenario::new(ScenarioKind::HappyPath, s.clone()))
            .collect();
        for kind in [
            ScenarioKind::RequiredFields,
            ScenarioKind::EmailFormat,
            ScenarioKind::DateOrder,
            ScenarioKind::NegativeCargo {
                expected_errors: negative_expected_errors,
            },
            ScenarioKind::ProgressionControl,
            ScenarioKind::DiscardChanges,
        ] {
            out.push(Scenario::new(kind, base.clone()));
        }
        out
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    /// Set up a session, run the steps, clean up
    pub async fn run(&self, factory: &dyn DriverFactory, env: &ScenarioEnv) -> ScenarioResult {
        let start = Instant::now();
        let mut log = StepLog::default();
        info!(scenario = %self.name, driver = factory.name(), "Starting scenario");

        let mut page = match log
            .run("log in", session::bootstrap(factory, env.timeouts, &env.credentials))
            .await
        {
            Ok(page) => page,
            Err(e) => return self.finish(start, log, Err(e), None, None),
        };

        let wizard = match log.run("open create form", Wizard::open(&mut page)).await {
            Ok(wizard) => wizard,
            Err(e) => {
                if let Err(close) = page.close().await {
                    debug!("Closing session failed: {}", close);
                }
                return self.finish(start, log, Err(e), None, None);
            }
        };

        let mut ctx = ScenarioContext {
            page,
            wizard,
            composer: WaypointComposer::new(env.today),
            today: env.today,
            submitted: None,
            log,
        };

        let outcome = self.execute(&mut ctx).await;
        let cleanup_error = match ctx.cleanup().await {
            Ok(()) => None,
            Err(e) => {
                warn!(scenario = %self.name, "Cleanup failed: {}", e);
                Some(e.to_string())
            }
        };
        if let Err(e) = ctx.page.close().await {
            debug!("Closing session failed: {}", e);
        }

        let request_id = ctx.submitted.as_ref().map(|r| r.id);
        self.finish(start, ctx.log, outcome, cleanup_error, request_id)
    }

    fn finish(
        &self,
        start: Instant,
        log: StepLog,
        outcome: E2eResult<()>,
        cleanup_error: Option<String>,
        request_id: Option<u64>,
    ) -> ScenarioResult {
        let (error, assertion_failure) = match &outcome {
            Ok(()) => (None, false),
            Err(e) => (Some(e.to_string()), e.is_assertion()),
        };
        ScenarioResult {
            name: self.name.clone(),
            success: outcome.is_ok(),
            duration_ms: start.elapsed().as_millis() as u64,
            steps: log.into_steps(),
            error,
            assertion_failure,
            cleanup_error,
            request_id,
        }
    }

    pub async fn execute(&self, ctx: &mut ScenarioContext) -> E2eResult<()> {
        match self.kind {
            ScenarioKind::HappyPath => happy_path(ctx, &self.fixtures).await,
            ScenarioKind::RequiredFields => required_fields(ctx, &self.fixtures).await,
            ScenarioKind::EmailFormat => email_format(ctx, &self.fixtures).await,
            ScenarioKind::DateOrder => date_order(ctx, &self.fixtures).await,
            ScenarioKind::NegativeCargo { expected_errors } => {
                negative_cargo(ctx, &self.fixtures, expected_errors).await
            }
            ScenarioKind::ProgressionControl => progression_control(ctx, &self.fixtures).await,
            ScenarioKind::DiscardChanges => discard_changes(ctx, &self.fixtures).await,
        }
    }
}

// ---- shared steps ----

/// Write `records` into the waypoint tab. Intermediate sections are added
/// first, since each one is inserted in front of the delivery section.
pub async fn compose_route(
    page: &mut Page,
    composer: &WaypointComposer,
    records: &[WaypointRecord],
) -> E2eResult<()> {
    let intermediates = records
        .iter()
        .filter(|r| r.role == WaypointRole::Intermediate)
        .count();
    for _ in 0..intermediates {
        composer.add_intermediate(page).await?;
    }
    for (index, record) in records.iter().enumerate() {
        composer.compose(page, index, record).await?;
    }
    Ok(())
}

pub async fn verify_route(
    page: &mut Page,
    composer: &WaypointComposer,
    records: &[WaypointRecord],
) -> E2eResult<()> {
    for (index, record) in records.iter().enumerate() {
        composer.verify(page, index, record).await?;
    }
    Ok(())
}

/// Fill the cargo tab; numeric values go through the spinner adapter
pub async fn fill_cargo(page: &mut Page, cargo: &CargoDetails) -> E2eResult<()> {
    for (field, value) in cargo.entries() {
        let locator = selectors::cargo_field(field);
        if field.is_numeric() {
            NumericField::new(locator).set(page, &value.to_string()).await?;
        } else {
            TextField::new(locator).set(page, &value.to_string()).await?;
        }
    }
    Ok(())
}

/// Tick the carrier by clicking its label in the carrier group
pub async fn choose_carrier(page: &mut Page, carrier: &CarrierSelection) -> E2eResult<()> {
    let checkbox = selectors::carrier_checkbox(carrier.carrier_id);
    page.wait_for(&checkbox, WaitState::Visible).await?;
    if page.settle(Probe::Checked(&checkbox)).await?.as_flag() {
        return Ok(());
    }
    page.click(&selectors::carrier_label(&carrier.chosen_via_group_label))
        .await?;
    page.wait_for_checked(&checkbox, true).await
}

fn expect_blocked(outcome: Option<Progression>, what: &str) -> E2eResult<usize> {
    match outcome {
        Some(Progression::Blocked { errors }) => Ok(errors),
        Some(Progression::Advanced(tab)) => Err(E2eError::mismatch(
            format!("progression with {}", what),
            "blocked",
            format!("advanced to {}", tab),
        )),
        None => Ok(0),
    }
}

/// First day of the month after `today`; both calendars can reach it
fn next_month(today: NaiveDate) -> E2eResult<NaiveDate> {
    today
        .with_day(1)
        .and_then(|d| d.checked_add_months(Months::new(1)))
        .ok_or_else(|| E2eError::Fixture(format!("no month after {}", today)))
}

fn day_of(month: NaiveDate, day: u32) -> E2eResult<NaiveDate> {
    month
        .with_day(day)
        .ok_or_else(|| E2eError::Fixture(format!("day {} in {}", day, month.format("%B %Y"))))
}

// ---- scenarios ----

async fn happy_path(ctx: &mut ScenarioContext, fixtures: &FixtureSet) -> E2eResult<()> {
    let ScenarioContext {
        page,
        wizard,
        composer,
        today,
        submitted,
        log,
    } = ctx;
    let records = fixtures.waypoints(*today);

    log.run("compose waypoints", compose_route(page, composer, &records))
        .await?;
    log.run("verify waypoints", verify_route(page, composer, &records))
        .await?;
    log.run("continue to cargo", wizard.advance(page)).await?;
    log.run("fill cargo", fill_cargo(page, &fixtures.cargo)).await?;
    log.run("continue to carriers", wizard.advance(page)).await?;
    log.run("choose carrier", choose_carrier(page, &fixtures.carrier))
        .await?;
    log.run("continue to review", wizard.advance(page)).await?;

    let request = log.run("send request", lifecycle::submit(page, wizard)).await?;
    *submitted = Some(request.clone());

    if let Some(description) = &fixtures.cargo.description {
        log.run("verify detail view", lifecycle::verify_detail(page, description))
            .await?;
    }
    log.run("delete request", lifecycle::delete(page, wizard, &request))
        .await
}

async fn required_fields(ctx: &mut ScenarioContext, fixtures: &FixtureSet) -> E2eResult<()> {
    let ScenarioContext { page, wizard, log, .. } = ctx;

    let outcome = log
        .run("continue with empty waypoints", wizard.attempt_continue(page))
        .await?;
    expect_blocked(Some(outcome), "empty waypoints")?;
    log.run("four required errors", observer::expect_rule_count(page, &REQUIRED, 4))
        .await?;

    let pickup = &fixtures.pickup;
    log.run("fill pickup city and country", async {
        TextField::new(selectors::waypoint_field(0, WaypointField::City))
            .set(page, &pickup.city)
            .await?;
        AutocompleteField::new(selectors::waypoint_field(0, WaypointField::Country), true)
            .set_and_confirm(page, &pickup.country)
            .await
            .map(|_| ())
    })
    .await?;
    log.run("two required errors remain", observer::expect_rule_count(page, &REQUIRED, 2))
        .await
}

async fn email_format(ctx: &mut ScenarioContext, fixtures: &FixtureSet) -> E2eResult<()> {
    let ScenarioContext {
        page,
        wizard,
        composer,
        today,
        log,
        ..
    } = ctx;

    let mut records = fixtures.waypoints(*today);
    records[0].contact_email = Some(MALFORMED_EMAIL.to_string());
    log.run("compose route with malformed email", compose_route(page, composer, &records))
        .await?;

    let outcome = log
        .run("continue", observer::provoke(page, wizard, &EMAIL_FORMAT))
        .await?;
    expect_blocked(outcome, "a malformed email")?;
    log.run("one email error", observer::expect_rule_count(page, &EMAIL_FORMAT, 1))
        .await?;

    let corrected = Some(
        fixtures
            .pickup
            .contact_email
            .clone()
            .unwrap_or_else(|| CORRECTED_EMAIL.to_string()),
    );
    log.run(
        "correct the email",
        OptionalText::new(selectors::waypoint_field(0, WaypointField::ContactEmail)).set(page, &corrected),
    )
    .await?;
    log.run("email error cleared", observer::expect_rule_count(page, &EMAIL_FORMAT, 0))
        .await?;
    log.run("continue after correction", wizard.advance(page))
        .await
        .map(|_| ())
}

async fn date_order(ctx: &mut ScenarioContext, fixtures: &FixtureSet) -> E2eResult<()> {
    let ScenarioContext {
        page,
        wizard,
        composer,
        today,
        log,
        ..
    } = ctx;

    let month = next_month(*today)?;
    let (pickup_day, early, late) = (day_of(month, 16)?, day_of(month, 15)?, day_of(month, 17)?);
    let records = [
        fixtures
            .pickup
            .to_record(WaypointRole::Pickup, 0, *today)
            .with_window(pickup_day, pickup_day),
        fixtures
            .delivery
            .to_record(WaypointRole::Delivery, 1, *today)
            .with_window(early, early),
    ];
    log.run("compose delivery before pickup", compose_route(page, composer, &records))
        .await?;

    let outcome = log
        .run("continue", observer::provoke(page, wizard, &DATE_ORDER))
        .await?;
    expect_blocked(outcome, "delivery before pickup")?;
    log.run("date order error shown", observer::expect_rule_count(page, &DATE_ORDER, 1))
        .await?;

    log.run(
        "move delivery after pickup",
        DatePicker::new(selectors::earliest_picker(1), *today).set(page, &late),
    )
    .await?;
    log.run("date order error cleared", observer::expect_rule_count(page, &DATE_ORDER, 0))
        .await
}

async fn negative_cargo(
    ctx: &mut ScenarioContext,
    fixtures: &FixtureSet,
    expected_errors: usize,
) -> E2eResult<()> {
    let ScenarioContext {
        page,
        wizard,
        composer,
        today,
        log,
        ..
    } = ctx;

    let records = fixtures.waypoints(*today);
    log.run("compose waypoints", compose_route(page, composer, &records))
        .await?;
    log.run("continue to cargo", wizard.advance(page)).await?;

    let cargo = CargoDetails::uniform_numeric("-1");
    let negative = cargo.negative_fields();
    info!(
        entered = negative.len(),
        expected_errors, "Negative cargo values entered"
    );
    log.run("fill negative cargo", fill_cargo(page, &cargo)).await?;

    let outcome = log
        .run("continue", observer::provoke(page, wizard, &NON_NEGATIVE))
        .await?;
    if expected_errors > 0 {
        expect_blocked(outcome, "negative cargo values")?;
    }
    log.run(
        "non-negative errors",
        observer::expect_rule_count(page, &NON_NEGATIVE, expected_errors),
    )
    .await
}

async fn progression_control(ctx: &mut ScenarioContext, fixtures: &FixtureSet) -> E2eResult<()> {
    let ScenarioContext {
        page,
        wizard,
        composer,
        today,
        log,
        ..
    } = ctx;

    log.run(
        "continue starts enabled",
        observer::expect_control_enabled(page, Control::Continue, true),
    )
    .await?;

    let first = log
        .run("continue with empty waypoints", wizard.attempt_continue(page))
        .await?;
    let first_errors = expect_blocked(Some(first), "empty waypoints")?;
    log.run(
        "continue disabled after attempt",
        observer::expect_control_enabled(page, Control::Continue, false),
    )
    .await?;

    for attempt in 2..=3 {
        let again = log
            .run(&format!("continue again (attempt {})", attempt), wizard.attempt_continue(page))
            .await?;
        let errors = expect_blocked(Some(again), "empty waypoints")?;
        if errors != first_errors {
            return Err(E2eError::mismatch(
                format!("field errors after attempt {}", attempt),
                first_errors,
                errors,
            ));
        }
    }
    log.run(
        "continue still disabled",
        observer::expect_control_enabled(page, Control::Continue, false),
    )
    .await?;

    let records = fixtures.waypoints(*today);
    log.run("fill required fields", compose_route(page, composer, &records))
        .await?;
    log.run(
        "continue enabled again",
        observer::expect_control_enabled(page, Control::Continue, true),
    )
    .await?;
    let tab = log.run("continue to cargo", wizard.advance(page)).await?;
    if tab != WizardTab::CargoInfo {
        return Err(E2eError::mismatch("tab after continue", WizardTab::CargoInfo, tab));
    }
    Ok(())
}

async fn discard_changes(ctx: &mut ScenarioContext, fixtures: &FixtureSet) -> E2eResult<()> {
    let ScenarioContext { page, wizard, log, .. } = ctx;

    log.run(
        "type a pickup city",
        TextField::new(selectors::waypoint_field(0, WaypointField::City)).set(page, &fixtures.pickup.city),
    )
    .await?;
    log.run("discard through navigation", wizard.discard(page)).await?;

    *wizard = log.run("reopen create form", Wizard::open(page)).await?;
    let city = log
        .run(
            "form starts empty",
            TextField::new(selectors::waypoint_field(0, WaypointField::City)).read(page),
        )
        .await?;
    if !city.is_empty() {
        return Err(E2eError::mismatch("pickup city after discard", "\"\"", format!("{:?}", city)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use freightcheck_common::CargoField;

    #[test]
    fn test_catalog() {
        let sets = vec![FixtureSet::minimal(), FixtureSet::realistic()];
        let catalog = Scenario::catalog(&sets, 1);
        let names: Vec<_> = catalog.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "happy-path/minimal",
                "happy-path/realistic",
                "required-fields",
                "email-format",
                "date-order",
                "negative-cargo",
                "progression-control",
                "discard-changes",
            ]
        );
        assert!(catalog[0].has_tag("smoke"));
        assert!(catalog[0].has_tag("e2e"));
        assert!(catalog[2].has_tag("validation"));
        assert!(catalog
            .iter()
            .any(|s| s.kind == ScenarioKind::NegativeCargo { expected_errors: 1 }));
    }

    #[test]
    fn test_empty_catalog_falls_back_to_minimal() {
        let catalog = Scenario::catalog(&[], 2);
        assert!(catalog.iter().all(|s| s.kind != ScenarioKind::HappyPath));
        assert_eq!(catalog[0].fixtures.name, "minimal");
    }

    #[test]
    fn test_expect_blocked() {
        assert_eq!(expect_blocked(Some(Progression::Blocked { errors: 3 }), "x").unwrap(), 3);
        let err = expect_blocked(Some(Progression::Advanced(WizardTab::CargoInfo)), "x").unwrap_err();
        assert!(err.is_assertion());
    }

    #[test]
    fn test_date_order_days_are_reachable() {
        for today in [
            NaiveDate::from_ymd_opt(2026, 10, 19).unwrap(),
            NaiveDate::from_ymd_opt(2026, 12, 31).unwrap(),
            NaiveDate::from_ymd_opt(2027, 1, 30).unwrap(),
        ] {
            // One forward step from the month an empty picker opens on
            let month = next_month(today).unwrap();
            for day in [15, 16, 17] {
                let date = day_of(month, day).unwrap();
                assert_eq!(date.month(), today.month() % 12 + 1);
                assert!(date > today);
            }
        }
    }

    #[tokio::test]
    async fn test_step_log_records_failures() {
        let mut log = StepLog::default();
        log.run("ok", async { Ok::<_, E2eError>(()) }).await.unwrap();
        let err = log
            .run("bad", async { Err::<(), _>(E2eError::Driver("boom".into())) })
            .await;
        assert!(err.is_err());
        assert_eq!(log.steps().len(), 2);
        assert!(log.steps()[0].success);
        assert_eq!(log.steps()[1].error.as_deref(), Some("Driver error: boom"));
    }

    #[test]
    fn test_cargo_field_order() {
        let cargo = CargoDetails::uniform_numeric("-1");
        let fields: Vec<_> = cargo.entries().into_iter().map(|(f, _)| f).collect();
        assert_eq!(
            fields,
            vec![CargoField::Value, CargoField::Weight, CargoField::Volume, CargoField::Length]
        );
    }
}
