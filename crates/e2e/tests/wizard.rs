//! Wizard state machine, validation observer and request lifecycle

mod common;

use freightcheck_common::CarrierSelection;
use freightcheck_e2e::observer::{self, Control};
use freightcheck_e2e::scenario::{choose_carrier, compose_route, fill_cargo};
use freightcheck_e2e::waypoint::WaypointComposer;
use freightcheck_e2e::wizard::Progression;
use freightcheck_e2e::{lifecycle, selectors, E2eError, FixtureSet, Page, Wizard, WizardStage, WizardTab};

async fn route_filled(world: &freightcheck_e2e::SimWorld) -> (Page, Wizard, FixtureSet) {
    let (mut page, wizard) = common::create_form(world).await;
    let fixtures = FixtureSet::minimal();
    let composer = WaypointComposer::new(common::today());
    compose_route(&mut page, &composer, &fixtures.waypoints(common::today()))
        .await
        .unwrap();
    (page, wizard, fixtures)
}

#[tokio::test]
async fn open_starts_on_waypoints() {
    let world = common::world();
    let (mut page, mut wizard) = common::create_form(&world).await;

    assert_eq!(wizard.stage(), WizardStage::Editing(WizardTab::Waypoints));
    let state = wizard.refresh(&mut page).await.unwrap().clone();
    assert_eq!(state.field_error_count, 0);
    assert!(state.progression_enabled);
    assert!(state.tabs[0].is_visited);
    assert!(!state.tabs[1].is_visited);
}

#[tokio::test]
async fn empty_waypoints_block_with_required_errors() {
    let world = common::world();
    let (mut page, mut wizard) = common::create_form(&world).await;

    let outcome = wizard.attempt_continue(&mut page).await.unwrap();

    assert_eq!(outcome, Progression::Blocked { errors: 4 });
    assert_eq!(wizard.active_tab(), Some(WizardTab::Waypoints));
    assert!(!wizard.state().tabs[0].is_valid);
    assert!(!wizard.state().progression_enabled);
    observer::expect_rule_count(&mut page, &observer::REQUIRED, 4).await.unwrap();
}

#[tokio::test]
async fn disabled_continue_is_not_clicked() {
    let world = common::world();
    let (mut page, mut wizard) = common::create_form(&world).await;
    wizard.attempt_continue(&mut page).await.unwrap();
    observer::expect_control_enabled(&mut page, Control::Continue, false)
        .await
        .unwrap();

    let again = wizard.attempt_continue(&mut page).await.unwrap();

    assert_eq!(again, Progression::Blocked { errors: 4 });
    assert_eq!(wizard.stage(), WizardStage::Editing(WizardTab::Waypoints));
}

#[tokio::test]
async fn advance_walks_to_review_and_back() {
    let world = common::world();
    let (mut page, mut wizard, fixtures) = route_filled(&world).await;

    assert_eq!(wizard.advance(&mut page).await.unwrap(), WizardTab::CargoInfo);
    fill_cargo(&mut page, &fixtures.cargo).await.unwrap();
    assert_eq!(wizard.advance(&mut page).await.unwrap(), WizardTab::Carriers);
    choose_carrier(&mut page, &fixtures.carrier).await.unwrap();
    assert_eq!(wizard.advance(&mut page).await.unwrap(), WizardTab::Review);
    assert!(wizard.state().tabs.iter().all(|t| t.is_visited));

    wizard.back_to(&mut page, WizardTab::Waypoints).await.unwrap();
    assert_eq!(wizard.active_tab(), Some(WizardTab::Waypoints));

    wizard.advance_to(&mut page, WizardTab::Review).await.unwrap();
    assert_eq!(wizard.active_tab(), Some(WizardTab::Review));
}

#[tokio::test]
async fn back_to_unvisited_or_later_tab_is_rejected() {
    let world = common::world();
    let (mut page, mut wizard, _) = route_filled(&world).await;
    wizard.advance(&mut page).await.unwrap();

    let forward = wizard.back_to(&mut page, WizardTab::Carriers).await.unwrap_err();
    let same = wizard.back_to(&mut page, WizardTab::CargoInfo).await.unwrap_err();

    assert!(matches!(forward, E2eError::InvalidTransition { .. }));
    assert!(matches!(same, E2eError::InvalidTransition { .. }));
    assert_eq!(wizard.active_tab(), Some(WizardTab::CargoInfo));
}

#[tokio::test]
async fn carriers_tab_needs_a_selection() {
    let world = common::world();
    let (mut page, mut wizard, fixtures) = route_filled(&world).await;
    wizard.advance(&mut page).await.unwrap();
    fill_cargo(&mut page, &fixtures.cargo).await.unwrap();
    wizard.advance(&mut page).await.unwrap();

    let outcome = wizard.attempt_continue(&mut page).await.unwrap();
    assert_eq!(outcome, Progression::Blocked { errors: 1 });
    observer::expect_rule_count(&mut page, &observer::CARRIER_CHOSEN, 1)
        .await
        .unwrap();

    let other = CarrierSelection {
        carrier_id: 23,
        chosen_via_group_label: "Test carrier".to_string(),
    };
    choose_carrier(&mut page, &other).await.unwrap();
    observer::expect_rule_count(&mut page, &observer::CARRIER_CHOSEN, 0)
        .await
        .unwrap();
    assert_eq!(wizard.advance(&mut page).await.unwrap(), WizardTab::Review);
}

#[tokio::test]
async fn submit_outside_review_is_rejected() {
    let world = common::world();
    let (mut page, mut wizard) = common::create_form(&world).await;

    let err = lifecycle::submit(&mut page, &mut wizard).await.unwrap_err();

    assert!(matches!(err, E2eError::InvalidTransition { .. }), "{err}");
    assert!(world.requests().is_empty());
}

#[tokio::test]
async fn delete_before_submit_is_rejected() {
    let world = common::world();
    let (mut page, mut wizard) = common::create_form(&world).await;
    let request = lifecycle::SubmittedRequest {
        id: 1001,
        status: freightcheck_common::RequestStatus::BiddingActive,
    };

    let err = lifecycle::delete(&mut page, &mut wizard, &request).await.unwrap_err();

    assert!(matches!(err, E2eError::InvalidTransition { .. }));
}

#[tokio::test]
async fn submit_then_delete_closes_the_lifecycle() {
    let world = common::world();
    let (mut page, mut wizard, fixtures) = route_filled(&world).await;
    wizard.advance(&mut page).await.unwrap();
    fill_cargo(&mut page, &fixtures.cargo).await.unwrap();
    wizard.advance(&mut page).await.unwrap();
    choose_carrier(&mut page, &fixtures.carrier).await.unwrap();
    wizard.advance(&mut page).await.unwrap();

    let request = lifecycle::submit(&mut page, &mut wizard).await.unwrap();
    assert_eq!(request.detail_path(), format!("/request/{}", request.id));
    assert!(request.status.is_active());
    assert_eq!(wizard.stage(), WizardStage::Submitted);
    assert_eq!(lifecycle::read_status(&mut page).await.unwrap(), request.status);

    lifecycle::delete(&mut page, &mut wizard, &request).await.unwrap();
    assert_eq!(wizard.stage(), WizardStage::Deleted);
    assert_eq!(world.deleted(), vec![request.id]);
    assert_eq!(page.count(&selectors::request_row(request.id)).await.unwrap(), 0);

    // Deleted is absorbing
    let err = wizard.advance(&mut page).await.unwrap_err();
    assert!(matches!(err, E2eError::InvalidTransition { .. }));
}

#[tokio::test]
async fn discard_returns_to_list() {
    let world = common::world();
    let (mut page, mut wizard, _) = route_filled(&world).await;

    wizard.discard(&mut page).await.unwrap();

    assert_eq!(wizard.stage(), WizardStage::Discarded);
    assert_eq!(page.current_path().await.unwrap(), selectors::LIST_PATH);
    assert!(world.requests().is_empty());
    assert!(wizard.discard(&mut page).await.is_err());
}

#[tokio::test]
async fn observer_reports_count_mismatch() {
    let world = common::world();
    let (mut page, mut wizard) = common::create_form(&world).await;
    wizard.attempt_continue(&mut page).await.unwrap();

    let err = observer::expect_rule_count(&mut page, &observer::REQUIRED, 3)
        .await
        .unwrap_err();

    assert!(err.is_assertion());
    match err {
        E2eError::ValidationMismatch { what, expected, actual } => {
            assert_eq!(what, "required field errors");
            assert_eq!(expected, "3");
            assert_eq!(actual, "4");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn observer_waits_out_lagging_updates() {
    // Every reading lags by five observations
    let world = common::world_with(5);
    let (mut page, mut wizard) = common::create_form(&world).await;
    wizard.attempt_continue(&mut page).await.unwrap();

    observer::expect_rule_count(&mut page, &observer::REQUIRED, 4).await.unwrap();
    observer::expect_control_enabled(&mut page, Control::Continue, false)
        .await
        .unwrap();
}

#[tokio::test]
async fn format_errors_clear_once_fixed() {
    let world = common::world();
    let (mut page, mut wizard) = common::create_form(&world).await;
    let fixtures = FixtureSet::minimal();
    let composer = WaypointComposer::new(common::today());
    let mut records = fixtures.waypoints(common::today());
    records[0] = records[0]
        .clone()
        .with_contact("QA", freightcheck_e2e::scenario::MALFORMED_EMAIL, "+421 900 000 000");
    compose_route(&mut page, &composer, &records).await.unwrap();

    // Not shown until progression is attempted
    observer::expect_rule_count(&mut page, &observer::EMAIL_FORMAT, 0)
        .await
        .unwrap();
    let outcome = observer::provoke(&mut page, &mut wizard, &observer::EMAIL_FORMAT)
        .await
        .unwrap();
    assert_eq!(outcome, Some(Progression::Blocked { errors: 1 }));

    records[0].contact_email = Some(freightcheck_e2e::scenario::CORRECTED_EMAIL.to_string());
    composer.compose(&mut page, 0, &records[0]).await.unwrap();
    observer::expect_rule_count(&mut page, &observer::EMAIL_FORMAT, 0)
        .await
        .unwrap();
    observer::expect_control_enabled(&mut page, Control::Continue, true)
        .await
        .unwrap();
}
