//! Field adapters and the waypoint composer against the simulator

mod common;

use chrono::NaiveDate;
use freightcheck_common::{WaypointField, WaypointRecord, WaypointRole};
use freightcheck_e2e::driver::{Locator, Probe};
use freightcheck_e2e::fields::{
    AutocompleteField, Checkbox, DatePicker, Field, Lookup, NumericField, OptionalText, TextField,
};
use freightcheck_e2e::selectors;
use freightcheck_e2e::waypoint::WaypointComposer;
use freightcheck_e2e::{E2eError, WizardTab};
use test_case::test_case;

fn date(m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, m, d).unwrap()
}

#[test_case(date(10, 19) ; "today")]
#[test_case(date(10, 31) ; "end of this month")]
#[test_case(date(11, 1) ; "start of next month")]
#[test_case(date(11, 30) ; "end of next month")]
#[tokio::test]
async fn date_picker_reaches_both_months(target: NaiveDate) {
    let world = common::world();
    let (mut page, _wizard) = common::create_form(&world).await;
    let picker = DatePicker::new(selectors::earliest_picker(0), common::today());

    picker.set(&mut page, &target).await.unwrap();

    assert_eq!(picker.read(&mut page).await.unwrap(), target);
    assert_eq!(page.count(&selectors::calendar()).await.unwrap(), 0);
}

#[test_case(date(12, 1) ; "two months ahead")]
#[test_case(date(9, 30) ; "last month")]
#[tokio::test]
async fn date_picker_refuses_unreachable_dates(target: NaiveDate) {
    let world = common::world();
    let (mut page, _wizard) = common::create_form(&world).await;
    let picker = DatePicker::new(selectors::earliest_picker(0), common::today());

    let err = picker.set(&mut page, &target).await.unwrap_err();

    assert!(matches!(err, E2eError::Locator { .. }), "{err}");
    assert!(err.to_string().contains("one forward step"));
}

#[test_case(date(11, 20), date(11, 20) ; "same date again")]
#[test_case(date(11, 15), date(11, 17) ; "later day same month")]
#[test_case(date(10, 30), date(11, 2) ; "this month then next")]
#[tokio::test]
async fn date_picker_resets_from_shown_month(first: NaiveDate, second: NaiveDate) {
    let world = common::world();
    let (mut page, _wizard) = common::create_form(&world).await;
    let picker = DatePicker::new(selectors::earliest_picker(1), common::today());

    picker.set(&mut page, &first).await.unwrap();
    picker.set(&mut page, &second).await.unwrap();

    assert_eq!(picker.read(&mut page).await.unwrap(), second);
    assert_eq!(page.count(&selectors::calendar()).await.unwrap(), 0);
}

#[tokio::test]
async fn date_picker_cannot_step_back_from_shown_month() {
    let world = common::world();
    let (mut page, _wizard) = common::create_form(&world).await;
    let picker = DatePicker::new(selectors::earliest_picker(0), common::today());
    picker.set(&mut page, &date(11, 20)).await.unwrap();

    // Reopens on November: October is behind it, December one step ahead
    let back = picker.set(&mut page, &date(10, 25)).await.unwrap_err();
    assert!(back.to_string().contains("one forward step"), "{back}");
    assert_eq!(page.count(&selectors::calendar()).await.unwrap(), 0);
    assert_eq!(picker.read(&mut page).await.unwrap(), date(11, 20));

    picker.set(&mut page, &date(12, 3)).await.unwrap();
    assert_eq!(picker.read(&mut page).await.unwrap(), date(12, 3));
    assert_eq!(page.count(&selectors::calendar()).await.unwrap(), 0);
}

#[tokio::test]
async fn date_picker_select_day_prefers_this_month() {
    let world = common::world();
    let (mut page, _wizard) = common::create_form(&world).await;
    let picker = DatePicker::new(selectors::latest_picker(1), common::today());

    assert_eq!(picker.select_day(&mut page, 25).await.unwrap(), date(10, 25));
    assert_eq!(picker.select_day(&mut page, 5).await.unwrap(), date(11, 5));
    assert_eq!(picker.read(&mut page).await.unwrap(), date(11, 5));
}

#[tokio::test]
async fn autocomplete_selects_exact_option() {
    let world = common::world();
    let (mut page, _wizard) = common::create_form(&world).await;
    let country = AutocompleteField::new(selectors::waypoint_field(0, WaypointField::Country), true);

    let outcome = country.set_and_confirm(&mut page, "Slovakia").await.unwrap();

    assert_eq!(outcome, Lookup::Selected);
    assert_eq!(page.count(&selectors::suggestion_list()).await.unwrap(), 0);
    let shown = TextField::new(selectors::waypoint_field(0, WaypointField::Country))
        .read(&mut page)
        .await
        .unwrap();
    assert_eq!(shown, "Slovakia");
}

#[tokio::test]
async fn autocomplete_ignores_partial_matches() {
    let world = common::world();
    let (mut page, _wizard) = common::create_form(&world).await;
    // "Slov" lists Slovakia and Slovenia, neither equals the typed text
    let country = AutocompleteField::new(selectors::waypoint_field(0, WaypointField::Country), false);

    let outcome = country.set_and_confirm(&mut page, "Slov").await.unwrap();

    assert_eq!(outcome, Lookup::Dismissed);
    assert_eq!(page.count(&selectors::suggestion_list()).await.unwrap(), 0);
}

#[tokio::test]
async fn autocomplete_dismisses_no_results() {
    let world = common::world();
    let (mut page, _wizard) = common::create_form(&world).await;
    let name = AutocompleteField::new(selectors::waypoint_field(0, WaypointField::Name), false);

    let outcome = name.set_and_confirm(&mut page, "Nowhere Depot").await.unwrap();

    assert_eq!(outcome, Lookup::Dismissed);
    // Nothing is left to intercept the next click
    page.click(&selectors::continue_button()).await.unwrap();
}

#[tokio::test]
async fn required_autocomplete_fails_without_match() {
    let world = common::world();
    let (mut page, _wizard) = common::create_form(&world).await;
    let country = AutocompleteField::new(selectors::waypoint_field(0, WaypointField::Country), true);

    let err = country.set_and_confirm(&mut page, "Atlantis").await.unwrap_err();

    assert!(matches!(err, E2eError::Locator { .. }), "{err}");
}

#[tokio::test]
async fn checkbox_is_idempotent() {
    let world = common::world();
    let (mut page, _wizard) = common::create_form(&world).await;
    let save = Checkbox::new(selectors::save_to_directory(0));

    assert!(save.read(&mut page).await.unwrap(), "form default is checked");
    save.set(&mut page, &false).await.unwrap();
    save.set(&mut page, &false).await.unwrap();
    assert!(!save.read(&mut page).await.unwrap());
    save.set(&mut page, &true).await.unwrap();
    assert!(save.read(&mut page).await.unwrap());
}

#[test_case("12kg" ; "unit suffix")]
#[test_case("1,5" ; "decimal comma")]
#[test_case("" ; "empty")]
#[tokio::test]
async fn numeric_rejects_malformed_input(value: &str) {
    let world = common::world();
    let (mut page, mut wizard) = common::create_form(&world).await;
    let composer = WaypointComposer::new(common::today());
    for (i, record) in freightcheck_e2e::FixtureSet::minimal()
        .waypoints(common::today())
        .iter()
        .enumerate()
    {
        composer.compose(&mut page, i, record).await.unwrap();
    }
    assert_eq!(wizard.advance(&mut page).await.unwrap(), WizardTab::CargoInfo);

    let weight = NumericField::new(selectors::cargo_field(freightcheck_common::CargoField::Weight));
    let err = weight.set(&mut page, &value.to_string()).await.unwrap_err();
    assert!(matches!(err, E2eError::Fixture(_)), "{err}");
    assert_eq!(weight.read(&mut page).await.unwrap(), "");

    weight.set(&mut page, &"-2.5".to_string()).await.unwrap();
    assert_eq!(weight.read(&mut page).await.unwrap(), "-2.5");
}

#[tokio::test]
async fn optional_text_none_leaves_field_alone() {
    let world = common::world();
    let (mut page, _wizard) = common::create_form(&world).await;
    let street = OptionalText::new(selectors::waypoint_field(0, WaypointField::Street));

    street.set(&mut page, &Some("Mlynske nivy 5".to_string())).await.unwrap();
    street.set(&mut page, &None).await.unwrap();

    assert_eq!(street.read(&mut page).await.unwrap().as_deref(), Some("Mlynske nivy 5"));
}

#[tokio::test]
async fn composer_writes_and_verifies_full_record() {
    let world = common::world();
    let (mut page, _wizard) = common::create_form(&world).await;
    let composer = WaypointComposer::new(common::today());
    let record = WaypointRecord::new(WaypointRole::Pickup, 0, date(10, 30), "Bratislava", "Slovakia")
        .with_window(date(10, 30), date(11, 2))
        .with_street("Mlynske nivy 5", "821 09")
        .with_contact("Jana Novakova", "jana.novakova@example.com", "+421 900 123 456");

    composer.compose(&mut page, 0, &record).await.unwrap();
    composer.verify(&mut page, 0, &record).await.unwrap();

    // Composing again with the same record changes nothing
    composer.compose(&mut page, 0, &record).await.unwrap();
    composer.verify(&mut page, 0, &record).await.unwrap();
}

#[tokio::test]
async fn composer_verify_reports_differences() {
    let world = common::world();
    let (mut page, _wizard) = common::create_form(&world).await;
    let composer = WaypointComposer::new(common::today());
    let record = WaypointRecord::new(WaypointRole::Pickup, 0, date(10, 20), "Bratislava", "Slovakia");
    composer.compose(&mut page, 0, &record).await.unwrap();

    let mut other = record.clone();
    other.city = "Kosice".to_string();
    let err = composer.verify(&mut page, 0, &other).await.unwrap_err();

    assert!(err.is_assertion());
    assert!(err.to_string().contains("Kosice"), "{err}");
}

#[tokio::test]
async fn composer_rejects_record_without_city() {
    let world = common::world();
    let (mut page, _wizard) = common::create_form(&world).await;
    let composer = WaypointComposer::new(common::today());
    let record = WaypointRecord::new(WaypointRole::Delivery, 1, date(10, 20), " ", "Czechia");

    let err = composer.compose(&mut page, 1, &record).await.unwrap_err();

    assert!(matches!(err, E2eError::Model(_)), "{err}");
}

#[tokio::test]
async fn intermediate_is_inserted_before_delivery() {
    let world = common::world();
    let (mut page, _wizard) = common::create_form(&world).await;
    let composer = WaypointComposer::new(common::today());

    assert_eq!(composer.add_intermediate(&mut page).await.unwrap(), 1);
    assert_eq!(composer.add_intermediate(&mut page).await.unwrap(), 2);

    let sections = selectors::waypoint_sections();
    assert_eq!(page.settle(Probe::Count(&sections)).await.unwrap().as_count(), 4);
    assert_eq!(page.count(&selectors::date_input(11)).await.unwrap(), 1);
    assert_eq!(
        page.count(&Locator::css("[id=\"waypoints[3].city\"]")).await.unwrap(),
        1
    );
}
