//! Waypoint composer: writes a [`WaypointRecord`] into one indexed section
//! of the waypoints tab through the field adapters.

use chrono::NaiveDate;
use freightcheck_common::{WaypointField, WaypointRecord};
use tracing::{debug, info};

use crate::driver::{Page, Probe, WaitState};
use crate::error::{E2eError, E2eResult};
use crate::fields::{AutocompleteField, Checkbox, DatePicker, Field, OptionalText, TextField};
use crate::selectors;

/// Optional inputs in the order the section lays them out
const OPTIONAL_TEXT: [WaypointField; 5] = [
    WaypointField::Street,
    WaypointField::PostCode,
    WaypointField::ContactName,
    WaypointField::ContactEmail,
    WaypointField::ContactPhone,
];

pub struct WaypointComposer {
    today: NaiveDate,
}

impl WaypointComposer {
    /// `today` is the month the date pickers open on
    pub fn new(today: NaiveDate) -> Self {
        Self { today }
    }

    /// Fill section `index` from `record`. Running it again with the same
    /// record leaves the section in the same state.
    pub async fn compose(&self, page: &mut Page, index: usize, record: &WaypointRecord) -> E2eResult<()> {
        record.validate()?;
        info!(index, role = %record.role, city = %record.city, "Composing waypoint");
        page.wait_for(&selectors::waypoint_section(index), WaitState::Visible)
            .await?;

        DatePicker::new(selectors::earliest_picker(index), self.today)
            .set(page, &record.earliest)
            .await?;
        if record.latest != record.earliest {
            DatePicker::new(selectors::latest_picker(index), self.today)
                .set(page, &record.latest)
                .await?;
        }

        TextField::new(selectors::waypoint_field(index, WaypointField::City))
            .set(page, &record.city)
            .await?;
        AutocompleteField::new(selectors::waypoint_field(index, WaypointField::Country), true)
            .set_and_confirm(page, &record.country)
            .await?;

        if let Some(name) = &record.name {
            let outcome = AutocompleteField::new(selectors::waypoint_field(index, WaypointField::Name), false)
                .set_and_confirm(page, name)
                .await?;
            debug!(index, ?outcome, "name lookup");
        }
        for field in OPTIONAL_TEXT {
            let value = record.value(field).map(String::from);
            OptionalText::new(selectors::waypoint_field(index, field))
                .set(page, &value)
                .await?;
        }

        // Always written, so test addresses never leak into the directory
        // through the form's default
        Checkbox::new(selectors::save_to_directory(index))
            .set(page, &record.persist_to_directory)
            .await?;
        Ok(())
    }

    /// Add an intermediate stop. It is inserted in front of the delivery
    /// section; returns its index.
    pub async fn add_intermediate(&self, page: &mut Page) -> E2eResult<usize> {
        let sections = selectors::waypoint_sections();
        let before = page.settle(Probe::Count(&sections)).await?.as_count();
        page.click(&selectors::add_waypoint_button()).await?;
        let timeout = page.timeouts().action;
        let polled = page
            .poll(Probe::Count(&sections), timeout, |r| r.as_count() == before + 1)
            .await?;
        if !polled.met {
            return Err(E2eError::locator(
                selectors::waypoint_section(before),
                format!("no new waypoint section after {} ms", polled.waited_ms),
            ));
        }
        let index = before.saturating_sub(1);
        info!(index, "Intermediate waypoint added");
        Ok(index)
    }

    /// Read section `index` back and compare it with `record`
    pub async fn verify(&self, page: &mut Page, index: usize, record: &WaypointRecord) -> E2eResult<()> {
        let mut diffs = Vec::new();

        let earliest = DatePicker::new(selectors::earliest_picker(index), self.today)
            .read(page)
            .await?;
        if earliest != record.earliest {
            diffs.push(format!("earliest {} != {}", earliest, record.earliest));
        }
        if record.latest != record.earliest {
            let latest = DatePicker::new(selectors::latest_picker(index), self.today)
                .read(page)
                .await?;
            if latest != record.latest {
                diffs.push(format!("latest {} != {}", latest, record.latest));
            }
        }

        for field in WaypointField::ALL {
            let Some(expected) = record.value(field) else {
                continue;
            };
            let actual = TextField::new(selectors::waypoint_field(index, field)).read(page).await?;
            if actual != expected {
                diffs.push(format!("{} {:?} != {:?}", field.key(), actual, expected));
            }
        }

        let saved = Checkbox::new(selectors::save_to_directory(index)).read(page).await?;
        if saved != record.persist_to_directory {
            diffs.push(format!("saveToDirectory {} != {}", saved, record.persist_to_directory));
        }

        if diffs.is_empty() {
            Ok(())
        } else {
            Err(E2eError::mismatch(
                format!("waypoint {} contents", index),
                "fixture values",
                diffs.join("; "),
            ))
        }
    }
}
