//! Field adapters
//!
//! One adapter per widget archetype, all behind [`Field`]: write a value
//! with `set`, read it back with `read`. Adapters wait for their target to
//! show up before touching it; a target that never does fails the
//! scenario with a locator error.

use std::time::Instant;

use async_trait::async_trait;
use chrono::{Datelike, Months, NaiveDate};
use freightcheck_common::types::is_signed_decimal;
use tracing::debug;

use crate::driver::{Locator, Page, Probe, WaitState};
use crate::error::{E2eError, E2eResult};
use crate::selectors;

#[async_trait]
pub trait Field: Send + Sync {
    type Value: Send + Sync;

    async fn set(&self, page: &mut Page, value: &Self::Value) -> E2eResult<()>;
    async fn read(&self, page: &mut Page) -> E2eResult<Self::Value>;
}

/// Plain text input; `set` clears before typing
#[derive(Debug, Clone)]
pub struct TextField {
    pub locator: Locator,
}

impl TextField {
    pub fn new(locator: Locator) -> Self {
        Self { locator }
    }
}

#[async_trait]
impl Field for TextField {
    type Value = String;

    async fn set(&self, page: &mut Page, value: &String) -> E2eResult<()> {
        page.wait_for(&self.locator, WaitState::Visible).await?;
        page.fill(&self.locator, value).await
    }

    async fn read(&self, page: &mut Page) -> E2eResult<String> {
        page.input_value(&self.locator).await
    }
}

/// Text input that may be left alone. `None` does not touch the field.
#[derive(Debug, Clone)]
pub struct OptionalText {
    inner: TextField,
}

impl OptionalText {
    pub fn new(locator: Locator) -> Self {
        Self {
            inner: TextField::new(locator),
        }
    }
}

#[async_trait]
impl Field for OptionalText {
    type Value = Option<String>;

    async fn set(&self, page: &mut Page, value: &Option<String>) -> E2eResult<()> {
        match value {
            Some(v) => self.inner.set(page, v).await,
            None => Ok(()),
        }
    }

    async fn read(&self, page: &mut Page) -> E2eResult<Option<String>> {
        let value = self.inner.read(page).await?;
        Ok(if value.is_empty() { None } else { Some(value) })
    }
}

/// Numeric spinner. Takes a signed decimal string and writes it verbatim;
/// the form does no clamping, so negative values reach validation.
#[derive(Debug, Clone)]
pub struct NumericField {
    pub locator: Locator,
}

impl NumericField {
    pub fn new(locator: Locator) -> Self {
        Self { locator }
    }
}

#[async_trait]
impl Field for NumericField {
    type Value = String;

    async fn set(&self, page: &mut Page, value: &String) -> E2eResult<()> {
        if !is_signed_decimal(value) {
            return Err(E2eError::Fixture(format!(
                "{:?} is not a signed decimal (target {})",
                value, self.locator
            )));
        }
        page.wait_for(&self.locator, WaitState::Visible).await?;
        page.fill(&self.locator, value).await
    }

    async fn read(&self, page: &mut Page) -> E2eResult<String> {
        page.input_value(&self.locator).await
    }
}

/// Checkbox; setting the state it already has does nothing
#[derive(Debug, Clone)]
pub struct Checkbox {
    pub locator: Locator,
}

impl Checkbox {
    pub fn new(locator: Locator) -> Self {
        Self { locator }
    }
}

#[async_trait]
impl Field for Checkbox {
    type Value = bool;

    async fn set(&self, page: &mut Page, desired: &bool) -> E2eResult<()> {
        page.wait_for(&self.locator, WaitState::Visible).await?;
        let current = page.settle(Probe::Checked(&self.locator)).await?.as_flag();
        if current == *desired {
            debug!(locator = %self.locator, desired, "checkbox already set");
            return Ok(());
        }
        page.set_checked(&self.locator, *desired).await?;
        page.wait_for_checked(&self.locator, *desired).await
    }

    async fn read(&self, page: &mut Page) -> E2eResult<bool> {
        Ok(page.settle(Probe::Checked(&self.locator)).await?.as_flag())
    }
}

/// Calendar-backed date input.
///
/// The calendar opens on the month it last showed a selection for (or on
/// the month of `today` when empty) and can step forward exactly once.
/// Which month is shown is read off the open calendar's caption.
#[derive(Debug, Clone)]
pub struct DatePicker {
    pub index: usize,
    pub today: NaiveDate,
}

impl DatePicker {
    pub fn new(index: usize, today: NaiveDate) -> Self {
        Self { index, today }
    }

    fn input(&self) -> Locator {
        selectors::date_input(self.index)
    }

    /// Pick `day` in the first of the two months reachable from an empty
    /// picker that has it on or after today
    pub fn resolve_day(&self, day: u32) -> Option<NaiveDate> {
        let this_month = self.today.with_day(day).filter(|d| *d >= self.today);
        this_month.or_else(|| {
            self.today
                .with_day(1)
                .and_then(|d| d.checked_add_months(Months::new(1)))
                .and_then(|d| d.with_day(day))
        })
    }

    pub async fn select_day(&self, page: &mut Page, day: u32) -> E2eResult<NaiveDate> {
        let date = self.resolve_day(day).ok_or_else(|| {
            E2eError::locator(self.input(), format!("day {} exists in neither reachable month", day))
        })?;
        self.set(page, &date).await?;
        Ok(date)
    }

    /// Forward steps from the month the open calendar shows to `date`
    async fn steps_from_shown(&self, page: &mut Page, date: NaiveDate) -> E2eResult<Option<u32>> {
        let target = selectors::calendar_caption(&caption(date));
        if page.settle(Probe::Count(&target)).await?.as_count() == 1 {
            return Ok(Some(0));
        }
        let Some(before) = month_before(date) else {
            return Ok(None);
        };
        let previous = selectors::calendar_caption(&caption(before));
        if page.settle(Probe::Count(&previous)).await?.as_count() == 1 {
            return Ok(Some(1));
        }
        Ok(None)
    }
}

fn caption(date: NaiveDate) -> String {
    date.format(selectors::CALENDAR_CAPTION_FORMAT).to_string()
}

fn month_before(date: NaiveDate) -> Option<NaiveDate> {
    date.with_day(1)?.checked_sub_months(Months::new(1))
}

#[async_trait]
impl Field for DatePicker {
    type Value = NaiveDate;

    async fn set(&self, page: &mut Page, date: &NaiveDate) -> E2eResult<()> {
        let input = self.input();
        page.wait_for(&input, WaitState::Visible).await?;
        page.click(&input).await?;
        page.wait_for(&selectors::calendar(), WaitState::Visible).await?;

        let Some(steps) = self.steps_from_shown(page, *date).await? else {
            page.press(&input, "Escape").await?;
            page.wait_for(&selectors::calendar(), WaitState::Hidden).await?;
            return Err(E2eError::locator(
                &input,
                format!("{} is unreachable by one forward step", date),
            ));
        };
        if steps == 1 {
            page.click(&selectors::next_month_button()).await?;
        }
        page.wait_for(&selectors::calendar_caption(&caption(*date)), WaitState::Visible)
            .await?;

        let cell = selectors::day_cell(date.day());
        page.wait_for(&cell, WaitState::Visible).await?;
        page.click(&cell).await?;

        let select = selectors::calendar_select_button();
        page.wait_for(&select, WaitState::Visible).await?;
        page.click(&select).await?;
        page.wait_for(&selectors::calendar(), WaitState::Hidden).await?;
        debug!(picker = self.index, %date, steps, "date selected");
        Ok(())
    }

    async fn read(&self, page: &mut Page) -> E2eResult<NaiveDate> {
        let shown = page.input_value(&self.input()).await?;
        NaiveDate::parse_from_str(shown.trim(), selectors::DATE_DISPLAY_FORMAT).map_err(|_| {
            E2eError::mismatch(format!("date in picker {}", self.index), "a date", format!("{:?}", shown))
        })
    }
}

/// How an autocomplete entry ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    /// An option with exactly the typed text was picked
    Selected,
    /// Nothing matched; the list was closed and the typed text stays
    Dismissed,
}

/// Text input with a suggestion list that must be confirmed from
#[derive(Debug, Clone)]
pub struct AutocompleteField {
    pub locator: Locator,
    /// Only a picked option counts as a value
    pub required: bool,
}

impl AutocompleteField {
    pub fn new(locator: Locator, required: bool) -> Self {
        Self { locator, required }
    }

    /// Type `text` and confirm it from the suggestion list. Leaves no
    /// overlay open either way.
    pub async fn set_and_confirm(&self, page: &mut Page, text: &str) -> E2eResult<Lookup> {
        page.wait_for(&self.locator, WaitState::Visible).await?;
        page.click(&self.locator).await?;
        page.fill(&self.locator, text).await?;

        let list = selectors::suggestion_list();
        page.wait_for(&list, WaitState::Visible).await?;

        let exact = selectors::suggestion(text);
        let any_option = Locator::any_role("option").within(list.clone());
        let no_results = selectors::no_results();
        let timeouts = page.timeouts();
        let start = Instant::now();
        let matched = loop {
            if page.count(&any_option).await? > 0 {
                break page.settle(Probe::Count(&exact)).await?.as_count() == 1;
            }
            if page.count(&no_results).await? > 0 {
                break false;
            }
            if start.elapsed() >= timeouts.action {
                return Err(E2eError::locator(
                    &list,
                    format!("no suggestions loaded after {} ms", start.elapsed().as_millis()),
                ));
            }
            tokio::time::sleep(timeouts.poll_interval).await;
        };

        let outcome = if matched {
            page.click(&exact).await?;
            Lookup::Selected
        } else {
            page.press(&self.locator, "Escape").await?;
            Lookup::Dismissed
        };
        page.wait_for(&list, WaitState::Hidden).await?;
        debug!(locator = %self.locator, text, ?outcome, "autocomplete");

        if outcome == Lookup::Dismissed && self.required {
            return Err(E2eError::locator(
                &self.locator,
                format!("no option matches {:?}", text),
            ));
        }
        Ok(outcome)
    }
}

#[async_trait]
impl Field for AutocompleteField {
    type Value = String;

    async fn set(&self, page: &mut Page, value: &String) -> E2eResult<()> {
        self.set_and_confirm(page, value).await.map(|_| ())
    }

    async fn read(&self, page: &mut Page) -> E2eResult<String> {
        page.input_value(&self.locator).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn picker() -> DatePicker {
        DatePicker::new(0, NaiveDate::from_ymd_opt(2026, 10, 19).unwrap())
    }

    #[test]
    fn test_month_before() {
        let d = |y, m, d| NaiveDate::from_ymd_opt(y, m, d).unwrap();
        assert_eq!(month_before(d(2026, 11, 15)), Some(d(2026, 10, 1)));
        assert_eq!(month_before(d(2027, 1, 2)), Some(d(2026, 12, 1)));
        assert_eq!(caption(d(2026, 11, 30)), "November 2026");
    }

    #[test]
    fn test_resolve_day() {
        let p = picker();
        assert_eq!(p.resolve_day(20), NaiveDate::from_ymd_opt(2026, 10, 20));
        assert_eq!(p.resolve_day(19), NaiveDate::from_ymd_opt(2026, 10, 19));
        assert_eq!(p.resolve_day(16), NaiveDate::from_ymd_opt(2026, 11, 16));
        // November has no 31st
        assert_eq!(p.resolve_day(31), NaiveDate::from_ymd_opt(2026, 10, 31));
        let late = DatePicker::new(0, NaiveDate::from_ymd_opt(2026, 11, 20).unwrap());
        assert_eq!(late.resolve_day(31), NaiveDate::from_ymd_opt(2026, 12, 31));
    }
}
