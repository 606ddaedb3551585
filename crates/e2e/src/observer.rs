//! Validation observer: settle-aware reads of reactive form feedback
//!
//! Nothing in here samples once. Counts and flags are either read after a
//! quiet period ([`Page::settle`]) or polled until they match an
//! expectation and then confirmed to hold.

use tracing::debug;

use crate::driver::{Locator, Page, Probe};
use crate::error::{E2eError, E2eResult};
use crate::selectors;
use crate::wizard::{Progression, Wizard};

/// When a rule's message can show up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// Reacts to field edits once the field was touched or the tab was
    /// submitted
    Live,
    /// Only evaluated when progression is attempted; clears reactively
    /// once the input is fixed
    OnProgression,
}

/// A client-side validation rule, identified by its message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationRule {
    pub name: &'static str,
    /// Case-insensitive pattern matched against message text
    pub pattern: &'static str,
    pub trigger: Trigger,
}

impl ValidationRule {
    pub fn locator(&self) -> Locator {
        Locator::pattern(self.pattern)
    }
}

pub const REQUIRED: ValidationRule = ValidationRule {
    name: "required field",
    pattern: "field is required",
    trigger: Trigger::Live,
};

pub const EMAIL_FORMAT: ValidationRule = ValidationRule {
    name: "email format",
    pattern: "valid email",
    trigger: Trigger::OnProgression,
};

pub const DATE_ORDER: ValidationRule = ValidationRule {
    name: "waypoint date order",
    pattern: "before the previous waypoint",
    trigger: Trigger::OnProgression,
};

pub const NON_NEGATIVE: ValidationRule = ValidationRule {
    name: "non-negative cargo value",
    pattern: "must be positive",
    trigger: Trigger::OnProgression,
};

pub const CARRIER_CHOSEN: ValidationRule = ValidationRule {
    name: "carrier selection",
    pattern: "at least one carrier",
    trigger: Trigger::OnProgression,
};

/// Progression controls whose enablement is observable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Continue,
    Send,
}

impl Control {
    pub fn locator(&self) -> Locator {
        match self {
            Control::Continue => selectors::continue_button(),
            Control::Send => selectors::send_button(),
        }
    }
}

/// Settled number of messages matching `pattern`
pub async fn error_count(page: &mut Page, pattern: &str) -> E2eResult<usize> {
    let loc = Locator::pattern(pattern);
    Ok(page.settle(Probe::Count(&loc)).await?.as_count())
}

/// Settled number of field-level errors of any kind
pub async fn total_error_count(page: &mut Page) -> E2eResult<usize> {
    let loc = selectors::field_errors();
    Ok(page.settle(Probe::Count(&loc)).await?.as_count())
}

pub async fn is_control_enabled(page: &mut Page, control: Control) -> E2eResult<bool> {
    let loc = control.locator();
    Ok(page.settle(Probe::Enabled(&loc)).await?.as_flag())
}

/// Wait until a message matching `pattern` is (or is no longer) shown
pub async fn wait_for_message(page: &mut Page, pattern: &str, present: bool) -> E2eResult<()> {
    let loc = Locator::pattern(pattern);
    let timeout = page.timeouts().action;
    let polled = page
        .poll(Probe::Count(&loc), timeout, |r| (r.as_count() > 0) == present)
        .await?;
    if polled.met {
        Ok(())
    } else {
        Err(E2eError::mismatch(
            format!("presence of message /{}/", pattern),
            present,
            !present,
        ))
    }
}

/// Poll until exactly `expected` messages match, then confirm the count
/// holds through a quiet period
pub async fn expect_error_count(page: &mut Page, pattern: &str, expected: usize) -> E2eResult<()> {
    let loc = Locator::pattern(pattern);
    let timeout = page.timeouts().action;
    let polled = page
        .poll(Probe::Count(&loc), timeout, |r| r.as_count() == expected)
        .await?;
    let settled = if polled.met {
        page.settle(Probe::Count(&loc)).await?.as_count()
    } else {
        polled.reading.as_count()
    };
    debug!(pattern, expected, settled, "error count");
    if settled == expected {
        Ok(())
    } else {
        Err(E2eError::mismatch(
            format!("count of messages /{}/", pattern),
            expected,
            settled,
        ))
    }
}

pub async fn expect_rule_count(page: &mut Page, rule: &ValidationRule, expected: usize) -> E2eResult<()> {
    expect_error_count(page, rule.pattern, expected).await.map_err(|e| match e {
        E2eError::ValidationMismatch { expected, actual, .. } => E2eError::ValidationMismatch {
            what: format!("{} errors", rule.name),
            expected,
            actual,
        },
        other => other,
    })
}

pub async fn expect_control_enabled(page: &mut Page, control: Control, expected: bool) -> E2eResult<()> {
    let loc = control.locator();
    let timeout = page.timeouts().action;
    let polled = page
        .poll(Probe::Enabled(&loc), timeout, |r| r.as_flag() == expected)
        .await?;
    let settled = if polled.met {
        page.settle(Probe::Enabled(&loc)).await?.as_flag()
    } else {
        polled.reading.as_flag()
    };
    if settled == expected {
        Ok(())
    } else {
        Err(E2eError::mismatch(
            format!("enabled state of {:?}", control),
            expected,
            settled,
        ))
    }
}

/// Do whatever makes `rule` evaluate. Live rules need nothing; the others
/// need a progression attempt, whose outcome is returned.
pub async fn provoke(
    page: &mut Page,
    wizard: &mut Wizard,
    rule: &ValidationRule,
) -> E2eResult<Option<Progression>> {
    match rule.trigger {
        Trigger::Live => Ok(None),
        Trigger::OnProgression => wizard.attempt_continue(page).await.map(Some),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::TextMatch;

    #[test]
    fn test_rule_patterns_match_messages() {
        let cases = [
            (REQUIRED, selectors::REQUIRED_MESSAGE),
            (EMAIL_FORMAT, selectors::EMAIL_MESSAGE),
            (DATE_ORDER, selectors::DATE_ORDER_MESSAGE),
            (NON_NEGATIVE, selectors::NEGATIVE_MESSAGE),
            (CARRIER_CHOSEN, selectors::CARRIER_MESSAGE),
        ];
        for (rule, message) in cases {
            assert!(
                TextMatch::Pattern(rule.pattern.to_string()).matches(message),
                "{} should match {:?}",
                rule.name,
                message
            );
        }
    }

    #[test]
    fn test_rules_do_not_overlap() {
        let rules = [REQUIRED, EMAIL_FORMAT, DATE_ORDER, NON_NEGATIVE, CARRIER_CHOSEN];
        let messages = [
            selectors::REQUIRED_MESSAGE,
            selectors::EMAIL_MESSAGE,
            selectors::DATE_ORDER_MESSAGE,
            selectors::NEGATIVE_MESSAGE,
            selectors::CARRIER_MESSAGE,
        ];
        for (i, rule) in rules.iter().enumerate() {
            for (j, message) in messages.iter().enumerate() {
                let hit = TextMatch::Pattern(rule.pattern.to_string()).matches(message);
                assert_eq!(hit, i == j, "{} vs {:?}", rule.name, message);
            }
        }
    }

    #[test]
    fn test_required_is_live() {
        assert_eq!(REQUIRED.trigger, Trigger::Live);
        assert_eq!(DATE_ORDER.trigger, Trigger::OnProgression);
    }
}
