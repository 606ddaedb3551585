//! Wizard controller
//!
//! Tracks which tab of the create form is active and what the harness has
//! learned about each tab's validity. Progression goes through
//! [`Wizard::attempt_continue`], which never clicks a disabled control and
//! reports a blocked attempt as a value rather than an error.

use std::fmt;
use std::time::Instant;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::driver::{Locator, Page, Probe, WaitState};
use crate::error::{E2eError, E2eResult};
use crate::observer::{self, Control};
use crate::selectors;

/// Tabs of the create form, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum WizardTab {
    Waypoints,
    CargoInfo,
    Carriers,
    Review,
}

impl WizardTab {
    pub const ALL: [WizardTab; 4] = [
        WizardTab::Waypoints,
        WizardTab::CargoInfo,
        WizardTab::Carriers,
        WizardTab::Review,
    ];

    pub fn index(&self) -> usize {
        match self {
            WizardTab::Waypoints => 0,
            WizardTab::CargoInfo => 1,
            WizardTab::Carriers => 2,
            WizardTab::Review => 3,
        }
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Tab caption as rendered
    pub fn label(&self) -> &'static str {
        match self {
            WizardTab::Waypoints => "Waypoints",
            WizardTab::CargoInfo => "Cargo info",
            WizardTab::Carriers => "Carriers",
            WizardTab::Review => "Review",
        }
    }

    pub fn next(&self) -> Option<Self> {
        Self::from_index(self.index() + 1)
    }
}

impl fmt::Display for WizardTab {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WizardStage {
    Editing(WizardTab),
    Submitted,
    /// Absorbing; only reachable from `Submitted`
    Deleted,
    /// Left the form through the discard confirmation
    Discarded,
}

impl fmt::Display for WizardStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WizardStage::Editing(tab) => write!(f, "Editing({})", tab),
            WizardStage::Submitted => write!(f, "Submitted"),
            WizardStage::Deleted => write!(f, "Deleted"),
            WizardStage::Discarded => write!(f, "Discarded"),
        }
    }
}

impl WizardStage {
    /// Whether the wizard may move from `self` to `to`
    pub fn permits(&self, to: WizardStage) -> bool {
        use WizardStage::*;
        match (*self, to) {
            (Editing(from), Editing(tab)) => from.next() == Some(tab) || tab.index() < from.index(),
            (Editing(WizardTab::Review), Submitted) => true,
            (Editing(_), Discarded) => true,
            (Submitted, Deleted) => true,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabState {
    pub name: String,
    /// Last progression attempt from this tab went through
    pub is_valid: bool,
    pub is_visited: bool,
}

/// What the harness has observed about the form so far
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WizardState {
    pub active_tab_index: usize,
    pub tabs: Vec<TabState>,
    pub field_error_count: usize,
    pub progression_enabled: bool,
}

impl Default for WizardState {
    fn default() -> Self {
        Self {
            active_tab_index: 0,
            tabs: WizardTab::ALL
                .iter()
                .map(|t| TabState {
                    name: t.label().to_string(),
                    is_valid: false,
                    is_visited: t.index() == 0,
                })
                .collect(),
            field_error_count: 0,
            progression_enabled: true,
        }
    }
}

/// Outcome of a progression attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progression {
    Advanced(WizardTab),
    /// The form refused; `errors` field errors are on screen
    Blocked { errors: usize },
}

pub struct Wizard {
    stage: WizardStage,
    state: WizardState,
}

impl Wizard {
    /// Open the create form from the list view
    pub async fn open(page: &mut Page) -> E2eResult<Self> {
        let link = selectors::new_request_link();
        page.wait_for(&link, WaitState::Visible).await?;
        page.click(&link).await?;
        let create = route(&format!("^{}$", regex::escape(selectors::CREATE_PATH)))?;
        page.wait_for_path(&create).await?;
        wait_for_tab(page, WizardTab::Waypoints).await?;
        info!("Create form open");
        Ok(Self {
            stage: WizardStage::Editing(WizardTab::Waypoints),
            state: WizardState::default(),
        })
    }

    pub fn stage(&self) -> WizardStage {
        self.stage
    }

    pub fn state(&self) -> &WizardState {
        &self.state
    }

    /// Active tab, if the form is still being edited
    pub fn active_tab(&self) -> Option<WizardTab> {
        match self.stage {
            WizardStage::Editing(tab) => Some(tab),
            _ => None,
        }
    }

    fn editing(&self, action: &str) -> E2eResult<WizardTab> {
        self.active_tab().ok_or_else(|| E2eError::InvalidTransition {
            from: self.stage.to_string(),
            to: action.to_string(),
        })
    }

    /// Move to `to`, rejecting anything the state machine forbids
    pub(crate) fn transition(&mut self, to: WizardStage) -> E2eResult<()> {
        if !self.stage.permits(to) {
            return Err(E2eError::InvalidTransition {
                from: self.stage.to_string(),
                to: to.to_string(),
            });
        }
        debug!(from = %self.stage, to = %to, "wizard transition");
        self.stage = to;
        if let WizardStage::Editing(tab) = to {
            self.state.active_tab_index = tab.index();
            self.state.tabs[tab.index()].is_visited = true;
        }
        Ok(())
    }

    /// Try to leave the active tab through Continue.
    ///
    /// A disabled control is not clicked. After a click, waits until
    /// either the next tab is selected or field errors render.
    pub async fn attempt_continue(&mut self, page: &mut Page) -> E2eResult<Progression> {
        let tab = self.editing("Continue")?;
        let Some(next) = tab.next() else {
            return Err(E2eError::InvalidTransition {
                from: self.stage.to_string(),
                to: "Continue past Review".to_string(),
            });
        };

        if !observer::is_control_enabled(page, Control::Continue).await? {
            let errors = observer::total_error_count(page).await?;
            info!(tab = %tab, errors, "Continue is disabled");
            return Ok(self.blocked(tab, errors, false));
        }

        page.click(&selectors::continue_button()).await?;

        let next_tab = selectors::tab(next.label());
        let errors_loc = selectors::field_errors();
        let timeouts = page.timeouts();
        let start = Instant::now();
        loop {
            if tab_selected(page, &next_tab).await? {
                break;
            }
            if page.count(&errors_loc).await? > 0 && !tab_selected(page, &next_tab).await? {
                let errors = observer::total_error_count(page).await?;
                let enabled = observer::is_control_enabled(page, Control::Continue).await?;
                info!(tab = %tab, errors, enabled, "Progression blocked");
                return Ok(self.blocked(tab, errors, enabled));
            }
            if start.elapsed() >= timeouts.action {
                return Err(E2eError::Timeout {
                    what: format!("{} tab or field errors after Continue on {}", next, tab),
                    waited_ms: start.elapsed().as_millis() as u64,
                });
            }
            tokio::time::sleep(timeouts.poll_interval).await;
        }

        self.state.tabs[tab.index()].is_valid = true;
        self.state.field_error_count = 0;
        self.state.progression_enabled = true;
        self.transition(WizardStage::Editing(next))?;
        info!(from = %tab, to = %next, "Advanced");
        Ok(Progression::Advanced(next))
    }

    fn blocked(&mut self, tab: WizardTab, errors: usize, enabled: bool) -> Progression {
        self.state.tabs[tab.index()].is_valid = false;
        self.state.field_error_count = errors;
        self.state.progression_enabled = enabled;
        Progression::Blocked { errors }
    }

    /// Continue, treating a blocked attempt as a failure
    pub async fn advance(&mut self, page: &mut Page) -> E2eResult<WizardTab> {
        let from = self.editing("Continue")?;
        match self.attempt_continue(page).await? {
            Progression::Advanced(tab) => Ok(tab),
            Progression::Blocked { errors } => Err(E2eError::mismatch(
                format!("progression from {}", from),
                "next tab",
                format!("blocked with {} field errors", errors),
            )),
        }
    }

    /// Advance until `target` is the active tab
    pub async fn advance_to(&mut self, page: &mut Page, target: WizardTab) -> E2eResult<()> {
        while self.editing("Continue")? < target {
            self.advance(page).await?;
        }
        Ok(())
    }

    /// Jump back to an earlier, already visited tab
    pub async fn back_to(&mut self, page: &mut Page, tab: WizardTab) -> E2eResult<()> {
        let current = self.editing(tab.label())?;
        if tab.index() >= current.index() || !self.state.tabs[tab.index()].is_visited {
            return Err(E2eError::InvalidTransition {
                from: self.stage.to_string(),
                to: WizardStage::Editing(tab).to_string(),
            });
        }
        page.click(&selectors::tab(tab.label())).await?;
        wait_for_tab(page, tab).await?;
        self.transition(WizardStage::Editing(tab))
    }

    /// Leave the form through the top-level navigation, confirming the
    /// discard dialog, and land on the list view
    pub async fn discard(&mut self, page: &mut Page) -> E2eResult<()> {
        self.editing("Discarded")?;
        page.click(&selectors::requests_link()).await?;
        let confirm = selectors::discard_confirm();
        page.wait_for(&confirm, WaitState::Visible).await?;
        page.click(&confirm).await?;
        page.wait_for(&selectors::dialog(), WaitState::Hidden).await?;
        let list = route(&format!("^{}$", regex::escape(selectors::LIST_PATH)))?;
        page.wait_for_path(&list).await?;
        self.transition(WizardStage::Discarded)?;
        info!("Changes discarded");
        Ok(())
    }

    /// Re-read error count and control enablement from the page
    pub async fn refresh(&mut self, page: &mut Page) -> E2eResult<&WizardState> {
        let tab = self.editing("refresh")?;
        self.state.field_error_count = observer::total_error_count(page).await?;
        let control = if tab == WizardTab::Review {
            Control::Send
        } else {
            Control::Continue
        };
        self.state.progression_enabled = observer::is_control_enabled(page, control).await?;
        Ok(&self.state)
    }
}

pub(crate) fn route(pattern: &str) -> E2eResult<Regex> {
    Regex::new(pattern).map_err(|e| E2eError::Config(format!("bad route pattern {}: {}", pattern, e)))
}

async fn tab_selected(page: &mut Page, tab: &Locator) -> E2eResult<bool> {
    if page.count(tab).await? != 1 {
        return Ok(false);
    }
    let reading = page.sample(Probe::Attribute(tab, "aria-selected")).await?;
    Ok(reading.as_text() == Some("true"))
}

async fn wait_for_tab(page: &mut Page, tab: WizardTab) -> E2eResult<()> {
    let loc = selectors::tab(tab.label());
    let timeout = page.timeouts().action;
    let polled = page
        .poll(Probe::Attribute(&loc, "aria-selected"), timeout, |r| {
            r.as_text() == Some("true")
        })
        .await?;
    if polled.met {
        Ok(())
    } else {
        Err(E2eError::Timeout {
            what: format!("{} tab to become active", tab),
            waited_ms: polled.waited_ms,
        })
    }
}
