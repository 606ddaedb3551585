//! Submission and lifecycle: send the request from the review tab, check
//! the detail view, delete it again.

use std::time::Instant;

use freightcheck_common::RequestStatus;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::driver::{Locator, Page, Probe, WaitState};
use crate::error::{E2eError, E2eResult};
use crate::selectors;
use crate::wizard::{route, Wizard, WizardStage, WizardTab};

/// What the detail view showed right after submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmittedRequest {
    pub id: u64,
    pub status: RequestStatus,
}

impl SubmittedRequest {
    pub fn detail_path(&self) -> String {
        format!("/request/{}", self.id)
    }
}

/// Send the request. Only valid on the review tab; lands on the detail
/// view with an active status.
pub async fn submit(page: &mut Page, wizard: &mut Wizard) -> E2eResult<SubmittedRequest> {
    if wizard.stage() != WizardStage::Editing(WizardTab::Review) {
        return Err(E2eError::InvalidTransition {
            from: wizard.stage().to_string(),
            to: WizardStage::Submitted.to_string(),
        });
    }

    let send = selectors::send_button();
    page.wait_for(&send, WaitState::Visible).await?;
    page.click(&send).await?;

    let detail = route(selectors::DETAIL_PATH_PATTERN)?;
    let path = page.wait_for_path(&detail).await?;
    let id = detail
        .captures(&path)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<u64>().ok())
        .ok_or_else(|| E2eError::NavigationMismatch {
            expected: selectors::DETAIL_PATH_PATTERN.to_string(),
            actual: path.clone(),
        })?;

    let status = read_status(page).await?;
    if !status.is_active() {
        return Err(E2eError::mismatch(
            format!("status of request {}", id),
            RequestStatus::BiddingActive,
            status,
        ));
    }

    wizard.transition(WizardStage::Submitted)?;
    info!(id, %status, "Request submitted");
    Ok(SubmittedRequest { id, status })
}

/// Status label currently shown on the detail view
pub async fn read_status(page: &mut Page) -> E2eResult<RequestStatus> {
    page.wait_for(&selectors::status_label(), WaitState::Visible).await?;
    let timeouts = page.timeouts();
    let start = Instant::now();
    loop {
        for status in RequestStatus::ALL {
            if page.count(&Locator::text(status.label())).await? > 0 {
                return Ok(status);
            }
        }
        if start.elapsed() >= timeouts.action {
            return Err(E2eError::locator(selectors::status_label(), "shows no known status"));
        }
        tokio::time::sleep(timeouts.poll_interval).await;
    }
}

/// The cargo description must appear on the detail view verbatim
pub async fn verify_detail(page: &mut Page, description: &str) -> E2eResult<()> {
    let text = Locator::text(description);
    let timeout = page.timeouts().action;
    let polled = page
        .poll(Probe::Count(&text), timeout, |r| r.as_count() > 0)
        .await?;
    if polled.met {
        Ok(())
    } else {
        Err(E2eError::mismatch(
            "cargo description on detail view",
            format!("{:?}", description),
            "not shown",
        ))
    }
}

/// Delete the submitted request and land on the list view
pub async fn delete(page: &mut Page, wizard: &mut Wizard, request: &SubmittedRequest) -> E2eResult<()> {
    if wizard.stage() != WizardStage::Submitted {
        return Err(E2eError::InvalidTransition {
            from: wizard.stage().to_string(),
            to: WizardStage::Deleted.to_string(),
        });
    }
    delete_current(page, request.id).await?;
    wizard.transition(WizardStage::Deleted)
}

/// Delete a request by id from wherever the page is. Used for cleanup
/// after a scenario failed past submission.
pub async fn delete_by_id(page: &mut Page, id: u64) -> E2eResult<()> {
    page.goto(&format!("/request/{}", id)).await?;
    let detail = route(&format!("^/request/{}$", id))?;
    page.wait_for_path(&detail).await?;
    delete_current(page, id).await
}

// The menu entry, the dialog title and the confirm button all read
// "Delete"; each click is scoped to its container.
async fn delete_current(page: &mut Page, id: u64) -> E2eResult<()> {
    let menu_button = selectors::action_menu_button();
    page.wait_for(&menu_button, WaitState::Visible).await?;
    page.click(&menu_button).await?;

    let item = selectors::menu_delete();
    page.wait_for(&item, WaitState::Visible).await?;
    page.click(&item).await?;

    let confirm = selectors::dialog_delete();
    page.wait_for(&confirm, WaitState::Visible).await?;
    page.click(&confirm).await?;

    let list = route(&format!("^{}$", regex::escape(selectors::LIST_PATH)))?;
    page.wait_for_path(&list).await?;

    let row = selectors::request_row(id);
    let remaining = page.settle(Probe::Count(&row)).await?.as_count();
    if remaining != 0 {
        return Err(E2eError::mismatch(
            format!("rows for request {} after delete", id),
            0,
            remaining,
        ));
    }
    info!(id, "Request deleted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detail_path() {
        let req = SubmittedRequest {
            id: 1042,
            status: RequestStatus::BiddingActive,
        };
        assert_eq!(req.detail_path(), "/request/1042");
        assert!(route(selectors::DETAIL_PATH_PATTERN)
            .unwrap()
            .is_match(&req.detail_path()));
    }
}
