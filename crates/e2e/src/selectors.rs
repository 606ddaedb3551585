//! Locators and message texts of the application under test.
//!
//! This is the only module that knows the application's markup. The
//! simulator renders against the same constants.

use freightcheck_common::{CargoField, WaypointField};

use crate::driver::Locator;

pub const LOGIN_PATH: &str = "/login";
pub const LIST_PATH: &str = "/request/list";
pub const CREATE_PATH: &str = "/request/create";

/// Request detail route; the single capture group is the numeric id
pub const DETAIL_PATH_PATTERN: &str = r"^/request/(\d+)$";

/// Display format of a confirmed date picker input
pub const DATE_DISPLAY_FORMAT: &str = "%d.%m.%Y";

/// Month caption of an open calendar, e.g. "October 2026"
pub const CALENDAR_CAPTION_FORMAT: &str = "%B %Y";

/// Date inputs per waypoint section: earliest, latest, time slot
pub const PICKERS_PER_WAYPOINT: usize = 3;

pub const REQUIRED_MESSAGE: &str = "This field is required";
pub const EMAIL_MESSAGE: &str = "Please enter a valid email address";
pub const DATE_ORDER_MESSAGE: &str = "Date cannot be before the previous waypoint";
pub const NEGATIVE_MESSAGE: &str = "Value must be positive";
pub const CARRIER_MESSAGE: &str = "Select at least one carrier";
pub const NO_RESULTS_TEXT: &str = "No results found";
pub const DISCARD_CONFIRM_LABEL: &str = "Discard changes";

pub const CONTINUE_LABEL: &str = "Continue";
pub const SEND_LABEL: &str = "Send request";

pub fn login_email() -> Locator {
    Locator::role("textbox", "Email")
}

pub fn login_password() -> Locator {
    Locator::role("textbox", "Password")
}

pub fn login_button() -> Locator {
    Locator::role("button", "Login")
}

pub fn new_request_link() -> Locator {
    Locator::role("link", "+ New request")
}

/// Top-level navigation back to the list
pub fn requests_link() -> Locator {
    Locator::role("link", "Requests")
}

pub fn request_row(id: u64) -> Locator {
    Locator::text(format!("Request #{}", id))
}

pub fn tab(label: &str) -> Locator {
    Locator::role("tab", label)
}

pub fn continue_button() -> Locator {
    Locator::role("button", CONTINUE_LABEL)
}

pub fn send_button() -> Locator {
    Locator::role("button", SEND_LABEL)
}

pub fn add_waypoint_button() -> Locator {
    Locator::role("button", "+ Add waypoint")
}

/// Every field-level error message currently rendered
pub fn field_errors() -> Locator {
    Locator::css(".field-error")
}

pub fn waypoint_section(index: usize) -> Locator {
    Locator::css(format!("[data-waypoint=\"{}\"]", index))
}

/// Every waypoint section of the form
pub fn waypoint_sections() -> Locator {
    Locator::css("fieldset")
}

pub fn waypoint_field(index: usize, field: WaypointField) -> Locator {
    Locator::css(format!("[id=\"waypoints[{}].{}\"]", index, field.key()))
}

pub fn save_to_directory(index: usize) -> Locator {
    Locator::css(format!("input[name=\"waypoints[{}].saveToDirectory\"]", index))
}

pub fn date_input(picker_index: usize) -> Locator {
    Locator::css("[data-test-id=\"dp-input\"]").nth(picker_index)
}

pub fn earliest_picker(waypoint: usize) -> usize {
    waypoint * PICKERS_PER_WAYPOINT
}

pub fn latest_picker(waypoint: usize) -> usize {
    waypoint * PICKERS_PER_WAYPOINT + 1
}

/// Open calendar overlay
pub fn calendar() -> Locator {
    Locator::css(".dp__menu")
}

/// Caption showing which month the open calendar displays
pub fn calendar_caption(caption: &str) -> Locator {
    Locator::text(caption).within(calendar())
}

pub fn next_month_button() -> Locator {
    Locator::role("button", "Next month").within(calendar())
}

/// Day cell of the displayed month; offset days of neighbouring months
/// carry a different role and never match
pub fn day_cell(day: u32) -> Locator {
    Locator::role("gridcell", day.to_string()).within(calendar())
}

pub fn calendar_select_button() -> Locator {
    Locator::css("[data-test-id=\"select-button\"]")
}

pub fn suggestion_list() -> Locator {
    Locator::any_role("listbox")
}

pub fn suggestion(text: &str) -> Locator {
    Locator::role("option", text).within(suggestion_list())
}

pub fn no_results() -> Locator {
    Locator::text(NO_RESULTS_TEXT).within(suggestion_list())
}

pub fn cargo_field(field: CargoField) -> Locator {
    Locator::css(format!("[id=\"cargo.{}\"]", field.key()))
}

pub fn carrier_label(group_label: &str) -> Locator {
    Locator::text(group_label).within(Locator::css(".carrier-list"))
}

pub fn carrier_checkbox(carrier_id: u32) -> Locator {
    Locator::css(format!("input[name=\"carriers.{}\"]", carrier_id))
}

pub fn status_label() -> Locator {
    Locator::css(".status-label")
}

pub fn action_menu_button() -> Locator {
    Locator::css("#dropdownMenu").first()
}

pub fn action_menu() -> Locator {
    Locator::any_role("menu")
}

/// The "Delete" entry of the item action menu
pub fn menu_delete() -> Locator {
    Locator::role("menuitem", "Delete").within(action_menu())
}

pub fn dialog() -> Locator {
    Locator::any_role("dialog")
}

/// The confirming "Delete" button of the modal, never the menu label or
/// the dialog title that share its text
pub fn dialog_delete() -> Locator {
    Locator::role("button", "Delete").within(dialog())
}

pub fn discard_confirm() -> Locator {
    Locator::role("button", DISCARD_CONFIRM_LABEL).within(dialog())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_waypoint_locators() {
        assert_eq!(
            waypoint_field(1, WaypointField::PostCode).to_string(),
            "[id=\"waypoints[1].postCode\"]"
        );
        assert_eq!(
            save_to_directory(0).to_string(),
            "input[name=\"waypoints[0].saveToDirectory\"]"
        );
    }

    #[test]
    fn test_picker_indices() {
        assert_eq!(earliest_picker(0), 0);
        assert_eq!(earliest_picker(1), 3);
        assert_eq!(latest_picker(1), 4);
    }

    #[test]
    fn test_detail_pattern() {
        let re = regex::Regex::new(DETAIL_PATH_PATTERN).unwrap();
        assert!(re.is_match("/request/1042"));
        assert!(!re.is_match("/request/list"));
        assert!(!re.is_match("/request/create"));
    }
}
