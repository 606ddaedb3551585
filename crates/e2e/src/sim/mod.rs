//! In-process simulation of the transport request application
//!
//! `SimWorld` plays the backend (request store, address directory) and
//! hands out isolated `SimDriver` sessions through [`DriverFactory`]. Each
//! session models the wizard the way the real UI behaves where it matters
//! to the harness:
//!
//! - validation feedback, tab switches and suggestion lists only render
//!   after a number of observations (`settle_reads`), so anything that
//!   samples once instead of waiting reads stale state;
//! - required-field errors show once a field is touched or a progression
//!   attempt happened, and track the form live from then on;
//! - format and cross-field errors only appear on a progression attempt
//!   and disappear once fixed;
//! - open calendars, suggestion lists, menus and dialogs swallow clicks
//!   aimed at anything outside them;
//! - locators resolve strictly for actions.

mod dom;

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Datelike, Months, NaiveDate};
use freightcheck_common::{CargoField, Credentials, RequestStatus, WaypointField};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use regex::Regex;
use tracing::debug;

use crate::driver::{Driver, DriverFactory, Locator};
use crate::error::{E2eError, E2eResult};
use crate::selectors::{
    self, CARRIER_MESSAGE, CONTINUE_LABEL, DATE_DISPLAY_FORMAT, DATE_ORDER_MESSAGE,
    DISCARD_CONFIRM_LABEL, EMAIL_MESSAGE, NEGATIVE_MESSAGE, NO_RESULTS_TEXT,
    PICKERS_PER_WAYPOINT, REQUIRED_MESSAGE, SEND_LABEL,
};
use crate::wizard::WizardTab;

use dom::{Dom, Element, Key};

static EMAIL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("static email grammar"));

static DETAIL_ROUTE: Lazy<Regex> =
    Lazy::new(|| Regex::new(selectors::DETAIL_PATH_PATTERN).expect("static route pattern"));

/// Behaviour knobs of the simulated application
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Date the calendar opens on
    pub today: NaiveDate,
    /// Observations needed before reactive state catches up with a change
    pub settle_reads: u32,
    pub credentials: Credentials,
    pub countries: Vec<String>,
    /// `(carrier id, label shown in the carrier group)`
    pub carriers: Vec<(u32, String)>,
    /// Numeric cargo fields that reject negative values. The real form
    /// only enforces one of the four.
    pub enforced_non_negative: Vec<CargoField>,
    /// Address names already saved in the directory
    pub directory: Vec<String>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            today: chrono::Local::now().date_naive(),
            settle_reads: 2,
            credentials: Credentials::new("qa@example.com", "secret"),
            countries: [
                "Austria", "Czechia", "Germany", "Hungary", "Poland", "Slovakia", "Slovenia",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            carriers: vec![(17, "Demo carrier".to_string()), (23, "Test carrier".to_string())],
            enforced_non_negative: vec![CargoField::Weight],
            directory: vec!["Warehouse Senec".to_string()],
        }
    }
}

/// A request as the simulated backend stores it
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRequest {
    pub id: u64,
    pub status: RequestStatus,
    pub cities: Vec<String>,
    pub countries: Vec<String>,
    pub cargo: BTreeMap<CargoField, String>,
    pub carrier_ids: Vec<u32>,
}

#[derive(Debug)]
struct Backend {
    requests: BTreeMap<u64, StoredRequest>,
    next_id: u64,
    directory: Vec<String>,
    deleted: Vec<u64>,
}

/// Shared backend plus the factory for isolated sessions
#[derive(Clone)]
pub struct SimWorld {
    config: SimConfig,
    backend: Arc<Mutex<Backend>>,
}

impl SimWorld {
    pub fn new(config: SimConfig) -> Self {
        let backend = Backend {
            requests: BTreeMap::new(),
            next_id: 1001,
            directory: config.directory.clone(),
            deleted: Vec::new(),
        };
        Self {
            config,
            backend: Arc::new(Mutex::new(backend)),
        }
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Open a session directly, without going through the factory
    pub fn session(&self) -> SimDriver {
        SimDriver::new(self.config.clone(), self.backend.clone())
    }

    pub fn requests(&self) -> Vec<StoredRequest> {
        self.backend.lock().requests.values().cloned().collect()
    }

    pub fn deleted(&self) -> Vec<u64> {
        self.backend.lock().deleted.clone()
    }

    pub fn directory(&self) -> Vec<String> {
        self.backend.lock().directory.clone()
    }
}

#[async_trait]
impl DriverFactory for SimWorld {
    async fn launch(&self) -> E2eResult<Box<dyn Driver>> {
        Ok(Box::new(self.session()))
    }

    fn name(&self) -> &str {
        "simulator"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum View {
    Login,
    List,
    Create,
    Detail(u64),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Overlay {
    None,
    Calendar {
        picker: usize,
        month_offset: u32,
        chosen: Option<u32>,
    },
    Suggestions {
        waypoint: usize,
        field: WaypointField,
    },
    Menu,
    DeleteDialog,
    DiscardDialog,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum ErrorKey {
    Required(usize, WaypointField),
    Email(usize),
    DateOrder(usize),
    Negative(CargoField),
    Carrier,
}

impl ErrorKey {
    fn tab(&self) -> usize {
        match self {
            ErrorKey::Required(..) | ErrorKey::Email(_) | ErrorKey::DateOrder(_) => 0,
            ErrorKey::Negative(_) => 1,
            ErrorKey::Carrier => 2,
        }
    }

    fn message(&self) -> &'static str {
        match self {
            ErrorKey::Required(..) => REQUIRED_MESSAGE,
            ErrorKey::Email(_) => EMAIL_MESSAGE,
            ErrorKey::DateOrder(_) => DATE_ORDER_MESSAGE,
            ErrorKey::Negative(_) => NEGATIVE_MESSAGE,
            ErrorKey::Carrier => CARRIER_MESSAGE,
        }
    }

    fn waypoint(&self) -> Option<usize> {
        match self {
            ErrorKey::Required(i, _) | ErrorKey::Email(i) | ErrorKey::DateOrder(i) => Some(*i),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
struct WaypointForm {
    inputs: BTreeMap<WaypointField, String>,
    /// Country picked from the option list; typed text alone does not count
    country: Option<String>,
    save_to_directory: bool,
    dates: [Option<NaiveDate>; PICKERS_PER_WAYPOINT],
}

impl Default for WaypointForm {
    fn default() -> Self {
        Self {
            inputs: BTreeMap::new(),
            country: None,
            save_to_directory: true,
            dates: [None; PICKERS_PER_WAYPOINT],
        }
    }
}

impl WaypointForm {
    fn input(&self, field: WaypointField) -> &str {
        self.inputs.get(&field).map(String::as_str).unwrap_or("")
    }

    fn window_end(&self) -> Option<NaiveDate> {
        self.dates[1].or(self.dates[0])
    }
}

#[derive(Debug, Clone)]
struct Form {
    active_tab: usize,
    furthest_tab: usize,
    waypoints: Vec<WaypointForm>,
    cargo: BTreeMap<CargoField, String>,
    carriers: BTreeSet<u32>,
    attempted: [bool; 4],
    raised: BTreeSet<ErrorKey>,
    touched: BTreeSet<(usize, WaypointField)>,
}

impl Default for Form {
    fn default() -> Self {
        Self {
            active_tab: 0,
            furthest_tab: 0,
            waypoints: vec![WaypointForm::default(), WaypointForm::default()],
            cargo: BTreeMap::new(),
            carriers: BTreeSet::new(),
            attempted: [false; 4],
            raised: BTreeSet::new(),
            touched: BTreeSet::new(),
        }
    }
}

/// What the page currently shows for the lagging parts of the UI
#[derive(Debug, Clone)]
struct Shown {
    tab: usize,
    errors: Vec<ErrorKey>,
    continue_enabled: bool,
    suggestions_ready: bool,
}

impl Default for Shown {
    fn default() -> Self {
        Self {
            tab: 0,
            errors: Vec::new(),
            continue_enabled: true,
            suggestions_ready: true,
        }
    }
}

/// One browser session against the simulated application
pub struct SimDriver {
    config: SimConfig,
    backend: Arc<Mutex<Backend>>,
    view: View,
    authenticated: bool,
    login: (String, String),
    login_failed: bool,
    form: Form,
    overlay: Overlay,
    pending: u32,
    shown: Shown,
}

impl SimDriver {
    fn new(config: SimConfig, backend: Arc<Mutex<Backend>>) -> Self {
        Self {
            config,
            backend,
            view: View::Login,
            authenticated: false,
            login: (String::new(), String::new()),
            login_failed: false,
            form: Form::default(),
            overlay: Overlay::None,
            pending: 0,
            shown: Shown::default(),
        }
    }

    fn path(&self) -> String {
        match self.view {
            View::Login => selectors::LOGIN_PATH.to_string(),
            View::List => selectors::LIST_PATH.to_string(),
            View::Create => selectors::CREATE_PATH.to_string(),
            View::Detail(id) => format!("/request/{}", id),
        }
    }

    /// A change happened; reactive parts of the page go stale
    fn touch(&mut self) {
        self.pending = self.config.settle_reads;
        self.shown.suggestions_ready = false;
        if self.pending == 0 {
            self.recompute();
        }
    }

    /// An observation happened; stale parts catch up after enough of them
    fn tick(&mut self) {
        if self.pending > 0 {
            self.pending -= 1;
            if self.pending == 0 {
                self.recompute();
            }
        }
    }

    fn recompute(&mut self) {
        let errors = self.visible_errors();
        let tab = self.form.active_tab;
        let blocked = self.form.attempted[tab] && errors.iter().any(|e| e.tab() == tab);
        self.shown = Shown {
            tab,
            errors,
            continue_enabled: !blocked,
            suggestions_ready: true,
        };
    }

    fn reset_form(&mut self) {
        self.form = Form::default();
        self.overlay = Overlay::None;
        self.pending = 0;
        self.shown = Shown::default();
    }

    fn month_start(&self, offset: u32) -> NaiveDate {
        let first = self.config.today.with_day(1).unwrap_or(self.config.today);
        first.checked_add_months(Months::new(offset)).unwrap_or(first)
    }

    /// Calendars reopen on the month of the date they hold
    fn selected_month_offset(&self, picker: usize) -> u32 {
        let selected = self
            .form
            .waypoints
            .get(picker / PICKERS_PER_WAYPOINT)
            .and_then(|wp| wp.dates[picker % PICKERS_PER_WAYPOINT]);
        let Some(date) = selected else {
            return 0;
        };
        let today = self.config.today;
        let months = (date.year() - today.year()) * 12 + date.month() as i32 - today.month() as i32;
        u32::try_from(months).unwrap_or(0)
    }

    // ---- validation rules ----

    fn failing(&self) -> Vec<ErrorKey> {
        let mut out = Vec::new();
        for (i, wp) in self.form.waypoints.iter().enumerate() {
            if wp.input(WaypointField::City).trim().is_empty() {
                out.push(ErrorKey::Required(i, WaypointField::City));
            }
            if wp.country.is_none() {
                out.push(ErrorKey::Required(i, WaypointField::Country));
            }
            let email = wp.input(WaypointField::ContactEmail).trim();
            if !email.is_empty() && !EMAIL.is_match(email) {
                out.push(ErrorKey::Email(i));
            }
            if i > 0 {
                let prev_end = self.form.waypoints[i - 1].window_end();
                if let (Some(start), Some(prev_end)) = (wp.dates[0], prev_end) {
                    if start < prev_end {
                        out.push(ErrorKey::DateOrder(i));
                    }
                }
            }
        }
        for field in &self.config.enforced_non_negative {
            let negative = self
                .form
                .cargo
                .get(field)
                .and_then(|v| v.trim().parse::<f64>().ok())
                .map(|v| v < 0.0)
                .unwrap_or(false);
            if negative {
                out.push(ErrorKey::Negative(*field));
            }
        }
        if self.form.carriers.is_empty() {
            out.push(ErrorKey::Carrier);
        }
        out
    }

    fn visible_errors(&self) -> Vec<ErrorKey> {
        self.failing()
            .into_iter()
            .filter(|k| match k {
                ErrorKey::Required(i, f) => {
                    self.form.attempted[k.tab()] || self.form.touched.contains(&(*i, *f))
                }
                _ => self.form.raised.contains(k),
            })
            .collect()
    }

    fn tab_failures(&self, tab: usize) -> Vec<ErrorKey> {
        self.failing().into_iter().filter(|k| k.tab() == tab).collect()
    }

    /// Progression attempt on `tab`: reveal everything wrong with it
    fn attempt(&mut self, tab: usize) -> bool {
        self.form.attempted[tab] = true;
        let failures = self.tab_failures(tab);
        self.form.raised.extend(failures.iter().copied());
        failures.is_empty()
    }

    // ---- rendering ----

    fn render(&self) -> Dom {
        let mut dom = Dom::default();
        match self.view {
            View::Login => self.render_login(&mut dom),
            View::List => self.render_list(&mut dom),
            View::Create => self.render_create(&mut dom),
            View::Detail(id) => self.render_detail(&mut dom, id),
        }
        dom
    }

    fn render_login(&self, dom: &mut Dom) {
        dom.push(
            Element::new(Key::LoginEmail, "input")
                .role("textbox")
                .name("Email")
                .attr("type", "email")
                .value(self.login.0.clone()),
        );
        dom.push(
            Element::new(Key::LoginPassword, "input")
                .role("textbox")
                .name("Password")
                .attr("type", "password")
                .value(self.login.1.clone()),
        );
        dom.push(Element::new(Key::LoginButton, "button").role("button").text("Login"));
        if self.login_failed {
            dom.push(Element::new(Key::Static, "p").class("login-error").text("Invalid credentials"));
        }
    }

    fn render_nav(&self, dom: &mut Dom) {
        dom.push(Element::new(Key::NavRequests, "a").role("link").text("Requests"));
    }

    fn render_list(&self, dom: &mut Dom) {
        self.render_nav(dom);
        dom.push(Element::new(Key::NewRequest, "a").role("link").text("+ New request"));
        let table = dom.push(Element::new(Key::Static, "table").role("table"));
        for id in self.backend.lock().requests.keys() {
            dom.push_under(table, Element::new(Key::Static, "tr").text(format!("Request #{}", id)));
        }
    }

    fn render_error(&self, dom: &mut Dom, parent: usize, key: ErrorKey) {
        dom.push_under(parent, Element::new(Key::Static, "span").class("field-error").text(key.message()));
    }

    fn render_create(&self, dom: &mut Dom) {
        self.render_nav(dom);
        let tablist = dom.push(Element::new(Key::Static, "div").role("tablist"));
        for tab in WizardTab::ALL {
            let selected = tab.index() == self.shown.tab;
            dom.push_under(
                tablist,
                Element::new(Key::Tab(tab.index()), "button")
                    .role("tab")
                    .text(tab.label())
                    .attr("aria-selected", selected.to_string()),
            );
        }

        let panel = dom.push(Element::new(Key::Static, "form").class("request-form"));
        match self.shown.tab {
            0 => self.render_waypoints(dom, panel),
            1 => self.render_cargo(dom, panel),
            2 => self.render_carriers(dom, panel),
            _ => self.render_review(dom, panel),
        }

        if self.shown.tab < 3 {
            dom.push_under(
                panel,
                Element::new(Key::Continue, "button")
                    .role("button")
                    .text(CONTINUE_LABEL)
                    .enabled(self.shown.continue_enabled),
            );
        } else {
            dom.push_under(panel, Element::new(Key::Send, "button").role("button").text(SEND_LABEL));
        }

        self.render_overlay(dom);
    }

    fn render_waypoints(&self, dom: &mut Dom, panel: usize) {
        for (i, wp) in self.form.waypoints.iter().enumerate() {
            let section = dom.push_under(
                panel,
                Element::new(Key::Static, "fieldset").attr("data-waypoint", i.to_string()),
            );
            for (slot, date) in wp.dates.iter().enumerate() {
                let shown = date
                    .map(|d| d.format(DATE_DISPLAY_FORMAT).to_string())
                    .unwrap_or_default();
                dom.push_under(
                    section,
                    Element::new(Key::DateInput(i * PICKERS_PER_WAYPOINT + slot), "input")
                        .attr("data-test-id", "dp-input")
                        .value(shown),
                );
            }
            for field in WaypointField::ALL {
                let role = match field {
                    WaypointField::Country | WaypointField::Name => "combobox",
                    _ => "textbox",
                };
                dom.push_under(
                    section,
                    Element::new(Key::WaypointInput(i, field), "input")
                        .role(role)
                        .attr("id", format!("waypoints[{}].{}", i, field.key()))
                        .value(wp.input(field)),
                );
            }
            dom.push_under(
                section,
                Element::new(Key::SaveToDirectory(i), "input")
                    .role("checkbox")
                    .name("Save to address directory")
                    .attr("type", "checkbox")
                    .attr("name", format!("waypoints[{}].saveToDirectory", i))
                    .checked(wp.save_to_directory),
            );
            for key in self.shown.errors.iter().filter(|k| k.waypoint() == Some(i)) {
                self.render_error(dom, section, *key);
            }
        }
        dom.push_under(
            panel,
            Element::new(Key::AddWaypoint, "button").role("button").text("+ Add waypoint"),
        );
    }

    fn render_cargo(&self, dom: &mut Dom, panel: usize) {
        for field in CargoField::ALL {
            let role = if field.is_numeric() { "spinbutton" } else { "textbox" };
            dom.push_under(
                panel,
                Element::new(Key::CargoInput(field), "input")
                    .role(role)
                    .attr("id", format!("cargo.{}", field.key()))
                    .value(self.form.cargo.get(&field).cloned().unwrap_or_default()),
            );
        }
        for key in self.shown.errors.iter().filter(|k| k.tab() == 1) {
            self.render_error(dom, panel, *key);
        }
    }

    fn render_carriers(&self, dom: &mut Dom, panel: usize) {
        let list = dom.push_under(panel, Element::new(Key::Static, "div").class("carrier-list"));
        for (id, label) in &self.config.carriers {
            dom.push_under(list, Element::new(Key::CarrierLabel(*id), "label").text(label.clone()));
            dom.push_under(
                list,
                Element::new(Key::CarrierCheckbox(*id), "input")
                    .role("checkbox")
                    .attr("type", "checkbox")
                    .attr("name", format!("carriers.{}", id))
                    .checked(self.form.carriers.contains(id)),
            );
        }
        for key in self.shown.errors.iter().filter(|k| k.tab() == 2) {
            self.render_error(dom, panel, *key);
        }
    }

    fn render_review(&self, dom: &mut Dom, panel: usize) {
        let summary = dom.push_under(panel, Element::new(Key::Static, "section").class("review"));
        for wp in &self.form.waypoints {
            dom.push_under(
                summary,
                Element::new(Key::Static, "p").text(format!(
                    "{}, {}",
                    wp.input(WaypointField::City),
                    wp.country.clone().unwrap_or_default()
                )),
            );
        }
        if let Some(desc) = self.form.cargo.get(&CargoField::Description) {
            dom.push_under(summary, Element::new(Key::Static, "p").text(desc.clone()));
        }
    }

    fn render_overlay(&self, dom: &mut Dom) {
        match &self.overlay {
            Overlay::Calendar { month_offset, .. } => {
                let menu = dom.push(Element::new(Key::Static, "div").class("dp__menu").overlay());
                let start = self.month_start(*month_offset);
                dom.push_under(
                    menu,
                    Element::new(Key::Static, "div")
                        .class("dp__month_year")
                        .text(start.format(selectors::CALENDAR_CAPTION_FORMAT).to_string()),
                );
                dom.push_under(menu, Element::new(Key::NextMonth, "button").role("button").name("Next month"));
                let prev_last = start.pred_opt().unwrap_or(start);
                for day in (prev_last.day().saturating_sub(2))..=prev_last.day() {
                    dom.push_under(
                        menu,
                        Element::new(Key::Static, "div").class("dp__cell_offset").text(day.to_string()),
                    );
                }
                let next_start = start.checked_add_months(Months::new(1)).unwrap_or(start);
                let days = next_start.signed_duration_since(start).num_days() as u32;
                for day in 1..=days {
                    dom.push_under(
                        menu,
                        Element::new(Key::DayCell(day), "div").role("gridcell").text(day.to_string()),
                    );
                }
                dom.push_under(
                    menu,
                    Element::new(Key::CalendarSelect, "button")
                        .role("button")
                        .text("Select")
                        .attr("data-test-id", "select-button"),
                );
            }
            Overlay::Suggestions { waypoint, field } => {
                let list = dom.push(Element::new(Key::Static, "ul").role("listbox").overlay());
                if !self.shown.suggestions_ready {
                    dom.push_under(list, Element::new(Key::Static, "li").text("Loading..."));
                    return;
                }
                let typed = self.form.waypoints[*waypoint].input(*field).to_lowercase();
                let pool = match field {
                    WaypointField::Country => self.config.countries.clone(),
                    _ => self.backend.lock().directory.clone(),
                };
                let hits: Vec<_> = pool
                    .into_iter()
                    .filter(|c| c.to_lowercase().contains(&typed))
                    .collect();
                if hits.is_empty() {
                    dom.push_under(list, Element::new(Key::Static, "li").text(NO_RESULTS_TEXT));
                }
                for hit in hits {
                    dom.push_under(
                        list,
                        Element::new(Key::Suggestion(hit.clone()), "li").role("option").text(hit),
                    );
                }
            }
            Overlay::DiscardDialog => {
                let dialog = dom.push(Element::new(Key::Static, "div").role("dialog").overlay());
                dom.push_under(dialog, Element::new(Key::Static, "h2").text("Discard changes?"));
                dom.push_under(dialog, Element::new(Key::KeepEditing, "button").role("button").text("Keep editing"));
                dom.push_under(
                    dialog,
                    Element::new(Key::DiscardConfirm, "button").role("button").text(DISCARD_CONFIRM_LABEL),
                );
            }
            _ => {}
        }
    }

    fn render_detail(&self, dom: &mut Dom, id: u64) {
        self.render_nav(dom);
        let backend = self.backend.lock();
        let Some(req) = backend.requests.get(&id) else {
            dom.push(Element::new(Key::Static, "p").text("Request not found"));
            return;
        };
        dom.push(Element::new(Key::Static, "h1").text(format!("Request #{}", id)));
        dom.push(Element::new(Key::Static, "span").class("status-label").text(req.status.label()));
        if let Some(desc) = req.cargo.get(&CargoField::Description) {
            dom.push(Element::new(Key::Static, "p").class("cargo-description").text(desc.clone()));
        }
        dom.push(
            Element::new(Key::ActionMenuButton, "button")
                .role("button")
                .name("Actions")
                .attr("id", "dropdownMenu"),
        );
        match self.overlay {
            Overlay::Menu => {
                let menu = dom.push(Element::new(Key::Static, "div").role("menu").overlay());
                for item in ["Edit", "Duplicate", "Delete"] {
                    dom.push_under(menu, Element::new(Key::MenuItem(item), "div").role("menuitem").text(item));
                }
            }
            Overlay::DeleteDialog => {
                let dialog = dom.push(Element::new(Key::Static, "div").role("dialog").overlay());
                dom.push_under(dialog, Element::new(Key::Static, "span").class("dialog-title").text("Delete"));
                dom.push_under(
                    dialog,
                    Element::new(Key::Static, "p").text("This request will be removed."),
                );
                dom.push_under(dialog, Element::new(Key::DeleteCancel, "button").role("button").text("Cancel"));
                dom.push_under(dialog, Element::new(Key::DeleteConfirm, "button").role("button").text("Delete"));
            }
            _ => {}
        }
    }

    // ---- interaction ----

    /// Resolve an action target: one element, enabled, not covered
    fn target(&self, locator: &Locator) -> E2eResult<Element> {
        let dom = self.render();
        let idx = dom.strict(locator)?;
        let el = dom.get(idx);
        if !el.enabled {
            return Err(E2eError::locator(locator, "element is not enabled"));
        }
        if dom.has_overlay() && !dom.in_overlay(idx) {
            return Err(E2eError::locator(
                locator,
                "an open overlay intercepts pointer events",
            ));
        }
        Ok(el.clone())
    }

    fn read(&mut self, locator: &Locator) -> E2eResult<Element> {
        self.tick();
        let dom = self.render();
        let idx = dom.strict(locator)?;
        Ok(dom.get(idx).clone())
    }

    fn activate(&mut self, key: Key) -> E2eResult<()> {
        match key {
            Key::LoginButton => {
                let ok = self.login.0 == self.config.credentials.identifier()
                    && self.login.1 == self.config.credentials.secret();
                self.login_failed = !ok;
                if ok {
                    self.authenticated = true;
                    self.view = View::List;
                }
            }
            Key::NavRequests => {
                if self.view == View::Create {
                    self.overlay = Overlay::DiscardDialog;
                } else {
                    self.view = View::List;
                    self.overlay = Overlay::None;
                }
            }
            Key::NewRequest => {
                self.reset_form();
                self.view = View::Create;
            }
            Key::Tab(j) => {
                if j <= self.form.furthest_tab {
                    self.form.active_tab = j;
                }
            }
            Key::Continue => {
                let tab = self.form.active_tab;
                if self.attempt(tab) {
                    self.form.active_tab = tab + 1;
                    self.form.furthest_tab = self.form.furthest_tab.max(tab + 1);
                }
            }
            Key::Send => self.send(),
            Key::AddWaypoint => {
                let at = self.form.waypoints.len().saturating_sub(1);
                self.form.waypoints.insert(at, WaypointForm::default());
            }
            Key::DateInput(picker) => {
                let month_offset = self.selected_month_offset(picker);
                self.overlay = Overlay::Calendar {
                    picker,
                    month_offset,
                    chosen: None,
                };
            }
            Key::NextMonth => {
                if let Overlay::Calendar { month_offset, chosen, .. } = &mut self.overlay {
                    *month_offset += 1;
                    *chosen = None;
                }
            }
            Key::DayCell(day) => {
                if let Overlay::Calendar { chosen, .. } = &mut self.overlay {
                    *chosen = Some(day);
                }
            }
            Key::CalendarSelect => {
                if let Overlay::Calendar { picker, month_offset, chosen: Some(day) } = self.overlay {
                    let date = self.month_start(month_offset).with_day(day);
                    let wp = picker / PICKERS_PER_WAYPOINT;
                    if let Some(form) = self.form.waypoints.get_mut(wp) {
                        form.dates[picker % PICKERS_PER_WAYPOINT] = date;
                    }
                }
                self.overlay = Overlay::None;
            }
            Key::Suggestion(choice) => {
                if let Overlay::Suggestions { waypoint, field } = self.overlay {
                    let form = &mut self.form.waypoints[waypoint];
                    form.inputs.insert(field, choice.clone());
                    if field == WaypointField::Country {
                        form.country = Some(choice);
                    }
                }
                self.overlay = Overlay::None;
            }
            Key::SaveToDirectory(i) => {
                if let Some(form) = self.form.waypoints.get_mut(i) {
                    form.save_to_directory = !form.save_to_directory;
                }
            }
            Key::CarrierLabel(id) | Key::CarrierCheckbox(id) => {
                if !self.form.carriers.remove(&id) {
                    self.form.carriers.insert(id);
                }
            }
            Key::DiscardConfirm => {
                self.reset_form();
                self.view = View::List;
            }
            Key::KeepEditing | Key::DeleteCancel => self.overlay = Overlay::None,
            Key::ActionMenuButton => self.overlay = Overlay::Menu,
            Key::MenuItem("Delete") => self.overlay = Overlay::DeleteDialog,
            Key::MenuItem(_) => self.overlay = Overlay::None,
            Key::DeleteConfirm => {
                if let View::Detail(id) = self.view {
                    let mut backend = self.backend.lock();
                    backend.requests.remove(&id);
                    backend.deleted.push(id);
                }
                self.overlay = Overlay::None;
                self.view = View::List;
            }
            Key::WaypointInput(..)
            | Key::LoginEmail
            | Key::LoginPassword
            | Key::CargoInput(_)
            | Key::Static => {}
        }
        Ok(())
    }

    fn send(&mut self) {
        let all_valid = (0..3).fold(true, |ok, tab| self.attempt(tab) && ok);
        if !all_valid {
            return;
        }
        let mut backend = self.backend.lock();
        let id = backend.next_id;
        backend.next_id += 1;
        for wp in self.form.waypoints.iter().filter(|wp| wp.save_to_directory) {
            let entry = match wp.input(WaypointField::Name) {
                "" => wp.input(WaypointField::City).to_string(),
                name => name.to_string(),
            };
            backend.directory.push(entry);
        }
        backend.requests.insert(
            id,
            StoredRequest {
                id,
                status: RequestStatus::BiddingActive,
                cities: self
                    .form
                    .waypoints
                    .iter()
                    .map(|wp| wp.input(WaypointField::City).to_string())
                    .collect(),
                countries: self
                    .form
                    .waypoints
                    .iter()
                    .map(|wp| wp.country.clone().unwrap_or_default())
                    .collect(),
                cargo: self.form.cargo.clone(),
                carrier_ids: self.form.carriers.iter().copied().collect(),
            },
        );
        drop(backend);
        debug!(id, "simulated request created");
        self.reset_form();
        self.view = View::Detail(id);
    }
}

#[async_trait]
impl Driver for SimDriver {
    async fn goto(&mut self, path: &str) -> E2eResult<()> {
        let view = if path == selectors::LOGIN_PATH {
            View::Login
        } else if !self.authenticated {
            View::Login
        } else if path == selectors::LIST_PATH {
            View::List
        } else if path == selectors::CREATE_PATH {
            self.reset_form();
            View::Create
        } else if let Some(caps) = DETAIL_ROUTE.captures(path) {
            let id = caps[1]
                .parse()
                .map_err(|_| E2eError::Driver(format!("bad request id in {}", path)))?;
            View::Detail(id)
        } else {
            return Err(E2eError::Driver(format!("404: {}", path)));
        };
        self.view = view;
        self.overlay = Overlay::None;
        self.touch();
        Ok(())
    }

    async fn click(&mut self, locator: &Locator) -> E2eResult<()> {
        let el = self.target(locator)?;
        self.activate(el.key)?;
        self.touch();
        Ok(())
    }

    async fn fill(&mut self, locator: &Locator, value: &str) -> E2eResult<()> {
        let dom = self.render();
        let idx = dom.strict(locator)?;
        let el = dom.get(idx);
        if el.value.is_none() {
            return Err(E2eError::locator(locator, "element is not an input"));
        }
        if !el.enabled {
            return Err(E2eError::locator(locator, "element is not enabled"));
        }
        match el.key.clone() {
            Key::LoginEmail => self.login.0 = value.to_string(),
            Key::LoginPassword => self.login.1 = value.to_string(),
            Key::WaypointInput(i, field) => {
                let form = &mut self.form.waypoints[i];
                form.inputs.insert(field, value.to_string());
                self.form.touched.insert((i, field));
                match field {
                    WaypointField::Country => {
                        form.country = None;
                        self.overlay = Overlay::Suggestions { waypoint: i, field };
                    }
                    WaypointField::Name if !value.is_empty() => {
                        self.overlay = Overlay::Suggestions { waypoint: i, field };
                    }
                    _ => {}
                }
            }
            Key::CargoInput(field) => {
                self.form.cargo.insert(field, value.to_string());
            }
            Key::DateInput(_) => {
                return Err(E2eError::locator(locator, "date inputs are read-only"));
            }
            _ => return Err(E2eError::locator(locator, "element is not editable")),
        }
        self.touch();
        Ok(())
    }

    async fn press(&mut self, locator: &Locator, key: &str) -> E2eResult<()> {
        let dom = self.render();
        dom.strict(locator)?;
        if key == "Escape" {
            self.overlay = Overlay::None;
            self.touch();
        }
        Ok(())
    }

    async fn set_checked(&mut self, locator: &Locator, checked: bool) -> E2eResult<()> {
        let el = self.target(locator)?;
        match el.checked {
            None => Err(E2eError::locator(locator, "element is not a checkbox")),
            Some(current) if current == checked => Ok(()),
            Some(_) => {
                self.activate(el.key)?;
                self.touch();
                Ok(())
            }
        }
    }

    async fn is_checked(&mut self, locator: &Locator) -> E2eResult<bool> {
        let el = self.read(locator)?;
        el.checked
            .ok_or_else(|| E2eError::locator(locator, "element is not a checkbox"))
    }

    async fn count(&mut self, locator: &Locator) -> E2eResult<usize> {
        self.tick();
        Ok(self.render().resolve(locator).len())
    }

    async fn is_visible(&mut self, locator: &Locator) -> E2eResult<bool> {
        self.tick();
        let hits = self.render().resolve(locator).len();
        match hits {
            0 => Ok(false),
            1 => Ok(true),
            n => Err(E2eError::locator(
                locator,
                format!("strict mode violation: {} elements match", n),
            )),
        }
    }

    async fn is_enabled(&mut self, locator: &Locator) -> E2eResult<bool> {
        Ok(self.read(locator)?.enabled)
    }

    async fn input_value(&mut self, locator: &Locator) -> E2eResult<String> {
        let el = self.read(locator)?;
        el.value
            .ok_or_else(|| E2eError::locator(locator, "element is not an input"))
    }

    async fn attribute(&mut self, locator: &Locator, name: &str) -> E2eResult<Option<String>> {
        let el = self.read(locator)?;
        Ok(el.attribute(name).map(String::from))
    }

    async fn current_path(&mut self) -> E2eResult<String> {
        self.tick();
        Ok(self.path())
    }

    async fn close(&mut self) -> E2eResult<()> {
        self.overlay = Overlay::None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn world() -> SimWorld {
        SimWorld::new(SimConfig {
            today: NaiveDate::from_ymd_opt(2026, 10, 19).unwrap(),
            settle_reads: 0,
            ..Default::default()
        })
    }

    async fn logged_in(world: &SimWorld) -> SimDriver {
        let mut s = world.session();
        s.goto("/login").await.unwrap();
        s.fill(&selectors::login_email(), "qa@example.com").await.unwrap();
        s.fill(&selectors::login_password(), "secret").await.unwrap();
        s.click(&selectors::login_button()).await.unwrap();
        s
    }

    #[tokio::test]
    async fn test_login_gate() {
        let world = world();
        let mut s = world.session();
        s.goto("/request/list").await.unwrap();
        assert_eq!(s.current_path().await.unwrap(), "/login");

        s.fill(&selectors::login_email(), "qa@example.com").await.unwrap();
        s.fill(&selectors::login_password(), "wrong").await.unwrap();
        s.click(&selectors::login_button()).await.unwrap();
        assert_eq!(s.current_path().await.unwrap(), "/login");
        assert_eq!(s.count(&Locator::text("Invalid credentials")).await.unwrap(), 1);

        let mut s = logged_in(&world).await;
        assert_eq!(s.current_path().await.unwrap(), "/request/list");
    }

    #[tokio::test]
    async fn test_overlay_intercepts_clicks() {
        let world = world();
        let mut s = logged_in(&world).await;
        s.click(&selectors::new_request_link()).await.unwrap();
        s.fill(&selectors::waypoint_field(0, WaypointField::Country), "Atlantis")
            .await
            .unwrap();
        assert_eq!(s.count(&selectors::no_results()).await.unwrap(), 1);

        let err = s.click(&selectors::continue_button()).await.unwrap_err();
        assert!(err.to_string().contains("intercepts"));

        s.press(&selectors::waypoint_field(0, WaypointField::Country), "Escape")
            .await
            .unwrap();
        s.click(&selectors::continue_button()).await.unwrap();
    }

    #[tokio::test]
    async fn test_typed_country_is_not_confirmed() {
        let world = world();
        let mut s = logged_in(&world).await;
        s.click(&selectors::new_request_link()).await.unwrap();
        s.fill(&selectors::waypoint_field(0, WaypointField::City), "Bratislava")
            .await
            .unwrap();
        s.fill(&selectors::waypoint_field(0, WaypointField::Country), "Slovakia")
            .await
            .unwrap();
        s.press(&selectors::waypoint_field(0, WaypointField::Country), "Escape")
            .await
            .unwrap();
        s.click(&selectors::continue_button()).await.unwrap();
        // waypoint 0 country + waypoint 1 city and country
        assert_eq!(s.count(&selectors::field_errors()).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_reactive_state_lags_until_observed() {
        let world = SimWorld::new(SimConfig {
            today: NaiveDate::from_ymd_opt(2026, 10, 19).unwrap(),
            settle_reads: 3,
            ..Default::default()
        });
        let mut s = logged_in(&world).await;
        s.click(&selectors::new_request_link()).await.unwrap();
        s.click(&selectors::continue_button()).await.unwrap();

        let errors = selectors::field_errors();
        assert_eq!(s.count(&errors).await.unwrap(), 0);
        assert_eq!(s.count(&errors).await.unwrap(), 0);
        assert_eq!(s.count(&errors).await.unwrap(), 4);
        assert!(!s.is_enabled(&selectors::continue_button()).await.unwrap());
    }

    #[tokio::test]
    async fn test_calendar_offsets_do_not_collide_with_day_cells() {
        let world = world();
        let mut s = logged_in(&world).await;
        s.click(&selectors::new_request_link()).await.unwrap();
        s.click(&selectors::date_input(0)).await.unwrap();
        // September's 28..30 render as offset cells, not gridcells
        assert_eq!(s.count(&selectors::day_cell(30)).await.unwrap(), 1);
        assert_eq!(s.count(&Locator::text("30")).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_calendar_reopens_on_selected_month() {
        let world = world();
        let mut s = logged_in(&world).await;
        s.click(&selectors::new_request_link()).await.unwrap();
        let november = selectors::calendar_caption("November 2026");

        s.click(&selectors::date_input(0)).await.unwrap();
        assert_eq!(s.count(&november).await.unwrap(), 0);
        s.click(&selectors::next_month_button()).await.unwrap();
        s.click(&selectors::day_cell(20)).await.unwrap();
        s.click(&selectors::calendar_select_button()).await.unwrap();

        s.click(&selectors::date_input(0)).await.unwrap();
        assert_eq!(s.count(&november).await.unwrap(), 1);
        // Other pickers still open on today's month
        s.press(&selectors::date_input(0), "Escape").await.unwrap();
        s.click(&selectors::date_input(3)).await.unwrap();
        assert_eq!(s.count(&november).await.unwrap(), 0);
    }
}
