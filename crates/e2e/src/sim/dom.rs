//! Element tree rendered by the simulator and locator resolution over it

use freightcheck_common::{CargoField, WaypointField};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::driver::{Locator, TextMatch};
use crate::error::{E2eError, E2eResult};

/// What an element does when acted upon
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Key {
    LoginEmail,
    LoginPassword,
    LoginButton,
    NavRequests,
    NewRequest,
    Tab(usize),
    Continue,
    Send,
    AddWaypoint,
    WaypointInput(usize, WaypointField),
    SaveToDirectory(usize),
    DateInput(usize),
    NextMonth,
    DayCell(u32),
    CalendarSelect,
    Suggestion(String),
    CargoInput(CargoField),
    CarrierLabel(u32),
    CarrierCheckbox(u32),
    DiscardConfirm,
    KeepEditing,
    ActionMenuButton,
    MenuItem(&'static str),
    DeleteConfirm,
    DeleteCancel,
    Static,
}

#[derive(Debug, Clone)]
pub(crate) struct Element {
    pub key: Key,
    pub tag: &'static str,
    pub role: Option<&'static str>,
    pub name: Option<String>,
    pub text: Option<String>,
    pub attrs: Vec<(&'static str, String)>,
    pub classes: Vec<&'static str>,
    pub parent: Option<usize>,
    pub enabled: bool,
    pub checked: Option<bool>,
    pub value: Option<String>,
    /// Root of a floating layer that swallows clicks aimed elsewhere
    pub overlay: bool,
}

impl Element {
    pub fn new(key: Key, tag: &'static str) -> Self {
        Self {
            key,
            tag,
            role: None,
            name: None,
            text: None,
            attrs: Vec::new(),
            classes: Vec::new(),
            parent: None,
            enabled: true,
            checked: None,
            value: None,
            overlay: false,
        }
    }

    pub fn role(mut self, role: &'static str) -> Self {
        self.role = Some(role);
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn attr(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.attrs.push((name, value.into()));
        self
    }

    pub fn class(mut self, class: &'static str) -> Self {
        self.classes.push(class);
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn checked(mut self, checked: bool) -> Self {
        self.checked = Some(checked);
        self
    }

    pub fn value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn overlay(mut self) -> Self {
        self.overlay = true;
        self
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| *k == name)
            .map(|(_, v)| v.as_str())
    }

    fn accessible_name(&self) -> Option<&str> {
        self.name.as_deref().or(self.text.as_deref())
    }
}

static CSS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^(?P<tag>[a-z]+)?(?:#(?P<id>[\w-]+)|\.(?P<class>[\w-]+)|\[(?P<attr>[\w-]+)="(?P<val>[^"]*)"\])?$"#)
        .expect("static css grammar")
});

fn css_matches(el: &Element, selector: &str) -> bool {
    let Some(caps) = CSS.captures(selector.trim()) else {
        return false;
    };
    if let Some(tag) = caps.name("tag") {
        if tag.as_str() != el.tag {
            return false;
        }
    }
    if let Some(id) = caps.name("id") {
        return el.attribute("id") == Some(id.as_str());
    }
    if let Some(class) = caps.name("class") {
        return el.classes.contains(&class.as_str());
    }
    if let (Some(attr), Some(val)) = (caps.name("attr"), caps.name("val")) {
        return el.attribute(attr.as_str()) == Some(val.as_str());
    }
    caps.name("tag").is_some()
}

fn text_matches(m: &TextMatch, candidate: Option<&str>) -> bool {
    candidate.map(|c| m.matches(c)).unwrap_or(false)
}

#[derive(Debug, Default)]
pub(crate) struct Dom {
    pub elements: Vec<Element>,
}

impl Dom {
    pub fn push(&mut self, el: Element) -> usize {
        self.elements.push(el);
        self.elements.len() - 1
    }

    pub fn push_under(&mut self, parent: usize, mut el: Element) -> usize {
        el.parent = Some(parent);
        self.push(el)
    }

    /// Indices of matching elements in document order
    pub fn resolve(&self, locator: &Locator) -> Vec<usize> {
        match locator {
            Locator::Css(sel) => self.filter(|el| css_matches(el, sel)),
            Locator::Role { role, name } => self.filter(|el| {
                el.role == Some(role.as_str())
                    && name
                        .as_ref()
                        .map(|m| text_matches(m, el.accessible_name()))
                        .unwrap_or(true)
            }),
            Locator::Text(m) => self.filter(|el| text_matches(m, el.text.as_deref())),
            Locator::Nth(inner, i) => self.resolve(inner).get(*i).copied().into_iter().collect(),
            Locator::Within { scope, inner } => {
                let scopes = self.resolve(scope);
                self.resolve(inner)
                    .into_iter()
                    .filter(|idx| self.ancestors(*idx).any(|a| scopes.contains(&a)))
                    .collect()
            }
        }
    }

    /// Exactly one match, as Playwright's strict mode demands for actions
    pub fn strict(&self, locator: &Locator) -> E2eResult<usize> {
        let hits = self.resolve(locator);
        match hits.as_slice() {
            [one] => Ok(*one),
            [] => Err(E2eError::locator(locator, "no element matches")),
            many => Err(E2eError::locator(
                locator,
                format!("strict mode violation: {} elements match", many.len()),
            )),
        }
    }

    pub fn get(&self, idx: usize) -> &Element {
        &self.elements[idx]
    }

    /// Whether `idx` sits inside an overlay root (or is one)
    pub fn in_overlay(&self, idx: usize) -> bool {
        self.elements[idx].overlay || self.ancestors(idx).any(|a| self.elements[a].overlay)
    }

    pub fn has_overlay(&self) -> bool {
        self.elements.iter().any(|el| el.overlay)
    }

    fn ancestors(&self, idx: usize) -> impl Iterator<Item = usize> + '_ {
        std::iter::successors(self.elements[idx].parent, move |p| self.elements[*p].parent)
    }

    fn filter<F: Fn(&Element) -> bool>(&self, pred: F) -> Vec<usize> {
        self.elements
            .iter()
            .enumerate()
            .filter(|(_, el)| pred(el))
            .map(|(i, _)| i)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Dom {
        let mut dom = Dom::default();
        dom.push(Element::new(Key::Static, "input").attr("id", "waypoints[0].city"));
        let menu = dom.push(Element::new(Key::Static, "div").role("menu").overlay());
        dom.push_under(menu, Element::new(Key::MenuItem("Delete"), "div").role("menuitem").text("Delete"));
        let dialog = dom.push(Element::new(Key::Static, "div").role("dialog").overlay());
        dom.push_under(dialog, Element::new(Key::Static, "span").class("dialog-title").text("Delete"));
        dom.push_under(dialog, Element::new(Key::DeleteConfirm, "button").role("button").text("Delete"));
        dom.push(Element::new(Key::Static, "input").attr("data-test-id", "dp-input"));
        dom.push(Element::new(Key::Static, "input").attr("data-test-id", "dp-input"));
        dom
    }

    #[test]
    fn test_css_forms() {
        let dom = sample();
        assert_eq!(dom.resolve(&Locator::css("[id=\"waypoints[0].city\"]")).len(), 1);
        assert_eq!(dom.resolve(&Locator::css("input[data-test-id=\"dp-input\"]")).len(), 2);
        assert_eq!(dom.resolve(&Locator::css(".dialog-title")).len(), 1);
        assert_eq!(dom.resolve(&Locator::css("#missing")).len(), 0);
    }

    #[test]
    fn test_bare_text_is_ambiguous() {
        let dom = sample();
        let err = dom.strict(&Locator::text("Delete")).unwrap_err();
        assert!(err.to_string().contains("strict mode violation"));
    }

    #[test]
    fn test_scoped_locators_disambiguate() {
        let dom = sample();
        let confirm = dom
            .strict(&Locator::role("button", "Delete").within(Locator::any_role("dialog")))
            .unwrap();
        assert_eq!(dom.get(confirm).key, Key::DeleteConfirm);

        let item = dom
            .strict(&Locator::role("menuitem", "Delete").within(Locator::any_role("menu")))
            .unwrap();
        assert_eq!(dom.get(item).key, Key::MenuItem("Delete"));
        assert!(dom.in_overlay(item));
    }

    #[test]
    fn test_nth() {
        let dom = sample();
        let loc = Locator::css("[data-test-id=\"dp-input\"]");
        assert_eq!(dom.resolve(&loc.clone().nth(1)).len(), 1);
        assert!(dom.resolve(&loc.nth(2)).is_empty());
    }
}
