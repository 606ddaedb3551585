//! Core types for freightcheck

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};

/// Test identity used to sign in.
///
/// Both halves are redacted from `Debug` output so a stray `{:?}` in a log
/// line cannot leak them.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    identifier: String,
    secret: String,
}

impl Credentials {
    pub fn new(identifier: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            secret: secret.into(),
        }
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn secret(&self) -> &str {
        &self.secret
    }

    pub fn is_complete(&self) -> bool {
        !self.identifier.trim().is_empty() && !self.secret.is_empty()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("identifier", &"<redacted>")
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Position of a stop within the route
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaypointRole {
    Pickup,
    Delivery,
    Intermediate,
}

impl fmt::Display for WaypointRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WaypointRole::Pickup => write!(f, "pickup"),
            WaypointRole::Delivery => write!(f, "delivery"),
            WaypointRole::Intermediate => write!(f, "intermediate"),
        }
    }
}

/// Text inputs of one waypoint section, in form order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaypointField {
    Name,
    Street,
    City,
    PostCode,
    Country,
    ContactName,
    ContactEmail,
    ContactPhone,
}

impl WaypointField {
    pub const ALL: [WaypointField; 8] = [
        WaypointField::Name,
        WaypointField::Street,
        WaypointField::City,
        WaypointField::PostCode,
        WaypointField::Country,
        WaypointField::ContactName,
        WaypointField::ContactEmail,
        WaypointField::ContactPhone,
    ];

    /// Key used in the form's element ids (`waypoints[0].<key>`)
    pub fn key(&self) -> &'static str {
        match self {
            WaypointField::Name => "name",
            WaypointField::Street => "street",
            WaypointField::City => "city",
            WaypointField::PostCode => "postCode",
            WaypointField::Country => "country",
            WaypointField::ContactName => "contactName",
            WaypointField::ContactEmail => "contactEmail",
            WaypointField::ContactPhone => "contactPhone",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.key() == key)
    }

    pub fn is_required(&self) -> bool {
        matches!(self, WaypointField::City | WaypointField::Country)
    }
}

/// One stop of a transport request, as literal fixture data
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaypointRecord {
    pub role: WaypointRole,
    pub sequence_index: usize,
    pub earliest: NaiveDate,
    pub latest: NaiveDate,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub street: Option<String>,
    pub city: String,
    pub country: String,
    #[serde(default)]
    pub post_code: Option<String>,
    #[serde(default)]
    pub contact_name: Option<String>,
    #[serde(default)]
    pub contact_email: Option<String>,
    #[serde(default)]
    pub contact_phone: Option<String>,
    #[serde(default)]
    pub persist_to_directory: bool,
}

impl WaypointRecord {
    /// A record with only the mandatory parts filled in. The window is a
    /// single day and the address is kept out of the directory.
    pub fn new(
        role: WaypointRole,
        sequence_index: usize,
        date: NaiveDate,
        city: impl Into<String>,
        country: impl Into<String>,
    ) -> Self {
        Self {
            role,
            sequence_index,
            earliest: date,
            latest: date,
            name: None,
            street: None,
            city: city.into(),
            country: country.into(),
            post_code: None,
            contact_name: None,
            contact_email: None,
            contact_phone: None,
            persist_to_directory: false,
        }
    }

    pub fn with_window(mut self, earliest: NaiveDate, latest: NaiveDate) -> Self {
        self.earliest = earliest;
        self.latest = latest;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_street(mut self, street: impl Into<String>, post_code: impl Into<String>) -> Self {
        self.street = Some(street.into());
        self.post_code = Some(post_code.into());
        self
    }

    pub fn with_contact(
        mut self,
        name: impl Into<String>,
        email: impl Into<String>,
        phone: impl Into<String>,
    ) -> Self {
        self.contact_name = Some(name.into());
        self.contact_email = Some(email.into());
        self.contact_phone = Some(phone.into());
        self
    }

    /// Value the record carries for a form field. Required fields always
    /// yield `Some`, even when empty.
    pub fn value(&self, field: WaypointField) -> Option<&str> {
        match field {
            WaypointField::Name => self.name.as_deref(),
            WaypointField::Street => self.street.as_deref(),
            WaypointField::City => Some(self.city.as_str()),
            WaypointField::PostCode => self.post_code.as_deref(),
            WaypointField::Country => Some(self.country.as_str()),
            WaypointField::ContactName => self.contact_name.as_deref(),
            WaypointField::ContactEmail => self.contact_email.as_deref(),
            WaypointField::ContactPhone => self.contact_phone.as_deref(),
        }
    }

    /// Check the record-local invariants: city and country present and a
    /// window that does not run backwards.
    pub fn validate(&self) -> Result<()> {
        let record = format!("{} waypoint {}", self.role, self.sequence_index);
        if self.city.trim().is_empty() {
            return Err(Error::MissingField {
                record,
                field: "city".to_string(),
            });
        }
        if self.country.trim().is_empty() {
            return Err(Error::MissingField {
                record,
                field: "country".to_string(),
            });
        }
        if self.earliest > self.latest {
            return Err(Error::InvertedWindow {
                earliest: self.earliest.to_string(),
                latest: self.latest.to_string(),
            });
        }
        Ok(())
    }

    /// Whether this waypoint may follow `prev` on the route
    pub fn follows(&self, prev: &WaypointRecord) -> bool {
        self.earliest >= prev.latest
    }
}

/// Inputs on the cargo tab
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CargoField {
    Reference,
    Description,
    Value,
    Weight,
    Volume,
    Length,
}

impl CargoField {
    pub const ALL: [CargoField; 6] = [
        CargoField::Reference,
        CargoField::Description,
        CargoField::Value,
        CargoField::Weight,
        CargoField::Volume,
        CargoField::Length,
    ];

    pub const NUMERIC: [CargoField; 4] = [
        CargoField::Value,
        CargoField::Length,
        CargoField::Weight,
        CargoField::Volume,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            CargoField::Reference => "reference",
            CargoField::Description => "description",
            CargoField::Value => "value",
            CargoField::Weight => "weight",
            CargoField::Volume => "volume",
            CargoField::Length => "length",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.key() == key)
    }

    pub fn is_numeric(&self) -> bool {
        Self::NUMERIC.contains(self)
    }
}

/// Cargo tab contents. Numeric values are kept as the literal text typed
/// into the spinner so negative and fractional inputs survive unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CargoDetails {
    #[serde(default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub declared_value: Option<String>,
    #[serde(default)]
    pub weight: Option<String>,
    #[serde(default)]
    pub volume: Option<String>,
    #[serde(default)]
    pub max_length: Option<String>,
}

impl CargoDetails {
    /// The same value written into every numeric field
    pub fn uniform_numeric(value: &str) -> Self {
        Self {
            declared_value: Some(value.to_string()),
            weight: Some(value.to_string()),
            volume: Some(value.to_string()),
            max_length: Some(value.to_string()),
            ..Default::default()
        }
    }

    pub fn value(&self, field: CargoField) -> Option<&str> {
        match field {
            CargoField::Reference => self.reference.as_deref(),
            CargoField::Description => self.description.as_deref(),
            CargoField::Value => self.declared_value.as_deref(),
            CargoField::Weight => self.weight.as_deref(),
            CargoField::Volume => self.volume.as_deref(),
            CargoField::Length => self.max_length.as_deref(),
        }
    }

    /// Set fields paired with their values, in form order
    pub fn entries(&self) -> Vec<(CargoField, &str)> {
        CargoField::ALL
            .into_iter()
            .filter_map(|f| self.value(f).map(|v| (f, v)))
            .collect()
    }

    /// Numeric fields holding a negative magnitude
    pub fn negative_fields(&self) -> Vec<CargoField> {
        CargoField::NUMERIC
            .into_iter()
            .filter(|f| {
                self.value(*f)
                    .and_then(|v| v.trim().parse::<f64>().ok())
                    .map(|v| v < 0.0)
                    .unwrap_or(false)
            })
            .collect()
    }

    /// Reject numeric entries that are not a signed decimal
    pub fn validate(&self) -> Result<()> {
        for field in CargoField::NUMERIC {
            if let Some(v) = self.value(field) {
                if !is_signed_decimal(v) {
                    return Err(Error::InvalidValue {
                        field: field.key().to_string(),
                        value: v.to_string(),
                        reason: "expected a signed decimal".to_string(),
                    });
                }
            }
        }
        Ok(())
    }
}

/// `-?digits(.digits)?`
pub fn is_signed_decimal(s: &str) -> bool {
    let body = s.strip_prefix('-').unwrap_or(s);
    let mut parts = body.splitn(2, '.');
    let int = parts.next().unwrap_or("");
    let frac = parts.next();
    let digits = |p: &str| !p.is_empty() && p.chars().all(|c| c.is_ascii_digit());
    digits(int) && frac.map(digits).unwrap_or(true)
}

/// Carrier picked on the carriers tab
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CarrierSelection {
    pub carrier_id: u32,
    pub chosen_via_group_label: String,
}

/// Lifecycle status shown on the request detail view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Draft,
    BiddingActive,
    Closed,
    Cancelled,
}

impl RequestStatus {
    pub const ALL: [RequestStatus; 4] = [
        RequestStatus::Draft,
        RequestStatus::BiddingActive,
        RequestStatus::Closed,
        RequestStatus::Cancelled,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            RequestStatus::Draft => "Draft",
            RequestStatus::BiddingActive => "Bidding active",
            RequestStatus::Closed => "Closed",
            RequestStatus::Cancelled => "Cancelled",
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, RequestStatus::BiddingActive)
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl std::str::FromStr for RequestStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim();
        RequestStatus::ALL
            .into_iter()
            .find(|st| st.label().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| Error::UnknownStatus(wanted.to_string()))
    }
}

/// The artifact created by submitting the wizard
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportRequest {
    pub id: u64,
    pub status: RequestStatus,
    pub waypoints: Vec<WaypointRecord>,
    pub cargo: CargoDetails,
    pub carrier: CarrierSelection,
}

impl TransportRequest {
    /// Detail view route for this request
    pub fn detail_path(&self) -> String {
        format!("/request/{}", self.id)
    }
}
