//! Declarative fixture data
//!
//! Waypoint dates are given as day offsets from the run's `today`, so the
//! same file works on any day the suite runs.

use std::path::Path;

use chrono::{Datelike, Duration, Months, NaiveDate};
use freightcheck_common::{CargoDetails, CarrierSelection, WaypointRecord, WaypointRole};
use serde::{Deserialize, Serialize};

use crate::error::{E2eError, E2eResult};

/// One stop, relative to the run date
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaypointFixture {
    pub city: String,
    pub country: String,

    /// Days from today to the earliest date
    #[serde(default = "default_day_offset")]
    pub day_offset: i64,

    /// Extra days between earliest and latest
    #[serde(default)]
    pub window_days: i64,

    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub street: Option<String>,
    #[serde(default)]
    pub post_code: Option<String>,
    #[serde(default)]
    pub contact_name: Option<String>,
    #[serde(default)]
    pub contact_email: Option<String>,
    #[serde(default)]
    pub contact_phone: Option<String>,

    /// Test addresses stay out of the shared directory unless asked
    #[serde(default)]
    pub persist_to_directory: bool,
}

fn default_day_offset() -> i64 {
    1
}

impl WaypointFixture {
    pub fn new(city: &str, country: &str, day_offset: i64) -> Self {
        Self {
            city: city.to_string(),
            country: country.to_string(),
            day_offset,
            window_days: 0,
            name: None,
            street: None,
            post_code: None,
            contact_name: None,
            contact_email: None,
            contact_phone: None,
            persist_to_directory: false,
        }
    }

    pub fn to_record(&self, role: WaypointRole, sequence_index: usize, today: NaiveDate) -> WaypointRecord {
        let earliest = today + Duration::days(self.day_offset);
        let latest = earliest + Duration::days(self.window_days);
        WaypointRecord {
            role,
            sequence_index,
            earliest,
            latest,
            name: self.name.clone(),
            street: self.street.clone(),
            city: self.city.clone(),
            country: self.country.clone(),
            post_code: self.post_code.clone(),
            contact_name: self.contact_name.clone(),
            contact_email: self.contact_email.clone(),
            contact_phone: self.contact_phone.clone(),
            persist_to_directory: self.persist_to_directory,
        }
    }
}

/// A named set of fixture data for one request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixtureSet {
    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub tags: Vec<String>,

    pub pickup: WaypointFixture,

    #[serde(default)]
    pub intermediates: Vec<WaypointFixture>,

    pub delivery: WaypointFixture,

    #[serde(default)]
    pub cargo: CargoDetails,

    pub carrier: CarrierSelection,
}

impl FixtureSet {
    /// Bratislava to Prague with only the mandatory fields, Demo carrier
    pub fn minimal() -> Self {
        Self {
            name: "minimal".to_string(),
            description: "Mandatory fields only".to_string(),
            tags: vec!["smoke".to_string()],
            pickup: WaypointFixture::new("Bratislava", "Slovakia", 1),
            intermediates: Vec::new(),
            delivery: WaypointFixture::new("Prague", "Czechia", 2),
            cargo: CargoDetails::default(),
            carrier: CarrierSelection {
                carrier_id: 17,
                chosen_via_group_label: "Demo carrier".to_string(),
            },
        }
    }

    /// The same route filled in the way a dispatcher would: names,
    /// addresses, contacts, a stop in Brno and full cargo details
    pub fn realistic() -> Self {
        let mut pickup = WaypointFixture::new("Bratislava", "Slovakia", 1);
        pickup.name = Some("QA Depot Bratislava".to_string());
        pickup.street = Some("Mlynske nivy 5".to_string());
        pickup.post_code = Some("821 09".to_string());
        pickup.contact_name = Some("Jana Novakova".to_string());
        pickup.contact_email = Some("jana.novakova@example.com".to_string());
        pickup.contact_phone = Some("+421 900 123 456".to_string());

        let mut stop = WaypointFixture::new("Brno", "Czechia", 2);
        stop.street = Some("Holandska 10".to_string());
        stop.post_code = Some("639 00".to_string());

        let mut delivery = WaypointFixture::new("Prague", "Czechia", 3);
        delivery.window_days = 1;
        delivery.name = Some("QA Warehouse Prague".to_string());
        delivery.street = Some("Na Florenci 7".to_string());
        delivery.post_code = Some("110 00".to_string());
        delivery.contact_name = Some("Petr Svoboda".to_string());
        delivery.contact_email = Some("petr.svoboda@example.com".to_string());

        Self {
            name: "realistic".to_string(),
            description: "Typical dispatcher input with an intermediate stop".to_string(),
            tags: vec!["regression".to_string()],
            pickup,
            intermediates: vec![stop],
            delivery,
            cargo: CargoDetails {
                reference: Some("QA-REF-0001".to_string()),
                description: Some("Palletised machine parts".to_string()),
                declared_value: Some("12500".to_string()),
                weight: Some("820.5".to_string()),
                volume: Some("2.4".to_string()),
                max_length: Some("1.2".to_string()),
            },
            carrier: CarrierSelection {
                carrier_id: 17,
                chosen_via_group_label: "Demo carrier".to_string(),
            },
        }
    }

    /// Parse a fixture set from a YAML string; day offsets are checked
    /// against `today`
    pub fn from_yaml(yaml: &str, today: NaiveDate) -> E2eResult<Self> {
        let set: Self = serde_yaml::from_str(yaml)?;
        set.validate(today)?;
        Ok(set)
    }

    pub fn from_file(path: &Path, today: NaiveDate) -> E2eResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content, today)
            .map_err(|e| E2eError::Fixture(format!("{}: {}", path.display(), e)))
    }

    /// Load every `.yaml`/`.yml` fixture under `dir`
    pub fn load_all(dir: &Path, today: NaiveDate) -> E2eResult<Vec<Self>> {
        let mut sets = Vec::new();
        for entry in walkdir::WalkDir::new(dir)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| {
                e.path()
                    .extension()
                    .map(|ext| ext == "yaml" || ext == "yml")
                    .unwrap_or(false)
            })
        {
            sets.push(Self::from_file(entry.path(), today)?);
        }
        Ok(sets)
    }

    /// Records in route order: pickup, intermediates, delivery
    pub fn waypoints(&self, today: NaiveDate) -> Vec<WaypointRecord> {
        let mut out = vec![self.pickup.to_record(WaypointRole::Pickup, 0, today)];
        for (i, stop) in self.intermediates.iter().enumerate() {
            out.push(stop.to_record(WaypointRole::Intermediate, i + 1, today));
        }
        out.push(
            self.delivery
                .to_record(WaypointRole::Delivery, self.intermediates.len() + 1, today),
        );
        out
    }

    /// Field-level checks on the data itself, plus that every date lands
    /// in the two months an empty picker can reach from `today`. Route
    /// ordering is left to the scenarios, which violate it on purpose.
    pub fn validate(&self, today: NaiveDate) -> E2eResult<()> {
        let last_reachable = today
            .with_day(1)
            .and_then(|d| d.checked_add_months(Months::new(2)))
            .and_then(|d| d.pred_opt())
            .ok_or_else(|| E2eError::Fixture(format!("no picker range around {}", today)))?;
        for record in self.waypoints(today) {
            record.validate()?;
            if record.earliest < today || record.latest > last_reachable {
                return Err(E2eError::Fixture(format!(
                    "{}: {} waypoint {}..{} is outside {}..{}",
                    self.name, record.role, record.earliest, record.latest, today, last_reachable
                )));
            }
        }
        self.cargo.validate()?;
        if self.carrier.chosen_via_group_label.trim().is_empty() {
            return Err(E2eError::Fixture(format!(
                "{}: carrier {} has no group label",
                self.name, self.carrier.carrier_id
            )));
        }
        Ok(())
    }
}
