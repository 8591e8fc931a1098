//! Shared types used across the application.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Availability store key used for permits polled without divisions.
pub const WHOLE_PERMIT_KEY: &str = "*";

/// Dates with at least one remaining spot, mapped to the remaining count.
pub type AvailableDates = BTreeMap<NaiveDate, u32>;

/// Registry record for one monitored permit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermitEntry {
    /// Display name.
    pub name: String,
    /// Division ID -> division display name.
    #[serde(default)]
    pub divisions: BTreeMap<String, String>,
}

impl PermitEntry {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            divisions: BTreeMap::new(),
        }
    }

    pub fn with_division(mut self, id: impl Into<String>, name: impl Into<String>) -> Self {
        self.divisions.insert(id.into(), name.into());
        self
    }
}

/// A permit entry together with its ID, as returned by registry listings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitoredPermit {
    pub id: String,
    pub entry: PermitEntry,
}

impl MonitoredPermit {
    /// Expand this permit into the targets the poller fetches.
    ///
    /// A permit without divisions is polled as a whole.
    pub fn targets(&self) -> Vec<PollTarget> {
        if self.entry.divisions.is_empty() {
            return vec![PollTarget {
                permit_id: self.id.clone(),
                permit_name: self.entry.name.clone(),
                division: None,
            }];
        }

        self.entry
            .divisions
            .iter()
            .map(|(division_id, division_name)| PollTarget {
                permit_id: self.id.clone(),
                permit_name: self.entry.name.clone(),
                division: Some(Division {
                    id: division_id.clone(),
                    name: division_name.clone(),
                }),
            })
            .collect()
    }
}

/// A division reference inside a poll target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Division {
    pub id: String,
    pub name: String,
}

/// One unit of polling: a permit, optionally narrowed to a division.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollTarget {
    pub permit_id: String,
    pub permit_name: String,
    pub division: Option<Division>,
}

impl PollTarget {
    pub fn division_id(&self) -> Option<&str> {
        self.division.as_ref().map(|d| d.id.as_str())
    }

    /// Key of this target inside the permit's availability record.
    pub fn store_key(&self) -> &str {
        self.division_id().unwrap_or(WHOLE_PERMIT_KEY)
    }

    /// Human-readable label, e.g. "Green River - Gates of Lodore".
    pub fn label(&self) -> String {
        match &self.division {
            Some(division) => format!("{} - {}", self.permit_name, division.name),
            None => self.permit_name.clone(),
        }
    }
}
