//! Availability store and diff engine.
//!
//! Persists, per permit and division, the dates that had open spots at the
//! last successful fetch. Each reconcile replaces the stored set with the
//! fresh one, so a date that disappears and later returns counts as new.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::NaiveDate;
use tracing::error;

use crate::common::error::StoreError;
use crate::common::persist::{self, Loaded};
use crate::common::types::AvailableDates;

/// On-disk layout: permit ID -> division key -> date -> remaining spots.
pub type StateDocument = BTreeMap<String, BTreeMap<String, AvailableDates>>;

/// Outcome of reconciling one fetch against the stored state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffResult {
    /// No record existed for this pair before (as opposed to an empty one).
    pub is_first_observation: bool,
    /// Dates absent from the previous record, ascending.
    pub new_dates: Vec<(NaiveDate, u32)>,
    /// Dates in the previous record that are no longer available.
    pub removed_dates: Vec<NaiveDate>,
    /// Size of the fresh set.
    pub total_available: usize,
}

/// Durable per-target availability state.
#[derive(Debug)]
pub struct AvailabilityStore {
    path: PathBuf,
    records: StateDocument,
}

impl AvailabilityStore {
    /// Load the store from `path`.
    ///
    /// A missing document starts empty; an unreadable or malformed one is
    /// logged and also starts empty.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let records = match persist::load_json::<StateDocument>(&path) {
            Loaded::Found(records) => records,
            Loaded::Missing => StateDocument::new(),
            Loaded::Corrupt(reason) => {
                error!(
                    "Availability state at {} is unreadable ({}); starting from empty state",
                    path.display(),
                    reason
                );
                StateDocument::new()
            }
        };

        Self { path, records }
    }

    /// Stored dates for a permit/division pair, if any record exists.
    pub fn dates(&self, permit_id: &str, key: &str) -> Option<&AvailableDates> {
        self.records.get(permit_id).and_then(|divisions| divisions.get(key))
    }

    /// Diff `fresh` against the stored record and replace the record.
    ///
    /// On a write failure the in-memory record is restored and the error
    /// returned, so the same dates are reported again next cycle.
    pub async fn reconcile(
        &mut self,
        permit_id: &str,
        key: &str,
        fresh: AvailableDates,
    ) -> Result<DiffResult, StoreError> {
        let previous = self.dates(permit_id, key).cloned();
        let diff = diff(previous.as_ref(), &fresh);

        self.records
            .entry(permit_id.to_string())
            .or_default()
            .insert(key.to_string(), fresh);

        if let Err(e) = self.persist().await {
            self.restore(permit_id, key, previous);
            return Err(e);
        }
        Ok(diff)
    }

    /// Drop every record of a permit.
    pub async fn forget_permit(&mut self, permit_id: &str) -> Result<bool, StoreError> {
        let Some(removed) = self.records.remove(permit_id) else {
            return Ok(false);
        };
        if let Err(e) = self.persist().await {
            self.records.insert(permit_id.to_string(), removed);
            return Err(e);
        }
        Ok(true)
    }

    /// Drop the record of one permit/division pair.
    pub async fn forget_division(&mut self, permit_id: &str, key: &str) -> Result<bool, StoreError> {
        let Some(previous) = self.records.get_mut(permit_id).and_then(|d| d.remove(key)) else {
            return Ok(false);
        };
        if self.records.get(permit_id).is_some_and(|d| d.is_empty()) {
            self.records.remove(permit_id);
        }
        if let Err(e) = self.persist().await {
            self.restore(permit_id, key, Some(previous));
            return Err(e);
        }
        Ok(true)
    }

    fn restore(&mut self, permit_id: &str, key: &str, previous: Option<AvailableDates>) {
        match previous {
            Some(dates) => {
                self.records
                    .entry(permit_id.to_string())
                    .or_default()
                    .insert(key.to_string(), dates);
            }
            None => {
                if let Some(divisions) = self.records.get_mut(permit_id) {
                    divisions.remove(key);
                    if divisions.is_empty() {
                        self.records.remove(permit_id);
                    }
                }
            }
        }
    }

    async fn persist(&self) -> Result<(), StoreError> {
        persist::save_json(&self.path, &self.records)
            .await
            .map_err(|e| {
                error!("Failed to save availability state to {}: {}", self.path.display(), e);
                StoreError::from(e)
            })
    }
}

/// Compute the delta between a previous record and a fresh fetch.
///
/// Dates are compared by identity only; a changed spot count on a known
/// date is not new.
pub fn diff(previous: Option<&AvailableDates>, fresh: &AvailableDates) -> DiffResult {
    let Some(previous) = previous else {
        return DiffResult {
            is_first_observation: true,
            new_dates: fresh.iter().map(|(date, spots)| (*date, *spots)).collect(),
            removed_dates: Vec::new(),
            total_available: fresh.len(),
        };
    };

    let new_dates = fresh
        .iter()
        .filter(|(date, _)| !previous.contains_key(date))
        .map(|(date, spots)| (*date, *spots))
        .collect();
    let removed_dates: Vec<NaiveDate> = previous
        .keys()
        .filter(|date| !fresh.contains_key(date))
        .copied()
        .collect();
    DiffResult {
        is_first_observation: false,
        new_dates,
        removed_dates,
        total_available: fresh.len(),
    }
}
