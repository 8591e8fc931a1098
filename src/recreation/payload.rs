//! Recreation.gov availability payload decoding.
//!
//! The API answers with `{"payload": {...}}`. Only the fields below are
//! read; anything missing or of the wrong type surfaces as
//! `FetchError::MalformedResponse` instead of being guessed at.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate};
use serde::Deserialize;

use crate::common::error::{FetchError, FetchResult};
use crate::common::types::AvailableDates;

#[derive(Debug, Deserialize)]
struct Envelope {
    payload: Option<PermitPayload>,
}

/// Decoded `payload` object.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PermitPayload {
    /// Permit display name.
    #[serde(default)]
    pub name: Option<String>,
    /// Division ID -> division metadata.
    #[serde(default)]
    pub divisions: HashMap<String, DivisionMeta>,
    /// Date key (RFC 3339) -> spot counts.
    #[serde(default)]
    pub date_availability: Option<HashMap<String, DateSlot>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DivisionMeta {
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct DateSlot {
    pub remaining: i64,
}

/// Decode a raw response body.
pub fn decode(body: &[u8]) -> FetchResult<PermitPayload> {
    let envelope: Envelope = serde_json::from_slice(body)
        .map_err(|e| FetchError::malformed(format!("invalid JSON body: {}", e)))?;
    envelope
        .payload
        .ok_or_else(|| FetchError::malformed("missing 'payload' object"))
}

impl PermitPayload {
    /// Dates with at least one remaining spot.
    pub fn available_dates(&self) -> FetchResult<AvailableDates> {
        let slots = self
            .date_availability
            .as_ref()
            .ok_or_else(|| FetchError::malformed("missing 'date_availability'"))?;

        let mut dates = AvailableDates::new();
        for (key, slot) in slots {
            if slot.remaining <= 0 {
                continue;
            }
            let date = parse_date_key(key)
                .ok_or_else(|| FetchError::malformed(format!("invalid date key '{}'", key)))?;
            let remaining = u32::try_from(slot.remaining).unwrap_or(u32::MAX);
            dates.insert(date, remaining);
        }
        Ok(dates)
    }

    /// The display name of `division_id`, if the payload describes it.
    pub fn division_name(&self, division_id: &str) -> Option<&str> {
        self.divisions
            .get(division_id)
            .and_then(|meta| meta.name.as_deref())
            .and_then(non_blank)
    }

    pub fn permit_name(&self) -> Option<&str> {
        self.name.as_deref().and_then(non_blank)
    }
}

fn non_blank(name: &str) -> Option<&str> {
    let name = name.trim();
    (!name.is_empty()).then_some(name)
}

/// Normalise an availability key such as `2025-07-15T00:00:00Z` to its
/// UTC calendar date.
pub fn parse_date_key(key: &str) -> Option<NaiveDate> {
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(key) {
        return Some(timestamp.naive_utc().date());
    }
    key.get(..10)
        .and_then(|prefix| NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok())
}
