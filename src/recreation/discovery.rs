//! Division discovery.
//!
//! Recreation.gov offers no listing of a permit's divisions, so candidate
//! IDs are probed one at a time from fixed ranges. Consecutive probes are
//! spaced by a fixed delay to stay under the upstream throttling threshold,
//! including probes from separate commands.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::config::{DiscoveryConfig, ProbeRange};
use crate::recreation::AvailabilitySource;

/// A division that answered a probe with a name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeHit {
    pub division_name: String,
    /// Permit name from the same response.
    pub permit_name: Option<String>,
}

/// Outcome of a discovery run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Discovered {
    /// Division ID -> display name.
    pub divisions: BTreeMap<String, String>,
    pub permit_name: Option<String>,
}

/// Best-effort division prober.
pub struct DivisionDiscovery<S> {
    source: Arc<S>,
    ranges: Vec<ProbeRange>,
    min_divisions: usize,
    probe_delay: Duration,
    last_probe: Mutex<Option<Instant>>,
}

impl<S: AvailabilitySource> DivisionDiscovery<S> {
    pub fn new(source: Arc<S>, config: &DiscoveryConfig) -> Self {
        Self {
            source,
            ranges: config.ranges.clone(),
            min_divisions: config.min_divisions.max(1),
            probe_delay: config.probe_delay(),
            last_probe: Mutex::new(None),
        }
    }

    /// Probe candidate ranges in order until `min_divisions` are found or
    /// every candidate has been tried.
    ///
    /// Never fails; an empty map means the permit has no discoverable
    /// divisions.
    pub async fn discover(&self, permit_id: &str) -> Discovered {
        let mut found = Discovered::default();
        let mut probes = 0usize;

        info!("Discovering divisions for permit {}...", permit_id);

        'ranges: for range in &self.ranges {
            debug!(
                "Probing divisions {}..={} for permit {}",
                range.start, range.end, permit_id
            );
            for candidate in range.candidates() {
                probes += 1;

                let division_id = candidate.to_string();
                if let Some(hit) = self.probe(permit_id, &division_id).await {
                    info!(
                        "Found division {} ({}) for permit {}",
                        division_id, hit.division_name, permit_id
                    );
                    found.divisions.insert(division_id, hit.division_name);
                    if found.permit_name.is_none() {
                        found.permit_name = hit.permit_name;
                    }
                    if found.divisions.len() >= self.min_divisions {
                        break 'ranges;
                    }
                }
            }
        }

        info!(
            "Discovery for permit {} finished: {} division(s) after {} probe(s)",
            permit_id,
            found.divisions.len(),
            probes
        );
        found
    }

    /// Probe a single division, returning its name if the response
    /// describes it.
    pub async fn probe(&self, permit_id: &str, division_id: &str) -> Option<ProbeHit> {
        self.wait_for_slot().await;

        match self.source.fetch(permit_id, Some(division_id)).await {
            Ok(payload) => {
                let Some(division_name) = payload.division_name(division_id) else {
                    debug!("Division {} of permit {}: no name in response", division_id, permit_id);
                    return None;
                };
                Some(ProbeHit {
                    division_name: division_name.to_string(),
                    permit_name: payload.permit_name().map(str::to_string),
                })
            }
            Err(e) => {
                debug!("Division {} of permit {}: {}", division_id, permit_id, e);
                None
            }
        }
    }

    /// Sleep until `probe_delay` has passed since the previous probe.
    async fn wait_for_slot(&self) {
        let mut last_probe = self.last_probe.lock().await;
        if let Some(last) = *last_probe {
            tokio::time::sleep_until(last + self.probe_delay).await;
        }
        *last_probe = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    use futures::future::{BoxFuture, FutureExt};

    use crate::common::error::{FetchError, FetchResult};
    use crate::recreation::payload::{DivisionMeta, PermitPayload};

    /// Answers probes from a fixed division table and records call times.
    #[derive(Default)]
    struct ProbeSource {
        divisions: HashMap<String, String>,
        calls: Mutex<Vec<(String, Instant)>>,
    }

    impl ProbeSource {
        fn with(divisions: &[(&str, &str)]) -> Arc<Self> {
            Arc::new(Self {
                divisions: divisions
                    .iter()
                    .map(|(id, name)| (id.to_string(), name.to_string()))
                    .collect(),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn probed(&self) -> Vec<String> {
            self.calls.lock().unwrap().iter().map(|(id, _)| id.clone()).collect()
        }
    }

    impl AvailabilitySource for ProbeSource {
        fn fetch<'a>(
            &'a self,
            _permit_id: &'a str,
            division_id: Option<&'a str>,
        ) -> BoxFuture<'a, FetchResult<PermitPayload>> {
            let division_id = division_id.unwrap_or_default().to_string();
            self.calls
                .lock()
                .unwrap()
                .push((division_id.clone(), Instant::now()));

            let result = match self.divisions.get(&division_id) {
                Some(name) => {
                    let mut payload = PermitPayload {
                        name: Some("Test Permit".to_string()),
                        ..PermitPayload::default()
                    };
                    payload.divisions.insert(
                        division_id,
                        DivisionMeta {
                            name: Some(name.clone()),
                        },
                    );
                    Ok(payload)
                }
                None => Err(FetchError::Status { status: 404 }),
            };
            async move { result }.boxed()
        }
    }

    fn config(ranges: &[(u32, u32)], min_divisions: usize) -> DiscoveryConfig {
        DiscoveryConfig {
            probe_delay_ms: 300,
            min_divisions,
            ranges: ranges
                .iter()
                .map(|&(start, end)| ProbeRange { start, end })
                .collect(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_stops_after_minimum_found() {
        let source = ProbeSource::with(&[("1", "Rio Chama")]);
        let discovery = DivisionDiscovery::new(source.clone(), &DiscoveryConfig::default());

        let found = discovery.discover("621743").await;

        assert_eq!(found.divisions.len(), 1);
        assert_eq!(found.divisions["1"], "Rio Chama");
        assert_eq!(found.permit_name.as_deref(), Some("Test Permit"));
        assert_eq!(source.probed(), vec!["1"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ranges_probed_in_order() {
        let source = ProbeSource::with(&[("371", "Deerlodge"), ("380", "Gates of Lodore")]);
        let discovery = DivisionDiscovery::new(source.clone(), &config(&[(1, 3), (370, 385)], 2));

        let found = discovery.discover("250014").await;

        assert_eq!(found.divisions.len(), 2);
        let probed = source.probed();
        assert_eq!(&probed[..4], &["1", "2", "3", "370"]);
        assert_eq!(probed.last().map(String::as_str), Some("380"));
        assert_eq!(probed.len(), 3 + 11);
    }

    #[tokio::test(start_paused = true)]
    async fn test_nothing_found_returns_empty_after_all_ranges() {
        let source = ProbeSource::with(&[]);
        let discovery = DivisionDiscovery::new(source.clone(), &config(&[(1, 5), (10, 12)], 1));

        let found = discovery.discover("999999").await;

        assert!(found.divisions.is_empty());
        assert_eq!(found.permit_name, None);
        assert_eq!(source.probed().len(), 5 + 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_probes_are_rate_limited() {
        let source = ProbeSource::with(&[]);
        let discovery = DivisionDiscovery::new(source.clone(), &config(&[(1, 4), (7, 8)], 1));

        discovery.discover("999999").await;

        let calls = source.calls.lock().unwrap();
        for pair in calls.windows(2) {
            assert!(pair[1].1 - pair[0].1 >= Duration::from_millis(300));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_nameless_division_is_invalid() {
        struct NamelessSource;

        impl AvailabilitySource for NamelessSource {
            fn fetch<'a>(
                &'a self,
                _permit_id: &'a str,
                _division_id: Option<&'a str>,
            ) -> BoxFuture<'a, FetchResult<PermitPayload>> {
                async { Ok(PermitPayload::default()) }.boxed()
            }
        }

        let discovery = DivisionDiscovery::new(Arc::new(NamelessSource), &config(&[(1, 3)], 1));
        assert_eq!(discovery.probe("1", "1").await, None);
        assert!(discovery.discover("1").await.divisions.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_spans_separate_calls() {
        let source = ProbeSource::with(&[("1", "Rio Chama")]);
        let discovery = DivisionDiscovery::new(source.clone(), &config(&[(1, 2)], 1));

        discovery.discover("621743").await;
        discovery.probe("621743", "5").await;
        discovery.discover("621743").await;

        let calls = source.calls.lock().unwrap();
        assert_eq!(calls.len(), 3);
        for pair in calls.windows(2) {
            assert!(pair[1].1 - pair[0].1 >= Duration::from_millis(300));
        }
    }
}
