//! Recreation.gov HTTP client.

use std::time::Duration;

use chrono::{Days, Local, NaiveDate};
use futures::future::{BoxFuture, FutureExt};
use reqwest::header::{self, HeaderMap, HeaderValue};
use tracing::debug;

use crate::common::error::{FetchError, FetchResult};
use crate::config::RecreationConfig;
use crate::recreation::payload::{self, PermitPayload};
use crate::recreation::AvailabilitySource;

const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 \
    (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Client for the permit availability endpoints.
///
/// The API rejects requests that do not look like they come from the
/// recreation.gov web app, so every request carries browser headers.
#[derive(Debug, Clone)]
pub struct RecreationClient {
    http: reqwest::Client,
    base_url: String,
    lookahead_days: u32,
}

impl RecreationClient {
    pub fn new(config: &RecreationConfig) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(header::USER_AGENT, HeaderValue::from_static(USER_AGENT));
        headers.insert(
            header::ACCEPT,
            HeaderValue::from_static("application/json, text/plain, */*"),
        );
        headers.insert(
            header::ACCEPT_LANGUAGE,
            HeaderValue::from_static("en-US,en;q=0.9"),
        );
        headers.insert(
            header::ORIGIN,
            HeaderValue::from_static("https://www.recreation.gov"),
        );
        headers.insert(
            header::REFERER,
            HeaderValue::from_static("https://www.recreation.gov/"),
        );
        headers.insert("apikey", HeaderValue::from_str(config.api_key.trim())?);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            lookahead_days: config.lookahead_days,
        })
    }

    fn availability_url(&self, permit_id: &str, division_id: Option<&str>) -> String {
        availability_url(&self.base_url, permit_id, division_id)
    }

    async fn get_payload(
        &self,
        permit_id: &str,
        division_id: Option<&str>,
    ) -> FetchResult<PermitPayload> {
        let url = self.availability_url(permit_id, division_id);
        let (start_date, end_date) = date_window(Local::now().date_naive(), self.lookahead_days);
        debug!("GET {} ({} .. {})", url, start_date, end_date);

        let response = self
            .http
            .get(&url)
            .query(&[
                ("start_date", start_date.as_str()),
                ("end_date", end_date.as_str()),
                ("commercial_acct", "false"),
                ("is_lottery", "false"),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await?;
        payload::decode(&body)
    }
}

impl AvailabilitySource for RecreationClient {
    fn fetch<'a>(
        &'a self,
        permit_id: &'a str,
        division_id: Option<&'a str>,
    ) -> BoxFuture<'a, FetchResult<PermitPayload>> {
        self.get_payload(permit_id, division_id).boxed()
    }
}

fn availability_url(base_url: &str, permit_id: &str, division_id: Option<&str>) -> String {
    match division_id {
        Some(division_id) => format!(
            "{}/api/permits/{}/divisions/{}/availability",
            base_url, permit_id, division_id
        ),
        None => format!("{}/api/permits/{}/availability", base_url, permit_id),
    }
}

/// Query window `[today, today + days]` in the API's timestamp format.
fn date_window(today: NaiveDate, days: u32) -> (String, String) {
    let end = today
        .checked_add_days(Days::new(u64::from(days)))
        .unwrap_or(today);
    (format_api_date(today), format_api_date(end))
}

fn format_api_date(date: NaiveDate) -> String {
    format!("{}T06:00:00.000Z", date.format("%Y-%m-%d"))
}
