//! Source adapter contracts + the three federal catalog adapters.
//!
//! Each adapter fetches raw listings through the retrying [`HttpFetcher`],
//! maps source-specific fields onto the shared [`Opportunity`] shape and
//! computes the source-scoped identity hash. A record that cannot be
//! normalized (no source-assigned identifier) is skipped and logged, never
//! propagated as an error.

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};
use fgip_core::{identity_hash, Opportunity, OpportunityStatus, Source};
use fgip_fetch::{FetchError, HttpFetcher};
use serde_json::{json, Value as JsonValue};
use thiserror::Error;
use tracing::{info, warn};

pub const CRATE_NAME: &str = "fgip-adapters";

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("{0}")]
    Message(String),
}

impl AdapterError {
    /// Status code or transport label for the orchestrator's structured
    /// failure log.
    pub fn status_label(&self) -> String {
        match self {
            AdapterError::Fetch(err) => err.status_label(),
            AdapterError::Message(_) => "payload".to_string(),
        }
    }
}

#[async_trait]
pub trait SourceAdapter: Send + Sync {
    fn source(&self) -> Source;

    /// Upstream endpoint, used for structured logging by the orchestrator.
    fn endpoint(&self) -> &'static str;

    /// Fetch and normalize one batch. Errors only after the retry budget is
    /// exhausted; individual malformed records never fail the batch.
    async fn fetch(&self, http: &HttpFetcher) -> Result<Vec<Opportunity>, AdapterError>;
}

// ---------------------------------------------------------------------------
// Shared field coercion helpers

fn value_as_string(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
        JsonValue::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn str_field(record: &JsonValue, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|key| record.get(*key).and_then(value_as_string))
}

/// Defensive amount coercion: accepts numbers or strings with currency
/// symbols and thousands separators; anything else resolves to `None`.
pub fn parse_amount(value: Option<&JsonValue>) -> Option<f64> {
    let value = value?;
    if let Some(n) = value.as_f64() {
        return Some(n);
    }
    let raw = value.as_str()?;
    let cleaned: String = raw
        .chars()
        .filter(|c| !matches!(c, '$' | ',' | ' '))
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok()
}

/// ISO-8601 in decreasing strictness: RFC 3339, bare datetime, bare date.
pub fn parse_iso_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S") {
        return Some(Utc.from_utc_datetime(&naive));
    }
    parse_native_date(raw, "%Y-%m-%d")
}

/// Source-native date-only formats resolve to midnight UTC.
pub fn parse_native_date(raw: &str, format: &str) -> Option<DateTime<Utc>> {
    let date = NaiveDate::parse_from_str(raw.trim(), format).ok()?;
    let midnight = date.and_hms_opt(0, 0, 0)?;
    Some(Utc.from_utc_datetime(&midnight))
}

fn date_field<F>(record: &JsonValue, keys: &[&str], parse: F) -> Option<DateTime<Utc>>
where
    F: Fn(&str) -> Option<DateTime<Utc>>,
{
    let raw = str_field(record, keys)?;
    let parsed = parse(&raw);
    if parsed.is_none() {
        warn!(raw = %raw, "could not parse date");
    }
    parsed
}

// ---------------------------------------------------------------------------
// Grants.gov

/// Grants.gov Search API v2 (`POST /v1/api/search2`). Requests carry an
/// attribution User-Agent per the Grants.gov terms of use.
#[derive(Debug, Clone)]
pub struct GrantsGovAdapter {
    pub attribution: String,
}

impl GrantsGovAdapter {
    pub const API_URL: &'static str =
        "https://www.grants.gov/web/grants/search-grants.html/v1/api/search2";

    pub fn new(attribution: impl Into<String>) -> Self {
        Self {
            attribution: attribution.into(),
        }
    }

    pub fn normalize_record(
        &self,
        data: &JsonValue,
        fetched_at: DateTime<Utc>,
    ) -> Option<Opportunity> {
        let source = Source::GrantsGov;
        let Some(source_id) = str_field(data, &["number", "id"]) else {
            warn!(source = %source, "opportunity missing identifier, skipping");
            return None;
        };

        let description = str_field(data, &["synopsis", "description"]);
        Some(Opportunity {
            identity_hash: identity_hash(source, &source_id),
            source,
            title: str_field(data, &["title"]).unwrap_or_else(|| "Untitled".to_string()),
            agency: str_field(data, &["agencyName", "agency"])
                .unwrap_or_else(|| "Unknown".to_string()),
            opportunity_number: str_field(data, &["number"]),
            posted_date: date_field(data, &["openDate"], parse_grants_gov_date),
            response_deadline: date_field(data, &["closeDate"], parse_grants_gov_date),
            archive_date: date_field(data, &["archiveDate"], parse_grants_gov_date),
            award_amount_min: parse_amount(data.get("awardFloor")),
            award_amount_max: parse_amount(data.get("awardCeiling")),
            estimated_total_program_funding: parse_amount(data.get("estimatedFunding")),
            // The search endpoint does not expose NAICS codes.
            naics_codes: Vec::new(),
            set_aside_type: str_field(data, &["additionalInfoOnEligibility"]),
            opportunity_type: Some("Grant".to_string()),
            raw_text: description.clone(),
            description,
            source_url: format!(
                "https://www.grants.gov/web/grants/view-opportunity.html?oppId={source_id}"
            ),
            source_opportunity_id: source_id,
            first_seen_at: fetched_at,
            last_updated_at: fetched_at,
            status: OpportunityStatus::New,
            sbir_program_active: false,
        })
    }
}

fn parse_grants_gov_date(raw: &str) -> Option<DateTime<Utc>> {
    parse_iso_date(raw).or_else(|| parse_native_date(raw, "%m/%d/%Y"))
}

#[async_trait]
impl SourceAdapter for GrantsGovAdapter {
    fn source(&self) -> Source {
        Source::GrantsGov
    }

    fn endpoint(&self) -> &'static str {
        Self::API_URL
    }

    async fn fetch(&self, http: &HttpFetcher) -> Result<Vec<Opportunity>, AdapterError> {
        let payload = json!({
            "keyword": "",
            "sortBy": "openDate|desc",
            "rows": 100,
            "oppStatuses": "forecasted|posted",
        });
        let headers = [("User-Agent", self.attribution.clone())];
        let body = http
            .post_json(self.source().as_str(), Self::API_URL, &payload, &headers)
            .await?;

        let fetched_at = Utc::now();
        let hits = body
            .get("oppHits")
            .and_then(JsonValue::as_array)
            .cloned()
            .unwrap_or_default();
        info!(source = %self.source(), hits = hits.len(), "normalizing listing batch");

        Ok(hits
            .iter()
            .filter_map(|hit| self.normalize_record(hit, fetched_at))
            .collect())
    }
}

// ---------------------------------------------------------------------------
// SAM.gov

/// SAM.gov Opportunities API v2. Authenticated via an `api_key` query
/// parameter; polls the trailing 30-day posting window.
#[derive(Debug, Clone)]
pub struct SamGovAdapter {
    pub api_key: String,
}

impl SamGovAdapter {
    pub const API_URL: &'static str = "https://api.sam.gov/opportunities/v2/search";

    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
        }
    }

    fn posted_from(now: DateTime<Utc>) -> String {
        (now - Duration::days(30)).format("%m/%d/%Y").to_string()
    }

    pub fn normalize_record(
        &self,
        data: &JsonValue,
        fetched_at: DateTime<Utc>,
    ) -> Option<Opportunity> {
        let source = Source::SamGov;
        let Some(source_id) = str_field(data, &["noticeId"]) else {
            warn!(source = %source, "opportunity missing noticeId, skipping");
            return None;
        };

        let description = str_field(data, &["description"]);
        Some(Opportunity {
            identity_hash: identity_hash(source, &source_id),
            source,
            title: str_field(data, &["title"]).unwrap_or_else(|| "Untitled".to_string()),
            agency: str_field(data, &["fullParentPathName", "organizationName"])
                .unwrap_or_else(|| "Unknown".to_string()),
            opportunity_number: str_field(data, &["solicitationNumber"])
                .or_else(|| Some(source_id.clone())),
            posted_date: date_field(data, &["postedDate"], parse_sam_gov_date),
            response_deadline: date_field(data, &["responseDeadLine"], parse_sam_gov_date),
            archive_date: date_field(data, &["archiveDate"], parse_sam_gov_date),
            // Search results do not reliably carry award amounts.
            award_amount_min: None,
            award_amount_max: None,
            estimated_total_program_funding: None,
            naics_codes: naics_from_value(data.get("naicsCode")),
            set_aside_type: str_field(data, &["typeOfSetAsideDescription"]),
            opportunity_type: str_field(data, &["type"]).or_else(|| Some("Unknown".to_string())),
            raw_text: description.clone(),
            description,
            source_url: format!("https://sam.gov/opp/{source_id}/view"),
            source_opportunity_id: source_id,
            first_seen_at: fetched_at,
            last_updated_at: fetched_at,
            status: OpportunityStatus::New,
            sbir_program_active: false,
        })
    }
}

/// SAM.gov's native format is MM/DD/YYYY; ISO appears on some notice types.
fn parse_sam_gov_date(raw: &str) -> Option<DateTime<Utc>> {
    parse_native_date(raw, "%m/%d/%Y").or_else(|| parse_iso_date(raw))
}

fn naics_from_value(value: Option<&JsonValue>) -> Vec<String> {
    match value {
        Some(JsonValue::Array(items)) => items.iter().filter_map(value_as_string).collect(),
        Some(other) => value_as_string(other).into_iter().collect(),
        None => Vec::new(),
    }
}

#[async_trait]
impl SourceAdapter for SamGovAdapter {
    fn source(&self) -> Source {
        Source::SamGov
    }

    fn endpoint(&self) -> &'static str {
        Self::API_URL
    }

    async fn fetch(&self, http: &HttpFetcher) -> Result<Vec<Opportunity>, AdapterError> {
        let query = [
            ("api_key", self.api_key.clone()),
            ("postedFrom", Self::posted_from(Utc::now())),
            ("ptype", "o,g".to_string()),
            ("limit", "100".to_string()),
        ];
        let body = http
            .get_json(self.source().as_str(), Self::API_URL, &query)
            .await?;

        let fetched_at = Utc::now();
        let records = body
            .get("opportunitiesData")
            .and_then(JsonValue::as_array)
            .cloned()
            .unwrap_or_default();
        info!(source = %self.source(), hits = records.len(), "normalizing listing batch");

        Ok(records
            .iter()
            .filter_map(|record| self.normalize_record(record, fetched_at))
            .collect())
    }
}

// ---------------------------------------------------------------------------
// SBIR.gov

/// SBIR.gov public solicitations API. Responds with either a bare array or
/// a `{"solicitations": [...]}` wrapper depending on the deployment.
#[derive(Debug, Clone, Default)]
pub struct SbirGovAdapter;

impl SbirGovAdapter {
    pub const API_URL: &'static str = "https://api.www.sbir.gov/public/api/solicitations";

    pub fn normalize_record(
        &self,
        data: &JsonValue,
        fetched_at: DateTime<Utc>,
    ) -> Option<Opportunity> {
        let source = Source::SbirGov;
        let Some(source_id) = str_field(data, &["solicitation_number", "solicitation_id"]) else {
            warn!(source = %source, "solicitation missing identifier, skipping");
            return None;
        };

        let description = str_field(data, &["description", "topic_description"]);
        Some(Opportunity {
            identity_hash: identity_hash(source, &source_id),
            source,
            title: str_field(data, &["topic_title", "solicitation_title"])
                .unwrap_or_else(|| "Untitled SBIR".to_string()),
            agency: str_field(data, &["agency", "agency_name"])
                .unwrap_or_else(|| "Unknown".to_string()),
            opportunity_number: Some(source_id.clone()),
            posted_date: date_field(data, &["open_date", "release_date"], parse_sbir_gov_date),
            response_deadline: date_field(data, &["close_date"], parse_sbir_gov_date),
            archive_date: None,
            award_amount_min: parse_amount(data.get("award_amount_min")),
            award_amount_max: parse_amount(
                data.get("award_amount_max").or_else(|| data.get("award_amount")),
            ),
            estimated_total_program_funding: None,
            naics_codes: data
                .get("naics")
                .and_then(value_as_string)
                .map(|raw| {
                    raw.split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(ToString::to_string)
                        .collect()
                })
                .unwrap_or_default(),
            set_aside_type: Some("Small Business (SBIR/STTR)".to_string()),
            opportunity_type: Some("SBIR/STTR".to_string()),
            raw_text: description.clone(),
            description,
            source_url: str_field(data, &["solicitation_url"]).unwrap_or_else(|| {
                format!("https://www.sbir.gov/sbirsearch/detail/{source_id}")
            }),
            source_opportunity_id: source_id,
            first_seen_at: fetched_at,
            last_updated_at: fetched_at,
            status: OpportunityStatus::New,
            sbir_program_active: false,
        })
    }
}

fn parse_sbir_gov_date(raw: &str) -> Option<DateTime<Utc>> {
    // parse_iso_date already covers the bare %Y-%m-%d fallback.
    parse_iso_date(raw)
}

#[async_trait]
impl SourceAdapter for SbirGovAdapter {
    fn source(&self) -> Source {
        Source::SbirGov
    }

    fn endpoint(&self) -> &'static str {
        Self::API_URL
    }

    async fn fetch(&self, http: &HttpFetcher) -> Result<Vec<Opportunity>, AdapterError> {
        let query = [
            ("keyword", String::new()),
            ("open", "true".to_string()),
        ];
        let body = http
            .get_json(self.source().as_str(), Self::API_URL, &query)
            .await?;

        let fetched_at = Utc::now();
        let solicitations = match &body {
            JsonValue::Array(items) => items.clone(),
            other => other
                .get("solicitations")
                .and_then(JsonValue::as_array)
                .cloned()
                .unwrap_or_default(),
        };
        info!(source = %self.source(), hits = solicitations.len(), "normalizing listing batch");

        Ok(solicitations
            .iter()
            .filter_map(|record| self.normalize_record(record, fetched_at))
            .collect())
    }
}

// ---------------------------------------------------------------------------

/// Settings needed to construct the full adapter set.
#[derive(Debug, Clone)]
pub struct AdapterSettings {
    pub grants_gov_attribution: String,
    pub sam_api_key: String,
}

pub fn default_adapters(settings: &AdapterSettings) -> Vec<Box<dyn SourceAdapter>> {
    vec![
        Box::new(GrantsGovAdapter::new(settings.grants_gov_attribution.clone())),
        Box::new(SamGovAdapter::new(settings.sam_api_key.clone())),
        Box::new(SbirGovAdapter),
    ]
}
