//! Intake cycle orchestration: fetch every source, dedupe by identity hash,
//! run eligibility and scoring, and persist the assessed records.
//!
//! A cycle never fails because one upstream is down. Each source is fetched
//! in isolation and a failure is recorded in the cycle summary; the rest of
//! the stages run over whatever did arrive.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{info, warn};
use uuid::Uuid;

use fgip_adapters::{default_adapters, AdapterSettings, SourceAdapter};
use fgip_assess::{assess, load_weights, ApplicantProfile, ConfigError, Scorer};
use fgip_core::{
    EligibilityResult, Opportunity, OpportunityStatus, ScoringResult, Source, Verdict,
};
use fgip_fetch::{HttpClientConfig, HttpFetcher};

pub const CRATE_NAME: &str = "fgip-pipeline";

/// Runtime configuration, all sourced from the environment with working
/// defaults for everything except the SAM.gov API key.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub sam_api_key: String,
    pub grants_gov_attribution: String,
    pub user_agent: String,
    pub connect_timeout_secs: u64,
    pub read_timeout_secs: u64,
    pub poll_cron: String,
    pub scheduler_enabled: bool,
    pub weights_path: Option<PathBuf>,
    /// Env values that failed to parse, reported by `validate`. An
    /// unparseable value falls back to its default but still fails startup.
    invalid_env: Vec<String>,
}

impl PipelineConfig {
    pub fn from_env() -> Self {
        let mut invalid = Vec::new();
        Self {
            sam_api_key: std::env::var("SAM_API_KEY").unwrap_or_default(),
            grants_gov_attribution: std::env::var("GRANTS_GOV_ATTRIBUTION")
                .unwrap_or_else(|_| "FGIP Grant Pipeline".to_string()),
            user_agent: std::env::var("FGIP_USER_AGENT")
                .unwrap_or_else(|_| "fgip-bot/0.1".to_string()),
            connect_timeout_secs: env_u64("FGIP_CONNECT_TIMEOUT_SECS", 30, &mut invalid),
            read_timeout_secs: env_u64("FGIP_READ_TIMEOUT_SECS", 60, &mut invalid),
            poll_cron: std::env::var("FGIP_POLL_CRON")
                .unwrap_or_else(|_| "0 0 * * * *".to_string()),
            scheduler_enabled: env_bool("FGIP_SCHEDULER_ENABLED", false, &mut invalid),
            weights_path: std::env::var("FGIP_WEIGHTS_PATH").ok().map(PathBuf::from),
            invalid_env: invalid,
        }
    }

    /// Collects every missing or invalid field rather than failing on the
    /// first, so one failed boot names everything to fix.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut invalid = self.invalid_env.clone();
        if self.sam_api_key.is_empty() {
            invalid.push("SAM_API_KEY: not set".to_string());
        }
        if self.connect_timeout_secs == 0 {
            invalid.push("FGIP_CONNECT_TIMEOUT_SECS: must be positive".to_string());
        }
        if self.read_timeout_secs == 0 {
            invalid.push("FGIP_READ_TIMEOUT_SECS: must be positive".to_string());
        }
        if invalid.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid { fields: invalid })
        }
    }

    pub fn http_config(&self) -> HttpClientConfig {
        HttpClientConfig {
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            read_timeout: Duration::from_secs(self.read_timeout_secs),
            user_agent: Some(self.user_agent.clone()),
            ..Default::default()
        }
    }

    pub fn adapter_settings(&self) -> AdapterSettings {
        AdapterSettings {
            grants_gov_attribution: self.grants_gov_attribution.clone(),
            sam_api_key: self.sam_api_key.clone(),
        }
    }
}

/// One opportunity after the full assessment pass.
#[derive(Debug, Clone, Serialize)]
pub struct AssessedOpportunity {
    pub opportunity: Opportunity,
    pub eligibility: EligibilityResult,
    pub scoring: ScoringResult,
}

/// Persistence seam for assessed records, keyed by identity hash.
#[async_trait]
pub trait HashStore: Send + Sync {
    /// Hashes already persisted, used to seed the deduplicator.
    async fn existing_hashes(&self) -> Result<HashSet<String>>;

    async fn upsert(&self, records: &[AssessedOpportunity]) -> Result<()>;
}

/// Hash-keyed map behind a mutex. The default store when no database is
/// wired in; re-runs against the same instance are idempotent.
#[derive(Debug, Default)]
pub struct InMemoryHashStore {
    records: Mutex<HashMap<String, AssessedOpportunity>>,
}

impl InMemoryHashStore {
    pub fn records(&self) -> Vec<AssessedOpportunity> {
        self.records.lock().expect("store lock").values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.records.lock().expect("store lock").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl HashStore for InMemoryHashStore {
    async fn existing_hashes(&self) -> Result<HashSet<String>> {
        Ok(self
            .records
            .lock()
            .expect("store lock")
            .keys()
            .cloned()
            .collect())
    }

    async fn upsert(&self, records: &[AssessedOpportunity]) -> Result<()> {
        let mut map = self.records.lock().expect("store lock");
        for record in records {
            map.insert(record.opportunity.identity_hash.clone(), record.clone());
        }
        Ok(())
    }
}

/// Order-preserving duplicate filter over identity hashes. Seeded with the
/// store's known hashes, and also catches duplicates within one batch.
pub struct Deduplicator {
    seen: HashSet<String>,
}

#[derive(Debug, Default)]
pub struct DedupOutcome {
    pub accepted: Vec<Opportunity>,
    pub duplicates: usize,
}

impl Deduplicator {
    pub fn with_known(hashes: HashSet<String>) -> Self {
        Self { seen: hashes }
    }

    pub fn filter(&mut self, batch: Vec<Opportunity>) -> DedupOutcome {
        let mut outcome = DedupOutcome::default();
        for opportunity in batch {
            if self.seen.insert(opportunity.identity_hash.clone()) {
                outcome.accepted.push(opportunity);
            } else {
                outcome.duplicates += 1;
            }
        }
        outcome
    }
}

/// Per-source fetch result for the cycle summary.
#[derive(Debug, Clone, Serialize)]
pub struct SourceOutcome {
    pub source: Source,
    pub records: usize,
    pub succeeded: bool,
    pub duration_ms: u64,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct VerdictCounts {
    pub go: usize,
    pub shape: usize,
    pub monitor: usize,
    pub no_go: usize,
}

impl VerdictCounts {
    fn record(&mut self, verdict: Verdict) {
        match verdict {
            Verdict::Go => self.go += 1,
            Verdict::Shape => self.shape += 1,
            Verdict::Monitor => self.monitor += 1,
            Verdict::NoGo => self.no_go += 1,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CycleSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub sources: Vec<SourceOutcome>,
    pub fetched: usize,
    pub duplicates: usize,
    pub assessed: usize,
    pub eligible: usize,
    pub actionable: usize,
    pub verdicts: VerdictCounts,
}

impl CycleSummary {
    pub fn sources_failed(&self) -> usize {
        self.sources.iter().filter(|s| !s.succeeded).count()
    }
}

pub struct Pipeline {
    http: HttpFetcher,
    adapters: Vec<Box<dyn SourceAdapter>>,
    profile: ApplicantProfile,
    scorer: Scorer,
    store: Arc<dyn HashStore>,
}

impl Pipeline {
    /// Build the full default pipeline from environment configuration.
    pub fn from_config(config: &PipelineConfig) -> Result<Self> {
        config.validate().map_err(anyhow_config)?;
        let http = HttpFetcher::new(config.http_config())?;
        let adapters = default_adapters(&config.adapter_settings());
        let profile = ApplicantProfile::from_env().map_err(anyhow_config)?;
        let weights = load_weights(config.weights_path.as_deref()).map_err(anyhow_config)?;
        let scorer = Scorer::new(profile.clone(), weights).map_err(anyhow_config)?;
        Ok(Self {
            http,
            adapters,
            profile,
            scorer,
            store: Arc::new(InMemoryHashStore::default()),
        })
    }

    pub fn with_parts(
        http: HttpFetcher,
        adapters: Vec<Box<dyn SourceAdapter>>,
        profile: ApplicantProfile,
        scorer: Scorer,
        store: Arc<dyn HashStore>,
    ) -> Self {
        Self {
            http,
            adapters,
            profile,
            scorer,
            store,
        }
    }

    pub fn with_store(mut self, store: Arc<dyn HashStore>) -> Self {
        self.store = store;
        self
    }

    /// Run one full intake cycle: fetch, dedupe, assess, score, persist.
    pub async fn run_once(&self) -> Result<CycleSummary> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        info!(%run_id, sources = self.adapters.len(), "intake cycle started");

        let mut outcomes = Vec::with_capacity(self.adapters.len());
        let mut fetched = Vec::new();
        for adapter in &self.adapters {
            let outcome = self.fetch_source(adapter.as_ref(), &mut fetched).await;
            outcomes.push(outcome);
        }
        let fetched_count = fetched.len();

        let known = self
            .store
            .existing_hashes()
            .await
            .context("loading known identity hashes")?;
        let mut dedup = Deduplicator::with_known(known);
        let DedupOutcome {
            accepted,
            duplicates,
        } = dedup.filter(fetched);

        let mut verdicts = VerdictCounts::default();
        let mut eligible = 0usize;
        let mut actionable = 0usize;
        let mut assessed = Vec::with_capacity(accepted.len());
        for mut opportunity in accepted {
            let eligibility = assess(&opportunity, &self.profile);
            opportunity.status = OpportunityStatus::Evaluated;
            let scoring = self.scorer.score(&opportunity, &eligibility);
            opportunity.status = OpportunityStatus::Scored;
            info!(
                source = opportunity.source.as_str(),
                opportunity_id = %opportunity.source_opportunity_id,
                eligible = eligibility.is_eligible,
                composite = scoring.composite_score,
                verdict = ?scoring.verdict,
                "opportunity assessed"
            );
            verdicts.record(scoring.verdict);
            if eligibility.is_eligible {
                eligible += 1;
            }
            if scoring.verdict.is_actionable() {
                actionable += 1;
            }
            assessed.push(AssessedOpportunity {
                opportunity,
                eligibility,
                scoring,
            });
        }

        self.store
            .upsert(&assessed)
            .await
            .context("persisting assessed records")?;

        let summary = CycleSummary {
            run_id,
            started_at,
            finished_at: Utc::now(),
            sources: outcomes,
            fetched: fetched_count,
            duplicates,
            assessed: assessed.len(),
            eligible,
            actionable,
            verdicts,
        };
        info!(
            %run_id,
            fetched = summary.fetched,
            duplicates = summary.duplicates,
            assessed = summary.assessed,
            sources_failed = summary.sources_failed(),
            go = summary.verdicts.go,
            shape = summary.verdicts.shape,
            "intake cycle finished"
        );
        Ok(summary)
    }

    async fn fetch_source(
        &self,
        adapter: &dyn SourceAdapter,
        into: &mut Vec<Opportunity>,
    ) -> SourceOutcome {
        let source = adapter.source();
        let url = adapter.endpoint();
        let started = std::time::Instant::now();
        match adapter.fetch(&self.http).await {
            Ok(batch) => {
                let duration = started.elapsed();
                info!(
                    source = source.as_str(),
                    url,
                    records = batch.len(),
                    duration_ms = duration.as_millis() as u64,
                    outcome = "success",
                    "source fetch complete"
                );
                let records = batch.len();
                into.extend(batch);
                SourceOutcome {
                    source,
                    records,
                    succeeded: true,
                    duration_ms: duration.as_millis() as u64,
                    error: None,
                }
            }
            Err(err) => {
                let duration = started.elapsed();
                warn!(
                    source = source.as_str(),
                    url,
                    status = err.status_label(),
                    duration_ms = duration.as_millis() as u64,
                    outcome = "failure",
                    error = %err,
                    "source fetch failed"
                );
                SourceOutcome {
                    source,
                    records: 0,
                    succeeded: false,
                    duration_ms: duration.as_millis() as u64,
                    error: Some(err.to_string()),
                }
            }
        }
    }
}

fn anyhow_config(err: ConfigError) -> anyhow::Error {
    anyhow::Error::new(err)
}

fn env_u64(key: &str, default: u64, invalid: &mut Vec<String>) -> u64 {
    match std::env::var(key) {
        Ok(raw) => match raw.trim().parse::<u64>() {
            Ok(v) => v,
            Err(_) => {
                invalid.push(format!("{key}: expected a number, got {raw:?}"));
                default
            }
        },
        Err(_) => default,
    }
}

fn env_bool(key: &str, default: bool, invalid: &mut Vec<String>) -> bool {
    match std::env::var(key) {
        Ok(raw) => match raw.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" => true,
            "0" | "false" | "no" => false,
            other => {
                invalid.push(format!("{key}: expected a boolean, got {other:?}"));
                default
            }
        },
        Err(_) => default,
    }
}

/// Cron-driven repeat of `run_once`. Returns `None` when the scheduler is
/// disabled; the caller decides whether to block on it.
pub async fn maybe_build_scheduler(
    pipeline: Arc<Pipeline>,
    config: &PipelineConfig,
) -> Result<Option<JobScheduler>> {
    if !config.scheduler_enabled {
        return Ok(None);
    }

    let sched = JobScheduler::new().await.context("creating scheduler")?;
    let cron = config.poll_cron.clone();
    let job = Job::new_async(cron.as_str(), move |_uuid, _l| {
        let pipeline = Arc::clone(&pipeline);
        Box::pin(async move {
            if let Err(err) = pipeline.run_once().await {
                warn!(error = %err, "scheduled intake cycle failed");
            }
        })
    })
    .with_context(|| format!("creating scheduler job for cron {cron}"))?;
    sched.add(job).await.context("adding scheduler job")?;
    Ok(Some(sched))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use fgip_adapters::AdapterError;
    use fgip_assess::ScoringWeights;
    use fgip_core::identity_hash;

    fn mk_opportunity(source: Source, id: &str, description: &str) -> Opportunity {
        Opportunity {
            source,
            source_opportunity_id: id.to_string(),
            identity_hash: identity_hash(source, id),
            title: "Data Platform Modernization".to_string(),
            agency: "Department of Defense".to_string(),
            opportunity_number: Some(id.to_string()),
            posted_date: None,
            response_deadline: Some(Utc.with_ymd_and_hms(2026, 6, 1, 0, 0, 0).single().unwrap()),
            archive_date: None,
            award_amount_min: Some(600_000.0),
            award_amount_max: Some(1_200_000.0),
            estimated_total_program_funding: None,
            naics_codes: vec!["541511".to_string()],
            set_aside_type: None,
            opportunity_type: Some("Solicitation".to_string()),
            description: Some(description.to_string()),
            raw_text: None,
            source_url: format!("https://example.gov/{id}"),
            first_seen_at: Utc::now(),
            last_updated_at: Utc::now(),
            status: OpportunityStatus::New,
            sbir_program_active: false,
        }
    }

    struct StubAdapter {
        source: Source,
        batch: Vec<Opportunity>,
    }

    #[async_trait]
    impl SourceAdapter for StubAdapter {
        fn source(&self) -> Source {
            self.source
        }

        fn endpoint(&self) -> &'static str {
            "https://example.gov/api"
        }

        async fn fetch(&self, _http: &HttpFetcher) -> Result<Vec<Opportunity>, AdapterError> {
            Ok(self.batch.clone())
        }
    }

    struct FailingAdapter {
        source: Source,
    }

    #[async_trait]
    impl SourceAdapter for FailingAdapter {
        fn source(&self) -> Source {
            self.source
        }

        fn endpoint(&self) -> &'static str {
            "https://example.gov/api"
        }

        async fn fetch(&self, _http: &HttpFetcher) -> Result<Vec<Opportunity>, AdapterError> {
            Err(AdapterError::Message("upstream down".to_string()))
        }
    }

    fn mk_pipeline(adapters: Vec<Box<dyn SourceAdapter>>) -> (Pipeline, Arc<InMemoryHashStore>) {
        let store = Arc::new(InMemoryHashStore::default());
        let profile = ApplicantProfile::default();
        let scorer =
            Scorer::new(profile.clone(), ScoringWeights::default()).expect("valid weights");
        let http = HttpFetcher::new(HttpClientConfig::default()).expect("http client");
        let pipeline = Pipeline::with_parts(
            http,
            adapters,
            profile,
            scorer,
            Arc::clone(&store) as Arc<dyn HashStore>,
        );
        (pipeline, store)
    }

    #[tokio::test]
    async fn cycle_assesses_every_new_opportunity() {
        let adapters: Vec<Box<dyn SourceAdapter>> = vec![
            Box::new(StubAdapter {
                source: Source::GrantsGov,
                batch: vec![mk_opportunity(
                    Source::GrantsGov,
                    "G-1",
                    "machine learning and data governance research",
                )],
            }),
            Box::new(StubAdapter {
                source: Source::SamGov,
                batch: vec![mk_opportunity(Source::SamGov, "S-1", "janitorial services")],
            }),
            Box::new(StubAdapter {
                source: Source::SbirGov,
                batch: vec![mk_opportunity(
                    Source::SbirGov,
                    "B-1",
                    "AI workflows prototype",
                )],
            }),
        ];
        let (pipeline, store) = mk_pipeline(adapters);

        let summary = pipeline.run_once().await.expect("cycle");
        assert_eq!(summary.fetched, 3);
        assert_eq!(summary.duplicates, 0);
        assert_eq!(summary.assessed, 3);
        assert_eq!(summary.sources_failed(), 0);
        assert_eq!(store.len(), 3);

        let total = summary.verdicts.go
            + summary.verdicts.shape
            + summary.verdicts.monitor
            + summary.verdicts.no_go;
        assert_eq!(total, 3);
        assert_eq!(summary.eligible, 3);
        assert!(summary.actionable <= summary.assessed);

        for record in store.records() {
            assert_eq!(record.opportunity.status, OpportunityStatus::Scored);
        }
    }

    #[test]
    fn config_validation_names_every_missing_field() {
        let config = PipelineConfig {
            sam_api_key: String::new(),
            grants_gov_attribution: "FGIP Grant Pipeline".to_string(),
            user_agent: "fgip-bot/0.1".to_string(),
            connect_timeout_secs: 0,
            read_timeout_secs: 60,
            poll_cron: "0 0 * * * *".to_string(),
            scheduler_enabled: false,
            weights_path: None,
            invalid_env: Vec::new(),
        };
        let err = config.validate().unwrap_err();
        let message = err.to_string();
        assert!(message.contains("SAM_API_KEY"));
        assert!(message.contains("FGIP_CONNECT_TIMEOUT_SECS"));
        assert!(!message.contains("FGIP_READ_TIMEOUT_SECS"));
    }

    #[test]
    fn unparseable_env_values_fail_validation_with_field_names() {
        std::env::set_var("FGIP_CONNECT_TIMEOUT_SECS", "abc");
        std::env::set_var("FGIP_SCHEDULER_ENABLED", "garbage");
        let config = PipelineConfig::from_env();
        std::env::remove_var("FGIP_CONNECT_TIMEOUT_SECS");
        std::env::remove_var("FGIP_SCHEDULER_ENABLED");

        // Unparseable values keep their defaults but still fail startup.
        assert_eq!(config.connect_timeout_secs, 30);
        assert!(!config.scheduler_enabled);

        let err = config.validate().unwrap_err();
        let message = err.to_string();
        assert!(message.contains("FGIP_CONNECT_TIMEOUT_SECS"));
        assert!(message.contains("FGIP_SCHEDULER_ENABLED"));
    }

    #[tokio::test]
    async fn one_failing_source_does_not_abort_the_cycle() {
        let adapters: Vec<Box<dyn SourceAdapter>> = vec![
            Box::new(FailingAdapter {
                source: Source::SamGov,
            }),
            Box::new(StubAdapter {
                source: Source::GrantsGov,
                batch: vec![mk_opportunity(Source::GrantsGov, "G-1", "data pipeline work")],
            }),
        ];
        let (pipeline, store) = mk_pipeline(adapters);

        let summary = pipeline.run_once().await.expect("cycle");
        assert_eq!(summary.sources_failed(), 1);
        assert_eq!(summary.assessed, 1);
        assert_eq!(store.len(), 1);

        let failed = summary.sources.iter().find(|s| !s.succeeded).unwrap();
        assert_eq!(failed.source, Source::SamGov);
        assert!(failed.error.as_deref().unwrap().contains("upstream down"));
    }

    #[tokio::test]
    async fn replayed_cycle_rejects_already_seen_hashes() {
        let adapters: Vec<Box<dyn SourceAdapter>> = vec![Box::new(StubAdapter {
            source: Source::GrantsGov,
            batch: vec![
                mk_opportunity(Source::GrantsGov, "G-1", "cloud migration"),
                mk_opportunity(Source::GrantsGov, "G-2", "cloud migration"),
            ],
        })];
        let (pipeline, store) = mk_pipeline(adapters);

        let first = pipeline.run_once().await.expect("first cycle");
        assert_eq!(first.assessed, 2);

        let second = pipeline.run_once().await.expect("second cycle");
        assert_eq!(second.fetched, 2);
        assert_eq!(second.duplicates, 2);
        assert_eq!(second.assessed, 0);
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn same_id_from_different_sources_is_not_a_duplicate() {
        let adapters: Vec<Box<dyn SourceAdapter>> = vec![
            Box::new(StubAdapter {
                source: Source::GrantsGov,
                batch: vec![mk_opportunity(Source::GrantsGov, "SHARED-9", "analytics")],
            }),
            Box::new(StubAdapter {
                source: Source::SamGov,
                batch: vec![mk_opportunity(Source::SamGov, "SHARED-9", "analytics")],
            }),
        ];
        let (pipeline, _store) = mk_pipeline(adapters);

        let summary = pipeline.run_once().await.expect("cycle");
        assert_eq!(summary.duplicates, 0);
        assert_eq!(summary.assessed, 2);
    }

    #[test]
    fn deduplicator_drops_repeats_within_one_batch() {
        let mut dedup = Deduplicator::with_known(HashSet::new());
        let batch = vec![
            mk_opportunity(Source::SamGov, "S-1", "a"),
            mk_opportunity(Source::SamGov, "S-1", "a"),
            mk_opportunity(Source::SamGov, "S-2", "b"),
        ];
        let outcome = dedup.filter(batch);
        assert_eq!(outcome.accepted.len(), 2);
        assert_eq!(outcome.duplicates, 1);
        assert_eq!(outcome.accepted[0].source_opportunity_id, "S-1");
        assert_eq!(outcome.accepted[1].source_opportunity_id, "S-2");
    }

    #[test]
    fn config_defaults_are_sane_without_env() {
        let config = PipelineConfig {
            sam_api_key: String::new(),
            grants_gov_attribution: "FGIP Grant Pipeline".to_string(),
            user_agent: "fgip-bot/0.1".to_string(),
            connect_timeout_secs: 30,
            read_timeout_secs: 60,
            poll_cron: "0 0 */6 * * *".to_string(),
            scheduler_enabled: false,
            weights_path: None,
            invalid_env: Vec::new(),
        };
        let http = config.http_config();
        assert_eq!(http.connect_timeout, Duration::from_secs(30));
        assert_eq!(http.read_timeout, Duration::from_secs(60));
        assert_eq!(http.user_agent.as_deref(), Some("fgip-bot/0.1"));
    }
}
