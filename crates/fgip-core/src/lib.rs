//! Core domain model for FGIP: normalized opportunities, eligibility and
//! scoring results shared by every pipeline stage.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

pub const CRATE_NAME: &str = "fgip-core";

/// Federal catalogs the pipeline knows how to poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    GrantsGov,
    SamGov,
    SbirGov,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::GrantsGov => "grants_gov",
            Source::SamGov => "sam_gov",
            Source::SbirGov => "sbir_gov",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Processing state of an opportunity as it moves through a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpportunityStatus {
    New,
    Evaluated,
    Scored,
    Archived,
}

/// Deterministic dedup digest: SHA-256 of `"{source}:{source_opportunity_id}"`.
///
/// Source-scoped by construction, so the same upstream id from two catalogs
/// hashes differently.
pub fn identity_hash(source: Source, source_opportunity_id: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source.as_str().as_bytes());
    hasher.update(b":");
    hasher.update(source_opportunity_id.as_bytes());
    hex::encode(hasher.finalize())
}

/// Normalized grant/contract opportunity from any source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Opportunity {
    pub source: Source,
    pub source_opportunity_id: String,
    pub identity_hash: String,

    pub title: String,
    pub agency: String,
    pub opportunity_number: Option<String>,

    pub posted_date: Option<DateTime<Utc>>,
    pub response_deadline: Option<DateTime<Utc>>,
    pub archive_date: Option<DateTime<Utc>>,

    pub award_amount_min: Option<f64>,
    pub award_amount_max: Option<f64>,
    pub estimated_total_program_funding: Option<f64>,

    pub naics_codes: Vec<String>,
    pub set_aside_type: Option<String>,
    pub opportunity_type: Option<String>,

    pub description: Option<String>,
    pub raw_text: Option<String>,
    pub source_url: String,

    pub first_seen_at: DateTime<Utc>,
    pub last_updated_at: DateTime<Utc>,
    pub status: OpportunityStatus,

    /// SBIR program reauthorization flag, always false at intake.
    pub sbir_program_active: bool,
}

impl Opportunity {
    /// Combined description + raw text used by the eligibility and scoring
    /// text heuristics.
    pub fn combined_text(&self) -> String {
        let mut text = String::new();
        if let Some(description) = &self.description {
            text.push_str(description);
        }
        if let Some(raw) = &self.raw_text {
            if !text.is_empty() {
                text.push(' ');
            }
            text.push_str(raw);
        }
        text
    }
}

/// Whether the applicant could pursue the opportunity directly or only as a
/// teaming subawardee.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticipationPath {
    Prime,
    Subawardee,
    None,
}

/// Outcome of one eligibility constraint check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstraintCheck {
    pub constraint_name: String,
    pub is_met: bool,
    pub details: String,
    /// True when a failure belongs to the critical class (certification /
    /// entity type / capability tier) that forecloses the opportunity
    /// regardless of topical fit.
    pub hard_blocker: bool,
}

impl ConstraintCheck {
    pub fn pass(name: &str, details: impl Into<String>) -> Self {
        Self {
            constraint_name: name.to_string(),
            is_met: true,
            details: details.into(),
            hard_blocker: false,
        }
    }

    pub fn fail(name: &str, details: impl Into<String>) -> Self {
        Self {
            constraint_name: name.to_string(),
            is_met: false,
            details: details.into(),
            hard_blocker: false,
        }
    }

    pub fn fail_hard(name: &str, details: impl Into<String>) -> Self {
        Self {
            constraint_name: name.to_string(),
            is_met: false,
            details: details.into(),
            hard_blocker: true,
        }
    }
}

/// Immutable result of the six-constraint eligibility evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EligibilityResult {
    pub opportunity_id: String,
    pub is_eligible: bool,
    pub participation_path: ParticipationPath,

    pub entity_type_check: ConstraintCheck,
    pub location_check: ConstraintCheck,
    pub registration_check: ConstraintCheck,
    pub naics_match_check: ConstraintCheck,
    pub capability_tier_check: ConstraintCheck,
    pub certification_check: ConstraintCheck,

    pub blockers: Vec<String>,
    pub assets: Vec<String>,
    pub warnings: Vec<String>,

    pub evaluated_at: DateTime<Utc>,
    pub profile_version: String,
}

impl EligibilityResult {
    pub fn checks(&self) -> [&ConstraintCheck; 6] {
        [
            &self.entity_type_check,
            &self.location_check,
            &self.registration_check,
            &self.naics_match_check,
            &self.capability_tier_check,
            &self.certification_check,
        ]
    }

    /// True when any failing check belongs to the hard-blocker class.
    pub fn has_hard_blocker(&self) -> bool {
        self.checks().iter().any(|c| !c.is_met && c.hard_blocker)
    }
}

/// Bounded score in [0, 100] with up to three supporting text snippets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionScore {
    pub score: f64,
    pub evidence_citations: Vec<String>,
}

impl DimensionScore {
    pub fn new(score: f64, mut evidence_citations: Vec<String>) -> Self {
        evidence_citations.truncate(3);
        Self {
            score: score.clamp(0.0, 100.0),
            evidence_citations,
        }
    }
}

/// Four-band categorical verdict derived from the composite score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    #[serde(rename = "GO")]
    Go,
    #[serde(rename = "SHAPE")]
    Shape,
    #[serde(rename = "MONITOR")]
    Monitor,
    #[serde(rename = "NO-GO")]
    NoGo,
}

impl Verdict {
    /// Fixed inclusive lower bounds: GO >= 80, SHAPE >= 60, MONITOR >= 40.
    pub fn from_composite(composite: f64) -> Self {
        if composite >= 80.0 {
            Verdict::Go
        } else if composite >= 60.0 {
            Verdict::Shape
        } else if composite >= 40.0 {
            Verdict::Monitor
        } else {
            Verdict::NoGo
        }
    }

    /// GO and SHAPE trigger downstream teaming/timeline work; MONITOR and
    /// NO-GO are informational only.
    pub fn is_actionable(&self) -> bool {
        matches!(self, Verdict::Go | Verdict::Shape)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Go => "GO",
            Verdict::Shape => "SHAPE",
            Verdict::Monitor => "MONITOR",
            Verdict::NoGo => "NO-GO",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable five-dimension scoring output for one opportunity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringResult {
    pub opportunity_id: String,
    pub mission_fit: DimensionScore,
    pub eligibility: DimensionScore,
    pub technical_alignment: DimensionScore,
    pub financial_viability: DimensionScore,
    pub strategic_value: DimensionScore,
    pub composite_score: f64,
    pub verdict: Verdict,
    pub scored_at: DateTime<Utc>,
    pub weights_version: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_hash_is_deterministic() {
        let a = identity_hash(Source::GrantsGov, "ED-GRANTS-060624-001");
        let b = identity_hash(Source::GrantsGov, "ED-GRANTS-060624-001");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn identity_hash_is_source_scoped() {
        assert_ne!(
            identity_hash(Source::GrantsGov, "001"),
            identity_hash(Source::SamGov, "001")
        );
    }

    #[test]
    fn verdict_banding_is_exact_at_boundaries() {
        let cases = [
            (0.0, Verdict::NoGo),
            (39.0, Verdict::NoGo),
            (40.0, Verdict::Monitor),
            (59.0, Verdict::Monitor),
            (60.0, Verdict::Shape),
            (79.0, Verdict::Shape),
            (80.0, Verdict::Go),
            (100.0, Verdict::Go),
        ];
        for (composite, expected) in cases {
            assert_eq!(Verdict::from_composite(composite), expected, "at {composite}");
        }
    }

    #[test]
    fn only_go_and_shape_are_actionable() {
        assert!(Verdict::Go.is_actionable());
        assert!(Verdict::Shape.is_actionable());
        assert!(!Verdict::Monitor.is_actionable());
        assert!(!Verdict::NoGo.is_actionable());
    }

    #[test]
    fn dimension_score_is_clamped_and_citations_capped() {
        let score = DimensionScore::new(
            140.0,
            vec!["a".into(), "b".into(), "c".into(), "d".into()],
        );
        assert_eq!(score.score, 100.0);
        assert_eq!(score.evidence_citations.len(), 3);
    }
}
