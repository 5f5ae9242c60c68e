//! Five-dimension weighted scorer producing a composite score and verdict.
//!
//! One dimension (eligibility) is derived entirely from the constraint
//! evaluation; the other four are deterministic content heuristics over the
//! opportunity text and award amounts.

use chrono::Utc;
use fgip_core::{DimensionScore, EligibilityResult, Opportunity, ScoringResult, Verdict};

use crate::profile::ApplicantProfile;
use crate::vocab::{self, CORE_AI_TERMS};
use crate::weights::ScoringWeights;
use crate::ConfigError;

/// Penalty applied to the heuristic dimensions when a hard blocker makes the
/// opportunity categorically inaccessible.
pub const HARD_BLOCKER_PENALTY: f64 = 0.15;
/// Milder penalty when ineligibility leaves a plausible subawardee path
/// (NAICS-only mismatch or another soft failure).
pub const SOFT_BLOCKER_PENALTY: f64 = 0.45;

const MULTI_YEAR_SIGNALS: &[&str] = &[
    "idiq",
    "indefinite delivery",
    "multi-year",
    "multiple award",
    "option years",
];

const RND_SIGNALS: &[&str] = &[
    "research and development",
    "r&d",
    "sbir",
    "sttr",
    "innovation",
    "prototype",
    "proof of concept",
];

const GROWTH_SIGNALS: &[&str] = &[
    "teaming",
    "partnership",
    "joint venture",
    "subcontracting opportunities",
    "mentor-protege",
    "follow-on",
];

/// Band floors for the financial-viability piecewise function. Too-small and
/// too-large floors are independently tunable.
#[derive(Debug, Clone, Copy)]
pub struct FinancialBands {
    pub preferred_score: f64,
    pub capacity_edge_score: f64,
    pub too_small_floor: f64,
    pub too_large_floor: f64,
    pub no_amount_score: f64,
}

impl Default for FinancialBands {
    fn default() -> Self {
        Self {
            preferred_score: 95.0,
            capacity_edge_score: 60.0,
            too_small_floor: 25.0,
            too_large_floor: 15.0,
            no_amount_score: 50.0,
        }
    }
}

/// Pure scoring engine: profile, weights and bands are fixed at construction
/// and every `score` call is deterministic in its inputs.
#[derive(Debug, Clone)]
pub struct Scorer {
    profile: ApplicantProfile,
    weights: ScoringWeights,
    bands: FinancialBands,
}

impl Scorer {
    /// Rejects weights violating the sum invariant, so a hand-built
    /// `ScoringWeights` literal cannot corrupt verdict banding.
    pub fn new(profile: ApplicantProfile, weights: ScoringWeights) -> Result<Self, ConfigError> {
        weights.validate()?;
        Ok(Self {
            profile,
            weights,
            bands: FinancialBands::default(),
        })
    }

    pub fn with_bands(mut self, bands: FinancialBands) -> Self {
        self.bands = bands;
        self
    }

    pub fn weights(&self) -> &ScoringWeights {
        &self.weights
    }

    pub fn score(&self, opportunity: &Opportunity, eligibility: &EligibilityResult) -> ScoringResult {
        let text = scoring_text(opportunity);

        let mut mission_fit = score_mission_fit(&text);
        let eligibility_score = score_eligibility_dimension(eligibility);
        let mut technical_alignment = score_technical_alignment(&text);
        let financial_viability = self.score_financial_viability(opportunity);
        let mut strategic_value = self.score_strategic_value(opportunity, &text);

        // An ineligible opportunity is not scored at face value: topical fit
        // means little when the applicant cannot legally pursue it.
        if !eligibility.is_eligible {
            let factor = if eligibility.has_hard_blocker() {
                HARD_BLOCKER_PENALTY
            } else {
                SOFT_BLOCKER_PENALTY
            };
            mission_fit = apply_penalty(mission_fit, factor);
            technical_alignment = apply_penalty(technical_alignment, factor);
            strategic_value = apply_penalty(strategic_value, factor);
        }

        let composite = self.weights.mission_fit * mission_fit.score
            + self.weights.eligibility * eligibility_score.score
            + self.weights.technical_alignment * technical_alignment.score
            + self.weights.financial_viability * financial_viability.score
            + self.weights.strategic_value * strategic_value.score;
        let composite_score = (composite * 100.0).round() / 100.0;

        ScoringResult {
            opportunity_id: opportunity.source_opportunity_id.clone(),
            mission_fit,
            eligibility: eligibility_score,
            technical_alignment,
            financial_viability,
            strategic_value,
            composite_score,
            verdict: Verdict::from_composite(composite_score),
            scored_at: Utc::now(),
            weights_version: self.weights.version.clone(),
        }
    }

    /// Piecewise function of the award midpoint against the applicant's
    /// capacity and preferred sub-range.
    fn score_financial_viability(&self, opportunity: &Opportunity) -> DimensionScore {
        let capacity = &self.profile.financial;
        let bands = &self.bands;

        let midpoint = match (opportunity.award_amount_min, opportunity.award_amount_max) {
            (Some(min), Some(max)) => Some((min + max) / 2.0),
            (Some(min), None) => Some(min),
            (None, Some(max)) => Some(max),
            (None, None) => None,
        };

        let Some(amount) = midpoint else {
            return DimensionScore::new(
                bands.no_amount_score,
                vec!["No award amount specified; neutral financial score".to_string()],
            );
        };

        let cite = |detail: String| vec![format!("Award midpoint ${amount:.0}: {detail}")];

        if amount < capacity.min_award {
            return DimensionScore::new(
                bands.too_small_floor,
                cite(format!("below minimum capacity ${:.0}", capacity.min_award)),
            );
        }
        if amount > capacity.max_award {
            return DimensionScore::new(
                bands.too_large_floor,
                cite(format!("above maximum capacity ${:.0}", capacity.max_award)),
            );
        }
        if amount >= capacity.preferred_min && amount <= capacity.preferred_max {
            return DimensionScore::new(
                bands.preferred_score,
                cite(format!(
                    "inside preferred range ${:.0}-${:.0}",
                    capacity.preferred_min, capacity.preferred_max
                )),
            );
        }

        // Inside capacity but outside the preferred range: scale linearly
        // toward the relevant capacity boundary.
        let span = bands.preferred_score - bands.capacity_edge_score;
        let score = if amount < capacity.preferred_min {
            let width = capacity.preferred_min - capacity.min_award;
            if width <= 0.0 {
                bands.preferred_score
            } else {
                bands.capacity_edge_score + span * (amount - capacity.min_award) / width
            }
        } else {
            let width = capacity.max_award - capacity.preferred_max;
            if width <= 0.0 {
                bands.preferred_score
            } else {
                bands.capacity_edge_score + span * (capacity.max_award - amount) / width
            }
        };

        DimensionScore::new(
            score,
            cite("inside capacity, outside preferred range".to_string()),
        )
    }

    /// Baseline mid score plus additive bonuses for long-horizon and
    /// relationship signals, capped at 100.
    fn score_strategic_value(&self, opportunity: &Opportunity, text: &str) -> DimensionScore {
        let lower = text.to_lowercase();
        let agency_lower = opportunity.agency.to_lowercase();
        let mut score = 50.0;
        let mut citations = Vec::new();

        if let Some(signal) = first_signal(&lower, MULTI_YEAR_SIGNALS) {
            score += 15.0;
            citations.push(vocab::extract_context(text, signal, 80));
        }
        if let Some(agency) = self
            .profile
            .priority_agencies
            .iter()
            .find(|fragment| {
                let fragment = fragment.to_lowercase();
                agency_lower.contains(&fragment) || lower.contains(&fragment)
            })
        {
            score += 15.0;
            citations.push(format!("Priority agency: {agency}"));
        }
        if let Some(signal) = first_signal(&lower, RND_SIGNALS) {
            score += 10.0;
            citations.push(vocab::extract_context(text, signal, 80));
        }
        if let Some(signal) = first_signal(&lower, GROWTH_SIGNALS) {
            score += 10.0;
            citations.push(vocab::extract_context(text, signal, 80));
        }

        if citations.is_empty() {
            citations.push("No strategic signals found; baseline score".to_string());
        }
        DimensionScore::new(score, citations)
    }
}

fn scoring_text(opportunity: &Opportunity) -> String {
    let mut text = format!("{} {}", opportunity.title, opportunity.agency);
    let combined = opportunity.combined_text();
    if !combined.is_empty() {
        text.push(' ');
        text.push_str(&combined);
    }
    text
}

fn first_signal<'a>(lower: &str, signals: &[&'a str]) -> Option<&'a str> {
    signals.iter().copied().find(|signal| lower.contains(signal))
}

fn apply_penalty(score: DimensionScore, factor: f64) -> DimensionScore {
    DimensionScore::new(score.score * factor, score.evidence_citations)
}

/// Banded count of matched focus areas, with a boost for core AI/ML
/// terminology.
fn score_mission_fit(text: &str) -> DimensionScore {
    let matched = vocab::matched_focus_areas(text);
    let base = match matched.len() {
        0 => 20.0,
        1 | 2 => 55.0,
        3 | 4 => 75.0,
        _ => 90.0,
    };

    let lower = text.to_lowercase();
    let boost = if first_signal(&lower, CORE_AI_TERMS).is_some() {
        10.0
    } else {
        0.0
    };

    let mut citations: Vec<String> = matched
        .into_iter()
        .map(|(_, context)| context)
        .filter(|context| !context.is_empty())
        .collect();
    if citations.is_empty() {
        citations.push("No focus-area terminology found".to_string());
    }

    DimensionScore::new(base + boost, citations)
}

/// Breadth and depth across semantic categories; absence of detail is a low
/// floor, not a disqualification.
fn score_technical_alignment(text: &str) -> DimensionScore {
    let matches = vocab::find_semantic_matches(text);
    if matches.is_empty() {
        return DimensionScore::new(
            30.0,
            vec!["No technical vocabulary matched".to_string()],
        );
    }

    let categories: std::collections::BTreeSet<&str> =
        matches.iter().map(|m| m.category).collect();
    let score = 50.0 + 8.0 * categories.len() as f64 + 2.0 * matches.len() as f64;

    let citations: Vec<String> = matches
        .iter()
        .map(|m| m.context.clone())
        .filter(|context| !context.is_empty())
        .collect();

    DimensionScore::new(score, citations)
}

/// Derived entirely from the eligibility evaluation, no content heuristic.
fn score_eligibility_dimension(eligibility: &EligibilityResult) -> DimensionScore {
    if !eligibility.is_eligible {
        // Hard blockers zero the dimension; a softer failure (NAICS-only
        // mismatch) keeps a low non-zero band for the subawardee path.
        let score = if eligibility.has_hard_blocker() { 0.0 } else { 15.0 };
        let citations = if eligibility.blockers.is_empty() {
            vec!["Not eligible based on constraint checks".to_string()]
        } else {
            eligibility.blockers.clone()
        };
        return DimensionScore::new(score, citations);
    }

    if !eligibility.assets.is_empty() {
        return DimensionScore::new(100.0, eligibility.assets.clone());
    }
    if !eligibility.warnings.is_empty() {
        let citations = eligibility
            .warnings
            .iter()
            .map(|w| format!("Eligible with warnings: {w}"))
            .collect();
        return DimensionScore::new(70.0, citations);
    }
    DimensionScore::new(
        90.0,
        vec!["Clean eligibility - all constraints met".to_string()],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eligibility::assess;
    use chrono::TimeZone;
    use fgip_core::{identity_hash, OpportunityStatus, ParticipationPath, Source};

    fn mk_opportunity(description: &str) -> Opportunity {
        let source = Source::SamGov;
        Opportunity {
            source,
            source_opportunity_id: "SCORE-001".to_string(),
            identity_hash: identity_hash(source, "SCORE-001"),
            title: "AI/ML Decision Support System".to_string(),
            agency: "Department of Defense".to_string(),
            opportunity_number: Some("SCORE-001".to_string()),
            posted_date: None,
            response_deadline: Some(Utc.with_ymd_and_hms(2026, 6, 1, 0, 0, 0).single().unwrap()),
            archive_date: None,
            award_amount_min: Some(800_000.0),
            award_amount_max: Some(1_500_000.0),
            estimated_total_program_funding: None,
            naics_codes: vec!["541511".to_string()],
            set_aside_type: None,
            opportunity_type: Some("Solicitation".to_string()),
            description: Some(description.to_string()),
            raw_text: None,
            source_url: "https://sam.gov/opp/SCORE-001/view".to_string(),
            first_seen_at: Utc::now(),
            last_updated_at: Utc::now(),
            status: OpportunityStatus::New,
            sbir_program_active: false,
        }
    }

    fn strong_text() -> &'static str {
        "The DoD requires advanced AI workflows, data governance, machine learning \
         and agent configuration capabilities under a multi-year IDIQ contract. \
         Workflow automation, MLOps, cloud-native deployment and workflow \
         orchestration are in scope. Research and development with teaming \
         encouraged."
    }

    fn scorer() -> Scorer {
        Scorer::new(ApplicantProfile::default(), ScoringWeights::default()).expect("valid weights")
    }

    #[test]
    fn scorer_rejects_weights_violating_sum_invariant() {
        let weights = ScoringWeights {
            mission_fit: 0.9,
            eligibility: 0.9,
            technical_alignment: 0.9,
            financial_viability: 0.9,
            strategic_value: 0.9,
            version: "bad".to_string(),
        };
        assert!(Scorer::new(ApplicantProfile::default(), weights).is_err());
    }

    #[test]
    fn strong_eligible_opportunity_is_actionable() {
        let opp = mk_opportunity(strong_text());
        let eligibility = assess(&opp, &ApplicantProfile::default());
        assert!(eligibility.is_eligible);

        let result = scorer().score(&opp, &eligibility);
        assert!(result.composite_score >= 60.0, "got {}", result.composite_score);
        assert!(result.verdict.is_actionable());
        assert!((0.0..=100.0).contains(&result.composite_score));
        for dim in [
            &result.mission_fit,
            &result.eligibility,
            &result.technical_alignment,
            &result.financial_viability,
            &result.strategic_value,
        ] {
            assert!((0.0..=100.0).contains(&dim.score));
            assert!(!dim.evidence_citations.is_empty());
            assert!(dim.evidence_citations.len() <= 3);
        }
    }

    #[test]
    fn hard_blocker_gets_steep_penalty_and_zero_eligibility() {
        let mut opp = mk_opportunity(strong_text());
        opp.set_aside_type = Some("8(a) Set-Aside".to_string());
        let eligibility = assess(&opp, &ApplicantProfile::default());
        assert!(!eligibility.is_eligible);
        assert!(eligibility.has_hard_blocker());

        let clean = mk_opportunity(strong_text());
        let clean_eligibility = assess(&clean, &ApplicantProfile::default());
        let clean_result = scorer().score(&clean, &clean_eligibility);
        let result = scorer().score(&opp, &eligibility);

        assert_eq!(result.eligibility.score, 0.0);
        assert!(!result.eligibility.evidence_citations.is_empty());
        assert!(
            (result.mission_fit.score
                - clean_result.mission_fit.score * HARD_BLOCKER_PENALTY)
                .abs()
                < 1e-9
        );
        assert!(
            (result.strategic_value.score
                - clean_result.strategic_value.score * HARD_BLOCKER_PENALTY)
                .abs()
                < 1e-9
        );
        assert_eq!(result.verdict, Verdict::NoGo);
    }

    #[test]
    fn naics_only_mismatch_gets_mild_penalty() {
        let mut opp = mk_opportunity(strong_text());
        opp.naics_codes = vec!["236220".to_string()];
        let eligibility = assess(&opp, &ApplicantProfile::default());
        assert!(!eligibility.is_eligible);
        assert!(!eligibility.has_hard_blocker());

        let clean = mk_opportunity(strong_text());
        let clean_eligibility = assess(&clean, &ApplicantProfile::default());
        let clean_result = scorer().score(&clean, &clean_eligibility);
        let result = scorer().score(&opp, &eligibility);

        assert_eq!(result.eligibility.score, 15.0);
        assert!(
            (result.mission_fit.score
                - clean_result.mission_fit.score * SOFT_BLOCKER_PENALTY)
                .abs()
                < 1e-9
        );
    }

    #[test]
    fn financial_piecewise_bands() {
        let s = scorer();
        let mut opp = mk_opportunity("services");

        // Inside preferred [500k, 2M].
        opp.award_amount_min = Some(900_000.0);
        opp.award_amount_max = Some(1_100_000.0);
        assert_eq!(s.score_financial_viability(&opp).score, 95.0);

        // Inside capacity, below preferred: linear between 60 and 95.
        opp.award_amount_min = Some(300_000.0);
        opp.award_amount_max = Some(300_000.0);
        let dim = s.score_financial_viability(&opp);
        assert_eq!(dim.score, 77.5);

        // Too small and too large land on independent floors.
        opp.award_amount_min = Some(10_000.0);
        opp.award_amount_max = Some(20_000.0);
        assert_eq!(s.score_financial_viability(&opp).score, 25.0);
        opp.award_amount_min = Some(9_000_000.0);
        opp.award_amount_max = Some(11_000_000.0);
        assert_eq!(s.score_financial_viability(&opp).score, 15.0);

        // No amount at all: neutral mid score.
        opp.award_amount_min = None;
        opp.award_amount_max = None;
        assert_eq!(s.score_financial_viability(&opp).score, 50.0);
    }

    #[test]
    fn mission_fit_bands_track_distinct_matches() {
        assert_eq!(score_mission_fit("nothing relevant here").score, 20.0);
        // One focus area, no core AI term.
        assert_eq!(score_mission_fit("expertise in data governance").score, 55.0);
        // Core AI terminology adds the boost on top of the band.
        assert_eq!(
            score_mission_fit("machine learning operations for analysts").score,
            65.0
        );
        let score = score_mission_fit(
            "AI workflows, data governance, workflow automation, MLOps, \
             DevOps and API development with machine learning",
        )
        .score;
        assert_eq!(score, 100.0);
    }

    #[test]
    fn technical_alignment_has_low_floor_not_zero() {
        let dim = score_technical_alignment("no matching vocabulary at all");
        assert_eq!(dim.score, 30.0);

        let rich = score_technical_alignment(strong_text());
        assert!(rich.score > dim.score);
        assert!(rich.score <= 100.0);
    }

    #[test]
    fn strategic_value_accumulates_capped_bonuses() {
        let s = scorer();
        let mut opp = mk_opportunity("plain services");
        opp.agency = "Department of Agriculture".to_string();
        let baseline = s.score_strategic_value(&opp, "plain services");
        assert_eq!(baseline.score, 50.0);

        let loaded = mk_opportunity(strong_text());
        let text = scoring_text(&loaded);
        let dim = s.score_strategic_value(&loaded, &text);
        // multi-year/IDIQ +15, priority agency +15, R&D +10, teaming +10.
        assert_eq!(dim.score, 100.0);
    }

    #[test]
    fn eligibility_dimension_bands() {
        let profile = ApplicantProfile::default();

        let mut with_assets = mk_opportunity("Native Hawaiian Organization set-aside.");
        with_assets.set_aside_type = Some("NHO".to_string());
        let result = assess(&with_assets, &profile);
        assert_eq!(score_eligibility_dimension(&result).score, 100.0);

        let mut with_warning = mk_opportunity("services");
        with_warning.award_amount_max = Some(50_000_000.0);
        with_warning.award_amount_min = Some(50_000_000.0);
        with_warning.naics_codes.clear();
        let result = assess(&with_warning, &profile);
        assert!(result.is_eligible);
        assert_eq!(score_eligibility_dimension(&result).score, 70.0);

        let mut clean = mk_opportunity("services");
        clean.naics_codes.clear();
        let result = assess(&clean, &profile);
        assert_eq!(score_eligibility_dimension(&result).score, 90.0);
    }

    #[test]
    fn composite_is_rounded_to_two_decimals() {
        let opp = mk_opportunity(strong_text());
        let eligibility = assess(&opp, &ApplicantProfile::default());
        let result = scorer().score(&opp, &eligibility);
        let rescaled = result.composite_score * 100.0;
        assert!((rescaled - rescaled.round()).abs() < 1e-9);
    }

    #[test]
    fn ineligible_path_hint_is_none() {
        let mut opp = mk_opportunity(strong_text());
        opp.set_aside_type = Some("HUBZone Required".to_string());
        let eligibility = assess(&opp, &ApplicantProfile::default());
        assert_eq!(eligibility.participation_path, ParticipationPath::None);
    }
}
