//! Six-constraint eligibility evaluator.
//!
//! `assess` is a pure function of the opportunity and the applicant profile;
//! a changed profile version requires re-evaluation, never mutation of an
//! existing result.

use chrono::Utc;
use fgip_core::{ConstraintCheck, EligibilityResult, Opportunity, ParticipationPath};

use crate::profile::ApplicantProfile;

const ENTITY_TYPE: &str = "Entity Type";
const LOCATION: &str = "Location";
const REGISTRATION: &str = "SAM Registration";
const NAICS_MATCH: &str = "NAICS Match";
const CAPABILITY_TIER: &str = "Security Posture";
const CERTIFICATIONS: &str = "Certifications";

const NONPROFIT_TERMS: &[&str] = &[
    "non-profit only",
    "nonprofit only",
    "501(c)(3) required",
    "charitable organization",
];

const ACADEMIC_TERMS: &[&str] = &[
    "university only",
    "academic institution required",
    "r1 institution",
];

const GOVERNMENT_TERMS: &[&str] = &[
    "government entity only",
    "federal agency",
    "state agency only",
];

const LOCATION_EXCLUSION_TERMS: &[&str] = &[
    "excluding hawaii",
    "hawaii not eligible",
    "continental us only",
    "conus only",
];

const NHO_TEXT_TERMS: &[&str] = &[
    "native hawaiian organization",
    "nho set-aside",
    "nho-owned",
];

const TOP_SECRET_TERMS: &[&str] = &["TOP SECRET", "TS/SCI", "TS CLEARANCE"];

const REQUIRES_8A_TERMS: &[&str] = &[
    "8(a) only",
    "8a only",
    "sba 8(a)",
    "requires 8(a)",
    "must be 8(a) certified",
];

const REQUIRES_HUBZONE_TERMS: &[&str] = &[
    "hubzone only",
    "hubzone required",
    "must be hubzone certified",
];

pub fn assess(opportunity: &Opportunity, profile: &ApplicantProfile) -> EligibilityResult {
    let entity_type_check = check_entity_type(opportunity, profile);
    let location_check = check_location(opportunity, profile);
    let registration_check = check_registration(opportunity, profile);
    let naics_match_check = check_naics_match(opportunity, profile);
    let capability_tier_check = check_capability_tier(opportunity, profile);
    let certification_check = check_certifications(opportunity, profile);

    let all_checks = [
        &entity_type_check,
        &location_check,
        &registration_check,
        &naics_match_check,
        &capability_tier_check,
        &certification_check,
    ];

    let is_eligible = all_checks.iter().all(|check| check.is_met);

    let participation_path = participation_path(
        is_eligible,
        naics_match_check.is_met,
        certification_check.is_met,
    );

    // Blockers collect every failing check, not just the first.
    let blockers: Vec<String> = all_checks
        .iter()
        .filter(|check| !check.is_met)
        .map(|check| format!("{}: {}", check.constraint_name, check.details))
        .collect();

    let mut assets = Vec::new();
    if location_check.is_met && profile.location.nho_eligible && is_nho_set_aside(opportunity) {
        assets.push("NHO (Native Hawaiian Organization) set-aside eligible".to_string());
    }
    if naics_match_check.is_met && !opportunity.naics_codes.is_empty() {
        assets.push("NAICS code alignment with applicant capabilities".to_string());
    }

    let mut warnings = Vec::new();
    if let Some(max_award) = opportunity.award_amount_max {
        if max_award > profile.financial.max_award {
            warnings.push(format!(
                "Award amount (${max_award:.0}) exceeds applicant capacity (${:.0})",
                profile.financial.max_award
            ));
        }
    }

    EligibilityResult {
        opportunity_id: opportunity.source_opportunity_id.clone(),
        is_eligible,
        participation_path,
        entity_type_check,
        location_check,
        registration_check,
        naics_match_check,
        capability_tier_check,
        certification_check,
        blockers,
        assets,
        warnings,
        evaluated_at: Utc::now(),
        profile_version: profile.version.clone(),
    }
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| haystack.contains(needle))
}

fn check_entity_type(opportunity: &Opportunity, profile: &ApplicantProfile) -> ConstraintCheck {
    let text = opportunity.combined_text().to_lowercase();

    let restricted = contains_any(&text, NONPROFIT_TERMS)
        || contains_any(&text, ACADEMIC_TERMS)
        || contains_any(&text, GOVERNMENT_TERMS);

    if restricted {
        return ConstraintCheck::fail_hard(
            ENTITY_TYPE,
            format!(
                "Opportunity requires non-profit/academic/government entity; applicant is {}",
                profile.entity_type
            ),
        );
    }

    ConstraintCheck::pass(ENTITY_TYPE, format!("{} (compatible)", profile.entity_type))
}

fn check_location(opportunity: &Opportunity, profile: &ApplicantProfile) -> ConstraintCheck {
    let text = opportunity.combined_text().to_lowercase();

    if contains_any(&text, LOCATION_EXCLUSION_TERMS) {
        return ConstraintCheck::fail(
            LOCATION,
            format!("Opportunity excludes {}", profile.location.state),
        );
    }

    if is_nho_set_aside(opportunity) && profile.location.nho_eligible {
        return ConstraintCheck::pass(
            LOCATION,
            format!(
                "{}-based, NHO-eligible (highly favorable)",
                profile.location.state
            ),
        );
    }

    ConstraintCheck::pass(
        LOCATION,
        format!("{}-based (geographically eligible)", profile.location.state),
    )
}

/// Registration must stay valid through the response deadline when one is
/// specified, else through now. Both branches are intentional: a far-future
/// deadline can fail even while the registration is currently active.
fn check_registration(opportunity: &Opportunity, profile: &ApplicantProfile) -> ConstraintCheck {
    let expiry = profile.registration.expiry;

    if let Some(deadline) = opportunity.response_deadline {
        if expiry < deadline {
            return ConstraintCheck::fail(
                REGISTRATION,
                format!(
                    "Registration expires {} before deadline {}",
                    expiry.date_naive(),
                    deadline.date_naive()
                ),
            );
        }
        return ConstraintCheck::pass(
            REGISTRATION,
            format!(
                "Active through {} (Entity ID: {})",
                expiry.date_naive(),
                profile.registration.entity_id
            ),
        );
    }

    if expiry > Utc::now() {
        return ConstraintCheck::pass(
            REGISTRATION,
            format!("Active through {}", expiry.date_naive()),
        );
    }

    ConstraintCheck::fail(
        REGISTRATION,
        format!("Registration expired {}", expiry.date_naive()),
    )
}

fn check_naics_match(opportunity: &Opportunity, profile: &ApplicantProfile) -> ConstraintCheck {
    if opportunity.naics_codes.is_empty() {
        // No codes on the listing means no restriction to test against.
        return ConstraintCheck::pass(NAICS_MATCH, "No NAICS restrictions specified");
    }

    let matches: Vec<&str> = opportunity
        .naics_codes
        .iter()
        .map(String::as_str)
        .filter(|code| profile.all_naics().contains(code))
        .collect();

    if !matches.is_empty() {
        let primary: Vec<&str> = matches
            .iter()
            .copied()
            .filter(|code| profile.naics_primary.iter().any(|p| p == code))
            .collect();
        if !primary.is_empty() {
            return ConstraintCheck::pass(
                NAICS_MATCH,
                format!("Primary NAICS match: {}", primary.join(", ")),
            );
        }
        return ConstraintCheck::pass(
            NAICS_MATCH,
            format!("Optional NAICS match: {}", matches.join(", ")),
        );
    }

    let listed: Vec<&str> = opportunity
        .naics_codes
        .iter()
        .take(3)
        .map(String::as_str)
        .collect();
    ConstraintCheck::fail(
        NAICS_MATCH,
        format!("Required NAICS {} not in applicant profile", listed.join(", ")),
    )
}

fn check_capability_tier(opportunity: &Opportunity, profile: &ApplicantProfile) -> ConstraintCheck {
    let text = opportunity.combined_text().to_uppercase();

    let requires_above_tier = text.contains("IL5")
        || text.contains("IMPACT LEVEL 5")
        || text.contains("IL6")
        || text.contains("IMPACT LEVEL 6")
        || contains_any(&text, TOP_SECRET_TERMS);

    if requires_above_tier {
        return ConstraintCheck::fail_hard(
            CAPABILITY_TIER,
            format!(
                "Requires IL5/IL6/TS clearance; applicant supports {}",
                profile.capability_tiers.join("-")
            ),
        );
    }

    // Tiers may be configured in any case; the text is already uppercased.
    let mentions_supported_tier = profile
        .capability_tiers
        .iter()
        .any(|tier| text.contains(&tier.to_uppercase()));

    if mentions_supported_tier {
        return ConstraintCheck::pass(
            CAPABILITY_TIER,
            format!("{} capable (meets requirement)", profile.capability_tiers.join("-")),
        );
    }

    ConstraintCheck::pass(CAPABILITY_TIER, "No specific security posture required")
}

/// 8(a) and HUBZone are the critical certification class: required-but-not-
/// held forces ineligibility regardless of any other signal. SDVOSB/WOSB
/// mismatches fail the check without the hard-blocker flag.
fn check_certifications(opportunity: &Opportunity, profile: &ApplicantProfile) -> ConstraintCheck {
    let certs = &profile.certifications;
    let set_aside = opportunity
        .set_aside_type
        .as_deref()
        .unwrap_or_default()
        .to_lowercase();
    let text = opportunity.combined_text().to_lowercase();

    let requires_8a = set_aside.contains("8(a)")
        || set_aside.contains("8a")
        || contains_any(&text, REQUIRES_8A_TERMS);
    if requires_8a && !certs.eight_a {
        return ConstraintCheck::fail_hard(
            CERTIFICATIONS,
            "Requires 8(a) certification (not held)",
        );
    }

    let requires_hubzone = set_aside.contains("hubzone") || contains_any(&text, REQUIRES_HUBZONE_TERMS);
    if requires_hubzone && !certs.hubzone {
        return ConstraintCheck::fail_hard(
            CERTIFICATIONS,
            "Requires HUBZone certification (not held)",
        );
    }

    let requires_sdvosb =
        set_aside.contains("sdvosb") || text.contains("service-disabled veteran");
    if requires_sdvosb && !certs.sdvosb {
        return ConstraintCheck::fail(
            CERTIFICATIONS,
            "Requires SDVOSB certification (not held)",
        );
    }

    let requires_wosb =
        set_aside.contains("wosb") || text.contains("women-owned small business");
    if requires_wosb && !certs.wosb {
        return ConstraintCheck::fail(CERTIFICATIONS, "Requires WOSB certification (not held)");
    }

    let small_business = set_aside.contains("small business") || text.contains("small business");
    if small_business && certs.small_business {
        return ConstraintCheck::pass(
            CERTIFICATIONS,
            "Small business set-aside (applicant qualifies)",
        );
    }

    ConstraintCheck::pass(CERTIFICATIONS, "No certification requirements")
}

fn is_nho_set_aside(opportunity: &Opportunity) -> bool {
    let set_aside = opportunity
        .set_aside_type
        .as_deref()
        .unwrap_or_default()
        .to_lowercase();
    let text = opportunity.combined_text().to_lowercase();

    set_aside.contains("nho")
        || set_aside.contains("native hawaiian")
        || contains_any(&text, NHO_TEXT_TERMS)
}

fn participation_path(
    is_eligible: bool,
    naics_match: bool,
    certification_met: bool,
) -> ParticipationPath {
    if !is_eligible {
        return ParticipationPath::None;
    }
    if naics_match && certification_met {
        return ParticipationPath::Prime;
    }
    if !naics_match {
        return ParticipationPath::Subawardee;
    }
    ParticipationPath::None
}
