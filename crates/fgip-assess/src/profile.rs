//! Applicant profile: the fixed entity configuration every eligibility and
//! scoring decision is made against.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::ConfigError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistrationInfo {
    pub entity_id: String,
    pub cage_code: String,
    pub expiry: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationInfo {
    pub state: String,
    pub city: String,
    /// Native Hawaiian Organization eligibility, a favorable set-aside match.
    pub nho_eligible: bool,
}

/// Boolean holdings per certification type. 8(a) and HUBZone are the two
/// critical types whose absence is a hard blocker when required.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificationHoldings {
    pub eight_a: bool,
    pub hubzone: bool,
    pub sdvosb: bool,
    pub wosb: bool,
    pub small_business: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancialCapacity {
    pub min_award: f64,
    pub max_award: f64,
    pub preferred_min: f64,
    pub preferred_max: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicantProfile {
    pub entity_type: String,
    pub registration: RegistrationInfo,
    pub naics_primary: Vec<String>,
    pub naics_optional: Vec<String>,
    /// DoD impact levels the applicant can operate at.
    pub capability_tiers: Vec<String>,
    pub location: LocationInfo,
    pub certifications: CertificationHoldings,
    pub financial: FinancialCapacity,
    /// Agency name fragments that add strategic value when mentioned.
    pub priority_agencies: Vec<String>,
    pub version: String,
}

impl Default for ApplicantProfile {
    fn default() -> Self {
        Self {
            entity_type: "for-profit corporation".to_string(),
            registration: RegistrationInfo {
                entity_id: "ML49GKWHGCX6".to_string(),
                cage_code: "16RM8".to_string(),
                expiry: Utc.with_ymd_and_hms(2026, 11, 11, 0, 0, 0).unwrap(),
            },
            naics_primary: str_vec(&["541511", "541512", "541990"]),
            naics_optional: str_vec(&["541715", "518210"]),
            capability_tiers: str_vec(&["IL2", "IL3", "IL4"]),
            location: LocationInfo {
                state: "HI".to_string(),
                city: "Honolulu".to_string(),
                nho_eligible: true,
            },
            certifications: CertificationHoldings {
                eight_a: false,
                hubzone: false,
                sdvosb: false,
                wosb: false,
                small_business: true,
            },
            financial: FinancialCapacity {
                min_award: 100_000.0,
                max_award: 5_000_000.0,
                preferred_min: 500_000.0,
                preferred_max: 2_000_000.0,
            },
            priority_agencies: str_vec(&[
                "Department of Defense",
                "DARPA",
                "Navy",
                "Air Force",
                "NASA",
                "Department of Homeland Security",
            ]),
            version: "1.0".to_string(),
        }
    }
}

impl ApplicantProfile {
    pub fn all_naics(&self) -> Vec<&str> {
        self.naics_primary
            .iter()
            .chain(self.naics_optional.iter())
            .map(String::as_str)
            .collect()
    }

    /// Build the profile from environment variables, falling back to the
    /// documented default for every unset field. Invalid values are collected
    /// and reported together.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let mut invalid = Vec::new();

        let registration_expiry = match std::env::var("FGIP_REGISTRATION_EXPIRY") {
            Ok(raw) => match DateTime::parse_from_rfc3339(&raw) {
                Ok(dt) => dt.with_timezone(&Utc),
                Err(err) => {
                    invalid.push(format!("FGIP_REGISTRATION_EXPIRY: {err} (got {raw:?})"));
                    defaults.registration.expiry
                }
            },
            Err(_) => defaults.registration.expiry,
        };

        let financial = FinancialCapacity {
            min_award: env_f64("FGIP_MIN_AWARD", defaults.financial.min_award, &mut invalid),
            max_award: env_f64("FGIP_MAX_AWARD", defaults.financial.max_award, &mut invalid),
            preferred_min: env_f64(
                "FGIP_PREFERRED_MIN_AWARD",
                defaults.financial.preferred_min,
                &mut invalid,
            ),
            preferred_max: env_f64(
                "FGIP_PREFERRED_MAX_AWARD",
                defaults.financial.preferred_max,
                &mut invalid,
            ),
        };

        let profile = Self {
            entity_type: env_string("FGIP_ENTITY_TYPE", &defaults.entity_type),
            registration: RegistrationInfo {
                entity_id: env_string("FGIP_ENTITY_ID", &defaults.registration.entity_id),
                cage_code: env_string("FGIP_CAGE_CODE", &defaults.registration.cage_code),
                expiry: registration_expiry,
            },
            naics_primary: env_list("FGIP_NAICS_PRIMARY", &defaults.naics_primary),
            naics_optional: env_list("FGIP_NAICS_OPTIONAL", &defaults.naics_optional),
            capability_tiers: env_list("FGIP_CAPABILITY_TIERS", &defaults.capability_tiers),
            location: LocationInfo {
                state: env_string("FGIP_STATE", &defaults.location.state),
                city: env_string("FGIP_CITY", &defaults.location.city),
                nho_eligible: env_bool(
                    "FGIP_NHO_ELIGIBLE",
                    defaults.location.nho_eligible,
                    &mut invalid,
                ),
            },
            certifications: CertificationHoldings {
                eight_a: env_bool("FGIP_CERT_8A", defaults.certifications.eight_a, &mut invalid),
                hubzone: env_bool(
                    "FGIP_CERT_HUBZONE",
                    defaults.certifications.hubzone,
                    &mut invalid,
                ),
                sdvosb: env_bool(
                    "FGIP_CERT_SDVOSB",
                    defaults.certifications.sdvosb,
                    &mut invalid,
                ),
                wosb: env_bool("FGIP_CERT_WOSB", defaults.certifications.wosb, &mut invalid),
                small_business: env_bool(
                    "FGIP_SMALL_BUSINESS",
                    defaults.certifications.small_business,
                    &mut invalid,
                ),
            },
            financial,
            priority_agencies: env_list("FGIP_PRIORITY_AGENCIES", &defaults.priority_agencies),
            version: env_string("FGIP_PROFILE_VERSION", &defaults.version),
        };

        profile.validate_into(&mut invalid);
        if invalid.is_empty() {
            Ok(profile)
        } else {
            Err(ConfigError::Invalid { fields: invalid })
        }
    }

    fn validate_into(&self, invalid: &mut Vec<String>) {
        let f = &self.financial;
        if f.min_award <= 0.0 {
            invalid.push(format!("FGIP_MIN_AWARD: must be positive, got {}", f.min_award));
        }
        if f.max_award < f.min_award {
            invalid.push(format!(
                "FGIP_MAX_AWARD: {} is below FGIP_MIN_AWARD {}",
                f.max_award, f.min_award
            ));
        }
        if f.preferred_min < f.min_award || f.preferred_max > f.max_award {
            invalid.push(format!(
                "FGIP_PREFERRED_MIN_AWARD/FGIP_PREFERRED_MAX_AWARD: \
                 preferred range [{}, {}] must sit inside capacity [{}, {}]",
                f.preferred_min, f.preferred_max, f.min_award, f.max_award
            ));
        }
        if f.preferred_min > f.preferred_max {
            invalid.push(format!(
                "FGIP_PREFERRED_MIN_AWARD: {} exceeds FGIP_PREFERRED_MAX_AWARD {}",
                f.preferred_min, f.preferred_max
            ));
        }
        if self.naics_primary.is_empty() {
            invalid.push("FGIP_NAICS_PRIMARY: at least one primary NAICS code required".to_string());
        }
    }
}

fn str_vec(items: &[&str]) -> Vec<String> {
    items.iter().map(ToString::to_string).collect()
}

fn env_string(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_list(key: &str, default: &[String]) -> Vec<String> {
    match std::env::var(key) {
        Ok(raw) => raw
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(ToString::to_string)
            .collect(),
        Err(_) => default.to_vec(),
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

fn env_f64(key: &str, default: f64, invalid: &mut Vec<String>) -> f64 {
    match std::env::var(key) {
        Ok(raw) => match raw.trim().parse::<f64>() {
            Ok(v) => v,
            Err(_) => {
                invalid.push(format!("{key}: expected a number, got {raw:?}"));
                default
            }
        },
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_profile_is_internally_consistent() {
        let profile = ApplicantProfile::default();
        let mut invalid = Vec::new();
        profile.validate_into(&mut invalid);
        assert!(invalid.is_empty(), "{invalid:?}");
        assert_eq!(profile.all_naics().len(), 5);
    }

    #[test]
    fn validation_collects_every_invalid_field() {
        let mut profile = ApplicantProfile::default();
        profile.financial.min_award = -1.0;
        profile.financial.max_award = -2.0;
        profile.naics_primary.clear();

        let mut invalid = Vec::new();
        profile.validate_into(&mut invalid);
        assert!(invalid.len() >= 3, "expected all failures reported: {invalid:?}");
    }
}
