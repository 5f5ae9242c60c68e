//! Scoring weight configuration: five dimension weights that must sum to
//! 1.0, loadable from JSON or YAML with documented defaults.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::ConfigError;

const SUM_TOLERANCE: f64 = 0.001;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringWeights {
    pub mission_fit: f64,
    pub eligibility: f64,
    pub technical_alignment: f64,
    pub financial_viability: f64,
    pub strategic_value: f64,
    #[serde(default = "default_version")]
    pub version: String,
}

fn default_version() -> String {
    "1.0".to_string()
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            mission_fit: 0.25,
            eligibility: 0.25,
            technical_alignment: 0.20,
            financial_viability: 0.15,
            strategic_value: 0.15,
            version: default_version(),
        }
    }
}

impl ScoringWeights {
    pub fn new(
        mission_fit: f64,
        eligibility: f64,
        technical_alignment: f64,
        financial_viability: f64,
        strategic_value: f64,
        version: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        let weights = Self {
            mission_fit,
            eligibility,
            technical_alignment,
            financial_viability,
            strategic_value,
            version: version.into(),
        };
        weights.validate()?;
        Ok(weights)
    }

    fn fields(&self) -> [(&'static str, f64); 5] {
        [
            ("mission_fit", self.mission_fit),
            ("eligibility", self.eligibility),
            ("technical_alignment", self.technical_alignment),
            ("financial_viability", self.financial_viability),
            ("strategic_value", self.strategic_value),
        ]
    }

    pub fn sum(&self) -> f64 {
        self.fields().iter().map(|(_, v)| v).sum()
    }

    /// Every out-of-range weight is reported, plus the sum invariant.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut invalid = Vec::new();
        for (name, value) in self.fields() {
            if !(0.0..=1.0).contains(&value) {
                invalid.push(format!("{name}: must be within [0, 1], got {value}"));
            }
        }
        let sum = self.sum();
        if (sum - 1.0).abs() > SUM_TOLERANCE {
            invalid.push(format!("weights must sum to 1.0 (+/- {SUM_TOLERANCE}), got {sum:.3}"));
        }
        if invalid.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid { fields: invalid })
        }
    }
}

/// Load weights from a JSON or YAML file (by extension), validating the
/// sum invariant; `None` falls back to the documented defaults.
pub fn load_weights(path: Option<&Path>) -> Result<ScoringWeights, ConfigError> {
    let Some(path) = path else {
        return Ok(ScoringWeights::default());
    };

    let display = path.display().to_string();
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: display.clone(),
        source,
    })?;

    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or_default();

    let weights: ScoringWeights = match extension {
        "json" => serde_json::from_str(&text).map_err(|err| ConfigError::Parse {
            path: display.clone(),
            message: err.to_string(),
        })?,
        "yaml" | "yml" => serde_yaml::from_str(&text).map_err(|err| ConfigError::Parse {
            path: display.clone(),
            message: err.to_string(),
        })?,
        other => {
            return Err(ConfigError::Parse {
                path: display,
                message: format!("unsupported extension {other:?}, expected json/yaml/yml"),
            })
        }
    };

    weights.validate()?;
    Ok(weights)
}
