//! Eligibility evaluation and weighted suitability scoring for FGIP.
//!
//! Everything in this crate is a pure function of its inputs: the applicant
//! profile and weight configuration are constructed once at startup and
//! passed in by reference, never read from ambient state.

use thiserror::Error;

pub mod eligibility;
pub mod profile;
pub mod scorer;
pub mod vocab;
pub mod weights;

pub use eligibility::assess;
pub use profile::ApplicantProfile;
pub use scorer::{FinancialBands, Scorer};
pub use weights::{load_weights, ScoringWeights};

pub const CRATE_NAME: &str = "fgip-assess";

/// Startup configuration failure. `Invalid` carries every offending field,
/// not just the first, so one failed boot names everything to fix.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid configuration: {}", fields.join("; "))]
    Invalid { fields: Vec<String> },
    #[error("reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("parsing {path}: {message}")]
    Parse { path: String, message: String },
}
