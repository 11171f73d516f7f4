//! # conformance-core
//!
//! Deterministic schema-conformance scoring for structured LLM output.
//!
//! This crate answers, for one JSON response and one profile:
//! - Is the output well-formed?
//! - How close is it when it is not?
//! - What exactly is wrong with it?
//!
//! ## Key Guarantees
//!
//! 1. **Deterministic**: Same input always produces the same report
//! 2. **No LLM calls**: All checks are structural rules
//! 3. **Complete**: Every violation is reported, not just the first
//! 4. **Never throws on content**: Malformed candidates become failing reports
//!
//! ## Example
//!
//! ```rust,ignore
//! use conformance_core::Engine;
//!
//! let engine = Engine::default();
//! let report = engine.score("chunk-analysis", r#"{"keyPoints": ["a"], "quotes": [],
//!     "stanceSignals": [], "topics": ["x"], "tone": "neutral"}"#)?;
//!
//! assert!(report.pass);
//! assert_eq!(report.score, 1.0);
//! ```

pub mod candidate;
pub mod engine;
pub mod path;
pub mod profile;
pub mod report;
pub mod rules;
pub mod validators;

// Re-export main types at crate root
pub use candidate::{Candidate, DecodeError};
pub use engine::Engine;
pub use path::{FieldPath, PathError, Segment};
pub use profile::builtin::{CHUNK_ANALYSIS, META_ANALYSIS};
pub use profile::{Profile, ProfileError, ProfileRegistry};
pub use report::{Report, ReportBuilder, Violation, DECODE_FAILURE_REASON};
pub use rules::{FieldRule, RuleSet};
pub use validators::{CardinalityBounds, IntegerValue, ItemCount, Validator};

use thiserror::Error;

/// Errors that can occur when dispatching a candidate to a profile.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Unknown profile: {0}")]
    UnknownProfile(String),

    #[error("Profile error: {0}")]
    Profile(#[from] ProfileError),
}

/// Score a candidate against a built-in or custom profile.
///
/// Convenience wrapper for callers that already hold the profile.
pub fn score<'a>(profile: &Profile, candidate: impl Into<Candidate<'a>>) -> Report {
    profile.score(candidate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::builtin;

    #[test]
    fn test_basic_scoring() {
        let output = r#"{
            "keyPoints": ["The host criticizes the new tariff schedule"],
            "quotes": [{"startIndex": 3, "endIndex": 5, "context": "On tariffs", "significance": "high"}],
            "stanceSignals": [{"topic": "trade", "position": "opposes tariffs", "strength": "strong"}],
            "topics": ["trade", "economy"],
            "tone": "critical"
        }"#;

        let report = score(&builtin::chunk_analysis(), output);
        assert!(report.pass);
        assert_eq!(report.score, 1.0);
        assert_eq!(report.reason, "All chunk analysis quality checks passed");
    }

    #[test]
    fn test_invalid_json_short_circuits() {
        let report = score(&builtin::meta_analysis(), "Sure! Here is the analysis: {");
        assert!(!report.pass);
        assert_eq!(report.score, 0.0);
        assert_eq!(report.reason, DECODE_FAILURE_REASON);
        assert!(report.violations.is_empty());
    }
}
