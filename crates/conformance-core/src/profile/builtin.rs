//! Built-in profiles for transcript analysis output.
//!
//! | Profile | Weight | Fields |
//! |---------|--------|--------|
//! | `chunk-analysis` | 5 | keyPoints, quotes, stanceSignals, topics, tone |
//! | `meta-analysis` | 8 | politicalStance, paragraphSummary, summary, bulletPointsSummary, analysisConfidence, stanceExplanation, topQuotes, topics |

use crate::rules::{FieldRule, RuleSet};
use crate::validators::{CardinalityBounds, Validator};

use super::Profile;

pub const CHUNK_ANALYSIS: &str = "chunk-analysis";
pub const META_ANALYSIS: &str = "meta-analysis";

pub const SIGNIFICANCE_LEVELS: [&str; 3] = ["high", "medium", "low"];
pub const STANCE_STRENGTHS: [&str; 3] = ["strong", "moderate", "weak"];
pub const CONFIDENCE_LEVELS: [&str; 3] = ["high", "medium", "low"];
pub const POLITICAL_STANCES: [&str; 5] = [
    "Far Left",
    "Left-leaning",
    "Centrist",
    "Right-leaning",
    "Far Right",
];

/// Per-chunk transcript analysis.
pub fn chunk_analysis() -> Profile {
    let quote = vec![
        FieldRule::field("startIndex", Validator::Integer),
        FieldRule::field("endIndex", Validator::Integer),
        FieldRule::record(Validator::ordered("startIndex", "endIndex")),
        FieldRule::field("context", Validator::NonEmptyString),
        FieldRule::field("significance", Validator::one_of(SIGNIFICANCE_LEVELS)),
    ];

    let stance_signal = vec![
        FieldRule::field("topic", Validator::NonEmptyString),
        FieldRule::field("position", Validator::NonEmptyString),
        FieldRule::field("strength", Validator::one_of(STANCE_STRENGTHS)),
    ];

    let rules = vec![
        FieldRule::field("keyPoints", Validator::Array)
            .bounded(CardinalityBounds::between(1, 8).valid_strings()),
        FieldRule::field("quotes", Validator::ArrayOf { element: quote })
            .bounded(CardinalityBounds::at_most(5)),
        FieldRule::field(
            "stanceSignals",
            Validator::ArrayOf {
                element: stance_signal,
            },
        ),
        FieldRule::field("topics", Validator::StringItems).bounded(CardinalityBounds::at_least(1)),
        FieldRule::field("tone", Validator::NonEmptyString),
    ];

    Profile::new(
        CHUNK_ANALYSIS,
        "All chunk analysis quality checks passed",
        RuleSet::new(5, rules),
    )
    .with_description("Key points, quotes, stance signals, topics and tone for one transcript chunk")
}

/// Whole-episode meta-analysis.
pub fn meta_analysis() -> Profile {
    let top_quote = vec![
        FieldRule::field("text", Validator::StringMinLength { min: 5 }),
        FieldRule::field("context", Validator::NonEmptyString),
    ];

    let rules = vec![
        FieldRule::field("politicalStance", Validator::one_of(POLITICAL_STANCES)),
        FieldRule::field(
            "paragraphSummary",
            Validator::Prose {
                min_chars: 50,
                min_sentences: 1,
                min_sentence_chars: 10,
            },
        ),
        FieldRule::field("summary", Validator::StringMinLength { min: 20 }),
        FieldRule::field("bulletPointsSummary", Validator::Array)
            .bounded(CardinalityBounds::between(3, 7).valid_strings()),
        FieldRule::field("analysisConfidence", Validator::one_of(CONFIDENCE_LEVELS)),
        FieldRule::field("stanceExplanation", Validator::StringMinLength { min: 30 }),
        FieldRule::field("topQuotes", Validator::ArrayOf { element: top_quote }),
        FieldRule::field("topics", Validator::Array)
            .bounded(CardinalityBounds::between(2, 7).valid_strings()),
    ];

    Profile::new(
        META_ANALYSIS,
        "All meta-analysis quality checks passed",
        RuleSet::new(8, rules),
    )
    .with_description("Episode-level stance, summaries, quotes and topics")
}

/// Every built-in profile.
pub fn all() -> Vec<Profile> {
    vec![chunk_analysis(), meta_analysis()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins_validate() {
        for profile in all() {
            assert!(profile.validate().is_ok(), "{}", profile.name);
        }
    }

    #[test]
    fn test_weights() {
        assert_eq!(chunk_analysis().rule_set.total_weight, 5);
        assert_eq!(meta_analysis().rule_set.total_weight, 8);
    }

    #[test]
    fn test_yaml_export_reloads() {
        for profile in all() {
            let yaml = profile.to_yaml().unwrap();
            let reloaded = Profile::from_yaml(&yaml).unwrap();
            assert_eq!(reloaded, profile);
        }
    }
}
