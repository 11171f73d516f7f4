//! Report builder: turns collected violations into the final verdict.
//!
//! The scoring policy is fixed:
//! 1. `pass` is true iff no violation was produced
//! 2. `score = max(0, 1 - violations / total_weight)`
//! 3. `reason` is the success text, or every violation message joined with `"; "`
//!
//! The denominator is a per-profile constant while the numerator counts every
//! individual message, so nested arrays can push the raw ratio below zero
//! before it is clamped.

use serde::{Deserialize, Serialize};

use crate::path::FieldPath;

/// Reason reported for candidates that do not decode as JSON.
pub const DECODE_FAILURE_REASON: &str = "Output is not valid JSON";

/// Separator between violation messages in `Report::reason`.
pub const REASON_SEPARATOR: &str = "; ";

/// A single failed check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    /// Where the failing value lives (e.g., "quotes[0].startIndex")
    pub path: FieldPath,

    /// Human-readable description of what failed
    pub message: String,
}

impl Violation {
    pub fn new(path: FieldPath, message: impl Into<String>) -> Self {
        Self {
            path,
            message: message.into(),
        }
    }
}

/// The verdict for one candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    /// True iff zero violations were produced
    pub pass: bool,

    /// Partial credit in [0, 1]
    pub score: f64,

    /// Success text or the joined violation messages
    pub reason: String,

    /// Structured breakdown of `reason`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub violations: Vec<Violation>,
}

impl Report {
    /// Terminal report for a candidate that failed to decode.
    pub fn decode_failure() -> Self {
        Self {
            pass: false,
            score: 0.0,
            reason: DECODE_FAILURE_REASON.to_string(),
            violations: vec![],
        }
    }
}

/// Deduct `violations / total_weight` from a perfect score, clamped at zero.
pub fn partial_credit(violations: usize, total_weight: u32) -> f64 {
    if total_weight == 0 {
        return if violations == 0 { 1.0 } else { 0.0 };
    }
    (1.0 - violations as f64 / f64::from(total_weight)).max(0.0)
}

/// Builds reports for one profile.
pub struct ReportBuilder<'a> {
    success_reason: &'a str,
    failure_prefix: Option<&'a str>,
    total_weight: u32,
}

impl<'a> ReportBuilder<'a> {
    pub fn new(success_reason: &'a str, total_weight: u32) -> Self {
        Self {
            success_reason,
            failure_prefix: None,
            total_weight,
        }
    }

    /// Text placed before the joined messages of a failing report.
    pub fn with_failure_prefix(mut self, prefix: Option<&'a str>) -> Self {
        self.failure_prefix = prefix;
        self
    }

    /// Merge all violations into a single report.
    pub fn build(&self, violations: Vec<Violation>) -> Report {
        if violations.is_empty() {
            return Report {
                pass: true,
                score: 1.0,
                reason: self.success_reason.to_string(),
                violations,
            };
        }

        let messages = violations
            .iter()
            .map(|v| v.message.as_str())
            .collect::<Vec<_>>()
            .join(REASON_SEPARATOR);
        let reason = match self.failure_prefix {
            Some(prefix) => format!("{}{}", prefix, messages),
            None => messages,
        };

        Report {
            pass: false,
            score: partial_credit(violations.len(), self.total_weight),
            reason,
            violations,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn violation(message: &str) -> Violation {
        Violation::new(FieldPath::key("tone"), message)
    }

    #[test]
    fn test_no_violations_passes_with_full_score() {
        let report = ReportBuilder::new("All checks passed", 5).build(vec![]);
        assert!(report.pass);
        assert_eq!(report.score, 1.0);
        assert_eq!(report.reason, "All checks passed");
    }

    #[test]
    fn test_reason_joins_messages() {
        let report = ReportBuilder::new("ok", 5).build(vec![
            violation("tone is empty or missing"),
            violation("topics array is empty"),
        ]);
        assert!(!report.pass);
        assert_eq!(report.reason, "tone is empty or missing; topics array is empty");
        assert!((report.score - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_failure_prefix() {
        let builder = ReportBuilder::new("ok", 5).with_failure_prefix(Some("Failed checks: "));
        let report = builder.build(vec![
            violation("tone is empty or missing"),
            violation("topics array is empty"),
        ]);
        assert_eq!(
            report.reason,
            "Failed checks: tone is empty or missing; topics array is empty"
        );
        assert_eq!(report.violations.len(), 2);

        // Passing reports keep the success text as is
        assert_eq!(builder.build(vec![]).reason, "ok");
    }

    #[test]
    fn test_score_clamps_at_zero() {
        assert_eq!(partial_credit(7, 5), 0.0);
        assert_eq!(partial_credit(5, 5), 0.0);
        assert!((partial_credit(1, 8) - 0.875).abs() < 1e-9);
    }

    #[test]
    fn test_zero_weight_is_all_or_nothing() {
        assert_eq!(partial_credit(0, 0), 1.0);
        assert_eq!(partial_credit(1, 0), 0.0);
    }

    #[test]
    fn test_decode_failure_report() {
        let report = Report::decode_failure();
        assert!(!report.pass);
        assert_eq!(report.score, 0.0);
        assert_eq!(report.reason, DECODE_FAILURE_REASON);
    }
}
