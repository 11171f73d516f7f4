//! Rule sets: ordered field validators bound to paths.
//!
//! Every rule runs, in declaration order, regardless of what earlier rules
//! found, so a report always lists every violation rather than the first.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::path::FieldPath;
use crate::report::Violation;
use crate::validators::{CardinalityBounds, Validator};

/// A validator bound to a path, with optional array size bounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldRule {
    /// Path relative to the record the rule is applied to
    #[serde(default, skip_serializing_if = "FieldPath::is_root")]
    pub path: FieldPath,

    pub validator: Validator,

    /// When set, the value must be an array within these bounds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounds: Option<CardinalityBounds>,
}

impl FieldRule {
    /// A rule on a named member of the record.
    pub fn field(name: impl Into<String>, validator: Validator) -> Self {
        Self {
            path: FieldPath::key(name),
            validator,
            bounds: None,
        }
    }

    /// A rule on the record itself (e.g., ordered pairs of siblings).
    pub fn record(validator: Validator) -> Self {
        Self {
            path: FieldPath::root(),
            validator,
            bounds: None,
        }
    }

    pub fn bounded(mut self, bounds: CardinalityBounds) -> Self {
        self.bounds = Some(bounds);
        self
    }

    /// Evaluate against `record`, reporting paths under `base`.
    ///
    /// A bounded rule whose value is not an array reports that once and
    /// skips its validator.
    pub fn evaluate(&self, record: &Value, base: &FieldPath, out: &mut Vec<Violation>) {
        let path = base.join(&self.path);
        let value = self.path.resolve(record);

        if let Some(bounds) = &self.bounds {
            match value.and_then(Value::as_array) {
                Some(items) => bounds.check(items, &path, out),
                None => {
                    out.push(Violation::new(
                        path.clone(),
                        format!("{} is not an array", path),
                    ));
                    return;
                }
            }
        }

        self.validator.check(value, &path, out);
    }
}

/// Apply `rules` in order to `record`.
pub fn apply(rules: &[FieldRule], record: &Value, base: &FieldPath, out: &mut Vec<Violation>) {
    for rule in rules {
        rule.evaluate(record, base, out);
    }
}

/// An ordered rule list plus the fixed weight scores are computed against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleSet {
    /// Maximum deductible checks (the scoring denominator)
    pub total_weight: u32,

    pub rules: Vec<FieldRule>,
}

impl RuleSet {
    pub fn new(total_weight: u32, rules: Vec<FieldRule>) -> Self {
        Self {
            total_weight,
            rules,
        }
    }

    /// Collect every violation in `record`.
    pub fn evaluate(&self, record: &Value) -> Vec<Violation> {
        let mut violations = Vec::new();
        apply(&self.rules, record, &FieldPath::root(), &mut violations);
        violations
    }
}
