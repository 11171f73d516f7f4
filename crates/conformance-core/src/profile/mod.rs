//! Scoring profiles.
//!
//! A profile is a named rule set plus its scoring weight and success text.
//! Profiles are plain data: the built-ins are declared in [`builtin`], and
//! further profiles can be loaded from YAML or JSON documents, which are
//! validated against `schemas/profile.schema.json` before deserialization.

pub mod builtin;
mod registry;
mod schema;

pub use registry::ProfileRegistry;
pub use schema::validate_profile_schema;

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::candidate::Candidate;
use crate::report::{Report, ReportBuilder};
use crate::rules::{FieldRule, RuleSet};
use crate::validators::Validator;

/// Errors that can occur when loading or registering profiles.
#[derive(Error, Debug)]
pub enum ProfileError {
    #[error("Failed to read profile file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Profile does not match schema: {}", .0.join("; "))]
    SchemaError(Vec<String>),

    #[error("Profile validation failed: {0}")]
    ValidationError(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Duplicate profile name: {0}")]
    DuplicateProfile(String),
}

/// A named rule set with its weight and success text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    /// Registry key (e.g., "chunk-analysis")
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Reason reported when a candidate has no violations
    pub success_reason: String,

    /// Prepended to the joined messages when a candidate fails
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_prefix: Option<String>,

    #[serde(flatten)]
    pub rule_set: RuleSet,
}

impl Profile {
    pub fn new(
        name: impl Into<String>,
        success_reason: impl Into<String>,
        rule_set: RuleSet,
    ) -> Self {
        Self {
            name: name.into(),
            description: None,
            success_reason: success_reason.into(),
            failure_prefix: None,
            rule_set,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_failure_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.failure_prefix = Some(prefix.into());
        self
    }

    /// Score a candidate against this profile.
    ///
    /// Never fails: undecodable text yields a zero-score report and every
    /// content problem is a violation inside the report.
    pub fn score<'a>(&self, candidate: impl Into<Candidate<'a>>) -> Report {
        let record = match candidate.into().decode() {
            Ok(record) => record,
            Err(e) => {
                tracing::debug!(profile = %self.name, error = %e, "Candidate rejected before rules");
                return Report::decode_failure();
            }
        };

        let violations = self.rule_set.evaluate(&record);
        let report = ReportBuilder::new(&self.success_reason, self.rule_set.total_weight)
            .with_failure_prefix(self.failure_prefix.as_deref())
            .build(violations);

        tracing::debug!(
            profile = %self.name,
            violations = report.violations.len(),
            score = report.score,
            "Scored candidate"
        );

        report
    }

    /// Parse a profile from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, ProfileError> {
        let value: Value = serde_yaml::from_str(yaml)?;
        Self::from_value(value)
    }

    /// Parse a profile from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, ProfileError> {
        let value: Value = serde_json::from_str(json)?;
        Self::from_value(value)
    }

    /// Parse a profile file; `.json` is read as JSON, anything else as YAML.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ProfileError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)?;
        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

        if is_json {
            Self::from_json(&contents)
        } else {
            Self::from_yaml(&contents)
        }
    }

    /// Schema-check, deserialize and validate a profile document.
    pub fn from_value(value: Value) -> Result<Self, ProfileError> {
        validate_profile_schema(&value).map_err(ProfileError::SchemaError)?;
        let profile: Profile = serde_json::from_value(value)?;
        profile.validate()?;
        Ok(profile)
    }

    /// Render as a YAML document that [`Profile::from_yaml`] accepts.
    pub fn to_yaml(&self) -> Result<String, ProfileError> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Validate the profile structure.
    pub fn validate(&self) -> Result<(), ProfileError> {
        if self.name.trim().is_empty() {
            return Err(ProfileError::MissingField("name".to_string()));
        }

        if self.success_reason.trim().is_empty() {
            return Err(ProfileError::MissingField("success_reason".to_string()));
        }

        if self.rule_set.total_weight == 0 {
            return Err(ProfileError::ValidationError(format!(
                "{}: total_weight must be at least 1",
                self.name
            )));
        }

        if self.rule_set.rules.is_empty() {
            return Err(ProfileError::ValidationError(format!(
                "{}: profile has no rules",
                self.name
            )));
        }

        validate_rules(&self.name, &self.rule_set.rules)
    }
}

fn validate_rules(profile: &str, rules: &[FieldRule]) -> Result<(), ProfileError> {
    for rule in rules {
        if let Some(bounds) = &rule.bounds {
            if bounds.is_inverted() {
                return Err(ProfileError::ValidationError(format!(
                    "{}: bounds on '{}' have min greater than max",
                    profile, rule.path
                )));
            }
        }

        match &rule.validator {
            Validator::EnumMember { values } if values.is_empty() => {
                return Err(ProfileError::ValidationError(format!(
                    "{}: enum on '{}' has no values",
                    profile, rule.path
                )));
            }
            Validator::ArrayOf { element } => {
                if element.is_empty() {
                    return Err(ProfileError::ValidationError(format!(
                        "{}: array_of on '{}' has no element rules",
                        profile, rule.path
                    )));
                }
                validate_rules(profile, element)?;
            }
            _ => {}
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validators::CardinalityBounds;

    const VALID_PROFILE: &str = r#"
name: "headline"
description: "Single headline with tags"
success_reason: "Headline checks passed"
total_weight: 2
rules:
  - path: "headline"
    validator:
      type: string_min_length
      min: 10
  - path: "tags"
    validator:
      type: array
    bounds:
      min: 1
      max: 3
      count: non_empty_strings
"#;

    #[test]
    fn test_parse_valid_profile() {
        let profile = Profile::from_yaml(VALID_PROFILE).unwrap();
        assert_eq!(profile.name, "headline");
        assert_eq!(profile.rule_set.total_weight, 2);
        assert_eq!(profile.rule_set.rules.len(), 2);
        assert_eq!(
            profile.rule_set.rules[1].bounds,
            Some(CardinalityBounds::between(1, 3).valid_strings())
        );
    }

    #[test]
    fn test_loaded_profile_scores() {
        let profile = Profile::from_yaml(VALID_PROFILE).unwrap();
        let report = profile.score(r#"{"headline": "short", "tags": ["politics"]}"#);
        assert!(!report.pass);
        assert_eq!(report.score, 0.5);
        assert_eq!(report.reason, "headline is too short (less than 10 chars)");
    }

    #[test]
    fn test_failure_prefix_from_yaml() {
        let yaml = VALID_PROFILE.replace(
            "total_weight: 2",
            "failure_prefix: \"Failed checks: \"\ntotal_weight: 2",
        );
        let profile = Profile::from_yaml(&yaml).unwrap();
        assert_eq!(profile.failure_prefix.as_deref(), Some("Failed checks: "));

        let report = profile.score(r#"{"headline": "short", "tags": ["politics"]}"#);
        assert_eq!(
            report.reason,
            "Failed checks: headline is too short (less than 10 chars)"
        );

        let reloaded = Profile::from_yaml(&profile.to_yaml().unwrap()).unwrap();
        assert_eq!(reloaded, profile);
    }

    #[test]
    fn test_schema_rejects_unknown_validator() {
        let yaml = r#"
name: "broken"
success_reason: "ok"
total_weight: 1
rules:
  - path: "x"
    validator:
      type: regex_match
"#;
        assert!(matches!(
            Profile::from_yaml(yaml),
            Err(ProfileError::SchemaError(_))
        ));
    }

    #[test]
    fn test_zero_weight_rejected() {
        let profile = Profile::new(
            "zero",
            "ok",
            RuleSet::new(0, vec![FieldRule::field("x", Validator::Integer)]),
        );
        assert!(matches!(
            profile.validate(),
            Err(ProfileError::ValidationError(_))
        ));
    }

    #[test]
    fn test_inverted_bounds_rejected() {
        let yaml = r#"
name: "inverted"
success_reason: "ok"
total_weight: 1
rules:
  - path: "items"
    validator:
      type: array
    bounds:
      min: 5
      max: 2
"#;
        assert!(matches!(
            Profile::from_yaml(yaml),
            Err(ProfileError::ValidationError(_))
        ));
    }

    #[test]
    fn test_malformed_path_rejected() {
        let json = r#"{
            "name": "bad-path",
            "success_reason": "ok",
            "total_weight": 1,
            "rules": [{ "path": "quotes[", "validator": { "type": "integer" } }]
        }"#;
        assert!(matches!(
            Profile::from_json(json),
            Err(ProfileError::JsonError(_))
        ));
    }

    #[test]
    fn test_nested_empty_enum_rejected() {
        let profile = Profile::new(
            "nested",
            "ok",
            RuleSet::new(
                1,
                vec![FieldRule::field(
                    "quotes",
                    Validator::ArrayOf {
                        element: vec![FieldRule::field(
                            "significance",
                            Validator::EnumMember { values: vec![] },
                        )],
                    },
                )],
            ),
        );
        assert!(matches!(
            profile.validate(),
            Err(ProfileError::ValidationError(_))
        ));
    }
}
