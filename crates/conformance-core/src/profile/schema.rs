//! Structural check for profile files.
//!
//! A loaded document is matched against `schemas/profile.schema.json`
//! before serde sees it. A misspelled validator tag then comes back as
//! `/rules/0/validator: ...` rather than an untagged-enum error.

use std::sync::OnceLock;

use jsonschema::Validator as SchemaValidator;
use serde_json::Value;

const PROFILE_SCHEMA: &str = include_str!("../../../../schemas/profile.schema.json");

static PROFILE_VALIDATOR: OnceLock<Result<SchemaValidator, String>> = OnceLock::new();

fn profile_validator() -> Result<&'static SchemaValidator, &'static str> {
    PROFILE_VALIDATOR
        .get_or_init(|| {
            let schema: Value = serde_json::from_str(PROFILE_SCHEMA)
                .map_err(|err| format!("profile schema is not JSON: {}", err))?;
            jsonschema::options()
                .build(&schema)
                .map_err(|err| format!("profile schema does not compile: {}", err))
        })
        .as_ref()
        .map_err(String::as_str)
}

/// Every schema violation in `document`, as `<pointer>: <message>`.
pub fn validate_profile_schema(document: &Value) -> Result<(), Vec<String>> {
    let validator = profile_validator().map_err(|err| vec![err.to_string()])?;

    let problems: Vec<String> = validator
        .iter_errors(document)
        .map(|err| {
            let pointer = err.instance_path.to_string();
            let at = if pointer.is_empty() { "/" } else { pointer.as_str() };
            format!("{}: {}", at, err)
        })
        .collect();

    if problems.is_empty() {
        Ok(())
    } else {
        Err(problems)
    }
}
