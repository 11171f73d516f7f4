//! Evaluation suite assembly.
//!
//! Produces the configuration document the external evaluation runner
//! consumes: one test case per fixture, run against every configured
//! provider, checked by four assertions (JSON well-formedness, the
//! structural chunk-analysis profile, a semantic rubric, and factuality).

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::fixture::TestFixture;
use crate::HarnessError;

/// Smallest context window handed to a provider.
pub const MIN_CONTEXT_WINDOW: u32 = 8192;

/// Room left for the prompt template and the response.
pub const CONTEXT_HEADROOM: u32 = 4096;

/// Rough characters-per-token ratio for English transcripts.
pub const CHARS_PER_TOKEN: f64 = 3.5;

/// Grading rubric for the semantic assertion. `{{transcript}}` is filled
/// in by the runner from the test case variables.
pub const SEMANTIC_RUBRIC: &str = "\
You are grading a political analysis that a language model produced for a podcast transcript.
The model was asked for keyPoints, quotes, stanceSignals, topics and tone. Compare each part
of its answer against the transcript below and judge whether it is faithful.

Look for:
1. keyPoints that invert, misattribute or invent what was said.
2. quotes whose startIndex/endIndex range does not contain material supporting the stated context.
3. stanceSignals whose position contradicts the speaker, such as reporting support for something
   the speaker argued against, or a stance attributed to the wrong person.
4. topics that are not discussed in the transcript.

TRANSCRIPT:
{{transcript}}

Start from 1.0 and subtract for each problem you find:
- major (invented claim, reversed position): 0.3
- moderate (misattribution, wrong name): 0.2
- minor (small omission, loose wording): 0.1
Name every problem and its severity before giving the final score.";

/// Where the runner finds the structural assertion, relative to the
/// directory holding the suite configuration.
pub const STRUCTURAL_ASSERTION_PATH: &str = "assertions/conformance-score.js";

/// Runner-side script that scores an output with `conformance score --json`.
pub const STRUCTURAL_ASSERTION_SCRIPT: &str =
    include_str!("../assets/assertions/conformance-score.js");

/// Sampling options passed through to every provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationOptions {
    pub temperature: f64,
    pub num_predict: u32,
    pub top_p: f64,
    pub top_k: u32,
    /// Unload the model as soon as the request completes
    pub keep_alive: u32,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            temperature: 0.2,
            num_predict: 8192,
            top_p: 0.9,
            top_k: 40,
            keep_alive: 0,
        }
    }
}

/// A model under evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderSpec {
    pub id: String,
    pub label: String,
}

impl ProviderSpec {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
        }
    }
}

/// The assertion that runs the structural profile inside the runner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuralAssertion {
    #[serde(rename = "type")]
    pub kind: String,
    pub value: String,
}

impl Default for StructuralAssertion {
    fn default() -> Self {
        Self {
            kind: "javascript".to_string(),
            value: format!("file://{}", STRUCTURAL_ASSERTION_PATH),
        }
    }
}

/// Everything about a suite that does not come from the fixture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SuiteSettings {
    pub description: String,
    pub providers: Vec<ProviderSpec>,
    pub generation: GenerationOptions,
    pub prompt: String,
    pub structural_assertion: StructuralAssertion,
    /// Provider that grades the rubric and factuality assertions
    pub grader: String,
    pub timeout_ms: u64,
    pub rubric_threshold: f64,
}

impl Default for SuiteSettings {
    fn default() -> Self {
        Self {
            description: "Political analysis model evaluation".to_string(),
            providers: vec![
                ProviderSpec::new("ollama:chat:gemma3:12b", "Gemma3 12B (baseline)"),
                ProviderSpec::new("ollama:chat:phi4-mini", "Phi-4 Mini 3.8B"),
                ProviderSpec::new("ollama:chat:llama3.2:3b", "Llama 3.2 3B"),
                ProviderSpec::new("ollama:chat:granite3.3:8b", "Granite 3.3 8B"),
            ],
            generation: GenerationOptions::default(),
            prompt: "file://prompts/chunk-analysis.json".to_string(),
            structural_assertion: StructuralAssertion::default(),
            grader: "anthropic:messages:claude-sonnet-4-6".to_string(),
            timeout_ms: 900_000,
            rubric_threshold: 0.6,
        }
    }
}

impl SuiteSettings {
    /// Load settings from YAML; omitted keys keep their defaults.
    pub fn from_yaml(content: &str) -> Result<Self, HarnessError> {
        Ok(serde_yaml::from_str(content)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, HarnessError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }
}

/// Write the structural assertion script under `dir`, next to where the
/// suite configuration will live.
pub fn write_assertion_script(dir: impl AsRef<Path>) -> Result<PathBuf, HarnessError> {
    let path = dir.as_ref().join(STRUCTURAL_ASSERTION_PATH);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&path, STRUCTURAL_ASSERTION_SCRIPT)?;
    tracing::debug!(path = %path.display(), "Wrote structural assertion script");
    Ok(path)
}

/// Context window large enough for a transcript of `transcript_chars`.
pub fn context_window(transcript_chars: usize) -> u32 {
    let tokens = (transcript_chars as f64 / CHARS_PER_TOKEN).ceil() as u32;
    MIN_CONTEXT_WINDOW.max(tokens.saturating_add(CONTEXT_HEADROOM))
}

/// Structured-output schema constraining chunk-analysis generation.
pub fn chunk_output_format() -> Value {
    json!({
        "type": "object",
        "properties": {
            "keyPoints": { "type": "array", "items": { "type": "string" } },
            "quotes": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "startIndex": { "type": "integer" },
                        "endIndex": { "type": "integer" },
                        "context": { "type": "string" },
                        "significance": { "type": "string", "enum": ["high", "medium", "low"] }
                    },
                    "required": ["startIndex", "endIndex", "context", "significance"]
                }
            },
            "stanceSignals": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "topic": { "type": "string" },
                        "position": { "type": "string" },
                        "strength": { "type": "string", "enum": ["strong", "moderate", "weak"] }
                    },
                    "required": ["topic", "position", "strength"]
                }
            },
            "topics": { "type": "array", "items": { "type": "string" } },
            "tone": { "type": "string" }
        },
        "required": ["keyPoints", "quotes", "stanceSignals", "topics", "tone"]
    })
}

/// Build the runner configuration for a single fixture.
pub fn assemble_suite(fixture: &TestFixture, settings: &SuiteSettings) -> Value {
    let num_ctx = context_window(fixture.transcript_char_count);

    let mut provider_config = serde_json::to_value(&settings.generation)
        .unwrap_or_else(|_| json!({}));
    provider_config["passthrough"] = json!({ "format": chunk_output_format() });
    provider_config["num_ctx"] = json!(num_ctx);

    let providers: Vec<Value> = settings
        .providers
        .iter()
        .map(|provider| {
            json!({
                "id": provider.id,
                "label": provider.label,
                "config": provider_config,
            })
        })
        .collect();

    tracing::debug!(
        description = %fixture.description,
        num_ctx,
        providers = providers.len(),
        "Assembled evaluation suite"
    );

    json!({
        "description": settings.description,
        "providers": providers,
        "prompts": [settings.prompt],
        "tests": [{
            "description": fixture.description,
            "vars": { "transcript": fixture.transcript },
            "assert": [
                { "type": "is-json" },
                settings.structural_assertion,
                {
                    "type": "llm-rubric",
                    "value": SEMANTIC_RUBRIC,
                    "threshold": settings.rubric_threshold
                },
                { "type": "factuality", "value": fixture.factuality_facts }
            ]
        }],
        "defaultTest": {
            "options": {
                "timeout": settings.timeout_ms,
                "provider": settings.grader
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture(chars: usize) -> TestFixture {
        TestFixture {
            transcript: "[0] Hello there.".to_string(),
            description: "Hill Talk — Budget Day".to_string(),
            factuality_facts: "The overall political stance of this episode is Centrist.".to_string(),
            transcript_char_count: chars,
        }
    }

    #[test]
    fn test_context_window() {
        assert_eq!(context_window(0), 8192);
        assert_eq!(context_window(14_336), 8192);
        assert_eq!(context_window(14_337), 8193);
        assert_eq!(context_window(35_000), 14_096);
    }

    #[test]
    fn test_settings_defaults() {
        let settings = SuiteSettings::default();
        assert_eq!(settings.providers.len(), 4);
        assert_eq!(settings.timeout_ms, 900_000);
        assert_eq!(settings.rubric_threshold, 0.6);
        assert_eq!(settings.generation.top_k, 40);
    }

    #[test]
    fn test_settings_partial_yaml() {
        let yaml = r#"
providers:
  - id: ollama:chat:qwen3:8b
    label: Qwen3 8B
rubric_threshold: 0.75
"#;
        let settings = SuiteSettings::from_yaml(yaml).unwrap();
        assert_eq!(settings.providers, vec![ProviderSpec::new("ollama:chat:qwen3:8b", "Qwen3 8B")]);
        assert_eq!(settings.rubric_threshold, 0.75);
        assert_eq!(settings.generation, GenerationOptions::default());
        assert_eq!(settings.grader, "anthropic:messages:claude-sonnet-4-6");
    }

    #[test]
    fn test_assemble_suite() {
        let suite = assemble_suite(&fixture(35_000), &SuiteSettings::default());

        let providers = suite["providers"].as_array().unwrap();
        assert_eq!(providers.len(), 4);
        assert_eq!(providers[0]["label"], "Gemma3 12B (baseline)");
        assert_eq!(providers[0]["config"]["num_ctx"], 14_096);
        assert_eq!(providers[0]["config"]["temperature"], 0.2);
        assert_eq!(
            providers[0]["config"]["passthrough"]["format"]["required"][4],
            "tone"
        );

        let test = &suite["tests"][0];
        assert_eq!(test["description"], "Hill Talk — Budget Day");
        assert_eq!(test["vars"]["transcript"], "[0] Hello there.");

        let kinds: Vec<&str> = test["assert"]
            .as_array()
            .unwrap()
            .iter()
            .map(|a| a["type"].as_str().unwrap())
            .collect();
        assert_eq!(kinds, vec!["is-json", "javascript", "llm-rubric", "factuality"]);
        assert_eq!(test["assert"][2]["threshold"], 0.6);
        assert!(test["assert"][2]["value"]
            .as_str()
            .unwrap()
            .contains("{{transcript}}"));

        assert_eq!(suite["defaultTest"]["options"]["timeout"], 900_000);
    }

    #[test]
    fn test_output_format_is_a_valid_schema() {
        assert!(jsonschema::options().build(&chunk_output_format()).is_ok());
    }

    #[test]
    fn test_default_assertion_is_shipped() {
        let assertion = StructuralAssertion::default();
        assert_eq!(assertion.kind, "javascript");

        let relative = assertion.value.strip_prefix("file://").unwrap();
        let shipped = Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("assets")
            .join(relative);
        assert!(shipped.is_file(), "{} is missing", shipped.display());
        assert_eq!(
            std::fs::read_to_string(&shipped).unwrap(),
            STRUCTURAL_ASSERTION_SCRIPT
        );

        assert!(STRUCTURAL_ASSERTION_SCRIPT.contains("'score', '--profile', profile, '--json'"));
        assert!(STRUCTURAL_ASSERTION_SCRIPT.contains("'chunk-analysis'"));
        assert!(STRUCTURAL_ASSERTION_SCRIPT.contains("module.exports"));
    }

    #[test]
    fn test_write_assertion_script() {
        let dir = std::env::temp_dir().join(format!("suite-assets-{}", std::process::id()));
        let written = write_assertion_script(&dir).unwrap();

        assert_eq!(written, dir.join(STRUCTURAL_ASSERTION_PATH));
        assert_eq!(
            std::fs::read_to_string(&written).unwrap(),
            STRUCTURAL_ASSERTION_SCRIPT
        );
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
