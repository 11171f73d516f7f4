//! Analysis of the evaluation runner's results document.
//!
//! The runner writes one result per (provider, test case) pair. This
//! module groups them into per-provider scorecards and a per-test
//! breakdown, and pulls out the detail needed to debug failing runs.

use std::fmt;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::HarnessError;

/// Failure reasons are cut to this many characters.
pub const REASON_PREVIEW_CHARS: usize = 200;

/// Test descriptions in the scorecard are cut to this many characters.
pub const DESCRIPTION_PREVIEW_CHARS: usize = 80;

pub const TRANSCRIPT_PREVIEW_CHARS: usize = 80;

pub const OUTPUT_PREVIEW_CHARS: usize = 600;

const UNKNOWN_PROVIDER: &str = "unknown";
const UNNAMED_TEST: &str = "unnamed";

/// Top-level results document written by the runner.
#[derive(Debug, Clone, Deserialize)]
pub struct ResultsDocument {
    pub results: ResultsBody,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResultsBody {
    pub results: Vec<RunResult>,

    #[serde(default)]
    pub stats: Option<RunStats>,
}

/// One provider's run of one test case.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunResult {
    #[serde(default)]
    pub provider: Option<ProviderRef>,

    #[serde(default)]
    pub success: bool,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub vars: Option<serde_json::Map<String, Value>>,

    #[serde(default)]
    pub response: Option<RunResponse>,

    #[serde(default)]
    pub grading_result: Option<GradingResult>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProviderRef {
    #[serde(default)]
    pub id: Option<String>,

    #[serde(default)]
    pub label: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RunResponse {
    /// Usually text, but some providers return structured output
    #[serde(default)]
    pub output: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradingResult {
    #[serde(default)]
    pub score: Option<f64>,

    #[serde(default)]
    pub component_results: Vec<ComponentResult>,
}

/// Outcome of a single assertion.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ComponentResult {
    #[serde(default)]
    pub pass: bool,

    #[serde(default)]
    pub reason: Option<String>,

    #[serde(default)]
    pub assertion: Option<AssertionRef>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AssertionRef {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunStats {
    #[serde(default)]
    pub successes: u64,

    #[serde(default)]
    pub failures: u64,

    #[serde(default)]
    pub token_usage: Option<TokenUsage>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenUsage {
    #[serde(default)]
    pub total: u64,

    #[serde(default)]
    pub prompt: u64,

    #[serde(default)]
    pub completion: u64,
}

impl ResultsDocument {
    pub fn from_json(content: &str) -> Result<Self, HarnessError> {
        Ok(serde_json::from_str(content)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, HarnessError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&content)
    }

    pub fn runs(&self) -> &[RunResult] {
        &self.results.results
    }
}

impl RunResult {
    /// Provider label, falling back to its id.
    pub fn provider_name(&self) -> &str {
        self.provider
            .as_ref()
            .and_then(|p| {
                non_empty(p.label.as_deref()).or_else(|| non_empty(p.id.as_deref()))
            })
            .unwrap_or(UNKNOWN_PROVIDER)
    }

    pub fn score(&self) -> Option<f64> {
        self.grading_result.as_ref().and_then(|g| g.score)
    }

    pub fn components(&self) -> &[ComponentResult] {
        self.grading_result
            .as_ref()
            .map(|g| g.component_results.as_slice())
            .unwrap_or_default()
    }

    pub fn transcript(&self) -> &str {
        self.vars
            .as_ref()
            .and_then(|vars| vars.get("transcript"))
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    /// Raw model output as text.
    pub fn output_text(&self) -> String {
        match self.response.as_ref().and_then(|r| r.output.as_ref()) {
            Some(Value::String(text)) => text.clone(),
            Some(Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        }
    }

    fn failure_reasons(&self) -> Vec<String> {
        self.components()
            .iter()
            .filter(|c| !c.pass)
            .map(|c| preview(c.reason.as_deref().unwrap_or_default(), REASON_PREVIEW_CHARS).to_string())
            .collect()
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|s| !s.is_empty())
}

/// The first `max_chars` characters of `text`.
pub fn preview(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((offset, _)) => &text[..offset],
        None => text,
    }
}

/// A failed test case and the reasons its assertions gave.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailedTest {
    pub description: String,
    pub reasons: Vec<String>,
}

/// Pass/fail tally and scores for one provider.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderScorecard {
    pub provider: String,
    pub passed: usize,
    pub failed: usize,
    pub scores: Vec<f64>,
    pub failures: Vec<FailedTest>,
}

impl ProviderScorecard {
    fn new(provider: &str) -> Self {
        Self {
            provider: provider.to_string(),
            passed: 0,
            failed: 0,
            scores: Vec::new(),
            failures: Vec::new(),
        }
    }

    pub fn total(&self) -> usize {
        self.passed + self.failed
    }

    pub fn pass_percentage(&self) -> f64 {
        if self.total() == 0 {
            return 0.0;
        }
        self.passed as f64 / self.total() as f64 * 100.0
    }

    /// Mean over the runs that reported a score.
    pub fn average_score(&self) -> Option<f64> {
        if self.scores.is_empty() {
            return None;
        }
        Some(self.scores.iter().sum::<f64>() / self.scores.len() as f64)
    }
}

/// One provider's outcome on a test case.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestRun {
    pub provider: String,
    pub pass: bool,
    pub score: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestBreakdown {
    pub description: String,
    pub runs: Vec<TestRun>,
}

/// Everything the results report prints.
#[derive(Debug, Clone, Serialize)]
pub struct ResultsSummary {
    pub generated_at: DateTime<Utc>,
    pub total_runs: usize,
    pub successes: u64,
    pub failures: u64,
    /// In order of first appearance
    pub providers: Vec<ProviderScorecard>,
    pub tests: Vec<TestBreakdown>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_usage: Option<TokenUsage>,
}

/// Group a results document into scorecards and a per-test breakdown.
pub fn analyze(document: &ResultsDocument) -> ResultsSummary {
    let runs = document.runs();
    let mut providers: Vec<ProviderScorecard> = Vec::new();
    let mut tests: Vec<TestBreakdown> = Vec::new();

    for run in runs {
        let name = run.provider_name();
        let card = match providers.iter().position(|c| c.provider == name) {
            Some(index) => &mut providers[index],
            None => {
                providers.push(ProviderScorecard::new(name));
                let last = providers.len() - 1;
                &mut providers[last]
            }
        };

        if run.success {
            card.passed += 1;
        } else {
            card.failed += 1;
            card.failures.push(FailedTest {
                description: run.description.clone().unwrap_or_default(),
                reasons: run.failure_reasons(),
            });
        }
        if let Some(score) = run.score() {
            card.scores.push(score);
        }

        let description = non_empty(run.description.as_deref()).unwrap_or(UNNAMED_TEST);
        let entry = TestRun {
            provider: name.to_string(),
            pass: run.success,
            score: run.score(),
        };
        match tests.iter_mut().find(|t| t.description == description) {
            Some(test) => test.runs.push(entry),
            None => tests.push(TestBreakdown {
                description: description.to_string(),
                runs: vec![entry],
            }),
        }
    }

    let stats = document.results.stats.clone().unwrap_or_default();
    let summary = ResultsSummary {
        generated_at: Utc::now(),
        total_runs: runs.len(),
        successes: stats.successes,
        failures: stats.failures,
        providers,
        tests,
        token_usage: stats.token_usage,
    };

    tracing::debug!(
        runs = summary.total_runs,
        providers = summary.providers.len(),
        tests = summary.tests.len(),
        "Analyzed evaluation results"
    );

    summary
}

impl fmt::Display for ResultsSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== EVALUATION RESULTS ===")?;
        writeln!(
            f,
            "Total: {} test runs | Passed: {} | Failed: {}",
            self.total_runs, self.successes, self.failures
        )?;
        writeln!(f)?;

        writeln!(f, "=== PER-MODEL SCORECARD ===")?;
        writeln!(f)?;
        for card in &self.providers {
            let average = card
                .average_score()
                .map_or_else(|| "N/A".to_string(), |avg| format!("{:.2}", avg));
            let status = if card.failed == 0 {
                "ALL PASS".to_string()
            } else {
                format!("{} FAILED", card.failed)
            };
            writeln!(
                f,
                "{}:  {}/{} passed ({:.0}%)  avg score: {}  [{}]",
                card.provider,
                card.passed,
                card.total(),
                card.pass_percentage(),
                average,
                status
            )?;
            for failure in &card.failures {
                writeln!(
                    f,
                    "  FAILED on: {}",
                    preview(&failure.description, DESCRIPTION_PREVIEW_CHARS)
                )?;
                for reason in &failure.reasons {
                    writeln!(f, "    -> {}", reason)?;
                }
            }
        }

        writeln!(f)?;
        writeln!(f, "=== PER-TEST BREAKDOWN ===")?;
        writeln!(f)?;
        for test in &self.tests {
            writeln!(f, "Test: {}", test.description)?;
            for run in &test.runs {
                let score = run
                    .score
                    .map_or_else(|| "N/A".to_string(), |s| format!("{:.2}", s));
                let status = if run.pass { "PASS" } else { "FAIL" };
                writeln!(f, "  {}: {} (score: {})", run.provider, status, score)?;
            }
            writeln!(f)?;
        }

        writeln!(f, "=== TOKEN USAGE ===")?;
        if let Some(tokens) = &self.token_usage {
            writeln!(
                f,
                "Total: {} | Prompt: {} | Completion: {}",
                tokens.total, tokens.prompt, tokens.completion
            )?;
        }
        Ok(())
    }
}

/// One assertion's outcome in a failure report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssertionOutcome {
    pub pass: bool,
    pub kind: String,
    pub reason: String,
}

/// What a failing run looked like, trimmed for reading.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailureDetail {
    pub provider: String,
    pub transcript_preview: String,
    pub output_preview: String,
    pub assertions: Vec<AssertionOutcome>,
}

/// Failed runs whose provider label contains `label_filter`.
pub fn debug_failures(document: &ResultsDocument, label_filter: &str) -> Vec<FailureDetail> {
    document
        .runs()
        .iter()
        .filter(|run| !run.success)
        .filter(|run| {
            run.provider
                .as_ref()
                .and_then(|p| p.label.as_deref())
                .unwrap_or_default()
                .contains(label_filter)
        })
        .map(|run| FailureDetail {
            provider: run.provider_name().to_string(),
            transcript_preview: preview(run.transcript(), TRANSCRIPT_PREVIEW_CHARS).to_string(),
            output_preview: preview(&run.output_text(), OUTPUT_PREVIEW_CHARS).to_string(),
            assertions: run
                .components()
                .iter()
                .map(|c| AssertionOutcome {
                    pass: c.pass,
                    kind: c
                        .assertion
                        .as_ref()
                        .and_then(|a| a.kind.clone())
                        .unwrap_or_else(|| "unknown".to_string()),
                    reason: preview(c.reason.as_deref().unwrap_or_default(), REASON_PREVIEW_CHARS)
                        .to_string(),
                })
                .collect(),
        })
        .collect()
}

impl fmt::Display for FailureDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- {} FAILURE ---", self.provider)?;
        writeln!(f, "Transcript preview: {}...", self.transcript_preview)?;
        writeln!(f)?;
        writeln!(f, "Raw output (first {} chars):", OUTPUT_PREVIEW_CHARS)?;
        writeln!(f, "{}", self.output_preview)?;
        writeln!(f)?;
        writeln!(f, "Assertion results:")?;
        for outcome in &self.assertions {
            let status = if outcome.pass { "PASS" } else { "FAIL" };
            writeln!(f, "  {} [{}]: {}", status, outcome.kind, outcome.reason)?;
        }
        Ok(())
    }
}
