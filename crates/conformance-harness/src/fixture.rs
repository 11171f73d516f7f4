//! Test fixtures derived from stored episode records.
//!
//! Records arrive as JSON exported from the episode store; this module
//! never talks to the store itself. A fixture carries the numbered
//! transcript the chunk prompt expects plus the factual claims the
//! factuality grader checks against.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use conformance_core::profile::builtin;
use conformance_core::Report;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::HarnessError;

/// Transcripts shorter than this are not worth evaluating.
pub const MIN_TRANSCRIPT_CHARS: usize = 5000;

/// Roughly 2000 tokens of transcript per extracted chunk.
pub const DEFAULT_CHUNK_CHARS: usize = 8000;

/// Extracted test cases per run.
pub const DEFAULT_SELECTION_LIMIT: usize = 5;

/// Diverse selection only looks this far back.
pub const DIVERSE_CANDIDATE_POOL: usize = 20;

/// Slugs are capped at this many characters.
pub const MAX_SLUG_CHARS: usize = 60;

lazy_static! {
    /// Whitespace following sentence-ending punctuation.
    static ref SENTENCE_GAP: Regex = Regex::new(r"[.!?]\s+").unwrap();

    /// Leading bullet marker on a plain-text bullet line.
    static ref BULLET_MARKER: Regex = Regex::new(r"^[-•*]\s*").unwrap();

    static ref NON_SLUG: Regex = Regex::new(r"[^a-z0-9]+").unwrap();
}

/// A completed episode as exported from the episode store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EpisodeRecord {
    pub id: i64,
    pub title: String,
    pub podcast_name: String,

    #[serde(default)]
    pub transcript_text: String,

    #[serde(default)]
    pub political_stance: Option<String>,

    #[serde(default)]
    pub summary: Option<String>,

    #[serde(default)]
    pub paragraph_summary: Option<String>,

    /// JSON-encoded list, or newline-separated bullet text
    #[serde(default)]
    pub bullet_points_summary: Option<String>,

    #[serde(default)]
    pub political_stance_explanation: Option<String>,

    #[serde(default)]
    pub analysis_confidence: Option<String>,

    /// JSON-encoded list of topic strings
    #[serde(default)]
    pub topics: Option<String>,

    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl EpisodeRecord {
    /// Completed, analysed, and with a long enough transcript to test on.
    pub fn is_complete(&self) -> bool {
        has_text(&self.political_stance)
            && has_text(&self.summary)
            && self.completed_at.is_some()
            && self.transcript_text.chars().count() > MIN_TRANSCRIPT_CHARS
    }

    /// "{podcast} — {title}"
    pub fn description(&self) -> String {
        format!("{} — {}", self.podcast_name, self.title)
    }

    /// File stem used for extracted test cases.
    pub fn slug(&self) -> String {
        format!("{}-{}", slugify(&self.podcast_name), slugify(&self.title))
    }
}

fn has_text(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|s| !s.is_empty())
}

/// Variables handed to the evaluation runner for one test case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestFixture {
    /// Sentence-numbered transcript
    pub transcript: String,
    pub description: String,
    /// Newline-separated factual claims
    pub factuality_facts: String,
    /// Length of the raw transcript, used to size the context window
    pub transcript_char_count: usize,
}

impl TestFixture {
    pub fn from_record(record: &EpisodeRecord) -> Result<Self, HarnessError> {
        if record.transcript_text.trim().is_empty() {
            return Err(HarnessError::InvalidRecord(format!(
                "episode {} has no transcript",
                record.id
            )));
        }

        Ok(Self {
            transcript: number_sentences(&record.transcript_text),
            description: record.description(),
            factuality_facts: factuality_facts(record),
            transcript_char_count: record.transcript_text.chars().count(),
        })
    }
}

/// Split into sentences and prefix each with `[i] `, one per line.
pub fn number_sentences(text: &str) -> String {
    split_sentences(text)
        .into_iter()
        .filter(|sentence| !sentence.trim().is_empty())
        .enumerate()
        .map(|(index, sentence)| format!("[{}] {}", index, sentence))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Split on whitespace that follows `.`, `!` or `?`, keeping the punctuation.
fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;

    for gap in SENTENCE_GAP.find_iter(text) {
        // The terminator is a single ASCII byte
        sentences.push(&text[start..gap.start() + 1]);
        start = gap.end();
    }
    sentences.push(&text[start..]);

    sentences
}

/// Number the first `max_chars` characters of a transcript.
pub fn chunk_transcript(text: &str, max_chars: usize) -> String {
    let end = text
        .char_indices()
        .nth(max_chars)
        .map_or(text.len(), |(offset, _)| offset);
    number_sentences(&text[..end])
}

/// Derive the factual claims a faithful analysis must agree with.
pub fn factuality_facts(record: &EpisodeRecord) -> String {
    let mut facts = Vec::new();

    if let Some(bullets) = record.bullet_points_summary.as_deref().filter(|s| !s.is_empty()) {
        match serde_json::from_str::<Value>(bullets) {
            Ok(Value::Array(items)) => {
                facts.extend(
                    items
                        .iter()
                        .filter_map(Value::as_str)
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(str::to_string),
                );
            }
            _ => {
                facts.extend(
                    bullets
                        .lines()
                        .filter(|line| !line.trim().is_empty())
                        .map(|line| BULLET_MARKER.replace(line, "").trim().to_string())
                        .filter(|line| !line.is_empty()),
                );
            }
        }
    }

    if let Some(stance) = record.political_stance.as_deref().filter(|s| !s.is_empty()) {
        facts.push(format!(
            "The overall political stance of this episode is {}.",
            stance
        ));
    }

    facts.join("\n")
}

/// Lowercase, hyphen-separated, at most [`MAX_SLUG_CHARS`] long.
pub fn slugify(text: &str) -> String {
    let lowered = text.to_lowercase();
    let hyphenated = NON_SLUG.replace_all(&lowered, "-");
    let mut slug = hyphenated.trim_matches('-').to_string();
    // Only ASCII survives the replacement, so byte truncation is safe
    slug.truncate(MAX_SLUG_CHARS);
    slug
}

/// The meta-analysis output a record's stored analysis corresponds to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpectedMeta {
    pub paragraph_summary: String,
    pub summary: String,
    pub bullet_points_summary: Value,
    pub analysis_confidence: String,
    pub political_stance: String,
    pub stance_explanation: String,
    /// Not stored at episode level
    pub top_quotes: Vec<Value>,
    pub topics: Value,
}

impl ExpectedMeta {
    /// Score the stored analysis against the meta-analysis profile.
    ///
    /// Older records predate some of the profile's rules, so a failing
    /// report here flags a weak test case rather than a broken record.
    pub fn check(&self) -> Report {
        match serde_json::to_value(self) {
            Ok(value) => builtin::meta_analysis().score(&value),
            Err(_) => Report::decode_failure(),
        }
    }
}

/// Build the expected meta-analysis output from stored fields.
pub fn expected_meta(record: &EpisodeRecord) -> Result<ExpectedMeta, HarnessError> {
    Ok(ExpectedMeta {
        paragraph_summary: record.paragraph_summary.clone().unwrap_or_default(),
        summary: record.summary.clone().unwrap_or_default(),
        bullet_points_summary: embedded_json(
            "bullet_points_summary",
            record.bullet_points_summary.as_deref(),
        )?,
        analysis_confidence: record
            .analysis_confidence
            .clone()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "medium".to_string()),
        political_stance: record.political_stance.clone().unwrap_or_default(),
        stance_explanation: record
            .political_stance_explanation
            .clone()
            .unwrap_or_default(),
        top_quotes: vec![],
        topics: embedded_json("topics", record.topics.as_deref())?,
    })
}

fn embedded_json(field: &'static str, raw: Option<&str>) -> Result<Value, HarnessError> {
    match raw.filter(|s| !s.is_empty()) {
        Some(text) => serde_json::from_str(text)
            .map_err(|source| HarnessError::EmbeddedJson { field, source }),
        None => Ok(Value::Array(vec![])),
    }
}

/// The most recently completed record suitable for a live test case.
pub fn select_latest(records: &[EpisodeRecord]) -> Option<&EpisodeRecord> {
    records
        .iter()
        .filter(|record| record.is_complete())
        .max_by_key(|record| record.completed_at)
}

/// Up to `limit` recent records, preferring distinct political stances.
///
/// Only the [`DIVERSE_CANDIDATE_POOL`] newest eligible records are
/// considered. The first three picks are taken regardless of stance; after that a
/// record is only taken if its stance has not been seen yet.
pub fn select_diverse(records: &[EpisodeRecord], limit: usize) -> Vec<&EpisodeRecord> {
    let mut candidates: Vec<&EpisodeRecord> = records
        .iter()
        .filter(|record| record.is_complete() && has_text(&record.paragraph_summary))
        .collect();
    candidates.sort_by(|a, b| b.completed_at.cmp(&a.completed_at));
    candidates.truncate(DIVERSE_CANDIDATE_POOL);

    let mut selected = Vec::new();
    let mut stances_seen = HashSet::new();

    for record in candidates {
        if selected.len() >= limit {
            break;
        }
        let stance = record.political_stance.as_deref().unwrap_or_default();
        if !stances_seen.contains(stance) || selected.len() < 3 {
            selected.push(record);
            stances_seen.insert(stance);
        }
    }

    selected
}
