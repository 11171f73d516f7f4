//! End-to-end flow: exported episodes to suite config, results to report.

use conformance_harness::fixture::{self, chunk_transcript, number_sentences, slugify};
use conformance_harness::results::{analyze, debug_failures};
use conformance_harness::suite::{assemble_suite, context_window};
use conformance_harness::{EpisodeRecord, ResultsDocument, SuiteSettings, TestFixture};
use proptest::prelude::*;

fn episodes() -> Vec<EpisodeRecord> {
    let body = "The senator opposed the bill. Critics disagreed! Was it fair? ".repeat(120);
    let export = serde_json::json!([
        {
            "id": 11,
            "title": "Tariff Tuesday",
            "podcast_name": "Hill Talk",
            "transcript_text": body,
            "political_stance": "Right-leaning",
            "summary": "Tariffs debated.",
            "paragraph_summary": "The hosts debate tariffs.",
            "bullet_points_summary": "[\"Tariffs are rising\", \"Farmers object\"]",
            "topics": "[\"trade\"]",
            "completed_at": "2026-04-02T09:30:00Z"
        },
        {
            "id": 12,
            "title": "Draft",
            "podcast_name": "Hill Talk",
            "transcript_text": "Short.",
            "completed_at": "2026-05-01T09:30:00Z"
        }
    ]);
    serde_json::from_value(export).unwrap()
}

#[test]
fn latest_episode_becomes_a_suite() {
    let records = episodes();
    let latest = fixture::select_latest(&records).unwrap();
    assert_eq!(latest.id, 11);

    let fixture = TestFixture::from_record(latest).unwrap();
    assert!(fixture.transcript.starts_with("[0] The senator opposed the bill.\n[1] Critics disagreed!"));
    assert_eq!(
        fixture.factuality_facts,
        "Tariffs are rising\nFarmers object\nThe overall political stance of this episode is Right-leaning."
    );

    let suite = assemble_suite(&fixture, &SuiteSettings::default());
    assert_eq!(suite["tests"][0]["description"], "Hill Talk — Tariff Tuesday");
    assert_eq!(
        suite["providers"][0]["config"]["num_ctx"],
        context_window(fixture.transcript_char_count)
    );
    assert_eq!(
        suite["tests"][0]["assert"][3]["value"],
        fixture.factuality_facts.as_str()
    );
}

#[test]
fn extracted_case_has_slug_and_expected_meta() {
    let records = episodes();
    let selected = fixture::select_diverse(&records, fixture::DEFAULT_SELECTION_LIMIT);
    assert_eq!(selected.len(), 1);

    let record = selected[0];
    assert_eq!(record.slug(), "hill-talk-tariff-tuesday");

    // Under the chunk size the whole transcript is kept
    let chunk = chunk_transcript(&record.transcript_text, fixture::DEFAULT_CHUNK_CHARS);
    assert_eq!(chunk, number_sentences(&record.transcript_text));
    let short = chunk_transcript(&record.transcript_text, 62);
    assert_eq!(short, "[0] The senator opposed the bill.\n[1] Critics disagreed!\n[2] Was it fair?");

    let meta = fixture::expected_meta(record).unwrap();
    assert_eq!(meta.topics, serde_json::json!(["trade"]));
    assert_eq!(meta.analysis_confidence, "medium");
    // Stored analysis is thinner than the profile demands
    assert!(!meta.check().pass);
}

#[test]
fn results_report_round() {
    let document = ResultsDocument::from_json(
        r#"{"results": {"results": [
            {"provider": {"label": "Llama 3.2 3B"}, "success": false, "description": "Hill Talk — Tariff Tuesday",
             "gradingResult": {"score": 0.5, "componentResults": [
                {"pass": false, "reason": "keyPoints is not an array", "assertion": {"type": "javascript"}}]}},
            {"provider": {"label": "Llama 3.2 3B"}, "success": true, "description": "Hill Talk — Draft",
             "gradingResult": {"score": 1.0}}
        ], "stats": {"successes": 1, "failures": 1}}}"#,
    )
    .unwrap();

    let summary = analyze(&document);
    assert_eq!(summary.providers.len(), 1);
    assert_eq!(summary.providers[0].average_score(), Some(0.75));
    assert_eq!(summary.providers[0].pass_percentage(), 50.0);

    let text = summary.to_string();
    assert!(text.contains("Llama 3.2 3B:  1/2 passed (50%)  avg score: 0.75  [1 FAILED]"));
    assert!(text.contains("  FAILED on: Hill Talk — Tariff Tuesday"));
    assert!(text.ends_with("=== TOKEN USAGE ===\n"));

    let failures = debug_failures(&document, "Llama");
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].assertions[0].kind, "javascript");
}

proptest! {
    #[test]
    fn slugs_are_url_safe(text in ".{0,120}") {
        let slug = slugify(&text);
        prop_assert!(slug.len() <= 60);
        prop_assert!(slug.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-'));
        prop_assert!(!slug.starts_with('-'));
        prop_assert!(!slug.contains("--"));
    }

    #[test]
    fn numbered_lines_are_sequential(text in "[a-z .!?]{0,200}") {
        let numbered = number_sentences(&text);
        for (index, line) in numbered.lines().enumerate() {
            let prefix = format!("[{}] ", index);
            prop_assert!(line.starts_with(&prefix));
        }
    }
}
