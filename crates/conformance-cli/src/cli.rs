use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;

use conformance_core::{Engine, Profile};
use conformance_harness::fixture::{self, DEFAULT_CHUNK_CHARS, DEFAULT_SELECTION_LIMIT};
use conformance_harness::results::{analyze, debug_failures};
use conformance_harness::suite::{assemble_suite, write_assertion_script};
use conformance_harness::{load_episodes, ResultsDocument, SuiteSettings, TestFixture};

use crate::telemetry;

#[derive(Parser, Debug)]
#[command(
    name = "conformance",
    about = "Score structured LLM output against conformance profiles and prepare evaluation runs",
    version
)]
struct Cli {
    /// Log level or filter directive used when RUST_LOG is unset
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Score one JSON output against a profile
    Score(ScoreArgs),
    /// Inspect and validate profiles
    Profiles {
        #[command(subcommand)]
        command: ProfilesCommand,
    },
    /// Build the test fixture for the most recently completed episode
    Fixture(FixtureArgs),
    /// Write transcript chunks and expected outputs for a diverse set of episodes
    Extract(ExtractArgs),
    /// Assemble the evaluation runner configuration for the latest episode
    Suite(SuiteArgs),
    /// Summarise an evaluation results document
    Analyze(AnalyzeArgs),
    /// Show failing runs for providers whose label matches a filter
    DebugFailures(DebugFailuresArgs),
}

#[derive(Subcommand, Debug)]
enum ProfilesCommand {
    /// List every available profile
    List(ProfileSources),
    /// Print a profile as YAML
    Show {
        name: String,
        #[command(flatten)]
        sources: ProfileSources,
    },
    /// Check a profile file against the profile schema and rules
    Validate { file: PathBuf },
}

#[derive(Args, Debug, Default)]
struct ProfileSources {
    /// Extra profile files (YAML, or JSON by extension) to load next to the built-ins
    #[arg(long = "profile-file")]
    profile_files: Vec<PathBuf>,
}

impl ProfileSources {
    fn engine(&self) -> Result<Engine> {
        Engine::with_profile_files(&self.profile_files).context("failed to load profiles")
    }
}

#[derive(Args, Debug)]
struct ScoreArgs {
    /// Profile to score against
    #[arg(long, short)]
    profile: String,

    #[command(flatten)]
    sources: ProfileSources,

    /// File holding the raw model output; stdin when omitted or `-`
    input: Option<PathBuf>,

    /// Print the full report as JSON
    #[arg(long)]
    json: bool,

    /// Exit non-zero when the output does not pass
    #[arg(long)]
    check: bool,
}

#[derive(Args, Debug)]
struct FixtureArgs {
    /// JSON array of exported episode records
    #[arg(long)]
    episodes: PathBuf,
}

#[derive(Args, Debug)]
struct ExtractArgs {
    #[arg(long)]
    episodes: PathBuf,

    /// Directory receiving `transcripts/` and `expected/`
    #[arg(long)]
    out_dir: PathBuf,

    #[arg(long, default_value_t = DEFAULT_SELECTION_LIMIT)]
    limit: usize,

    /// Characters of transcript kept per extracted case
    #[arg(long, default_value_t = DEFAULT_CHUNK_CHARS)]
    chunk_chars: usize,
}

#[derive(Args, Debug)]
struct SuiteArgs {
    #[arg(long)]
    episodes: PathBuf,

    /// YAML suite settings; omitted keys use the defaults
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Directory the runner config will live in; the structural assertion
    /// script is written there
    #[arg(long)]
    assets_dir: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct AnalyzeArgs {
    /// Results document written by the evaluation runner
    results: PathBuf,

    /// Print the summary as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Args, Debug)]
struct DebugFailuresArgs {
    results: PathBuf,

    /// Substring matched against provider labels
    #[arg(long)]
    provider: String,
}

pub(crate) fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    telemetry::init(&cli.log_level)?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    dispatch(cli.command, &mut out)
}

fn dispatch(command: Command, out: &mut dyn Write) -> Result<ExitCode> {
    match command {
        Command::Score(args) => score(args, out),
        Command::Profiles { command } => profiles(command, out).map(|_| ExitCode::SUCCESS),
        Command::Fixture(args) => fixture_command(args, out).map(|_| ExitCode::SUCCESS),
        Command::Extract(args) => extract(args, out).map(|_| ExitCode::SUCCESS),
        Command::Suite(args) => suite(args, out).map(|_| ExitCode::SUCCESS),
        Command::Analyze(args) => analyze_command(args, out).map(|_| ExitCode::SUCCESS),
        Command::DebugFailures(args) => debug_command(args, out).map(|_| ExitCode::SUCCESS),
    }
}

fn read_input(path: Option<&Path>) -> Result<String> {
    match path {
        Some(path) if path != Path::new("-") => fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display())),
        _ => {
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .context("failed to read stdin")?;
            Ok(buffer)
        }
    }
}

fn score(args: ScoreArgs, out: &mut dyn Write) -> Result<ExitCode> {
    let engine = args.sources.engine()?;
    let text = read_input(args.input.as_deref())?;
    let report = engine.score(&args.profile, text.as_str())?;

    tracing::info!(
        profile = %args.profile,
        pass = report.pass,
        score = report.score,
        violations = report.violations.len(),
        "Scored output"
    );

    if args.json {
        serde_json::to_writer_pretty(&mut *out, &report)?;
        writeln!(out)?;
    } else {
        let status = if report.pass { "PASS" } else { "FAIL" };
        writeln!(out, "{} score={:.3}", status, report.score)?;
        writeln!(out, "{}", report.reason)?;
    }

    if args.check && !report.pass {
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

#[derive(Serialize)]
struct ProfileListing<'a> {
    name: &'a str,
    total_weight: u32,
    rules: usize,
    description: Option<&'a str>,
}

impl<'a> From<&'a Profile> for ProfileListing<'a> {
    fn from(profile: &'a Profile) -> Self {
        Self {
            name: &profile.name,
            total_weight: profile.rule_set.total_weight,
            rules: profile.rule_set.rules.len(),
            description: profile.description.as_deref(),
        }
    }
}

fn profiles(command: ProfilesCommand, out: &mut dyn Write) -> Result<()> {
    match command {
        ProfilesCommand::List(sources) => {
            let engine = sources.engine()?;
            for listing in engine.registry().iter().map(ProfileListing::from) {
                writeln!(
                    out,
                    "{}\tweight={}\trules={}\t{}",
                    listing.name,
                    listing.total_weight,
                    listing.rules,
                    listing.description.unwrap_or_default()
                )?;
            }
        }
        ProfilesCommand::Show { name, sources } => {
            let engine = sources.engine()?;
            write!(out, "{}", engine.profile(&name)?.to_yaml()?)?;
        }
        ProfilesCommand::Validate { file } => {
            let profile = Profile::from_file(&file)
                .with_context(|| format!("{} is not a valid profile", file.display()))?;
            let listing = ProfileListing::from(&profile);
            serde_json::to_writer_pretty(&mut *out, &listing)?;
            writeln!(out)?;
        }
    }
    Ok(())
}

fn latest_fixture(episodes: &Path) -> Result<TestFixture> {
    let records = load_episodes(episodes)
        .with_context(|| format!("failed to load episodes from {}", episodes.display()))?;
    let Some(latest) = fixture::select_latest(&records) else {
        bail!("no completed episode with a transcript over {} chars", fixture::MIN_TRANSCRIPT_CHARS);
    };

    tracing::info!(id = latest.id, description = %latest.description(), "Selected test case");
    Ok(TestFixture::from_record(latest)?)
}

fn fixture_command(args: FixtureArgs, out: &mut dyn Write) -> Result<()> {
    let fixture = latest_fixture(&args.episodes)?;
    serde_json::to_writer_pretty(&mut *out, &fixture)?;
    writeln!(out)?;
    Ok(())
}

fn suite(args: SuiteArgs, out: &mut dyn Write) -> Result<()> {
    let settings = match &args.settings {
        Some(path) => SuiteSettings::from_file(path)
            .with_context(|| format!("failed to load suite settings from {}", path.display()))?,
        None => SuiteSettings::default(),
    };
    let fixture = latest_fixture(&args.episodes)?;

    if let Some(dir) = &args.assets_dir {
        let path = write_assertion_script(dir)
            .with_context(|| format!("failed to write assertion script under {}", dir.display()))?;
        tracing::info!(path = %path.display(), "Wrote structural assertion script");
    }

    serde_json::to_writer_pretty(&mut *out, &assemble_suite(&fixture, &settings))?;
    writeln!(out)?;
    Ok(())
}

fn extract(args: ExtractArgs, out: &mut dyn Write) -> Result<()> {
    let records = load_episodes(&args.episodes)
        .with_context(|| format!("failed to load episodes from {}", args.episodes.display()))?;
    let selected = fixture::select_diverse(&records, args.limit);
    if selected.is_empty() {
        bail!("no completed episodes with paragraph summaries to extract");
    }

    let transcripts = args.out_dir.join("transcripts");
    let expected = args.out_dir.join("expected");
    fs::create_dir_all(&transcripts)?;
    fs::create_dir_all(&expected)?;

    for record in selected {
        let slug = record.slug();
        let chunk = fixture::chunk_transcript(&record.transcript_text, args.chunk_chars);
        fs::write(transcripts.join(format!("{}.txt", slug)), &chunk)?;

        let meta = fixture::expected_meta(record)
            .with_context(|| format!("episode {} has malformed stored analysis", record.id))?;
        let report = meta.check();
        if !report.pass {
            tracing::warn!(
                slug = %slug,
                score = report.score,
                reason = %report.reason,
                "Stored analysis does not meet the meta-analysis profile"
            );
        }
        fs::write(
            expected.join(format!("{}-meta.json", slug)),
            serde_json::to_string_pretty(&meta)?,
        )?;

        writeln!(
            out,
            "{}: {} ({})",
            slug,
            record.political_stance.as_deref().unwrap_or_default(),
            record.description()
        )?;
    }
    Ok(())
}

fn analyze_command(args: AnalyzeArgs, out: &mut dyn Write) -> Result<()> {
    let document = ResultsDocument::from_file(&args.results)
        .with_context(|| format!("failed to read results from {}", args.results.display()))?;
    let summary = analyze(&document);

    if args.json {
        serde_json::to_writer_pretty(&mut *out, &summary)?;
        writeln!(out)?;
    } else {
        write!(out, "{}", summary)?;
    }
    Ok(())
}

fn debug_command(args: DebugFailuresArgs, out: &mut dyn Write) -> Result<()> {
    let document = ResultsDocument::from_file(&args.results)
        .with_context(|| format!("failed to read results from {}", args.results.display()))?;
    let failures = debug_failures(&document, &args.provider);

    writeln!(out, "Found {} {} failures", failures.len(), args.provider)?;
    writeln!(out)?;
    for failure in &failures {
        writeln!(out, "{}", failure)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("conformance-cli-{}-{}", std::process::id(), name))
    }

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_score() {
        let cli = Cli::try_parse_from([
            "conformance",
            "score",
            "--profile",
            "chunk-analysis",
            "--check",
            "out.json",
        ])
        .unwrap();
        match cli.command {
            Command::Score(args) => {
                assert_eq!(args.profile, "chunk-analysis");
                assert!(args.check);
                assert!(!args.json);
                assert_eq!(args.input, Some(PathBuf::from("out.json")));
            }
            other => panic!("unexpected command: {:?}", other),
        }
        assert_eq!(cli.log_level, "warn");
    }

    #[test]
    fn test_parse_extract_defaults() {
        let cli = Cli::try_parse_from([
            "conformance",
            "extract",
            "--episodes",
            "episodes.json",
            "--out-dir",
            "test-data",
        ])
        .unwrap();
        match cli.command {
            Command::Extract(args) => {
                assert_eq!(args.limit, 5);
                assert_eq!(args.chunk_chars, 8000);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_score_file() {
        let input = temp_path("score.json");
        fs::write(&input, r#"{"keyPoints": [], "quotes": [], "stanceSignals": [], "topics": ["x"], "tone": "calm"}"#)
            .unwrap();

        let args = ScoreArgs {
            profile: "chunk-analysis".to_string(),
            sources: ProfileSources::default(),
            input: Some(input.clone()),
            json: false,
            check: true,
        };
        let mut out = Vec::new();
        let code = score(args, &mut out).unwrap();
        fs::remove_file(&input).unwrap();

        assert_eq!(code, ExitCode::FAILURE);
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "FAIL score=0.800\nkeyPoints has 0 non-empty items (expected at least 1)\n"
        );
    }

    #[test]
    fn test_score_unknown_profile() {
        let input = temp_path("unknown.json");
        fs::write(&input, "{}").unwrap();

        let args = ScoreArgs {
            profile: "nope".to_string(),
            sources: ProfileSources::default(),
            input: Some(input.clone()),
            json: true,
            check: false,
        };
        let err = score(args, &mut Vec::new()).unwrap_err();
        fs::remove_file(&input).unwrap();
        assert!(err.to_string().contains("Unknown profile: nope"));
    }

    #[test]
    fn test_profiles_list_and_show() {
        let mut out = Vec::new();
        profiles(ProfilesCommand::List(ProfileSources::default()), &mut out).unwrap();
        let listing = String::from_utf8(out).unwrap();
        assert!(listing.starts_with("chunk-analysis\tweight=5\trules=5"));
        assert!(listing.contains("meta-analysis\tweight=8\trules=8"));

        let mut out = Vec::new();
        profiles(
            ProfilesCommand::Show {
                name: "meta-analysis".to_string(),
                sources: ProfileSources::default(),
            },
            &mut out,
        )
        .unwrap();
        let yaml = String::from_utf8(out).unwrap();
        assert!(Profile::from_yaml(&yaml).is_ok());
    }

    #[test]
    fn test_suite_writes_assertion_script() {
        let episodes = temp_path("suite-episodes.json");
        let record = serde_json::json!([{
            "id": 7,
            "title": "Budget Day",
            "podcast_name": "Hill Talk",
            "transcript_text": "The minister spoke at length. ".repeat(200),
            "political_stance": "Centrist",
            "summary": "A budget debate.",
            "completed_at": "2025-03-01T12:00:00Z"
        }]);
        fs::write(&episodes, record.to_string()).unwrap();
        let assets = temp_path("suite-assets");

        let mut out = Vec::new();
        suite(
            SuiteArgs {
                episodes: episodes.clone(),
                settings: None,
                assets_dir: Some(assets.clone()),
            },
            &mut out,
        )
        .unwrap();
        fs::remove_file(&episodes).unwrap();

        let config: serde_json::Value = serde_json::from_slice(&out).unwrap();
        let reference = config["tests"][0]["assert"][1]["value"].as_str().unwrap();
        let script = assets.join(reference.strip_prefix("file://").unwrap());
        assert!(script.is_file());
        fs::remove_dir_all(&assets).unwrap();
    }

    #[test]
    fn test_analyze_and_debug_commands() {
        let results = temp_path("results.json");
        fs::write(
            &results,
            r#"{"results": {"results": [
                {"provider": {"label": "Granite 3.3 8B"}, "success": false, "description": "Case",
                 "response": {"output": "{}"},
                 "gradingResult": {"score": 0.0, "componentResults": [
                    {"pass": false, "reason": "tone is empty or missing", "assertion": {"type": "javascript"}}]}}
            ], "stats": {"successes": 0, "failures": 1}}}"#,
        )
        .unwrap();

        let mut out = Vec::new();
        analyze_command(AnalyzeArgs { results: results.clone(), json: false }, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Granite 3.3 8B:  0/1 passed (0%)  avg score: 0.00  [1 FAILED]"));

        let mut out = Vec::new();
        debug_command(
            DebugFailuresArgs { results: results.clone(), provider: "Granite".to_string() },
            &mut out,
        )
        .unwrap();
        fs::remove_file(&results).unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("Found 1 Granite failures\n"));
        assert!(text.contains("  FAIL [javascript]: tone is empty or missing"));
    }
}
