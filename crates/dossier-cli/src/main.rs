//! `dossier` command line
//!
//! Exit codes of `review`: 0 PROCEED, 1 PROCEED_WITH_FINDINGS,
//! 2 DO_NOT_PROCEED, 3 runtime failure, 4 usage or configuration error.
//! The verify commands exit 0 when everything checks out and 1 otherwise.

use anyhow::Context;
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use dossier_core::types::{DEFAULT_STORE_DIR, DEFAULT_TRACE_DIR};
use dossier_core::{AbortHandle, Collaborators, Orchestrator, ReviewConfig, ReviewError};
use dossier_custody::{verify_record, CustodyChain, LedgerError, LEDGER_FILE};
use dossier_integrity::{CalibrationProfile, ProfileError, ProfileName};
use dossier_trace::{list_runs, verify_run, RunId, TraceError};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

const EXIT_OK: i32 = 0;
const EXIT_VERIFY_FAILED: i32 = 1;
const EXIT_RUNTIME: i32 = 3;
const EXIT_USAGE: i32 = 4;

fn cli() -> Command {
    let store = Arg::new("store")
        .long("store")
        .env("DOSSIER_STORE")
        .default_value(DEFAULT_STORE_DIR)
        .value_parser(value_parser!(PathBuf))
        .help("Custody store directory");
    let trace_dir = Arg::new("trace-dir")
        .long("trace-dir")
        .env("DOSSIER_TRACE_DIR")
        .default_value(DEFAULT_TRACE_DIR)
        .value_parser(value_parser!(PathBuf))
        .help("Trace log directory");

    Command::new("dossier")
        .version(dossier_core::VERSION)
        .about("Evidence-grounded review of administrative case files")
        .arg_required_else_help(true)
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit diagnostics as JSON lines"),
        )
        .subcommand(
            Command::new("review")
                .about("Review a case folder and print the decision")
                .arg(
                    Arg::new("folder")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Case folder to review"),
                )
                .arg(
                    Arg::new("profile")
                        .long("profile")
                        .env("DOSSIER_PROFILE")
                        .default_value(ProfileName::Balanced.as_str())
                        .help("Preset name (conservative, balanced, permissive) or path to a JSON profile"),
                )
                .arg(store.clone())
                .arg(trace_dir.clone())
                .arg(
                    Arg::new("report")
                        .long("report")
                        .value_parser(value_parser!(PathBuf))
                        .help("Also write the JSON report to this path"),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Print the report as JSON instead of text"),
                )
                .arg(
                    Arg::new("no-halt")
                        .long("no-halt")
                        .action(ArgAction::SetTrue)
                        .help("Keep running the later stages after a CRITICAL checkpoint"),
                )
                .arg(
                    Arg::new("max-lookups")
                        .long("max-lookups")
                        .default_value("4")
                        .value_parser(value_parser!(usize))
                        .help("Registry lookups allowed in flight at once"),
                ),
        )
        .subcommand(
            Command::new("verify-custody")
                .about("Verify the custody ledger chain and the stored copies")
                .arg(store)
                .arg(Arg::new("case").long("case").help("Only re-hash the copies of this case")),
        )
        .subcommand(
            Command::new("verify-trace")
                .about("Verify the hash chains of recorded runs")
                .arg(trace_dir)
                .arg(Arg::new("run").long("run").help("Only verify this run id")),
        )
        .subcommand(
            Command::new("profiles")
                .about("List the calibration presets")
                .arg(Arg::new("show").long("show").help("Print one preset as JSON")),
        )
}

#[tokio::main]
async fn main() {
    let matches = match cli().try_get_matches() {
        Ok(m) => m,
        Err(e) if e.use_stderr() => {
            let _ = e.print();
            std::process::exit(EXIT_USAGE);
        }
        Err(e) => {
            // --help and --version
            let _ = e.print();
            std::process::exit(EXIT_OK);
        }
    };

    init_logging(matches.get_flag("log-json"));

    let code = match run(&matches).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            exit_code_for(&err)
        }
    };
    std::process::exit(code);
}

fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn run(matches: &ArgMatches) -> anyhow::Result<i32> {
    match matches.subcommand() {
        Some(("review", args)) => review(args).await,
        Some(("verify-custody", args)) => verify_custody(args),
        Some(("verify-trace", args)) => verify_trace(args),
        Some(("profiles", args)) => profiles(args),
        _ => Ok(EXIT_USAGE),
    }
}

async fn review(args: &ArgMatches) -> anyhow::Result<i32> {
    let folder = path_arg(args, "folder")?;
    let profile = resolve_profile(string_arg(args, "profile")?)?;
    let config = ReviewConfig::new()
        .with_profile(profile)
        .with_store_dir(path_arg(args, "store")?)
        .with_trace_dir(path_arg(args, "trace-dir")?)
        .with_halt_on_critical(!args.get_flag("no-halt"))
        .with_max_concurrent_lookups(args.get_one::<usize>("max-lookups").copied().unwrap_or(4));

    let orchestrator = Orchestrator::new(config, Collaborators::builtin())?;

    let abort = AbortHandle::new();
    let on_signal = abort.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, stopping after the current stage");
            on_signal.abort();
        }
    });

    let report = orchestrator.review_with_abort(&folder, &abort).await?;

    if let Some(path) = args.get_one::<PathBuf>("report") {
        report.persist(path)?;
        tracing::info!(case_id = %report.case_id, "report written to {}", path.display());
    }

    if args.get_flag("json") {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", report.render_text());
    }
    Ok(report.exit_code())
}

fn verify_custody(args: &ArgMatches) -> anyhow::Result<i32> {
    let store = path_arg(args, "store")?;
    if !store.join(LEDGER_FILE).is_file() {
        return Err(Usage(format!("no custody ledger under {}", store.display())).into());
    }
    let chain = CustodyChain::open(&store)?;

    let entries = match chain.ledger().verify_chain() {
        Ok(n) => n,
        Err(LedgerError::BrokenChain { line }) => {
            println!("ledger chain BROKEN at line {line}");
            return Ok(EXIT_VERIFY_FAILED);
        }
        Err(e) => return Err(e.into()),
    };
    println!("ledger chain ok ({entries} entries)");

    let records = match args.get_one::<String>("case") {
        Some(case_id) => chain.ledger().records_for_case(case_id)?,
        None => chain.ledger().records()?,
    };
    let mut mismatches = 0usize;
    for record in &records {
        if verify_record(record) {
            println!("ok        {} {}", record.custody_id, record.file_name());
        } else {
            mismatches += 1;
            println!("MISMATCH  {} {}", record.custody_id, record.file_name());
        }
    }
    println!("{} copies checked, {mismatches} mismatched", records.len());
    Ok(if mismatches == 0 { EXIT_OK } else { EXIT_VERIFY_FAILED })
}

fn verify_trace(args: &ArgMatches) -> anyhow::Result<i32> {
    let dir = path_arg(args, "trace-dir")?;
    if !dir.is_dir() {
        return Err(Usage(format!("no trace directory at {}", dir.display())).into());
    }

    let runs: Vec<RunId> = match args.get_one::<String>("run") {
        Some(raw) => {
            let run_id = raw
                .parse::<RunId>()
                .map_err(|_| Usage(format!("invalid run id: {raw}")))?;
            vec![run_id]
        }
        None => list_runs(&dir)?.into_iter().map(|r| r.run_id).collect(),
    };

    let mut broken = 0usize;
    for run_id in &runs {
        match verify_run(&dir, *run_id) {
            Ok(events) => println!("ok      {run_id} ({events} events)"),
            Err(TraceError::BrokenChain { seq, .. }) => {
                broken += 1;
                println!("BROKEN  {run_id} at seq {seq}");
            }
            Err(TraceError::UnknownRun(_)) => {
                broken += 1;
                println!("MISSING {run_id}");
            }
            Err(e) => return Err(e.into()),
        }
    }
    println!("{} runs checked, {broken} failed", runs.len());
    Ok(if broken == 0 { EXIT_OK } else { EXIT_VERIFY_FAILED })
}

fn profiles(args: &ArgMatches) -> anyhow::Result<i32> {
    if let Some(name) = args.get_one::<String>("show") {
        let profile = CalibrationProfile::preset(name.parse::<ProfileName>()?);
        println!("{}", serde_json::to_string_pretty(&profile)?);
        return Ok(EXIT_OK);
    }
    for name in ProfileName::ALL {
        let marker = if name == ProfileName::default() { " (default)" } else { "" };
        println!("{name}{marker}");
    }
    Ok(EXIT_OK)
}

/// Preset name first, then a JSON profile document on disk
fn resolve_profile(value: &str) -> Result<CalibrationProfile, ProfileError> {
    match value.parse::<ProfileName>() {
        Ok(name) => Ok(CalibrationProfile::preset(name)),
        Err(unknown) if Path::new(value).is_file() => {
            tracing::debug!("{unknown}, reading '{value}' as a profile document");
            CalibrationProfile::load(Path::new(value))
        }
        Err(unknown) => Err(unknown),
    }
}

fn path_arg(args: &ArgMatches, name: &str) -> anyhow::Result<PathBuf> {
    args.get_one::<PathBuf>(name)
        .cloned()
        .with_context(|| format!("missing --{name}"))
}

fn string_arg<'a>(args: &'a ArgMatches, name: &str) -> anyhow::Result<&'a str> {
    args.get_one::<String>(name)
        .map(String::as_str)
        .with_context(|| format!("missing --{name}"))
}

/// Command line input that parsed but makes no sense
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
struct Usage(String);

fn exit_code_for(err: &anyhow::Error) -> i32 {
    if err.downcast_ref::<Usage>().is_some() || err.downcast_ref::<ProfileError>().is_some() {
        return EXIT_USAGE;
    }
    match err.downcast_ref::<ReviewError>() {
        Some(ReviewError::CaseFolder { .. } | ReviewError::EmptyCase(_)) => EXIT_USAGE,
        _ => EXIT_RUNTIME,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_definition_is_consistent() {
        cli().debug_assert();
    }

    #[test]
    fn review_flags_parse() {
        let m = cli()
            .try_get_matches_from([
                "dossier",
                "review",
                "cases/CT-1",
                "--profile",
                "conservative",
                "--no-halt",
                "--json",
            ])
            .unwrap();
        let (name, args) = m.subcommand().unwrap();
        assert_eq!(name, "review");
        assert_eq!(args.get_one::<PathBuf>("folder").unwrap(), &PathBuf::from("cases/CT-1"));
        assert_eq!(args.get_one::<String>("profile").unwrap(), "conservative");
        assert!(args.get_flag("no-halt"));
        assert!(args.get_flag("json"));
    }

    #[test]
    fn review_requires_a_folder() {
        assert!(cli().try_get_matches_from(["dossier", "review"]).is_err());
    }

    #[test]
    fn presets_resolve_by_name() {
        let profile = resolve_profile("Permissive").unwrap();
        assert_eq!(profile, CalibrationProfile::preset(ProfileName::Permissive));
    }

    #[test]
    fn unknown_profile_is_a_usage_error() {
        let err = resolve_profile("no-such-profile-anywhere").unwrap_err();
        assert!(matches!(err, ProfileError::UnknownPreset(_)));
        assert_eq!(exit_code_for(&anyhow::Error::from(err)), EXIT_USAGE);
    }

    #[test]
    fn profile_documents_load_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("strict.json");
        std::fs::write(
            &path,
            r#"{"name": "strict", "extends": "conservative", "thresholds": {"identifier.accept": 0.97}}"#,
        )
        .unwrap();
        let profile = resolve_profile(path.to_str().unwrap()).unwrap();
        assert_eq!(profile.name, "strict");
    }

    #[test]
    fn runtime_failures_map_to_three() {
        let err = ReviewError::Trace(TraceError::UnknownRun(RunId::new()));
        assert_eq!(exit_code_for(&anyhow::Error::from(err)), EXIT_RUNTIME);
        let err = ReviewError::EmptyCase(PathBuf::from("cases/empty"));
        assert_eq!(exit_code_for(&anyhow::Error::from(err)), EXIT_USAGE);
    }
}
