use std::{error::Error, fs, path::PathBuf, process::ExitCode};

use clap::{ArgAction, Parser, Subcommand};
use tracing::error;

use changescope::{
    config::Config,
    detectors::{diff_analyzer, impact::HttpMethod, line_changes::diff_sources},
    healing::{
        EndpointResolver, HealingLedger, HealingReport, ReqwestTransport, ResolveOptions,
        TargetOutcome, TargetReport,
    },
    logger, persistence,
    testgen::{build_index, generate_test_targets, TargetKind},
};

#[derive(Parser)]
#[command(
    name = "changescope",
    version,
    about = "Map a diff to changed declarations and test targets, and resolve drifted endpoints."
)]
struct Cli {
    /// More log output on stderr (-v, -vv, -vvv).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Log as JSON lines.
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand)]
enum CliCommand {
    /// Analyze the working tree and write change-analysis.json and test-targets.json
    Analyze {
        #[arg(long, default_value = ".")]
        root: PathBuf,
        /// Revision to diff against
        #[arg(long)]
        base: Option<String>,
        /// Output directory
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Print the test targets for a saved analysis
    Targets {
        #[arg(long, default_value = ".")]
        root: PathBuf,
        /// Defaults to change-analysis.json in the output directory
        #[arg(long)]
        analysis: Option<PathBuf>,
    },

    /// Analyze two versions of one file without git
    DiffFiles {
        old: PathBuf,
        new: PathBuf,
        /// Repository-relative path used for classification
        #[arg(long)]
        path: Option<String>,
    },

    /// Resolve an endpoint against API_BASE_URL and write healing-report.json
    ResolveEndpoint {
        path: String,
        #[arg(long, default_value = "GET")]
        method: HttpMethod,
        #[arg(long, default_value = ".")]
        root: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logger::init(cli.verbose, cli.json_logs);

    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "run failed");
            eprintln!("changescope: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(command: CliCommand) -> Result<(), Box<dyn Error>> {
    match command {
        CliCommand::Analyze { root, base, out } => {
            let mut cfg = Config::load(root)?;
            if base.is_some() {
                cfg.base_ref = base;
            }
            if let Some(out) = out {
                cfg.output_dir = out;
            }

            let analysis = diff_analyzer::analyze_repository(&cfg)?;
            persistence::save_change_analysis(&cfg.output_dir, &analysis)?;
            persistence::save_test_targets(&cfg.output_dir, &build_index(&analysis.files))?;

            println!("{}", serde_json::to_string_pretty(&analysis.summary)?);
        }

        CliCommand::Targets { root, analysis } => {
            let cfg = Config::load(root)?;
            let path = analysis.unwrap_or_else(|| cfg.output_dir.join(persistence::CHANGE_ANALYSIS_FILE));

            let analysis = persistence::load_change_analysis(&path)?;
            let targets = generate_test_targets(&analysis.files);
            println!("{}", serde_json::to_string_pretty(&targets)?);
        }

        CliCommand::DiffFiles { old, new, path } => {
            let before = fs::read_to_string(&old)?;
            let after = fs::read_to_string(&new)?;
            let path = path.unwrap_or_else(|| new.to_string_lossy().replace('\\', "/"));

            let diff = diff_sources(&path, &before, &after);
            let change = diff_analyzer::analyze_file(&path, &diff, Some(&after));
            println!("{}", serde_json::to_string_pretty(&change)?);
        }

        CliCommand::ResolveEndpoint { path, method, root } => {
            let cfg = Config::load(root)?;
            let base = cfg
                .api_base_url
                .as_deref()
                .ok_or("API_BASE_URL is not configured")?;

            let transport = ReqwestTransport::new(base)?;
            let ledger = HealingLedger::new();
            let options = ResolveOptions {
                tier_timeout: cfg.tier_timeout,
            };
            let result = EndpointResolver::new(&transport, ledger.clone(), options).resolve(method, &path);

            let outcome = match &result {
                Ok(res) if res.healed => TargetOutcome::Healed { tier: res.tier },
                Ok(res) => TargetOutcome::Resolved { tier: res.tier },
                Err(e) => TargetOutcome::Failed { error: e.to_string() },
            };
            let report = HealingReport::new(
                &ledger,
                vec![TargetReport {
                    id: format!("{method} {path}"),
                    name: path.clone(),
                    kind: TargetKind::Api,
                    outcome,
                }],
            );
            persistence::save_healing_report(&cfg.output_dir, &report)?;

            println!("{}", serde_json::to_string_pretty(&result?)?);
        }
    }

    Ok(())
}
