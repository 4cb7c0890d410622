//! Command-line inspector for MS flag-version histories.
//!
//! `flaggate list` prints the recorded versions of an MS; `flaggate check`
//! dry-runs the gating decision a stage would get, printing the planned
//! commands on success and the remediation message (with a non-zero exit
//! status) on conflict. Neither subcommand touches the MS or its manifest.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use flaggate::config::RewindSpec;
use flaggate::gate::{GateError, StageGate};
use flaggate::store::VersionStore;
use flaggate::types::{MsName, Stage};

#[derive(Parser)]
#[command(name = "flaggate", about = "Inspect and dry-run MS flag-version gating")]
struct Cli {
    /// Directory holding the MSs and their .flagversions sidecars.
    #[arg(long, default_value = ".")]
    msdir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List the recorded flag versions of an MS, oldest first.
    List {
        /// MS name, relative to --msdir.
        ms: String,
    },

    /// Dry-run the gating decision for one stage on one MS.
    Check {
        /// MS name, relative to --msdir.
        ms: String,

        /// Pipeline prefix (the part shared by all stages of a run).
        #[arg(long)]
        prefix: String,

        /// Stage name as it appears in the configuration file.
        #[arg(long)]
        stage: String,

        /// Path to a YAML file holding the stage's rewind_flags block.
        /// Without it, the default policy (no rewind, no overwrite)
        /// applies.
        #[arg(long)]
        rewind_flags: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "flaggate=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{}", err);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Command::List { ms } => {
            let mut store = VersionStore::new(&cli.msdir);
            let history = store.list(&MsName::new(ms))?;
            if history.is_empty() {
                println!("(no flag versions recorded)");
            }
            for version in history {
                println!("{}", version);
            }
            Ok(())
        }
        Command::Check {
            ms,
            prefix,
            stage,
            rewind_flags,
        } => {
            let spec = match rewind_flags {
                Some(path) => {
                    let content = std::fs::read_to_string(&path)?;
                    serde_yaml::from_str::<RewindSpec>(&content)?
                }
                None => RewindSpec::disabled(),
            };

            let ms = MsName::new(ms);
            let stage = Stage::new(prefix, stage);
            let mut gate = StageGate::new(&cli.msdir);

            let decision = match gate.enter(&ms, &stage, &spec) {
                Ok(decision) => decision,
                Err(GateError::Conflict(conflict)) => {
                    // The remediation message is the error display.
                    return Err(conflict);
                }
                Err(err) => return Err(err.into()),
            };
            gate.exit(&ms, &stage, &spec);

            println!("decision: {}", serde_json::to_string(&decision)?);
            println!("planned commands:");
            for planned in gate.pending() {
                println!(
                    "  {:>3}  {:<45}  {}",
                    planned.seq, planned.label, planned.command
                );
            }
            Ok(())
        }
    }
}
