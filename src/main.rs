//! spec2sim CLI
//!
//! Entry point for the `spec2sim` command-line tool.

use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use spec2sim::config::{deep_merge, user_config_path, EffectiveConfig, Settings, PROJECT_CONFIG_FILE};
use spec2sim::diagram::to_mermaid;
use spec2sim::oracle::{parse_spec_answer, CommandExtractor, CommandSynthesizer, OracleResult};
use spec2sim::pipeline::{
    new_run_id, write_run_artifacts, Controller, FileSink, StageReport, TRANSCRIPT_FILE,
};
use spec2sim::sandbox::ProcessSandbox;
use spec2sim::signal::SignalHandler;
use spec2sim::simulate::{simulate, SimulationOptions};
use spec2sim::trace::{parse_trace, render};
use spec2sim::{ExitCode, Specification, SpecExtractor, Verifier};
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser)]
#[command(name = "spec2sim")]
#[command(about = "Generate and verify discrete-event simulations", version)]
struct Cli {
    /// More logging (-v debug, -vv trace); RUST_LOG takes precedence
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the verify-and-refine loop on a behavioral description
    Run {
        /// Description text file ("-" for stdin)
        input: PathBuf,

        /// Treat the input as specification JSON and skip extraction
        #[arg(long)]
        spec_json: bool,

        /// Retries allowed after the first attempt
        #[arg(long)]
        max_attempts: Option<u32>,

        /// Project config file (default: ./spec2sim.toml)
        #[arg(long, short = 'c')]
        config: Option<PathBuf>,

        /// Directory for run artifacts
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Do not write run artifacts
        #[arg(long)]
        no_artifacts: bool,

        /// Print the result object as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run one piece of code and judge its trace
    Verify {
        /// Specification JSON file
        #[arg(long)]
        spec: PathBuf,

        /// Simulation code file
        #[arg(long)]
        code: PathBuf,

        /// Project config file (default: ./spec2sim.toml)
        #[arg(long, short = 'c')]
        config: Option<PathBuf>,

        /// Output the verdict as JSON
        #[arg(long)]
        json: bool,
    },

    /// Parse captured simulation output into events
    ParseTrace {
        /// Log file ("-" for stdin)
        log: PathBuf,
    },

    /// Print a Mermaid state diagram for a specification
    Diagram {
        /// Specification JSON file
        spec: PathBuf,
    },

    /// Print the reference simulator's trace for a specification
    Simulate {
        /// Specification JSON file
        spec: PathBuf,

        /// Simulated time horizon in seconds
        #[arg(long, default_value_t = 120.0)]
        until: f64,

        /// Wait before an untimed guard fires, in seconds
        #[arg(long, default_value_t = 1.0)]
        step: f64,
    },

    /// Show the effective configuration
    Config {
        /// Project config file (default: ./spec2sim.toml)
        #[arg(long, short = 'c')]
        config: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Run {
            input,
            spec_json,
            max_attempts,
            config,
            output_dir,
            no_artifacts,
            json,
        } => {
            let overrides = cli_overrides(max_attempts, output_dir, no_artifacts);
            run_pipeline(&input, spec_json, config, overrides, json);
        }
        Commands::Verify {
            spec,
            code,
            config,
            json,
        } => {
            run_verify(&spec, &code, config, json);
        }
        Commands::ParseTrace { log } => {
            run_parse_trace(&log);
        }
        Commands::Diagram { spec } => {
            run_diagram(&spec);
        }
        Commands::Simulate { spec, until, step } => {
            run_simulate(&spec, SimulationOptions { until, step });
        }
        Commands::Config { config } => {
            run_config(config);
        }
    }
}

fn init_tracing(verbose: u8) {
    let filter = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .without_time(),
        )
        .init();
}

fn fail(message: impl std::fmt::Display) -> ! {
    eprintln!("Error: {}", message);
    process::exit(ExitCode::Failed.as_i32());
}

fn read_input(path: &Path) -> String {
    let result = if path.as_os_str() == "-" {
        let mut text = String::new();
        std::io::stdin().read_to_string(&mut text).map(|_| text)
    } else {
        fs::read_to_string(path)
    };
    result.unwrap_or_else(|e| fail(format!("cannot read {}: {}", path.display(), e)))
}

fn read_spec(path: &Path) -> Specification {
    let text = read_input(path);
    Specification::from_json_checked(&text)
        .unwrap_or_else(|e| fail(format!("invalid specification {}: {}", path.display(), e)))
}

fn cli_overrides(
    max_attempts: Option<u32>,
    output_dir: Option<PathBuf>,
    no_artifacts: bool,
) -> Option<Value> {
    let mut overrides = json!({});
    if let Some(n) = max_attempts {
        overrides = deep_merge(overrides, json!({"pipeline": {"max_attempts": n}}));
    }
    if let Some(dir) = output_dir {
        overrides = deep_merge(overrides, json!({"output": {"dir": dir.to_string_lossy()}}));
    }
    if no_artifacts {
        overrides = deep_merge(overrides, json!({"output": {"artifacts": false}}));
    }
    match overrides.as_object() {
        Some(map) if map.is_empty() => None,
        _ => Some(overrides),
    }
}

fn load_config(project: Option<PathBuf>, overrides: Option<Value>) -> EffectiveConfig {
    let user = user_config_path();
    let project = project.unwrap_or_else(|| PathBuf::from(PROJECT_CONFIG_FILE));
    EffectiveConfig::build(user.as_deref(), Some(project.as_path()), overrides)
        .unwrap_or_else(|e| fail(format!("configuration: {}", e)))
}

fn load_settings(config: &EffectiveConfig) -> Settings {
    config
        .settings()
        .unwrap_or_else(|e| fail(format!("configuration: {}", e)))
}

fn print_progress(report: &StageReport<'_>) {
    let attempt = report
        .attempt
        .map(|n| format!(" #{}", n))
        .unwrap_or_default();
    let mark = if report.ok { "ok" } else { "failed" };
    eprintln!("{}{} {}: {}", report.stage, attempt, mark, report.detail);
}

fn run_pipeline(
    input: &Path,
    spec_json: bool,
    project_config: Option<PathBuf>,
    overrides: Option<Value>,
    json_output: bool,
) {
    let run_id = new_run_id();
    let config = load_config(project_config, overrides).with_run_id(run_id.clone());
    let settings = load_settings(&config);

    let synthesizer = match settings.synthesis.oracle() {
        Some(oracle) => CommandSynthesizer::new(oracle),
        None => fail("no synthesis command configured (set synthesis.command)"),
    };
    let extractor = if spec_json {
        None
    } else {
        match settings.extraction.oracle() {
            Some(oracle) => Some(CommandExtractor::new(oracle)),
            None => fail("no extraction command configured (set extraction.command or pass --spec-json)"),
        }
    };
    let extract = move |text: &str| -> OracleResult<Specification> {
        match &extractor {
            Some(extractor) => extractor.extract(text),
            None => parse_spec_answer(text),
        }
    };

    let signals = SignalHandler::new();
    if let Err(e) = signals.install() {
        tracing::warn!(error = %e, "could not install interrupt handler");
    }

    let verifier = Verifier::with_policy(
        ProcessSandbox::new(settings.sandbox_config()),
        settings.verify_policy(),
    );
    let mut controller = Controller::new(extract, synthesizer, verifier)
        .with_config(settings.pipeline_config())
        .with_observer(print_progress)
        .with_cancellation(signals.state())
        .with_run_id(run_id.clone());

    let run_dir = settings.output.dir.join(&run_id);
    if settings.output.artifacts {
        match FileSink::create(run_dir.join(TRANSCRIPT_FILE)) {
            Ok(sink) => controller = controller.with_sink(sink),
            Err(e) => tracing::warn!(error = %e, "could not open transcript file"),
        }
    }

    let text = read_input(input);
    let run = match controller.run(&text) {
        Ok(run) => run,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(e.exit_code().as_i32());
        }
    };

    if settings.output.artifacts {
        let written = write_run_artifacts(&run_dir, &run).and_then(|_| {
            config.write_to_file(&run_dir.join("effective_config.json"))
        });
        match written {
            Ok(()) => eprintln!("Artifacts: {}", run_dir.display()),
            Err(e) => eprintln!("Warning: failed to write artifacts: {}", e),
        }
    }

    let result = run.result();
    if json_output {
        match result.to_json() {
            Ok(json) => println!("{}", json),
            Err(e) => fail(format!("serializing result: {}", e)),
        }
    } else {
        println!(
            "{} after {} attempt(s): {}",
            run.status(),
            run.attempts.len(),
            run.verdict.reason
        );
        if run.is_pass() {
            println!();
            println!("{}", result.code);
        }
    }

    process::exit(run.status().exit_code().as_i32());
}

fn run_verify(spec_path: &Path, code_path: &Path, project_config: Option<PathBuf>, json_output: bool) {
    let spec = read_spec(spec_path);
    let code = read_input(code_path);
    let settings = load_settings(&load_config(project_config, None));

    let verifier = Verifier::with_policy(
        ProcessSandbox::new(settings.sandbox_config()),
        settings.verify_policy(),
    );
    let verification = verifier.check(&spec, &code);
    let verdict = &verification.verdict;

    if json_output {
        match serde_json::to_string_pretty(verdict) {
            Ok(json) => println!("{}", json),
            Err(e) => fail(format!("serializing verdict: {}", e)),
        }
    } else {
        println!("{}: {}", verdict.status, verdict.reason);
        for warning in &verdict.warnings {
            eprintln!("Warning: {}", warning);
        }
        if !verdict.is_pass() {
            eprint!("{}", verification.result.combined_output());
        }
    }

    process::exit(verdict.status.exit_code().as_i32());
}

fn run_parse_trace(log: &Path) {
    let parsed = parse_trace(&read_input(log));
    match serde_json::to_string_pretty(&parsed) {
        Ok(json) => println!("{}", json),
        Err(e) => fail(format!("serializing trace: {}", e)),
    }
}

fn run_diagram(spec_path: &Path) {
    print!("{}", to_mermaid(&read_spec(spec_path)));
}

fn run_simulate(spec_path: &Path, options: SimulationOptions) {
    let spec = read_spec(spec_path);
    match simulate(&spec, options) {
        Ok(events) => print!("{}", render(&events)),
        Err(e) => fail(e),
    }
}

fn run_config(project_config: Option<PathBuf>) {
    let config = load_config(project_config, None);
    match config.to_json() {
        Ok(json) => println!("{}", json),
        Err(e) => fail(format!("serializing config: {}", e)),
    }
}
