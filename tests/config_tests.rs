//! Layered configuration feeding the pipeline.

mod fixtures;

use std::fs;
use std::time::Duration;

use fixtures::*;
use serde_json::json;
use spec2sim::config::{ConfigOrigin, EffectiveConfig};
use spec2sim::{Controller, Status, Verifier};
use tempfile::TempDir;

fn write(dir: &TempDir, name: &str, body: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, body).unwrap();
    path
}

// =============================================================================
// Layer precedence
// =============================================================================

#[test]
fn test_project_and_cli_layers_reach_settings() {
    let dir = TempDir::new().unwrap();
    let user = write(
        &dir,
        "user.toml",
        "[sandbox]\ninterpreter = \"python3.12\"\ntimeout_seconds = 5\n",
    );
    let project = write(
        &dir,
        "spec2sim.toml",
        "[pipeline]\nmax_attempts = 4\n\n[synthesis]\ncommand = \"llm-synth\"\nargs = [\"--model\", \"small\"]\n",
    );

    let config = EffectiveConfig::build(
        Some(user.as_path()),
        Some(project.as_path()),
        Some(json!({"pipeline": {"max_attempts": 2}})),
    )
    .unwrap();

    let origins: Vec<_> = config.sources.iter().map(|s| s.origin.clone()).collect();
    assert_eq!(
        origins,
        vec![
            ConfigOrigin::Builtin,
            ConfigOrigin::User,
            ConfigOrigin::Project,
            ConfigOrigin::Cli
        ]
    );

    let settings = config.settings().unwrap();
    assert_eq!(settings.pipeline.max_attempts, 2);
    assert_eq!(settings.sandbox.interpreter, "python3.12");
    assert_eq!(settings.verify_policy().sandbox_timeout, Duration::from_secs(5));
    assert_eq!(settings.synthesis.command.as_deref(), Some("llm-synth"));
    assert_eq!(settings.synthesis.args, vec!["--model", "small"]);
    assert!(settings.extraction.oracle().is_none());
}

#[test]
fn test_invalid_project_value_rejected() {
    let dir = TempDir::new().unwrap();
    let project = write(&dir, "spec2sim.toml", "[pipeline]\nmax_attempts = 1000\n");
    let config = EffectiveConfig::build(None, Some(project.as_path()), None).unwrap();
    let err = config.settings().unwrap_err();
    assert!(err.to_string().contains("max_attempts"), "{}", err);
}

#[test]
fn test_wait_summing_is_opt_in() {
    let defaults = EffectiveConfig::build(None, None, None).unwrap();
    assert!(!defaults.settings().unwrap().verify_policy().tolerance.sum_waits);

    let dir = TempDir::new().unwrap();
    let project = write(&dir, "spec2sim.toml", "[verify.tolerance]\nsum_waits = true\n");
    let config = EffectiveConfig::build(None, Some(project.as_path()), None).unwrap();
    let policy = config.settings().unwrap().verify_policy();
    assert!(policy.tolerance.sum_waits);
    assert_eq!(policy.tolerance.relative, 0.05);
}

#[test]
fn test_malformed_toml_is_parse_error() {
    let dir = TempDir::new().unwrap();
    let project = write(&dir, "spec2sim.toml", "[pipeline\nmax_attempts = 3\n");
    assert!(EffectiveConfig::build(None, Some(project.as_path()), None).is_err());
}

// =============================================================================
// Settings drive the controller
// =============================================================================

#[test]
fn test_configured_bound_limits_attempts() {
    let config =
        EffectiveConfig::build(None, None, Some(json!({"pipeline": {"max_attempts": 1}}))).unwrap();
    let settings = config.settings().unwrap();

    let synthesizer = ScriptedSynthesizer::new([SILENT_CODE]);
    let verifier = Verifier::with_policy(CannedSandbox::traffic_light(), settings.verify_policy());
    let controller = Controller::new(
        |_: &str| -> spec2sim::oracle::OracleResult<spec2sim::Specification> {
            Ok(traffic_light_spec())
        },
        synthesizer.clone(),
        verifier,
    )
    .with_config(settings.pipeline_config());

    let run = controller.run("a traffic light").unwrap();
    assert_eq!(run.status(), Status::Fail);
    assert_eq!(run.attempts.len(), 2);
    assert_eq!(synthesizer.calls().len(), 2);
}
