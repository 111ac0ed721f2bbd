//! On-disk run artifacts under `<output_dir>/<run_id>/`.
//!
//! ```text
//! <run_id>/
//!   run_summary.json
//!   result.json
//!   spec.json
//!   diagram.mmd
//!   transcript.log
//!   attempts/<n>/simulation.py
//!   attempts/<n>/verdict.json
//!   attempts/<n>/stdout.txt, stderr.txt
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use super::run::PipelineRun;
use crate::summary::RunSummary;

pub const RUN_SUMMARY_FILE: &str = "run_summary.json";
pub const RESULT_FILE: &str = "result.json";
pub const SPEC_FILE: &str = "spec.json";
pub const DIAGRAM_FILE: &str = "diagram.mmd";
pub const TRANSCRIPT_FILE: &str = "transcript.log";

fn json_error(e: serde_json::Error) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, format!("JSON error: {}", e))
}

/// Write every artifact for `run` into `run_dir` and return the paths
/// written. An existing transcript (mirrored live by a `FileSink`) is kept.
pub fn write_run_artifacts(run_dir: &Path, run: &PipelineRun) -> io::Result<Vec<PathBuf>> {
    fs::create_dir_all(run_dir)?;
    let mut written = Vec::new();

    let path = run_dir.join(RUN_SUMMARY_FILE);
    RunSummary::from_run(run).write_to_file(&path)?;
    written.push(path);

    let result = run.result();
    let path = run_dir.join(RESULT_FILE);
    fs::write(&path, result.to_json().map_err(json_error)?)?;
    written.push(path);

    let path = run_dir.join(SPEC_FILE);
    fs::write(&path, run.specification.to_json_pretty())?;
    written.push(path);

    let path = run_dir.join(DIAGRAM_FILE);
    fs::write(&path, &result.diagram)?;
    written.push(path);

    let path = run_dir.join(TRANSCRIPT_FILE);
    if !path.exists() {
        fs::write(&path, run.transcript.render())?;
        written.push(path);
    }

    for attempt in &run.attempts {
        let dir = run_dir.join("attempts").join(attempt.index.to_string());
        fs::create_dir_all(&dir)?;

        if let Some(code) = &attempt.code {
            let path = dir.join("simulation.py");
            fs::write(&path, code)?;
            written.push(path);
        }

        let path = dir.join("verdict.json");
        let verdict = serde_json::to_string_pretty(&attempt.verdict).map_err(json_error)?;
        fs::write(&path, verdict)?;
        written.push(path);

        if let Some(execution) = &attempt.execution {
            for (name, text) in [("stdout.txt", &execution.stdout), ("stderr.txt", &execution.stderr)] {
                let path = dir.join(name);
                fs::write(&path, text)?;
                written.push(path);
            }
        }
    }

    Ok(written)
}
