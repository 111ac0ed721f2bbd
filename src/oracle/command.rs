//! Oracles backed by an external command.
//!
//! The command receives one JSON request on stdin and writes its answer to
//! stdout. Extraction requests are `{"text"}`; synthesis requests are
//! `{"spec", "feedback", "trace_format"}`. Markdown fences around answers
//! are stripped.

use std::time::Duration;

use serde::Serialize;
use spec2sim_sandbox::process::allowlisted_env;
use spec2sim_sandbox::{run_process, ProcessSpec, ENV_ALLOWLIST};

use super::{
    parse_spec_answer, strip_code_fences, unescape_html_entities, OracleError, OracleResult,
    TRACE_FORMAT,
};
use super::{CodeSynthesizer, SpecExtractor};
use crate::spec::Specification;

/// An external program spoken to over stdin/stdout.
#[derive(Debug, Clone)]
pub struct CommandOracle {
    pub program: String,
    pub args: Vec<String>,
    pub timeout: Duration,
    /// Parent variables passed through (API keys and the like).
    pub env_passthrough: Vec<String>,
}

impl CommandOracle {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            timeout: Duration::from_secs(60),
            env_passthrough: Vec::new(),
        }
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn env_passthrough<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.env_passthrough.extend(names.into_iter().map(Into::into));
        self
    }

    /// Send `request` and return the raw answer.
    pub fn ask<T: Serialize>(&self, request: &T) -> OracleResult<String> {
        let body = serde_json::to_vec(request)?;
        let mut spec = ProcessSpec::new(self.program.clone())
            .args(self.args.iter().cloned())
            .stdin(body)
            .timeout(self.timeout);
        let names: Vec<String> = ENV_ALLOWLIST
            .iter()
            .map(|s| s.to_string())
            .chain(self.env_passthrough.iter().cloned())
            .collect();
        spec.env = allowlisted_env(&names);

        tracing::debug!(program = %self.program, "asking oracle");
        let output = run_process(&spec).map_err(|e| OracleError::Launch {
            program: self.program.clone(),
            message: e.to_string(),
        })?;

        if output.timed_out {
            return Err(OracleError::Timeout {
                program: self.program.clone(),
                secs: self.timeout.as_secs(),
            });
        }
        if !output.success() {
            let status = match (output.exit_code, &output.signal) {
                (Some(code), _) => format!("code {}", code),
                (None, Some(signal)) => signal.clone(),
                (None, None) => "unknown status".to_string(),
            };
            return Err(OracleError::Failed {
                program: self.program.clone(),
                status,
                stderr: output.stderr.trim().to_string(),
            });
        }
        Ok(output.stdout)
    }
}

#[derive(Serialize)]
struct ExtractionRequest<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct SynthesisRequest<'a> {
    spec: &'a Specification,
    feedback: Option<&'a str>,
    trace_format: &'static str,
}

/// Extraction through a [`CommandOracle`].
#[derive(Debug, Clone)]
pub struct CommandExtractor {
    oracle: CommandOracle,
}

impl CommandExtractor {
    pub fn new(oracle: CommandOracle) -> Self {
        Self { oracle }
    }
}

impl SpecExtractor for CommandExtractor {
    fn extract(&self, text: &str) -> OracleResult<Specification> {
        let answer = self.oracle.ask(&ExtractionRequest { text })?;
        parse_spec_answer(&answer)
    }
}

/// Synthesis through a [`CommandOracle`].
#[derive(Debug, Clone)]
pub struct CommandSynthesizer {
    oracle: CommandOracle,
}

impl CommandSynthesizer {
    pub fn new(oracle: CommandOracle) -> Self {
        Self { oracle }
    }
}

impl CodeSynthesizer for CommandSynthesizer {
    fn synthesize(&self, spec: &Specification, feedback: Option<&str>) -> OracleResult<String> {
        let answer = self.oracle.ask(&SynthesisRequest {
            spec,
            feedback,
            trace_format: TRACE_FORMAT,
        })?;
        let code = unescape_html_entities(&strip_code_fences(&answer));
        if code.is_empty() {
            return Err(OracleError::EmptyAnswer);
        }
        Ok(code)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> CommandOracle {
        CommandOracle::new("/bin/sh")
            .args(["-c", script])
            .timeout(Duration::from_secs(5))
    }

    #[test]
    fn test_extractor_reads_answer() {
        let oracle = sh(r#"cat >/dev/null; printf '```json\n{"states":[{"name":"Red"}]}\n```\n'"#);
        let spec = CommandExtractor::new(oracle).extract("a red light").unwrap();
        assert_eq!(spec.state_names(), vec!["Red"]);
    }

    #[test]
    fn test_extractor_receives_text_on_stdin() {
        // Echo the request back; the text field becomes a state name.
        let oracle = sh(r#"sed 's/.*"text":"\([^"]*\)".*/{"states":["\1"]}/'"#);
        let spec = CommandExtractor::new(oracle).extract("Idle").unwrap();
        assert_eq!(spec.state_names(), vec!["Idle"]);
    }

    #[test]
    fn test_synthesizer_strips_fences() {
        let oracle = sh("cat >/dev/null; printf '```python\\nprint(1)\\n```\\n'");
        let code = CommandSynthesizer::new(oracle)
            .synthesize(&Specification::new(), None)
            .unwrap();
        assert_eq!(code, "print(1)");
    }

    #[test]
    fn test_synthesizer_unescapes_entities() {
        let oracle = sh("cat >/dev/null; printf '```python\\nif t &gt; 5:\\n    pass\\n```\\n'");
        let code = CommandSynthesizer::new(oracle)
            .synthesize(&Specification::new(), None)
            .unwrap();
        assert_eq!(code, "if t > 5:\n    pass");
    }

    #[test]
    fn test_synthesizer_sees_feedback() {
        let oracle = sh("grep -q 'Verification Failed' && echo fixed || echo first");
        let synth = CommandSynthesizer::new(oracle);
        let spec = Specification::new();
        assert_eq!(synth.synthesize(&spec, None).unwrap(), "first");
        assert_eq!(
            synth
                .synthesize(&spec, Some("Verification Failed: missing"))
                .unwrap(),
            "fixed"
        );
    }

    #[test]
    fn test_failed_command() {
        let oracle = sh("cat >/dev/null; echo quota exceeded >&2; exit 3");
        let err = CommandSynthesizer::new(oracle)
            .synthesize(&Specification::new(), None)
            .unwrap_err();
        match err {
            OracleError::Failed { status, stderr, .. } => {
                assert_eq!(status, "code 3");
                assert_eq!(stderr, "quota exceeded");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_empty_answer() {
        let oracle = sh("cat >/dev/null");
        assert!(matches!(
            CommandSynthesizer::new(oracle).synthesize(&Specification::new(), None),
            Err(OracleError::EmptyAnswer)
        ));
    }

    #[test]
    fn test_timeout() {
        let oracle = sh("sleep 10").timeout(Duration::from_millis(200));
        assert!(matches!(
            CommandExtractor::new(oracle).extract("x"),
            Err(OracleError::Timeout { .. })
        ));
    }

    #[test]
    fn test_missing_program() {
        let oracle = CommandOracle::new("/no/such/oracle");
        assert!(matches!(
            CommandExtractor::new(oracle).extract("x"),
            Err(OracleError::Launch { .. })
        ));
    }
}
