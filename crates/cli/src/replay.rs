//! Scripted invocations against a fresh in-memory ledger.
//!
//! A script is a JSON list of steps:
//!
//! ```json
//! [
//!   {"msp": "Org1MSP", "function": "CreateProduct", "args": ["P-1", "{}"]},
//!   {"msp": "Org2MSP", "function": "RegisterRawMaterial", "args": ["P-1", "h", "u", "b"], "expect": "Denied"}
//! ]
//! ```
//!
//! `expect` is `"ok"` (the default) or an error kind.

use std::path::Path;
use std::process;
use std::sync::Arc;

use dpp_engine::{Caller, DeploymentConfig, PassportContract, PassportService, Response};
use dpp_storage::MemoryLedger;
use serde::{Deserialize, Serialize};

use crate::{print_json, report_error, OutputFormat};

const OK: &str = "ok";

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct ReplayStep {
    pub msp: String,
    pub function: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default = "expect_ok")]
    pub expect: String,
}

fn expect_ok() -> String {
    OK.to_string()
}

#[derive(Debug, Serialize)]
pub(crate) struct StepResult {
    pub step: usize,
    pub msp: String,
    pub function: String,
    pub expected: String,
    pub outcome: String,
    pub passed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<Response>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub(crate) fn parse_script(text: &str) -> Result<Vec<ReplayStep>, String> {
    serde_json::from_str(text).map_err(|e| format!("invalid replay script: {}", e))
}

/// Run every step in order; a failing step does not stop the script.
pub(crate) async fn run_script(
    service: &PassportService<MemoryLedger>,
    steps: &[ReplayStep],
) -> Vec<StepResult> {
    let mut results = Vec::with_capacity(steps.len());
    for (i, step) in steps.iter().enumerate() {
        let caller = Caller::new(step.msp.as_str());
        let (outcome, response, error) =
            match service.call(&caller, &step.function, &step.args).await {
                Ok(response) => (OK.to_string(), Some(response), None),
                Err(e) => (e.kind().to_string(), None, Some(e.to_string())),
            };
        let passed = outcome == step.expect;
        if !passed {
            tracing::warn!(
                step = i + 1,
                function = %step.function,
                expected = %step.expect,
                outcome = %outcome,
                "replay step diverged"
            );
        }
        results.push(StepResult {
            step: i + 1,
            msp: step.msp.clone(),
            function: step.function.clone(),
            expected: step.expect.clone(),
            outcome,
            passed,
            response,
            error,
        });
    }
    results
}

pub(crate) fn cmd_replay(
    script: &Path,
    config: &DeploymentConfig,
    output: OutputFormat,
    quiet: bool,
) {
    let text = match std::fs::read_to_string(script) {
        Ok(t) => t,
        Err(e) => {
            let msg = format!("error reading {}: {}", script.display(), e);
            report_error(&msg, output, quiet);
            process::exit(1);
        }
    };
    let steps = match parse_script(&text) {
        Ok(s) => s,
        Err(msg) => {
            report_error(&msg, output, quiet);
            process::exit(1);
        }
    };

    let rt = match tokio::runtime::Builder::new_current_thread().build() {
        Ok(rt) => rt,
        Err(e) => {
            report_error(&format!("runtime error: {}", e), output, quiet);
            process::exit(1);
        }
    };
    let service = PassportService::new(
        Arc::new(MemoryLedger::new()),
        PassportContract::from_config(config),
    );
    let results = rt.block_on(run_script(&service, &steps));
    let failed = results.iter().filter(|r| !r.passed).count();
    let passed = results.len() - failed;

    if !quiet {
        match output {
            OutputFormat::Json => print_json(
                &serde_json::json!({
                    "steps": &results,
                    "passed": passed,
                    "failed": failed,
                }),
                output,
                quiet,
            ),
            OutputFormat::Text => {
                for r in &results {
                    let mark = if r.passed { "PASS" } else { "FAIL" };
                    match &r.error {
                        Some(err) => println!(
                            "[{}] {} {} by {}: {}",
                            r.step, mark, r.function, r.msp, err
                        ),
                        None => println!("[{}] {} {} by {}", r.step, mark, r.function, r.msp),
                    }
                    if !r.passed {
                        println!("    expected {}, got {}", r.expected, r.outcome);
                    }
                }
                println!();
                println!("{} passed, {} failed", passed, failed);
            }
        }
    }

    if failed > 0 {
        process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> PassportService<MemoryLedger> {
        PassportService::new(Arc::new(MemoryLedger::new()), PassportContract::default())
    }

    #[test]
    fn expect_defaults_to_ok() {
        let steps = parse_script(
            r#"[{"msp": "Org1MSP", "function": "CreateProduct", "args": ["P-1"]}]"#,
        )
        .unwrap();
        assert_eq!(steps[0].expect, "ok");
    }

    #[test]
    fn unknown_step_fields_are_rejected() {
        let err = parse_script(r#"[{"msp": "Org1MSP", "function": "GetHistory", "user": "x"}]"#)
            .unwrap_err();
        assert!(err.starts_with("invalid replay script"));
    }

    #[tokio::test]
    async fn outcomes_are_compared_by_kind() {
        let steps = parse_script(
            r#"[
                {"msp": "Org1MSP", "function": "CreateProduct", "args": ["P-1"]},
                {"msp": "Org1MSP", "function": "CreateProduct", "args": ["P-1"], "expect": "AlreadyExists"},
                {"msp": "Org2MSP", "function": "RegisterRawMaterial", "args": ["P-1", "h", "u", "b"]}
            ]"#,
        )
        .unwrap();
        let results = run_script(&service(), &steps).await;
        assert!(results[0].passed && results[0].response.is_some());
        assert!(results[1].passed);
        assert!(!results[2].passed);
        assert_eq!(results[2].outcome, "Denied");
    }
}
