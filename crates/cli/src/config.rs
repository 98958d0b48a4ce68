use std::process;

use dpp_engine::DeploymentConfig;

use crate::{print_json, report_error, OutputFormat};

pub(crate) fn cmd_check(config: &DeploymentConfig, output: OutputFormat, quiet: bool) {
    let warnings = config.check();
    for warning in &warnings {
        tracing::warn!(%warning, "configuration");
    }
    if quiet {
        return;
    }
    match output {
        OutputFormat::Json => print_json(
            &serde_json::json!({
                "ok": warnings.is_empty(),
                "organizations": config.roles.len(),
                "actions": config.policy.len(),
                "stages": config.lifecycle.stages().len(),
                "warnings": warnings,
            }),
            output,
            quiet,
        ),
        OutputFormat::Text => {
            println!(
                "{} organizations, {} policy entries, {} stages",
                config.roles.len(),
                config.policy.len(),
                config.lifecycle.stages().len()
            );
            if warnings.is_empty() {
                println!("configuration OK");
            } else {
                for warning in &warnings {
                    println!("warning: {}", warning);
                }
            }
        }
    }
}

pub(crate) fn cmd_show(config: &DeploymentConfig, output: OutputFormat, quiet: bool) {
    match output {
        OutputFormat::Json => print_json(config, output, quiet),
        OutputFormat::Text => match toml::to_string_pretty(config) {
            Ok(text) => print!("{}", text),
            Err(e) => {
                report_error(&format!("serialization error: {}", e), output, quiet);
                process::exit(1);
            }
        },
    }
}
