use std::process;

use dpp_engine::{DeploymentConfig, Stage};

use crate::{print_json, report_error, OutputFormat};

pub(crate) fn cmd_graph(config: &DeploymentConfig, output: OutputFormat, quiet: bool) {
    let graph = config.stage_graph();
    if quiet {
        return;
    }
    match output {
        OutputFormat::Json => print_json(graph.edges(), output, quiet),
        OutputFormat::Text => {
            for stage in graph.stages() {
                let next: Vec<&str> = graph.successors(stage).map(Stage::as_str).collect();
                if next.is_empty() {
                    println!("{} (terminal)", stage);
                } else {
                    println!("{} -> {}", stage, next.join(", "));
                }
            }
        }
    }
}

/// Exits 1 when the transition is illegal.
pub(crate) fn cmd_check(
    config: &DeploymentConfig,
    from: &str,
    to: &str,
    output: OutputFormat,
    quiet: bool,
) {
    let graph = config.stage_graph();
    let (from, to) = (Stage::from(from), Stage::from(to));
    let legal = graph.is_legal(&from, &to);

    match output {
        OutputFormat::Json if !quiet => print_json(
            &serde_json::json!({ "from": &from, "to": &to, "legal": legal }),
            output,
            quiet,
        ),
        OutputFormat::Text if legal && !quiet => println!("{} -> {}: legal", from, to),
        _ => {}
    }
    if !legal {
        if output == OutputFormat::Text {
            report_error(
                &format!("illegal transition from {} to {}", from, to),
                output,
                quiet,
            );
        }
        process::exit(1);
    }
}
