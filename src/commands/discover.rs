use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use indicatif::ProgressBar;

use crate::dag::DagStore;
use crate::discovery::{DiscoveryEngine, DiscoveryOutcome};
use crate::error::{HarmapError, Result};
use crate::har::loader::{parse_cookie_file, read_har_entries};
use crate::oracle::{HttpOracle, Oracle, OracleConfig};
use crate::traversal::{dump_reverse_topological, emit_code};

/// Options for the `discover` subcommand, already merged from CLI flags and
/// config-file defaults (see [`crate::config::ResolvedDiscoverConfig`]).
pub struct DiscoverOptions {
    pub action: String,
    pub har: PathBuf,
    pub cookies: PathBuf,
    pub model: String,
    pub alternate_model: Option<String>,
    pub input: HashMap<String, String>,
    pub max_steps: usize,
    pub emit_code: bool,
    pub oracle_endpoint: String,
    pub oracle_api_key_env: String,
    pub format: String,
    pub out: PathBuf,
}

pub struct DiscoverStats {
    pub steps_used: usize,
    pub budget_exhausted: bool,
    pub node_count: usize,
}

pub fn run_discover(options: &DiscoverOptions) -> Result<DiscoverStats> {
    if options.action.trim().is_empty() {
        return Err(HarmapError::InvalidArgs("action description must not be empty".into()));
    }

    let har_entries = read_har_entries(&options.har)?;
    let cookies = if options.cookies.exists() {
        parse_cookie_file(&options.cookies)?
    } else {
        HashMap::new()
    };

    let api_key = std::env::var(&options.oracle_api_key_env).ok();
    let oracle_config = OracleConfig {
        endpoint: options.oracle_endpoint.clone(),
        api_key,
        default_model: options.model.clone(),
        alternate_model: options.alternate_model.clone(),
        ..OracleConfig::default()
    };
    let oracle = HttpOracle::new(oracle_config);

    let engine = DiscoveryEngine::new(
        har_entries,
        cookies,
        options.input.clone(),
        options.max_steps,
    );

    println!("Discovering dependency graph for: {}", options.action);
    let pb = ProgressBar::new_spinner();
    pb.set_message("running discovery loop...");
    let outcome = engine.run(&oracle, &options.action)?;
    pb.finish_and_clear();

    if outcome.budget_exhausted {
        eprintln!(
            "warning: max-steps budget ({}) exhausted before discovery converged; DAG is partial",
            options.max_steps
        );
    }

    fs::create_dir_all(&options.out)?;
    write_dag_dump(&outcome, options, &oracle)?;

    Ok(DiscoverStats {
        steps_used: outcome.steps_used,
        budget_exhausted: outcome.budget_exhausted,
        node_count: outcome.dag.len(),
    })
}

fn write_dag_dump(
    outcome: &DiscoveryOutcome,
    options: &DiscoverOptions,
    oracle: &dyn Oracle,
) -> Result<()> {
    let dump_path = options.out.join("dag.txt");
    let rendered = render_dump(&outcome.dag, options)?;
    fs::write(&dump_path, &rendered)?;
    println!("{}", rendered);

    if options.emit_code {
        let result = emit_code(&outcome.dag, oracle)?;
        let program_path = options.out.join("program.txt");
        fs::write(&program_path, &result.program)?;
        println!("Wrote emitted code to {}", program_path.display());
    }

    Ok(())
}

fn render_dump(dag: &DagStore, options: &DiscoverOptions) -> Result<String> {
    let entries = dump_reverse_topological(dag);
    match options.format.as_str() {
        "json" => {
            let values: Vec<_> = entries
                .iter()
                .map(|entry| serde_json::json!({ "id": entry.id.to_string(), "label": entry.label }))
                .collect();
            Ok(serde_json::to_string_pretty(&values)?)
        }
        _ => {
            let mut out = String::new();
            for entry in &entries {
                out.push_str(&format!("{}\n", entry.label));
            }
            Ok(out)
        }
    }
}
