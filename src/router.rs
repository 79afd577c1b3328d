//! CLI dispatch (SS6): merges config-file defaults under CLI flags per field,
//! then calls into `commands`.

use std::collections::HashMap;

use crate::cli::{Cli, Commands};
use crate::commands::{run_candidates, run_discover, CandidatesOptions, DiscoverOptions};
use crate::config::{load_config, render_config, ResolvedDiscoverConfig};
use crate::error::Result;

pub fn run(cli: Cli) -> Result<()> {
    let config = load_config(cli.config.as_deref())?;
    let defaults = ResolvedDiscoverConfig::from_config(&config);

    match cli.command {
        Commands::Discover {
            action,
            har,
            cookies,
            model,
            alternate_model,
            input,
            max_steps,
            emit_code,
            oracle_endpoint,
            oracle_api_key_env,
            format,
            out,
        } => {
            let options = DiscoverOptions {
                action,
                har: har.unwrap_or(defaults.har),
                cookies: cookies.unwrap_or(defaults.cookies),
                model: model.unwrap_or(defaults.model),
                alternate_model: alternate_model.or(defaults.alternate_model),
                input: input.into_iter().collect::<HashMap<_, _>>(),
                max_steps: max_steps.unwrap_or(defaults.max_steps),
                emit_code,
                oracle_endpoint: oracle_endpoint.unwrap_or(defaults.oracle_endpoint),
                oracle_api_key_env: oracle_api_key_env.unwrap_or(defaults.oracle_api_key_env),
                format: format.unwrap_or(defaults.format),
                out: out.unwrap_or(defaults.out),
            };
            let stats = run_discover(&options)?;
            println!(
                "Discovery finished: {} steps used, {} nodes{}",
                stats.steps_used,
                stats.node_count,
                if stats.budget_exhausted { " (budget exhausted)" } else { "" }
            );
            Ok(())
        }

        Commands::Candidates { har } => {
            let options = CandidatesOptions { har: har.unwrap_or(defaults.har) };
            let count = run_candidates(&options)?;
            println!("{count} candidate URLs");
            Ok(())
        }

        Commands::Config => {
            let rendered = render_config(&defaults)?;
            println!("{rendered}");
            Ok(())
        }

        #[cfg(feature = "completions")]
        Commands::Completions { shell } => {
            crate::cli::print_completions(shell);
            Ok(())
        }
    }
}
