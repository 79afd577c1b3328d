//! Command-line surface (SS6): a `clap` derive `Cli`/`Commands` pair, one
//! subcommand per user-facing operation.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[cfg(feature = "completions")]
use clap_complete::Shell;

#[derive(Parser, Debug)]
#[command(name = "harmap", version, about = "Reverse-engineer undocumented web workflows from a HAR capture.")]
pub struct Cli {
    /// Path to a config file to use instead of the normal search path.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Discover the dependency graph behind a user-visible action.
    Discover {
        /// Natural-language description of the action to reproduce, e.g. "download tax documents".
        action: String,

        /// HAR capture to mine for requests.
        #[arg(long)]
        har: Option<PathBuf>,

        /// Cookie jar snapshot (JSON array of cookie records).
        #[arg(long)]
        cookies: Option<PathBuf>,

        /// Oracle model name used for the four discovery calls.
        #[arg(long)]
        model: Option<String>,

        /// Oracle model name tried first for code emission, falling back to `--model` on failure.
        #[arg(long = "alternate-model")]
        alternate_model: Option<String>,

        /// Caller-supplied input variable, `KEY=VALUE`. May be repeated.
        #[arg(long = "input", value_parser = parse_key_value)]
        input: Vec<(String, String)>,

        /// Iteration budget for the discovery loop.
        #[arg(long = "max-steps")]
        max_steps: Option<usize>,

        /// Emit runnable integration code after discovery completes.
        #[arg(long = "emit-code")]
        emit_code: bool,

        /// Oracle HTTP endpoint (OpenAI-compatible chat-completions URL).
        #[arg(long = "oracle-endpoint")]
        oracle_endpoint: Option<String>,

        /// Name of the environment variable holding the oracle API key.
        #[arg(long = "oracle-api-key-env")]
        oracle_api_key_env: Option<String>,

        /// Output format for the DAG dump.
        #[arg(long, value_parser = ["text", "json"])]
        format: Option<String>,

        /// Directory to write the DAG dump and any emitted code into.
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// List the filtered candidate-URL shortlist from a HAR file without invoking the oracle.
    Candidates {
        /// HAR capture to mine for requests.
        #[arg(long)]
        har: Option<PathBuf>,
    },

    /// Print the fully resolved configuration (config file + defaults).
    Config,

    /// Generate shell completion scripts.
    #[cfg(feature = "completions")]
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got `{raw}`")),
    }
}

#[cfg(feature = "completions")]
pub fn print_completions(shell: Shell) {
    use clap::CommandFactory;
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    clap_complete::generate(shell, &mut cmd, name, &mut std::io::stdout());
}
