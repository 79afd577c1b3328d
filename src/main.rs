use clap::Parser;
use std::process;

mod cli;
mod commands;
mod config;
mod dag;
mod discovery;
mod error;
mod har;
mod model;
mod oracle;
mod router;
mod traversal;

use crate::cli::Cli;

fn main() {
    let cli = Cli::parse();

    let result = crate::router::run(cli);

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}
