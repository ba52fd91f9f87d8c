mod cli;

use clap::{Parser, crate_version};
use energiebilanz::prelude::*;
use tracing_subscriber::EnvFilter;

use crate::cli::{Args, Command};

fn main() -> Result {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .without_time()
        .compact()
        .init();
    info!(version = crate_version!(), "starting…");

    match Args::parse().command {
        Command::Run(args) => cli::run(&args),
        Command::Check(args) => cli::check(&args),
    }
}
