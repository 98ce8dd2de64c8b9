// InceptionV3 needs a deep Module derive expansion
#![recursion_limit = "256"]

mod application;
mod cli;
mod data;
mod domain;
mod infra;
mod ml;

use clap::Parser;
use cli::Cli;
use std::process::ExitCode;

fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("inception_ft=info".parse()?),
        )
        .init();

    match Cli::parse().run() {
        Ok(code) => Ok(code),
        Err(e) => {
            eprintln!("Error: {e:#}");
            Ok(ExitCode::FAILURE)
        }
    }
}
