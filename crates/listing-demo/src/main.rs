use std::fs;
use std::io::{self, Write};

use anyhow::{Context, Result};
use clap::Parser;
use listing_demo::{run, Args};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let args = Args::parse();
    let default_level = if args.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with_writer(io::stderr)
        .init();

    let body = run(&args)?;
    match &args.output {
        Some(path) => fs::write(path, &body).with_context(|| format!("cannot write {}", path.display()))?,
        None => io::stdout().write_all(&body)?,
    }
    Ok(())
}
