//! Entry point for the `extreamfs` command shell.

use std::fs::File;
use std::io::{self, BufReader};
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use extreamfs::{commands, load_config, Engine};

/// Runs extreamfs commands from a script file, or from stdin.
#[derive(Parser)]
struct Cli {
    /// Optional INI configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Script to run; stdin when omitted
    #[arg(value_name = "SCRIPT")]
    script: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Cli::parse();

    let cfg = load_config(args.config.as_deref()).context("cannot load configuration")?;
    let mut engine = Engine::new(cfg).context("cannot start the engine")?;

    let stdout = io::stdout().lock();
    let stats = match &args.script {
        Some(path) => {
            let file = File::open(path)
                .with_context(|| format!("cannot open script {}", path.display()))?;
            commands::run_script(&mut engine, BufReader::new(file), stdout)?
        }
        None => commands::run_script(&mut engine, io::stdin().lock(), stdout)?,
    };

    log::info!("{} commands succeeded, {} failed", stats.succeeded, stats.failed);
    Ok(())
}
