//! # domxml
//!
//! Command-line front end of the domxml library. It brings libvirt domain
//! XML and domain configurations into canonical form so that a desired
//! configuration can be compared with a live domain by plain equality.
//!
//! ## Usage
//! ```bash
//! virsh dumpxml vm-foo | domxml compare vm-foo.yaml -
//! domxml define vm-foo.yaml > vm-foo.xml
//! ```

use anyhow::Result;
use clap::Parser;
use domxml_common::LogFormat;
use std::process::ExitCode;
use tracing::{debug, error, info};

mod cli;
mod commands;
mod config;

use cli::Args;
use config::Config;

fn main() -> Result<ExitCode> {
    // Parse CLI arguments
    let args = Args::parse();

    // Load configuration before logging, which it configures
    let (config, source) = Config::resolve(&args)?;

    LogFormat::from(config.log_format).init(&config.log_level)?;

    match &source {
        Some(path) => info!(config_path = %path.display(), "Configuration loaded"),
        None => debug!("No config file found, using CLI arguments and defaults"),
    }
    debug!(
        version = env!("CARGO_PKG_VERSION"),
        command = ?args.command,
        "Running domxml"
    );

    let mut stdout = std::io::stdout().lock();
    match commands::run(&args.command, &config, &mut stdout) {
        Ok(outcome) => Ok(ExitCode::from(outcome.exit_code())),
        Err(e) => {
            error!(error = %e, "Command failed");
            Err(e)
        }
    }
}
