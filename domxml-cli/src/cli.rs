//! Command-line argument parsing.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// domxml - canonical conversion of libvirt domain XML
#[derive(Parser, Debug)]
#[command(name = "domxml")]
#[command(about = "Canonicalize, filter and compare libvirt domain XML")]
#[command(version)]
pub struct Args {
    /// Path to configuration file (optional, defaults used if not found)
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true, env = "DOMXML_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Indent width for XML output (0 prints compact XML)
    #[arg(long, global = true)]
    pub indent: Option<usize>,

    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands. Every `<file>` argument accepts `-` for stdin.
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Print the canonical tree of an XML document
    Canonical {
        /// XML document
        xml: PathBuf,

        /// Output format
        #[arg(long, value_enum, default_value_t = DumpFormat::Xml)]
        format: DumpFormat,
    },

    /// Project an XML document through a filter specification
    Filter {
        /// XML document
        xml: PathBuf,

        /// Filter specification (YAML or JSON); the built-in domain filter when omitted
        #[arg(long)]
        spec: Option<PathBuf>,

        /// Fail when a required element is missing
        #[arg(long)]
        strict: bool,
    },

    /// Print the canonical tree with memory sizes rewritten to KiB
    Normalize {
        /// Domain XML
        xml: PathBuf,
    },

    /// Print definition XML for a domain configuration
    Define {
        /// Domain configuration (YAML)
        domain: PathBuf,
    },

    /// Compare a domain configuration against live domain XML
    ///
    /// Exits with 0 when in sync and 2 when the domain has to be redefined.
    Compare {
        /// Domain configuration (YAML)
        domain: PathBuf,

        /// Live domain XML, as printed by `virsh dumpxml`
        live: PathBuf,

        /// Filter specification (YAML or JSON); the built-in domain filter when omitted
        #[arg(long)]
        spec: Option<PathBuf>,
    },
}

/// Output format of the `canonical` command.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DumpFormat {
    /// XML text
    Xml,
    /// The tree as JSON
    Json,
}
