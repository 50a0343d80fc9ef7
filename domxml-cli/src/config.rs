//! Configuration management for the domxml tool.

use anyhow::{Context, Result};
use domxml::{domain_filter_spec, FilterSpec};
use domxml_common::LogFormat;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::cli::Args;

/// Location probed when no `--config` is given.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/domxml/domxml.yaml";

/// Main configuration structure.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Log output format
    pub log_format: LogFormatConfig,
    /// Filter specification replacing the built-in domain filter
    pub filter_spec: Option<PathBuf>,
    /// Output settings
    pub output: OutputConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
            log_format: LogFormatConfig::default(),
            filter_spec: None,
            output: OutputConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(anyhow::anyhow!("Config file not found: {}", path.display()));
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        // An empty file is a valid, all-default configuration.
        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Load the configuration named on the command line, or the default
    /// location when present, then apply CLI overrides.
    ///
    /// Returns the path the configuration came from, if any.
    pub fn resolve(args: &Args) -> Result<(Self, Option<PathBuf>)> {
        let (config, source) = match &args.config {
            Some(path) => (Self::load(path)?, Some(PathBuf::from(path))),
            None if Path::new(DEFAULT_CONFIG_PATH).exists() => (
                Self::load(DEFAULT_CONFIG_PATH)?,
                Some(PathBuf::from(DEFAULT_CONFIG_PATH)),
            ),
            None => (Self::default(), None),
        };
        Ok((config.with_cli_overrides(args), source))
    }

    /// Apply CLI argument overrides to the configuration.
    pub fn with_cli_overrides(mut self, args: &Args) -> Self {
        if let Some(ref level) = args.log_level {
            self.log_level = level.clone();
        }

        if args.log_json {
            self.log_format = LogFormatConfig::Json;
        }

        if let Some(indent) = args.indent {
            self.output.indent = indent;
        }

        self
    }

    /// Filter specification to use: `override_path`, then the configured
    /// file, then the built-in domain filter.
    pub fn filter_spec(&self, override_path: Option<&Path>) -> Result<FilterSpec> {
        match override_path.or(self.filter_spec.as_deref()) {
            Some(path) => load_filter_spec(path),
            None => Ok(domain_filter_spec().clone()),
        }
    }
}

/// Read a filter specification in its nested-mapping form (YAML or JSON).
pub fn load_filter_spec(path: &Path) -> Result<FilterSpec> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read filter spec: {}", path.display()))?;
    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse filter spec: {}", path.display()))
}

/// Log format as written in the config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormatConfig {
    /// Human-readable lines
    #[default]
    Pretty,
    /// JSON lines
    Json,
}

impl From<LogFormatConfig> for LogFormat {
    fn from(format: LogFormatConfig) -> Self {
        match format {
            LogFormatConfig::Pretty => LogFormat::Pretty,
            LogFormatConfig::Json => LogFormat::Json,
        }
    }
}

/// Output configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Indent width for XML output; 0 prints compact XML
    pub indent: usize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self { indent: 2 }
    }
}
