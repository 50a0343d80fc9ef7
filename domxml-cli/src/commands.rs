//! Subcommand implementations.
//!
//! Commands read their inputs from files (or stdin for `-`) and write their
//! result to the given writer; logs go through `tracing`.

use anyhow::{ensure, Context, Result};
use domxml::{
    apply_filter, compare_domain, element_to_xml_pretty, normalize_memory, xml_to_element, DomainConfig,
    Element,
};
use std::io::{Read, Write};
use std::path::Path;
use tracing::{debug, info, warn};

use crate::cli::{Command, DumpFormat};
use crate::config::Config;

/// Result of a successful command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Nothing to report
    Done,
    /// `compare` found a difference
    ChangeNeeded,
}

impl Outcome {
    /// Process exit code for this outcome.
    pub fn exit_code(self) -> u8 {
        match self {
            Self::Done => 0,
            Self::ChangeNeeded => 2,
        }
    }
}

/// Run one subcommand, writing its output to `out`.
pub fn run(command: &Command, config: &Config, out: &mut dyn Write) -> Result<Outcome> {
    let indent = config.output.indent;

    match command {
        Command::Canonical { xml, format } => {
            let tree = xml_to_element(&read_input(xml)?)?;
            match format {
                DumpFormat::Xml => write_tree(out, &tree, indent)?,
                DumpFormat::Json => {
                    serde_json::to_writer_pretty(&mut *out, &tree)?;
                    writeln!(out)?;
                }
            }
        }

        Command::Filter { xml, spec, strict } => {
            let spec = config.filter_spec(spec.as_deref())?;
            let mut filtered = apply_filter(&spec, &read_input(xml)?)?;
            if *strict {
                filtered = filtered.require_complete()?;
            }
            for path in &filtered.missing_required {
                warn!(path = %path, "Required element missing from document");
            }
            write_tree(out, &filtered.document, indent)?;
        }

        Command::Normalize { xml } => {
            let mut tree = xml_to_element(&read_input(xml)?)?;
            let report = normalize_memory(&mut tree)?;
            for name in report.missing() {
                warn!(element = name, "Memory element not found, left untouched");
            }
            write_tree(out, &tree, indent)?;
        }

        Command::Define { domain } => {
            let domain = load_domain_config(domain)?;
            info!(domain = %domain.name, uuid = %domain.effective_uuid(), "Generating definition XML");
            write_tree(out, &domain.to_element(), indent)?;
        }

        Command::Compare { domain, live, spec } => {
            let domain = load_domain_config(domain)?;
            let spec = config.filter_spec(spec.as_deref())?;
            let comparison = compare_domain(&domain, &read_input(live)?, &spec)?;

            for path in &comparison.missing_required {
                warn!(path = %path, "Required element missing from live domain");
            }

            if comparison.needs_change() {
                writeln!(out, "Domain '{}' differs from the desired configuration", domain.name)?;
                writeln!(out, "desired:")?;
                write_tree(out, &comparison.desired, indent)?;
                writeln!(out, "actual:")?;
                write_tree(out, &comparison.actual, indent)?;
                return Ok(Outcome::ChangeNeeded);
            }
            writeln!(out, "Domain '{}' is in sync", domain.name)?;
        }
    }

    Ok(Outcome::Done)
}

/// Read a domain configuration from YAML.
pub fn load_domain_config(path: &Path) -> Result<DomainConfig> {
    let content = read_input(path)?;
    let domain: DomainConfig = serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse domain config: {}", path.display()))?;
    ensure!(!domain.name.is_empty(), "Domain config has no name: {}", path.display());
    Ok(domain)
}

fn read_input(path: &Path) -> Result<String> {
    if path.as_os_str() == "-" {
        let mut content = String::new();
        std::io::stdin()
            .read_to_string(&mut content)
            .context("Failed to read stdin")?;
        return Ok(content);
    }

    debug!(path = %path.display(), "Reading input");
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn write_tree(out: &mut dyn Write, tree: &Element, indent: usize) -> Result<()> {
    writeln!(out, "{}", element_to_xml_pretty(tree, indent)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    const LIVE: &str = r#"<domain type="kvm" id="3">
  <name>vm-foo</name>
  <uuid>6404f873-9fae-5bd4-b141-5d1b1bd27df9</uuid>
  <memory unit="MiB">1024</memory>
  <currentMemory unit="KiB">524288</currentMemory>
  <vcpu placement="static" current="1">2</vcpu>
  <os><type arch="x86_64">hvm</type></os>
  <features><acpi/></features>
</domain>"#;

    struct Workspace {
        dir: TempDir,
    }

    impl Workspace {
        fn new() -> Self {
            Self {
                dir: tempfile::tempdir().unwrap(),
            }
        }

        fn file(&self, name: &str, content: &str) -> PathBuf {
            let path = self.dir.path().join(name);
            std::fs::write(&path, content).unwrap();
            path
        }
    }

    fn compact() -> Config {
        Config {
            output: crate::config::OutputConfig { indent: 0 },
            ..Config::default()
        }
    }

    fn run_to_string(command: Command, config: &Config) -> (Outcome, String) {
        let mut out = Vec::new();
        let outcome = run(&command, config, &mut out).unwrap();
        (outcome, String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_canonical_xml() {
        let ws = Workspace::new();
        let xml = ws.file("in.xml", r#"<r z="1" a="2"><b/><a>x</a></r>"#);

        let (outcome, output) = run_to_string(
            Command::Canonical {
                xml,
                format: DumpFormat::Xml,
            },
            &compact(),
        );

        assert_eq!(outcome, Outcome::Done);
        assert_eq!(output, "<r a=\"2\" z=\"1\"><a>x</a><b/></r>\n");
    }

    #[test]
    fn test_canonical_json() {
        let ws = Workspace::new();
        let xml = ws.file("in.xml", "<r><a>x</a></r>");

        let (_, output) = run_to_string(
            Command::Canonical {
                xml,
                format: DumpFormat::Json,
            },
            &compact(),
        );

        let tree: Element = serde_json::from_str(&output).unwrap();
        assert_eq!(tree, Element::new("r").with_child(Element::new("a").with_text("x")));
    }

    #[test]
    fn test_filter_builtin_spec() {
        let ws = Workspace::new();
        let xml = ws.file("live.xml", LIVE);

        let (_, output) = run_to_string(
            Command::Filter {
                xml,
                spec: None,
                strict: true,
            },
            &compact(),
        );

        assert!(output.starts_with(r#"<domain type="kvm"><name>vm-foo</name>"#));
        assert!(!output.contains("features"));
        assert!(!output.contains("id="));
    }

    #[test]
    fn test_filter_strict_fails_on_missing() {
        let ws = Workspace::new();
        let xml = ws.file("live.xml", &LIVE.replace("<name>vm-foo</name>", ""));
        let command = Command::Filter {
            xml,
            spec: None,
            strict: true,
        };

        let err = run(&command, &compact(), &mut Vec::new()).unwrap_err();
        assert!(err.to_string().contains("/domain/name"), "{err}");
    }

    #[test]
    fn test_filter_custom_spec() {
        let ws = Workspace::new();
        let xml = ws.file("live.xml", LIVE);
        let spec = ws.file("spec.yaml", "domain:\n  features: {}\n");

        let (_, output) = run_to_string(
            Command::Filter {
                xml,
                spec: Some(spec),
                strict: false,
            },
            &compact(),
        );

        assert_eq!(output, "<domain><features/></domain>\n");
    }

    #[test]
    fn test_normalize() {
        let ws = Workspace::new();
        let xml = ws.file("live.xml", LIVE);

        let (_, output) = run_to_string(Command::Normalize { xml }, &compact());

        assert!(output.contains(r#"<memory unit="KiB">1048576</memory>"#));
        assert!(output.contains(r#"<currentMemory unit="KiB">524288</currentMemory>"#));
    }

    #[test]
    fn test_define() {
        let ws = Workspace::new();
        let domain = ws.file("vm.yaml", "name: vm-foo\nvcpus_max: 4\ntitle: web\n");

        let (_, output) = run_to_string(Command::Define { domain }, &compact());

        assert!(output.contains("<uuid>6404f873-9fae-5bd4-b141-5d1b1bd27df9</uuid>"));
        assert!(output.contains(r#"<vcpu current="1">4</vcpu>"#));
        assert!(output.contains("<title>web</title>"));
    }

    #[test]
    fn test_define_requires_name() {
        let ws = Workspace::new();
        let domain = ws.file("vm.yaml", "vcpus_max: 4\n");

        let err = run(&Command::Define { domain }, &compact(), &mut Vec::new()).unwrap_err();
        assert!(err.to_string().contains("no name"));
    }

    #[test]
    fn test_compare_in_sync() {
        let ws = Workspace::new();
        let domain = ws.file("vm.yaml", "name: vm-foo\n");
        let live = ws.file("live.xml", LIVE);

        let (outcome, output) = run_to_string(Command::Compare { domain, live, spec: None }, &compact());

        assert_eq!(outcome, Outcome::Done);
        assert_eq!(outcome.exit_code(), 0);
        assert_eq!(output, "Domain 'vm-foo' is in sync\n");
    }

    #[test]
    fn test_compare_change_needed() {
        let ws = Workspace::new();
        let domain = ws.file("vm.yaml", "name: vm-foo\nvcpus_current: 2\n");
        let live = ws.file("live.xml", LIVE);

        let (outcome, output) = run_to_string(Command::Compare { domain, live, spec: None }, &compact());

        assert_eq!(outcome, Outcome::ChangeNeeded);
        assert_eq!(outcome.exit_code(), 2);
        assert!(output.contains(r#"<vcpu current="2">2</vcpu>"#));
        assert!(output.contains(r#"<vcpu current="1">2</vcpu>"#));
    }

    #[test]
    fn test_missing_input_file() {
        let command = Command::Normalize {
            xml: PathBuf::from("/nonexistent/domain.xml"),
        };
        let err = run(&command, &compact(), &mut Vec::new()).unwrap_err();
        assert!(err.to_string().contains("Failed to read /nonexistent/domain.xml"));
    }
}
