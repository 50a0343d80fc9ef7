//! Memory size normalization.
//!
//! libvirt reports `<memory>` and `<currentMemory>` in KiB no matter which
//! unit the definition used, rounding decimal units up. Rewriting the desired
//! tree the same way makes both sides directly comparable.

use std::fmt;
use std::str::FromStr;

use tracing::debug;

use crate::element::Element;
use crate::error::{DomXmlError, Result};

/// Children of the root that carry a memory size.
pub const MEMORY_ELEMENTS: [&str; 2] = ["memory", "currentMemory"];

/// Canonical unit written back by the normalizer.
pub const CANONICAL_UNIT: &str = "KiB";

/// Unit accepted for memory sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryUnit {
    /// `B`
    Bytes,
    /// `KB` (1000 bytes)
    Kilobytes,
    /// `K`, `KiB`
    Kibibytes,
    /// `MB`
    Megabytes,
    /// `M`, `MiB`
    Mebibytes,
    /// `GB`
    Gigabytes,
    /// `G`, `GiB`
    Gibibytes,
    /// `TB`
    Terabytes,
    /// `T`, `TiB`
    Tebibytes,
}

impl MemoryUnit {
    /// Size of one unit in bytes.
    pub fn bytes(self) -> u128 {
        match self {
            MemoryUnit::Bytes => 1,
            MemoryUnit::Kilobytes => 1_000,
            MemoryUnit::Kibibytes => 1 << 10,
            MemoryUnit::Megabytes => 1_000_000,
            MemoryUnit::Mebibytes => 1 << 20,
            MemoryUnit::Gigabytes => 1_000_000_000,
            MemoryUnit::Gibibytes => 1 << 30,
            MemoryUnit::Terabytes => 1_000_000_000_000,
            MemoryUnit::Tebibytes => 1 << 40,
        }
    }

    /// Convert `value` of this unit to KiB, rounding up.
    ///
    /// Binary units are exact; decimal ones round up the way libvirt does.
    /// Returns `None` if the result does not fit in a `u64`.
    pub fn to_kib(self, value: u64) -> Option<u64> {
        let bytes = u128::from(value) * self.bytes();
        let kib = bytes.div_ceil(1024);
        u64::try_from(kib).ok()
    }
}

impl FromStr for MemoryUnit {
    type Err = DomXmlError;

    fn from_str(token: &str) -> Result<Self> {
        let unit = match token.to_ascii_uppercase().as_str() {
            "B" => MemoryUnit::Bytes,
            "KB" => MemoryUnit::Kilobytes,
            "K" | "KIB" => MemoryUnit::Kibibytes,
            "MB" => MemoryUnit::Megabytes,
            "M" | "MIB" => MemoryUnit::Mebibytes,
            "GB" => MemoryUnit::Gigabytes,
            "G" | "GIB" => MemoryUnit::Gibibytes,
            "TB" => MemoryUnit::Terabytes,
            "T" | "TIB" => MemoryUnit::Tebibytes,
            _ => return Err(DomXmlError::UnsupportedUnit(token.to_string())),
        };
        Ok(unit)
    }
}

impl fmt::Display for MemoryUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let token = match self {
            MemoryUnit::Bytes => "B",
            MemoryUnit::Kilobytes => "KB",
            MemoryUnit::Kibibytes => "KiB",
            MemoryUnit::Megabytes => "MB",
            MemoryUnit::Mebibytes => "MiB",
            MemoryUnit::Gigabytes => "GB",
            MemoryUnit::Gibibytes => "GiB",
            MemoryUnit::Terabytes => "TB",
            MemoryUnit::Tebibytes => "TiB",
        };
        f.write_str(token)
    }
}

/// What happened to one memory element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeOutcome {
    /// The element was found and rewritten.
    Normalized {
        /// Original value
        value: u64,
        /// Original unit
        unit: MemoryUnit,
        /// Value after conversion
        kib: u64,
    },
    /// The element is not a child of the root; nothing was done.
    Missing,
}

impl NodeOutcome {
    /// Whether the element was absent.
    pub fn is_missing(&self) -> bool {
        matches!(self, NodeOutcome::Missing)
    }
}

/// Report returned by [`normalize_memory`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryNormalization {
    /// Outcome for `<memory>`
    pub memory: NodeOutcome,
    /// Outcome for `<currentMemory>`
    pub current_memory: NodeOutcome,
}

impl MemoryNormalization {
    /// Names of the memory elements that were not present.
    pub fn missing(&self) -> Vec<&'static str> {
        MEMORY_ELEMENTS
            .iter()
            .zip([&self.memory, &self.current_memory])
            .filter(|(_, outcome)| outcome.is_missing())
            .map(|(name, _)| *name)
            .collect()
    }
}

/// Rewrite `<memory>` and `<currentMemory>` under `root` to KiB, in place.
///
/// A missing element is skipped and reported as [`NodeOutcome::Missing`].
/// An unknown unit fails with [`DomXmlError::UnsupportedUnit`]; a missing or
/// non-integer value fails with [`DomXmlError::InvalidMemoryValue`]. An
/// element without a `unit` attribute is read as KiB, libvirt's default.
/// Both elements are checked before either is rewritten, so `root` is left
/// untouched on error.
pub fn normalize_memory(root: &mut Element) -> Result<MemoryNormalization> {
    let [memory, current_memory] = MEMORY_ELEMENTS;
    let report = MemoryNormalization {
        memory: inspect_child(root, memory)?,
        current_memory: inspect_child(root, current_memory)?,
    };

    for (name, outcome) in MEMORY_ELEMENTS.iter().zip([&report.memory, &report.current_memory]) {
        if let (NodeOutcome::Normalized { kib, .. }, Some(element)) = (outcome, root.child_mut(name)) {
            element.set_text(kib.to_string());
            element.set_attribute("unit", CANONICAL_UNIT);
        }
    }
    debug!(
        root = %root.name,
        missing = ?report.missing(),
        "Normalized memory elements to KiB"
    );
    Ok(report)
}

/// Same as [`normalize_memory`] but leaves `root` untouched.
pub fn normalized_memory(root: &Element) -> Result<Element> {
    let mut copy = root.clone();
    normalize_memory(&mut copy)?;
    Ok(copy)
}

fn inspect_child(root: &Element, name: &str) -> Result<NodeOutcome> {
    let Some(element) = root.child(name) else {
        return Ok(NodeOutcome::Missing);
    };

    let unit = match element.attribute("unit") {
        Some(token) => token.parse::<MemoryUnit>()?,
        None => MemoryUnit::Kibibytes,
    };
    let text = element.text().ok_or_else(|| DomXmlError::InvalidMemoryValue {
        element: name.to_string(),
        reason: "no value".to_string(),
    })?;
    let value = text
        .trim()
        .parse::<u64>()
        .map_err(|_| DomXmlError::InvalidMemoryValue {
            element: name.to_string(),
            reason: format!("{text:?} is not a non-negative integer"),
        })?;
    let kib = unit
        .to_kib(value)
        .ok_or_else(|| DomXmlError::InvalidMemoryValue {
            element: name.to_string(),
            reason: format!("{value} {unit} overflows KiB"),
        })?;

    Ok(NodeOutcome::Normalized { value, unit, kib })
}
