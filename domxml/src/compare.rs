//! Desired-vs-live domain comparison.
//!
//! Both sides go through the same pipeline (filter, canonical ordering, memory
//! normalization) so a plain `==` tells whether the domain has to be
//! redefined.

use tracing::{debug, info};

use crate::domain::DomainConfig;
use crate::element::Element;
use crate::error::Result;
use crate::filter::{apply_filter, FilterSpec};
use crate::memory::normalize_memory;

/// Canonical, normalized trees for both sides of a comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainComparison {
    /// Tree built from the desired configuration
    pub desired: Element,
    /// Tree built from the live domain XML
    pub actual: Element,
    /// Required elements the live XML did not contain
    pub missing_required: Vec<String>,
}

impl DomainComparison {
    /// Whether the live domain differs from the desired configuration.
    pub fn needs_change(&self) -> bool {
        self.desired != self.actual
    }
}

/// Reduce live domain XML to the canonical, KiB-normalized tree of the
/// fields selected by `spec`.
pub fn live_domain_tree(live_xml: &str, spec: &FilterSpec) -> Result<(Element, Vec<String>)> {
    let filtered = apply_filter(spec, live_xml)?;
    let mut tree = filtered.document.into_canonical();
    normalize_memory(&mut tree)?;
    Ok((tree, filtered.missing_required))
}

/// Compare a desired configuration against live domain XML.
pub fn compare_domain(config: &DomainConfig, live_xml: &str, spec: &FilterSpec) -> Result<DomainComparison> {
    let mut desired = config.to_element();
    normalize_memory(&mut desired)?;
    let (actual, missing_required) = live_domain_tree(live_xml, spec)?;

    let comparison = DomainComparison {
        desired,
        actual,
        missing_required,
    };
    if comparison.needs_change() {
        info!(domain = %config.name, "Live domain differs from desired configuration");
    } else {
        debug!(domain = %config.name, "Live domain matches desired configuration");
    }
    Ok(comparison)
}
