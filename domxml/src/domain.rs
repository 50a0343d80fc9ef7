//! Desired domain configuration and its intermediate tree.
//!
//! [`DomainConfig`] holds the handful of domain settings the automation
//! module manages. [`DomainConfig::to_element`] lays them out exactly like
//! the live domain XML looks after [`domain_filter_spec`] and canonical
//! parsing, so the two trees can be compared with `==`.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::element::Element;
use crate::error::Result;
use crate::filter::{FilterNode, FilterSpec};
use crate::serialize::element_to_xml;

/// Namespace for UUIDs derived from domain names.
pub const DOMAIN_UUID_NAMESPACE: Uuid = Uuid::from_u128(0x361e6d51_faec_444a_9079_341386da8e2e);

static DOMAIN_FILTER_SPEC: Lazy<FilterSpec> = Lazy::new(|| {
    FilterSpec::new(
        "domain",
        FilterNode::new()
            .attribute("type")
            .child("name", FilterNode::new())
            .child("uuid", FilterNode::new())
            .child("title", FilterNode::optional())
            .child("description", FilterNode::optional())
            .child("memory", FilterNode::new().attribute("unit"))
            .child("currentMemory", FilterNode::new().attribute("unit"))
            .child("vcpu", FilterNode::new().attribute("current"))
            .child("os", FilterNode::new().child("type", FilterNode::new())),
    )
});

/// Filter selecting the fields of a live domain that [`DomainConfig`] manages.
pub fn domain_filter_spec() -> &'static FilterSpec {
    &DOMAIN_FILTER_SPEC
}

/// Deterministic UUID for a domain name (version 5).
pub fn domain_uuid(name: &str) -> Uuid {
    Uuid::new_v5(&DOMAIN_UUID_NAMESPACE, name.as_bytes())
}

/// Desired state of a domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DomainConfig {
    /// Domain name
    pub name: String,
    /// Explicit UUID; derived from the name when unset
    pub uuid: Option<Uuid>,
    /// Short title
    pub title: Option<String>,
    /// Long description
    pub description: Option<String>,
    /// Maximum vCPUs (`<vcpu>` value)
    pub vcpus_max: u32,
    /// vCPUs online at boot (`current` attribute)
    pub vcpus_current: u32,
    /// Maximum memory
    pub memory_max: u64,
    /// Unit of `memory_max`
    pub memory_max_unit: String,
    /// Memory at boot
    pub memory_current: u64,
    /// Unit of `memory_current`
    pub memory_current_unit: String,
    /// Guest OS type (`hvm`, `linux`, `exe`)
    pub os_type: String,
    /// Hypervisor type (`kvm`, `qemu`, `xen`, ...)
    pub domain_type: String,
}

impl Default for DomainConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            uuid: None,
            title: None,
            description: None,
            vcpus_max: 2,
            vcpus_current: 1,
            memory_max: 1,
            memory_max_unit: "GiB".to_string(),
            memory_current: 512,
            memory_current_unit: "MiB".to_string(),
            os_type: "hvm".to_string(),
            domain_type: "kvm".to_string(),
        }
    }
}

impl DomainConfig {
    /// Create a configuration with default resources.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Set an explicit UUID.
    pub fn with_uuid(mut self, uuid: Uuid) -> Self {
        self.uuid = Some(uuid);
        self
    }

    /// Set the title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set maximum and current vCPUs.
    pub fn with_vcpus(mut self, max: u32, current: u32) -> Self {
        self.vcpus_max = max;
        self.vcpus_current = current;
        self
    }

    /// Set maximum memory.
    pub fn with_memory_max(mut self, value: u64, unit: impl Into<String>) -> Self {
        self.memory_max = value;
        self.memory_max_unit = unit.into();
        self
    }

    /// Set memory at boot.
    pub fn with_memory_current(mut self, value: u64, unit: impl Into<String>) -> Self {
        self.memory_current = value;
        self.memory_current_unit = unit.into();
        self
    }

    /// Set the guest OS type.
    pub fn with_os_type(mut self, os_type: impl Into<String>) -> Self {
        self.os_type = os_type.into();
        self
    }

    /// Set the hypervisor type.
    pub fn with_domain_type(mut self, domain_type: impl Into<String>) -> Self {
        self.domain_type = domain_type.into();
        self
    }

    /// The explicit UUID, or the one derived from the name.
    pub fn effective_uuid(&self) -> Uuid {
        self.uuid.unwrap_or_else(|| domain_uuid(&self.name))
    }

    /// Build the canonical tree for this configuration.
    ///
    /// Memory keeps the configured units; run
    /// [`normalize_memory`](crate::memory::normalize_memory) before comparing
    /// against a live domain. Empty titles and descriptions are omitted.
    pub fn to_element(&self) -> Element {
        let mut children = vec![
            Element::new("currentMemory")
                .with_attribute("unit", self.memory_current_unit.as_str())
                .with_text(self.memory_current.to_string()),
            Element::new("memory")
                .with_attribute("unit", self.memory_max_unit.as_str())
                .with_text(self.memory_max.to_string()),
            Element::new("name").with_text(self.name.as_str()),
            Element::new("os").with_child(Element::new("type").with_text(self.os_type.as_str())),
            Element::new("uuid").with_text(self.effective_uuid().to_string()),
            Element::new("vcpu")
                .with_attribute("current", self.vcpus_current.to_string())
                .with_text(self.vcpus_max.to_string()),
        ];
        if let Some(title) = non_empty(&self.title) {
            children.push(Element::new("title").with_text(title));
        }
        if let Some(description) = non_empty(&self.description) {
            children.push(Element::new("description").with_text(description));
        }

        let element = Element::new("domain")
            .with_attribute("type", self.domain_type.as_str())
            .with_children(children)
            .into_canonical();
        debug!(
            domain = %self.name,
            uuid_derived = self.uuid.is_none(),
            "Built domain tree from configuration"
        );
        element
    }

    /// Definition XML for this configuration.
    pub fn to_xml(&self) -> Result<String> {
        element_to_xml(&self.to_element())
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}
