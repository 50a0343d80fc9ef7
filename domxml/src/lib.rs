//! # domxml
//!
//! Canonical conversion engine for libvirt domain XML.
//!
//! Deciding whether a domain has to be redefined means comparing the desired
//! configuration with what libvirt reports. Both sides are brought into the
//! same canonical tree so that plain equality is a valid comparison:
//!
//! ```text
//!  DomainConfig ──to_element──────────────────────┐
//!                                                 ▼
//!                                       normalize_memory ──▶ ==
//!                                                 ▲
//!  live XML ──apply_filter──into_canonical────────┘
//! ```
//!
//! - [`element`]: the intermediate tree ([`Element`], [`Content`])
//! - [`parse`]: XML text to canonical tree (children and attributes sorted)
//! - [`serialize`]: tree to XML text
//! - [`memory`]: memory sizes rewritten to KiB with libvirt's rounding
//! - [`filter`]: declarative projection of an XML document
//! - [`domain`]: desired configuration to tree
//! - [`compare`]: the whole pipeline
//!
//! ## Usage
//!
//! ```rust
//! use domxml::{compare_domain, domain_filter_spec, DomainConfig};
//!
//! let live = r#"<domain type="kvm" id="1">
//!   <name>vm-foo</name>
//!   <uuid>6404f873-9fae-5bd4-b141-5d1b1bd27df9</uuid>
//!   <memory unit="KiB">1048576</memory>
//!   <currentMemory unit="KiB">524288</currentMemory>
//!   <vcpu placement="static" current="1">2</vcpu>
//!   <os><type arch="x86_64">hvm</type></os>
//! </domain>"#;
//!
//! let comparison = compare_domain(&DomainConfig::new("vm-foo"), live, domain_filter_spec()).unwrap();
//! assert!(!comparison.needs_change());
//! ```

pub mod compare;
pub mod domain;
pub mod element;
pub mod error;
pub mod filter;
pub mod memory;
pub mod parse;
pub mod serialize;

pub use compare::{compare_domain, live_domain_tree, DomainComparison};
pub use domain::{domain_filter_spec, domain_uuid, DomainConfig, DOMAIN_UUID_NAMESPACE};
pub use element::{Attribute, Content, Element};
pub use error::{DomXmlError, Result};
pub use filter::{apply_filter, filter_tree, filter_xml, FilterNode, FilterSpec, Filtered};
pub use memory::{normalize_memory, normalized_memory, MemoryNormalization, MemoryUnit, NodeOutcome};
pub use parse::{xml_to_document_tree, xml_to_element};
pub use serialize::{element_to_xml, element_to_xml_pretty};
