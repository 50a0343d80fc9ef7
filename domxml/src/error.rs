//! Error types for the domain XML conversion engine.

use thiserror::Error;

/// Errors that can occur while converting, normalizing or filtering domain XML.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomXmlError {
    /// The input is not well-formed XML.
    #[error("Failed to parse XML at byte {position}: {message}")]
    Parse {
        /// Byte offset in the input where the reader stopped.
        position: usize,
        /// Reader diagnostic.
        message: String,
    },

    /// A tree could not be written out as XML (invalid element/attribute name).
    #[error("Failed to serialize XML: {0}")]
    Serialization(String),

    /// A memory unit token outside the supported table.
    #[error("Unsupported memory unit: {0}")]
    UnsupportedUnit(String),

    /// A memory element whose value is missing, not an integer, or too large.
    #[error("Invalid value for <{element}>: {reason}")]
    InvalidMemoryValue {
        /// Name of the offending element.
        element: String,
        /// What was wrong with it.
        reason: String,
    },

    /// A filter specification that cannot be used.
    #[error("Invalid filter specification: {0}")]
    InvalidFilterSpec(String),

    /// The filter's root does not match the document root.
    #[error("Filter expects root <{expected}> but document root is <{found}>")]
    FilterRootMismatch {
        /// Root named by the filter specification.
        expected: String,
        /// Root found in the source document.
        found: String,
    },

    /// Nodes marked as required by the filter specification were not found.
    #[error("Required elements missing: {}", .0.join(", "))]
    MissingRequired(Vec<String>),
}

impl DomXmlError {
    pub(crate) fn parse(position: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            position,
            message: message.into(),
        }
    }
}

/// Result type alias for domain XML operations.
pub type Result<T> = std::result::Result<T, DomXmlError>;
