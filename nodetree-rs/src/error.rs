//! Error types for xml-nodetree.

use thiserror::Error;

/// Result type alias for tree operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building, including or printing trees.
#[derive(Error, Debug)]
pub enum Error {
    /// XML parsing error at a known line.
    #[error("XML parse error at line {line}: {message}")]
    ParseAt {
        /// One-based line of the offending construct.
        line: u32,
        /// Description of the failure.
        message: String,
    },

    /// The document did not contain any element.
    #[error("document has no root element")]
    NoRoot,

    /// XInclude resolution error.
    #[error("include error: {0}")]
    Include(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// XML error from quick-xml.
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// Malformed attribute reported by quick-xml.
    #[error("attribute error: {0}")]
    Attr(#[from] quick_xml::events::attributes::AttrError),

    /// Text could not be decoded.
    #[error("encoding error: {0}")]
    Encoding(#[from] quick_xml::encoding::EncodingError),
}

impl Error {
    /// Returns the line number attached to this error, if any.
    pub fn line(&self) -> Option<u32> {
        match self {
            Error::ParseAt { line, .. } => Some(*line),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::get_root_node;

    #[test]
    fn test_parse_failures_carry_their_line() {
        let err = get_root_node("<root>\n<a>\n</b>\n</root>").unwrap_err();
        assert!(matches!(err, Error::ParseAt { .. }));
        assert!(err.line().is_some());
        assert!(err.to_string().starts_with("XML parse error at line "));

        let err = get_root_node("  ").unwrap_err();
        assert!(matches!(err, Error::NoRoot));
        assert_eq!(err.line(), None);
    }
}
