//! xml-nodetree - an in-memory XML node tree
//!
//! This library reads XML documents into a tree of named nodes carrying
//! attributes, text content and namespace bindings, and writes such trees
//! back as indented XML.
//!
//! # Overview
//!
//! - [`node`] holds the tree model: [`XmlNode`] with its attributes, text
//!   and bound prefixes, plus the [`NodesIterator`] walker.
//! - [`xml`] parses documents into trees ([`TreeParser`]) and prints trees
//!   back ([`XmlPrinter`]), merging namespace declarations so each binding
//!   is written only where it comes into scope.
//! - [`xml::NodeIncluder`] resolves XInclude elements and
//!   [`xml::TreeReplacer`] rewrites attribute values along element paths.
//! - [`search`] finds nodes by qualified name.
//!
//! # Example
//!
//! ```
//! use xml_nodetree::{get_root_node, print};
//!
//! let root = get_root_node(r#"<root><element name="first"/></root>"#).unwrap();
//! root.borrow_mut().add_attribute("desc", "example");
//! assert_eq!(
//!     print(&root, 2),
//!     "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<root desc=\"example\">\n  <element name=\"first\"/>\n</root>"
//! );
//! ```

pub mod constants;
pub mod error;
pub mod node;
pub mod search;
pub mod xml;

// Re-export commonly used types
pub use constants::*;
pub use error::{Error, Result};
pub use node::{
    copy_node, new_node, new_node_qname, new_root, new_root_qname, tree_eq, FormatValue, NodeFilter,
    NodeKind, NodeRef, NodesIterator, ParseMode, ParseValue, QName, WeakNodeRef, XmlNode,
};
pub use search::{search, search_first, search_first_qname, search_qname};
pub use xml::{
    get_node, get_node_file, get_root_node, get_root_node_file, print, print_to_file,
    Diagnostic, ErrorHandler, NodeIncluder, ParseOptions, ParserConfig, PrintOptions, Severity,
    TreeParser, TreeReplacer, XmlPrinter,
};
