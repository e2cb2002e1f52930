//! Qualified names and namespace scopes.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use crate::constants::{XMLNS_PREFIX, XML_NS_URI};

/// A qualified XML name: namespace URI, prefix and local part.
///
/// An empty string stands for "no namespace" and "no prefix". Two names are
/// equal only when all three parts are equal; use [`QName::expanded_eq`] to
/// compare the expanded name (URI and local part) alone.
///
/// Names order by namespace URI, then prefix, then local part. Empty parts
/// sort first, so unqualified names come before qualified ones.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QName {
    namespace_uri: Rc<str>,
    prefix: String,
    local_part: String,
}

impl QName {
    /// Creates a name with no namespace and no prefix.
    pub fn local(local_part: impl Into<String>) -> Self {
        Self {
            namespace_uri: "".into(),
            prefix: String::new(),
            local_part: local_part.into(),
        }
    }

    /// Creates a fully specified name.
    pub fn new(
        namespace_uri: impl Into<Rc<str>>,
        local_part: impl Into<String>,
        prefix: impl Into<String>,
    ) -> Self {
        Self {
            namespace_uri: namespace_uri.into(),
            prefix: prefix.into(),
            local_part: local_part.into(),
        }
    }

    /// Creates a name in a namespace, without prefix.
    pub fn with_namespace(namespace_uri: impl Into<Rc<str>>, local_part: impl Into<String>) -> Self {
        Self::new(namespace_uri, local_part, "")
    }

    /// Parses `prefix:local` or `local`. The namespace URI is left empty.
    pub fn parse(name: &str) -> Self {
        match split_qname(name) {
            (Some(prefix), local) => Self::new("", local, prefix),
            (None, local) => Self::local(local),
        }
    }

    /// Returns the namespace URI, empty when the name has none.
    pub fn namespace_uri(&self) -> &str {
        &self.namespace_uri
    }

    /// Returns the shared namespace URI.
    pub fn namespace_uri_rc(&self) -> &Rc<str> {
        &self.namespace_uri
    }

    /// Returns the prefix, empty when the name has none.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Returns the local part.
    pub fn local_part(&self) -> &str {
        &self.local_part
    }

    /// Returns true if the name has a non-empty namespace URI.
    pub fn has_namespace(&self) -> bool {
        !self.namespace_uri.is_empty()
    }

    /// Returns true if the name has a non-empty prefix.
    pub fn has_prefix(&self) -> bool {
        !self.prefix.is_empty()
    }

    /// Returns `prefix:local`, or `local` when there is no prefix.
    pub fn prefixed_name(&self) -> String {
        if self.prefix.is_empty() {
            self.local_part.clone()
        } else {
            format!("{}:{}", self.prefix, self.local_part)
        }
    }

    /// Compares namespace URI and local part, ignoring the prefix.
    pub fn expanded_eq(&self, other: &QName) -> bool {
        self.namespace_uri == other.namespace_uri && self.local_part == other.local_part
    }

    /// Returns true for `xmlns` and `xmlns:*` declaration names.
    pub fn is_namespace_declaration(&self) -> bool {
        if self.prefix.is_empty() {
            self.local_part == XMLNS_PREFIX
        } else {
            self.prefix == XMLNS_PREFIX
        }
    }
}

impl Default for QName {
    fn default() -> Self {
        QName::local("")
    }
}

impl PartialOrd for QName {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QName {
    fn cmp(&self, other: &Self) -> Ordering {
        self.namespace_uri
            .cmp(&other.namespace_uri)
            .then_with(|| self.prefix.cmp(&other.prefix))
            .then_with(|| self.local_part.cmp(&other.local_part))
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.prefix.is_empty() {
            f.write_str(&self.local_part)
        } else {
            write!(f, "{}:{}", self.prefix, self.local_part)
        }
    }
}

impl From<&str> for QName {
    fn from(name: &str) -> Self {
        QName::parse(name)
    }
}

/// Prefix bindings in scope while reading a document.
///
/// One frame per open element; a binding declared on an element goes out
/// of scope when the element ends. The `xml` prefix is always bound.
#[derive(Debug, Clone)]
pub struct NamespaceScopes {
    frames: Vec<BTreeMap<String, String>>,
}

impl Default for NamespaceScopes {
    fn default() -> Self {
        Self::new()
    }
}

impl NamespaceScopes {
    pub fn new() -> Self {
        let mut document = BTreeMap::new();
        document.insert("xml".to_string(), XML_NS_URI.to_string());
        NamespaceScopes {
            frames: vec![document],
        }
    }

    /// Opens the frame of an element.
    pub fn enter(&mut self) {
        self.frames.push(BTreeMap::new());
    }

    /// Closes the innermost element frame. The document frame stays.
    pub fn leave(&mut self) {
        if self.frames.len() > 1 {
            self.frames.pop();
        }
    }

    /// Binds a prefix in the innermost frame.
    pub fn bind(&mut self, prefix: &str, uri: &str) {
        if let Some(frame) = self.frames.last_mut() {
            frame.insert(prefix.to_string(), uri.to_string());
        }
    }

    /// Returns the URI bound to `prefix`, innermost binding first.
    pub fn resolve(&self, prefix: &str) -> Option<&str> {
        self.frames
            .iter()
            .rev()
            .find_map(|frame| frame.get(prefix))
            .map(String::as_str)
    }

    /// Number of open element frames.
    pub fn depth(&self) -> usize {
        self.frames.len() - 1
    }
}

/// Splits a qualified name into prefix and local name.
///
/// Returns (Some(prefix), local) for "prefix:local"
/// Returns (None, name) for "name" without prefix
pub fn split_qname(qname: &str) -> (Option<&str>, &str) {
    if let Some(pos) = qname.find(':') {
        (Some(&qname[..pos]), &qname[pos + 1..])
    } else {
        (None, qname)
    }
}

/// Checks if an attribute name is a namespace declaration.
pub fn is_xmlns_attr(name: &str) -> bool {
    name == XMLNS_PREFIX || name.starts_with("xmlns:")
}
