//! Node structures for XML tree representation.
//!
//! A document is a tree of [`XmlNode`]s shared through [`NodeRef`] handles.
//! Each node carries its qualified name, ordered children, a sorted
//! attribute map, optional text content and the namespace bindings declared
//! on it. The document element is an ordinary node whose [`NodeKind`] is
//! `Root`, which additionally records the document encoding.

pub mod filter;
pub mod iter;
pub mod namespace;
mod value;

pub use filter::NodeFilter;
pub use iter::NodesIterator;
pub use namespace::{is_xmlns_attr, split_qname, NamespaceScopes, QName};
pub use value::{FormatValue, ParseMode, ParseValue};

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::constants::{DEFAULT_INDENTATION, SCHEMA_INSTANCE_NS_URI, SCHEMA_LOCATION};
use crate::xml::printer;

/// A reference-counted pointer to a node.
pub type NodeRef = Rc<RefCell<XmlNode>>;

/// A weak reference to a node, used for parent links.
pub type WeakNodeRef = Weak<RefCell<XmlNode>>;

/// Kind-specific data for nodes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum NodeKind {
    /// An ordinary element.
    #[default]
    Element,
    /// The document element.
    Root {
        /// Encoding declared by the document, if any.
        encoding: Option<String>,
    },
}

/// A `schemaLocation` declaration found on a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaLocation {
    /// Name of the attribute that carried the declaration.
    pub declaration: QName,
    /// Namespace URI named by the declaration.
    pub namespace_uri: String,
}

/// A node in an XML document tree.
#[derive(Debug, Default)]
pub struct XmlNode {
    qname: QName,
    children: Vec<NodeRef>,
    parent: WeakNodeRef,
    /// Zero-based position among siblings (-1 when detached).
    child_pos: i32,
    attributes: BTreeMap<QName, String>,
    cdata: Option<String>,
    /// Namespace URI -> prefix.
    bound_prefixes: Option<BTreeMap<String, String>>,
    schema_location: Option<SchemaLocation>,
    comment: Option<String>,
    line_number: Option<u32>,
    kind: NodeKind,
}

/// Creates a new node reference.
pub fn new_node_ref(inner: XmlNode) -> NodeRef {
    Rc::new(RefCell::new(inner))
}

/// Creates an element node. A name of the form `prefix:local` is split.
pub fn new_node(name: &str) -> NodeRef {
    new_node_qname(QName::parse(name))
}

/// Creates an element node with a qualified name.
pub fn new_node_qname(qname: QName) -> NodeRef {
    new_node_ref(XmlNode::new(qname, NodeKind::Element))
}

/// Creates a document root without encoding.
pub fn new_root(name: &str) -> NodeRef {
    new_root_qname(QName::parse(name))
}

/// Creates a document root with a qualified name.
pub fn new_root_qname(qname: QName) -> NodeRef {
    new_node_ref(XmlNode::new(qname, NodeKind::Root { encoding: None }))
}

impl XmlNode {
    /// Creates a detached node.
    pub fn new(qname: QName, kind: NodeKind) -> Self {
        XmlNode {
            qname,
            child_pos: -1,
            kind,
            ..Default::default()
        }
    }

    // --- names ---

    /// Returns the qualified name.
    pub fn qname(&self) -> &QName {
        &self.qname
    }

    /// Returns the local name. Same as [`XmlNode::local_part`].
    pub fn name(&self) -> &str {
        self.qname.local_part()
    }

    /// Returns the local name.
    pub fn local_part(&self) -> &str {
        self.qname.local_part()
    }

    /// Returns the prefix, empty when there is none.
    pub fn prefix(&self) -> &str {
        self.qname.prefix()
    }

    /// Returns the namespace URI, empty when there is none.
    pub fn namespace_uri(&self) -> &str {
        self.qname.namespace_uri()
    }

    /// Returns `prefix:local`, or `local` when there is no prefix.
    pub fn prefixed_name(&self) -> String {
        self.qname.prefixed_name()
    }

    // --- kind ---

    /// Returns the node kind.
    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    /// Returns true if this node is a document root.
    pub fn is_root(&self) -> bool {
        matches!(self.kind, NodeKind::Root { .. })
    }

    /// Returns the document encoding of a root node.
    pub fn encoding(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Root { encoding } => encoding.as_deref(),
            NodeKind::Element => None,
        }
    }

    /// Sets the document encoding. Has no effect on element nodes.
    pub fn set_encoding(&mut self, value: Option<String>) {
        if let NodeKind::Root { encoding } = &mut self.kind {
            *encoding = value;
        }
    }

    // --- tree shape ---

    /// Returns the children as a slice.
    pub fn children(&self) -> &[NodeRef] {
        &self.children
    }

    /// Returns the child at the given index.
    pub fn child(&self, index: usize) -> Option<NodeRef> {
        self.children.get(index).cloned()
    }

    /// Returns the first child.
    pub fn first_child(&self) -> Option<NodeRef> {
        self.children.first().cloned()
    }

    /// Returns the last child.
    pub fn last_child(&self) -> Option<NodeRef> {
        self.children.last().cloned()
    }

    /// Returns true if the node has children.
    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    /// Returns the number of children.
    pub fn count_children(&self) -> usize {
        self.children.len()
    }

    /// Returns the parent node.
    pub fn parent(&self) -> Option<NodeRef> {
        self.parent.upgrade()
    }

    /// Returns the child position (0-based index among siblings, -1 when
    /// detached).
    pub fn child_pos(&self) -> i32 {
        self.child_pos
    }

    // --- attributes ---

    /// Adds an attribute. `xmlns` and `xmlns:p` bind a prefix instead.
    pub fn add_attribute(&mut self, name: &str, value: impl Into<String>) {
        self.add_attribute_qname(QName::parse(name), value);
    }

    /// Adds an attribute with a qualified name.
    ///
    /// Namespace declarations bind a prefix instead of being stored. A
    /// `schemaLocation` attribute in the bound schema instance namespace
    /// also records the schema location and binds the empty prefix to the
    /// namespace it names.
    pub fn add_attribute_qname(&mut self, qname: QName, value: impl Into<String>) {
        let value = value.into();
        if qname.is_namespace_declaration() {
            let prefix = if qname.has_prefix() {
                qname.local_part()
            } else {
                ""
            };
            self.bind_prefix(prefix, &value);
            return;
        }
        self.bind_schema_location(&qname, &value);
        self.attributes.insert(qname, value);
    }

    /// Adds an attribute holding a typed value. Characters are written as
    /// their integer code point.
    pub fn add_attribute_value<T: FormatValue>(&mut self, name: &str, value: T) {
        self.add_attribute(name, value.format_value());
    }

    /// Stores an attribute as is, without interpreting namespace
    /// declarations.
    pub fn put_attribute(&mut self, qname: QName, value: impl Into<String>) {
        self.attributes.insert(qname, value.into());
    }

    fn bind_schema_location(&mut self, qname: &QName, value: &str) {
        if qname.local_part() != SCHEMA_LOCATION {
            return;
        }
        let Some(xsi_prefix) = self.bound_prefix(SCHEMA_INSTANCE_NS_URI) else {
            return;
        };
        if xsi_prefix != qname.prefix() {
            return;
        }
        let mut parts = value.split_whitespace();
        if let (Some(uri), Some(_location), None) = (parts.next(), parts.next(), parts.next()) {
            let uri = uri.to_string();
            self.schema_location = Some(SchemaLocation {
                declaration: QName::new(SCHEMA_INSTANCE_NS_URI, SCHEMA_LOCATION, qname.prefix()),
                namespace_uri: uri.clone(),
            });
            self.bind_prefix("", &uri);
        }
    }

    /// Finds an attribute key by its prefixed name, ignoring the namespace
    /// URI.
    fn find_attribute_key(&self, name: &str) -> Option<&QName> {
        let (prefix, local) = split_qname(name);
        let prefix = prefix.unwrap_or("");
        self.attributes
            .keys()
            .find(|q| q.local_part() == local && q.prefix() == prefix)
    }

    /// Returns the value of an attribute given its prefixed name.
    pub fn attribute_value(&self, name: &str) -> Option<&str> {
        let key = self.find_attribute_key(name)?;
        self.attributes.get(key).map(String::as_str)
    }

    /// Returns the value of an attribute given its qualified name.
    pub fn attribute_value_qname(&self, qname: &QName) -> Option<&str> {
        self.attributes.get(qname).map(String::as_str)
    }

    /// Returns true if the node has an attribute with this prefixed name.
    pub fn has_attribute(&self, name: &str) -> bool {
        self.find_attribute_key(name).is_some()
    }

    /// Returns true if the node has an attribute with this qualified name.
    pub fn has_attribute_qname(&self, qname: &QName) -> bool {
        self.attributes.contains_key(qname)
    }

    /// Overwrites the value of an existing attribute. Returns false when
    /// the node has no such attribute.
    pub fn set_attribute_value(&mut self, name: &str, value: impl Into<String>) -> bool {
        let Some(key) = self.find_attribute_key(name).cloned() else {
            return false;
        };
        self.attributes.insert(key, value.into());
        true
    }

    /// Removes an attribute given its prefixed name.
    pub fn remove_attribute(&mut self, name: &str) -> Option<String> {
        let key = self.find_attribute_key(name)?.clone();
        self.attributes.remove(&key)
    }

    /// Returns the number of attributes.
    pub fn count_attributes(&self) -> usize {
        self.attributes.len()
    }

    /// Returns the attributes in name order.
    pub fn attributes(&self) -> &BTreeMap<QName, String> {
        &self.attributes
    }

    /// Returns true if the attribute value parses as `T`.
    pub fn attribute_is<T: ParseValue>(&self, name: &str, mode: ParseMode) -> bool {
        self.attribute_as::<T>(name, mode).is_some()
    }

    /// Returns the attribute value parsed as `T`.
    pub fn attribute_as<T: ParseValue>(&self, name: &str, mode: ParseMode) -> Option<T> {
        self.attribute_value(name)
            .and_then(|value| T::parse_value(value, mode))
    }

    /// Returns the attribute value parsed as `T`, or `default` when it is
    /// missing or does not parse.
    pub fn attribute_or<T: ParseValue>(&self, name: &str, default: T, mode: ParseMode) -> T {
        self.attribute_as(name, mode).unwrap_or(default)
    }

    /// Returns the attribute value parsed as `T`, looked up by qualified
    /// name.
    pub fn attribute_as_qname<T: ParseValue>(&self, qname: &QName, mode: ParseMode) -> Option<T> {
        self.attribute_value_qname(qname)
            .and_then(|value| T::parse_value(value, mode))
    }

    // --- text content ---

    /// Sets the text content.
    pub fn set_cdata(&mut self, cdata: impl Into<String>) {
        self.cdata = Some(cdata.into());
    }

    /// Sets the text content to a typed value.
    pub fn set_cdata_value<T: FormatValue>(&mut self, value: T) {
        self.cdata = Some(value.format_value());
    }

    /// Removes the text content.
    pub fn clear_cdata(&mut self) {
        self.cdata = None;
    }

    /// Returns the text content.
    pub fn cdata(&self) -> Option<&str> {
        self.cdata.as_deref()
    }

    /// Returns the text content, or an empty string.
    pub fn cdata_or_empty(&self) -> &str {
        self.cdata.as_deref().unwrap_or("")
    }

    /// Returns the text content with `<`, `>` and `&` escaped.
    pub fn escaped_cdata(&self) -> Option<String> {
        self.cdata.as_deref().map(printer::escape_text)
    }

    /// Returns true if the node has text content.
    pub fn has_cdata(&self) -> bool {
        self.cdata.is_some()
    }

    /// Returns true if the text content parses as `T`.
    pub fn cdata_is<T: ParseValue>(&self, mode: ParseMode) -> bool {
        self.cdata_as::<T>(mode).is_some()
    }

    /// Returns the text content parsed as `T`.
    pub fn cdata_as<T: ParseValue>(&self, mode: ParseMode) -> Option<T> {
        self.cdata.as_deref().and_then(|value| T::parse_value(value, mode))
    }

    /// Returns the text content parsed as `T`, or `default`.
    pub fn cdata_or<T: ParseValue>(&self, default: T, mode: ParseMode) -> T {
        self.cdata_as(mode).unwrap_or(default)
    }

    // --- namespaces ---

    /// Binds `prefix` to `uri` on this node. The first prefix bound to a
    /// URI is kept, and a prefix already bound to another URI on this node
    /// keeps that URI.
    pub fn bind_prefix(&mut self, prefix: &str, uri: &str) {
        let prefixes = self.bound_prefixes.get_or_insert_with(BTreeMap::new);
        if prefixes.contains_key(uri) || prefixes.values().any(|p| p == prefix) {
            return;
        }
        prefixes.insert(uri.to_string(), prefix.to_string());
    }

    /// Removes the binding of a URI.
    pub fn unbind_uri(&mut self, uri: &str) -> Option<String> {
        let prefixes = self.bound_prefixes.as_mut()?;
        let removed = prefixes.remove(uri);
        if prefixes.is_empty() {
            self.bound_prefixes = None;
        }
        removed
    }

    /// Returns the bound prefixes, keyed by namespace URI.
    pub fn bound_prefixes(&self) -> Option<&BTreeMap<String, String>> {
        self.bound_prefixes.as_ref()
    }

    /// Replaces the bound prefixes.
    pub fn set_bound_prefixes(&mut self, prefixes: Option<BTreeMap<String, String>>) {
        self.bound_prefixes = prefixes;
    }

    /// Returns true if any prefix is bound on this node.
    pub fn has_bound_prefixes(&self) -> bool {
        self.bound_prefixes.is_some()
    }

    /// Returns true if a prefix is bound to `uri` on this node.
    pub fn has_bound_prefix(&self, uri: &str) -> bool {
        self.bound_prefixes
            .as_ref()
            .is_some_and(|prefixes| prefixes.contains_key(uri))
    }

    /// Returns the prefix bound to `uri` on this node.
    pub fn bound_prefix(&self, uri: &str) -> Option<&str> {
        self.bound_prefixes
            .as_ref()
            .and_then(|prefixes| prefixes.get(uri))
            .map(String::as_str)
    }

    /// Returns the schema location declaration.
    pub fn schema_location(&self) -> Option<&SchemaLocation> {
        self.schema_location.as_ref()
    }

    /// Returns true if the node declares a schema location.
    pub fn has_schema_location(&self) -> bool {
        self.schema_location.is_some()
    }

    // --- comment and line ---

    /// Sets the comment written before the node.
    pub fn set_comment(&mut self, comment: impl Into<String>) {
        self.comment = Some(comment.into());
    }

    /// Returns the comment.
    pub fn comment(&self) -> Option<&str> {
        self.comment.as_deref()
    }

    /// Returns true if the node has a comment.
    pub fn has_comment(&self) -> bool {
        self.comment.is_some()
    }

    /// Sets the source line number.
    pub fn set_line_number(&mut self, line: u32) {
        self.line_number = Some(line);
    }

    /// Returns the source line number.
    pub fn line_number(&self) -> Option<u32> {
        self.line_number
    }

    /// Returns true if the node knows its source line.
    pub fn has_line_number(&self) -> bool {
        self.line_number.is_some()
    }

    /// Copies this node's own data (no children, no parent).
    fn shallow_copy(&self) -> XmlNode {
        XmlNode {
            qname: self.qname.clone(),
            children: Vec::new(),
            parent: Weak::new(),
            child_pos: -1,
            attributes: self.attributes.clone(),
            cdata: self.cdata.clone(),
            bound_prefixes: self.bound_prefixes.clone(),
            schema_location: self.schema_location.clone(),
            comment: self.comment.clone(),
            line_number: self.line_number,
            kind: self.kind.clone(),
        }
    }
}

/// Helper functions that work with NodeRef.
impl XmlNode {
    /// Appends a child node, detaching it from its previous parent.
    pub fn add_child(parent_ref: &NodeRef, child_ref: NodeRef) {
        Self::detach(&child_ref);
        {
            let mut child = child_ref.borrow_mut();
            child.parent = Rc::downgrade(parent_ref);
            child.child_pos = parent_ref.borrow().children.len() as i32;
        }
        parent_ref.borrow_mut().children.push(child_ref);
    }

    /// Inserts a child at the given index, clamped to the child count. The
    /// child is detached from its previous parent first.
    pub fn insert_child(parent_ref: &NodeRef, index: usize, child_ref: NodeRef) {
        Self::detach(&child_ref);
        let index = index.min(parent_ref.borrow().children.len());
        child_ref.borrow_mut().parent = Rc::downgrade(parent_ref);
        let mut parent = parent_ref.borrow_mut();
        parent.children.insert(index, child_ref);
        for (i, child) in parent.children.iter().enumerate().skip(index) {
            child.borrow_mut().child_pos = i as i32;
        }
    }

    /// Removes the child at the given index and returns it detached.
    pub fn remove_child(parent_ref: &NodeRef, index: usize) -> Option<NodeRef> {
        let mut parent = parent_ref.borrow_mut();
        if index >= parent.children.len() {
            return None;
        }
        let removed = parent.children.remove(index);
        for (i, child) in parent.children.iter().enumerate().skip(index) {
            child.borrow_mut().child_pos = i as i32;
        }
        {
            let mut node = removed.borrow_mut();
            node.parent = Weak::new();
            node.child_pos = -1;
        }
        Some(removed)
    }

    /// Removes a node from the children of its parent, if any.
    pub fn detach(node_ref: &NodeRef) {
        let (parent, pos) = {
            let node = node_ref.borrow();
            (node.parent.upgrade(), node.child_pos)
        };
        let (Some(parent), Ok(index)) = (parent, usize::try_from(pos)) else {
            return;
        };
        let holds = parent
            .borrow()
            .children
            .get(index)
            .is_some_and(|child| Rc::ptr_eq(child, node_ref));
        if holds {
            Self::remove_child(&parent, index);
        }
    }

    /// Removes all children.
    pub fn remove_children(parent_ref: &NodeRef) {
        let children = std::mem::take(&mut parent_ref.borrow_mut().children);
        for child in children {
            let mut node = child.borrow_mut();
            node.parent = Weak::new();
            node.child_pos = -1;
        }
    }

    /// Gets the previous sibling of a node.
    pub fn previous_sibling(node_ref: &NodeRef) -> Option<NodeRef> {
        let node = node_ref.borrow();
        if node.child_pos <= 0 {
            return None;
        }
        let parent = node.parent.upgrade()?;
        let sibling_index = (node.child_pos - 1) as usize;
        let sibling = parent.borrow().children.get(sibling_index).cloned();
        sibling
    }

    /// Gets the next sibling of a node.
    pub fn next_sibling(node_ref: &NodeRef) -> Option<NodeRef> {
        let node = node_ref.borrow();
        if node.child_pos < 0 {
            return None;
        }
        let parent = node.parent.upgrade()?;
        let sibling_index = (node.child_pos + 1) as usize;
        let sibling = parent.borrow().children.get(sibling_index).cloned();
        sibling
    }
}

/// Copies a node. A deep copy also copies all descendants, re-parented
/// under the copy. The copy itself has no parent.
pub fn copy_node(node_ref: &NodeRef, deep: bool) -> NodeRef {
    let node = node_ref.borrow();
    let copy = new_node_ref(node.shallow_copy());
    if deep {
        for child in &node.children {
            XmlNode::add_child(&copy, copy_node(child, true));
        }
    }
    copy
}

/// Compares two trees by name, text, attributes and children. Roots also
/// compare their encoding. Comments and line numbers are ignored.
pub fn tree_eq(a: &NodeRef, b: &NodeRef) -> bool {
    if Rc::ptr_eq(a, b) {
        return true;
    }
    let a = a.borrow();
    let b = b.borrow();
    a.qname == b.qname
        && a.cdata == b.cdata
        && a.attributes == b.attributes
        && a.kind == b.kind
        && a.children.len() == b.children.len()
        && a.children
            .iter()
            .zip(b.children.iter())
            .all(|(x, y)| tree_eq(x, y))
}

/// Collects all descendants with this qualified name, depth first.
pub fn all_children(node_ref: &NodeRef, qname: &QName) -> Vec<NodeRef> {
    let mut found = Vec::new();
    collect_children(node_ref, &mut found, &|node: &XmlNode| node.qname() == qname);
    found
}

/// Collects all descendants with this local name, depth first.
pub fn all_children_named(node_ref: &NodeRef, name: &str) -> Vec<NodeRef> {
    let mut found = Vec::new();
    collect_children(node_ref, &mut found, &|node: &XmlNode| node.name() == name);
    found
}

fn collect_children(node_ref: &NodeRef, found: &mut Vec<NodeRef>, pred: &dyn Fn(&XmlNode) -> bool) {
    for child in node_ref.borrow().children() {
        if pred(&child.borrow()) {
            found.push(child.clone());
        }
        collect_children(child, found, pred);
    }
}

impl fmt::Display for XmlNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&printer::print_node(self, DEFAULT_INDENTATION))
    }
}
