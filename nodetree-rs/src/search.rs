//! Name based lookups in a node tree.
//!
//! Names match strictly: namespace URI, local part and prefix must all be
//! equal. A name given as a string is split on its first colon and carries
//! no namespace URI, so it only finds nodes parsed without namespace
//! awareness.

use crate::node::{NodeRef, QName};

/// Returns every node named `name`, in document order.
///
/// The start node is tested first. Unless `deep` is set only its direct
/// children are tested after it.
pub fn search(node: &NodeRef, name: &str, deep: bool) -> Vec<NodeRef> {
    search_qname(node, &QName::parse(name), deep)
}

/// Returns every node with this qualified name, in document order.
pub fn search_qname(node: &NodeRef, qname: &QName, deep: bool) -> Vec<NodeRef> {
    let mut found = Vec::new();
    collect(node, qname, deep, 0, &mut found);
    found
}

/// Returns the first node named `name`.
pub fn search_first(node: &NodeRef, name: &str, deep: bool) -> Option<NodeRef> {
    search_first_qname(node, &QName::parse(name), deep)
}

/// Returns the first node with this qualified name.
pub fn search_first_qname(node: &NodeRef, qname: &QName, deep: bool) -> Option<NodeRef> {
    find_first(node, qname, deep, 0)
}

fn collect(node: &NodeRef, qname: &QName, deep: bool, depth: usize, found: &mut Vec<NodeRef>) {
    if node.borrow().qname() == qname {
        found.push(node.clone());
    }
    if !deep && depth > 0 {
        return;
    }
    for child in node.borrow().children() {
        collect(child, qname, deep, depth + 1, found);
    }
}

fn find_first(node: &NodeRef, qname: &QName, deep: bool, depth: usize) -> Option<NodeRef> {
    if node.borrow().qname() == qname {
        return Some(node.clone());
    }
    if !deep && depth > 0 {
        return None;
    }
    node.borrow()
        .children()
        .iter()
        .find_map(|child| find_first(child, qname, deep, depth + 1))
}
