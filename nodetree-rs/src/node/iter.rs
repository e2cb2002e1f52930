//! Document-order walking of a subtree.

use std::collections::BTreeMap;
use std::rc::Rc;

use super::{NodeFilter, NodeRef, XmlNode};

/// Walks a subtree in document order without ever leaving it.
///
/// The first call to [`Iterator::next`] yields the start node itself; later
/// calls yield its descendants in pre-order. Explicit moves
/// ([`first_child`](Self::first_child), [`next_sibling`](Self::next_sibling),
/// [`parent_node`](Self::parent_node), ...) reposition the cursor.
///
/// When parent filters are set, the iterator records for each filter
/// whether the path walked so far entered an element it matches. A filter
/// becomes active when a matching element is reached and inactive when the
/// walk moves past that element.
pub struct NodesIterator {
    root: NodeRef,
    current: Option<NodeRef>,
    /// Depth of the current node below the start node.
    level: usize,
    started: bool,
    filters: BTreeMap<String, NodeFilter>,
    states: BTreeMap<String, bool>,
    current_filter: Option<String>,
}

impl NodesIterator {
    /// Creates an iterator over the subtree rooted at `root`.
    pub fn new(root: NodeRef) -> Self {
        NodesIterator {
            current: Some(root.clone()),
            root,
            level: 0,
            started: false,
            filters: BTreeMap::new(),
            states: BTreeMap::new(),
            current_filter: None,
        }
    }

    /// Creates an iterator tracking the given parent filters.
    pub fn with_filters(root: NodeRef, filters: impl IntoIterator<Item = NodeFilter>) -> Self {
        let mut iter = NodesIterator::new(root);
        iter.set_parent_filters(filters);
        iter
    }

    /// Replaces the parent filters. Filter states restart from the start
    /// node.
    pub fn set_parent_filters(&mut self, filters: impl IntoIterator<Item = NodeFilter>) {
        self.filters = filters
            .into_iter()
            .map(|f| (f.filter_name().to_string(), f))
            .collect();
        self.states = self.filters.keys().map(|k| (k.clone(), false)).collect();
        let root = self.root.clone();
        self.enter(&root);
    }

    /// Returns the start node.
    pub fn root(&self) -> &NodeRef {
        &self.root
    }

    /// Returns the node under the cursor.
    pub fn current_node(&self) -> Option<&NodeRef> {
        self.current.as_ref()
    }

    /// Returns the depth of the current node below the start node.
    pub fn level(&self) -> usize {
        self.level
    }

    /// Returns the name of the filter matched by the last node entered.
    pub fn current_filter_name(&self) -> Option<&str> {
        self.current_filter.as_deref()
    }

    /// Returns true if the filter is currently active.
    pub fn in_parent_filter(&self, filter_name: &str) -> bool {
        self.states.get(filter_name).copied().unwrap_or(false)
    }

    /// Returns the state of every filter.
    pub fn parent_filter_states(&self) -> &BTreeMap<String, bool> {
        &self.states
    }

    /// Moves the cursor to `node`, which should lie within the subtree.
    pub fn set_current_node(&mut self, node: NodeRef) {
        for state in self.states.values_mut() {
            *state = false;
        }
        self.enter(&node);
        self.level = self.depth_of(&node);
        self.current = Some(node);
    }

    fn depth_of(&self, node: &NodeRef) -> usize {
        let mut depth = 0;
        let mut cursor = node.clone();
        while !Rc::ptr_eq(&cursor, &self.root) {
            let parent = cursor.borrow().parent();
            match parent {
                Some(p) => {
                    depth += 1;
                    cursor = p;
                }
                None => break,
            }
        }
        depth
    }

    /// Activates the first filter matching `node`.
    fn enter(&mut self, node: &NodeRef) {
        self.current_filter = None;
        let node = node.borrow();
        if let Some((name, _)) = self.filters.iter().find(|(_, f)| f.matches(&node)) {
            self.states.insert(name.clone(), true);
            self.current_filter = Some(name.clone());
        }
    }

    /// Deactivates the active filters matching `node`.
    fn leave(&mut self, node: &NodeRef) {
        let node = node.borrow();
        for (name, state) in self.states.iter_mut() {
            if *state && self.filters.get(name).is_some_and(|f| f.matches(&node)) {
                *state = false;
            }
        }
    }

    fn is_root(&self, node: &NodeRef) -> bool {
        Rc::ptr_eq(node, &self.root)
    }

    /// Returns true if another node follows the current one.
    pub fn has_next(&self) -> bool {
        let Some(current) = &self.current else {
            return false;
        };
        if !self.started {
            return true;
        }
        if current.borrow().has_children() {
            return true;
        }
        let mut cursor = current.clone();
        while !self.is_root(&cursor) {
            if XmlNode::next_sibling(&cursor).is_some() {
                return true;
            }
            let parent = cursor.borrow().parent();
            match parent {
                Some(p) => cursor = p,
                None => return false,
            }
        }
        false
    }

    /// Moves to the node following the current one in document order.
    pub fn next_node(&mut self) -> Option<NodeRef> {
        self.started = true;
        let current = self.current.take()?;
        let next = self.successor(&current);
        self.current = next.clone();
        next
    }

    fn successor(&mut self, node: &NodeRef) -> Option<NodeRef> {
        let first = node.borrow().first_child();
        if let Some(child) = first {
            self.enter(&child);
            self.level += 1;
            return Some(child);
        }
        if self.is_root(node) {
            return None;
        }
        if let Some(sibling) = XmlNode::next_sibling(node) {
            self.leave(node);
            self.enter(&sibling);
            return Some(sibling);
        }
        self.leave(node);
        let mut cursor = node.clone();
        loop {
            let parent = cursor.borrow().parent()?;
            if self.is_root(&parent) {
                return None;
            }
            self.leave(&parent);
            self.level = self.level.saturating_sub(1);
            if let Some(sibling) = XmlNode::next_sibling(&parent) {
                self.enter(&sibling);
                return Some(sibling);
            }
            cursor = parent;
        }
    }

    /// Moves to the first child of the current node.
    pub fn first_child(&mut self) -> Option<NodeRef> {
        let child = self.current.as_ref()?.borrow().first_child()?;
        self.level += 1;
        self.current = Some(child.clone());
        Some(child)
    }

    /// Moves to the last child of the current node.
    pub fn last_child(&mut self) -> Option<NodeRef> {
        let child = self.current.as_ref()?.borrow().last_child()?;
        self.level += 1;
        self.current = Some(child.clone());
        Some(child)
    }

    /// Moves to the next sibling. The start node has no siblings.
    pub fn next_sibling(&mut self) -> Option<NodeRef> {
        self.started = true;
        self.move_to_sibling(XmlNode::next_sibling)
    }

    /// Moves to the previous sibling. The start node has no siblings.
    pub fn previous_sibling(&mut self) -> Option<NodeRef> {
        self.started = true;
        self.move_to_sibling(XmlNode::previous_sibling)
    }

    fn move_to_sibling(&mut self, step: fn(&NodeRef) -> Option<NodeRef>) -> Option<NodeRef> {
        let current = self.current.clone()?;
        if self.is_root(&current) {
            return None;
        }
        let sibling = step(&current)?;
        self.leave(&current);
        self.enter(&sibling);
        self.current = Some(sibling.clone());
        Some(sibling)
    }

    /// Moves to the parent. The walk never climbs above the start node.
    pub fn parent_node(&mut self) -> Option<NodeRef> {
        let current = self.current.clone()?;
        if self.is_root(&current) {
            return None;
        }
        let parent = current.borrow().parent()?;
        self.leave(&current);
        self.enter(&parent);
        self.level = self.level.saturating_sub(1);
        self.current = Some(parent.clone());
        Some(parent)
    }

    /// Moves to the node preceding the current one in document order.
    pub fn previous_node(&mut self) -> Option<NodeRef> {
        self.started = true;
        let current = self.current.clone()?;
        if self.is_root(&current) {
            return None;
        }
        let result = match XmlNode::previous_sibling(&current) {
            None => {
                self.level = self.level.saturating_sub(1);
                current.borrow().parent()?
            }
            Some(mut node) => {
                loop {
                    let last = node.borrow().last_child();
                    match last {
                        Some(child) => {
                            self.level += 1;
                            node = child;
                        }
                        None => break,
                    }
                }
                node
            }
        };
        self.current = Some(result.clone());
        Some(result)
    }
}

impl Iterator for NodesIterator {
    type Item = NodeRef;

    fn next(&mut self) -> Option<NodeRef> {
        if !self.started {
            self.started = true;
            return self.current.clone();
        }
        self.next_node()
    }
}
