//! Tree construction from parser events.

use crate::node::{
    is_xmlns_attr, new_node_ref, split_qname, NamespaceScopes, NodeKind, NodeRef, QName, XmlNode,
};

/// Builds a node tree from a stream of start/end/text events.
///
/// Only the text read before an element's first child element becomes its
/// text content. Text is trimmed unless space is preserved, and dropped
/// when empty.
pub struct TreeHandler {
    as_root: bool,
    encoding: Option<String>,
    comment: Option<String>,
    preserve_space: bool,
    keep_line_numbers: bool,
    keep_prefixes: bool,
    namespace_aware: bool,
    namespaces: NamespaceScopes,
    /// Declarations read for the next element, in order.
    pending: Vec<(String, String)>,
    stack: Vec<NodeRef>,
    buffer: Option<String>,
    root: Option<NodeRef>,
}

impl Default for TreeHandler {
    fn default() -> Self {
        Self::new(true)
    }
}

impl TreeHandler {
    /// Creates a handler. When `as_root` is true the outermost element is
    /// built as a document root.
    pub fn new(as_root: bool) -> Self {
        TreeHandler {
            as_root,
            encoding: None,
            comment: None,
            preserve_space: false,
            keep_line_numbers: false,
            keep_prefixes: false,
            namespace_aware: false,
            namespaces: NamespaceScopes::new(),
            pending: Vec::new(),
            stack: Vec::new(),
            buffer: None,
            root: None,
        }
    }

    /// Sets the encoding recorded on the root.
    pub fn set_encoding(&mut self, encoding: Option<String>) {
        self.encoding = encoding;
    }

    /// Sets the comment attached to the outermost element.
    pub fn set_comment(&mut self, comment: Option<String>) {
        self.comment = comment;
    }

    pub fn set_preserve_space(&mut self, preserve: bool) {
        self.preserve_space = preserve;
    }

    pub fn set_keep_line_numbers(&mut self, keep: bool) {
        self.keep_line_numbers = keep;
    }

    /// Keeps namespace declarations as attributes in addition to binding
    /// them.
    pub fn set_keep_prefixes(&mut self, keep: bool) {
        self.keep_prefixes = keep;
    }

    /// When namespace aware, bindings come from
    /// [`start_prefix_mapping`](Self::start_prefix_mapping) and declaration
    /// attributes are not interpreted again. Otherwise declaration
    /// attributes bind prefixes on the node that carries them.
    pub fn set_namespace_aware(&mut self, aware: bool) {
        self.namespace_aware = aware;
    }

    /// Declares a prefix before any element is read. Such bindings resolve
    /// names but are not attached to a node.
    pub fn predeclare_prefix(&mut self, prefix: &str, uri: &str) {
        self.namespaces.bind(prefix, uri);
    }

    /// Declares a namespace binding for the next element.
    pub fn start_prefix_mapping(&mut self, prefix: &str, uri: &str) {
        self.pending.push((prefix.to_string(), uri.to_string()));
    }

    /// Resolves a prefix against the bindings in scope.
    pub fn resolve_prefix(&self, prefix: &str) -> Option<String> {
        self.namespaces.resolve(prefix).map(str::to_string)
    }

    /// Returns true if the prefix is bound in scope, counting the
    /// declarations waiting for the next element.
    pub fn is_prefix_declared(&self, prefix: &str) -> bool {
        self.pending.iter().any(|(p, _)| p == prefix) || self.resolve_prefix(prefix).is_some()
    }

    fn flush_text(&mut self) {
        let Some(text) = self.buffer.take() else {
            return;
        };
        let Some(node) = self.stack.last() else {
            return;
        };
        let text = if self.preserve_space {
            text.as_str()
        } else {
            text.trim()
        };
        if !text.is_empty() {
            node.borrow_mut().set_cdata(text);
        }
    }

    /// Starts an element given its raw (possibly prefixed) name and its
    /// attributes in document order. `line` is the line where the start tag
    /// ends.
    pub fn start_element(&mut self, name: &str, attributes: &[(String, String)], line: u32) {
        self.flush_text();

        self.namespaces.enter();
        let declared = std::mem::take(&mut self.pending);
        for (prefix, uri) in &declared {
            self.namespaces.bind(prefix, uri);
        }

        let qname = self.resolve_qname(name);
        let outermost = self.stack.is_empty();
        let kind = if outermost && self.as_root {
            NodeKind::Root {
                encoding: self.encoding.clone(),
            }
        } else {
            NodeKind::Element
        };
        let mut node = XmlNode::new(qname, kind);
        if outermost {
            if let Some(comment) = &self.comment {
                node.set_comment(comment.clone());
            }
        }
        if self.keep_line_numbers {
            node.set_line_number(line);
        }
        for (prefix, uri) in &declared {
            node.bind_prefix(prefix, uri);
        }

        // declarations first so that schema locations see their prefix
        let (declarations, others): (Vec<_>, Vec<_>) = attributes
            .iter()
            .partition(|(attr_name, _)| is_xmlns_attr(attr_name));
        for (attr_name, value) in declarations {
            if !self.namespace_aware {
                node.add_attribute(attr_name, value.as_str());
            }
            if self.keep_prefixes {
                node.put_attribute(QName::parse(attr_name), value.as_str());
            }
        }
        for (attr_name, value) in others {
            let qname = self.resolve_qname(attr_name);
            node.add_attribute_qname(qname, value.as_str());
        }

        let node = new_node_ref(node);
        if let Some(parent) = self.stack.last() {
            XmlNode::add_child(parent, node.clone());
        } else {
            self.root = Some(node.clone());
        }
        self.stack.push(node);
        self.buffer = Some(String::new());
    }

    /// Unprefixed names stay outside any namespace, default namespace
    /// included.
    fn resolve_qname(&self, name: &str) -> QName {
        match split_qname(name) {
            (Some(prefix), local) => {
                let uri = self.resolve_prefix(prefix).unwrap_or_default();
                QName::new(uri, local, prefix)
            }
            (None, local) => QName::local(local),
        }
    }

    /// Appends character data to the current element.
    pub fn characters(&mut self, text: &str) {
        if let Some(buffer) = self.buffer.as_mut() {
            buffer.push_str(text);
        }
    }

    /// Ends the current element.
    pub fn end_element(&mut self) {
        self.flush_text();
        if self.stack.pop().is_some() {
            self.namespaces.leave();
        }
    }

    /// Returns the depth of open elements.
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Returns the line of the innermost open element, when recorded.
    pub fn current_line(&self) -> Option<u32> {
        self.stack.last().and_then(|n| n.borrow().line_number())
    }

    /// Returns the outermost element built so far.
    pub fn root(&self) -> Option<NodeRef> {
        self.root.clone()
    }

    /// Consumes the handler and returns the outermost element.
    pub fn into_root(self) -> Option<NodeRef> {
        self.root
    }
}
