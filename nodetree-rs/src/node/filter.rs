//! Named element filters used by [`NodesIterator`](super::NodesIterator).

use std::collections::BTreeMap;

use super::XmlNode;

/// Matches elements by prefixed name and required attribute values.
#[derive(Debug, Clone)]
pub struct NodeFilter {
    filter_name: String,
    node_name: String,
    attribute_filters: BTreeMap<String, String>,
}

impl NodeFilter {
    /// Creates a filter called `filter_name` matching elements whose
    /// prefixed name is `node_name`.
    pub fn new(filter_name: impl Into<String>, node_name: impl Into<String>) -> Self {
        NodeFilter {
            filter_name: filter_name.into(),
            node_name: node_name.into(),
            attribute_filters: BTreeMap::new(),
        }
    }

    /// Adds a required attribute value, builder style.
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.add_attribute_filter(name, value);
        self
    }

    /// Adds a required attribute value.
    pub fn add_attribute_filter(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.attribute_filters.insert(name.into(), value.into());
    }

    pub fn filter_name(&self) -> &str {
        &self.filter_name
    }

    pub fn node_name(&self) -> &str {
        &self.node_name
    }

    pub fn attribute_filters(&self) -> &BTreeMap<String, String> {
        &self.attribute_filters
    }

    /// Returns true if the node has the expected name and every required
    /// attribute with the expected value.
    pub fn matches(&self, node: &XmlNode) -> bool {
        node.prefixed_name() == self.node_name
            && self
                .attribute_filters
                .iter()
                .all(|(name, value)| node.attribute_value(name) == Some(value.as_str()))
    }
}

/// Filters are equal when they select the same nodes, whatever their name.
impl PartialEq for NodeFilter {
    fn eq(&self, other: &Self) -> bool {
        self.node_name == other.node_name && self.attribute_filters == other.attribute_filters
    }
}

impl Eq for NodeFilter {}
