//! Namespace bindings in scope while printing a tree.

use std::collections::BTreeMap;

use crate::node::{SchemaLocation, XmlNode};

/// The namespace bindings already written on the path from the printed
/// top node down to the current node.
///
/// Each printed element works on its own copy (via `Clone`) so siblings do
/// not see each other's declarations.
#[derive(Debug, Clone, Default)]
pub struct BoundPrefix {
    uri_to_prefix: BTreeMap<String, String>,
    prefix_to_uri: BTreeMap<String, String>,
    schema_location: Option<SchemaLocation>,
}

impl BoundPrefix {
    /// Creates an empty scope.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the schema location declaration in scope.
    pub fn schema_location(&self) -> Option<&SchemaLocation> {
        self.schema_location.as_ref()
    }

    /// Returns the URI bound to `prefix` in scope.
    pub fn uri_for_prefix(&self, prefix: &str) -> Option<&str> {
        self.prefix_to_uri.get(prefix).map(String::as_str)
    }

    /// Returns the prefix bound to `uri` in scope.
    pub fn prefix_for_uri(&self, uri: &str) -> Option<&str> {
        self.uri_to_prefix.get(uri).map(String::as_str)
    }

    /// Records a binding, evicting any other URI bound to the same prefix.
    pub fn bind(&mut self, uri: &str, prefix: &str) {
        if let Some(previous) = self.prefix_to_uri.insert(prefix.to_string(), uri.to_string()) {
            if previous != uri {
                self.uri_to_prefix.remove(&previous);
            }
        }
        self.uri_to_prefix.insert(uri.to_string(), prefix.to_string());
    }

    /// Merges the bindings of `node` into the scope and returns those that
    /// must be written on it, keyed by URI.
    pub fn result_bound_prefixes(&mut self, node: &XmlNode) -> BTreeMap<String, String> {
        if let Some(location) = node.schema_location() {
            self.schema_location = Some(location.clone());
        }
        let Some(node_prefixes) = node.bound_prefixes() else {
            return BTreeMap::new();
        };
        if self.uri_to_prefix.is_empty() {
            let mut result = BTreeMap::new();
            for (uri, prefix) in node_prefixes {
                if self.prefix_to_uri.contains_key(prefix) {
                    continue;
                }
                self.bind(uri, prefix);
                result.insert(uri.clone(), prefix.clone());
            }
            return result;
        }

        let mut result: BTreeMap<String, String> = BTreeMap::new();
        for (uri, prefix) in node_prefixes {
            if result.values().any(|p| p == prefix) {
                continue;
            }
            let already_bound = self
                .uri_to_prefix
                .get(uri)
                .is_some_and(|bound| prefix.is_empty() || bound == prefix);
            if already_bound {
                result.remove(uri);
                continue;
            }
            if let Some(previous_uri) = self.prefix_to_uri.get(prefix).cloned() {
                self.uri_to_prefix.remove(&previous_uri);
                result.remove(&previous_uri);
            }
            self.uri_to_prefix.insert(uri.clone(), prefix.clone());
            self.prefix_to_uri.insert(prefix.clone(), uri.clone());
            result.insert(uri.clone(), prefix.clone());
        }
        result
    }
}
