//! Attribute replacement along element paths.

use std::collections::BTreeMap;
use std::path::Path;

use tracing::debug;

use super::parser::get_root_node_file;
use super::printer;
use crate::error::Result;
use crate::node::{copy_node, NodeRef, QName};

/// Default indentation of replaced documents.
const DEFAULT_TAB: usize = 3;

/// How a step selects an element among its siblings.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Selector {
    /// The n-th sibling with the step name, zero based.
    Occurrence(usize),
    /// The first sibling with the step name whose attribute has this value.
    Attribute { name: String, value: String },
}

/// One element of a [`NodePath`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathStep {
    qname: QName,
    selector: Selector,
    attributes: BTreeMap<String, String>,
}

impl PathStep {
    /// Selects the first element with this name.
    pub fn new(name: &str) -> Self {
        Self::nth(name, 0)
    }

    /// Selects the element with this qualified name.
    pub fn with_qname(qname: QName) -> Self {
        PathStep {
            qname,
            selector: Selector::Occurrence(0),
            attributes: BTreeMap::new(),
        }
    }

    /// Selects the `occurrence`-th element with this name.
    pub fn nth(name: &str, occurrence: usize) -> Self {
        PathStep {
            selector: Selector::Occurrence(occurrence),
            ..Self::with_qname(QName::parse(name))
        }
    }

    /// Selects the first element with this name whose attribute `attribute`
    /// has the value `value`.
    pub fn when(name: &str, attribute: &str, value: &str) -> Self {
        PathStep {
            selector: Selector::Attribute {
                name: attribute.to_string(),
                value: value.to_string(),
            },
            ..Self::with_qname(QName::parse(name))
        }
    }

    /// Sets the new value of an attribute, builder style.
    pub fn with_attribute(mut self, name: &str, value: &str) -> Self {
        self.set_attribute(name, value);
        self
    }

    /// Sets the new value of an attribute. Attributes the element does not
    /// have are left out.
    pub fn set_attribute(&mut self, name: &str, value: &str) {
        self.attributes.insert(name.to_string(), value.to_string());
    }

    pub fn qname(&self) -> &QName {
        &self.qname
    }

    /// Returns the occurrence index, unless the step selects by attribute.
    pub fn occurrence(&self) -> Option<usize> {
        match self.selector {
            Selector::Occurrence(index) => Some(index),
            Selector::Attribute { .. } => None,
        }
    }

    /// Returns the attribute name and value the step selects on.
    pub fn condition(&self) -> Option<(&str, &str)> {
        match &self.selector {
            Selector::Attribute { name, value } => Some((name.as_str(), value.as_str())),
            Selector::Occurrence(_) => None,
        }
    }

    pub fn attributes(&self) -> &BTreeMap<String, String> {
        &self.attributes
    }

    /// Returns true if the step changes attributes.
    pub fn has_changes(&self) -> bool {
        !self.attributes.is_empty()
    }

    fn matches(&self, node: &NodeRef) -> bool {
        let node = node.borrow();
        if !node.qname().expanded_eq(&self.qname) {
            return false;
        }
        match self.condition() {
            Some((name, value)) => node.attribute_value(name) == Some(value),
            None => true,
        }
    }

    /// Overwrites the step attributes that the node already has.
    fn apply(&self, node: &NodeRef) {
        let mut node = node.borrow_mut();
        for (name, value) in &self.attributes {
            node.set_attribute_value(name, value.as_str());
        }
    }

    fn select_child(&self, parent: &NodeRef) -> Option<NodeRef> {
        let parent = parent.borrow();
        let mut named = parent
            .children()
            .iter()
            .filter(|child| child.borrow().qname().expanded_eq(&self.qname));
        match &self.selector {
            Selector::Occurrence(index) => named.nth(*index).cloned(),
            Selector::Attribute { name, value } => named
                .find(|child| child.borrow().attribute_value(name) == Some(value.as_str()))
                .cloned(),
        }
    }
}

/// A path of elements from the root down.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodePath {
    steps: Vec<PathStep>,
}

impl NodePath {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, step: PathStep) {
        self.steps.push(step);
    }

    /// Appends a step selecting the first element with this name.
    pub fn push_name(&mut self, name: &str) {
        self.steps.push(PathStep::new(name));
    }

    pub fn steps(&self) -> &[PathStep] {
        &self.steps
    }
}

impl FromIterator<PathStep> for NodePath {
    fn from_iter<I: IntoIterator<Item = PathStep>>(iter: I) -> Self {
        NodePath {
            steps: iter.into_iter().collect(),
        }
    }
}

/// Changes attribute values of the elements reached by [`NodePath`]s.
///
/// ```
/// use xml_nodetree::xml::{get_root_node, NodePath, PathStep, TreeReplacer};
///
/// let root = get_root_node(r#"<root><item id="a" value="1"/></root>"#).unwrap();
/// let path: NodePath = [
///     PathStep::new("root"),
///     PathStep::when("item", "id", "a").with_attribute("value", "2"),
/// ]
/// .into_iter()
/// .collect();
/// let changed = TreeReplacer::new().replace(&root, &[path]).unwrap();
/// let item = changed.borrow().child(0).unwrap();
/// assert_eq!(item.borrow().attribute_value("value"), Some("2"));
/// ```
#[derive(Debug, Clone)]
pub struct TreeReplacer {
    tab: usize,
}

impl Default for TreeReplacer {
    fn default() -> Self {
        TreeReplacer { tab: DEFAULT_TAB }
    }
}

impl TreeReplacer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the indentation of written documents.
    pub fn set_tab(&mut self, tab: usize) {
        self.tab = tab;
    }

    pub fn tab(&self) -> usize {
        self.tab
    }

    /// Applies the paths to a deep copy of `root`. Returns the copy when
    /// every path matched, `None` otherwise. `root` is never changed.
    pub fn replace(&self, root: &NodeRef, paths: &[NodePath]) -> Option<NodeRef> {
        let output = copy_node(root, true);
        let mut replaced = true;
        for path in paths {
            replaced = apply_path(&output, path) && replaced;
        }
        replaced.then_some(output)
    }

    /// Applies the paths and writes the result when every path matched.
    /// Returns whether the file was written.
    pub fn replace_to_file<P: AsRef<Path>>(
        &self,
        root: &NodeRef,
        output: P,
        paths: &[NodePath],
    ) -> Result<bool> {
        let Some(changed) = self.replace(root, paths) else {
            debug!("not every path matched, nothing written");
            return Ok(false);
        };
        printer::print_to_file(&changed, self.tab, output, None)?;
        Ok(true)
    }

    /// Parses `input`, applies the paths and writes the result.
    pub fn replace_file<P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        input: P,
        output: Q,
        paths: &[NodePath],
    ) -> Result<bool> {
        let root = get_root_node_file(input)?;
        self.replace_to_file(&root, output, paths)
    }
}

/// Walks one path from `root`, changing attributes on the way. Returns
/// false as soon as a step does not match.
fn apply_path(root: &NodeRef, path: &NodePath) -> bool {
    let mut current = root.clone();
    let steps = path.steps();
    for (index, step) in steps.iter().enumerate() {
        if !step.matches(&current) {
            return false;
        }
        step.apply(&current);
        if let Some(next) = steps.get(index + 1) {
            match next.select_child(&current) {
                Some(child) => current = child,
                None => return false,
            }
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::tree_eq;
    use crate::xml::get_root_node;

    const DOC: &str = r#"<root version="1">
  <item id="a" value="1"/>
  <item id="b" value="2"/>
  <group>
    <item id="c" value="3"/>
  </group>
</root>"#;

    fn item(root: &NodeRef, index: usize) -> NodeRef {
        root.borrow().child(index).unwrap()
    }

    #[test]
    fn test_replace_by_occurrence() {
        let root = get_root_node(DOC).unwrap();
        let path: NodePath = [
            PathStep::new("root").with_attribute("version", "2"),
            PathStep::nth("item", 1).with_attribute("value", "20"),
        ]
        .into_iter()
        .collect();

        let changed = TreeReplacer::new().replace(&root, &[path]).unwrap();
        assert_eq!(changed.borrow().attribute_value("version"), Some("2"));
        assert_eq!(item(&changed, 0).borrow().attribute_value("value"), Some("1"));
        assert_eq!(item(&changed, 1).borrow().attribute_value("value"), Some("20"));

        // source is untouched
        assert_eq!(root.borrow().attribute_value("version"), Some("1"));
    }

    #[test]
    fn test_replace_by_attribute_condition() {
        let root = get_root_node(DOC).unwrap();
        let mut path = NodePath::new();
        path.push_name("root");
        path.push_name("group");
        path.push(PathStep::when("item", "id", "c").with_attribute("value", "30"));

        let changed = TreeReplacer::new().replace(&root, &[path]).unwrap();
        let group = item(&changed, 2);
        let c = group.borrow().child(0).unwrap();
        assert_eq!(c.borrow().attribute_value("value"), Some("30"));
    }

    #[test]
    fn test_missing_attributes_are_not_added() {
        let root = get_root_node(DOC).unwrap();
        let path: NodePath = [
            PathStep::new("root"),
            PathStep::new("item").with_attribute("extra", "x"),
        ]
        .into_iter()
        .collect();
        let changed = TreeReplacer::new().replace(&root, &[path]).unwrap();
        assert!(!item(&changed, 0).borrow().has_attribute("extra"));
        assert!(tree_eq(&changed, &root));
    }

    #[test]
    fn test_unmatched_path_returns_none() {
        let root = get_root_node(DOC).unwrap();
        let replacer = TreeReplacer::new();

        let wrong_root: NodePath = [PathStep::new("other")].into_iter().collect();
        assert!(replacer.replace(&root, &[wrong_root]).is_none());

        let past_end: NodePath = [PathStep::new("root"), PathStep::nth("item", 5)]
            .into_iter()
            .collect();
        let good: NodePath = [PathStep::new("root").with_attribute("version", "9")]
            .into_iter()
            .collect();
        assert!(replacer.replace(&root, &[good.clone(), past_end]).is_none());
        assert!(replacer.replace(&root, &[good]).is_some());
    }

    #[test]
    fn test_step_accessors() {
        let step = PathStep::when("item", "id", "a");
        assert_eq!(step.occurrence(), None);
        assert_eq!(step.condition(), Some(("id", "a")));
        assert!(!step.has_changes());
        assert_eq!(PathStep::nth("item", 2).occurrence(), Some(2));
        assert_eq!(TreeReplacer::default().tab(), 3);
    }

    #[test]
    fn test_replace_file() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.xml");
        let output = dir.path().join("out.xml");
        std::fs::write(&input, r#"<root><item value="1"/></root>"#).unwrap();

        let path: NodePath = [
            PathStep::new("root"),
            PathStep::new("item").with_attribute("value", "2"),
        ]
        .into_iter()
        .collect();
        let mut replacer = TreeReplacer::new();
        replacer.set_tab(2);
        assert!(replacer.replace_file(&input, &output, &[path]).unwrap());
        assert_eq!(
            std::fs::read_to_string(&output).unwrap(),
            "<root>\n  <item value=\"2\"/>\n</root>"
        );

        let unmatched: NodePath = [PathStep::new("nothing")].into_iter().collect();
        let skipped = dir.path().join("skipped.xml");
        assert!(!replacer.replace_file(&input, &skipped, &[unmatched]).unwrap());
        assert!(!skipped.exists());
    }
}
