//! XInclude resolution.
//!
//! Children in the XInclude namespace are replaced by the element tree of
//! the file named by their `href` attribute. Paths are relative to the
//! including file, and included files may include other files in turn.
//! A file already on the chain of inclusions is not included again.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use tracing::{debug, warn};

use super::parser::TreeParser;
use super::printer;
use super::{Diagnostic, ErrorHandler, Severity};
use crate::constants::{DEFAULT_INDENTATION, XINCLUDE_NS_URI};
use crate::error::{Error, Result};
use crate::node::{copy_node, NodeRef, XmlNode};

const INCLUDE: &str = "include";
const HREF: &str = "href";

/// Builds a copy of a document with its XInclude elements resolved.
///
/// ```no_run
/// use xml_nodetree::xml::NodeIncluder;
///
/// let mut includer = NodeIncluder::from_file("book.xml");
/// includer.set_add_comments(true, false);
/// includer.write("book-full.xml").unwrap();
/// ```
#[derive(Clone)]
pub struct NodeIncluder {
    file: Option<PathBuf>,
    add_comments: bool,
    deep_comments: bool,
    indentation: usize,
    keep_prefixes: bool,
    skip_all_prefixes: bool,
    skipped_prefixes: BTreeSet<String>,
    base_dir: Option<PathBuf>,
    encoding: Option<String>,
    error_handler: Option<Rc<dyn ErrorHandler>>,
}

impl Default for NodeIncluder {
    fn default() -> Self {
        NodeIncluder {
            file: None,
            add_comments: false,
            deep_comments: false,
            indentation: DEFAULT_INDENTATION,
            keep_prefixes: false,
            skip_all_prefixes: false,
            skipped_prefixes: BTreeSet::new(),
            base_dir: None,
            encoding: None,
            error_handler: None,
        }
    }
}

impl NodeIncluder {
    /// Creates an includer without a source document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an includer for a document file.
    pub fn from_file<P: Into<PathBuf>>(path: P) -> Self {
        NodeIncluder {
            file: Some(path.into()),
            ..Default::default()
        }
    }

    pub fn set_file<P: Into<PathBuf>>(&mut self, path: P) {
        self.file = Some(path.into());
    }

    pub fn file(&self) -> Option<&Path> {
        self.file.as_deref()
    }

    /// Adds an `Included File <href>` comment on each included element.
    /// With `deep` the comments are also added for files included by
    /// included files.
    pub fn set_add_comments(&mut self, add: bool, deep: bool) {
        self.add_comments = add;
        self.deep_comments = deep;
    }

    pub fn is_adding_comments(&self) -> bool {
        self.add_comments
    }

    pub fn is_enabling_deep_comments(&self) -> bool {
        self.deep_comments
    }

    pub fn set_indentation(&mut self, indentation: usize) {
        self.indentation = indentation;
    }

    pub fn indentation(&self) -> usize {
        self.indentation
    }

    /// Keeps namespace declarations as attributes of the parsed elements.
    pub fn set_keep_prefixes(&mut self, keep: bool) {
        self.keep_prefixes = keep;
    }

    pub fn is_keeping_prefixes(&self) -> bool {
        self.keep_prefixes
    }

    /// Drops every non-empty prefix binding of included elements.
    pub fn skip_all_prefixes(&mut self, skip: bool) {
        self.skip_all_prefixes = skip;
    }

    /// Drops these prefix bindings from included elements.
    pub fn skip_prefixes<I, S>(&mut self, prefixes: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.skipped_prefixes = prefixes.into_iter().map(Into::into).collect();
    }

    /// Directory used to resolve `href`s when the document has no file.
    pub fn set_default_base_dir<P: Into<PathBuf>>(&mut self, dir: P) {
        self.base_dir = Some(dir.into());
    }

    /// Encoding declared by [`write`](Self::write).
    pub fn set_encoding(&mut self, encoding: impl Into<String>) {
        self.encoding = Some(encoding.into());
    }

    pub fn set_error_handler(&mut self, handler: Rc<dyn ErrorHandler>) {
        self.error_handler = Some(handler);
    }

    pub fn error_handler(&self) -> Option<&Rc<dyn ErrorHandler>> {
        self.error_handler.as_ref()
    }

    fn parser(&self) -> TreeParser {
        let parser = TreeParser::new()
            .namespace_aware(true)
            .keep_line_numbers(true)
            .keep_prefixes(self.keep_prefixes);
        match &self.error_handler {
            Some(handler) => parser.error_handler(handler.clone()),
            None => parser,
        }
    }

    /// Parses the source document and resolves its inclusions.
    pub fn resolve(&self) -> Result<NodeRef> {
        let file = self
            .file
            .as_deref()
            .ok_or_else(|| Error::Include("no document to include into".to_string()))?;
        let root = self.parser().parse_root_file(file)?;
        let base_dir = file
            .parent()
            .map(Path::to_path_buf)
            .or_else(|| self.base_dir.clone());
        let mut chain = vec![canonical(file)];
        Ok(self.with_inclusion(&root, base_dir.as_deref(), true, self.add_comments, &mut chain))
    }

    /// Resolves the inclusions of an already parsed tree. Relative `href`s
    /// are resolved against `base_dir`, or the default base directory.
    pub fn include(&self, root: &NodeRef, base_dir: Option<&Path>) -> NodeRef {
        let base_dir = base_dir.or(self.base_dir.as_deref());
        self.with_inclusion(root, base_dir, true, self.add_comments, &mut Vec::new())
    }

    /// Returns the resolved document as text.
    pub fn content(&self) -> Result<String> {
        let root = self.resolve()?;
        Ok(printer::print(&root, self.indentation))
    }

    /// Writes the resolved document into a file.
    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let root = self.resolve()?;
        printer::print_to_file(&root, self.indentation, path, self.encoding.as_deref())
    }

    fn with_inclusion(
        &self,
        node: &NodeRef,
        base_dir: Option<&Path>,
        top_level: bool,
        add_comments: bool,
        chain: &mut Vec<PathBuf>,
    ) -> NodeRef {
        let result = copy_node(node, false);
        {
            let mut copy = result.borrow_mut();
            if let Some(prefixes) = copy.bound_prefixes().cloned() {
                copy.set_bound_prefixes(None);
                for (uri, prefix) in &prefixes {
                    if uri != XINCLUDE_NS_URI && (top_level || self.keeps_prefix(prefix)) {
                        copy.bind_prefix(prefix, uri);
                    }
                }
            }
            let declarations: Vec<String> = copy
                .attributes()
                .iter()
                .filter(|(qname, value)| qname.is_namespace_declaration() && *value == XINCLUDE_NS_URI)
                .map(|(qname, _)| qname.prefixed_name())
                .collect();
            for name in declarations {
                copy.remove_attribute(&name);
            }
        }
        self.append_children(node, &result, base_dir, add_comments, chain);
        result
    }

    fn keeps_prefix(&self, prefix: &str) -> bool {
        prefix.is_empty() || (!self.skip_all_prefixes && !self.skipped_prefixes.contains(prefix))
    }

    fn append_children(
        &self,
        node: &NodeRef,
        result: &NodeRef,
        base_dir: Option<&Path>,
        add_comments: bool,
        chain: &mut Vec<PathBuf>,
    ) {
        for child in node.borrow().children() {
            let is_xinclude = child.borrow().namespace_uri() == XINCLUDE_NS_URI;
            if !is_xinclude {
                let copy = copy_node(child, false);
                XmlNode::add_child(result, copy.clone());
                self.append_children(child, &copy, base_dir, add_comments, chain);
                continue;
            }

            let child = child.borrow();
            if child.local_part() != INCLUDE {
                continue;
            }
            let Some(href) = child.attribute_value(HREF) else {
                self.report("no href attribute on include element", child.line_number(), base_dir);
                continue;
            };
            let path = resolve_href(base_dir, href);
            if !path.is_file() {
                self.report(
                    &format!("file at {} location does not exist", href),
                    child.line_number(),
                    base_dir,
                );
                continue;
            }
            let key = canonical(&path);
            if chain.contains(&key) {
                self.report(
                    &format!("recursive inclusion of {}", href),
                    child.line_number(),
                    base_dir,
                );
                continue;
            }

            debug!(href, path = %path.display(), "including file");
            let mut parser = self.parser();
            if add_comments {
                parser = parser.root_comment(format!("Included File {}", href));
            }
            let included = match parser.parse_node_file(&path) {
                Ok(included) => included,
                Err(e) => {
                    self.report(
                        &format!("cannot include {}: {}", href, e),
                        child.line_number(),
                        base_dir,
                    );
                    continue;
                }
            };
            chain.push(key);
            let included = self.with_inclusion(
                &included,
                path.parent(),
                false,
                add_comments && self.deep_comments,
                chain,
            );
            chain.pop();
            XmlNode::add_child(result, included);
        }
    }

    fn report(&self, message: &str, line: Option<u32>, base_dir: Option<&Path>) {
        let diagnostic = Diagnostic::new(Severity::Error, message)
            .at_line(line)
            .in_document(base_dir.map(|dir| dir.display().to_string()));
        match &self.error_handler {
            Some(handler) => handler.error(&diagnostic),
            None => warn!("{}", diagnostic),
        }
    }
}

/// Absolute form of `path`, or `path` itself when it cannot be resolved.
fn canonical(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

fn resolve_href(base_dir: Option<&Path>, href: &str) -> PathBuf {
    let href = Path::new(href);
    match base_dir {
        Some(dir) if href.is_relative() => dir.join(href),
        _ => href.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::get_root_node;
    use std::cell::RefCell;

    #[derive(Default)]
    struct Errors(RefCell<Vec<Diagnostic>>);

    impl ErrorHandler for Errors {
        fn error(&self, d: &Diagnostic) {
            self.0.borrow_mut().push(d.clone());
        }
    }

    fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_include_replaces_element() {
        let dir = tempfile::tempdir().unwrap();
        let main = write(
            dir.path(),
            "main.xml",
            r#"<root xmlns:xi="http://www.w3.org/2001/XInclude">
  <first/>
  <xi:include href="part.xml"/>
</root>"#,
        );
        write(dir.path(), "part.xml", r#"<part name="p"><leaf/></part>"#);

        let content = NodeIncluder::from_file(&main).content().unwrap();
        assert_eq!(
            content,
            "<root>\n  <first/>\n  <part name=\"p\">\n    <leaf/>\n  </part>\n</root>"
        );
    }

    #[test]
    fn test_nested_includes_resolve_relative_to_including_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        let main = write(
            dir.path(),
            "main.xml",
            r#"<root xmlns:xi="http://www.w3.org/2001/XInclude"><xi:include href="sub/a.xml"/></root>"#,
        );
        write(
            &dir.path().join("sub"),
            "a.xml",
            r#"<a xmlns:xi="http://www.w3.org/2001/XInclude"><xi:include href="b.xml"/></a>"#,
        );
        write(&dir.path().join("sub"), "b.xml", "<b/>");

        let root = NodeIncluder::from_file(&main).resolve().unwrap();
        let a = root.borrow().child(0).unwrap();
        assert_eq!(a.borrow().name(), "a");
        assert!(!a.borrow().has_bound_prefix(XINCLUDE_NS_URI));
        let b = a.borrow().child(0).unwrap();
        assert_eq!(b.borrow().name(), "b");
        assert!(!root.borrow().has_bound_prefix(XINCLUDE_NS_URI));
    }

    #[test]
    fn test_comments() {
        let dir = tempfile::tempdir().unwrap();
        let main = write(
            dir.path(),
            "main.xml",
            r#"<root xmlns:xi="http://www.w3.org/2001/XInclude"><xi:include href="a.xml"/></root>"#,
        );
        write(
            dir.path(),
            "a.xml",
            r#"<a xmlns:xi="http://www.w3.org/2001/XInclude"><xi:include href="b.xml"/></a>"#,
        );
        write(dir.path(), "b.xml", "<b/>");

        let mut includer = NodeIncluder::from_file(&main);
        includer.set_add_comments(true, false);
        let root = includer.resolve().unwrap();
        let a = root.borrow().child(0).unwrap();
        assert_eq!(a.borrow().comment(), Some("Included File a.xml"));
        assert!(!a.borrow().child(0).unwrap().borrow().has_comment());

        includer.set_add_comments(true, true);
        let root = includer.resolve().unwrap();
        let a = root.borrow().child(0).unwrap();
        let b = a.borrow().child(0).unwrap();
        assert_eq!(b.borrow().comment(), Some("Included File b.xml"));
    }

    #[test]
    fn test_skipped_prefixes() {
        let dir = tempfile::tempdir().unwrap();
        let main = write(
            dir.path(),
            "main.xml",
            r#"<root xmlns:xi="http://www.w3.org/2001/XInclude" xmlns:h="urn:h"><xi:include href="a.xml"/></root>"#,
        );
        write(
            dir.path(),
            "a.xml",
            r#"<a xmlns="urn:default" xmlns:h="urn:h" xmlns:g="urn:g"/>"#,
        );

        let mut includer = NodeIncluder::from_file(&main);
        includer.skip_prefixes(["h"]);
        let root = includer.resolve().unwrap();
        assert_eq!(root.borrow().bound_prefix("urn:h"), Some("h"));
        let a = root.borrow().child(0).unwrap();
        assert!(!a.borrow().has_bound_prefix("urn:h"));
        assert_eq!(a.borrow().bound_prefix("urn:g"), Some("g"));

        includer.skip_all_prefixes(true);
        let root = includer.resolve().unwrap();
        let a = root.borrow().child(0).unwrap();
        assert!(!a.borrow().has_bound_prefix("urn:g"));
        // the default namespace is always kept
        assert_eq!(a.borrow().bound_prefix("urn:default"), Some(""));
    }

    #[test]
    fn test_missing_targets_are_reported_and_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let main = write(
            dir.path(),
            "main.xml",
            r#"<root xmlns:xi="http://www.w3.org/2001/XInclude">
  <xi:include href="missing.xml"/>
  <xi:include/>
  <kept/>
</root>"#,
        );

        let errors = Rc::new(Errors::default());
        let mut includer = NodeIncluder::from_file(&main);
        includer.set_error_handler(errors.clone());
        let root = includer.resolve().unwrap();
        assert_eq!(root.borrow().count_children(), 1);

        let errors = errors.0.borrow();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].line, Some(2));
        assert_eq!(errors[1].line, Some(3));
        assert!(errors[0].message.contains("missing.xml"));
    }

    #[test]
    fn test_self_inclusion_is_reported_and_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let main = write(
            dir.path(),
            "a.xml",
            r#"<a xmlns:xi="http://www.w3.org/2001/XInclude">
  <xi:include href="a.xml"/>
  <kept/>
</a>"#,
        );

        let errors = Rc::new(Errors::default());
        let mut includer = NodeIncluder::from_file(&main);
        includer.set_error_handler(errors.clone());
        let root = includer.resolve().unwrap();
        assert_eq!(root.borrow().count_children(), 1);
        assert_eq!(root.borrow().child(0).unwrap().borrow().name(), "kept");

        let errors = errors.0.borrow();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].line, Some(2));
        assert!(errors[0].message.contains("recursive inclusion of a.xml"));
    }

    #[test]
    fn test_indirect_cycle_stops_at_repeated_file() {
        let dir = tempfile::tempdir().unwrap();
        let main = write(
            dir.path(),
            "main.xml",
            r#"<main xmlns:xi="http://www.w3.org/2001/XInclude"><xi:include href="other.xml"/></main>"#,
        );
        write(
            dir.path(),
            "other.xml",
            r#"<other xmlns:xi="http://www.w3.org/2001/XInclude"><xi:include href="main.xml"/></other>"#,
        );

        let errors = Rc::new(Errors::default());
        let mut includer = NodeIncluder::from_file(&main);
        includer.set_error_handler(errors.clone());
        let content = includer.content().unwrap();
        assert_eq!(content, "<main>\n  <other/>\n</main>");
        assert_eq!(errors.0.borrow().len(), 1);
    }

    #[test]
    fn test_same_file_twice_is_not_a_cycle() {
        let dir = tempfile::tempdir().unwrap();
        let main = write(
            dir.path(),
            "main.xml",
            r#"<main xmlns:xi="http://www.w3.org/2001/XInclude"><xi:include href="p.xml"/><xi:include href="p.xml"/></main>"#,
        );
        write(dir.path(), "p.xml", "<p/>");

        let root = NodeIncluder::from_file(&main).resolve().unwrap();
        assert_eq!(root.borrow().count_children(), 2);
    }

    #[test]
    fn test_include_in_memory_tree() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "part.xml", "<part/>");
        let root = crate::xml::TreeParser::new()
            .namespace_aware(true)
            .parse_root_str(r#"<root xmlns:xi="http://www.w3.org/2001/XInclude"><xi:include href="part.xml"/></root>"#)
            .unwrap();

        let mut includer = NodeIncluder::new();
        includer.set_default_base_dir(dir.path());
        let resolved = includer.include(&root, None);
        assert_eq!(resolved.borrow().child(0).unwrap().borrow().name(), "part");
        // the source tree is untouched
        assert_eq!(root.borrow().child(0).unwrap().borrow().local_part(), "include");
    }

    #[test]
    fn test_write() {
        let dir = tempfile::tempdir().unwrap();
        let main = write(
            dir.path(),
            "main.xml",
            r#"<?xml version="1.0" encoding="UTF-8"?>
<root xmlns:xi="http://www.w3.org/2001/XInclude"><xi:include href="part.xml"/></root>"#,
        );
        write(dir.path(), "part.xml", "<part>text</part>");

        let output = dir.path().join("out.xml");
        let mut includer = NodeIncluder::from_file(&main);
        includer.set_indentation(4);
        includer.write(&output).unwrap();

        let written = fs::read_to_string(&output).unwrap();
        assert_eq!(
            written,
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<root>\n    <part>text</part>\n</root>"
        );
        let reparsed = get_root_node(&written).unwrap();
        assert_eq!(reparsed.borrow().child(0).unwrap().borrow().cdata(), Some("text"));
    }

    #[test]
    fn test_no_document() {
        assert!(matches!(NodeIncluder::new().content(), Err(Error::Include(_))));
    }
}
