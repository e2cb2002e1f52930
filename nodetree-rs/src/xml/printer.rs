//! XML printer that outputs node trees.
//!
//! Elements are written one per line, indented by depth. Text content is
//! written right after the start tag; a child that follows its parent's
//! text stays on the same line. Namespace declarations are merged along
//! the printed path through [`BoundPrefix`] so each binding is written only
//! where it comes into scope.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use tracing::debug;

use super::bound_prefix::BoundPrefix;
use super::PrintOptions;
use crate::error::Result;
use crate::node::{NodeRef, XmlNode};

/// XML printer that outputs node trees.
pub struct XmlPrinter<W: Write> {
    writer: W,
    options: PrintOptions,
    indent_unit: String,
    /// Write non-ASCII characters as character references.
    ascii_only: bool,
}

impl<W: Write> XmlPrinter<W> {
    /// Creates a new XML printer with default options.
    pub fn new(writer: W) -> Self {
        Self::with_options(writer, PrintOptions::default())
    }

    /// Creates a new XML printer with the given options.
    pub fn with_options(writer: W, options: PrintOptions) -> Self {
        XmlPrinter {
            writer,
            indent_unit: " ".repeat(options.indentation),
            options,
            ascii_only: false,
        }
    }

    /// Prints a node tree, preceded by the XML declaration when an encoding
    /// is known.
    pub fn print(&mut self, node: &NodeRef) -> std::io::Result<()> {
        self.print_inner(&node.borrow())
    }

    fn print_inner(&mut self, node: &XmlNode) -> std::io::Result<()> {
        let encoding = self
            .options
            .encoding
            .clone()
            .or_else(|| node.encoding().map(str::to_string));
        if let Some(encoding) = encoding.filter(|_| self.options.declaration) {
            let encoding = declared_encoding(&encoding);
            self.ascii_only = !encoding.eq_ignore_ascii_case("utf-8");
            writeln!(
                self.writer,
                "<?xml version=\"1.0\" encoding=\"{}\"?>",
                encoding
            )?;
        }
        self.print_node(node, &BoundPrefix::new(), 0, false, true)?;
        self.writer.flush()
    }

    fn write_indent(&mut self, depth: usize) -> std::io::Result<()> {
        for _ in 0..depth {
            self.writer.write_all(self.indent_unit.as_bytes())?;
        }
        Ok(())
    }

    fn print_node(
        &mut self,
        node: &XmlNode,
        parent_scope: &BoundPrefix,
        depth: usize,
        after_parent_text: bool,
        is_last: bool,
    ) -> std::io::Result<()> {
        if !after_parent_text {
            self.write_indent(depth)?;
        }
        if let Some(comment) = node.comment() {
            writeln!(self.writer, "<!-- {} -->", comment.trim())?;
            if !after_parent_text {
                self.write_indent(depth)?;
            }
        }

        let name = node.prefixed_name();
        write!(self.writer, "<{}", name)?;

        let mut scope = parent_scope.clone();
        let local_prefixes = scope.result_bound_prefixes(node);
        let mut declared: Vec<&str> = Vec::new();
        let uri = node.namespace_uri();
        if !uri.is_empty() && scope.uri_for_prefix(node.prefix()) != Some(uri) {
            self.write_namespace(node.prefix(), uri)?;
            scope.bind(uri, node.prefix());
            declared.push(node.prefix());
        }
        for (uri, prefix) in &local_prefixes {
            if declared.contains(&prefix.as_str()) {
                continue;
            }
            self.write_namespace(prefix, uri)?;
            declared.push(prefix);
        }

        for (qname, value) in node.attributes() {
            if qname.is_namespace_declaration() {
                let prefix = if qname.has_prefix() {
                    qname.local_part()
                } else {
                    ""
                };
                if scope.uri_for_prefix(prefix) == Some(value.as_str()) {
                    continue;
                }
            }
            let value = self.encode(escape_attribute(value));
            write!(self.writer, " {}=\"{}\"", qname, value)?;
        }

        let children = node.children();
        if children.is_empty() {
            match node.cdata() {
                Some(text) => {
                    let text = self.encode(escape_text(text));
                    write!(self.writer, ">{}</{}>", text, name)?;
                }
                None => self.writer.write_all(b"/>")?,
            }
        } else {
            self.writer.write_all(b">")?;
            let has_text = match node.cdata() {
                Some(text) => {
                    let text = self.encode(escape_text(text));
                    self.writer.write_all(text.as_bytes())?;
                    true
                }
                None => {
                    self.writer.write_all(b"\n")?;
                    false
                }
            };
            for (i, child) in children.iter().enumerate() {
                let after_text = has_text && i == 0;
                self.print_node(&child.borrow(), &scope, depth + 1, after_text, false)?;
            }
            if !has_text || children.len() > 1 {
                self.write_indent(depth)?;
            }
            write!(self.writer, "</{}>", name)?;
        }
        if !is_last {
            self.writer.write_all(b"\n")?;
        }
        Ok(())
    }

    fn write_namespace(&mut self, prefix: &str, uri: &str) -> std::io::Result<()> {
        let uri = self.encode(escape_attribute(uri));
        if prefix.is_empty() {
            write!(self.writer, " xmlns=\"{}\"", uri)
        } else {
            write!(self.writer, " xmlns:{}=\"{}\"", prefix, uri)
        }
    }

    fn encode(&self, text: String) -> String {
        if self.ascii_only && !text.is_ascii() {
            to_char_refs(&text)
        } else {
            text
        }
    }
}

/// The encoding written in the declaration. Output is always UTF-8 bytes, so
/// other Unicode encodings are declared as UTF-8.
fn declared_encoding(encoding: &str) -> &str {
    let lower = encoding.to_ascii_lowercase();
    if lower.starts_with("utf") || lower.starts_with("ucs") {
        "UTF-8"
    } else {
        encoding
    }
}

/// Replaces non-ASCII characters by numeric character references.
fn to_char_refs(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    for c in text.chars() {
        if c.is_ascii() {
            result.push(c);
        } else {
            result.push_str(&format!("&#{};", c as u32));
        }
    }
    result
}

/// Escapes text content: `<`, `>` and `&`.
pub fn escape_text(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => result.push_str("&amp;"),
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            _ => result.push(c),
        }
    }
    result
}

/// Escapes an attribute value: text escaping plus quotes.
pub fn escape_attribute(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => result.push_str("&amp;"),
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            '\'' => result.push_str("&#39;"),
            '"' => result.push_str("&#34;"),
            _ => result.push(c),
        }
    }
    result
}

/// Prints a node into a string using the given options.
pub fn print_with_options(node: &NodeRef, options: PrintOptions) -> String {
    print_node_with_options(&node.borrow(), options)
}

fn print_node_with_options(node: &XmlNode, options: PrintOptions) -> String {
    let mut output = Vec::new();
    {
        let mut printer = XmlPrinter::with_options(&mut output, options);
        // writing into a Vec cannot fail
        let _ = printer.print_inner(node);
    }
    String::from_utf8_lossy(&output).into_owned()
}

/// Prints a node that is already borrowed.
pub(crate) fn print_node(node: &XmlNode, indentation: usize) -> String {
    print_node_with_options(node, PrintOptions::with_indentation(indentation))
}

/// Prints a node into a string. A root carrying an encoding is preceded by
/// the XML declaration.
pub fn print(node: &NodeRef, indentation: usize) -> String {
    print_with_options(node, PrintOptions::with_indentation(indentation))
}

/// Prints a node into a string, preceded by the XML declaration for
/// `encoding`.
pub fn print_with_encoding(node: &NodeRef, indentation: usize, encoding: &str) -> String {
    let options = PrintOptions::with_indentation(indentation).encoding(encoding);
    print_with_options(node, options)
}

/// Prints a node to any writer.
pub fn print_to_writer<W: Write>(node: &NodeRef, writer: W, options: PrintOptions) -> Result<()> {
    XmlPrinter::with_options(writer, options).print(node)?;
    Ok(())
}

/// Prints a node into a file. When `encoding` is `None` the encoding of the
/// root, if any, is declared.
pub fn print_to_file<P: AsRef<Path>>(
    node: &NodeRef,
    indentation: usize,
    path: P,
    encoding: Option<&str>,
) -> Result<()> {
    let path = path.as_ref();
    debug!(path = %path.display(), "writing XML file");
    let mut options = PrintOptions::with_indentation(indentation);
    options.encoding = encoding.map(str::to_string);
    let writer = BufWriter::new(File::create(path)?);
    print_to_writer(node, writer, options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{new_node, new_node_qname, new_root, new_root_qname, QName, XmlNode};

    fn element(name: &str) -> NodeRef {
        let node = new_node("element");
        node.borrow_mut().add_attribute("name", name);
        node
    }

    #[test]
    fn test_print_nested_with_encoding() {
        let root = new_root("root");
        root.borrow_mut().add_attribute("desc", "example");
        let first = element("first");
        XmlNode::add_child(&first, element("second"));
        XmlNode::add_child(&root, first);
        XmlNode::add_child(&root, element("third"));

        let output = print_with_encoding(&root, 2, "UTF-8");
        assert_eq!(
            output,
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
             <root desc=\"example\">\n\
             \x20 <element name=\"first\">\n\
             \x20   <element name=\"second\"/>\n\
             \x20 </element>\n\
             \x20 <element name=\"third\"/>\n\
             </root>"
        );
    }

    #[test]
    fn test_print_without_encoding_has_no_declaration() {
        let root = new_root("root");
        XmlNode::add_child(&root, element("first"));
        assert_eq!(print(&root, 3), "<root>\n   <element name=\"first\"/>\n</root>");
    }

    #[test]
    fn test_root_encoding_is_declared() {
        let root = new_root("root");
        root.borrow_mut().set_encoding(Some("UTF-8".to_string()));
        assert_eq!(
            print(&root, 2),
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<root/>"
        );
    }

    #[test]
    fn test_print_comments() {
        let root = new_root("root");
        {
            let mut r = root.borrow_mut();
            r.add_attribute("desc", "example");
            r.set_comment("  the root comment ");
        }
        let first = element("first");
        first.borrow_mut().set_comment("the node comment");
        XmlNode::add_child(&root, first);
        XmlNode::add_child(&root, element("second"));

        assert_eq!(
            print(&root, 2),
            "<!-- the root comment -->\n\
             <root desc=\"example\">\n\
             \x20 <!-- the node comment -->\n\
             \x20 <element name=\"first\"/>\n\
             \x20 <element name=\"second\"/>\n\
             </root>"
        );
    }

    #[test]
    fn test_print_mixed_content() {
        let root = new_root("root");
        let first = element("first");
        first.borrow_mut().set_cdata("the first element");
        XmlNode::add_child(&first, element("second"));
        let third = element("third");
        third.borrow_mut().set_cdata("the third element");
        XmlNode::add_child(&first, third);
        XmlNode::add_child(&root, first);

        assert_eq!(
            print(&root, 2),
            "<root>\n\
             \x20 <element name=\"first\">the first element<element name=\"second\"/>\n\
             \x20   <element name=\"third\">the third element</element>\n\
             \x20 </element>\n\
             </root>"
        );
    }

    #[test]
    fn test_text_with_single_child_closes_inline() {
        let root = new_root("root");
        root.borrow_mut().set_cdata("text");
        XmlNode::add_child(&root, new_node("child"));
        assert_eq!(print(&root, 2), "<root>text<child/>\n</root>");
    }

    #[test]
    fn test_escaping() {
        let root = new_root("root");
        {
            let mut r = root.borrow_mut();
            r.add_attribute("quote", "a \"b\" 'c' <&>");
            r.set_cdata("x < y & z > w");
        }
        assert_eq!(
            print(&root, 2),
            "<root quote=\"a &#34;b&#34; &#39;c&#39; &lt;&amp;&gt;\">x &lt; y &amp; z &gt; w</root>"
        );
    }

    #[test]
    fn test_namespace_declarations_written_once() {
        let root = new_root("root");
        root.borrow_mut().bind_prefix("h", "urn:h");
        let child = new_node("h:item");
        child.borrow_mut().bind_prefix("h", "urn:h");
        child.borrow_mut().bind_prefix("k", "urn:k");
        XmlNode::add_child(&root, child);

        assert_eq!(
            print(&root, 2),
            "<root xmlns:h=\"urn:h\">\n  <h:item xmlns:k=\"urn:k\"/>\n</root>"
        );
    }

    #[test]
    fn test_element_namespace_declared_when_not_in_scope() {
        let root = new_root_qname(QName::new("urn:a", "root", ""));
        XmlNode::add_child(&root, new_node_qname(QName::new("urn:a", "child", "")));
        XmlNode::add_child(&root, new_node_qname(QName::new("urn:b", "other", "b")));

        assert_eq!(
            print(&root, 2),
            "<root xmlns=\"urn:a\">\n  <child/>\n  <b:other xmlns:b=\"urn:b\"/>\n</root>"
        );
    }

    #[test]
    fn test_schema_location_does_not_redeclare_default_namespace() {
        let xml = r#"<root xmlns="urn:d" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" xsi:schemaLocation="urn:other o.xsd"/>"#;
        let root = crate::xml::TreeParser::new()
            .namespace_aware(true)
            .parse_root_str(xml)
            .unwrap();
        let output = print(&root, 2);
        assert_eq!(output.matches("xmlns=").count(), 1);
        assert!(output.contains(" xmlns=\"urn:d\""));

        let reparsed = crate::xml::TreeParser::new()
            .namespace_aware(true)
            .parse_root_str(&output)
            .unwrap();
        assert!(crate::node::tree_eq(&root, &reparsed));
    }

    #[test]
    fn test_non_unicode_encoding_uses_char_refs() {
        let root = new_root("root");
        root.borrow_mut().set_cdata("café");
        assert_eq!(
            print_with_encoding(&root, 2, "ISO-8859-1"),
            "<?xml version=\"1.0\" encoding=\"ISO-8859-1\"?>\n<root>caf&#233;</root>"
        );
    }

    #[test]
    fn test_utf16_request_declares_written_encoding() {
        let root = new_root("root");
        root.borrow_mut().set_cdata("café");
        let output = print_with_encoding(&root, 2, "UTF-16");
        assert_eq!(output, "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<root>café</root>");
        let reparsed = crate::xml::get_root_node(&output).unwrap();
        assert_eq!(reparsed.borrow().cdata(), Some("café"));
    }

    #[test]
    fn test_print_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.xml");
        let root = new_root("root");
        XmlNode::add_child(&root, element("first"));

        print_to_file(&root, 2, &path, Some("UTF-8")).unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            written,
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<root>\n  <element name=\"first\"/>\n</root>"
        );
    }
}
