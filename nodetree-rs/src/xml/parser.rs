//! XML parser that builds node trees.
//!
//! The parser drives quick-xml's streaming reader and feeds a
//! [`TreeHandler`]. Entity references, namespace declarations and line
//! numbers are handled here; tree shape is the handler's business.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fs;
use std::io::Read;
use std::path::Path;
use std::rc::Rc;

use quick_xml::escape::resolve_predefined_entity;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use tracing::{debug, error, warn};

use super::handler::TreeHandler;
use super::{Diagnostic, ErrorHandler, ParseOptions, ParserConfig, Severity};
use crate::constants::DEFAULT_ENCODING;
use crate::error::{Error, Result};
use crate::node::{is_xmlns_attr, split_qname, NodeRef};

/// Builds node trees from XML text.
///
/// ```
/// use xml_nodetree::xml::TreeParser;
///
/// let root = TreeParser::new()
///     .keep_line_numbers(true)
///     .parse_root_str("<root>\n  <child/>\n</root>")
///     .unwrap();
/// let child = root.borrow().child(0).unwrap();
/// assert_eq!(child.borrow().line_number(), Some(2));
/// ```
#[derive(Debug, Clone, Default)]
pub struct TreeParser {
    config: ParserConfig,
}

impl TreeParser {
    /// Creates a parser with default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a parser from an existing configuration.
    pub fn with_config(config: ParserConfig) -> Self {
        TreeParser { config }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    /// Replaces all options.
    pub fn options(mut self, options: ParseOptions) -> Self {
        self.config.options = options;
        self
    }

    fn option(mut self, option: ParseOptions, on: bool) -> Self {
        self.config.options.set(option, on);
        self
    }

    pub fn namespace_aware(self, on: bool) -> Self {
        self.option(ParseOptions::NAMESPACE_AWARE, on)
    }

    pub fn preserve_space(self, on: bool) -> Self {
        self.option(ParseOptions::PRESERVE_SPACE, on)
    }

    pub fn keep_line_numbers(self, on: bool) -> Self {
        self.option(ParseOptions::KEEP_LINE_NUMBERS, on)
    }

    pub fn keep_prefixes(self, on: bool) -> Self {
        self.option(ParseOptions::KEEP_PREFIXES, on)
    }

    pub fn validating(self, on: bool) -> Self {
        self.option(ParseOptions::VALIDATING, on)
    }

    pub fn show_exceptions(self, on: bool) -> Self {
        self.option(ParseOptions::SHOW_EXCEPTIONS, on)
    }

    pub fn show_warnings(self, on: bool) -> Self {
        self.option(ParseOptions::SHOW_WARNINGS, on)
    }

    /// Forces the encoding recorded on parsed roots.
    pub fn encoding(mut self, encoding: impl Into<String>) -> Self {
        self.config.encoding = Some(encoding.into());
        self
    }

    /// Attaches a comment to parsed roots.
    pub fn root_comment(mut self, comment: impl Into<String>) -> Self {
        self.config.root_comment = Some(comment.into());
        self
    }

    /// Declares the replacement text of a general entity.
    pub fn entity(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.entities.insert(name.into(), value.into());
        self
    }

    /// Binds a prefix for the whole document.
    pub fn prefix_mapping(mut self, prefix: impl Into<String>, uri: impl Into<String>) -> Self {
        self.config.prefix_mappings.insert(prefix.into(), uri.into());
        self
    }

    pub fn error_handler(mut self, handler: Rc<dyn ErrorHandler>) -> Self {
        self.config.error_handler = Some(handler);
        self
    }

    /// Parses a document root from a string. Without an XML declaration
    /// the root encoding is UTF-8.
    pub fn parse_root_str(&self, xml: &str) -> Result<NodeRef> {
        self.parse(strip_bom(xml), true, Some(DEFAULT_ENCODING), None)
    }

    /// Parses a document root from a file.
    pub fn parse_root_file<P: AsRef<Path>>(&self, path: P) -> Result<NodeRef> {
        let path = path.as_ref();
        let bytes = fs::read(path)?;
        let text = decode_input(&bytes);
        self.parse(&text, true, None, Some(path.display().to_string()))
    }

    /// Parses a document root from any reader.
    pub fn parse_root_reader<R: Read>(&self, mut reader: R) -> Result<NodeRef> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        let text = decode_input(&bytes);
        self.parse(&text, true, None, None)
    }

    /// Parses a plain element tree from a string.
    pub fn parse_node_str(&self, xml: &str) -> Result<NodeRef> {
        self.parse(strip_bom(xml), false, None, None)
    }

    /// Parses a plain element tree from a file.
    pub fn parse_node_file<P: AsRef<Path>>(&self, path: P) -> Result<NodeRef> {
        let path = path.as_ref();
        let bytes = fs::read(path)?;
        let text = decode_input(&bytes);
        self.parse(&text, false, None, Some(path.display().to_string()))
    }

    /// Parses a plain element tree from any reader.
    pub fn parse_node_reader<R: Read>(&self, mut reader: R) -> Result<NodeRef> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        let text = decode_input(&bytes);
        self.parse(&text, false, None, None)
    }

    fn parse(
        &self,
        xml: &str,
        as_root: bool,
        default_encoding: Option<&str>,
        system_id: Option<String>,
    ) -> Result<NodeRef> {
        debug!(document = system_id.as_deref().unwrap_or("<string>"), "parsing");
        let session = Session {
            config: &self.config,
            system_id,
        };
        let root = session.run(xml, as_root, default_encoding)?;
        debug!(
            document = session.system_id.as_deref().unwrap_or("<string>"),
            root = %root.borrow().prefixed_name(),
            "parsed"
        );
        Ok(root)
    }
}

/// Parses a document root from a string with default options.
pub fn get_root_node(xml: &str) -> Result<NodeRef> {
    TreeParser::new().parse_root_str(xml)
}

/// Parses a document root from a file with default options.
pub fn get_root_node_file<P: AsRef<Path>>(path: P) -> Result<NodeRef> {
    TreeParser::new().parse_root_file(path)
}

/// Parses a plain element tree from a string with default options.
pub fn get_node(xml: &str) -> Result<NodeRef> {
    TreeParser::new().parse_node_str(xml)
}

/// Parses a plain element tree from a file with default options.
pub fn get_node_file<P: AsRef<Path>>(path: P) -> Result<NodeRef> {
    TreeParser::new().parse_node_file(path)
}

fn strip_bom(xml: &str) -> &str {
    xml.strip_prefix('\u{feff}').unwrap_or(xml)
}

/// Decodes raw input as UTF-8, falling back to Latin-1.
fn decode_input(bytes: &[u8]) -> Cow<'_, str> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    match std::str::from_utf8(bytes) {
        Ok(text) => Cow::Borrowed(text),
        Err(_) => Cow::Owned(bytes.iter().map(|&b| b as char).collect()),
    }
}

/// Maps byte offsets to one-based line numbers, scanning forward only.
struct LineCounter<'a> {
    bytes: &'a [u8],
    offset: usize,
    line: u32,
}

impl<'a> LineCounter<'a> {
    fn new(text: &'a str) -> Self {
        LineCounter {
            bytes: text.as_bytes(),
            offset: 0,
            line: 1,
        }
    }

    fn line_at(&mut self, position: u64) -> u32 {
        let position = usize::try_from(position)
            .unwrap_or(usize::MAX)
            .min(self.bytes.len());
        if position < self.offset {
            self.offset = 0;
            self.line = 1;
        }
        let newlines = self.bytes[self.offset..position]
            .iter()
            .filter(|&&b| b == b'\n')
            .count();
        self.line += u32::try_from(newlines).unwrap_or(u32::MAX);
        self.offset = position;
        self.line
    }
}

/// One parse run: configuration plus diagnostic reporting.
struct Session<'c> {
    config: &'c ParserConfig,
    system_id: Option<String>,
}

impl Session<'_> {
    fn diagnostic(&self, severity: Severity, message: &str, line: u32) -> Diagnostic {
        Diagnostic::new(severity, message)
            .at_line(Some(line))
            .in_document(self.system_id.clone())
    }

    fn report(&self, diagnostic: &Diagnostic) {
        if let Some(handler) = &self.config.error_handler {
            handler.report(diagnostic);
        }
    }

    fn warning(&self, message: &str, line: u32) {
        let diagnostic = self.diagnostic(Severity::Warning, message, line);
        if self.config.has(ParseOptions::SHOW_WARNINGS) {
            warn!("{}", diagnostic);
        }
        self.report(&diagnostic);
    }

    fn error(&self, message: &str, line: u32) {
        let diagnostic = self.diagnostic(Severity::Error, message, line);
        if self.config.has(ParseOptions::SHOW_EXCEPTIONS) {
            error!("{}", diagnostic);
        }
        self.report(&diagnostic);
    }

    /// Reports a fatal error and returns it as an `Error`.
    fn fatal(&self, message: impl Into<String>, line: u32) -> Error {
        let message = message.into();
        let diagnostic = self.diagnostic(Severity::Fatal, &message, line);
        if self.config.has(ParseOptions::SHOW_EXCEPTIONS) {
            error!("{}", diagnostic);
        }
        self.report(&diagnostic);
        Error::ParseAt { line, message }
    }

    fn new_handler(&self, as_root: bool, default_encoding: Option<&str>) -> TreeHandler {
        let config = self.config;
        let mut handler = TreeHandler::new(as_root);
        handler.set_encoding(
            config
                .encoding
                .clone()
                .or_else(|| default_encoding.map(str::to_string)),
        );
        handler.set_comment(config.root_comment.clone());
        handler.set_preserve_space(config.has(ParseOptions::PRESERVE_SPACE));
        handler.set_keep_line_numbers(config.has(ParseOptions::KEEP_LINE_NUMBERS));
        handler.set_keep_prefixes(config.has(ParseOptions::KEEP_PREFIXES));
        handler.set_namespace_aware(config.has(ParseOptions::NAMESPACE_AWARE));
        for (prefix, uri) in &config.prefix_mappings {
            handler.predeclare_prefix(prefix, uri);
        }
        handler
    }

    fn run(&self, xml: &str, as_root: bool, default_encoding: Option<&str>) -> Result<NodeRef> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text_start = false;
        reader.config_mut().trim_text_end = false;
        reader.config_mut().check_comments = self.config.has(ParseOptions::VALIDATING);

        let mut handler = self.new_handler(as_root, default_encoding);
        let mut entities = self.config.entities.clone();
        let mut lines = LineCounter::new(xml);

        loop {
            let event = match reader.read_event() {
                Ok(event) => event,
                Err(e) => {
                    let line = lines.line_at(reader.error_position());
                    return Err(self.fatal(e.to_string(), line));
                }
            };
            match event {
                Event::Decl(decl) => {
                    if self.config.encoding.is_none() {
                        if let Some(Ok(declared)) = decl.encoding() {
                            handler.set_encoding(Some(String::from_utf8_lossy(&declared).into_owned()));
                        }
                    }
                }
                Event::DocType(doctype) => {
                    let text = doctype.decode()?;
                    for (name, value) in internal_entities(&text) {
                        entities.entry(name).or_insert(value);
                    }
                }
                Event::Start(start) => {
                    let line = lines.line_at(reader.buffer_position());
                    self.start_element(&reader, &start, &entities, &mut handler, line)?;
                }
                Event::Empty(start) => {
                    let line = lines.line_at(reader.buffer_position());
                    self.start_element(&reader, &start, &entities, &mut handler, line)?;
                    handler.end_element();
                }
                Event::End(_) => handler.end_element(),
                Event::Text(text) => {
                    let text = text.decode()?;
                    if handler.depth() == 0 && !text.trim().is_empty() {
                        let line = lines.line_at(reader.buffer_position());
                        return Err(self.fatal("content is not allowed outside the root element", line));
                    }
                    handler.characters(&text);
                }
                Event::CData(cdata) => handler.characters(&cdata.decode()?),
                Event::GeneralRef(reference) => {
                    let char_ref = reference
                        .resolve_char_ref()
                        .map_err(|e| self.fatal(e.to_string(), lines.line_at(reader.buffer_position())))?;
                    if let Some(ch) = char_ref {
                        handler.characters(ch.encode_utf8(&mut [0; 4]));
                        continue;
                    }
                    let name = reference.decode()?;
                    match resolve_entity(&name, &entities) {
                        Some(value) => handler.characters(value),
                        None => {
                            let line = lines.line_at(reader.buffer_position());
                            self.error(
                                &format!("entity \"{}\" was referenced, but not declared", name),
                                line,
                            );
                            handler.characters(&format!("&{};", name));
                        }
                    }
                }
                Event::Comment(_) | Event::PI(_) => {}
                Event::Eof => {
                    if handler.depth() > 0 {
                        let line = lines.line_at(reader.buffer_position());
                        return Err(self.fatal("document ended before the root element was closed", line));
                    }
                    break;
                }
            }
        }

        match handler.into_root() {
            Some(root) => Ok(root),
            None => {
                let line = lines.line_at(reader.buffer_position());
                self.report(&self.diagnostic(Severity::Fatal, "document has no root element", line));
                Err(Error::NoRoot)
            }
        }
    }

    fn start_element(
        &self,
        reader: &Reader<&[u8]>,
        start: &BytesStart<'_>,
        entities: &BTreeMap<String, String>,
        handler: &mut TreeHandler,
        line: u32,
    ) -> Result<()> {
        if handler.depth() == 0 && handler.root().is_some() {
            return Err(self.fatal("markup after the root element must be well-formed", line));
        }
        let decoder = reader.decoder();
        let name = decoder.decode(start.name().as_ref())?.into_owned();

        let mut attributes = Vec::new();
        for attr in start.attributes() {
            let attr = attr.map_err(|e| self.fatal(e.to_string(), line))?;
            let key = decoder.decode(attr.key.as_ref())?.into_owned();
            let value = match attr
                .decode_and_unescape_value_with(decoder, |entity| resolve_entity(entity, entities))
            {
                Ok(value) => value.into_owned(),
                Err(e) => {
                    self.error(&format!("attribute \"{}\": {}", key, e), line);
                    decoder.decode(&attr.value)?.into_owned()
                }
            };
            attributes.push((key, value));
        }

        if self.config.has(ParseOptions::NAMESPACE_AWARE) {
            for (key, value) in &attributes {
                if is_xmlns_attr(key) {
                    let prefix = match split_qname(key) {
                        (Some(_), local) => local,
                        (None, _) => "",
                    };
                    handler.start_prefix_mapping(prefix, value);
                }
            }
            let used = std::iter::once(name.as_str())
                .chain(attributes.iter().map(|(key, _)| key.as_str()))
                .filter(|qname| !is_xmlns_attr(qname));
            for qname in used {
                if let (Some(prefix), _) = split_qname(qname) {
                    if !handler.is_prefix_declared(prefix) {
                        let message = format!("the prefix \"{}\" of \"{}\" is not bound", prefix, qname);
                        if self.config.has(ParseOptions::VALIDATING) {
                            return Err(self.fatal(message, line));
                        }
                        self.warning(&message, line);
                    }
                }
            }
        }

        handler.start_element(&name, &attributes, line);
        Ok(())
    }
}

fn resolve_entity<'e>(name: &str, entities: &'e BTreeMap<String, String>) -> Option<&'e str> {
    resolve_predefined_entity(name).or_else(|| entities.get(name).map(String::as_str))
}

/// Extracts `<!ENTITY name "value">` declarations from a DOCTYPE internal
/// subset. Parameter and external entities are ignored.
fn internal_entities(doctype: &str) -> Vec<(String, String)> {
    let mut found = Vec::new();
    let mut rest = doctype;
    while let Some(index) = rest.find("<!ENTITY") {
        rest = rest[index + "<!ENTITY".len()..].trim_start();
        if rest.starts_with('%') {
            continue;
        }
        let name_end = rest
            .find(|c: char| c.is_whitespace())
            .unwrap_or(rest.len());
        let name = &rest[..name_end];
        rest = rest[name_end..].trim_start();
        let Some(quote) = rest.chars().next().filter(|c| *c == '"' || *c == '\'') else {
            continue;
        };
        let body = &rest[1..];
        let Some(value_end) = body.find(quote) else {
            break;
        };
        if !name.is_empty() {
            found.push((name.to_string(), body[..value_end].to_string()));
        }
        rest = &body[value_end + 1..];
    }
    found
}
