//! XML parsing and output.
//!
//! This module turns XML text into [`XmlNode`](crate::node::XmlNode) trees
//! and back, and hosts the tree transformations built on both directions
//! (inclusion and attribute replacement).

pub mod bound_prefix;
mod handler;
mod include;
mod parser;
pub mod printer;
mod replace;

pub use bound_prefix::BoundPrefix;
pub use handler::TreeHandler;
pub use include::NodeIncluder;
pub use parser::{get_node, get_node_file, get_root_node, get_root_node_file, TreeParser};
pub use printer::{
    print, print_to_file, print_to_writer, print_with_encoding, print_with_options, XmlPrinter,
};
pub use replace::{NodePath, PathStep, TreeReplacer};

use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use bitflags::bitflags;

use crate::constants::DEFAULT_INDENTATION;

bitflags! {
    /// Parser behavior switches.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ParseOptions: u8 {
        /// Log parse failures.
        const SHOW_EXCEPTIONS = 1;
        /// Log parser warnings.
        const SHOW_WARNINGS = 2;
        /// Keep text content as is instead of trimming it.
        const PRESERVE_SPACE = 4;
        /// Record the source line of each element.
        const KEEP_LINE_NUMBERS = 8;
        /// Resolve prefixes against namespace declarations.
        const NAMESPACE_AWARE = 16;
        /// Keep namespace declarations as attributes too.
        const KEEP_PREFIXES = 32;
        /// Apply stricter well-formedness checks.
        const VALIDATING = 64;
    }
}

impl Default for ParseOptions {
    fn default() -> Self {
        ParseOptions::empty()
    }
}

/// Severity of a parser diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => f.write_str("warning"),
            Severity::Error => f.write_str("error"),
            Severity::Fatal => f.write_str("fatal error"),
        }
    }
}

/// A problem reported while parsing or including documents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    /// One-based source line, when known.
    pub line: Option<u32>,
    /// Path or name of the document, when known.
    pub system_id: Option<String>,
}

impl Diagnostic {
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Diagnostic {
            severity,
            message: message.into(),
            line: None,
            system_id: None,
        }
    }

    pub fn at_line(mut self, line: Option<u32>) -> Self {
        self.line = line;
        self
    }

    pub fn in_document(mut self, system_id: Option<String>) -> Self {
        self.system_id = system_id;
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.severity)?;
        if let Some(id) = &self.system_id {
            write!(f, " in {}", id)?;
        }
        if let Some(line) = self.line {
            write!(f, " at line {}", line)?;
        }
        write!(f, ": {}", self.message)
    }
}

/// Receives diagnostics. Every method does nothing by default.
pub trait ErrorHandler {
    fn warning(&self, _diagnostic: &Diagnostic) {}

    fn error(&self, _diagnostic: &Diagnostic) {}

    fn fatal_error(&self, _diagnostic: &Diagnostic) {}

    /// Dispatches on the diagnostic severity.
    fn report(&self, diagnostic: &Diagnostic) {
        match diagnostic.severity {
            Severity::Warning => self.warning(diagnostic),
            Severity::Error => self.error(diagnostic),
            Severity::Fatal => self.fatal_error(diagnostic),
        }
    }
}

/// Parser configuration.
#[derive(Clone, Default)]
pub struct ParserConfig {
    pub options: ParseOptions,
    /// Encoding recorded on parsed roots instead of the declared one.
    pub encoding: Option<String>,
    /// Comment attached to the parsed root.
    pub root_comment: Option<String>,
    /// Replacement text of custom general entities, by entity name.
    pub entities: BTreeMap<String, String>,
    /// Prefixes known before the document declares any, prefix -> URI.
    pub prefix_mappings: BTreeMap<String, String>,
    pub error_handler: Option<Rc<dyn ErrorHandler>>,
}

impl ParserConfig {
    /// Returns true if all the given options are set.
    pub fn has(&self, options: ParseOptions) -> bool {
        self.options.contains(options)
    }
}

impl fmt::Debug for ParserConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParserConfig")
            .field("options", &self.options)
            .field("encoding", &self.encoding)
            .field("root_comment", &self.root_comment)
            .field("entities", &self.entities)
            .field("prefix_mappings", &self.prefix_mappings)
            .field("error_handler", &self.error_handler.is_some())
            .finish()
    }
}

/// Options for XML printing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrintOptions {
    /// Number of spaces per nesting level.
    pub indentation: usize,
    /// Encoding to declare, overriding the encoding of the root.
    pub encoding: Option<String>,
    /// Whether to write the XML declaration when an encoding is known.
    pub declaration: bool,
}

impl Default for PrintOptions {
    fn default() -> Self {
        PrintOptions {
            indentation: DEFAULT_INDENTATION,
            encoding: None,
            declaration: true,
        }
    }
}

impl PrintOptions {
    /// Default options with the given indentation.
    pub fn with_indentation(indentation: usize) -> Self {
        PrintOptions {
            indentation,
            ..Default::default()
        }
    }

    /// Sets the declared encoding, builder style.
    pub fn encoding(mut self, encoding: impl Into<String>) -> Self {
        self.encoding = Some(encoding.into());
        self
    }

    /// Disables the XML declaration, builder style.
    pub fn without_declaration(mut self) -> Self {
        self.declaration = false;
        self
    }
}
