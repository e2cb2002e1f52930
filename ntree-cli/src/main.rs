//! ntree - command line front end for xml-nodetree
//!
//! Re-indents documents, searches elements by name and resolves XInclude
//! elements.

mod logging;

use std::fs;
use std::io::{self, IsTerminal, Write};
use std::path::Path;

use clap::{Parser, Subcommand};
use tracing::{error, info};
use xml_nodetree::xml::{print_with_options, NodeIncluder, PrintOptions, TreeParser};
use xml_nodetree::{search, DEFAULT_INDENTATION};

use crate::logging::{init_logging, LogConfig};

/// XML node tree tool
#[derive(Parser, Debug)]
#[command(name = "ntree")]
#[command(version)]
#[command(about = "Print, search and assemble XML documents", long_about = None)]
struct Cli {
    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Parse a document and print it re-indented
    #[command(visible_alias = "p")]
    Print {
        /// Input file
        file: String,
        /// Output file (default: stdout)
        output: Option<String>,

        /// Spaces per nesting level
        #[arg(short, long, default_value_t = DEFAULT_INDENTATION)]
        indent: usize,

        /// Encoding to declare in the output
        #[arg(short, long)]
        encoding: Option<String>,

        /// Resolve prefixes against namespace declarations
        #[arg(short, long)]
        namespace_aware: bool,

        /// Keep text content as is instead of trimming it
        #[arg(short, long)]
        preserve_space: bool,

        /// Apply stricter well-formedness checks
        #[arg(long)]
        validate: bool,
    },

    /// Print the elements with a given name
    #[command(visible_alias = "s")]
    Search {
        /// Input file
        file: String,
        /// Element name, optionally prefixed
        name: String,

        /// Search the whole tree instead of the root's children only
        #[arg(short, long)]
        deep: bool,

        /// Spaces per nesting level
        #[arg(short, long, default_value_t = DEFAULT_INDENTATION)]
        indent: usize,
    },

    /// Resolve XInclude elements
    #[command(visible_alias = "i")]
    Include {
        /// Input file
        file: String,
        /// Output file (default: stdout)
        output: Option<String>,

        /// Add an "Included File" comment on included elements
        #[arg(short, long)]
        comments: bool,

        /// Also comment elements included by included files
        #[arg(long, requires = "comments")]
        deep_comments: bool,

        /// Drop this prefix binding from included elements (repeatable)
        #[arg(long = "skip-prefix", value_name = "PREFIX")]
        skip_prefixes: Vec<String>,

        /// Drop all prefix bindings from included elements
        #[arg(long)]
        skip_all_prefixes: bool,

        /// Spaces per nesting level
        #[arg(short, long, default_value_t = DEFAULT_INDENTATION)]
        indent: usize,
    },
}

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();
    let config = LogConfig::from_verbosity(cli.verbose).with_ansi(io::stderr().is_terminal());
    init_logging(&config);

    match run(cli.command) {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            std::process::ExitCode::FAILURE
        }
    }
}

fn run(command: Commands) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Commands::Print {
            file,
            output,
            indent,
            encoding,
            namespace_aware,
            preserve_space,
            validate,
        } => {
            let parser = TreeParser::new()
                .namespace_aware(namespace_aware)
                .preserve_space(preserve_space)
                .validating(validate)
                .show_exceptions(true)
                .show_warnings(true);
            let mut options = PrintOptions::with_indentation(indent);
            options.encoding = encoding;
            run_print(&parser, &file, output.as_deref(), options)
        }
        Commands::Search {
            file,
            name,
            deep,
            indent,
        } => run_search(&file, &name, deep, indent, &mut io::stdout().lock()),
        Commands::Include {
            file,
            output,
            comments,
            deep_comments,
            skip_prefixes,
            skip_all_prefixes,
            indent,
        } => {
            let mut includer = NodeIncluder::from_file(&file);
            includer.set_add_comments(comments, deep_comments);
            includer.skip_prefixes(skip_prefixes);
            includer.skip_all_prefixes(skip_all_prefixes);
            includer.set_indentation(indent);
            run_include(&includer, output.as_deref())
        }
    }
}

/// Parses `file` and prints it back.
fn run_print(
    parser: &TreeParser,
    file: &str,
    output: Option<&str>,
    options: PrintOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    info!("Parsing: {}", file);
    let root = parser.parse_root_file(file)?;
    let content = print_with_options(&root, options);
    write_output(&content, output)
}

/// Prints every element named `name`, one after the other.
fn run_search<W: Write>(
    file: &str,
    name: &str,
    deep: bool,
    indent: usize,
    out: &mut W,
) -> Result<(), Box<dyn std::error::Error>> {
    info!("Parsing: {}", file);
    let root = TreeParser::new().show_exceptions(true).parse_node_file(file)?;
    let found = search(&root, name, deep);
    info!("{} element(s) named {}", found.len(), name);
    for node in &found {
        writeln!(out, "{}", print_with_options(node, PrintOptions::with_indentation(indent)))?;
    }
    Ok(())
}

/// Resolves the inclusions of the includer's document.
fn run_include(
    includer: &NodeIncluder,
    output: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    info!(
        "Including into: {}",
        includer.file().map(Path::display).map(|d| d.to_string()).unwrap_or_default()
    );
    match output {
        Some(path) => includer.write(path)?,
        None => write_output(&includer.content()?, None)?,
    }
    Ok(())
}

/// Writes `content` into a file, or on stdout.
fn write_output(content: &str, output: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    match output {
        Some(path) => {
            fs::write(path, content)?;
            info!("Written: {}", path);
        }
        None => {
            let mut stdout = io::stdout().lock();
            writeln!(stdout, "{}", content)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_print_arguments() {
        let cli = Cli::try_parse_from(["ntree", "-v", "print", "in.xml", "out.xml", "--indent", "4", "-n"])
            .unwrap();
        assert_eq!(cli.verbose, 1);
        match cli.command {
            Commands::Print {
                file,
                output,
                indent,
                namespace_aware,
                preserve_space,
                ..
            } => {
                assert_eq!(file, "in.xml");
                assert_eq!(output.as_deref(), Some("out.xml"));
                assert_eq!(indent, 4);
                assert!(namespace_aware);
                assert!(!preserve_space);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_deep_comments_require_comments() {
        assert!(Cli::try_parse_from(["ntree", "include", "in.xml", "--deep-comments"]).is_err());
        let cli = Cli::try_parse_from([
            "ntree",
            "include",
            "in.xml",
            "--comments",
            "--deep-comments",
            "--skip-prefix",
            "a",
            "--skip-prefix",
            "b",
        ])
        .unwrap();
        match cli.command {
            Commands::Include { skip_prefixes, .. } => assert_eq!(skip_prefixes, vec!["a", "b"]),
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_run_print_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.xml");
        let output = dir.path().join("out.xml");
        fs::write(&input, "<root><a>  x  </a></root>").unwrap();

        run_print(
            &TreeParser::new(),
            input.to_str().unwrap(),
            output.to_str(),
            PrintOptions::with_indentation(4),
        )
        .unwrap();
        assert_eq!(fs::read_to_string(&output).unwrap(), "<root>\n    <a>x</a>\n</root>");
    }

    #[test]
    fn test_run_search() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.xml");
        fs::write(&input, r#"<root><item id="1"/><group><item id="2"/></group></root>"#).unwrap();

        let mut out = Vec::new();
        run_search(input.to_str().unwrap(), "item", true, 2, &mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "<item id=\"1\"/>\n<item id=\"2\"/>\n"
        );
    }

    #[test]
    fn test_run_print_reports_missing_file() {
        let result = run_print(
            &TreeParser::new(),
            "does/not/exist.xml",
            None,
            PrintOptions::default(),
        );
        assert!(result.is_err());
    }
}
