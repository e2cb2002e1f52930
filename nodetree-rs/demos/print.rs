//! Example: Re-indent an XML document
//!
//! This example parses a document with namespace awareness and prints it
//! back with the requested indentation.
//!
//! Usage: cargo run --example print <input.xml> [indentation]

use std::env;

use xml_nodetree::{print, TreeParser};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 || args.len() > 3 {
        eprintln!("Usage: {} <input.xml> [indentation]", args[0]);
        std::process::exit(1);
    }

    let indentation = match args.get(2) {
        Some(value) => value.parse()?,
        None => 2,
    };

    eprintln!("Parsing: {}", args[1]);
    let root = TreeParser::new()
        .namespace_aware(true)
        .show_exceptions(true)
        .parse_root_file(&args[1])?;

    println!("{}", print(&root, indentation));
    Ok(())
}
