//! Example: Resolve XInclude elements
//!
//! This example replaces every `xi:include` element of a document by the
//! file it references and writes the result.
//!
//! Usage: cargo run --example include <input.xml> <output.xml>

use std::env;

use xml_nodetree::NodeIncluder;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    if args.len() != 3 {
        eprintln!("Usage: {} <input.xml> <output.xml>", args[0]);
        std::process::exit(1);
    }

    let mut includer = NodeIncluder::from_file(&args[1]);
    includer.set_add_comments(true, false);

    eprintln!("Including into: {}", args[1]);
    includer.write(&args[2])?;
    eprintln!("Written: {}", args[2]);
    Ok(())
}
