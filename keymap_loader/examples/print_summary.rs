use std::path::PathBuf;

use clap::Parser;
use keymap_compiler::generators::effective_mappings;

#[derive(Debug, Parser)]
struct Args {
    path: PathBuf,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let collections = keymap_loader::load_collections_from_path(args.path)?;
    for c in &collections {
        println!(
            "{}\tlayer={}\tenabled={}\tmappings={}",
            c.name,
            c.target_layer,
            c.is_enabled,
            effective_mappings(c).len()
        );
    }
    Ok(())
}
