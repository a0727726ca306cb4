use anyhow::Context;
use protolab_core::{config::Config, io, paths, registry::PrototypeFile};
use std::path::Path;

pub fn run(root: &Path) -> anyhow::Result<()> {
    println!("Initializing protolab in: {}", root.display());

    let dir = paths::protolab_dir(root);
    io::ensure_dir(&dir).with_context(|| format!("failed to create {}", dir.display()))?;

    if paths::config_path(root).exists() {
        println!("  exists:  {}", paths::CONFIG_FILE);
    } else {
        Config::new()
            .save(root)
            .context("failed to write config.yaml")?;
        println!("  created: {}", paths::CONFIG_FILE);
    }

    if paths::prototypes_path(root).exists() {
        println!("  exists:  {}", paths::PROTOTYPES_FILE);
    } else {
        PrototypeFile::default()
            .save(root)
            .context("failed to write prototypes.yaml")?;
        println!("  created: {}", paths::PROTOTYPES_FILE);
    }

    println!("\nNext: protolab prototype add <id> --port <port> --dir <path>");
    Ok(())
}
