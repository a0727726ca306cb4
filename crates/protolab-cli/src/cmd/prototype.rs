use crate::output::{print_json, print_table, running_label};
use anyhow::{bail, Context};
use clap::Subcommand;
use protolab_core::port::validate_port;
use protolab_core::registry::{FileRegistry, PrototypeFile, PrototypeRegistry};
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Subcommand types
// ---------------------------------------------------------------------------

#[derive(Subcommand)]
pub enum PrototypeSubcommand {
    /// List registered prototypes
    List {
        /// Ask the running controller for live status as well
        #[arg(long)]
        live: bool,
    },

    /// Register a prototype directory on a port
    Add {
        /// Prototype id (lowercase slug)
        id: String,
        /// Port the dev server listens on
        #[arg(long)]
        port: String,
        /// Prototype directory (relative paths resolve against the project root)
        #[arg(long)]
        dir: PathBuf,
    },

    /// Remove a prototype from the registry
    Remove { id: String },
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub fn run(
    root: &Path,
    url: Option<&str>,
    subcmd: PrototypeSubcommand,
    json: bool,
) -> anyhow::Result<()> {
    match subcmd {
        PrototypeSubcommand::List { live: false } => list(root, json),
        PrototypeSubcommand::List { live: true } => list_live(root, url, json),
        PrototypeSubcommand::Add { id, port, dir } => add(root, &id, &port, dir, json),
        PrototypeSubcommand::Remove { id } => remove(root, &id, json),
    }
}

// ---------------------------------------------------------------------------
// list
// ---------------------------------------------------------------------------

fn list(root: &Path, json: bool) -> anyhow::Result<()> {
    let records = FileRegistry::new(root)
        .list()
        .context("failed to read prototype registry")?;

    if json {
        return print_json(&records);
    }
    if records.is_empty() {
        println!("No prototypes.");
        return Ok(());
    }

    let rows = records
        .iter()
        .map(|r| {
            vec![
                r.id.clone(),
                r.port.to_string(),
                r.directory_path.display().to_string(),
            ]
        })
        .collect();
    print_table(&["ID", "PORT", "DIRECTORY"], rows);
    Ok(())
}

fn list_live(root: &Path, url: Option<&str>, json: bool) -> anyhow::Result<()> {
    let client = super::client(root, url)?;
    let rows = super::block_on(client.list())?
        .with_context(|| format!("failed to reach controller at {}", client.base_url()))?;

    if json {
        return print_json(&rows);
    }
    if rows.is_empty() {
        println!("No prototypes.");
        return Ok(());
    }

    let table = rows
        .iter()
        .map(|p| {
            vec![
                p.id.clone(),
                p.port.to_string(),
                running_label(p.running).to_string(),
                p.directory_path.display().to_string(),
            ]
        })
        .collect();
    print_table(&["ID", "PORT", "STATUS", "DIRECTORY"], table);
    Ok(())
}

// ---------------------------------------------------------------------------
// add / remove
// ---------------------------------------------------------------------------

fn add(root: &Path, id: &str, raw_port: &str, dir: PathBuf, json: bool) -> anyhow::Result<()> {
    let port = validate_port(raw_port)?;
    let mut file = PrototypeFile::load(root).context("failed to read prototype registry")?;

    if let Some(other) = file.prototypes.iter().find(|r| r.port == port) {
        eprintln!("warning: port {port} is already used by '{}'", other.id);
    }
    let resolved = protolab_core::paths::resolve_directory(root, &dir);
    if !resolved.is_dir() {
        eprintln!("warning: directory does not exist yet: {}", resolved.display());
    }

    file.add(id, port, dir)?;
    file.save(root).context("failed to write prototype registry")?;

    if json {
        print_json(&serde_json::json!({ "id": id, "port": port, "added": true }))
    } else {
        println!("Added '{id}' on port {port}");
        Ok(())
    }
}

fn remove(root: &Path, id: &str, json: bool) -> anyhow::Result<()> {
    let mut file = PrototypeFile::load(root).context("failed to read prototype registry")?;
    if !file.remove(id) {
        bail!("prototype not found: {id}");
    }
    file.save(root).context("failed to write prototype registry")?;

    if json {
        print_json(&serde_json::json!({ "id": id, "removed": true }))
    } else {
        println!("Removed '{id}'");
        Ok(())
    }
}
