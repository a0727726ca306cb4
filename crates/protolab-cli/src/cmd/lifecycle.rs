use crate::output::{print_json, print_lifecycle, running_label};
use anyhow::Context;
use protolab_client::LifecycleApi;
use protolab_core::port::validate_port;
use std::path::Path;

// ---------------------------------------------------------------------------
// start / stop / status
// ---------------------------------------------------------------------------

pub fn start(root: &Path, url: Option<&str>, raw_port: &str, json: bool) -> anyhow::Result<()> {
    let port = validate_port(raw_port)?;
    let client = super::client(root, url)?;
    let result = super::block_on(client.start(port))?
        .with_context(|| format!("start failed for port {port}"))?;
    print_lifecycle(port, &result, json)?;
    if !json {
        println!("Poll with: protolab status {port}  (or protolab watch {port})");
    }
    Ok(())
}

pub fn stop(root: &Path, url: Option<&str>, raw_port: &str, json: bool) -> anyhow::Result<()> {
    let port = validate_port(raw_port)?;
    let client = super::client(root, url)?;
    let result = super::block_on(client.stop(port))?
        .with_context(|| format!("stop failed for port {port}"))?;
    print_lifecycle(port, &result, json)
}

pub fn status(root: &Path, url: Option<&str>, raw_port: &str, json: bool) -> anyhow::Result<()> {
    let port = validate_port(raw_port)?;
    let client = super::client(root, url)?;
    let running = super::block_on(client.status(port))?
        .with_context(|| format!("status check failed for port {port}"))?;
    if json {
        print_json(&serde_json::json!({ "port": port, "running": running }))
    } else {
        println!("[{port}] {}", running_label(running));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// open
// ---------------------------------------------------------------------------

pub fn open(raw_port: &str) -> anyhow::Result<()> {
    let port = validate_port(raw_port)?;
    let url = format!("http://localhost:{port}");
    open::that(&url).with_context(|| format!("failed to open {url}"))?;
    println!("Opened {url}");
    Ok(())
}
