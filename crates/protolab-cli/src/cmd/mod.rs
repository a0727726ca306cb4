pub mod config;
pub mod init;
pub mod lifecycle;
pub mod prototype;
pub mod serve;
pub mod watch;

use anyhow::Context;
use protolab_client::HttpLifecycleClient;
use protolab_core::config::Config;
use std::future::Future;
use std::path::Path;

/// Run one async command to completion on a fresh runtime.
pub(crate) fn block_on<F: Future>(fut: F) -> anyhow::Result<F::Output> {
    let rt = tokio::runtime::Runtime::new().context("failed to start tokio runtime")?;
    Ok(rt.block_on(fut))
}

/// `--url` / `PROTOLAB_URL`, else the local controller on `server.port`.
pub(crate) fn controller_url(root: &Path, explicit: Option<&str>) -> anyhow::Result<String> {
    if let Some(url) = explicit {
        return Ok(url.to_string());
    }
    let config = Config::load(root).context("failed to load config")?;
    Ok(format!("http://localhost:{}", config.server.port))
}

pub(crate) fn client(root: &Path, explicit: Option<&str>) -> anyhow::Result<HttpLifecycleClient> {
    let url = controller_url(root, explicit)?;
    HttpLifecycleClient::new(&url).with_context(|| format!("invalid controller url: {url}"))
}
