use anyhow::Context;
use protolab_core::config::Config;
use std::path::Path;

pub fn run(
    root: &Path,
    host: Option<String>,
    port: Option<u16>,
    open_browser: bool,
) -> anyhow::Result<()> {
    let mut config = Config::load(root).context("failed to load config")?;
    if let Some(host) = host {
        config.server.host = host;
    }
    let port = port.unwrap_or(config.server.port);
    let root_buf = root.to_path_buf();

    if !config.server.is_loopback() {
        eprintln!(
            "warning: binding {}; any host that can reach it can start and stop processes",
            config.server.host
        );
    }

    super::block_on(async move {
        let listener = protolab_server::bind(&config.server.host, port).await?;
        let actual_port = listener.local_addr()?.port();
        let url = format!("http://localhost:{actual_port}");

        println!("protolab controller for {} → {url}", root_buf.display());

        if open_browser {
            let list_url = format!("{url}/prototypes");
            if let Err(e) = open::that(&list_url) {
                tracing::warn!(error = %e, "could not open browser");
            }
        }

        tokio::select! {
            res = protolab_server::serve_on(root_buf, listener) => res,
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutting down");
                Ok(())
            }
        }
    })?
}
