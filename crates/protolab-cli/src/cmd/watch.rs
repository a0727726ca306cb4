use crate::output::{print_json, running_label};
use anyhow::{bail, Context};
use protolab_client::{PollState, PollView, PollerHandle, PollerSettings};
use protolab_core::config::Config;
use protolab_core::port::validate_port;
use std::path::Path;
use std::sync::Arc;

pub fn run(
    root: &Path,
    url: Option<&str>,
    raw_port: &str,
    start: bool,
    json: bool,
) -> anyhow::Result<()> {
    let port = validate_port(raw_port)?;
    let config = Config::load(root).context("failed to load config")?;
    let settings = PollerSettings::from(&config.poller);
    let client = Arc::new(super::client(root, url)?);

    super::block_on(async move {
        // The controller's registry decides whether there is anything to run.
        let prototypes = client
            .list()
            .await
            .with_context(|| format!("failed to reach controller at {}", client.base_url()))?;
        let Some(proto) = prototypes.iter().find(|p| p.port == port) else {
            bail!("no prototype registered on port {port}");
        };
        if !json {
            println!("Watching '{}' on port {port} (Ctrl-C to quit)", proto.id);
        }

        let poller = PollerHandle::mount(client.clone(), settings, Some(port), true);
        let mut views = poller.subscribe();
        if start {
            poller.start().await;
        }

        let mut last: Option<PollView> = None;
        loop {
            let view = views.borrow_and_update().clone();
            if last.as_ref().map_or(true, |prev| is_new(prev, &view)) {
                print_view(&view, json)?;
                last = Some(view);
            }
            tokio::select! {
                changed = views.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = tokio::signal::ctrl_c() => break,
            }
        }

        poller.dispose().await;
        Ok::<(), anyhow::Error>(())
    })?
}

/// Ticks that confirm the same state are not worth a line.
fn is_new(prev: &PollView, next: &PollView) -> bool {
    prev.state != next.state || prev.is_running != next.is_running || prev.message != next.message
}

fn describe(view: &PollView) -> String {
    match view.state {
        PollState::Idle => "idle".to_string(),
        PollState::Checking => "checking".to_string(),
        PollState::Starting => "starting".to_string(),
        PollState::StartingFast { attempts } => format!("waiting for listener ({attempts})"),
        PollState::Stopping => "stopping".to_string(),
        PollState::Unknown => "unknown (status unavailable)".to_string(),
        PollState::Running | PollState::Stopped => {
            running_label(view.state == PollState::Running).to_string()
        }
    }
}

fn print_view(view: &PollView, json: bool) -> anyhow::Result<()> {
    if json {
        return print_json(&serde_json::json!({
            "state": describe(view),
            "port": view.port,
            "is_running": view.is_running,
            "is_loading": view.is_loading,
            "is_checking": view.is_checking,
            "message": view.message,
            "last_checked_at": view.last_checked_at,
        }));
    }
    let now = chrono::Local::now().format("%H:%M:%S");
    match &view.message {
        Some(msg) => println!("{now}  {}  ({msg})", describe(view)),
        None => println!("{now}  {}", describe(view)),
    }
    Ok(())
}
