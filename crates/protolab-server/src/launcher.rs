use protolab_core::config::LauncherConfig;
use protolab_core::error::{ProtolabError, Result};
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

/// Starts a prototype's own dev server and forgets about it.
///
/// The child is detached from the controller (own process group on Unix,
/// detached console on Windows, null stdio) and its handle is dropped before
/// the request returns. Tokio reaps the exit status in the background without
/// killing the process. Liveness is only ever learned from the port.
#[derive(Debug, Clone)]
pub struct Launcher {
    program: String,
    args: Vec<String>,
    grace: Duration,
}

impl Launcher {
    pub fn new(program: impl Into<String>, args: Vec<String>, grace: Duration) -> Self {
        Self {
            program: program.into(),
            args,
            grace,
        }
    }

    pub fn from_config(cfg: &LauncherConfig) -> Self {
        Self::new(cfg.program.clone(), cfg.args.clone(), cfg.spawn_grace())
    }

    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Spawn the dev server in `directory` with `PORT=<port>` in its
    /// environment, then wait out the grace period.
    ///
    /// Returns `SpawnFailed` when the OS refuses the spawn, or when the child
    /// has already exited unsuccessfully by the end of the grace period.
    /// `Ok` means "spawned", not "listening".
    pub async fn launch(&self, directory: &Path, port: u16) -> Result<()> {
        let mut std_cmd = std::process::Command::new(&self.program);
        std_cmd
            .args(&self.args)
            .current_dir(directory)
            .env("PORT", port.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        detach(&mut std_cmd);

        let mut cmd = tokio::process::Command::from(std_cmd);
        cmd.kill_on_drop(false);

        let mut child = cmd.spawn().map_err(|e| {
            ProtolabError::SpawnFailed(format!("'{}': {e}", self.command_line()))
        })?;

        tracing::info!(
            port,
            pid = child.id(),
            dir = %directory.display(),
            command = %self.command_line(),
            "spawned prototype dev server"
        );

        tokio::time::sleep(self.grace).await;

        match child.try_wait() {
            Ok(Some(status)) if !status.success() => Err(ProtolabError::SpawnFailed(format!(
                "'{}' exited during startup ({status})",
                self.command_line()
            ))),
            Ok(_) => Ok(()),
            Err(e) => {
                tracing::warn!(port, error = %e, "could not poll spawned dev server");
                Ok(())
            }
        }
    }
}

#[cfg(unix)]
fn detach(cmd: &mut std::process::Command) {
    use std::os::unix::process::CommandExt;
    // New process group: a Ctrl-C aimed at the controller must not reach the
    // dev server.
    cmd.process_group(0);
}

#[cfg(windows)]
fn detach(cmd: &mut std::process::Command) {
    use std::os::windows::process::CommandExt;
    const DETACHED_PROCESS: u32 = 0x0000_0008;
    const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;
    cmd.creation_flags(DETACHED_PROCESS | CREATE_NEW_PROCESS_GROUP);
}

#[cfg(not(any(unix, windows)))]
fn detach(_cmd: &mut std::process::Command) {}
