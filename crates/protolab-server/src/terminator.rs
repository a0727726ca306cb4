use protolab_core::error::{ProtolabError, Result};
use std::process::Command;
use std::sync::Arc;

// ---------------------------------------------------------------------------
// KillOutcome
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KillOutcome {
    Killed { pid: u32 },
    /// Nothing was bound to the port. A legitimate stop result, not an error.
    NoProcess,
}

// ---------------------------------------------------------------------------
// ProcessTerminator
// ---------------------------------------------------------------------------

/// Port → pid → forced kill, for whatever process the OS reports first.
///
/// Implementations shell out to blocking OS tools; call them from
/// `spawn_blocking`.
pub trait ProcessTerminator: Send + Sync {
    fn name(&self) -> &'static str;

    fn find_pid(&self, port: u16) -> Result<Option<u32>>;

    fn kill_pid(&self, pid: u32) -> Result<()>;

    fn kill_by_port(&self, port: u16) -> Result<KillOutcome> {
        let Some(pid) = self.find_pid(port)? else {
            return Ok(KillOutcome::NoProcess);
        };
        if pid == std::process::id() {
            return Err(ProtolabError::CommandFailed(format!(
                "port {port} belongs to the controller itself (pid {pid})"
            )));
        }
        self.kill_pid(pid)?;
        Ok(KillOutcome::Killed { pid })
    }
}

/// Pick the terminator for this host once, at startup.
pub fn select_terminator() -> Arc<dyn ProcessTerminator> {
    if cfg!(windows) {
        return Arc::new(NetstatTerminator);
    }
    match which::which("lsof") {
        Ok(path) => {
            tracing::debug!(lsof = %path.display(), "using lsof for port → pid lookup");
            Arc::new(LsofTerminator)
        }
        Err(_) => {
            tracing::warn!("lsof not found; stop requests will fail until it is installed");
            Arc::new(UnsupportedTerminator {
                reason: "lsof is not installed",
            })
        }
    }
}

// ---------------------------------------------------------------------------
// POSIX: lsof + kill -9
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default)]
pub struct LsofTerminator;

impl ProcessTerminator for LsofTerminator {
    fn name(&self) -> &'static str {
        "lsof"
    }

    fn find_pid(&self, port: u16) -> Result<Option<u32>> {
        let output = Command::new("lsof")
            .args(["-nP", "-t", &format!("-iTCP:{port}"), "-sTCP:LISTEN"])
            .output()
            .map_err(|e| ProtolabError::CommandFailed(format!("failed to run lsof: {e}")))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        if let Some(pid) = parse_lsof_pids(&stdout).first() {
            return Ok(Some(*pid));
        }
        // lsof exits 1 when nothing matches.
        if output.status.success() || output.status.code() == Some(1) {
            return Ok(None);
        }
        Err(ProtolabError::CommandFailed(format!(
            "lsof exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )))
    }

    fn kill_pid(&self, pid: u32) -> Result<()> {
        let output = Command::new("kill")
            .args(["-9", &pid.to_string()])
            .output()
            .map_err(|e| ProtolabError::CommandFailed(format!("failed to run kill: {e}")))?;
        if !output.status.success() {
            return Err(ProtolabError::CommandFailed(format!(
                "kill -9 {pid} failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(())
    }
}

/// Pids from `lsof -t` output, one per line, in reported order.
pub fn parse_lsof_pids(stdout: &str) -> Vec<u32> {
    stdout
        .lines()
        .filter_map(|l| l.trim().parse::<u32>().ok())
        .collect()
}

// ---------------------------------------------------------------------------
// Windows: netstat -ano + taskkill /F
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default)]
pub struct NetstatTerminator;

impl ProcessTerminator for NetstatTerminator {
    fn name(&self) -> &'static str {
        "netstat"
    }

    fn find_pid(&self, port: u16) -> Result<Option<u32>> {
        // No `-p TCP`: that filter hides the TCPv6 rows of `[::1]` listeners.
        let output = Command::new("netstat")
            .arg("-ano")
            .output()
            .map_err(|e| ProtolabError::CommandFailed(format!("failed to run netstat: {e}")))?;
        if !output.status.success() {
            return Err(ProtolabError::CommandFailed(format!(
                "netstat exited with {}",
                output.status
            )));
        }
        Ok(parse_netstat_pid(
            &String::from_utf8_lossy(&output.stdout),
            port,
        ))
    }

    fn kill_pid(&self, pid: u32) -> Result<()> {
        let output = Command::new("taskkill")
            .args(["/F", "/PID", &pid.to_string()])
            .output()
            .map_err(|e| ProtolabError::CommandFailed(format!("failed to run taskkill: {e}")))?;
        if !output.status.success() {
            return Err(ProtolabError::CommandFailed(format!(
                "taskkill /F /PID {pid} failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(())
    }
}

/// Pid (last column) of the first connection whose *local* address is on
/// `port`. Listening rows win over established ones; the state column is
/// localized on some Windows installs, so any local match is the fallback.
pub fn parse_netstat_pid(stdout: &str, port: u16) -> Option<u32> {
    let suffix = format!(":{port}");
    let mut fallback = None;

    for line in stdout.lines() {
        let cols: Vec<&str> = line.split_whitespace().collect();
        if cols.len() < 4 || !cols[0].eq_ignore_ascii_case("tcp") {
            continue;
        }
        if !cols[1].ends_with(&suffix) {
            continue;
        }
        let Some(pid) = cols.last().and_then(|c| c.parse::<u32>().ok()) else {
            continue;
        };
        if cols.iter().any(|c| c.eq_ignore_ascii_case("LISTENING")) {
            return Some(pid);
        }
        fallback.get_or_insert(pid);
    }
    fallback
}

// ---------------------------------------------------------------------------
// No usable tool
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
pub struct UnsupportedTerminator {
    reason: &'static str,
}

impl ProcessTerminator for UnsupportedTerminator {
    fn name(&self) -> &'static str {
        "unsupported"
    }

    fn find_pid(&self, _port: u16) -> Result<Option<u32>> {
        Err(ProtolabError::CommandFailed(self.reason.to_string()))
    }

    fn kill_pid(&self, _pid: u32) -> Result<()> {
        Err(ProtolabError::CommandFailed(self.reason.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn lsof_output_keeps_order_and_skips_noise() {
        assert_eq!(parse_lsof_pids("4242\n4243\n"), vec![4242, 4243]);
        assert_eq!(parse_lsof_pids(""), Vec::<u32>::new());
        assert_eq!(parse_lsof_pids("lsof: WARNING\n  77 \n"), vec![77]);
    }

    const NETSTAT: &str = "
Active Connections

  Proto  Local Address          Foreign Address        State           PID
  TCP    0.0.0.0:135            0.0.0.0:0              LISTENING       1024
  TCP    127.0.0.1:40210        0.0.0.0:0              LISTENING       5555
  TCP    127.0.0.1:51000        127.0.0.1:4021         ESTABLISHED     6666
  TCP    127.0.0.1:4021         127.0.0.1:51000        ESTABLISHED     7777
  TCP    [::]:4021              [::]:0                 LISTENING       8888
";

    #[test]
    fn netstat_matches_local_port_exactly() {
        // :40210 and the foreign :4021 column must not match.
        assert_eq!(parse_netstat_pid(NETSTAT, 4021), Some(8888));
        assert_eq!(parse_netstat_pid(NETSTAT, 40210), Some(5555));
        assert_eq!(parse_netstat_pid(NETSTAT, 9999), None);
    }

    #[test]
    fn netstat_falls_back_to_non_listening_row() {
        let localized = "  TCP    127.0.0.1:4021   0.0.0.0:0   ABHÖREN   4321\n";
        assert_eq!(parse_netstat_pid(localized, 4021), Some(4321));
    }

    #[test]
    fn netstat_finds_ipv6_only_listener() {
        let table = "
  Proto  Local Address          Foreign Address        State           PID
  TCP    0.0.0.0:135            0.0.0.0:0              LISTENING       1024
  TCP    [::1]:4021             [::]:0                 LISTENING       9191
  UDP    [::1]:4021             *:*                                    3030
";
        assert_eq!(parse_netstat_pid(table, 4021), Some(9191));
    }

    #[test]
    fn netstat_ignores_udp_rows() {
        let table = "  UDP    0.0.0.0:4021           *:*                                    3030\n";
        assert_eq!(parse_netstat_pid(table, 4021), None);
    }

    struct Scripted {
        pid: Option<u32>,
        killed: Mutex<Vec<u32>>,
    }

    impl ProcessTerminator for Scripted {
        fn name(&self) -> &'static str {
            "scripted"
        }
        fn find_pid(&self, _port: u16) -> Result<Option<u32>> {
            Ok(self.pid)
        }
        fn kill_pid(&self, pid: u32) -> Result<()> {
            self.killed.lock().unwrap().push(pid);
            Ok(())
        }
    }

    #[test]
    fn kill_by_port_targets_first_pid() {
        let t = Scripted {
            pid: Some(4242),
            killed: Mutex::new(vec![]),
        };
        assert_eq!(t.kill_by_port(4021).unwrap(), KillOutcome::Killed { pid: 4242 });
        assert_eq!(*t.killed.lock().unwrap(), vec![4242]);
    }

    #[test]
    fn kill_by_port_without_pid_is_no_process() {
        let t = Scripted {
            pid: None,
            killed: Mutex::new(vec![]),
        };
        assert_eq!(t.kill_by_port(4021).unwrap(), KillOutcome::NoProcess);
        assert!(t.killed.lock().unwrap().is_empty());
    }

    #[test]
    fn kill_by_port_refuses_own_pid() {
        let t = Scripted {
            pid: Some(std::process::id()),
            killed: Mutex::new(vec![]),
        };
        assert!(matches!(
            t.kill_by_port(3141),
            Err(ProtolabError::CommandFailed(_))
        ));
        assert!(t.killed.lock().unwrap().is_empty());
    }

    #[test]
    fn unsupported_terminator_always_errors() {
        let t = UnsupportedTerminator {
            reason: "lsof is not installed",
        };
        assert!(t.kill_by_port(4021).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn lsof_reports_nothing_on_unused_port() {
        if which::which("lsof").is_err() {
            return;
        }
        let port = {
            let l = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            l.local_addr().unwrap().port()
        };
        assert_eq!(LsofTerminator.find_pid(port).unwrap(), None);
    }
}
