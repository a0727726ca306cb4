use protolab_core::config::ProbeConfig;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;

/// Answers "is anything listening on this port right now?" with a bounded
/// loopback connect. Who owns the listener does not matter.
#[derive(Debug, Clone)]
pub struct PortProber {
    host: String,
    timeout: Duration,
}

impl PortProber {
    pub fn new(host: impl Into<String>, timeout: Duration) -> Self {
        Self {
            host: host.into(),
            timeout,
        }
    }

    pub fn from_config(cfg: &ProbeConfig) -> Self {
        Self::new(cfg.host.clone(), cfg.timeout())
    }

    /// Refused, unreachable, unresolvable and timed-out probes all read as
    /// `false`; the answer is always a definite boolean.
    pub async fn is_listening(&self, port: u16) -> bool {
        match timeout(self.timeout, TcpStream::connect((self.host.as_str(), port))).await {
            Ok(Ok(_stream)) => true,
            Ok(Err(e)) => {
                tracing::debug!(port, error = %e, "probe: nothing accepting connections");
                false
            }
            Err(_) => {
                tracing::debug!(port, timeout_ms = self.timeout.as_millis() as u64, "probe: timed out");
                false
            }
        }
    }
}
