use protolab_core::config::GuardConfig;
use protolab_core::error::{ProtolabError, Result};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// In-process collision guard for concurrent starts on the same port.
///
/// Only a fast path: the OS port table stays authoritative, claims expire on
/// their own, and a restarted controller starts with an empty map.
#[derive(Debug)]
pub struct StartGuard {
    enabled: bool,
    window: Duration,
    claims: Mutex<HashMap<u16, Instant>>,
}

impl StartGuard {
    pub fn new(enabled: bool, window: Duration) -> Self {
        Self {
            enabled,
            window,
            claims: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_config(cfg: &GuardConfig) -> Self {
        Self::new(cfg.enabled, cfg.window())
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Record a start for `port`, or fail with `StartInProgress` when another
    /// start claimed it less than `window` ago. Always succeeds when disabled.
    pub fn claim(&self, port: u16) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        let now = Instant::now();
        let mut claims = self.claims.lock().unwrap_or_else(|e| e.into_inner());
        claims.retain(|_, at| now.duration_since(*at) < self.window);
        if claims.contains_key(&port) {
            return Err(ProtolabError::StartInProgress(port));
        }
        claims.insert(port, now);
        Ok(())
    }

    pub fn release(&self, port: u16) {
        if !self.enabled {
            return;
        }
        self.claims
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&port);
    }
}
