use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const MSG_SERVER_STARTING: &str = "Server starting";
pub const MSG_SERVER_STOPPED: &str = "Server stopped";
pub const MSG_NO_PROCESS: &str = "No process found on this port";

// ---------------------------------------------------------------------------
// LifecycleResult
// ---------------------------------------------------------------------------

/// Body of a start/stop exchange. Lives for one HTTP round trip only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleResult {
    #[serde(default)]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub running: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

impl LifecycleResult {
    pub fn starting(port: u16) -> Self {
        Self::outcome(true, MSG_SERVER_STARTING, port)
    }

    pub fn stopped(port: u16) -> Self {
        Self::outcome(true, MSG_SERVER_STOPPED, port)
    }

    pub fn no_process(port: u16) -> Self {
        Self::outcome(false, MSG_NO_PROCESS, port)
    }

    fn outcome(success: bool, message: &str, port: u16) -> Self {
        Self {
            success,
            running: None,
            message: Some(message.to_string()),
            error: None,
            port: Some(port),
        }
    }
}

// ---------------------------------------------------------------------------
// StatusReport
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReport {
    pub running: bool,
}

// ---------------------------------------------------------------------------
// PrototypeStatus
// ---------------------------------------------------------------------------

/// One row of `GET /prototypes`: the registry record plus live liveness.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrototypeStatus {
    pub id: String,
    pub port: u16,
    pub directory_path: PathBuf,
    pub running: bool,
}
