use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtolabError {
    #[error("invalid port '{0}': must be an integer between 1 and 65535")]
    InvalidPort(String),

    #[error("no prototype registered on port {0}")]
    PrototypeNotFound(u16),

    #[error("prototype directory not found: {}", .0.display())]
    DirectoryMissing(PathBuf),

    #[error("project descriptor not found: {}", .0.display())]
    DescriptorMissing(PathBuf),

    #[error("invalid prototype id '{0}': must be lowercase alphanumeric with hyphens")]
    InvalidId(String),

    #[error("prototype already exists: {0}")]
    PrototypeExists(String),

    #[error("a start for port {0} is already in progress")]
    StartInProgress(u16),

    #[error("port {0} is already in use")]
    PortInUse(u16),

    #[error("failed to start dev server: {0}")]
    SpawnFailed(String),

    #[error("process command failed: {0}")]
    CommandFailed(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ProtolabError>;
