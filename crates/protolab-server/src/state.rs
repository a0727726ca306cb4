use crate::guard::StartGuard;
use crate::launcher::Launcher;
use crate::probe::PortProber;
use crate::terminator::{select_terminator, ProcessTerminator};
use protolab_core::config::Config;
use protolab_core::registry::{FileRegistry, PrototypeRegistry};
use std::path::PathBuf;
use std::sync::Arc;

/// Shared application state passed to all route handlers.
///
/// Nothing in here tracks running servers; every handler asks the OS.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub registry: Arc<dyn PrototypeRegistry>,
    pub terminator: Arc<dyn ProcessTerminator>,
    pub launcher: Launcher,
    pub prober: PortProber,
    pub guard: Arc<StartGuard>,
}

impl AppState {
    /// Load `.protolab/config.yaml` under `root` and wire the file-backed
    /// registry plus the host's terminator.
    pub fn load(root: PathBuf) -> anyhow::Result<Self> {
        let config = Config::load(&root)?;
        let registry = Arc::new(FileRegistry::new(root));
        Ok(Self::new(config, registry, select_terminator()))
    }

    pub fn new(
        config: Config,
        registry: Arc<dyn PrototypeRegistry>,
        terminator: Arc<dyn ProcessTerminator>,
    ) -> Self {
        tracing::debug!(terminator = terminator.name(), "process terminator selected");
        Self {
            launcher: Launcher::from_config(&config.launcher),
            prober: PortProber::from_config(&config.probe),
            guard: Arc::new(StartGuard::from_config(&config.guard)),
            config: Arc::new(config),
            registry,
            terminator,
        }
    }
}
