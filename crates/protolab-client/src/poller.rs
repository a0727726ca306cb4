use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use protolab_core::config::PollerConfig;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::api::LifecycleApi;

// ─── PollerSettings ───────────────────────────────────────────────────────

/// Cadence of the two polling speeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollerSettings {
    pub normal_interval: Duration,
    pub fast_interval: Duration,
    /// Fast ticks after a Start before falling back to the normal cadence.
    pub max_fast_attempts: u32,
}

impl From<&PollerConfig> for PollerSettings {
    fn from(cfg: &PollerConfig) -> Self {
        Self {
            normal_interval: cfg.normal_interval(),
            fast_interval: cfg.fast_interval(),
            max_fast_attempts: cfg.max_fast_attempts,
        }
    }
}

impl Default for PollerSettings {
    fn default() -> Self {
        Self::from(&PollerConfig::default())
    }
}

// ─── PollState / PollView ─────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PollState {
    /// No port, or the prototype is gone. No timer is armed.
    #[default]
    Idle,
    /// First Status call after mount or retarget.
    Checking,
    Running,
    Stopped,
    /// Settled, but no Status call has succeeded for this port yet.
    Unknown,
    /// Start request in flight; normal polling suspended.
    Starting,
    /// Start accepted; polling at the fast cadence.
    StartingFast { attempts: u32 },
    /// Stop request in flight.
    Stopping,
}

impl PollState {
    pub fn is_loading(self) -> bool {
        matches!(
            self,
            PollState::Starting | PollState::StartingFast { .. } | PollState::Stopping
        )
    }

    pub fn is_checking(self) -> bool {
        self == PollState::Checking
    }
}

/// Snapshot published on every transition, for whoever renders the controls.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PollView {
    pub state: PollState,
    pub port: Option<u16>,
    /// `None` until a Status call has succeeded for this port.
    pub is_running: Option<bool>,
    pub is_loading: bool,
    pub is_checking: bool,
    pub message: Option<String>,
    pub last_checked_at: Option<DateTime<Utc>>,
}

// ─── PollerHandle ─────────────────────────────────────────────────────────

enum Command {
    Start(oneshot::Sender<()>),
    Stop(oneshot::Sender<()>),
    Retarget {
        port: Option<u16>,
        has_prototype: bool,
    },
}

/// Owner of one poller task. The task holds the only timer; `dispose()` (or
/// dropping the handle) cancels it along with any in-flight request.
pub struct PollerHandle {
    commands: mpsc::UnboundedSender<Command>,
    view: watch::Receiver<PollView>,
    task: Option<JoinHandle<()>>,
}

impl PollerHandle {
    /// Spawn the poller. With a port and `has_prototype`, it checks status
    /// once and then polls at the normal cadence; otherwise it stays `Idle`.
    pub fn mount(
        api: Arc<dyn LifecycleApi>,
        settings: PollerSettings,
        port: Option<u16>,
        has_prototype: bool,
    ) -> Self {
        let (commands, rx) = mpsc::unbounded_channel();
        let (view_tx, view) = watch::channel(PollView::default());
        let poller = Poller {
            api,
            settings,
            port: None,
            state: PollState::Idle,
            next_tick: None,
            is_running: None,
            message: None,
            last_checked_at: None,
            view: view_tx,
        };
        let task = tokio::spawn(poller.run(rx, port, has_prototype));
        Self {
            commands,
            view,
            task: Some(task),
        }
    }

    pub fn view(&self) -> PollView {
        self.view.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<PollView> {
        self.view.clone()
    }

    /// Request a Start. Resolves once the Start call has returned and the
    /// poller has switched cadence. Ignored while another request is in
    /// flight or when idle.
    pub async fn start(&self) {
        self.request(Command::Start).await
    }

    /// Request a Stop. Resolves after the follow-up Status re-check.
    pub async fn stop(&self) {
        self.request(Command::Stop).await
    }

    /// Point the poller at a different port, or at nothing.
    pub fn retarget(&self, port: Option<u16>, has_prototype: bool) {
        let _ = self.commands.send(Command::Retarget {
            port,
            has_prototype,
        });
    }

    /// Cancel the timer and any in-flight call. Once this returns no further
    /// network calls are made.
    pub async fn dispose(mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            let _ = task.await;
        }
    }

    async fn request(&self, make: fn(oneshot::Sender<()>) -> Command) {
        let (tx, rx) = oneshot::channel();
        if self.commands.send(make(tx)).is_ok() {
            let _ = rx.await;
        }
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

// ─── Poller task ──────────────────────────────────────────────────────────

struct Poller {
    api: Arc<dyn LifecycleApi>,
    settings: PollerSettings,
    port: Option<u16>,
    state: PollState,
    next_tick: Option<Instant>,
    is_running: Option<bool>,
    message: Option<String>,
    last_checked_at: Option<DateTime<Utc>>,
    view: watch::Sender<PollView>,
}

impl Poller {
    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        port: Option<u16>,
        has_prototype: bool,
    ) {
        self.retarget(port, has_prototype).await;
        loop {
            let deadline = self.next_tick;
            tokio::select! {
                cmd = commands.recv() => match cmd {
                    Some(cmd) => self.handle(cmd).await,
                    None => break,
                },
                _ = sleep_until(deadline) => self.tick().await,
            }
        }
        debug!("poller exited");
    }

    async fn handle(&mut self, cmd: Command) {
        match cmd {
            Command::Start(ack) => {
                self.start().await;
                let _ = ack.send(());
            }
            Command::Stop(ack) => {
                self.stop().await;
                let _ = ack.send(());
            }
            Command::Retarget {
                port,
                has_prototype,
            } => self.retarget(port, has_prototype).await,
        }
    }

    async fn retarget(&mut self, port: Option<u16>, has_prototype: bool) {
        let Some(port) = port.filter(|_| has_prototype) else {
            self.reset();
            self.publish();
            return;
        };
        if self.port == Some(port) && self.state != PollState::Idle {
            return;
        }
        self.reset();
        self.port = Some(port);
        self.set_state(PollState::Checking);
        self.refresh().await;
        self.settle();
    }

    async fn tick(&mut self) {
        self.next_tick = None;
        match self.state {
            PollState::Checking
            | PollState::Running
            | PollState::Stopped
            | PollState::Unknown => {
                let before = self.is_running;
                if let Some(running) = self.refresh().await {
                    // A message from the last request no longer describes the port.
                    if before != Some(running) {
                        self.message = None;
                    }
                }
                self.settle();
            }
            PollState::StartingFast { attempts } => {
                let attempts = attempts + 1;
                if self.refresh().await == Some(true) {
                    self.message = None;
                    self.settle();
                } else if attempts >= self.settings.max_fast_attempts {
                    warn!(
                        port = self.port,
                        attempts, "dev server not listening yet, back to normal polling"
                    );
                    self.message = Some(format!("Not listening after {attempts} checks"));
                    self.settle();
                } else {
                    self.state = PollState::StartingFast { attempts };
                    self.schedule(self.settings.fast_interval);
                    self.publish();
                }
            }
            PollState::Idle | PollState::Starting | PollState::Stopping => {}
        }
    }

    async fn start(&mut self) {
        let Some(port) = self.port else { return };
        if self.state.is_loading() {
            debug!(port, state = ?self.state, "start ignored");
            return;
        }
        self.next_tick = None;
        self.message = None;
        self.set_state(PollState::Starting);

        match self.api.start(port).await {
            Ok(result) if result.success => {
                info!(port, "start accepted, polling fast");
                self.message = result.message;
                self.state = PollState::StartingFast { attempts: 0 };
                self.schedule(self.settings.fast_interval);
                self.publish();
            }
            Ok(result) => {
                self.message = result.error.or(result.message);
                self.settle();
            }
            Err(e) => {
                warn!(port, error = %e, "start failed");
                self.message = Some(e.to_string());
                self.settle();
            }
        }
    }

    async fn stop(&mut self) {
        let Some(port) = self.port else { return };
        if self.state.is_loading() {
            debug!(port, state = ?self.state, "stop ignored");
            return;
        }
        self.next_tick = None;
        self.message = None;
        self.set_state(PollState::Stopping);

        match self.api.stop(port).await {
            Ok(result) => self.message = result.message.or(result.error),
            Err(e) => {
                warn!(port, error = %e, "stop failed");
                self.message = Some(e.to_string());
            }
        }
        // "No process found" and "killed" both need confirmation.
        self.refresh().await;
        self.settle();
    }

    /// One Status call. A failure is logged and leaves `is_running` as it was.
    async fn refresh(&mut self) -> Option<bool> {
        let port = self.port?;
        match self.api.status(port).await {
            Ok(running) => {
                self.is_running = Some(running);
                self.last_checked_at = Some(Utc::now());
                Some(running)
            }
            Err(e) => {
                warn!(port, error = %e, "status check failed");
                None
            }
        }
    }

    /// Resolve to Running/Stopped (Unknown without a successful Status call)
    /// and re-arm the normal cadence.
    fn settle(&mut self) {
        self.state = match self.is_running {
            Some(true) => PollState::Running,
            Some(false) => PollState::Stopped,
            None => PollState::Unknown,
        };
        self.schedule(self.settings.normal_interval);
        self.publish();
    }

    fn reset(&mut self) {
        self.next_tick = None;
        self.port = None;
        self.state = PollState::Idle;
        self.is_running = None;
        self.message = None;
        self.last_checked_at = None;
    }

    fn schedule(&mut self, after: Duration) {
        self.next_tick = Some(Instant::now() + after);
    }

    fn set_state(&mut self, state: PollState) {
        self.state = state;
        self.publish();
    }

    fn publish(&self) {
        self.view.send_replace(PollView {
            state: self.state,
            port: self.port,
            is_running: self.is_running,
            is_loading: self.state.is_loading(),
            is_checking: self.state.is_checking(),
            message: self.message.clone(),
            last_checked_at: self.last_checked_at,
        });
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────
