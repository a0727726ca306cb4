//! `protolab-client`: talk to a running lifecycle controller.
//!
//! # Architecture
//!
//! ```text
//! PollerHandle      ← start() / stop() / retarget() / dispose()
//!     │                commands over an mpsc channel
//!     ▼
//! Poller task       ← one tokio task, one timer, one PollState
//!     │                publishes PollView on a watch channel
//!     ▼
//! LifecycleApi      ← trait; HttpLifecycleClient is the reqwest impl
//!     │
//!     ▼
//! POST /prototypes/{port}/start|stop, GET /prototypes/{port}/status
//! ```
//!
//! # Quick start
//!
//! ```rust,ignore
//! use protolab_client::{HttpLifecycleClient, PollerHandle, PollerSettings};
//! use std::sync::Arc;
//!
//! let api = Arc::new(HttpLifecycleClient::new("http://localhost:3141")?);
//! let poller = PollerHandle::mount(api, PollerSettings::default(), Some(4021), true);
//! poller.start().await;
//! let mut view = poller.subscribe();
//! while view.changed().await.is_ok() {
//!     println!("{:?}", view.borrow().state);
//! }
//! ```

pub mod api;
pub mod error;
pub mod http;
pub mod poller;

pub use api::LifecycleApi;
pub use error::ClientError;
pub use http::HttpLifecycleClient;
pub use poller::{PollState, PollView, PollerHandle, PollerSettings};

/// Convenience `Result` alias for this crate.
pub type Result<T> = std::result::Result<T, ClientError>;
