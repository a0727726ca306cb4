use async_trait::async_trait;
use protolab_core::types::LifecycleResult;

use crate::Result;

/// The three lifecycle calls the poller needs, keyed by port.
///
/// [`HttpLifecycleClient`](crate::HttpLifecycleClient) implements this over
/// HTTP; tests substitute counting fakes.
#[async_trait]
pub trait LifecycleApi: Send + Sync {
    async fn start(&self, port: u16) -> Result<LifecycleResult>;

    async fn stop(&self, port: u16) -> Result<LifecycleResult>;

    /// `true` when something is listening on `port`.
    async fn status(&self, port: u16) -> Result<bool>;
}
