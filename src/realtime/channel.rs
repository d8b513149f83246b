//! Publish/subscribe primitives the session is built on.

use super::events::RawEvent;
use crate::error::GoResult;

/// An open push channel.
///
/// Implementations only move events; they know nothing about games or turns.
#[async_trait::async_trait]
pub trait PushChannel: Send {
    /// Publishes `payload` under the event `name`.
    async fn emit(&mut self, name: &str, payload: serde_json::Value) -> GoResult<()>;

    /// Waits for the next incoming event.
    ///
    /// `None` means the channel closed cleanly.
    async fn recv(&mut self) -> Option<GoResult<RawEvent>>;

    /// Closes the channel.
    async fn close(&mut self) -> GoResult<()>;
}

/// Opens push channels.
#[async_trait::async_trait]
pub trait PushConnector: Send + Sync {
    /// Opens a fresh channel to the service.
    async fn open(&self) -> GoResult<Box<dyn PushChannel>>;
}
