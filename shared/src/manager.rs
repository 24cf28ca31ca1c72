//! The [`Manager`] collaborator contract and the handler failure taxonomy.

use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::events::GameEvent;

/// Failure of an event handler or of the manager's legacy execution path.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// The handler exceeded its allotted time and was cancelled.
    #[error("handler timed out after {timeout:?}")]
    Timeout { timeout: Duration },

    /// The surrounding scope was cancelled before the handler finished.
    #[error("handler cancelled")]
    Cancelled,

    /// Any other handler failure.
    #[error("{0}")]
    Failed(String),
}

impl HandlerError {
    pub fn failed(message: impl Into<String>) -> Self {
        HandlerError::Failed(message.into())
    }

    /// True for failures caused by cancellation or timeout rather than by
    /// the handler's own logic.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, HandlerError::Timeout { .. } | HandlerError::Cancelled)
    }
}

/// Host application seen from the administration core.
///
/// The dispatcher consults `is_running` when routing legacy game events and
/// invokes `execute_event` as the externally supplied legacy handler. What a
/// ban, kick or login actually *does* lives behind this trait, never in the
/// core.
#[async_trait]
pub trait Manager: Send + Sync + 'static {
    /// False once the host application begins an orderly shutdown.
    fn is_running(&self) -> bool;

    /// Process-wide cancellation signal, observed by fan-out scopes.
    fn cancellation_token(&self) -> CancellationToken;

    /// Addresses of the currently managed game servers.
    fn servers(&self) -> Vec<SocketAddr>;

    /// Legacy per-event execution supplied by the host application.
    async fn execute_event(&self, event: &GameEvent) -> Result<(), HandlerError>;
}
