//! Failure taxonomy of the RCON layer.

use std::net::SocketAddr;

use thiserror::Error;

/// Why an RCON query failed.
///
/// `InvalidPassword` and `NotConfigured` are protocol rejections: the server
/// answered, the answer is final, and this layer never retries them.
#[derive(Debug, Error)]
pub enum RconError {
    /// The server did not answer within the socket timeout.
    #[error("timed out waiting for response from {endpoint}")]
    Timeout { endpoint: SocketAddr },

    /// Transport kept failing until the retry cap was exhausted.
    #[error("could not communicate with {endpoint} after {attempts} failed attempts")]
    Communication { endpoint: SocketAddr, attempts: u32 },

    /// The server rejected the shared rcon password.
    #[error("invalid rcon password for {endpoint}")]
    InvalidPassword { endpoint: SocketAddr },

    /// The server has no rcon password configured.
    #[error("rcon is not configured on {endpoint}")]
    NotConfigured { endpoint: SocketAddr },

    /// The response arrived but could not be interpreted.
    #[error("unexpected response payload: {0}")]
    Malformed(String),
}
