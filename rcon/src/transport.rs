//! Datagram transport seam.
//!
//! [`Transport`] is the one place the RCON layer touches a socket, kept
//! behind a trait so tests can substitute an instrumented implementation.
//! The production [`UdpTransport`] uses one short-lived socket per exchange.

use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::net::UdpSocket;
use tokio::time;

/// Transport-level failure of a single exchange.
#[derive(Debug, Error)]
pub enum TransportError {
    /// No datagram arrived within the allotted wait.
    #[error("timed out waiting for response datagram")]
    Timeout,

    /// The socket failed to bind, send, or receive.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// One request/response datagram exchange.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Sends `payload` to `endpoint`. When `response` is provided, waits up
    /// to `timeout` for a single datagram into it and returns the received
    /// length; `Ok(0)` when no response was requested.
    async fn exchange(
        &self,
        endpoint: SocketAddr,
        payload: &[u8],
        response: Option<&mut [u8]>,
        timeout: Duration,
    ) -> Result<usize, TransportError>;
}

/// Stateless UDP transport.
pub struct UdpTransport;

#[async_trait]
impl Transport for UdpTransport {
    async fn exchange(
        &self,
        endpoint: SocketAddr,
        payload: &[u8],
        response: Option<&mut [u8]>,
        timeout: Duration,
    ) -> Result<usize, TransportError> {
        let bind_addr: SocketAddr = if endpoint.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        };

        let socket = UdpSocket::bind(bind_addr).await?;
        // Connecting filters responses down to the queried server.
        socket.connect(endpoint).await?;
        socket.send(payload).await?;

        let buffer = match response {
            Some(buffer) => buffer,
            None => return Ok(0),
        };

        match time::timeout(timeout, socket.recv(buffer)).await {
            Ok(Ok(received)) => Ok(received),
            Ok(Err(err)) => Err(TransportError::Io(err)),
            // The socket is dropped with the abandoned receive, so a late
            // datagram is discarded and can never reach a future caller.
            Err(_elapsed) => Err(TransportError::Timeout),
        }
    }
}
