//! The RCON connection to a single game server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};
use tokio::time;

use crate::error::RconError;
use crate::state::DestinationRegistry;
use crate::transport::{Transport, TransportError, UdpTransport};

/// Marker prefix of every out-of-band query datagram.
pub const QUERY_MARKER: [u8; 4] = [0xFF, 0xFF, 0xFF, 0xFF];

/// Determines how a query is framed on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
    /// Read or write a server dvar. Privileged; carries the password.
    Dvar,
    /// Run a console command. Privileged; carries the password.
    Command,
    /// Full status query (`getstatus`). Unauthenticated.
    GetStatus,
    /// Short info query (`getinfo`). Unauthenticated.
    GetInfo,
}

/// Tunables of the query channel. Defaults match production use; tests
/// shrink them.
#[derive(Debug, Clone, Copy)]
pub struct RconConfig {
    /// How long to wait for the response datagram before giving up.
    pub socket_timeout: Duration,
    /// Transport failures tolerated before a query is abandoned.
    pub max_attempts: u32,
    /// Fixed delay before a failed query is retransmitted.
    pub flood_protect_interval: Duration,
    /// Minimum spacing between query starts against one destination.
    pub min_query_interval: Duration,
}

impl Default for RconConfig {
    fn default() -> Self {
        Self {
            socket_timeout: Duration::from_secs(5),
            max_attempts: 4,
            flood_protect_interval: Duration::from_millis(300),
            min_query_interval: Duration::from_millis(300),
        }
    }
}

/// Query channel to one game server.
///
/// Cheap to construct; all per-destination state lives in the shared
/// [`DestinationRegistry`], so several connections to the same address still
/// serialize their exchanges.
pub struct RconConnection {
    endpoint: SocketAddr,
    password: String,
    registry: Arc<DestinationRegistry>,
    transport: Arc<dyn Transport>,
    config: RconConfig,
}

impl RconConnection {
    pub fn new(
        endpoint: SocketAddr,
        password: impl Into<String>,
        registry: Arc<DestinationRegistry>,
    ) -> Self {
        Self::with_transport(endpoint, password, registry, Arc::new(UdpTransport))
    }

    /// Builds a connection over a caller-supplied transport. Tests use this
    /// to instrument or fault-inject the wire.
    pub fn with_transport(
        endpoint: SocketAddr,
        password: impl Into<String>,
        registry: Arc<DestinationRegistry>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            endpoint,
            password: password.into(),
            registry,
            transport,
            config: RconConfig::default(),
        }
    }

    pub fn with_config(mut self, config: RconConfig) -> Self {
        self.config = config;
        self
    }

    pub fn endpoint(&self) -> SocketAddr {
        self.endpoint
    }

    /// Sends one query and returns the trimmed, non-empty response lines.
    ///
    /// The call paces itself against the destination, holds the
    /// destination's exclusivity lock for the whole exchange, retries
    /// transport failures up to the configured cap with a fixed
    /// flood-protection delay, and classifies protocol rejections. With
    /// `wait_for_response` false the query is sent without arming a receive
    /// and the result is empty.
    pub async fn send_query(
        &self,
        kind: QueryKind,
        parameters: &str,
        wait_for_response: bool,
    ) -> Result<Vec<String>, RconError> {
        let state = self.registry.state_for(self.endpoint);

        // Pacing: reserve the next start slot before doing anything else, so
        // concurrent callers cannot be handed starts closer together than
        // the minimum interval.
        let start_at = state.reserve_query_slot(self.config.min_query_interval);
        time::sleep_until(start_at.into()).await;

        // Exclusivity: the guard owns the attempt counter and the receive
        // buffer. Holding it across the exchange is what keeps a second
        // query off the wire until this one resolves, and what guarantees
        // the buffer is fully consumed before reuse.
        let mut exchange = state.lock_exchange().await;

        let payload = self.frame_payload(kind, parameters);

        loop {
            debug!("sending {} bytes to {}", payload.len(), self.endpoint);
            let response = if wait_for_response {
                Some(&mut exchange.buffer[..])
            } else {
                None
            };

            match self
                .transport
                .exchange(self.endpoint, &payload, response, self.config.socket_timeout)
                .await
            {
                Ok(received) => {
                    exchange.attempts = 0;
                    if !wait_for_response {
                        return Ok(Vec::new());
                    }
                    return self.parse_response(&exchange.buffer[..received]);
                }
                // A slow server is terminal for this call. The pending
                // receive was dropped with its socket, so a late datagram
                // cannot surface in a future caller's response.
                Err(TransportError::Timeout) => {
                    return Err(RconError::Timeout {
                        endpoint: self.endpoint,
                    });
                }
                Err(TransportError::Io(err)) => {
                    if exchange.attempts < self.config.max_attempts {
                        exchange.attempts += 1;
                        warn!(
                            "communication failure with {} (attempt {}/{}): {}",
                            self.endpoint, exchange.attempts, self.config.max_attempts, err
                        );
                        time::sleep(self.config.flood_protect_interval).await;
                        // Resend the identical payload; pacing and
                        // exclusivity are not re-acquired.
                        continue;
                    }
                    return Err(RconError::Communication {
                        endpoint: self.endpoint,
                        attempts: exchange.attempts,
                    });
                }
            }
        }
    }

    fn frame_payload(&self, kind: QueryKind, parameters: &str) -> Vec<u8> {
        let mut payload = Vec::with_capacity(64);
        payload.extend_from_slice(&QUERY_MARKER);
        match kind {
            QueryKind::Dvar | QueryKind::Command => {
                payload.extend_from_slice(b"rcon ");
                payload.extend_from_slice(self.password.as_bytes());
                payload.push(b' ');
                payload.extend_from_slice(parameters.as_bytes());
            }
            QueryKind::GetStatus => payload.extend_from_slice(b"getstatus"),
            QueryKind::GetInfo => payload.extend_from_slice(b"getinfo"),
        }
        payload
    }

    fn parse_response(&self, raw: &[u8]) -> Result<Vec<String>, RconError> {
        let terminator = raw.iter().position(|&byte| byte == 0).unwrap_or(raw.len());
        let text = String::from_utf8_lossy(&raw[..terminator]);

        if text.contains("Invalid password") {
            return Err(RconError::InvalidPassword {
                endpoint: self.endpoint,
            });
        }
        if text.contains("rcon_password") {
            return Err(RconError::NotConfigured {
                endpoint: self.endpoint,
            });
        }

        Ok(text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }
}
