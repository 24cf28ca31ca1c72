//! # RCON Query Channel
//!
//! Remote-console access to managed game servers over UDP. The protocol is
//! the classic out-of-band query format: every request starts with four
//! `0xFF` marker bytes followed by an ASCII keyword, and privileged commands
//! carry the shared `rcon` password in clear text. Responses are a single
//! datagram of newline-separated text terminated by a NUL byte.
//!
//! ## Guarantees
//!
//! Game servers of this era tolerate neither query floods nor interleaved
//! conversations, so the connection enforces two composed gates per
//! destination address:
//!
//! - **Pacing** bounds the minimum spacing between query starts; a caller
//!   that arrives too early sleeps until its reserved slot.
//! - **Exclusivity** guarantees at most one exchange is ever in flight per
//!   destination; a second caller suspends until the first resolves through
//!   success, timeout, or exhausted retries.
//!
//! Different destinations are fully independent. Per-destination state (the
//! attempt counter, the reusable receive buffer, the pacing clock) lives in a
//! [`DestinationRegistry`] owned by whoever constructs the connections, not
//! in process-wide statics.
//!
//! Transport failures are retried with a fixed flood-protection delay up to a
//! configured cap; protocol rejections (wrong or unset password) and response
//! timeouts are terminal for the call. Retry policy beyond that is the
//! caller's business.

pub mod connection;
pub mod error;
pub mod state;
pub mod status;
pub mod transport;

pub use connection::{QueryKind, RconConfig, RconConnection, QUERY_MARKER};
pub use error::RconError;
pub use state::DestinationRegistry;
pub use status::{PlayerStatus, ServerStatus};
pub use transport::{Transport, TransportError, UdpTransport};
