//! Per-destination connection state and its registry.
//!
//! Every remote address a query has ever been sent to owns one
//! [`DestinationState`]: the transport attempt counter, the reusable receive
//! buffer, and the pacing clock. State objects are created lazily on first
//! use and live for the process lifetime; their count is bounded by the
//! number of configured servers.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::sync::{Mutex as ExchangeLock, MutexGuard};

/// Size of the reusable receive buffer, matching the largest response a
/// supported game server produces.
pub(crate) const RECEIVE_BUFFER_SIZE: usize = 4096;

/// Everything a single in-flight exchange owns exclusively.
///
/// Guarded by the destination's exchange lock, so holding the guard *is* the
/// proof that no other query for this destination is on the wire and that the
/// buffer cannot be observed half-filled.
pub(crate) struct ExchangeState {
    /// Consecutive transport failures; reset only by a successful exchange.
    pub attempts: u32,
    /// Receive buffer reused across all exchanges with this destination.
    pub buffer: Box<[u8]>,
}

/// Mutable state for one remote address.
pub struct DestinationState {
    exchange: ExchangeLock<ExchangeState>,
    last_query: Mutex<Option<Instant>>,
}

impl DestinationState {
    fn new() -> Self {
        Self {
            exchange: ExchangeLock::new(ExchangeState {
                attempts: 0,
                buffer: vec![0u8; RECEIVE_BUFFER_SIZE].into_boxed_slice(),
            }),
            last_query: Mutex::new(None),
        }
    }

    /// Acquires the destination's single-holder exchange lock.
    pub(crate) async fn lock_exchange(&self) -> MutexGuard<'_, ExchangeState> {
        self.exchange.lock().await
    }

    /// Reserves the start instant for the next query against this
    /// destination and returns it.
    ///
    /// The slot is `max(now, previous slot + min_interval)`, recorded before
    /// the caller sleeps, so two concurrent callers can never be handed start
    /// times closer together than the interval. Pacing bounds minimum
    /// spacing only; it is not a rate cap.
    pub(crate) fn reserve_query_slot(&self, min_interval: Duration) -> Instant {
        let mut last = self.last_query.lock().expect("pacing clock poisoned");
        let now = Instant::now();
        let start_at = match *last {
            Some(previous) => {
                let earliest = previous + min_interval;
                if earliest > now {
                    earliest
                } else {
                    now
                }
            }
            None => now,
        };
        *last = Some(start_at);
        start_at
    }
}

/// Address-keyed registry of [`DestinationState`] objects.
///
/// Owned by whoever constructs connections; connections sharing a registry
/// share per-destination serialization, which is the point.
pub struct DestinationRegistry {
    states: Mutex<HashMap<SocketAddr, Arc<DestinationState>>>,
}

impl DestinationRegistry {
    pub fn new() -> Self {
        Self {
            states: Mutex::new(HashMap::new()),
        }
    }

    /// Gets or lazily creates the state for `endpoint`. Concurrent calls for
    /// the same address always observe the same state object.
    pub fn state_for(&self, endpoint: SocketAddr) -> Arc<DestinationState> {
        let mut states = self.states.lock().expect("destination registry poisoned");
        Arc::clone(
            states
                .entry(endpoint)
                .or_insert_with(|| Arc::new(DestinationState::new())),
        )
    }

    /// Number of destinations seen so far.
    pub fn len(&self) -> usize {
        self.states.lock().expect("destination registry poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for DestinationRegistry {
    fn default() -> Self {
        Self::new()
    }
}
