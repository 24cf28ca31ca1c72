//! Event ingestion and dispatch.
//!
//! Producers hand events to [`EventDispatcher::queue_event`], which never
//! blocks: the ingestion queue is unbounded and the pump is the only
//! backpressure. A single [`EventDispatcher::start_processing`] call runs
//! for the process lifetime, admitting events through a counting gate and
//! processing each one in its own failure-isolated task.
//!
//! The gate bounds how many dequeued events may be in flight at once: the
//! pump moves its permit into the processing task, and the permit is only
//! returned when that task finishes. A burst of events therefore cannot
//! spawn an unbounded number of concurrent handlers, and a sustained
//! overload shows up as queue growth rather than task explosion.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use log::{debug, error, warn};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::{Mutex, Semaphore};
use tokio_util::sync::CancellationToken;

use shared::{CoreEvent, GameEvent, GameEventType, GameServerEvent, ManagementEvent, Manager};

use crate::subscriptions::SubscriberSet;

/// Capacity of the admission gate: events processed concurrently.
pub const MAX_CONCURRENT_EVENTS: usize = 10;

/// Per-handler time budget applied to routine dispatch.
pub const DEFAULT_HANDLER_TIMEOUT: Duration = Duration::from_secs(25);

/// Event types that are still executed while the manager is shutting down.
/// Everything else is skipped once `is_running` turns false.
const OVERRIDE_EVENTS: [GameEventType; 4] = [
    GameEventType::Connect,
    GameEventType::Disconnect,
    GameEventType::Quit,
    GameEventType::Stop,
];

/// An enqueued event together with the manager that owns its processing.
/// Consumed exactly once by the pump.
struct PendingEvent {
    manager: Arc<dyn Manager>,
    event: CoreEvent,
}

/// Central event pump of the administration core.
pub struct EventDispatcher {
    queue_tx: UnboundedSender<PendingEvent>,
    queue_rx: Mutex<Option<UnboundedReceiver<PendingEvent>>>,
    gate: Arc<Semaphore>,
    game_subscribers: Arc<SubscriberSet<GameEvent>>,
    server_subscribers: Arc<SubscriberSet<GameServerEvent>>,
    management_subscribers: Arc<SubscriberSet<ManagementEvent>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        let (queue_tx, queue_rx) = mpsc::unbounded_channel();
        Self {
            queue_tx,
            queue_rx: Mutex::new(Some(queue_rx)),
            gate: Arc::new(Semaphore::new(MAX_CONCURRENT_EVENTS)),
            game_subscribers: Arc::new(SubscriberSet::new()),
            server_subscribers: Arc::new(SubscriberSet::new()),
            management_subscribers: Arc::new(SubscriberSet::new()),
        }
    }

    /// Subscribers receiving legacy game events after the manager's legacy
    /// execution.
    pub fn game_subscribers(&self) -> &SubscriberSet<GameEvent> {
        &self.game_subscribers
    }

    /// Subscribers receiving game-server lifecycle events.
    pub fn server_subscribers(&self) -> &SubscriberSet<GameServerEvent> {
        &self.server_subscribers
    }

    /// Subscribers receiving management events.
    pub fn management_subscribers(&self) -> &SubscriberSet<ManagementEvent> {
        &self.management_subscribers
    }

    /// Appends an event to the ingestion queue. Never blocks and applies no
    /// backpressure; ownership of the event transfers to the pump.
    pub fn queue_event(&self, manager: Arc<dyn Manager>, event: CoreEvent) {
        if self.queue_tx.send(PendingEvent { manager, event }).is_err() {
            error!("event queue is closed; dropping event");
        }
    }

    /// Runs the pump until `token` is cancelled.
    ///
    /// Meant to be invoked exactly once for the process lifetime; a second
    /// invocation finds the queue receiver already taken, logs, and returns.
    /// Cancellation while waiting on the gate or the queue exits cleanly
    /// without picking up further work; events still queued at that point
    /// are dropped.
    pub async fn start_processing(&self, token: CancellationToken) {
        let mut queue = match self.queue_rx.lock().await.take() {
            Some(queue) => queue,
            None => {
                error!("start_processing invoked more than once");
                return;
            }
        };

        loop {
            let permit = tokio::select! {
                permit = Arc::clone(&self.gate).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_closed) => break,
                },
                _ = token.cancelled() => break,
            };

            let pending = tokio::select! {
                received = queue.recv() => match received {
                    Some(pending) => pending,
                    None => break,
                },
                _ = token.cancelled() => break,
            };

            let game = Arc::clone(&self.game_subscribers);
            let server = Arc::clone(&self.server_subscribers);
            let management = Arc::clone(&self.management_subscribers);
            let type_name = pending.event.type_name();

            tokio::spawn(async move {
                let outcome =
                    AssertUnwindSafe(process_event(pending, game, server, management))
                        .catch_unwind()
                        .await;
                if outcome.is_err() {
                    error!("event task panicked for {type_name}");
                }
                drop(permit);
            });
        }
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

async fn process_event(
    pending: PendingEvent,
    game: Arc<SubscriberSet<GameEvent>>,
    server: Arc<SubscriberSet<GameServerEvent>>,
    management: Arc<SubscriberSet<ManagementEvent>>,
) {
    let type_name = pending.event.type_name();
    let token = pending.manager.cancellation_token();

    match pending.event {
        CoreEvent::Game(event) => {
            if pending.manager.is_running() || OVERRIDE_EVENTS.contains(&event.event_type) {
                if let Err(err) = pending.manager.execute_event(&event).await {
                    if err.is_cancellation() {
                        warn!("event timed out {type_name}: {err}");
                    } else {
                        error!("could not complete invoke for {type_name}: {err}");
                    }
                }
                // Subscribers run regardless of the legacy handler's outcome.
                game.invoke(&event, &token, Some(DEFAULT_HANDLER_TIMEOUT)).await;
            } else {
                debug!("skipping event {} as we're shutting down", event.id);
            }
        }
        CoreEvent::Server(event) => {
            server.invoke(&event, &token, Some(DEFAULT_HANDLER_TIMEOUT)).await;
        }
        CoreEvent::Management(event) => {
            management
                .invoke(&event, &token, Some(DEFAULT_HANDLER_TIMEOUT))
                .await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subscriptions::Subscriber;
    use async_trait::async_trait;
    use shared::HandlerError;
    use std::net::SocketAddr;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;
    use tokio::time::sleep;

    struct TestManager {
        running: AtomicBool,
        token: CancellationToken,
        executed: StdMutex<Vec<u64>>,
    }

    impl TestManager {
        fn new(running: bool) -> Arc<Self> {
            Arc::new(Self {
                running: AtomicBool::new(running),
                token: CancellationToken::new(),
                executed: StdMutex::new(Vec::new()),
            })
        }

        fn executed_ids(&self) -> Vec<u64> {
            self.executed.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Manager for TestManager {
        fn is_running(&self) -> bool {
            self.running.load(Ordering::SeqCst)
        }

        fn cancellation_token(&self) -> CancellationToken {
            self.token.clone()
        }

        fn servers(&self) -> Vec<SocketAddr> {
            Vec::new()
        }

        async fn execute_event(&self, event: &GameEvent) -> Result<(), HandlerError> {
            self.executed.lock().unwrap().push(event.id);
            Ok(())
        }
    }

    struct RecordingSubscriber {
        seen: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Subscriber<GameEvent> for RecordingSubscriber {
        async fn handle(
            &self,
            _event: &GameEvent,
            _token: &CancellationToken,
        ) -> Result<(), HandlerError> {
            self.seen.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn name(&self) -> &'static str {
            "recording"
        }
    }

    fn addr() -> SocketAddr {
        "127.0.0.1:28960".parse().unwrap()
    }

    fn spawn_pump(dispatcher: &Arc<EventDispatcher>) -> CancellationToken {
        let token = CancellationToken::new();
        let pump = Arc::clone(dispatcher);
        let pump_token = token.clone();
        tokio::spawn(async move { pump.start_processing(pump_token).await });
        token
    }

    #[tokio::test]
    async fn test_running_manager_gets_legacy_execution_and_fanout() {
        let dispatcher = Arc::new(EventDispatcher::new());
        let seen = Arc::new(AtomicUsize::new(0));
        dispatcher.game_subscribers().subscribe(Arc::new(RecordingSubscriber {
            seen: Arc::clone(&seen),
        }));

        let manager = TestManager::new(true);
        let token = spawn_pump(&dispatcher);

        let event = GameEvent::new(GameEventType::Say, addr());
        let id = event.id;
        dispatcher.queue_event(manager.clone(), CoreEvent::Game(event));

        sleep(Duration::from_millis(100)).await;
        token.cancel();

        assert_eq!(manager.executed_ids(), vec![id]);
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_non_override_events_are_skipped_while_stopped() {
        let dispatcher = Arc::new(EventDispatcher::new());
        let seen = Arc::new(AtomicUsize::new(0));
        dispatcher.game_subscribers().subscribe(Arc::new(RecordingSubscriber {
            seen: Arc::clone(&seen),
        }));

        let manager = TestManager::new(false);
        let token = spawn_pump(&dispatcher);

        for _ in 0..20 {
            let event = GameEvent::new(GameEventType::Say, addr());
            dispatcher.queue_event(manager.clone(), CoreEvent::Game(event));
        }

        sleep(Duration::from_millis(150)).await;
        token.cancel();

        assert!(manager.executed_ids().is_empty());
        assert_eq!(seen.load(Ordering::SeqCst), 0, "skipped events never fan out");
    }

    #[tokio::test]
    async fn test_override_events_are_processed_while_stopped() {
        let dispatcher = Arc::new(EventDispatcher::new());
        let manager = TestManager::new(false);
        let token = spawn_pump(&dispatcher);

        for _ in 0..20 {
            let event = GameEvent::new(GameEventType::Disconnect, addr());
            dispatcher.queue_event(manager.clone(), CoreEvent::Game(event));
        }

        sleep(Duration::from_millis(150)).await;
        token.cancel();

        assert_eq!(manager.executed_ids().len(), 20);
    }

    #[tokio::test]
    async fn test_server_events_bypass_the_legacy_path() {
        let dispatcher = Arc::new(EventDispatcher::new());
        let manager = TestManager::new(true);
        let token = spawn_pump(&dispatcher);

        dispatcher.queue_event(
            manager.clone(),
            CoreEvent::Server(GameServerEvent {
                kind: shared::ServerEventKind::ConnectionLost,
                server: addr(),
            }),
        );

        sleep(Duration::from_millis(100)).await;
        token.cancel();

        assert!(manager.executed_ids().is_empty());
    }

    #[tokio::test]
    async fn test_second_start_processing_returns_immediately() {
        let dispatcher = Arc::new(EventDispatcher::new());
        let first = spawn_pump(&dispatcher);
        sleep(Duration::from_millis(20)).await;

        // The receiver is gone, so this returns without pumping.
        dispatcher.start_processing(CancellationToken::new()).await;
        first.cancel();
    }

    #[tokio::test]
    async fn test_cancellation_stops_the_pump() {
        let dispatcher = Arc::new(EventDispatcher::new());
        let token = CancellationToken::new();
        token.cancel();

        // A cancelled token exits the loop without touching the queue.
        dispatcher.start_processing(token).await;

        let manager = TestManager::new(true);
        dispatcher.queue_event(
            manager.clone(),
            CoreEvent::Game(GameEvent::new(GameEventType::Say, addr())),
        );
        assert!(manager.executed_ids().is_empty());
    }
}
