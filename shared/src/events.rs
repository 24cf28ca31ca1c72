//! Event data model for the administration core.
//!
//! Three event categories exist and [`CoreEvent`] closes over all of them:
//!
//! - [`GameEvent`]: legacy per-player events parsed from game server logs
//!   or injected by the web front end (connect, chat, login, ...). These are
//!   the only events the manager's legacy execution path sees.
//! - [`GameServerEvent`]: lifecycle of a managed server as observed by the
//!   monitor (connection lost/restored, monitoring started/stopped).
//! - [`ManagementEvent`]: administrative actions on the management tool
//!   itself (web front end login/logout).

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

// Ids are process-wide and only ever move forward; they exist so log lines
// and skip traces can refer to a specific event.
static NEXT_EVENT_ID: AtomicU64 = AtomicU64::new(1);

/// Type tag of a legacy game event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GameEventType {
    /// Server started or was picked up by the monitor.
    Start,
    /// Server is stopping.
    Stop,
    /// A player finished connecting.
    Connect,
    /// A player was disconnected by the server.
    Disconnect,
    /// A player quit on their own.
    Quit,
    /// Chat message.
    Say,
    /// Map rotation changed.
    MapChange,
    /// A privileged client logged in.
    Login,
    /// A privileged client logged out.
    Logout,
    /// A player was kicked by an admin.
    Kick,
    /// A player was banned by an admin.
    Ban,
}

/// The actor a game event originates from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventOrigin {
    pub client_id: i64,
    pub name: String,
}

/// Legacy per-player game event.
///
/// Immutable after construction; `id` is assigned from a process-wide
/// monotonic counter at creation time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameEvent {
    pub id: u64,
    pub event_type: GameEventType,
    pub origin: Option<EventOrigin>,
    /// The server this event belongs to.
    pub server: SocketAddr,
    /// Opaque payload; meaning depends on `event_type` (chat text, forwarded
    /// address, ...). Never interpreted by the core.
    pub data: String,
}

impl GameEvent {
    pub fn new(event_type: GameEventType, server: SocketAddr) -> Self {
        Self {
            id: NEXT_EVENT_ID.fetch_add(1, Ordering::Relaxed),
            event_type,
            origin: None,
            server,
            data: String::new(),
        }
    }

    pub fn with_origin(mut self, client_id: i64, name: impl Into<String>) -> Self {
        self.origin = Some(EventOrigin {
            client_id,
            name: name.into(),
        });
        self
    }

    pub fn with_data(mut self, data: impl Into<String>) -> Self {
        self.data = data.into();
        self
    }
}

/// Lifecycle kind of a [`GameServerEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServerEventKind {
    MonitoringStarted,
    MonitoringStopped,
    ConnectionLost,
    ConnectionRestored,
}

/// Lifecycle event of a managed game server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameServerEvent {
    pub kind: ServerEventKind,
    pub server: SocketAddr,
}

/// What a management event records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ManagementEventKind {
    Login,
    Logout,
}

/// Where a management login/logout came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoginSource {
    Webfront,
    Ingame,
}

/// Administrative event on the management tool itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManagementEvent {
    pub kind: ManagementEventKind,
    pub source: LoginSource,
    /// Id of the affected entity (client id as text).
    pub entity_id: String,
    /// Remote address or forwarded-for value, when known.
    pub identifier: Option<String>,
}

/// Closed union over every event category the dispatcher accepts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CoreEvent {
    Game(GameEvent),
    Server(GameServerEvent),
    Management(ManagementEvent),
}

impl CoreEvent {
    /// Stable name of the concrete event category, used to tag failure logs.
    pub fn type_name(&self) -> &'static str {
        match self {
            CoreEvent::Game(_) => "GameEvent",
            CoreEvent::Server(_) => "GameServerEvent",
            CoreEvent::Management(_) => "ManagementEvent",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr() -> SocketAddr {
        "127.0.0.1:28960".parse().unwrap()
    }

    #[test]
    fn test_event_ids_are_monotonic() {
        let first = GameEvent::new(GameEventType::Connect, addr());
        let second = GameEvent::new(GameEventType::Say, addr());
        let third = GameEvent::new(GameEventType::Quit, addr());
        assert!(second.id > first.id);
        assert!(third.id > second.id);
    }

    #[test]
    fn test_builder_fills_origin_and_data() {
        let event = GameEvent::new(GameEventType::Say, addr())
            .with_origin(42, "player")
            .with_data("hello");
        let origin = event.origin.expect("origin set");
        assert_eq!(origin.client_id, 42);
        assert_eq!(origin.name, "player");
        assert_eq!(event.data, "hello");
    }

    #[test]
    fn test_core_event_type_names() {
        let game = CoreEvent::Game(GameEvent::new(GameEventType::Connect, addr()));
        let server = CoreEvent::Server(GameServerEvent {
            kind: ServerEventKind::ConnectionLost,
            server: addr(),
        });
        let management = CoreEvent::Management(ManagementEvent {
            kind: ManagementEventKind::Login,
            source: LoginSource::Webfront,
            entity_id: "7".to_string(),
            identifier: None,
        });
        assert_eq!(game.type_name(), "GameEvent");
        assert_eq!(server.type_name(), "GameServerEvent");
        assert_eq!(management.type_name(), "ManagementEvent");
    }

    #[test]
    fn test_events_serialize_for_external_consumers() {
        let event = CoreEvent::Game(
            GameEvent::new(GameEventType::Login, addr()).with_origin(7, "admin"),
        );
        let json = serde_json::to_string(&event).unwrap();
        let back: CoreEvent = serde_json::from_str(&json).unwrap();
        match back {
            CoreEvent::Game(game) => {
                assert_eq!(game.event_type, GameEventType::Login);
                assert_eq!(game.origin.unwrap().name, "admin");
            }
            other => panic!("unexpected category {}", other.type_name()),
        }
    }
}
