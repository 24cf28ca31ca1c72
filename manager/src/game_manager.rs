//! Reference [`Manager`] implementation used by the warden binary.
//!
//! Keeps a per-server roster of online client ids from the legacy event
//! stream and logs chat. Real deployments supply their own manager; the
//! dispatcher only ever sees the trait.

use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use log::{debug, info, warn};
use tokio_util::sync::CancellationToken;

use shared::{GameEvent, GameEventType, HandlerError, Manager};

pub struct GameManager {
    servers: Vec<SocketAddr>,
    running: AtomicBool,
    token: CancellationToken,
    online: Mutex<HashMap<SocketAddr, HashSet<i64>>>,
}

impl GameManager {
    pub fn new(servers: Vec<SocketAddr>) -> Self {
        let online = servers.iter().map(|addr| (*addr, HashSet::new())).collect();
        Self {
            servers,
            running: AtomicBool::new(true),
            token: CancellationToken::new(),
            online: Mutex::new(online),
        }
    }

    /// Stops accepting routine work. Connect/disconnect bookkeeping keeps
    /// running until the cancellation token fires.
    pub fn begin_shutdown(&self) {
        self.running.store(false, Ordering::SeqCst);
        info!("manager entering shutdown");
    }

    pub fn online_count(&self, server: SocketAddr) -> usize {
        self.online
            .lock()
            .expect("roster poisoned")
            .get(&server)
            .map(HashSet::len)
            .unwrap_or(0)
    }
}

#[async_trait]
impl Manager for GameManager {
    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    fn servers(&self) -> Vec<SocketAddr> {
        self.servers.clone()
    }

    async fn execute_event(&self, event: &GameEvent) -> Result<(), HandlerError> {
        match event.event_type {
            GameEventType::Connect => {
                if let Some(origin) = &event.origin {
                    let mut online = self.online.lock().expect("roster poisoned");
                    online.entry(event.server).or_default().insert(origin.client_id);
                    info!("{} connected to {}", origin.name, event.server);
                } else {
                    warn!("connect event {} without origin", event.id);
                }
            }
            GameEventType::Disconnect | GameEventType::Quit => {
                if let Some(origin) = &event.origin {
                    let mut online = self.online.lock().expect("roster poisoned");
                    if let Some(roster) = online.get_mut(&event.server) {
                        roster.remove(&origin.client_id);
                    }
                    info!("{} left {}", origin.name, event.server);
                }
            }
            GameEventType::Say => {
                let speaker = event
                    .origin
                    .as_ref()
                    .map(|origin| origin.name.as_str())
                    .unwrap_or("console");
                info!("[{}] {}: {}", event.server, speaker, event.data);
            }
            GameEventType::Stop => {
                self.begin_shutdown();
            }
            _ => {
                debug!("no legacy handling for {:?} event {}", event.event_type, event.id);
            }
        }
        Ok(())
    }
}
