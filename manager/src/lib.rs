//! # Warden Application Core
//!
//! The administrative automation core for remote game-server management.
//! Runtime events from every managed server funnel into one
//! [`EventDispatcher`], which admits them under a bounded concurrency gate,
//! runs the host manager's legacy handler where the routing rules call for
//! it, and fans each event out to its typed subscribers.
//!
//! ## Event flow
//!
//! ```text
//! producers (web front end, monitors, plugins)
//!        │ queue_event(manager, event)           non-blocking, unbounded
//!        ▼
//!   EventDispatcher ──► admission gate (10) ──► per-event task
//!                                                 │ legacy execute_event
//!                                                 │ (game events only)
//!                                                 ▼
//!                                           SubscriberSet fan-out
//!                                           (≤ 5 handlers at a time)
//! ```
//!
//! Game events are additionally subject to the shutdown routing rule: once
//! the manager reports it is no longer running, only connect, disconnect,
//! quit and stop events are still executed; everything else is skipped with
//! a debug trace and never reaches fan-out.
//!
//! The `warden` binary wires this core to the `rcon` crate: a monitor task
//! per configured server polls `getstatus` and turns reachability changes
//! into game-server events.

pub mod config;
pub mod dispatcher;
pub mod game_manager;
pub mod subscriptions;

pub use config::{ServerConfig, WardenConfig};
pub use dispatcher::{EventDispatcher, DEFAULT_HANDLER_TIMEOUT, MAX_CONCURRENT_EVENTS};
pub use game_manager::GameManager;
pub use subscriptions::{Subscriber, SubscriberSet, MAX_HANDLER_CONCURRENCY};
