//! # Shared Administration Model
//!
//! Common types for the warden game-server administration core. This crate
//! defines the event data model that flows from producers (the web front end,
//! plugins, server monitors) through the dispatcher, and the [`Manager`]
//! contract through which the core calls back into its host application.
//!
//! The crate deliberately contains no I/O: events are plain data, and the
//! manager trait is the only seam to the outside world.

pub mod events;
pub mod manager;

pub use events::{
    CoreEvent, EventOrigin, GameEvent, GameEventType, GameServerEvent, LoginSource,
    ManagementEvent, ManagementEventKind, ServerEventKind,
};
pub use manager::{HandlerError, Manager};
