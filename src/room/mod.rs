//! Multi-room layer: settings, per-room actors and the registry.

pub mod actor;
pub mod config;
pub mod engine;
pub mod messages;
pub mod registry;

pub use actor::{RoomActor, RoomHandle};
pub use config::{BlindState, RoomSettings};
pub use engine::RoomEngine;
pub use messages::{
    ActionStateView, LobbySummary, Role, RoomError, RoomMessage, RoomResult, RoomStateView,
};
pub use registry::{RegistryError, RoomRegistry};
