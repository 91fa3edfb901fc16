//! # holdem_rooms
//!
//! An authoritative, server-side multi-room No-Limit Texas Hold'em
//! engine. All shuffling, dealing, betting validation, pot math and
//! settlement happen here; clients only submit intents and receive
//! per-viewer snapshots, so no transport ever sees another player's
//! hole cards.
//!
//! ## Architecture
//!
//! - [`game`]: the pure rules. [`game::Hand`] is the betting state
//!   machine for one hand from deal to settlement, on top of the 7-card
//!   evaluator and contribution-level side-pot math.
//! - [`room`]: the concurrent layer. Every room runs as one tokio actor
//!   ([`room::RoomActor`]) that owns a [`room::RoomEngine`] and applies
//!   intents strictly in arrival order, alongside the room's turn and
//!   auto-start clocks. [`room::RoomRegistry`] maps short room ids to
//!   live actor handles.
//!
//! ## Example
//!
//! ```no_run
//! use holdem_rooms::{PlayerId, RoomRegistry, RoomSettings};
//!
//! # async fn demo() {
//! let registry = RoomRegistry::new();
//! let host = PlayerId::new();
//! let (room_id, handle) = registry
//!     .create_room(host, "alice", "friday game", None, RoomSettings::default())
//!     .await
//!     .unwrap();
//! # let _ = (room_id, handle);
//! # }
//! ```

pub mod game;
pub use game::{
    Card, Chips, Phase, Player, PlayerAction, PlayerId, Suit,
    constants,
    hand::{ActionError, Hand, HandSetup},
};

pub mod room;
pub use room::{
    RegistryError, Role, RoomError, RoomHandle, RoomMessage, RoomRegistry, RoomSettings,
    RoomStateView,
};
