//! Core hold'em rules: cards, betting, pots and evaluation.
//!
//! Everything in here is synchronous and deterministic given a shuffled
//! deck; rooms and scheduling live in [`crate::room`].

pub mod constants;
pub mod entities;
pub mod evaluator;
pub mod hand;
pub mod pot;

pub use entities::{Card, Chips, Phase, Player, PlayerAction, PlayerId, Suit};
pub use evaluator::{HandCategory, HandEval, evaluate_seven};
pub use hand::{ActionError, Hand, HandSetup};
