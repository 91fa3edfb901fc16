use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fmt};
use uuid::Uuid;

use super::constants;

/// Type alias for whole chips. Stacks, bets and pots are integral; there
/// is nothing smaller than one chip to argue over.
pub type Chips = u32;

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum Suit {
    Spade,
    Heart,
    Diamond,
    Club,
}

impl fmt::Display for Suit {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let repr = match self {
            Self::Spade => "♠",
            Self::Heart => "♥",
            Self::Diamond => "♦",
            Self::Club => "♣",
        };
        write!(f, "{repr}")
    }
}

/// Card rank, 2..=14 with ace high (14). The evaluator additionally
/// treats an ace as rank 1 when scanning for the wheel.
pub type Rank = u8;

/// A playing card: rank (2..=14) and suit.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct Card(pub Rank, pub Suit);

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let rank = match self.0 {
            14 => "A".to_string(),
            13 => "K".to_string(),
            12 => "Q".to_string(),
            11 => "J".to_string(),
            10 => "T".to_string(),
            r => r.to_string(),
        };
        write!(f, "{rank}{}", self.1)
    }
}

/// A standard 52-card deck dealt by advancing an index, so a misdeal can
/// never hand out the same card twice.
#[derive(Clone, Debug)]
pub struct Deck {
    cards: [Card; 52],
    deal_idx: usize,
}

impl Default for Deck {
    fn default() -> Self {
        let mut cards = [Card(2, Suit::Spade); 52];
        for (i, rank) in (2u8..=14).enumerate() {
            for (j, suit) in [Suit::Spade, Suit::Heart, Suit::Diamond, Suit::Club]
                .into_iter()
                .enumerate()
            {
                cards[4 * i + j] = Card(rank, suit);
            }
        }
        Self { cards, deal_idx: 0 }
    }
}

impl Deck {
    pub fn shuffle(&mut self) {
        self.cards.shuffle(&mut rand::rng());
        self.deal_idx = 0;
    }

    pub fn deal_card(&mut self) -> Card {
        let card = self.cards[self.deal_idx];
        self.deal_idx += 1;
        card
    }
}

/// Opaque session identity for a room member. Transport owns the mapping
/// from connections to ids; the engine only compares them.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct PlayerId(Uuid);

impl PlayerId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PlayerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Betting street / hand phase.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Preflop,
    Flop,
    Turn,
    River,
    Finished,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let repr = match self {
            Self::Preflop => "preflop",
            Self::Flop => "flop",
            Self::Turn => "turn",
            Self::River => "river",
            Self::Finished => "finished",
        };
        write!(f, "{repr}")
    }
}

/// A player's intent for their turn. Bet/raise/straddle amounts are
/// street totals ("to" sizes), not increments.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(tag = "action", content = "amount", rename_all = "snake_case")]
pub enum PlayerAction {
    Fold,
    Check,
    Call,
    Bet(Chips),
    Raise(Chips),
    AllIn,
    Straddle(Option<Chips>),
    SkipStraddle,
}

impl fmt::Display for PlayerAction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let repr = match self {
            Self::Fold => "fold".to_string(),
            Self::Check => "check".to_string(),
            Self::Call => "call".to_string(),
            Self::Bet(to) => format!("bet to {to}"),
            Self::Raise(to) => format!("raise to {to}"),
            Self::AllIn => "all-in".to_string(),
            Self::Straddle(Some(to)) => format!("straddle to {to}"),
            Self::Straddle(None) => "straddle".to_string(),
            Self::SkipStraddle => "skip straddle".to_string(),
        };
        write!(f, "{repr}")
    }
}

/// A seated player. Stack, seat and readiness persist across hands;
/// everything from `in_hand` down is per-hand transient state.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    /// Seat number, 1..=max_players, unique within a room.
    pub seat: usize,
    pub stack: Chips,
    pub ready: bool,
    pub connected: bool,
    pub in_hand: bool,
    pub folded: bool,
    pub all_in: bool,
    pub bet_this_street: Chips,
    pub total_contribution: Chips,
    pub hole_cards: Vec<Card>,
    pub last_action: String,
}

impl Player {
    #[must_use]
    pub fn new(id: PlayerId, name: String, seat: usize, stack: Chips) -> Self {
        Self {
            id,
            name,
            seat,
            stack,
            ready: true,
            connected: true,
            in_hand: false,
            folded: false,
            all_in: false,
            bet_this_street: 0,
            total_contribution: 0,
            hole_cards: Vec::with_capacity(2),
            last_action: String::new(),
        }
    }

    pub fn reset_hand_flags(&mut self) {
        self.in_hand = false;
        self.folded = false;
        self.all_in = false;
        self.bet_this_street = 0;
        self.total_contribution = 0;
        self.hole_cards.clear();
        self.last_action.clear();
    }

    /// Move chips from the stack into the current street. Clamped to the
    /// stack, so it can never over-commit; flips `all_in` when the stack
    /// empties. Returns the amount actually paid.
    pub fn post_chips(&mut self, amount: Chips) -> Chips {
        let pay = amount.min(self.stack);
        self.stack -= pay;
        self.bet_this_street += pay;
        self.total_contribution += pay;
        if self.stack == 0 {
            self.all_in = true;
        }
        pay
    }

    /// Still owed a decision this hand.
    #[must_use]
    pub fn can_act(&self) -> bool {
        self.in_hand && !self.folded && !self.all_in
    }

    /// Still competing for the pot.
    #[must_use]
    pub fn contending(&self) -> bool {
        self.in_hand && !self.folded
    }

    /// The street total this player would reach by going all-in.
    #[must_use]
    pub fn all_in_target(&self) -> Chips {
        self.bet_this_street + self.stack
    }
}

/// Spectators watch but hold no seat, stack or hand state.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Spectator {
    pub id: PlayerId,
    pub name: String,
    pub connected: bool,
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionLogKind {
    HandStart,
    Blind,
    StraddlePrompt,
    Straddle,
    StraddleSkip,
    Action,
    Street,
    Timeout,
    Admin,
    Result,
}

/// One structured entry in a hand's append-only action log.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ActionLogEntry {
    pub at: DateTime<Utc>,
    pub kind: ActionLogKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub player_id: Option<PlayerId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<Chips>,
}

impl ActionLogEntry {
    #[must_use]
    pub fn new(kind: ActionLogKind, message: String) -> Self {
        Self {
            at: Utc::now(),
            kind,
            message,
            player_id: None,
            amount: None,
        }
    }

    #[must_use]
    pub fn with_player(mut self, player_id: PlayerId) -> Self {
        self.player_id = Some(player_id);
        self
    }

    #[must_use]
    pub fn with_amount(mut self, amount: Chips) -> Self {
        self.amount = Some(amount);
        self
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultKind {
    Uncontested,
    Showdown,
}

/// One winner's share of a finished hand.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct WinnerLine {
    pub player_id: PlayerId,
    pub name: String,
    pub amount: Chips,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hand: Option<String>,
}

/// A single pot's outcome at showdown.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct PotResult {
    pub amount: Chips,
    pub winners: Vec<PlayerId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hand_name: Option<String>,
}

/// Terminal outcome of a hand. Written exactly once, when the hand
/// settles; read-only thereafter.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct HandResult {
    pub kind: ResultKind,
    pub winners: Vec<WinnerLine>,
    pub board: Vec<Card>,
    pub side_pots: Vec<PotResult>,
    pub revealed: HashMap<PlayerId, Vec<Card>>,
}

/// Blind sizes in force for one hand.
#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
pub struct BlindSnapshot {
    pub level: u32,
    pub small_blind: Chips,
    pub big_blind: Chips,
}

/// Final stack of one participant, recorded at archive time.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct SeatOutcome {
    pub player_id: PlayerId,
    pub name: String,
    pub seat: usize,
    pub stack_after: Chips,
}

/// Immutable snapshot of a finished hand, archived once per hand into a
/// bounded per-room ring.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct HandHistoryEntry {
    pub hand_no: u64,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub blinds: BlindSnapshot,
    pub players: Vec<SeatOutcome>,
    pub board: Vec<Card>,
    pub result: Option<HandResult>,
    pub actions: Vec<ActionLogEntry>,
}

/// Trim a display name the way the room accepts it. Length is capped in
/// characters, not bytes, so multibyte names are cut cleanly.
#[must_use]
pub fn sanitize_name(name: &str) -> String {
    name.trim().chars().take(constants::MAX_NAME_LENGTH).collect()
}

/// Ban lists match on normalized names, not session ids, so a banned
/// member cannot rejoin under a fresh connection.
#[must_use]
pub fn normalize_ban_key(name: &str) -> String {
    name.trim().to_lowercase()
}
