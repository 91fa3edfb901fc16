//! The message contract between transports and room actors.
//!
//! A transport (websocket handler, bot driver, test) talks to a room by
//! sending [`RoomMessage`] values through the room's handle; each request
//! carries a oneshot sender for its reply. State snapshots are built
//! per-viewer so hole cards never leak.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::oneshot;

use crate::game::entities::{
    ActionLogEntry, Card, Chips, HandHistoryEntry, HandResult, Phase, PlayerAction, PlayerId,
    WinnerLine,
};
use crate::game::hand::ActionError;
use crate::room::config::{BlindState, RoomSettings};

/// Room operation errors
#[derive(Debug, Error)]
pub enum RoomError {
    #[error(transparent)]
    Action(#[from] ActionError),

    #[error("only the host can do that")]
    NotHost,

    #[error("the host must take a seat before starting a hand")]
    HostNotSeated,

    #[error("a hand is in progress")]
    HandInProgress,

    #[error("the room session has ended, no new hands can start")]
    SessionExpired,

    #[error("at least two ready players are needed to start")]
    NotEnoughPlayers,

    #[error("the room is full")]
    RoomFull,

    #[error("spectating is disabled in this room")]
    SpectatorsDisabled,

    #[error("this name is banned from the room")]
    NameBanned,

    #[error("wrong passphrase")]
    WrongPassphrase,

    #[error("member not found")]
    MemberNotFound,

    #[error("you cannot target yourself")]
    CannotTargetSelf,

    #[error("invalid seat number")]
    InvalidSeat,

    #[error("that seat is taken")]
    SeatOccupied,

    #[error("not possible while you are in a hand")]
    InHand,

    #[error("you are not a spectator")]
    NotSpectator,

    #[error("you are not seated")]
    NotSeated,

    #[error("hand replay not found")]
    ReplayNotFound,
}

pub type RoomResult<T> = Result<T, RoomError>;

/// Member role within a room.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Player,
    Spectator,
}

/// Requests a room actor accepts. Every variant replies exactly once
/// through its oneshot channel.
#[derive(Debug)]
pub enum RoomMessage {
    Join {
        member_id: PlayerId,
        name: String,
        passphrase: Option<String>,
        spectator: bool,
        reply: oneshot::Sender<RoomResult<Role>>,
    },
    Leave {
        member_id: PlayerId,
        reply: oneshot::Sender<()>,
    },
    TakeSeat {
        member_id: PlayerId,
        reply: oneshot::Sender<RoomResult<usize>>,
    },
    BecomeSpectator {
        member_id: PlayerId,
        reply: oneshot::Sender<RoomResult<()>>,
    },
    ChangeSeat {
        member_id: PlayerId,
        target_id: PlayerId,
        seat: usize,
        reply: oneshot::Sender<RoomResult<()>>,
    },
    ToggleReady {
        member_id: PlayerId,
        reply: oneshot::Sender<RoomResult<bool>>,
    },
    StartHand {
        member_id: PlayerId,
        reply: oneshot::Sender<RoomResult<()>>,
    },
    TakeAction {
        member_id: PlayerId,
        action: PlayerAction,
        reply: oneshot::Sender<RoomResult<()>>,
    },
    Kick {
        member_id: PlayerId,
        target_id: PlayerId,
        reply: oneshot::Sender<RoomResult<()>>,
    },
    Ban {
        member_id: PlayerId,
        target_id: PlayerId,
        reply: oneshot::Sender<RoomResult<()>>,
    },
    Unban {
        member_id: PlayerId,
        name: String,
        reply: oneshot::Sender<RoomResult<()>>,
    },
    GetState {
        viewer_id: PlayerId,
        reply: oneshot::Sender<RoomStateView>,
    },
    GetLobbySummary {
        reply: oneshot::Sender<LobbySummary>,
    },
    GetHandHistory {
        reply: oneshot::Sender<Vec<HandSummaryView>>,
    },
    GetHandReplay {
        hand_no: u64,
        reply: oneshot::Sender<RoomResult<HandHistoryEntry>>,
    },
    Disconnect {
        member_id: PlayerId,
        reply: oneshot::Sender<()>,
    },
    Reconnect {
        member_id: PlayerId,
        reply: oneshot::Sender<RoomResult<Role>>,
    },
    Close {
        reply: oneshot::Sender<()>,
    },
}

/// One seat as a given viewer sees it. `hole_cards` is populated only
/// for the viewer's own seat and for cards revealed by a settlement.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct PlayerView {
    pub id: PlayerId,
    pub name: String,
    pub seat: usize,
    pub stack: Chips,
    pub ready: bool,
    pub connected: bool,
    pub in_hand: bool,
    pub folded: bool,
    pub all_in: bool,
    pub bet_this_street: Chips,
    pub total_contribution: Chips,
    pub last_action: String,
    pub hole_cards: Vec<Card>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct SpectatorView {
    pub id: PlayerId,
    pub name: String,
    pub connected: bool,
}

/// What the viewer whose turn it is may legally do, with the amounts the
/// client needs to build its controls.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ActionStateView {
    Straddle {
        can_straddle: bool,
        min_straddle_to: Chips,
        default_straddle_to: Chips,
        max_to: Chips,
    },
    Normal {
        to_call: Chips,
        can_check: bool,
        can_call: bool,
        can_bet: bool,
        can_raise: bool,
        min_bet_to: Chips,
        min_raise_to: Chips,
        max_to: Chips,
    },
}

/// The live hand as everyone sees it. Hole cards live on [`PlayerView`].
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct GameStateView {
    pub hand_no: u64,
    pub phase: Phase,
    pub community: Vec<Card>,
    pub dealer_id: PlayerId,
    pub small_blind_id: PlayerId,
    pub big_blind_id: PlayerId,
    pub blind_level: u32,
    pub small_blind: Chips,
    pub big_blind: Chips,
    pub next_blind_at: Option<DateTime<Utc>>,
    pub turn_id: Option<PlayerId>,
    pub turn_deadline_at: Option<DateTime<Utc>>,
    pub current_bet: Chips,
    pub min_raise: Chips,
    pub pot_total: Chips,
    pub finished: bool,
    pub result: Option<HandResult>,
    pub pending: Vec<PlayerId>,
    pub awaiting_straddle: bool,
    pub straddle_player_id: Option<PlayerId>,
    pub straddle_amount: Chips,
    pub action_log: Vec<ActionLogEntry>,
}

/// Condensed archived hand for history lists.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct HandSummaryView {
    pub hand_no: u64,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub small_blind: Chips,
    pub big_blind: Chips,
    pub blind_level: u32,
    pub winners: Vec<WinnerLine>,
    pub stacks_after: Vec<StackAfterView>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct StackAfterView {
    pub player_id: PlayerId,
    pub name: String,
    pub stack_after: Chips,
}

/// Full per-viewer snapshot of a room.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct RoomStateView {
    pub room_id: String,
    pub room_name: String,
    pub host_id: Option<PlayerId>,
    pub viewer_id: PlayerId,
    pub viewer_role: Option<Role>,
    pub has_passphrase: bool,
    pub settings: RoomSettings,
    pub blind_state: BlindState,
    pub session_ends_at: DateTime<Utc>,
    pub session_expired: bool,
    pub auto_start_at: Option<DateTime<Utc>>,
    pub players: Vec<PlayerView>,
    pub spectators: Vec<SpectatorView>,
    pub logs: Vec<String>,
    pub game: Option<GameStateView>,
    pub can_start: bool,
    pub can_take_seat: bool,
    pub can_become_spectator: bool,
    /// Only populated for the host.
    pub banned_names: Vec<String>,
    pub hand_history: Vec<HandSummaryView>,
    pub action_state: Option<ActionStateView>,
}

/// One row in the lobby's room list.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct LobbySummary {
    pub room_id: String,
    pub room_name: String,
    pub has_passphrase: bool,
    pub player_count: usize,
    pub ready_count: usize,
    pub spectator_count: usize,
    pub max_players: usize,
    pub in_game: bool,
    pub small_blind: Chips,
    pub big_blind: Chips,
    pub blind_level: u32,
    pub tournament_mode: bool,
    pub blind_interval_minutes: u32,
    pub allow_straddle: bool,
    pub expires_at: DateTime<Utc>,
    pub expired: bool,
}
