//! Engine-wide bounds and defaults.

/// Hard cap on seats per room.
pub const MAX_PLAYERS: usize = 9;

/// Per-hand action log is ring-trimmed to this many entries.
pub const ACTION_LOG_CAPACITY: usize = 500;

/// Per-room hand archive is ring-trimmed to this many hands.
pub const HAND_HISTORY_CAPACITY: usize = 120;

/// Per-room chat/event log is ring-trimmed to this many lines.
pub const ROOM_LOG_CAPACITY: usize = 160;

/// Room state snapshots carry only the log tail.
pub const ROOM_LOG_TAIL: usize = 80;

/// Room state snapshots carry only this many archived hands.
pub const HAND_HISTORY_TAIL: usize = 20;

/// Full hand-history queries return at most this many hands.
pub const HAND_REPLAY_TAIL: usize = 60;

pub const MAX_NAME_LENGTH: usize = 16;
pub const MAX_ROOM_NAME_LENGTH: usize = 24;

/// Room ids avoid visually ambiguous characters (no 0/O, 1/I).
pub const ROOM_ID_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
pub const ROOM_ID_LENGTH: usize = 6;
pub const ROOM_ID_CREATE_ATTEMPTS: usize = 1000;

/// Delay between a hand finishing and the next one auto-starting.
pub const AUTO_NEXT_HAND_DELAY_MS: u64 = 2200;

/// Slack added to turn deadlines before the timeout fires, so a
/// last-instant action wins the race against its own clock.
pub const TURN_TIMER_SLACK_MS: u64 = 25;
