//! Room settings and the tournament blind schedule.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::game::entities::Chips;

/// Per-room rules, fixed at creation. Out-of-range values are pulled
/// back into range by [`RoomSettings::normalized`] rather than rejected,
/// so a creation request always yields a playable room.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct RoomSettings {
    pub starting_stack: Chips,
    pub small_blind: Chips,
    pub big_blind: Chips,
    pub max_players: usize,
    pub turn_time_secs: u32,
    pub session_minutes: u32,
    pub allow_straddle: bool,
    pub allow_spectators: bool,
    pub tournament_mode: bool,
    pub blind_interval_minutes: u32,
}

impl Default for RoomSettings {
    fn default() -> Self {
        Self {
            starting_stack: 2_000,
            small_blind: 10,
            big_blind: 20,
            max_players: 9,
            turn_time_secs: 25,
            session_minutes: 180,
            allow_straddle: true,
            allow_spectators: true,
            tournament_mode: false,
            blind_interval_minutes: 15,
        }
    }
}

impl RoomSettings {
    /// Clamp every field into its allowed range. The big blind is
    /// additionally forced to at least twice the small blind.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.starting_stack = self.starting_stack.clamp(200, 500_000);
        self.small_blind = self.small_blind.clamp(1, 50_000);
        self.big_blind = self
            .big_blind
            .clamp((self.small_blind * 2).max(2), 100_000);
        self.max_players = self.max_players.clamp(2, crate::game::constants::MAX_PLAYERS);
        self.turn_time_secs = self.turn_time_secs.clamp(8, 90);
        self.session_minutes = self.session_minutes.clamp(10, 720);
        self.blind_interval_minutes = self.blind_interval_minutes.clamp(1, 120);
        self
    }
}

/// Blinds in force right now, plus when they escalate next.
#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
pub struct BlindState {
    pub level: u32,
    pub small_blind: Chips,
    pub big_blind: Chips,
    pub next_level_at: Option<DateTime<Utc>>,
    pub started_at: DateTime<Utc>,
}

/// Blind schedule at `now`. Cash rooms stay at level 1 forever; in
/// tournament mode blinds double every interval, anchored at the first
/// hand (fallback: room creation).
#[must_use]
pub fn blind_state(
    settings: &RoomSettings,
    created_at: DateTime<Utc>,
    tournament_started_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> BlindState {
    let started_at = tournament_started_at.unwrap_or(created_at);

    if !settings.tournament_mode {
        return BlindState {
            level: 1,
            small_blind: settings.small_blind,
            big_blind: settings.big_blind,
            next_level_at: None,
            started_at,
        };
    }

    let interval = Duration::minutes(i64::from(settings.blind_interval_minutes));
    let elapsed = (now - started_at).max(Duration::zero());
    let level = (elapsed.num_milliseconds() / interval.num_milliseconds()) as u32 + 1;
    // Doubling saturates instead of wrapping once levels get absurd.
    let mult = 1u64 << u64::from((level - 1).min(31));
    let small = (u64::from(settings.small_blind) * mult)
        .min(u64::from(Chips::MAX)) as Chips;
    let small_blind = small.max(1);
    let big = (u64::from(settings.big_blind) * mult)
        .min(u64::from(Chips::MAX)) as Chips;
    let big_blind = big.max(small_blind.saturating_mul(2));

    BlindState {
        level,
        small_blind,
        big_blind,
        next_level_at: Some(started_at + interval * (level as i32)),
        started_at,
    }
}
