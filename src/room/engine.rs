//! State and rules of a single room.
//!
//! `RoomEngine` is plain synchronous state: seats, spectators, host,
//! bans, the live hand and the archives. The actor in
//! [`crate::room::actor`] owns one engine and serializes every call, so
//! nothing in here needs a lock.

use std::collections::{HashSet, VecDeque};

use argon2::{Argon2, PasswordHash, PasswordVerifier};
use chrono::{DateTime, Duration, Utc};
use log::{info, warn};

use crate::game::constants::{
    AUTO_NEXT_HAND_DELAY_MS, HAND_HISTORY_CAPACITY, HAND_HISTORY_TAIL, HAND_REPLAY_TAIL,
    ROOM_LOG_CAPACITY, ROOM_LOG_TAIL,
};
use crate::game::entities::{
    BlindSnapshot, HandHistoryEntry, Player, PlayerAction, PlayerId, SeatOutcome, Spectator,
    normalize_ban_key, sanitize_name,
};
use crate::game::hand::{ActionError, Hand, HandSetup};
use crate::room::config::{BlindState, RoomSettings, blind_state};
use crate::room::messages::{
    ActionStateView, GameStateView, HandSummaryView, LobbySummary, PlayerView, Role, RoomError,
    RoomResult, RoomStateView, SpectatorView, StackAfterView,
};

pub struct RoomEngine {
    pub id: String,
    pub name: String,
    passphrase_hash: Option<String>,
    host_id: Option<PlayerId>,
    players: Vec<Player>,
    spectators: Vec<Spectator>,
    settings: RoomSettings,
    created_at: DateTime<Utc>,
    tournament_started_at: Option<DateTime<Utc>>,
    session_ends_at: DateTime<Utc>,
    session_expired_notified: bool,
    hand: Option<Hand>,
    last_dealer_id: Option<PlayerId>,
    hand_history: VecDeque<HandHistoryEntry>,
    logs: VecDeque<String>,
    banned_names: HashSet<String>,
    auto_start_at: Option<DateTime<Utc>>,
}

impl RoomEngine {
    /// Create a room with its creator seated at seat 1 as host.
    pub fn new(
        id: String,
        name: String,
        passphrase_hash: Option<String>,
        settings: RoomSettings,
        host_id: PlayerId,
        host_name: &str,
    ) -> Self {
        let settings = settings.normalized();
        let now = Utc::now();
        let host = Player::new(host_id, sanitize_name(host_name), 1, settings.starting_stack);
        let session_ends_at = now + Duration::minutes(i64::from(settings.session_minutes));
        let mut engine = Self {
            id,
            name,
            passphrase_hash,
            host_id: Some(host_id),
            players: vec![host],
            spectators: Vec::new(),
            settings,
            created_at: now,
            tournament_started_at: None,
            session_ends_at,
            session_expired_notified: false,
            hand: None,
            last_dealer_id: None,
            hand_history: VecDeque::new(),
            logs: VecDeque::new(),
            banned_names: HashSet::new(),
            auto_start_at: None,
        };
        let line = format!("{} created the room {}", engine.players[0].name, engine.name);
        engine.log(line);
        engine
    }

    fn log(&mut self, message: String) {
        self.logs.push_back(format!("{} {message}", Utc::now().format("%H:%M:%S")));
        while self.logs.len() > ROOM_LOG_CAPACITY {
            self.logs.pop_front();
        }
    }

    fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    fn player_mut(&mut self, id: PlayerId) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.id == id)
    }

    fn spectator(&self, id: PlayerId) -> Option<&Spectator> {
        self.spectators.iter().find(|s| s.id == id)
    }

    fn role(&self, id: PlayerId) -> Option<Role> {
        if self.player(id).is_some() {
            Some(Role::Player)
        } else if self.spectator(id).is_some() {
            Some(Role::Spectator)
        } else {
            None
        }
    }

    fn next_seat(&self) -> Option<usize> {
        let used: HashSet<usize> = self.players.iter().map(|p| p.seat).collect();
        (1..=self.settings.max_players).find(|seat| !used.contains(seat))
    }

    fn hand_live(&self) -> bool {
        self.hand.as_ref().is_some_and(|h| !h.finished())
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.session_ends_at
    }

    fn ensure_expiry_log(&mut self) {
        if self.is_expired() && !self.session_expired_notified {
            self.session_expired_notified = true;
            self.log("session time is up, no new hands can start".to_string());
        }
    }

    fn blind_state_now(&self) -> BlindState {
        blind_state(&self.settings, self.created_at, self.tournament_started_at, Utc::now())
    }

    fn effective_big_blind(&self) -> crate::game::Chips {
        match &self.hand {
            Some(h) if !h.finished() => h.big_blind,
            _ => self.blind_state_now().big_blind,
        }
    }

    fn reassign_host(&mut self) {
        if let Some(host) = self.host_id
            && self.role(host).is_some()
        {
            return;
        }
        self.host_id = self
            .players
            .first()
            .map(|p| p.id)
            .or_else(|| self.spectators.first().map(|s| s.id));
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.players.is_empty() && self.spectators.is_empty()
    }

    // --- membership ---

    pub fn join(
        &mut self,
        member_id: PlayerId,
        name: &str,
        passphrase: Option<&str>,
        spectator: bool,
    ) -> RoomResult<Role> {
        if let Some(role) = self.role(member_id) {
            return Ok(role);
        }
        let name = sanitize_name(name);
        if self.banned_names.contains(&normalize_ban_key(&name)) {
            return Err(RoomError::NameBanned);
        }
        self.verify_passphrase(passphrase)?;

        if spectator {
            if !self.settings.allow_spectators {
                return Err(RoomError::SpectatorsDisabled);
            }
            self.spectators.push(Spectator {
                id: member_id,
                name: name.clone(),
                connected: true,
            });
            self.log(format!("{name} joined as spectator"));
            return Ok(Role::Spectator);
        }

        let seat = self.next_seat().ok_or(RoomError::RoomFull)?;
        self.players
            .push(Player::new(member_id, name.clone(), seat, self.settings.starting_stack));
        self.reassign_host();
        self.log(format!("{name} joined the room"));
        Ok(Role::Player)
    }

    fn verify_passphrase(&self, passphrase: Option<&str>) -> RoomResult<()> {
        let Some(hash) = &self.passphrase_hash else {
            return Ok(());
        };
        let parsed = PasswordHash::new(hash).map_err(|e| {
            warn!("room {}: stored passphrase hash is invalid: {e}", self.id);
            RoomError::WrongPassphrase
        })?;
        let given = passphrase.unwrap_or_default();
        Argon2::default()
            .verify_password(given.as_bytes(), &parsed)
            .map_err(|_| RoomError::WrongPassphrase)
    }

    pub fn take_seat(&mut self, member_id: PlayerId) -> RoomResult<usize> {
        let spectator = self.spectator(member_id).ok_or(RoomError::NotSpectator)?.clone();
        let seat = self.next_seat().ok_or(RoomError::RoomFull)?;
        self.spectators.retain(|s| s.id != member_id);
        self.players
            .push(Player::new(member_id, spectator.name.clone(), seat, self.settings.starting_stack));
        self.reassign_host();
        self.log(format!("{} took seat {seat}", spectator.name));
        Ok(seat)
    }

    pub fn become_spectator(&mut self, member_id: PlayerId) -> RoomResult<()> {
        if !self.settings.allow_spectators {
            return Err(RoomError::SpectatorsDisabled);
        }
        let player = self.player(member_id).ok_or(RoomError::NotSeated)?;
        if self.hand_live() && player.in_hand {
            return Err(RoomError::InHand);
        }
        let name = player.name.clone();
        self.players.retain(|p| p.id != member_id);
        self.spectators.push(Spectator {
            id: member_id,
            name: name.clone(),
            connected: true,
        });
        self.reassign_host();
        self.log(format!("{name} switched to spectating"));
        Ok(())
    }

    pub fn change_seat(
        &mut self,
        member_id: PlayerId,
        target_id: PlayerId,
        seat: usize,
    ) -> RoomResult<()> {
        if self.player(member_id).is_none() {
            return Err(RoomError::NotSeated);
        }
        if target_id != member_id && self.host_id != Some(member_id) {
            return Err(RoomError::NotHost);
        }
        let target = self.player(target_id).ok_or(RoomError::MemberNotFound)?;
        if self.hand_live() && target.contending() {
            return Err(RoomError::InHand);
        }
        if seat == 0 || seat > self.settings.max_players {
            return Err(RoomError::InvalidSeat);
        }
        if target.seat == seat {
            return Ok(());
        }
        let target_name = target.name.clone();
        let old_seat = target.seat;

        match self.players.iter().position(|p| p.seat == seat) {
            None => {
                self.player_mut(target_id).expect("target checked").seat = seat;
                self.log(format!("{target_name} moved from seat {old_seat} to seat {seat}"));
                Ok(())
            }
            Some(occ_idx) => {
                // Swapping over someone's head is a host power, and never
                // while the occupant is in a hand.
                let occupant_in_hand = self.hand_live() && self.players[occ_idx].contending();
                if self.host_id != Some(member_id) || occupant_in_hand {
                    return Err(RoomError::SeatOccupied);
                }
                let occupant_name = self.players[occ_idx].name.clone();
                self.players[occ_idx].seat = old_seat;
                self.player_mut(target_id).expect("target checked").seat = seat;
                self.log(format!(
                    "{target_name} and {occupant_name} swapped seats ({old_seat}<->{seat})"
                ));
                Ok(())
            }
        }
    }

    pub fn toggle_ready(&mut self, member_id: PlayerId) -> RoomResult<bool> {
        if self.hand_live() {
            return Err(RoomError::HandInProgress);
        }
        let starting_stack = self.settings.starting_stack;
        let player = self.player_mut(member_id).ok_or(RoomError::NotSeated)?;
        let mut rebuy = None;
        if player.stack == 0 {
            player.stack = starting_stack;
            rebuy = Some(player.name.clone());
        }
        player.ready = !player.ready;
        let ready = player.ready;
        let name = player.name.clone();
        if let Some(name) = rebuy {
            self.log(format!("{name} re-bought for {starting_stack}"));
        }
        self.log(format!(
            "{name} is {}",
            if ready { "ready" } else { "no longer ready" }
        ));
        Ok(ready)
    }

    // --- hand lifecycle ---

    #[must_use]
    pub fn can_start(&self) -> bool {
        if self.hand_live() || self.is_expired() {
            return false;
        }
        self.players
            .iter()
            .filter(|p| p.ready && p.stack > 0 && p.connected)
            .count()
            >= 2
    }

    pub fn start_hand(&mut self, member_id: PlayerId) -> RoomResult<()> {
        self.auto_start_at = None;
        if self.host_id != Some(member_id) {
            return Err(RoomError::NotHost);
        }
        if self.player(member_id).is_none() {
            return Err(RoomError::HostNotSeated);
        }
        if self.hand_live() {
            return Err(RoomError::HandInProgress);
        }
        self.ensure_expiry_log();
        if self.is_expired() {
            return Err(RoomError::SessionExpired);
        }

        let mut participants: Vec<&Player> = self
            .players
            .iter()
            .filter(|p| p.ready && p.stack > 0 && p.connected)
            .collect();
        participants.sort_by_key(|p| p.seat);
        if participants.len() < 2 {
            return Err(RoomError::NotEnoughPlayers);
        }
        let order: Vec<PlayerId> = participants.iter().map(|p| p.id).collect();

        for p in &mut self.players {
            p.reset_hand_flags();
        }

        // Button moves one spot past wherever it last was.
        let prev_dealer = self
            .last_dealer_id
            .filter(|id| order.contains(id))
            .unwrap_or(*order.last().expect("at least two participants"));
        let prev_idx = order.iter().position(|&id| id == prev_dealer).expect("in order");
        let dealer_id = order[(prev_idx + 1) % order.len()];
        self.last_dealer_id = Some(dealer_id);

        let dealer_idx = order.iter().position(|&id| id == dealer_id).expect("in order");
        let (sb_idx, bb_idx) = if order.len() == 2 {
            (dealer_idx, (dealer_idx + 1) % 2)
        } else {
            let sb = (dealer_idx + 1) % order.len();
            (sb, (sb + 1) % order.len())
        };

        if self.settings.tournament_mode && self.tournament_started_at.is_none() {
            self.tournament_started_at = Some(Utc::now());
        }
        let blinds = self.blind_state_now();

        let setup = HandSetup {
            small_blind_id: order[sb_idx],
            big_blind_id: order[bb_idx],
            order,
            dealer_id,
            blind_level: blinds.level,
            small_blind: blinds.small_blind,
            big_blind: blinds.big_blind,
            next_blind_at: blinds.next_level_at,
            allow_straddle: self.settings.allow_straddle,
            turn_time_secs: self.settings.turn_time_secs,
        };

        let hand = Hand::deal(setup, &mut self.players);
        let dealer_name = self
            .player(dealer_id)
            .map(|p| p.name.clone())
            .unwrap_or_default();
        let line = format!("hand {} starts, dealer {dealer_name}", hand.hand_no);
        info!("room {}: {line}", self.id);
        self.hand = Some(hand);
        self.log(line);
        Ok(())
    }

    pub fn apply_action(&mut self, member_id: PlayerId, action: PlayerAction) -> RoomResult<()> {
        let hand = self.hand.as_mut().ok_or(ActionError::NoHandInProgress)?;
        hand.apply_action(&mut self.players, member_id, action)?;
        self.after_hand_progress();
        Ok(())
    }

    /// Act for a player whose turn clock expired. Ignores fires that no
    /// longer match the live hand and turn they were armed for.
    pub fn handle_turn_timeout(&mut self, hand_no: u64, player_id: PlayerId) {
        let Some(hand) = self.hand.as_mut() else {
            return;
        };
        if hand.finished() || hand.hand_no != hand_no || hand.turn_id != Some(player_id) {
            return;
        }
        let Some(player) = self.players.iter().find(|p| p.id == player_id) else {
            return;
        };
        let name = player.name.clone();

        let (action, note) = if hand.awaiting_straddle {
            (PlayerAction::SkipStraddle, format!("{name} timed out, straddle skipped"))
        } else if hand.to_call(player) == 0 {
            (PlayerAction::Check, format!("{name} timed out, checked"))
        } else {
            (PlayerAction::Fold, format!("{name} timed out, folded"))
        };

        if hand.apply_action(&mut self.players, player_id, action).is_ok() {
            self.log(note);
            self.after_hand_progress();
        }
    }

    /// Start the next hand once the post-hand delay has elapsed.
    pub fn try_auto_start(&mut self) {
        let Some(at) = self.auto_start_at else {
            return;
        };
        if Utc::now() < at {
            return;
        }
        self.auto_start_at = None;
        if self.hand_live() || !self.can_start() {
            return;
        }
        // A departed host must not wedge the room.
        if self.host_id.and_then(|id| self.player(id).map(|_| ())).is_none()
            && let Some(first) = self.players.first()
        {
            self.host_id = Some(first.id);
        }
        let Some(host) = self.host_id else {
            return;
        };
        if self.start_hand(host).is_ok() {
            self.log("next hand started automatically".to_string());
        }
    }

    fn after_hand_progress(&mut self) {
        let finished = self.hand.as_ref().is_some_and(|h| h.finished() && !h.archived);
        if !finished {
            return;
        }
        self.archive_finished_hand();

        let winner_lines: Vec<String> = self
            .hand
            .as_ref()
            .and_then(|h| h.result.as_ref())
            .map(|r| {
                r.winners
                    .iter()
                    .map(|w| format!("{} wins {}", w.name, w.amount))
                    .collect()
            })
            .unwrap_or_default();
        for line in winner_lines {
            self.log(line);
        }
        self.cleanup_disconnected();

        if self.can_start() {
            self.auto_start_at =
                Some(Utc::now() + Duration::milliseconds(AUTO_NEXT_HAND_DELAY_MS as i64));
        }
    }

    fn archive_finished_hand(&mut self) {
        let Some(hand) = self.hand.as_mut() else {
            return;
        };
        if !hand.finished() || hand.archived {
            return;
        }
        let players = &self.players;
        let outcomes: Vec<SeatOutcome> = hand
            .order
            .iter()
            .map(|&id| {
                let p = players.iter().find(|p| p.id == id);
                SeatOutcome {
                    player_id: id,
                    name: p.map(|p| p.name.clone()).unwrap_or_else(|| id.to_string()),
                    seat: p.map_or(0, |p| p.seat),
                    stack_after: p.map_or(0, |p| p.stack),
                }
            })
            .collect();

        let entry = HandHistoryEntry {
            hand_no: hand.hand_no,
            started_at: hand.started_at,
            ended_at: Utc::now(),
            blinds: BlindSnapshot {
                level: hand.blind_level,
                small_blind: hand.small_blind,
                big_blind: hand.big_blind,
            },
            players: outcomes,
            board: hand.community.clone(),
            result: hand.result.clone(),
            actions: hand.action_log.clone(),
        };
        hand.archived = true;

        self.hand_history.push_back(entry);
        while self.hand_history.len() > HAND_HISTORY_CAPACITY {
            self.hand_history.pop_front();
        }
    }

    fn cleanup_disconnected(&mut self) {
        self.spectators.retain(|s| s.connected);
        if !self.hand_live() {
            self.players.retain(|p| p.connected);
        }
        self.reassign_host();
    }

    // --- presence ---

    pub fn disconnect(&mut self, member_id: PlayerId) {
        if let Some(s) = self.spectators.iter_mut().find(|s| s.id == member_id) {
            let name = s.name.clone();
            s.connected = false;
            self.log(format!("{name} went offline (spectator)"));
            self.cleanup_disconnected();
            return;
        }
        let Some(player) = self.player_mut(member_id) else {
            return;
        };
        player.connected = false;
        let name = player.name.clone();
        let in_hand = player.in_hand;

        if self.hand_live() && in_hand {
            // The seat row stays until the hand settles so the pot keeps
            // its chips; cleanup reaps it afterwards.
            if let Some(hand) = self.hand.as_mut() {
                hand.force_fold(&mut self.players, member_id, "disconnected");
            }
            self.log(format!("{name} disconnected, folded"));
            self.after_hand_progress();
            return;
        }
        self.players.retain(|p| p.id != member_id);
        self.log(format!("{name} went offline"));
        self.cleanup_disconnected();
    }

    pub fn reconnect(&mut self, member_id: PlayerId) -> RoomResult<Role> {
        if let Some(p) = self.player_mut(member_id) {
            p.connected = true;
            let name = p.name.clone();
            self.log(format!("{name} reconnected"));
            return Ok(Role::Player);
        }
        if let Some(s) = self.spectators.iter_mut().find(|s| s.id == member_id) {
            s.connected = true;
            return Ok(Role::Spectator);
        }
        Err(RoomError::MemberNotFound)
    }

    pub fn leave(&mut self, member_id: PlayerId) {
        if self.spectator(member_id).is_some() {
            let name = self.spectator(member_id).map(|s| s.name.clone()).unwrap_or_default();
            self.spectators.retain(|s| s.id != member_id);
            self.log(format!("{name} stopped spectating"));
            self.cleanup_disconnected();
            return;
        }
        let Some(player) = self.player_mut(member_id) else {
            return;
        };
        let name = player.name.clone();
        let in_hand = player.in_hand;

        if self.hand_live() && in_hand {
            if let Some(p) = self.player_mut(member_id) {
                p.connected = false;
            }
            if let Some(hand) = self.hand.as_mut() {
                hand.force_fold(&mut self.players, member_id, "left the room");
            }
            self.log(format!("{name} left the room, folded"));
            self.after_hand_progress();
        } else {
            self.players.retain(|p| p.id != member_id);
            self.log(format!("{name} left the room"));
        }
        self.cleanup_disconnected();
    }

    // --- host powers ---

    pub fn remove_member(
        &mut self,
        member_id: PlayerId,
        target_id: PlayerId,
        ban: bool,
    ) -> RoomResult<()> {
        if self.host_id != Some(member_id) {
            return Err(RoomError::NotHost);
        }
        if target_id == member_id {
            return Err(RoomError::CannotTargetSelf);
        }

        if let Some(s) = self.spectator(target_id) {
            let name = s.name.clone();
            if ban {
                self.banned_names.insert(normalize_ban_key(&name));
            }
            self.spectators.retain(|s| s.id != target_id);
            self.log(format!(
                "{name} was {} by the host",
                if ban { "banned" } else { "removed" }
            ));
            self.cleanup_disconnected();
            return Ok(());
        }

        let player = self.player(target_id).ok_or(RoomError::MemberNotFound)?;
        let name = player.name.clone();
        let in_hand = player.in_hand;
        if ban {
            self.banned_names.insert(normalize_ban_key(&name));
        }

        if self.hand_live() && in_hand {
            if let Some(p) = self.player_mut(target_id) {
                p.connected = false;
            }
            if let Some(hand) = self.hand.as_mut() {
                hand.force_fold(&mut self.players, target_id, if ban { "banned" } else { "kicked" });
            }
            self.after_hand_progress();
        } else {
            self.players.retain(|p| p.id != target_id);
        }
        self.log(format!(
            "{name} was {} by the host",
            if ban { "banned" } else { "removed" }
        ));
        self.cleanup_disconnected();
        Ok(())
    }

    pub fn unban(&mut self, member_id: PlayerId, name: &str) -> RoomResult<()> {
        if self.host_id != Some(member_id) {
            return Err(RoomError::NotHost);
        }
        let key = normalize_ban_key(name);
        if key.is_empty() {
            return Err(RoomError::MemberNotFound);
        }
        self.banned_names.remove(&key);
        self.log(format!("host unbanned {name}"));
        Ok(())
    }

    // --- timers (read by the actor) ---

    /// The live turn clock as a stale-safe token: hand number, player on
    /// the clock and the deadline.
    #[must_use]
    pub fn turn_token(&self) -> Option<(u64, PlayerId, DateTime<Utc>)> {
        let hand = self.hand.as_ref()?;
        if hand.finished() {
            return None;
        }
        Some((hand.hand_no, hand.turn_id?, hand.turn_deadline_at?))
    }

    #[must_use]
    pub fn auto_start_deadline(&self) -> Option<DateTime<Utc>> {
        self.auto_start_at
    }

    // --- views ---

    fn build_action_state(&self, viewer: &Player) -> Option<ActionStateView> {
        let hand = self.hand.as_ref()?;
        if hand.finished() || hand.turn_id != Some(viewer.id) || !viewer.can_act() {
            return None;
        }

        let max_to = viewer.all_in_target();
        if hand.awaiting_straddle {
            let min_to = hand.current_bet * 2;
            return Some(ActionStateView::Straddle {
                can_straddle: max_to > hand.current_bet,
                min_straddle_to: min_to,
                default_straddle_to: min_to.min(max_to),
                max_to,
            });
        }

        let to_call = hand.to_call(viewer);
        Some(ActionStateView::Normal {
            to_call,
            can_check: to_call == 0,
            can_call: to_call > 0 && viewer.stack > 0,
            can_bet: hand.current_bet == 0 && viewer.stack > 0,
            can_raise: hand.current_bet > 0 && max_to > hand.current_bet && viewer.stack > to_call,
            min_bet_to: self.effective_big_blind(),
            min_raise_to: hand.current_bet + hand.min_raise,
            max_to,
        })
    }

    /// Snapshot the room for one viewer. Hole cards are included only on
    /// the viewer's own seat and on seats revealed by a settlement.
    pub fn serialize(&mut self, viewer_id: PlayerId) -> RoomStateView {
        self.ensure_expiry_log();

        let viewer_role = self.role(viewer_id);
        let viewer = self.player(viewer_id);
        let revealed = self
            .hand
            .as_ref()
            .and_then(|h| h.result.as_ref())
            .map(|r| r.revealed.keys().copied().collect::<HashSet<_>>())
            .unwrap_or_default();

        let mut players: Vec<PlayerView> = self
            .players
            .iter()
            .map(|p| {
                let show = p.id == viewer_id || revealed.contains(&p.id);
                PlayerView {
                    id: p.id,
                    name: p.name.clone(),
                    seat: p.seat,
                    stack: p.stack,
                    ready: p.ready,
                    connected: p.connected,
                    in_hand: p.in_hand,
                    folded: p.folded,
                    all_in: p.all_in,
                    bet_this_street: p.bet_this_street,
                    total_contribution: p.total_contribution,
                    last_action: p.last_action.clone(),
                    hole_cards: if show { p.hole_cards.clone() } else { Vec::new() },
                }
            })
            .collect();
        players.sort_by_key(|p| p.seat);

        let spectators: Vec<SpectatorView> = self
            .spectators
            .iter()
            .map(|s| SpectatorView {
                id: s.id,
                name: s.name.clone(),
                connected: s.connected,
            })
            .collect();

        let blind_state = match &self.hand {
            Some(h) if !h.finished() => BlindState {
                level: h.blind_level,
                small_blind: h.small_blind,
                big_blind: h.big_blind,
                next_level_at: h.next_blind_at,
                started_at: self.tournament_started_at.unwrap_or(self.created_at),
            },
            _ => self.blind_state_now(),
        };

        let game = self.hand.as_ref().map(|h| GameStateView {
            hand_no: h.hand_no,
            phase: h.phase,
            community: h.community.clone(),
            dealer_id: h.dealer_id,
            small_blind_id: h.small_blind_id,
            big_blind_id: h.big_blind_id,
            blind_level: h.blind_level,
            small_blind: h.small_blind,
            big_blind: h.big_blind,
            next_blind_at: h.next_blind_at,
            turn_id: h.turn_id,
            turn_deadline_at: h.turn_deadline_at,
            current_bet: h.current_bet,
            min_raise: h.min_raise,
            pot_total: crate::game::pot::pot_total(&self.players),
            finished: h.finished(),
            result: h.result.clone(),
            pending: h.pending.clone(),
            awaiting_straddle: h.awaiting_straddle,
            straddle_player_id: h.straddle_player_id,
            straddle_amount: h.straddle_amount,
            action_log: h.action_log.clone(),
        });

        let can_take_seat = viewer_role == Some(Role::Spectator)
            && self.players.len() < self.settings.max_players;
        let can_become_spectator = viewer_role == Some(Role::Player)
            && self.settings.allow_spectators
            && (!self.hand_live() || viewer.is_none_or(|p| !p.in_hand));

        RoomStateView {
            room_id: self.id.clone(),
            room_name: self.name.clone(),
            host_id: self.host_id,
            viewer_id,
            viewer_role,
            has_passphrase: self.passphrase_hash.is_some(),
            settings: self.settings.clone(),
            blind_state,
            session_ends_at: self.session_ends_at,
            session_expired: self.is_expired(),
            auto_start_at: self.auto_start_at,
            action_state: viewer.and_then(|v| self.build_action_state(v)),
            players,
            spectators,
            logs: self
                .logs
                .iter()
                .rev()
                .take(ROOM_LOG_TAIL)
                .rev()
                .cloned()
                .collect(),
            game,
            can_start: self.can_start(),
            can_take_seat,
            can_become_spectator,
            banned_names: if self.host_id == Some(viewer_id) {
                self.banned_names.iter().cloned().collect()
            } else {
                Vec::new()
            },
            hand_history: self.history_tail(HAND_HISTORY_TAIL),
        }
    }

    fn history_tail(&self, tail: usize) -> Vec<HandSummaryView> {
        self.hand_history
            .iter()
            .rev()
            .take(tail)
            .map(|h| HandSummaryView {
                hand_no: h.hand_no,
                started_at: h.started_at,
                ended_at: h.ended_at,
                small_blind: h.blinds.small_blind,
                big_blind: h.blinds.big_blind,
                blind_level: h.blinds.level,
                winners: h.result.as_ref().map(|r| r.winners.clone()).unwrap_or_default(),
                stacks_after: h
                    .players
                    .iter()
                    .map(|p| StackAfterView {
                        player_id: p.player_id,
                        name: p.name.clone(),
                        stack_after: p.stack_after,
                    })
                    .collect(),
            })
            .collect()
    }

    #[must_use]
    pub fn hand_history_tail(&self) -> Vec<HandSummaryView> {
        self.history_tail(HAND_REPLAY_TAIL)
    }

    pub fn hand_replay(&self, hand_no: u64) -> RoomResult<HandHistoryEntry> {
        self.hand_history
            .iter()
            .find(|h| h.hand_no == hand_no)
            .cloned()
            .ok_or(RoomError::ReplayNotFound)
    }

    #[must_use]
    pub fn lobby_summary(&self) -> LobbySummary {
        let in_game = self.hand_live();
        let blind = match &self.hand {
            Some(h) if !h.finished() => BlindState {
                level: h.blind_level,
                small_blind: h.small_blind,
                big_blind: h.big_blind,
                next_level_at: h.next_blind_at,
                started_at: self.tournament_started_at.unwrap_or(self.created_at),
            },
            _ => self.blind_state_now(),
        };
        LobbySummary {
            room_id: self.id.clone(),
            room_name: self.name.clone(),
            has_passphrase: self.passphrase_hash.is_some(),
            player_count: self.players.len(),
            ready_count: self.players.iter().filter(|p| p.ready).count(),
            spectator_count: self.spectators.len(),
            max_players: self.settings.max_players,
            in_game,
            small_blind: blind.small_blind,
            big_blind: blind.big_blind,
            blind_level: blind.level,
            tournament_mode: self.settings.tournament_mode,
            blind_interval_minutes: self.settings.blind_interval_minutes,
            allow_straddle: self.settings.allow_straddle,
            expires_at: self.session_ends_at,
            expired: self.is_expired(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::Chips;
    use argon2::password_hash::{PasswordHasher, SaltString, rand_core::OsRng};

    fn room_with(settings: RoomSettings) -> (RoomEngine, PlayerId) {
        let host = PlayerId::new();
        let engine = RoomEngine::new(
            "TEST42".to_string(),
            "test room".to_string(),
            None,
            settings,
            host,
            "host",
        );
        (engine, host)
    }

    fn seat_guest(engine: &mut RoomEngine, name: &str) -> PlayerId {
        let id = PlayerId::new();
        engine.join(id, name, None, false).unwrap();
        id
    }

    fn total_chips(engine: &RoomEngine) -> Chips {
        engine
            .players
            .iter()
            .map(|p| p.stack + p.total_contribution)
            .sum()
    }

    fn hash_of(pass: &str) -> String {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(pass.as_bytes(), &salt)
            .unwrap()
            .to_string()
    }

    #[test]
    fn creator_is_seated_host() {
        let (engine, host) = room_with(RoomSettings::default());
        assert_eq!(engine.host_id, Some(host));
        assert_eq!(engine.players.len(), 1);
        assert_eq!(engine.players[0].seat, 1);
        assert_eq!(engine.players[0].stack, 2_000);
    }

    #[test]
    fn join_fills_lowest_free_seat_and_respects_capacity() {
        let settings = RoomSettings {
            max_players: 2,
            ..RoomSettings::default()
        };
        let (mut engine, _) = room_with(settings);
        let guest = seat_guest(&mut engine, "guest");
        assert_eq!(engine.player(guest).unwrap().seat, 2);

        let overflow = PlayerId::new();
        let err = engine.join(overflow, "late", None, false).unwrap_err();
        assert!(matches!(err, RoomError::RoomFull));
    }

    #[test]
    fn passphrase_is_verified_on_join() {
        let host = PlayerId::new();
        let mut engine = RoomEngine::new(
            "SECRET".to_string(),
            "private".to_string(),
            Some(hash_of("open sesame")),
            RoomSettings::default(),
            host,
            "host",
        );
        let guest = PlayerId::new();
        assert!(matches!(
            engine.join(guest, "guest", Some("wrong"), false),
            Err(RoomError::WrongPassphrase)
        ));
        assert!(matches!(
            engine.join(guest, "guest", None, false),
            Err(RoomError::WrongPassphrase)
        ));
        assert!(engine.join(guest, "guest", Some("open sesame"), false).is_ok());
    }

    #[test]
    fn banned_name_cannot_rejoin() {
        let (mut engine, host) = room_with(RoomSettings::default());
        let guest = seat_guest(&mut engine, "Mallory");
        engine.remove_member(host, guest, true).unwrap();
        assert!(engine.player(guest).is_none());

        let retry = PlayerId::new();
        assert!(matches!(
            engine.join(retry, " mallory ", None, false),
            Err(RoomError::NameBanned)
        ));
        engine.unban(host, "MALLORY").unwrap();
        assert!(engine.join(retry, "mallory", None, false).is_ok());
    }

    #[test]
    fn only_host_starts_hands() {
        let (mut engine, _) = room_with(RoomSettings::default());
        let guest = seat_guest(&mut engine, "guest");
        assert!(matches!(engine.start_hand(guest), Err(RoomError::NotHost)));
    }

    #[test]
    fn start_hand_needs_two_ready_players() {
        let (mut engine, host) = room_with(RoomSettings::default());
        assert!(matches!(
            engine.start_hand(host),
            Err(RoomError::NotEnoughPlayers)
        ));
        seat_guest(&mut engine, "guest");
        assert!(engine.start_hand(host).is_ok());
        assert!(engine.hand_live());
    }

    #[test]
    fn starting_twice_is_rejected() {
        let (mut engine, host) = room_with(RoomSettings::default());
        seat_guest(&mut engine, "guest");
        engine.start_hand(host).unwrap();
        assert!(matches!(
            engine.start_hand(host),
            Err(RoomError::HandInProgress)
        ));
    }

    #[test]
    fn dealer_button_rotates_between_hands() {
        let settings = RoomSettings {
            allow_straddle: false,
            ..RoomSettings::default()
        };
        let (mut engine, host) = room_with(settings);
        seat_guest(&mut engine, "b");
        seat_guest(&mut engine, "c");

        engine.start_hand(host).unwrap();
        let first_dealer = engine.hand.as_ref().unwrap().dealer_id;

        // Fold everyone out to end the hand, then start the next.
        while engine.hand_live() {
            let turn = engine.hand.as_ref().unwrap().turn_id.unwrap();
            engine.apply_action(turn, PlayerAction::Fold).unwrap();
        }
        engine.start_hand(host).unwrap();
        let second_dealer = engine.hand.as_ref().unwrap().dealer_id;
        assert_ne!(first_dealer, second_dealer);
    }

    #[test]
    fn finished_hand_is_archived_once_with_outcomes() {
        let settings = RoomSettings {
            allow_straddle: false,
            ..RoomSettings::default()
        };
        let (mut engine, host) = room_with(settings);
        seat_guest(&mut engine, "guest");
        engine.start_hand(host).unwrap();
        let before = total_chips(&engine);
        while engine.hand_live() {
            let turn = engine.hand.as_ref().unwrap().turn_id.unwrap();
            engine.apply_action(turn, PlayerAction::Fold).unwrap();
        }
        assert_eq!(engine.hand_history.len(), 1);
        let entry = &engine.hand_history[0];
        assert_eq!(entry.players.len(), 2);
        assert!(entry.result.is_some());
        assert_eq!(total_chips(&engine), before);
        // Hand flags reset for the next deal.
        assert!(engine.players.iter().all(|p| !p.in_hand));
        assert!(engine.auto_start_at.is_some());
    }

    #[test]
    fn timeout_checks_when_free_and_folds_when_facing_a_bet() {
        let settings = RoomSettings {
            allow_straddle: false,
            ..RoomSettings::default()
        };
        let (mut engine, host) = room_with(settings);
        seat_guest(&mut engine, "b");
        seat_guest(&mut engine, "c");
        engine.start_hand(host).unwrap();

        let (hand_no, turn, _) = engine.turn_token().unwrap();
        // Facing the big blind: timeout folds.
        engine.handle_turn_timeout(hand_no, turn);
        let folded = engine.player(turn).unwrap();
        assert!(folded.folded);
    }

    #[test]
    fn stale_timeout_token_is_ignored() {
        let settings = RoomSettings {
            allow_straddle: false,
            ..RoomSettings::default()
        };
        let (mut engine, host) = room_with(settings);
        seat_guest(&mut engine, "b");
        seat_guest(&mut engine, "c");
        engine.start_hand(host).unwrap();

        let (hand_no, turn, _) = engine.turn_token().unwrap();
        engine.apply_action(turn, PlayerAction::Fold).unwrap();
        // The fire armed for the old turn must be a no-op now.
        engine.handle_turn_timeout(hand_no, turn);
        let (_, next_turn, _) = engine.turn_token().unwrap();
        assert!(!engine.player(next_turn).unwrap().folded);
    }

    #[test]
    fn straddle_timeout_skips_the_straddle() {
        let (mut engine, host) = room_with(RoomSettings::default());
        seat_guest(&mut engine, "b");
        seat_guest(&mut engine, "c");
        engine.start_hand(host).unwrap();
        assert!(engine.hand.as_ref().unwrap().awaiting_straddle);

        let (hand_no, turn, _) = engine.turn_token().unwrap();
        engine.handle_turn_timeout(hand_no, turn);
        let hand = engine.hand.as_ref().unwrap();
        assert!(!hand.awaiting_straddle);
        assert!(!engine.player(turn).unwrap().folded);
    }

    #[test]
    fn disconnect_mid_hand_folds_but_keeps_the_seat_until_settlement() {
        let settings = RoomSettings {
            allow_straddle: false,
            ..RoomSettings::default()
        };
        let (mut engine, host) = room_with(settings);
        let b = seat_guest(&mut engine, "b");
        seat_guest(&mut engine, "c");
        engine.start_hand(host).unwrap();
        let before = total_chips(&engine);

        engine.disconnect(b);
        // Chips stay accounted for while the hand runs.
        assert!(engine.player(b).is_some());
        assert!(engine.player(b).unwrap().folded);
        assert_eq!(total_chips(&engine), before);

        while engine.hand_live() {
            let turn = engine.hand.as_ref().unwrap().turn_id.unwrap();
            engine.apply_action(turn, PlayerAction::Fold).unwrap();
        }
        // Reaped once the hand settled.
        assert!(engine.player(b).is_none());
    }

    #[test]
    fn reconnect_restores_presence_without_touching_chips() {
        let settings = RoomSettings {
            allow_straddle: false,
            ..RoomSettings::default()
        };
        let (mut engine, host) = room_with(settings);
        let b = seat_guest(&mut engine, "b");
        seat_guest(&mut engine, "c");
        engine.start_hand(host).unwrap();

        engine.disconnect(b);
        let stack = engine.player(b).unwrap().stack;
        let contribution = engine.player(b).unwrap().total_contribution;
        let role = engine.reconnect(b).unwrap();
        assert_eq!(role, Role::Player);
        let p = engine.player(b).unwrap();
        assert!(p.connected);
        assert_eq!(p.stack, stack);
        assert_eq!(p.total_contribution, contribution);
        assert!(p.folded);
    }

    #[test]
    fn host_leaves_and_host_moves_on() {
        let (mut engine, host) = room_with(RoomSettings::default());
        let guest = seat_guest(&mut engine, "guest");
        engine.leave(host);
        assert_eq!(engine.host_id, Some(guest));
        assert_eq!(engine.players.len(), 1);
    }

    #[test]
    fn toggle_ready_rebuys_busted_stacks() {
        let (mut engine, host) = room_with(RoomSettings::default());
        engine.player_mut(host).unwrap().stack = 0;
        engine.toggle_ready(host).unwrap();
        assert_eq!(engine.player(host).unwrap().stack, 2_000);
    }

    #[test]
    fn hole_cards_only_visible_to_their_owner() {
        let settings = RoomSettings {
            allow_straddle: false,
            ..RoomSettings::default()
        };
        let (mut engine, host) = room_with(settings);
        let guest = seat_guest(&mut engine, "guest");
        engine.start_hand(host).unwrap();

        let host_view = engine.serialize(host);
        let mine = host_view.players.iter().find(|p| p.id == host).unwrap();
        let theirs = host_view.players.iter().find(|p| p.id == guest).unwrap();
        assert_eq!(mine.hole_cards.len(), 2);
        assert!(theirs.hole_cards.is_empty());
    }

    #[test]
    fn settlement_reveals_winner_cards_to_everyone() {
        let settings = RoomSettings {
            allow_straddle: false,
            ..RoomSettings::default()
        };
        let (mut engine, host) = room_with(settings);
        let guest = seat_guest(&mut engine, "guest");
        engine.start_hand(host).unwrap();
        let winner_pending = engine.hand.as_ref().unwrap().turn_id.unwrap();
        engine.apply_action(winner_pending, PlayerAction::Fold).unwrap();

        let view = engine.serialize(guest);
        let result = view.game.unwrap().result.unwrap();
        assert_eq!(result.revealed.len(), 1);
    }

    #[test]
    fn change_seat_moves_and_swaps_with_host_power() {
        let (mut engine, host) = room_with(RoomSettings::default());
        let guest = seat_guest(&mut engine, "guest");

        engine.change_seat(guest, guest, 5).unwrap();
        assert_eq!(engine.player(guest).unwrap().seat, 5);

        // Guest cannot move the host; the host can swap the two.
        assert!(matches!(
            engine.change_seat(guest, host, 9),
            Err(RoomError::NotHost)
        ));
        engine.change_seat(host, host, 5).unwrap();
        assert_eq!(engine.player(host).unwrap().seat, 5);
        assert_eq!(engine.player(guest).unwrap().seat, 1);
    }

    #[test]
    fn expired_session_blocks_new_hands() {
        let (mut engine, host) = room_with(RoomSettings::default());
        seat_guest(&mut engine, "guest");
        engine.session_ends_at = Utc::now() - Duration::seconds(1);
        assert!(matches!(
            engine.start_hand(host),
            Err(RoomError::SessionExpired)
        ));
        assert!(!engine.can_start());
    }

    #[test]
    fn auto_start_deals_the_next_hand() {
        let settings = RoomSettings {
            allow_straddle: false,
            ..RoomSettings::default()
        };
        let (mut engine, host) = room_with(settings);
        seat_guest(&mut engine, "guest");
        engine.start_hand(host).unwrap();
        let first_no = engine.hand.as_ref().unwrap().hand_no;
        while engine.hand_live() {
            let turn = engine.hand.as_ref().unwrap().turn_id.unwrap();
            engine.apply_action(turn, PlayerAction::Fold).unwrap();
        }
        assert!(engine.auto_start_at.is_some());
        engine.auto_start_at = Some(Utc::now() - Duration::seconds(1));
        engine.try_auto_start();
        assert!(engine.hand_live());
        assert!(engine.hand.as_ref().unwrap().hand_no > first_no);
    }

    #[test]
    fn lobby_summary_reflects_room_state() {
        let (mut engine, host) = room_with(RoomSettings::default());
        seat_guest(&mut engine, "guest");
        let summary = engine.lobby_summary();
        assert_eq!(summary.player_count, 2);
        assert!(!summary.in_game);
        assert!(!summary.has_passphrase);

        engine.start_hand(host).unwrap();
        assert!(engine.lobby_summary().in_game);
    }
}
