//! One hand of no-limit hold'em from deal to settlement.
//!
//! `Hand` owns everything that lives exactly as long as one hand: deck,
//! board, betting state and the action log. Per-player chip state stays
//! on the `Player` rows the room owns, so every method that moves chips
//! takes the seat slice. All amounts on the wire are street totals ("to"
//! sizes); increments are derived internally.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Duration, Utc};
use log::debug;
use thiserror::Error;

use super::constants::ACTION_LOG_CAPACITY;
use super::entities::{
    ActionLogEntry, ActionLogKind, Card, Chips, Deck, HandResult, Phase, Player, PlayerAction,
    PlayerId, PotResult, ResultKind, WinnerLine,
};
use super::evaluator::{HandEval, evaluate_seven};
use super::pot::{compute_side_pots, pot_total, split_pot};

static HAND_SEQUENCE: AtomicU64 = AtomicU64::new(1);

/// Rejection of a player intent. Every variant is a caller mistake; the
/// hand state is untouched when one is returned.
#[derive(Clone, Copy, Debug, Eq, Error, PartialEq)]
pub enum ActionError {
    #[error("no hand in progress")]
    NoHandInProgress,
    #[error("only seated players can act")]
    NotSeated,
    #[error("not your turn")]
    OutOfTurn,
    #[error("you cannot act right now")]
    CannotAct,
    #[error("a straddle decision is pending")]
    StraddleDecisionPending,
    #[error("no straddle decision is pending")]
    NoStraddlePending,
    #[error("straddle must exceed the big blind")]
    StraddleTooLow,
    #[error("straddle must reach at least {min_to}")]
    StraddleBelowMinimum { min_to: Chips },
    #[error("check not allowed, there is a bet to match")]
    CheckNotAllowed,
    #[error("nothing to call")]
    NothingToCall,
    #[error("no chips left")]
    NoChips,
    #[error("there is already a bet, raise instead")]
    BetNotAllowed,
    #[error("nothing to raise over, bet instead")]
    RaiseNotAllowed,
    #[error("bet must exceed your current street total")]
    BetTooSmall,
    #[error("bet must reach at least {min_to}")]
    BetBelowMinimum { min_to: Chips },
    #[error("raise must exceed the current bet")]
    RaiseTooSmall,
    #[error("minimum raise is to {min_to}")]
    RaiseBelowMinimum { min_to: Chips },
    #[error("amount exceeds your stack")]
    ExceedsStack,
}

/// Everything the room decides before a hand is dealt.
#[derive(Clone, Debug)]
pub struct HandSetup {
    /// Participants in seat order. Blinds and action rotate through it.
    pub order: Vec<PlayerId>,
    pub dealer_id: PlayerId,
    pub small_blind_id: PlayerId,
    pub big_blind_id: PlayerId,
    pub blind_level: u32,
    pub small_blind: Chips,
    pub big_blind: Chips,
    pub next_blind_at: Option<DateTime<Utc>>,
    pub allow_straddle: bool,
    pub turn_time_secs: u32,
}

#[derive(Clone, Debug)]
pub struct Hand {
    pub hand_no: u64,
    pub started_at: DateTime<Utc>,
    pub phase: Phase,
    deck: Deck,
    pub community: Vec<Card>,
    pub order: Vec<PlayerId>,
    pub pending: Vec<PlayerId>,
    pub turn_id: Option<PlayerId>,
    pub turn_deadline_at: Option<DateTime<Utc>>,
    pub dealer_id: PlayerId,
    pub small_blind_id: PlayerId,
    pub big_blind_id: PlayerId,
    pub blind_level: u32,
    pub small_blind: Chips,
    pub big_blind: Chips,
    pub next_blind_at: Option<DateTime<Utc>>,
    turn_time_secs: u32,
    pub current_bet: Chips,
    pub min_raise: Chips,
    pub result: Option<HandResult>,
    pub action_log: Vec<ActionLogEntry>,
    pub awaiting_straddle: bool,
    pub straddle_player_id: Option<PlayerId>,
    pub straddle_amount: Chips,
    /// Set by the room once the finished hand has been written to the
    /// hand history.
    pub archived: bool,
}

fn player_idx(players: &[Player], id: PlayerId) -> Option<usize> {
    players.iter().position(|p| p.id == id)
}

/// Walk `order` starting one past `from`, wrapping, and return the first
/// index satisfying the predicate. Checks every seat exactly once.
fn next_eligible_from(
    order: &[PlayerId],
    from: usize,
    mut pred: impl FnMut(PlayerId) -> bool,
) -> Option<usize> {
    if order.is_empty() {
        return None;
    }
    let mut i = from;
    for _ in 0..order.len() {
        i = (i + 1) % order.len();
        if pred(order[i]) {
            return Some(i);
        }
    }
    None
}

impl Hand {
    /// Deal a new hand: shuffle, mark participants in-hand, deal hole
    /// cards, post blinds and either prompt a straddle or open the
    /// preflop round.
    pub fn deal(setup: HandSetup, players: &mut [Player]) -> Self {
        let mut deck = Deck::default();
        deck.shuffle();

        let mut hand = Self {
            hand_no: HAND_SEQUENCE.fetch_add(1, Ordering::Relaxed),
            started_at: Utc::now(),
            phase: Phase::Preflop,
            deck,
            community: Vec::with_capacity(5),
            order: setup.order,
            pending: Vec::new(),
            turn_id: None,
            turn_deadline_at: None,
            dealer_id: setup.dealer_id,
            small_blind_id: setup.small_blind_id,
            big_blind_id: setup.big_blind_id,
            blind_level: setup.blind_level,
            small_blind: setup.small_blind,
            big_blind: setup.big_blind,
            next_blind_at: setup.next_blind_at,
            turn_time_secs: setup.turn_time_secs,
            current_bet: 0,
            min_raise: setup.big_blind,
            result: None,
            action_log: Vec::new(),
            awaiting_straddle: false,
            straddle_player_id: None,
            straddle_amount: 0,
            archived: false,
        };

        for id in hand.order.clone() {
            if let Some(i) = player_idx(players, id) {
                let p = &mut players[i];
                p.reset_hand_flags();
                p.in_hand = true;
                p.hole_cards = vec![hand.deck.deal_card(), hand.deck.deal_card()];
            }
        }

        let (sb, bb) = (hand.small_blind, hand.big_blind);
        let mut bb_paid = 0;
        if let Some(i) = player_idx(players, hand.small_blind_id) {
            let paid = players[i].post_chips(sb);
            players[i].last_action = format!("small blind {paid}");
            let name = players[i].name.clone();
            let id = players[i].id;
            hand.log(
                ActionLogEntry::new(ActionLogKind::Blind, format!("{name} posts small blind {paid}"))
                    .with_player(id)
                    .with_amount(paid),
            );
        }
        if let Some(i) = player_idx(players, hand.big_blind_id) {
            bb_paid = players[i].post_chips(bb);
            players[i].last_action = format!("big blind {bb_paid}");
            let name = players[i].name.clone();
            let id = players[i].id;
            hand.log(
                ActionLogEntry::new(ActionLogKind::Blind, format!("{name} posts big blind {bb_paid}"))
                    .with_player(id)
                    .with_amount(bb_paid),
            );
        }

        // A short big blind still only has to be matched, not topped up.
        hand.current_bet = bb_paid;
        hand.min_raise = bb;

        debug!(
            "hand {} dealt, dealer {}, blinds {}/{} (level {})",
            hand.hand_no, hand.dealer_id, sb, bb, hand.blind_level
        );

        if setup.allow_straddle
            && hand.order.len() >= 3
            && let Some(bb_idx) = hand.order.iter().position(|&id| id == hand.big_blind_id)
            && let Some(straddle_idx) = next_eligible_from(&hand.order, bb_idx, |id| {
                player_idx(players, id).is_some_and(|i| players[i].can_act())
            })
        {
            let straddler = hand.order[straddle_idx];
            if let Some(i) = player_idx(players, straddler)
                && players[i].stack > 0
            {
                hand.awaiting_straddle = true;
                hand.straddle_player_id = Some(straddler);
                hand.pending = vec![straddler];
                hand.set_turn(Some(straddler));
                let name = players[i].name.clone();
                hand.log(
                    ActionLogEntry::new(
                        ActionLogKind::StraddlePrompt,
                        format!("{name} may straddle"),
                    )
                    .with_player(straddler),
                );
                return hand;
            }
        }

        let bb_id = hand.big_blind_id;
        hand.begin_preflop_round(players, bb_id);
        hand
    }

    #[must_use]
    pub fn finished(&self) -> bool {
        self.phase == Phase::Finished
    }

    #[must_use]
    pub fn to_call(&self, player: &Player) -> Chips {
        self.current_bet.saturating_sub(player.bet_this_street)
    }

    #[must_use]
    pub fn turn_time_secs(&self) -> u32 {
        self.turn_time_secs
    }

    fn log(&mut self, entry: ActionLogEntry) {
        self.action_log.push(entry);
        if self.action_log.len() > ACTION_LOG_CAPACITY {
            let excess = self.action_log.len() - ACTION_LOG_CAPACITY;
            self.action_log.drain(..excess);
        }
    }

    fn log_action(&mut self, player: &Player, verb: &str, amount: Option<Chips>) {
        let message = match amount {
            Some(n) => format!("{} {verb} {n}", player.name),
            None => format!("{} {verb}", player.name),
        };
        let mut entry = ActionLogEntry::new(ActionLogKind::Action, message).with_player(player.id);
        if let Some(n) = amount {
            entry = entry.with_amount(n);
        }
        self.log(entry);
    }

    fn set_turn(&mut self, player: Option<PlayerId>) {
        self.turn_id = player;
        if player.is_none() || self.finished() {
            self.turn_deadline_at = None;
            return;
        }
        self.turn_deadline_at = Some(Utc::now() + Duration::seconds(i64::from(self.turn_time_secs)));
    }

    fn contenders(players: &[Player]) -> Vec<PlayerId> {
        players.iter().filter(|p| p.contending()).map(|p| p.id).collect()
    }

    fn able_set(players: &[Player]) -> HashSet<PlayerId> {
        players.iter().filter(|p| p.can_act()).map(|p| p.id).collect()
    }

    fn remove_from_pending(&mut self, id: PlayerId) {
        self.pending.retain(|&p| p != id);
    }

    fn reset_pending_after_aggression(&mut self, players: &[Player], aggressor: PlayerId) {
        let able = Self::able_set(players);
        self.pending = self
            .order
            .iter()
            .copied()
            .filter(|id| able.contains(id) && *id != aggressor)
            .collect();
    }

    /// Rebuild the pending set from everyone able to act, then seat the
    /// turn on the first able player at or after `start`.
    fn assign_pending_and_turn(&mut self, players: &[Player], start: usize) {
        let able = Self::able_set(players);
        self.pending = self.order.iter().copied().filter(|id| able.contains(id)).collect();
        if self.pending.is_empty() {
            self.set_turn(None);
            return;
        }
        let mut idx = start % self.order.len();
        let mut picked = None;
        for _ in 0..self.order.len() {
            let id = self.order[idx];
            if able.contains(&id) {
                picked = Some(id);
                break;
            }
            idx = (idx + 1) % self.order.len();
        }
        self.set_turn(picked);
    }

    fn reset_street(&mut self, players: &mut [Player]) {
        for p in players.iter_mut() {
            if p.in_hand {
                p.bet_this_street = 0;
                p.last_action.clear();
            }
        }
        self.current_bet = 0;
        self.min_raise = self.big_blind;
    }

    fn advance_turn(&mut self, from: PlayerId) {
        if self.finished() {
            return;
        }
        if self.pending.is_empty() {
            self.set_turn(None);
            return;
        }
        let start = self.order.iter().position(|&id| id == from).unwrap_or(0);
        let pending: HashSet<PlayerId> = self.pending.iter().copied().collect();
        match next_eligible_from(&self.order, start, |id| pending.contains(&id)) {
            Some(idx) => {
                let next = self.order[idx];
                self.set_turn(Some(next));
            }
            None => self.set_turn(None),
        }
    }

    fn begin_preflop_round(&mut self, players: &mut [Player], anchor: PlayerId) {
        let anchor_idx = self.order.iter().position(|&id| id == anchor).unwrap_or(0);
        let first = next_eligible_from(&self.order, anchor_idx, |id| {
            player_idx(players, id).is_some_and(|i| players[i].can_act())
        });
        self.assign_pending_and_turn(players, first.unwrap_or(0));
        if self.pending.is_empty() {
            self.advance_street(players);
        }
    }

    /// Validate and apply one player intent, then move the hand forward
    /// (next turn, next street or settlement).
    pub fn apply_action(
        &mut self,
        players: &mut [Player],
        player_id: PlayerId,
        action: PlayerAction,
    ) -> Result<(), ActionError> {
        if self.finished() {
            return Err(ActionError::NoHandInProgress);
        }
        let idx = player_idx(players, player_id).ok_or(ActionError::NotSeated)?;
        if self.turn_id != Some(player_id) {
            return Err(ActionError::OutOfTurn);
        }
        if !players[idx].can_act() {
            return Err(ActionError::CannotAct);
        }

        if self.awaiting_straddle {
            return self.apply_straddle_decision(players, idx, action);
        }

        let to_call = self.to_call(&players[idx]);
        let max_to = players[idx].all_in_target();

        match action {
            PlayerAction::Straddle(_) | PlayerAction::SkipStraddle => {
                Err(ActionError::NoStraddlePending)
            }
            PlayerAction::Fold => {
                players[idx].folded = true;
                players[idx].last_action = "fold".into();
                self.log_action(&players[idx], "folds", None);
                self.remove_from_pending(player_id);
                self.complete_action_and_advance(players, player_id);
                Ok(())
            }
            PlayerAction::Check => {
                if to_call != 0 {
                    return Err(ActionError::CheckNotAllowed);
                }
                players[idx].last_action = "check".into();
                self.log_action(&players[idx], "checks", None);
                self.remove_from_pending(player_id);
                self.complete_action_and_advance(players, player_id);
                Ok(())
            }
            PlayerAction::Call => {
                if to_call == 0 {
                    return Err(ActionError::NothingToCall);
                }
                let paid = players[idx].post_chips(to_call);
                players[idx].last_action = if paid < to_call {
                    format!("call all-in {paid}")
                } else {
                    format!("call {paid}")
                };
                self.log_action(&players[idx], "calls", Some(paid));
                self.remove_from_pending(player_id);
                self.complete_action_and_advance(players, player_id);
                Ok(())
            }
            PlayerAction::AllIn => {
                if players[idx].stack == 0 {
                    return Err(ActionError::NoChips);
                }
                let target = max_to;
                let prev_bet = self.current_bet;
                let before = players[idx].bet_this_street;
                players[idx].post_chips(target - before);
                let committed = players[idx].bet_this_street - before;

                if target > prev_bet {
                    let raise_size = target - prev_bet;
                    // An all-in below a full raise does not grow the
                    // minimum, but it still reopens the action.
                    if raise_size >= self.min_raise {
                        self.min_raise = raise_size;
                    }
                    self.current_bet = target;
                    players[idx].last_action = format!("all-in to {target}");
                    self.reset_pending_after_aggression(players, player_id);
                } else {
                    players[idx].last_action = format!("all-in {committed}");
                    self.remove_from_pending(player_id);
                }
                self.log_action(&players[idx], "goes all-in", Some(committed));
                self.complete_action_and_advance(players, player_id);
                Ok(())
            }
            PlayerAction::Bet(target) => {
                if self.current_bet != 0 {
                    return Err(ActionError::BetNotAllowed);
                }
                if target <= players[idx].bet_this_street {
                    return Err(ActionError::BetTooSmall);
                }
                if target > max_to {
                    return Err(ActionError::ExceedsStack);
                }
                let min_bet = self.big_blind;
                if target < min_bet && target < max_to {
                    return Err(ActionError::BetBelowMinimum { min_to: min_bet });
                }

                players[idx].post_chips(target - players[idx].bet_this_street);
                self.current_bet = target;
                self.min_raise = target;
                players[idx].last_action = if players[idx].stack == 0 {
                    format!("all-in bet {target}")
                } else {
                    format!("bet {target}")
                };
                self.log_action(&players[idx], "bets", Some(target));
                self.reset_pending_after_aggression(players, player_id);
                self.complete_action_and_advance(players, player_id);
                Ok(())
            }
            PlayerAction::Raise(target) => {
                if self.current_bet == 0 {
                    return Err(ActionError::RaiseNotAllowed);
                }
                let min_to = self.current_bet + self.min_raise;
                if target <= self.current_bet {
                    return Err(ActionError::RaiseTooSmall);
                }
                if target > max_to {
                    return Err(ActionError::ExceedsStack);
                }
                if target < min_to && target < max_to {
                    return Err(ActionError::RaiseBelowMinimum { min_to });
                }

                let prev_bet = self.current_bet;
                players[idx].post_chips(target - players[idx].bet_this_street);
                let raise_size = target - prev_bet;
                if raise_size >= self.min_raise {
                    self.min_raise = raise_size;
                }
                self.current_bet = target;
                players[idx].last_action = if players[idx].stack == 0 {
                    format!("all-in to {target}")
                } else {
                    format!("raise to {target}")
                };
                self.log_action(&players[idx], "raises to", Some(target));
                self.reset_pending_after_aggression(players, player_id);
                self.complete_action_and_advance(players, player_id);
                Ok(())
            }
        }
    }

    fn apply_straddle_decision(
        &mut self,
        players: &mut [Player],
        idx: usize,
        action: PlayerAction,
    ) -> Result<(), ActionError> {
        if self.straddle_player_id != Some(players[idx].id) {
            return Err(ActionError::StraddleDecisionPending);
        }

        match action {
            PlayerAction::SkipStraddle => {
                players[idx].last_action = "skip straddle".into();
                let id = players[idx].id;
                let name = players[idx].name.clone();
                self.log(
                    ActionLogEntry::new(ActionLogKind::StraddleSkip, format!("{name} skips straddle"))
                        .with_player(id),
                );
                self.awaiting_straddle = false;
                self.straddle_player_id = None;
                let anchor = self.big_blind_id;
                self.begin_preflop_round(players, anchor);
                Ok(())
            }
            PlayerAction::Straddle(amount) => {
                let max_to = players[idx].all_in_target();
                let min_to = self.current_bet * 2;
                let target = amount.unwrap_or(min_to);
                if target <= self.current_bet {
                    return Err(ActionError::StraddleTooLow);
                }
                if target > max_to {
                    return Err(ActionError::ExceedsStack);
                }
                if target < min_to && target < max_to {
                    return Err(ActionError::StraddleBelowMinimum { min_to });
                }

                let prev_bet = self.current_bet;
                players[idx].post_chips(target - players[idx].bet_this_street);
                let raise_size = target - prev_bet;
                self.current_bet = target;
                self.min_raise = self.big_blind.max(raise_size);
                self.straddle_amount = target;
                self.awaiting_straddle = false;
                self.straddle_player_id = None;
                players[idx].last_action = if players[idx].stack == 0 {
                    format!("all-in straddle to {target}")
                } else {
                    format!("straddle to {target}")
                };
                let id = players[idx].id;
                let name = players[idx].name.clone();
                self.log(
                    ActionLogEntry::new(ActionLogKind::Straddle, format!("{name} straddles to {target}"))
                        .with_player(id)
                        .with_amount(target),
                );
                self.begin_preflop_round(players, id);
                Ok(())
            }
            _ => Err(ActionError::StraddleDecisionPending),
        }
    }

    /// Fold a player out-of-band (leave, kick, disconnect). No-op unless
    /// they are still contending and not all-in.
    pub fn force_fold(&mut self, players: &mut [Player], player_id: PlayerId, reason: &str) {
        if self.finished() {
            return;
        }
        let Some(idx) = player_idx(players, player_id) else {
            return;
        };
        if !players[idx].contending() {
            return;
        }
        players[idx].folded = true;
        players[idx].last_action = "fold".into();
        let name = players[idx].name.clone();
        self.log(
            ActionLogEntry::new(ActionLogKind::Admin, format!("{name} folds ({reason})"))
                .with_player(player_id),
        );
        self.remove_from_pending(player_id);
        // If the straddle decision holder vanishes, open the round as if
        // they had skipped.
        if self.awaiting_straddle && self.straddle_player_id == Some(player_id) {
            self.awaiting_straddle = false;
            self.straddle_player_id = None;
            let anchor = self.big_blind_id;
            self.begin_preflop_round(players, anchor);
            if self.finished() {
                return;
            }
        }
        self.complete_action_and_advance(players, player_id);
    }

    fn complete_action_and_advance(&mut self, players: &mut [Player], from: PlayerId) {
        if self.finished() {
            return;
        }
        if Self::contenders(players).len() <= 1 {
            self.settle_uncontested(players);
            return;
        }
        if self.pending.is_empty() {
            self.advance_street(players);
            return;
        }
        self.advance_turn(from);
    }

    /// Close the current street and deal the next, skipping betting
    /// rounds nobody can act in, until someone has a decision or the
    /// hand settles.
    fn advance_street(&mut self, players: &mut [Player]) {
        loop {
            if self.finished() {
                return;
            }
            if Self::contenders(players).len() <= 1 {
                self.settle_uncontested(players);
                return;
            }
            if self.phase == Phase::River {
                self.settle_showdown(players);
                return;
            }

            self.awaiting_straddle = false;
            self.straddle_player_id = None;
            self.reset_street(players);

            // Burn one, then deal.
            self.deck.deal_card();
            match self.phase {
                Phase::Preflop => {
                    for _ in 0..3 {
                        let card = self.deck.deal_card();
                        self.community.push(card);
                    }
                    self.phase = Phase::Flop;
                }
                Phase::Flop => {
                    let card = self.deck.deal_card();
                    self.community.push(card);
                    self.phase = Phase::Turn;
                }
                Phase::Turn => {
                    let card = self.deck.deal_card();
                    self.community.push(card);
                    self.phase = Phase::River;
                }
                Phase::River | Phase::Finished => unreachable!("handled above"),
            }
            let board = self
                .community
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(" ");
            self.log(ActionLogEntry::new(
                ActionLogKind::Street,
                format!("{}: {board}", self.phase),
            ));

            // With at most one player able to act the streets run out
            // with no further betting.
            if Self::contenders(players).len() <= 1 || Self::able_set(players).len() <= 1 {
                continue;
            }

            let dealer_idx = self.order.iter().position(|&id| id == self.dealer_id).unwrap_or(0);
            let first = next_eligible_from(&self.order, dealer_idx, |id| {
                player_idx(players, id).is_some_and(|i| players[i].can_act())
            });
            self.assign_pending_and_turn(players, first.unwrap_or(0));
            return;
        }
    }

    fn settle_uncontested(&mut self, players: &mut [Player]) {
        if self.finished() {
            return;
        }
        let contenders = Self::contenders(players);
        if contenders.len() != 1 {
            return;
        }
        let winner_id = contenders[0];
        let pot = pot_total(players);
        let idx = player_idx(players, winner_id).expect("contender is seated");
        players[idx].stack += pot;
        let name = players[idx].name.clone();
        let holes = players[idx].hole_cards.clone();

        self.result = Some(HandResult {
            kind: ResultKind::Uncontested,
            winners: vec![WinnerLine {
                player_id: winner_id,
                name: name.clone(),
                amount: pot,
                hand: None,
            }],
            board: self.community.clone(),
            side_pots: vec![PotResult {
                amount: pot,
                winners: vec![winner_id],
                hand_name: None,
            }],
            revealed: HashMap::from([(winner_id, holes)]),
        });
        self.log(
            ActionLogEntry::new(ActionLogKind::Result, format!("{name} wins {pot} uncontested"))
                .with_player(winner_id)
                .with_amount(pot),
        );
        self.finish(players);
    }

    fn settle_showdown(&mut self, players: &mut [Player]) {
        if self.finished() {
            return;
        }
        let contenders = Self::contenders(players);
        if contenders.is_empty() {
            self.finish(players);
            return;
        }

        let mut evals: HashMap<PlayerId, HandEval> = HashMap::new();
        for &id in &contenders {
            let idx = player_idx(players, id).expect("contender is seated");
            let mut cards = players[idx].hole_cards.clone();
            cards.extend_from_slice(&self.community);
            evals.insert(id, evaluate_seven(&cards));
        }

        let side_pots = compute_side_pots(players);
        let mut payouts: HashMap<PlayerId, Chips> = HashMap::new();
        let mut result_pots = Vec::with_capacity(side_pots.len());

        for pot in side_pots {
            let mut best: Option<&HandEval> = None;
            let mut winners: Vec<PlayerId> = Vec::new();
            for &id in &pot.eligible {
                let ev = &evals[&id];
                match best {
                    Some(b) if ev < b => {}
                    Some(b) if ev == b => winners.push(id),
                    _ => {
                        best = Some(ev);
                        winners = vec![id];
                    }
                }
            }
            split_pot(pot.amount, &winners, &self.order, self.dealer_id, &mut payouts);
            result_pots.push(PotResult {
                amount: pot.amount,
                winners: winners.clone(),
                hand_name: best.map(|b| b.name().to_string()),
            });
        }

        for (&id, &amount) in &payouts {
            if let Some(idx) = player_idx(players, id) {
                players[idx].stack += amount;
            }
        }

        let mut revealed = HashMap::new();
        for &id in &contenders {
            let idx = player_idx(players, id).expect("contender is seated");
            revealed.insert(id, players[idx].hole_cards.clone());
        }

        let mut winner_lines: Vec<WinnerLine> = payouts
            .iter()
            .map(|(&id, &amount)| {
                let name = player_idx(players, id)
                    .map(|i| players[i].name.clone())
                    .unwrap_or_else(|| id.to_string());
                WinnerLine {
                    player_id: id,
                    name,
                    amount,
                    hand: Some(evals[&id].name().to_string()),
                }
            })
            .collect();
        winner_lines.sort_by(|a, b| b.amount.cmp(&a.amount).then_with(|| a.player_id.cmp(&b.player_id)));

        for w in &winner_lines {
            self.log(
                ActionLogEntry::new(
                    ActionLogKind::Result,
                    format!(
                        "{} wins {} at showdown ({})",
                        w.name,
                        w.amount,
                        w.hand.as_deref().unwrap_or("")
                    ),
                )
                .with_player(w.player_id)
                .with_amount(w.amount),
            );
        }

        self.result = Some(HandResult {
            kind: ResultKind::Showdown,
            winners: winner_lines,
            board: self.community.clone(),
            side_pots: result_pots,
            revealed,
        });
        self.finish(players);
    }

    /// Terminal transition. Clears per-hand flags on the participants so
    /// pot totals read zero between hands; revealed cards survive in the
    /// result.
    fn finish(&mut self, players: &mut [Player]) {
        self.phase = Phase::Finished;
        self.pending.clear();
        self.set_turn(None);
        for p in players.iter_mut() {
            if p.in_hand {
                p.reset_hand_flags();
            }
        }
        debug!("hand {} finished", self.hand_no);
    }
}
