//! Side-pot construction and payout splitting.
//!
//! Pots are derived from each player's `total_contribution` at settlement
//! time rather than tracked incrementally, so folded contributions are
//! never lost and the sum of all pots always equals the sum of all
//! contributions.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::entities::{Chips, Player, PlayerId};

/// One pot layer: its chip amount and the contenders eligible to win it.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct SidePot {
    pub amount: Chips,
    pub eligible: Vec<PlayerId>,
}

/// Total chips committed this hand, over all players including folders.
#[must_use]
pub fn pot_total(players: &[Player]) -> Chips {
    players.iter().map(|p| p.total_contribution).sum()
}

/// Slice contributions into pots at each distinct all-in level.
///
/// Every contributor pays into each layer up to their contribution, but
/// only unfolded contenders are eligible to win it. A layer everyone has
/// folded out of (deep stacks can open-fold behind shorter all-ins) is
/// dead money: it folds into the pot below it, so the sum of pots always
/// equals the sum of contributions.
#[must_use]
pub fn compute_side_pots(players: &[Player]) -> Vec<SidePot> {
    let mut levels: Vec<Chips> = players
        .iter()
        .map(|p| p.total_contribution)
        .filter(|&c| c > 0)
        .collect();
    levels.sort_unstable();
    levels.dedup();

    let mut pots: Vec<SidePot> = Vec::new();
    let mut dead = 0;
    let mut prev = 0;
    for level in levels {
        let step = level - prev;
        prev = level;
        let contributors = players
            .iter()
            .filter(|p| p.total_contribution >= level)
            .count() as Chips;
        let amount = step * contributors;
        if amount == 0 {
            continue;
        }
        let eligible: Vec<PlayerId> = players
            .iter()
            .filter(|p| p.total_contribution >= level && p.contending())
            .map(|p| p.id)
            .collect();
        if eligible.is_empty() {
            dead += amount;
            continue;
        }
        pots.push(SidePot { amount, eligible });
    }
    if dead > 0 && let Some(last) = pots.last_mut() {
        last.amount += dead;
    }
    pots
}

/// Split one pot among its winners, crediting `payouts`.
///
/// Remainder chips that do not divide evenly go one at a time to winners
/// in table order starting after the dealer, so the odd chip lands on the
/// same seat no matter how the winner set was produced.
pub fn split_pot(
    amount: Chips,
    winners: &[PlayerId],
    order: &[PlayerId],
    dealer_id: PlayerId,
    payouts: &mut HashMap<PlayerId, Chips>,
) {
    if winners.is_empty() || amount == 0 {
        return;
    }
    let n = winners.len() as Chips;
    let base = amount / n;
    let mut odd = amount % n;

    for &winner in winners {
        *payouts.entry(winner).or_insert(0) += base;
    }
    if odd == 0 {
        return;
    }

    let ordered = winners_after_dealer(winners, order, dealer_id);
    let mut i = 0;
    while odd > 0 {
        *payouts.entry(ordered[i % ordered.len()]).or_insert(0) += 1;
        odd -= 1;
        i += 1;
    }
}

/// Winners sorted by table position starting left of the dealer. Falls
/// back to the given winner order when the dealer is not in `order`.
fn winners_after_dealer(
    winners: &[PlayerId],
    order: &[PlayerId],
    dealer_id: PlayerId,
) -> Vec<PlayerId> {
    let Some(dealer_idx) = order.iter().position(|&id| id == dealer_id) else {
        return winners.to_vec();
    };
    let mut ordered = Vec::with_capacity(winners.len());
    for offset in 1..=order.len() {
        let id = order[(dealer_idx + offset) % order.len()];
        if winners.contains(&id) {
            ordered.push(id);
        }
    }
    // Winners not in the seating order (cannot normally happen) keep
    // their place at the end.
    for &w in winners {
        if !ordered.contains(&w) {
            ordered.push(w);
        }
    }
    ordered
}
