//! 7-card hand evaluation.
//!
//! Evaluates the best 5-card poker hand out of two hole cards and five
//! board cards. Results order first by category, then by a zero-padded
//! lexicographic comparison of the tiebreak ranks, so `HandEval`'s derived
//! `Ord` is the full hand ordering.

use serde::{Deserialize, Serialize};

use super::entities::{Card, Rank, Suit};

#[derive(Clone, Copy, Debug, Deserialize, Eq, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HandCategory {
    HighCard = 0,
    Pair = 1,
    TwoPair = 2,
    ThreeOfAKind = 3,
    Straight = 4,
    Flush = 5,
    FullHouse = 6,
    FourOfAKind = 7,
    StraightFlush = 8,
}

/// Evaluation of a 7-card hand: category plus the ranks that break ties
/// within the category, highest significance first.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct HandEval {
    pub category: HandCategory,
    pub tiebreak: Vec<Rank>,
}

impl HandEval {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self.category {
            HandCategory::StraightFlush => {
                if self.tiebreak.first() == Some(&14) {
                    "royal flush"
                } else {
                    "straight flush"
                }
            }
            HandCategory::FourOfAKind => "four of a kind",
            HandCategory::FullHouse => "full house",
            HandCategory::Flush => "flush",
            HandCategory::Straight => "straight",
            HandCategory::ThreeOfAKind => "three of a kind",
            HandCategory::TwoPair => "two pair",
            HandCategory::Pair => "pair",
            HandCategory::HighCard => "high card",
        }
    }
}

impl Ord for HandEval {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.category.cmp(&other.category).then_with(|| {
            // Pad the shorter vector with zeros so e.g. [7, 2] vs [7]
            // compares positionally, never by length.
            let len = self.tiebreak.len().max(other.tiebreak.len());
            for i in 0..len {
                let a = self.tiebreak.get(i).copied().unwrap_or(0);
                let b = other.tiebreak.get(i).copied().unwrap_or(0);
                match a.cmp(&b) {
                    std::cmp::Ordering::Equal => {}
                    ord => return ord,
                }
            }
            std::cmp::Ordering::Equal
        })
    }
}

impl PartialOrd for HandEval {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// Highest straight rank formed by `ranks` (distinct, any order), with the
/// wheel (A-2-3-4-5) counting as a 5-high straight. None if no straight.
fn straight_high(ranks: &[Rank]) -> Option<Rank> {
    let mut present = [false; 15];
    for &r in ranks {
        present[r as usize] = true;
    }
    // The ace also plays low.
    if present[14] {
        present[1] = true;
    }
    for high in (5..=14u8).rev() {
        if (0..5).all(|i| present[(high - i) as usize]) {
            return Some(high);
        }
    }
    None
}

/// Evaluate exactly seven cards.
#[must_use]
pub fn evaluate_seven(cards: &[Card]) -> HandEval {
    debug_assert_eq!(cards.len(), 7);

    let mut rank_counts = [0u8; 15];
    let mut suit_buckets: [Vec<Rank>; 4] = [Vec::new(), Vec::new(), Vec::new(), Vec::new()];
    for &Card(rank, suit) in cards {
        rank_counts[rank as usize] += 1;
        let bucket = match suit {
            Suit::Spade => 0,
            Suit::Heart => 1,
            Suit::Diamond => 2,
            Suit::Club => 3,
        };
        suit_buckets[bucket].push(rank);
    }

    // Flush suit, if any. With seven cards at most one suit can reach
    // five, but ties on bucket length are broken by top card anyway.
    let mut flush_ranks: Option<Vec<Rank>> = None;
    for bucket in &mut suit_buckets {
        if bucket.len() >= 5 {
            bucket.sort_unstable_by(|a, b| b.cmp(a));
            match &flush_ranks {
                Some(best) if best[0] >= bucket[0] => {}
                _ => flush_ranks = Some(bucket.clone()),
            }
        }
    }

    if let Some(ranks) = &flush_ranks
        && let Some(high) = straight_high(ranks)
    {
        return HandEval {
            category: HandCategory::StraightFlush,
            tiebreak: vec![high],
        };
    }

    // Distinct ranks descending, and the count groups.
    let mut distinct: Vec<Rank> = (2..=14).filter(|&r| rank_counts[r as usize] > 0).collect();
    distinct.sort_unstable_by(|a, b| b.cmp(a));
    let quads: Vec<Rank> = distinct
        .iter()
        .copied()
        .filter(|&r| rank_counts[r as usize] == 4)
        .collect();
    let trips: Vec<Rank> = distinct
        .iter()
        .copied()
        .filter(|&r| rank_counts[r as usize] == 3)
        .collect();
    let pairs: Vec<Rank> = distinct
        .iter()
        .copied()
        .filter(|&r| rank_counts[r as usize] == 2)
        .collect();

    if let Some(&quad) = quads.first() {
        let kicker = distinct.iter().copied().find(|&r| r != quad).unwrap_or(0);
        return HandEval {
            category: HandCategory::FourOfAKind,
            tiebreak: vec![quad, kicker],
        };
    }

    if let Some(&trip) = trips.first() {
        // A second trip plays as the pair of a full house.
        let pair = trips
            .get(1)
            .copied()
            .or_else(|| pairs.first().copied());
        if let Some(pair) = pair {
            return HandEval {
                category: HandCategory::FullHouse,
                tiebreak: vec![trip, pair],
            };
        }
    }

    if let Some(ranks) = flush_ranks {
        return HandEval {
            category: HandCategory::Flush,
            tiebreak: ranks[..5].to_vec(),
        };
    }

    if let Some(high) = straight_high(&distinct) {
        return HandEval {
            category: HandCategory::Straight,
            tiebreak: vec![high],
        };
    }

    if let Some(&trip) = trips.first() {
        let kickers: Vec<Rank> = distinct
            .iter()
            .copied()
            .filter(|&r| r != trip)
            .take(2)
            .collect();
        let mut tiebreak = vec![trip];
        tiebreak.extend(kickers);
        return HandEval {
            category: HandCategory::ThreeOfAKind,
            tiebreak,
        };
    }

    if pairs.len() >= 2 {
        let (top, second) = (pairs[0], pairs[1]);
        let kicker = distinct
            .iter()
            .copied()
            .find(|&r| r != top && r != second)
            .unwrap_or(0);
        return HandEval {
            category: HandCategory::TwoPair,
            tiebreak: vec![top, second, kicker],
        };
    }

    if let Some(&pair) = pairs.first() {
        let kickers: Vec<Rank> = distinct
            .iter()
            .copied()
            .filter(|&r| r != pair)
            .take(3)
            .collect();
        let mut tiebreak = vec![pair];
        tiebreak.extend(kickers);
        return HandEval {
            category: HandCategory::Pair,
            tiebreak,
        };
    }

    HandEval {
        category: HandCategory::HighCard,
        tiebreak: distinct[..5].to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::entities::Suit::{Club, Diamond, Heart, Spade};

    fn eval(cards: [Card; 7]) -> HandEval {
        evaluate_seven(&cards)
    }

    #[test]
    fn royal_flush() {
        let e = eval([
            Card(14, Spade),
            Card(13, Spade),
            Card(12, Spade),
            Card(11, Spade),
            Card(10, Spade),
            Card(2, Heart),
            Card(3, Club),
        ]);
        assert_eq!(e.category, HandCategory::StraightFlush);
        assert_eq!(e.tiebreak, vec![14]);
        assert_eq!(e.name(), "royal flush");
    }

    #[test]
    fn steel_wheel_is_five_high_straight_flush() {
        let e = eval([
            Card(14, Club),
            Card(2, Club),
            Card(3, Club),
            Card(4, Club),
            Card(5, Club),
            Card(13, Heart),
            Card(12, Heart),
        ]);
        assert_eq!(e.category, HandCategory::StraightFlush);
        assert_eq!(e.tiebreak, vec![5]);
        assert_eq!(e.name(), "straight flush");
    }

    #[test]
    fn sevens_full_of_twos() {
        let e = eval([
            Card(7, Spade),
            Card(7, Heart),
            Card(7, Diamond),
            Card(2, Club),
            Card(2, Spade),
            Card(9, Heart),
            Card(4, Diamond),
        ]);
        assert_eq!(e.category, HandCategory::FullHouse);
        assert_eq!(e.tiebreak, vec![7, 2]);
    }

    #[test]
    fn double_trips_play_as_full_house() {
        let e = eval([
            Card(9, Spade),
            Card(9, Heart),
            Card(9, Diamond),
            Card(5, Club),
            Card(5, Spade),
            Card(5, Heart),
            Card(14, Diamond),
        ]);
        assert_eq!(e.category, HandCategory::FullHouse);
        assert_eq!(e.tiebreak, vec![9, 5]);
    }

    #[test]
    fn six_high_straight() {
        let e = eval([
            Card(2, Spade),
            Card(3, Heart),
            Card(4, Diamond),
            Card(5, Club),
            Card(6, Spade),
            Card(13, Heart),
            Card(13, Diamond),
        ]);
        assert_eq!(e.category, HandCategory::Straight);
        assert_eq!(e.tiebreak, vec![6]);
    }

    #[test]
    fn wheel_straight() {
        let e = eval([
            Card(14, Spade),
            Card(2, Heart),
            Card(3, Diamond),
            Card(4, Club),
            Card(5, Spade),
            Card(9, Heart),
            Card(11, Diamond),
        ]);
        assert_eq!(e.category, HandCategory::Straight);
        assert_eq!(e.tiebreak, vec![5]);
    }

    #[test]
    fn quads_carry_best_kicker() {
        let e = eval([
            Card(8, Spade),
            Card(8, Heart),
            Card(8, Diamond),
            Card(8, Club),
            Card(3, Spade),
            Card(14, Heart),
            Card(10, Diamond),
        ]);
        assert_eq!(e.category, HandCategory::FourOfAKind);
        assert_eq!(e.tiebreak, vec![8, 14]);
    }

    #[test]
    fn flush_takes_top_five() {
        let e = eval([
            Card(14, Heart),
            Card(11, Heart),
            Card(9, Heart),
            Card(6, Heart),
            Card(3, Heart),
            Card(2, Heart),
            Card(13, Spade),
        ]);
        assert_eq!(e.category, HandCategory::Flush);
        assert_eq!(e.tiebreak, vec![14, 11, 9, 6, 3]);
    }

    #[test]
    fn two_pair_uses_top_two_pairs_and_kicker() {
        let e = eval([
            Card(12, Spade),
            Card(12, Heart),
            Card(7, Diamond),
            Card(7, Club),
            Card(4, Spade),
            Card(4, Heart),
            Card(14, Diamond),
        ]);
        assert_eq!(e.category, HandCategory::TwoPair);
        assert_eq!(e.tiebreak, vec![12, 7, 14]);
    }

    #[test]
    fn pair_carries_three_kickers() {
        let e = eval([
            Card(10, Spade),
            Card(10, Heart),
            Card(14, Diamond),
            Card(8, Club),
            Card(6, Spade),
            Card(4, Heart),
            Card(2, Diamond),
        ]);
        assert_eq!(e.category, HandCategory::Pair);
        assert_eq!(e.tiebreak, vec![10, 14, 8, 6]);
    }

    #[test]
    fn high_card_orders_by_all_five_ranks() {
        let a = eval([
            Card(14, Spade),
            Card(12, Heart),
            Card(10, Diamond),
            Card(8, Club),
            Card(6, Spade),
            Card(4, Heart),
            Card(2, Diamond),
        ]);
        let b = eval([
            Card(14, Heart),
            Card(12, Diamond),
            Card(10, Club),
            Card(8, Spade),
            Card(5, Heart),
            Card(4, Diamond),
            Card(3, Club),
        ]);
        assert_eq!(a.category, HandCategory::HighCard);
        assert!(a > b);
    }

    #[test]
    fn category_order_dominates_tiebreak() {
        let straight = HandEval {
            category: HandCategory::Straight,
            tiebreak: vec![5],
        };
        let trips = HandEval {
            category: HandCategory::ThreeOfAKind,
            tiebreak: vec![14, 13, 12],
        };
        assert!(straight > trips);
    }

    #[test]
    fn identical_hands_tie() {
        let board = [
            Card(14, Spade),
            Card(13, Heart),
            Card(12, Diamond),
            Card(11, Club),
            Card(10, Spade),
        ];
        let mut a = board.to_vec();
        a.extend([Card(2, Heart), Card(3, Club)]);
        let mut b = board.to_vec();
        b.extend([Card(4, Diamond), Card(5, Spade)]);
        assert_eq!(evaluate_seven(&a), evaluate_seven(&b));
    }
}
