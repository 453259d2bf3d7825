//! The fixed initial deck: card `i` is the curve point `(i+1)·Base8`,
//! trivially encrypted, identical across all games. Built once per deck
//! size and shared process-wide.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use once_cell::sync::Lazy;

use crate::curve::Point;
use crate::elgamal::codec::{CompressedDeck, MAX_DECK_SIZE};
use crate::elgamal::ElGamalCiphertext;

/// Sentinel returned by `search` when a plaintext matches no card.
pub const INVALID_CARD_INDEX: u64 = 999_999;

/// Read-only initial deck table for one deck size.
pub struct InitialDeck {
    points: Vec<Point>,
    compressed: CompressedDeck,
    index_by_point: HashMap<Point, usize>,
}

impl InitialDeck {
    fn build(num_cards: usize) -> Self {
        debug_assert!(num_cards >= 1 && num_cards <= MAX_DECK_SIZE);
        let mut points = Vec::with_capacity(num_cards);
        let mut cards = Vec::with_capacity(num_cards);
        let mut index_by_point = HashMap::with_capacity(num_cards);

        let mut acc = Point::IDENTITY;
        for i in 0..num_cards {
            acc = acc.add(&Point::GENERATOR);
            points.push(acc);
            cards.push(ElGamalCiphertext::from_plaintext(acc));
            index_by_point.insert(acc, i);
        }

        Self {
            compressed: CompressedDeck::compress(&cards),
            points,
            index_by_point,
        }
    }

    pub fn num_cards(&self) -> usize {
        self.points.len()
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn compressed(&self) -> &CompressedDeck {
        &self.compressed
    }

    /// Maps a recovered plaintext point back to its card index.
    pub fn search(&self, point: &Point) -> Option<usize> {
        self.index_by_point.get(point).copied()
    }

    /// Like `search`, but with the wire sentinel for misses.
    pub fn search_index(&self, point: &Point) -> u64 {
        self.search(point)
            .map(|i| i as u64)
            .unwrap_or(INVALID_CARD_INDEX)
    }
}

static TABLES: Lazy<Mutex<HashMap<usize, Arc<InitialDeck>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

/// Returns the shared initial deck table for `num_cards`, building it on
/// first use.
pub fn initial_deck(num_cards: usize) -> Arc<InitialDeck> {
    let mut tables = TABLES.lock().expect("initial deck cache poisoned");
    Arc::clone(
        tables
            .entry(num_cards)
            .or_insert_with(|| Arc::new(InitialDeck::build(num_cards))),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elgamal::codec::BitVector;
    use ark_ff::Zero;

    #[test]
    fn fifty_two_card_deck_constants() {
        let deck = initial_deck(52);
        let compressed = deck.compressed();
        assert_eq!(compressed.num_cards(), 52);
        // Every initial c0 is (0, 1): x-coordinates all zero and every
        // selector bit set.
        assert!(compressed.x0.iter().all(|x| x.is_zero()));
        assert_eq!(compressed.selector0, BitVector::new(4503599627370495));
    }

    #[test]
    fn card_points_are_distinct_and_on_curve() {
        let deck = initial_deck(52);
        for (i, p) in deck.points().iter().enumerate() {
            assert!(p.is_on_curve());
            assert_eq!(deck.search(p), Some(i));
        }
        assert_eq!(deck.index_by_point.len(), 52);
    }

    #[test]
    fn search_miss_returns_sentinel() {
        let deck = initial_deck(30);
        let outside = Point::GENERATOR.mul(&crate::curve::Fr::from(31u64));
        assert_eq!(deck.search_index(&outside), INVALID_CARD_INDEX);
    }

    #[test]
    fn tables_are_shared() {
        let a = initial_deck(30);
        let b = initial_deck(30);
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn compressed_deck_decompresses_to_card_points() {
        let deck = initial_deck(30);
        let cards = deck.compressed().decompress().unwrap();
        for (card, point) in cards.iter().zip(deck.points()) {
            assert_eq!(card.c1, *point);
        }
    }
}
