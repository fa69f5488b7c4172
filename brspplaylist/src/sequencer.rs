//! Track sequencing: linear forward/backward and non-repeating random
//!
//! Linear traversal wraps around both ends. Random traversal draws uniformly
//! but never repeats an index within a round; a round ends once every index
//! has been drawn, at which point the history is cleared.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashSet;
use tracing::trace;

/// Traversal direction for linear stepping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Forward,
    Backward,
}

/// Index following `current` in `direction`, wrapping at both ends
///
/// Returns `None` for an empty playlist.
pub fn next(current: usize, direction: Direction, len: usize) -> Option<usize> {
    if len == 0 {
        return None;
    }
    let current = current % len;
    Some(match direction {
        Direction::Forward => (current + 1) % len,
        Direction::Backward => (current + len - 1) % len,
    })
}

/// Indices already drawn in the current random round
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlayHistory {
    played: Vec<usize>,
}

impl PlayHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.played.len()
    }

    pub fn is_empty(&self) -> bool {
        self.played.is_empty()
    }

    pub fn contains(&self, index: usize) -> bool {
        self.played.contains(&index)
    }

    pub fn clear(&mut self) {
        self.played.clear();
    }

    /// Drawn indices in drawing order
    pub fn as_slice(&self) -> &[usize] {
        &self.played
    }

    fn push(&mut self, index: usize) {
        self.played.push(index);
    }
}

/// Draws the next random index and records it in `history`
///
/// A full history is reset first. When a single index remains untried it is
/// returned directly, otherwise draws already in `history` are rejected.
/// Returns `None` for an empty playlist.
pub fn random_next<R: Rng + ?Sized>(
    history: &mut PlayHistory,
    len: usize,
    rng: &mut R,
) -> Option<usize> {
    if len == 0 {
        return None;
    }

    // Un historique contenant des indices hors bornes (playlist plus courte)
    // ne doit pas bloquer le tirage
    if history.len() >= len || history.as_slice().iter().any(|&i| i >= len) {
        history.clear();
    }

    let index = if history.len() == len - 1 {
        (0..len).find(|&i| !history.contains(i)).unwrap_or(0)
    } else {
        loop {
            let draw = rng.random_range(0..len);
            if !history.contains(draw) {
                break draw;
            }
        }
    };

    history.push(index);
    trace!(index, round_len = history.len(), "Random track drawn");
    Some(index)
}

/// Like [`random_next`], but never returns an index of `excluded`
///
/// Indices of the current round are avoided first; when every remaining
/// candidate was already drawn, the history is reset and the draw is made
/// among the non-excluded indices. Returns `None` once every index is
/// excluded.
pub fn random_next_excluding<R: Rng + ?Sized>(
    history: &mut PlayHistory,
    len: usize,
    excluded: &HashSet<usize>,
    rng: &mut R,
) -> Option<usize> {
    if history.as_slice().iter().any(|&i| i >= len) {
        history.clear();
    }

    let mut candidates: Vec<usize> = (0..len)
        .filter(|i| !excluded.contains(i) && !history.contains(*i))
        .collect();
    if candidates.is_empty() {
        history.clear();
        candidates = (0..len).filter(|i| !excluded.contains(i)).collect();
    }
    if candidates.is_empty() {
        return None;
    }

    let index = candidates[rng.random_range(0..candidates.len())];
    history.push(index);
    trace!(index, excluded = excluded.len(), "Random track drawn");
    Some(index)
}

/// Random traversal state: history plus its RNG
#[derive(Debug, Clone)]
pub struct RandomSequencer<R = StdRng> {
    history: PlayHistory,
    rng: R,
}

impl RandomSequencer<StdRng> {
    /// Sequencer seeded from the operating system
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_os_rng())
    }

    /// Deterministic sequencer
    pub fn seeded(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }
}

impl Default for RandomSequencer<StdRng> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Rng> RandomSequencer<R> {
    pub fn with_rng(rng: R) -> Self {
        Self {
            history: PlayHistory::new(),
            rng,
        }
    }

    pub fn random_next(&mut self, len: usize) -> Option<usize> {
        random_next(&mut self.history, len, &mut self.rng)
    }

    pub fn random_next_excluding(
        &mut self,
        len: usize,
        excluded: &HashSet<usize>,
    ) -> Option<usize> {
        random_next_excluding(&mut self.history, len, excluded, &mut self.rng)
    }

    pub fn history(&self) -> &PlayHistory {
        &self.history
    }

    pub fn reset(&mut self) {
        self.history.clear();
    }
}
