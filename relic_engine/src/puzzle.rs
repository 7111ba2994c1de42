//! Persistent per-card puzzle state.
//!
//! A puzzle is armed by an init opcode, advanced once per card tick while
//! armed, and dropped when the card is left.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PuzzleState<P> {
    params: Option<P>,
    ticks: u32,
}

impl<P> Default for PuzzleState<P> {
    fn default() -> Self {
        PuzzleState {
            params: None,
            ticks: 0,
        }
    }
}

impl<P> PuzzleState<P> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `params` and enables the puzzle. Re-arming replaces the
    /// previous parameters and restarts the tick count.
    pub fn arm(&mut self, params: P) {
        self.params = Some(params);
        self.ticks = 0;
    }

    pub fn disable(&mut self) {
        self.params = None;
        self.ticks = 0;
    }

    pub fn is_enabled(&self) -> bool {
        self.params.is_some()
    }

    pub fn params(&self) -> Option<&P> {
        self.params.as_ref()
    }

    pub fn ticks(&self) -> u32 {
        self.ticks
    }

    /// Runs one frame of `update` with the stored parameters and the number
    /// of frames already run. Does nothing while disabled.
    pub fn tick<F>(&mut self, update: F) -> bool
    where
        F: FnOnce(&mut P, u32),
    {
        let Some(params) = self.params.as_mut() else {
            return false;
        };
        update(params, self.ticks);
        self.ticks = self.ticks.saturating_add(1);
        true
    }
}

/// A stack that owns a set of persistent puzzles.
pub trait PuzzleStack {
    /// Advances every armed puzzle by one frame.
    fn run_persistent(&mut self);

    /// Disables every puzzle. Called whenever a card is left.
    fn disable_persistent(&mut self);

    /// Names of the puzzles currently armed.
    fn armed_puzzles(&self) -> Vec<&'static str>;
}
