#[cfg(feature = "serialize")]
use serde::{Deserialize, Serialize};

/// Counters collected while parsing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct GlrStats {
    /// Tokens fed, the end-of-input token included
    pub tokens: usize,
    /// Shift actions performed
    pub shifts: usize,
    /// Reductions performed
    pub reductions: usize,
    /// Conflict entries that forked a branch
    pub forks: usize,
    /// Lower pieces merged into a reducing head
    pub merges: usize,
    /// Shared pieces split at a copy boundary
    pub splits: usize,
    /// Shared pieces bypassed after being copied whole
    pub elisions: usize,
    /// Cells copied out of shared pieces
    pub copied_cells: usize,
    /// Branches removed by a branch-local syntax error
    pub pruned: usize,
    /// Branches that reached accept
    pub accepted: usize,
    /// Largest number of simultaneously live branches
    pub peak_branches: usize,
}

impl GlrStats {
    /// Create new empty stats
    #[must_use]
    pub const fn new() -> Self {
        Self {
            tokens: 0,
            shifts: 0,
            reductions: 0,
            forks: 0,
            merges: 0,
            splits: 0,
            elisions: 0,
            copied_cells: 0,
            pruned: 0,
            accepted: 0,
            peak_branches: 0,
        }
    }

    /// Fold another run's counters into this one
    pub fn merge(&mut self, other: &Self) {
        self.tokens += other.tokens;
        self.shifts += other.shifts;
        self.reductions += other.reductions;
        self.forks += other.forks;
        self.merges += other.merges;
        self.splits += other.splits;
        self.elisions += other.elisions;
        self.copied_cells += other.copied_cells;
        self.pruned += other.pruned;
        self.accepted += other.accepted;
        self.peak_branches = self.peak_branches.max(other.peak_branches);
    }
}
