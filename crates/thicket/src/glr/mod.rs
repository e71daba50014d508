//! # GLR (Generalized LR) Engine
//!
//! This module runs LR tables that still contain conflicts. Instead of
//! failing on a conflict, the engine forks the parse into one branch per
//! alternative and lets input decide which branches survive.
//!
//! ## Overview
//!
//! - [`ValueCell`]: one stack cell, a semantic value tagged with the state
//!   recorded when it was pushed
//! - pieces: runs of cells shared between branches through reference
//!   counts (see [`PieceView`])
//! - branches: the live parses, each with a state, a head piece and its
//!   own user context (see [`BranchView`])
//! - [`GlrParser`]: drives every branch through one token at a time
//!
//! ## Algorithm
//!
//! For each token, every live branch loops over its action:
//! 1. Shift pushes the token and ends the branch's turn
//! 2. Reduce gathers the rule's cells, runs the rule action and follows
//!    the goto table, then loops
//! 3. A conflict replaces the branch with one child per alternative; the
//!    children share the parent's history
//! 4. Accept moves the start symbol's value out and retires the branch
//! 5. No action prunes the branch, or fails the parse if it was the last
//!
//! Reductions that reach below a fork point copy the cells they need out
//! of shared pieces and split those pieces at the copy boundary, so other
//! branches never observe the change.

mod event;
mod parser;
mod piece;
mod stack;
mod stats;
mod value;

pub use event::{EventLog, GlrEvent, GlrEventHandler, NullEventHandler};
pub use parser::GlrParser;
pub use piece::{PieceId, PieceView};
pub use stack::{BranchId, BranchView};
pub use stats::GlrStats;
pub use value::{Rhs, Symbol, ValueCell};

#[cfg(feature = "serialize")]
use serde::{Deserialize, Serialize};

/// Tuning knobs for the GLR engine.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serialize", serde(default))]
pub struct GlrConfig {
    /// Maximum number of branches alive at once
    pub max_branches: usize,
    /// Pieces to reserve up front
    pub piece_capacity: usize,
    /// Check the piece tree after every token and panic on inconsistency
    pub verify_each_token: bool,
}

impl Default for GlrConfig {
    fn default() -> Self {
        Self {
            max_branches: 1000,
            piece_capacity: 64,
            verify_each_token: false,
        }
    }
}

/// Where a parse stands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub enum ParseStatus {
    /// Branches are waiting for more input
    Parsing,
    /// Every branch has finished and at least one accepted
    Accepted,
    /// The parse failed; further input is rejected
    Failed,
}

/// A successful parse: the start symbol's value and the context of the
/// branch that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Accepted<V, U> {
    /// Semantic value of the start symbol
    pub value: V,
    /// User context of the accepting branch
    pub user: U,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = GlrConfig::default();
        assert_eq!(config.max_branches, 1000);
        assert_eq!(config.piece_capacity, 64);
        assert!(!config.verify_each_token);
    }

    #[cfg(feature = "serialize")]
    #[test]
    fn test_reports_are_serializable() {
        fn assert_serde<T: Serialize + for<'de> Deserialize<'de>>() {}
        assert_serde::<GlrConfig>();
        assert_serde::<GlrStats>();
        assert_serde::<ParseStatus>();
    }
}
