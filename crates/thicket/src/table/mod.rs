//! # Parse Tables
//!
//! The immutable action/goto/conflict/rule arrays consumed by the GLR engine.
//!
//! ## Overview
//!
//! Tables are produced by an external generator (an LALR automaton builder)
//! and are treated by the runtime as opaque data addressed by integer
//! indices. This module defines:
//!
//! - [`TableCounts`]: the sizes that partition the raw action code space
//! - [`Action`]: a decoded action code
//! - [`ParseTables`]: the lookup contract the engine depends on
//! - [`DenseTables`]: row-major tables exactly as a generator emits them
//! - [`CompressedTables`]: comb-vector packed tables with the same contract
//!
//! ## Action code space
//!
//! Raw action codes are `u16` values partitioned into disjoint ranges:
//!
//! | Range | Meaning |
//! |-------|---------|
//! | `[0, S)` | shift to state |
//! | `[S, S+R)` | reduce by rule |
//! | `[S+R, S+R+C)` | offset of a conflict entry |
//! | `S+R+C` | error |
//! | `S+R+C+1` | accept |
//!
//! where `S`, `R` and `C` are the state count, rule count and the length of
//! the flat conflict array.

mod compressed;
mod dense;

pub use compressed::{CompressedTables, PackedTable};
pub use dense::{DenseTables, DenseTablesBuilder};

#[cfg(feature = "serialize")]
use serde::{Deserialize, Serialize};

/// Automaton state index.
pub type StateId = usize;
/// Terminal (token kind) index.
pub type TokenId = usize;
/// Nonterminal index.
pub type NontermId = usize;
/// Grammar rule index.
pub type RuleId = usize;

/// Goto entry that is never consulted by a valid parse.
pub const GOTO_NONE: u16 = u16::MAX;

/// Sizes of the table set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct TableCounts {
    /// Number of automaton states
    pub states: usize,
    /// Number of terminals, including the end-of-input token
    pub tokens: usize,
    /// Number of nonterminals
    pub nterms: usize,
    /// Number of grammar rules
    pub rules: usize,
    /// Length of the flat conflict array
    pub conflicts: usize,
}

impl TableCounts {
    /// Raw code of the error action.
    #[must_use]
    pub const fn error_code(&self) -> usize {
        self.states + self.rules + self.conflicts
    }

    /// Raw code of the accept action.
    #[must_use]
    pub const fn accept_code(&self) -> usize {
        self.error_code() + 1
    }

    /// Decode a raw action code, or `None` if it lies outside every range.
    #[must_use]
    pub const fn try_decode(&self, code: u16) -> Option<Action> {
        let code = code as usize;
        if code < self.states {
            Some(Action::Shift(code))
        } else if code < self.states + self.rules {
            Some(Action::Reduce(code - self.states))
        } else if code < self.error_code() {
            Some(Action::Conflict(code - self.states - self.rules))
        } else if code == self.error_code() {
            Some(Action::Error)
        } else if code == self.accept_code() {
            Some(Action::Accept)
        } else {
            None
        }
    }

    /// Decode a raw action code.
    ///
    /// # Panics
    ///
    /// Panics if the code is outside every range. Tables are trusted
    /// generated input, so this is a contract violation.
    #[must_use]
    pub fn decode(&self, code: u16) -> Action {
        match self.try_decode(code) {
            Some(action) => action,
            None => panic!("action code {code} is outside the table's code space"),
        }
    }

    /// Encode an action as a raw code.
    ///
    /// # Panics
    ///
    /// Panics if the encoded value does not fit in `u16`.
    #[must_use]
    pub fn encode(&self, action: Action) -> u16 {
        let code = match action {
            Action::Shift(state) => state,
            Action::Reduce(rule) => self.states + rule,
            Action::Conflict(offset) => self.states + self.rules + offset,
            Action::Error => self.error_code(),
            Action::Accept => self.accept_code(),
        };
        u16::try_from(code).unwrap_or_else(|_| panic!("action code {code} does not fit in u16"))
    }
}

/// A decoded parser action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub enum Action {
    /// Push the lookahead and move to the state
    Shift(StateId),
    /// Reduce by the rule
    Reduce(RuleId),
    /// Explore every alternative of the conflict entry at this offset
    Conflict(usize),
    /// No valid action
    Error,
    /// The input has been reduced to the start symbol
    Accept,
}

impl Action {
    /// Whether this is a shift action
    #[must_use]
    pub const fn is_shift(self) -> bool {
        matches!(self, Self::Shift(_))
    }

    /// Whether this is a reduce action
    #[must_use]
    pub const fn is_reduce(self) -> bool {
        matches!(self, Self::Reduce(_))
    }
}

/// Per-rule metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct RuleInfo {
    /// Nonterminal produced by the rule
    pub nterm: u16,
    /// Number of right-hand-side symbols consumed
    pub length: u16,
}

impl RuleInfo {
    /// Create rule metadata
    #[must_use]
    pub const fn new(nterm: u16, length: u16) -> Self {
        Self { nterm, length }
    }
}

/// Lookup contract between a table set and the engine.
///
/// Implementations must uphold the table invariants: every action code
/// decodes, conflict entries hold at least two alternatives of which only
/// the first may be a shift, and consulted goto entries name valid states.
/// An accepting state is entered only through a goto and is not the start
/// state, so the start symbol's value is on top when it accepts.
pub trait ParseTables {
    /// Sizes of the table set
    fn counts(&self) -> &TableCounts;

    /// State the initial branch starts in
    fn start_state(&self) -> StateId;

    /// Terminal fed by [`GlrParser::finish`](crate::glr::GlrParser::finish)
    fn end_token(&self) -> TokenId {
        0
    }

    /// Raw action code for `(state, token)`
    fn action_code(&self, state: StateId, token: TokenId) -> u16;

    /// Raw goto entry for `(state, nterm)`; [`GOTO_NONE`] when absent
    fn goto_code(&self, state: StateId, nterm: NontermId) -> u16;

    /// Metadata of a rule
    fn rule(&self, rule: RuleId) -> RuleInfo;

    /// Raw alternatives of the conflict entry at `offset` (the count word excluded)
    fn conflict(&self, offset: usize) -> &[u16];

    /// Decoded action for `(state, token)`
    fn action(&self, state: StateId, token: TokenId) -> Action {
        self.counts().decode(self.action_code(state, token))
    }

    /// Goto target for `(state, nterm)`.
    ///
    /// # Panics
    ///
    /// Panics if the entry is not a valid state.
    fn goto(&self, state: StateId, nterm: NontermId) -> StateId {
        let target = usize::from(self.goto_code(state, nterm));
        assert!(
            target < self.counts().states,
            "goto[{state}][{nterm}] does not name a state"
        );
        target
    }
}

impl<P: ParseTables + ?Sized> ParseTables for &P {
    fn counts(&self) -> &TableCounts {
        (**self).counts()
    }

    fn start_state(&self) -> StateId {
        (**self).start_state()
    }

    fn end_token(&self) -> TokenId {
        (**self).end_token()
    }

    fn action_code(&self, state: StateId, token: TokenId) -> u16 {
        (**self).action_code(state, token)
    }

    fn goto_code(&self, state: StateId, nterm: NontermId) -> u16 {
        (**self).goto_code(state, nterm)
    }

    fn rule(&self, rule: RuleId) -> RuleInfo {
        (**self).rule(rule)
    }

    fn conflict(&self, offset: usize) -> &[u16] {
        (**self).conflict(offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counts() -> TableCounts {
        TableCounts {
            states: 5,
            tokens: 3,
            nterms: 1,
            rules: 2,
            conflicts: 3,
        }
    }

    #[test]
    fn test_code_ranges_are_disjoint() {
        let counts = counts();
        assert_eq!(counts.decode(0), Action::Shift(0));
        assert_eq!(counts.decode(4), Action::Shift(4));
        assert_eq!(counts.decode(5), Action::Reduce(0));
        assert_eq!(counts.decode(6), Action::Reduce(1));
        assert_eq!(counts.decode(7), Action::Conflict(0));
        assert_eq!(counts.decode(9), Action::Conflict(2));
        assert_eq!(counts.decode(10), Action::Error);
        assert_eq!(counts.decode(11), Action::Accept);
        assert_eq!(counts.try_decode(12), None);
    }

    #[test]
    fn test_encode_inverts_decode() {
        let counts = counts();
        for code in 0..=11 {
            assert_eq!(counts.encode(counts.decode(code)), code);
        }
    }

    #[test]
    fn test_action_kinds() {
        let counts = counts();
        assert!(counts.decode(2).is_shift());
        assert!(!counts.decode(2).is_reduce());
        assert!(counts.decode(6).is_reduce());
        for code in 7..=11 {
            let action = counts.decode(code);
            assert!(!action.is_shift() && !action.is_reduce());
        }
    }

    #[test]
    #[should_panic(expected = "outside the table's code space")]
    fn test_decode_rejects_unknown_code() {
        let _ = counts().decode(200);
    }
}
