//! # Error Types
//!
//! Errors reported by table validation, by the GLR engine and by the stack
//! invariant checker.
//!
//! ## Error Types
//!
//! - [`ParseError`]: the parse as a whole failed or cannot continue
//! - [`TableError`]: a table set violates the consumption contract
//! - [`StackError`]: the piece tree's reference counts are inconsistent
//!
//! A branch-local syntax error is not an error at all: the branch is pruned
//! silently as long as another branch survives. Only the death of the last
//! branch surfaces as [`ParseError::Syntax`].
//!
//! ## Diagnostics Support
//!
//! When the `diagnostics` feature is enabled, errors integrate with [`miette`]
//! for rich error reporting.

use crate::table::{NontermId, RuleId, StateId, TokenId};
use thiserror::Error;

#[cfg(feature = "diagnostics")]
use miette::Diagnostic;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[cfg_attr(feature = "diagnostics", derive(Diagnostic))]
pub enum ParseError {
    #[error("Syntax error: no action for token {token} in state {state}")]
    #[cfg_attr(
        feature = "diagnostics",
        diagnostic(code(thicket::syntax), help("every parse branch rejected this token"))
    )]
    Syntax { token: TokenId, state: StateId },

    #[error("Branch limit exceeded: more than {limit} parse branches")]
    #[cfg_attr(
        feature = "diagnostics",
        diagnostic(
            code(thicket::branch_limit),
            help("raise GlrConfig::max_branches or remove ambiguity from the grammar")
        )
    )]
    BranchLimit { limit: usize },

    #[error("Input ended without an accepting parse")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(thicket::incomplete)))]
    Incomplete,

    #[error("Parser has halted")]
    #[cfg_attr(
        feature = "diagnostics",
        diagnostic(code(thicket::halted), help("create a new parser for new input"))
    )]
    Halted,
}

impl ParseError {
    /// Token that caused the error, if any
    #[must_use]
    pub const fn token(&self) -> Option<TokenId> {
        match self {
            Self::Syntax { token, .. } => Some(*token),
            _ => None,
        }
    }
}

/// A table set that breaks the consumption contract
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[cfg_attr(feature = "diagnostics", derive(Diagnostic))]
pub enum TableError {
    #[error("{table} table has {actual} entries, expected {expected}")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(table::length)))]
    LengthMismatch {
        table: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Action code {code} at state {state}, token {token} is outside the code space")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(table::invalid_action)))]
    InvalidAction {
        state: StateId,
        token: TokenId,
        code: u16,
    },

    #[error("Conflict entry at offset {offset} is malformed: {reason}")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(table::invalid_conflict)))]
    InvalidConflict { offset: usize, reason: String },

    #[error("goto[{state}][{nterm}] = {target} is not a state")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(table::invalid_goto)))]
    InvalidGoto {
        state: StateId,
        nterm: NontermId,
        target: u16,
    },

    #[error("Accept at state {state}, token {token} cannot yield a value: {reason}")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(table::invalid_accept)))]
    InvalidAccept {
        state: StateId,
        token: TokenId,
        reason: &'static str,
    },

    #[error("Rule {rule} produces nonterminal {nterm}, but there are only {nterms}")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(table::invalid_rule)))]
    InvalidRule {
        rule: RuleId,
        nterm: usize,
        nterms: usize,
    },

    #[error("{what} {index} is out of range (limit {limit})")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(table::out_of_range)))]
    OutOfRange {
        what: &'static str,
        index: usize,
        limit: usize,
    },

    #[error("Action code space needs {needed} codes, but codes are 16-bit")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(table::code_overflow)))]
    CodeOverflow { needed: usize },
}

/// Inconsistency found by [`GlrParser::verify`](crate::glr::GlrParser::verify)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StackError {
    #[error("Piece {piece} stores refcount {stored}, but {expected} referents point at it")]
    RefcountMismatch {
        piece: usize,
        stored: usize,
        expected: usize,
    },

    #[error("Piece {piece} is allocated but unreachable from any branch")]
    LeakedPiece { piece: usize },

    #[error("Branch {branch} does not own its head piece exclusively (refcount {refcount})")]
    SharedHead { branch: usize, refcount: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_syntax_error_reports_token() {
        let error = ParseError::Syntax { token: 3, state: 7 };
        assert_eq!(error.token(), Some(3));
        assert_eq!(
            error.to_string(),
            "Syntax error: no action for token 3 in state 7"
        );
        assert_eq!(ParseError::Incomplete.token(), None);
    }

    #[test]
    fn test_table_error_display() {
        let error = TableError::LengthMismatch {
            table: "action",
            expected: 15,
            actual: 14,
        };
        assert_eq!(error.to_string(), "action table has 14 entries, expected 15");
    }
}
