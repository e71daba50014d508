//! Rule actions, per-branch user context and the syntax error hook
//!
//! Generated grammar code implements [`Semantics`] once per grammar: a
//! `match` over rule ids that pulls each rule's right-hand side out of the
//! [`Rhs`] in production order and builds the nonterminal's value.

use crate::glr::Rhs;
use crate::table::{RuleId, TokenId};

/// Grammar-specific behaviour plugged into the engine.
///
/// Semantic values must be `Clone` because history shared between branches
/// is copied, not moved, when one branch reduces across a fork point.
pub trait Semantics {
    /// Semantic value of a token
    type Token: Clone;
    /// Closed sum of every nonterminal's semantic value
    type Value: Clone;
    /// Context threaded through rule actions, one copy per branch
    type User: Clone;

    /// Run the action of `rule` over its right-hand-side values.
    fn reduce(
        &self,
        rule: RuleId,
        user: &mut Self::User,
        rhs: Rhs<Self::Token, Self::Value>,
    ) -> Self::Value;

    /// Context for a child branch created when `parent` forks
    fn split_user(&self, parent: &Self::User) -> Self::User {
        parent.clone()
    }

    /// Called once when the last live branch rejects `token`.
    fn syntax_error(&self, user: &mut Self::User, token: TokenId, value: &Self::Token) {
        let _ = (user, token, value);
    }
}

/// Semantics that keep no values: every reduction yields `()`.
///
/// Useful for recognising input when only acceptance matters.
#[derive(Debug, Clone, Copy, Default)]
pub struct Recognizer;

impl Semantics for Recognizer {
    type Token = ();
    type Value = ();
    type User = ();

    fn reduce(&self, _rule: RuleId, _user: &mut (), _rhs: Rhs<(), ()>) {}
}
