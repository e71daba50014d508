use crate::glr::Rhs;
use crate::semantics::Semantics;
use crate::table::{Action, DenseTables, DenseTablesBuilder, RuleId, TokenId};
use std::fmt;

/// End of input
pub const END: TokenId = 0;
/// A number literal
pub const NUM: TokenId = 1;
/// `+`
pub const PLUS: TokenId = 2;

/// LALR tables for `E -> E + E | n` with the shift/reduce conflict on `+`
/// left in.
///
/// | State | `$` | `n` | `+` | goto `E` |
/// |-------|-----|-----|-----|----------|
/// | 0 | | s2 | | 1 |
/// | 1 | acc | | s3 | |
/// | 2 | r1 | | r1 | |
/// | 3 | | s2 | | 4 |
/// | 4 | r0 | | s3 / r0 | |
///
/// Rule 0 is `E -> E + E`, rule 1 is `E -> n`.
#[must_use]
pub fn ambiguous_sum() -> DenseTables {
    DenseTablesBuilder::new(5, 3, 1)
        .action(0, NUM, Action::Shift(2))
        .goto(0, 0, 1)
        .action(1, END, Action::Accept)
        .action(1, PLUS, Action::Shift(3))
        .action(2, END, Action::Reduce(1))
        .action(2, PLUS, Action::Reduce(1))
        .action(3, NUM, Action::Shift(2))
        .goto(3, 0, 4)
        .action(4, END, Action::Reduce(0))
        .conflict(4, PLUS, &[Action::Shift(3), Action::Reduce(0)])
        .rule(0, 3)
        .rule(0, 1)
        .build()
        .expect("sum fixture tables are valid")
}

/// Split `input` into `(token, value)` pairs for [`ambiguous_sum`].
///
/// Digit runs become [`NUM`] tokens carrying their value, `+` becomes
/// [`PLUS`] and whitespace is skipped.
///
/// # Panics
///
/// Panics on any other character.
#[must_use]
pub fn tokens(input: &str) -> Vec<(TokenId, i64)> {
    let mut tokens = Vec::new();
    let mut number: Option<i64> = None;
    for ch in input.chars() {
        if let Some(digit) = ch.to_digit(10) {
            number = Some(number.unwrap_or_default() * 10 + i64::from(digit));
            continue;
        }
        if let Some(value) = number.take() {
            tokens.push((NUM, value));
        }
        match ch {
            '+' => tokens.push((PLUS, 0)),
            ch if ch.is_whitespace() => {}
            other => panic!("unexpected character {other:?} in sum input"),
        }
    }
    if let Some(value) = number {
        tokens.push((NUM, value));
    }
    tokens
}

/// Number of binary trees with `n` internal nodes
#[must_use]
pub fn catalan(n: u64) -> u64 {
    (0..n).fold(1, |c, k| c * 2 * (2 * k + 1) / (k + 2))
}

/// Expression tree built by [`SumSemantics`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    /// A literal
    Num(i64),
    /// `lhs + rhs`
    Add(Box<Expr>, Box<Expr>),
}

impl Expr {
    /// Evaluate the sum
    #[must_use]
    pub fn eval(&self) -> i64 {
        match self {
            Self::Num(value) => *value,
            Self::Add(lhs, rhs) => lhs.eval() + rhs.eval(),
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Num(value) => write!(f, "{value}"),
            Self::Add(lhs, rhs) => write!(f, "({lhs}+{rhs})"),
        }
    }
}

/// Rule actions for [`ambiguous_sum`]
#[derive(Debug, Clone, Copy, Default)]
pub struct SumSemantics;

impl Semantics for SumSemantics {
    type Token = i64;
    type Value = Expr;
    type User = ();

    fn reduce(&self, rule: RuleId, _user: &mut (), mut rhs: Rhs<i64, Expr>) -> Expr {
        match rule {
            0 => {
                let lhs = rhs.value();
                rhs.skip();
                let rhs = rhs.value();
                Expr::Add(Box::new(lhs), Box::new(rhs))
            }
            1 => Expr::Num(rhs.token()),
            _ => unreachable!("sum grammar has two rules"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::ParseTables;

    #[test]
    fn test_tokens_groups_digits() {
        assert_eq!(tokens("12 + 3"), vec![(NUM, 12), (PLUS, 0), (NUM, 3)]);
        assert!(tokens("").is_empty());
    }

    #[test]
    fn test_catalan_numbers() {
        let first: Vec<u64> = (0..7).map(catalan).collect();
        assert_eq!(first, vec![1, 1, 2, 5, 14, 42, 132]);
    }

    #[test]
    fn test_expr_display_brackets_every_sum() {
        let expr = Expr::Add(
            Box::new(Expr::Num(1)),
            Box::new(Expr::Add(Box::new(Expr::Num(2)), Box::new(Expr::Num(3)))),
        );
        assert_eq!(expr.to_string(), "(1+(2+3))");
        assert_eq!(expr.eval(), 6);
    }

    #[test]
    fn test_table_has_one_conflict() {
        let tables = ambiguous_sum();
        assert_eq!(tables.action(4, PLUS), Action::Conflict(0));
        assert_eq!(tables.conflict(0).len(), 2);
    }
}
