use crate::glr::{Rhs, Symbol};
use crate::semantics::Semantics;
use crate::table::{Action, DenseTables, DenseTablesBuilder, RuleId, TokenId};
use std::cell::RefCell;

/// Semantics that render every reduction as `Name(child child …)`.
///
/// Tokens are single characters; a token's id is its position in the
/// alphabet, whose first character stands for end of input. Each branch's
/// user context records the rules that branch reduced, in order, and
/// syntax errors reported through the hook are kept for inspection.
#[derive(Debug, Clone)]
pub struct TreeSemantics {
    alphabet: &'static str,
    names: &'static [&'static str],
    errors: RefCell<Vec<(TokenId, char)>>,
}

impl TreeSemantics {
    /// Semantics for the given token alphabet and per-rule nonterminal names
    #[must_use]
    pub const fn new(alphabet: &'static str, names: &'static [&'static str]) -> Self {
        Self {
            alphabet,
            names,
            errors: RefCell::new(Vec::new()),
        }
    }

    /// Token id of a character.
    ///
    /// # Panics
    ///
    /// Panics if the character is not in the alphabet.
    #[must_use]
    pub fn token(&self, ch: char) -> TokenId {
        match self.alphabet.chars().position(|known| known == ch) {
            Some(token) => token,
            None => panic!("{ch:?} is not in the alphabet {:?}", self.alphabet),
        }
    }

    /// `(token, value)` pairs for every non-whitespace character of `input`
    #[must_use]
    pub fn lex(&self, input: &str) -> Vec<(TokenId, char)> {
        input
            .chars()
            .filter(|ch| !ch.is_whitespace())
            .map(|ch| (self.token(ch), ch))
            .collect()
    }

    /// Errors reported through [`Semantics::syntax_error`]
    #[must_use]
    pub fn reported_errors(&self) -> Vec<(TokenId, char)> {
        self.errors.borrow().clone()
    }
}

impl Semantics for TreeSemantics {
    type Token = char;
    type Value = String;
    type User = Vec<RuleId>;

    fn reduce(&self, rule: RuleId, user: &mut Vec<RuleId>, mut rhs: Rhs<char, String>) -> String {
        user.push(rule);
        let name = self.names[rule];
        if rhs.is_empty() {
            return name.to_string();
        }
        let mut children = Vec::with_capacity(rhs.len());
        while !rhs.is_empty() {
            children.push(match rhs.symbol() {
                Symbol::Token(ch) => ch.to_string(),
                Symbol::Value(value) => value,
                Symbol::Marker => panic!("rule {rule} received a moved-out cell"),
            });
        }
        format!("{name}({})", children.join(" "))
    }

    fn syntax_error(&self, _user: &mut Vec<RuleId>, token: TokenId, value: &char) {
        self.errors.borrow_mut().push((token, *value));
    }
}

/// One conflict with a shift and two empty reductions.
///
/// ```text
/// X -> a t      (0)
/// X -> a Y t    (1)
/// Y -> ε        (2)
/// Z -> ε        (3)
/// X -> a Z t    (4)
/// ```
///
/// State 4 (after `a`) holds `{shift 5, reduce 2, reduce 3}` on `t`, with
/// `goto[4][Y] = 6` and `goto[4][Z] = 7`. Both goto states shift `t`, so
/// after `a t` three branches are alive and `a t $` has three parses.
#[must_use]
pub fn three_way_fork() -> (DenseTables, TreeSemantics) {
    const A: TokenId = 1;
    const T: TokenId = 2;
    let tables = DenseTablesBuilder::new(10, 3, 3)
        .action(0, A, Action::Shift(4))
        .goto(0, 0, 1)
        .action(1, 0, Action::Accept)
        .conflict(4, T, &[Action::Shift(5), Action::Reduce(2), Action::Reduce(3)])
        .goto(4, 1, 6)
        .goto(4, 2, 7)
        .action(5, 0, Action::Reduce(0))
        .action(6, T, Action::Shift(8))
        .action(7, T, Action::Shift(9))
        .action(8, 0, Action::Reduce(1))
        .action(9, 0, Action::Reduce(4))
        .rule(0, 2)
        .rule(0, 3)
        .rule(1, 0)
        .rule(2, 0)
        .rule(0, 3)
        .build()
        .expect("fork fixture tables are valid");
    (tables, TreeSemantics::new("$at", &["X", "X", "Y", "Z", "X"]))
}

/// A reduction whose cells span a shared piece.
///
/// ```text
/// P -> a b c d  (0)
/// P -> a b V d  (1)
/// V -> c W      (2)
/// W -> ε        (3)
/// ```
///
/// After `a b c`, state 3 holds `{shift 4, reduce 3}` on `d`. The reducing
/// child lands in state 5, which reduces `V -> c W` on `d`: it needs one
/// cell of the three-cell piece it shares with the shifting child, so that
/// piece is split into a shared `[a b]` and a private `[c]`.
#[must_use]
pub fn split_scenario() -> (DenseTables, TreeSemantics) {
    let tables = cross_piece_tables(&[Action::Shift(4), Action::Reduce(3)]);
    (tables, TreeSemantics::new("$abcd", &["P", "P", "V", "W", "U"]))
}

/// [`split_scenario`] with the shift replaced by a dead end.
///
/// State 3 holds `{reduce U -> ε, reduce 3}` on `d`, and `goto[3][U]` has
/// no action on `d`. That child is pruned before its sibling reduces
/// `V -> c W`, so the lower piece is exclusive again and gets merged.
#[must_use]
pub fn merge_scenario() -> (DenseTables, TreeSemantics) {
    let tables = cross_piece_tables(&[Action::Reduce(4), Action::Reduce(3)]);
    (tables, TreeSemantics::new("$abcd", &["P", "P", "V", "W", "U"]))
}

fn cross_piece_tables(at_d: &[Action]) -> DenseTables {
    const END: TokenId = 0;
    const A: TokenId = 1;
    const B: TokenId = 2;
    const C: TokenId = 3;
    const D: TokenId = 4;
    DenseTablesBuilder::new(9, 5, 4)
        .action(0, A, Action::Shift(1))
        .goto(0, 0, 8)
        .action(1, B, Action::Shift(2))
        .action(2, C, Action::Shift(3))
        .goto(2, 1, 6)
        .conflict(3, D, at_d)
        .goto(3, 2, 5)
        .goto(3, 3, 4)
        .action(4, END, Action::Reduce(0))
        .action(5, D, Action::Reduce(2))
        .action(6, D, Action::Shift(7))
        .action(7, END, Action::Reduce(1))
        .action(8, END, Action::Accept)
        .rule(0, 4)
        .rule(0, 4)
        .rule(1, 2)
        .rule(2, 0)
        .rule(3, 0)
        .build()
        .expect("cross-piece fixture tables are valid")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::ParseTables;

    #[test]
    fn test_lex_maps_alphabet_positions() {
        let (_, semantics) = split_scenario();
        assert_eq!(semantics.lex("a b"), vec![(1, 'a'), (2, 'b')]);
    }

    #[test]
    fn test_fork_fixture_conflict() {
        let (tables, _) = three_way_fork();
        let Action::Conflict(offset) = tables.action(4, 2) else {
            panic!("state 4 should conflict on t");
        };
        assert_eq!(tables.conflict(offset).len(), 3);
    }

    #[test]
    fn test_tree_semantics_renders_children() {
        let semantics = TreeSemantics::new("$x", &["S"]);
        let mut user = Vec::new();
        let rhs = Rhs::new(smallvec::smallvec![
            crate::glr::ValueCell::token(0, 'x'),
            crate::glr::ValueCell::value(1, "S".to_string()),
        ]);
        assert_eq!(semantics.reduce(0, &mut user, rhs), "S(x S)");
        assert_eq!(user, vec![0]);
    }
}
