//! Stack values: the tagged cells stored in pieces

use crate::table::StateId;
use smallvec::SmallVec;

/// Payload of a stack cell.
///
/// `V` is the grammar's closed sum over its nonterminal value types, so one
/// `Value` variant covers every nonterminal type slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Symbol<T, V> {
    /// State marker only; the payload has been moved out
    Marker,
    /// A shifted token's semantic value
    Token(T),
    /// A reduced nonterminal's semantic value
    Value(V),
}

impl<T, V> Symbol<T, V> {
    /// Whether this holds a token value
    #[must_use]
    pub const fn is_token(&self) -> bool {
        matches!(self, Self::Token(_))
    }

    /// Whether this holds a nonterminal value
    #[must_use]
    pub const fn is_value(&self) -> bool {
        matches!(self, Self::Value(_))
    }

    /// Unwrap a token value.
    ///
    /// # Panics
    ///
    /// Panics if the symbol is not a token.
    #[must_use]
    #[track_caller]
    pub fn into_token(self) -> T {
        match self {
            Self::Token(token) => token,
            Self::Value(_) => panic!("expected a token value, found a nonterminal value"),
            Self::Marker => panic!("expected a token value, found a moved-out cell"),
        }
    }

    /// Unwrap a nonterminal value.
    ///
    /// # Panics
    ///
    /// Panics if the symbol is not a nonterminal value.
    #[must_use]
    #[track_caller]
    pub fn into_value(self) -> V {
        match self {
            Self::Value(value) => value,
            Self::Token(_) => panic!("expected a nonterminal value, found a token value"),
            Self::Marker => panic!("expected a nonterminal value, found a moved-out cell"),
        }
    }
}

/// One cell of stack history: a payload and the automaton state the branch
/// was in when the payload was pushed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueCell<T, V> {
    state: StateId,
    symbol: Symbol<T, V>,
}

impl<T, V> ValueCell<T, V> {
    /// A cell holding a token value
    #[must_use]
    pub const fn token(state: StateId, token: T) -> Self {
        Self {
            state,
            symbol: Symbol::Token(token),
        }
    }

    /// A cell holding a nonterminal value
    #[must_use]
    pub const fn value(state: StateId, value: V) -> Self {
        Self {
            state,
            symbol: Symbol::Value(value),
        }
    }

    /// State recorded when this cell was pushed
    #[must_use]
    pub const fn state(&self) -> StateId {
        self.state
    }

    /// The payload
    #[must_use]
    pub const fn symbol(&self) -> &Symbol<T, V> {
        &self.symbol
    }

    /// Borrow the token value.
    ///
    /// # Panics
    ///
    /// Panics if the cell does not hold a token.
    #[must_use]
    #[track_caller]
    pub fn get_token(&self) -> &T {
        match &self.symbol {
            Symbol::Token(token) => token,
            _ => panic!("cell pushed in state {} does not hold a token", self.state),
        }
    }

    /// Borrow the nonterminal value.
    ///
    /// # Panics
    ///
    /// Panics if the cell does not hold a nonterminal value.
    #[must_use]
    #[track_caller]
    pub fn get_value(&self) -> &V {
        match &self.symbol {
            Symbol::Value(value) => value,
            _ => panic!(
                "cell pushed in state {} does not hold a nonterminal value",
                self.state
            ),
        }
    }

    /// Move the payload out, leaving a marker behind
    #[allow(clippy::missing_const_for_fn)] // Cannot be const: generic payload
    pub fn take(&mut self) -> Symbol<T, V> {
        std::mem::replace(&mut self.symbol, Symbol::Marker)
    }

    /// Consume the cell, returning its payload
    #[must_use]
    pub fn into_symbol(self) -> Symbol<T, V> {
        self.symbol
    }
}

/// Right-hand-side values handed to a rule action, oldest first.
///
/// Each accessor moves the next value out. Generated reduction code knows
/// the shape of every rule, so a mismatched accessor is a contract violation
/// and panics.
#[derive(Debug)]
pub struct Rhs<T, V> {
    cells: smallvec::IntoIter<[ValueCell<T, V>; 8]>,
}

impl<T, V> Rhs<T, V> {
    pub(crate) fn new(cells: SmallVec<[ValueCell<T, V>; 8]>) -> Self {
        Self {
            cells: cells.into_iter(),
        }
    }

    /// Values not yet taken
    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Whether every value has been taken
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.len() == 0
    }

    /// Take the next value, whatever it holds.
    ///
    /// # Panics
    ///
    /// Panics if every value has been taken.
    #[track_caller]
    pub fn symbol(&mut self) -> Symbol<T, V> {
        match self.cells.next() {
            Some(cell) => cell.into_symbol(),
            None => panic!("rule action took more values than the rule has symbols"),
        }
    }

    /// Take the next value as a token.
    ///
    /// # Panics
    ///
    /// Panics if exhausted or if the value is not a token.
    #[track_caller]
    pub fn token(&mut self) -> T {
        self.symbol().into_token()
    }

    /// Take the next value as a nonterminal value.
    ///
    /// # Panics
    ///
    /// Panics if exhausted or if the value is not a nonterminal value.
    #[track_caller]
    pub fn value(&mut self) -> V {
        self.symbol().into_value()
    }

    /// Discard the next value.
    ///
    /// # Panics
    ///
    /// Panics if every value has been taken.
    #[track_caller]
    pub fn skip(&mut self) {
        let _ = self.symbol();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smallvec::smallvec;

    #[test]
    fn test_take_leaves_marker() {
        let mut cell: ValueCell<char, String> = ValueCell::token(3, 'x');
        assert_eq!(cell.take(), Symbol::Token('x'));
        assert_eq!(cell.symbol(), &Symbol::Marker);
        assert!(!cell.symbol().is_token());
        assert!(!cell.symbol().is_value());
        assert_eq!(cell.state(), 3);
    }

    #[test]
    fn test_symbol_kinds() {
        let token: ValueCell<char, String> = ValueCell::token(0, 'a');
        let value: ValueCell<char, String> = ValueCell::value(1, "A".to_string());

        assert!(token.symbol().is_token());
        assert!(!token.symbol().is_value());
        assert!(value.symbol().is_value());
        assert!(!value.symbol().is_token());
        assert_eq!(token.get_token(), &'a');
        assert_eq!(value.into_symbol().into_value(), "A");
    }

    #[test]
    fn test_rhs_yields_oldest_first() {
        let mut rhs: Rhs<char, String> = Rhs::new(smallvec![
            ValueCell::value(0, "lhs".to_string()),
            ValueCell::token(1, '+'),
            ValueCell::value(3, "rhs".to_string()),
        ]);
        assert_eq!(rhs.len(), 3);
        assert_eq!(rhs.value(), "lhs");
        rhs.skip();
        assert_eq!(rhs.value(), "rhs");
        assert!(rhs.is_empty());
    }

    #[test]
    #[should_panic(expected = "expected a token value")]
    fn test_tag_mismatch_panics() {
        let mut rhs: Rhs<char, String> = Rhs::new(smallvec![ValueCell::value(0, "e".into())]);
        let _ = rhs.token();
    }

    #[test]
    #[should_panic(expected = "more values than the rule has symbols")]
    fn test_overrun_panics() {
        let mut rhs: Rhs<char, String> = Rhs::new(SmallVec::new());
        rhs.skip();
    }
}
