//! GLR engine: drives every live branch through one token at a time

use super::event::{GlrEvent, GlrEventHandler, NullEventHandler};
use super::piece::{PieceArena, PieceId, PieceView};
use super::stack::{BranchId, BranchList, BranchView};
use super::stats::GlrStats;
use super::value::{Rhs, ValueCell};
use super::{Accepted, GlrConfig, ParseStatus};
use crate::error::{ParseError, StackError};
use crate::semantics::Semantics;
use crate::table::{Action, ParseTables, RuleId, StateId, TokenId};
use hashbrown::{HashMap, HashSet};
use smallvec::SmallVec;
use std::collections::VecDeque;
use tracing::{debug, trace, warn};

type Cell<S> = ValueCell<<S as Semantics>::Token, <S as Semantics>::Value>;

/// Outcome of forking a branch on a conflict entry
#[derive(Debug)]
struct Fork {
    /// Child that keeps competing for the current token
    resume: Option<BranchId>,
    /// Child that already consumed the token
    shifted: Option<BranchId>,
    /// Remaining reduce children, to be driven after `resume`
    siblings: SmallVec<[BranchId; 4]>,
}

/// Table-driven GLR parser.
///
/// Feed tokens with [`parse`](Self::parse) and end the input with
/// [`finish`](Self::finish). Conflicts in the tables fork the current branch
/// into one child per alternative; children share the history below the
/// fork point through the piece tree and die independently.
///
/// # Example
///
/// ```
/// use thicket::glr::GlrParser;
/// use thicket::testing::{SumSemantics, ambiguous_sum, tokens};
///
/// let tables = ambiguous_sum();
/// let mut parser = GlrParser::new(&tables, SumSemantics, ());
/// for (token, value) in tokens("1+2+3") {
///     parser.parse(token, value)?;
/// }
/// let parses = parser.finish(0)?;
///
/// // Both groupings survive.
/// assert_eq!(parses.len(), 2);
/// assert!(parses.iter().all(|parse| parse.value.eval() == 6));
/// # Ok::<(), thicket::ParseError>(())
/// ```
pub struct GlrParser<S: Semantics, P: ParseTables> {
    tables: P,
    semantics: S,
    config: GlrConfig,
    pieces: PieceArena<S::Token, S::Value>,
    branches: BranchList<S::User>,
    frontier: Vec<BranchId>,
    accepted: Vec<Accepted<S::Value, S::User>>,
    status: ParseStatus,
    finished: bool,
    stats: GlrStats,
    handler: Box<dyn GlrEventHandler>,
}

impl<S: Semantics, P: ParseTables> GlrParser<S, P> {
    /// Create a parser with the default configuration
    pub fn new(tables: P, semantics: S, user: S::User) -> Self {
        Self::with_config(tables, semantics, user, GlrConfig::default())
    }

    /// Create a parser with one branch in the start state.
    pub fn with_config(tables: P, semantics: S, user: S::User, config: GlrConfig) -> Self {
        let mut pieces = PieceArena::with_capacity(config.piece_capacity);
        let mut branches = BranchList::new();
        let start = tables.start_state();
        let root = branches.create(&mut pieces, None, start, user);
        let stats = GlrStats {
            peak_branches: 1,
            ..GlrStats::new()
        };

        Self {
            tables,
            semantics,
            config,
            pieces,
            branches,
            frontier: vec![root],
            accepted: Vec::new(),
            status: ParseStatus::Parsing,
            finished: false,
            stats,
            handler: Box::new(NullEventHandler),
        }
    }

    /// Install a handler that receives every engine event
    pub fn set_event_handler(&mut self, handler: impl GlrEventHandler + 'static) {
        self.handler = Box::new(handler);
    }

    /// Advance every live branch by one lookahead token.
    ///
    /// A branch with no action for `token` is pruned as long as another
    /// branch survives the token.
    ///
    /// # Errors
    ///
    /// - [`ParseError::Syntax`] when the last live branch rejects the token
    /// - [`ParseError::BranchLimit`] when a fork would exceed
    ///   [`GlrConfig::max_branches`]
    /// - [`ParseError::Halted`] once the parse has failed, finished or has
    ///   no branch left to drive
    ///
    /// # Panics
    ///
    /// Panics if `token` is not a terminal of the tables, or if the tables
    /// or rule actions break their contract.
    pub fn parse(&mut self, token: TokenId, value: S::Token) -> Result<(), ParseError> {
        if self.finished || self.status != ParseStatus::Parsing {
            return Err(ParseError::Halted);
        }
        let tokens = self.tables.counts().tokens;
        assert!(token < tokens, "token {token} is not one of the {tokens} terminals");
        self.stats.tokens += 1;

        let mut pending: VecDeque<BranchId> = std::mem::take(&mut self.frontier).into();
        let mut shifted = Vec::with_capacity(pending.len());

        while let Some(mut branch) = pending.pop_front() {
            loop {
                let state = self.branches.get(branch).state;
                match self.tables.action(state, token) {
                    Action::Shift(target) => {
                        self.shift(branch, target, token, value.clone());
                        shifted.push(branch);
                        break;
                    }
                    Action::Reduce(rule) => self.reduce(branch, rule),
                    Action::Conflict(offset) => {
                        let width = self.tables.conflict(offset).len();
                        let live = pending.len() + shifted.len() + width;
                        if live > self.config.max_branches {
                            let limit = self.config.max_branches;
                            warn!(
                                branch = %branch,
                                state,
                                token,
                                live,
                                limit,
                                "branch limit exceeded"
                            );
                            self.fail(branch, token, &value);
                            for id in pending.drain(..).chain(shifted.drain(..)) {
                                self.branches.destroy(&mut self.pieces, id);
                            }
                            return Err(ParseError::BranchLimit { limit });
                        }

                        let fork = self.fork(branch, offset, token, &value);
                        shifted.extend(fork.shifted);
                        for &sibling in fork.siblings.iter().rev() {
                            pending.push_front(sibling);
                        }
                        match fork.resume {
                            Some(next) => branch = next,
                            None => break,
                        }
                    }
                    Action::Accept => {
                        self.accept(branch, token);
                        break;
                    }
                    Action::Error => {
                        if pending.is_empty() && shifted.is_empty() && self.accepted.is_empty() {
                            warn!(state, token, "syntax error: no branch can continue");
                            self.fail(branch, token, &value);
                            return Err(ParseError::Syntax { token, state });
                        }
                        self.prune(branch, state, token);
                        break;
                    }
                }
            }
        }

        self.frontier = shifted;
        if self.frontier.is_empty() {
            self.status = ParseStatus::Accepted;
        }

        if self.config.verify_each_token
            && let Err(error) = self.verify()
        {
            panic!("stack invariant violated after token {token}: {error}");
        }
        Ok(())
    }

    /// Feed the end-of-input token and collect every accepted parse.
    ///
    /// Results are returned in acceptance order; more than one means the
    /// input is ambiguous. Branches still alive after the end token are
    /// discarded.
    ///
    /// # Errors
    ///
    /// - any error [`parse`](Self::parse) reports for the end token
    /// - [`ParseError::Incomplete`] if no branch accepted
    /// - [`ParseError::Halted`] if the parse already failed or finished
    pub fn finish(
        &mut self,
        value: S::Token,
    ) -> Result<Vec<Accepted<S::Value, S::User>>, ParseError> {
        if self.finished || self.status == ParseStatus::Failed {
            self.finished = true;
            return Err(ParseError::Halted);
        }
        if self.status == ParseStatus::Parsing {
            let end = self.tables.end_token();
            if let Err(error) = self.parse(end, value) {
                self.finished = true;
                return Err(error);
            }
        }
        self.finished = true;

        for id in std::mem::take(&mut self.frontier) {
            debug!(branch = %id, "discarding branch still live at end of input");
            self.branches.destroy(&mut self.pieces, id);
        }
        if self.accepted.is_empty() {
            self.status = ParseStatus::Failed;
            return Err(ParseError::Incomplete);
        }
        self.status = ParseStatus::Accepted;
        Ok(std::mem::take(&mut self.accepted))
    }

    /// [`finish`](Self::finish) with a default end-of-input value
    ///
    /// # Errors
    ///
    /// See [`finish`](Self::finish).
    pub fn finish_default(&mut self) -> Result<Vec<Accepted<S::Value, S::User>>, ParseError>
    where
        S::Token: Default,
    {
        self.finish(S::Token::default())
    }

    fn shift(&mut self, branch: BranchId, target: StateId, token: TokenId, value: S::Token) {
        let entry = self.branches.get_mut(branch);
        let from = entry.state;
        entry.state = target;
        let head = entry.piece;
        debug_assert_eq!(self.pieces.get(head).refcount, 1, "shift into a shared piece");
        self.pieces.push(head, ValueCell::token(from, value));

        self.stats.shifts += 1;
        trace!(branch = %branch, from, to = target, token, "shift");
        self.handler.handle(GlrEvent::Shift {
            branch,
            from,
            to: target,
            token,
        });
    }

    fn reduce(&mut self, branch: BranchId, rule: RuleId) {
        let info = self.tables.rule(rule);
        let length = usize::from(info.length);
        let nterm = usize::from(info.nterm);
        let Self {
            pieces,
            branches,
            semantics,
            stats,
            ..
        } = &mut *self;

        let entry = branches.get_mut(branch);
        let head = entry.piece;
        pieces.gather(head, length, stats);

        let values = &mut pieces.get_mut(head).values;
        let start = values.len() - length;
        let resumed = if length == 0 {
            entry.state
        } else {
            values[start].state()
        };
        let rhs: SmallVec<[Cell<S>; 8]> = values.drain(start..).collect();
        let value = semantics.reduce(rule, &mut entry.user, Rhs::new(rhs));

        let target = self.tables.goto(resumed, nterm);
        self.pieces.push(head, ValueCell::value(resumed, value));
        self.branches.get_mut(branch).state = target;

        self.stats.reductions += 1;
        trace!(branch = %branch, rule, length, resumed, to = target, "reduce");
        self.handler.handle(GlrEvent::Reduce {
            branch,
            rule,
            resumed,
            to: target,
        });
    }

    fn fork(&mut self, origin: BranchId, offset: usize, token: TokenId, value: &S::Token) -> Fork {
        let counts = *self.tables.counts();
        let alternatives: SmallVec<[Action; 4]> = self
            .tables
            .conflict(offset)
            .iter()
            .map(|&code| counts.decode(code))
            .collect();
        let parent = self.branches.get(origin);
        let (state, piece) = (parent.state, parent.piece);

        let mut children: SmallVec<[BranchId; 4]> = SmallVec::new();
        for _ in &alternatives {
            let user = self.semantics.split_user(&self.branches.get(origin).user);
            children.push(self.branches.create(&mut self.pieces, Some(piece), state, user));
        }
        self.branches.destroy(&mut self.pieces, origin);

        self.stats.forks += 1;
        self.stats.peak_branches = self.stats.peak_branches.max(self.branches.len());
        debug!(branch = %origin, state, token, children = children.len(), "fork");
        self.handler.handle(GlrEvent::Fork {
            branch: origin,
            state,
            token,
            children: children.to_vec(),
        });

        let mut fork = Fork {
            resume: None,
            shifted: None,
            siblings: SmallVec::new(),
        };
        for (index, (&child, action)) in children.iter().zip(alternatives).enumerate() {
            match action {
                Action::Shift(target) if index == 0 => {
                    self.shift(child, target, token, value.clone());
                    fork.shifted = Some(child);
                }
                Action::Reduce(rule) => {
                    self.reduce(child, rule);
                    if fork.resume.is_none() {
                        fork.resume = Some(child);
                    } else {
                        fork.siblings.push(child);
                    }
                }
                other => {
                    panic!("conflict entry at offset {offset} holds {other:?} in position {index}")
                }
            }
        }
        fork
    }

    fn accept(&mut self, branch: BranchId, token: TokenId) {
        let head = self.branches.get(branch).piece;
        self.pieces.gather(head, 1, &mut self.stats);
        let value = match self.pieces.get_mut(head).values.last_mut() {
            Some(cell) => cell.take().into_value(),
            None => unreachable!("gather left the head piece empty"),
        };
        let user = self.branches.destroy(&mut self.pieces, branch);
        self.accepted.push(Accepted { value, user });

        self.stats.accepted += 1;
        debug!(branch = %branch, token, "accept");
        self.handler.handle(GlrEvent::Accept { branch, token });
    }

    fn prune(&mut self, branch: BranchId, state: StateId, token: TokenId) {
        self.branches.destroy(&mut self.pieces, branch);
        self.stats.pruned += 1;
        debug!(branch = %branch, state, token, "prune");
        self.handler.handle(GlrEvent::Prune {
            branch,
            state,
            token,
        });
    }

    /// Report a fatal error through the hook and tear the branch down.
    fn fail(&mut self, branch: BranchId, token: TokenId, value: &S::Token) {
        let entry = self.branches.get_mut(branch);
        let state = entry.state;
        self.semantics.syntax_error(&mut entry.user, token, value);
        self.branches.destroy(&mut self.pieces, branch);
        self.status = ParseStatus::Failed;
        self.handler.handle(GlrEvent::SyntaxError { state, token });
    }

    /// Current status of the parse
    #[must_use]
    pub const fn status(&self) -> ParseStatus {
        self.status
    }

    /// Number of live branches
    #[must_use]
    pub const fn branch_count(&self) -> usize {
        self.branches.len()
    }

    /// Live branches, in the order they will see the next token
    #[must_use]
    pub fn branches(&self) -> Vec<BranchView> {
        self.frontier
            .iter()
            .map(|&id| {
                let branch = self.branches.get(id);
                BranchView {
                    id,
                    state: branch.state,
                    piece: branch.piece,
                    depth: self.pieces.depth(branch.piece),
                }
            })
            .collect()
    }

    /// History of a live branch, oldest cell first
    #[must_use]
    pub fn history(&self, branch: BranchId) -> Option<Vec<&Cell<S>>> {
        self.branches
            .contains(branch)
            .then(|| self.pieces.history(self.branches.get(branch).piece))
    }

    /// User context of a live branch
    #[must_use]
    pub fn user(&self, branch: BranchId) -> Option<&S::User> {
        self.branches
            .contains(branch)
            .then(|| &self.branches.get(branch).user)
    }

    /// Summary of an allocated piece
    #[must_use]
    pub fn piece(&self, id: PieceId) -> Option<PieceView> {
        self.pieces.view(id)
    }

    /// Number of allocated pieces
    #[must_use]
    pub const fn live_pieces(&self) -> usize {
        self.pieces.live()
    }

    /// Parses accepted so far and not yet returned by [`finish`](Self::finish)
    #[must_use]
    pub fn accepted(&self) -> &[Accepted<S::Value, S::User>] {
        &self.accepted
    }

    /// Counters collected so far
    #[must_use]
    pub const fn stats(&self) -> &GlrStats {
        &self.stats
    }

    /// Configuration in use
    #[must_use]
    pub const fn config(&self) -> &GlrConfig {
        &self.config
    }

    /// Tables in use
    #[must_use]
    pub const fn tables(&self) -> &P {
        &self.tables
    }

    /// Semantics in use
    #[must_use]
    pub const fn semantics(&self) -> &S {
        &self.semantics
    }

    /// Check the piece tree against its reference counts.
    ///
    /// Every piece's stored refcount must equal the number of branches and
    /// pieces pointing at it, every head piece must be exclusive, and every
    /// allocated piece must be reachable from a live branch.
    ///
    /// # Errors
    ///
    /// Returns the first inconsistency found.
    pub fn verify(&self) -> Result<(), StackError> {
        let mut referents: HashMap<PieceId, usize> = HashMap::new();
        for (_, branch) in self.branches.iter() {
            *referents.entry(branch.piece).or_default() += 1;
        }
        for (_, piece) in self.pieces.iter() {
            if let Some(prev) = piece.prev {
                *referents.entry(prev).or_default() += 1;
            }
        }

        for (id, piece) in self.pieces.iter() {
            let expected = referents.get(&id).copied().unwrap_or_default();
            if piece.refcount != expected {
                return Err(StackError::RefcountMismatch {
                    piece: id.index(),
                    stored: piece.refcount,
                    expected,
                });
            }
        }

        let mut reachable = HashSet::new();
        for (id, branch) in self.branches.iter() {
            let refcount = self.pieces.get(branch.piece).refcount;
            if refcount != 1 {
                return Err(StackError::SharedHead {
                    branch: id.index(),
                    refcount,
                });
            }
            let mut current = Some(branch.piece);
            while let Some(piece) = current {
                if !reachable.insert(piece) {
                    break;
                }
                current = self.pieces.get(piece).prev;
            }
        }

        match self.pieces.iter().find(|(id, _)| !reachable.contains(id)) {
            Some((id, _)) => Err(StackError::LeakedPiece { piece: id.index() }),
            None => Ok(()),
        }
    }
}

impl<S, P> std::fmt::Debug for GlrParser<S, P>
where
    S: Semantics,
    P: ParseTables,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GlrParser")
            .field("status", &self.status)
            .field("branches", &self.branches.len())
            .field("pieces", &self.pieces.live())
            .field("accepted", &self.accepted.len())
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{SumSemantics, ambiguous_sum, tokens};

    #[test]
    fn test_new_parser_has_one_branch_on_an_empty_piece() {
        let tables = ambiguous_sum();
        let parser = GlrParser::new(&tables, SumSemantics, ());
        let branches = parser.branches();

        assert_eq!(parser.status(), ParseStatus::Parsing);
        assert_eq!(branches.len(), 1);
        assert_eq!(branches[0].state, 0);
        assert_eq!(branches[0].depth, 0);
        assert_eq!(parser.live_pieces(), 1);
        assert_eq!(parser.piece(branches[0].piece).unwrap().refcount, 1);
        assert!(parser.verify().is_ok());
    }

    #[test]
    fn test_shift_pushes_token_on_head_piece() {
        let tables = ambiguous_sum();
        let mut parser = GlrParser::new(&tables, SumSemantics, ());
        parser.parse(1, 7).unwrap();

        let branch = parser.branches()[0];
        let history = parser.history(branch.id).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(*history[0].get_token(), 7);
        assert_eq!(history[0].state(), 0);
        assert_eq!(parser.stats().shifts, 1);
    }

    #[test]
    fn test_conflict_forks_one_child_per_alternative() {
        let tables = ambiguous_sum();
        let mut parser = GlrParser::new(&tables, SumSemantics, ());
        for (token, value) in tokens("1+2") {
            parser.parse(token, value).unwrap();
        }
        // On the second '+', state 4 holds {shift, reduce E -> E + E}.
        parser.parse(2, 0).unwrap();

        assert_eq!(parser.stats().forks, 1);
        assert_eq!(parser.branch_count(), 2);
        assert!(parser.verify().is_ok());
    }

    #[test]
    fn test_verify_reports_refcount_mismatch() {
        let tables = ambiguous_sum();
        let mut parser = GlrParser::new(&tables, SumSemantics, ());
        let head = parser.branches()[0].piece;
        parser.pieces.get_mut(head).refcount += 1;

        assert_eq!(
            parser.verify(),
            Err(StackError::RefcountMismatch {
                piece: head.index(),
                stored: 2,
                expected: 1,
            })
        );
    }

    #[test]
    fn test_verify_reports_shared_head_and_leak() {
        let tables = ambiguous_sum();
        let mut parser = GlrParser::new(&tables, SumSemantics, ());
        let branch = parser.branches()[0];
        let above = parser.pieces.alloc(Some(branch.piece));
        parser.pieces.get_mut(above).refcount = 0;
        assert_eq!(
            parser.verify(),
            Err(StackError::SharedHead {
                branch: branch.id.index(),
                refcount: 2,
            })
        );

        let mut parser = GlrParser::new(&tables, SumSemantics, ());
        let orphan = parser.pieces.alloc(None);
        parser.pieces.get_mut(orphan).refcount = 0;
        assert_eq!(
            parser.verify(),
            Err(StackError::LeakedPiece {
                piece: orphan.index(),
            })
        );
    }

    #[test]
    fn test_debug_is_compact() {
        let tables = ambiguous_sum();
        let parser = GlrParser::new(&tables, SumSemantics, ());
        let debug = format!("{parser:?}");
        assert!(debug.starts_with("GlrParser"));
        assert!(debug.contains("branches: 1"));
    }
}
