//! Row-major table set, as emitted by a table generator

use super::{
    Action, GOTO_NONE, NontermId, ParseTables, RuleId, RuleInfo, StateId, TableCounts, TokenId,
};
use crate::error::TableError;
use hashbrown::HashSet;

#[cfg(feature = "serialize")]
use serde::{Deserialize, Serialize};

/// Uncompressed table set.
///
/// `actions` is indexed `state * tokens + token`, `gotos` is indexed
/// `state * nterms + nterm`, and `conflicts` is the flat array of
/// `count, alternative…` entries addressed by offset.
///
/// # Examples
///
/// ```
/// use thicket::table::{Action, DenseTablesBuilder, ParseTables};
///
/// // S -> a
/// let tables = DenseTablesBuilder::new(3, 2, 1)
///     .action(0, 1, Action::Shift(2))
///     .action(1, 0, Action::Accept)
///     .action(2, 0, Action::Reduce(0))
///     .goto(0, 0, 1)
///     .rule(0, 1)
///     .build()
///     .expect("valid tables");
///
/// assert_eq!(tables.action(0, 1), Action::Shift(2));
/// assert_eq!(tables.action(0, 0), Action::Error);
/// assert_eq!(tables.goto(0, 0), 1);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct DenseTables {
    counts: TableCounts,
    start_state: StateId,
    end_token: TokenId,
    actions: Vec<u16>,
    gotos: Vec<u16>,
    conflicts: Vec<u16>,
    rules: Vec<RuleInfo>,
}

impl DenseTables {
    /// Wrap generated arrays, validating every table invariant.
    ///
    /// `counts.rules` and `counts.conflicts` must agree with the lengths of
    /// `rules` and `conflicts`.
    ///
    /// # Errors
    ///
    /// Returns the first [`TableError`] found.
    pub fn new(
        counts: TableCounts,
        start_state: StateId,
        end_token: TokenId,
        actions: Vec<u16>,
        gotos: Vec<u16>,
        conflicts: Vec<u16>,
        rules: Vec<RuleInfo>,
    ) -> Result<Self, TableError> {
        let tables = Self {
            counts,
            start_state,
            end_token,
            actions,
            gotos,
            conflicts,
            rules,
        };
        tables.validate()?;
        Ok(tables)
    }

    fn validate(&self) -> Result<(), TableError> {
        let counts = &self.counts;
        check_len("action", counts.states * counts.tokens, self.actions.len())?;
        check_len("goto", counts.states * counts.nterms, self.gotos.len())?;
        check_len("conflict", counts.conflicts, self.conflicts.len())?;
        check_len("rule", counts.rules, self.rules.len())?;
        check_range("start state", self.start_state, counts.states)?;
        check_range("end token", self.end_token, counts.tokens)?;

        if counts.accept_code() > usize::from(u16::MAX) {
            return Err(TableError::CodeOverflow {
                needed: counts.accept_code() + 1,
            });
        }

        for (rule, info) in self.rules.iter().enumerate() {
            if usize::from(info.nterm) >= counts.nterms {
                return Err(TableError::InvalidRule {
                    rule,
                    nterm: usize::from(info.nterm),
                    nterms: counts.nterms,
                });
            }
        }

        let entries = conflict_offsets(counts, &self.conflicts)?;

        for (index, &code) in self.actions.iter().enumerate() {
            let state = index / counts.tokens;
            let token = index % counts.tokens;
            match counts.try_decode(code) {
                None => return Err(TableError::InvalidAction { state, token, code }),
                Some(Action::Conflict(offset)) if !entries.contains(&offset) => {
                    return Err(TableError::InvalidConflict {
                        offset,
                        reason: format!(
                            "action at state {state}, token {token} does not address an entry"
                        ),
                    });
                }
                Some(_) => {}
            }
        }

        for (index, &target) in self.gotos.iter().enumerate() {
            if target != GOTO_NONE && usize::from(target) >= counts.states {
                return Err(TableError::InvalidGoto {
                    state: index / counts.nterms,
                    nterm: index % counts.nterms,
                    target,
                });
            }
        }

        self.check_accepts(counts, &entries)
    }

    /// An accepting state must have the start symbol's value on top of the
    /// history: it is entered only through a goto and is not the start state.
    fn check_accepts(
        &self,
        counts: &TableCounts,
        entries: &HashSet<usize>,
    ) -> Result<(), TableError> {
        let shifted_into: HashSet<StateId> = self
            .actions
            .iter()
            .chain(entries.iter().flat_map(|&offset| self.conflict(offset)))
            .filter_map(|&code| match counts.try_decode(code) {
                Some(Action::Shift(target)) => Some(target),
                _ => None,
            })
            .collect();
        let reached_by_goto: HashSet<StateId> = self
            .gotos
            .iter()
            .filter(|&&target| target != GOTO_NONE)
            .map(|&target| usize::from(target))
            .collect();

        for (index, &code) in self.actions.iter().enumerate() {
            if counts.try_decode(code) != Some(Action::Accept) {
                continue;
            }
            let state = index / counts.tokens;
            let reason = if state == self.start_state {
                "the start state has no value to accept"
            } else if shifted_into.contains(&state) {
                "the state is entered by a shift, so a token is on top"
            } else if !reached_by_goto.contains(&state) {
                "no goto enters the state"
            } else {
                continue;
            };
            return Err(TableError::InvalidAccept {
                state,
                token: index % counts.tokens,
                reason,
            });
        }
        Ok(())
    }

    /// Raw action array
    #[must_use]
    pub fn actions(&self) -> &[u16] {
        &self.actions
    }

    /// Raw goto array
    #[must_use]
    pub fn gotos(&self) -> &[u16] {
        &self.gotos
    }

    /// Raw flat conflict array
    #[must_use]
    pub fn conflicts(&self) -> &[u16] {
        &self.conflicts
    }

    /// Rule metadata, indexed by rule
    #[must_use]
    pub fn rules(&self) -> &[RuleInfo] {
        &self.rules
    }
}

fn check_len(table: &'static str, expected: usize, actual: usize) -> Result<(), TableError> {
    if expected == actual {
        Ok(())
    } else {
        Err(TableError::LengthMismatch {
            table,
            expected,
            actual,
        })
    }
}

const fn check_range(what: &'static str, index: usize, limit: usize) -> Result<(), TableError> {
    if index < limit {
        Ok(())
    } else {
        Err(TableError::OutOfRange { what, index, limit })
    }
}

/// Walk the flat conflict array, checking each entry and collecting the
/// offsets at which entries start.
pub(super) fn conflict_offsets(
    counts: &TableCounts,
    conflicts: &[u16],
) -> Result<HashSet<usize>, TableError> {
    let mut offsets = HashSet::new();
    let mut offset = 0;
    while offset < conflicts.len() {
        let count = usize::from(conflicts[offset]);
        let malformed = |reason: String| TableError::InvalidConflict { offset, reason };
        if count < 2 {
            return Err(malformed(format!("{count} alternatives, at least 2 required")));
        }
        let Some(alternatives) = conflicts.get(offset + 1..offset + 1 + count) else {
            return Err(malformed("entry overruns the conflict table".to_string()));
        };
        for (position, &code) in alternatives.iter().enumerate() {
            match counts.try_decode(code) {
                Some(Action::Reduce(_)) => {}
                Some(Action::Shift(_)) if position == 0 => {}
                Some(Action::Shift(_)) => {
                    return Err(malformed(format!(
                        "alternative {position} is a shift; only the first may shift"
                    )));
                }
                other => {
                    return Err(malformed(format!(
                        "alternative {position} is {other:?}, expected shift or reduce"
                    )));
                }
            }
        }
        offsets.insert(offset);
        offset += 1 + count;
    }
    Ok(offsets)
}

impl ParseTables for DenseTables {
    fn counts(&self) -> &TableCounts {
        &self.counts
    }

    fn start_state(&self) -> StateId {
        self.start_state
    }

    fn end_token(&self) -> TokenId {
        self.end_token
    }

    fn action_code(&self, state: StateId, token: TokenId) -> u16 {
        self.actions[state * self.counts.tokens + token]
    }

    fn goto_code(&self, state: StateId, nterm: NontermId) -> u16 {
        self.gotos[state * self.counts.nterms + nterm]
    }

    fn rule(&self, rule: RuleId) -> RuleInfo {
        self.rules[rule]
    }

    fn conflict(&self, offset: usize) -> &[u16] {
        let count = usize::from(self.conflicts[offset]);
        &self.conflicts[offset + 1..offset + 1 + count]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Plain(Action),
    Conflict(usize),
}

/// Builder for [`DenseTables`].
///
/// Actions default to [`Action::Error`] and gotos to
/// [`GOTO_NONE`](super::GOTO_NONE). Conflict entries with identical
/// alternatives are shared.
#[derive(Debug, Clone)]
pub struct DenseTablesBuilder {
    states: usize,
    tokens: usize,
    nterms: usize,
    start_state: StateId,
    end_token: TokenId,
    slots: Vec<Slot>,
    conflict_lists: Vec<Vec<Action>>,
    gotos: Vec<u16>,
    rules: Vec<RuleInfo>,
    error: Option<TableError>,
}

impl DenseTablesBuilder {
    /// Start a table set with the given state, token and nonterminal counts
    #[must_use]
    pub fn new(states: usize, tokens: usize, nterms: usize) -> Self {
        Self {
            states,
            tokens,
            nterms,
            start_state: 0,
            end_token: 0,
            slots: vec![Slot::Plain(Action::Error); states * tokens],
            conflict_lists: Vec::new(),
            gotos: vec![GOTO_NONE; states * nterms],
            rules: Vec::new(),
            error: None,
        }
    }

    /// Set the start state (default 0)
    #[must_use]
    pub fn start_state(mut self, state: StateId) -> Self {
        self.start_state = state;
        self
    }

    /// Set the end-of-input token (default 0)
    #[must_use]
    pub fn end_token(mut self, token: TokenId) -> Self {
        self.end_token = token;
        self
    }

    /// Set the action for `(state, token)`
    #[must_use]
    pub fn action(mut self, state: StateId, token: TokenId, action: Action) -> Self {
        if let Some(index) = self.slot_index(state, token) {
            self.slots[index] = Slot::Plain(action);
        }
        self
    }

    /// Make `(state, token)` a conflict between the alternatives, in order
    #[must_use]
    pub fn conflict(mut self, state: StateId, token: TokenId, alternatives: &[Action]) -> Self {
        let Some(index) = self.slot_index(state, token) else {
            return self;
        };
        let list = match self
            .conflict_lists
            .iter()
            .position(|existing| existing == alternatives)
        {
            Some(list) => list,
            None => {
                self.conflict_lists.push(alternatives.to_vec());
                self.conflict_lists.len() - 1
            }
        };
        self.slots[index] = Slot::Conflict(list);
        self
    }

    /// Set `goto[state][nterm]`
    #[must_use]
    pub fn goto(mut self, state: StateId, nterm: NontermId, target: StateId) -> Self {
        let in_range = self.record(check_range("state", state, self.states))
            && self.record(check_range("nonterminal", nterm, self.nterms));
        if in_range {
            match u16::try_from(target) {
                Ok(target) => self.gotos[state * self.nterms + nterm] = target,
                Err(_) => {
                    self.record(Err(TableError::CodeOverflow { needed: target + 1 }));
                }
            }
        }
        self
    }

    /// Append a rule producing `nterm` from `length` symbols
    #[must_use]
    pub fn rule(mut self, nterm: NontermId, length: usize) -> Self {
        match (u16::try_from(nterm), u16::try_from(length)) {
            (Ok(nterm), Ok(length)) => self.rules.push(RuleInfo::new(nterm, length)),
            _ => {
                self.record(Err(TableError::OutOfRange {
                    what: "rule",
                    index: self.rules.len(),
                    limit: usize::from(u16::MAX),
                }));
            }
        }
        self
    }

    /// Encode and validate the table set
    ///
    /// # Errors
    ///
    /// Returns the first out-of-range builder call, or any invariant the
    /// resulting tables violate.
    pub fn build(self) -> Result<DenseTables, TableError> {
        if let Some(error) = self.error {
            return Err(error);
        }

        let mut counts = TableCounts {
            states: self.states,
            tokens: self.tokens,
            nterms: self.nterms,
            rules: self.rules.len(),
            conflicts: self
                .conflict_lists
                .iter()
                .map(|alternatives| alternatives.len() + 1)
                .sum(),
        };
        if counts.accept_code() > usize::from(u16::MAX) {
            return Err(TableError::CodeOverflow {
                needed: counts.accept_code() + 1,
            });
        }

        let mut conflicts = Vec::with_capacity(counts.conflicts);
        let mut offsets = Vec::with_capacity(self.conflict_lists.len());
        for alternatives in &self.conflict_lists {
            offsets.push(conflicts.len());
            let count = u16::try_from(alternatives.len()).map_err(|_| {
                TableError::CodeOverflow {
                    needed: alternatives.len(),
                }
            })?;
            conflicts.push(count);
            for &alternative in alternatives {
                if matches!(alternative, Action::Conflict(_)) {
                    return Err(TableError::InvalidConflict {
                        offset: offsets.last().copied().unwrap_or_default(),
                        reason: "alternatives cannot be conflicts".to_string(),
                    });
                }
                conflicts.push(counts.encode(alternative));
            }
        }
        counts.conflicts = conflicts.len();

        let actions = self
            .slots
            .iter()
            .map(|slot| match *slot {
                Slot::Plain(action) => counts.encode(action),
                Slot::Conflict(list) => counts.encode(Action::Conflict(offsets[list])),
            })
            .collect();

        DenseTables::new(
            counts,
            self.start_state,
            self.end_token,
            actions,
            self.gotos,
            conflicts,
            self.rules,
        )
    }

    fn slot_index(&mut self, state: StateId, token: TokenId) -> Option<usize> {
        let in_range = self.record(check_range("state", state, self.states))
            && self.record(check_range("token", token, self.tokens));
        in_range.then(|| state * self.tokens + token)
    }

    fn record(&mut self, result: Result<(), TableError>) -> bool {
        match result {
            Ok(()) => true,
            Err(error) => {
                self.error.get_or_insert(error);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counts() -> TableCounts {
        TableCounts {
            states: 2,
            tokens: 2,
            nterms: 1,
            rules: 1,
            conflicts: 0,
        }
    }

    #[test]
    fn test_builder_encodes_conflicts_after_rules() {
        let tables = DenseTablesBuilder::new(3, 2, 1)
            .conflict(0, 1, &[Action::Shift(2), Action::Reduce(0), Action::Reduce(1)])
            .conflict(1, 1, &[Action::Shift(2), Action::Reduce(0), Action::Reduce(1)])
            .rule(0, 0)
            .rule(0, 1)
            .goto(0, 0, 1)
            .build()
            .unwrap();

        // Identical alternative lists share one entry.
        assert_eq!(tables.conflicts(), &[3, 2, 3, 4]);
        assert_eq!(tables.counts().conflicts, 4);
        assert_eq!(tables.action(0, 1), Action::Conflict(0));
        assert_eq!(tables.action(1, 1), Action::Conflict(0));
        assert_eq!(tables.conflict(0), &[2, 3, 4]);
        assert_eq!(tables.action(2, 0), Action::Error);
    }

    #[test]
    fn test_rejects_length_mismatch() {
        let error = DenseTables::new(counts(), 0, 0, vec![0; 3], vec![0; 2], vec![], vec![
            RuleInfo::new(0, 1),
        ])
        .unwrap_err();
        assert_eq!(error, TableError::LengthMismatch {
            table: "action",
            expected: 4,
            actual: 3,
        });
    }

    #[test]
    fn test_rejects_shift_after_first_alternative() {
        let error = DenseTablesBuilder::new(3, 2, 1)
            .conflict(0, 1, &[Action::Reduce(0), Action::Shift(2)])
            .rule(0, 1)
            .build()
            .unwrap_err();
        assert!(matches!(error, TableError::InvalidConflict { offset: 0, .. }));
    }

    #[test]
    fn test_rejects_single_alternative_conflict() {
        let error = DenseTablesBuilder::new(3, 2, 1)
            .conflict(0, 1, &[Action::Reduce(0)])
            .rule(0, 1)
            .build()
            .unwrap_err();
        assert!(matches!(error, TableError::InvalidConflict { .. }));
    }

    #[test]
    fn test_rejects_conflict_code_inside_entry() {
        let mut counts = counts();
        counts.conflicts = 3;
        // Action at (0, 1) points at offset 1, which is an alternative, not a count.
        let conflict_at_one = u16::try_from(counts.states + counts.rules + 1).unwrap();
        let error = DenseTables::new(
            counts,
            0,
            0,
            vec![counts.encode(Action::Error), conflict_at_one, 0, 0],
            vec![1, GOTO_NONE],
            vec![2, 1, 2],
            vec![RuleInfo::new(0, 1)],
        )
        .unwrap_err();
        assert!(matches!(error, TableError::InvalidConflict { offset: 1, .. }));
    }

    #[test]
    fn test_rejects_goto_outside_states() {
        let error = DenseTablesBuilder::new(2, 2, 1)
            .goto(0, 0, 7)
            .rule(0, 1)
            .build()
            .unwrap_err();
        assert_eq!(error, TableError::InvalidGoto {
            state: 0,
            nterm: 0,
            target: 7,
        });
    }

    #[test]
    fn test_rejects_rule_with_unknown_nonterminal() {
        let error = DenseTablesBuilder::new(2, 2, 1).rule(4, 1).build().unwrap_err();
        assert_eq!(error, TableError::InvalidRule {
            rule: 0,
            nterm: 4,
            nterms: 1,
        });
    }

    #[test]
    fn test_rejects_accept_on_shifted_token() {
        let error = DenseTablesBuilder::new(2, 2, 1)
            .action(0, 1, Action::Shift(1))
            .action(1, 0, Action::Accept)
            .rule(0, 1)
            .build()
            .unwrap_err();
        assert!(matches!(error, TableError::InvalidAccept { state: 1, token: 0, .. }));
    }

    #[test]
    fn test_rejects_accept_in_start_state() {
        let error = DenseTablesBuilder::new(1, 1, 1)
            .action(0, 0, Action::Accept)
            .rule(0, 1)
            .build()
            .unwrap_err();
        assert!(matches!(error, TableError::InvalidAccept { state: 0, token: 0, .. }));
    }

    #[test]
    fn test_rejects_accept_behind_conflict_shift() {
        let error = DenseTablesBuilder::new(3, 2, 1)
            .conflict(0, 1, &[Action::Shift(2), Action::Reduce(0)])
            .goto(0, 0, 2)
            .action(2, 0, Action::Accept)
            .rule(0, 0)
            .build()
            .unwrap_err();
        assert!(matches!(error, TableError::InvalidAccept { state: 2, .. }));
    }

    #[test]
    fn test_accept_after_goto_is_valid() {
        let tables = DenseTablesBuilder::new(3, 2, 1)
            .conflict(0, 1, &[Action::Shift(2), Action::Reduce(0)])
            .goto(0, 0, 1)
            .action(1, 0, Action::Accept)
            .rule(0, 0)
            .build()
            .unwrap();
        assert_eq!(tables.action(1, 0), Action::Accept);
    }

    #[test]
    fn test_builder_reports_out_of_range_state() {
        let error = DenseTablesBuilder::new(2, 2, 1)
            .action(9, 0, Action::Accept)
            .build()
            .unwrap_err();
        assert_eq!(error, TableError::OutOfRange {
            what: "state",
            index: 9,
            limit: 2,
        });
    }
}
