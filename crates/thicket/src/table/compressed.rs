//! Comb-vector compressed tables
//!
//! Action and goto rows are mostly empty. Each row is overlaid onto a shared
//! value vector at a per-row displacement chosen first-fit, and a parallel
//! owner vector records which row placed each slot so lookups can tell a
//! real entry from a neighbour's.

use super::{DenseTables, NontermId, ParseTables, RuleId, RuleInfo, StateId, TableCounts, TokenId};
use super::GOTO_NONE;
use smallvec::SmallVec;

#[cfg(feature = "serialize")]
use serde::{Deserialize, Serialize};

/// Owner marker for slots no row has claimed.
const UNOWNED: u16 = u16::MAX;

/// A two-dimensional table packed with row displacement.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct PackedTable {
    displace: Vec<u32>,
    values: Vec<u16>,
    owners: Vec<u16>,
    default: u16,
}

impl PackedTable {
    /// Pack a row-major table of `width` columns, omitting `default` entries.
    ///
    /// # Panics
    ///
    /// Panics if the table has `u16::MAX` rows or more; row numbers are
    /// stored as 16-bit owners.
    #[must_use]
    pub fn pack(dense: &[u16], width: usize, default: u16) -> Self {
        let height = if width == 0 { 0 } else { dense.len() / width };
        assert!(
            height < usize::from(UNOWNED),
            "{height} rows do not fit 16-bit row owners"
        );
        let mut table = Self {
            displace: Vec::with_capacity(height),
            values: Vec::new(),
            owners: Vec::new(),
            default,
        };

        for (row, cells) in dense.chunks(width.max(1)).take(height).enumerate() {
            let used: SmallVec<[usize; 16]> = cells
                .iter()
                .enumerate()
                .filter(|&(_, &value)| value != default)
                .map(|(column, _)| column)
                .collect();

            let mut displacement = 0;
            while !used.iter().all(|&column| {
                table
                    .owners
                    .get(displacement + column)
                    .is_none_or(|&owner| owner == UNOWNED)
            }) {
                displacement += 1;
            }

            if let Some(&last) = used.last() {
                let needed = displacement + last + 1;
                if table.owners.len() < needed {
                    table.owners.resize(needed, UNOWNED);
                    table.values.resize(needed, default);
                }
            }
            #[allow(clippy::cast_possible_truncation)]
            let owner = row as u16;
            for &column in &used {
                table.owners[displacement + column] = owner;
                table.values[displacement + column] = cells[column];
            }
            #[allow(clippy::cast_possible_truncation)]
            table.displace.push(displacement as u32);
        }

        table
    }

    /// Entry at `(row, column)`, or the default when the row never set it.
    ///
    /// # Panics
    ///
    /// Panics if `row` was not packed.
    #[must_use]
    pub fn get(&self, row: usize, column: usize) -> u16 {
        let index = self.displace[row] as usize + column;
        match (u16::try_from(row), self.owners.get(index)) {
            (Ok(owner), Some(&slot_owner)) if slot_owner == owner => self.values[index],
            _ => self.default,
        }
    }

    /// Number of packed rows
    #[must_use]
    pub fn rows(&self) -> usize {
        self.displace.len()
    }

    /// Length of the packed value vector
    #[must_use]
    pub fn packed_len(&self) -> usize {
        self.values.len()
    }
}

/// Table set with comb-vector packed action and goto tables.
///
/// Lookups agree with the [`DenseTables`] the set was packed from.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct CompressedTables {
    counts: TableCounts,
    start_state: StateId,
    end_token: TokenId,
    actions: PackedTable,
    gotos: PackedTable,
    conflicts: Vec<u16>,
    rules: Vec<RuleInfo>,
}

impl CompressedTables {
    /// Pack a validated dense table set
    #[must_use]
    pub fn from_dense(dense: &DenseTables) -> Self {
        let counts = *dense.counts();
        let error = counts.encode(super::Action::Error);
        Self {
            counts,
            start_state: dense.start_state(),
            end_token: dense.end_token(),
            actions: PackedTable::pack(dense.actions(), counts.tokens, error),
            gotos: PackedTable::pack(dense.gotos(), counts.nterms, GOTO_NONE),
            conflicts: dense.conflicts().to_vec(),
            rules: dense.rules().to_vec(),
        }
    }

    /// Packed action table
    #[must_use]
    pub const fn action_table(&self) -> &PackedTable {
        &self.actions
    }

    /// Packed goto table
    #[must_use]
    pub const fn goto_table(&self) -> &PackedTable {
        &self.gotos
    }
}

impl From<&DenseTables> for CompressedTables {
    fn from(dense: &DenseTables) -> Self {
        Self::from_dense(dense)
    }
}

impl ParseTables for CompressedTables {
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
        self.actions.get(state, token)
    }

    fn goto_code(&self, state: StateId, nterm: NontermId) -> u16 {
        self.gotos.get(state, nterm)
    }

    fn rule(&self, rule: RuleId) -> RuleInfo {
        self.rules[rule]
    }

    fn conflict(&self, offset: usize) -> &[u16] {
        let count = usize::from(self.conflicts[offset]);
        &self.conflicts[offset + 1..offset + 1 + count]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{Action, DenseTablesBuilder};

    #[test]
    fn test_pack_overlays_sparse_rows() {
        let dense = [
            0, 7, 0, 0, //
            0, 0, 0, 9, //
            5, 0, 0, 0, //
        ];
        let packed = PackedTable::pack(&dense, 4, 0);

        for row in 0..3 {
            for column in 0..4 {
                assert_eq!(packed.get(row, column), dense[row * 4 + column]);
            }
        }
        // Rows interleave instead of taking 12 slots.
        assert!(packed.packed_len() < dense.len());
    }

    #[test]
    fn test_empty_rows_read_as_default() {
        let packed = PackedTable::pack(&[3, 3, 3, 3], 2, 3);
        assert_eq!(packed.packed_len(), 0);
        assert_eq!(packed.get(1, 1), 3);
    }

    #[test]
    #[should_panic(expected = "do not fit 16-bit row owners")]
    fn test_pack_rejects_rows_beyond_owner_range() {
        let _ = PackedTable::pack(&vec![0; usize::from(UNOWNED)], 1, 0);
    }

    #[test]
    fn test_last_owner_row_packs() {
        let rows = usize::from(UNOWNED) - 1;
        let mut dense = vec![0; rows];
        dense[rows - 1] = 4;
        let packed = PackedTable::pack(&dense, 1, 0);

        assert_eq!(packed.rows(), rows);
        assert_eq!(packed.get(rows - 1, 0), 4);
        assert_eq!(packed.get(0, 0), 0);
    }

    #[test]
    fn test_sum_tables_pack_smaller() {
        let dense = crate::testing::ambiguous_sum();
        let compressed = CompressedTables::from_dense(&dense);

        assert_eq!(compressed.action_table().rows(), dense.counts().states);
        assert_eq!(compressed.goto_table().rows(), dense.counts().states);
        assert!(compressed.action_table().packed_len() < dense.actions().len());
        assert!(compressed.goto_table().packed_len() <= dense.gotos().len());
    }

    #[test]
    fn test_compressed_lookups_match_dense() {
        let dense = DenseTablesBuilder::new(4, 3, 2)
            .action(0, 1, Action::Shift(2))
            .action(1, 0, Action::Accept)
            .action(2, 0, Action::Reduce(0))
            .action(2, 2, Action::Reduce(0))
            .conflict(3, 2, &[Action::Shift(2), Action::Reduce(1)])
            .goto(0, 0, 1)
            .goto(3, 1, 3)
            .rule(0, 1)
            .rule(1, 0)
            .build()
            .unwrap();
        let compressed = CompressedTables::from_dense(&dense);

        for state in 0..4 {
            for token in 0..3 {
                assert_eq!(compressed.action(state, token), dense.action(state, token));
            }
            for nterm in 0..2 {
                assert_eq!(compressed.goto_code(state, nterm), dense.goto_code(state, nterm));
            }
        }
        assert_eq!(compressed.conflict(0), dense.conflict(0));
    }
}
