//! Active branches
//!
//! Each branch is one speculative parse: its automaton state, the newest
//! piece of its history and its own user context. Branches live in a slot
//! vector with a free list, so forking and pruning never move other
//! branches and ids stay valid while the engine iterates.

use super::piece::{PieceArena, PieceId};
use crate::table::StateId;

/// Slot index of a live branch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BranchId(usize);

impl BranchId {
    /// Raw slot index
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl std::fmt::Display for BranchId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "b{}", self.0)
    }
}

/// Read-only summary of a live branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BranchView {
    /// Branch id
    pub id: BranchId,
    /// Current automaton state
    pub state: StateId,
    /// Newest piece of the branch's history
    pub piece: PieceId,
    /// Number of cells in the branch's history
    pub depth: usize,
}

#[derive(Debug)]
pub(crate) struct Branch<U> {
    pub(crate) state: StateId,
    pub(crate) piece: PieceId,
    pub(crate) user: U,
}

#[derive(Debug)]
pub(crate) struct BranchList<U> {
    slots: Vec<Option<Branch<U>>>,
    free: Vec<usize>,
    len: usize,
}

impl<U> BranchList<U> {
    pub(crate) const fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            len: 0,
        }
    }

    /// Number of live branches
    pub(crate) const fn len(&self) -> usize {
        self.len
    }

    /// Start a branch in `state` on a fresh piece above `ancestor`.
    pub(crate) fn create<T, V>(
        &mut self,
        pieces: &mut PieceArena<T, V>,
        ancestor: Option<PieceId>,
        state: StateId,
        user: U,
    ) -> BranchId {
        let piece = pieces.alloc(ancestor);
        let branch = Some(Branch { state, piece, user });
        self.len += 1;
        if let Some(index) = self.free.pop() {
            self.slots[index] = branch;
            BranchId(index)
        } else {
            self.slots.push(branch);
            BranchId(self.slots.len() - 1)
        }
    }

    /// Remove a branch, releasing every piece only it kept alive, and hand
    /// back its user context.
    pub(crate) fn destroy<T, V>(&mut self, pieces: &mut PieceArena<T, V>, id: BranchId) -> U {
        let Some(branch) = self.slots.get_mut(id.0).and_then(Option::take) else {
            panic!("branch {id} is not live");
        };
        self.free.push(id.0);
        self.len -= 1;
        pieces.release(branch.piece);
        branch.user
    }

    pub(crate) fn get(&self, id: BranchId) -> &Branch<U> {
        match self.slots.get(id.0) {
            Some(Some(branch)) => branch,
            _ => panic!("branch {id} is not live"),
        }
    }

    pub(crate) fn get_mut(&mut self, id: BranchId) -> &mut Branch<U> {
        match self.slots.get_mut(id.0) {
            Some(Some(branch)) => branch,
            _ => panic!("branch {id} is not live"),
        }
    }

    pub(crate) fn contains(&self, id: BranchId) -> bool {
        matches!(self.slots.get(id.0), Some(Some(_)))
    }

    /// Live branches, in slot order
    pub(crate) fn iter(&self) -> impl Iterator<Item = (BranchId, &Branch<U>)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| slot.as_ref().map(|branch| (BranchId(index), branch)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_shares_ancestor() {
        let mut pieces: PieceArena<u8, u8> = PieceArena::with_capacity(4);
        let mut branches = BranchList::new();
        let root = branches.create(&mut pieces, None, 0, ());
        let shared = branches.get(root).piece;
        let left = branches.create(&mut pieces, Some(shared), 4, ());
        let right = branches.create(&mut pieces, Some(shared), 4, ());

        assert_eq!(branches.len(), 3);
        assert_eq!(pieces.view(shared).unwrap().refcount, 3);
        assert_ne!(branches.get(left).piece, branches.get(right).piece);
    }

    #[test]
    fn test_destroy_releases_private_history_only() {
        let mut pieces: PieceArena<u8, u8> = PieceArena::with_capacity(4);
        let mut branches = BranchList::new();
        let root = branches.create(&mut pieces, None, 0, "root");
        let shared = branches.get(root).piece;
        let left = branches.create(&mut pieces, Some(shared), 1, "left");
        let right = branches.create(&mut pieces, Some(shared), 1, "right");
        assert_eq!(branches.destroy(&mut pieces, root), "root");

        assert_eq!(branches.destroy(&mut pieces, left), "left");
        assert_eq!(pieces.live(), 2);
        assert_eq!(pieces.view(shared).unwrap().refcount, 1);

        branches.destroy(&mut pieces, right);
        assert_eq!(pieces.live(), 0);
        assert_eq!(branches.len(), 0);
    }

    #[test]
    fn test_slots_are_reused() {
        let mut pieces: PieceArena<u8, u8> = PieceArena::with_capacity(2);
        let mut branches = BranchList::new();
        let first = branches.create(&mut pieces, None, 0, ());
        branches.destroy(&mut pieces, first);
        assert!(!branches.contains(first));
        let second = branches.create(&mut pieces, None, 0, ());
        assert_eq!(first, second);
    }

    #[test]
    #[should_panic(expected = "is not live")]
    fn test_destroy_twice_panics() {
        let mut pieces: PieceArena<u8, u8> = PieceArena::with_capacity(1);
        let mut branches = BranchList::new();
        let id = branches.create(&mut pieces, None, 0, ());
        branches.destroy(&mut pieces, id);
        branches.destroy(&mut pieces, id);
    }
}
