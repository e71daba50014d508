//! Piece tree: the shared, reference-counted history of every branch
//!
//! A piece is a run of consecutive stack cells plus a link to the older
//! piece below it. Branches that forked from a common point share the
//! pieces below the fork instead of copying them. Pieces live in an arena
//! addressed by [`PieceId`], reclaimed slots are recycled through a free
//! list, and every piece counts its referents explicitly:
//!
//! ```text
//! refcount(p) = #branches whose head is p + #pieces whose prev is p
//! ```
//!
//! A branch's head piece therefore always has refcount 1, and only the head
//! piece ever grows.

use super::stats::GlrStats;
use super::value::ValueCell;

/// Arena index of a piece.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PieceId(usize);

impl PieceId {
    /// Raw arena index
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl std::fmt::Display for PieceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Read-only summary of a piece.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PieceView {
    /// Number of branches and pieces referencing this piece
    pub refcount: usize,
    /// Number of cells stored in this piece
    pub len: usize,
    /// Older piece, or `None` at the root
    pub prev: Option<PieceId>,
}

#[derive(Debug)]
pub(crate) struct Piece<T, V> {
    pub(crate) refcount: usize,
    pub(crate) prev: Option<PieceId>,
    pub(crate) values: Vec<ValueCell<T, V>>,
}

#[derive(Debug)]
enum Slot<T, V> {
    Occupied(Piece<T, V>),
    Vacant { next_free: Option<usize> },
}

#[derive(Debug)]
pub(crate) struct PieceArena<T, V> {
    slots: Vec<Slot<T, V>>,
    free: Option<usize>,
    live: usize,
}

impl<T, V> PieceArena<T, V> {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            free: None,
            live: 0,
        }
    }

    /// Number of allocated pieces
    pub(crate) const fn live(&self) -> usize {
        self.live
    }

    /// Allocate an empty piece owned by one new referent, on top of `prev`.
    pub(crate) fn alloc(&mut self, prev: Option<PieceId>) -> PieceId {
        if let Some(prev) = prev {
            self.get_mut(prev).refcount += 1;
        }
        self.insert(Piece {
            refcount: 1,
            prev,
            values: Vec::new(),
        })
    }

    /// Drop one reference to `id`, freeing it and walking downwards for as
    /// long as pieces become unreferenced.
    pub(crate) fn release(&mut self, id: PieceId) -> usize {
        let mut freed = 0;
        let mut current = Some(id);
        while let Some(id) = current {
            let piece = self.get_mut(id);
            piece.refcount -= 1;
            if piece.refcount > 0 {
                break;
            }
            current = self.remove(id).prev;
            freed += 1;
        }
        freed
    }

    pub(crate) fn get(&self, id: PieceId) -> &Piece<T, V> {
        match self.slots.get(id.0) {
            Some(Slot::Occupied(piece)) => piece,
            _ => panic!("piece {id} is not allocated"),
        }
    }

    pub(crate) fn get_mut(&mut self, id: PieceId) -> &mut Piece<T, V> {
        match self.slots.get_mut(id.0) {
            Some(Slot::Occupied(piece)) => piece,
            _ => panic!("piece {id} is not allocated"),
        }
    }

    pub(crate) fn view(&self, id: PieceId) -> Option<PieceView> {
        match self.slots.get(id.0) {
            Some(Slot::Occupied(piece)) => Some(PieceView {
                refcount: piece.refcount,
                len: piece.values.len(),
                prev: piece.prev,
            }),
            _ => None,
        }
    }

    pub(crate) fn push(&mut self, id: PieceId, cell: ValueCell<T, V>) {
        self.get_mut(id).values.push(cell);
    }

    /// Allocated pieces, in arena order
    pub(crate) fn iter(&self) -> impl Iterator<Item = (PieceId, &Piece<T, V>)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| match slot {
                Slot::Occupied(piece) => Some((PieceId(index), piece)),
                Slot::Vacant { .. } => None,
            })
    }

    /// Cells reachable from `head`, oldest first
    pub(crate) fn history(&self, head: PieceId) -> Vec<&ValueCell<T, V>> {
        let mut chain = Vec::new();
        let mut current = Some(head);
        while let Some(id) = current {
            let piece = self.get(id);
            chain.push(piece.values.as_slice());
            current = piece.prev;
        }
        chain.into_iter().rev().flatten().collect()
    }

    /// Number of cells reachable from `head`
    pub(crate) fn depth(&self, head: PieceId) -> usize {
        let mut depth = 0;
        let mut current = Some(head);
        while let Some(id) = current {
            let piece = self.get(id);
            depth += piece.values.len();
            current = piece.prev;
        }
        depth
    }

    fn insert(&mut self, piece: Piece<T, V>) -> PieceId {
        self.live += 1;
        match self.free {
            Some(index) => {
                if let Slot::Vacant { next_free } = self.slots[index] {
                    self.free = next_free;
                }
                self.slots[index] = Slot::Occupied(piece);
                PieceId(index)
            }
            None => {
                self.slots.push(Slot::Occupied(piece));
                PieceId(self.slots.len() - 1)
            }
        }
    }

    fn remove(&mut self, id: PieceId) -> Piece<T, V> {
        let vacant = Slot::Vacant {
            next_free: self.free,
        };
        match std::mem::replace(&mut self.slots[id.0], vacant) {
            Slot::Occupied(piece) => {
                self.free = Some(id.0);
                self.live -= 1;
                piece
            }
            Slot::Vacant { next_free } => {
                self.slots[id.0] = Slot::Vacant { next_free };
                panic!("piece {id} freed twice")
            }
        }
    }
}

impl<T: Clone, V: Clone> PieceArena<T, V> {
    /// Make the exclusively owned `head` hold at least `length` cells by
    /// pulling history up from the pieces below it.
    ///
    /// An unshared lower piece is merged into `head`. A shared lower piece
    /// is copied from: if only its newest cells are needed it is split so
    /// the untouched prefix becomes a new shared ancestor, otherwise `head`
    /// is relinked past it.
    ///
    /// # Panics
    ///
    /// Panics if the whole history holds fewer than `length` cells.
    pub(crate) fn gather(&mut self, head: PieceId, length: usize, stats: &mut GlrStats) {
        debug_assert_eq!(self.get(head).refcount, 1, "head piece must be exclusive");

        while self.get(head).values.len() < length {
            let Some(lower) = self.get(head).prev else {
                panic!(
                    "rule needs {length} values but the branch history holds {}",
                    self.get(head).values.len()
                );
            };

            if self.get(lower).refcount == 1 {
                let lower = self.remove(lower);
                let piece = self.get_mut(head);
                let mut values = lower.values;
                values.append(&mut piece.values);
                piece.values = values;
                piece.prev = lower.prev;
                stats.merges += 1;
                continue;
            }

            let needed = length - self.get(head).values.len();
            let available = self.get(lower).values.len();
            let index = available - needed.min(available);
            let mut values = self.get(lower).values[index..].to_vec();
            stats.copied_cells += values.len();
            let piece = self.get_mut(head);
            values.append(&mut piece.values);
            piece.values = values;

            if index > 0 {
                //           <- head
                //  split
                //           <- lower <- ...
                let lower_piece = self.get_mut(lower);
                let prefix: Vec<_> = lower_piece.values.drain(..index).collect();
                let ancestor = lower_piece.prev;
                let split = self.insert(Piece {
                    refcount: 2,
                    prev: ancestor,
                    values: prefix,
                });
                let lower_piece = self.get_mut(lower);
                lower_piece.prev = Some(split);
                lower_piece.refcount -= 1;
                self.get_mut(head).prev = Some(split);
                stats.splits += 1;
            } else {
                //                <- head
                //  lower.prev
                //                <- lower <- ...
                let lower_piece = self.get_mut(lower);
                lower_piece.refcount -= 1;
                debug_assert!(lower_piece.refcount > 0, "shared piece lost its last referent");
                let ancestor = lower_piece.prev;
                if let Some(ancestor) = ancestor {
                    self.get_mut(ancestor).refcount += 1;
                }
                self.get_mut(head).prev = ancestor;
                stats.elisions += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Arena = PieceArena<char, String>;

    fn fill(arena: &mut Arena, id: PieceId, tokens: &str) {
        for (state, token) in tokens.chars().enumerate() {
            arena.push(id, ValueCell::token(state, token));
        }
    }

    fn tokens(arena: &Arena, head: PieceId) -> String {
        arena
            .history(head)
            .into_iter()
            .map(|cell| *cell.get_token())
            .collect()
    }

    #[test]
    fn test_alloc_counts_referents() {
        let mut arena = Arena::with_capacity(4);
        let root = arena.alloc(None);
        let a = arena.alloc(Some(root));
        let b = arena.alloc(Some(root));
        assert_eq!(arena.view(root).unwrap().refcount, 3);
        assert_eq!(arena.view(a).unwrap().prev, Some(root));
        assert_eq!(arena.view(b).unwrap().refcount, 1);
        assert_eq!(arena.live(), 3);
    }

    #[test]
    fn test_release_frees_until_shared() {
        let mut arena = Arena::with_capacity(4);
        let root = arena.alloc(None);
        let middle = arena.alloc(Some(root));
        let a = arena.alloc(Some(middle));
        let b = arena.alloc(Some(middle));
        // The root's own branch went away; only `middle` references it now.
        arena.release(root);

        assert_eq!(arena.release(a), 1);
        assert_eq!(arena.view(middle).unwrap().refcount, 2);
        assert_eq!(arena.release(b), 1);
        // Its own referent was the last one: middle and root both go.
        assert_eq!(arena.release(middle), 2);
        assert_eq!(arena.live(), 0);
    }

    #[test]
    fn test_freed_slots_are_reused() {
        let mut arena = Arena::with_capacity(2);
        let first = arena.alloc(None);
        arena.release(first);
        let second = arena.alloc(None);
        assert_eq!(first, second);
        assert_eq!(arena.live(), 1);
    }

    #[test]
    fn test_gather_merges_exclusive_lower_piece() {
        let mut arena = Arena::with_capacity(4);
        let lower = arena.alloc(None);
        fill(&mut arena, lower, "ab");
        let head = arena.alloc(Some(lower));
        arena.release(lower);
        fill(&mut arena, head, "c");

        let mut stats = GlrStats::default();
        arena.gather(head, 3, &mut stats);

        assert_eq!(stats.merges, 1);
        assert_eq!(arena.view(head).unwrap().len, 3);
        assert_eq!(arena.view(head).unwrap().prev, None);
        assert_eq!(arena.live(), 1);
        assert_eq!(tokens(&arena, head), "abc");
    }

    #[test]
    fn test_gather_splits_shared_lower_piece() {
        let mut arena = Arena::with_capacity(4);
        let shared = arena.alloc(None);
        fill(&mut arena, shared, "abc");
        let left = arena.alloc(Some(shared));
        let right = arena.alloc(Some(shared));
        arena.release(shared);
        fill(&mut arena, left, "x");
        fill(&mut arena, right, "y");

        let mut stats = GlrStats::default();
        arena.gather(left, 2, &mut stats);

        assert_eq!(stats.splits, 1);
        assert_eq!(stats.copied_cells, 1);
        let split = arena.view(left).unwrap().prev.unwrap();
        assert_eq!(arena.view(split).unwrap(), PieceView {
            refcount: 2,
            len: 2,
            prev: None,
        });
        assert_eq!(arena.view(shared).unwrap(), PieceView {
            refcount: 1,
            len: 1,
            prev: Some(split),
        });
        assert_eq!(tokens(&arena, left), "abcx");
        assert_eq!(tokens(&arena, right), "abcy");
    }

    #[test]
    fn test_gather_elides_fully_copied_shared_piece() {
        let mut arena = Arena::with_capacity(4);
        let root = arena.alloc(None);
        fill(&mut arena, root, "r");
        let shared = arena.alloc(Some(root));
        arena.release(root);
        fill(&mut arena, shared, "s");
        let left = arena.alloc(Some(shared));
        let right = arena.alloc(Some(shared));
        arena.release(shared);

        let mut stats = GlrStats::default();
        arena.gather(left, 1, &mut stats);

        assert_eq!(stats.elisions, 1);
        assert_eq!(arena.view(shared).unwrap().refcount, 1);
        assert_eq!(arena.view(root).unwrap().refcount, 2);
        assert_eq!(arena.view(left).unwrap().prev, Some(root));
        assert_eq!(tokens(&arena, left), "rs");
        assert_eq!(tokens(&arena, right), "rs");
    }

    #[test]
    #[should_panic(expected = "branch history holds")]
    fn test_gather_past_root_panics() {
        let mut arena = Arena::with_capacity(1);
        let head = arena.alloc(None);
        arena.gather(head, 1, &mut GlrStats::default());
    }
}
