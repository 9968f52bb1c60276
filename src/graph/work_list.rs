use crate::ir::BlockId;

/// Blocks waiting to be parsed, kept sorted by depth first number
///
/// The entries are stored from highest to lowest depth first number, so the next block to parse
/// (the lowest number) is always popped off the end. Among blocks with equal numbers, the one
/// added first is removed first.
///
/// Insertion is a linear insertion sort. A heap would make that logarithmic, but the worklists
/// seen in practice are a handful of blocks long, and a heap would not keep the tie-break.
#[derive(Debug, Default)]
pub struct WorkList {
    entries: Vec<(BlockId, usize)>,
}

impl WorkList {
    const INITIAL_CAPACITY: usize = 5;

    pub fn new() -> WorkList {
        WorkList { entries: vec![] }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Add a block with the given depth first number
    pub fn insert(&mut self, block: BlockId, depth_first_number: usize) {
        if self.entries.capacity() == 0 {
            self.entries.reserve_exact(WorkList::INITIAL_CAPACITY);
        } else if self.entries.len() == self.entries.capacity() {
            // grow to three times the size
            self.entries.reserve_exact(2 * self.entries.capacity());
        }

        // Put the block at the end, then bubble it towards the front past every entry that
        // should be removed before it
        self.entries.push((block, depth_first_number));
        let mut idx = self.entries.len() - 1;
        while idx > 0 && self.entries[idx - 1].1 <= depth_first_number {
            self.entries.swap(idx - 1, idx);
            idx -= 1;
        }
    }

    /// Remove the block with the lowest depth first number
    pub fn pop(&mut self) -> Option<BlockId> {
        self.entries.pop().map(|(block, _)| block)
    }
}
