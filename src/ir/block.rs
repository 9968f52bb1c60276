use super::InstrId;
use bitflags::bitflags;
use std::fmt;

/// Handle to a block in an [`IrGraph`](super::IrGraph)
#[derive(Copy, Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct BlockId(pub(crate) usize);

impl BlockId {
    /// Position of the block in the arena
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Debug for BlockId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_fmt(format_args!("B{}", self.0))
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, formatter)
    }
}

bitflags! {
    /// Structural properties of a block, known before parsing its contents
    pub struct BlockFlags: u16 {
        /// Method entry
        const STANDARD_ENTRY = 0x0001;

        /// Start of an exception handler
        const EXCEPTION_ENTRY = 0x0002;

        /// Target of a `jsr`
        const SUBROUTINE_ENTRY = 0x0004;

        /// Target of a branch from a higher bytecode index
        const BACKWARD_BRANCH_TARGET = 0x0008;

        /// Synthesized handler that unlocks a synchronized method and rethrows
        const DEFAULT_EXCEPTION_HANDLER = 0x0010;

        /// Header of a loop, as far as the parser can tell
        const PARSER_LOOP_HEADER = 0x0020;
    }
}

/// How control leaves a block
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BlockEnd {
    /// Unconditional jump (including falling through into the next block)
    Goto(BlockId),

    /// Two-way conditional branch
    If { taken: BlockId, not_taken: BlockId },

    /// `tableswitch` or `lookupswitch`
    Switch { default: BlockId, cases: Vec<BlockId> },

    /// Enter an inlined subroutine; its `ret`s come back to `continuation`
    Jsr { entry: BlockId, continuation: BlockId },

    /// `ret` from an inlined subroutine back to the continuation of its `jsr`
    Ret(BlockId),

    Return,

    Throw,
}

impl BlockEnd {
    /// Normal control flow successors (the continuation of a `Jsr` is reached through `Ret`)
    pub fn successors(&self) -> Vec<BlockId> {
        match self {
            BlockEnd::Goto(target) | BlockEnd::Ret(target) => vec![*target],
            BlockEnd::If { taken, not_taken } => vec![*taken, *not_taken],
            BlockEnd::Switch { default, cases } => {
                let mut successors = vec![*default];
                for case in cases {
                    if !successors.contains(case) {
                        successors.push(*case);
                    }
                }
                successors
            }
            BlockEnd::Jsr { entry, .. } => vec![*entry],
            BlockEnd::Return | BlockEnd::Throw => vec![],
        }
    }
}

/// Start of a basic block, plus everything known about it
#[derive(Clone, Debug)]
pub struct BlockBegin {
    /// Bytecode index where the block starts
    pub bci: usize,

    /// Rank in a depth first traversal of the block graph (schedules the parser worklist)
    pub depth_first_number: usize,

    pub flags: BlockFlags,

    /// Is the block queued in some worklist?
    ///
    /// This is never reset once set: a block is scheduled at most once.
    pub on_work_list: bool,

    /// Has the block been parsed?
    pub was_visited: bool,

    /// Instructions, in order
    pub instructions: Vec<InstrId>,

    /// Set once the block has been parsed
    pub end: Option<BlockEnd>,

    pub predecessors: Vec<BlockId>,

    /// Entry blocks of the handlers covering some instruction in this block
    pub exception_handlers: Vec<BlockId>,
}

impl BlockBegin {
    pub fn new(bci: usize, depth_first_number: usize) -> BlockBegin {
        BlockBegin {
            bci,
            depth_first_number,
            flags: BlockFlags::empty(),
            on_work_list: false,
            was_visited: false,
            instructions: vec![],
            end: None,
            predecessors: vec![],
            exception_handlers: vec![],
        }
    }

    pub fn check_block_flag(&self, flag: BlockFlags) -> bool {
        self.flags.contains(flag)
    }

    pub fn set_block_flag(&mut self, flag: BlockFlags) {
        self.flags.insert(flag);
    }

    /// Take on the structural flags of another block
    pub fn copy_block_flags(&mut self, other: &BlockBegin) {
        self.flags = other.flags;
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn switch_successors_are_deduplicated() {
        let end = BlockEnd::Switch {
            default: BlockId(3),
            cases: vec![BlockId(1), BlockId(3), BlockId(1), BlockId(2)],
        };
        assert_eq!(end.successors(), vec![BlockId(3), BlockId(1), BlockId(2)]);
    }

    #[test]
    fn jsr_continuation_is_not_a_successor() {
        let end = BlockEnd::Jsr {
            entry: BlockId(4),
            continuation: BlockId(5),
        };
        assert_eq!(end.successors(), vec![BlockId(4)]);
        assert!(BlockEnd::Return.successors().is_empty());
    }
}
