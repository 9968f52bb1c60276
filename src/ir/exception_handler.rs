use super::BlockId;

/// Handler index of the catch-all handler synthesized for synchronized methods
///
/// That handler has no bytecode: its entry block is made up by the graph builder and carries
/// [`BlockFlags::DEFAULT_EXCEPTION_HANDLER`](super::BlockFlags::DEFAULT_EXCEPTION_HANDLER).
pub const SYNCHRONIZATION_ENTRY_BCI: usize = usize::MAX;

/// Entry in an exception table
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExceptionHandler {
    /// Start of the protected range (inclusive)
    pub start_bci: usize,

    /// End of the protected range (exclusive)
    pub end_bci: usize,

    /// Start of the handler code, or [`SYNCHRONIZATION_ENTRY_BCI`]
    pub handler_bci: usize,

    /// Constant pool index of the caught class, `0` to catch everything
    pub catch_type: u16,

    /// Block where the handler starts, once resolved
    pub entry_block: Option<BlockId>,
}

impl ExceptionHandler {
    pub fn new(start_bci: usize, end_bci: usize, handler_bci: usize, catch_type: u16) -> Self {
        ExceptionHandler {
            start_bci,
            end_bci,
            handler_bci,
            catch_type,
            entry_block: None,
        }
    }

    /// Does the protected range include this instruction?
    pub fn covers(&self, bci: usize) -> bool {
        self.start_bci <= bci && bci < self.end_bci
    }

    pub fn is_catch_all(&self) -> bool {
        self.catch_type == 0
    }

    pub fn is_synchronization_entry(&self) -> bool {
        self.handler_bci == SYNCHRONIZATION_ENTRY_BCI
    }

    pub fn set_entry_block(&mut self, block: Option<BlockId>) {
        self.entry_block = block;
    }
}
