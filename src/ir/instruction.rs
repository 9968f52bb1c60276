use super::BlockId;
use std::fmt;

/// Handle to an instruction in an [`IrGraph`](super::IrGraph)
#[derive(Copy, Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct InstrId(pub(crate) usize);

impl fmt::Debug for InstrId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_fmt(format_args!("i{}", self.0))
    }
}

/// One parsed bytecode instruction
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Instruction {
    /// Where in the bytecode the instruction came from
    pub bci: usize,

    /// Opcode (with any `wide` prefix folded away)
    pub opcode: u8,

    /// Block the instruction was appended to
    pub block: BlockId,
}
