use super::{BlockBegin, BlockEnd, BlockId, InstrId, Instruction, IrScope, ScopeId};

/// Arena owning everything produced while compiling one method
#[derive(Debug)]
pub struct IrGraph<'a> {
    pub blocks: Vec<BlockBegin>,
    pub instructions: Vec<Instruction>,
    pub scopes: Vec<IrScope<'a>>,

    /// Entry block of the method
    pub start: Option<BlockId>,

    /// Blocks in the order they were parsed
    pub block_order: Vec<BlockId>,
}

impl<'a> IrGraph<'a> {
    pub fn new() -> IrGraph<'a> {
        IrGraph {
            blocks: vec![],
            instructions: vec![],
            scopes: vec![],
            start: None,
            block_order: vec![],
        }
    }

    pub fn add_block(&mut self, block: BlockBegin) -> BlockId {
        let id = BlockId(self.blocks.len());
        self.blocks.push(block);
        id
    }

    pub fn block(&self, block: BlockId) -> &BlockBegin {
        &self.blocks[block.0]
    }

    pub fn block_mut(&mut self, block: BlockId) -> &mut BlockBegin {
        &mut self.blocks[block.0]
    }

    /// Make an independent copy of a block's identity: same start, depth first number and
    /// flags, but no contents, edges, or worklist state
    pub fn duplicate_block(&mut self, original: BlockId) -> BlockId {
        let original = &self.blocks[original.0];
        let mut copy = BlockBegin::new(original.bci, original.depth_first_number);
        copy.copy_block_flags(original);
        self.add_block(copy)
    }

    pub fn add_scope(&mut self, scope: IrScope<'a>) -> ScopeId {
        let id = ScopeId(self.scopes.len());
        self.scopes.push(scope);
        id
    }

    pub fn scope(&self, scope: ScopeId) -> &IrScope<'a> {
        &self.scopes[scope.0]
    }

    pub fn scope_mut(&mut self, scope: ScopeId) -> &mut IrScope<'a> {
        &mut self.scopes[scope.0]
    }

    pub fn instruction(&self, instruction: InstrId) -> &Instruction {
        &self.instructions[instruction.0]
    }

    /// Add an instruction to the end of a block
    pub fn append_instruction(&mut self, block: BlockId, bci: usize, opcode: u8) -> InstrId {
        let id = InstrId(self.instructions.len());
        self.instructions.push(Instruction { bci, opcode, block });
        self.blocks[block.0].instructions.push(id);
        id
    }

    /// Drop every instruction of a block after `last` (or all of them, if `last` is `None`)
    ///
    /// This is how a collapsed single-block inline gets undone. The instructions stay in the
    /// arena, but are no longer part of the block.
    pub fn truncate_block(&mut self, block: BlockId, last: Option<InstrId>) {
        let instructions = &mut self.blocks[block.0].instructions;
        let keep = match last {
            Some(last) => instructions
                .iter()
                .position(|insn| *insn == last)
                .map_or(instructions.len(), |idx| idx + 1),
            None => 0,
        };
        instructions.truncate(keep);
    }

    /// Close a block and record it as a predecessor of each successor
    pub fn set_block_end(&mut self, block: BlockId, end: BlockEnd) {
        for successor in end.successors() {
            let predecessors = &mut self.blocks[successor.0].predecessors;
            if !predecessors.contains(&block) {
                predecessors.push(block);
            }
        }
        self.blocks[block.0].end = Some(end);
    }

    /// Record that exceptions thrown in `block` may be caught at `handler`
    ///
    /// Returns `false` if the edge was already there.
    pub fn add_exception_edge(&mut self, block: BlockId, handler: BlockId) -> bool {
        let handlers = &mut self.blocks[block.0].exception_handlers;
        if handlers.contains(&handler) {
            false
        } else {
            handlers.push(handler);
            true
        }
    }
}

impl<'a> Default for IrGraph<'a> {
    fn default() -> Self {
        IrGraph::new()
    }
}
