use crate::bytecode::{opcodes, BytecodeStream};
use crate::ir::{BlockBegin, BlockFlags, BlockId, ExceptionHandler, IrGraph};
use crate::Error;

/// Mapping from bytecode index to the block starting there
///
/// This is computed once per method, before any parsing happens, and is then only ever read.
#[derive(Clone, Debug)]
pub struct BlockMap {
    blocks: Vec<Option<BlockId>>,
}

/// What we learn about one instruction in the first pass
struct InstructionExits {
    bci: usize,
    targets: Vec<usize>,
    falls_through: bool,
}

impl BlockMap {
    /// Map with no blocks, for code of the given size
    pub fn new(code_size: usize) -> BlockMap {
        BlockMap {
            blocks: vec![None; code_size],
        }
    }

    /// Block starting at this index, if any
    pub fn get(&self, bci: usize) -> Option<BlockId> {
        self.blocks.get(bci).copied().flatten()
    }

    /// Register a block start (indices past the end of the code are ignored)
    pub fn set(&mut self, bci: usize, block: BlockId) {
        if let Some(slot) = self.blocks.get_mut(bci) {
            *slot = Some(block);
        }
    }

    /// Every block start, by increasing index
    pub fn iter(&self) -> impl Iterator<Item = (usize, BlockId)> + '_ {
        self.blocks
            .iter()
            .enumerate()
            .filter_map(|(bci, block)| block.map(|block| (bci, block)))
    }

    /// Find the block starts of a method and allocate their blocks in `graph`
    ///
    /// Blocks start at the method entry, at every branch, switch, and `jsr` target, at every
    /// handler entry, and after every instruction which branches or doesn't fall through.
    ///
    /// Depth first numbers are assigned in pre-order, starting from the method entry and then
    /// from each handler entry (successors are visited by increasing bytecode index). Blocks that
    /// are not reachable from either get numbered last.
    pub fn build(
        code: &[u8],
        handlers: &[ExceptionHandler],
        graph: &mut IrGraph,
    ) -> Result<BlockMap, Error> {
        if code.is_empty() {
            return Err(Error::malformed(0, "method has no code"));
        }
        let size = code.len();
        let mut is_instruction = vec![false; size];
        let mut starts = vec![false; size];
        let mut flags = vec![BlockFlags::empty(); size];
        starts[0] = true;
        flags[0].insert(BlockFlags::STANDARD_ENTRY);

        // First pass: decode every instruction and find where control can go from it
        let mut exits: Vec<InstructionExits> = vec![];
        let mut stream = BytecodeStream::new(code);
        let mut next_opcode = Some(stream.seek(0)?);
        while let Some(opcode) = next_opcode {
            let bci = stream.current_bci();
            let next_bci = stream.next_bci();
            is_instruction[bci] = true;

            let targets = if opcodes::is_conditional_branch(opcode)
                || opcodes::is_goto(opcode)
                || opcodes::is_jsr(opcode)
            {
                vec![stream.branch_dest()?]
            } else if opcodes::is_switch(opcode) {
                stream.switch_targets()?
            } else {
                vec![]
            };
            for target in &targets {
                starts[*target] = true;
                if *target <= bci {
                    flags[*target]
                        .insert(BlockFlags::BACKWARD_BRANCH_TARGET | BlockFlags::PARSER_LOOP_HEADER);
                }
                if opcodes::is_jsr(opcode) {
                    flags[*target].insert(BlockFlags::SUBROUTINE_ENTRY);
                }
            }

            let falls_through = !opcodes::ends_block(opcode);
            if falls_through && next_bci >= size {
                return Err(Error::malformed(bci, "execution falls off the end of the code"));
            }
            if (!targets.is_empty() || !falls_through) && next_bci < size {
                starts[next_bci] = true;
            }

            exits.push(InstructionExits {
                bci,
                targets,
                falls_through,
            });
            next_opcode = stream.next()?;
        }

        for exit in &exits {
            if exit.targets.iter().any(|target| !is_instruction[*target]) {
                return Err(Error::malformed(
                    exit.bci,
                    "branch into the middle of an instruction",
                ));
            }
        }
        for handler in handlers {
            if handler.is_synchronization_entry() {
                continue;
            }
            let valid = handler.start_bci < handler.end_bci
                && handler.end_bci <= size
                && handler.handler_bci < size
                && is_instruction[handler.handler_bci];
            if !valid {
                return Err(Error::malformed(
                    handler.handler_bci,
                    "invalid exception table entry",
                ));
            }
            starts[handler.handler_bci] = true;
            flags[handler.handler_bci].insert(BlockFlags::EXCEPTION_ENTRY);
        }

        // Second pass: block level successors, keyed by block start
        let mut successors: Vec<Vec<usize>> = vec![vec![]; size];
        let mut current_block = 0;
        for (idx, exit) in exits.iter().enumerate() {
            if starts[exit.bci] {
                current_block = exit.bci;
            }
            successors[current_block].extend(exit.targets.iter().copied());
            if exit.falls_through {
                if let Some(next) = exits.get(idx + 1).filter(|next| starts[next.bci]) {
                    successors[current_block].push(next.bci);
                }
            }
        }
        for block_successors in &mut successors {
            block_successors.sort_unstable();
            block_successors.dedup();
        }

        // Depth first numbering
        let mut numbers: Vec<Option<usize>> = vec![None; size];
        let mut next_number = 0;
        let roots = std::iter::once(0).chain(
            handlers
                .iter()
                .filter(|handler| !handler.is_synchronization_entry())
                .map(|handler| handler.handler_bci),
        );
        for root in roots {
            let mut to_visit = vec![root];
            while let Some(bci) = to_visit.pop() {
                if numbers[bci].is_some() {
                    continue;
                }
                numbers[bci] = Some(next_number);
                next_number += 1;
                for successor in successors[bci].iter().rev() {
                    if numbers[*successor].is_none() {
                        to_visit.push(*successor);
                    }
                }
            }
        }

        // Allocate the blocks
        let mut block_map = BlockMap::new(size);
        for bci in (0..size).filter(|bci| starts[*bci]) {
            let number = match numbers[bci] {
                Some(number) => number,
                None => {
                    log::trace!("block at bci {} is unreachable", bci);
                    next_number += 1;
                    next_number - 1
                }
            };
            let mut block = BlockBegin::new(bci, number);
            block.flags = flags[bci];
            block_map.set(bci, graph.add_block(block));
        }

        log::debug!(
            "found {} blocks in {} bytes of code",
            block_map.iter().count(),
            size
        );
        Ok(block_map)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::bytecode::opcodes::*;

    fn starts(block_map: &BlockMap) -> Vec<usize> {
        block_map.iter().map(|(bci, _)| bci).collect()
    }

    fn block_at<'g>(graph: &'g IrGraph, block_map: &BlockMap, bci: usize) -> &'g BlockBegin {
        graph.block(block_map.get(bci).unwrap())
    }

    /// `for (int i = 0; i < 10; i++) {}`
    const COUNTED_LOOP: [u8; 15] = [
        ICONST_0, // 0
        0x3c,     // 1: istore_1
        0x1b,     // 2: iload_1
        BIPUSH, 10, // 3
        IF_ICMPGE, 0x00, 0x09, // 5: -> 14
        IINC, 1, 1, // 8
        GOTO, 0xff, 0xf7, // 11: -> 2
        RETURN, // 14
    ];

    #[test]
    fn straight_line_code_is_one_block() {
        let mut graph = IrGraph::new();
        let code = [ICONST_1, POP, RETURN];
        let block_map = BlockMap::build(&code, &[], &mut graph).unwrap();
        assert_eq!(starts(&block_map), vec![0]);
        let entry = block_at(&graph, &block_map, 0);
        assert!(entry.check_block_flag(BlockFlags::STANDARD_ENTRY));
        assert_eq!(entry.depth_first_number, 0);
        assert_eq!(block_map.get(1), None);
        assert_eq!(block_map.get(100), None);
    }

    #[test]
    fn loop_blocks_and_numbers() {
        let mut graph = IrGraph::new();
        let block_map = BlockMap::build(&COUNTED_LOOP, &[], &mut graph).unwrap();
        assert_eq!(starts(&block_map), vec![0, 2, 8, 14]);

        let header = block_at(&graph, &block_map, 2);
        assert!(header.check_block_flag(BlockFlags::BACKWARD_BRANCH_TARGET));
        assert!(header.check_block_flag(BlockFlags::PARSER_LOOP_HEADER));
        assert!(!block_at(&graph, &block_map, 14).check_block_flag(BlockFlags::PARSER_LOOP_HEADER));

        let numbers: Vec<usize> = [0, 2, 8, 14]
            .iter()
            .map(|bci| block_at(&graph, &block_map, *bci).depth_first_number)
            .collect();
        assert_eq!(numbers, vec![0, 1, 2, 3]);
    }

    #[test]
    fn handler_entries_start_blocks() {
        let mut graph = IrGraph::new();
        let code = [
            ICONST_1, // 0
            0x3c,     // 1: istore_1
            RETURN,   // 2
            0x4d,     // 3: astore_2
            RETURN,   // 4
        ];
        let handlers = [ExceptionHandler::new(0, 3, 3, 0)];
        let block_map = BlockMap::build(&code, &handlers, &mut graph).unwrap();
        assert_eq!(starts(&block_map), vec![0, 3]);
        let handler = block_at(&graph, &block_map, 3);
        assert!(handler.check_block_flag(BlockFlags::EXCEPTION_ENTRY));
        assert_eq!(handler.depth_first_number, 1);
    }

    #[test]
    fn subroutine_entries_and_return_points() {
        let mut graph = IrGraph::new();
        let code = [
            JSR, 0x00, 0x04, // 0: -> 4
            RETURN, // 3
            0x4c,   // 4: astore_1
            RET, 1, // 5
        ];
        let block_map = BlockMap::build(&code, &[], &mut graph).unwrap();
        assert_eq!(starts(&block_map), vec![0, 3, 4]);
        assert!(block_at(&graph, &block_map, 4).check_block_flag(BlockFlags::SUBROUTINE_ENTRY));
        assert!(!block_at(&graph, &block_map, 3).check_block_flag(BlockFlags::SUBROUTINE_ENTRY));
    }

    #[test]
    fn unreachable_blocks_numbered_last() {
        let mut graph = IrGraph::new();
        let code = [
            GOTO, 0x00, 0x04, // 0: -> 4
            RETURN, // 3 (dead)
            RETURN, // 4
        ];
        let block_map = BlockMap::build(&code, &[], &mut graph).unwrap();
        assert_eq!(block_at(&graph, &block_map, 0).depth_first_number, 0);
        assert_eq!(block_at(&graph, &block_map, 4).depth_first_number, 1);
        assert_eq!(block_at(&graph, &block_map, 3).depth_first_number, 2);
    }

    #[test]
    fn falling_off_the_end() {
        let mut graph = IrGraph::new();
        let code = [ICONST_1, POP];
        assert!(matches!(
            BlockMap::build(&code, &[], &mut graph),
            Err(Error::MalformedBytecode { bci: 1, .. })
        ));
    }

    #[test]
    fn branch_into_instruction() {
        let mut graph = IrGraph::new();
        let code = [
            GOTO, 0x00, 0x04, // 0: -> 4 (middle of bipush)
            BIPUSH, 3, // 3
            RETURN,
        ];
        assert!(matches!(
            BlockMap::build(&code, &[], &mut graph),
            Err(Error::MalformedBytecode { bci: 0, .. })
        ));
    }
}
