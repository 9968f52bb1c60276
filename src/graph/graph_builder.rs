use super::{BlockMap, ScopeData};
use crate::bytecode::{opcodes, BytecodeStream, ConstantPool, Method};
use crate::ir::{
    BlockBegin, BlockEnd, BlockFlags, BlockId, ExceptionHandler, IrGraph, IrScope, ScopeId,
    SYNCHRONIZATION_ENTRY_BCI,
};
use crate::{Error, Options};
use std::rc::Rc;

/// Parses the bytecode of one method into an [`IrGraph`]
///
/// Parsing is driven by a stack of [`ScopeData`]: the method itself gets the bottom one, and
/// every subroutine reached through `jsr` gets one pushed on top for the duration of its parse.
/// Each context drains its own worklist, so a subroutine body is parsed completely (into blocks
/// private to that call site) before parsing resumes in the caller.
pub struct GraphBuilder<'a> {
    method: &'a Method,
    constant_pool: &'a dyn ConstantPool,
    options: &'a Options,
    graph: IrGraph<'a>,

    /// Innermost parsing context
    scope_data: Option<Box<ScopeData<'a>>>,

    /// Blocks parsed so far, across all contexts
    parsed_blocks: usize,
}

impl<'a> GraphBuilder<'a> {
    pub fn new(
        method: &'a Method,
        constant_pool: &'a dyn ConstantPool,
        options: &'a Options,
    ) -> GraphBuilder<'a> {
        GraphBuilder {
            method,
            constant_pool,
            options,
            graph: IrGraph::new(),
            scope_data: None,
            parsed_blocks: 0,
        }
    }

    /// Parse the method
    ///
    /// A [`Error::Bailout`] means the method has a shape we don't support (or is too big), not
    /// that it is invalid.
    pub fn build(mut self) -> Result<IrGraph<'a>, Error> {
        let method = self.method;
        log::debug!(
            "building graph for {} ({} bytes of code, {} handlers)",
            method.name,
            method.code_size(),
            method.exception_table.len()
        );

        let scope = self.graph.add_scope(IrScope::root(method));
        let block_map = Rc::new(BlockMap::build(
            &method.code,
            &method.exception_table,
            &mut self.graph,
        )?);

        for handler in &method.exception_table {
            let mut handler = handler.clone();
            let entry = block_map
                .get(handler.handler_bci)
                .ok_or(Error::MissingBlock(handler.handler_bci))?;
            handler.set_entry_block(Some(entry));
            log::trace!(
                "handler for {} covering [{}, {}) at {:?}",
                self.catch_type_name(handler.catch_type),
                handler.start_bci,
                handler.end_bci,
                entry
            );
            self.graph.scope_mut(scope).add_exception_handler(handler);
        }
        if method.is_synchronized() {
            self.add_default_exception_handler(scope);
        }

        let start = block_map.get(0).ok_or(Error::MissingBlock(0))?;
        self.graph.start = Some(start);

        let root = ScopeData::new(
            None,
            scope,
            &self.graph,
            block_map,
            BytecodeStream::new(&method.code),
            self.constant_pool,
            self.options,
        );
        log::debug!("pushed {}", root);
        self.scope_data = Some(Box::new(root));

        let data = Self::data(&mut self.scope_data)?;
        data.add_to_work_list(&mut self.graph, start);
        self.iterate_all_blocks()?;

        let returns = Self::data(&mut self.scope_data)?.number_of_returns();
        self.pop_scope_data()?;
        log::debug!(
            "parsed {} blocks ({} returns) for {}",
            self.parsed_blocks,
            returns,
            method.name
        );
        Ok(self.graph)
    }

    fn catch_type_name(&self, catch_type: u16) -> &'a str {
        if catch_type == 0 {
            "any"
        } else {
            self.constant_pool
                .class_name(catch_type)
                .unwrap_or("<unresolved class>")
        }
    }

    /// Catch-all handler of a synchronized method, which unlocks the receiver and rethrows
    ///
    /// Its entry block is not in the block map: it has no bytecode, and is numbered after every
    /// real block.
    fn add_default_exception_handler(&mut self, scope: ScopeId) {
        let depth_first_number = self.graph.blocks.len();
        let mut entry = BlockBegin::new(SYNCHRONIZATION_ENTRY_BCI, depth_first_number);
        entry.set_block_flag(BlockFlags::DEFAULT_EXCEPTION_HANDLER | BlockFlags::EXCEPTION_ENTRY);
        let entry = self.graph.add_block(entry);

        let mut handler =
            ExceptionHandler::new(0, self.method.code_size(), SYNCHRONIZATION_ENTRY_BCI, 0);
        handler.set_entry_block(Some(entry));
        log::trace!("default exception handler at {:?}", entry);
        self.graph.scope_mut(scope).add_exception_handler(handler);
    }

    /// Innermost context
    ///
    /// This takes the field rather than `&mut self` so that the graph can be borrowed alongside.
    fn data<'s>(
        scope_data: &'s mut Option<Box<ScopeData<'a>>>,
    ) -> Result<&'s mut ScopeData<'a>, Error> {
        scope_data.as_deref_mut().ok_or(Error::NoActiveScope)
    }

    /// Push a new context for `scope` on top of the current one
    fn push_scope_data(&mut self, scope: ScopeId) -> Result<(), Error> {
        let parent = self.scope_data.take().ok_or(Error::NoActiveScope)?;
        let block_map = parent.block_map().clone();
        let stream = parent.stream().clone();
        let constant_pool = parent.constant_pool();
        let data = ScopeData::new(
            Some(parent),
            scope,
            &self.graph,
            block_map,
            stream,
            constant_pool,
            self.options,
        );
        self.scope_data = Some(Box::new(data));
        Ok(())
    }

    fn pop_scope_data(&mut self) -> Result<(), Error> {
        let data = self.scope_data.take().ok_or(Error::NoActiveScope)?;
        log::debug!("popped {}", data);
        self.scope_data = data.into_parent();
        Ok(())
    }

    /// Parse blocks off the current worklist until it is empty
    fn iterate_all_blocks(&mut self) -> Result<(), Error> {
        loop {
            let block = match Self::data(&mut self.scope_data)?.remove_from_work_list() {
                Some(block) => block,
                None => return Ok(()),
            };
            if self.graph.block(block).was_visited {
                continue;
            }
            self.graph.block_mut(block).was_visited = true;

            self.parsed_blocks += 1;
            if self.parsed_blocks > self.options.maximum_block_count {
                log::debug!(
                    "giving up on {} after {} blocks",
                    self.method.name,
                    self.options.maximum_block_count
                );
                return Err(Error::Bailout(format!(
                    "too many blocks (limit is {})",
                    self.options.maximum_block_count
                )));
            }
            self.graph.block_order.push(block);
            self.parse_block(block)?;
        }
    }

    /// Block at `bci` in the current context, scheduled for parsing
    fn successor_at(&mut self, bci: usize) -> Result<BlockId, Error> {
        let data = Self::data(&mut self.scope_data)?;
        let block = data
            .block_at(&mut self.graph, bci)
            .ok_or(Error::MissingBlock(bci))?;
        data.add_to_work_list(&mut self.graph, block);
        Ok(block)
    }

    fn parse_block(&mut self, block: BlockId) -> Result<(), Error> {
        if self
            .graph
            .block(block)
            .check_block_flag(BlockFlags::DEFAULT_EXCEPTION_HANDLER)
        {
            self.graph
                .append_instruction(block, SYNCHRONIZATION_ENTRY_BCI, opcodes::MONITOREXIT);
            self.graph
                .append_instruction(block, SYNCHRONIZATION_ENTRY_BCI, opcodes::ATHROW);
            self.graph.set_block_end(block, BlockEnd::Throw);
            return Ok(());
        }

        let start_bci = self.graph.block(block).bci;
        let data = Self::data(&mut self.scope_data)?;
        log::trace!("parsing {:?} at bci {} in {}", block, start_bci, data);
        let mut opcode = data.stream_mut().seek(start_bci)?;

        loop {
            let data = Self::data(&mut self.scope_data)?;
            let bci = data.stream().current_bci();
            let next_bci = data.stream().next_bci();

            if data.has_handler() {
                let handlers: Vec<BlockId> = data
                    .exception_handlers(&self.graph)?
                    .iter()
                    .filter(|handler| handler.covers(bci))
                    .filter_map(|handler| handler.entry_block)
                    .collect();
                for handler in handlers {
                    self.graph.add_exception_edge(block, handler);
                    data.add_to_work_list(&mut self.graph, handler);
                }
            }
            self.graph.append_instruction(block, bci, opcode);

            let end = if opcodes::is_conditional_branch(opcode) {
                let dest = data.stream().branch_dest()?;
                let taken = self.successor_at(dest)?;
                let not_taken = self.successor_at(next_bci)?;
                Some(BlockEnd::If { taken, not_taken })
            } else if opcodes::is_goto(opcode) {
                let dest = data.stream().branch_dest()?;
                Some(BlockEnd::Goto(self.successor_at(dest)?))
            } else if opcodes::is_switch(opcode) {
                let targets = data.stream().switch_targets()?;
                let mut cases = targets
                    .into_iter()
                    .map(|target| self.successor_at(target))
                    .collect::<Result<Vec<_>, _>>()?;
                let default = cases.remove(0);
                Some(BlockEnd::Switch { default, cases })
            } else if opcodes::is_return(opcode) {
                data.increment_number_of_returns();
                Some(BlockEnd::Return)
            } else if opcode == opcodes::ATHROW {
                Some(BlockEnd::Throw)
            } else if opcodes::is_jsr(opcode) {
                let dest = data.stream().branch_dest()?;
                return self.gen_jsr(block, dest, next_bci);
            } else if opcode == opcodes::RET {
                let local = data.stream().local_index()?;
                Some(self.gen_ret(local)?)
            } else {
                if let Some(width) = opcodes::store_width(opcode) {
                    let local = data.stream().local_index()?;
                    Self::track_return_address(data, opcode, bci, local, width)?;
                }
                None
            };

            if let Some(end) = end {
                self.graph.set_block_end(block, end);
                return Ok(());
            }

            // Fall into the next block
            let data = Self::data(&mut self.scope_data)?;
            if data.block_map().get(next_bci).is_some() {
                let next = self.successor_at(next_bci)?;
                self.graph.set_block_end(block, BlockEnd::Goto(next));
                return Ok(());
            }
            opcode = data.stream_mut().next()?.ok_or_else(|| {
                Error::malformed(bci, "execution falls off the end of the code")
            })?;
        }
    }

    /// Keep track of which local holds the return address of the subroutine being parsed
    ///
    /// Only the shape javac emits is recognized: the subroutine starts by storing the return
    /// address with an `astore`. Overwriting that local afterwards forgets it. A nested
    /// subroutine storing its return address where an enclosing one keeps its own is a bailout.
    fn track_return_address(
        data: &mut ScopeData<'a>,
        opcode: u8,
        bci: usize,
        local: usize,
        width: usize,
    ) -> Result<(), Error> {
        if !data.parsing_jsr() {
            return Ok(());
        }
        if bci == data.jsr_entry_bci() && opcodes::is_astore(opcode) {
            if data.is_enclosing_return_address_local(local) {
                log::debug!("{} overwrites return address in local {}", data, local);
                return Err(Error::Bailout(String::from(
                    "subroutine overwrites return address from previous subroutine",
                )));
            }
            log::trace!("return address of {} stored in local {}", data, local);
            data.set_jsr_entry_return_address_local(Some(local));
        } else if let Some(ret_addr_local) = data.jsr_entry_return_address_local() {
            if local == ret_addr_local || (width == 2 && local + 1 == ret_addr_local) {
                log::trace!("return address of {} overwritten at bci {}", data, bci);
                data.set_jsr_entry_return_address_local(None);
            }
        }
        Ok(())
    }

    /// Inline the subroutine entered at `entry_bci`, which returns to `return_bci`
    fn gen_jsr(&mut self, block: BlockId, entry_bci: usize, return_bci: usize) -> Result<(), Error> {
        let data = Self::data(&mut self.scope_data)?;
        if data.is_parsing_jsr_entry(entry_bci) {
            log::debug!("bailing out on recursive jsr to bci {}", entry_bci);
            return Err(Error::Bailout(String::from(
                "too-complicated jsr/ret structure",
            )));
        }
        let scope = data.scope();
        let continuation = data.continuation();
        let continuation_state = data.continuation_state().cloned();
        let jsr_continuation = data
            .block_at(&mut self.graph, return_bci)
            .ok_or(Error::MissingBlock(return_bci))?;

        self.push_scope_data(scope)?;
        let data = Self::data(&mut self.scope_data)?;
        data.set_jsr_entry_bci(entry_bci)?;
        data.set_jsr_continuation(Some(jsr_continuation));
        data.set_continuation(continuation);
        data.set_continuation_state(continuation_state);
        data.setup_jsr_exception_handlers(&mut self.graph)?;
        log::debug!("pushed {}", data);

        let entry = data
            .block_at(&mut self.graph, entry_bci)
            .ok_or(Error::MissingBlock(entry_bci))?;
        self.graph.set_block_end(
            block,
            BlockEnd::Jsr {
                entry,
                continuation: jsr_continuation,
            },
        );
        data.add_to_work_list(&mut self.graph, entry);

        self.iterate_all_blocks()?;
        self.pop_scope_data()?;

        // Only reachable if some `ret` made it back
        if !self.graph.block(jsr_continuation).predecessors.is_empty() {
            let data = Self::data(&mut self.scope_data)?;
            data.add_to_work_list(&mut self.graph, jsr_continuation);
        }
        Ok(())
    }

    fn gen_ret(&mut self, local: usize) -> Result<BlockEnd, Error> {
        let data = Self::data(&mut self.scope_data)?;
        if !data.parsing_jsr() {
            return Err(Error::Bailout(String::from(
                "ret encountered while not parsing subroutine",
            )));
        }
        if data.jsr_entry_return_address_local() != Some(local) {
            log::debug!(
                "ret {} in {} does not use the stored return address ({:?})",
                local,
                data,
                data.jsr_entry_return_address_local()
            );
            return Err(Error::Bailout(String::from(
                "can not handle complicated jsr/ret constructs",
            )));
        }
        let continuation = data.jsr_continuation().ok_or(Error::NotParsingJsr)?;
        Ok(BlockEnd::Ret(continuation))
    }
}
