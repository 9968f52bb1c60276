use super::{BlockMap, WorkList};
use crate::bytecode::{BytecodeStream, ConstantPool};
use crate::ir::{
    BlockFlags, BlockId, ExceptionHandler, InstrId, IrGraph, ScopeId, ValueStack,
};
use crate::{Error, Options};
use std::fmt;
use std::rc::Rc;

/// Where to undo a single-block inline that got collapsed into its caller's block
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InlineCleanupInfo {
    /// Block into which the inlined body (up to and including its return) was parsed
    pub block: BlockId,

    /// Last instruction before the inlined return (`None` if the block was empty)
    pub return_prev: Option<InstrId>,

    /// State of the block at that instruction
    pub state: ValueStack,
}

/// Parsing context for one scope
///
/// There is one of these for every method being parsed (the method being compiled and each
/// method inlined into it), plus one for every subroutine being inlined. Contexts form a chain:
/// each owns the context it was pushed on top of, and gives it back with
/// [`ScopeData::into_parent`] once the nested scope has been completely parsed.
///
/// ### Subroutines
///
/// A `jsr`/`ret` subroutine may be called from several places, and each call site needs its own
/// copy of the subroutine body. While a context is parsing a subroutine (which is exactly when
/// its jsr entry index is non-zero), every block lookup goes through a private table: the first
/// lookup of an index duplicates whatever block the parent context has there, and later lookups
/// return that same duplicate. The enclosing scope's exception handlers are cloned up front so
/// that their entry blocks are duplicates too.
pub struct ScopeData<'a> {
    parent: Option<Box<ScopeData<'a>>>,

    /// Scope being parsed
    scope: ScopeId,

    block_map: Rc<BlockMap>,
    stream: BytecodeStream<'a>,
    constant_pool: &'a dyn ConstantPool,

    /// Does this scope or any enclosing scope have exception handlers?
    has_handler: bool,

    work_list: WorkList,

    /// Inlining budget for methods called from this scope
    max_inline_size: usize,

    /// Where parsing of the caller resumes after an inlined return
    continuation: Option<BlockId>,

    /// State at the continuation (without the inlined method's return value)
    continuation_state: Option<ValueStack>,

    num_returns: usize,

    cleanup: Option<InlineCleanupInfo>,

    /// Entry of the subroutine being parsed, `0` when not parsing one
    jsr_entry_bci: usize,

    /// Local holding the subroutine's return address, once stored
    jsr_ret_addr_local: Option<usize>,

    /// Where `ret` goes
    jsr_continuation: Option<BlockId>,

    jsr_handlers: Option<Vec<ExceptionHandler>>,

    /// Per-index copies of the blocks used by the subroutine
    jsr_duplicated_blocks: Vec<Option<BlockId>>,
}

impl<'a> ScopeData<'a> {
    /// New context for `scope`, nested in `parent`
    ///
    /// The inline budget and `has_handler` are derived from the parent as it is right now.
    pub fn new(
        parent: Option<Box<ScopeData<'a>>>,
        scope: ScopeId,
        graph: &IrGraph<'a>,
        block_map: Rc<BlockMap>,
        stream: BytecodeStream<'a>,
        constant_pool: &'a dyn ConstantPool,
        options: &Options,
    ) -> ScopeData<'a> {
        let (max_inline_size, mut has_handler) = match &parent {
            Some(parent) => (
                options.nested_inline_size(parent.max_inline_size),
                parent.has_handler,
            ),
            None => (options.maximum_inline_size, false),
        };
        if graph.scope(scope).exception_handlers().is_some() {
            has_handler = true;
        }

        ScopeData {
            parent,
            scope,
            block_map,
            stream,
            constant_pool,
            has_handler,
            work_list: WorkList::new(),
            max_inline_size,
            continuation: None,
            continuation_state: None,
            num_returns: 0,
            cleanup: None,
            jsr_entry_bci: 0,
            jsr_ret_addr_local: None,
            jsr_continuation: None,
            jsr_handlers: None,
            jsr_duplicated_blocks: vec![],
        }
    }

    /// Tear down this context, handing back the one it was nested in
    pub fn into_parent(self) -> Option<Box<ScopeData<'a>>> {
        self.parent
    }

    pub fn parent(&self) -> Option<&ScopeData<'a>> {
        self.parent.as_deref()
    }

    pub fn parent_mut(&mut self) -> Option<&mut ScopeData<'a>> {
        self.parent.as_deref_mut()
    }

    pub fn scope(&self) -> ScopeId {
        self.scope
    }

    pub fn block_map(&self) -> &Rc<BlockMap> {
        &self.block_map
    }

    pub fn stream(&self) -> &BytecodeStream<'a> {
        &self.stream
    }

    pub fn stream_mut(&mut self) -> &mut BytecodeStream<'a> {
        &mut self.stream
    }

    pub fn constant_pool(&self) -> &'a dyn ConstantPool {
        self.constant_pool
    }

    /// Block starting at `bci`, as seen from this context
    ///
    /// Outside of a subroutine, this is just the block map. Inside one, the block is a copy
    /// private to this context (created on first use). `None` means no block starts there.
    pub fn block_at(&mut self, graph: &mut IrGraph<'a>, bci: usize) -> Option<BlockId> {
        if !self.parsing_jsr() {
            return self.block_map.get(bci);
        }

        // All blocks in a subroutine are duplicated on demand, including the entries of
        // handlers of the enclosing method (those handlers may contain `ret`s too)
        if let Some(block) = self.jsr_duplicated_blocks.get(bci).copied().flatten() {
            return Some(block);
        }
        let original = self.parent.as_mut()?.block_at(graph, bci)?;
        let duplicate = graph.duplicate_block(original);
        log::trace!(
            "duplicated {:?} as {:?} for jsr@{}",
            original,
            duplicate,
            self.jsr_entry_bci
        );
        if let Some(slot) = self.jsr_duplicated_blocks.get_mut(bci) {
            *slot = Some(duplicate);
        }
        Some(duplicate)
    }

    pub fn has_handler(&self) -> bool {
        self.has_handler
    }

    pub fn max_inline_size(&self) -> usize {
        self.max_inline_size
    }

    /// Size of the expression stack of the caller, at the invoke being inlined
    pub fn caller_stack_size(&self, graph: &IrGraph<'a>) -> usize {
        graph.scope(self.scope).caller_stack_size()
    }

    pub fn continuation(&self) -> Option<BlockId> {
        self.continuation
    }

    pub fn set_continuation(&mut self, continuation: Option<BlockId>) {
        self.continuation = continuation;
    }

    pub fn continuation_state(&self) -> Option<&ValueStack> {
        self.continuation_state.as_ref()
    }

    pub fn set_continuation_state(&mut self, state: Option<ValueStack>) {
        self.continuation_state = state;
    }

    /// Is this context parsing a subroutine?
    pub fn parsing_jsr(&self) -> bool {
        self.jsr_entry_bci > 0
    }

    pub fn jsr_entry_bci(&self) -> usize {
        self.jsr_entry_bci
    }

    /// Start parsing the subroutine entered at `bci`
    pub fn set_jsr_entry_bci(&mut self, bci: usize) -> Result<(), Error> {
        if bci == 0 {
            return Err(Error::InvalidJsrEntry(bci));
        }
        self.jsr_duplicated_blocks = vec![None; self.stream.code_size()];
        self.jsr_entry_bci = bci;
        Ok(())
    }

    /// Is some context in the chain already parsing a subroutine of this scope entered at `bci`?
    ///
    /// Entering it again would be recursion, which we don't handle.
    pub fn is_parsing_jsr_entry(&self, bci: usize) -> bool {
        let mut data = Some(self);
        while let Some(current) = data {
            if !current.parsing_jsr() || current.scope != self.scope {
                break;
            }
            if current.jsr_entry_bci == bci {
                return true;
            }
            data = current.parent();
        }
        false
    }

    /// Does an enclosing subroutine of this scope keep its return address in `local`?
    pub fn is_enclosing_return_address_local(&self, local: usize) -> bool {
        let mut data = self.parent();
        while let Some(current) = data {
            if !current.parsing_jsr() || current.scope != self.scope {
                break;
            }
            if current.jsr_ret_addr_local == Some(local) {
                return true;
            }
            data = current.parent();
        }
        false
    }

    pub fn jsr_entry_return_address_local(&self) -> Option<usize> {
        self.jsr_ret_addr_local
    }

    pub fn set_jsr_entry_return_address_local(&mut self, local: Option<usize>) {
        self.jsr_ret_addr_local = local;
    }

    pub fn jsr_continuation(&self) -> Option<BlockId> {
        self.jsr_continuation
    }

    pub fn set_jsr_continuation(&mut self, block: Option<BlockId>) {
        self.jsr_continuation = block;
    }

    /// Returns seen in this scope (a subroutine's returns belong to the enclosing context)
    pub fn number_of_returns(&self) -> usize {
        match self.parent.as_deref() {
            Some(parent) if self.parsing_jsr() => parent.number_of_returns(),
            _ => self.num_returns,
        }
    }

    pub fn increment_number_of_returns(&mut self) {
        let parsing_jsr = self.parsing_jsr();
        match self.parent.as_deref_mut() {
            Some(parent) if parsing_jsr => parent.increment_number_of_returns(),
            _ => self.num_returns += 1,
        }
    }

    /// Remember how to undo an inline that was parsed straight into the caller's block
    pub fn set_inline_cleanup_info(
        &mut self,
        block: BlockId,
        return_prev: Option<InstrId>,
        return_state: ValueStack,
    ) {
        self.cleanup = Some(InlineCleanupInfo {
            block,
            return_prev,
            state: return_state,
        });
    }

    pub fn inline_cleanup_info(&self) -> Option<&InlineCleanupInfo> {
        self.cleanup.as_ref()
    }

    pub fn inline_cleanup_block(&self) -> Option<BlockId> {
        self.cleanup.as_ref().map(|cleanup| cleanup.block)
    }

    pub fn inline_cleanup_return_prev(&self) -> Option<InstrId> {
        self.cleanup.as_ref().and_then(|cleanup| cleanup.return_prev)
    }

    pub fn inline_cleanup_state(&self) -> Option<&ValueStack> {
        self.cleanup.as_ref().map(|cleanup| &cleanup.state)
    }

    /// Copy the handlers of the scope, resolving their entries to blocks private to the
    /// subroutine being parsed
    pub fn setup_jsr_exception_handlers(&mut self, graph: &mut IrGraph<'a>) -> Result<(), Error> {
        if !self.parsing_jsr() {
            return Err(Error::NotParsingJsr);
        }

        let scope_handlers: Vec<ExceptionHandler> = graph
            .scope(self.scope)
            .exception_handlers()
            .map_or_else(Vec::new, <[ExceptionHandler]>::to_vec);
        let mut handlers = Vec::with_capacity(scope_handlers.len());
        for mut handler in scope_handlers {
            if !handler.is_synchronization_entry() {
                let entry = self.block_at(graph, handler.handler_bci);
                handler.set_entry_block(entry);
            } else {
                let is_default_handler = handler.entry_block.map_or(false, |entry| {
                    graph
                        .block(entry)
                        .check_block_flag(BlockFlags::DEFAULT_EXCEPTION_HANDLER)
                });
                if !is_default_handler {
                    return Err(Error::MissingDefaultHandlerBlock);
                }
            }
            handlers.push(handler);
        }
        self.jsr_handlers = Some(handlers);
        Ok(())
    }

    /// Exception handlers visible in this context
    pub fn exception_handlers<'s>(
        &'s self,
        graph: &'s IrGraph<'a>,
    ) -> Result<&'s [ExceptionHandler], Error> {
        match &self.jsr_handlers {
            Some(handlers) => Ok(handlers.as_slice()),
            None if self.parsing_jsr() => Err(Error::ParsingJsr),
            None => Ok(graph.scope(self.scope).exception_handlers().unwrap_or(&[])),
        }
    }

    pub fn add_exception_handler(
        &mut self,
        graph: &mut IrGraph<'a>,
        handler: ExceptionHandler,
    ) -> Result<(), Error> {
        let parsing_jsr = self.parsing_jsr();
        match &mut self.jsr_handlers {
            Some(handlers) => handlers.push(handler),
            None if parsing_jsr => return Err(Error::ParsingJsr),
            None => graph.scope_mut(self.scope).add_exception_handler(handler),
        }
        self.has_handler = true;
        Ok(())
    }

    /// Schedule a block for parsing, unless it is already scheduled
    ///
    /// Continuations are never scheduled here: they are reached by explicitly stitching control
    /// flow back to them once the nested scope is done.
    pub fn add_to_work_list(&mut self, graph: &mut IrGraph<'a>, block: BlockId) {
        let begin = graph.block_mut(block);
        if begin.on_work_list {
            return;
        }
        if Some(block) == self.continuation || Some(block) == self.jsr_continuation {
            return;
        }
        begin.on_work_list = true;
        log::trace!("scheduling {:?} (dfn {}) in {}", block, begin.depth_first_number, self);
        self.work_list.insert(block, begin.depth_first_number);
    }

    /// Next block to parse (the one with the lowest depth first number)
    pub fn remove_from_work_list(&mut self) -> Option<BlockId> {
        self.work_list.pop()
    }

    /// No more blocks to parse means this context is done
    pub fn is_work_list_empty(&self) -> bool {
        self.work_list.is_empty()
    }
}

impl<'a> fmt::Display for ScopeData<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.parsing_jsr() {
            write!(f, "jsr@{} data for {:?}", self.jsr_entry_bci, self.scope)
        } else {
            write!(f, "data for {:?}", self.scope)
        }
    }
}
