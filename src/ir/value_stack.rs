use super::{InstrId, ScopeId};

/// Abstract interpreter state: what each local and stack slot holds at some point
///
/// Slots are filled with the instruction producing the value. `None` locals are dead or not yet
/// written.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValueStack {
    /// Scope the state belongs to
    pub scope: ScopeId,

    /// Bytecode index the state describes
    pub bci: usize,

    pub locals: Vec<Option<InstrId>>,
    pub stack: Vec<InstrId>,
}

impl ValueStack {
    /// Empty stack and dead locals
    pub fn new(scope: ScopeId, bci: usize, max_locals: usize) -> ValueStack {
        ValueStack {
            scope,
            bci,
            locals: vec![None; max_locals],
            stack: vec![],
        }
    }

    pub fn stack_size(&self) -> usize {
        self.stack.len()
    }

    pub fn locals_size(&self) -> usize {
        self.locals.len()
    }

    pub fn push(&mut self, value: InstrId) {
        self.stack.push(value);
    }

    pub fn pop(&mut self) -> Option<InstrId> {
        self.stack.pop()
    }

    pub fn load_local(&self, index: usize) -> Option<InstrId> {
        self.locals.get(index).copied().flatten()
    }

    /// Write a local, growing the locals if needed
    pub fn store_local(&mut self, index: usize, value: InstrId) {
        if index >= self.locals.len() {
            self.locals.resize(index + 1, None);
        }
        self.locals[index] = Some(value);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn locals_grow_on_store() {
        let mut state = ValueStack::new(ScopeId(0), 0, 2);
        assert_eq!(state.locals_size(), 2);
        assert_eq!(state.load_local(1), None);

        state.store_local(3, InstrId(7));
        assert_eq!(state.locals_size(), 4);
        assert_eq!(state.load_local(3), Some(InstrId(7)));
        assert_eq!(state.load_local(9), None);

        state.push(InstrId(1));
        state.push(InstrId(2));
        assert_eq!(state.stack_size(), 2);
        assert_eq!(state.pop(), Some(InstrId(2)));
    }
}
