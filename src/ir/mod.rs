//! Graph representation produced by parsing
//!
//! ### Structure
//!
//! A compilation owns one [`IrGraph`], which is an arena of blocks, instructions and scopes. All
//! cross references are plain integer handles ([`BlockId`], [`InstrId`], [`ScopeId`]) into that
//! arena, so a block can be duplicated (eg. once per call site of a subroutine) without any
//! aliasing between the copies.

mod block;
mod exception_handler;
mod instruction;
mod ir_graph;
mod scope;
mod value_stack;

pub use block::*;
pub use exception_handler::*;
pub use instruction::*;
pub use ir_graph::*;
pub use scope::*;
pub use value_stack::*;
