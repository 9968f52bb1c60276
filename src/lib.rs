//! Block graph construction for JVM bytecode
//!
//! Given the code of a [`Method`](bytecode::Method), [`GraphBuilder`](graph::GraphBuilder)
//! produces an [`IrGraph`](ir::IrGraph): basic blocks with their control flow and exception
//! edges, parsed in depth first order. Subroutines (`jsr`/`ret`) are inlined at every call site,
//! with blocks duplicated per call site.

pub mod bytecode;
mod errors;
pub mod graph;
pub mod ir;
mod options;

pub use errors::*;
pub use options::*;
