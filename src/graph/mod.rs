//! Building the block graph of a method
//!
//! [`BlockMap::build`] finds the basic blocks up front. [`GraphBuilder`] then parses them in
//! depth first order, one [`ScopeData`] per method or subroutine being parsed, each with its own
//! [`WorkList`] of blocks still to parse.

mod block_map;
mod graph_builder;
mod scope_data;
mod work_list;

pub use block_map::*;
pub use graph_builder::*;
pub use scope_data::*;
pub use work_list::*;
