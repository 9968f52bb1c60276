//! Reading JVM method bytecode
//!
//! Everything here is read-only input to graph construction: the [`Method`] being compiled, a
//! [`BytecodeStream`] to walk its code, and an opaque [`ConstantPool`].

mod constant_pool;
mod method;
pub mod opcodes;
mod stream;

pub use constant_pool::*;
pub use method::*;
pub use stream::*;
