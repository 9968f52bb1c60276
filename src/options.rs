/// Knobs for graph construction
///
/// The inlining budgets are expressed in bytecode bytes. Each nested scope gets
/// `maximum_inline_ratio` of its parent's budget, but never less than `maximum_trivial_size` (so
/// that trivial accessors can always be inlined, no matter how deep the inlining chain is).
#[derive(Clone, Debug)]
pub struct Options {
    /// Inline budget of the root scope
    pub maximum_inline_size: usize,

    /// Methods at most this big are always cheap enough to inline
    pub maximum_trivial_size: usize,

    /// Fraction of the parent budget inherited by a nested scope
    pub maximum_inline_ratio: f32,

    /// Give up on methods that produce more blocks than this
    pub maximum_block_count: usize,
}

impl Options {
    pub const DEFAULT_MAXIMUM_INLINE_SIZE: usize = 35;
    pub const DEFAULT_MAXIMUM_TRIVIAL_SIZE: usize = 6;
    pub const DEFAULT_MAXIMUM_INLINE_RATIO: f32 = 0.90;
    pub const DEFAULT_MAXIMUM_BLOCK_COUNT: usize = 10_000;

    /// Inline budget of a scope nested in a scope with budget `parent_size`
    pub fn nested_inline_size(&self, parent_size: usize) -> usize {
        let size = (self.maximum_inline_ratio * parent_size as f32) as usize;
        size.max(self.maximum_trivial_size)
    }
}

impl Default for Options {
    fn default() -> Options {
        Options {
            maximum_inline_size: Options::DEFAULT_MAXIMUM_INLINE_SIZE,
            maximum_trivial_size: Options::DEFAULT_MAXIMUM_TRIVIAL_SIZE,
            maximum_inline_ratio: Options::DEFAULT_MAXIMUM_INLINE_RATIO,
            maximum_block_count: Options::DEFAULT_MAXIMUM_BLOCK_COUNT,
        }
    }
}
