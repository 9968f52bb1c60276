//! JVM opcodes
//!
//! Only the opcodes the graph builder needs to name are given constants. Everything else is
//! handled generically through [`Length`].
//!
//! [0]: https://docs.oracle.com/javase/specs/jvms/se18/html/jvms-7.html

pub const NOP: u8 = 0x00;
pub const ACONST_NULL: u8 = 0x01;
pub const ICONST_0: u8 = 0x03;
pub const ICONST_1: u8 = 0x04;
pub const BIPUSH: u8 = 0x10;
pub const SIPUSH: u8 = 0x11;
pub const ILOAD: u8 = 0x15;
pub const LLOAD: u8 = 0x16;
pub const FLOAD: u8 = 0x17;
pub const DLOAD: u8 = 0x18;
pub const ALOAD: u8 = 0x19;
pub const ILOAD_0: u8 = 0x1a;
pub const ALOAD_0: u8 = 0x2a;
pub const ALOAD_3: u8 = 0x2d;
pub const ISTORE: u8 = 0x36;
pub const LSTORE: u8 = 0x37;
pub const FSTORE: u8 = 0x38;
pub const DSTORE: u8 = 0x39;
pub const ASTORE: u8 = 0x3a;
pub const ISTORE_0: u8 = 0x3b;
pub const LSTORE_0: u8 = 0x3f;
pub const FSTORE_0: u8 = 0x43;
pub const DSTORE_0: u8 = 0x47;
pub const ASTORE_0: u8 = 0x4b;
pub const ASTORE_3: u8 = 0x4e;
pub const POP: u8 = 0x57;
pub const IADD: u8 = 0x60;
pub const IINC: u8 = 0x84;
pub const IFEQ: u8 = 0x99;
pub const IF_ICMPGE: u8 = 0xa2;
pub const IF_ACMPNE: u8 = 0xa6;
pub const GOTO: u8 = 0xa7;
pub const JSR: u8 = 0xa8;
pub const RET: u8 = 0xa9;
pub const TABLESWITCH: u8 = 0xaa;
pub const LOOKUPSWITCH: u8 = 0xab;
pub const IRETURN: u8 = 0xac;
pub const RETURN: u8 = 0xb1;
pub const ATHROW: u8 = 0xbf;
pub const MONITORENTER: u8 = 0xc2;
pub const MONITOREXIT: u8 = 0xc3;
pub const WIDE: u8 = 0xc4;
pub const IFNULL: u8 = 0xc6;
pub const IFNONNULL: u8 = 0xc7;
pub const GOTO_W: u8 = 0xc8;
pub const JSR_W: u8 = 0xc9;

/// Encoded length of an instruction, as far as can be told from its opcode
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Length {
    /// Always this many bytes (opcode included)
    Fixed(usize),

    /// `tableswitch`, `lookupswitch` and `wide` depend on their operands
    Variable,

    /// Not a valid opcode in a class file
    Illegal,
}

/// Length of an instruction given its opcode
pub fn length_of(opcode: u8) -> Length {
    match opcode {
        0x00..=0x0f => Length::Fixed(1),
        BIPUSH => Length::Fixed(2),
        SIPUSH => Length::Fixed(3),
        0x12 => Length::Fixed(2),
        0x13 | 0x14 => Length::Fixed(3),
        0x15..=0x19 => Length::Fixed(2),
        0x1a..=0x35 => Length::Fixed(1),
        0x36..=0x3a => Length::Fixed(2),
        0x3b..=0x83 => Length::Fixed(1),
        IINC => Length::Fixed(3),
        0x85..=0x98 => Length::Fixed(1),
        0x99..=0xa8 => Length::Fixed(3),
        RET => Length::Fixed(2),
        TABLESWITCH | LOOKUPSWITCH => Length::Variable,
        0xac..=0xb1 => Length::Fixed(1),
        0xb2..=0xb8 => Length::Fixed(3),
        0xb9 | 0xba => Length::Fixed(5),
        0xbb => Length::Fixed(3),
        0xbc => Length::Fixed(2),
        0xbd => Length::Fixed(3),
        0xbe | ATHROW => Length::Fixed(1),
        0xc0 | 0xc1 => Length::Fixed(3),
        MONITORENTER | MONITOREXIT => Length::Fixed(1),
        WIDE => Length::Variable,
        0xc5 => Length::Fixed(4),
        IFNULL | IFNONNULL => Length::Fixed(3),
        GOTO_W | JSR_W => Length::Fixed(5),
        _ => Length::Illegal,
    }
}

/// Two-way branches with a 16-bit offset (`if*`, `ifnull`, `ifnonnull`)
pub fn is_conditional_branch(opcode: u8) -> bool {
    matches!(opcode, IFEQ..=IF_ACMPNE | IFNULL | IFNONNULL)
}

/// `ireturn` through `return`
pub fn is_return(opcode: u8) -> bool {
    matches!(opcode, IRETURN..=RETURN)
}

pub fn is_jsr(opcode: u8) -> bool {
    matches!(opcode, JSR | JSR_W)
}

pub fn is_goto(opcode: u8) -> bool {
    matches!(opcode, GOTO | GOTO_W)
}

pub fn is_switch(opcode: u8) -> bool {
    matches!(opcode, TABLESWITCH | LOOKUPSWITCH)
}

/// Does control never fall through to the next instruction?
pub fn ends_block(opcode: u8) -> bool {
    is_goto(opcode) || is_switch(opcode) || is_return(opcode) || opcode == ATHROW || opcode == RET
}

/// Instructions which store into a local variable
///
/// Returns the width of the stored value (in local variable slots).
pub fn store_width(opcode: u8) -> Option<usize> {
    match opcode {
        ISTORE | FSTORE | ASTORE => Some(1),
        LSTORE | DSTORE => Some(2),
        ISTORE_0..=0x3e | FSTORE_0..=0x46 | ASTORE_0..=ASTORE_3 => Some(1),
        LSTORE_0..=0x42 | DSTORE_0..=0x4a => Some(2),
        _ => None,
    }
}

/// `astore` and its short forms
pub fn is_astore(opcode: u8) -> bool {
    matches!(opcode, ASTORE | ASTORE_0..=ASTORE_3)
}

/// Local variable slot implied by a short-form load or store (eg. `astore_2`)
pub fn implicit_local(opcode: u8) -> Option<usize> {
    match opcode {
        0x1a..=0x2d => Some(((opcode - 0x1a) % 4) as usize),
        0x3b..=0x4e => Some(((opcode - 0x3b) % 4) as usize),
        _ => None,
    }
}
