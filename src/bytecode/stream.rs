use super::opcodes::{self, Length};
use crate::Error;
use byteorder::{BigEndian, ByteOrder};

/// Cursor over the code of a method
///
/// The cursor always sits on the start of one instruction (the "current" instruction), which has
/// already been decoded far enough to know its opcode and length. Operands are read relative to
/// the current instruction. `wide` prefixes are folded into the instruction they modify: the
/// opcode reported is that of the modified instruction, while `current_bci` still points at the
/// prefix.
#[derive(Clone, Debug)]
pub struct BytecodeStream<'a> {
    code: &'a [u8],
    cur_bci: usize,
    next_bci: usize,
    opcode: u8,
    wide: bool,
}

impl<'a> BytecodeStream<'a> {
    /// New stream, positioned before the first instruction
    pub fn new(code: &'a [u8]) -> BytecodeStream<'a> {
        BytecodeStream {
            code,
            cur_bci: 0,
            next_bci: 0,
            opcode: opcodes::NOP,
            wide: false,
        }
    }

    /// Number of bytes of code
    pub fn code_size(&self) -> usize {
        self.code.len()
    }

    pub fn code(&self) -> &'a [u8] {
        self.code
    }

    pub fn current_bci(&self) -> usize {
        self.cur_bci
    }

    /// Index of the instruction after the current one
    pub fn next_bci(&self) -> usize {
        self.next_bci
    }

    pub fn opcode(&self) -> u8 {
        self.opcode
    }

    pub fn is_wide(&self) -> bool {
        self.wide
    }

    /// Move to the instruction starting at `bci` and decode its opcode
    pub fn seek(&mut self, bci: usize) -> Result<u8, Error> {
        let prefix = *self
            .code
            .get(bci)
            .ok_or_else(|| Error::malformed(bci, "instruction index past end of code"))?;
        self.cur_bci = bci;
        let (opcode, wide) = if prefix == opcodes::WIDE {
            let modified = *self
                .code
                .get(bci + 1)
                .ok_or_else(|| Error::malformed(bci, "truncated wide instruction"))?;
            (modified, true)
        } else {
            (prefix, false)
        };
        self.opcode = opcode;
        self.wide = wide;
        self.next_bci = bci + self.instruction_length()?;
        if self.next_bci > self.code.len() {
            return Err(Error::malformed(bci, "truncated instruction"));
        }
        Ok(opcode)
    }

    /// Advance to the next instruction, if there is one
    pub fn next(&mut self) -> Result<Option<u8>, Error> {
        if self.next_bci >= self.code.len() {
            self.cur_bci = self.next_bci;
            return Ok(None);
        }
        self.seek(self.next_bci).map(Some)
    }

    fn instruction_length(&self) -> Result<usize, Error> {
        if self.wide {
            return match self.opcode {
                opcodes::IINC => Ok(6),
                opcodes::ILOAD..=opcodes::ALOAD
                | opcodes::ISTORE..=opcodes::ASTORE
                | opcodes::RET => Ok(4),
                other => Err(Error::malformed(
                    self.cur_bci,
                    format!("wide cannot modify opcode {:#04x}", other),
                )),
            };
        }
        match opcodes::length_of(self.opcode) {
            Length::Fixed(len) => Ok(len),
            Length::Illegal => Err(Error::malformed(
                self.cur_bci,
                format!("illegal opcode {:#04x}", self.opcode),
            )),
            Length::Variable => {
                let base = self.switch_operands_start();
                match self.opcode {
                    opcodes::TABLESWITCH => {
                        let low = self.read_s4_at(base + 4)?;
                        let high = self.read_s4_at(base + 8)?;
                        if high < low {
                            return Err(Error::malformed(self.cur_bci, "tableswitch high < low"));
                        }
                        let count = (high as i64 - low as i64 + 1) as usize;
                        Ok(base + 12 + 4 * count - self.cur_bci)
                    }
                    _ => {
                        let pairs = self.read_s4_at(base + 4)?;
                        if pairs < 0 {
                            return Err(Error::malformed(self.cur_bci, "negative lookupswitch size"));
                        }
                        Ok(base + 8 + 8 * pairs as usize - self.cur_bci)
                    }
                }
            }
        }
    }

    /// Operands of switches start on the next 4-byte boundary after the opcode
    fn switch_operands_start(&self) -> usize {
        (self.cur_bci + 4) & !3
    }

    fn bytes_at(&self, at: usize, len: usize) -> Result<&'a [u8], Error> {
        self.code
            .get(at..at + len)
            .ok_or_else(|| Error::malformed(self.cur_bci, "operand past end of code"))
    }

    fn read_s4_at(&self, at: usize) -> Result<i32, Error> {
        self.bytes_at(at, 4).map(BigEndian::read_i32)
    }

    /// Unsigned byte operand, `offset` bytes after the opcode
    pub fn read_u1(&self, offset: usize) -> Result<u8, Error> {
        self.bytes_at(self.cur_bci + offset, 1).map(|bytes| bytes[0])
    }

    /// Unsigned 16-bit operand, `offset` bytes after the opcode
    pub fn read_u2(&self, offset: usize) -> Result<u16, Error> {
        self.bytes_at(self.cur_bci + offset, 2)
            .map(BigEndian::read_u16)
    }

    /// Signed 16-bit operand, `offset` bytes after the opcode
    pub fn read_s2(&self, offset: usize) -> Result<i16, Error> {
        self.bytes_at(self.cur_bci + offset, 2)
            .map(BigEndian::read_i16)
    }

    /// Signed 32-bit operand, `offset` bytes after the opcode
    pub fn read_s4(&self, offset: usize) -> Result<i32, Error> {
        self.read_s4_at(self.cur_bci + offset)
    }

    /// Local variable index of a load, store, `iinc` or `ret`
    pub fn local_index(&self) -> Result<usize, Error> {
        if let Some(local) = opcodes::implicit_local(self.opcode) {
            return Ok(local);
        }
        if self.wide {
            self.read_u2(2).map(usize::from)
        } else {
            self.read_u1(1).map(usize::from)
        }
    }

    fn relative_target(&self, offset: i64) -> Result<usize, Error> {
        let target = self.cur_bci as i64 + offset;
        if target < 0 || target as usize >= self.code.len() {
            return Err(Error::malformed(
                self.cur_bci,
                format!("branch target {} outside of code", target),
            ));
        }
        Ok(target as usize)
    }

    /// Destination of a `goto`, `jsr`, or conditional branch
    pub fn branch_dest(&self) -> Result<usize, Error> {
        let offset = match self.opcode {
            opcodes::GOTO_W | opcodes::JSR_W => self.read_s4(1)? as i64,
            _ => self.read_s2(1)? as i64,
        };
        self.relative_target(offset)
    }

    /// Default target, followed by every case target, of a `tableswitch` or `lookupswitch`
    pub fn switch_targets(&self) -> Result<Vec<usize>, Error> {
        let base = self.switch_operands_start();
        let default = self.relative_target(self.read_s4_at(base)? as i64)?;
        let mut targets = vec![default];
        match self.opcode {
            opcodes::TABLESWITCH => {
                let low = self.read_s4_at(base + 4)? as i64;
                let high = self.read_s4_at(base + 8)? as i64;
                for i in 0..(high - low + 1) as usize {
                    let offset = self.read_s4_at(base + 12 + 4 * i)?;
                    targets.push(self.relative_target(offset as i64)?);
                }
            }
            opcodes::LOOKUPSWITCH => {
                let pairs = self.read_s4_at(base + 4)? as usize;
                for i in 0..pairs {
                    let offset = self.read_s4_at(base + 8 + 8 * i + 4)?;
                    targets.push(self.relative_target(offset as i64)?);
                }
            }
            other => {
                return Err(Error::malformed(
                    self.cur_bci,
                    format!("opcode {:#04x} is not a switch", other),
                ))
            }
        }
        Ok(targets)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::bytecode::opcodes::*;

    #[test]
    fn walk_straight_line_code() {
        let code = [ICONST_1, BIPUSH, 7, IADD, IRETURN];
        let mut stream = BytecodeStream::new(&code);
        assert_eq!(stream.seek(0).unwrap(), ICONST_1);
        assert_eq!(stream.next().unwrap(), Some(BIPUSH));
        assert_eq!(stream.current_bci(), 1);
        assert_eq!(stream.read_u1(1).unwrap(), 7);
        assert_eq!(stream.next_bci(), 3);
        assert_eq!(stream.next().unwrap(), Some(IADD));
        assert_eq!(stream.next().unwrap(), Some(IRETURN));
        assert_eq!(stream.next().unwrap(), None);
    }

    #[test]
    fn backward_branch_destination() {
        let code = [NOP, NOP, GOTO, 0xff, 0xfe];
        let mut stream = BytecodeStream::new(&code);
        stream.seek(2).unwrap();
        assert_eq!(stream.branch_dest().unwrap(), 0);
    }

    #[test]
    fn branch_outside_code() {
        let code = [GOTO, 0x00, 0x10];
        let mut stream = BytecodeStream::new(&code);
        stream.seek(0).unwrap();
        assert!(matches!(
            stream.branch_dest(),
            Err(Error::MalformedBytecode { bci: 0, .. })
        ));
    }

    #[test]
    fn wide_local_access() {
        let code = [WIDE, ASTORE, 0x01, 0x02, WIDE, IINC, 0x00, 0x05, 0x00, 0x01, RETURN];
        let mut stream = BytecodeStream::new(&code);
        assert_eq!(stream.seek(0).unwrap(), ASTORE);
        assert!(stream.is_wide());
        assert_eq!(stream.local_index().unwrap(), 0x0102);
        assert_eq!(stream.next().unwrap(), Some(IINC));
        assert_eq!(stream.current_bci(), 4);
        assert_eq!(stream.local_index().unwrap(), 5);
        assert_eq!(stream.next().unwrap(), Some(RETURN));
    }

    #[test]
    fn tableswitch_targets() {
        // bci 1: tableswitch, padded to bci 4
        let code = [
            NOP,
            TABLESWITCH,
            0, 0, // padding
            0, 0, 0, 27, // default -> 28
            0, 0, 0, 1, // low
            0, 0, 0, 2, // high
            0, 0, 0, 24, // 1 -> 25
            0, 0, 0, 25, // 2 -> 26
            NOP, // 24
            NOP,
            NOP,
            NOP,
            RETURN, // 28
        ];
        let mut stream = BytecodeStream::new(&code);
        assert_eq!(stream.seek(1).unwrap(), TABLESWITCH);
        assert_eq!(stream.next_bci(), 24);
        assert_eq!(stream.switch_targets().unwrap(), vec![28, 25, 26]);
    }

    #[test]
    fn lookupswitch_targets() {
        let code = [
            LOOKUPSWITCH,
            0, 0, 0, // padding
            0, 0, 0, 20, // default -> 20
            0, 0, 0, 1, // npairs
            0, 0, 0, 9, 0, 0, 0, 21, // 9 -> 21
            RETURN, // 20
            RETURN, // 21
        ];
        let mut stream = BytecodeStream::new(&code);
        assert_eq!(stream.seek(0).unwrap(), LOOKUPSWITCH);
        assert_eq!(stream.next_bci(), 20);
        assert_eq!(stream.switch_targets().unwrap(), vec![20, 21]);
    }

    #[test]
    fn illegal_opcode() {
        let code = [0xfe];
        let mut stream = BytecodeStream::new(&code);
        assert!(matches!(
            stream.seek(0),
            Err(Error::MalformedBytecode { .. })
        ));
    }
}
