//! Instruction decoder.
//!
//! Reads the bytes at the current PC and produces an immutable
//! [`Instruction`]: format classification by table lookup, addressing
//! flag extraction, and effective-address computation across all four
//! formats and every addressing mode. PC-relative resolution uses the
//! post-fetch PC, matching the real machine, so the decoder is handed
//! the fetch address and accounts for the instruction's own size.

use crate::cpu::memory::{Memory, MemoryError};
use crate::cpu::opcodes;
use crate::cpu::registers::{Register, RegisterError, RegisterFile, MASK_24};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Instruction encoding length class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Format {
    One,
    Two,
    Three,
    Four,
}

impl Format {
    /// Instruction size in bytes; equal to the format number.
    pub fn size(self) -> u32 {
        match self {
            Format::One => 1,
            Format::Two => 2,
            Format::Three => 3,
            Format::Four => 4,
        }
    }
}

impl TryFrom<u8> for Format {
    type Error = DecodeError;

    fn try_from(n: u8) -> Result<Self, DecodeError> {
        match n {
            1 => Ok(Format::One),
            2 => Ok(Format::Two),
            3 => Ok(Format::Three),
            4 => Ok(Format::Four),
            other => Err(DecodeError::InvalidFormat(other)),
        }
    }
}

/// Addressing mode of a format-3/4 instruction, from the `n`/`i` flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AddrMode {
    /// `n=0, i=1`: the operand field is the value itself.
    Immediate,
    /// `n=1, i=0`: one extra word dereference through memory.
    Indirect,
    /// `n=i`: plain memory operand (includes the SIC-compatible
    /// `n=0, i=0` encoding).
    Simple,
}

/// A decoded instruction: one per cycle, discarded after execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    /// Opcode with the `n`/`i` addressing bits cleared (formats 3/4);
    /// the raw byte for formats 1/2.
    pub opcode: u8,
    pub format: Format,
    pub mode: AddrMode,
    /// `x` flag: index register added during address resolution.
    pub indexed: bool,
    /// First register operand (format 2 only).
    pub r1: u8,
    /// Second register operand or shift/SVC count (format 2 only).
    pub r2: u8,
    /// Raw displacement (12-bit) or address (20-bit) field.
    pub operand: u32,
    /// Resolved effective address; `None` for formats 1/2.
    pub effective_address: Option<u32>,
}

impl Instruction {
    /// Byte size of this instruction.
    pub fn size(&self) -> u32 {
        self.format.size()
    }

    /// Mnemonic, when the opcode names an architectural instruction.
    pub fn mnemonic(&self) -> &'static str {
        opcodes::mnemonic(self.opcode).unwrap_or("???")
    }
}

/// Sign-extend a 12-bit displacement field.
fn sext12(disp: u32) -> i32 {
    if disp & 0x800 != 0 {
        (disp | !0xFFF) as i32
    } else {
        disp as i32
    }
}

/// Decode the instruction at `pc`.
///
/// The register file is consulted read-only, for the B and X registers
/// and nothing else; PC itself is passed in by the caller.
pub fn decode(mem: &Memory, regs: &RegisterFile, pc: u32) -> Result<Instruction, DecodeError> {
    let byte0 = mem.read_byte(pc)?;

    if opcodes::is_format1(byte0) {
        return Ok(Instruction {
            opcode: byte0,
            format: Format::One,
            mode: AddrMode::Simple,
            indexed: false,
            r1: 0,
            r2: 0,
            operand: 0,
            effective_address: None,
        });
    }

    if opcodes::is_format2(byte0) {
        let byte1 = mem.read_byte(pc.wrapping_add(1))?;
        return Ok(Instruction {
            opcode: byte0,
            format: Format::Two,
            mode: AddrMode::Simple,
            indexed: false,
            r1: byte1 >> 4,
            r2: byte1 & 0x0F,
            operand: 0,
            effective_address: None,
        });
    }

    // Format 3 or 4: byte 0 carries n/i in its low two bits, byte 1
    // carries x/b/p/e plus the high nibble of the operand field.
    let opcode = byte0 & 0xFC;
    let n = byte0 & 0x02 != 0;
    let i = byte0 & 0x01 != 0;

    let byte1 = mem.read_byte(pc.wrapping_add(1))?;
    let x = byte1 & 0x80 != 0;
    let b = byte1 & 0x40 != 0;
    let p = byte1 & 0x20 != 0;
    let e = byte1 & 0x10 != 0;

    let (format, operand) = if e {
        let byte2 = mem.read_byte(pc.wrapping_add(2))?;
        let byte3 = mem.read_byte(pc.wrapping_add(3))?;
        let addr =
            u32::from(byte1 & 0x0F) << 16 | u32::from(byte2) << 8 | u32::from(byte3);
        (Format::Four, addr)
    } else {
        let byte2 = mem.read_byte(pc.wrapping_add(2))?;
        let disp = u32::from(byte1 & 0x0F) << 8 | u32::from(byte2);
        (Format::Three, disp)
    };

    let mode = match (n, i) {
        (false, true) => AddrMode::Immediate,
        (true, false) => AddrMode::Indirect,
        _ => AddrMode::Simple,
    };

    let pc_after = pc.wrapping_add(format.size()) & MASK_24;

    let effective_address = match mode {
        AddrMode::Immediate => {
            // The literal is the effective value. The 12-bit format-3
            // field is signed; the 20-bit format-4 field never is.
            let value = match format {
                Format::Three => sext12(operand) as u32,
                _ => operand,
            };
            value & MASK_24
        }
        AddrMode::Simple | AddrMode::Indirect => {
            let mut base = if p {
                // PC-relative: signed 12-bit displacement from the
                // post-fetch PC.
                let disp = match format {
                    Format::Three => sext12(operand),
                    _ => operand as i32,
                };
                pc_after.wrapping_add(disp as u32)
            } else if b {
                regs.get(Register::B)?.wrapping_add(operand)
            } else {
                operand
            };
            if x {
                base = base.wrapping_add(regs.get(Register::X)?);
            }
            base &= MASK_24;
            if mode == AddrMode::Indirect {
                mem.check_word_aligned(base)?;
                mem.read_word_value(base)? & MASK_24
            } else {
                base
            }
        }
    };

    Ok(Instruction {
        opcode,
        format,
        mode,
        indexed: x,
        r1: 0,
        r2: 0,
        operand,
        effective_address: Some(effective_address),
    })
}

/// Errors that can occur during instruction decoding.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("memory error: {0}")]
    Memory(#[from] MemoryError),

    #[error("register error: {0}")]
    Register(#[from] RegisterError),

    #[error("invalid instruction format {0}")]
    InvalidFormat(u8),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::opcodes::{COMPR, FIX, LDA, STA};

    fn machine() -> (Memory, RegisterFile) {
        (Memory::new(), RegisterFile::new())
    }

    #[test]
    fn format_size_matches_format_number() {
        for (n, format) in [
            (1u8, Format::One),
            (2, Format::Two),
            (3, Format::Three),
            (4, Format::Four),
        ] {
            assert_eq!(Format::try_from(n).unwrap(), format);
            assert_eq!(format.size(), u32::from(n));
        }
        for bad in [0u8, 5, 255] {
            assert!(matches!(
                Format::try_from(bad),
                Err(DecodeError::InvalidFormat(b)) if b == bad
            ));
        }
    }

    #[test]
    fn format1_is_a_single_byte() {
        let (mut mem, regs) = machine();
        mem.write_byte(0, FIX).unwrap();
        let instr = decode(&mem, &regs, 0).unwrap();
        assert_eq!(instr.format, Format::One);
        assert_eq!(instr.opcode, FIX);
        assert_eq!(instr.size(), 1);
        assert_eq!(instr.effective_address, None);
    }

    #[test]
    fn format2_register_operands() {
        let (mut mem, regs) = machine();
        // COMPR A, X
        mem.write_byte(0, COMPR).unwrap();
        mem.write_byte(1, 0x01).unwrap();
        let instr = decode(&mem, &regs, 0).unwrap();
        assert_eq!(instr.format, Format::Two);
        assert_eq!(instr.r1, 0);
        assert_eq!(instr.r2, 1);
    }

    #[test]
    fn pc_relative_uses_post_fetch_pc() {
        let (mut mem, regs) = machine();
        // LDA disp, simple (n=1,i=1), p=1, disp = 0x010, decoded at PC=0.
        mem.load_program(0, &[LDA | 0x03, 0x20, 0x10]).unwrap();
        let instr = decode(&mem, &regs, 0).unwrap();
        assert_eq!(instr.format, Format::Three);
        assert_eq!(instr.effective_address, Some(0x013));
    }

    #[test]
    fn pc_relative_displacement_is_signed() {
        let (mut mem, regs) = machine();
        // disp = 0xFFD = -3: effective address is the instruction itself.
        mem.load_program(0x30, &[LDA | 0x03, 0x2F, 0xFD]).unwrap();
        let instr = decode(&mem, &regs, 0x30).unwrap();
        assert_eq!(instr.effective_address, Some(0x30));
    }

    #[test]
    fn immediate_literal_is_the_effective_value() {
        let (mut mem, regs) = machine();
        // LDA #5
        mem.load_program(0, &[LDA | 0x01, 0x00, 0x05]).unwrap();
        let instr = decode(&mem, &regs, 0).unwrap();
        assert_eq!(instr.mode, AddrMode::Immediate);
        assert_eq!(instr.effective_address, Some(5));
    }

    #[test]
    fn format3_immediate_sign_extends() {
        let (mut mem, regs) = machine();
        // LDA #-1: disp = 0xFFF.
        mem.load_program(0, &[LDA | 0x01, 0x0F, 0xFF]).unwrap();
        let instr = decode(&mem, &regs, 0).unwrap();
        assert_eq!(instr.effective_address, Some(0xFFFFFF));
    }

    #[test]
    fn format4_immediate_never_sign_extends() {
        let (mut mem, regs) = machine();
        // +LDA #0x80000: e=1, 20-bit field with the top bit set.
        mem.load_program(0, &[LDA | 0x01, 0x18, 0x00, 0x00]).unwrap();
        let instr = decode(&mem, &regs, 0).unwrap();
        assert_eq!(instr.format, Format::Four);
        assert_eq!(instr.size(), 4);
        assert_eq!(instr.effective_address, Some(0x080000));
    }

    #[test]
    fn base_relative_and_indexed() {
        let (mut mem, mut regs) = machine();
        regs.set(Register::B, 0x600).unwrap();
        regs.set(Register::X, 0x006).unwrap();
        // LDA disp, b=1, x=1, disp = 0x030.
        mem.load_program(0, &[LDA | 0x03, 0xC0, 0x30]).unwrap();
        let instr = decode(&mem, &regs, 0).unwrap();
        assert!(instr.indexed);
        assert_eq!(instr.effective_address, Some(0x636));
    }

    #[test]
    fn direct_addressing_without_flags() {
        let (mut mem, regs) = machine();
        // STA 0x123, simple, no b/p/x.
        mem.load_program(0, &[STA | 0x03, 0x01, 0x23]).unwrap();
        let instr = decode(&mem, &regs, 0).unwrap();
        assert_eq!(instr.opcode, STA);
        assert_eq!(instr.effective_address, Some(0x123));
    }

    #[test]
    fn indirect_dereferences_one_word() {
        let (mut mem, regs) = machine();
        // LDA @0x033 with the pointer word holding 0x000600.
        mem.load_program(0, &[LDA | 0x02, 0x00, 0x33]).unwrap();
        mem.write_word_value(0x33, 0x000600).unwrap();
        let instr = decode(&mem, &regs, 0).unwrap();
        assert_eq!(instr.mode, AddrMode::Indirect);
        assert_eq!(instr.effective_address, Some(0x600));
    }

    #[test]
    fn indirect_through_misaligned_pointer_fails() {
        let (mut mem, regs) = machine();
        // 0x034 is not a word boundary.
        mem.load_program(0, &[LDA | 0x02, 0x00, 0x34]).unwrap();
        assert!(matches!(
            decode(&mem, &regs, 0),
            Err(DecodeError::Memory(MemoryError::Misaligned { addr: 0x34 }))
        ));
    }

    #[test]
    fn e_bit_selects_format4() {
        let (mut mem, regs) = machine();
        // +STA 0x12345, simple.
        mem.load_program(0, &[STA | 0x03, 0x11, 0x23, 0x45]).unwrap();
        let instr = decode(&mem, &regs, 0).unwrap();
        assert_eq!(instr.format, Format::Four);
        assert_eq!(instr.effective_address, Some(0x12345));
    }

    #[test]
    fn fetch_past_end_of_memory_fails() {
        let (mem, regs) = machine();
        let end = mem.len() as u32;
        assert!(matches!(
            decode(&mem, &regs, end),
            Err(DecodeError::Memory(MemoryError::OutOfBounds { .. }))
        ));
    }
}
