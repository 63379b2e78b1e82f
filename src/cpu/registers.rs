//! SIC/XE register file.
//!
//! Nine named registers: A, X, L, B, S, T (24-bit), F (48-bit), plus
//! PC and SW. Values are stored in a fixed array indexed by a closed
//! [`Register`] enumeration; every write is masked to the register's
//! width, so overflow wraps silently and the stored value is always
//! within `2^width - 1`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Condition code: result was zero / operands compared equal.
pub const CC_EQ: u32 = 0;
/// Condition code: result was negative / left operand compared less.
pub const CC_LT: u32 = 1;
/// Condition code: result was positive / left operand compared greater.
pub const CC_GT: u32 = 2;

/// Mask for the 24-bit registers.
pub const MASK_24: u32 = 0xFF_FFFF;
/// Mask for the 48-bit F register.
pub const MASK_48: u64 = 0xFFFF_FFFF_FFFF;

/// The nine SIC/XE registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Register {
    /// Accumulator.
    A,
    /// Index register.
    X,
    /// Linkage register (subroutine return address).
    L,
    /// Base register (base-relative addressing).
    B,
    /// General working register.
    S,
    /// General working register.
    T,
    /// 48-bit accumulator extension.
    F,
    /// Program counter.
    Pc,
    /// Status word; holds the condition code.
    Sw,
}

impl Register {
    /// All registers, in storage order.
    pub const ALL: [Register; 9] = [
        Register::A,
        Register::X,
        Register::L,
        Register::B,
        Register::S,
        Register::T,
        Register::F,
        Register::Pc,
        Register::Sw,
    ];

    /// Register width in bits: 48 for F, 24 for everything else.
    pub fn width(self) -> u32 {
        match self {
            Register::F => 48,
            _ => 24,
        }
    }

    /// Architectural register number, as encoded in format-2 operands.
    pub fn number(self) -> u8 {
        match self {
            Register::A => 0,
            Register::X => 1,
            Register::L => 2,
            Register::B => 3,
            Register::S => 4,
            Register::T => 5,
            Register::F => 6,
            Register::Pc => 8,
            Register::Sw => 9,
        }
    }

    /// Decode an architectural register number (number 7 is unassigned).
    pub fn from_number(n: u8) -> Result<Register, RegisterError> {
        match n {
            0 => Ok(Register::A),
            1 => Ok(Register::X),
            2 => Ok(Register::L),
            3 => Ok(Register::B),
            4 => Ok(Register::S),
            5 => Ok(Register::T),
            6 => Ok(Register::F),
            8 => Ok(Register::Pc),
            9 => Ok(Register::Sw),
            _ => Err(RegisterError::InvalidNumber(n)),
        }
    }

    /// Register mnemonic.
    pub fn name(self) -> &'static str {
        match self {
            Register::A => "A",
            Register::X => "X",
            Register::L => "L",
            Register::B => "B",
            Register::S => "S",
            Register::T => "T",
            Register::F => "F",
            Register::Pc => "PC",
            Register::Sw => "SW",
        }
    }

    fn index(self) -> usize {
        match self {
            Register::A => 0,
            Register::X => 1,
            Register::L => 2,
            Register::B => 3,
            Register::S => 4,
            Register::T => 5,
            Register::F => 6,
            Register::Pc => 7,
            Register::Sw => 8,
        }
    }

    fn mask(self) -> u64 {
        match self {
            Register::F => MASK_48,
            _ => u64::from(MASK_24),
        }
    }
}

impl std::fmt::Display for Register {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// The SIC/XE register file: fixed storage for the nine registers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterFile {
    values: [u64; 9],
}

impl RegisterFile {
    /// Create a register file with every register zeroed.
    pub fn new() -> Self {
        Self { values: [0; 9] }
    }

    /// Read a 24-bit register. Fails with [`RegisterError::WidthMismatch`]
    /// when applied to F.
    pub fn get(&self, reg: Register) -> Result<u32, RegisterError> {
        if reg.width() != 24 {
            return Err(RegisterError::WidthMismatch { reg, accessor: 24 });
        }
        Ok(self.values[reg.index()] as u32)
    }

    /// Read the 48-bit F register. Fails with [`RegisterError::WidthMismatch`]
    /// for any 24-bit register.
    pub fn get_wide(&self, reg: Register) -> Result<u64, RegisterError> {
        if reg.width() != 48 {
            return Err(RegisterError::WidthMismatch { reg, accessor: 48 });
        }
        Ok(self.values[reg.index()])
    }

    /// Write a 24-bit register, masking the raw value to 24 bits.
    /// Overflow wraps silently; this is never an error for in-width
    /// registers.
    pub fn set(&mut self, reg: Register, raw: u32) -> Result<(), RegisterError> {
        if reg.width() != 24 {
            return Err(RegisterError::WidthMismatch { reg, accessor: 24 });
        }
        self.values[reg.index()] = u64::from(raw) & reg.mask();
        Ok(())
    }

    /// Write the 48-bit F register, masking the raw value to 48 bits.
    pub fn set_wide(&mut self, reg: Register, raw: u64) -> Result<(), RegisterError> {
        if reg.width() != 48 {
            return Err(RegisterError::WidthMismatch { reg, accessor: 48 });
        }
        self.values[reg.index()] = raw & reg.mask();
        Ok(())
    }

    /// Zero a single register.
    pub fn clear(&mut self, reg: Register) {
        self.values[reg.index()] = 0;
    }

    /// Zero every register.
    pub fn clear_all(&mut self) {
        self.values = [0; 9];
    }

    /// Current program counter.
    pub fn pc(&self) -> u32 {
        self.values[Register::Pc.index()] as u32
    }

    /// Set the program counter (masked to 24 bits).
    pub fn set_pc(&mut self, addr: u32) {
        self.values[Register::Pc.index()] = u64::from(addr & MASK_24);
    }

    /// Advance the program counter by an instruction size, returning the
    /// old value.
    pub fn advance_pc(&mut self, size: u32) -> u32 {
        let old = self.pc();
        self.set_pc(old.wrapping_add(size) & MASK_24);
        old
    }

    /// Current condition code (low bits of SW).
    pub fn condition(&self) -> u32 {
        self.values[Register::Sw.index()] as u32
    }

    /// Store a condition code into SW.
    pub fn set_condition(&mut self, cc: u32) {
        self.values[Register::Sw.index()] = u64::from(cc & MASK_24);
    }
}

impl Default for RegisterFile {
    fn default() -> Self {
        Self::new()
    }
}

/// Errors that can occur during register access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RegisterError {
    /// A 24-bit accessor was used on F, or the 48-bit accessor on a
    /// 24-bit register.
    #[error("{accessor}-bit accessor used on {}-bit register {reg}", .reg.width())]
    WidthMismatch { reg: Register, accessor: u32 },

    /// A format-2 operand named a register number that does not exist.
    #[error("invalid register number {0}")]
    InvalidNumber(u8),
}
