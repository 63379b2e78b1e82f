//! Opcode dispatch.
//!
//! A [`Dispatcher`] maps opcodes to [`OpcodeExecutor`] handlers. The
//! default registry (built in [`crate::cpu::execute`]) covers the full
//! architectural set; `register` allows swapping or extending handlers
//! at runtime. Dispatching an opcode with no handler is always an
//! error, never silently ignored.

use crate::cpu::decode::{AddrMode, Instruction};
use crate::cpu::memory::{Memory, MemoryError};
use crate::cpu::registers::{RegisterError, RegisterFile};
use std::collections::HashMap;
use thiserror::Error;

/// Everything an executor may touch during one cycle: the decoded
/// instruction plus shared references to the machine's single register
/// file and memory. Built per cycle, discarded after.
pub struct ExecutionContext<'a> {
    pub instr: Instruction,
    pub regs: &'a mut RegisterFile,
    pub mem: &'a mut Memory,
}

impl ExecutionContext<'_> {
    /// The resolved effective address. Fails for formats 1/2, which
    /// have none.
    pub fn ea(&self) -> Result<u32, ExecError> {
        self.instr
            .effective_address
            .ok_or(ExecError::MissingAddress(self.instr.opcode))
    }

    /// Word operand: the literal itself in immediate mode, otherwise
    /// the memory word at the effective address.
    pub fn operand_word(&self) -> Result<u32, ExecError> {
        let ea = self.ea()?;
        match self.instr.mode {
            AddrMode::Immediate => Ok(ea),
            _ => Ok(self.mem.read_word_value(ea)?),
        }
    }

    /// Byte operand: the low literal byte in immediate mode, otherwise
    /// the memory byte at the effective address.
    pub fn operand_byte(&self) -> Result<u8, ExecError> {
        let ea = self.ea()?;
        match self.instr.mode {
            AddrMode::Immediate => Ok(ea as u8),
            _ => Ok(self.mem.read_byte(ea)?),
        }
    }

    /// 48-bit operand for the float family: the literal in immediate
    /// mode, otherwise two consecutive memory words.
    pub fn operand_double(&self) -> Result<u64, ExecError> {
        let ea = self.ea()?;
        match self.instr.mode {
            AddrMode::Immediate => Ok(u64::from(ea)),
            _ => Ok(self.mem.read_double_word(ea)?),
        }
    }
}

/// Result of one executed instruction: a human-readable trace line and
/// whether the machine should halt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub trace: String,
    pub halt: bool,
}

impl Outcome {
    /// Continue running.
    pub fn proceed(trace: String) -> Self {
        Self { trace, halt: false }
    }

    /// Signal program completion.
    pub fn halt(trace: String) -> Self {
        Self { trace, halt: true }
    }
}

/// A handler for one opcode (or opcode family member): a pure state
/// transition over the execution context.
pub trait OpcodeExecutor {
    /// Mnemonic used in trace lines.
    fn mnemonic(&self) -> &'static str;

    /// Apply the instruction's effect and report it.
    fn execute(&self, ctx: &mut ExecutionContext<'_>) -> Result<Outcome, ExecError>;
}

/// Opcode to executor registry.
pub struct Dispatcher {
    table: HashMap<u8, Box<dyn OpcodeExecutor>>,
}

impl Dispatcher {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            table: HashMap::new(),
        }
    }

    /// Register (or replace) the handler for `opcode`.
    pub fn register(&mut self, opcode: u8, executor: Box<dyn OpcodeExecutor>) {
        self.table.insert(opcode, executor);
    }

    /// True if a handler is registered for `opcode`.
    pub fn supports(&self, opcode: u8) -> bool {
        self.table.contains_key(&opcode)
    }

    /// Number of registered handlers.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// True if no handlers are registered.
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Invoke the handler for `opcode`.
    pub fn dispatch(
        &self,
        opcode: u8,
        ctx: &mut ExecutionContext<'_>,
    ) -> Result<Outcome, ExecError> {
        let executor = self
            .table
            .get(&opcode)
            .ok_or(ExecError::UnsupportedOpcode(opcode))?;
        executor.execute(ctx)
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("registered", &self.table.len())
            .finish()
    }
}

/// Errors that can occur while executing an instruction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecError {
    /// No executor registered for the decoded opcode.
    #[error("unsupported opcode {0:#04X}")]
    UnsupportedOpcode(u8),

    /// Division by zero; the destination register is left unchanged.
    #[error("division by zero")]
    DivisionByZero,

    /// A memory-operand instruction was decoded without an effective
    /// address (format 1/2 encoding of a format-3/4 opcode).
    #[error("opcode {0:#04X} has no effective address")]
    MissingAddress(u8),

    #[error("memory error: {0}")]
    Memory(#[from] MemoryError),

    #[error("register error: {0}")]
    Register(#[from] RegisterError),
}
