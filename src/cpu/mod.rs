//! CPU emulation for the SIC/XE machine.
//!
//! This module implements the complete SIC/XE execution engine:
//! - byte-addressable memory with 3-byte big-endian words
//! - nine fixed-width registers (24-bit, plus the 48-bit F)
//! - the four instruction formats and all addressing modes
//! - an opcode dispatch registry covering the full instruction set
//! - the fetch/decode/execute control unit with trace history

pub mod control;
pub mod decode;
pub mod dispatch;
pub mod execute;
pub mod memory;
pub mod opcodes;
pub mod registers;

pub use control::{ControlUnit, CpuState, CycleError, Snapshot, Step, StepError};
pub use decode::{decode, AddrMode, DecodeError, Format, Instruction};
pub use dispatch::{Dispatcher, ExecError, ExecutionContext, OpcodeExecutor, Outcome};
pub use execute::default_dispatcher;
pub use memory::{Memory, MemoryError};
pub use registers::{Register, RegisterError, RegisterFile};
