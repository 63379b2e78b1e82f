//! # SIC/XE Emulator
//!
//! An emulator of the SIC/XE (Simplified Instructional Computer,
//! Extra Equipment) teaching architecture: 24-bit registers with a
//! 48-bit accumulator extension, byte-addressable memory organized in
//! 3-byte words, four instruction formats, and the full set of
//! addressing modes (immediate, indirect, direct, indexed,
//! base-relative, PC-relative).
//!
//! The crate is the execution core only. Assemblers, linkers, and
//! loaders are external collaborators: they hand the machine a flat
//! byte image and a start address via [`ControlUnit::load_image`], and
//! drive it through [`ControlUnit::step`].

pub mod cpu;

// Re-export commonly used types.
pub use cpu::{
    default_dispatcher, AddrMode, ControlUnit, CpuState, CycleError, DecodeError, Dispatcher,
    ExecError, ExecutionContext, Format, Instruction, Memory, MemoryError, OpcodeExecutor,
    Outcome, Register, RegisterError, RegisterFile, Snapshot, Step, StepError,
};
