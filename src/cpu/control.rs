//! Control unit: the fetch → decode → advance-PC → dispatch → log cycle.
//!
//! The control unit owns the machine's single register file, memory,
//! and dispatcher. It is the sole error-recovery boundary: any failure
//! raised during a cycle is tagged with the PC at which it occurred and
//! returned to the caller as a [`StepError`]. The machine is never
//! auto-reset on error; retry, reset, or abort is the caller's policy.
//!
//! The core is a strictly sequential automaton with no internal
//! synchronization; callers driving it from several threads must
//! serialize access themselves.

use crate::cpu::decode::{decode, DecodeError};
use crate::cpu::dispatch::{Dispatcher, ExecError, ExecutionContext};
use crate::cpu::execute::default_dispatcher;
use crate::cpu::memory::{Memory, MemoryError};
use crate::cpu::registers::RegisterFile;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Execution state of the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CpuState {
    Running,
    Halted,
}

/// Result of a successful [`ControlUnit::step`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// One instruction completed; its trace line was appended to the
    /// history.
    Executed,
    /// The machine was already halted; nothing happened.
    AlreadyHalted,
}

/// The SIC/XE machine: registers, memory, dispatcher, and cycle state.
pub struct ControlUnit {
    regs: RegisterFile,
    mem: Memory,
    dispatcher: Dispatcher,
    state: CpuState,
    cycles: u64,
    history: Vec<String>,
}

impl ControlUnit {
    /// Create a machine with the full default instruction set and
    /// 32 KiB of memory.
    pub fn new() -> Self {
        Self::with_dispatcher(default_dispatcher())
    }

    /// Create a machine with a caller-provided opcode registry.
    pub fn with_dispatcher(dispatcher: Dispatcher) -> Self {
        Self {
            regs: RegisterFile::new(),
            mem: Memory::new(),
            dispatcher,
            state: CpuState::Running,
            cycles: 0,
            history: Vec::new(),
        }
    }

    /// Copy a loader-produced flat image into memory and point PC at
    /// its start address.
    pub fn load_image(&mut self, start: u32, image: &[u8]) -> Result<(), MemoryError> {
        self.mem.load_program(start, image)?;
        self.regs.set_pc(start);
        Ok(())
    }

    /// Execute exactly one instruction.
    ///
    /// A no-op when the machine is halted. PC is advanced by the
    /// decoded instruction's size before dispatch, so PC-relative
    /// addressing and subroutine linkage see the post-fetch value.
    pub fn step(&mut self) -> Result<Step, StepError> {
        if self.state == CpuState::Halted {
            return Ok(Step::AlreadyHalted);
        }

        let pc = self.regs.pc();

        let instr = decode(&self.mem, &self.regs, pc)
            .map_err(|e| StepError::at(pc, e))?;
        self.regs.advance_pc(instr.size());

        let mut ctx = ExecutionContext {
            instr,
            regs: &mut self.regs,
            mem: &mut self.mem,
        };
        let outcome = self
            .dispatcher
            .dispatch(instr.opcode, &mut ctx)
            .map_err(|e| StepError::at(pc, e))?;

        self.history.push(format!("{:06X}  {}", pc, outcome.trace));
        self.cycles += 1;
        if outcome.halt {
            self.state = CpuState::Halted;
        }
        Ok(Step::Executed)
    }

    /// Step until the machine halts or `max_cycles` instructions have
    /// executed. Returns the number of instructions executed.
    ///
    /// The budget is the caller's guard against non-terminating
    /// programs; reaching it is not an error.
    pub fn run_until_halted(&mut self, max_cycles: u64) -> Result<u64, StepError> {
        let mut executed = 0;
        while executed < max_cycles && self.state == CpuState::Running {
            match self.step()? {
                Step::Executed => executed += 1,
                Step::AlreadyHalted => break,
            }
        }
        Ok(executed)
    }

    /// Restore the initial state: running, PC 0, registers, memory,
    /// history, and cycle count cleared. Idempotent.
    pub fn reset(&mut self) {
        self.regs.clear_all();
        self.mem.reset();
        self.state = CpuState::Running;
        self.cycles = 0;
        self.history.clear();
    }

    /// Read-only register view, for display.
    pub fn registers(&self) -> &RegisterFile {
        &self.regs
    }

    /// Mutable register access, for loaders and test harnesses.
    pub fn registers_mut(&mut self) -> &mut RegisterFile {
        &mut self.regs
    }

    /// Read-only memory view, for display.
    pub fn memory(&self) -> &Memory {
        &self.mem
    }

    /// Mutable memory access, for loaders and test harnesses.
    pub fn memory_mut(&mut self) -> &mut Memory {
        &mut self.mem
    }

    /// The opcode registry, for runtime handler registration.
    pub fn dispatcher_mut(&mut self) -> &mut Dispatcher {
        &mut self.dispatcher
    }

    pub fn state(&self) -> CpuState {
        self.state
    }

    pub fn is_halted(&self) -> bool {
        self.state == CpuState::Halted
    }

    /// Instructions executed since construction or the last reset.
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Ordered trace lines, one per executed instruction.
    pub fn execution_history(&self) -> &[String] {
        &self.history
    }

    /// The most recent trace line, if any instruction has executed.
    pub fn last_log(&self) -> Option<&str> {
        self.history.last().map(String::as_str)
    }

    /// Capture the full machine state (minus the dispatcher).
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            registers: self.regs.clone(),
            memory: self.mem.clone(),
            state: self.state,
            cycles: self.cycles,
            history: self.history.clone(),
        }
    }

    /// Restore a previously captured machine state. The dispatcher is
    /// untouched.
    pub fn restore(&mut self, snapshot: Snapshot) {
        self.regs = snapshot.registers;
        self.mem = snapshot.memory;
        self.state = snapshot.state;
        self.cycles = snapshot.cycles;
        self.history = snapshot.history;
    }
}

impl Default for ControlUnit {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ControlUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControlUnit")
            .field("state", &self.state)
            .field("pc", &self.regs.pc())
            .field("cycles", &self.cycles)
            .finish()
    }
}

/// Serializable machine state for save/restore.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub registers: RegisterFile,
    pub memory: Memory,
    pub state: CpuState,
    pub cycles: u64,
    pub history: Vec<String>,
}

/// Any failure raised during one fetch/decode/execute cycle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CycleError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Exec(#[from] ExecError),
}

/// A cycle failure tagged with the PC at which it occurred.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cycle failed at PC={pc:#08X}: {source}")]
pub struct StepError {
    pub pc: u32,
    #[source]
    pub source: CycleError,
}

impl StepError {
    fn at(pc: u32, source: impl Into<CycleError>) -> Self {
        Self {
            pc,
            source: source.into(),
        }
    }
}
