//! Instruction executors.
//!
//! One handler per opcode family, each a pure state transition over the
//! [`ExecutionContext`]. Results are computed in the destination
//! register's native width and written back with masking (silent
//! wraparound); every value-producing executor leaves the condition
//! code in SW as 0 (zero/equal), 1 (negative/less), or 2
//! (positive/greater). Division by zero is fatal and leaves the
//! destination untouched.
//!
//! The float family (ADDF, SUBF, MULF, DIVF, COMPF, FIX, FLOAT)
//! treats F as a masked 48-bit integer rather than a genuine
//! floating-point format; NORM is consequently a no-op.

use crate::cpu::dispatch::{Dispatcher, ExecError, ExecutionContext, OpcodeExecutor, Outcome};
use crate::cpu::opcodes;
use crate::cpu::registers::{Register, CC_EQ, CC_GT, CC_LT, MASK_24, MASK_48};

/// Sign-extend a 24-bit register value.
pub fn sext24(v: u32) -> i32 {
    ((v << 8) as i32) >> 8
}

/// Sign-extend a 48-bit register value.
pub fn sext48(v: u64) -> i64 {
    ((v << 16) as i64) >> 16
}

/// Condition code for a 24-bit result.
fn condition_of(v: u32) -> u32 {
    if v == 0 {
        CC_EQ
    } else if v & 0x80_0000 != 0 {
        CC_LT
    } else {
        CC_GT
    }
}

/// Condition code for a 48-bit result.
fn condition_of_wide(v: u64) -> u32 {
    if v == 0 {
        CC_EQ
    } else if v & 0x8000_0000_0000 != 0 {
        CC_LT
    } else {
        CC_GT
    }
}

/// Condition code for a signed comparison.
fn condition_of_cmp(a: i64, b: i64) -> u32 {
    match a.cmp(&b) {
        std::cmp::Ordering::Equal => CC_EQ,
        std::cmp::Ordering::Less => CC_LT,
        std::cmp::Ordering::Greater => CC_GT,
    }
}

fn register_pair(ctx: &ExecutionContext<'_>) -> Result<(Register, Register), ExecError> {
    let r1 = Register::from_number(ctx.instr.r1)?;
    let r2 = Register::from_number(ctx.instr.r2)?;
    Ok((r1, r2))
}

#[derive(Debug, Clone, Copy)]
enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl ArithOp {
    fn apply(self, a: i64, m: i64) -> Result<i64, ExecError> {
        Ok(match self {
            ArithOp::Add => a.wrapping_add(m),
            ArithOp::Sub => a.wrapping_sub(m),
            ArithOp::Mul => a.wrapping_mul(m),
            ArithOp::Div => {
                if m == 0 {
                    return Err(ExecError::DivisionByZero);
                }
                a.wrapping_div(m)
            }
        })
    }

    fn mnemonic(self) -> &'static str {
        match self {
            ArithOp::Add => "ADD",
            ArithOp::Sub => "SUB",
            ArithOp::Mul => "MUL",
            ArithOp::Div => "DIV",
        }
    }
}

/// ADD/SUB/MUL/DIV: accumulator against a memory (or immediate) word.
struct Arithmetic(ArithOp);

impl OpcodeExecutor for Arithmetic {
    fn mnemonic(&self) -> &'static str {
        self.0.mnemonic()
    }

    fn execute(&self, ctx: &mut ExecutionContext<'_>) -> Result<Outcome, ExecError> {
        let a = sext24(ctx.regs.get(Register::A)?);
        let m = sext24(ctx.operand_word()?);
        let result = self.0.apply(i64::from(a), i64::from(m))? as u32 & MASK_24;
        ctx.regs.set(Register::A, result)?;
        let cc = condition_of(result);
        ctx.regs.set_condition(cc);
        Ok(Outcome::proceed(format!(
            "{:<6} EA={:06X} A={:06X} SW={}",
            self.mnemonic(),
            ctx.ea()?,
            result,
            cc
        )))
    }
}

/// ADDR/SUBR/MULR/DIVR: `r2 <- r2 op r1`.
struct ArithmeticReg(ArithOp);

impl OpcodeExecutor for ArithmeticReg {
    fn mnemonic(&self) -> &'static str {
        match self.0 {
            ArithOp::Add => "ADDR",
            ArithOp::Sub => "SUBR",
            ArithOp::Mul => "MULR",
            ArithOp::Div => "DIVR",
        }
    }

    fn execute(&self, ctx: &mut ExecutionContext<'_>) -> Result<Outcome, ExecError> {
        let (r1, r2) = register_pair(ctx)?;
        let lhs = sext24(ctx.regs.get(r2)?);
        let rhs = sext24(ctx.regs.get(r1)?);
        let result = self.0.apply(i64::from(lhs), i64::from(rhs))? as u32 & MASK_24;
        ctx.regs.set(r2, result)?;
        let cc = condition_of(result);
        ctx.regs.set_condition(cc);
        Ok(Outcome::proceed(format!(
            "{:<6} {},{} {}={:06X} SW={}",
            self.mnemonic(),
            r1,
            r2,
            r2,
            result,
            cc
        )))
    }
}

/// ADDF/SUBF/MULF/DIVF: F against a 48-bit memory operand, as masked
/// integers.
struct FloatArithmetic(ArithOp);

impl OpcodeExecutor for FloatArithmetic {
    fn mnemonic(&self) -> &'static str {
        match self.0 {
            ArithOp::Add => "ADDF",
            ArithOp::Sub => "SUBF",
            ArithOp::Mul => "MULF",
            ArithOp::Div => "DIVF",
        }
    }

    fn execute(&self, ctx: &mut ExecutionContext<'_>) -> Result<Outcome, ExecError> {
        let f = sext48(ctx.regs.get_wide(Register::F)?);
        let m = sext48(ctx.operand_double()?);
        let result = self.0.apply(f, m)? as u64 & MASK_48;
        ctx.regs.set_wide(Register::F, result)?;
        let cc = condition_of_wide(result);
        ctx.regs.set_condition(cc);
        Ok(Outcome::proceed(format!(
            "{:<6} EA={:06X} F={:012X} SW={}",
            self.mnemonic(),
            ctx.ea()?,
            result,
            cc
        )))
    }
}

#[derive(Debug, Clone, Copy)]
enum LogicOp {
    And,
    Or,
}

/// AND/OR: bitwise accumulator against a memory word.
struct Logic(LogicOp);

impl OpcodeExecutor for Logic {
    fn mnemonic(&self) -> &'static str {
        match self.0 {
            LogicOp::And => "AND",
            LogicOp::Or => "OR",
        }
    }

    fn execute(&self, ctx: &mut ExecutionContext<'_>) -> Result<Outcome, ExecError> {
        let a = ctx.regs.get(Register::A)?;
        let m = ctx.operand_word()?;
        let result = match self.0 {
            LogicOp::And => a & m,
            LogicOp::Or => a | m,
        };
        ctx.regs.set(Register::A, result)?;
        let cc = condition_of(result);
        ctx.regs.set_condition(cc);
        Ok(Outcome::proceed(format!(
            "{:<6} EA={:06X} A={:06X} SW={}",
            self.mnemonic(),
            ctx.ea()?,
            result,
            cc
        )))
    }
}

/// COMP: signed compare of A against a memory word.
struct Compare;

impl OpcodeExecutor for Compare {
    fn mnemonic(&self) -> &'static str {
        "COMP"
    }

    fn execute(&self, ctx: &mut ExecutionContext<'_>) -> Result<Outcome, ExecError> {
        let a = sext24(ctx.regs.get(Register::A)?);
        let m = sext24(ctx.operand_word()?);
        let cc = condition_of_cmp(i64::from(a), i64::from(m));
        ctx.regs.set_condition(cc);
        Ok(Outcome::proceed(format!(
            "COMP   EA={:06X} SW={}",
            ctx.ea()?,
            cc
        )))
    }
}

/// COMPF: signed compare of F against a 48-bit operand.
struct CompareFloat;

impl OpcodeExecutor for CompareFloat {
    fn mnemonic(&self) -> &'static str {
        "COMPF"
    }

    fn execute(&self, ctx: &mut ExecutionContext<'_>) -> Result<Outcome, ExecError> {
        let f = sext48(ctx.regs.get_wide(Register::F)?);
        let m = sext48(ctx.operand_double()?);
        let cc = condition_of_cmp(f, m);
        ctx.regs.set_condition(cc);
        Ok(Outcome::proceed(format!(
            "COMPF  EA={:06X} SW={}",
            ctx.ea()?,
            cc
        )))
    }
}

/// COMPR: signed compare of two registers.
struct CompareReg;

impl OpcodeExecutor for CompareReg {
    fn mnemonic(&self) -> &'static str {
        "COMPR"
    }

    fn execute(&self, ctx: &mut ExecutionContext<'_>) -> Result<Outcome, ExecError> {
        let (r1, r2) = register_pair(ctx)?;
        let lhs = sext24(ctx.regs.get(r1)?);
        let rhs = sext24(ctx.regs.get(r2)?);
        let cc = condition_of_cmp(i64::from(lhs), i64::from(rhs));
        ctx.regs.set_condition(cc);
        Ok(Outcome::proceed(format!("COMPR  {},{} SW={}", r1, r2, cc)))
    }
}

/// CLEAR: zero a register.
struct ClearReg;

impl OpcodeExecutor for ClearReg {
    fn mnemonic(&self) -> &'static str {
        "CLEAR"
    }

    fn execute(&self, ctx: &mut ExecutionContext<'_>) -> Result<Outcome, ExecError> {
        let r1 = Register::from_number(ctx.instr.r1)?;
        ctx.regs.clear(r1);
        ctx.regs.set_condition(CC_EQ);
        Ok(Outcome::proceed(format!("CLEAR  {}", r1)))
    }
}

/// SHIFTL (circular) / SHIFTR (arithmetic). The shift count is the
/// second operand field plus one.
struct Shift {
    left: bool,
}

impl OpcodeExecutor for Shift {
    fn mnemonic(&self) -> &'static str {
        if self.left {
            "SHIFTL"
        } else {
            "SHIFTR"
        }
    }

    fn execute(&self, ctx: &mut ExecutionContext<'_>) -> Result<Outcome, ExecError> {
        let r1 = Register::from_number(ctx.instr.r1)?;
        let count = u32::from(ctx.instr.r2) + 1;
        let v = ctx.regs.get(r1)?;
        let result = if self.left {
            ((v << count) | (v >> (24 - count))) & MASK_24
        } else {
            (sext24(v) >> count) as u32 & MASK_24
        };
        ctx.regs.set(r1, result)?;
        let cc = condition_of(result);
        ctx.regs.set_condition(cc);
        Ok(Outcome::proceed(format!(
            "{:<6} {},{} {}={:06X} SW={}",
            self.mnemonic(),
            r1,
            count,
            r1,
            result,
            cc
        )))
    }
}

/// RMO: register-to-register move.
struct MoveReg;

impl OpcodeExecutor for MoveReg {
    fn mnemonic(&self) -> &'static str {
        "RMO"
    }

    fn execute(&self, ctx: &mut ExecutionContext<'_>) -> Result<Outcome, ExecError> {
        let (r1, r2) = register_pair(ctx)?;
        let v = ctx.regs.get(r1)?;
        ctx.regs.set(r2, v)?;
        Ok(Outcome::proceed(format!("RMO    {},{} {}={:06X}", r1, r2, r2, v)))
    }
}

/// TIX: increment X, then compare it to a memory word.
struct Tix;

impl OpcodeExecutor for Tix {
    fn mnemonic(&self) -> &'static str {
        "TIX"
    }

    fn execute(&self, ctx: &mut ExecutionContext<'_>) -> Result<Outcome, ExecError> {
        let x = ctx.regs.get(Register::X)?.wrapping_add(1) & MASK_24;
        ctx.regs.set(Register::X, x)?;
        let m = sext24(ctx.operand_word()?);
        let cc = condition_of_cmp(i64::from(sext24(x)), i64::from(m));
        ctx.regs.set_condition(cc);
        Ok(Outcome::proceed(format!(
            "TIX    EA={:06X} X={:06X} SW={}",
            ctx.ea()?,
            x,
            cc
        )))
    }
}

/// TIXR: increment X, then compare it to a register.
struct TixReg;

impl OpcodeExecutor for TixReg {
    fn mnemonic(&self) -> &'static str {
        "TIXR"
    }

    fn execute(&self, ctx: &mut ExecutionContext<'_>) -> Result<Outcome, ExecError> {
        let r1 = Register::from_number(ctx.instr.r1)?;
        let x = ctx.regs.get(Register::X)?.wrapping_add(1) & MASK_24;
        ctx.regs.set(Register::X, x)?;
        let bound = sext24(ctx.regs.get(r1)?);
        let cc = condition_of_cmp(i64::from(sext24(x)), i64::from(bound));
        ctx.regs.set_condition(cc);
        Ok(Outcome::proceed(format!(
            "TIXR   {} X={:06X} SW={}",
            r1, x, cc
        )))
    }
}

/// Word loads: LDA, LDB, LDL, LDS, LDT, LDX, and LDF (48-bit).
struct Load(Register);

impl OpcodeExecutor for Load {
    fn mnemonic(&self) -> &'static str {
        match self.0 {
            Register::A => "LDA",
            Register::B => "LDB",
            Register::L => "LDL",
            Register::S => "LDS",
            Register::T => "LDT",
            Register::X => "LDX",
            Register::F => "LDF",
            _ => "LD?",
        }
    }

    fn execute(&self, ctx: &mut ExecutionContext<'_>) -> Result<Outcome, ExecError> {
        let (display, cc) = if self.0 == Register::F {
            let v = ctx.operand_double()? & MASK_48;
            ctx.regs.set_wide(Register::F, v)?;
            (format!("F={:012X}", v), condition_of_wide(v))
        } else {
            let v = ctx.operand_word()?;
            ctx.regs.set(self.0, v)?;
            (format!("{}={:06X}", self.0, v), condition_of(v))
        };
        ctx.regs.set_condition(cc);
        Ok(Outcome::proceed(format!(
            "{:<6} EA={:06X} {} SW={}",
            self.mnemonic(),
            ctx.ea()?,
            display,
            cc
        )))
    }
}

/// LDCH: load a byte into the rightmost byte of A.
struct LoadByte;

impl OpcodeExecutor for LoadByte {
    fn mnemonic(&self) -> &'static str {
        "LDCH"
    }

    fn execute(&self, ctx: &mut ExecutionContext<'_>) -> Result<Outcome, ExecError> {
        let byte = ctx.operand_byte()?;
        let a = ctx.regs.get(Register::A)? & 0xFF_FF00 | u32::from(byte);
        ctx.regs.set(Register::A, a)?;
        let cc = condition_of(a);
        ctx.regs.set_condition(cc);
        Ok(Outcome::proceed(format!(
            "LDCH   EA={:06X} A={:06X} SW={}",
            ctx.ea()?,
            a,
            cc
        )))
    }
}

/// Word stores: STA, STB, STL, STS, STT, STX, STSW, and STF (48-bit).
struct Store(Register);

impl OpcodeExecutor for Store {
    fn mnemonic(&self) -> &'static str {
        match self.0 {
            Register::A => "STA",
            Register::B => "STB",
            Register::L => "STL",
            Register::S => "STS",
            Register::T => "STT",
            Register::X => "STX",
            Register::F => "STF",
            Register::Sw => "STSW",
            _ => "ST?",
        }
    }

    fn execute(&self, ctx: &mut ExecutionContext<'_>) -> Result<Outcome, ExecError> {
        let ea = ctx.ea()?;
        let display = if self.0 == Register::F {
            let v = ctx.regs.get_wide(Register::F)?;
            ctx.mem.write_double_word(ea, v)?;
            format!("[{:06X}]={:012X}", ea, v)
        } else {
            let v = ctx.regs.get(self.0)?;
            ctx.mem.write_word_value(ea, v)?;
            format!("[{:06X}]={:06X}", ea, v)
        };
        Ok(Outcome::proceed(format!(
            "{:<6} {}",
            self.mnemonic(),
            display
        )))
    }
}

/// STCH: store the rightmost byte of A.
struct StoreByte;

impl OpcodeExecutor for StoreByte {
    fn mnemonic(&self) -> &'static str {
        "STCH"
    }

    fn execute(&self, ctx: &mut ExecutionContext<'_>) -> Result<Outcome, ExecError> {
        let ea = ctx.ea()?;
        let byte = ctx.regs.get(Register::A)? as u8;
        ctx.mem.write_byte(ea, byte)?;
        Ok(Outcome::proceed(format!("STCH   [{:06X}]={:02X}", ea, byte)))
    }
}

/// J / JEQ / JLT / JGT: jump, optionally conditioned on SW.
struct Jump {
    condition: Option<u32>,
}

impl OpcodeExecutor for Jump {
    fn mnemonic(&self) -> &'static str {
        match self.condition {
            None => "J",
            Some(CC_EQ) => "JEQ",
            Some(CC_LT) => "JLT",
            _ => "JGT",
        }
    }

    fn execute(&self, ctx: &mut ExecutionContext<'_>) -> Result<Outcome, ExecError> {
        let target = ctx.ea()?;
        let taken = match self.condition {
            None => true,
            Some(cc) => ctx.regs.condition() == cc,
        };
        if taken {
            ctx.regs.set_pc(target);
        }
        Ok(Outcome::proceed(format!(
            "{:<6} {:06X} {}",
            self.mnemonic(),
            target,
            if taken { "taken" } else { "not taken" }
        )))
    }
}

/// JSUB: save the post-fetch PC in L, then jump.
struct CallSub;

impl OpcodeExecutor for CallSub {
    fn mnemonic(&self) -> &'static str {
        "JSUB"
    }

    fn execute(&self, ctx: &mut ExecutionContext<'_>) -> Result<Outcome, ExecError> {
        let target = ctx.ea()?;
        let return_addr = ctx.regs.pc();
        ctx.regs.set(Register::L, return_addr)?;
        ctx.regs.set_pc(target);
        Ok(Outcome::proceed(format!(
            "JSUB   {:06X} L={:06X}",
            target, return_addr
        )))
    }
}

/// RSUB: return through L. A return address of 0 is the halt signal:
/// address 0 is the canonical program entry and can never be a
/// legitimate return target.
struct ReturnSub;

impl OpcodeExecutor for ReturnSub {
    fn mnemonic(&self) -> &'static str {
        "RSUB"
    }

    fn execute(&self, ctx: &mut ExecutionContext<'_>) -> Result<Outcome, ExecError> {
        let l = ctx.regs.get(Register::L)?;
        if l == 0 {
            return Ok(Outcome::halt("RSUB   L=000000 halt".into()));
        }
        ctx.regs.set_pc(l);
        Ok(Outcome::proceed(format!("RSUB   -> {:06X}", l)))
    }
}

/// FIX: A takes the integer value of F (masked to 24 bits).
struct FixToInt;

impl OpcodeExecutor for FixToInt {
    fn mnemonic(&self) -> &'static str {
        "FIX"
    }

    fn execute(&self, ctx: &mut ExecutionContext<'_>) -> Result<Outcome, ExecError> {
        let a = ctx.regs.get_wide(Register::F)? as u32 & MASK_24;
        ctx.regs.set(Register::A, a)?;
        let cc = condition_of(a);
        ctx.regs.set_condition(cc);
        Ok(Outcome::proceed(format!("FIX    A={:06X} SW={}", a, cc)))
    }
}

/// FLOAT: F takes A, sign-extended into the 48-bit width.
struct FloatFromInt;

impl OpcodeExecutor for FloatFromInt {
    fn mnemonic(&self) -> &'static str {
        "FLOAT"
    }

    fn execute(&self, ctx: &mut ExecutionContext<'_>) -> Result<Outcome, ExecError> {
        let f = sext24(ctx.regs.get(Register::A)?) as i64 as u64 & MASK_48;
        ctx.regs.set_wide(Register::F, f)?;
        let cc = condition_of_wide(f);
        ctx.regs.set_condition(cc);
        Ok(Outcome::proceed(format!("FLOAT  F={:012X} SW={}", f, cc)))
    }
}

#[derive(Debug, Clone, Copy)]
enum SysKind {
    Lps,
    Ssk,
    Sio,
    Hio,
    Tio,
    Norm,
    Rd,
    Td,
    Wd,
}

/// System pseudo-ops. Peripheral devices are not simulated: TD reports
/// every device as ready, RD delivers a zero byte, the rest trace and
/// do nothing.
struct System(SysKind);

impl OpcodeExecutor for System {
    fn mnemonic(&self) -> &'static str {
        match self.0 {
            SysKind::Lps => "LPS",
            SysKind::Ssk => "SSK",
            SysKind::Sio => "SIO",
            SysKind::Hio => "HIO",
            SysKind::Tio => "TIO",
            SysKind::Norm => "NORM",
            SysKind::Rd => "RD",
            SysKind::Td => "TD",
            SysKind::Wd => "WD",
        }
    }

    fn execute(&self, ctx: &mut ExecutionContext<'_>) -> Result<Outcome, ExecError> {
        match self.0 {
            SysKind::Td => {
                ctx.regs.set_condition(CC_LT);
                Ok(Outcome::proceed(format!(
                    "TD     EA={:06X} ready",
                    ctx.ea()?
                )))
            }
            SysKind::Rd => {
                let a = ctx.regs.get(Register::A)? & 0xFF_FF00;
                ctx.regs.set(Register::A, a)?;
                Ok(Outcome::proceed(format!(
                    "RD     EA={:06X} A={:06X}",
                    ctx.ea()?,
                    a
                )))
            }
            _ => Ok(Outcome::proceed(format!("{:<6} no-op", self.mnemonic()))),
        }
    }
}

/// SVC: supervisor call. With no operating system underneath, any SVC
/// signals program completion.
struct Svc;

impl OpcodeExecutor for Svc {
    fn mnemonic(&self) -> &'static str {
        "SVC"
    }

    fn execute(&self, ctx: &mut ExecutionContext<'_>) -> Result<Outcome, ExecError> {
        Ok(Outcome::halt(format!("SVC    {} halt", ctx.instr.r1)))
    }
}

/// Build the registry covering the full architectural instruction set.
pub fn default_dispatcher() -> Dispatcher {
    let mut d = Dispatcher::new();

    d.register(opcodes::ADD, Box::new(Arithmetic(ArithOp::Add)));
    d.register(opcodes::SUB, Box::new(Arithmetic(ArithOp::Sub)));
    d.register(opcodes::MUL, Box::new(Arithmetic(ArithOp::Mul)));
    d.register(opcodes::DIV, Box::new(Arithmetic(ArithOp::Div)));
    d.register(opcodes::ADDR, Box::new(ArithmeticReg(ArithOp::Add)));
    d.register(opcodes::SUBR, Box::new(ArithmeticReg(ArithOp::Sub)));
    d.register(opcodes::MULR, Box::new(ArithmeticReg(ArithOp::Mul)));
    d.register(opcodes::DIVR, Box::new(ArithmeticReg(ArithOp::Div)));

    d.register(opcodes::ADDF, Box::new(FloatArithmetic(ArithOp::Add)));
    d.register(opcodes::SUBF, Box::new(FloatArithmetic(ArithOp::Sub)));
    d.register(opcodes::MULF, Box::new(FloatArithmetic(ArithOp::Mul)));
    d.register(opcodes::DIVF, Box::new(FloatArithmetic(ArithOp::Div)));
    d.register(opcodes::COMPF, Box::new(CompareFloat));
    d.register(opcodes::FIX, Box::new(FixToInt));
    d.register(opcodes::FLOAT, Box::new(FloatFromInt));

    d.register(opcodes::AND, Box::new(Logic(LogicOp::And)));
    d.register(opcodes::OR, Box::new(Logic(LogicOp::Or)));
    d.register(opcodes::COMP, Box::new(Compare));
    d.register(opcodes::COMPR, Box::new(CompareReg));
    d.register(opcodes::CLEAR, Box::new(ClearReg));
    d.register(opcodes::SHIFTL, Box::new(Shift { left: true }));
    d.register(opcodes::SHIFTR, Box::new(Shift { left: false }));
    d.register(opcodes::RMO, Box::new(MoveReg));
    d.register(opcodes::TIX, Box::new(Tix));
    d.register(opcodes::TIXR, Box::new(TixReg));

    d.register(opcodes::LDA, Box::new(Load(Register::A)));
    d.register(opcodes::LDB, Box::new(Load(Register::B)));
    d.register(opcodes::LDL, Box::new(Load(Register::L)));
    d.register(opcodes::LDS, Box::new(Load(Register::S)));
    d.register(opcodes::LDT, Box::new(Load(Register::T)));
    d.register(opcodes::LDX, Box::new(Load(Register::X)));
    d.register(opcodes::LDF, Box::new(Load(Register::F)));
    d.register(opcodes::LDCH, Box::new(LoadByte));

    d.register(opcodes::STA, Box::new(Store(Register::A)));
    d.register(opcodes::STB, Box::new(Store(Register::B)));
    d.register(opcodes::STL, Box::new(Store(Register::L)));
    d.register(opcodes::STS, Box::new(Store(Register::S)));
    d.register(opcodes::STT, Box::new(Store(Register::T)));
    d.register(opcodes::STX, Box::new(Store(Register::X)));
    d.register(opcodes::STF, Box::new(Store(Register::F)));
    d.register(opcodes::STSW, Box::new(Store(Register::Sw)));
    d.register(opcodes::STCH, Box::new(StoreByte));

    d.register(opcodes::J, Box::new(Jump { condition: None }));
    d.register(opcodes::JEQ, Box::new(Jump { condition: Some(CC_EQ) }));
    d.register(opcodes::JLT, Box::new(Jump { condition: Some(CC_LT) }));
    d.register(opcodes::JGT, Box::new(Jump { condition: Some(CC_GT) }));
    d.register(opcodes::JSUB, Box::new(CallSub));
    d.register(opcodes::RSUB, Box::new(ReturnSub));

    d.register(opcodes::LPS, Box::new(System(SysKind::Lps)));
    d.register(opcodes::SSK, Box::new(System(SysKind::Ssk)));
    d.register(opcodes::SIO, Box::new(System(SysKind::Sio)));
    d.register(opcodes::HIO, Box::new(System(SysKind::Hio)));
    d.register(opcodes::TIO, Box::new(System(SysKind::Tio)));
    d.register(opcodes::NORM, Box::new(System(SysKind::Norm)));
    d.register(opcodes::RD, Box::new(System(SysKind::Rd)));
    d.register(opcodes::TD, Box::new(System(SysKind::Td)));
    d.register(opcodes::WD, Box::new(System(SysKind::Wd)));
    d.register(opcodes::SVC, Box::new(Svc));

    d
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::decode::{AddrMode, Format, Instruction};
    use crate::cpu::memory::Memory;
    use crate::cpu::registers::RegisterFile;

    fn memory_instr(opcode: u8, ea: u32) -> Instruction {
        Instruction {
            opcode,
            format: Format::Three,
            mode: AddrMode::Simple,
            indexed: false,
            r1: 0,
            r2: 0,
            operand: ea,
            effective_address: Some(ea),
        }
    }

    fn reg_instr(opcode: u8, r1: u8, r2: u8) -> Instruction {
        Instruction {
            opcode,
            format: Format::Two,
            mode: AddrMode::Simple,
            indexed: false,
            r1,
            r2,
            operand: 0,
            effective_address: None,
        }
    }

    fn run(
        instr: Instruction,
        regs: &mut RegisterFile,
        mem: &mut Memory,
    ) -> Result<Outcome, ExecError> {
        let dispatcher = default_dispatcher();
        let mut ctx = ExecutionContext { instr, regs, mem };
        dispatcher.dispatch(instr.opcode, &mut ctx)
    }

    #[test]
    fn add_sets_accumulator_and_condition() {
        let mut regs = RegisterFile::new();
        let mut mem = Memory::new();
        regs.set(Register::A, 5).unwrap();
        mem.write_word_value(0x30, 3).unwrap();

        run(memory_instr(opcodes::ADD, 0x30), &mut regs, &mut mem).unwrap();

        assert_eq!(regs.get(Register::A).unwrap(), 8);
        assert_eq!(regs.condition(), CC_GT);
    }

    #[test]
    fn sub_below_zero_wraps_and_reads_negative() {
        let mut regs = RegisterFile::new();
        let mut mem = Memory::new();
        regs.set(Register::A, 2).unwrap();
        mem.write_word_value(0x30, 5).unwrap();

        run(memory_instr(opcodes::SUB, 0x30), &mut regs, &mut mem).unwrap();

        // -3 as a 24-bit value.
        assert_eq!(regs.get(Register::A).unwrap(), 0xFFFFFD);
        assert_eq!(regs.condition(), CC_LT);
    }

    #[test]
    fn division_by_zero_leaves_a_unchanged() {
        let mut regs = RegisterFile::new();
        let mut mem = Memory::new();
        regs.set(Register::A, 42).unwrap();
        mem.write_word_value(0x30, 0).unwrap();

        let err = run(memory_instr(opcodes::DIV, 0x30), &mut regs, &mut mem).unwrap_err();

        assert_eq!(err, ExecError::DivisionByZero);
        assert_eq!(regs.get(Register::A).unwrap(), 42);
    }

    #[test]
    fn signed_division_truncates() {
        let mut regs = RegisterFile::new();
        let mut mem = Memory::new();
        regs.set(Register::A, (-7i32) as u32 & MASK_24).unwrap();
        mem.write_word_value(0x30, 2).unwrap();

        run(memory_instr(opcodes::DIV, 0x30), &mut regs, &mut mem).unwrap();

        assert_eq!(sext24(regs.get(Register::A).unwrap()), -3);
    }

    #[test]
    fn register_arithmetic_targets_r2() {
        let mut regs = RegisterFile::new();
        let mut mem = Memory::new();
        regs.set(Register::S, 10).unwrap();
        regs.set(Register::T, 4).unwrap();

        // ADDR S, T: T <- T + S
        let instr = reg_instr(
            opcodes::ADDR,
            Register::S.number(),
            Register::T.number(),
        );
        run(instr, &mut regs, &mut mem).unwrap();

        assert_eq!(regs.get(Register::T).unwrap(), 14);
        assert_eq!(regs.get(Register::S).unwrap(), 10);
    }

    #[test]
    fn divr_by_zero_is_fatal() {
        let mut regs = RegisterFile::new();
        let mut mem = Memory::new();
        regs.set(Register::T, 9).unwrap();

        let instr = reg_instr(
            opcodes::DIVR,
            Register::S.number(),
            Register::T.number(),
        );
        assert_eq!(
            run(instr, &mut regs, &mut mem).unwrap_err(),
            ExecError::DivisionByZero
        );
        assert_eq!(regs.get(Register::T).unwrap(), 9);
    }

    #[test]
    fn float_family_is_masked_integer_arithmetic() {
        let mut regs = RegisterFile::new();
        let mut mem = Memory::new();
        regs.set_wide(Register::F, 100).unwrap();
        mem.write_double_word(0x30, 28).unwrap();

        run(memory_instr(opcodes::ADDF, 0x30), &mut regs, &mut mem).unwrap();

        assert_eq!(regs.get_wide(Register::F).unwrap(), 128);
        assert_eq!(regs.condition(), CC_GT);
    }

    #[test]
    fn fix_and_float_move_between_a_and_f() {
        let mut regs = RegisterFile::new();
        let mut mem = Memory::new();
        regs.set(Register::A, 0xFFFFFF).unwrap(); // -1

        run(reg_instr(opcodes::FLOAT, 0, 0), &mut regs, &mut mem).unwrap();
        assert_eq!(regs.get_wide(Register::F).unwrap(), MASK_48); // still -1

        run(reg_instr(opcodes::FIX, 0, 0), &mut regs, &mut mem).unwrap();
        assert_eq!(regs.get(Register::A).unwrap(), 0xFFFFFF);
    }

    #[test]
    fn logic_ops() {
        let mut regs = RegisterFile::new();
        let mut mem = Memory::new();
        regs.set(Register::A, 0x0F0F0F).unwrap();
        mem.write_word_value(0x30, 0x00FFF0).unwrap();

        run(memory_instr(opcodes::AND, 0x30), &mut regs, &mut mem).unwrap();
        assert_eq!(regs.get(Register::A).unwrap(), 0x000F00);

        run(memory_instr(opcodes::OR, 0x30), &mut regs, &mut mem).unwrap();
        assert_eq!(regs.get(Register::A).unwrap(), 0x00FFF0);
    }

    #[test]
    fn compare_orders_signed() {
        let mut regs = RegisterFile::new();
        let mut mem = Memory::new();
        // A = -1, memory word = +1: less.
        regs.set(Register::A, 0xFFFFFF).unwrap();
        mem.write_word_value(0x30, 1).unwrap();

        run(memory_instr(opcodes::COMP, 0x30), &mut regs, &mut mem).unwrap();
        assert_eq!(regs.condition(), CC_LT);

        regs.set(Register::A, 1).unwrap();
        run(memory_instr(opcodes::COMP, 0x30), &mut regs, &mut mem).unwrap();
        assert_eq!(regs.condition(), CC_EQ);
    }

    #[test]
    fn clear_zeroes_register() {
        let mut regs = RegisterFile::new();
        let mut mem = Memory::new();
        regs.set(Register::X, 99).unwrap();

        run(
            reg_instr(opcodes::CLEAR, Register::X.number(), 0),
            &mut regs,
            &mut mem,
        )
        .unwrap();

        assert_eq!(regs.get(Register::X).unwrap(), 0);
        assert_eq!(regs.condition(), CC_EQ);
    }

    #[test]
    fn shiftl_is_circular() {
        let mut regs = RegisterFile::new();
        let mut mem = Memory::new();
        regs.set(Register::A, 0x800001).unwrap();

        // SHIFTL A, 1 (count field 0 means shift by 1).
        run(
            reg_instr(opcodes::SHIFTL, Register::A.number(), 0),
            &mut regs,
            &mut mem,
        )
        .unwrap();

        assert_eq!(regs.get(Register::A).unwrap(), 0x000003);
    }

    #[test]
    fn shiftr_is_arithmetic() {
        let mut regs = RegisterFile::new();
        let mut mem = Memory::new();
        regs.set(Register::A, 0x800000).unwrap();

        // SHIFTR A, 4 (count field 3).
        run(
            reg_instr(opcodes::SHIFTR, Register::A.number(), 3),
            &mut regs,
            &mut mem,
        )
        .unwrap();

        assert_eq!(regs.get(Register::A).unwrap(), 0xF80000);
    }

    #[test]
    fn tixr_counts_toward_bound() {
        let mut regs = RegisterFile::new();
        let mut mem = Memory::new();
        regs.set(Register::T, 3).unwrap();

        let instr = reg_instr(opcodes::TIXR, Register::T.number(), 0);
        for expected in [(1, CC_LT), (2, CC_LT), (3, CC_EQ), (4, CC_GT)] {
            run(instr, &mut regs, &mut mem).unwrap();
            assert_eq!(regs.get(Register::X).unwrap(), expected.0);
            assert_eq!(regs.condition(), expected.1);
        }
    }

    #[test]
    fn ldch_replaces_rightmost_byte() {
        let mut regs = RegisterFile::new();
        let mut mem = Memory::new();
        regs.set(Register::A, 0x123456).unwrap();
        mem.write_byte(0x30, 0xAB).unwrap();

        run(memory_instr(opcodes::LDCH, 0x30), &mut regs, &mut mem).unwrap();
        assert_eq!(regs.get(Register::A).unwrap(), 0x1234AB);
    }

    #[test]
    fn stch_stores_rightmost_byte() {
        let mut regs = RegisterFile::new();
        let mut mem = Memory::new();
        regs.set(Register::A, 0x123456).unwrap();

        run(memory_instr(opcodes::STCH, 0x30), &mut regs, &mut mem).unwrap();
        assert_eq!(mem.read_byte(0x30).unwrap(), 0x56);
    }

    #[test]
    fn conditional_jump_consults_sw() {
        let mut regs = RegisterFile::new();
        let mut mem = Memory::new();
        regs.set_pc(0x100);
        regs.set_condition(CC_EQ);

        run(memory_instr(opcodes::JEQ, 0x200), &mut regs, &mut mem).unwrap();
        assert_eq!(regs.pc(), 0x200);

        regs.set_condition(CC_GT);
        run(memory_instr(opcodes::JEQ, 0x300), &mut regs, &mut mem).unwrap();
        assert_eq!(regs.pc(), 0x200); // not taken
    }

    #[test]
    fn jsub_links_and_rsub_returns() {
        let mut regs = RegisterFile::new();
        let mut mem = Memory::new();
        regs.set_pc(0x103); // post-fetch PC of a JSUB at 0x100

        run(memory_instr(opcodes::JSUB, 0x400), &mut regs, &mut mem).unwrap();
        assert_eq!(regs.get(Register::L).unwrap(), 0x103);
        assert_eq!(regs.pc(), 0x400);

        let outcome = run(memory_instr(opcodes::RSUB, 0), &mut regs, &mut mem).unwrap();
        assert!(!outcome.halt);
        assert_eq!(regs.pc(), 0x103);
    }

    #[test]
    fn rsub_with_zero_link_halts() {
        let mut regs = RegisterFile::new();
        let mut mem = Memory::new();

        let outcome = run(memory_instr(opcodes::RSUB, 0), &mut regs, &mut mem).unwrap();
        assert!(outcome.halt);
    }

    #[test]
    fn svc_halts() {
        let mut regs = RegisterFile::new();
        let mut mem = Memory::new();

        let outcome = run(reg_instr(opcodes::SVC, 1, 0), &mut regs, &mut mem).unwrap();
        assert!(outcome.halt);
    }

    #[test]
    fn td_reports_device_ready() {
        let mut regs = RegisterFile::new();
        let mut mem = Memory::new();

        run(memory_instr(opcodes::TD, 0x30), &mut regs, &mut mem).unwrap();
        assert_eq!(regs.condition(), CC_LT);
    }

    #[test]
    fn default_set_covers_every_listed_opcode() {
        let dispatcher = default_dispatcher();
        for opcode in [
            opcodes::ADD,
            opcodes::SUBR,
            opcodes::COMP,
            opcodes::CLEAR,
            opcodes::SHIFTL,
            opcodes::TIXR,
            opcodes::LDA,
            opcodes::STX,
            opcodes::J,
            opcodes::RSUB,
            opcodes::SVC,
            opcodes::TD,
            opcodes::FLOAT,
        ] {
            assert!(dispatcher.supports(opcode), "missing {opcode:#04X}");
        }
    }
}
