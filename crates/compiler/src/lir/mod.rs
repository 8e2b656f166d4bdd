//! Low-level IR, shaped like the target machine but still symbolic
//!
//! Binary operations are two-operand (`dst op= src`), comparisons are
//! explicit `cmp` + conditional jump or `set`, and calls are argument-move
//! sequences followed by the call. Operands are physical registers where the
//! best-effort allocator found one, pseudo stack slots otherwise.

mod select;

pub use select::select_program;

use std::fmt::Write as _;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Reg {
    Rax,
    Rbx,
    Rcx,
    Rdx,
    Rsi,
    Rdi,
    R8,
    R9,
    R10,
    R11,
    R12,
    R13,
    R14,
    R15,
}

impl Reg {
    pub fn name(self) -> &'static str {
        match self {
            Reg::Rax => "rax",
            Reg::Rbx => "rbx",
            Reg::Rcx => "rcx",
            Reg::Rdx => "rdx",
            Reg::Rsi => "rsi",
            Reg::Rdi => "rdi",
            Reg::R8 => "r8",
            Reg::R9 => "r9",
            Reg::R10 => "r10",
            Reg::R11 => "r11",
            Reg::R12 => "r12",
            Reg::R13 => "r13",
            Reg::R14 => "r14",
            Reg::R15 => "r15",
        }
    }

    /// Callee-saved under the Windows-x64 convention.
    pub fn is_callee_saved(self) -> bool {
        matches!(
            self,
            Reg::Rbx | Reg::Rsi | Reg::Rdi | Reg::R12 | Reg::R13 | Reg::R14 | Reg::R15
        )
    }
}

impl std::fmt::Display for Reg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LirOperand {
    Reg(Reg),
    /// Pseudo stack slot assigned by the allocator when registers ran out.
    Slot(u32),
    Imm(i64),
    FImm(f64),
    /// Address of an interned string constant.
    StrLabel(String),
    /// Outgoing stack argument by index (fifth argument onward).
    StackArg(u32),
    /// Named global reference.
    Global(String),
}

impl std::fmt::Display for LirOperand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LirOperand::Reg(r) => write!(f, "{}", r),
            LirOperand::Slot(n) => write!(f, "slot{}", n),
            LirOperand::Imm(v) => write!(f, "{}", v),
            LirOperand::FImm(v) => write!(f, "{}", crate::mir::float_text(*v)),
            LirOperand::StrLabel(l) => write!(f, "{}", l),
            LirOperand::StackArg(i) => write!(f, "arg{}", i),
            LirOperand::Global(name) => write!(f, "[{}]", name),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LirBinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    And,
    Or,
    Xor,
    Shl,
    Shr,
}

impl LirBinOp {
    pub fn mnemonic(self) -> &'static str {
        match self {
            LirBinOp::Add => "add",
            LirBinOp::Sub => "sub",
            LirBinOp::Mul => "imul",
            LirBinOp::Div => "idiv",
            LirBinOp::Rem => "irem",
            LirBinOp::And => "and",
            LirBinOp::Or => "or",
            LirBinOp::Xor => "xor",
            LirBinOp::Shl => "shl",
            LirBinOp::Shr => "sar",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cc {
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
}

impl Cc {
    pub fn suffix(self) -> &'static str {
        match self {
            Cc::Eq => "e",
            Cc::Ne => "ne",
            Cc::Lt => "l",
            Cc::Gt => "g",
            Cc::Le => "le",
            Cc::Ge => "ge",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LirInst {
    Mov { dst: LirOperand, src: LirOperand },
    Lea { dst: LirOperand, label: String },
    Bin { op: LirBinOp, dst: LirOperand, src: LirOperand },
    Neg { dst: LirOperand },
    Not { dst: LirOperand },
    Cmp { lhs: LirOperand, rhs: LirOperand },
    SetCc { cc: Cc, dst: LirOperand },
    Jmp { target: String },
    JmpIf { cc: Cc, target: String },
    Call { callee: String },
    Ret,
    Trap,
}

impl std::fmt::Display for LirInst {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LirInst::Mov { dst, src } => write!(f, "mov {}, {}", dst, src),
            LirInst::Lea { dst, label } => write!(f, "lea {}, {}", dst, label),
            LirInst::Bin { op, dst, src } => write!(f, "{} {}, {}", op.mnemonic(), dst, src),
            LirInst::Neg { dst } => write!(f, "neg {}", dst),
            LirInst::Not { dst } => write!(f, "not {}", dst),
            LirInst::Cmp { lhs, rhs } => write!(f, "cmp {}, {}", lhs, rhs),
            LirInst::SetCc { cc, dst } => write!(f, "set{} {}", cc.suffix(), dst),
            LirInst::Jmp { target } => write!(f, "jmp {}", target),
            LirInst::JmpIf { cc, target } => write!(f, "j{} {}", cc.suffix(), target),
            LirInst::Call { callee } => write!(f, "call {}", callee),
            LirInst::Ret => write!(f, "ret"),
            LirInst::Trap => write!(f, "trap"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LirBlock {
    pub label: String,
    pub instructions: Vec<LirInst>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LirFunction {
    pub name: String,
    pub blocks: Vec<LirBlock>,
    /// Number of pseudo stack slots the allocator spilled to.
    pub spill_slots: u32,
    /// Callee-saved registers the function touches, in save order.
    pub used_callee_saved: Vec<Reg>,
}

impl std::fmt::Display for LirFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "func {}:", self.name)?;
        for block in &self.blocks {
            writeln!(f, "{}:", block.label)?;
            for inst in &block.instructions {
                writeln!(f, "  {}", inst)?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct LirProgram {
    pub functions: Vec<LirFunction>,
    /// Interned string constants in first-use order.
    pub strings: Vec<(String, String)>,
}

impl LirProgram {
    /// Snapshot text artifact: string table first, then functions.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        for (label, value) in &self.strings {
            let _ = writeln!(
                out,
                "string {} = \"{}\"",
                label,
                crate::mir::escape_str(value)
            );
        }
        if !self.strings.is_empty() && !self.functions.is_empty() {
            out.push('\n');
        }
        for (i, func) in self.functions.iter().enumerate() {
            if i > 0 {
                out.push('\n');
            }
            let _ = write!(out, "{}", func);
        }
        out
    }
}
