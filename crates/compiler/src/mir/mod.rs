//! Mid-level IR in SSA form
//!
//! Functions are ordered basic blocks; every value is defined exactly once,
//! joins are expressed as block parameters, and jumps carry the arguments
//! that feed them. Iteration everywhere follows insertion order so the
//! rendered text is deterministic.
//!
//! Rendering format, one function per paragraph:
//!
//! ```text
//! func main() -> void
//! bb0:
//!   %0 = call print, "Hello, Orizon!"
//!   ret void
//! ```

mod lower;
mod opt;

pub use lower::{LoweringError, lower_module};
pub use opt::optimize;

use std::fmt::Write as _;

/// An SSA value name. Variable-derived names render as `%x`, `%x.1`;
/// temporaries as `%0`, `%1`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Value(pub String);

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "%{}", self.0)
    }
}

/// Instruction and terminator operands: SSA values or immediates.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Value(Value),
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
}

impl std::fmt::Display for Operand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operand::Value(v) => write!(f, "{}", v),
            Operand::Int(i) => write!(f, "{}", i),
            Operand::Float(x) => write!(f, "{}", float_text(*x)),
            Operand::Bool(b) => write!(f, "{}", b),
            Operand::Str(s) => write!(f, "\"{}\"", escape_str(s)),
        }
    }
}

/// Stable float rendering: integral values keep one fractional digit.
pub(crate) fn float_text(x: f64) -> String {
    if x.fract() == 0.0 && x.is_finite() {
        format!("{:.1}", x)
    } else {
        format!("{}", x)
    }
}

pub(crate) fn escape_str(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            _ => out.push(c),
        }
    }
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockId(pub u32);

impl std::fmt::Display for BlockId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "bb{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MirBinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Pow,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    And,
    Or,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
}

impl MirBinOp {
    pub fn mnemonic(self) -> &'static str {
        match self {
            MirBinOp::Add => "add",
            MirBinOp::Sub => "sub",
            MirBinOp::Mul => "mul",
            MirBinOp::Div => "div",
            MirBinOp::Rem => "rem",
            MirBinOp::Pow => "pow",
            MirBinOp::Eq => "cmp.eq",
            MirBinOp::Ne => "cmp.ne",
            MirBinOp::Lt => "cmp.lt",
            MirBinOp::Gt => "cmp.gt",
            MirBinOp::Le => "cmp.le",
            MirBinOp::Ge => "cmp.ge",
            MirBinOp::And => "and",
            MirBinOp::Or => "or",
            MirBinOp::BitAnd => "band",
            MirBinOp::BitOr => "bor",
            MirBinOp::BitXor => "bxor",
            MirBinOp::Shl => "shl",
            MirBinOp::Shr => "shr",
        }
    }

    /// Division and remainder can trap; everything else is pure.
    pub fn can_trap(self) -> bool {
        matches!(self, MirBinOp::Div | MirBinOp::Rem)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MirUnOp {
    Neg,
    Not,
    BitNot,
    Addr,
    Load,
}

impl MirUnOp {
    pub fn mnemonic(self) -> &'static str {
        match self {
            MirUnOp::Neg => "neg",
            MirUnOp::Not => "not",
            MirUnOp::BitNot => "bnot",
            MirUnOp::Addr => "addr",
            MirUnOp::Load => "load",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    ConstInt(i64),
    ConstFloat(f64),
    ConstBool(bool),
    ConstStr(String),
    Copy(Operand),
    Binary {
        op: MirBinOp,
        lhs: Operand,
        rhs: Operand,
    },
    Unary {
        op: MirUnOp,
        operand: Operand,
    },
    Call {
        callee: String,
        args: Vec<Operand>,
    },
    /// Reference to a name the function does not define locally.
    Global(String),
    Member {
        object: Operand,
        field: String,
    },
    Index {
        object: Operand,
        index: Operand,
    },
    Array(Vec<Operand>),
    StructInit {
        name: String,
        fields: Vec<(String, Operand)>,
    },
    Cast {
        value: Operand,
        ty: String,
    },
    TryUnwrap(Operand),
}

impl Op {
    /// Whether removing an unused result would change observable behavior.
    pub fn has_side_effect(&self) -> bool {
        match self {
            Op::Call { .. } => true,
            // Division by a known non-zero constant cannot trap.
            Op::Binary { op, rhs, .. } if op.can_trap() => {
                !matches!(rhs, Operand::Int(n) if *n != 0)
            }
            _ => false,
        }
    }

    pub fn operands(&self) -> Vec<&Operand> {
        match self {
            Op::ConstInt(_)
            | Op::ConstFloat(_)
            | Op::ConstBool(_)
            | Op::ConstStr(_)
            | Op::Global(_) => Vec::new(),
            Op::Copy(o) | Op::Unary { operand: o, .. } | Op::TryUnwrap(o) => vec![o],
            Op::Cast { value, .. } => vec![value],
            Op::Binary { lhs, rhs, .. } => vec![lhs, rhs],
            Op::Member { object, .. } => vec![object],
            Op::Index { object, index } => vec![object, index],
            Op::Call { args, .. } => args.iter().collect(),
            Op::Array(elements) => elements.iter().collect(),
            Op::StructInit { fields, .. } => fields.iter().map(|(_, v)| v).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    pub dst: Value,
    pub op: Op,
}

impl std::fmt::Display for Instruction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} = ", self.dst)?;
        match &self.op {
            Op::ConstInt(v) => write!(f, "const {}", v),
            Op::ConstFloat(v) => write!(f, "const.float {}", float_text(*v)),
            Op::ConstBool(v) => write!(f, "const.bool {}", v),
            Op::ConstStr(s) => write!(f, "const.str \"{}\"", escape_str(s)),
            Op::Copy(o) => write!(f, "copy {}", o),
            Op::Binary { op, lhs, rhs } => write!(f, "{} {}, {}", op.mnemonic(), lhs, rhs),
            Op::Unary { op, operand } => write!(f, "{} {}", op.mnemonic(), operand),
            Op::Call { callee, args } => {
                write!(f, "call {}", callee)?;
                for arg in args {
                    write!(f, ", {}", arg)?;
                }
                Ok(())
            }
            Op::Global(name) => write!(f, "global {}", name),
            Op::Member { object, field } => write!(f, "member {}, {}", object, field),
            Op::Index { object, index } => write!(f, "index {}, {}", object, index),
            Op::Array(elements) => {
                write!(f, "array")?;
                for (i, e) in elements.iter().enumerate() {
                    write!(f, "{}{}", if i == 0 { " " } else { ", " }, e)?;
                }
                Ok(())
            }
            Op::StructInit { name, fields } => {
                write!(f, "struct {}", name)?;
                for (fname, value) in fields {
                    write!(f, ", {}: {}", fname, value)?;
                }
                Ok(())
            }
            Op::Cast { value, ty } => write!(f, "cast {}, {}", value, ty),
            Op::TryUnwrap(o) => write!(f, "try {}", o),
        }
    }
}

/// A jump edge: target block plus the arguments feeding its parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct JumpTarget {
    pub block: BlockId,
    pub args: Vec<Operand>,
}

impl JumpTarget {
    pub fn new(block: BlockId) -> Self {
        JumpTarget {
            block,
            args: Vec::new(),
        }
    }
}

impl std::fmt::Display for JumpTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.block)?;
        if !self.args.is_empty() {
            write!(f, "(")?;
            for (i, a) in self.args.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", a)?;
            }
            write!(f, ")")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Terminator {
    Branch {
        cond: Operand,
        then_target: JumpTarget,
        else_target: JumpTarget,
    },
    Jump(JumpTarget),
    Return(Option<Operand>),
    Unreachable,
}

impl Terminator {
    pub fn targets(&self) -> Vec<&JumpTarget> {
        match self {
            Terminator::Branch {
                then_target,
                else_target,
                ..
            } => vec![then_target, else_target],
            Terminator::Jump(t) => vec![t],
            Terminator::Return(_) | Terminator::Unreachable => Vec::new(),
        }
    }

    pub fn operands(&self) -> Vec<&Operand> {
        let mut out = Vec::new();
        if let Terminator::Branch { cond, .. } = self {
            out.push(cond);
        }
        if let Terminator::Return(Some(v)) = self {
            out.push(v);
        }
        for target in self.targets() {
            out.extend(target.args.iter());
        }
        out
    }
}

impl std::fmt::Display for Terminator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Terminator::Branch {
                cond,
                then_target,
                else_target,
            } => write!(f, "br {}, {}, {}", cond, then_target, else_target),
            Terminator::Jump(t) => write!(f, "jmp {}", t),
            Terminator::Return(Some(v)) => write!(f, "ret {}", v),
            Terminator::Return(None) => write!(f, "ret void"),
            Terminator::Unreachable => write!(f, "unreachable"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BasicBlock {
    pub id: BlockId,
    /// Block parameters standing in for phi nodes.
    pub params: Vec<Value>,
    pub instructions: Vec<Instruction>,
    pub terminator: Terminator,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MirFunction {
    pub name: String,
    pub params: Vec<Value>,
    /// Rendered return type, `void` when absent.
    pub ret: String,
    pub blocks: Vec<BasicBlock>,
    pub entry_block: BlockId,
}

impl MirFunction {
    pub fn block(&self, id: BlockId) -> Option<&BasicBlock> {
        self.blocks.iter().find(|b| b.id == id)
    }
}

impl std::fmt::Display for MirFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "func {}(", self.name)?;
        for (i, p) in self.params.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", p)?;
        }
        writeln!(f, ") -> {}", self.ret)?;
        for block in &self.blocks {
            write!(f, "{}", block.id)?;
            if !block.params.is_empty() {
                write!(f, "(")?;
                for (i, p) in block.params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", p)?;
                }
                write!(f, ")")?;
            }
            writeln!(f, ":")?;
            for inst in &block.instructions {
                writeln!(f, "  {}", inst)?;
            }
            writeln!(f, "  {}", block.terminator)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct MirProgram {
    pub functions: Vec<MirFunction>,
}

impl MirProgram {
    /// Render the whole program as the snapshot text artifact: UTF-8, LF
    /// lines, trailing newline, blank line between functions.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        for (i, func) in self.functions.iter().enumerate() {
            if i > 0 {
                out.push('\n');
            }
            let _ = write!(out, "{}", func);
        }
        out
    }
}

/// Structural SSA check: unique definitions, every use defined, jump
/// arguments matching target parameters.
pub fn verify_function(func: &MirFunction) -> Result<(), String> {
    use std::collections::HashSet;
    let mut defs: HashSet<&str> = HashSet::new();
    for p in &func.params {
        if !defs.insert(&p.0) {
            return Err(format!("{}: duplicate definition {}", func.name, p));
        }
    }
    for block in &func.blocks {
        for p in &block.params {
            if !defs.insert(&p.0) {
                return Err(format!("{}: duplicate definition {}", func.name, p));
            }
        }
        for inst in &block.instructions {
            if !defs.insert(&inst.dst.0) {
                return Err(format!("{}: duplicate definition {}", func.name, inst.dst));
            }
        }
    }

    let check_operand = |op: &Operand| -> Result<(), String> {
        if let Operand::Value(v) = op {
            if !defs.contains(v.0.as_str()) {
                return Err(format!("{}: use of undefined value {}", func.name, v));
            }
        }
        Ok(())
    };

    for block in &func.blocks {
        for inst in &block.instructions {
            for op in inst.op.operands() {
                check_operand(op)?;
            }
        }
        for op in block.terminator.operands() {
            check_operand(op)?;
        }
        for target in block.terminator.targets() {
            let Some(dest) = func.block(target.block) else {
                return Err(format!("{}: jump to unknown block {}", func.name, target.block));
            };
            if dest.params.len() != target.args.len() {
                return Err(format!(
                    "{}: jump to {} passes {} args for {} params",
                    func.name,
                    target.block,
                    target.args.len(),
                    dest.params.len()
                ));
            }
        }
    }
    if func.block(func.entry_block).is_none() {
        return Err(format!("{}: missing entry block", func.name));
    }
    Ok(())
}

pub fn verify_program(program: &MirProgram) -> Result<(), String> {
    for func in &program.functions {
        verify_function(func)?;
    }
    Ok(())
}
