//! Windows-x64 diagnostic assembly emitter
//!
//! Produces Intel-syntax text for inspection and golden comparison, not for
//! assembling: `idiv`/`irem` stay in two-operand diagnostic form and `set`
//! writes the full register. Calling convention is Windows-x64: integer
//! arguments in rcx, rdx, r8, r9, floats in xmm0..xmm3, 32 bytes of shadow
//! space reserved for every call (allocated once in the prologue), stack
//! kept 16-byte aligned at call sites.
//!
//! Output is byte-stable: instruction order, label naming, and comment
//! placement depend only on the input program.

use crate::lir::{LirFunction, LirInst, LirOperand, LirProgram, Reg};
use crate::mir::{escape_str, float_text};
use std::fmt::Write as _;

/// Shadow space the Windows-x64 convention requires ahead of each call.
const SHADOW_SPACE: u32 = 32;

/// Emit the whole program, headed by a comment naming the source file.
pub fn emit_program(lir: &LirProgram, source_name: &str) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "; source: {}", source_name);
    let _ = writeln!(out, "; target: windows-x64");
    let _ = writeln!(out, "; syntax: intel (diagnostic)");
    out.push('\n');

    if !lir.strings.is_empty() {
        let _ = writeln!(out, ".data");
        for (label, value) in &lir.strings {
            let _ = writeln!(out, "{}: .asciz \"{}\"", label, escape_str(value));
        }
        out.push('\n');
    }

    let _ = writeln!(out, ".text");
    for func in &lir.functions {
        out.push('\n');
        emit_function(&mut out, func);
    }
    out
}

fn emit_function(out: &mut String, func: &LirFunction) {
    let frame = frame_size(func);
    let _ = writeln!(out, "; function {}", func.name);
    let _ = writeln!(out, "{}:", label_of(&func.name));
    // Prologue: frame pointer, callee-saved registers, one frame
    // allocation covering spills and call shadow space.
    let _ = writeln!(out, "  push rbp");
    let _ = writeln!(out, "  mov rbp, rsp");
    for reg in &func.used_callee_saved {
        let _ = writeln!(out, "  push {}", reg);
    }
    let _ = writeln!(out, "  sub rsp, {}", frame);

    for block in &func.blocks {
        let _ = writeln!(out, "{}:", block.label);
        for inst in &block.instructions {
            emit_instruction(out, func, frame, inst);
        }
    }
}

fn emit_instruction(out: &mut String, func: &LirFunction, frame: u32, inst: &LirInst) {
    match inst {
        LirInst::Mov { dst, src } => {
            let _ = writeln!(
                out,
                "  mov {}, {}",
                operand(func, dst, Position::Dst),
                operand(func, src, Position::Src)
            );
        }
        LirInst::Lea { dst, label } => {
            let _ = writeln!(
                out,
                "  lea {}, [rip + {}]",
                operand(func, dst, Position::Dst),
                label
            );
        }
        LirInst::Bin { op, dst, src } => {
            let _ = writeln!(
                out,
                "  {} {}, {}",
                op.mnemonic(),
                operand(func, dst, Position::Dst),
                operand(func, src, Position::Src)
            );
        }
        LirInst::Neg { dst } => {
            let _ = writeln!(out, "  neg {}", operand(func, dst, Position::Dst));
        }
        LirInst::Not { dst } => {
            let _ = writeln!(out, "  not {}", operand(func, dst, Position::Dst));
        }
        LirInst::Cmp { lhs, rhs } => {
            let _ = writeln!(
                out,
                "  cmp {}, {}",
                operand(func, lhs, Position::Src),
                operand(func, rhs, Position::Src)
            );
        }
        LirInst::SetCc { cc, dst } => {
            let _ = writeln!(
                out,
                "  set{} {}",
                cc.suffix(),
                operand(func, dst, Position::Dst)
            );
        }
        LirInst::Jmp { target } => {
            let _ = writeln!(out, "  jmp {}", target);
        }
        LirInst::JmpIf { cc, target } => {
            let _ = writeln!(out, "  j{} {}", cc.suffix(), target);
        }
        LirInst::Call { callee } => {
            let _ = writeln!(out, "  call {} ; shadow space in frame", label_of(callee));
        }
        LirInst::Ret => {
            // Epilogue restores in reverse order of the prologue.
            let _ = writeln!(out, "  add rsp, {}", frame);
            for reg in func.used_callee_saved.iter().rev() {
                let _ = writeln!(out, "  pop {}", reg);
            }
            let _ = writeln!(out, "  pop rbp");
            let _ = writeln!(out, "  ret");
        }
        LirInst::Trap => {
            let _ = writeln!(out, "  ud2");
        }
    }
}

#[derive(Clone, Copy, PartialEq)]
enum Position {
    Dst,
    Src,
}

fn operand(func: &LirFunction, op: &LirOperand, position: Position) -> String {
    match op {
        LirOperand::Reg(r) => r.name().to_string(),
        LirOperand::Imm(v) => v.to_string(),
        LirOperand::FImm(v) => float_text(*v),
        LirOperand::StrLabel(l) => l.clone(),
        LirOperand::Global(name) => format!("qword ptr [rip + {}]", name),
        // Spill slots live below the saved callee registers.
        LirOperand::Slot(n) => {
            let offset = 8 * (func.used_callee_saved.len() as u32 + n + 1);
            format!("qword ptr [rbp - {}]", offset)
        }
        LirOperand::StackArg(i) => match position {
            // Outgoing: above the shadow space at the bottom of the frame.
            Position::Dst => format!("qword ptr [rsp + {}]", 8 * i),
            // Incoming: above the saved rbp and return address.
            Position::Src => format!("qword ptr [rbp + {}]", 16 + 8 * i),
        },
    }
}

/// Frame bytes: spill area plus call shadow space, padded so the stack
/// stays 16-byte aligned at call sites.
fn frame_size(func: &LirFunction) -> u32 {
    let spill_bytes = 8 * func.spill_slots;
    let raw = spill_bytes + SHADOW_SPACE;
    let pushed = 8 * (func.used_callee_saved.len() as u32);
    // After `push rbp` the stack is 16-aligned; keep (pushed + frame)
    // a multiple of 16.
    let mut frame = raw;
    if (pushed + frame) % 16 != 0 {
        frame += 16 - (pushed + frame) % 16;
    }
    frame
}

/// Assembly labels allow dots; everything else unusual becomes `_`.
fn label_of(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '_' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::to_core;
    use crate::hir::build_module;
    use crate::lir::select_program;
    use crate::mir::{lower_module, optimize};
    use crate::parser::parse_source;

    fn emit(source: &str) -> String {
        let (program, errors) = parse_source(source);
        assert!(errors.is_empty(), "parse: {:?}", errors);
        let (hir, errors) = build_module(to_core(program), "test");
        assert!(errors.is_empty(), "hir: {:?}", errors);
        let (mut mir, errors) = lower_module(&hir.modules[0]);
        assert!(errors.is_empty(), "lower: {:?}", errors);
        optimize(&mut mir);
        emit_program(&select_program(&mir), "test.oriz")
    }

    #[test]
    fn test_header_names_source() {
        let asm = emit("func main() { }");
        assert!(asm.starts_with("; source: test.oriz\n"), "{}", asm);
        assert!(asm.contains("; target: windows-x64"), "{}", asm);
    }

    #[test]
    fn test_prologue_epilogue_order() {
        let asm = emit("func f(a: i64) -> i64 { return a; }");
        let push_rbp = asm.find("push rbp").unwrap();
        let push_rbx = asm.find("push rbx").unwrap();
        let sub_rsp = asm.find("sub rsp").unwrap();
        let add_rsp = asm.find("add rsp").unwrap();
        let pop_rbx = asm.find("pop rbx").unwrap();
        let pop_rbp = asm.find("pop rbp").unwrap();
        let ret = asm.rfind("ret").unwrap();
        assert!(push_rbp < push_rbx && push_rbx < sub_rsp, "{}", asm);
        assert!(add_rsp < pop_rbx && pop_rbx < pop_rbp && pop_rbp < ret, "{}", asm);
    }

    #[test]
    fn test_frame_alignment() {
        // One callee-saved push (8 bytes) forces frame padding to keep
        // 16-byte alignment.
        let asm = emit("func f(a: i64) -> i64 { return a; }");
        let line = asm
            .lines()
            .find(|l| l.trim_start().starts_with("sub rsp, "))
            .unwrap();
        let frame: u32 = line.trim_start()["sub rsp, ".len()..].parse().unwrap();
        assert_eq!((8 + frame) % 16, 0, "{}", asm);
        assert!(frame >= 32, "shadow space must fit in the frame: {}", asm);
    }

    #[test]
    fn test_string_data_and_rip_lea() {
        let asm = emit(r#"func main() { print("hi"); }"#);
        assert!(asm.contains(".data"), "{}", asm);
        assert!(asm.contains("str0: .asciz \"hi\""), "{}", asm);
        assert!(asm.contains("lea rcx, [rip + str0]"), "{}", asm);
        assert!(asm.contains("call print ; shadow space in frame"), "{}", asm);
    }

    #[test]
    fn test_deterministic_output() {
        let source = "func f(n: i64) -> i64 { var a = 0; while a < n { a += 1; } return a; }";
        assert_eq!(emit(source), emit(source));
    }

    #[test]
    fn test_throw_emits_ud2() {
        let asm = emit("func f() { throw 1; }");
        assert!(asm.contains("ud2"), "{}", asm);
    }

    #[test]
    fn test_trailing_newline_and_lf() {
        let asm = emit("func main() { }");
        assert!(asm.ends_with('\n'));
        assert!(!asm.contains('\r'));
    }
}
