//! MIR optimization passes
//!
//! Three passes run to a combined fixpoint: constant propagation, dead-code
//! elimination, and basic-block coalescing. Each pass iterates blocks and
//! instructions in insertion order only, so repeated runs produce identical
//! output.
//!
//! DCE removes unused temporaries with no observable side effect; defs that
//! carry a source variable name stay, as do calls and any division whose
//! divisor is not a known non-zero constant.

use super::{
    JumpTarget, MirBinOp, MirFunction, MirProgram, MirUnOp, Op, Operand, Terminator, Value,
};
use std::collections::HashMap;

/// Upper bound on fixpoint iterations; real programs settle in a few.
const MAX_PASS_ITERATIONS: usize = 64;

/// Run the pass pipeline to a fixpoint on every function.
pub fn optimize(program: &mut MirProgram) {
    for func in &mut program.functions {
        optimize_function(func);
    }
}

pub fn optimize_function(func: &mut MirFunction) {
    for _ in 0..MAX_PASS_ITERATIONS {
        let mut changed = false;
        changed |= constant_propagation(func);
        changed |= dead_code_elimination(func);
        changed |= coalesce_blocks(func);
        if !changed {
            return;
        }
    }
}

// ----------------------------------------------------------------------
// Constant propagation
// ----------------------------------------------------------------------

pub fn constant_propagation(func: &mut MirFunction) -> bool {
    let mut changed = false;

    // Collect known constants: const defs and copies of immediates.
    let mut consts: HashMap<String, Operand> = HashMap::new();
    for block in &func.blocks {
        for inst in &block.instructions {
            let imm = match &inst.op {
                Op::ConstInt(v) => Some(Operand::Int(*v)),
                Op::ConstFloat(v) => Some(Operand::Float(*v)),
                Op::ConstBool(v) => Some(Operand::Bool(*v)),
                Op::ConstStr(s) => Some(Operand::Str(s.clone())),
                Op::Copy(o) if !matches!(o, Operand::Value(_)) => Some(o.clone()),
                _ => None,
            };
            if let Some(imm) = imm {
                consts.insert(inst.dst.0.clone(), imm);
            }
        }
    }

    let substitute = |op: &mut Operand, changed: &mut bool| {
        if let Operand::Value(v) = op {
            if let Some(imm) = consts.get(&v.0) {
                *op = imm.clone();
                *changed = true;
            }
        }
    };

    for block in &mut func.blocks {
        for inst in &mut block.instructions {
            match &mut inst.op {
                Op::Copy(o) | Op::Unary { operand: o, .. } | Op::TryUnwrap(o) => {
                    substitute(o, &mut changed)
                }
                Op::Cast { value, .. } => substitute(value, &mut changed),
                Op::Binary { lhs, rhs, .. } => {
                    substitute(lhs, &mut changed);
                    substitute(rhs, &mut changed);
                }
                Op::Member { object, .. } => substitute(object, &mut changed),
                Op::Index { object, index } => {
                    substitute(object, &mut changed);
                    substitute(index, &mut changed);
                }
                Op::Call { args, .. } => {
                    for arg in args {
                        substitute(arg, &mut changed);
                    }
                }
                Op::Array(elements) => {
                    for e in elements {
                        substitute(e, &mut changed);
                    }
                }
                Op::StructInit { fields, .. } => {
                    for (_, v) in fields {
                        substitute(v, &mut changed);
                    }
                }
                Op::ConstInt(_)
                | Op::ConstFloat(_)
                | Op::ConstBool(_)
                | Op::ConstStr(_)
                | Op::Global(_) => {}
            }

            // Fold operations whose operands are now immediate.
            if let Some(folded) = fold(&inst.op) {
                inst.op = folded;
                changed = true;
            }
        }

        let mut folded_branch: Option<Terminator> = None;
        match &mut block.terminator {
            Terminator::Branch {
                cond,
                then_target,
                else_target,
            } => {
                substitute(cond, &mut changed);
                for arg in then_target.args.iter_mut().chain(else_target.args.iter_mut()) {
                    substitute(arg, &mut changed);
                }
                if let Operand::Bool(taken) = cond {
                    let target = if *taken {
                        then_target.clone()
                    } else {
                        else_target.clone()
                    };
                    folded_branch = Some(Terminator::Jump(target));
                }
            }
            Terminator::Jump(target) => {
                for arg in &mut target.args {
                    substitute(arg, &mut changed);
                }
            }
            Terminator::Return(Some(v)) => substitute(v, &mut changed),
            Terminator::Return(None) | Terminator::Unreachable => {}
        }
        if let Some(terminator) = folded_branch {
            block.terminator = terminator;
            changed = true;
        }
    }

    changed
}

/// Fold a single operation over immediate operands, preserving trap
/// semantics: integer division and remainder by zero never fold.
fn fold(op: &Op) -> Option<Op> {
    match op {
        Op::Binary { op, lhs, rhs } => fold_binary(*op, lhs, rhs),
        Op::Unary { op, operand } => fold_unary(*op, operand),
        _ => None,
    }
}

fn fold_binary(op: MirBinOp, lhs: &Operand, rhs: &Operand) -> Option<Op> {
    use MirBinOp::*;
    match (lhs, rhs) {
        (Operand::Int(a), Operand::Int(b)) => {
            let (a, b) = (*a, *b);
            let folded = match op {
                Add => Op::ConstInt(a.wrapping_add(b)),
                Sub => Op::ConstInt(a.wrapping_sub(b)),
                Mul => Op::ConstInt(a.wrapping_mul(b)),
                Div if b != 0 => Op::ConstInt(a.wrapping_div(b)),
                Rem if b != 0 => Op::ConstInt(a.wrapping_rem(b)),
                Div | Rem => return None,
                Pow => {
                    let exp = u32::try_from(b).ok()?;
                    Op::ConstInt(a.wrapping_pow(exp))
                }
                Eq => Op::ConstBool(a == b),
                Ne => Op::ConstBool(a != b),
                Lt => Op::ConstBool(a < b),
                Gt => Op::ConstBool(a > b),
                Le => Op::ConstBool(a <= b),
                Ge => Op::ConstBool(a >= b),
                BitAnd => Op::ConstInt(a & b),
                BitOr => Op::ConstInt(a | b),
                BitXor => Op::ConstInt(a ^ b),
                Shl => Op::ConstInt(a.wrapping_shl(u32::try_from(b).ok()?)),
                Shr => Op::ConstInt(a.wrapping_shr(u32::try_from(b).ok()?)),
                And | Or => return None,
            };
            Some(folded)
        }
        (Operand::Float(a), Operand::Float(b)) => {
            let (a, b) = (*a, *b);
            let folded = match op {
                Add => Op::ConstFloat(a + b),
                Sub => Op::ConstFloat(a - b),
                Mul => Op::ConstFloat(a * b),
                Div => Op::ConstFloat(a / b),
                Eq => Op::ConstBool(a == b),
                Ne => Op::ConstBool(a != b),
                Lt => Op::ConstBool(a < b),
                Gt => Op::ConstBool(a > b),
                Le => Op::ConstBool(a <= b),
                Ge => Op::ConstBool(a >= b),
                _ => return None,
            };
            Some(folded)
        }
        (Operand::Bool(a), Operand::Bool(b)) => {
            let (a, b) = (*a, *b);
            let folded = match op {
                And => Op::ConstBool(a && b),
                Or => Op::ConstBool(a || b),
                Eq => Op::ConstBool(a == b),
                Ne => Op::ConstBool(a != b),
                _ => return None,
            };
            Some(folded)
        }
        _ => None,
    }
}

fn fold_unary(op: MirUnOp, operand: &Operand) -> Option<Op> {
    match (op, operand) {
        (MirUnOp::Neg, Operand::Int(v)) => Some(Op::ConstInt(v.wrapping_neg())),
        (MirUnOp::Neg, Operand::Float(v)) => Some(Op::ConstFloat(-v)),
        (MirUnOp::Not, Operand::Bool(v)) => Some(Op::ConstBool(!v)),
        (MirUnOp::BitNot, Operand::Int(v)) => Some(Op::ConstInt(!v)),
        _ => None,
    }
}

// ----------------------------------------------------------------------
// Dead-code elimination
// ----------------------------------------------------------------------

/// A numbered name is a compiler temporary; named defs stay for diagnostics.
fn is_temp(value: &Value) -> bool {
    !value.0.is_empty() && value.0.bytes().all(|b| b.is_ascii_digit())
}

pub fn dead_code_elimination(func: &mut MirFunction) -> bool {
    let mut changed = false;
    loop {
        let mut uses: HashMap<String, usize> = HashMap::new();
        let mut count = |op: &Operand| {
            if let Operand::Value(v) = op {
                *uses.entry(v.0.clone()).or_insert(0) += 1;
            }
        };
        for block in &func.blocks {
            for inst in &block.instructions {
                for op in inst.op.operands() {
                    count(op);
                }
            }
            for op in block.terminator.operands() {
                count(op);
            }
        }

        let mut removed = false;
        for block in &mut func.blocks {
            let before = block.instructions.len();
            block.instructions.retain(|inst| {
                let dead = is_temp(&inst.dst)
                    && uses.get(&inst.dst.0).copied().unwrap_or(0) == 0
                    && !inst.op.has_side_effect();
                !dead
            });
            if block.instructions.len() != before {
                removed = true;
            }
        }
        if !removed {
            return changed;
        }
        changed = true;
    }
}

// ----------------------------------------------------------------------
// Block coalescing
// ----------------------------------------------------------------------

/// Merge block B into its predecessor A iff B has exactly one predecessor
/// and A ends in an unconditional jump to B.
pub fn coalesce_blocks(func: &mut MirFunction) -> bool {
    let mut changed = false;
    loop {
        let Some((pred_idx, block_idx)) = find_coalesce_pair(func) else {
            return changed;
        };
        changed = true;

        let merged = func.blocks.remove(block_idx);
        let pred_idx = if block_idx < pred_idx { pred_idx - 1 } else { pred_idx };

        // The predecessor's jump arguments replace the merged block's
        // parameters everywhere.
        let Terminator::Jump(target) = &func.blocks[pred_idx].terminator else {
            unreachable!("coalesce candidate predecessor must end in a jump");
        };
        let substitutions: HashMap<String, Operand> = merged
            .params
            .iter()
            .map(|p| p.0.clone())
            .zip(target.args.iter().cloned())
            .collect();
        let mut instructions = merged.instructions;
        let mut terminator = merged.terminator;
        if !substitutions.is_empty() {
            for inst in &mut instructions {
                substitute_op(&mut inst.op, &substitutions);
            }
            substitute_terminator(&mut terminator, &substitutions);
            for block in &mut func.blocks {
                for inst in &mut block.instructions {
                    substitute_op(&mut inst.op, &substitutions);
                }
                substitute_terminator(&mut block.terminator, &substitutions);
            }
        }

        let pred = &mut func.blocks[pred_idx];
        pred.instructions.extend(instructions);
        pred.terminator = terminator;
    }
}

fn find_coalesce_pair(func: &MirFunction) -> Option<(usize, usize)> {
    let mut pred_count: HashMap<u32, usize> = HashMap::new();
    for block in &func.blocks {
        for target in block.terminator.targets() {
            *pred_count.entry(target.block.0).or_insert(0) += 1;
        }
    }
    for (pred_idx, block) in func.blocks.iter().enumerate() {
        let Terminator::Jump(target) = &block.terminator else {
            continue;
        };
        if target.block == block.id || target.block == func.entry_block {
            continue;
        }
        if pred_count.get(&target.block.0).copied().unwrap_or(0) != 1 {
            continue;
        }
        let block_idx = func
            .blocks
            .iter()
            .position(|b| b.id == target.block)
            .expect("verified jump target");
        return Some((pred_idx, block_idx));
    }
    None
}

fn substitute_operand(op: &mut Operand, map: &HashMap<String, Operand>) {
    if let Operand::Value(v) = op {
        if let Some(replacement) = map.get(&v.0) {
            *op = replacement.clone();
        }
    }
}

fn substitute_op(op: &mut Op, map: &HashMap<String, Operand>) {
    match op {
        Op::Copy(o) | Op::Unary { operand: o, .. } | Op::TryUnwrap(o) => {
            substitute_operand(o, map)
        }
        Op::Cast { value, .. } => substitute_operand(value, map),
        Op::Binary { lhs, rhs, .. } => {
            substitute_operand(lhs, map);
            substitute_operand(rhs, map);
        }
        Op::Member { object, .. } => substitute_operand(object, map),
        Op::Index { object, index } => {
            substitute_operand(object, map);
            substitute_operand(index, map);
        }
        Op::Call { args, .. } => {
            for arg in args {
                substitute_operand(arg, map);
            }
        }
        Op::Array(elements) => {
            for e in elements {
                substitute_operand(e, map);
            }
        }
        Op::StructInit { fields, .. } => {
            for (_, v) in fields {
                substitute_operand(v, map);
            }
        }
        Op::ConstInt(_)
        | Op::ConstFloat(_)
        | Op::ConstBool(_)
        | Op::ConstStr(_)
        | Op::Global(_) => {}
    }
}

fn substitute_terminator(terminator: &mut Terminator, map: &HashMap<String, Operand>) {
    match terminator {
        Terminator::Branch {
            cond,
            then_target,
            else_target,
        } => {
            substitute_operand(cond, map);
            substitute_target(then_target, map);
            substitute_target(else_target, map);
        }
        Terminator::Jump(target) => substitute_target(target, map),
        Terminator::Return(Some(v)) => substitute_operand(v, map),
        Terminator::Return(None) | Terminator::Unreachable => {}
    }
}

fn substitute_target(target: &mut JumpTarget, map: &HashMap<String, Operand>) {
    for arg in &mut target.args {
        substitute_operand(arg, map);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::to_core;
    use crate::hir::build_module;
    use crate::mir::{lower_module, verify_program};
    use crate::parser::parse_source;

    fn lower_and_optimize(source: &str) -> MirProgram {
        let (program, errors) = parse_source(source);
        assert!(errors.is_empty(), "parse: {:?}", errors);
        let (hir, errors) = build_module(to_core(program), "test");
        assert!(errors.is_empty(), "hir: {:?}", errors);
        let (mut mir, errors) = lower_module(&hir.modules[0]);
        assert!(errors.is_empty(), "lower: {:?}", errors);
        optimize(&mut mir);
        verify_program(&mir).expect("SSA verification after optimization");
        mir
    }

    #[test]
    fn test_constant_folding() {
        let mir = lower_and_optimize("func f() -> i64 { let x = 1 + 2 * 3; return x; }");
        let text = mir.to_text();
        assert!(text.contains("%x = const 7"), "{}", text);
        assert!(!text.contains("mul"), "{}", text);
    }

    #[test]
    fn test_named_defs_survive_dce() {
        // Top-level variable initializers stay in the artifact.
        let mir = lower_and_optimize("let x = 42;");
        let text = mir.to_text();
        assert!(text.contains("%x = const 42"), "{}", text);
    }

    #[test]
    fn test_unused_temp_removed() {
        let mir = lower_and_optimize("func f(a: i64) -> i64 { a + 1; return a; }");
        let text = mir.to_text();
        assert!(!text.contains("add"), "{}", text);
    }

    #[test]
    fn test_call_never_removed() {
        let mir = lower_and_optimize("func f() { log(); }");
        let text = mir.to_text();
        assert!(text.contains("call log"), "{}", text);
    }

    #[test]
    fn test_division_by_zero_not_folded() {
        let mir = lower_and_optimize("func f() -> i64 { let x = 1 / 0; return x; }");
        let text = mir.to_text();
        assert!(text.contains("div 1, 0"), "{}", text);
    }

    #[test]
    fn test_trapping_division_not_removed() {
        // Result unused, but the divisor is not known non-zero.
        let mir = lower_and_optimize("func f(d: i64) -> i64 { 10 / d; return 1; }");
        let text = mir.to_text();
        assert!(text.contains("div 10, %d"), "{}", text);
    }

    #[test]
    fn test_safe_division_removed() {
        let mir = lower_and_optimize("func f(a: i64) -> i64 { a / 2; return 1; }");
        let text = mir.to_text();
        assert!(!text.contains("div"), "{}", text);
    }

    #[test]
    fn test_branch_folding_and_coalescing() {
        let mir = lower_and_optimize(
            "func f() -> i64 { var x = 0; if true { x = 1; } else { x = 2; } return x; }",
        );
        let func = &mir.functions[0];
        let text = mir.to_text();
        // The conditional branch folds to a jump and the taken block is
        // merged into the entry.
        assert!(
            !matches!(func.blocks[0].terminator, Terminator::Branch { .. }),
            "{}",
            text
        );
        assert!(text.contains("%x.1 = const 1"), "{}", text);
        // The jump into the merge point carries the folded argument.
        assert!(text.contains("(1)"), "{}", text);
    }

    #[test]
    fn test_coalesce_requires_single_predecessor() {
        let mir = lower_and_optimize(
            "func f(c: bool) -> i64 { var x = 1; if c { x = 2; } else { x = 3; } return x; }",
        );
        // Two live predecessors: the merge block must survive with params.
        let func = &mir.functions[0];
        assert!(func.blocks.iter().any(|b| !b.params.is_empty()));
    }

    #[test]
    fn test_pass_idempotence() {
        let source =
            "func f(n: i64) -> i64 { var a = 0; while a < n { a += 1; } if true { a = a + 0; } return a; }";
        let (program, _) = parse_source(source);
        let (hir, _) = build_module(to_core(program), "test");
        let (mut mir, _) = lower_module(&hir.modules[0]);
        optimize(&mut mir);
        let once = mir.to_text();
        optimize(&mut mir);
        let twice = mir.to_text();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_pow_folding() {
        let mir = lower_and_optimize("func f() -> i64 { let x = 2 ** 10; return x; }");
        let text = mir.to_text();
        assert!(text.contains("%x = const 1024"), "{}", text);
    }
}
