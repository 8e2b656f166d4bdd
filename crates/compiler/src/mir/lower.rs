//! HIR to MIR lowering
//!
//! Each function gets its own virtual-register namespace. Variable
//! definitions take variable-derived SSA names (`%x`, `%x.1`); temporaries
//! are numbered. Control constructs produce explicit blocks; joins receive
//! block parameters for exactly the variables whose values differ across
//! predecessors, and the incoming jumps carry the matching arguments.
//!
//! Lowering failures are fatal for the affected function only.

use super::{
    BasicBlock, BlockId, Instruction, JumpTarget, MirBinOp, MirFunction, MirProgram, MirUnOp,
    Op, Operand, Terminator, Value,
};
use crate::ast::{
    BinaryOp, Block, Expression, Ident, LiteralValue, Statement, UnaryOp, Variable,
};
use crate::hir::{HirDecl, HirModule, HirVariable};
use orizon_core::span::Span;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, PartialEq)]
pub struct LoweringError {
    pub message: String,
    pub span: Span,
}

impl std::fmt::Display for LoweringError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{}: {}",
            self.span.start.line, self.span.start.column, self.message
        )
    }
}

impl std::error::Error for LoweringError {}

/// Synthetic function that runs the module's top-level initializers.
const MODULE_INIT: &str = "module_init";

/// Lower every function in a module. Functions that fail to lower are
/// skipped and reported; the rest of the module still lowers.
pub fn lower_module(module: &HirModule) -> (MirProgram, Vec<LoweringError>) {
    let mut program = MirProgram::default();
    let mut errors = Vec::new();

    // Top-level variables become the module initializer, emitted first so
    // output order matches declaration order.
    let top_level: Vec<&HirVariable> = module
        .declarations
        .iter()
        .filter_map(|d| match d {
            HirDecl::Variable(v) => Some(v),
            _ => None,
        })
        .collect();
    if !top_level.is_empty() {
        let statements: Vec<Statement> = top_level
            .iter()
            .map(|v| {
                Statement::VariableDecl(Variable {
                    kind: v.kind,
                    name: Ident::new(v.name.clone(), v.span),
                    ty: v.ty.clone(),
                    initializer: v.initializer.clone(),
                    is_public: false,
                    span: v.span,
                })
            })
            .collect();
        match Lowerer::new(MODULE_INIT, &[], "void").lower(&statements) {
            Ok(func) => program.functions.push(func),
            Err(err) => errors.push(err),
        }
    }

    for decl in &module.declarations {
        if let HirDecl::Function(f) = decl {
            let params: Vec<String> = f.params.iter().map(|p| p.name.name.clone()).collect();
            let ret = f
                .return_type
                .as_ref()
                .map(|t| t.to_string())
                .unwrap_or_else(|| "void".to_string());
            match Lowerer::new(&f.name, &params, &ret).lower(&f.body.statements) {
                Ok(func) => program.functions.push(func),
                Err(err) => errors.push(err),
            }
        }
    }

    for imp in &module.impls {
        for method in &imp.methods {
            let name = format!("{}.{}", imp.target_type, method.name);
            let params: Vec<String> =
                method.params.iter().map(|p| p.name.name.clone()).collect();
            let ret = method
                .return_type
                .as_ref()
                .map(|t| t.to_string())
                .unwrap_or_else(|| "void".to_string());
            match Lowerer::new(&name, &params, &ret).lower(&method.body.statements) {
                Ok(func) => program.functions.push(func),
                Err(err) => errors.push(err),
            }
        }
    }

    (program, errors)
}

/// Variable environment with deterministic iteration order.
#[derive(Debug, Clone, Default)]
struct Env {
    order: Vec<String>,
    map: HashMap<String, Operand>,
}

impl Env {
    fn get(&self, name: &str) -> Option<&Operand> {
        self.map.get(name)
    }

    fn insert(&mut self, name: &str, value: Operand) {
        if !self.map.contains_key(name) {
            self.order.push(name.to_string());
        }
        self.map.insert(name.to_string(), value);
    }

    fn names(&self) -> &[String] {
        &self.order
    }

    /// Drop every binding not present in `keep`, preserving order.
    fn restrict(&mut self, keep: &[String]) {
        let keep: HashSet<&String> = keep.iter().collect();
        self.order.retain(|n| keep.contains(n));
        self.map.retain(|n, _| keep.contains(n));
    }
}

struct BlockBuilder {
    id: BlockId,
    params: Vec<Value>,
    instructions: Vec<Instruction>,
    terminator: Option<Terminator>,
}

struct LoopCtx {
    header: BlockId,
    exit: BlockId,
    /// Variables carried through the loop header, in parameter order.
    vars: Vec<String>,
}

struct Lowerer {
    name: String,
    param_values: Vec<Value>,
    ret: String,
    blocks: Vec<BlockBuilder>,
    current: usize,
    env: Env,
    name_counts: HashMap<String, u32>,
    temp_counter: u32,
    loops: Vec<LoopCtx>,
}

impl Lowerer {
    fn new(name: &str, params: &[String], ret: &str) -> Self {
        let mut lowerer = Lowerer {
            name: name.to_string(),
            param_values: Vec::new(),
            ret: ret.to_string(),
            blocks: Vec::new(),
            current: 0,
            env: Env::default(),
            name_counts: HashMap::new(),
            temp_counter: 0,
            loops: Vec::new(),
        };
        for param in params {
            let value = lowerer.fresh_var(param);
            lowerer.env.insert(param, Operand::Value(value.clone()));
            lowerer.param_values.push(value);
        }
        let entry = lowerer.new_block(Vec::new());
        lowerer.switch_to(entry);
        lowerer
    }

    fn lower(mut self, statements: &[Statement]) -> Result<MirFunction, LoweringError> {
        self.lower_statements(statements)?;
        let blocks = self
            .blocks
            .into_iter()
            .map(|b| BasicBlock {
                id: b.id,
                params: b.params,
                instructions: b.instructions,
                terminator: b.terminator.unwrap_or(Terminator::Return(None)),
            })
            .collect();
        Ok(MirFunction {
            name: self.name,
            params: self.param_values,
            ret: self.ret,
            blocks,
            entry_block: BlockId(0),
        })
    }

    // ------------------------------------------------------------------
    // Block plumbing
    // ------------------------------------------------------------------

    fn new_block(&mut self, params: Vec<Value>) -> BlockId {
        let id = BlockId(self.blocks.len() as u32);
        self.blocks.push(BlockBuilder {
            id,
            params,
            instructions: Vec::new(),
            terminator: None,
        });
        id
    }

    fn switch_to(&mut self, id: BlockId) {
        self.current = id.0 as usize;
    }

    fn current_terminated(&self) -> bool {
        self.blocks[self.current].terminator.is_some()
    }

    fn terminate(&mut self, terminator: Terminator) {
        let block = &mut self.blocks[self.current];
        if block.terminator.is_none() {
            block.terminator = Some(terminator);
        }
    }

    fn terminate_block(&mut self, id: BlockId, terminator: Terminator) {
        let block = &mut self.blocks[id.0 as usize];
        if block.terminator.is_none() {
            block.terminator = Some(terminator);
        }
    }

    fn fresh_var(&mut self, name: &str) -> Value {
        let count = self.name_counts.entry(name.to_string()).or_insert(0);
        let value = if *count == 0 {
            Value(name.to_string())
        } else {
            Value(format!("{}.{}", name, count))
        };
        *count += 1;
        value
    }

    fn fresh_temp(&mut self) -> Value {
        let value = Value(self.temp_counter.to_string());
        self.temp_counter += 1;
        value
    }

    fn emit_into(&mut self, dst: Value, op: Op) -> Operand {
        self.blocks[self.current].instructions.push(Instruction {
            dst: dst.clone(),
            op,
        });
        Operand::Value(dst)
    }

    fn emit(&mut self, hint: Option<String>, op: Op) -> Operand {
        let dst = match hint {
            Some(name) => self.fresh_var(&name),
            None => self.fresh_temp(),
        };
        self.emit_into(dst, op)
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    fn lower_statements(&mut self, statements: &[Statement]) -> Result<(), LoweringError> {
        for stmt in statements {
            if self.current_terminated() {
                // Code after return/break is unreachable but still lowers
                // into a fresh block so its uses stay well-formed.
                let dead = self.new_block(Vec::new());
                self.switch_to(dead);
            }
            self.lower_statement(stmt)?;
        }
        Ok(())
    }

    fn lower_statement(&mut self, stmt: &Statement) -> Result<(), LoweringError> {
        match stmt {
            Statement::VariableDecl(v) => {
                let value = match &v.initializer {
                    Some(init) => self.lower_expr(init, Some(v.name.name.clone()))?,
                    None => self.emit(Some(v.name.name.clone()), Op::ConstInt(0)),
                };
                self.env.insert(&v.name.name, value);
                Ok(())
            }
            Statement::Expression(s) => {
                self.lower_expr(&s.expr, None)?;
                Ok(())
            }
            Statement::Return(s) => {
                let value = match &s.value {
                    Some(v) => Some(self.lower_expr(v, None)?),
                    None => None,
                };
                self.terminate(Terminator::Return(value));
                Ok(())
            }
            Statement::Block(b) => {
                let outer = self.env.names().to_vec();
                self.lower_statements(&b.statements)?;
                self.env.restrict(&outer);
                Ok(())
            }
            Statement::If(s) => self.lower_if(s),
            Statement::While(s) => self.lower_while(&s.condition, &s.body),
            Statement::For(s) => self.lower_for(s),
            Statement::Break(span) => {
                let Some(ctx) = self.loops.last() else {
                    return Err(LoweringError {
                        message: "break outside of a loop".to_string(),
                        span: *span,
                    });
                };
                let exit = ctx.exit;
                self.terminate(Terminator::Jump(JumpTarget::new(exit)));
                Ok(())
            }
            Statement::Continue(span) => {
                let Some(ctx) = self.loops.last() else {
                    return Err(LoweringError {
                        message: "continue outside of a loop".to_string(),
                        span: *span,
                    });
                };
                let header = ctx.header;
                let vars = ctx.vars.clone();
                let args = self.env_args(&vars);
                self.terminate(Terminator::Jump(JumpTarget {
                    block: header,
                    args,
                }));
                Ok(())
            }
            Statement::Throw(s) => {
                let value = self.lower_expr(&s.value, None)?;
                self.emit(
                    None,
                    Op::Call {
                        callee: "throw".to_string(),
                        args: vec![value],
                    },
                );
                self.terminate(Terminator::Unreachable);
                Ok(())
            }
            Statement::TryCatch(s) => self.lower_try_catch(s),
        }
    }

    fn env_args(&self, vars: &[String]) -> Vec<Operand> {
        vars.iter()
            .map(|v| {
                self.env
                    .get(v)
                    .cloned()
                    .unwrap_or(Operand::Int(0))
            })
            .collect()
    }

    fn lower_if(&mut self, s: &crate::ast::IfStmt) -> Result<(), LoweringError> {
        let cond = self.lower_expr(&s.condition, None)?;
        let cond_block = self.blocks[self.current].id;
        let env0 = self.env.clone();

        let then_block = self.new_block(Vec::new());
        self.switch_to(then_block);
        self.env = env0.clone();
        self.lower_statements(&s.then_block.statements)?;
        self.env.restrict(env0.names());
        let then_exit = self.blocks[self.current].id;
        let then_terminated = self.current_terminated();
        let then_env = self.env.clone();

        let (else_entry, else_exit, else_terminated, else_env) = match &s.else_branch {
            Some(branch) => {
                let else_block = self.new_block(Vec::new());
                self.switch_to(else_block);
                self.env = env0.clone();
                self.lower_statement(branch)?;
                self.env.restrict(env0.names());
                (
                    Some(else_block),
                    Some(self.blocks[self.current].id),
                    self.current_terminated(),
                    self.env.clone(),
                )
            }
            None => (None, None, false, env0.clone()),
        };

        let merge_block = self.new_block(Vec::new());

        // Predecessor environments feeding the merge point.
        let mut pred_envs: Vec<&Env> = Vec::new();
        if !then_terminated {
            pred_envs.push(&then_env);
        }
        if !else_terminated {
            pred_envs.push(&else_env);
        }

        // Merge parameters: variables whose values disagree across the
        // live predecessors.
        let mut merged_vars = Vec::new();
        if pred_envs.len() > 1 {
            for var in env0.names() {
                let first = pred_envs[0].get(var);
                if pred_envs.iter().any(|e| e.get(var) != first) {
                    merged_vars.push(var.clone());
                }
            }
        }

        let params: Vec<Value> = merged_vars.iter().map(|v| self.fresh_var(v)).collect();
        self.blocks[merge_block.0 as usize].params = params.clone();

        let args_from = |env: &Env| -> Vec<Operand> {
            merged_vars
                .iter()
                .map(|v| env.get(v).cloned().unwrap_or(Operand::Int(0)))
                .collect()
        };

        // Wire the conditional branch.
        let else_target = match else_entry {
            Some(block) => JumpTarget::new(block),
            None => JumpTarget {
                block: merge_block,
                args: args_from(&env0),
            },
        };
        self.terminate_block(
            cond_block,
            Terminator::Branch {
                cond,
                then_target: JumpTarget::new(then_block),
                else_target,
            },
        );

        // Fallthrough edges into the merge block.
        if !then_terminated {
            self.terminate_block(
                then_exit,
                Terminator::Jump(JumpTarget {
                    block: merge_block,
                    args: args_from(&then_env),
                }),
            );
        }
        if let Some(exit) = else_exit {
            if !else_terminated {
                self.terminate_block(
                    exit,
                    Terminator::Jump(JumpTarget {
                        block: merge_block,
                        args: args_from(&else_env),
                    }),
                );
            }
        }

        // Environment after the join.
        self.env = match pred_envs.len() {
            0 => env0.clone(),
            1 => pred_envs[0].clone(),
            _ => {
                let mut env = env0.clone();
                for (var, value) in merged_vars.iter().zip(params.iter()) {
                    env.insert(var, Operand::Value(value.clone()));
                }
                env
            }
        };
        self.switch_to(merge_block);
        Ok(())
    }

    fn lower_while(&mut self, condition: &Expression, body: &Block) -> Result<(), LoweringError> {
        let mut loop_vars: Vec<String> = Vec::new();
        let assigned = collect_assigned_vars(&body.statements);
        for var in self.env.names() {
            if assigned.contains(var) {
                loop_vars.push(var.clone());
            }
        }

        let entry_args = self.env_args(&loop_vars);
        let params: Vec<Value> = loop_vars.iter().map(|v| self.fresh_var(v)).collect();
        let header = self.new_block(params.clone());
        self.terminate(Terminator::Jump(JumpTarget {
            block: header,
            args: entry_args,
        }));

        self.switch_to(header);
        for (var, value) in loop_vars.iter().zip(params.iter()) {
            self.env.insert(var, Operand::Value(value.clone()));
        }
        let header_env = self.env.clone();
        let cond = self.lower_expr(condition, None)?;

        let body_block = self.new_block(Vec::new());
        let exit_block = self.new_block(Vec::new());
        self.terminate_block(
            header,
            Terminator::Branch {
                cond,
                then_target: JumpTarget::new(body_block),
                else_target: JumpTarget::new(exit_block),
            },
        );

        self.loops.push(LoopCtx {
            header,
            exit: exit_block,
            vars: loop_vars.clone(),
        });
        self.switch_to(body_block);
        self.lower_statements(&body.statements)?;
        self.env.restrict(header_env.names());
        if !self.current_terminated() {
            let args = self.env_args(&loop_vars);
            self.terminate(Terminator::Jump(JumpTarget {
                block: header,
                args,
            }));
        }
        self.loops.pop();

        // After the loop the carried variables hold the header's values.
        self.env = header_env;
        self.switch_to(exit_block);
        Ok(())
    }

    /// `for i in e { .. }` iterates the integer range `0..e` with `i` bound
    /// in the body.
    fn lower_for(&mut self, s: &crate::ast::ForStmt) -> Result<(), LoweringError> {
        let outer = self.env.names().to_vec();
        let limit = self.lower_expr(&s.iterable, None)?;
        let binding = s.binding.name.clone();
        let init = self.emit(Some(binding.clone()), Op::ConstInt(0));
        self.env.insert(&binding, init);

        let binding_for_cond = binding.clone();
        let limit_for_cond = limit.clone();
        let condition_span = s.iterable.span();
        // The condition `i < limit` and increment `i = i + 1` are emitted
        // directly rather than as synthetic AST.
        let cond_expr = move |lowerer: &mut Self| -> Result<Operand, LoweringError> {
            let current = lowerer
                .env
                .get(&binding_for_cond)
                .cloned()
                .ok_or_else(|| LoweringError {
                    message: format!("loop variable '{}' lost during lowering", binding_for_cond),
                    span: condition_span,
                })?;
            Ok(lowerer.emit(
                None,
                Op::Binary {
                    op: MirBinOp::Lt,
                    lhs: current,
                    rhs: limit_for_cond.clone(),
                },
            ))
        };

        // Reimplemented loop shape with a closure-based condition.
        let mut loop_vars: Vec<String> = Vec::new();
        let assigned = collect_assigned_vars(&s.body.statements);
        for var in self.env.names() {
            if assigned.contains(var) || var == &binding {
                loop_vars.push(var.clone());
            }
        }

        let entry_args = self.env_args(&loop_vars);
        let params: Vec<Value> = loop_vars.iter().map(|v| self.fresh_var(v)).collect();
        let header = self.new_block(params.clone());
        self.terminate(Terminator::Jump(JumpTarget {
            block: header,
            args: entry_args,
        }));

        self.switch_to(header);
        for (var, value) in loop_vars.iter().zip(params.iter()) {
            self.env.insert(var, Operand::Value(value.clone()));
        }
        let header_env = self.env.clone();
        let cond = cond_expr(self)?;

        let body_block = self.new_block(Vec::new());
        let exit_block = self.new_block(Vec::new());
        self.terminate_block(
            header,
            Terminator::Branch {
                cond,
                then_target: JumpTarget::new(body_block),
                else_target: JumpTarget::new(exit_block),
            },
        );

        self.loops.push(LoopCtx {
            header,
            exit: exit_block,
            vars: loop_vars.clone(),
        });
        self.switch_to(body_block);
        self.lower_statements(&s.body.statements)?;
        if !self.current_terminated() {
            let current = self
                .env
                .get(&binding)
                .cloned()
                .unwrap_or(Operand::Int(0));
            let next = self.emit(
                Some(binding.clone()),
                Op::Binary {
                    op: MirBinOp::Add,
                    lhs: current,
                    rhs: Operand::Int(1),
                },
            );
            self.env.insert(&binding, next);
        }
        self.env.restrict(header_env.names());
        if !self.current_terminated() {
            let args = self.env_args(&loop_vars);
            self.terminate(Terminator::Jump(JumpTarget {
                block: header,
                args,
            }));
        }
        self.loops.pop();

        self.env = header_env;
        self.switch_to(exit_block);
        // The binding is scoped to the loop.
        self.env.restrict(&outer);
        Ok(())
    }

    /// `try { .. } catch (e) { .. }`: the try body runs unconditionally at
    /// this level; the handler is kept in the artifact behind a
    /// never-taken branch since exception edges are resolved later.
    fn lower_try_catch(&mut self, s: &crate::ast::TryCatchStmt) -> Result<(), LoweringError> {
        let outer = self.env.names().to_vec();
        self.lower_statements(&s.try_block.statements)?;
        self.env.restrict(&outer);
        if self.current_terminated() {
            let resume = self.new_block(Vec::new());
            self.switch_to(resume);
        }
        let env0 = self.env.clone();
        let guard_block = self.blocks[self.current].id;

        let catch_block = self.new_block(Vec::new());
        self.switch_to(catch_block);
        self.env = env0.clone();
        if let Some(binding) = &s.catch_binding {
            let value = self.emit(Some(binding.name.clone()), Op::ConstInt(0));
            self.env.insert(&binding.name, value);
        }
        self.lower_statements(&s.catch_block.statements)?;
        self.env.restrict(env0.names());
        let catch_exit = self.blocks[self.current].id;
        let catch_terminated = self.current_terminated();
        let catch_env = self.env.clone();

        let merge_block = self.new_block(Vec::new());
        let mut merged_vars = Vec::new();
        if !catch_terminated {
            for var in env0.names() {
                if catch_env.get(var) != env0.get(var) {
                    merged_vars.push(var.clone());
                }
            }
        }
        let params: Vec<Value> = merged_vars.iter().map(|v| self.fresh_var(v)).collect();
        self.blocks[merge_block.0 as usize].params = params.clone();

        let args_from = |env: &Env| -> Vec<Operand> {
            merged_vars
                .iter()
                .map(|v| env.get(v).cloned().unwrap_or(Operand::Int(0)))
                .collect()
        };

        self.terminate_block(
            guard_block,
            Terminator::Branch {
                cond: Operand::Bool(false),
                then_target: JumpTarget::new(catch_block),
                else_target: JumpTarget {
                    block: merge_block,
                    args: args_from(&env0),
                },
            },
        );
        if !catch_terminated {
            self.terminate_block(
                catch_exit,
                Terminator::Jump(JumpTarget {
                    block: merge_block,
                    args: args_from(&catch_env),
                }),
            );
        }

        let mut env = env0;
        for (var, value) in merged_vars.iter().zip(params.iter()) {
            env.insert(var, Operand::Value(value.clone()));
        }
        self.env = env;
        self.switch_to(merge_block);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    /// Lower an expression. With a `hint`, the result is always materialized
    /// as an instruction whose destination takes the hinted variable name.
    fn lower_expr(
        &mut self,
        expr: &Expression,
        hint: Option<String>,
    ) -> Result<Operand, LoweringError> {
        match expr {
            Expression::Literal(lit) => {
                let imm = match &lit.value {
                    LiteralValue::Integer(v) => Operand::Int(*v),
                    LiteralValue::Float(v) => Operand::Float(*v),
                    LiteralValue::Bool(v) => Operand::Bool(*v),
                    LiteralValue::Str(s) => Operand::Str(s.clone()),
                    LiteralValue::Char(c) => {
                        Operand::Int(c.chars().next().map(|c| c as i64).unwrap_or(0))
                    }
                };
                match hint {
                    Some(name) => Ok(self.emit(Some(name), const_op(&imm))),
                    None => Ok(imm),
                }
            }
            Expression::Identifier(ident) => {
                let resolved = self.env.get(&ident.name).cloned();
                match resolved {
                    Some(value) => match hint {
                        Some(name) => Ok(self.emit(Some(name), Op::Copy(value))),
                        None => Ok(value),
                    },
                    None => Ok(self.emit(hint, Op::Global(ident.name.clone()))),
                }
            }
            Expression::Binary(e) => {
                let lhs = self.lower_expr(&e.left, None)?;
                let rhs = self.lower_expr(&e.right, None)?;
                Ok(self.emit(
                    hint,
                    Op::Binary {
                        op: bin_op(e.op),
                        lhs,
                        rhs,
                    },
                ))
            }
            Expression::Unary(e) => {
                let operand = self.lower_expr(&e.operand, None)?;
                Ok(self.emit(
                    hint,
                    Op::Unary {
                        op: un_op(e.op),
                        operand,
                    },
                ))
            }
            Expression::Assign(e) => self.lower_assign(e, hint),
            Expression::Call(e) => {
                let (callee, mut args) = match &*e.callee {
                    Expression::Identifier(ident) => (ident.name.clone(), Vec::new()),
                    Expression::Member(m) => {
                        let object = self.lower_expr(&m.object, None)?;
                        (m.member.name.clone(), vec![object])
                    }
                    other => {
                        return Err(LoweringError {
                            message: "unsupported call target".to_string(),
                            span: other.span(),
                        });
                    }
                };
                for arg in &e.args {
                    args.push(self.lower_expr(arg, None)?);
                }
                Ok(self.emit(hint, Op::Call { callee, args }))
            }
            Expression::Member(e) => {
                let object = self.lower_expr(&e.object, None)?;
                Ok(self.emit(
                    hint,
                    Op::Member {
                        object,
                        field: e.member.name.clone(),
                    },
                ))
            }
            Expression::Index(e) => {
                let object = self.lower_expr(&e.object, None)?;
                let index = self.lower_expr(&e.index, None)?;
                Ok(self.emit(hint, Op::Index { object, index }))
            }
            Expression::Cast(e) => {
                let value = self.lower_expr(&e.expr, None)?;
                Ok(self.emit(
                    hint,
                    Op::Cast {
                        value,
                        ty: e.ty.to_string(),
                    },
                ))
            }
            Expression::Try(e) => {
                let value = self.lower_expr(&e.expr, None)?;
                Ok(self.emit(hint, Op::TryUnwrap(value)))
            }
            Expression::Array(e) => {
                let mut elements = Vec::new();
                for element in &e.elements {
                    elements.push(self.lower_expr(element, None)?);
                }
                Ok(self.emit(hint, Op::Array(elements)))
            }
            Expression::StructLiteral(e) => {
                let mut fields = Vec::new();
                for (name, value) in &e.fields {
                    fields.push((name.name.clone(), self.lower_expr(value, None)?));
                }
                Ok(self.emit(
                    hint,
                    Op::StructInit {
                        name: e.name.name.clone(),
                        fields,
                    },
                ))
            }
            Expression::MacroInvocation(m) => Err(LoweringError {
                message: format!("macro invocation '{}!' survived to lowering", m.name.name),
                span: m.span,
            }),
        }
    }

    fn lower_assign(
        &mut self,
        e: &crate::ast::AssignExpr,
        hint: Option<String>,
    ) -> Result<Operand, LoweringError> {
        let Expression::Identifier(target) = &*e.target else {
            return Err(LoweringError {
                message: "unsupported assignment target".to_string(),
                span: e.target.span(),
            });
        };
        let value = match e.op.binary_op() {
            None => {
                let new = self.lower_expr(&e.value, Some(target.name.clone()))?;
                self.env.insert(&target.name, new.clone());
                new
            }
            Some(op) => {
                let current = self
                    .env
                    .get(&target.name)
                    .cloned()
                    .ok_or_else(|| LoweringError {
                        message: format!("assignment to undeclared variable '{}'", target.name),
                        span: target.span,
                    })?;
                let rhs = self.lower_expr(&e.value, None)?;
                let new = self.emit(
                    Some(target.name.clone()),
                    Op::Binary {
                        op: bin_op(op),
                        lhs: current,
                        rhs,
                    },
                );
                self.env.insert(&target.name, new.clone());
                new
            }
        };
        // An extra hint on an assignment just copies the stored value.
        if let Some(name) = hint {
            return Ok(self.emit(Some(name), Op::Copy(value)));
        }
        Ok(value)
    }
}

fn const_op(imm: &Operand) -> Op {
    match imm {
        Operand::Int(v) => Op::ConstInt(*v),
        Operand::Float(v) => Op::ConstFloat(*v),
        Operand::Bool(v) => Op::ConstBool(*v),
        Operand::Str(s) => Op::ConstStr(s.clone()),
        Operand::Value(v) => Op::Copy(Operand::Value(v.clone())),
    }
}

fn bin_op(op: BinaryOp) -> MirBinOp {
    match op {
        BinaryOp::Add => MirBinOp::Add,
        BinaryOp::Sub => MirBinOp::Sub,
        BinaryOp::Mul => MirBinOp::Mul,
        BinaryOp::Div => MirBinOp::Div,
        BinaryOp::Rem => MirBinOp::Rem,
        BinaryOp::Pow => MirBinOp::Pow,
        BinaryOp::Eq => MirBinOp::Eq,
        BinaryOp::Ne => MirBinOp::Ne,
        BinaryOp::Lt => MirBinOp::Lt,
        BinaryOp::Gt => MirBinOp::Gt,
        BinaryOp::Le => MirBinOp::Le,
        BinaryOp::Ge => MirBinOp::Ge,
        BinaryOp::And => MirBinOp::And,
        BinaryOp::Or => MirBinOp::Or,
        BinaryOp::BitAnd => MirBinOp::BitAnd,
        BinaryOp::BitOr => MirBinOp::BitOr,
        BinaryOp::BitXor => MirBinOp::BitXor,
        BinaryOp::Shl => MirBinOp::Shl,
        BinaryOp::Shr => MirBinOp::Shr,
    }
}

fn un_op(op: UnaryOp) -> MirUnOp {
    match op {
        UnaryOp::Neg => MirUnOp::Neg,
        UnaryOp::Not => MirUnOp::Not,
        UnaryOp::BitNot => MirUnOp::BitNot,
        UnaryOp::Ref | UnaryOp::RefMut => MirUnOp::Addr,
        UnaryOp::Deref => MirUnOp::Load,
    }
}

/// Names assigned anywhere in a statement list, in first-seen order.
fn collect_assigned_vars(statements: &[Statement]) -> Vec<String> {
    let mut out = Vec::new();
    let mut seen = HashSet::new();
    collect_stmts(statements, &mut out, &mut seen);
    out
}

fn collect_stmts(statements: &[Statement], out: &mut Vec<String>, seen: &mut HashSet<String>) {
    for stmt in statements {
        collect_stmt(stmt, out, seen);
    }
}

fn collect_stmt(stmt: &Statement, out: &mut Vec<String>, seen: &mut HashSet<String>) {
    match stmt {
        Statement::Expression(s) => collect_expr(&s.expr, out, seen),
        Statement::VariableDecl(v) => {
            if let Some(init) = &v.initializer {
                collect_expr(init, out, seen);
            }
        }
        Statement::Return(s) => {
            if let Some(v) = &s.value {
                collect_expr(v, out, seen);
            }
        }
        Statement::Block(b) => collect_stmts(&b.statements, out, seen),
        Statement::If(s) => {
            collect_expr(&s.condition, out, seen);
            collect_stmts(&s.then_block.statements, out, seen);
            if let Some(else_branch) = &s.else_branch {
                collect_stmt(else_branch, out, seen);
            }
        }
        Statement::While(s) => {
            collect_expr(&s.condition, out, seen);
            collect_stmts(&s.body.statements, out, seen);
        }
        Statement::For(s) => {
            collect_expr(&s.iterable, out, seen);
            collect_stmts(&s.body.statements, out, seen);
        }
        Statement::Throw(s) => collect_expr(&s.value, out, seen),
        Statement::TryCatch(s) => {
            collect_stmts(&s.try_block.statements, out, seen);
            collect_stmts(&s.catch_block.statements, out, seen);
        }
        Statement::Break(_) | Statement::Continue(_) => {}
    }
}

fn collect_expr(expr: &Expression, out: &mut Vec<String>, seen: &mut HashSet<String>) {
    match expr {
        Expression::Assign(e) => {
            if let Expression::Identifier(target) = &*e.target {
                if seen.insert(target.name.clone()) {
                    out.push(target.name.clone());
                }
            }
            collect_expr(&e.value, out, seen);
        }
        Expression::Binary(e) => {
            collect_expr(&e.left, out, seen);
            collect_expr(&e.right, out, seen);
        }
        Expression::Unary(e) => collect_expr(&e.operand, out, seen),
        Expression::Call(e) => {
            collect_expr(&e.callee, out, seen);
            for arg in &e.args {
                collect_expr(arg, out, seen);
            }
        }
        Expression::Member(e) => collect_expr(&e.object, out, seen),
        Expression::Index(e) => {
            collect_expr(&e.object, out, seen);
            collect_expr(&e.index, out, seen);
        }
        Expression::Cast(e) => collect_expr(&e.expr, out, seen),
        Expression::Try(e) => collect_expr(&e.expr, out, seen),
        Expression::Array(e) => {
            for element in &e.elements {
                collect_expr(element, out, seen);
            }
        }
        Expression::StructLiteral(e) => {
            for (_, value) in &e.fields {
                collect_expr(value, out, seen);
            }
        }
        Expression::MacroInvocation(e) => {
            for arg in &e.args {
                collect_expr(arg, out, seen);
            }
        }
        Expression::Literal(_) | Expression::Identifier(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::to_core;
    use crate::hir::build_module;
    use crate::mir::{verify_program, MirProgram};
    use crate::parser::parse_source;

    fn lower(source: &str) -> MirProgram {
        let (program, errors) = parse_source(source);
        assert!(errors.is_empty(), "parse: {:?}", errors);
        let (hir, errors) = build_module(to_core(program), "test");
        assert!(errors.is_empty(), "hir: {:?}", errors);
        let (mir, errors) = lower_module(&hir.modules[0]);
        assert!(errors.is_empty(), "lower: {:?}", errors);
        verify_program(&mir).expect("SSA verification");
        mir
    }

    #[test]
    fn test_hello_world_mir() {
        let mir = lower(r#"func main() { print("Hello, Orizon!"); }"#);
        assert_eq!(mir.functions.len(), 1);
        let text = mir.to_text();
        assert_eq!(
            text,
            "func main() -> void\nbb0:\n  %0 = call print, \"Hello, Orizon!\"\n  ret void\n"
        );
    }

    #[test]
    fn test_top_level_variable_module_init() {
        let mir = lower("let x = 42;");
        assert_eq!(mir.functions.len(), 1);
        assert_eq!(mir.functions[0].name, "module_init");
        let text = mir.to_text();
        assert_eq!(text, "func module_init() -> void\nbb0:\n  %x = const 42\n  ret void\n");
    }

    #[test]
    fn test_binary_and_params() {
        let mir = lower("func add(a: i64, b: i64) -> i64 { return a + b; }");
        let text = mir.to_text();
        assert_eq!(
            text,
            "func add(%a, %b) -> i64\nbb0:\n  %0 = add %a, %b\n  ret %0\n"
        );
    }

    #[test]
    fn test_if_merge_params() {
        let mir = lower(
            "func f(c: bool) -> i64 { var x = 1; if c { x = 2; } else { x = 3; } return x; }",
        );
        let func = &mir.functions[0];
        // Merge block carries one parameter for x.
        let merge = func.blocks.iter().find(|b| !b.params.is_empty()).expect("merge block");
        assert_eq!(merge.params.len(), 1);
        assert!(merge.params[0].0.starts_with("x."));
        // Both incoming jumps pass one argument.
        let incoming: Vec<_> = func
            .blocks
            .iter()
            .flat_map(|b| b.terminator.targets())
            .filter(|t| t.block == merge.id)
            .collect();
        assert_eq!(incoming.len(), 2);
        for target in incoming {
            assert_eq!(target.args.len(), 1);
        }
    }

    #[test]
    fn test_if_without_else() {
        let mir = lower("func f(c: bool) -> i64 { var x = 1; if c { x = 2; } return x; }");
        let func = &mir.functions[0];
        let merge = func.blocks.iter().find(|b| !b.params.is_empty()).expect("merge block");
        // One edge comes straight from the conditional branch.
        assert_eq!(merge.params.len(), 1);
    }

    #[test]
    fn test_while_loop_header_params() {
        let mir = lower(
            "func f(n: i64) -> i64 { var i = 0; while i < n { i = i + 1; } return i; }",
        );
        let func = &mir.functions[0];
        let header = func
            .blocks
            .iter()
            .find(|b| !b.params.is_empty())
            .expect("loop header");
        assert_eq!(header.params.len(), 1);
        // Header is targeted twice: loop entry and back edge.
        let preds: Vec<_> = func
            .blocks
            .iter()
            .flat_map(|b| b.terminator.targets())
            .filter(|t| t.block == header.id)
            .collect();
        assert_eq!(preds.len(), 2);
    }

    #[test]
    fn test_break_and_continue() {
        let mir = lower(
            "func f() { var i = 0; while true { i = i + 1; if i > 3 { break; } continue; } }",
        );
        verify_program(&mir).unwrap();
    }

    #[test]
    fn test_for_loop_desugars_to_counter() {
        let mir = lower("func f(n: i64) { for i in n { use_it(i); } }");
        let text = mir.to_text();
        assert!(text.contains("const 0"), "{}", text);
        assert!(text.contains("cmp.lt"), "{}", text);
        assert!(text.contains("add"), "{}", text);
    }

    #[test]
    fn test_throw_lowers_to_unreachable() {
        let mir = lower("func f() { throw 1; }");
        let text = mir.to_text();
        assert!(text.contains("call throw, 1"), "{}", text);
        assert!(text.contains("unreachable"), "{}", text);
    }

    #[test]
    fn test_try_catch_keeps_handler() {
        let mir = lower("func f() { try { risky(); } catch (e) { handle(e); } }");
        let text = mir.to_text();
        assert!(text.contains("call risky"), "{}", text);
        assert!(text.contains("call handle"), "{}", text);
        assert!(text.contains("br false"), "{}", text);
    }

    #[test]
    fn test_unresolved_identifier_is_global() {
        let mir = lower("func f() -> i64 { return counter; }");
        let text = mir.to_text();
        assert!(text.contains("%0 = global counter"), "{}", text);
    }

    #[test]
    fn test_break_outside_loop_fails() {
        let (program, _) = parse_source("func f() { break; }");
        let (hir, _) = build_module(to_core(program), "test");
        let (_, errors) = lower_module(&hir.modules[0]);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("break outside"));
    }

    #[test]
    fn test_impl_methods_lowered_with_target_prefix() {
        let mir = lower(
            "struct P { x: i64 }\nimpl P { func get(self: P) -> i64 { return self.x; } }",
        );
        assert_eq!(mir.functions[0].name, "P.get");
        let text = mir.to_text();
        assert!(text.contains("member %self, x"), "{}", text);
    }

    #[test]
    fn test_deterministic_lowering() {
        let source = "func f(n: i64) -> i64 { var a = 0; var b = 1; while a < n { a += 1; b *= 2; } return b; }";
        let first = lower(source).to_text();
        let second = lower(source).to_text();
        assert_eq!(first, second);
    }

    #[test]
    fn test_compound_assignment() {
        let mir = lower("func f(a: i64) -> i64 { var x = 1; x += a; return x; }");
        let text = mir.to_text();
        assert!(text.contains("%x.1 = add %x, %a"), "{}", text);
    }
}
