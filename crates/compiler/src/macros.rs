//! Pattern-based macro expansion over the parsed AST
//!
//! Macros are expanded after parsing, never during it. Each definition is
//! registered by name (duplicates are ignored with a warning); an invocation
//! is matched against the definition's alternatives by argument count, the
//! template body is substituted and spliced in place, and expansion recurses
//! over the result up to a fixed depth. Invocations with no matching
//! alternative are left untouched and surface later as a resolution error.

use crate::ast::*;
use orizon_core::span::Span;
use std::collections::HashMap;

/// Expansion recurses at most this many times through one splice site.
const MAX_EXPANSION_DEPTH: usize = 64;

#[derive(Debug, Clone, PartialEq)]
pub struct MacroWarning {
    pub message: String,
    pub span: Span,
}

impl std::fmt::Display for MacroWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{}: {}",
            self.span.start.line, self.span.start.column, self.message
        )
    }
}

#[derive(Debug, Default)]
pub struct MacroEngine {
    macros: HashMap<String, MacroDefinition>,
    warnings: Vec<MacroWarning>,
}

impl MacroEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register every macro definition in the program. The first definition
    /// of a name wins; later duplicates warn.
    pub fn register(&mut self, program: &Program) {
        for decl in &program.declarations {
            if let Declaration::MacroDefinition(def) = decl {
                if self.macros.contains_key(&def.name.name) {
                    self.warnings.push(MacroWarning {
                        message: format!("duplicate macro definition '{}' ignored", def.name.name),
                        span: def.span,
                    });
                } else {
                    self.macros.insert(def.name.name.clone(), def.clone());
                }
            }
        }
    }

    pub fn warnings(&self) -> &[MacroWarning] {
        &self.warnings
    }

    /// Expand all invocations reachable from the program's function bodies.
    pub fn expand_program(&mut self, program: &mut Program) {
        for decl in &mut program.declarations {
            match decl {
                Declaration::Function(func) => self.expand_block(&mut func.body, 0),
                Declaration::Impl(imp) => {
                    for method in &mut imp.methods {
                        self.expand_block(&mut method.body, 0);
                    }
                }
                Declaration::Variable(var) => {
                    if let Some(init) = &mut var.initializer {
                        self.expand_expression(init, 0);
                    }
                }
                _ => {}
            }
        }
    }

    fn expand_block(&mut self, block: &mut Block, depth: usize) {
        self.expand_statements(&mut block.statements, depth);
    }

    fn expand_statements(&mut self, statements: &mut Vec<Statement>, depth: usize) {
        let mut out = Vec::with_capacity(statements.len());
        for mut stmt in statements.drain(..) {
            if depth < MAX_EXPANSION_DEPTH {
                if let Statement::Expression(expr_stmt) = &stmt {
                    if let Expression::MacroInvocation(inv) = &expr_stmt.expr {
                        if let Some(body) = self.match_invocation(inv) {
                            let mut spliced = body;
                            self.expand_statements(&mut spliced, depth + 1);
                            out.extend(spliced);
                            continue;
                        }
                    }
                }
            } else {
                self.warnings.push(MacroWarning {
                    message: "macro expansion depth limit reached".to_string(),
                    span: stmt.span(),
                });
            }
            self.expand_statement(&mut stmt, depth);
            out.push(stmt);
        }
        *statements = out;
    }

    fn expand_statement(&mut self, stmt: &mut Statement, depth: usize) {
        match stmt {
            Statement::Block(b) => self.expand_block(b, depth),
            Statement::Expression(s) => self.expand_expression(&mut s.expr, depth),
            Statement::Return(s) => {
                if let Some(v) = &mut s.value {
                    self.expand_expression(v, depth);
                }
            }
            Statement::If(s) => {
                self.expand_expression(&mut s.condition, depth);
                self.expand_block(&mut s.then_block, depth);
                if let Some(else_branch) = &mut s.else_branch {
                    self.expand_statement(else_branch, depth);
                }
            }
            Statement::While(s) => {
                self.expand_expression(&mut s.condition, depth);
                self.expand_block(&mut s.body, depth);
            }
            Statement::For(s) => {
                self.expand_expression(&mut s.iterable, depth);
                self.expand_block(&mut s.body, depth);
            }
            Statement::VariableDecl(v) => {
                if let Some(init) = &mut v.initializer {
                    self.expand_expression(init, depth);
                }
            }
            Statement::Throw(s) => self.expand_expression(&mut s.value, depth),
            Statement::TryCatch(s) => {
                self.expand_block(&mut s.try_block, depth);
                self.expand_block(&mut s.catch_block, depth);
            }
            Statement::Break(_) | Statement::Continue(_) => {}
        }
    }

    fn expand_expression(&mut self, expr: &mut Expression, depth: usize) {
        // Expand children first so nested invocations resolve inside-out.
        match expr {
            Expression::Binary(e) => {
                self.expand_expression(&mut e.left, depth);
                self.expand_expression(&mut e.right, depth);
            }
            Expression::Unary(e) => self.expand_expression(&mut e.operand, depth),
            Expression::Assign(e) => {
                self.expand_expression(&mut e.target, depth);
                self.expand_expression(&mut e.value, depth);
            }
            Expression::Call(e) => {
                self.expand_expression(&mut e.callee, depth);
                for arg in &mut e.args {
                    self.expand_expression(arg, depth);
                }
            }
            Expression::Member(e) => self.expand_expression(&mut e.object, depth),
            Expression::Index(e) => {
                self.expand_expression(&mut e.object, depth);
                self.expand_expression(&mut e.index, depth);
            }
            Expression::Cast(e) => self.expand_expression(&mut e.expr, depth),
            Expression::Try(e) => self.expand_expression(&mut e.expr, depth),
            Expression::Array(e) => {
                for element in &mut e.elements {
                    self.expand_expression(element, depth);
                }
            }
            Expression::StructLiteral(e) => {
                for (_, value) in &mut e.fields {
                    self.expand_expression(value, depth);
                }
            }
            Expression::MacroInvocation(inv) => {
                for arg in &mut inv.args {
                    self.expand_expression(arg, depth);
                }
                if depth >= MAX_EXPANSION_DEPTH {
                    return;
                }
                // An expression-position invocation can only splice a
                // single-expression template.
                if let Some(body) = self.match_invocation(inv) {
                    if let [Statement::Expression(stmt)] = body.as_slice() {
                        let mut replacement = stmt.expr.clone();
                        self.expand_expression(&mut replacement, depth + 1);
                        *expr = replacement;
                    }
                }
            }
            Expression::Literal(_) | Expression::Identifier(_) => {}
        }
    }

    /// Match an invocation against the macro's alternatives; on success,
    /// return the substituted template body.
    fn match_invocation(&self, inv: &MacroInvocationExpr) -> Option<Vec<Statement>> {
        let def = self.macros.get(&inv.name.name)?;
        let rule = def
            .rules
            .iter()
            .find(|rule| rule.params.len() == inv.args.len())?;
        let bindings: HashMap<&str, &Expression> = rule
            .params
            .iter()
            .map(|p| p.name.as_str())
            .zip(inv.args.iter())
            .collect();
        Some(
            rule.body
                .iter()
                .map(|stmt| substitute_statement(stmt, &bindings))
                .collect(),
        )
    }
}

fn substitute_statement(stmt: &Statement, bindings: &HashMap<&str, &Expression>) -> Statement {
    let mut out = stmt.clone();
    substitute_in_statement(&mut out, bindings);
    out
}

fn substitute_in_statement(stmt: &mut Statement, bindings: &HashMap<&str, &Expression>) {
    match stmt {
        Statement::Block(b) => {
            for s in &mut b.statements {
                substitute_in_statement(s, bindings);
            }
        }
        Statement::Expression(s) => substitute_in_expression(&mut s.expr, bindings),
        Statement::Return(s) => {
            if let Some(v) = &mut s.value {
                substitute_in_expression(v, bindings);
            }
        }
        Statement::If(s) => {
            substitute_in_expression(&mut s.condition, bindings);
            for st in &mut s.then_block.statements {
                substitute_in_statement(st, bindings);
            }
            if let Some(else_branch) = &mut s.else_branch {
                substitute_in_statement(else_branch, bindings);
            }
        }
        Statement::While(s) => {
            substitute_in_expression(&mut s.condition, bindings);
            for st in &mut s.body.statements {
                substitute_in_statement(st, bindings);
            }
        }
        Statement::For(s) => {
            substitute_in_expression(&mut s.iterable, bindings);
            for st in &mut s.body.statements {
                substitute_in_statement(st, bindings);
            }
        }
        Statement::VariableDecl(v) => {
            if let Some(init) = &mut v.initializer {
                substitute_in_expression(init, bindings);
            }
        }
        Statement::Throw(s) => substitute_in_expression(&mut s.value, bindings),
        Statement::TryCatch(s) => {
            for st in &mut s.try_block.statements {
                substitute_in_statement(st, bindings);
            }
            for st in &mut s.catch_block.statements {
                substitute_in_statement(st, bindings);
            }
        }
        Statement::Break(_) | Statement::Continue(_) => {}
    }
}

fn substitute_in_expression(expr: &mut Expression, bindings: &HashMap<&str, &Expression>) {
    match expr {
        Expression::Identifier(ident) => {
            if let Some(replacement) = bindings.get(ident.name.as_str()) {
                *expr = (*replacement).clone();
            }
        }
        Expression::Binary(e) => {
            substitute_in_expression(&mut e.left, bindings);
            substitute_in_expression(&mut e.right, bindings);
        }
        Expression::Unary(e) => substitute_in_expression(&mut e.operand, bindings),
        Expression::Assign(e) => {
            substitute_in_expression(&mut e.target, bindings);
            substitute_in_expression(&mut e.value, bindings);
        }
        Expression::Call(e) => {
            substitute_in_expression(&mut e.callee, bindings);
            for arg in &mut e.args {
                substitute_in_expression(arg, bindings);
            }
        }
        Expression::Member(e) => substitute_in_expression(&mut e.object, bindings),
        Expression::Index(e) => {
            substitute_in_expression(&mut e.object, bindings);
            substitute_in_expression(&mut e.index, bindings);
        }
        Expression::Cast(e) => substitute_in_expression(&mut e.expr, bindings),
        Expression::Try(e) => substitute_in_expression(&mut e.expr, bindings),
        Expression::Array(e) => {
            for element in &mut e.elements {
                substitute_in_expression(element, bindings);
            }
        }
        Expression::StructLiteral(e) => {
            for (_, value) in &mut e.fields {
                substitute_in_expression(value, bindings);
            }
        }
        Expression::MacroInvocation(e) => {
            for arg in &mut e.args {
                substitute_in_expression(arg, bindings);
            }
        }
        Expression::Literal(_) => {}
    }
}

/// Register and expand in one call, returning any warnings.
pub fn expand(program: &mut Program) -> Vec<MacroWarning> {
    let mut engine = MacroEngine::new();
    engine.register(program);
    engine.expand_program(program);
    engine.warnings().to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_source;

    fn expand_source(source: &str) -> (Program, Vec<MacroWarning>) {
        let (mut program, errors) = parse_source(source);
        assert!(errors.is_empty(), "{:?}", errors);
        let warnings = expand(&mut program);
        (program, warnings)
    }

    fn main_body(program: &Program) -> &Vec<Statement> {
        for decl in &program.declarations {
            if let Declaration::Function(f) = decl {
                if f.name.name == "main" {
                    return &f.body.statements;
                }
            }
        }
        panic!("no main function");
    }

    #[test]
    fn test_simple_expansion() {
        let (program, warnings) =
            expand_source("macro m() { x; }\nfunc main() { m!(); }");
        assert!(warnings.is_empty());
        let body = main_body(&program);
        assert_eq!(body.len(), 1);
        let Statement::Expression(stmt) = &body[0] else {
            panic!("expected expression statement");
        };
        assert!(matches!(&stmt.expr, Expression::Identifier(i) if i.name == "x"));
    }

    #[test]
    fn test_parameter_substitution() {
        let (program, _) = expand_source(
            "macro add_twice(a, b) { let r = a + a + b; }\nfunc main() { add_twice!(1, 2); }",
        );
        let body = main_body(&program);
        let Statement::VariableDecl(var) = &body[0] else {
            panic!("expected variable declaration, got {:?}", body[0]);
        };
        assert_eq!(
            var.initializer.as_ref().unwrap().to_string(),
            "((1 + 1) + 2)"
        );
    }

    #[test]
    fn test_multi_statement_splice() {
        let (program, _) = expand_source(
            "macro pair() { first(); second(); }\nfunc main() { pair!(); done(); }",
        );
        let body = main_body(&program);
        assert_eq!(body.len(), 3);
    }

    #[test]
    fn test_unmatched_invocation_left_in_place() {
        // Wrong arity: no alternative matches, invocation survives.
        let (program, _) =
            expand_source("macro m(a) { a; }\nfunc main() { m!(); }");
        let body = main_body(&program);
        assert!(matches!(
            &body[0],
            Statement::Expression(s) if matches!(&s.expr, Expression::MacroInvocation(_))
        ));
    }

    #[test]
    fn test_undefined_macro_left_in_place() {
        let (program, warnings) = expand_source("func main() { nope!(); }");
        assert!(warnings.is_empty());
        let body = main_body(&program);
        assert!(matches!(
            &body[0],
            Statement::Expression(s) if matches!(&s.expr, Expression::MacroInvocation(_))
        ));
    }

    #[test]
    fn test_duplicate_definition_warns_first_wins() {
        let (program, warnings) = expand_source(
            "macro m() { first(); }\nmacro m() { second(); }\nfunc main() { m!(); }",
        );
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].message.contains("duplicate"));
        let body = main_body(&program);
        let Statement::Expression(stmt) = &body[0] else {
            panic!("expected expression statement");
        };
        assert_eq!(stmt.expr.to_string(), "first()");
    }

    #[test]
    fn test_recursive_expansion_is_bounded() {
        // Self-recursive macro: expansion stops at the depth limit instead
        // of looping forever.
        let (_, warnings) =
            expand_source("macro m() { m!(); }\nfunc main() { m!(); }");
        assert!(
            warnings
                .iter()
                .any(|w| w.message.contains("depth limit")),
            "expected a depth warning, got {:?}",
            warnings
        );
    }

    #[test]
    fn test_expression_position_expansion() {
        let (program, _) = expand_source(
            "macro two() { 2; }\nfunc main() { let x = two!() + 1; }",
        );
        let body = main_body(&program);
        let Statement::VariableDecl(var) = &body[0] else {
            panic!("expected variable declaration");
        };
        assert_eq!(var.initializer.as_ref().unwrap().to_string(), "(2 + 1)");
    }

    #[test]
    fn test_expansion_inside_control_flow() {
        let (program, _) = expand_source(
            "macro log(v) { emit(v); }\nfunc main() { if ready { log!(1); } }",
        );
        let body = main_body(&program);
        let Statement::If(if_stmt) = &body[0] else {
            panic!("expected if statement");
        };
        let Statement::Expression(stmt) = &if_stmt.then_block.statements[0] else {
            panic!("expected expression statement");
        };
        assert_eq!(stmt.expr.to_string(), "emit(1)");
    }
}
