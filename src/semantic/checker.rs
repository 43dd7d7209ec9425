use std::fmt;

use fnv::FnvHashSet;

use crate::{
    ast::{BinOp, Block, Expr, ExprVisitor, Function, Literal, Program, Stmt, StmtVisitor, UnaryOp},
    Loc,
};

use super::{Symbol, SymbolTable, Type};

/// A single compile-time error: the source line it refers to and the
/// human-readable message, without the `erro na linha N:` prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub line: usize,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "erro na linha {}: {}", self.line, self.message)
    }
}

/// Runs the type checker over a program, returning the symbol table it built
/// (for consumption by the bytecode generator) and every diagnostic found.
/// The program may be compiled further only when the diagnostic list is empty.
pub fn check(program: &Program) -> (SymbolTable, Vec<Diagnostic>) {
    let mut checker = TypeChecker::default();
    checker.check(program);
    checker.into_parts()
}

/// A single-pass semantic analyzer. Function signatures are registered ahead
/// of any body so forward and mutually recursive calls resolve; diagnostics
/// accumulate instead of aborting at the first error, are de-duplicated, and
/// come out sorted by source line.
#[derive(Default)]
pub struct TypeChecker {
    table: SymbolTable,
    errors: Vec<Diagnostic>,
    reported: FnvHashSet<String>,
    /// Return type of the function being checked, when inside one.
    current_ret: Option<Type>,
    /// Whether the current function body contained an explicit `retorna`.
    has_return: bool,
}

impl TypeChecker {
    pub fn check(&mut self, program: &Program) {
        for decl in &program.globals {
            self.declare_variables(decl.loc, decl.ty, &decl.names);
        }

        for function in &program.functions {
            self.register_signature(function);
        }

        let mut has_principal = false;
        for function in &program.functions {
            self.check_function(function);
            if function.name == "principal" {
                has_principal = true;
            }
        }

        if !has_principal {
            self.report(program.end.line(), "falta funcao principal()".to_string());
        }

        self.errors.sort_by_key(|diagnostic| diagnostic.line);
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn errors(&self) -> &[Diagnostic] {
        &self.errors
    }

    pub fn into_parts(self) -> (SymbolTable, Vec<Diagnostic>) {
        (self.table, self.errors)
    }

    /// Declares a function's name, return type and parameter types before any
    /// body is visited, enabling forward references between functions.
    fn register_signature(&mut self, function: &Function) {
        if let Some(existing) = self.table.resolve(&function.name) {
            if !existing.is_function() {
                self.report(
                    function.loc.line(),
                    format!("'{}' ja foi declarado", function.name),
                );
                return;
            }
        }

        let ret = function.ret.unwrap_or(Type::Void);
        let params = function
            .params
            .iter()
            .map(|param| (param.name.clone(), param.ty))
            .collect();

        if !self.table.declare(Symbol::function(&function.name, ret, params)) {
            self.report(
                function.loc.line(),
                format!("'{}' ja foi declarado", function.name),
            );
        }
    }

    fn check_function(&mut self, function: &Function) {
        match self.table.resolve(&function.name) {
            None => {
                self.report(
                    function.loc.line(),
                    format!("funcao '{}' nao foi declarado corretamente", function.name),
                );
                return;
            }
            Some(symbol) if !symbol.is_function() => return,
            Some(_) => {}
        }

        let ret = function.ret.unwrap_or(Type::Void);

        self.table.enter_named(&function.name);

        let prev_ret = self.current_ret.replace(ret);
        let prev_has_return = std::mem::replace(&mut self.has_return, false);

        for param in &function.params {
            if !self.table.declare(Symbol::parameter(&param.name, param.ty)) {
                self.report(param.loc.line(), format!("'{}' ja foi declarado", param.name));
            }
        }

        self.table.save(&function.name);

        // The body block shares the function's scope, so a local may not
        // reuse a parameter's name.
        for decl in &function.body.decls {
            self.declare_variables(decl.loc, decl.ty, &decl.names);
        }
        for stmt in &function.body.stmts {
            self.visit_stmt(stmt);
        }

        let returned = self.has_return;
        if ret != Type::Void && !returned {
            self.report(
                function.loc.line(),
                format!("funcao '{}' deve retornar um valor do tipo {}", function.name, ret),
            );
        }

        self.current_ret = prev_ret;
        self.has_return = prev_has_return;
        self.table.exit();

        if let Some(Symbol::Function { returns, .. }) = self.table.resolve_mut(&function.name) {
            *returns = returned;
        }
    }

    fn declare_variables(&mut self, loc: Loc, ty: Type, names: &[String]) {
        for name in names {
            if !self.table.declare(Symbol::variable(name, ty)) {
                self.report(loc.line(), format!("'{}' ja foi declarado", name));
            }
        }
    }

    fn report(&mut self, line: usize, message: String) {
        let rendered = format!("erro na linha {}: {}", line, message);
        if self.reported.insert(rendered) {
            self.errors.push(Diagnostic { line, message });
        }
    }
}

impl ExprVisitor<Type> for TypeChecker {
    fn visit_literal(&mut self, _loc: &Loc, value: &Literal) -> Type {
        match value {
            Literal::Int(..) => Type::Integer,
            Literal::Real(..) => Type::Real,
            Literal::Str(..) => Type::String,
            Literal::Bool(..) => Type::Boolean,
        }
    }

    fn visit_var(&mut self, loc: &Loc, name: &str) -> Type {
        match self.table.resolve(name) {
            None => {
                self.report(loc.line(), format!("'{}' nao foi declarado", name));
                Type::Error
            }
            Some(symbol) if symbol.is_function() => {
                self.report(loc.line(), format!("'{}' nao eh variavel", name));
                Type::Error
            }
            Some(symbol) => symbol.ty(),
        }
    }

    fn visit_unary(&mut self, loc: &Loc, op: UnaryOp, operand: &Expr) -> Type {
        let ty = self.visit_expr(operand);
        if ty.is_error() {
            return Type::Error;
        }

        match op {
            UnaryOp::Neg if ty.is_numeric() => ty,
            UnaryOp::Neg => {
                self.report(loc.line(), format!("operador '-' nao pode ser aplicado a {}", ty));
                Type::Error
            }
            UnaryOp::Not if ty == Type::Boolean => Type::Boolean,
            UnaryOp::Not => {
                self.report(
                    loc.line(),
                    format!("operador 'nao' so pode ser aplicado a booleano, nao a {}", ty),
                );
                Type::Error
            }
        }
    }

    fn visit_binary(&mut self, loc: &Loc, op: BinOp, left: &Expr, right: &Expr) -> Type {
        let left_ty = self.visit_expr(left);
        let right_ty = self.visit_expr(right);

        if left_ty.is_error() || right_ty.is_error() {
            return Type::Error;
        }

        match op {
            BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div => {
                if left_ty == Type::Void || right_ty == Type::Void {
                    self.report(
                        loc.line(),
                        format!("operador '{}' eh invalido entre {} e {}", op, left_ty, right_ty),
                    );
                    return Type::Error;
                }

                if op == BinOp::Add && (left_ty == Type::String || right_ty == Type::String) {
                    return Type::String;
                }

                if left_ty == Type::Integer && right_ty == Type::Integer {
                    Type::Integer
                } else if left_ty.is_numeric() && right_ty.is_numeric() {
                    Type::Real
                } else {
                    self.report(
                        loc.line(),
                        format!("operador '{}' eh invalido entre {} e {}", op, left_ty, right_ty),
                    );
                    Type::Error
                }
            }
            BinOp::Mod => {
                if left_ty == Type::Integer && right_ty == Type::Integer {
                    Type::Integer
                } else {
                    self.report(
                        loc.line(),
                        format!(
                            "operador '%' so pode ser aplicado entre inteiros, nao entre {} e {}",
                            left_ty, right_ty
                        ),
                    );
                    Type::Error
                }
            }
            BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => {
                if left_ty.is_numeric() && right_ty.is_numeric() {
                    Type::Boolean
                } else {
                    self.report(
                        loc.line(),
                        format!(
                            "Operador '{}' so pode ser aplicado entre valores numericos, nao entre {} e {}",
                            op, left_ty, right_ty
                        ),
                    );
                    Type::Error
                }
            }
            BinOp::Eq | BinOp::Ne => {
                let comparable = (left_ty == Type::Boolean && right_ty == Type::Boolean)
                    || (left_ty == Type::String && right_ty == Type::String)
                    || (left_ty.is_numeric() && right_ty.is_numeric());

                if comparable {
                    Type::Boolean
                } else {
                    self.report(
                        loc.line(),
                        format!("Operador '{}' nao pode ser aplicado entre {} e {}", op, left_ty, right_ty),
                    );
                    Type::Error
                }
            }
            BinOp::And | BinOp::Or => {
                if left_ty == Type::Boolean && right_ty == Type::Boolean {
                    Type::Boolean
                } else {
                    self.report(
                        loc.line(),
                        format!(
                            "Operador '{}' so pode ser aplicado entre valores booleanos, nao entre {} e {}",
                            op, left_ty, right_ty
                        ),
                    );
                    Type::Error
                }
            }
        }
    }

    fn visit_call(&mut self, loc: &Loc, name: &str, args: &[Expr]) -> Type {
        let (params, ret) = match self.table.resolve(name) {
            None => {
                self.report(loc.line(), format!("'{}' nao foi declarado", name));
                return Type::Error;
            }
            Some(Symbol::Variable { .. }) => {
                self.report(loc.line(), format!("'{}' nao e uma funcao", name));
                return Type::Error;
            }
            Some(Symbol::Function { params, ret, .. }) => (params.clone(), *ret),
        };

        let arg_types: Vec<Type> = args.iter().map(|arg| self.visit_expr(arg)).collect();

        if params.len() != args.len() {
            self.report(loc.line(), format!("'{}' requer {} argumentos", name, params.len()));
        }

        for (i, ((_, param_ty), arg_ty)) in params.iter().zip(arg_types.iter()).enumerate() {
            if !arg_ty.is_error() && !arg_ty.assignable_to(*param_ty) {
                self.report(
                    args[i].loc().line(),
                    format!("'{}' devia ser do tipo {}", args[i], param_ty),
                );
            }
        }

        ret
    }
}

impl StmtVisitor<Type> for TypeChecker {
    fn visit_write(&mut self, _loc: &Loc, expr: &Expr) -> Type {
        self.visit_expr(expr);
        Type::Void
    }

    fn visit_assign(&mut self, loc: &Loc, name: &str, value: &Expr) -> Type {
        let target_ty = match self.table.resolve(name) {
            None => {
                self.report(loc.line(), format!("'{}' nao foi declarado", name));
                return Type::Void;
            }
            Some(symbol) if symbol.is_function() => {
                self.report(loc.line(), format!("'{}' nao eh variavel", name));
                return Type::Void;
            }
            Some(symbol) => symbol.ty(),
        };

        let value_ty = self.visit_expr(value);
        if !value_ty.is_error() && !value_ty.assignable_to(target_ty) {
            self.report(
                loc.line(),
                format!("operador '<-' eh invalido entre {} e {}", target_ty, value_ty),
            );
        }

        Type::Void
    }

    fn visit_if(&mut self, _loc: &Loc, cond: &Expr, then_branch: &Stmt, else_branch: Option<&Stmt>) -> Type {
        let cond_ty = self.visit_expr(cond);
        if cond_ty != Type::Boolean && !cond_ty.is_error() {
            self.report(cond.loc().line(), "expressao de 'se' nao eh do tipo booleano".to_string());
        }

        self.visit_stmt(then_branch);
        if let Some(else_branch) = else_branch {
            self.visit_stmt(else_branch);
        }

        Type::Void
    }

    fn visit_while(&mut self, _loc: &Loc, cond: &Expr, body: &Stmt) -> Type {
        let cond_ty = self.visit_expr(cond);
        if cond_ty != Type::Boolean && !cond_ty.is_error() {
            self.report(
                cond.loc().line(),
                "expressao de 'enquanto' nao eh do tipo booleano".to_string(),
            );
        }

        self.visit_stmt(body);
        Type::Void
    }

    fn visit_block(&mut self, block: &Block) -> Type {
        self.table.enter();

        for decl in &block.decls {
            self.declare_variables(decl.loc, decl.ty, &decl.names);
        }
        for stmt in &block.stmts {
            self.visit_stmt(stmt);
        }

        self.table.exit();
        Type::Void
    }

    fn visit_call_stmt(&mut self, loc: &Loc, name: &str, args: &[Expr]) -> Type {
        let ret = self.visit_call(loc, name, args);
        if ret != Type::Void && !ret.is_error() {
            self.report(
                loc.line(),
                format!("valor de '{}' tem de ser atribuido a uma variavel", name),
            );
        }

        Type::Void
    }

    fn visit_return(&mut self, loc: &Loc, value: Option<&Expr>) -> Type {
        let ret = match self.current_ret {
            None => {
                self.report(loc.line(), "'retorna' fora de uma funcao".to_string());
                return Type::Void;
            }
            Some(ret) => ret,
        };

        self.has_return = true;

        if let Some(expr) = value {
            let value_ty = self.visit_expr(expr);

            if ret == Type::Void {
                self.report(loc.line(), "funcao nao deve retornar valor".to_string());
            } else if !value_ty.is_error() && !value_ty.assignable_to(ret) {
                self.report(
                    loc.line(),
                    format!("tipo incompativel no retorno: esperado {}, encontrado {}", ret, value_ty),
                );
            }
        } else if ret != Type::Void {
            self.report(loc.line(), format!("funcao deve retornar um valor do tipo {}", ret));
        }

        Type::Void
    }

    fn visit_empty(&mut self, _loc: &Loc) -> Type {
        Type::Void
    }
}

#[cfg(test)]
mod tests {
    use crate::ast::{Decl, Function, Param, Program};

    use super::*;

    fn loc(line: usize) -> Loc {
        Loc::new(line)
    }

    fn int(line: usize, value: i32) -> Expr {
        Expr::Literal(loc(line), Literal::Int(value))
    }

    fn boolean(line: usize, value: bool) -> Expr {
        Expr::Literal(loc(line), Literal::Bool(value))
    }

    fn var(line: usize, name: &str) -> Expr {
        Expr::Var(loc(line), name.to_string())
    }

    fn decl(line: usize, ty: Type, names: &[&str]) -> Decl {
        Decl {
            loc: loc(line),
            ty,
            names: names.iter().map(|n| n.to_string()).collect(),
        }
    }

    fn block(line: usize, decls: Vec<Decl>, stmts: Vec<Stmt>) -> Block {
        Block { loc: loc(line), decls, stmts }
    }

    fn function(line: usize, name: &str, params: Vec<Param>, ret: Option<Type>, body: Block) -> Function {
        Function {
            loc: loc(line),
            name: name.to_string(),
            params,
            ret,
            body,
        }
    }

    fn param(line: usize, name: &str, ty: Type) -> Param {
        Param { loc: loc(line), name: name.to_string(), ty }
    }

    fn principal(stmts: Vec<Stmt>) -> Function {
        function(1, "principal", vec![], None, block(1, vec![], stmts))
    }

    fn program(globals: Vec<Decl>, functions: Vec<Function>, end: usize) -> Program {
        Program { globals, functions, end: loc(end) }
    }

    fn messages(program: &Program) -> Vec<String> {
        let (_, diagnostics) = check(program);
        diagnostics.iter().map(|d| d.to_string()).collect()
    }

    #[test]
    fn test_empty_principal_is_clean() {
        let program = program(vec![], vec![principal(vec![])], 2);
        assert!(messages(&program).is_empty());
    }

    #[test]
    fn test_missing_principal() {
        let program = program(vec![decl(1, Type::Integer, &["x"])], vec![], 3);
        assert_eq!(messages(&program), vec!["erro na linha 3: falta funcao principal()"]);
    }

    #[test]
    fn test_duplicate_declaration() {
        let program = program(
            vec![decl(1, Type::Integer, &["x"]), decl(2, Type::Real, &["x"])],
            vec![principal(vec![])],
            4,
        );
        assert_eq!(messages(&program), vec!["erro na linha 2: 'x' ja foi declarado"]);
    }

    #[test]
    fn test_shadowing_is_legal() {
        let program = program(
            vec![decl(1, Type::Integer, &["x"])],
            vec![principal(vec![Stmt::Block(block(
                2,
                vec![decl(3, Type::String, &["x"])],
                vec![Stmt::Write(loc(4), var(4, "x"))],
            ))])],
            6,
        );
        assert!(messages(&program).is_empty());
    }

    #[test]
    fn test_undeclared_variable() {
        let program = program(
            vec![],
            vec![principal(vec![Stmt::Assign(loc(2), "x".to_string(), int(2, 1))])],
            3,
        );
        assert_eq!(messages(&program), vec!["erro na linha 2: 'x' nao foi declarado"]);
    }

    #[test]
    fn test_assignment_type_mismatch() {
        let program = program(
            vec![decl(1, Type::Integer, &["x"])],
            vec![principal(vec![Stmt::Assign(
                loc(2),
                "x".to_string(),
                Expr::Literal(loc(2), Literal::Real(1.5)),
            )])],
            3,
        );
        assert_eq!(
            messages(&program),
            vec!["erro na linha 2: operador '<-' eh invalido entre inteiro e real"]
        );
    }

    #[test]
    fn test_integer_promotes_to_real() {
        let program = program(
            vec![decl(1, Type::Real, &["x"])],
            vec![principal(vec![Stmt::Assign(loc(2), "x".to_string(), int(2, 5))])],
            3,
        );
        assert!(messages(&program).is_empty());
    }

    #[test]
    fn test_condition_must_be_boolean() {
        let program = program(
            vec![],
            vec![principal(vec![
                Stmt::If(loc(2), int(2, 1), Box::new(Stmt::Empty(loc(2))), None),
                Stmt::While(loc(3), int(3, 1), Box::new(Stmt::Empty(loc(3)))),
            ])],
            4,
        );
        assert_eq!(
            messages(&program),
            vec![
                "erro na linha 2: expressao de 'se' nao eh do tipo booleano",
                "erro na linha 3: expressao de 'enquanto' nao eh do tipo booleano",
            ]
        );
    }

    #[test]
    fn test_operator_rules() {
        let program = program(
            vec![],
            vec![principal(vec![Stmt::Write(
                loc(2),
                Expr::Binary(loc(2), BinOp::Mod, Box::new(int(2, 7)), Box::new(boolean(2, true))),
            )])],
            3,
        );
        assert_eq!(
            messages(&program),
            vec!["erro na linha 2: operador '%' so pode ser aplicado entre inteiros, nao entre inteiro e booleano"]
        );
    }

    #[test]
    fn test_error_type_suppresses_cascades() {
        // `x` is undeclared; the addition over it must not produce a second
        // diagnostic.
        let program = program(
            vec![],
            vec![principal(vec![Stmt::Write(
                loc(2),
                Expr::Binary(loc(2), BinOp::Add, Box::new(var(2, "x")), Box::new(int(2, 1))),
            )])],
            3,
        );
        assert_eq!(messages(&program), vec!["erro na linha 2: 'x' nao foi declarado"]);
    }

    #[test]
    fn test_call_arity_and_argument_types() {
        let f = function(
            1,
            "soma",
            vec![param(1, "a", Type::Integer), param(1, "b", Type::Integer)],
            Some(Type::Integer),
            block(1, vec![], vec![Stmt::Return(loc(2), Some(int(2, 0)))]),
        );
        let program = program(
            vec![decl(3, Type::Integer, &["x"])],
            vec![f, principal(vec![
                Stmt::Assign(
                    loc(5),
                    "x".to_string(),
                    Expr::Call(loc(5), "soma".to_string(), vec![int(5, 1)]),
                ),
                Stmt::Assign(
                    loc(6),
                    "x".to_string(),
                    Expr::Call(loc(6), "soma".to_string(), vec![
                        int(6, 1),
                        Expr::Literal(loc(6), Literal::Str("ola".to_string())),
                    ]),
                ),
            ])],
            8,
        );
        assert_eq!(
            messages(&program),
            vec![
                "erro na linha 5: 'soma' requer 2 argumentos",
                "erro na linha 6: '\"ola\"' devia ser do tipo inteiro",
            ]
        );
    }

    #[test]
    fn test_return_rules() {
        let f = function(
            1,
            "f",
            vec![],
            Some(Type::Integer),
            block(1, vec![], vec![]),
        );
        let g = function(
            4,
            "g",
            vec![],
            None,
            block(4, vec![], vec![Stmt::Return(loc(5), Some(int(5, 1)))]),
        );
        let program = program(vec![], vec![f, g, principal(vec![])], 8);
        assert_eq!(
            messages(&program),
            vec![
                "erro na linha 1: funcao 'f' deve retornar um valor do tipo inteiro",
                "erro na linha 5: funcao nao deve retornar valor",
            ]
        );
    }

    #[test]
    fn test_statement_call_must_be_void() {
        let f = function(
            1,
            "f",
            vec![],
            Some(Type::Integer),
            block(1, vec![], vec![Stmt::Return(loc(2), Some(int(2, 1)))]),
        );
        let program = program(
            vec![],
            vec![f, principal(vec![Stmt::Call(loc(5), "f".to_string(), vec![])])],
            6,
        );
        assert_eq!(
            messages(&program),
            vec!["erro na linha 5: valor de 'f' tem de ser atribuido a uma variavel"]
        );
    }

    #[test]
    fn test_diagnostics_sorted_and_deduplicated() {
        let program = program(
            vec![],
            vec![principal(vec![
                Stmt::Write(loc(4), var(4, "y")),
                Stmt::Write(loc(2), var(2, "y")),
                Stmt::Write(loc(2), var(2, "y")),
            ])],
            5,
        );
        assert_eq!(
            messages(&program),
            vec![
                "erro na linha 2: 'y' nao foi declarado",
                "erro na linha 4: 'y' nao foi declarado",
            ]
        );
    }

    #[test]
    fn test_forward_reference_between_functions() {
        let caller = function(
            1,
            "principal",
            vec![],
            None,
            block(1, vec![], vec![Stmt::Call(loc(2), "depois".to_string(), vec![])]),
        );
        let callee = function(4, "depois", vec![], None, block(4, vec![], vec![]));
        let program = program(vec![], vec![caller, callee], 6);
        assert!(messages(&program).is_empty());
    }
}
