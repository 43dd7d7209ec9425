use fnv::FnvHashMap;

use crate::{
    ast::{BinOp, Block, Decl, Expr, ExprVisitor, Function, Literal, Stmt, StmtVisitor, UnaryOp},
    errors,
    semantic::{Symbol, SymbolTable, Type},
    vm::{ConstantPool, OpCode, Program},
    Loc, TugaError,
};

const ADVICE: &str = "This is a bug in the compiler; report it along with the program that produced it.";

/// Lowers a type-checked program into stack-machine instructions.
///
/// Code is laid out as one `galloc` per global declaration, a call to
/// `principal` followed by `halt`, and then each function's body in source
/// order. A function's entry address is recorded before its body is
/// generated, so calls to functions that appear earlier resolve immediately;
/// calls to functions that appear later are emitted as `call 0` and patched
/// once every body has been generated.
pub struct Generator<'a> {
    table: &'a mut SymbolTable,
    code: Vec<OpCode>,
    pool: ConstantPool,

    globals: FnvHashMap<String, (usize, Type)>,
    next_global: usize,

    locals: FnvHashMap<String, (i32, Type)>,
    next_local: i32,

    functions: FnvHashMap<String, usize>,
    pending_calls: FnvHashMap<String, Vec<usize>>,

    current_ret: Type,
    current_params: usize,
}

impl<'a> Generator<'a> {
    pub fn new(table: &'a mut SymbolTable) -> Self {
        Self {
            table,
            code: Vec::new(),
            pool: ConstantPool::default(),
            globals: FnvHashMap::default(),
            next_global: 0,
            locals: FnvHashMap::default(),
            next_local: 2,
            functions: FnvHashMap::default(),
            pending_calls: FnvHashMap::default(),
            current_ret: Type::Void,
            current_params: 0,
        }
    }

    pub fn gen_program(&mut self, program: &crate::ast::Program) -> Result<(), TugaError> {
        for decl in &program.globals {
            self.declare_globals(decl);
        }

        let main_call = self.code.len();
        self.emit(OpCode::Call(0));
        self.emit(OpCode::Halt);

        for function in &program.functions {
            self.gen_function(function)?;
        }

        match self.functions.get("principal") {
            Some(&address) => self.code[main_call] = OpCode::Call(address),
            None => {
                return Err(errors::generator(
                    "the program has no principal() function",
                    ADVICE,
                ))
            }
        }

        let pending = std::mem::take(&mut self.pending_calls);
        for (name, sites) in pending {
            let address = *self.functions.get(&name).ok_or_else(|| {
                errors::generator(format!("a call to '{}' was never resolved", name), ADVICE)
            })?;
            for site in sites {
                self.code[site] = OpCode::Call(address);
            }
        }

        Ok(())
    }

    pub fn finish(self) -> Program {
        Program { pool: self.pool, code: self.code }
    }

    fn gen_function(&mut self, function: &Function) -> Result<(), TugaError> {
        self.functions.insert(function.name.clone(), self.code.len());

        if !self.table.restore(&function.name) {
            return Err(errors::generator(
                format!("no scope was recorded for function '{}'", function.name),
                ADVICE,
            ));
        }

        let saved_locals = std::mem::take(&mut self.locals);
        let saved_next = std::mem::replace(&mut self.next_local, 2);
        let saved_ret = std::mem::replace(&mut self.current_ret, function.ret.unwrap_or(Type::Void));
        let saved_params = std::mem::replace(&mut self.current_params, function.params.len());

        // Arguments sit below the frame header, the first one deepest.
        let count = function.params.len() as i32;
        for (i, param) in function.params.iter().enumerate() {
            self.locals.insert(param.name.clone(), (i as i32 - count, param.ty));
        }

        // The body block shares the function's frame rather than opening a
        // nested block of its own.
        let mut local_count = 0;
        for decl in &function.body.decls {
            local_count += decl.names.len();
            self.declare_locals(decl);
        }

        // Every top-level statement is emitted: an `if` whose then-branch
        // returns still falls through to the rest of the body when the
        // condition is false. Only nested blocks prune their pop on the
        // may-return path.
        for stmt in &function.body.stmts {
            self.visit_stmt(stmt)?;
        }

        // A void function may fall off the end of its body, so it gets an
        // implicit return.
        if self.current_ret == Type::Void {
            if local_count > 0 {
                self.emit(OpCode::Pop(local_count));
            }
            self.emit(OpCode::Ret(self.current_params));
        }

        self.locals = saved_locals;
        self.next_local = saved_next;
        self.current_ret = saved_ret;
        self.current_params = saved_params;
        self.table.exit();

        Ok(())
    }

    fn declare_globals(&mut self, decl: &Decl) {
        for name in &decl.names {
            self.globals.insert(name.clone(), (self.next_global, decl.ty));
            self.next_global += 1;
        }
        self.emit(OpCode::Galloc(decl.names.len()));
    }

    fn declare_locals(&mut self, decl: &Decl) {
        for name in &decl.names {
            self.locals.insert(name.clone(), (self.next_local, decl.ty));
            self.next_local += 1;
        }
        self.emit(OpCode::Lalloc(decl.names.len()));
    }

    fn emit(&mut self, op: OpCode) {
        self.code.push(op);
    }

    /// Emits a placeholder jump and returns its index for later patching.
    fn placeholder(&mut self, op: OpCode) -> usize {
        let at = self.code.len();
        self.emit(op);
        at
    }

    fn patch(&mut self, at: usize, op: OpCode) {
        self.code[at] = op;
    }

    /// Re-derives the static type of an expression from the generator's
    /// address maps and the symbol table. The program has already been
    /// checked, so failure here is a compiler bug.
    fn type_of(&self, expr: &Expr) -> Result<Type, TugaError> {
        match expr {
            Expr::Literal(_, Literal::Int(..)) => Ok(Type::Integer),
            Expr::Literal(_, Literal::Real(..)) => Ok(Type::Real),
            Expr::Literal(_, Literal::Str(..)) => Ok(Type::String),
            Expr::Literal(_, Literal::Bool(..)) => Ok(Type::Boolean),
            Expr::Var(_, name) => self
                .locals
                .get(name)
                .map(|&(_, ty)| ty)
                .or_else(|| self.globals.get(name).map(|&(_, ty)| ty))
                .ok_or_else(|| {
                    errors::generator(format!("'{}' has no allocated address", name), ADVICE)
                }),
            Expr::Unary(_, UnaryOp::Neg, operand) => self.type_of(operand),
            Expr::Unary(_, UnaryOp::Not, _) => Ok(Type::Boolean),
            Expr::Binary(_, op, left, right) => {
                let left_ty = self.type_of(left)?;
                let right_ty = self.type_of(right)?;
                Ok(match op {
                    BinOp::Add if left_ty == Type::String || right_ty == Type::String => Type::String,
                    BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div => {
                        if left_ty == Type::Integer && right_ty == Type::Integer {
                            Type::Integer
                        } else {
                            Type::Real
                        }
                    }
                    BinOp::Mod => Type::Integer,
                    _ => Type::Boolean,
                })
            }
            Expr::Call(_, name, _) => match self.table.resolve(name) {
                Some(Symbol::Function { ret, .. }) => Ok(*ret),
                _ => Err(errors::generator(
                    format!("'{}' is not a known function", name),
                    ADVICE,
                )),
            },
        }
    }

    /// Emits an expression, promoting it to a real when the context needs
    /// one and the expression is an integer.
    fn gen_numeric(&mut self, expr: &Expr, promote: bool) -> Result<(), TugaError> {
        let ty = self.type_of(expr)?;
        self.visit_expr(expr)?;
        if promote && ty == Type::Integer {
            self.emit(OpCode::Itod);
        }
        Ok(())
    }

    /// Emits an expression followed by the conversion that turns its value
    /// into a string.
    fn gen_string(&mut self, expr: &Expr) -> Result<(), TugaError> {
        let ty = self.type_of(expr)?;
        self.visit_expr(expr)?;
        match ty {
            Type::String => {}
            Type::Integer => self.emit(OpCode::Itos),
            Type::Real => self.emit(OpCode::Dtos),
            Type::Boolean => self.emit(OpCode::Btos),
            ty => {
                return Err(errors::generator(
                    format!("a value of type {} cannot be turned into a string", ty),
                    ADVICE,
                ))
            }
        }
        Ok(())
    }

    fn gen_call(&mut self, name: &str, args: &[Expr]) -> Result<Type, TugaError> {
        let (params, ret) = match self.table.resolve(name) {
            Some(Symbol::Function { params, ret, .. }) => (params.clone(), *ret),
            _ => {
                return Err(errors::generator(
                    format!("'{}' is not a known function", name),
                    ADVICE,
                ))
            }
        };

        for (arg, (_, param_ty)) in args.iter().zip(params.iter()) {
            self.gen_numeric(arg, *param_ty == Type::Real)?;
        }

        if let Some(&address) = self.functions.get(name) {
            self.emit(OpCode::Call(address));
        } else {
            let site = self.placeholder(OpCode::Call(0));
            self.pending_calls.entry(name.to_string()).or_default().push(site);
        }

        Ok(ret)
    }
}

/// Whether a statement is guaranteed to have emitted a return by the time it
/// finishes. Loop bodies are not inspected, and an `if` counts as returning
/// when either branch does; the virtual machine tolerates the unreachable
/// code this approximation leaves behind.
fn contains_return(stmt: &Stmt) -> bool {
    match stmt {
        Stmt::Return(..) => true,
        Stmt::Block(block) => block.stmts.iter().any(contains_return),
        Stmt::If(_, _, then_branch, else_branch) => {
            contains_return(then_branch)
                || else_branch.as_deref().map(contains_return).unwrap_or(false)
        }
        _ => false,
    }
}

impl ExprVisitor<Result<(), TugaError>> for Generator<'_> {
    fn visit_literal(&mut self, _loc: &Loc, value: &Literal) -> Result<(), TugaError> {
        match value {
            Literal::Int(value) => self.emit(OpCode::Iconst(*value)),
            Literal::Real(value) => {
                let index = self.pool.add_real(*value);
                self.emit(OpCode::Dconst(index));
            }
            Literal::Str(value) => {
                let index = self.pool.add_str(value);
                self.emit(OpCode::Sconst(index));
            }
            Literal::Bool(true) => self.emit(OpCode::Tconst),
            Literal::Bool(false) => self.emit(OpCode::Fconst),
        }
        Ok(())
    }

    fn visit_var(&mut self, _loc: &Loc, name: &str) -> Result<(), TugaError> {
        if let Some(&(address, _)) = self.locals.get(name) {
            self.emit(OpCode::Lload(address));
        } else if let Some(&(address, _)) = self.globals.get(name) {
            self.emit(OpCode::Gload(address));
        } else {
            return Err(errors::generator(
                format!("'{}' has no allocated address", name),
                ADVICE,
            ));
        }
        Ok(())
    }

    fn visit_unary(&mut self, _loc: &Loc, op: UnaryOp, operand: &Expr) -> Result<(), TugaError> {
        self.visit_expr(operand)?;
        match op {
            UnaryOp::Neg => match self.type_of(operand)? {
                Type::Integer => self.emit(OpCode::Iuminus),
                _ => self.emit(OpCode::Duminus),
            },
            UnaryOp::Not => self.emit(OpCode::Not),
        }
        Ok(())
    }

    fn visit_binary(&mut self, _loc: &Loc, op: BinOp, left: &Expr, right: &Expr) -> Result<(), TugaError> {
        let left_ty = self.type_of(left)?;
        let right_ty = self.type_of(right)?;
        let real = left_ty == Type::Real || right_ty == Type::Real;

        match op {
            BinOp::Add if left_ty == Type::String || right_ty == Type::String => {
                self.gen_string(left)?;
                self.gen_string(right)?;
                self.emit(OpCode::Sconcat);
            }
            BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div => {
                self.gen_numeric(left, real)?;
                self.gen_numeric(right, real)?;
                self.emit(match (op, real) {
                    (BinOp::Add, false) => OpCode::Iadd,
                    (BinOp::Add, true) => OpCode::Dadd,
                    (BinOp::Sub, false) => OpCode::Isub,
                    (BinOp::Sub, true) => OpCode::Dsub,
                    (BinOp::Mul, false) => OpCode::Imult,
                    (BinOp::Mul, true) => OpCode::Dmult,
                    (_, false) => OpCode::Idiv,
                    (_, true) => OpCode::Ddiv,
                });
            }
            BinOp::Mod => {
                self.visit_expr(left)?;
                self.visit_expr(right)?;
                self.emit(OpCode::Imod);
            }
            BinOp::Lt | BinOp::Le => {
                self.gen_numeric(left, real)?;
                self.gen_numeric(right, real)?;
                self.emit(match (op, real) {
                    (BinOp::Lt, false) => OpCode::Ilt,
                    (BinOp::Lt, true) => OpCode::Dlt,
                    (_, false) => OpCode::Ileq,
                    (_, true) => OpCode::Dleq,
                });
            }
            // There is no greater-than opcode: `a > b` is emitted as `b < a`
            // by generating the right operand first.
            BinOp::Gt | BinOp::Ge => {
                self.gen_numeric(right, real)?;
                self.gen_numeric(left, real)?;
                self.emit(match (op, real) {
                    (BinOp::Gt, false) => OpCode::Ilt,
                    (BinOp::Gt, true) => OpCode::Dlt,
                    (_, false) => OpCode::Ileq,
                    (_, true) => OpCode::Dleq,
                });
            }
            BinOp::Eq | BinOp::Ne => {
                if left_ty == Type::Boolean {
                    self.visit_expr(left)?;
                    self.visit_expr(right)?;
                    self.emit(if op == BinOp::Eq { OpCode::Beq } else { OpCode::Bneq });
                } else if left_ty == Type::String {
                    self.visit_expr(left)?;
                    self.visit_expr(right)?;
                    self.emit(if op == BinOp::Eq { OpCode::Seq } else { OpCode::Sneq });
                } else {
                    self.gen_numeric(left, real)?;
                    self.gen_numeric(right, real)?;
                    self.emit(match (op, real) {
                        (BinOp::Eq, false) => OpCode::Ieq,
                        (BinOp::Eq, true) => OpCode::Deq,
                        (_, false) => OpCode::Ineq,
                        (_, true) => OpCode::Dneq,
                    });
                }
            }
            // Both operands are always evaluated; the language has no
            // short-circuit semantics.
            BinOp::And => {
                self.visit_expr(left)?;
                self.visit_expr(right)?;
                self.emit(OpCode::And);
            }
            BinOp::Or => {
                self.visit_expr(left)?;
                self.visit_expr(right)?;
                self.emit(OpCode::Or);
            }
        }

        Ok(())
    }

    fn visit_call(&mut self, _loc: &Loc, name: &str, args: &[Expr]) -> Result<(), TugaError> {
        self.gen_call(name, args)?;
        Ok(())
    }
}

impl StmtVisitor<Result<(), TugaError>> for Generator<'_> {
    fn visit_write(&mut self, _loc: &Loc, expr: &Expr) -> Result<(), TugaError> {
        let ty = self.type_of(expr)?;
        self.visit_expr(expr)?;
        match ty {
            Type::Integer => self.emit(OpCode::Iprint),
            Type::Real => self.emit(OpCode::Dprint),
            Type::String => self.emit(OpCode::Sprint),
            Type::Boolean => self.emit(OpCode::Bprint),
            ty => {
                return Err(errors::generator(
                    format!("a value of type {} cannot be written", ty),
                    ADVICE,
                ))
            }
        }
        Ok(())
    }

    fn visit_assign(&mut self, _loc: &Loc, name: &str, value: &Expr) -> Result<(), TugaError> {
        enum Slot {
            Local(i32),
            Global(usize),
        }

        let (slot, target_ty) = if let Some(&(address, ty)) = self.locals.get(name) {
            (Slot::Local(address), ty)
        } else if let Some(&(address, ty)) = self.globals.get(name) {
            (Slot::Global(address), ty)
        } else {
            return Err(errors::generator(
                format!("'{}' has no allocated address", name),
                ADVICE,
            ));
        };

        self.gen_numeric(value, target_ty == Type::Real)?;

        match slot {
            Slot::Local(address) => self.emit(OpCode::Lstore(address)),
            Slot::Global(address) => self.emit(OpCode::Gstore(address)),
        }

        Ok(())
    }

    fn visit_if(&mut self, _loc: &Loc, cond: &Expr, then_branch: &Stmt, else_branch: Option<&Stmt>) -> Result<(), TugaError> {
        self.visit_expr(cond)?;
        let skip_then = self.placeholder(OpCode::Jumpf(0));

        self.visit_stmt(then_branch)?;

        if let Some(else_branch) = else_branch {
            let skip_else = self.placeholder(OpCode::Jump(0));
            let target = self.code.len();
            self.patch(skip_then, OpCode::Jumpf(target));

            self.visit_stmt(else_branch)?;
            let target = self.code.len();
            self.patch(skip_else, OpCode::Jump(target));
        } else {
            let target = self.code.len();
            self.patch(skip_then, OpCode::Jumpf(target));
        }

        Ok(())
    }

    fn visit_while(&mut self, _loc: &Loc, cond: &Expr, body: &Stmt) -> Result<(), TugaError> {
        let start = self.code.len();
        self.visit_expr(cond)?;
        let exit = self.placeholder(OpCode::Jumpf(0));

        self.visit_stmt(body)?;
        self.emit(OpCode::Jump(start));

        let target = self.code.len();
        self.patch(exit, OpCode::Jumpf(target));
        Ok(())
    }

    fn visit_block(&mut self, block: &Block) -> Result<(), TugaError> {
        let saved_locals = self.locals.clone();
        let saved_next = self.next_local;

        let mut local_count = 0;
        for decl in &block.decls {
            local_count += decl.names.len();
            self.declare_locals(decl);
        }

        let mut has_return = false;
        for stmt in &block.stmts {
            self.visit_stmt(stmt)?;
            if contains_return(stmt) {
                has_return = true;
                break;
            }
        }

        // A return unwinds the whole frame, so the block's locals only need
        // an explicit pop on the fall-through path.
        if local_count > 0 && !has_return {
            self.emit(OpCode::Pop(local_count));
        }

        self.locals = saved_locals;
        self.next_local = saved_next;
        Ok(())
    }

    fn visit_call_stmt(&mut self, _loc: &Loc, name: &str, args: &[Expr]) -> Result<(), TugaError> {
        let ret = self.gen_call(name, args)?;
        if ret != Type::Void {
            self.emit(OpCode::Pop(1));
        }
        Ok(())
    }

    fn visit_return(&mut self, _loc: &Loc, value: Option<&Expr>) -> Result<(), TugaError> {
        match value {
            Some(expr) => {
                self.gen_numeric(expr, self.current_ret == Type::Real)?;
                self.emit(OpCode::Retval(self.current_params));
            }
            None => self.emit(OpCode::Ret(self.current_params)),
        }
        Ok(())
    }

    fn visit_empty(&mut self, _loc: &Loc) -> Result<(), TugaError> {
        Ok(())
    }
}
