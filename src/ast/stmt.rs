use crate::{semantic::Type, Loc};

use super::Expr;

/// A whole compilation unit: global variable declarations followed by
/// function declarations. `end` is the line of the closing token, where
/// program-level diagnostics (such as a missing entry point) are reported.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub globals: Vec<Decl>,
    pub functions: Vec<Function>,
    pub end: Loc,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub loc: Loc,
    pub name: String,
    pub params: Vec<Param>,
    pub ret: Option<Type>,
    pub body: Block,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub loc: Loc,
    pub name: String,
    pub ty: Type,
}

/// One `tipo nome1, nome2, ...;` declaration statement.
#[derive(Debug, Clone, PartialEq)]
pub struct Decl {
    pub loc: Loc,
    pub ty: Type,
    pub names: Vec<String>,
}

/// A brace-delimited block: declarations first, then instructions.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub loc: Loc,
    pub decls: Vec<Decl>,
    pub stmts: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Write(Loc, Expr),
    Assign(Loc, String, Expr),
    If(Loc, Expr, Box<Stmt>, Option<Box<Stmt>>),
    While(Loc, Expr, Box<Stmt>),
    Block(Block),
    Call(Loc, String, Vec<Expr>),
    Return(Loc, Option<Expr>),
    Empty(Loc),
}

pub trait StmtVisitor<T>: super::ExprVisitor<T> {
    fn visit_stmt(&mut self, stmt: &Stmt) -> T {
        match stmt {
            Stmt::Write(loc, expr) => self.visit_write(loc, expr),
            Stmt::Assign(loc, name, value) => self.visit_assign(loc, name, value),
            Stmt::If(loc, cond, then_branch, else_branch) => {
                self.visit_if(loc, cond, then_branch, else_branch.as_deref())
            }
            Stmt::While(loc, cond, body) => self.visit_while(loc, cond, body),
            Stmt::Block(block) => self.visit_block(block),
            Stmt::Call(loc, name, args) => self.visit_call_stmt(loc, name, args),
            Stmt::Return(loc, value) => self.visit_return(loc, value.as_ref()),
            Stmt::Empty(loc) => self.visit_empty(loc),
        }
    }

    fn visit_write(&mut self, loc: &Loc, expr: &Expr) -> T;

    fn visit_assign(&mut self, loc: &Loc, name: &str, value: &Expr) -> T;

    fn visit_if(&mut self, loc: &Loc, cond: &Expr, then_branch: &Stmt, else_branch: Option<&Stmt>) -> T;

    fn visit_while(&mut self, loc: &Loc, cond: &Expr, body: &Stmt) -> T;

    fn visit_block(&mut self, block: &Block) -> T;

    fn visit_call_stmt(&mut self, loc: &Loc, name: &str, args: &[Expr]) -> T;

    fn visit_return(&mut self, loc: &Loc, value: Option<&Expr>) -> T;

    fn visit_empty(&mut self, loc: &Loc) -> T;
}
