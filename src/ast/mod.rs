mod expr;
mod stmt;

pub use expr::{BinOp, Expr, ExprVisitor, Literal, UnaryOp};
pub use stmt::{Block, Decl, Function, Param, Program, Stmt, StmtVisitor};
