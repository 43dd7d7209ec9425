use std::fmt;

use crate::Loc;

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Int(i32),
    Real(f64),
    Str(String),
    Bool(bool),
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Literal::Int(value) => write!(f, "{}", value),
            Literal::Real(value) if value.fract() == 0.0 && value.is_finite() => {
                write!(f, "{:.1}", value)
            }
            Literal::Real(value) => write!(f, "{}", value),
            Literal::Str(value) => write!(f, "\"{}\"", value),
            Literal::Bool(true) => write!(f, "verdadeiro"),
            Literal::Bool(false) => write!(f, "falso"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            UnaryOp::Neg => write!(f, "-"),
            UnaryOp::Not => write!(f, "nao"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    And,
    Or,
}

impl BinOp {
    /// The operator's spelling in source programs, used in diagnostics.
    pub fn lexeme(&self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Mod => "%",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
            BinOp::Eq => "igual",
            BinOp::Ne => "diferente",
            BinOp::And => "e",
            BinOp::Or => "ou",
        }
    }

    /// Keyword operators are separated from their operands by spaces when an
    /// expression is rendered back into source form.
    fn spelled_out(&self) -> bool {
        matches!(self, BinOp::Eq | BinOp::Ne | BinOp::And | BinOp::Or)
    }
}

impl fmt::Display for BinOp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.lexeme())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Loc, Literal),
    Var(Loc, String),
    Unary(Loc, UnaryOp, Box<Expr>),
    Binary(Loc, BinOp, Box<Expr>, Box<Expr>),
    Call(Loc, String, Vec<Expr>),
}

impl Expr {
    pub fn loc(&self) -> Loc {
        match self {
            Expr::Literal(loc, ..) => *loc,
            Expr::Var(loc, ..) => *loc,
            Expr::Unary(loc, ..) => *loc,
            Expr::Binary(loc, ..) => *loc,
            Expr::Call(loc, ..) => *loc,
        }
    }
}

// Diagnostics quote the offending expression, so expressions render back
// into a compact source form.
impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Expr::Literal(_, value) => write!(f, "{}", value),
            Expr::Var(_, name) => write!(f, "{}", name),
            Expr::Unary(_, UnaryOp::Neg, operand) => write!(f, "-{}", operand),
            Expr::Unary(_, UnaryOp::Not, operand) => write!(f, "nao {}", operand),
            Expr::Binary(_, op, left, right) if op.spelled_out() => {
                write!(f, "{} {} {}", left, op, right)
            }
            Expr::Binary(_, op, left, right) => write!(f, "{}{}{}", left, op, right),
            Expr::Call(_, name, args) => {
                write!(f, "{}(", name)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ")")
            }
        }
    }
}

pub trait ExprVisitor<T> {
    fn visit_expr(&mut self, expr: &Expr) -> T {
        match expr {
            Expr::Literal(loc, value) => self.visit_literal(loc, value),
            Expr::Var(loc, name) => self.visit_var(loc, name),
            Expr::Unary(loc, op, operand) => self.visit_unary(loc, *op, operand),
            Expr::Binary(loc, op, left, right) => self.visit_binary(loc, *op, left, right),
            Expr::Call(loc, name, args) => self.visit_call(loc, name, args),
        }
    }

    fn visit_literal(&mut self, loc: &Loc, value: &Literal) -> T;

    fn visit_var(&mut self, loc: &Loc, name: &str) -> T;

    fn visit_unary(&mut self, loc: &Loc, op: UnaryOp, operand: &Expr) -> T;

    fn visit_binary(&mut self, loc: &Loc, op: BinOp, left: &Expr, right: &Expr) -> T;

    fn visit_call(&mut self, loc: &Loc, name: &str, args: &[Expr]) -> T;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render() {
        let expr = Expr::Binary(
            Loc::new(1),
            BinOp::Add,
            Box::new(Expr::Literal(Loc::new(1), Literal::Int(2))),
            Box::new(Expr::Binary(
                Loc::new(1),
                BinOp::Mul,
                Box::new(Expr::Literal(Loc::new(1), Literal::Int(3))),
                Box::new(Expr::Var(Loc::new(1), "x".to_string())),
            )),
        );

        assert_eq!(format!("{}", expr), "2+3*x");
    }

    #[test]
    fn test_render_keywords() {
        let expr = Expr::Binary(
            Loc::new(1),
            BinOp::And,
            Box::new(Expr::Literal(Loc::new(1), Literal::Bool(true))),
            Box::new(Expr::Call(Loc::new(1), "f".to_string(), vec![
                Expr::Literal(Loc::new(1), Literal::Real(4.0)),
            ])),
        );

        assert_eq!(format!("{}", expr), "verdadeiro e f(4.0)");
    }
}
