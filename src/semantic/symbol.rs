use super::Type;

/// A named entity owned by exactly one scope: either a variable (including
/// function parameters) or a function signature.
#[derive(Debug, Clone, PartialEq)]
pub enum Symbol {
    Variable {
        name: String,
        ty: Type,
        param: bool,
    },
    Function {
        name: String,
        ret: Type,
        params: Vec<(String, Type)>,
        /// Set by the type checker when the function body contains an
        /// explicit `retorna`.
        returns: bool,
    },
}

impl Symbol {
    pub fn variable<N: Into<String>>(name: N, ty: Type) -> Self {
        Symbol::Variable { name: name.into(), ty, param: false }
    }

    pub fn parameter<N: Into<String>>(name: N, ty: Type) -> Self {
        Symbol::Variable { name: name.into(), ty, param: true }
    }

    pub fn function<N: Into<String>>(name: N, ret: Type, params: Vec<(String, Type)>) -> Self {
        Symbol::Function { name: name.into(), ret, params, returns: false }
    }

    pub fn name(&self) -> &str {
        match self {
            Symbol::Variable { name, .. } => name,
            Symbol::Function { name, .. } => name,
        }
    }

    /// The type an occurrence of this symbol's name evaluates to: the
    /// variable's type, or the function's return type.
    pub fn ty(&self) -> Type {
        match self {
            Symbol::Variable { ty, .. } => *ty,
            Symbol::Function { ret, .. } => *ret,
        }
    }

    pub fn is_function(&self) -> bool {
        matches!(self, Symbol::Function { .. })
    }
}
