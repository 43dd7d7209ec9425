mod checker;
mod scope;
mod symbol;
mod types;

pub use checker::{check, Diagnostic, TypeChecker};
pub use scope::SymbolTable;
pub use symbol::Symbol;
pub use types::Type;
