mod gen;

pub use gen::Generator;

use crate::{ast, semantic::SymbolTable, vm, TugaError};

/// Lowers a checked program into an executable `vm::Program`. The symbol
/// table must be the one produced by the type checker for the same program,
/// positioned back at the global scope.
pub fn generate(program: &ast::Program, table: &mut SymbolTable) -> Result<vm::Program, TugaError> {
    let mut generator = Generator::new(table);
    generator.gen_program(program)?;
    Ok(generator.finish())
}
