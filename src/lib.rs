mod core;
pub mod ast;
pub mod semantic;
pub mod codegen;
pub mod vm;

pub use crate::core::errors::{self, TugaError};
pub use crate::core::{CaptureOutput, Loc};
