mod machine;
mod ops;
mod pool;
mod program;
mod value;

pub use machine::Vm;
pub use ops::OpCode;
pub use pool::{Constant, ConstantPool};
pub use program::Program;
pub use value::Value;
