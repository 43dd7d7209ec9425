use std::fmt;

/// The types a Tuga expression can take. `Error` is a sentinel assigned to
/// expressions which already produced a diagnostic, so that the checker does
/// not cascade further errors out of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Type {
    Boolean,
    Integer,
    String,
    Real,
    Void,
    Error,
}

impl Type {
    pub fn is_numeric(&self) -> bool {
        matches!(self, Type::Integer | Type::Real)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Type::Error)
    }

    /// Whether a value of this type may be stored in a slot of type `target`.
    /// The only implicit promotion in the language is Integer into Real.
    pub fn assignable_to(&self, target: Type) -> bool {
        *self == target || (*self == Type::Integer && target == Type::Real)
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Type::Boolean => write!(f, "booleano"),
            Type::Integer => write!(f, "inteiro"),
            Type::String => write!(f, "string"),
            Type::Real => write!(f, "real"),
            Type::Void => write!(f, "vazio"),
            Type::Error => write!(f, "erro"),
        }
    }
}
