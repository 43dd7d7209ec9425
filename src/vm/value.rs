use std::fmt;

/// A runtime stack or global-memory slot. Booleans are represented as the
/// integers 0 and 1 and only re-acquire a boolean meaning at the boolean
/// opcodes. `Null` marks a slot that was allocated but never written; reading
/// one is a runtime error.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Value {
    #[default]
    Null,
    Int(i32),
    Real(f64),
    Str(String),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Int(..) => "integer",
            Value::Real(..) => "real",
            Value::Str(..) => "string",
        }
    }
}

// Whole reals keep one decimal place so that `4.0` does not print as an
// integer; everything else uses the shortest representation.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Int(value) => write!(f, "{}", value),
            Value::Real(value) if value.fract() == 0.0 && value.is_finite() => {
                write!(f, "{:.1}", value)
            }
            Value::Real(value) => write!(f, "{}", value),
            Value::Str(value) => write!(f, "{}", value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_real_formatting() {
        assert_eq!(format!("{}", Value::Real(4.0)), "4.0");
        assert_eq!(format!("{}", Value::Real(-2.0)), "-2.0");
        assert_eq!(format!("{}", Value::Real(3.5)), "3.5");
        assert_eq!(format!("{}", Value::Real(0.25)), "0.25");
    }

    #[test]
    fn test_default_is_null() {
        assert_eq!(Value::default(), Value::Null);
    }
}
