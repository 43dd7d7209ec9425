use std::fmt;

/// Source line carried by every syntax-tree node, used for diagnostics.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Loc {
    line: usize,
}

impl Loc {
    pub fn new(line: usize) -> Self {
        Self { line }
    }

    pub fn line(&self) -> usize {
        self.line
    }
}

impl From<usize> for Loc {
    fn from(line: usize) -> Self {
        Self::new(line)
    }
}

impl fmt::Display for Loc {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "linha {}", self.line)
    }
}
