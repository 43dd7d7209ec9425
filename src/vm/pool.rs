use fnv::FnvHashMap;

/// An entry in a program's constant pool. Integers and booleans are encoded
/// directly into instruction operands, so only reals and strings live here.
#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    Real(f64),
    Str(String),
}

/// The pool of real and string constants referenced by `dconst` and `sconst`
/// operands. Adding a value that is already present returns the existing
/// index, so each distinct constant is stored once.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConstantPool {
    entries: Vec<Constant>,
    reals: FnvHashMap<u64, usize>,
    strings: FnvHashMap<String, usize>,
}

impl ConstantPool {
    pub fn add_real(&mut self, value: f64) -> usize {
        // NaN never occurs in source literals, so keying on the raw bits is
        // a sound identity for pool purposes.
        if let Some(&index) = self.reals.get(&value.to_bits()) {
            return index;
        }

        let index = self.entries.len();
        self.entries.push(Constant::Real(value));
        self.reals.insert(value.to_bits(), index);
        index
    }

    pub fn add_str(&mut self, value: &str) -> usize {
        if let Some(&index) = self.strings.get(value) {
            return index;
        }

        let index = self.entries.len();
        self.entries.push(Constant::Str(value.to_string()));
        self.strings.insert(value.to_string(), index);
        index
    }

    pub fn get(&self, index: usize) -> Option<&Constant> {
        self.entries.get(index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Constant> {
        self.entries.iter()
    }

    /// Appends an entry verbatim, preserving the index order of a serialized
    /// pool being read back in.
    pub(crate) fn push(&mut self, constant: Constant) {
        let index = self.entries.len();
        match &constant {
            Constant::Real(value) => {
                self.reals.entry(value.to_bits()).or_insert(index);
            }
            Constant::Str(value) => {
                self.strings.entry(value.clone()).or_insert(index);
            }
        }
        self.entries.push(constant);
    }
}
