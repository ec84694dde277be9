use std::collections::HashMap;

/// An interned name: method names, argument names, cast kinds, symbol literals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NameRef(u32);

impl NameRef {
    pub const fn no_name() -> Self {
        Self(0)
    }

    pub const fn exists(self) -> bool {
        self.0 != 0
    }

    pub const fn to_idx(self) -> usize {
        self.0 as usize
    }

    /// `T.let(x, T)`: a checked annotation.
    pub const fn let_() -> Self {
        Self(1)
    }

    /// `T.cast(x, T)`: an unchecked coercion.
    pub const fn cast() -> Self {
        Self(2)
    }

    /// `T.assert_type!(x, T)`: a checked assertion.
    pub const fn assert_type() -> Self {
        Self(3)
    }

    /// `T.unsafe(x)`: forgets everything known about `x`.
    pub const fn unsafe_() -> Self {
        Self(4)
    }

    pub const fn square_brackets() -> Self {
        Self(5)
    }

    pub const fn self_() -> Self {
        Self(6)
    }

    pub const fn blk() -> Self {
        Self(7)
    }

    pub const fn exception() -> Self {
        Self(8)
    }

    pub const fn ret() -> Self {
        Self(9)
    }

    /// The class-level constructor, `Foo.new`.
    pub const fn new_() -> Self {
        Self(10)
    }
}

// Must stay in the order of the well-known constructors above.
const WELL_KNOWN: &[&str] = &[
    "<none>",
    "let",
    "cast",
    "assert_type!",
    "unsafe",
    "[]",
    "<self>",
    "<blk>",
    "<exception>",
    "<ret>",
    "new",
];

/// The name interning table.
#[derive(Debug, Clone)]
pub struct NameTable {
    names: Vec<String>,
    lookup: HashMap<String, NameRef>,
}

impl Default for NameTable {
    fn default() -> Self {
        Self::new()
    }
}

impl NameTable {
    pub fn new() -> Self {
        let mut table = Self {
            names: Vec::new(),
            lookup: HashMap::new(),
        };
        for name in WELL_KNOWN {
            table.intern(name);
        }
        table
    }

    /// Interns the given name, returning the existing handle if it was already interned.
    pub fn intern(&mut self, name: &str) -> NameRef {
        if let Some(existing) = self.lookup.get(name) {
            return *existing;
        }
        let idx = NameRef(u32::try_from(self.names.len()).expect("name table overflow"));
        self.names.push(name.to_string());
        self.lookup.insert(name.to_string(), idx);
        idx
    }

    pub fn lookup(&self, name: &str) -> Option<NameRef> {
        self.lookup.get(name).copied()
    }

    pub fn get(&self, name: NameRef) -> &str {
        &self.names[name.to_idx()]
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::{NameRef, NameTable};

    #[test]
    fn well_known_names_are_stable() {
        let table = NameTable::new();
        assert_eq!(table.get(NameRef::let_()), "let");
        assert_eq!(table.get(NameRef::assert_type()), "assert_type!");
        assert_eq!(table.get(NameRef::square_brackets()), "[]");
        assert_eq!(table.get(NameRef::new_()), "new");
    }

    #[test]
    fn interning_dedups() {
        let mut table = NameTable::new();
        let a = table.intern("foo");
        let b = table.intern("foo");
        assert_eq!(a, b);
        assert_ne!(a, table.intern("bar"));
        assert_eq!(table.lookup("let"), Some(NameRef::let_()));
    }
}
