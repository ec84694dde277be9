use crate::global::{NameRef, TypePtr};

/// A variable slot of one graph, an index into its variable table.
///
/// Handles are deduplicated by the table: two equal handles always denote the same
/// source-level variable of the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LocalRef(u32);

impl LocalRef {
    pub const fn no_variable() -> Self {
        Self(0)
    }

    /// The implicit receiver of the method.
    pub const fn self_variable() -> Self {
        Self(1)
    }

    pub(crate) const fn from_idx(idx: u32) -> Self {
        Self(idx)
    }

    pub const fn exists(self) -> bool {
        self.0 != 0
    }

    pub const fn to_idx(self) -> usize {
        self.0 as usize
    }
}

/// A source-level variable: its name plus a counter telling apart shadowed bindings
/// and compiler temporaries that share a name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LocalVariable {
    pub name: NameRef,
    pub unique: u32,
}

impl LocalVariable {
    pub const fn new(name: NameRef, unique: u32) -> Self {
        Self { name, unique }
    }

    pub const fn no_variable() -> Self {
        Self::new(NameRef::no_name(), 0)
    }

    pub const fn self_variable() -> Self {
        Self::new(NameRef::self_(), 0)
    }
}

/// What inference knows about one read of a variable.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TypeSlot {
    /// The forward walk has not reached this point.
    #[default]
    Unset,
    /// Reached, but no value flows into the variable on any path leading here.
    Bottom,
    /// The type narrowed to this exact program point.
    Set(TypePtr),
}

impl TypeSlot {
    pub fn is_unset(&self) -> bool {
        matches!(self, TypeSlot::Unset)
    }

    /// The inferred type, `None` unless a real type has been written.
    pub fn get(&self) -> Option<&TypePtr> {
        match self {
            TypeSlot::Set(ty) => Some(ty),
            TypeSlot::Unset | TypeSlot::Bottom => None,
        }
    }
}

/// One read of a variable at one program point, with the type inference narrowed it to.
///
/// Never shared between operands, hence neither `Clone` nor `Copy`.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct VariableUseSite {
    pub variable: LocalRef,
    pub ty: TypeSlot,
}

impl VariableUseSite {
    pub const fn new(variable: LocalRef) -> Self {
        Self {
            variable,
            ty: TypeSlot::Unset,
        }
    }

    pub fn reset(&mut self) {
        self.ty = TypeSlot::Unset;
    }
}

impl From<LocalRef> for VariableUseSite {
    fn from(variable: LocalRef) -> Self {
        Self::new(variable)
    }
}

impl Default for LocalRef {
    fn default() -> Self {
        Self::no_variable()
    }
}
