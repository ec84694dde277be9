use std::collections::HashMap;

use educe::Educe;

use super::{LocOffsets, NameRef, TypePtr};

/// A handle into the global symbol table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SymbolRef(pub(super) u32);

impl SymbolRef {
    pub const fn no_symbol() -> Self {
        Self(0)
    }

    pub const fn exists(self) -> bool {
        self.0 != 0
    }

    pub const fn to_idx(self) -> usize {
        self.0 as usize
    }

    pub const fn basic_object() -> Self {
        Self(1)
    }

    pub const fn object() -> Self {
        Self(2)
    }

    pub const fn nil_class() -> Self {
        Self(3)
    }

    pub const fn true_class() -> Self {
        Self(4)
    }

    pub const fn false_class() -> Self {
        Self(5)
    }

    pub const fn integer() -> Self {
        Self(6)
    }

    pub const fn float() -> Self {
        Self(7)
    }

    pub const fn string() -> Self {
        Self(8)
    }

    pub const fn symbol() -> Self {
        Self(9)
    }

    pub const fn array() -> Self {
        Self(10)
    }

    pub const fn hash() -> Self {
        Self(11)
    }

    pub const fn exception() -> Self {
        Self(12)
    }

    pub const fn standard_error() -> Self {
        Self(13)
    }

    pub const fn proc() -> Self {
        Self(14)
    }
}

#[derive(Debug, Clone)]
pub struct Symbol {
    pub name: NameRef,
    /// The enclosing class for methods and static fields, `no_symbol` for top level classes.
    pub owner: SymbolRef,
    pub loc: LocOffsets,
    pub kind: SymbolKind,
}

#[derive(Debug, Clone)]
pub enum SymbolKind {
    Class(ClassInfo),
    Method(MethodInfo),
    StaticField { ty: Option<TypePtr> },
}

#[derive(Debug, Clone, Default)]
pub struct ClassInfo {
    pub superclass: Option<SymbolRef>,
    /// Generic parameters, e.g. `Elem` for `Array`.
    pub type_params: Vec<NameRef>,
    pub members: HashMap<NameRef, SymbolRef>,
    pub singleton_members: HashMap<NameRef, SymbolRef>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Visibility {
    #[default]
    Public,
    Private,
}

/// A method signature.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MethodInfo {
    pub args: Vec<ArgInfo>,
    /// The declared result, `None` when the method has no signature.
    pub result_type: Option<TypePtr>,
    /// Method-level generic parameters, solved per call site.
    pub type_params: Vec<NameRef>,
    pub block: Option<BlockSig>,
    pub visibility: Visibility,
    pub is_singleton: bool,
}

impl MethodInfo {
    pub fn new(args: Vec<ArgInfo>, result_type: Option<TypePtr>) -> Self {
        Self {
            args,
            result_type,
            ..Default::default()
        }
    }

    pub fn with_type_params(mut self, type_params: Vec<NameRef>) -> Self {
        self.type_params = type_params;
        self
    }

    pub fn with_block(mut self, block: BlockSig) -> Self {
        self.block = Some(block);
        self
    }

    pub fn private(mut self) -> Self {
        self.visibility = Visibility::Private;
        self
    }

    pub fn singleton(mut self) -> Self {
        self.is_singleton = true;
        self
    }

    /// Positional arguments, in declaration order.
    pub fn positional_args(&self) -> impl Iterator<Item = &ArgInfo> {
        self.args
            .iter()
            .filter(|arg| !arg.flags.is_keyword && !arg.flags.is_block)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ArgFlags {
    pub is_optional: bool,
    pub is_keyword: bool,
    pub is_repeated: bool,
    pub is_block: bool,
}

/// A formal parameter of a method. Compares equal regardless of where it was declared.
#[derive(Debug, Clone, Educe)]
#[educe(PartialEq, Eq, Hash)]
pub struct ArgInfo {
    pub name: NameRef,
    /// `None` when the argument carries no declared type.
    pub ty: Option<TypePtr>,
    pub flags: ArgFlags,
    #[educe(PartialEq(ignore), Hash(ignore))]
    pub loc: LocOffsets,
}

impl ArgInfo {
    pub fn new(name: NameRef, ty: Option<TypePtr>) -> Self {
        Self {
            name,
            ty,
            flags: ArgFlags::default(),
            loc: LocOffsets::none(),
        }
    }

    pub fn optional(mut self) -> Self {
        self.flags.is_optional = true;
        self
    }

    pub fn keyword(mut self) -> Self {
        self.flags.is_keyword = true;
        self
    }

    pub fn repeated(mut self) -> Self {
        self.flags.is_repeated = true;
        self
    }

    pub fn block(mut self) -> Self {
        self.flags.is_block = true;
        self
    }
}

/// The signature of the block a method accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockSig {
    pub params: Vec<TypePtr>,
    pub returns: TypePtr,
    /// The type `self` has inside the block, if the method rebinds it.
    pub bind: Option<TypePtr>,
}
