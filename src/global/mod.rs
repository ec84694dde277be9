//! The global tables shared by every method-level graph: interned names, symbols and types.
//!
//! These are filled before any graph is built and only read afterwards, so one
//! `GlobalState` can back inference of independent methods on several threads.

use std::ops::Range;

mod names;
mod symbols;
mod types;

pub use names::{NameRef, NameTable};
pub use symbols::{
    ArgFlags, ArgInfo, BlockSig, ClassInfo, MethodInfo, Symbol, SymbolKind, SymbolRef, Visibility,
};
pub use types::{LiteralValue, Truthiness, Type, TypePtr};

/// A byte range in the source file a graph was built from.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct LocOffsets {
    pub begin: u32,
    pub end: u32,
}

impl LocOffsets {
    pub const fn new(begin: u32, end: u32) -> Self {
        Self { begin, end }
    }

    pub const fn none() -> Self {
        Self { begin: 0, end: 0 }
    }

    pub const fn exists(&self) -> bool {
        self.end > 0
    }
}

impl From<LocOffsets> for Range<usize> {
    fn from(val: LocOffsets) -> Self {
        val.begin as usize..val.end as usize
    }
}

#[derive(Debug, Clone)]
pub struct GlobalState {
    pub names: NameTable,
    symbols: Vec<Symbol>,
}

impl Default for GlobalState {
    fn default() -> Self {
        Self::new()
    }
}

impl GlobalState {
    /// Creates the tables with the well-known classes entered at their fixed handles.
    pub fn new() -> Self {
        let mut gs = Self {
            names: NameTable::new(),
            symbols: Vec::new(),
        };
        let none = gs.names.intern("<none>");
        gs.symbols.push(Symbol {
            name: none,
            owner: SymbolRef::no_symbol(),
            loc: LocOffsets::none(),
            kind: SymbolKind::Class(ClassInfo::default()),
        });

        let basic_object = gs.enter_class_with_params("BasicObject", None, &[]);
        let object = gs.enter_class_with_params("Object", Some(basic_object), &[]);
        for name in [
            "NilClass",
            "TrueClass",
            "FalseClass",
            "Integer",
            "Float",
            "String",
            "Symbol",
        ] {
            gs.enter_class(name, object);
        }
        gs.enter_class_with_params("Array", Some(object), &["Elem"]);
        gs.enter_class_with_params("Hash", Some(object), &["K", "V"]);
        let exception = gs.enter_class("Exception", object);
        gs.enter_class("StandardError", exception);
        gs.enter_class("Proc", object);

        debug_assert_eq!(Some(gs.symbol(SymbolRef::proc()).name), gs.names.lookup("Proc"));
        gs
    }

    fn next_symbol(&self) -> SymbolRef {
        SymbolRef(u32::try_from(self.symbols.len()).expect("symbol table overflow"))
    }

    pub fn enter_class(&mut self, name: &str, superclass: SymbolRef) -> SymbolRef {
        self.enter_class_with_params(name, Some(superclass), &[])
    }

    pub fn enter_class_with_params(
        &mut self,
        name: &str,
        superclass: Option<SymbolRef>,
        type_params: &[&str],
    ) -> SymbolRef {
        let sym = self.next_symbol();
        let name = self.names.intern(name);
        let type_params = type_params.iter().map(|p| self.names.intern(p)).collect();
        self.symbols.push(Symbol {
            name,
            owner: SymbolRef::no_symbol(),
            loc: LocOffsets::none(),
            kind: SymbolKind::Class(ClassInfo {
                superclass,
                type_params,
                ..Default::default()
            }),
        });
        sym
    }

    /// Enters a method on `owner`, replacing an earlier definition with the same name.
    /// Entering the same signature again returns the existing symbol.
    pub fn enter_method(&mut self, owner: SymbolRef, name: &str, info: MethodInfo) -> SymbolRef {
        let name = self.names.intern(name);
        let is_singleton = info.is_singleton;
        let existing = self.class_info(owner).and_then(|class| {
            let members = if is_singleton {
                &class.singleton_members
            } else {
                &class.members
            };
            members.get(&name).copied()
        });
        if let Some(existing) = existing {
            if self.method_info(existing) == Some(&info) {
                return existing;
            }
        }
        let sym = self.next_symbol();
        self.symbols.push(Symbol {
            name,
            owner,
            loc: LocOffsets::none(),
            kind: SymbolKind::Method(info),
        });
        let class = self.class_info_mut(owner);
        if is_singleton {
            class.singleton_members.insert(name, sym);
        } else {
            class.members.insert(name, sym);
        }
        sym
    }

    pub fn enter_static_field(
        &mut self,
        owner: SymbolRef,
        name: &str,
        ty: Option<TypePtr>,
    ) -> SymbolRef {
        let sym = self.next_symbol();
        let name = self.names.intern(name);
        self.symbols.push(Symbol {
            name,
            owner,
            loc: LocOffsets::none(),
            kind: SymbolKind::StaticField { ty },
        });
        sym
    }

    pub fn has_symbol(&self, sym: SymbolRef) -> bool {
        sym.to_idx() < self.symbols.len()
    }

    pub fn symbol(&self, sym: SymbolRef) -> &Symbol {
        &self.symbols[sym.to_idx()]
    }

    pub fn class_info(&self, sym: SymbolRef) -> Option<&ClassInfo> {
        match &self.symbol(sym).kind {
            SymbolKind::Class(info) => Some(info),
            _ => None,
        }
    }

    fn class_info_mut(&mut self, sym: SymbolRef) -> &mut ClassInfo {
        match &mut self.symbols[sym.to_idx()].kind {
            SymbolKind::Class(info) => info,
            other => panic!("symbol {} is not a class: {other:?}", sym.to_idx()),
        }
    }

    pub fn method_info(&self, sym: SymbolRef) -> Option<&MethodInfo> {
        match &self.symbol(sym).kind {
            SymbolKind::Method(info) => Some(info),
            _ => None,
        }
    }

    pub fn is_class(&self, sym: SymbolRef) -> bool {
        self.class_info(sym).is_some()
    }

    /// Whether `class` is `ancestor` or inherits from it.
    pub fn derives_from(&self, class: SymbolRef, ancestor: SymbolRef) -> bool {
        let mut current = Some(class);
        while let Some(sym) = current {
            if sym == ancestor {
                return true;
            }
            current = self.class_info(sym).and_then(|info| info.superclass);
        }
        false
    }

    /// Looks up an instance method through the superclass chain.
    pub fn find_member(&self, class: SymbolRef, name: NameRef) -> Option<SymbolRef> {
        self.find_in_chain(class, |info| info.members.get(&name).copied())
    }

    /// Looks up a class-level method through the superclass chain.
    pub fn find_singleton_member(&self, class: SymbolRef, name: NameRef) -> Option<SymbolRef> {
        self.find_in_chain(class, |info| info.singleton_members.get(&name).copied())
    }

    fn find_in_chain(
        &self,
        class: SymbolRef,
        lookup: impl Fn(&ClassInfo) -> Option<SymbolRef>,
    ) -> Option<SymbolRef> {
        let mut current = Some(class);
        while let Some(sym) = current {
            let info = self.class_info(sym)?;
            if let Some(found) = lookup(info) {
                return Some(found);
            }
            current = info.superclass;
        }
        None
    }

    /// The type of `self` inside instance methods of `class`.
    pub fn self_type_of(&self, class: SymbolRef) -> TypePtr {
        match self.class_info(class) {
            Some(info) if !info.type_params.is_empty() => Type::applied(
                class,
                info.type_params.iter().map(|p| Type::type_var(*p)).collect(),
            ),
            _ => Type::class(class),
        }
    }

    /// `Owner#method` for methods, the bare name otherwise.
    pub fn show_symbol(&self, sym: SymbolRef) -> String {
        let symbol = self.symbol(sym);
        let name = self.names.get(symbol.name);
        match &symbol.kind {
            SymbolKind::Method(info) if symbol.owner.exists() => {
                let owner = self.names.get(self.symbol(symbol.owner).name);
                let sep = if info.is_singleton { "." } else { "#" };
                format!("{owner}{sep}{name}")
            }
            SymbolKind::StaticField { .. } if symbol.owner.exists() => {
                let owner = self.names.get(self.symbol(symbol.owner).name);
                format!("{owner}::{name}")
            }
            _ => name.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ArgInfo, GlobalState, MethodInfo, NameRef, SymbolRef, Type};

    #[test]
    fn well_known_classes() {
        let gs = GlobalState::new();
        assert_eq!(gs.show_symbol(SymbolRef::integer()), "Integer");
        assert_eq!(gs.show_symbol(SymbolRef::standard_error()), "StandardError");
        assert!(gs.derives_from(SymbolRef::standard_error(), SymbolRef::object()));
        assert!(!gs.derives_from(SymbolRef::object(), SymbolRef::integer()));
        assert_eq!(
            gs.self_type_of(SymbolRef::array()).show(&gs),
            "Array[T.type_parameter(:Elem)]"
        );
    }

    #[test]
    fn methods_are_found_through_superclasses() {
        let mut gs = GlobalState::new();
        let animal = gs.enter_class("Animal", SymbolRef::object());
        let dog = gs.enter_class("Dog", animal);
        let name = NameRef::no_name();
        let speak = gs.enter_method(
            animal,
            "speak",
            MethodInfo::new(vec![ArgInfo::new(name, None)], Some(Type::string())),
        );
        let speak_name = gs.names.intern("speak");
        assert_eq!(gs.find_member(dog, speak_name), Some(speak));
        assert_eq!(gs.find_singleton_member(dog, speak_name), None);
        assert_eq!(gs.show_symbol(speak), "Animal#speak");

        let again = gs.enter_method(
            animal,
            "speak",
            MethodInfo::new(vec![ArgInfo::new(name, None)], Some(Type::string())),
        );
        assert_eq!(again, speak);
        let redefined = gs.enter_method(animal, "speak", MethodInfo::new(vec![], None));
        assert_ne!(redefined, speak);
        assert_eq!(gs.find_member(dog, speak_name), Some(redefined));
    }
}
