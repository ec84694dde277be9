use std::sync::Arc;

use itertools::Itertools;

use super::{GlobalState, NameRef, SymbolRef};

/// A type, cheaply clonable.
pub type TypePtr = Arc<Type>;

/// The types flow-sensitive inference reasons about.
///
/// `nil`, `true` and `false` are the single inhabitants of `NilClass`, `TrueClass` and
/// `FalseClass`, so they are represented as plain class types.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    /// The gradual type: compatible with everything, in both directions.
    Untyped,
    /// The uninhabited type.
    Bottom,
    /// An instance of a class.
    Class(SymbolRef),
    /// The class object itself, `T.class_of(C)`.
    ClassOf(SymbolRef),
    /// An instance of a generic class with its type arguments.
    Applied(SymbolRef, Vec<TypePtr>),
    /// A value known at the time the graph was built.
    Literal(LiteralValue),
    /// A fixed-size array with per-element types.
    Tuple(Vec<TypePtr>),
    /// Flattened, deduplicated union. Never nested, never a single component.
    Union(Vec<TypePtr>),
    /// A method type parameter awaiting a solution.
    TypeVar(NameRef),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LiteralValue {
    Integer(i64),
    String(NameRef),
    Symbol(NameRef),
}

impl LiteralValue {
    pub fn underlying_class(&self) -> SymbolRef {
        match self {
            LiteralValue::Integer(_) => SymbolRef::integer(),
            LiteralValue::String(_) => SymbolRef::string(),
            LiteralValue::Symbol(_) => SymbolRef::symbol(),
        }
    }
}

/// How the value of a type behaves as a branch condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Truthiness {
    Truthy,
    Falsy,
    Unknown,
    /// There is no value: neither branch can be taken.
    Unreachable,
}

impl Type {
    pub fn untyped() -> TypePtr {
        Arc::new(Type::Untyped)
    }

    pub fn bottom() -> TypePtr {
        Arc::new(Type::Bottom)
    }

    pub fn class(sym: SymbolRef) -> TypePtr {
        Arc::new(Type::Class(sym))
    }

    pub fn class_of(sym: SymbolRef) -> TypePtr {
        Arc::new(Type::ClassOf(sym))
    }

    pub fn nil() -> TypePtr {
        Self::class(SymbolRef::nil_class())
    }

    pub fn true_() -> TypePtr {
        Self::class(SymbolRef::true_class())
    }

    pub fn false_() -> TypePtr {
        Self::class(SymbolRef::false_class())
    }

    pub fn boolean() -> TypePtr {
        Arc::new(Type::Union(vec![Self::true_(), Self::false_()]))
    }

    pub fn integer() -> TypePtr {
        Self::class(SymbolRef::integer())
    }

    pub fn string() -> TypePtr {
        Self::class(SymbolRef::string())
    }

    pub fn int_literal(value: i64) -> TypePtr {
        Arc::new(Type::Literal(LiteralValue::Integer(value)))
    }

    pub fn applied(class: SymbolRef, targs: Vec<TypePtr>) -> TypePtr {
        Arc::new(Type::Applied(class, targs))
    }

    pub fn tuple(elems: Vec<TypePtr>) -> TypePtr {
        Arc::new(Type::Tuple(elems))
    }

    pub fn type_var(name: NameRef) -> TypePtr {
        Arc::new(Type::TypeVar(name))
    }

    pub fn is_untyped(&self) -> bool {
        matches!(self, Type::Untyped)
    }

    pub fn is_bottom(&self) -> bool {
        matches!(self, Type::Bottom)
    }

    /// The class whose methods a value of this type responds to.
    pub fn underlying_class(&self) -> Option<SymbolRef> {
        match self {
            Type::Class(sym) | Type::Applied(sym, _) => Some(*sym),
            Type::Literal(lit) => Some(lit.underlying_class()),
            Type::Tuple(_) => Some(SymbolRef::array()),
            Type::Untyped
            | Type::Bottom
            | Type::ClassOf(_)
            | Type::Union(_)
            | Type::TypeVar(_) => None,
        }
    }

    fn components(this: &TypePtr) -> Vec<TypePtr> {
        match this.as_ref() {
            Type::Union(parts) => parts.clone(),
            _ => vec![this.clone()],
        }
    }

    /// Whether every value of `this` is also a value of `other`.
    pub fn is_subtype(gs: &GlobalState, this: &TypePtr, other: &TypePtr) -> bool {
        if this == other {
            return true;
        }
        match (this.as_ref(), other.as_ref()) {
            (Type::Bottom, _) | (Type::Untyped, _) | (_, Type::Untyped) => true,
            (_, Type::Bottom) => false,
            (Type::Union(parts), _) => parts.iter().all(|p| Self::is_subtype(gs, p, other)),
            (_, Type::Union(parts)) => parts.iter().any(|p| Self::is_subtype(gs, this, p)),
            (Type::Literal(lit), _) => {
                Self::is_subtype(gs, &Self::class(lit.underlying_class()), other)
            }
            (Type::Class(a), Type::Class(b)) => gs.derives_from(*a, *b),
            (Type::Class(a), Type::Applied(b, _)) => gs.derives_from(*a, *b),
            (Type::Applied(a, _), Type::Class(b)) => gs.derives_from(*a, *b),
            (Type::Applied(a, targs), Type::Applied(b, other_targs)) => {
                if a == b {
                    targs.len() == other_targs.len()
                        && targs
                            .iter()
                            .zip(other_targs)
                            .all(|(x, y)| Self::is_subtype(gs, x, y))
                } else {
                    gs.derives_from(*a, *b)
                }
            }
            (Type::Tuple(elems), Type::Tuple(other_elems)) => {
                elems.len() == other_elems.len()
                    && elems
                        .iter()
                        .zip(other_elems)
                        .all(|(x, y)| Self::is_subtype(gs, x, y))
            }
            (Type::Tuple(elems), Type::Applied(b, targs)) => {
                gs.derives_from(SymbolRef::array(), *b)
                    && match targs.first() {
                        Some(elem) => elems.iter().all(|x| Self::is_subtype(gs, x, elem)),
                        None => true,
                    }
            }
            (Type::Tuple(_), Type::Class(b)) => gs.derives_from(SymbolRef::array(), *b),
            (Type::ClassOf(a), Type::ClassOf(b)) => gs.derives_from(*a, *b),
            (Type::ClassOf(_), Type::Class(b)) => {
                *b == SymbolRef::object() || *b == SymbolRef::basic_object()
            }
            (Type::TypeVar(a), Type::TypeVar(b)) => a == b,
            _ => false,
        }
    }

    /// Least upper bound of two types.
    pub fn lub(gs: &GlobalState, this: &TypePtr, other: &TypePtr) -> TypePtr {
        if this.is_untyped() || other.is_untyped() {
            return Self::untyped();
        }
        if Self::is_subtype(gs, other, this) {
            return this.clone();
        }
        if Self::is_subtype(gs, this, other) {
            return other.clone();
        }

        let mut parts: Vec<TypePtr> = Vec::new();
        for part in Self::components(this)
            .into_iter()
            .chain(Self::components(other))
        {
            if parts.iter().any(|p| Self::is_subtype(gs, &part, p)) {
                continue;
            }
            parts.retain(|p| !Self::is_subtype(gs, p, &part));
            parts.push(part);
        }

        match parts.len() {
            0 => Self::bottom(),
            1 => parts.remove(0),
            _ => Arc::new(Type::Union(parts)),
        }
    }

    pub fn lub_all(gs: &GlobalState, types: impl IntoIterator<Item = TypePtr>) -> TypePtr {
        types
            .into_iter()
            .fold(Self::bottom(), |acc, ty| Self::lub(gs, &acc, &ty))
    }

    /// Replaces literal types by the class they are an instance of.
    pub fn widen_literals(gs: &GlobalState, this: &TypePtr) -> TypePtr {
        match this.as_ref() {
            Type::Literal(lit) => Self::class(lit.underlying_class()),
            Type::Union(parts) => {
                Self::lub_all(gs, parts.iter().map(|p| Self::widen_literals(gs, p)))
            }
            Type::Tuple(elems) => Self::tuple(
                elems
                    .iter()
                    .map(|e| Self::widen_literals(gs, e))
                    .collect(),
            ),
            _ => this.clone(),
        }
    }

    /// Replaces type variables for which `solution` has an answer.
    pub fn substitute(
        gs: &GlobalState,
        this: &TypePtr,
        solution: &dyn Fn(NameRef) -> Option<TypePtr>,
    ) -> TypePtr {
        match this.as_ref() {
            Type::TypeVar(name) => solution(*name).unwrap_or_else(|| this.clone()),
            Type::Applied(class, targs) => Self::applied(
                *class,
                targs
                    .iter()
                    .map(|t| Self::substitute(gs, t, solution))
                    .collect(),
            ),
            Type::Tuple(elems) => Self::tuple(
                elems
                    .iter()
                    .map(|t| Self::substitute(gs, t, solution))
                    .collect(),
            ),
            Type::Union(parts) => {
                Self::lub_all(gs, parts.iter().map(|t| Self::substitute(gs, t, solution)))
            }
            _ => this.clone(),
        }
    }

    pub fn contains_type_var(&self) -> bool {
        match self {
            Type::TypeVar(_) => true,
            Type::Applied(_, parts) | Type::Tuple(parts) | Type::Union(parts) => {
                parts.iter().any(|p| p.contains_type_var())
            }
            _ => false,
        }
    }

    pub fn truthiness(gs: &GlobalState, this: &TypePtr) -> Truthiness {
        match this.as_ref() {
            Type::Bottom => Truthiness::Unreachable,
            Type::Untyped | Type::TypeVar(_) => Truthiness::Unknown,
            Type::Class(sym) => {
                if *sym == SymbolRef::nil_class() || *sym == SymbolRef::false_class() {
                    Truthiness::Falsy
                } else if gs.derives_from(SymbolRef::nil_class(), *sym)
                    || gs.derives_from(SymbolRef::false_class(), *sym)
                {
                    Truthiness::Unknown
                } else {
                    Truthiness::Truthy
                }
            }
            Type::Union(parts) => {
                let mut seen = parts.iter().map(|p| Self::truthiness(gs, p));
                let first = seen.next().unwrap_or(Truthiness::Unreachable);
                seen.fold(first, |acc, t| if acc == t { acc } else { Truthiness::Unknown })
            }
            Type::ClassOf(_) | Type::Applied(..) | Type::Literal(_) | Type::Tuple(_) => {
                Truthiness::Truthy
            }
        }
    }

    /// The part of `this` that can flow into the branch taken when it is truthy.
    pub fn narrow_truthy(gs: &GlobalState, this: &TypePtr) -> TypePtr {
        match this.as_ref() {
            Type::Union(parts) => Self::lub_all(
                gs,
                parts
                    .iter()
                    .filter(|p| Self::truthiness(gs, p) != Truthiness::Falsy)
                    .cloned(),
            ),
            _ if Self::truthiness(gs, this) == Truthiness::Falsy => Self::bottom(),
            _ => this.clone(),
        }
    }

    /// The part of `this` that can flow into the branch taken when it is falsy.
    pub fn narrow_falsy(gs: &GlobalState, this: &TypePtr) -> TypePtr {
        match this.as_ref() {
            Type::Union(parts) => Self::lub_all(
                gs,
                parts
                    .iter()
                    .filter(|p| Self::truthiness(gs, p) != Truthiness::Truthy)
                    .cloned(),
            ),
            _ if Self::truthiness(gs, this) == Truthiness::Truthy => Self::bottom(),
            _ => this.clone(),
        }
    }

    pub fn show(&self, gs: &GlobalState) -> String {
        match self {
            Type::Untyped => "T.untyped".to_string(),
            Type::Bottom => "T.noreturn".to_string(),
            Type::Class(sym) => gs.show_symbol(*sym),
            Type::ClassOf(sym) => format!("T.class_of({})", gs.show_symbol(*sym)),
            Type::Applied(sym, targs) => format!(
                "{}[{}]",
                gs.show_symbol(*sym),
                targs.iter().map(|t| t.show(gs)).join(", ")
            ),
            Type::Literal(LiteralValue::Integer(value)) => format!("Integer({value})"),
            Type::Literal(LiteralValue::String(name)) => {
                format!("String({:?})", gs.names.get(*name))
            }
            Type::Literal(LiteralValue::Symbol(name)) => {
                format!("Symbol(:{})", gs.names.get(*name))
            }
            Type::Tuple(elems) => format!("[{}]", elems.iter().map(|t| t.show(gs)).join(", ")),
            Type::Union(parts) => {
                let is_nil = |t: &TypePtr| matches!(t.as_ref(), Type::Class(s) if *s == SymbolRef::nil_class());
                let is_bool = parts.len() == 2
                    && parts.iter().any(|t| **t == Type::Class(SymbolRef::true_class()))
                    && parts.iter().any(|t| **t == Type::Class(SymbolRef::false_class()));
                if is_bool {
                    "T::Boolean".to_string()
                } else if parts.len() == 2 && parts.iter().any(is_nil) {
                    let inner = parts.iter().find(|t| !is_nil(*t)).map(|t| t.show(gs));
                    format!("T.nilable({})", inner.unwrap_or_default())
                } else {
                    format!("T.any({})", parts.iter().map(|t| t.show(gs)).join(", "))
                }
            }
            Type::TypeVar(name) => format!("T.type_parameter(:{})", gs.names.get(*name)),
        }
    }
}
