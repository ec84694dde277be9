use std::collections::BTreeMap;

use crate::cfg::{LocalRef, TypeSlot};
use crate::global::{Type, TypePtr};

/// The types of the variables at one program point.
///
/// A variable missing from the environment has no value flowing into it on any path
/// reaching that point, which is the uninhabited type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Environment {
    vars: BTreeMap<LocalRef, TypePtr>,
}

impl Environment {
    pub fn get(&self, var: LocalRef) -> Option<&TypePtr> {
        self.vars.get(&var)
    }

    pub fn type_of(&self, var: LocalRef) -> TypePtr {
        self.vars.get(&var).cloned().unwrap_or_else(Type::bottom)
    }

    /// What a use-site of `var` at this point gets to see.
    pub fn slot(&self, var: LocalRef) -> TypeSlot {
        slot_for(&self.type_of(var))
    }

    pub fn set(&mut self, var: LocalRef, ty: TypePtr) {
        self.vars.insert(var, ty);
    }

    pub fn iter(&self) -> impl Iterator<Item = (LocalRef, &TypePtr)> {
        self.vars.iter().map(|(var, ty)| (*var, ty))
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

pub(crate) fn slot_for(ty: &TypePtr) -> TypeSlot {
    if ty.is_bottom() {
        TypeSlot::Bottom
    } else {
        TypeSlot::Set(ty.clone())
    }
}
