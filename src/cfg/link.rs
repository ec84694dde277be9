use std::collections::BTreeMap;

use smallvec::{SmallVec, smallvec};
use typed_generational_arena::{SmallSlab, SmallSlabIndex};

use super::InsnRef;
use crate::global::{ArgFlags, GlobalState, NameRef, Type, TypePtr};

pub type LinkRef = SmallSlabIndex<SendAndBlockLink>;
pub type Links = SmallSlab<SendAndBlockLink>;

/// Lifecycle of a call-link during one inference pass. Only moves forward, and only
/// `Constraining` may be entered more than once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LinkState {
    /// Allocated for a call that has a block.
    Created,
    /// Block parameter types and the self type of the block are known.
    Populated,
    /// Bounds for the call's type variables were gathered from the block body.
    Constraining,
    /// The constraint is locked and the call has its final type.
    Solved,
    /// The pass that owned the link is over; nothing may write to it anymore.
    Released,
}

/// A formal parameter of a block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockParam {
    pub name: NameRef,
    pub flags: ArgFlags,
}

impl BlockParam {
    pub fn new(name: NameRef) -> Self {
        Self {
            name,
            flags: ArgFlags::default(),
        }
    }
}

/// Lower bounds for the type variables of one generic call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypeConstraint {
    bounds: BTreeMap<NameRef, TypePtr>,
}

impl TypeConstraint {
    pub fn is_empty(&self) -> bool {
        self.bounds.is_empty()
    }

    pub fn get(&self, var: NameRef) -> Option<&TypePtr> {
        self.bounds.get(&var)
    }

    pub fn bounds(&self) -> impl Iterator<Item = (NameRef, &TypePtr)> {
        self.bounds.iter().map(|(name, ty)| (*name, ty))
    }

    /// Widens the bound of `var` to include `ty`. Returns whether the bound changed.
    pub fn bound(&mut self, gs: &GlobalState, var: NameRef, ty: &TypePtr) -> bool {
        match self.bounds.get_mut(&var) {
            Some(existing) => {
                let widened = Type::lub(gs, existing, ty);
                let changed = widened != *existing;
                *existing = widened;
                changed
            }
            None => {
                self.bounds.insert(var, ty.clone());
                true
            }
        }
    }

    /// Applies the bounds to `ty`. Variables without a bound become `T.untyped`.
    pub fn solve(&self, gs: &GlobalState, ty: &TypePtr) -> TypePtr {
        Type::substitute(gs, ty, &|var| {
            Some(self.bounds.get(&var).cloned().unwrap_or_else(Type::untyped))
        })
    }
}

/// Ties a call to the block passed to it.
///
/// Every instruction that needs the block's context (the call, the block's self binder,
/// its parameter loader, its returns and the constraint solver) refers to the same record
/// through a [`LinkRef`]. The record lives in the graph's link arena and is only written
/// through the graph.
#[derive(Debug, Clone)]
pub struct SendAndBlockLink {
    /// The method the block is passed to.
    pub fun: NameRef,
    pub params: Vec<BlockParam>,
    owner: Option<InsnRef>,
    state: LinkState,
    history: SmallVec<[LinkState; 5]>,
    self_type: Option<TypePtr>,
    param_types: Vec<TypePtr>,
    constraint: TypeConstraint,
    result: Option<TypePtr>,
}

impl SendAndBlockLink {
    pub fn new(fun: NameRef, params: Vec<BlockParam>) -> Self {
        Self {
            fun,
            params,
            owner: None,
            state: LinkState::Created,
            history: smallvec![LinkState::Created],
            self_type: None,
            param_types: Vec::new(),
            constraint: TypeConstraint::default(),
            result: None,
        }
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    /// Every state the link went through since it was created or last reset, in order.
    pub fn history(&self) -> &[LinkState] {
        &self.history
    }

    /// The call this link belongs to.
    pub fn owner(&self) -> Option<InsnRef> {
        self.owner
    }

    /// Records the call that owns the link. A link is never rebound to another call.
    pub fn set_owner(&mut self, owner: InsnRef) {
        if let Some(existing) = self.owner {
            assert_eq!(
                existing, owner,
                "call-link for {:?} already owned by another call",
                self.fun
            );
        }
        self.owner = Some(owner);
    }

    fn advance(&mut self, to: LinkState) {
        assert!(
            self.state != LinkState::Released,
            "call-link written after its pass released it"
        );
        assert!(
            self.state <= to,
            "call-link moved backwards from {:?} to {:?}",
            self.state,
            to
        );
        if self.state == to {
            assert!(
                to == LinkState::Constraining,
                "call-link written as {to:?} twice"
            );
            return;
        }
        self.state = to;
        self.history.push(to);
    }

    pub fn populate(&mut self, self_type: Option<TypePtr>, param_types: Vec<TypePtr>) {
        self.advance(LinkState::Populated);
        self.self_type = self_type;
        self.param_types = param_types;
    }

    pub fn constrain(&mut self, constraint: TypeConstraint) {
        self.advance(LinkState::Constraining);
        self.constraint = constraint;
    }

    pub fn solve(&mut self, result: TypePtr) {
        self.advance(LinkState::Solved);
        self.result = Some(result);
    }

    pub fn release(&mut self) {
        if self.state != LinkState::Released {
            self.state = LinkState::Released;
            self.history.push(LinkState::Released);
        }
    }

    /// Starts over for a new inference pass.
    pub fn reset(&mut self) {
        self.state = LinkState::Created;
        self.history.clear();
        self.history.push(LinkState::Created);
        self.self_type = None;
        self.param_types.clear();
        self.constraint = TypeConstraint::default();
        self.result = None;
    }

    /// The type `self` has inside the block, when the callee rebinds it.
    pub fn self_type(&self) -> Option<&TypePtr> {
        self.self_type.as_ref()
    }

    pub fn param_types(&self) -> &[TypePtr] {
        &self.param_types
    }

    pub fn constraint(&self) -> &TypeConstraint {
        &self.constraint
    }

    pub fn result(&self) -> Option<&TypePtr> {
        self.result.as_ref()
    }

    /// The call's final type. A link that never got solved infers as `T.untyped`.
    pub fn result_or_untyped(&self) -> TypePtr {
        self.result.clone().unwrap_or_else(Type::untyped)
    }
}

#[cfg(test)]
mod tests {
    use super::{LinkState, SendAndBlockLink, TypeConstraint};
    use crate::global::{GlobalState, NameRef, Type};

    fn link(gs: &mut GlobalState) -> SendAndBlockLink {
        SendAndBlockLink::new(gs.names.intern("map"), vec![])
    }

    #[test]
    fn walks_forward_through_every_state() {
        let mut gs = GlobalState::new();
        let mut link = link(&mut gs);
        link.populate(None, vec![Type::integer()]);
        link.constrain(TypeConstraint::default());
        link.constrain(TypeConstraint::default());
        link.solve(Type::string());
        link.release();
        assert_eq!(
            link.history(),
            &[
                LinkState::Created,
                LinkState::Populated,
                LinkState::Constraining,
                LinkState::Solved,
                LinkState::Released
            ]
        );
        assert_eq!(link.result_or_untyped(), Type::string());
    }

    #[test]
    #[should_panic(expected = "moved backwards")]
    fn constraining_after_solved_panics() {
        let mut gs = GlobalState::new();
        let mut link = link(&mut gs);
        link.populate(None, vec![]);
        link.solve(Type::untyped());
        link.constrain(TypeConstraint::default());
    }

    #[test]
    #[should_panic(expected = "written as Solved twice")]
    fn solving_twice_panics() {
        let mut gs = GlobalState::new();
        let mut link = link(&mut gs);
        link.populate(None, vec![]);
        link.solve(Type::integer());
        link.solve(Type::string());
    }

    #[test]
    #[should_panic(expected = "written as Populated twice")]
    fn populating_twice_panics() {
        let mut gs = GlobalState::new();
        let mut link = link(&mut gs);
        link.populate(None, vec![]);
        link.populate(None, vec![Type::integer()]);
    }

    #[test]
    #[should_panic(expected = "after its pass released it")]
    fn writing_a_released_link_panics() {
        let mut gs = GlobalState::new();
        let mut link = link(&mut gs);
        link.release();
        link.populate(None, vec![]);
    }

    #[test]
    fn unsolved_links_infer_as_untyped() {
        let mut gs = GlobalState::new();
        let mut link = link(&mut gs);
        link.populate(None, vec![]);
        link.release();
        assert!(link.result_or_untyped().is_untyped());
    }

    #[test]
    fn constraint_bounds_widen() {
        let mut gs = GlobalState::new();
        let u = gs.names.intern("U");
        let mut constraint = TypeConstraint::default();
        assert!(constraint.bound(&gs, u, &Type::integer()));
        assert!(!constraint.bound(&gs, u, &Type::int_literal(4)));
        assert!(constraint.bound(&gs, u, &Type::nil()));
        assert_eq!(constraint.get(u).map(|t| t.show(&gs)).as_deref(), Some("T.nilable(Integer)"));

        let unbound = Type::type_var(NameRef::blk());
        assert!(constraint.solve(&gs, &unbound).is_untyped());
        assert_eq!(constraint.solve(&gs, &Type::type_var(u)).show(&gs), "T.nilable(Integer)");
    }
}
