//! The closed instruction algebra of the graph.
//!
//! Every value-producing or effectful construct of a method body is one of the 14 kinds
//! below. The set is closed: consumers match on [`InstructionKind`] or
//! [`InstructionMut`] exhaustively, so adding a kind is a compile error everywhere it
//! needs handling.

use smallvec::SmallVec;

use super::{
    link::LinkRef,
    local::{LocalRef, VariableUseSite},
};
use crate::global::{ArgInfo, GlobalState, LocOffsets, NameRef, SymbolRef, SymbolKind, TypePtr};

/// Compile-time ceiling on the footprint of an instruction payload.
macro_rules! assert_size_at_most {
    ($ty:ty, $size:expr) => {
        const _: () = assert!(std::mem::size_of::<$ty>() <= $size);
    };
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Tag {
    Ident = 1,
    Alias,
    SolveConstraint,
    Send,
    Return,
    BlockReturn,
    LoadSelf,
    Literal,
    GetCurrentException,
    LoadArg,
    ArgPresent,
    LoadYieldParams,
    Cast,
    TAbsurd,
}

impl Tag {
    pub const ALL: [Tag; 14] = [
        Tag::Ident,
        Tag::Alias,
        Tag::SolveConstraint,
        Tag::Send,
        Tag::Return,
        Tag::BlockReturn,
        Tag::LoadSelf,
        Tag::Literal,
        Tag::GetCurrentException,
        Tag::LoadArg,
        Tag::ArgPresent,
        Tag::LoadYieldParams,
        Tag::Cast,
        Tag::TAbsurd,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            Tag::Ident => "Ident",
            Tag::Alias => "Alias",
            Tag::SolveConstraint => "SolveConstraint",
            Tag::Send => "Send",
            Tag::Return => "Return",
            Tag::BlockReturn => "BlockReturn",
            Tag::LoadSelf => "LoadSelf",
            Tag::Literal => "Literal",
            Tag::GetCurrentException => "GetCurrentException",
            Tag::LoadArg => "LoadArg",
            Tag::ArgPresent => "ArgPresent",
            Tag::LoadYieldParams => "LoadYieldParams",
            Tag::Cast => "Cast",
            Tag::TAbsurd => "TAbsurd",
        }
    }
}

/// Rebinds an existing variable to the binding's variable.
#[derive(Debug, PartialEq, Eq)]
pub struct Ident {
    pub what: LocalRef,
}
assert_size_at_most!(Ident, 4);

/// A reference to a symbol (constant, class, method) resolved when the graph was built.
#[derive(Debug, PartialEq, Eq)]
pub struct Alias {
    pub what: SymbolRef,
    pub name: NameRef,
}
assert_size_at_most!(Alias, 8);

impl Alias {
    pub fn new(what: SymbolRef) -> Self {
        Self {
            what,
            name: NameRef::no_name(),
        }
    }

    pub fn with_name(what: SymbolRef, name: NameRef) -> Self {
        Self { what, name }
    }
}

/// Solves the constraint gathered for a generic call with a block, producing the call's
/// final type. Placed after the block body.
#[derive(Debug, PartialEq, Eq)]
pub struct SolveConstraint {
    pub link: LinkRef,
    /// The variable the call itself was bound to.
    pub send: LocalRef,
}
assert_size_at_most!(SolveConstraint, 24);

/// A method call.
#[derive(Debug)]
pub struct Send {
    pub is_private_ok: bool,
    /// Arguments before this index are positional, the rest are keyword pairs.
    pub num_pos_args: u16,
    pub fun: NameRef,
    pub recv: VariableUseSite,
    pub receiver_loc: LocOffsets,
    args: SmallVec<[VariableUseSite; 2]>,
    arg_locs: SmallVec<[LocOffsets; 2]>,
    pub link: Option<LinkRef>,
}
assert_size_at_most!(Send, 192);

impl Send {
    /// Panics unless every argument has a location and `num_pos_args` is within `args`.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        recv: LocalRef,
        fun: NameRef,
        receiver_loc: LocOffsets,
        num_pos_args: u16,
        args: &[LocalRef],
        arg_locs: &[LocOffsets],
        is_private_ok: bool,
        link: Option<LinkRef>,
    ) -> Self {
        assert_eq!(
            args.len(),
            arg_locs.len(),
            "every send argument needs a location"
        );
        assert!(
            usize::from(num_pos_args) <= args.len(),
            "send has {} positional arguments but only {} arguments",
            num_pos_args,
            args.len()
        );
        Self {
            is_private_ok,
            num_pos_args,
            fun,
            recv: VariableUseSite::new(recv),
            receiver_loc,
            args: args.iter().map(|arg| VariableUseSite::new(*arg)).collect(),
            arg_locs: arg_locs.iter().copied().collect(),
            link,
        }
    }

    pub fn args(&self) -> &[VariableUseSite] {
        &self.args
    }

    /// Mutable access to the argument slots. The argument count is fixed at construction.
    pub fn args_mut(&mut self) -> &mut [VariableUseSite] {
        &mut self.args
    }

    pub fn arg_locs(&self) -> &[LocOffsets] {
        &self.arg_locs
    }

    pub fn positional_args(&self) -> &[VariableUseSite] {
        &self.args[..usize::from(self.num_pos_args)]
    }

    /// `(key, value)` pairs following the positional arguments.
    pub fn keyword_args(&self) -> impl Iterator<Item = (&VariableUseSite, &VariableUseSite)> {
        self.args[usize::from(self.num_pos_args)..]
            .chunks_exact(2)
            .map(|pair| (&pair[0], &pair[1]))
    }
}

/// Returns a value from the enclosing method.
#[derive(Debug, PartialEq, Eq)]
pub struct Return {
    pub what: VariableUseSite,
}
assert_size_at_most!(Return, 24);

/// Returns a value from a block back to the call it was passed to.
#[derive(Debug, PartialEq, Eq)]
pub struct BlockReturn {
    pub link: LinkRef,
    pub what: VariableUseSite,
}
assert_size_at_most!(BlockReturn, 40);

/// Binds `self` inside a block, or the enclosing `fallback` when the call does not rebind it.
#[derive(Debug, PartialEq, Eq)]
pub struct LoadSelf {
    pub fallback: LocalRef,
    pub link: LinkRef,
}
assert_size_at_most!(LoadSelf, 24);

/// A constant. The type is the payload.
#[derive(Debug, PartialEq, Eq)]
pub struct Literal {
    pub value: TypePtr,
}
assert_size_at_most!(Literal, 8);

/// Binds the exception being handled inside a rescue region.
#[derive(Debug, PartialEq, Eq, Default)]
pub struct GetCurrentException;
assert_size_at_most!(GetCurrentException, 0);

/// Binds the `arg_id`-th formal parameter of `method`.
#[derive(Debug, PartialEq, Eq)]
pub struct LoadArg {
    pub arg_id: u16,
    pub method: SymbolRef,
}
assert_size_at_most!(LoadArg, 8);

/// Whether the caller supplied the `arg_id`-th formal parameter of `method`.
#[derive(Debug, PartialEq, Eq)]
pub struct ArgPresent {
    pub arg_id: u16,
    pub method: SymbolRef,
}
assert_size_at_most!(ArgPresent, 8);

fn method_argument(gs: &GlobalState, method: SymbolRef, arg_id: u16) -> &ArgInfo {
    match &gs.symbol(method).kind {
        SymbolKind::Method(info) => info.args.get(usize::from(arg_id)).unwrap_or_else(|| {
            panic!(
                "{} has no argument {}",
                gs.show_symbol(method),
                arg_id
            )
        }),
        _ => panic!("{} is not a method", gs.show_symbol(method)),
    }
}

impl LoadArg {
    pub fn argument<'gs>(&self, gs: &'gs GlobalState) -> &'gs ArgInfo {
        method_argument(gs, self.method, self.arg_id)
    }
}

impl ArgPresent {
    pub fn argument<'gs>(&self, gs: &'gs GlobalState) -> &'gs ArgInfo {
        method_argument(gs, self.method, self.arg_id)
    }
}

/// Binds the parameters passed into a block, as a tuple.
#[derive(Debug, PartialEq, Eq)]
pub struct LoadYieldParams {
    pub link: LinkRef,
}
assert_size_at_most!(LoadYieldParams, 16);

/// What kind of type assertion a [`Cast`] performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CastKind {
    /// `T.let`: annotates a value, checked.
    Let,
    /// `T.assert_type!`: asserts a value's type, checked.
    AssertType,
    /// `T.cast`: coerces without checking.
    Cast,
    /// `T.unsafe`: erases the static type.
    Unsafe,
}

impl CastKind {
    pub fn from_name(name: NameRef) -> Option<Self> {
        if name == NameRef::let_() {
            Some(CastKind::Let)
        } else if name == NameRef::assert_type() {
            Some(CastKind::AssertType)
        } else if name == NameRef::cast() {
            Some(CastKind::Cast)
        } else if name == NameRef::unsafe_() {
            Some(CastKind::Unsafe)
        } else {
            None
        }
    }

    pub fn is_checked(self) -> bool {
        matches!(self, CastKind::Let | CastKind::AssertType)
    }
}

/// A type assertion or refinement.
#[derive(Debug, PartialEq, Eq)]
pub struct Cast {
    pub cast: NameRef,
    pub value: VariableUseSite,
    pub ty: TypePtr,
}
assert_size_at_most!(Cast, 40);

impl Cast {
    pub fn new(value: LocalRef, ty: TypePtr, cast: NameRef) -> Self {
        assert!(
            CastKind::from_name(cast).is_some(),
            "unknown cast kind {cast:?}"
        );
        Self {
            cast,
            value: VariableUseSite::new(value),
            ty,
        }
    }

    /// Panics on a name that is not a cast kind. [`Cfg::verify`](crate::cfg::Cfg::verify) rejects those.
    pub fn kind(&self) -> CastKind {
        CastKind::from_name(self.cast)
            .unwrap_or_else(|| panic!("unknown cast kind {:?}", self.cast))
    }
}

/// Asserts the value is uninhabited here: an exhaustiveness check.
#[derive(Debug, PartialEq, Eq)]
pub struct TAbsurd {
    pub what: VariableUseSite,
}
assert_size_at_most!(TAbsurd, 24);

impl Ident {
    pub fn new(what: LocalRef) -> Self {
        Self { what }
    }
}

impl Return {
    pub fn new(what: LocalRef) -> Self {
        Self {
            what: VariableUseSite::new(what),
        }
    }
}

impl BlockReturn {
    pub fn new(link: LinkRef, what: LocalRef) -> Self {
        Self {
            link,
            what: VariableUseSite::new(what),
        }
    }
}

impl TAbsurd {
    pub fn new(what: LocalRef) -> Self {
        Self {
            what: VariableUseSite::new(what),
        }
    }
}

/// The closed sum of instruction kinds. `Send` is boxed to keep the stream dense.
#[derive(Debug)]
pub enum InstructionKind {
    Ident(Ident),
    Alias(Alias),
    SolveConstraint(SolveConstraint),
    Send(Box<Send>),
    Return(Return),
    BlockReturn(BlockReturn),
    LoadSelf(LoadSelf),
    Literal(Literal),
    GetCurrentException(GetCurrentException),
    LoadArg(LoadArg),
    ArgPresent(ArgPresent),
    LoadYieldParams(LoadYieldParams),
    Cast(Cast),
    TAbsurd(TAbsurd),
}

/// A mutable view of an instruction. Payloads can be written, the kind cannot change.
#[derive(Debug)]
pub enum InstructionMut<'a> {
    Ident(&'a mut Ident),
    Alias(&'a mut Alias),
    SolveConstraint(&'a mut SolveConstraint),
    Send(&'a mut Send),
    Return(&'a mut Return),
    BlockReturn(&'a mut BlockReturn),
    LoadSelf(&'a mut LoadSelf),
    Literal(&'a mut Literal),
    GetCurrentException(&'a mut GetCurrentException),
    LoadArg(&'a mut LoadArg),
    ArgPresent(&'a mut ArgPresent),
    LoadYieldParams(&'a mut LoadYieldParams),
    Cast(&'a mut Cast),
    TAbsurd(&'a mut TAbsurd),
}

#[derive(Debug)]
pub struct Instruction {
    /// Inserted by the graph builder with no counterpart in the source. Only affects
    /// diagnostics.
    pub is_synthetic: bool,
    kind: InstructionKind,
}
assert_size_at_most!(Instruction, 64);

mod sealed {
    pub trait Sealed {}
}

/// Implemented by the payload of every instruction kind.
pub trait InsnKind: sealed::Sealed + Sized {
    const TAG: Tag;

    fn downcast(kind: &InstructionKind) -> Option<&Self>;

    fn downcast_mut(kind: &mut InstructionKind) -> Option<&mut Self>;

    fn into_kind(self) -> InstructionKind;
}

macro_rules! impl_insn_kind {
    ($($kind:ident),* $(,)?) => {
        $(
            impl sealed::Sealed for $kind {}

            impl InsnKind for $kind {
                const TAG: Tag = Tag::$kind;

                fn downcast(kind: &InstructionKind) -> Option<&Self> {
                    match kind {
                        InstructionKind::$kind(insn) => Some(insn),
                        _ => None,
                    }
                }

                fn downcast_mut(kind: &mut InstructionKind) -> Option<&mut Self> {
                    match kind {
                        InstructionKind::$kind(insn) => Some(insn),
                        _ => None,
                    }
                }

                fn into_kind(self) -> InstructionKind {
                    InstructionKind::$kind(self)
                }
            }

            impl From<$kind> for Instruction {
                fn from(insn: $kind) -> Self {
                    Instruction::new(insn)
                }
            }
        )*
    };
}

impl_insn_kind!(
    Ident,
    Alias,
    SolveConstraint,
    Return,
    BlockReturn,
    LoadSelf,
    Literal,
    GetCurrentException,
    LoadArg,
    ArgPresent,
    LoadYieldParams,
    Cast,
    TAbsurd,
);

impl sealed::Sealed for Send {}

impl InsnKind for Send {
    const TAG: Tag = Tag::Send;

    fn downcast(kind: &InstructionKind) -> Option<&Self> {
        match kind {
            InstructionKind::Send(insn) => Some(insn.as_ref()),
            _ => None,
        }
    }

    fn downcast_mut(kind: &mut InstructionKind) -> Option<&mut Self> {
        match kind {
            InstructionKind::Send(insn) => Some(insn.as_mut()),
            _ => None,
        }
    }

    fn into_kind(self) -> InstructionKind {
        InstructionKind::Send(Box::new(self))
    }
}

impl From<Send> for Instruction {
    fn from(insn: Send) -> Self {
        Instruction::new(insn)
    }
}

impl Instruction {
    pub fn new<T: InsnKind>(insn: T) -> Self {
        Self {
            is_synthetic: false,
            kind: insn.into_kind(),
        }
    }

    pub fn synthetic(mut self) -> Self {
        self.is_synthetic = true;
        self
    }

    pub fn tag(&self) -> Tag {
        match &self.kind {
            InstructionKind::Ident(_) => Tag::Ident,
            InstructionKind::Alias(_) => Tag::Alias,
            InstructionKind::SolveConstraint(_) => Tag::SolveConstraint,
            InstructionKind::Send(_) => Tag::Send,
            InstructionKind::Return(_) => Tag::Return,
            InstructionKind::BlockReturn(_) => Tag::BlockReturn,
            InstructionKind::LoadSelf(_) => Tag::LoadSelf,
            InstructionKind::Literal(_) => Tag::Literal,
            InstructionKind::GetCurrentException(_) => Tag::GetCurrentException,
            InstructionKind::LoadArg(_) => Tag::LoadArg,
            InstructionKind::ArgPresent(_) => Tag::ArgPresent,
            InstructionKind::LoadYieldParams(_) => Tag::LoadYieldParams,
            InstructionKind::Cast(_) => Tag::Cast,
            InstructionKind::TAbsurd(_) => Tag::TAbsurd,
        }
    }

    pub fn kind(&self) -> &InstructionKind {
        &self.kind
    }

    pub fn kind_mut(&mut self) -> InstructionMut<'_> {
        match &mut self.kind {
            InstructionKind::Ident(i) => InstructionMut::Ident(i),
            InstructionKind::Alias(i) => InstructionMut::Alias(i),
            InstructionKind::SolveConstraint(i) => InstructionMut::SolveConstraint(i),
            InstructionKind::Send(i) => InstructionMut::Send(i),
            InstructionKind::Return(i) => InstructionMut::Return(i),
            InstructionKind::BlockReturn(i) => InstructionMut::BlockReturn(i),
            InstructionKind::LoadSelf(i) => InstructionMut::LoadSelf(i),
            InstructionKind::Literal(i) => InstructionMut::Literal(i),
            InstructionKind::GetCurrentException(i) => InstructionMut::GetCurrentException(i),
            InstructionKind::LoadArg(i) => InstructionMut::LoadArg(i),
            InstructionKind::ArgPresent(i) => InstructionMut::ArgPresent(i),
            InstructionKind::LoadYieldParams(i) => InstructionMut::LoadYieldParams(i),
            InstructionKind::Cast(i) => InstructionMut::Cast(i),
            InstructionKind::TAbsurd(i) => InstructionMut::TAbsurd(i),
        }
    }

    /// Checked downcast. `None` unless `T` is the kind this instruction was built as.
    pub fn cast<T: InsnKind>(&self) -> Option<&T> {
        T::downcast(&self.kind)
    }

    pub fn cast_mut<T: InsnKind>(&mut self) -> Option<&mut T> {
        T::downcast_mut(&mut self.kind)
    }

    pub fn isa<T: InsnKind>(&self) -> bool {
        self.tag() == T::TAG
    }

    /// Every variable handle the instruction refers to, in construction order.
    pub fn operand_locals(&self) -> SmallVec<[LocalRef; 4]> {
        let mut locals = SmallVec::new();
        match &self.kind {
            InstructionKind::Ident(i) => locals.push(i.what),
            InstructionKind::SolveConstraint(i) => locals.push(i.send),
            InstructionKind::Send(i) => {
                locals.push(i.recv.variable);
                locals.extend(i.args.iter().map(|arg| arg.variable));
            }
            InstructionKind::Return(i) => locals.push(i.what.variable),
            InstructionKind::BlockReturn(i) => locals.push(i.what.variable),
            InstructionKind::LoadSelf(i) => locals.push(i.fallback),
            InstructionKind::Cast(i) => locals.push(i.value.variable),
            InstructionKind::TAbsurd(i) => locals.push(i.what.variable),
            InstructionKind::Alias(_)
            | InstructionKind::Literal(_)
            | InstructionKind::GetCurrentException(_)
            | InstructionKind::LoadArg(_)
            | InstructionKind::ArgPresent(_)
            | InstructionKind::LoadYieldParams(_) => {}
        }
        locals
    }

    /// The use-sites the instruction owns, in construction order.
    pub fn use_sites(&self) -> SmallVec<[&VariableUseSite; 4]> {
        let mut sites = SmallVec::new();
        match &self.kind {
            InstructionKind::Send(i) => {
                sites.push(&i.recv);
                sites.extend(i.args.iter());
            }
            InstructionKind::Return(i) => sites.push(&i.what),
            InstructionKind::BlockReturn(i) => sites.push(&i.what),
            InstructionKind::Cast(i) => sites.push(&i.value),
            InstructionKind::TAbsurd(i) => sites.push(&i.what),
            InstructionKind::Ident(_)
            | InstructionKind::Alias(_)
            | InstructionKind::SolveConstraint(_)
            | InstructionKind::LoadSelf(_)
            | InstructionKind::Literal(_)
            | InstructionKind::GetCurrentException(_)
            | InstructionKind::LoadArg(_)
            | InstructionKind::ArgPresent(_)
            | InstructionKind::LoadYieldParams(_) => {}
        }
        sites
    }

    pub fn use_sites_mut(&mut self) -> SmallVec<[&mut VariableUseSite; 4]> {
        let mut sites = SmallVec::new();
        match &mut self.kind {
            InstructionKind::Send(i) => {
                let send = i.as_mut();
                sites.push(&mut send.recv);
                sites.extend(send.args.iter_mut());
            }
            InstructionKind::Return(i) => sites.push(&mut i.what),
            InstructionKind::BlockReturn(i) => sites.push(&mut i.what),
            InstructionKind::Cast(i) => sites.push(&mut i.value),
            InstructionKind::TAbsurd(i) => sites.push(&mut i.what),
            InstructionKind::Ident(_)
            | InstructionKind::Alias(_)
            | InstructionKind::SolveConstraint(_)
            | InstructionKind::LoadSelf(_)
            | InstructionKind::Literal(_)
            | InstructionKind::GetCurrentException(_)
            | InstructionKind::LoadArg(_)
            | InstructionKind::ArgPresent(_)
            | InstructionKind::LoadYieldParams(_) => {}
        }
        sites
    }

    /// The call-link the instruction shares, if any.
    pub fn link(&self) -> Option<LinkRef> {
        match &self.kind {
            InstructionKind::SolveConstraint(i) => Some(i.link),
            InstructionKind::Send(i) => i.link,
            InstructionKind::BlockReturn(i) => Some(i.link),
            InstructionKind::LoadSelf(i) => Some(i.link),
            InstructionKind::LoadYieldParams(i) => Some(i.link),
            InstructionKind::Ident(_)
            | InstructionKind::Alias(_)
            | InstructionKind::Return(_)
            | InstructionKind::Literal(_)
            | InstructionKind::GetCurrentException(_)
            | InstructionKind::LoadArg(_)
            | InstructionKind::ArgPresent(_)
            | InstructionKind::Cast(_)
            | InstructionKind::TAbsurd(_) => None,
        }
    }
}
