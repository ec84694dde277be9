use std::collections::HashMap;

use super::{
    Binding, BlockExit, BlockExitKind, BlockId, Cfg, InsnRef, Instruction,
    instructions::Send,
    link::{BlockParam, LinkRef, SendAndBlockLink},
    local::{LocalRef, LocalVariable, VariableUseSite},
};
use crate::global::{GlobalState, LocOffsets, NameRef, SymbolRef};

/// Builds a [`Cfg`] one binding at a time.
///
/// This is the surface lowering talks to. Every push checks that the instruction only
/// refers to variables and links already entered, so a finished graph is well formed
/// by construction. [`CfgBuilder::finish`] runs the full [`Cfg::verify`] on top.
#[derive(Debug)]
pub struct CfgBuilder {
    cfg: Cfg,
    /// Next free `unique` counter per name, for temporaries.
    temporaries: HashMap<NameRef, u32>,
}

impl CfgBuilder {
    pub fn new(method: SymbolRef) -> Self {
        Self {
            cfg: Cfg::new(method),
            temporaries: HashMap::new(),
        }
    }

    pub fn entry(&self) -> BlockId {
        Cfg::ENTRY_BLOCK
    }

    /// The variable named `name`, shared by every caller asking for the same name.
    pub fn enter_local(&mut self, name: NameRef) -> LocalRef {
        self.cfg.enter_local(LocalVariable::new(name, 0))
    }

    /// A variable no other call to this method returns.
    pub fn new_temporary(&mut self, name: NameRef) -> LocalRef {
        let next = self.temporaries.entry(name).or_insert(1);
        let unique = *next;
        *next += 1;
        self.cfg.enter_local(LocalVariable::new(name, unique))
    }

    pub fn new_block(&mut self) -> BlockId {
        self.cfg.new_block()
    }

    /// Allocates the link for a call that has a block. It must exist before any
    /// instruction referring to it is pushed.
    pub fn new_link(&mut self, fun: NameRef, params: Vec<BlockParam>) -> LinkRef {
        self.cfg.new_link(SendAndBlockLink::new(fun, params))
    }

    pub fn push(
        &mut self,
        block: BlockId,
        bind: LocalRef,
        loc: LocOffsets,
        value: impl Into<Instruction>,
    ) -> InsnRef {
        let value = value.into();
        self.check_operands(bind, &value);

        let exprs = &mut self.cfg.block_mut(block).exprs;
        let insn = InsnRef {
            block,
            index: u32::try_from(exprs.len()).expect("too many bindings in one block"),
        };
        let owned_link = value.cast::<Send>().and_then(|send| send.link);
        exprs.push(Binding {
            bind: VariableUseSite::new(bind),
            loc,
            value,
        });
        if let Some(link) = owned_link {
            self.cfg.link_mut(link).set_owner(insn);
        }
        insn
    }

    /// Pushes an instruction with no counterpart in the source.
    pub fn push_synthetic(
        &mut self,
        block: BlockId,
        bind: LocalRef,
        loc: LocOffsets,
        value: impl Into<Instruction>,
    ) -> InsnRef {
        self.push(block, bind, loc, value.into().synthetic())
    }

    fn check_operands(&self, bind: LocalRef, value: &Instruction) {
        assert!(
            self.cfg.has_local(bind),
            "binding to unknown variable {bind:?}"
        );
        for local in value.operand_locals() {
            assert!(
                self.cfg.has_local(local),
                "{} refers to unknown variable {local:?}",
                value.tag().name()
            );
        }
        if let Some(link) = value.link() {
            assert!(
                self.cfg.has_link(link),
                "{} refers to a call-link that was never allocated",
                value.tag().name()
            );
        }
    }

    pub fn goto(&mut self, block: BlockId, target: BlockId) {
        self.set_exit(block, LocOffsets::none(), BlockExitKind::Goto { target });
    }

    pub fn branch(
        &mut self,
        block: BlockId,
        loc: LocOffsets,
        cond: LocalRef,
        then_block: BlockId,
        else_block: BlockId,
    ) {
        assert!(
            self.cfg.has_local(cond),
            "branch on unknown variable {cond:?}"
        );
        self.set_exit(
            block,
            loc,
            BlockExitKind::Branch {
                cond: VariableUseSite::new(cond),
                then_block,
                else_block,
            },
        );
    }

    pub fn set_exit(&mut self, block: BlockId, loc: LocOffsets, kind: BlockExitKind) {
        self.cfg.block_mut(block).exit = BlockExit { loc, kind };
    }

    /// Read access to the graph under construction.
    pub fn cfg(&self) -> &Cfg {
        &self.cfg
    }

    /// Panics if the graph is malformed.
    pub fn finish(self, gs: &GlobalState) -> Cfg {
        if let Err(error) = self.cfg.verify(gs) {
            panic!("malformed graph: {error}");
        }
        self.cfg
    }
}

#[cfg(test)]
mod tests {
    use super::CfgBuilder;
    use crate::cfg::instructions::{Ident, Literal, Return};
    use crate::cfg::{Cfg, LocalRef};
    use crate::global::{GlobalState, LocOffsets, NameRef, SymbolRef, Type};

    #[test]
    fn variables_are_deduplicated_and_temporaries_are_not() {
        let mut builder = CfgBuilder::new(SymbolRef::no_symbol());
        let ret = NameRef::ret();
        let a = builder.enter_local(ret);
        let b = builder.enter_local(ret);
        assert_eq!(a, b);
        let t1 = builder.new_temporary(ret);
        let t2 = builder.new_temporary(ret);
        assert_ne!(t1, t2);
        assert_ne!(t1, a);
        assert_eq!(builder.enter_local(NameRef::self_()), LocalRef::self_variable());
    }

    #[test]
    fn push_records_positions() {
        let gs = GlobalState::new();
        let mut builder = CfgBuilder::new(SymbolRef::no_symbol());
        let x = builder.enter_local(NameRef::ret());
        let entry = builder.entry();
        let first = builder.push(
            entry,
            x,
            LocOffsets::new(1, 2),
            Literal {
                value: Type::int_literal(1),
            },
        );
        let second = builder.push_synthetic(entry, LocalRef::no_variable(), LocOffsets::none(), Return::new(x));
        assert_eq!(first.index, 0);
        assert_eq!(second.index, 1);
        let cfg = builder.finish(&gs);
        assert!(cfg.binding(second).value.is_synthetic);
        assert_eq!(cfg.block(Cfg::ENTRY_BLOCK).exprs.len(), 2);
    }

    #[test]
    #[should_panic(expected = "unknown variable")]
    fn rejects_unknown_operands() {
        let mut builder = CfgBuilder::new(SymbolRef::no_symbol());
        let dangling = LocalRef::from_idx(40);
        let entry = builder.entry();
        builder.push(entry, LocalRef::no_variable(), LocOffsets::none(), Ident::new(dangling));
    }
}
