//! The control-flow graph of one method.
//!
//! Blocks hold bindings, each binding assigns the result of one [`Instruction`] to a
//! variable. Conditional control flow lives in the block exits, not in instructions.

use std::collections::HashMap;

use smallvec::SmallVec;

pub mod args;
pub mod builder;
pub mod display;
pub mod instructions;
pub mod link;
pub mod local;
pub mod verify;

pub use builder::CfgBuilder;
pub use instructions::{InsnKind, Instruction, InstructionKind, InstructionMut, Tag};
pub use link::{BlockParam, LinkRef, LinkState, Links, SendAndBlockLink, TypeConstraint};
pub use local::{LocalRef, LocalVariable, TypeSlot, VariableUseSite};
pub use verify::MalformedCfg;

use crate::global::{LocOffsets, SymbolRef};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockId(u32);

impl BlockId {
    pub const fn to_idx(self) -> usize {
        self.0 as usize
    }
}

/// The position of one binding in the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InsnRef {
    pub block: BlockId,
    pub index: u32,
}

/// Binds the result of an instruction to a variable.
#[derive(Debug)]
pub struct Binding {
    /// Inference writes the type of the result here.
    pub bind: VariableUseSite,
    pub loc: LocOffsets,
    pub value: Instruction,
}

#[derive(Debug)]
pub enum BlockExitKind {
    /// No successors: the method exit, or a dead end.
    Exit,
    /// Unconditional fallthrough.
    Goto { target: BlockId },
    /// Two successors, chosen by the truthiness of `cond`.
    Branch {
        cond: VariableUseSite,
        then_block: BlockId,
        else_block: BlockId,
    },
}

#[derive(Debug)]
pub struct BlockExit {
    pub loc: LocOffsets,
    pub kind: BlockExitKind,
}

impl BlockExit {
    pub fn exit() -> Self {
        Self {
            loc: LocOffsets::none(),
            kind: BlockExitKind::Exit,
        }
    }

    pub fn successors(&self) -> SmallVec<[BlockId; 2]> {
        match &self.kind {
            BlockExitKind::Exit => SmallVec::new(),
            BlockExitKind::Goto { target } => SmallVec::from_slice(&[*target]),
            BlockExitKind::Branch {
                then_block,
                else_block,
                ..
            } => SmallVec::from_slice(&[*then_block, *else_block]),
        }
    }
}

#[derive(Debug)]
pub struct BasicBlock {
    pub id: BlockId,
    pub exprs: Vec<Binding>,
    pub exit: BlockExit,
    /// Variables live on entry to the block, filled by [`args::fill_block_arguments`].
    pub args: Vec<LocalRef>,
}

#[derive(Debug)]
pub struct Cfg {
    /// The method this graph was built for.
    pub symbol: SymbolRef,
    pub basic_blocks: Vec<BasicBlock>,
    locals: Vec<LocalVariable>,
    local_lookup: HashMap<LocalVariable, LocalRef>,
    links: Links,
}

impl Cfg {
    pub const ENTRY_BLOCK: BlockId = BlockId(0);

    /// An empty graph: the entry block, and the `<none>` and `<self>` variables.
    pub fn new(symbol: SymbolRef) -> Self {
        let mut cfg = Self {
            symbol,
            basic_blocks: Vec::new(),
            locals: Vec::new(),
            local_lookup: HashMap::new(),
            links: Links::new(),
        };
        let none = cfg.enter_local(LocalVariable::no_variable());
        let this = cfg.enter_local(LocalVariable::self_variable());
        debug_assert_eq!(none, LocalRef::no_variable());
        debug_assert_eq!(this, LocalRef::self_variable());
        cfg.new_block();
        cfg
    }

    /// Returns the handle of `var`, entering it in the variable table on first use.
    pub fn enter_local(&mut self, var: LocalVariable) -> LocalRef {
        if let Some(existing) = self.local_lookup.get(&var) {
            return *existing;
        }
        let idx = u32::try_from(self.locals.len()).expect("variable table overflow");
        let local = LocalRef::from_idx(idx);
        self.locals.push(var);
        self.local_lookup.insert(var, local);
        local
    }

    pub fn has_local(&self, local: LocalRef) -> bool {
        local.to_idx() < self.locals.len()
    }

    pub fn local(&self, local: LocalRef) -> LocalVariable {
        *self
            .locals
            .get(local.to_idx())
            .unwrap_or_else(|| panic!("dangling variable handle {local:?}"))
    }

    pub fn num_locals(&self) -> usize {
        self.locals.len()
    }

    pub fn locals(&self) -> impl Iterator<Item = (LocalRef, LocalVariable)> + '_ {
        self.locals
            .iter()
            .enumerate()
            .map(|(idx, var)| (LocalRef::from_idx(idx as u32), *var))
    }

    pub fn new_block(&mut self) -> BlockId {
        let id = BlockId(u32::try_from(self.basic_blocks.len()).expect("too many blocks"));
        self.basic_blocks.push(BasicBlock {
            id,
            exprs: Vec::new(),
            exit: BlockExit::exit(),
            args: Vec::new(),
        });
        id
    }

    pub fn has_block(&self, id: BlockId) -> bool {
        id.to_idx() < self.basic_blocks.len()
    }

    pub fn block(&self, id: BlockId) -> &BasicBlock {
        &self.basic_blocks[id.to_idx()]
    }

    pub fn block_mut(&mut self, id: BlockId) -> &mut BasicBlock {
        &mut self.basic_blocks[id.to_idx()]
    }

    pub fn binding(&self, insn: InsnRef) -> &Binding {
        &self.block(insn.block).exprs[insn.index as usize]
    }

    pub fn binding_mut(&mut self, insn: InsnRef) -> &mut Binding {
        &mut self.block_mut(insn.block).exprs[insn.index as usize]
    }

    pub fn new_link(&mut self, link: SendAndBlockLink) -> LinkRef {
        self.links.insert(link)
    }

    pub fn has_link(&self, link: LinkRef) -> bool {
        self.links.get(link).is_some()
    }

    pub fn link(&self, link: LinkRef) -> &SendAndBlockLink {
        self.links
            .get(link)
            .unwrap_or_else(|| panic!("dangling call-link {}", link.to_idx()))
    }

    pub fn link_mut(&mut self, link: LinkRef) -> &mut SendAndBlockLink {
        self.links
            .get_mut(link)
            .unwrap_or_else(|| panic!("dangling call-link {}", link.to_idx()))
    }

    pub fn links(&self) -> impl Iterator<Item = (LinkRef, &SendAndBlockLink)> {
        self.links.iter()
    }

    pub fn successors(&self, id: BlockId) -> SmallVec<[BlockId; 2]> {
        self.block(id).exit.successors()
    }

    /// Predecessor lists, indexed by block.
    pub fn predecessors(&self) -> Vec<Vec<BlockId>> {
        let mut preds = vec![Vec::new(); self.basic_blocks.len()];
        for block in &self.basic_blocks {
            for succ in block.exit.successors() {
                preds[succ.to_idx()].push(block.id);
            }
        }
        preds
    }

    /// Blocks reachable from the entry, in reverse postorder.
    pub fn reverse_postorder(&self) -> Vec<BlockId> {
        let mut visited = vec![false; self.basic_blocks.len()];
        let mut postorder = Vec::with_capacity(self.basic_blocks.len());
        // (block, index of the next successor to visit)
        let mut stack = vec![(Self::ENTRY_BLOCK, 0usize)];
        visited[Self::ENTRY_BLOCK.to_idx()] = true;

        while let Some((block, next)) = stack.last_mut() {
            let succs = self.successors(*block);
            if let Some(succ) = succs.get(*next) {
                *next += 1;
                let succ = *succ;
                if !visited[succ.to_idx()] {
                    visited[succ.to_idx()] = true;
                    stack.push((succ, 0));
                }
            } else {
                postorder.push(*block);
                stack.pop();
            }
        }

        postorder.reverse();
        postorder
    }

    /// Ends the lifetime of every call-link. Nothing may write to them afterwards.
    pub fn release_links(&mut self) {
        for (_, link) in self.links.iter_mut() {
            link.release();
        }
    }

    /// Forgets every inferred type and link state so the graph can be inferred again.
    pub fn reset_types(&mut self) {
        for block in &mut self.basic_blocks {
            for binding in &mut block.exprs {
                binding.bind.reset();
                for site in binding.value.use_sites_mut() {
                    site.reset();
                }
            }
            if let BlockExitKind::Branch { cond, .. } = &mut block.exit.kind {
                cond.reset();
            }
        }
        for (_, link) in self.links.iter_mut() {
            link.reset();
        }
    }
}
