use std::collections::HashMap;

use thiserror::Error;

use super::instructions::{ArgPresent, Cast, CastKind, InstructionKind, LoadArg, Send};
use super::{BlockExitKind, BlockId, Cfg, InsnRef, LinkRef, LocalRef};
use crate::global::{GlobalState, NameRef, SymbolRef};

/// A structural violation in a graph. Always a bug in whoever built the graph.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MalformedCfg {
    #[error("{at:?} refers to variable {variable:?}, which is not in the variable table")]
    DanglingVariable { at: InsnRef, variable: LocalRef },
    #[error("{at:?} refers to call-link {link}, which does not exist")]
    DanglingLink { at: InsnRef, link: usize },
    #[error("block {from:?} jumps to block {to:?}, which does not exist")]
    DanglingBlock { from: BlockId, to: BlockId },
    #[error("send at {at:?} has {num_pos_args} positional arguments out of {args}")]
    PositionalArgCount {
        at: InsnRef,
        num_pos_args: usize,
        args: usize,
    },
    #[error("call-link {link} is owned by {recorded:?} but carried by the send at {actual:?}")]
    LinkOwnerMismatch {
        link: usize,
        recorded: Option<InsnRef>,
        actual: InsnRef,
    },
    #[error("cast at {at:?} names {cast:?}, which is not a cast kind")]
    UnknownCastKind { at: InsnRef, cast: NameRef },
    #[error("{at:?} loads argument {arg_id} of {method:?}, which has no such argument")]
    DanglingArgument {
        at: InsnRef,
        method: SymbolRef,
        arg_id: u16,
    },
}

fn link_idx(link: LinkRef) -> usize {
    link.to_idx()
}

fn has_argument(gs: &GlobalState, method: SymbolRef, arg_id: u16) -> bool {
    gs.has_symbol(method)
        && gs
            .method_info(method)
            .is_some_and(|info| usize::from(arg_id) < info.args.len())
}

impl Cfg {
    /// Checks every structural invariant a graph must satisfy before inference.
    ///
    /// `Send` argument and location counts agree by construction, see [`Send::new`].
    pub fn verify(&self, gs: &GlobalState) -> Result<(), MalformedCfg> {
        let mut owners: HashMap<usize, InsnRef> = HashMap::new();

        for block in &self.basic_blocks {
            for (index, binding) in block.exprs.iter().enumerate() {
                let at = InsnRef {
                    block: block.id,
                    index: index as u32,
                };

                let value = &binding.value;
                for variable in std::iter::once(binding.bind.variable).chain(value.operand_locals()) {
                    if !self.has_local(variable) {
                        return Err(MalformedCfg::DanglingVariable { at, variable });
                    }
                }

                if let Some(link) = value.link() {
                    if !self.has_link(link) {
                        return Err(MalformedCfg::DanglingLink {
                            at,
                            link: link_idx(link),
                        });
                    }
                }

                match value.kind() {
                    InstructionKind::Cast(Cast { cast, .. }) => {
                        if CastKind::from_name(*cast).is_none() {
                            return Err(MalformedCfg::UnknownCastKind { at, cast: *cast });
                        }
                    }
                    InstructionKind::LoadArg(LoadArg { arg_id, method })
                    | InstructionKind::ArgPresent(ArgPresent { arg_id, method }) => {
                        if !has_argument(gs, *method, *arg_id) {
                            return Err(MalformedCfg::DanglingArgument {
                                at,
                                method: *method,
                                arg_id: *arg_id,
                            });
                        }
                    }
                    _ => {}
                }

                if let Some(send) = value.cast::<Send>() {
                    if usize::from(send.num_pos_args) > send.args().len() {
                        return Err(MalformedCfg::PositionalArgCount {
                            at,
                            num_pos_args: usize::from(send.num_pos_args),
                            args: send.args().len(),
                        });
                    }
                    if let Some(link) = send.link {
                        let recorded = self.link(link).owner();
                        if recorded != Some(at) || owners.insert(link_idx(link), at).is_some() {
                            return Err(MalformedCfg::LinkOwnerMismatch {
                                link: link_idx(link),
                                recorded,
                                actual: at,
                            });
                        }
                    }
                }
            }

            if let BlockExitKind::Branch { cond, .. } = &block.exit.kind {
                if !self.has_local(cond.variable) {
                    return Err(MalformedCfg::DanglingVariable {
                        at: InsnRef {
                            block: block.id,
                            index: block.exprs.len() as u32,
                        },
                        variable: cond.variable,
                    });
                }
            }
            for succ in block.exit.successors() {
                if !self.has_block(succ) {
                    return Err(MalformedCfg::DanglingBlock {
                        from: block.id,
                        to: succ,
                    });
                }
            }
        }

        Ok(())
    }
}
