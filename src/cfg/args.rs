use std::collections::BTreeSet;

use smallvec::SmallVec;
use tracing::{debug, instrument};

use super::{BlockExitKind, Binding, Cfg, InstructionKind, LocalRef};

/// Variables one binding reads and writes, in that order of effect.
struct Effects {
    reads: SmallVec<[LocalRef; 4]>,
    writes: SmallVec<[LocalRef; 2]>,
}

fn effects(binding: &Binding) -> Effects {
    let mut writes = SmallVec::new();
    if binding.bind.variable.exists() {
        writes.push(binding.bind.variable);
    }
    let reads = binding.value.operand_locals();
    match binding.value.kind() {
        // Rebinds the call's variable to the solved type.
        InstructionKind::SolveConstraint(insn) => writes.push(insn.send),
        InstructionKind::Ident(_)
        | InstructionKind::Alias(_)
        | InstructionKind::Send(_)
        | InstructionKind::Return(_)
        | InstructionKind::BlockReturn(_)
        | InstructionKind::LoadSelf(_)
        | InstructionKind::Literal(_)
        | InstructionKind::GetCurrentException(_)
        | InstructionKind::LoadArg(_)
        | InstructionKind::ArgPresent(_)
        | InstructionKind::LoadYieldParams(_)
        | InstructionKind::Cast(_)
        | InstructionKind::TAbsurd(_) => {}
    }
    Effects { reads, writes }
}

/// Fills [`super::BasicBlock::args`] with the variables live on entry to each block that
/// some binding in the graph writes.
#[instrument(level = "debug", skip_all, fields(blocks = cfg.basic_blocks.len()))]
pub fn fill_block_arguments(cfg: &mut Cfg) {
    let num_blocks = cfg.basic_blocks.len();
    let mut upward_exposed = vec![BTreeSet::new(); num_blocks];
    let mut defined = vec![BTreeSet::new(); num_blocks];
    let mut written_anywhere = BTreeSet::new();

    for block in &cfg.basic_blocks {
        let idx = block.id.to_idx();
        for binding in &block.exprs {
            let Effects { reads, writes } = effects(binding);
            for read in reads {
                if read.exists() && !defined[idx].contains(&read) {
                    upward_exposed[idx].insert(read);
                }
            }
            for write in writes {
                defined[idx].insert(write);
                written_anywhere.insert(write);
            }
        }
        if let BlockExitKind::Branch { cond, .. } = &block.exit.kind {
            if cond.variable.exists() && !defined[idx].contains(&cond.variable) {
                upward_exposed[idx].insert(cond.variable);
            }
        }
    }

    let mut live_in: Vec<BTreeSet<LocalRef>> = upward_exposed.clone();
    let mut rounds = 0;
    let mut changed = true;
    while changed {
        changed = false;
        rounds += 1;
        for block in cfg.basic_blocks.iter().rev() {
            let idx = block.id.to_idx();
            let mut live: BTreeSet<LocalRef> = upward_exposed[idx].clone();
            for succ in block.exit.successors() {
                live.extend(
                    live_in[succ.to_idx()]
                        .iter()
                        .filter(|var| !defined[idx].contains(*var))
                        .copied(),
                );
            }
            if live != live_in[idx] {
                live_in[idx] = live;
                changed = true;
            }
        }
    }
    debug!(rounds, "block liveness converged");

    for block in &mut cfg.basic_blocks {
        block.args = live_in[block.id.to_idx()]
            .iter()
            .filter(|var| written_anywhere.contains(*var))
            .copied()
            .collect();
    }
}

#[cfg(test)]
mod tests {
    use super::fill_block_arguments;
    use crate::cfg::instructions::{Literal, Return};
    use crate::cfg::{CfgBuilder, LocalRef};
    use crate::global::{GlobalState, LocOffsets, NameRef, SymbolRef, Type};

    #[test]
    fn straight_line_blocks_take_what_flows_in() {
        let gs = GlobalState::new();
        let mut builder = CfgBuilder::new(SymbolRef::no_symbol());
        let x = builder.enter_local(NameRef::ret());
        let entry = builder.entry();
        let next = builder.new_block();
        builder.push(
            entry,
            x,
            LocOffsets::none(),
            Literal {
                value: Type::int_literal(1),
            },
        );
        builder.goto(entry, next);
        builder.push(next, LocalRef::no_variable(), LocOffsets::none(), Return::new(x));
        let mut cfg = builder.finish(&gs);

        fill_block_arguments(&mut cfg);
        assert!(cfg.block(entry).args.is_empty());
        assert_eq!(cfg.block(next).args, vec![x]);
    }
}
