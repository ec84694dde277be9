//! Flow-sensitive type inference over one method's graph.
//!
//! A forward walk visits reachable blocks in reverse postorder, revisiting a block
//! whenever the environment flowing into it grows or a call-link it depends on
//! changes. Types at block entries only grow, are widened after a bounded number of
//! changes, and so the walk terminates.
//!
//! The walk writes the narrowed type of every use-site it reaches. Blocks it never
//! reaches keep their slots unset. Call-links are committed once, after the walk, and
//! stay readable until [`Cfg::release_links`].

use std::collections::{BTreeSet, HashMap};

use smallvec::SmallVec;
use tracing::{debug, instrument, trace, warn};

use crate::cfg::{BlockExitKind, BlockId, Cfg, InsnRef, LinkRef, LocalRef, TypeConstraint};
use crate::config::InferenceConfig;
use crate::global::{GlobalState, NameRef, SymbolRef, Truthiness, Type, TypePtr};

mod dispatch;
mod env;
pub mod errors;
mod transfer;

pub use env::Environment;
pub use errors::InferenceError;

use env::slot_for;

#[derive(Debug)]
pub struct InferenceResult {
    /// Errors in source order of the blocks that raised them.
    pub diagnostics: Vec<InferenceError>,
    /// How often each block was visited, indexed by block.
    pub visits: Vec<u32>,
    /// The join of the environments at every reached exit.
    pub exit_env: Environment,
    /// `false` when the visit budget ran out before the types settled.
    pub converged: bool,
}

impl InferenceResult {
    pub fn has_errors(&self) -> bool {
        !self.diagnostics.is_empty()
    }
}

/// What a call tells the block passed to it.
#[derive(Debug, Clone, PartialEq)]
struct BlockContext {
    method: String,
    self_type: Option<TypePtr>,
    param_types: Vec<TypePtr>,
    /// The declared block result. A bare method type parameter here is solved from the
    /// values the block returns, anything else is checked against them.
    returns: Option<TypePtr>,
    /// The call's result with that parameter still open.
    result: TypePtr,
    type_params: Vec<NameRef>,
}

impl BlockContext {
    fn untyped(num_params: usize) -> Self {
        Self {
            method: String::new(),
            self_type: None,
            param_types: vec![Type::untyped(); num_params],
            returns: None,
            result: Type::untyped(),
            type_params: Vec::new(),
        }
    }
}

/// Per-link state during the walk. Only written back to the graph once it settled.
#[derive(Debug, Default)]
struct LinkScratch {
    context: Option<BlockContext>,
    constraint: TypeConstraint,
    solution: Option<TypePtr>,
}

struct Inference<'a> {
    gs: &'a GlobalState,
    config: &'a InferenceConfig,
    method: SymbolRef,
    links: HashMap<usize, LinkScratch>,
    /// Links whose scratch changed during the current block visit.
    dirty_links: BTreeSet<usize>,
}

/// Where control goes after a block, with the environment on each edge.
struct Successors {
    edges: SmallVec<[(BlockId, Environment); 2]>,
    exit: Option<Environment>,
}

/// Infers the types of `cfg`.
///
/// Writes every reached use-site and binding slot and the state of every call-link. A
/// graph can be inferred again only after [`Cfg::reset_types`].
#[instrument(level = "debug", skip_all, fields(method = %gs.show_symbol(cfg.symbol)))]
pub fn infer(gs: &GlobalState, cfg: &mut Cfg, config: &InferenceConfig) -> InferenceResult {
    let num_blocks = cfg.basic_blocks.len();
    let order = cfg.reverse_postorder();
    let mut rank = vec![usize::MAX; num_blocks];
    for (position, block) in order.iter().enumerate() {
        rank[block.to_idx()] = position;
    }

    let mut link_blocks: HashMap<usize, BTreeSet<BlockId>> = HashMap::new();
    for block in &cfg.basic_blocks {
        for binding in &block.exprs {
            if let Some(link) = binding.value.link() {
                link_blocks.entry(link.to_idx()).or_default().insert(block.id);
            }
        }
    }

    let mut engine = Inference {
        gs,
        config,
        method: cfg.symbol,
        links: HashMap::new(),
        dirty_links: BTreeSet::new(),
    };

    let mut entry_envs: Vec<Option<Environment>> = vec![None; num_blocks];
    let mut growth: Vec<HashMap<LocalRef, u32>> = vec![HashMap::new(); num_blocks];
    let mut visits = vec![0u32; num_blocks];
    let mut diagnostics: Vec<Vec<InferenceError>> = vec![Vec::new(); num_blocks];
    let mut exit_envs: Vec<Option<Environment>> = vec![None; num_blocks];

    entry_envs[Cfg::ENTRY_BLOCK.to_idx()] = Some(engine.entry_environment(cfg));
    let mut worklist = BTreeSet::from([(0usize, Cfg::ENTRY_BLOCK)]);
    let mut converged = true;

    while let Some((_, block)) = worklist.pop_first() {
        let idx = block.to_idx();
        visits[idx] += 1;
        if visits[idx] > config.max_block_visits {
            warn!(
                block = idx,
                budget = config.max_block_visits,
                "block visit budget exhausted, stopping inference"
            );
            converged = false;
            break;
        }
        debug!(block = idx, visit = visits[idx], "visiting block");

        let env = entry_envs[idx].clone().unwrap_or_default();
        let (successors, block_diagnostics) = engine.visit_block(cfg, block, env);
        diagnostics[idx] = block_diagnostics;
        exit_envs[idx] = successors.exit;

        for link in std::mem::take(&mut engine.dirty_links) {
            for dependent in link_blocks.get(&link).into_iter().flatten() {
                if entry_envs[dependent.to_idx()].is_some() {
                    worklist.insert((rank[dependent.to_idx()], *dependent));
                }
            }
        }

        for (succ, edge_env) in successors.edges {
            let succ_idx = succ.to_idx();
            if engine.merge_into(&mut entry_envs[succ_idx], &mut growth[succ_idx], edge_env) {
                worklist.insert((rank[succ_idx], succ));
            }
        }
    }

    engine.commit(cfg);

    let mut exit_env = Environment::default();
    for env in exit_envs.into_iter().flatten() {
        for (var, ty) in env.iter() {
            let joined = match exit_env.get(var) {
                Some(existing) => Type::lub(gs, existing, ty),
                None => ty.clone(),
            };
            exit_env.set(var, joined);
        }
    }

    InferenceResult {
        diagnostics: diagnostics.into_iter().flatten().collect(),
        visits,
        exit_env,
        converged,
    }
}

impl Inference<'_> {
    fn entry_environment(&self, cfg: &Cfg) -> Environment {
        let symbol = self.gs.symbol(cfg.symbol);
        let self_type = match self.gs.method_info(cfg.symbol) {
            Some(info) if info.is_singleton => Type::class_of(symbol.owner),
            Some(_) if symbol.owner.exists() => self.gs.self_type_of(symbol.owner),
            _ => Type::untyped(),
        };
        let mut env = Environment::default();
        env.set(LocalRef::self_variable(), self_type);
        env
    }

    fn visit_block(
        &mut self,
        cfg: &mut Cfg,
        block: BlockId,
        mut env: Environment,
    ) -> (Successors, Vec<InferenceError>) {
        let mut diagnostics = Vec::new();
        let mut exprs = std::mem::take(&mut cfg.block_mut(block).exprs);
        for (index, binding) in exprs.iter_mut().enumerate() {
            let at = InsnRef {
                block,
                index: index as u32,
            };
            self.infer_binding(cfg, at, binding, &mut env, &mut diagnostics);
        }
        cfg.block_mut(block).exprs = exprs;

        let gs = self.gs;
        let mut edges = SmallVec::new();
        let mut exit = None;
        match &mut cfg.block_mut(block).exit.kind {
            BlockExitKind::Exit => exit = Some(env),
            BlockExitKind::Goto { target } => edges.push((*target, env)),
            BlockExitKind::Branch {
                cond,
                then_block,
                else_block,
            } => {
                cond.ty = env.slot(cond.variable);
                let cond_type = env.type_of(cond.variable);
                let truthiness = Type::truthiness(gs, &cond_type);
                trace!(block = block.to_idx(), ?truthiness, "branch");
                match truthiness {
                    Truthiness::Unreachable => {}
                    Truthiness::Truthy => edges.push((*then_block, env)),
                    Truthiness::Falsy => edges.push((*else_block, env)),
                    Truthiness::Unknown => {
                        let mut then_env = env.clone();
                        let mut else_env = env;
                        if cond.variable.exists() {
                            then_env.set(cond.variable, Type::narrow_truthy(gs, &cond_type));
                            else_env.set(cond.variable, Type::narrow_falsy(gs, &cond_type));
                        }
                        edges.push((*then_block, then_env));
                        edges.push((*else_block, else_env));
                    }
                }
            }
        }

        (Successors { edges, exit }, diagnostics)
    }

    /// Joins `incoming` into the entry environment of a block. Returns whether it grew.
    fn merge_into(
        &self,
        entry: &mut Option<Environment>,
        growth: &mut HashMap<LocalRef, u32>,
        incoming: Environment,
    ) -> bool {
        let Some(existing) = entry else {
            *entry = Some(incoming);
            return true;
        };

        let mut changed = false;
        for (var, ty) in incoming.iter() {
            let merged = match existing.get(var) {
                None => ty.clone(),
                Some(old) if old == ty => continue,
                Some(old) => {
                    let joined = Type::lub(self.gs, old, ty);
                    if self.config.widen_literals {
                        Type::widen_literals(self.gs, &joined)
                    } else {
                        joined
                    }
                }
            };
            if existing.get(var) == Some(&merged) {
                continue;
            }
            let count = growth.entry(var).or_default();
            *count += 1;
            let merged = if *count > self.config.widening_threshold {
                trace!(?var, "widening to T.untyped");
                Type::untyped()
            } else {
                merged
            };
            if existing.get(var) != Some(&merged) {
                existing.set(var, merged);
                changed = true;
            }
        }
        changed
    }

    fn set_context(&mut self, link: LinkRef, context: BlockContext) {
        let idx = link.to_idx();
        let scratch = self.links.entry(idx).or_default();
        if scratch.context.as_ref() != Some(&context) {
            scratch.context = Some(context);
            self.dirty_links.insert(idx);
        }
    }

    /// Writes the settled link state into the graph. A call whose link stays unsolved
    /// infers as `T.untyped`.
    fn commit(&mut self, cfg: &mut Cfg) {
        let links: Vec<LinkRef> = cfg.links().map(|(link, _)| link).collect();
        for link in links {
            if let Some(LinkScratch {
                context: Some(context),
                constraint,
                solution,
            }) = self.links.remove(&link.to_idx())
            {
                let record = cfg.link_mut(link);
                record.populate(context.self_type, context.param_types);
                record.constrain(constraint);
                let result = match solution {
                    Some(solution) => {
                        record.solve(solution.clone());
                        solution
                    }
                    None => {
                        debug!(link = link.to_idx(), "call-link left unsolved");
                        Type::untyped()
                    }
                };
                if let Some(owner) = record.owner() {
                    cfg.binding_mut(owner).bind.ty = slot_for(&result);
                }
            }
        }
    }
}
