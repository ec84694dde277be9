use tracing::trace;

use super::{Environment, InferenceError, Inference, env::slot_for};
use crate::cfg::{Binding, Cfg, InsnRef, InstructionKind, instructions::CastKind};
use crate::global::{SymbolKind, SymbolRef, Type, TypePtr};

impl Inference<'_> {
    /// Runs one binding: narrows its use-sites, computes its result and binds it.
    pub(super) fn infer_binding(
        &mut self,
        cfg: &Cfg,
        at: InsnRef,
        binding: &mut Binding,
        env: &mut Environment,
        diagnostics: &mut Vec<InferenceError>,
    ) {
        for site in binding.value.use_sites_mut() {
            site.ty = env.slot(site.variable);
        }

        let gs = self.gs;
        let loc = binding.loc;
        let mut errors = Vec::new();
        let result: TypePtr = match binding.value.kind() {
            InstructionKind::Ident(insn) => env.type_of(insn.what),
            InstructionKind::Alias(insn) => match &gs.symbol(insn.what).kind {
                SymbolKind::Class(_) => Type::class_of(insn.what),
                SymbolKind::StaticField { ty } => ty.clone().unwrap_or_else(Type::untyped),
                SymbolKind::Method(_) => Type::untyped(),
            },
            InstructionKind::SolveConstraint(insn) => {
                let scratch = self.links.entry(insn.link.to_idx()).or_default();
                let solved = match &scratch.context {
                    Some(context) => scratch.constraint.solve(gs, &context.result),
                    None => Type::untyped(),
                };
                scratch.solution = Some(solved.clone());
                env.set(insn.send, solved.clone());
                solved
            }
            InstructionKind::Send(send) => self.infer_send(cfg, send, loc, env, &mut errors),
            InstructionKind::Return(insn) => {
                let found = env.type_of(insn.what.variable);
                let declared = gs
                    .method_info(self.method)
                    .and_then(|info| info.result_type.clone());
                if let Some(expected) = declared {
                    if !expected.contains_type_var() && !Type::is_subtype(gs, &found, &expected) {
                        errors.push(InferenceError::ReturnTypeMismatch {
                            loc,
                            expected: expected.show(gs),
                            found: found.show(gs),
                        });
                    }
                }
                Type::bottom()
            }
            InstructionKind::BlockReturn(insn) => {
                let found = env.type_of(insn.what.variable);
                let idx = insn.link.to_idx();
                let scratch = self.links.entry(idx).or_default();
                if let Some(context) = &scratch.context {
                    match context.returns.as_ref().map(|ty| ty.as_ref()) {
                        Some(Type::TypeVar(var)) if context.type_params.contains(var) => {
                            let bound = Type::widen_literals(gs, &found);
                            if scratch.constraint.bound(gs, *var, &bound) {
                                self.dirty_links.insert(idx);
                            }
                        }
                        Some(_) => {
                            let expected = context.returns.clone().unwrap_or_else(Type::untyped);
                            if !expected.contains_type_var()
                                && !Type::is_subtype(gs, &found, &expected)
                            {
                                errors.push(InferenceError::BlockReturnTypeMismatch {
                                    loc,
                                    method: context.method.clone(),
                                    expected: expected.show(gs),
                                    found: found.show(gs),
                                });
                            }
                        }
                        None => {}
                    }
                }
                Type::bottom()
            }
            InstructionKind::LoadSelf(insn) => self
                .links
                .get(&insn.link.to_idx())
                .and_then(|scratch| scratch.context.as_ref())
                .and_then(|context| context.self_type.clone())
                .unwrap_or_else(|| env.type_of(insn.fallback)),
            InstructionKind::Literal(insn) => insn.value.clone(),
            InstructionKind::GetCurrentException(_) => Type::class(SymbolRef::standard_error()),
            InstructionKind::LoadArg(insn) => {
                let arg = insn.argument(gs);
                let ty = arg.ty.clone().unwrap_or_else(Type::untyped);
                if arg.flags.is_repeated {
                    Type::applied(SymbolRef::array(), vec![ty])
                } else {
                    ty
                }
            }
            InstructionKind::ArgPresent(insn) => {
                // Resolved for the structural check only.
                insn.argument(gs);
                Type::boolean()
            }
            InstructionKind::LoadYieldParams(insn) => {
                let params = self
                    .links
                    .get(&insn.link.to_idx())
                    .and_then(|scratch| scratch.context.as_ref())
                    .map(|context| context.param_types.clone())
                    .unwrap_or_else(|| {
                        vec![Type::untyped(); cfg.link(insn.link).params.len()]
                    });
                Type::tuple(params)
            }
            InstructionKind::Cast(insn) => {
                let kind = insn.kind();
                let found = env.type_of(insn.value.variable);
                if kind.is_checked()
                    && self.config.check_casts
                    && !Type::is_subtype(gs, &found, &insn.ty)
                {
                    errors.push(InferenceError::CastTypeMismatch {
                        loc,
                        cast: gs.names.get(insn.cast).to_string(),
                        expected: insn.ty.show(gs),
                        found: found.show(gs),
                    });
                }
                match kind {
                    CastKind::Unsafe => Type::untyped(),
                    CastKind::Let | CastKind::AssertType | CastKind::Cast => insn.ty.clone(),
                }
            }
            InstructionKind::TAbsurd(insn) => {
                let found = env.type_of(insn.what.variable);
                if !found.is_bottom() {
                    errors.push(InferenceError::NotExhaustive {
                        loc,
                        found: found.show(gs),
                    });
                }
                Type::bottom()
            }
        };

        trace!(
            block = at.block.to_idx(),
            index = at.index,
            tag = binding.value.tag().name(),
            result = %result.show(gs),
            "inferred binding"
        );

        // Errors from synthetic instructions point at code the user never wrote.
        if !binding.value.is_synthetic {
            diagnostics.extend(errors);
        }
        binding.bind.ty = slot_for(&result);
        if binding.bind.variable.exists() {
            env.set(binding.bind.variable, result);
        }
    }
}
