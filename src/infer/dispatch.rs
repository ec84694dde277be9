use std::collections::BTreeMap;

use super::{BlockContext, Environment, Inference, InferenceError};
use crate::cfg::{Cfg, TypeConstraint, instructions::Send};
use crate::global::{
    ArgInfo, GlobalState, LiteralValue, LocOffsets, NameRef, SymbolRef, Type, TypePtr, Visibility,
};

/// Type variable bindings in scope for one call.
type Bindings = BTreeMap<NameRef, TypePtr>;

/// What one receiver type answered for a call.
struct Dispatched {
    result: TypePtr,
    context: Option<BlockContext>,
}

impl Dispatched {
    fn plain(result: TypePtr) -> Self {
        Self {
            result,
            context: None,
        }
    }
}

/// Replaces bound variables. Unbound ones stay when `open`, become `T.untyped` otherwise.
fn apply(gs: &GlobalState, ty: &TypePtr, bindings: &Bindings, open: bool) -> TypePtr {
    Type::substitute(gs, ty, &|var| match bindings.get(&var) {
        Some(bound) => Some(bound.clone()),
        None if open => None,
        None => Some(Type::untyped()),
    })
}

fn close(gs: &GlobalState, ty: &TypePtr) -> TypePtr {
    apply(gs, ty, &Bindings::new(), false)
}

/// Collects lower bounds for the method type variables in `formal` from `actual`.
fn unify(
    gs: &GlobalState,
    formal: &TypePtr,
    actual: &TypePtr,
    type_params: &[NameRef],
    bounds: &mut TypeConstraint,
) {
    match (formal.as_ref(), actual.as_ref()) {
        (Type::TypeVar(var), _) if type_params.contains(var) => {
            bounds.bound(gs, *var, &Type::widen_literals(gs, actual));
        }
        (Type::Applied(class, formals), Type::Applied(other, actuals)) if class == other => {
            for (formal, actual) in formals.iter().zip(actuals) {
                unify(gs, formal, actual, type_params, bounds);
            }
        }
        (Type::Applied(class, formals), Type::Tuple(elems)) if *class == SymbolRef::array() => {
            if let Some(elem) = formals.first() {
                let joined = Type::lub_all(gs, elems.iter().cloned());
                unify(gs, elem, &joined, type_params, bounds);
            }
        }
        _ => {}
    }
}

fn describe_arity(required: usize, max: usize, has_rest: bool) -> String {
    if has_rest {
        format!("{required}+")
    } else if required == max {
        required.to_string()
    } else {
        format!("{required}..{max}")
    }
}

fn merge_contexts(
    gs: &GlobalState,
    left: Option<BlockContext>,
    right: Option<BlockContext>,
) -> Option<BlockContext> {
    match (left, right) {
        (Some(mut left), Some(right)) => {
            let len = left.param_types.len().max(right.param_types.len());
            left.param_types.resize(len, Type::untyped());
            for (mine, theirs) in left.param_types.iter_mut().zip(&right.param_types) {
                *mine = Type::lub(gs, mine, theirs);
            }
            left.self_type = match (left.self_type, right.self_type) {
                (Some(a), Some(b)) => Some(Type::lub(gs, &a, &b)),
                (a, b) => a.or(b),
            };
            left.result = Type::lub(gs, &left.result, &right.result);
            Some(left)
        }
        (left, right) => left.or(right),
    }
}

impl Inference<'_> {
    /// Dispatches a call over every component of the receiver type.
    pub(super) fn infer_send(
        &mut self,
        cfg: &Cfg,
        send: &Send,
        loc: LocOffsets,
        env: &Environment,
        errors: &mut Vec<InferenceError>,
    ) -> TypePtr {
        let gs = self.gs;
        let recv = env.type_of(send.recv.variable);
        let args: Vec<TypePtr> = send
            .args()
            .iter()
            .map(|arg| env.type_of(arg.variable))
            .collect();
        let components = match recv.as_ref() {
            Type::Union(parts) => parts.clone(),
            _ => vec![recv.clone()],
        };

        let mut result = Type::bottom();
        let mut context = None;
        for component in &components {
            let dispatched = self.dispatch(send, loc, component, &args, errors);
            result = Type::lub(gs, &result, &dispatched.result);
            context = merge_contexts(gs, context, dispatched.context);
        }

        if let Some(link) = send.link {
            let num_params = cfg.link(link).params.len();
            let mut context = context.unwrap_or_else(|| BlockContext::untyped(num_params));
            if context.param_types.len() < num_params {
                context.param_types.resize(num_params, Type::untyped());
            }
            self.set_context(link, context);
        }
        result
    }

    fn dispatch(
        &self,
        send: &Send,
        loc: LocOffsets,
        recv: &TypePtr,
        args: &[TypePtr],
        errors: &mut Vec<InferenceError>,
    ) -> Dispatched {
        let gs = self.gs;
        match recv.as_ref() {
            Type::Bottom => Dispatched::plain(Type::bottom()),
            Type::Untyped | Type::TypeVar(_) => Dispatched::plain(Type::untyped()),
            Type::Tuple(elems) if send.fun == NameRef::square_brackets() => {
                match tuple_index(send, args) {
                    Some(index) => {
                        let len = elems.len() as i64;
                        let index = if index < 0 { len + index } else { index };
                        let elem = usize::try_from(index).ok().and_then(|i| elems.get(i));
                        Dispatched::plain(elem.cloned().unwrap_or_else(Type::nil))
                    }
                    None => self.dispatch_instance(send, loc, recv, args, errors),
                }
            }
            Type::ClassOf(class) => {
                if let Some(method) = gs.find_singleton_member(*class, send.fun) {
                    return self.call_method(send, loc, method, &Bindings::new(), args, errors);
                }
                if send.fun == NameRef::new_() {
                    if let Some(initialize) = gs
                        .names
                        .lookup("initialize")
                        .and_then(|name| gs.find_member(*class, name))
                    {
                        self.call_method(send, loc, initialize, &Bindings::new(), args, errors);
                    }
                    let instance = match gs.class_info(*class) {
                        Some(info) if !info.type_params.is_empty() => Type::applied(
                            *class,
                            vec![Type::untyped(); info.type_params.len()],
                        ),
                        _ => Type::class(*class),
                    };
                    return Dispatched::plain(instance);
                }
                self.unknown_method(send, loc, recv, errors)
            }
            _ => self.dispatch_instance(send, loc, recv, args, errors),
        }
    }

    fn dispatch_instance(
        &self,
        send: &Send,
        loc: LocOffsets,
        recv: &TypePtr,
        args: &[TypePtr],
        errors: &mut Vec<InferenceError>,
    ) -> Dispatched {
        let gs = self.gs;
        let Some(class) = recv.underlying_class() else {
            return Dispatched::plain(Type::untyped());
        };
        match gs.find_member(class, send.fun) {
            Some(method) => {
                let bindings = self.receiver_bindings(method, recv);
                self.call_method(send, loc, method, &bindings, args, errors)
            }
            None => self.unknown_method(send, loc, recv, errors),
        }
    }

    fn unknown_method(
        &self,
        send: &Send,
        loc: LocOffsets,
        recv: &TypePtr,
        errors: &mut Vec<InferenceError>,
    ) -> Dispatched {
        errors.push(InferenceError::UnknownMethod {
            loc,
            method: self.gs.names.get(send.fun).to_string(),
            receiver: recv.show(self.gs),
        });
        Dispatched::plain(Type::untyped())
    }

    /// Binds the type parameters of the class that defines `method` from the receiver.
    fn receiver_bindings(&self, method: SymbolRef, recv: &TypePtr) -> Bindings {
        let gs = self.gs;
        let owner = gs.symbol(method).owner;
        let Some(info) = gs.class_info(owner) else {
            return Bindings::new();
        };
        let targs: Vec<TypePtr> = match recv.as_ref() {
            Type::Applied(class, targs) if *class == owner => targs.clone(),
            Type::Tuple(elems) if owner == SymbolRef::array() && !elems.is_empty() => {
                vec![Type::lub_all(gs, elems.iter().cloned())]
            }
            _ => Vec::new(),
        };
        info.type_params
            .iter()
            .enumerate()
            .map(|(i, param)| (*param, targs.get(i).cloned().unwrap_or_else(Type::untyped)))
            .collect()
    }

    fn call_method(
        &self,
        send: &Send,
        loc: LocOffsets,
        method: SymbolRef,
        receiver_bindings: &Bindings,
        args: &[TypePtr],
        errors: &mut Vec<InferenceError>,
    ) -> Dispatched {
        let gs = self.gs;
        let Some(info) = gs.method_info(method) else {
            return Dispatched::plain(Type::untyped());
        };
        let name = gs.show_symbol(method);

        if info.visibility == Visibility::Private && !send.is_private_ok {
            errors.push(InferenceError::PrivateMethodCall {
                loc,
                method: name.clone(),
            });
        }

        let positional: Vec<&ArgInfo> = info.positional_args().collect();
        let fixed: Vec<&ArgInfo> = positional
            .iter()
            .copied()
            .filter(|arg| !arg.flags.is_repeated)
            .collect();
        let rest = positional.iter().copied().find(|arg| arg.flags.is_repeated);
        let required = fixed.iter().filter(|arg| !arg.flags.is_optional).count();
        let given = usize::from(send.num_pos_args);
        if given < required || (rest.is_none() && given > fixed.len()) {
            errors.push(InferenceError::ArgumentCountMismatch {
                loc,
                method: name.clone(),
                expected: describe_arity(required, fixed.len(), rest.is_some()),
                found: given,
            });
        }

        // (formal, index of the actual argument)
        let mut pairs: Vec<(&ArgInfo, usize)> = (0..given)
            .filter_map(|i| fixed.get(i).copied().or(rest).map(|formal| (formal, i)))
            .collect();
        let keywords = &args[given.min(args.len())..];
        for (offset, key) in keywords.iter().enumerate().step_by(2) {
            let Type::Literal(LiteralValue::Symbol(key)) = key.as_ref() else {
                continue;
            };
            let value = given + offset + 1;
            if value >= args.len() {
                break;
            }
            if let Some(formal) = info
                .args
                .iter()
                .find(|arg| arg.flags.is_keyword && arg.name == *key)
            {
                pairs.push((formal, value));
            }
        }

        let mut bounds = TypeConstraint::default();
        for (formal, i) in &pairs {
            if let Some(ty) = &formal.ty {
                let ty = apply(gs, ty, receiver_bindings, true);
                unify(gs, &ty, &args[*i], &info.type_params, &mut bounds);
            }
        }
        let mut bindings = receiver_bindings.clone();
        bindings.extend(bounds.bounds().map(|(var, ty)| (var, ty.clone())));

        for (formal, i) in &pairs {
            let Some(ty) = &formal.ty else {
                continue;
            };
            let expected = apply(gs, ty, &bindings, false);
            if !Type::is_subtype(gs, &args[*i], &expected) {
                errors.push(InferenceError::ArgumentTypeMismatch {
                    loc: send.arg_locs().get(*i).copied().unwrap_or(loc),
                    method: name.clone(),
                    arg: gs.names.get(formal.name).to_string(),
                    expected: expected.show(gs),
                    found: args[*i].show(gs),
                });
            }
        }

        let declared = info.result_type.clone().unwrap_or_else(Type::untyped);
        let template = apply(gs, &declared, &bindings, true);
        let result = close(gs, &template);

        let context = send.link.map(|_| match &info.block {
            Some(sig) => BlockContext {
                method: name.clone(),
                self_type: sig.bind.as_ref().map(|bind| apply(gs, bind, &bindings, false)),
                param_types: sig
                    .params
                    .iter()
                    .map(|param| apply(gs, param, &bindings, false))
                    .collect(),
                returns: Some(apply(gs, &sig.returns, &bindings, true)),
                result: template.clone(),
                type_params: info.type_params.clone(),
            },
            None => BlockContext {
                method: name.clone(),
                result: template.clone(),
                ..BlockContext::untyped(0)
            },
        });

        Dispatched { result, context }
    }
}

/// The integer literal passed to `[]`, if that is all that was passed.
fn tuple_index(send: &Send, args: &[TypePtr]) -> Option<i64> {
    if send.num_pos_args != 1 || args.len() != 1 {
        return None;
    }
    match args[0].as_ref() {
        Type::Literal(LiteralValue::Integer(index)) => Some(*index),
        _ => None,
    }
}
