//! Structural unification under the inference state.
//!
//! Both sides are run through the current substitution first, so the
//! algorithm only ever sees fully-resolved heads. Variable bindings extend
//! the substitution; everything else recurses pointwise. Records are
//! width-permissive (the expected side may require a subset of the
//! observed side's fields), `Unit` interoperates with the empty tuple and
//! the empty record, and `List a` is interchangeable with the `List`
//! constructor applied to one argument.

use noo_common::Span;

use crate::error::{ArityContext, TypeError, UnifyContext};
use crate::state::InferState;
use crate::ty::{
    is_constructor_var, Constraint, FieldSchema, FunctionType, RecordStructure, Type, TypeVar,
};

/// Unify two types, extending the state's substitution.
///
/// `a` is the expected side, `b` the observed side; the distinction only
/// matters for record width-permissiveness and error wording.
pub fn unify(
    state: &mut InferState,
    a: &Type,
    b: &Type,
    span: Span,
    context: &UnifyContext,
) -> Result<(), TypeError> {
    let a = state.subst.apply(a);
    let b = state.subst.apply(b);
    if a == b {
        return Ok(());
    }

    match (a, b) {
        // Unknown stands in for a failed literal; it never blocks.
        (Type::Unknown, _) | (_, Type::Unknown) => Ok(()),

        // Same variable on both sides (possibly with differing attached
        // constraint copies).
        (Type::Var(v1), Type::Var(v2)) if v1.name == v2.name => Ok(()),

        // Variable meets anything: bind it.
        (Type::Var(tv), other) | (other, Type::Var(tv)) => {
            bind_variable(state, tv, other, span, context)
        }

        // Unit, the empty tuple, and the empty record interoperate.
        (Type::Unit, Type::Tuple(items)) | (Type::Tuple(items), Type::Unit)
            if items.is_empty() =>
        {
            Ok(())
        }
        (Type::Unit, Type::Record(fields)) | (Type::Record(fields), Type::Unit)
            if fields.is_empty() =>
        {
            Ok(())
        }
        (Type::Tuple(items), Type::Record(fields))
        | (Type::Record(fields), Type::Tuple(items))
            if items.is_empty() && fields.is_empty() =>
        {
            Ok(())
        }

        (Type::Function(f1), Type::Function(f2)) => {
            unify_functions(state, &f1, &f2, span, context)
        }

        (Type::List(e1), Type::List(e2)) => unify(state, &e1, &e2, span, context),

        // `List a` and the `List` constructor applied to one argument are
        // the same type; normalize either direction.
        (Type::List(elem), Type::Variant { name, args })
        | (Type::Variant { name, args }, Type::List(elem))
            if name == "List" && args.len() == 1 =>
        {
            unify(state, &elem, &args[0], span, context)
        }

        (Type::Tuple(t1), Type::Tuple(t2)) => {
            if t1.len() != t2.len() {
                return Err(TypeError::ArityMismatch {
                    expected: t1.len(),
                    found: t2.len(),
                    what: ArityContext::Tuple,
                    span,
                });
            }
            for (x, y) in t1.iter().zip(t2.iter()) {
                unify(state, x, y, span, context)?;
            }
            Ok(())
        }

        // Width-permissive records: every field the expected side names
        // must exist in the observed side; extra observed fields pass.
        (Type::Record(expected), Type::Record(observed)) => {
            for (field, exp_ty) in &expected {
                match observed.get(field) {
                    Some(obs_ty) => unify(state, exp_ty, obs_ty, span, context)?,
                    None => {
                        return Err(TypeError::MissingField {
                            field: field.clone(),
                            record: Type::Record(observed.clone()),
                            span,
                        })
                    }
                }
            }
            Ok(())
        }

        (Type::Variant { name: n1, args: a1 }, Type::Variant { name: n2, args: a2 }) => {
            // A lowercase head is a constructor variable; bind it to the
            // other side's constructor.
            if is_constructor_var(&n1) || is_constructor_var(&n2) {
                let (var_name, con_name, var_args, con_args) = if is_constructor_var(&n1) {
                    (n1, n2, a1, a2)
                } else {
                    (n2, n1, a2, a1)
                };
                if var_args.len() != con_args.len() {
                    return Err(TypeError::Mismatch {
                        expected: Type::Variant {
                            name: var_name,
                            args: var_args,
                        },
                        found: Type::Variant {
                            name: con_name,
                            args: con_args,
                        },
                        span,
                        context: context.clone(),
                    });
                }
                if var_name != con_name {
                    state.subst.insert(
                        var_name,
                        Type::Variant {
                            name: con_name,
                            args: Vec::new(),
                        },
                    );
                }
                for (x, y) in var_args.iter().zip(con_args.iter()) {
                    unify(state, x, y, span, context)?;
                }
                return Ok(());
            }
            if n1 != n2 || a1.len() != a2.len() {
                return Err(TypeError::Mismatch {
                    expected: Type::Variant { name: n1, args: a1 },
                    found: Type::Variant { name: n2, args: a2 },
                    span,
                    context: context.clone(),
                });
            }
            for (x, y) in a1.iter().zip(a2.iter()) {
                unify(state, x, y, span, context)?;
            }
            Ok(())
        }

        // A constructor-variable application against a saturated list.
        (Type::Variant { name, args }, Type::List(elem))
        | (Type::List(elem), Type::Variant { name, args })
            if is_constructor_var(&name) && args.len() == 1 =>
        {
            state
                .subst
                .insert(name, Type::variant("List", Vec::new()));
            unify(state, &args[0], &elem, span, context)
        }

        (Type::Union(u1), Type::Union(u2)) => {
            if u1.len() != u2.len() {
                return Err(TypeError::Mismatch {
                    expected: Type::Union(u1),
                    found: Type::Union(u2),
                    span,
                    context: context.clone(),
                });
            }
            for (x, y) in u1.iter().zip(u2.iter()) {
                unify(state, x, y, span, context)?;
            }
            Ok(())
        }

        // Constrained wrappers lower to their base; the table's
        // constraints then land on whatever the base's variables became.
        (Type::Constrained { base, table }, other)
        | (other, Type::Constrained { base, table }) => {
            unify(state, &base, &other, span, context)?;
            for (var, constraints) in table {
                attach_constraints(state, &var, &constraints, span, context)?;
            }
            Ok(())
        }

        (a, b) => Err(TypeError::Mismatch {
            expected: a,
            found: b,
            span,
            context: context.clone(),
        }),
    }
}

/// Bind a variable to a type after the occurs check, propagating or
/// verifying the variable's attached constraints.
fn bind_variable(
    state: &mut InferState,
    tv: TypeVar,
    other: Type,
    span: Span,
    context: &UnifyContext,
) -> Result<(), TypeError> {
    if let Type::Var(other_tv) = &other {
        // Variable meets variable: merge constraint sets onto the
        // surviving variable and bind through it. The merge is also
        // recorded in the state, so bare instances of the survivor see
        // it when the survivor binds.
        let mut merged = other_tv.constraints.clone();
        for c in &tv.constraints {
            let rekeyed = c.with_var(&other_tv.name);
            if !merged.contains(&rekeyed) {
                merged.push(rekeyed);
            }
        }
        state.note_var_constraints(&other_tv.name, &merged);
        state.subst.insert(
            tv.name,
            Type::Var(TypeVar {
                name: other_tv.name.clone(),
                constraints: merged,
            }),
        );
        return Ok(());
    }

    if other.mentions_var(&tv.name) {
        return Err(TypeError::OccursCheck {
            var: tv.name,
            ty: other,
            span,
        });
    }
    let mut constraints = tv.constraints.clone();
    for pending in state.take_var_constraints(&tv.name) {
        if !constraints.contains(&pending) {
            constraints.push(pending);
        }
    }
    verify_constraints(state, &constraints, &other, span, context)?;
    state.subst.insert(tv.name, other);
    Ok(())
}

/// Attach a constraint list to whatever `var` currently resolves to:
/// still-variable targets get a fresh constrained variable spliced into
/// the chain, concrete targets are verified immediately.
fn attach_constraints(
    state: &mut InferState,
    var: &str,
    constraints: &[Constraint],
    span: Span,
    context: &UnifyContext,
) -> Result<(), TypeError> {
    let image = state.subst.apply(&Type::var(var));
    match image {
        Type::Var(tv) => {
            // Splice a fresh carrier variable into the chain; the merged
            // constraints ride on it and are checked when it binds.
            let carrier_name = state.fresh_name();
            let mut merged: Vec<Constraint> = Vec::new();
            for c in tv.constraints.iter().chain(constraints.iter()) {
                let rekeyed = c.with_var(&carrier_name);
                if !merged.contains(&rekeyed) {
                    merged.push(rekeyed);
                }
            }
            state.note_var_constraints(&carrier_name, &merged);
            state.subst.insert(
                tv.name,
                Type::Var(TypeVar {
                    name: carrier_name,
                    constraints: merged,
                }),
            );
            Ok(())
        }
        concrete => verify_constraints(state, constraints, &concrete, span, context),
    }
}

/// Check a constraint list against a (non-variable) type. Trait
/// constraints verify against the registry when the type has a dispatch
/// name; structural constraints verify field presence and types.
pub fn verify_constraints(
    state: &mut InferState,
    constraints: &[Constraint],
    ty: &Type,
    span: Span,
    context: &UnifyContext,
) -> Result<(), TypeError> {
    for constraint in constraints {
        match constraint {
            Constraint::Implements { trait_name, .. } => {
                verify_trait(state, trait_name, ty, span)?
            }
            // Legacy predicate names map straight onto trait names.
            Constraint::Is { pred, .. } => verify_trait(state, pred, ty, span)?,
            Constraint::Has { structure, .. } => {
                verify_structure(state, structure, ty, span, context)?
            }
            Constraint::HasField { field, ty: field_ty, .. } => {
                let structure = RecordStructure::new()
                    .with_field(field.clone(), FieldSchema::Type(field_ty.clone()));
                verify_structure(state, &structure, ty, span, context)?
            }
            // User-named constraints are discharged by resolution, not
            // here.
            Constraint::Custom { .. } => {}
        }
    }
    Ok(())
}

fn verify_trait(
    state: &mut InferState,
    trait_name: &str,
    ty: &Type,
    span: Span,
) -> Result<(), TypeError> {
    match ty.dispatch_name() {
        Some(type_name) => {
            if state.traits.type_has_implementation(trait_name, &type_name) {
                Ok(())
            } else {
                Err(TypeError::TraitNotImplemented {
                    trait_name: trait_name.to_string(),
                    ty: ty.clone(),
                    span,
                })
            }
        }
        // Still polymorphic: defer to constraint resolution.
        None => Ok(()),
    }
}

fn verify_structure(
    state: &mut InferState,
    structure: &RecordStructure,
    ty: &Type,
    span: Span,
    context: &UnifyContext,
) -> Result<(), TypeError> {
    match ty {
        Type::Record(fields) => {
            for (field, schema) in &structure.fields {
                let Some(field_ty) = fields.get(field) else {
                    return Err(TypeError::MissingField {
                        field: field.clone(),
                        record: ty.clone(),
                        span,
                    });
                };
                match schema {
                    FieldSchema::Type(required) => {
                        unify(state, required, field_ty, span, context)?
                    }
                    FieldSchema::Nested(inner) => {
                        let resolved = state.subst.apply(field_ty);
                        verify_structure(state, inner, &resolved, span, context)?
                    }
                }
            }
            Ok(())
        }
        // Still polymorphic: the constraint stays attached and resolves
        // later.
        Type::Var(_) | Type::Unknown => Ok(()),
        other => Err(TypeError::KindMismatch {
            expected: "record",
            found: other.clone(),
            span,
        }),
    }
}

/// Unify two function types by their curried spines. `(a) -> (b) -> c`
/// and `(a, b) -> c` describe the same curried function; the spines are
/// flattened before pointwise unification. Effect sets union (they never
/// conflict) and constraint lists merge, so neither can fail.
fn unify_functions(
    state: &mut InferState,
    f1: &FunctionType,
    f2: &FunctionType,
    span: Span,
    context: &UnifyContext,
) -> Result<(), TypeError> {
    let (p1, r1) = flatten_spine(f1);
    let (p2, r2) = flatten_spine(f2);

    let shared = p1.len().min(p2.len());
    for (x, y) in p1.iter().take(shared).zip(p2.iter().take(shared)) {
        unify(state, x, y, span, context)?;
    }

    if p1.len() == p2.len() {
        return unify(state, &r1, &r2, span, context);
    }

    // One spine is longer; the shorter side's return must absorb the
    // remaining parameters. That only works when it is still a variable.
    let (longer_params, longer_ret, shorter_ret, expected, found) = if p1.len() > p2.len() {
        (&p1[shared..], &r1, &r2, p1.len(), p2.len())
    } else {
        (&p2[shared..], &r2, &r1, p2.len(), p1.len())
    };
    let resolved_short = state.subst.apply(shorter_ret);
    if !matches!(resolved_short, Type::Var(_) | Type::Unknown) {
        return Err(TypeError::ArityMismatch {
            expected,
            found,
            what: ArityContext::Function,
            span,
        });
    }
    let remainder = Type::func(longer_params.to_vec(), longer_ret.clone());
    unify(state, &resolved_short, &remainder, span, context)
}

/// Flatten a function's curried spine into its full parameter list and
/// final (non-function) return type.
pub fn flatten_spine(f: &FunctionType) -> (Vec<Type>, Type) {
    let mut params = f.params.clone();
    let mut ret = f.ret.clone();
    while let Type::Function(inner) = ret {
        params.extend(inner.params.iter().cloned());
        ret = inner.ret.clone();
    }
    (params, ret)
}
