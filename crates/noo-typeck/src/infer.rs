//! The inference engine: kind-dispatched typing for every expression.
//!
//! Walks the Noolang AST, generates and solves constraints through the
//! threaded [`InferState`], and returns a `(type, effects)` pair per
//! expression. Implements Hindley-Milner inference with:
//! - Let-polymorphism (generalize + instantiate)
//! - Occurs check (rejects infinite types)
//! - Effect tracking as a side channel unioned by sequencing
//! - Structural record constraints for accessors and their compositions
//! - Trait dispatch with ambiguity detection and deferred resolution
//! - Closure culling: lambda environments carry only the operator
//!   builtins plus the body's free identifiers

use noo_ast::{
    BinOp, ConstraintExpr, Expr, ExprKind, Literal, MatchCase, Pattern, PatternKind, PipeDir,
    Program, TypeExpr, VariantDef,
};
use noo_common::Span;
use rustc_hash::FxHashMap;

use crate::builtins;
use crate::env::TypeEnv;
use crate::error::{ArityContext, TypeError, UnifyContext};
use crate::resolve::try_resolve_constraints;
use crate::state::{AdtDef, InferState};
use crate::traits::{TraitDef, TraitImpl, TraitResolution};
use crate::ty::{
    Constraint, Effect, EffectSet, FieldSchema, FunctionType, RecordStructure, Scheme, Type,
    TypeVar,
};
use crate::unify::{flatten_spine, unify};
use crate::ImportContext;

/// Decoration map: expression span → final substituted type.
pub type TypeMap = FxHashMap<Span, Type>;

/// The side channel every inferrer returns.
#[derive(Clone, Debug)]
pub struct Inferred {
    pub ty: Type,
    pub effects: EffectSet,
}

impl Inferred {
    fn pure(ty: Type) -> Inferred {
        Inferred {
            ty,
            effects: EffectSet::empty(),
        }
    }
}

/// The environment entries copied into every culled closure environment,
/// whether or not the body names them: operator lookups go through the
/// environment even when the operator appears only as syntax.
const OPERATOR_BUILTINS: &[&str] = &[
    "+", "-", "*", "/", "<", ">", "<=", ">=", "==", "!=", "|", "$", ";", "|>", "<|", "compose",
    "print", "toString",
];

// ── Program loop ───────────────────────────────────────────────────────

/// Type every statement in source order, threading the state. Each
/// definition is visible to all subsequent statements. Returns the last
/// statement's type and the union of all statement effects.
pub fn infer_program(
    state: &mut InferState,
    program: &Program,
    imports: &ImportContext,
    types: &mut TypeMap,
) -> Result<Inferred, TypeError> {
    let mut effects = EffectSet::empty();
    let mut last = Type::Unit;
    for stmt in &program.statements {
        let out = infer_expr(state, stmt, types, imports)?;
        effects = effects.union(out.effects);
        last = out.ty;
    }
    Ok(Inferred {
        ty: state.subst.apply(&last),
        effects,
    })
}

// ── Expression dispatch ────────────────────────────────────────────────

pub fn infer_expr(
    state: &mut InferState,
    expr: &Expr,
    types: &mut TypeMap,
    imports: &ImportContext,
) -> Result<Inferred, TypeError> {
    let out = match &expr.kind {
        ExprKind::Literal(lit) => Ok(Inferred::pure(infer_literal(lit))),
        ExprKind::Var(name) => infer_var(state, name, expr.span),
        ExprKind::Lambda { params, body } => {
            infer_lambda(state, params, body, types, imports)
        }
        ExprKind::App { func, args } => {
            infer_application(state, func, args, expr.span, types, imports)
        }
        ExprKind::Binary { op, lhs, rhs } => {
            infer_binary(state, *op, lhs, rhs, expr.span, types, imports)
        }
        ExprKind::Pipeline { dir, stages } => {
            infer_pipeline(state, *dir, stages, expr.span, types, imports)
        }
        ExprKind::If {
            cond,
            then_branch,
            else_branch,
        } => infer_if(state, cond, then_branch, else_branch, expr.span, types, imports),
        ExprKind::Definition { name, value } => {
            infer_definition(state, name, value, expr.span, types, imports)
        }
        ExprKind::MutDefinition { name, value } => {
            infer_mut_definition(state, name, value, expr.span, types, imports)
        }
        ExprKind::Mutation { name, value } => {
            infer_mutation(state, name, value, expr.span, types, imports)
        }
        ExprKind::Record { fields } => infer_record(state, fields, types, imports),
        ExprKind::Tuple { items } => infer_tuple(state, items, types, imports),
        ExprKind::List { items } => infer_list(state, items, expr.span, types, imports),
        ExprKind::Accessor { field, optional } => {
            Ok(Inferred::pure(infer_accessor(state, field, *optional)))
        }
        ExprKind::Where { body, definitions } => {
            infer_where(state, body, definitions, expr.span, types, imports)
        }
        ExprKind::Typed { expr: inner, annotation } => {
            infer_typed(state, inner, annotation, expr.span, types, imports)
        }
        ExprKind::Constrained {
            expr: inner,
            annotation,
            constraints,
        } => infer_constrained(state, inner, annotation, constraints, expr.span, types, imports),
        ExprKind::Match { scrutinee, cases } => {
            infer_match(state, scrutinee, cases, expr.span, types, imports)
        }
        ExprKind::Import { path } => infer_import(state, path, imports),
        ExprKind::TypeDefinition {
            name,
            params,
            variants,
        } => infer_type_definition(state, name, params, variants, expr.span),
        ExprKind::TypeAlias { name, aliased } => {
            infer_type_alias(state, name, aliased, expr.span)
        }
        ExprKind::ConstraintDefinition {
            name,
            type_param,
            functions,
        } => infer_trait_definition(state, name, type_param, functions, expr.span),
        ExprKind::ImplementDefinition {
            trait_name,
            target,
            functions,
            given,
        } => infer_implementation(state, trait_name, target, functions, given, expr.span),
    }?;

    let resolved = state.subst.apply(&out.ty);
    types.insert(expr.span, resolved);
    Ok(out)
}

// ── Leaves ─────────────────────────────────────────────────────────────

fn infer_literal(lit: &Literal) -> Type {
    match lit {
        Literal::Number(_) => Type::float(),
        Literal::String(_) => Type::string(),
    }
}

fn infer_var(state: &mut InferState, name: &str, span: Span) -> Result<Inferred, TypeError> {
    if let Some(scheme) = state.env.lookup(name).cloned() {
        let (ty, effects) = state.instantiate(&scheme);
        return Ok(Inferred { ty, effects });
    }
    // A bare trait-function reference instantiates the trait's signature
    // with an `implements` constraint on its container parameter.
    if let Some(scheme) = state.traits.get_trait_function_info(name) {
        let (ty, effects) = state.instantiate(&scheme);
        return Ok(Inferred { ty, effects });
    }
    Err(TypeError::UndefinedVariable {
        name: name.to_string(),
        span,
    })
}

// ── Lambdas ────────────────────────────────────────────────────────────

fn infer_lambda(
    state: &mut InferState,
    params: &[String],
    body: &Expr,
    types: &mut TypeMap,
    imports: &ImportContext,
) -> Result<Inferred, TypeError> {
    // Closure culling: the body environment carries only the operator
    // builtins plus the body's free identifiers, never the whole scope.
    let free = body.free_identifiers();
    let mut closure_env = TypeEnv::new();
    for name in OPERATOR_BUILTINS {
        if let Some(scheme) = state.env.lookup(name) {
            closure_env.insert(*name, scheme.clone());
        }
    }
    for name in &free {
        if let Some(scheme) = state.env.lookup(name) {
            closure_env.insert(name.clone(), scheme.clone());
        }
    }

    // Fresh parameter variables, with implicit constraints read off the
    // body: an arithmetic operator constrains the first parameter, and
    // accessor compositions attach one nested structural constraint per
    // composed field walk.
    let mut param_vars: Vec<TypeVar> = params
        .iter()
        .map(|_| TypeVar::new(state.fresh_name()))
        .collect();
    if let Some(first) = param_vars.first_mut() {
        if let Some(trait_name) = arithmetic_trait_used(body) {
            first.constraints.push(Constraint::Implements {
                var: first.name.clone(),
                trait_name: trait_name.to_string(),
            });
        }
    }
    for (index, param) in params.iter().enumerate() {
        let mut paths: Vec<Vec<String>> = Vec::new();
        collect_accessor_paths(body, param, &mut paths);
        for path in paths {
            if path.len() < 2 {
                continue;
            }
            let leaf = state.fresh();
            let tv = &mut param_vars[index];
            tv.constraints.push(Constraint::Has {
                var: tv.name.clone(),
                structure: nested_structure(&path, leaf),
            });
        }
    }

    for (param, tv) in params.iter().zip(param_vars.iter()) {
        closure_env.insert(param.clone(), Scheme::mono(Type::Var(tv.clone())));
    }

    let saved_env = std::mem::replace(&mut state.env, closure_env);
    let saved_mutables = state.mutables.clone();
    let body_out = infer_expr(state, body, types, imports);
    state.env = saved_env;
    state.mutables = saved_mutables;
    let body_out = body_out?;

    // Reassemble a right-nested curried chain; the body's effects sit on
    // the innermost link and fire at full application.
    let mut ty = body_out.ty;
    let mut effects = body_out.effects;
    for tv in param_vars.into_iter().rev() {
        ty = Type::Function(Box::new(FunctionType {
            params: vec![Type::Var(tv)],
            ret: ty,
            effects,
            constraints: Vec::new(),
        }));
        effects = EffectSet::empty();
    }
    Ok(Inferred::pure(ty))
}

/// The trait constraining the lambda's first parameter when the body uses
/// an arithmetic operator: `Add` for `+`, the legacy `Numeric` predicate
/// for the others.
fn arithmetic_trait_used(body: &Expr) -> Option<&'static str> {
    match &body.kind {
        ExprKind::Binary { op, lhs, rhs } => match op {
            BinOp::Add => Some("Add"),
            BinOp::Sub | BinOp::Mul | BinOp::Div => Some("Numeric"),
            _ => arithmetic_trait_used(lhs).or_else(|| arithmetic_trait_used(rhs)),
        },
        ExprKind::App { func, args } => arithmetic_trait_used(func)
            .or_else(|| args.iter().find_map(arithmetic_trait_used)),
        ExprKind::If {
            cond,
            then_branch,
            else_branch,
        } => arithmetic_trait_used(cond)
            .or_else(|| arithmetic_trait_used(then_branch))
            .or_else(|| arithmetic_trait_used(else_branch)),
        _ => None,
    }
}

/// Collect multi-level accessor application chains over `param`:
/// `@outer (@inner param)` yields the path `[inner, outer]`.
fn collect_accessor_paths(expr: &Expr, param: &str, out: &mut Vec<Vec<String>>) {
    if let Some(path) = accessor_chain(expr, param) {
        if path.len() >= 2 {
            out.push(path);
            return;
        }
    }
    match &expr.kind {
        ExprKind::App { func, args } => {
            collect_accessor_paths(func, param, out);
            for arg in args {
                collect_accessor_paths(arg, param, out);
            }
        }
        ExprKind::Binary { lhs, rhs, .. } => {
            collect_accessor_paths(lhs, param, out);
            collect_accessor_paths(rhs, param, out);
        }
        ExprKind::If {
            cond,
            then_branch,
            else_branch,
        } => {
            collect_accessor_paths(cond, param, out);
            collect_accessor_paths(then_branch, param, out);
            collect_accessor_paths(else_branch, param, out);
        }
        ExprKind::List { items } | ExprKind::Tuple { items } => {
            for item in items {
                collect_accessor_paths(item, param, out);
            }
        }
        ExprKind::Record { fields } => {
            for (_, value) in fields {
                collect_accessor_paths(value, param, out);
            }
        }
        _ => {}
    }
}

/// Extract the accessor chain of `@c (@b (@a param))`-shaped expressions,
/// innermost field first.
fn accessor_chain(expr: &Expr, param: &str) -> Option<Vec<String>> {
    match &expr.kind {
        ExprKind::App { func, args } if args.len() == 1 => {
            let ExprKind::Accessor {
                field,
                optional: false,
            } = &func.kind
            else {
                return None;
            };
            match &args[0].kind {
                ExprKind::Var(name) if name == param => Some(vec![field.clone()]),
                _ => {
                    let mut inner = accessor_chain(&args[0], param)?;
                    inner.push(field.clone());
                    Some(inner)
                }
            }
        }
        _ => None,
    }
}

/// Build the nested structure describing a whole field walk: the path
/// `[a, b]` with leaf `v` becomes `{a: {b: v}}`.
fn nested_structure(path: &[String], leaf: Type) -> RecordStructure {
    let mut schema = FieldSchema::Type(leaf);
    for field in path.iter().rev() {
        schema = FieldSchema::Nested(
            RecordStructure::new().with_field(field.clone(), schema),
        );
    }
    match schema {
        FieldSchema::Nested(structure) => structure,
        FieldSchema::Type(_) => RecordStructure::new(),
    }
}

// ── Definitions and mutation ───────────────────────────────────────────

fn reject_trait_function_shadowing(
    state: &InferState,
    name: &str,
    span: Span,
) -> Result<(), TypeError> {
    if state.traits.is_trait_function(name) {
        let trait_name = state
            .traits
            .traits_of_function(name)
            .first()
            .cloned()
            .unwrap_or_default();
        return Err(TypeError::TraitFunctionShadowing {
            name: name.to_string(),
            trait_name,
            span,
        });
    }
    Ok(())
}

fn infer_definition(
    state: &mut InferState,
    name: &str,
    value: &Expr,
    span: Span,
    types: &mut TypeMap,
    imports: &ImportContext,
) -> Result<Inferred, TypeError> {
    reject_trait_function_shadowing(state, name, span)?;

    // A placeholder variable makes the definition visible to itself.
    let placeholder = state.fresh();
    state.env.insert(name, Scheme::mono(placeholder.clone()));

    let value_out = infer_expr(state, value, types, imports)?;
    unify(
        state,
        &placeholder,
        &value_out.ty,
        span,
        &UnifyContext::Definition {
            name: name.to_string(),
        },
    )?;

    // Explicit annotations generalize over every free variable of the
    // annotation so polymorphic definitions never share variables by
    // accident; inferred values generalize against the environment
    // without this very name.
    let mut scheme = if matches!(
        value.kind,
        ExprKind::Typed { .. } | ExprKind::Constrained { .. }
    ) {
        state.generalize_all(&value_out.ty)
    } else {
        state.generalize_without(&value_out.ty, Some(name))
    };
    scheme.effects = value_out.effects;
    state.env.insert(name, scheme);

    Ok(Inferred {
        ty: state.subst.apply(&value_out.ty),
        effects: value_out.effects,
    })
}

fn infer_mut_definition(
    state: &mut InferState,
    name: &str,
    value: &Expr,
    span: Span,
    types: &mut TypeMap,
    imports: &ImportContext,
) -> Result<Inferred, TypeError> {
    reject_trait_function_shadowing(state, name, span)?;

    let value_out = infer_expr(state, value, types, imports)?;
    let cell_ty = state.subst.apply(&value_out.ty);
    // Mutable cells stay monomorphic; generalizing them would let two
    // uses disagree about the stored type.
    state.env.insert(name, Scheme::mono(cell_ty.clone()));
    state.mutables.insert(name.to_string());

    Ok(Inferred {
        ty: cell_ty,
        effects: value_out.effects,
    })
}

fn infer_mutation(
    state: &mut InferState,
    name: &str,
    value: &Expr,
    span: Span,
    types: &mut TypeMap,
    imports: &ImportContext,
) -> Result<Inferred, TypeError> {
    if !state.mutables.contains(name) || state.env.lookup(name).is_none() {
        return Err(TypeError::MutationTargetMissing {
            name: name.to_string(),
            span,
        });
    }
    let cell_ty = state
        .env
        .lookup(name)
        .map(|s| s.ty.clone())
        .expect("presence checked above");
    let value_out = infer_expr(state, value, types, imports)?;

    if let Err(err) = unify(state, &cell_ty, &value_out.ty, span, &UnifyContext::Builtin) {
        return Err(match err {
            TypeError::Mismatch { .. } => TypeError::MutationTypeMismatch {
                name: name.to_string(),
                expected: state.subst.apply(&cell_ty),
                found: state.subst.apply(&value_out.ty),
                span,
            },
            other => other,
        });
    }
    Ok(Inferred {
        ty: Type::Unit,
        effects: value_out.effects,
    })
}

// ── Control flow ───────────────────────────────────────────────────────

fn infer_if(
    state: &mut InferState,
    cond: &Expr,
    then_branch: &Expr,
    else_branch: &Expr,
    span: Span,
    types: &mut TypeMap,
    imports: &ImportContext,
) -> Result<Inferred, TypeError> {
    let cond_out = infer_expr(state, cond, types, imports)?;
    unify(
        state,
        &Type::bool(),
        &cond_out.ty,
        cond.span,
        &UnifyContext::IfCondition,
    )?;

    let then_out = infer_expr(state, then_branch, types, imports)?;
    let else_out = infer_expr(state, else_branch, types, imports)?;
    unify(
        state,
        &then_out.ty,
        &else_out.ty,
        span,
        &UnifyContext::IfBranches,
    )?;

    Ok(Inferred {
        ty: state.subst.apply(&then_out.ty),
        effects: cond_out
            .effects
            .union(then_out.effects)
            .union(else_out.effects),
    })
}

// ── Binary operators ───────────────────────────────────────────────────

fn infer_binary(
    state: &mut InferState,
    op: BinOp,
    lhs: &Expr,
    rhs: &Expr,
    span: Span,
    types: &mut TypeMap,
    imports: &ImportContext,
) -> Result<Inferred, TypeError> {
    match op {
        BinOp::Seq => infer_sequence(state, lhs, rhs, types, imports),
        BinOp::Thrush => infer_thrush(state, lhs, rhs, span, types, imports),
        BinOp::Dollar => {
            // `f $ x` is plain application at low precedence.
            infer_application(state, lhs, std::slice::from_ref(rhs), span, types, imports)
        }
        BinOp::SafeThrush => infer_safe_thrush(state, lhs, rhs, span, types, imports),
        _ => infer_operator(state, op, lhs, rhs, span, types, imports),
    }
}

/// Type a `;` chain by flattening it into a statement list first. The
/// chain is right-associative in the parse tree; recursing into it would
/// re-walk the tail once per link.
fn infer_sequence(
    state: &mut InferState,
    lhs: &Expr,
    rhs: &Expr,
    types: &mut TypeMap,
    imports: &ImportContext,
) -> Result<Inferred, TypeError> {
    let mut statements: Vec<&Expr> = vec![lhs];
    let mut tail = rhs;
    while let ExprKind::Binary {
        op: BinOp::Seq,
        lhs,
        rhs,
    } = &tail.kind
    {
        statements.push(lhs);
        tail = rhs;
    }
    statements.push(tail);

    let mut effects = EffectSet::empty();
    let mut last = Type::Unit;
    for stmt in statements {
        let out = infer_expr(state, stmt, types, imports)?;
        effects = effects.union(out.effects);
        last = out.ty;
    }
    Ok(Inferred {
        ty: state.subst.apply(&last),
        effects,
    })
}

/// `x | f` — apply `f` to `x`.
fn infer_thrush(
    state: &mut InferState,
    lhs: &Expr,
    rhs: &Expr,
    span: Span,
    types: &mut TypeMap,
    imports: &ImportContext,
) -> Result<Inferred, TypeError> {
    let value = infer_expr(state, lhs, types, imports)?;
    let func = infer_expr(state, rhs, types, imports)?;

    let result = state.fresh();
    unify(
        state,
        &func.ty,
        &Type::func(vec![value.ty.clone()], result.clone()),
        span,
        &UnifyContext::Operator { op: "|".into() },
    )?;

    let mut effects = value.effects.union(func.effects);
    if let Type::Function(f) = state.subst.apply(&func.ty) {
        let (params, _) = flatten_spine(&f);
        if params.len() == 1 {
            effects = effects.union(spine_effects(&f));
        }
    }
    Ok(Inferred {
        ty: state.subst.apply(&result),
        effects,
    })
}

/// `x |? f` — monadic bind. Prefers the stdlib `bind`; falls back to
/// direct Option/Result logic when resolution cannot see a container.
fn infer_safe_thrush(
    state: &mut InferState,
    lhs: &Expr,
    rhs: &Expr,
    span: Span,
    types: &mut TypeMap,
    imports: &ImportContext,
) -> Result<Inferred, TypeError> {
    let value = infer_expr(state, lhs, types, imports)?;
    let func = infer_expr(state, rhs, types, imports)?;
    let effects = value.effects.union(func.effects);

    // Route through `bind` when the container fits the `m a` shape of
    // the Monad signature (one type argument). Result carries its error
    // type as a second argument, so it takes the direct fallback below.
    let value_ty = state.subst.apply(&value.ty);
    let single_arg_container = matches!(
        &value_ty,
        Type::Variant { args, .. } if args.len() == 1
    ) || matches!(&value_ty, Type::List(_));
    if single_arg_container {
        if let Ok(TraitResolution::Resolved { .. }) =
            state
                .traits
                .resolve_trait_function("bind", &[value_ty.clone()], span)
        {
            let bind_scheme = state
                .traits
                .get_trait_function_info("bind")
                .expect("bind resolved, so a trait declares it");
            let (bind_ty, _) = state.instantiate(&bind_scheme);
            let result = state.fresh();
            unify(
                state,
                &bind_ty,
                &Type::func(vec![value.ty.clone(), func.ty.clone()], result.clone()),
                span,
                &UnifyContext::Operator { op: "|?".into() },
            )?;
            return Ok(Inferred {
                ty: state.subst.apply(&result),
                effects,
            });
        }
    }

    // Fallback: direct Option/Result plumbing.
    match value_ty {
        Type::Variant { ref name, ref args } if name == "Option" && args.len() == 1 => {
            let out = state.fresh();
            unify(
                state,
                &func.ty,
                &Type::func(vec![args[0].clone()], out.clone()),
                span,
                &UnifyContext::Operator { op: "|?".into() },
            )?;
            let out = state.subst.apply(&out);
            let ty = match &out {
                Type::Variant { name, .. } if name == "Option" => out,
                _ => Type::option(out),
            };
            Ok(Inferred { ty, effects })
        }
        Type::Variant { ref name, ref args } if name == "Result" && args.len() == 2 => {
            let out = state.fresh();
            unify(
                state,
                &func.ty,
                &Type::func(vec![args[0].clone()], out.clone()),
                span,
                &UnifyContext::Operator { op: "|?".into() },
            )?;
            let out = state.subst.apply(&out);
            let ty = match &out {
                Type::Variant { name, .. } if name == "Result" => out,
                _ => Type::result(out, args[1].clone()),
            };
            Ok(Inferred { ty, effects })
        }
        Type::Var(_) | Type::Unknown => {
            // Container unknown: keep the whole thing open.
            let out = state.fresh();
            let arg_ty = state.fresh();
            unify(
                state,
                &func.ty,
                &Type::func(vec![arg_ty], out.clone()),
                span,
                &UnifyContext::Operator { op: "|?".into() },
            )?;
            Ok(Inferred {
                ty: state.subst.apply(&out),
                effects,
            })
        }
        other => Err(TypeError::KindMismatch {
            expected: "Option or Result",
            found: other,
            span,
        }),
    }
}

/// An ordinary operator: instantiate its scheme, unify against the
/// two-argument shape, then try to discharge any trait constraint against
/// the operand types immediately.
fn infer_operator(
    state: &mut InferState,
    op: BinOp,
    lhs: &Expr,
    rhs: &Expr,
    span: Span,
    types: &mut TypeMap,
    imports: &ImportContext,
) -> Result<Inferred, TypeError> {
    let lhs_out = infer_expr(state, lhs, types, imports)?;
    let rhs_out = infer_expr(state, rhs, types, imports)?;

    let scheme = state
        .env
        .lookup(op.symbol())
        .cloned()
        .ok_or_else(|| TypeError::UndefinedVariable {
            name: op.symbol().to_string(),
            span,
        })?;
    let (op_ty, op_effects) = state.instantiate(&scheme);

    let result = state.fresh();
    let call_shape = Type::func(
        vec![lhs_out.ty.clone(), rhs_out.ty.clone()],
        result.clone(),
    );
    if let Err(err) = unify(
        state,
        &op_ty,
        &call_shape,
        span,
        &UnifyContext::Operator {
            op: op.symbol().to_string(),
        },
    ) {
        // A mismatch between the operands of a trait-backed operator is a
        // dispatch failure: report the trait and both operand forms.
        if let (TypeError::Mismatch { .. }, Some(trait_name)) =
            (&err, operator_trait(&op_ty))
        {
            return Err(TypeError::TraitNotImplemented {
                trait_name,
                ty: Type::Tuple(vec![
                    state.subst.apply(&lhs_out.ty),
                    state.subst.apply(&rhs_out.ty),
                ]),
                span,
            });
        }
        return Err(err);
    }

    // Discharge the operator's constraint against the operand types.
    let constraints = function_constraints(&op_ty);
    let mut effects = lhs_out.effects.union(rhs_out.effects).union(op_effects);
    if let Type::Function(f) = state.subst.apply(&op_ty) {
        effects = effects.union(spine_effects(&f));
    }
    if !constraints.is_empty() {
        let lhs_ty = state.subst.apply(&lhs_out.ty);
        let rhs_ty = state.subst.apply(&rhs_out.ty);
        let resolved = try_resolve_constraints(
            state,
            &result,
            &constraints,
            &[lhs_ty.clone(), rhs_ty.clone()],
            span,
        )?;
        defer_var_constraints(state, &constraints);
        if resolved.is_none() && lhs_ty.is_concrete() && rhs_ty.is_concrete() {
            if let Some(trait_name) = operator_trait(&op_ty) {
                if !both_implement(state, &trait_name, &lhs_ty, &rhs_ty) {
                    return Err(TypeError::TraitNotImplemented {
                        trait_name,
                        ty: Type::Tuple(vec![lhs_ty, rhs_ty]),
                        span,
                    });
                }
            }
        }
    }

    Ok(Inferred {
        ty: state.subst.apply(&result),
        effects,
    })
}

/// The trait an operator scheme is constrained by, if any.
fn operator_trait(op_ty: &Type) -> Option<String> {
    function_constraints(op_ty).iter().find_map(|c| match c {
        Constraint::Implements { trait_name, .. } => Some(trait_name.clone()),
        Constraint::Is { pred, .. } => Some(pred.clone()),
        _ => None,
    })
}

fn both_implement(state: &InferState, trait_name: &str, lhs: &Type, rhs: &Type) -> bool {
    [lhs, rhs].iter().all(|ty| {
        ty.dispatch_name()
            .is_some_and(|name| state.traits.type_has_implementation(trait_name, &name))
    })
}

/// Every constraint along a function type's curried spine, including the
/// constraints attached to its parameter variables.
fn function_constraints(ty: &Type) -> Vec<Constraint> {
    let mut out = Vec::new();
    let mut current = ty;
    while let Type::Function(f) = current {
        out.extend(f.constraints.iter().cloned());
        for param in &f.params {
            if let Type::Var(tv) = param {
                out.extend(tv.constraints.iter().cloned());
            }
        }
        current = &f.ret;
    }
    out
}

// ── Application ────────────────────────────────────────────────────────

fn infer_application(
    state: &mut InferState,
    func: &Expr,
    args: &[Expr],
    span: Span,
    types: &mut TypeMap,
    imports: &ImportContext,
) -> Result<Inferred, TypeError> {
    let func_out = infer_expr(state, func, types, imports)?;
    let mut effects = func_out.effects;

    let mut arg_types = Vec::with_capacity(args.len());
    for arg in args {
        let out = infer_expr(state, arg, types, imports)?;
        effects = effects.union(out.effects);
        arg_types.push(out.ty);
    }

    // Peel a surface `Constrained` wrapper off the function type.
    let applied = state.subst.apply(&func_out.ty);
    let (actual, mut constraints) = match applied {
        Type::Constrained { base, table } => {
            let flattened: Vec<Constraint> =
                table.into_values().flatten().collect();
            (*base, flattened)
        }
        other => (other, Vec::new()),
    };

    let func_ty = match &actual {
        Type::Function(f) => f.clone(),
        Type::Var(_) | Type::Unknown => {
            // The callee's type is still open: shape it now.
            let ret = state.fresh();
            unify(
                state,
                &actual,
                &Type::func(arg_types.clone(), ret.clone()),
                span,
                &UnifyContext::FnArg {
                    func: callee_name(func),
                    index: 0,
                },
            )?;
            return Ok(Inferred {
                ty: state.subst.apply(&ret),
                effects,
            });
        }
        other => {
            return Err(TypeError::KindMismatch {
                expected: "function",
                found: other.clone(),
                span,
            })
        }
    };

    constraints.extend(function_constraints(&Type::Function(func_ty.clone())));
    let (mut params, mut final_ret) = flatten_spine(&func_ty);

    // Over-application through a still-variable return.
    if args.len() > params.len() {
        let tail = state.subst.apply(&final_ret);
        if !matches!(tail, Type::Var(_) | Type::Unknown) {
            return Err(TypeError::ArityMismatch {
                expected: params.len(),
                found: args.len(),
                what: ArityContext::Function,
                span,
            });
        }
        let extra: Vec<Type> = (params.len()..args.len()).map(|_| state.fresh()).collect();
        let new_ret = state.fresh();
        unify(
            state,
            &tail,
            &Type::func(extra.clone(), new_ret.clone()),
            span,
            &UnifyContext::Builtin,
        )?;
        params.extend(extra);
        final_ret = new_ret;
    }

    let callee = callee_name(func);
    for (index, (arg_ty, param_ty)) in arg_types.iter().zip(params.iter()).enumerate() {
        unify(
            state,
            param_ty,
            arg_ty,
            args.get(index).map(|a| a.span).unwrap_or(span),
            &UnifyContext::FnArg {
                func: callee.clone(),
                index,
            },
        )?;
    }

    if args.len() == params.len() {
        // Full arity: fire the spine's effects and try to discharge the
        // collected constraints against the substituted argument types.
        effects = effects.union(spine_effects(&func_ty));
        let substituted_args: Vec<Type> =
            arg_types.iter().map(|t| state.subst.apply(t)).collect();
        let ret = state.subst.apply(&final_ret);

        // A bare trait-function call dispatches through the registry:
        // ambiguity across traits and missing implementations for
        // concrete arguments fail here, polymorphic arguments defer.
        if let Some(name) = &callee {
            if state.env.lookup(name).is_none() && state.traits.is_trait_function(name) {
                match state
                    .traits
                    .resolve_trait_function(name, &substituted_args, span)?
                {
                    TraitResolution::NoImplementation { trait_name, ty } => {
                        return Err(TypeError::TraitNotImplemented {
                            trait_name,
                            ty,
                            span,
                        });
                    }
                    TraitResolution::Resolved { .. } | TraitResolution::NeedsConstraint { .. } => {}
                }
            }
        }
        if !constraints.is_empty() {
            let resolved =
                try_resolve_constraints(state, &ret, &constraints, &substituted_args, span)?;
            // Whatever resolution could not discharge stays recorded on
            // the variables it is keyed on, so the obligation survives
            // until those variables turn concrete.
            defer_var_constraints(state, &constraints);
            if let Some(resolved) = resolved {
                return Ok(Inferred {
                    ty: resolved,
                    effects,
                });
            }
            // Unresolved constraints stay on a function result for a
            // later call site.
            if let Type::Function(mut f) = ret.clone() {
                let pending = pending_constraints(&constraints, &ret);
                if !pending.is_empty() {
                    f.constraints.extend(pending);
                    return Ok(Inferred {
                        ty: Type::Function(f),
                        effects,
                    });
                }
            }
        }
        return Ok(Inferred { ty: ret, effects });
    }

    // Partial application: the remaining parameters form the result,
    // preserving constraints.
    let remaining: Vec<Type> = params[args.len()..].to_vec();
    let mut result = FunctionType {
        params: remaining,
        ret: final_ret,
        effects: spine_effects(&func_ty),
        constraints: constraints.clone(),
    };
    // `compose f` hands f's constraints to the composed function's first
    // parameter, so accessor constraints survive composition.
    if callee.as_deref() == Some("compose") {
        if let Some(first_arg) = arg_types.first() {
            if let Type::Function(arg_fn) = state.subst.apply(first_arg) {
                result.constraints.extend(arg_fn.constraints.iter().cloned());
            }
        }
    }
    Ok(Inferred {
        ty: state.subst.apply(&Type::Function(Box::new(result))),
        effects,
    })
}

fn callee_name(func: &Expr) -> Option<String> {
    match &func.kind {
        ExprKind::Var(name) => Some(name.clone()),
        _ => None,
    }
}

/// Record every constraint whose key still resolves to a variable onto
/// that variable, so the obligation is verified when it binds.
fn defer_var_constraints(state: &mut InferState, constraints: &[Constraint]) {
    for constraint in constraints {
        let Some(var) = constraint.var_name() else {
            continue;
        };
        if let Type::Var(tv) = state.subst.apply(&Type::var(var)) {
            state.note_var_constraints(&tv.name, &[constraint.with_var(&tv.name)]);
        }
    }
}

/// Constraints that still matter for the given (substituted) result type:
/// those keyed on a variable that is still free in it.
fn pending_constraints(constraints: &[Constraint], ret: &Type) -> Vec<Constraint> {
    let free = ret.free_vars();
    constraints
        .iter()
        .filter(|c| c.var_name().is_some_and(|v| free.iter().any(|f| f == v)))
        .cloned()
        .collect()
}

/// Union of the effect annotations along a function's curried spine.
fn spine_effects(f: &FunctionType) -> EffectSet {
    let mut effects = f.effects;
    let mut ret = &f.ret;
    while let Type::Function(inner) = ret {
        effects = effects.union(inner.effects);
        ret = &inner.ret;
    }
    effects
}

// ── Pipelines ──────────────────────────────────────────────────────────

fn infer_pipeline(
    state: &mut InferState,
    dir: PipeDir,
    stages: &[Expr],
    _span: Span,
    types: &mut TypeMap,
    imports: &ImportContext,
) -> Result<Inferred, TypeError> {
    // Application order: `|>` reads left to right, `<|` right to left.
    let ordered: Vec<&Expr> = match dir {
        PipeDir::Forward => stages.iter().collect(),
        PipeDir::Backward => stages.iter().rev().collect(),
    };

    // A pipeline made purely of accessors composes into one nested
    // structural constraint describing the whole field walk, instead of
    // one constraint (and two fresh variables) per stage.
    let accessor_path: Option<Vec<String>> = ordered
        .iter()
        .map(|stage| match &stage.kind {
            ExprKind::Accessor {
                field,
                optional: false,
            } => Some(field.clone()),
            _ => None,
        })
        .collect();
    if let Some(path) = accessor_path {
        if !path.is_empty() {
            let carrier_name = state.fresh_name();
            let leaf = state.fresh();
            let constraint = Constraint::Has {
                var: carrier_name.clone(),
                structure: nested_structure(&path, leaf.clone()),
            };
            let carrier = Type::Var(TypeVar {
                name: carrier_name,
                constraints: vec![constraint.clone()],
            });
            let ty = Type::Function(Box::new(FunctionType {
                params: vec![carrier],
                ret: leaf,
                effects: EffectSet::empty(),
                constraints: vec![constraint],
            }));
            return Ok(Inferred::pure(ty));
        }
    }

    let mut effects = EffectSet::empty();
    let mut fn_effects = EffectSet::empty();
    let mut first_input: Option<Type> = None;
    let mut prev_output: Option<Type> = None;

    for stage in ordered {
        let out = infer_expr(state, stage, types, imports)?;
        effects = effects.union(out.effects);

        let input = state.fresh();
        let output = state.fresh();
        unify(
            state,
            &out.ty,
            &Type::func(vec![input.clone()], output.clone()),
            stage.span,
            &UnifyContext::Pipeline,
        )?;
        if let Type::Function(f) = state.subst.apply(&out.ty) {
            fn_effects = fn_effects.union(spine_effects(&f));
        }

        if let Some(prev) = prev_output.take() {
            unify(state, &prev, &input, stage.span, &UnifyContext::Pipeline)?;
        } else {
            first_input = Some(input);
        }
        prev_output = Some(output);
    }

    let (Some(input), Some(output)) = (first_input, prev_output) else {
        return Ok(Inferred::pure(state.fresh()));
    };
    Ok(Inferred {
        ty: state.subst.apply(&Type::func_eff(vec![input], output, fn_effects)),
        effects,
    })
}

// ── Collections ────────────────────────────────────────────────────────

fn infer_record(
    state: &mut InferState,
    fields: &[(String, Expr)],
    types: &mut TypeMap,
    imports: &ImportContext,
) -> Result<Inferred, TypeError> {
    if fields.is_empty() {
        return Ok(Inferred::pure(Type::Unit));
    }
    let mut effects = EffectSet::empty();
    let mut map = std::collections::BTreeMap::new();
    for (name, value) in fields {
        let out = infer_expr(state, value, types, imports)?;
        effects = effects.union(out.effects);
        map.insert(name.clone(), out.ty);
    }
    Ok(Inferred {
        ty: Type::Record(map),
        effects,
    })
}

fn infer_tuple(
    state: &mut InferState,
    items: &[Expr],
    types: &mut TypeMap,
    imports: &ImportContext,
) -> Result<Inferred, TypeError> {
    let mut effects = EffectSet::empty();
    let mut tys = Vec::with_capacity(items.len());
    for item in items {
        let out = infer_expr(state, item, types, imports)?;
        effects = effects.union(out.effects);
        tys.push(out.ty);
    }
    Ok(Inferred {
        ty: Type::Tuple(tys),
        effects,
    })
}

fn infer_list(
    state: &mut InferState,
    items: &[Expr],
    _span: Span,
    types: &mut TypeMap,
    imports: &ImportContext,
) -> Result<Inferred, TypeError> {
    let elem = state.fresh();
    let mut effects = EffectSet::empty();
    for (index, item) in items.iter().enumerate() {
        let out = infer_expr(state, item, types, imports)?;
        effects = effects.union(out.effects);
        unify(
            state,
            &elem,
            &out.ty,
            item.span,
            &UnifyContext::ListElement { index },
        )?;
    }
    Ok(Inferred {
        ty: Type::list(state.subst.apply(&elem)),
        effects,
    })
}

// ── Accessors ──────────────────────────────────────────────────────────

/// `@field` — a function from a record carrying the field to the field's
/// type. The structural constraint rides on both the carrier variable
/// (for checking) and the function (for display); the optional form
/// returns an `Option` and tolerates absence, so it constrains nothing.
/// Cached per field name; cache hits are freshened so separate uses never
/// share variables.
fn infer_accessor(state: &mut InferState, field: &str, optional: bool) -> Type {
    if let Some(cached) = state.cached_accessor(field, optional).cloned() {
        let mut mapping = FxHashMap::default();
        return state.freshen_type_variables(&cached, &mut mapping);
    }

    let carrier_name = state.fresh_name();
    let field_ty = state.fresh();
    let ty = if optional {
        Type::func(
            vec![Type::Var(TypeVar::new(carrier_name))],
            Type::option(field_ty),
        )
    } else {
        let constraint = Constraint::Has {
            var: carrier_name.clone(),
            structure: RecordStructure::new()
                .with_field(field.to_string(), FieldSchema::Type(field_ty.clone())),
        };
        Type::Function(Box::new(FunctionType {
            params: vec![Type::Var(TypeVar {
                name: carrier_name,
                constraints: vec![constraint.clone()],
            })],
            ret: field_ty,
            effects: EffectSet::empty(),
            constraints: vec![constraint],
        }))
    };
    state.cache_accessor(field, optional, ty.clone());
    ty
}

// ── Where ──────────────────────────────────────────────────────────────

fn infer_where(
    state: &mut InferState,
    body: &Expr,
    definitions: &[(String, Expr)],
    span: Span,
    types: &mut TypeMap,
    imports: &ImportContext,
) -> Result<Inferred, TypeError> {
    let saved_env = state.env.clone();
    let mut effects = EffectSet::empty();

    let mut run = |state: &mut InferState, effects: &mut EffectSet| -> Result<Inferred, TypeError> {
        for (name, value) in definitions {
            reject_trait_function_shadowing(state, name, span)?;
            let placeholder = state.fresh();
            state.env.insert(name.clone(), Scheme::mono(placeholder.clone()));
            let out = infer_expr(state, value, types, imports)?;
            unify(
                state,
                &placeholder,
                &out.ty,
                value.span,
                &UnifyContext::Definition { name: name.clone() },
            )?;
            let mut scheme = state.generalize_without(&out.ty, Some(name.as_str()));
            scheme.effects = out.effects;
            state.env.insert(name.clone(), scheme);
            *effects = effects.union(out.effects);
        }
        infer_expr(state, body, types, imports)
    };

    let result = run(state, &mut effects);
    state.env = saved_env;
    let body_out = result?;
    Ok(Inferred {
        ty: state.subst.apply(&body_out.ty),
        effects: effects.union(body_out.effects),
    })
}

// ── Annotations ────────────────────────────────────────────────────────

fn infer_typed(
    state: &mut InferState,
    inner: &Expr,
    annotation: &TypeExpr,
    span: Span,
    types: &mut TypeMap,
    imports: &ImportContext,
) -> Result<Inferred, TypeError> {
    let ann_ty = resolve_type_expr(state, annotation, span)?;
    let inner_out = infer_expr(state, inner, types, imports)?;
    if let Err(err) = unify(state, &ann_ty, &inner_out.ty, span, &UnifyContext::Annotation) {
        return Err(match err {
            TypeError::Mismatch { .. } | TypeError::MissingField { .. } => {
                TypeError::AnnotationMismatch {
                    annotated: state.subst.apply(&ann_ty),
                    inferred: state.subst.apply(&inner_out.ty),
                    span,
                }
            }
            other => other,
        });
    }
    // The annotation is the contract: return it as written (aliases
    // resolved), not the substituted inference result.
    Ok(Inferred {
        ty: ann_ty,
        effects: inner_out.effects,
    })
}

fn infer_constrained(
    state: &mut InferState,
    inner: &Expr,
    annotation: &TypeExpr,
    constraints: &[ConstraintExpr],
    span: Span,
    types: &mut TypeMap,
    imports: &ImportContext,
) -> Result<Inferred, TypeError> {
    let typed = infer_typed(state, inner, annotation, span, types, imports)?;
    let flat = flatten_constraint_exprs(state, constraints, span)?;
    let ty = match typed.ty {
        Type::Function(mut f) => {
            f.constraints.extend(flat);
            Type::Function(f)
        }
        // Constraint clauses only mean something on function types.
        other => other,
    };
    Ok(Inferred {
        ty,
        effects: typed.effects,
    })
}

// ── Match ──────────────────────────────────────────────────────────────

fn infer_match(
    state: &mut InferState,
    scrutinee: &Expr,
    cases: &[MatchCase],
    _span: Span,
    types: &mut TypeMap,
    imports: &ImportContext,
) -> Result<Inferred, TypeError> {
    let scrut = infer_expr(state, scrutinee, types, imports)?;
    let mut effects = scrut.effects;
    let mut result: Option<Type> = None;

    for case in cases {
        let scrut_ty = state.subst.apply(&scrut.ty);
        let bindings = infer_pattern(state, &case.pattern, &scrut_ty)?;

        let saved_env = state.env.clone();
        for (name, ty) in bindings {
            state.env.insert(name, Scheme::mono(ty));
        }
        let body_out = infer_expr(state, &case.body, types, imports);
        state.env = saved_env;
        let body_out = body_out?;

        effects = effects.union(body_out.effects);
        match &result {
            Some(first) => {
                unify(
                    state,
                    first,
                    &body_out.ty,
                    case.body.span,
                    &UnifyContext::MatchCases,
                )?;
            }
            None => result = Some(body_out.ty),
        }
    }

    let ty = match result {
        Some(ty) => state.subst.apply(&ty),
        None => state.fresh(),
    };
    Ok(Inferred { ty, effects })
}

/// Type a pattern against the scrutinee type, producing the bindings the
/// case body sees.
fn infer_pattern(
    state: &mut InferState,
    pattern: &Pattern,
    expected: &Type,
) -> Result<Vec<(String, Type)>, TypeError> {
    match &pattern.kind {
        PatternKind::Wildcard => Ok(Vec::new()),
        PatternKind::Var(name) => Ok(vec![(name.clone(), expected.clone())]),
        PatternKind::Literal(lit) => {
            let lit_ty = infer_literal(lit);
            unify(
                state,
                &lit_ty,
                expected,
                pattern.span,
                &UnifyContext::PatternMatch,
            )?;
            Ok(Vec::new())
        }
        PatternKind::Constructor { name, args } => {
            let Some((adt, ctor_args)) = state.adts.lookup_constructor(name) else {
                return Err(TypeError::UndefinedConstructor {
                    name: name.clone(),
                    span: pattern.span,
                });
            };
            let adt_name = adt.name.clone();
            let adt_params = adt.params.clone();
            let ctor_args: Vec<Type> = ctor_args.to_vec();

            if args.len() != ctor_args.len() {
                return Err(TypeError::ArityMismatch {
                    expected: ctor_args.len(),
                    found: args.len(),
                    what: ArityContext::ConstructorPattern,
                    span: pattern.span,
                });
            }

            // Freshen the ADT's type parameters for this match arm.
            let mapping: FxHashMap<String, String> = adt_params
                .iter()
                .map(|p| (p.clone(), state.fresh_name()))
                .collect();
            let instance = if adt_name == "Bool" {
                Type::bool()
            } else {
                Type::Variant {
                    name: adt_name,
                    args: adt_params
                        .iter()
                        .map(|p| Type::var(mapping[p].clone()))
                        .collect(),
                }
            };
            unify(
                state,
                &instance,
                expected,
                pattern.span,
                &UnifyContext::PatternMatch,
            )?;

            let mut bindings = Vec::new();
            for (arg_pat, ctor_arg) in args.iter().zip(ctor_args.iter()) {
                let arg_ty = crate::state::rename_vars(ctor_arg, &mapping);
                let arg_ty = state.subst.apply(&arg_ty);
                bindings.extend(infer_pattern(state, arg_pat, &arg_ty)?);
            }
            Ok(bindings)
        }
        PatternKind::Tuple(items) => {
            let freshes: Vec<Type> = items.iter().map(|_| state.fresh()).collect();
            unify(
                state,
                &Type::Tuple(freshes.clone()),
                expected,
                pattern.span,
                &UnifyContext::PatternMatch,
            )?;
            let mut bindings = Vec::new();
            for (item, fresh) in items.iter().zip(freshes.iter()) {
                let item_ty = state.subst.apply(fresh);
                bindings.extend(infer_pattern(state, item, &item_ty)?);
            }
            Ok(bindings)
        }
        PatternKind::Record(fields) => {
            // Width-permissive: the pattern requires its fields, the
            // scrutinee may have more; unknown fields get fresh types.
            let mut required = std::collections::BTreeMap::new();
            let mut freshes = Vec::with_capacity(fields.len());
            for (field, _) in fields {
                let fresh = state.fresh();
                required.insert(field.clone(), fresh.clone());
                freshes.push(fresh);
            }
            unify(
                state,
                &Type::Record(required),
                expected,
                pattern.span,
                &UnifyContext::PatternMatch,
            )?;
            let mut bindings = Vec::new();
            for ((_, pat), fresh) in fields.iter().zip(freshes.iter()) {
                let field_ty = state.subst.apply(fresh);
                bindings.extend(infer_pattern(state, pat, &field_ty)?);
            }
            Ok(bindings)
        }
    }
}

// ── Imports ────────────────────────────────────────────────────────────

/// Type an imported module with a fresh bootstrapped state and expose its
/// final statement's type. Any failure (unknown path, type error in the
/// module, import cycle) degrades to a fresh variable so one bad import
/// does not poison the enclosing program.
fn infer_import(
    state: &mut InferState,
    path: &str,
    imports: &ImportContext,
) -> Result<Inferred, TypeError> {
    let Some(module) = imports.get(path) else {
        return Ok(Inferred::pure(state.fresh()));
    };
    let module = module.clone();
    // Removing the module from the context before recursing turns import
    // cycles into plain lookup misses.
    let narrowed = imports.without(path);
    let mut sub_state = builtins::bootstrap_state();
    let mut sub_types = TypeMap::default();
    match infer_program(&mut sub_state, &module, &narrowed, &mut sub_types) {
        Ok(out) => {
            // Re-home the module's variables into this state's namespace.
            let mut mapping = FxHashMap::default();
            let ty = state.freshen_type_variables(&out.ty, &mut mapping);
            Ok(Inferred {
                ty,
                effects: out.effects,
            })
        }
        Err(_) => Ok(Inferred::pure(state.fresh())),
    }
}

// ── Type, trait, and implementation declarations ───────────────────────

fn infer_type_definition(
    state: &mut InferState,
    name: &str,
    params: &[String],
    variants: &[VariantDef],
    span: Span,
) -> Result<Inferred, TypeError> {
    if state.is_protected_type(name) {
        return Err(TypeError::TypeShadowing {
            name: name.to_string(),
            span,
        });
    }
    if state.adts.contains_type_name(name) {
        return Err(TypeError::DuplicateTypeDefinition {
            name: name.to_string(),
            span,
        });
    }

    let mut constructors = FxHashMap::default();
    for variant in variants {
        let args: Vec<Type> = variant
            .args
            .iter()
            .map(|texpr| resolve_type_expr(state, texpr, span))
            .collect::<Result<_, _>>()?;
        constructors.insert(variant.name.clone(), args);
    }
    state.adts.register(AdtDef {
        name: name.to_string(),
        params: params.to_vec(),
        constructors: constructors.clone(),
    });

    // Every constructor gets an environment scheme quantifying exactly
    // the ADT's type parameters.
    let instance = Type::Variant {
        name: name.to_string(),
        args: params.iter().map(Type::var).collect(),
    };
    for (ctor_name, args) in constructors {
        let ty = if args.is_empty() {
            instance.clone()
        } else {
            let mut ty = instance.clone();
            for arg in args.into_iter().rev() {
                ty = Type::func(vec![arg], ty);
            }
            ty
        };
        state
            .env
            .insert(ctor_name, Scheme::poly(params.to_vec(), ty));
    }

    Ok(Inferred::pure(Type::Unit))
}

fn infer_type_alias(
    state: &mut InferState,
    name: &str,
    aliased: &TypeExpr,
    span: Span,
) -> Result<Inferred, TypeError> {
    if state.is_protected_type(name) {
        return Err(TypeError::TypeShadowing {
            name: name.to_string(),
            span,
        });
    }
    if state.adts.contains_type_name(name) {
        return Err(TypeError::DuplicateTypeDefinition {
            name: name.to_string(),
            span,
        });
    }
    let ty = resolve_type_expr(state, aliased, span)?;
    state.adts.register_alias(name, ty);
    Ok(Inferred::pure(Type::Unit))
}

fn infer_trait_definition(
    state: &mut InferState,
    name: &str,
    type_param: &str,
    functions: &[(String, TypeExpr)],
    span: Span,
) -> Result<Inferred, TypeError> {
    if state.traits.get_trait(name).is_some() {
        return Err(TypeError::DuplicateTypeDefinition {
            name: name.to_string(),
            span,
        });
    }
    let mut resolved = FxHashMap::default();
    for (func_name, texpr) in functions {
        let f = match resolve_type_expr(state, texpr, span)? {
            Type::Function(f) => f,
            other => {
                return Err(TypeError::KindMismatch {
                    expected: "function",
                    found: other,
                    span,
                })
            }
        };
        resolved.insert(func_name.clone(), *f);
    }
    state.traits.add_trait_definition(TraitDef {
        name: name.to_string(),
        type_param: type_param.to_string(),
        functions: resolved,
    });
    Ok(Inferred::pure(Type::Unit))
}

fn infer_implementation(
    state: &mut InferState,
    trait_name: &str,
    target: &TypeExpr,
    functions: &[noo_ast::ImplFunction],
    given: &[ConstraintExpr],
    span: Span,
) -> Result<Inferred, TypeError> {
    let target_ty = resolve_type_expr(state, target, span)?;
    let Some(type_name) = target_ty.dispatch_name() else {
        return Err(TypeError::KindMismatch {
            expected: "concrete type",
            found: target_ty,
            span,
        });
    };
    let given_constraints = flatten_constraint_exprs(state, given, span)?;

    let mut bodies = FxHashMap::default();
    for func in functions {
        bodies.insert(func.name.clone(), func.body.clone());
    }
    state.traits.add_trait_implementation(
        trait_name,
        TraitImpl {
            type_name,
            target: target_ty,
            functions: bodies,
            given_constraints,
        },
        span,
    )?;
    Ok(Inferred::pure(Type::Unit))
}

// ── Annotation resolution ──────────────────────────────────────────────

/// Resolve a surface type expression into the internal representation:
/// lowercase names become type variables, known names resolve through the
/// primitives, the ADT registry, and the alias table.
pub fn resolve_type_expr(
    state: &mut InferState,
    texpr: &TypeExpr,
    span: Span,
) -> Result<Type, TypeError> {
    match texpr {
        TypeExpr::Name(name) => resolve_type_name(state, name, &[], span),
        TypeExpr::App(name, args) => {
            let args: Vec<Type> = args
                .iter()
                .map(|a| resolve_type_expr(state, a, span))
                .collect::<Result<_, _>>()?;
            resolve_type_name(state, name, &args, span)
        }
        TypeExpr::Function {
            params,
            ret,
            effects,
        } => {
            let params: Vec<Type> = params
                .iter()
                .map(|p| resolve_type_expr(state, p, span))
                .collect::<Result<_, _>>()?;
            let ret = resolve_type_expr(state, ret, span)?;
            let mut set = EffectSet::empty();
            for name in effects {
                if let Some(effect) = Effect::from_name(name) {
                    set.insert(effect);
                }
            }
            Ok(Type::func_eff(params, ret, set))
        }
        TypeExpr::List(elem) => Ok(Type::list(resolve_type_expr(state, elem, span)?)),
        TypeExpr::Tuple(items) => Ok(Type::Tuple(
            items
                .iter()
                .map(|i| resolve_type_expr(state, i, span))
                .collect::<Result<_, _>>()?,
        )),
        TypeExpr::Record(fields) => {
            let mut map = std::collections::BTreeMap::new();
            for (name, field) in fields {
                map.insert(name.clone(), resolve_type_expr(state, field, span)?);
            }
            Ok(Type::Record(map))
        }
        TypeExpr::Union(alts) => Ok(Type::Union(
            alts.iter()
                .map(|a| resolve_type_expr(state, a, span))
                .collect::<Result<_, _>>()?,
        )),
        TypeExpr::Unit => Ok(Type::Unit),
    }
}

fn resolve_type_name(
    state: &mut InferState,
    name: &str,
    args: &[Type],
    span: Span,
) -> Result<Type, TypeError> {
    if crate::ty::is_constructor_var(name) {
        return Ok(if args.is_empty() {
            Type::var(name)
        } else {
            Type::Variant {
                name: name.to_string(),
                args: args.to_vec(),
            }
        });
    }
    match name {
        "Float" => return Ok(Type::float()),
        "String" => return Ok(Type::string()),
        "Bool" => return Ok(Type::bool()),
        "Unit" => return Ok(Type::Unit),
        "List" if args.len() == 1 => return Ok(Type::list(args[0].clone())),
        _ => {}
    }
    if let Some(aliased) = state.adts.lookup_alias(name) {
        return Ok(aliased.clone());
    }
    if let Some(adt) = state.adts.lookup(name) {
        let adt_name = adt.name.clone();
        let param_count = adt.params.len();
        let args = if args.is_empty() && param_count > 0 {
            (0..param_count).map(|_| state.fresh()).collect()
        } else {
            args.to_vec()
        };
        return Ok(Type::Variant {
            name: adt_name,
            args,
        });
    }
    Err(TypeError::UndefinedTypeName {
        name: name.to_string(),
        span,
    })
}

/// Flatten surface constraint annotations (including `and`/`or`/`paren`
/// compounds) into a plain constraint list.
pub fn flatten_constraint_exprs(
    state: &mut InferState,
    constraints: &[ConstraintExpr],
    span: Span,
) -> Result<Vec<Constraint>, TypeError> {
    let mut out = Vec::new();
    for cexpr in constraints {
        flatten_one(state, cexpr, span, &mut out)?;
    }
    Ok(out)
}

fn flatten_one(
    state: &mut InferState,
    cexpr: &ConstraintExpr,
    span: Span,
    out: &mut Vec<Constraint>,
) -> Result<(), TypeError> {
    match cexpr {
        ConstraintExpr::Implements { var, trait_name } => {
            out.push(Constraint::Implements {
                var: var.clone(),
                trait_name: trait_name.clone(),
            });
        }
        ConstraintExpr::HasField { var, field, ty } => {
            let ty = resolve_type_expr(state, ty, span)?;
            out.push(Constraint::HasField {
                var: var.clone(),
                field: field.clone(),
                ty,
            });
        }
        ConstraintExpr::Custom { name, args } => {
            let args: Vec<Type> = args
                .iter()
                .map(|a| resolve_type_expr(state, a, span))
                .collect::<Result<_, _>>()?;
            out.push(Constraint::Custom {
                name: name.clone(),
                args,
            });
        }
        ConstraintExpr::And(a, b) | ConstraintExpr::Or(a, b) => {
            flatten_one(state, a, span, out)?;
            flatten_one(state, b, span, out)?;
        }
        ConstraintExpr::Paren(inner) => flatten_one(state, inner, span, out)?,
    }
    Ok(())
}
