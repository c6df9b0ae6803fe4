//! Span-free constructor helpers.
//!
//! Hosts that synthesize AST fragments (the stdlib seed, the REPL, tests)
//! use these instead of spelling out `Expr { kind, span }` everywhere.
//! All nodes carry [`Span::zero`]; the parser is the only producer of real
//! spans.

use noo_common::Span;

use crate::expr::{
    BinOp, Expr, ExprKind, ImplFunction, Literal, MatchCase, PipeDir, Program, VariantDef,
};
use crate::pat::{Pattern, PatternKind};
use crate::ty::{ConstraintExpr, TypeExpr};

fn expr(kind: ExprKind) -> Expr {
    Expr::new(kind, Span::zero())
}

fn pattern(kind: PatternKind) -> Pattern {
    Pattern::new(kind, Span::zero())
}

// ── Expressions ────────────────────────────────────────────────────────

pub fn num(value: f64) -> Expr {
    expr(ExprKind::Literal(Literal::Number(value)))
}

pub fn str_(value: impl Into<String>) -> Expr {
    expr(ExprKind::Literal(Literal::String(value.into())))
}

pub fn var(name: impl Into<String>) -> Expr {
    expr(ExprKind::Var(name.into()))
}

pub fn lam<I, S>(params: I, body: Expr) -> Expr
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    expr(ExprKind::Lambda {
        params: params.into_iter().map(Into::into).collect(),
        body: Box::new(body),
    })
}

pub fn app(func: Expr, args: Vec<Expr>) -> Expr {
    expr(ExprKind::App {
        func: Box::new(func),
        args,
    })
}

pub fn binary(op: BinOp, lhs: Expr, rhs: Expr) -> Expr {
    expr(ExprKind::Binary {
        op,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
    })
}

pub fn add(lhs: Expr, rhs: Expr) -> Expr {
    binary(BinOp::Add, lhs, rhs)
}

pub fn seq(lhs: Expr, rhs: Expr) -> Expr {
    binary(BinOp::Seq, lhs, rhs)
}

pub fn thrush(lhs: Expr, rhs: Expr) -> Expr {
    binary(BinOp::Thrush, lhs, rhs)
}

pub fn safe_thrush(lhs: Expr, rhs: Expr) -> Expr {
    binary(BinOp::SafeThrush, lhs, rhs)
}

pub fn pipe_forward(stages: Vec<Expr>) -> Expr {
    expr(ExprKind::Pipeline {
        dir: PipeDir::Forward,
        stages,
    })
}

pub fn pipe_backward(stages: Vec<Expr>) -> Expr {
    expr(ExprKind::Pipeline {
        dir: PipeDir::Backward,
        stages,
    })
}

pub fn if_(cond: Expr, then_branch: Expr, else_branch: Expr) -> Expr {
    expr(ExprKind::If {
        cond: Box::new(cond),
        then_branch: Box::new(then_branch),
        else_branch: Box::new(else_branch),
    })
}

pub fn def(name: impl Into<String>, value: Expr) -> Expr {
    expr(ExprKind::Definition {
        name: name.into(),
        value: Box::new(value),
    })
}

pub fn mut_def(name: impl Into<String>, value: Expr) -> Expr {
    expr(ExprKind::MutDefinition {
        name: name.into(),
        value: Box::new(value),
    })
}

pub fn mutation(name: impl Into<String>, value: Expr) -> Expr {
    expr(ExprKind::Mutation {
        name: name.into(),
        value: Box::new(value),
    })
}

pub fn record<S: Into<String>>(fields: Vec<(S, Expr)>) -> Expr {
    expr(ExprKind::Record {
        fields: fields.into_iter().map(|(k, v)| (k.into(), v)).collect(),
    })
}

pub fn tuple(items: Vec<Expr>) -> Expr {
    expr(ExprKind::Tuple { items })
}

pub fn list(items: Vec<Expr>) -> Expr {
    expr(ExprKind::List { items })
}

pub fn acc(field: impl Into<String>) -> Expr {
    expr(ExprKind::Accessor {
        field: field.into(),
        optional: false,
    })
}

pub fn acc_opt(field: impl Into<String>) -> Expr {
    expr(ExprKind::Accessor {
        field: field.into(),
        optional: true,
    })
}

pub fn where_<S: Into<String>>(body: Expr, definitions: Vec<(S, Expr)>) -> Expr {
    expr(ExprKind::Where {
        body: Box::new(body),
        definitions: definitions
            .into_iter()
            .map(|(k, v)| (k.into(), v))
            .collect(),
    })
}

pub fn typed(inner: Expr, annotation: TypeExpr) -> Expr {
    expr(ExprKind::Typed {
        expr: Box::new(inner),
        annotation,
    })
}

pub fn constrained(inner: Expr, annotation: TypeExpr, constraints: Vec<ConstraintExpr>) -> Expr {
    expr(ExprKind::Constrained {
        expr: Box::new(inner),
        annotation,
        constraints,
    })
}

pub fn match_(scrutinee: Expr, cases: Vec<MatchCase>) -> Expr {
    expr(ExprKind::Match {
        scrutinee: Box::new(scrutinee),
        cases,
    })
}

pub fn case(pattern: Pattern, body: Expr) -> MatchCase {
    MatchCase { pattern, body }
}

pub fn import_(path: impl Into<String>) -> Expr {
    expr(ExprKind::Import { path: path.into() })
}

pub fn type_def<S: Into<String>>(
    name: impl Into<String>,
    params: Vec<S>,
    variants: Vec<VariantDef>,
) -> Expr {
    expr(ExprKind::TypeDefinition {
        name: name.into(),
        params: params.into_iter().map(Into::into).collect(),
        variants,
    })
}

pub fn variant(name: impl Into<String>, args: Vec<TypeExpr>) -> VariantDef {
    VariantDef {
        name: name.into(),
        args,
    }
}

pub fn type_alias(name: impl Into<String>, aliased: TypeExpr) -> Expr {
    expr(ExprKind::TypeAlias {
        name: name.into(),
        aliased,
    })
}

pub fn constraint_def<S: Into<String>>(
    name: impl Into<String>,
    type_param: impl Into<String>,
    functions: Vec<(S, TypeExpr)>,
) -> Expr {
    expr(ExprKind::ConstraintDefinition {
        name: name.into(),
        type_param: type_param.into(),
        functions: functions
            .into_iter()
            .map(|(k, v)| (k.into(), v))
            .collect(),
    })
}

pub fn implement(trait_name: impl Into<String>, target: TypeExpr, functions: Vec<ImplFunction>) -> Expr {
    expr(ExprKind::ImplementDefinition {
        trait_name: trait_name.into(),
        target,
        functions,
        given: Vec::new(),
    })
}

pub fn implement_given(
    trait_name: impl Into<String>,
    target: TypeExpr,
    functions: Vec<ImplFunction>,
    given: Vec<ConstraintExpr>,
) -> Expr {
    expr(ExprKind::ImplementDefinition {
        trait_name: trait_name.into(),
        target,
        functions,
        given,
    })
}

pub fn impl_fn(name: impl Into<String>, body: Expr) -> ImplFunction {
    ImplFunction {
        name: name.into(),
        body,
    }
}

pub fn program(statements: Vec<Expr>) -> Program {
    Program::new(statements)
}

// ── Patterns ───────────────────────────────────────────────────────────

pub fn wild_pat() -> Pattern {
    pattern(PatternKind::Wildcard)
}

pub fn var_pat(name: impl Into<String>) -> Pattern {
    pattern(PatternKind::Var(name.into()))
}

pub fn num_pat(value: f64) -> Pattern {
    pattern(PatternKind::Literal(Literal::Number(value)))
}

pub fn str_pat(value: impl Into<String>) -> Pattern {
    pattern(PatternKind::Literal(Literal::String(value.into())))
}

pub fn con_pat(name: impl Into<String>, args: Vec<Pattern>) -> Pattern {
    pattern(PatternKind::Constructor {
        name: name.into(),
        args,
    })
}

pub fn tuple_pat(items: Vec<Pattern>) -> Pattern {
    pattern(PatternKind::Tuple(items))
}

pub fn record_pat<S: Into<String>>(fields: Vec<(S, Pattern)>) -> Pattern {
    pattern(PatternKind::Record(
        fields.into_iter().map(|(k, v)| (k.into(), v)).collect(),
    ))
}

// ── Type annotations ───────────────────────────────────────────────────

pub fn tname(name: impl Into<String>) -> TypeExpr {
    TypeExpr::Name(name.into())
}

pub fn tapp<S: Into<String>>(name: S, args: Vec<TypeExpr>) -> TypeExpr {
    TypeExpr::App(name.into(), args)
}

pub fn tfun(params: Vec<TypeExpr>, ret: TypeExpr) -> TypeExpr {
    TypeExpr::Function {
        params,
        ret: Box::new(ret),
        effects: Vec::new(),
    }
}

pub fn tfun_eff<S: Into<String>>(params: Vec<TypeExpr>, ret: TypeExpr, effects: Vec<S>) -> TypeExpr {
    TypeExpr::Function {
        params,
        ret: Box::new(ret),
        effects: effects.into_iter().map(Into::into).collect(),
    }
}

pub fn tlist(elem: TypeExpr) -> TypeExpr {
    TypeExpr::List(Box::new(elem))
}

pub fn ttuple(items: Vec<TypeExpr>) -> TypeExpr {
    TypeExpr::Tuple(items)
}

pub fn trecord<S: Into<String>>(fields: Vec<(S, TypeExpr)>) -> TypeExpr {
    TypeExpr::Record(fields.into_iter().map(|(k, v)| (k.into(), v)).collect())
}

pub fn tunion(alts: Vec<TypeExpr>) -> TypeExpr {
    TypeExpr::Union(alts)
}

pub fn tunit() -> TypeExpr {
    TypeExpr::Unit
}

pub fn c_implements(var_name: impl Into<String>, trait_name: impl Into<String>) -> ConstraintExpr {
    ConstraintExpr::Implements {
        var: var_name.into(),
        trait_name: trait_name.into(),
    }
}

pub fn c_has_field(
    var_name: impl Into<String>,
    field: impl Into<String>,
    ty: TypeExpr,
) -> ConstraintExpr {
    ConstraintExpr::HasField {
        var: var_name.into(),
        field: field.into(),
        ty,
    }
}
