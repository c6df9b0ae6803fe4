//! Integration tests for the program entry points: end-to-end typing,
//! effect accumulation, decoration, and imports.

use noo_ast::build::*;
use noo_ast::{Expr, ExprKind, Literal, Program};
use noo_common::Span;
use noo_typeck::ty::Effect;
use noo_typeck::{type_and_decorate, type_program, type_program_with_imports, ImportContext};

// ── End-to-end scenarios ───────────────────────────────────────────────

/// 1. `(fn x y => x + y) 1.0 2.0` is Float with no effects.
#[test]
fn test_addition_program() {
    let result = type_program(&program(vec![app(
        lam(["x", "y"], add(var("x"), var("y"))),
        vec![num(1.0), num(2.0)],
    )]))
    .expect("program should type");
    assert_eq!(result.ty.to_string(), "Float");
    assert!(result.effects.is_empty());
}

/// 2. `map (fn x => x + 1.0) [1.0, 2.0, 3.0]` is List Float.
#[test]
fn test_map_program() {
    let result = type_program(&program(vec![app(
        var("map"),
        vec![
            lam(["x"], add(var("x"), num(1.0))),
            list(vec![num(1.0), num(2.0), num(3.0)]),
        ],
    )]))
    .expect("program should type");
    assert_eq!(result.ty.to_string(), "List Float");
    assert!(result.effects.is_empty());
}

// ── Effects ────────────────────────────────────────────────────────────

/// 3. Applying `print` surfaces the log effect.
#[test]
fn test_print_effect() {
    let result = type_program(&program(vec![app(var("print"), vec![str_("hi")])]))
        .expect("program should type");
    assert!(result.effects.contains(Effect::Log));
}

/// 4. Effects union across statements; pure statements add nothing.
#[test]
fn test_effects_union_across_statements() {
    let result = type_program(&program(vec![
        num(1.0),
        app(var("print"), vec![str_("hi")]),
        num(2.0),
    ]))
    .expect("program should type");
    assert!(result.effects.contains(Effect::Log));
}

/// 5. Defining a function that prints is pure; the effect sits on the
///    function type and fires at application.
#[test]
fn test_effect_latency() {
    let result = type_program(&program(vec![def(
        "greet",
        lam(["x"], app(var("print"), vec![var("x")])),
    )]))
    .expect("program should type");
    assert!(result.effects.is_empty(), "defining is pure");
    assert!(
        result.ty.to_string().contains("!log"),
        "the function type should carry the effect, got `{}`",
        result.ty
    );

    let result = type_program(&program(vec![
        def("greet", lam(["x"], app(var("print"), vec![var("x")]))),
        app(var("greet"), vec![str_("hi")]),
    ]))
    .expect("program should type");
    assert!(result.effects.contains(Effect::Log));
}

// ── Decoration ─────────────────────────────────────────────────────────

/// 6. `type_and_decorate` records a final substituted type per
///    expression span, queryable by position.
#[test]
fn test_decoration_and_position_query() {
    // `1.0 + 2.0` with realistic spans.
    let lhs = Expr::new(ExprKind::Literal(Literal::Number(1.0)), Span::new(0, 3));
    let rhs = Expr::new(ExprKind::Literal(Literal::Number(2.0)), Span::new(6, 9));
    let whole = Expr::new(
        ExprKind::Binary {
            op: noo_ast::BinOp::Add,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        },
        Span::new(0, 9),
    );
    let decorated = type_and_decorate(&Program::new(vec![whole]), &ImportContext::empty(), None)
        .expect("program should type");

    assert_eq!(decorated.ty.to_string(), "Float");
    let at_lhs = decorated.type_at(1).expect("a type at offset 1");
    assert_eq!(at_lhs.to_string(), "Float");
    let at_op = decorated.type_at(4).expect("a type at offset 4");
    assert_eq!(at_op.to_string(), "Float");
    assert!(decorated.type_at(100).is_none());
}

// ── Imports ────────────────────────────────────────────────────────────

/// 7. An import exposes the module's final statement type.
#[test]
fn test_import_exposes_final_type() {
    let mut imports = ImportContext::empty();
    imports.insert(
        "math",
        program(vec![def("pi", num(3.14159)), var("pi")]),
    );
    let result = type_program_with_imports(
        &program(vec![import_("math")]),
        &imports,
    )
    .expect("program should type");
    assert_eq!(result.ty.to_string(), "Float");
}

/// 8. A missing import degrades to a fresh type variable instead of
///    failing the program.
#[test]
fn test_missing_import_degrades() {
    let result = type_program(&program(vec![import_("nowhere")]))
        .expect("a missing import must not fail the program");
    assert!(result.ty.is_var(), "expected a fresh variable, got `{}`", result.ty);
}

/// 9. A broken module degrades the import, not the program.
#[test]
fn test_broken_import_degrades() {
    let mut imports = ImportContext::empty();
    imports.insert("broken", program(vec![add(num(1.0), str_("x"))]));
    let result = type_program_with_imports(
        &program(vec![import_("broken"), num(1.0)]),
        &imports,
    )
    .expect("a broken import must not fail the program");
    assert_eq!(result.ty.to_string(), "Float");
}

/// 10. Import cycles terminate and degrade.
#[test]
fn test_import_cycle_degrades() {
    let mut imports = ImportContext::empty();
    imports.insert("a", program(vec![import_("a")]));
    let result = type_program_with_imports(&program(vec![import_("a")]), &imports)
        .expect("a cyclic import must not fail the program");
    assert!(result.ty.is_var());
}

// ── Final-state invariants ─────────────────────────────────────────────

/// 11. The final substitution is idempotent over the result type.
#[test]
fn test_substitution_idempotent_over_result() {
    let mut result = type_program(&program(vec![
        def("id", lam(["x"], var("x"))),
        app(var("id"), vec![list(vec![num(1.0)])]),
    ]))
    .expect("program should type");
    let once = result.state.subst.apply(&result.ty);
    let twice = result.state.subst.apply(&once);
    assert_eq!(once, twice);
}

/// 12. The final state carries the registries the evaluator needs.
#[test]
fn test_final_state_carries_registries() {
    let result = type_program(&program(vec![
        constraint_def(
            "Show",
            "a",
            vec![("show", tfun(vec![tname("a")], tname("String")))],
        ),
        implement("Show", tname("Float"), vec![impl_fn("show", var("toString"))]),
        type_def("Maybe", vec!["a"], vec![variant("Just", vec![tname("a")])]),
        num(1.0),
    ]))
    .expect("program should type");

    assert!(result.state.traits.get_trait("Show").is_some());
    assert!(result.state.traits.is_trait_function("show"));
    assert!(result
        .state
        .traits
        .find_implementation("Show", "Float")
        .is_some());
    assert!(result.state.adts.lookup("Maybe").is_some());
    assert!(result.state.adts.lookup_constructor("Just").is_some());
}
