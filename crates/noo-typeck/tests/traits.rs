//! Integration tests for the trait system: definitions, implementations,
//! dispatch, ambiguity, operator constraints, and the safe thrush.

use noo_ast::build::*;
use noo_ast::{BinOp, Expr};
use noo_typeck::error::TypeError;
use noo_typeck::{type_program, Typecheck};

// ── Helpers ────────────────────────────────────────────────────────────

fn check(statements: Vec<Expr>) -> Result<Typecheck, TypeError> {
    type_program(&program(statements))
}

fn check_ok(statements: Vec<Expr>) -> Typecheck {
    check(statements).expect("expected the program to type")
}

/// `constraint Show a ( show: a -> String )`.
fn show_trait() -> Expr {
    constraint_def(
        "Show",
        "a",
        vec![("show", tfun(vec![tname("a")], tname("String")))],
    )
}

/// `implement Show Float ( show = toString )`.
fn show_float_impl() -> Expr {
    implement("Show", tname("Float"), vec![impl_fn("show", var("toString"))])
}

// ── Definition, implementation, dispatch ───────────────────────────────

/// 1. Define Show, implement it for Float, call it on a number.
#[test]
fn test_trait_definition_and_dispatch() {
    let result = check_ok(vec![
        show_trait(),
        show_float_impl(),
        app(var("show"), vec![num(42.0)]),
    ]);
    assert_eq!(result.ty.to_string(), "String");
}

/// 2. Calling a trait function on a concrete type with no
///    implementation fails hard.
#[test]
fn test_no_implementation_for_concrete_type() {
    let err = check(vec![show_trait(), app(var("show"), vec![num(42.0)])]).unwrap_err();
    match err {
        TypeError::TraitNotImplemented { trait_name, .. } => {
            assert_eq!(trait_name, "Show")
        }
        other => panic!("expected TraitNotImplemented, got {:?}", other),
    }
}

/// 3. A polymorphic context defers: the constraint rides along and is
///    checked when the variable becomes concrete.
#[test]
fn test_polymorphic_context_defers() {
    // display = fn x => show x  -- fine without any implementation.
    let result = check_ok(vec![
        show_trait(),
        show_float_impl(),
        def("display", lam(["x"], app(var("show"), vec![var("x")]))),
        app(var("display"), vec![num(1.0)]),
    ]);
    assert_eq!(result.ty.to_string(), "String");
}

/// 4. The deferred constraint still bites when the argument's type has
///    no implementation.
#[test]
fn test_deferred_constraint_fails_on_bad_type() {
    let err = check(vec![
        show_trait(),
        show_float_impl(),
        def("display", lam(["x"], app(var("show"), vec![var("x")]))),
        app(var("display"), vec![var("True")]),
    ])
    .unwrap_err();
    assert!(matches!(err, TypeError::TraitNotImplemented { .. }));
}

// ── Registration errors ────────────────────────────────────────────────

/// 5. A second implementation for the same (trait, type) pair fails.
#[test]
fn test_duplicate_implementation() {
    let err = check(vec![show_trait(), show_float_impl(), show_float_impl()]).unwrap_err();
    assert!(matches!(
        err,
        TypeError::DuplicateImplementation { trait_name, type_name, .. }
            if trait_name == "Show" && type_name == "Float"
    ));
}

/// 6. Implementing a function the trait does not declare fails.
#[test]
fn test_unknown_function_in_implementation() {
    let err = check(vec![
        show_trait(),
        implement(
            "Show",
            tname("Float"),
            vec![impl_fn("render", var("toString"))],
        ),
    ])
    .unwrap_err();
    assert!(matches!(
        err,
        TypeError::ImplementationUnknownFunction { .. }
    ));
}

/// 7. A lambda implementation must match the signature's curried
///    parameter count.
#[test]
fn test_implementation_arity_mismatch() {
    let err = check(vec![
        show_trait(),
        implement(
            "Show",
            tname("Float"),
            vec![impl_fn("show", lam(["x", "y"], var("x")))],
        ),
    ])
    .unwrap_err();
    assert!(matches!(
        err,
        TypeError::ImplementationSignatureMismatch {
            expected_params: 1,
            found_params: 2,
            ..
        }
    ));
}

/// 8. Implementing an unknown trait fails.
#[test]
fn test_unknown_trait() {
    let err = check(vec![implement(
        "Ghost",
        tname("Float"),
        vec![impl_fn("spook", var("toString"))],
    )])
    .unwrap_err();
    assert!(matches!(err, TypeError::UndefinedTrait { .. }));
}

// ── Shadowing ──────────────────────────────────────────────────────────

/// 9. A definition may not reuse a trait function's name.
#[test]
fn test_trait_function_shadowing() {
    let err = check(vec![show_trait(), def("show", num(1.0))]).unwrap_err();
    assert!(matches!(
        err,
        TypeError::TraitFunctionShadowing { name, .. } if name == "show"
    ));
}

/// 10. The stdlib's trait functions are protected too: `map` belongs to
///     Functor after stdlib load.
#[test]
fn test_stdlib_trait_function_shadowing() {
    let err = check(vec![def("map", num(1.0))]).unwrap_err();
    assert!(matches!(
        err,
        TypeError::TraitFunctionShadowing { trait_name, .. } if trait_name == "Functor"
    ));
}

// ── Ambiguity ──────────────────────────────────────────────────────────

/// 11. Two traits declaring the same function, both implemented for the
///     argument type, is an ambiguity error listing the candidates.
#[test]
fn test_ambiguous_dispatch() {
    let render_sig = || tfun(vec![tname("a")], tname("String"));
    let err = check(vec![
        constraint_def("Display", "a", vec![("render", render_sig())]),
        constraint_def("Printable", "a", vec![("render", render_sig())]),
        implement(
            "Display",
            tname("Float"),
            vec![impl_fn("render", var("toString"))],
        ),
        implement(
            "Printable",
            tname("Float"),
            vec![impl_fn("render", var("toString"))],
        ),
        app(var("render"), vec![num(1.0)]),
    ])
    .unwrap_err();
    match err {
        TypeError::AmbiguousTraitFunction { candidates, .. } => {
            assert_eq!(
                candidates,
                vec!["Display".to_string(), "Printable".to_string()]
            );
        }
        other => panic!("expected AmbiguousTraitFunction, got {:?}", other),
    }
}

// ── Operator constraints ───────────────────────────────────────────────

/// 12. `1 + "hello"` reports the Add trait and both operand types.
#[test]
fn test_mixed_addition_mentions_trait_and_operands() {
    let err = check(vec![add(num(1.0), str_("hello"))]).unwrap_err();
    match &err {
        TypeError::TraitNotImplemented { trait_name, ty, .. } => {
            assert_eq!(trait_name, "Add");
            let shown = ty.to_string();
            assert!(shown.contains("Float"), "operand types missing: {}", shown);
            assert!(shown.contains("String"), "operand types missing: {}", shown);
        }
        other => panic!("expected TraitNotImplemented, got {:?}", other),
    }
}

/// 13. String concatenation goes through Add's String implementation.
#[test]
fn test_string_addition() {
    let result = check_ok(vec![add(str_("a"), str_("b"))]);
    assert_eq!(result.ty.to_string(), "String");
}

/// 14. Bool has no Add implementation: concrete operands fail hard.
#[test]
fn test_addition_on_bool_fails() {
    let err = check(vec![add(var("True"), var("False"))]).unwrap_err();
    assert!(matches!(
        err,
        TypeError::TraitNotImplemented { trait_name, .. } if trait_name == "Add"
    ));
}

/// 15. The remaining arithmetic operators use the legacy Numeric
///     predicate: fine on Float, rejected on String.
#[test]
fn test_numeric_operators() {
    let result = check_ok(vec![binary(BinOp::Sub, num(3.0), num(1.0))]);
    assert_eq!(result.ty.to_string(), "Float");

    let err = check(vec![binary(BinOp::Mul, str_("a"), str_("b"))]).unwrap_err();
    assert!(matches!(
        err,
        TypeError::TraitNotImplemented { trait_name, .. } if trait_name == "Numeric"
    ));
}

// ── Deferred higher-kinded dispatch ────────────────────────────────────

/// 16. With `constraint F f ( m: (a -> b) -> f a -> f b )` and no
///     implementation, `m (fn x => x + 1.0)` is a constrained function
///     type whose display carries the pending constraint.
#[test]
fn test_unresolved_container_keeps_constraint() {
    let result = check_ok(vec![
        constraint_def(
            "F",
            "f",
            vec![(
                "m",
                tfun(
                    vec![tfun(vec![tname("a")], tname("b"))],
                    tfun(
                        vec![tapp("f", vec![tname("a")])],
                        tapp("f", vec![tname("b")]),
                    ),
                ),
            )],
        ),
        app(var("m"), vec![lam(["x"], add(var("x"), num(1.0)))]),
    ]);
    let shown = result.ty.to_string();
    assert!(
        shown.contains("implements F"),
        "expected a pending `implements F` constraint, got `{}`",
        shown
    );
}

/// 17. `map` over a list goes through the seeded list primitive even
///     though Functor also declares it.
#[test]
fn test_map_over_list() {
    let result = check_ok(vec![app(
        var("map"),
        vec![
            lam(["x"], add(var("x"), num(1.0))),
            list(vec![num(1.0), num(2.0), num(3.0)]),
        ],
    )]);
    assert_eq!(result.ty.to_string(), "List Float");
}

// ── Safe thrush ────────────────────────────────────────────────────────

/// 18. `Some 1.0 |? fn x => Some (x + 1.0)` binds through the stdlib
///     Monad and stays an Option.
#[test]
fn test_safe_thrush_option() {
    let result = check_ok(vec![safe_thrush(
        app(var("Some"), vec![num(1.0)]),
        lam(["x"], app(var("Some"), vec![add(var("x"), num(1.0))])),
    )]);
    assert_eq!(result.ty.to_string(), "Option Float");
}

/// 19. The Result container takes the direct fallback and preserves its
///     error type.
#[test]
fn test_safe_thrush_result() {
    let result = check_ok(vec![safe_thrush(
        typed(
            app(var("Ok"), vec![num(1.0)]),
            tapp("Result", vec![tname("Float"), tname("String")]),
        ),
        lam(["x"], app(var("Ok"), vec![add(var("x"), num(1.0))])),
    )]);
    assert!(
        result.ty.to_string().starts_with("Result Float"),
        "expected a Result Float, got `{}`",
        result.ty
    );
}

/// 20. Safe thrush on a non-container is a kind error.
#[test]
fn test_safe_thrush_on_plain_value() {
    let err = check(vec![safe_thrush(
        num(1.0),
        lam(["x"], app(var("Some"), vec![var("x")])),
    )])
    .unwrap_err();
    assert!(matches!(err, TypeError::KindMismatch { .. }));
}

// ── Given constraints ──────────────────────────────────────────────────

/// 21. An implementation may carry its own `given` constraints; they are
///     stored with the implementation and dispatch still works.
#[test]
fn test_implementation_with_given_constraints() {
    let result = check_ok(vec![
        show_trait(),
        show_float_impl(),
        implement_given(
            "Show",
            tapp("List", vec![tname("a")]),
            vec![impl_fn("show", var("toString"))],
            vec![c_implements("a", "Show")],
        ),
        app(var("show"), vec![list(vec![num(1.0)])]),
    ]);
    assert_eq!(result.ty.to_string(), "String");
}
