//! Integration tests for algebraic data types: declarations,
//! constructors, pattern matching, aliases, and type-name protection.

use noo_ast::build::*;
use noo_ast::Expr;
use noo_typeck::error::TypeError;
use noo_typeck::{type_program, Typecheck};

// ── Helpers ────────────────────────────────────────────────────────────

fn check(statements: Vec<Expr>) -> Result<Typecheck, TypeError> {
    type_program(&program(statements))
}

fn check_ok(statements: Vec<Expr>) -> Typecheck {
    check(statements).expect("expected the program to type")
}

/// `type Maybe a = Just a | Nothing`.
fn maybe_def() -> Expr {
    type_def(
        "Maybe",
        vec!["a"],
        vec![
            variant("Just", vec![tname("a")]),
            variant("Nothing", vec![]),
        ],
    )
}

// ── Declarations and constructors ──────────────────────────────────────

/// 1. Declaring an ADT brings its constructors into scope.
#[test]
fn test_constructor_application() {
    let result = check_ok(vec![maybe_def(), app(var("Just"), vec![num(1.0)])]);
    assert_eq!(result.ty.to_string(), "Maybe Float");
}

/// 2. A nullary constructor is the instantiated type itself.
#[test]
fn test_nullary_constructor() {
    let result = check_ok(vec![maybe_def(), var("Nothing")]);
    assert!(
        result.ty.to_string().starts_with("Maybe"),
        "expected a Maybe, got `{}`",
        result.ty
    );
}

/// 3. `match (Just 1.0) with (Just x => x; Nothing => 0.0)` is Float.
#[test]
fn test_match_on_declared_adt() {
    let result = check_ok(vec![
        maybe_def(),
        match_(
            app(var("Just"), vec![num(1.0)]),
            vec![
                case(con_pat("Just", vec![var_pat("x")]), var("x")),
                case(con_pat("Nothing", vec![]), num(0.0)),
            ],
        ),
    ]);
    assert_eq!(result.ty.to_string(), "Float");
}

/// 4. Case bodies must agree.
#[test]
fn test_match_case_body_mismatch() {
    let err = check(vec![
        maybe_def(),
        match_(
            app(var("Just"), vec![num(1.0)]),
            vec![
                case(con_pat("Just", vec![var_pat("x")]), var("x")),
                case(con_pat("Nothing", vec![]), str_("fallback")),
            ],
        ),
    ])
    .unwrap_err();
    assert!(matches!(err, TypeError::Mismatch { .. }));
}

/// 5. A constructor pattern with the wrong argument count fails.
#[test]
fn test_constructor_pattern_arity() {
    let err = check(vec![
        maybe_def(),
        match_(
            app(var("Just"), vec![num(1.0)]),
            vec![case(
                con_pat("Just", vec![var_pat("x"), var_pat("y")]),
                var("x"),
            )],
        ),
    ])
    .unwrap_err();
    assert!(matches!(err, TypeError::ArityMismatch { .. }));
}

/// 6. An unknown constructor in a pattern fails.
#[test]
fn test_undefined_constructor_in_pattern() {
    let err = check(vec![match_(
        num(1.0),
        vec![case(con_pat("Bogus", vec![]), num(1.0))],
    )])
    .unwrap_err();
    assert!(matches!(
        err,
        TypeError::UndefinedConstructor { name, .. } if name == "Bogus"
    ));
}

// ── Built-in ADTs ──────────────────────────────────────────────────────

/// 7. Option and Result are seeded.
#[test]
fn test_builtin_option_and_result() {
    let result = check_ok(vec![app(var("Some"), vec![num(1.0)])]);
    assert_eq!(result.ty.to_string(), "Option Float");

    let result = check_ok(vec![typed(
        app(var("Ok"), vec![num(1.0)]),
        tapp("Result", vec![tname("Float"), tname("String")]),
    )]);
    assert_eq!(result.ty.to_string(), "Result Float String");
}

/// 8. Matching through Option extracts the element type.
#[test]
fn test_match_on_option() {
    let result = check_ok(vec![match_(
        app(var("Some"), vec![str_("x")]),
        vec![
            case(con_pat("Some", vec![var_pat("s")]), var("s")),
            case(con_pat("None", vec![]), str_("")),
        ],
    )]);
    assert_eq!(result.ty.to_string(), "String");
}

/// 9. True/False work as constructor patterns over the primitive Bool.
#[test]
fn test_match_on_bool() {
    let result = check_ok(vec![match_(
        var("True"),
        vec![
            case(con_pat("True", vec![]), num(1.0)),
            case(con_pat("False", vec![]), num(0.0)),
        ],
    )]);
    assert_eq!(result.ty.to_string(), "Float");
}

// ── Other pattern kinds ────────────────────────────────────────────────

/// 10. Tuple patterns destructure element-wise.
#[test]
fn test_tuple_pattern() {
    let result = check_ok(vec![match_(
        tuple(vec![num(1.0), str_("a")]),
        vec![case(
            tuple_pat(vec![var_pat("n"), var_pat("s")]),
            tuple(vec![var("s"), var("n")]),
        )],
    )]);
    assert_eq!(result.ty.to_string(), "{String, Float}");
}

/// 11. Record patterns are width-permissive: naming a subset of the
///     fields is fine.
#[test]
fn test_record_pattern_width_permissive() {
    let result = check_ok(vec![match_(
        record(vec![("name", str_("Alice")), ("age", num(30.0))]),
        vec![case(
            record_pat(vec![("name", var_pat("n"))]),
            var("n"),
        )],
    )]);
    assert_eq!(result.ty.to_string(), "String");
}

/// 12. Literal patterns pin the scrutinee type; wildcards bind nothing.
#[test]
fn test_literal_and_wildcard_patterns() {
    let result = check_ok(vec![match_(
        num(1.0),
        vec![
            case(num_pat(0.0), str_("zero")),
            case(wild_pat(), str_("other")),
        ],
    )]);
    assert_eq!(result.ty.to_string(), "String");

    let err = check(vec![match_(
        str_("a"),
        vec![case(num_pat(0.0), num(0.0))],
    )])
    .unwrap_err();
    assert!(matches!(err, TypeError::Mismatch { .. }));
}

// ── Name protection ────────────────────────────────────────────────────

/// 13. Redefining a type name is a duplicate-definition error.
#[test]
fn test_duplicate_type_definition() {
    let err = check(vec![maybe_def(), maybe_def()]).unwrap_err();
    assert!(matches!(
        err,
        TypeError::DuplicateTypeDefinition { name, .. } if name == "Maybe"
    ));
}

/// 14. Stdlib type names are protected after load.
#[test]
fn test_protected_type_shadowing() {
    let err = check(vec![type_def(
        "Option",
        vec!["a"],
        vec![variant("Some2", vec![tname("a")])],
    )])
    .unwrap_err();
    assert!(matches!(
        err,
        TypeError::TypeShadowing { name, .. } if name == "Option"
    ));
}

// ── Aliases ────────────────────────────────────────────────────────────

/// 15. A type alias resolves to its target in annotations.
#[test]
fn test_type_alias_resolves() {
    let result = check_ok(vec![
        type_alias("Name", tname("String")),
        typed(str_("Alice"), tname("Name")),
    ]);
    assert_eq!(result.ty.to_string(), "String");
}

/// 16. Alias names collide with ADT names.
#[test]
fn test_alias_duplicate() {
    let err = check(vec![
        maybe_def(),
        type_alias("Maybe", tname("Float")),
    ])
    .unwrap_err();
    assert!(matches!(err, TypeError::DuplicateTypeDefinition { .. }));
}

/// 17. Annotating with an unknown type name fails.
#[test]
fn test_unknown_type_name() {
    let err = check(vec![typed(num(1.0), tname("Ghost"))]).unwrap_err();
    assert!(matches!(
        err,
        TypeError::UndefinedTypeName { name, .. } if name == "Ghost"
    ));
}
