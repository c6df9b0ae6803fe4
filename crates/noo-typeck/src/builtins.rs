//! Built-in environment and stdlib registration.
//!
//! Seeds the primitive ADTs (Bool, Option, Result), the operator schemes,
//! the list/record/tuple helpers, and `print`/`toString` into a fresh
//! state, then loads the stdlib traits (Add, Numeric, Functor, Monad)
//! into the trait registry. After loading, the seeded type names are
//! protected against shadowing.

use noo_ast::build as ast;
use rustc_hash::FxHashMap;

use crate::state::{AdtDef, InferState};
use crate::traits::{TraitDef, TraitImpl};
use crate::ty::{
    Constraint, Effect, EffectSet, FunctionType, Scheme, Type,
};

/// A fresh state with builtins and stdlib loaded — the starting point of
/// every program and every imported module.
pub fn bootstrap_state() -> InferState {
    let mut state = InferState::new();
    register_builtins(&mut state);
    load_stdlib(&mut state);
    state
}

// ── Scheme shorthands ──────────────────────────────────────────────────

/// A curried one-parameter link.
fn fun1(param: Type, ret: Type) -> Type {
    Type::func(vec![param], ret)
}

/// A curried two-parameter chain.
fn fun2(a: Type, b: Type, ret: Type) -> Type {
    fun1(a, fun1(b, ret))
}

/// A curried three-parameter chain.
fn fun3(a: Type, b: Type, c: Type, ret: Type) -> Type {
    fun1(a, fun1(b, fun1(c, ret)))
}

fn a() -> Type {
    Type::var("a")
}

fn b() -> Type {
    Type::var("b")
}

fn c() -> Type {
    Type::var("c")
}

// ── Built-in environment ───────────────────────────────────────────────

/// Register the primitive ADTs, operators, and core helpers.
pub fn register_builtins(state: &mut InferState) {
    register_primitive_adts(state);
    register_operators(state);
    register_list_primitives(state);
    register_record_helpers(state);
    register_tuple_helpers(state);

    // print : a -> a !log — prints its argument and passes it through.
    state.env.insert(
        "print",
        Scheme::poly(
            vec!["a"],
            Type::func_eff(vec![a()], a(), EffectSet::single(Effect::Log)),
        ),
    );

    // toString : a -> String
    state.env.insert(
        "toString",
        Scheme::poly(vec!["a"], fun1(a(), Type::string())),
    );
}

fn register_primitive_adts(state: &mut InferState) {
    // Bool's constructors live in the ADT registry so patterns can match
    // on them, but their values are the primitive Bool.
    let mut bool_ctors = FxHashMap::default();
    bool_ctors.insert("True".to_string(), vec![]);
    bool_ctors.insert("False".to_string(), vec![]);
    state.adts.register(AdtDef {
        name: "Bool".into(),
        params: vec![],
        constructors: bool_ctors,
    });
    state.env.insert("True", Scheme::mono(Type::bool()));
    state.env.insert("False", Scheme::mono(Type::bool()));

    // Option a = Some a | None
    let mut option_ctors = FxHashMap::default();
    option_ctors.insert("Some".to_string(), vec![a()]);
    option_ctors.insert("None".to_string(), vec![]);
    state.adts.register(AdtDef {
        name: "Option".into(),
        params: vec!["a".into()],
        constructors: option_ctors,
    });
    state.env.insert(
        "Some",
        Scheme::poly(vec!["a"], fun1(a(), Type::option(a()))),
    );
    state
        .env
        .insert("None", Scheme::poly(vec!["a"], Type::option(a())));

    // Result a b = Ok a | Err b
    let mut result_ctors = FxHashMap::default();
    result_ctors.insert("Ok".to_string(), vec![a()]);
    result_ctors.insert("Err".to_string(), vec![b()]);
    state.adts.register(AdtDef {
        name: "Result".into(),
        params: vec!["a".into(), "b".into()],
        constructors: result_ctors,
    });
    state.env.insert(
        "Ok",
        Scheme::poly(vec!["a", "b"], fun1(a(), Type::result(a(), b()))),
    );
    state.env.insert(
        "Err",
        Scheme::poly(vec!["a", "b"], fun1(b(), Type::result(a(), b()))),
    );
}

fn register_operators(state: &mut InferState) {
    // + : a -> a -> a given a implements Add
    state.env.insert(
        "+",
        Scheme::poly(
            vec!["a"],
            with_constraints(
                fun2(a(), a(), a()),
                vec![Constraint::Implements {
                    var: "a".into(),
                    trait_name: "Add".into(),
                }],
            ),
        ),
    );

    // - * / : a -> a -> a, constrained through the legacy Numeric
    // predicate (operator sugar only).
    for op in ["-", "*", "/"] {
        state.env.insert(
            op,
            Scheme::poly(
                vec!["a"],
                with_constraints(
                    fun2(a(), a(), a()),
                    vec![Constraint::Is {
                        var: "a".into(),
                        pred: "Numeric".into(),
                    }],
                ),
            ),
        );
    }

    // Comparisons and equality return Bool.
    for op in ["<", ">", "<=", ">=", "==", "!="] {
        state.env.insert(
            op,
            Scheme::poly(vec!["a"], fun2(a(), a(), Type::bool())),
        );
    }

    // Thrush, low-precedence apply, sequence.
    state.env.insert(
        "|",
        Scheme::poly(vec!["a", "b"], fun2(a(), fun1(a(), b()), b())),
    );
    state.env.insert(
        "$",
        Scheme::poly(vec!["a", "b"], fun2(fun1(a(), b()), a(), b())),
    );
    state
        .env
        .insert(";", Scheme::poly(vec!["a", "b"], fun2(a(), b(), b())));

    // Pipeline composition in both directions, plus the named form.
    state.env.insert(
        "|>",
        Scheme::poly(
            vec!["a", "b", "c"],
            fun2(fun1(a(), b()), fun1(b(), c()), fun1(a(), c())),
        ),
    );
    state.env.insert(
        "<|",
        Scheme::poly(
            vec!["a", "b", "c"],
            fun2(fun1(b(), c()), fun1(a(), b()), fun1(a(), c())),
        ),
    );
    state.env.insert(
        "compose",
        Scheme::poly(
            vec!["a", "b", "c"],
            fun3(fun1(a(), b()), fun1(b(), c()), a(), c()),
        ),
    );
}

fn register_list_primitives(state: &mut InferState) {
    let list_a = || Type::list(a());

    state.env.insert(
        "head",
        Scheme::poly(vec!["a"], fun1(list_a(), Type::option(a()))),
    );
    state
        .env
        .insert("tail", Scheme::poly(vec!["a"], fun1(list_a(), list_a())));
    state.env.insert(
        "cons",
        Scheme::poly(vec!["a"], fun2(a(), list_a(), list_a())),
    );
    state.env.insert(
        "map",
        Scheme::poly(
            vec!["a", "b"],
            fun2(fun1(a(), b()), list_a(), Type::list(b())),
        ),
    );
    state.env.insert(
        "filter",
        Scheme::poly(
            vec!["a"],
            fun2(fun1(a(), Type::bool()), list_a(), list_a()),
        ),
    );
    state.env.insert(
        "reduce",
        Scheme::poly(
            vec!["a", "b"],
            fun3(fun2(b(), a(), b()), b(), list_a(), b()),
        ),
    );
    state.env.insert(
        "length",
        Scheme::poly(vec!["a"], fun1(list_a(), Type::float())),
    );
    state.env.insert(
        "isEmpty",
        Scheme::poly(vec!["a"], fun1(list_a(), Type::bool())),
    );
    state.env.insert(
        "append",
        Scheme::poly(vec!["a"], fun2(list_a(), list_a(), list_a())),
    );
}

fn register_record_helpers(state: &mut InferState) {
    state.env.insert(
        "hasKey",
        Scheme::poly(vec!["r"], fun2(Type::var("r"), Type::string(), Type::bool())),
    );
    state.env.insert(
        "hasValue",
        Scheme::poly(
            vec!["r", "v"],
            fun2(Type::var("r"), Type::var("v"), Type::bool()),
        ),
    );
    state.env.insert(
        "set",
        Scheme::poly(
            vec!["r", "v"],
            fun3(
                Type::var("r"),
                Type::string(),
                Type::var("v"),
                Type::var("r"),
            ),
        ),
    );
}

fn register_tuple_helpers(state: &mut InferState) {
    state.env.insert(
        "tupleLength",
        Scheme::poly(vec!["t"], fun1(Type::var("t"), Type::float())),
    );
    state.env.insert(
        "tupleIsEmpty",
        Scheme::poly(vec!["t"], fun1(Type::var("t"), Type::bool())),
    );
}

fn with_constraints(ty: Type, constraints: Vec<Constraint>) -> Type {
    match ty {
        Type::Function(mut f) => {
            f.constraints = constraints;
            Type::Function(f)
        }
        other => other,
    }
}

// ── Stdlib traits ──────────────────────────────────────────────────────

/// Load the stdlib trait definitions and implementations, then protect
/// the seeded type names against shadowing.
pub fn load_stdlib(state: &mut InferState) {
    register_add_trait(state);
    register_numeric_trait(state);
    register_functor_trait(state);
    register_monad_trait(state);

    for name in ["Float", "String", "Bool", "Unit", "List", "Option", "Result"] {
        state.protect_type_name(name);
    }
}

fn sig(params: Vec<Type>, ret: Type) -> FunctionType {
    let mut ty = ret;
    for param in params.into_iter().rev() {
        ty = fun1(param, ty);
    }
    match ty {
        Type::Function(f) => *f,
        _ => unreachable!("sig always takes at least one parameter"),
    }
}

fn register_add_trait(state: &mut InferState) {
    let mut functions = FxHashMap::default();
    functions.insert("add".to_string(), sig(vec![a(), a()], a()));
    state.traits.add_trait_definition(TraitDef {
        name: "Add".into(),
        type_param: "a".into(),
        functions,
    });

    for (type_name, target, native) in [
        ("Float", Type::float(), "floatAdd"),
        ("String", Type::string(), "stringConcat"),
    ] {
        let mut bodies = FxHashMap::default();
        bodies.insert("add".to_string(), ast::var(native));
        state
            .traits
            .add_trait_implementation(
                "Add",
                TraitImpl {
                    type_name: type_name.into(),
                    target,
                    functions: bodies,
                    given_constraints: Vec::new(),
                },
                noo_common::Span::zero(),
            )
            .expect("stdlib Add implementations are disjoint");
    }
}

fn register_numeric_trait(state: &mut InferState) {
    let mut functions = FxHashMap::default();
    functions.insert("subtract".to_string(), sig(vec![a(), a()], a()));
    functions.insert("multiply".to_string(), sig(vec![a(), a()], a()));
    functions.insert("divide".to_string(), sig(vec![a(), a()], a()));
    state.traits.add_trait_definition(TraitDef {
        name: "Numeric".into(),
        type_param: "a".into(),
        functions,
    });

    let mut bodies = FxHashMap::default();
    bodies.insert("subtract".to_string(), ast::var("floatSub"));
    bodies.insert("multiply".to_string(), ast::var("floatMul"));
    bodies.insert("divide".to_string(), ast::var("floatDiv"));
    state
        .traits
        .add_trait_implementation(
            "Numeric",
            TraitImpl {
                type_name: "Float".into(),
                target: Type::float(),
                functions: bodies,
                given_constraints: Vec::new(),
            },
            noo_common::Span::zero(),
        )
        .expect("stdlib Numeric implementation is unique");
}

fn register_functor_trait(state: &mut InferState) {
    let mut functions = FxHashMap::default();
    // map : (a -> b) -> f a -> f b
    functions.insert(
        "map".to_string(),
        sig(
            vec![
                fun1(a(), b()),
                Type::variant("f", vec![a()]),
            ],
            Type::variant("f", vec![b()]),
        ),
    );
    state.traits.add_trait_definition(TraitDef {
        name: "Functor".into(),
        type_param: "f".into(),
        functions,
    });

    for (type_name, target, native) in [
        (
            "List",
            Type::list(a()),
            "listMap",
        ),
        ("Option", Type::option(a()), "optionMap"),
    ] {
        let mut bodies = FxHashMap::default();
        bodies.insert("map".to_string(), ast::var(native));
        state
            .traits
            .add_trait_implementation(
                "Functor",
                TraitImpl {
                    type_name: type_name.into(),
                    target,
                    functions: bodies,
                    given_constraints: Vec::new(),
                },
                noo_common::Span::zero(),
            )
            .expect("stdlib Functor implementations are disjoint");
    }
}

fn register_monad_trait(state: &mut InferState) {
    let mut functions = FxHashMap::default();
    // bind : m a -> (a -> m b) -> m b
    functions.insert(
        "bind".to_string(),
        sig(
            vec![
                Type::variant("m", vec![a()]),
                fun1(a(), Type::variant("m", vec![b()])),
            ],
            Type::variant("m", vec![b()]),
        ),
    );
    // pure : a -> m a — the container appears only in the return type,
    // so dispatch always defers to the caller's context.
    functions.insert(
        "pure".to_string(),
        sig(vec![a()], Type::variant("m", vec![a()])),
    );
    state.traits.add_trait_definition(TraitDef {
        name: "Monad".into(),
        type_param: "m".into(),
        functions,
    });

    for (type_name, target, bind_native, pure_native) in [
        ("Option", Type::option(a()), "optionBind", "optionPure"),
        (
            "Result",
            Type::result(a(), b()),
            "resultBind",
            "resultPure",
        ),
    ] {
        let mut bodies = FxHashMap::default();
        bodies.insert("bind".to_string(), ast::var(bind_native));
        bodies.insert("pure".to_string(), ast::var(pure_native));
        state
            .traits
            .add_trait_implementation(
                "Monad",
                TraitImpl {
                    type_name: type_name.into(),
                    target,
                    functions: bodies,
                    given_constraints: Vec::new(),
                },
                noo_common::Span::zero(),
            )
            .expect("stdlib Monad implementations are disjoint");
    }
}
