//! Trait registry: definitions, implementations, and dispatch lookup.
//!
//! A Noolang trait (`constraint Show a (show: a -> String)`) declares a
//! single type parameter and a set of function signatures. Implementations
//! (`implement Show Float (show = toString)`) are keyed by the container
//! type's dispatch name and store their function bodies as expressions —
//! the evaluator inlines them at runtime, the type checker only validates
//! shapes and resolves dispatch.

use noo_ast::Expr;
use noo_common::Span;
use rustc_hash::FxHashMap;

use crate::error::TypeError;
use crate::ty::{Constraint, FunctionType, Scheme, Type};

/// A trait definition: one type parameter and the declared functions.
#[derive(Clone, Debug)]
pub struct TraitDef {
    pub name: String,
    /// The trait's type parameter name (e.g. `a` in `Show a`).
    pub type_param: String,
    /// Function name → declared signature. The signature references the
    /// type parameter as an ordinary type variable.
    pub functions: FxHashMap<String, FunctionType>,
}

/// One implementation of a trait for a concrete type.
#[derive(Clone, Debug)]
pub struct TraitImpl {
    /// Dispatch name of the implementing type (`Float`, `List`, `Record`).
    pub type_name: String,
    /// The implementing type as written (`Float`, `List a`).
    pub target: Type,
    /// Function name → implementation body, stored as-is for the
    /// evaluator.
    pub functions: FxHashMap<String, Expr>,
    /// Constraints the implementation itself requires, e.g.
    /// `implement Show (List a) given a implements Show`.
    pub given_constraints: Vec<Constraint>,
}

/// The outcome of trait-function dispatch for a set of argument types.
#[derive(Clone, Debug)]
pub enum TraitResolution {
    /// Exactly one implementation matched.
    Resolved {
        trait_name: String,
        impl_type_name: String,
    },
    /// The dispatch argument is still polymorphic; the caller should
    /// carry a constrained type and retry later.
    NeedsConstraint { trait_name: String },
    /// The dispatch argument is concrete and no implementation exists.
    NoImplementation {
        trait_name: String,
        ty: Type,
    },
}

/// Registry of all trait definitions and implementations.
#[derive(Clone, Debug, Default)]
pub struct TraitRegistry {
    /// Trait name → definition.
    definitions: FxHashMap<String, TraitDef>,
    /// Trait name → (type dispatch name → implementation).
    implementations: FxHashMap<String, FxHashMap<String, TraitImpl>>,
    /// Function name → traits that declare it (reverse index).
    function_traits: FxHashMap<String, Vec<String>>,
}

impl TraitRegistry {
    pub fn new() -> TraitRegistry {
        TraitRegistry::default()
    }

    // ── Registration ────────────────────────────────────────────────

    /// Register a trait definition and index its function names.
    pub fn add_trait_definition(&mut self, def: TraitDef) {
        for func_name in def.functions.keys() {
            let traits = self.function_traits.entry(func_name.clone()).or_default();
            if !traits.contains(&def.name) {
                traits.push(def.name.clone());
            }
        }
        self.definitions.insert(def.name.clone(), def);
    }

    /// Register an implementation.
    ///
    /// Rejects duplicates for the same (trait, type) pair, functions the
    /// trait does not declare, and function expressions whose parameter
    /// count differs from the declared signature's curried parameter
    /// count.
    pub fn add_trait_implementation(
        &mut self,
        trait_name: &str,
        imp: TraitImpl,
        span: Span,
    ) -> Result<(), TypeError> {
        let def = self
            .definitions
            .get(trait_name)
            .ok_or_else(|| TypeError::UndefinedTrait {
                name: trait_name.to_string(),
                span,
            })?;

        for (func_name, body) in &imp.functions {
            let sig = def.functions.get(func_name).ok_or_else(|| {
                TypeError::ImplementationUnknownFunction {
                    trait_name: trait_name.to_string(),
                    function: func_name.clone(),
                    span,
                }
            })?;
            // A lambda implementation must take as many parameters as the
            // declared type's curried spine.
            if let noo_ast::ExprKind::Lambda { params, .. } = &body.kind {
                let declared = curried_param_count(sig);
                if params.len() != declared {
                    return Err(TypeError::ImplementationSignatureMismatch {
                        trait_name: trait_name.to_string(),
                        function: func_name.clone(),
                        expected_params: declared,
                        found_params: params.len(),
                        span,
                    });
                }
            }
        }

        let impls = self
            .implementations
            .entry(trait_name.to_string())
            .or_default();
        if impls.contains_key(&imp.type_name) {
            return Err(TypeError::DuplicateImplementation {
                trait_name: trait_name.to_string(),
                type_name: imp.type_name.clone(),
                span,
            });
        }
        impls.insert(imp.type_name.clone(), imp);
        Ok(())
    }

    // ── Lookup ──────────────────────────────────────────────────────

    pub fn get_trait(&self, name: &str) -> Option<&TraitDef> {
        self.definitions.get(name)
    }

    pub fn is_trait_function(&self, name: &str) -> bool {
        self.function_traits.contains_key(name)
    }

    /// The traits declaring a function name, in registration order.
    pub fn traits_of_function(&self, name: &str) -> &[String] {
        self.function_traits
            .get(name)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Find an implementation by trait and type dispatch name.
    pub fn find_implementation(&self, trait_name: &str, type_name: &str) -> Option<&TraitImpl> {
        self.implementations.get(trait_name)?.get(type_name)
    }

    /// Whether the named type implements the trait, counting the built-in
    /// operator seed (`Add`/`Numeric` exist for `Float` before any stdlib
    /// registration, and `Add` for `String`).
    pub fn type_has_implementation(&self, trait_name: &str, type_name: &str) -> bool {
        if has_builtin_impl(trait_name, type_name) {
            return true;
        }
        self.find_implementation(trait_name, type_name).is_some()
    }

    // ── Dispatch ────────────────────────────────────────────────────

    /// Resolve a trait function call against concrete argument types.
    ///
    /// Searches every trait that declares the function. For each, the
    /// dispatch position is the declared parameter that mentions the
    /// trait's type parameter; the matching argument's dispatch name
    /// selects the implementation. More than one distinct match is an
    /// ambiguity error; zero matches distinguishes "argument still
    /// polymorphic" from "no implementation".
    pub fn resolve_trait_function(
        &self,
        function: &str,
        arg_types: &[Type],
        span: Span,
    ) -> Result<TraitResolution, TypeError> {
        let defining: Vec<&str> = self
            .traits_of_function(function)
            .iter()
            .map(String::as_str)
            .collect();
        if defining.is_empty() {
            return Err(TypeError::UndefinedVariable {
                name: function.to_string(),
                span,
            });
        }

        let mut matches: Vec<(String, String)> = Vec::new();
        for trait_name in &defining {
            for arg in arg_types {
                let Some(type_name) = arg.dispatch_name() else {
                    continue;
                };
                if self.find_implementation(trait_name, &type_name).is_some() {
                    let hit = (trait_name.to_string(), type_name);
                    if !matches.contains(&hit) {
                        matches.push(hit);
                    }
                    break;
                }
            }
        }

        match matches.len() {
            1 => {
                let (trait_name, impl_type_name) = matches.pop().expect("one element");
                Ok(TraitResolution::Resolved {
                    trait_name,
                    impl_type_name,
                })
            }
            0 => {
                // Use the first defining trait to locate the dispatch
                // argument and decide the failure mode.
                let trait_name = defining[0].to_string();
                let def = self.definitions.get(&trait_name);
                let dispatch_arg = def
                    .and_then(|d| {
                        d.functions
                            .get(function)
                            .and_then(|sig| dispatch_position(sig, &d.type_param))
                    })
                    .and_then(|pos| arg_types.get(pos));
                match dispatch_arg {
                    Some(arg) if arg.is_concrete() && arg.dispatch_name().is_some() => {
                        Ok(TraitResolution::NoImplementation {
                            trait_name,
                            ty: arg.clone(),
                        })
                    }
                    _ => Ok(TraitResolution::NeedsConstraint { trait_name }),
                }
            }
            _ => {
                let mut candidates: Vec<String> =
                    matches.iter().map(|(t, _)| t.clone()).collect();
                candidates.sort();
                candidates.dedup();
                if candidates.len() == 1 {
                    // Same trait matched through several argument types;
                    // that is not an ambiguity.
                    let (trait_name, impl_type_name) = matches.swap_remove(0);
                    return Ok(TraitResolution::Resolved {
                        trait_name,
                        impl_type_name,
                    });
                }
                Err(TypeError::AmbiguousTraitFunction {
                    function: function.to_string(),
                    candidates,
                    span,
                })
            }
        }
    }

    /// Build the scheme a bare trait-function reference instantiates to:
    /// the first defining trait's signature with an `implements`
    /// constraint attached to the parameter that carries the trait's type
    /// parameter.
    pub fn get_trait_function_info(&self, function: &str) -> Option<Scheme> {
        let trait_name = self.traits_of_function(function).first()?;
        let def = self.definitions.get(trait_name)?;
        let sig = def.functions.get(function)?;

        let mut sig = sig.clone();
        sig.constraints.push(Constraint::Implements {
            var: def.type_param.clone(),
            trait_name: trait_name.clone(),
        });
        let ty = Type::Function(Box::new(sig));
        let vars = ty.free_vars();
        Some(Scheme {
            vars,
            ty,
            effects: crate::ty::EffectSet::empty(),
        })
    }

    pub fn trait_names(&self) -> impl Iterator<Item = &String> {
        self.definitions.keys()
    }

    /// All implementations of a trait, for diagnostics and the evaluator.
    pub fn implementations_of(&self, trait_name: &str) -> impl Iterator<Item = &TraitImpl> {
        self.implementations
            .get(trait_name)
            .into_iter()
            .flat_map(|m| m.values())
    }
}

/// The built-in operator seed: implementations that exist before any
/// stdlib or user registration, so `1.0 + 2.0` types even in a bare
/// state.
pub fn has_builtin_impl(trait_name: &str, type_name: &str) -> bool {
    matches!(
        (trait_name, type_name),
        ("Add", "Float") | ("Add", "String") | ("Numeric", "Float")
    )
}

/// Number of parameters in a signature's curried spine:
/// `a -> b -> c` counts 2.
pub fn curried_param_count(sig: &FunctionType) -> usize {
    let mut count = sig.params.len();
    let mut ret = &sig.ret;
    while let Type::Function(inner) = ret {
        count += inner.params.len();
        ret = &inner.ret;
    }
    count
}

/// Whether a type mentions the trait's type parameter, either as a plain
/// variable or as the head of a constructor application (`f` in `f a`).
fn mentions_type_param(ty: &Type, param: &str) -> bool {
    if ty.mentions_var(param) {
        return true;
    }
    match ty {
        Type::Variant { name, args } => {
            name == param || args.iter().any(|a| mentions_type_param(a, param))
        }
        Type::Function(f) => {
            f.params.iter().any(|p| mentions_type_param(p, param))
                || mentions_type_param(&f.ret, param)
        }
        Type::List(elem) => mentions_type_param(elem, param),
        Type::Tuple(items) => items.iter().any(|i| mentions_type_param(i, param)),
        Type::Record(fields) => fields.values().any(|t| mentions_type_param(t, param)),
        Type::Union(alts) => alts.iter().any(|a| mentions_type_param(a, param)),
        _ => false,
    }
}

/// The index of the first parameter (in the curried spine) that mentions
/// the trait's type parameter, or `None` when only the return type does
/// (e.g. `pure : a -> m a` dispatches on the return).
pub fn dispatch_position(sig: &FunctionType, type_param: &str) -> Option<usize> {
    let mut index = 0;
    let mut current = sig;
    loop {
        for param in &current.params {
            if mentions_type_param(param, type_param) {
                return Some(index);
            }
            index += 1;
        }
        match &current.ret {
            Type::Function(inner) => current = inner,
            _ => return None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use noo_ast::build as ast;

    fn show_trait() -> TraitDef {
        let mut functions = FxHashMap::default();
        functions.insert(
            "show".to_string(),
            FunctionType {
                params: vec![Type::var("a")],
                ret: Type::string(),
                effects: crate::ty::EffectSet::empty(),
                constraints: Vec::new(),
            },
        );
        TraitDef {
            name: "Show".into(),
            type_param: "a".into(),
            functions,
        }
    }

    fn float_show_impl() -> TraitImpl {
        let mut functions = FxHashMap::default();
        functions.insert("show".to_string(), ast::var("toString"));
        TraitImpl {
            type_name: "Float".into(),
            target: Type::float(),
            functions,
            given_constraints: Vec::new(),
        }
    }

    #[test]
    fn register_and_resolve() {
        let mut registry = TraitRegistry::new();
        registry.add_trait_definition(show_trait());
        registry
            .add_trait_implementation("Show", float_show_impl(), Span::zero())
            .unwrap();

        assert!(registry.is_trait_function("show"));
        let resolution = registry
            .resolve_trait_function("show", &[Type::float()], Span::zero())
            .unwrap();
        match resolution {
            TraitResolution::Resolved { impl_type_name, .. } => {
                assert_eq!(impl_type_name, "Float")
            }
            other => panic!("expected Resolved, got {:?}", other),
        }
    }

    #[test]
    fn duplicate_implementation_rejected() {
        let mut registry = TraitRegistry::new();
        registry.add_trait_definition(show_trait());
        registry
            .add_trait_implementation("Show", float_show_impl(), Span::zero())
            .unwrap();
        let err = registry
            .add_trait_implementation("Show", float_show_impl(), Span::zero())
            .unwrap_err();
        assert!(matches!(err, TypeError::DuplicateImplementation { .. }));
    }

    #[test]
    fn unknown_function_rejected() {
        let mut registry = TraitRegistry::new();
        registry.add_trait_definition(show_trait());
        let mut functions = FxHashMap::default();
        functions.insert("display".to_string(), ast::var("toString"));
        let err = registry
            .add_trait_implementation(
                "Show",
                TraitImpl {
                    type_name: "Float".into(),
                    target: Type::float(),
                    functions,
                    given_constraints: Vec::new(),
                },
                Span::zero(),
            )
            .unwrap_err();
        assert!(matches!(
            err,
            TypeError::ImplementationUnknownFunction { .. }
        ));
    }

    #[test]
    fn lambda_arity_must_match_signature() {
        let mut registry = TraitRegistry::new();
        registry.add_trait_definition(show_trait());
        let mut functions = FxHashMap::default();
        // show takes one argument; a two-parameter lambda is wrong.
        functions.insert(
            "show".to_string(),
            ast::lam(["x", "y"], ast::var("x")),
        );
        let err = registry
            .add_trait_implementation(
                "Show",
                TraitImpl {
                    type_name: "Float".into(),
                    target: Type::float(),
                    functions,
                    given_constraints: Vec::new(),
                },
                Span::zero(),
            )
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

    #[test]
    fn no_implementation_for_concrete_type() {
        let mut registry = TraitRegistry::new();
        registry.add_trait_definition(show_trait());
        let resolution = registry
            .resolve_trait_function("show", &[Type::bool()], Span::zero())
            .unwrap();
        assert!(matches!(
            resolution,
            TraitResolution::NoImplementation { .. }
        ));
    }

    #[test]
    fn polymorphic_argument_defers() {
        let mut registry = TraitRegistry::new();
        registry.add_trait_definition(show_trait());
        let resolution = registry
            .resolve_trait_function("show", &[Type::var("t")], Span::zero())
            .unwrap();
        assert!(matches!(
            resolution,
            TraitResolution::NeedsConstraint { .. }
        ));
    }

    #[test]
    fn ambiguity_across_traits_is_an_error() {
        let mut registry = TraitRegistry::new();
        registry.add_trait_definition(show_trait());
        // A second trait also declaring `show`.
        let mut functions = FxHashMap::default();
        functions.insert(
            "show".to_string(),
            FunctionType {
                params: vec![Type::var("b")],
                ret: Type::string(),
                effects: crate::ty::EffectSet::empty(),
                constraints: Vec::new(),
            },
        );
        registry.add_trait_definition(TraitDef {
            name: "Debug".into(),
            type_param: "b".into(),
            functions,
        });

        registry
            .add_trait_implementation("Show", float_show_impl(), Span::zero())
            .unwrap();
        let mut debug_functions = FxHashMap::default();
        debug_functions.insert("show".to_string(), ast::var("toString"));
        registry
            .add_trait_implementation(
                "Debug",
                TraitImpl {
                    type_name: "Float".into(),
                    target: Type::float(),
                    functions: debug_functions,
                    given_constraints: Vec::new(),
                },
                Span::zero(),
            )
            .unwrap();

        let err = registry
            .resolve_trait_function("show", &[Type::float()], Span::zero())
            .unwrap_err();
        match err {
            TypeError::AmbiguousTraitFunction { candidates, .. } => {
                assert_eq!(candidates, vec!["Debug".to_string(), "Show".to_string()]);
            }
            other => panic!("expected AmbiguousTraitFunction, got {:?}", other),
        }
    }

    #[test]
    fn trait_function_info_attaches_constraint() {
        let mut registry = TraitRegistry::new();
        registry.add_trait_definition(show_trait());
        let scheme = registry.get_trait_function_info("show").unwrap();
        match &scheme.ty {
            Type::Function(f) => {
                assert!(matches!(
                    f.constraints.first(),
                    Some(Constraint::Implements { trait_name, .. }) if trait_name == "Show"
                ));
            }
            other => panic!("expected function, got {:?}", other),
        }
    }

    #[test]
    fn dispatch_position_scans_curried_spine() {
        // m : (a -> b) -> f a -> f b   -- the container param is index 1.
        let sig = FunctionType {
            params: vec![Type::func(vec![Type::var("a")], Type::var("b"))],
            ret: Type::func(
                vec![Type::variant("f", vec![Type::var("a")])],
                Type::variant("f", vec![Type::var("b")]),
            ),
            effects: crate::ty::EffectSet::empty(),
            constraints: Vec::new(),
        };
        assert_eq!(dispatch_position(&sig, "f"), Some(1));
        assert_eq!(dispatch_position(&sig, "a"), Some(0));

        // pure : a -> m a  -- the container appears only in the return.
        let pure_sig = FunctionType {
            params: vec![Type::var("a")],
            ret: Type::variant("m", vec![Type::var("a")]),
            effects: crate::ty::EffectSet::empty(),
            constraints: Vec::new(),
        };
        assert_eq!(dispatch_position(&pure_sig, "m"), None);
    }
}
