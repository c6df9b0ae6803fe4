//! The threaded inference state.
//!
//! Every inferrer takes `&mut InferState` and leaves it consistent between
//! top-level statements: environment schemes are idempotent under the
//! current substitution, the substitution is acyclic, and every ADT
//! constructor has a matching environment entry. The fresh-variable
//! counter lives here too; it is the only process-wide resource.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::env::TypeEnv;
use crate::subst::Subst;
use crate::traits::TraitRegistry;
use crate::ty::{
    Constraint, EffectSet, FieldSchema, FunctionType, RecordStructure, Scheme, Type, TypeVar,
};

/// Maximum number of cached accessor function types.
const ACCESSOR_CACHE_CAP: usize = 256;

// ── ADT registry ───────────────────────────────────────────────────────

/// A registered algebraic data type: its parameters and constructors.
#[derive(Clone, Debug)]
pub struct AdtDef {
    pub name: String,
    /// Type parameter names, e.g. `["a"]` for `Maybe a`.
    pub params: Vec<String>,
    /// Constructor name → argument types (which may reference the params).
    pub constructors: FxHashMap<String, Vec<Type>>,
}

/// Registry of ADT definitions and type aliases.
#[derive(Clone, Debug, Default)]
pub struct AdtRegistry {
    adts: FxHashMap<String, AdtDef>,
    /// Constructor name → owning ADT name.
    constructor_index: FxHashMap<String, String>,
    aliases: FxHashMap<String, Type>,
}

impl AdtRegistry {
    pub fn new() -> AdtRegistry {
        AdtRegistry::default()
    }

    /// Register an ADT. Returns false when the type name is taken.
    pub fn register(&mut self, def: AdtDef) -> bool {
        if self.adts.contains_key(&def.name) || self.aliases.contains_key(&def.name) {
            return false;
        }
        for ctor in def.constructors.keys() {
            self.constructor_index
                .insert(ctor.clone(), def.name.clone());
        }
        self.adts.insert(def.name.clone(), def);
        true
    }

    /// Register a type alias. Returns false when the name is taken.
    pub fn register_alias(&mut self, name: impl Into<String>, ty: Type) -> bool {
        let name = name.into();
        if self.adts.contains_key(&name) || self.aliases.contains_key(&name) {
            return false;
        }
        self.aliases.insert(name, ty);
        true
    }

    pub fn lookup(&self, name: &str) -> Option<&AdtDef> {
        self.adts.get(name)
    }

    pub fn lookup_alias(&self, name: &str) -> Option<&Type> {
        self.aliases.get(name)
    }

    /// Find a constructor: returns the owning ADT and the argument types.
    pub fn lookup_constructor(&self, name: &str) -> Option<(&AdtDef, &[Type])> {
        let adt_name = self.constructor_index.get(name)?;
        let adt = self.adts.get(adt_name)?;
        let args = adt.constructors.get(name)?;
        Some((adt, args.as_slice()))
    }

    pub fn contains_type_name(&self, name: &str) -> bool {
        self.adts.contains_key(name) || self.aliases.contains_key(name)
    }

    pub fn adt_names(&self) -> impl Iterator<Item = &String> {
        self.adts.keys()
    }
}

// ── Inference state ────────────────────────────────────────────────────

/// The complete state threaded through inference.
#[derive(Clone, Debug, Default)]
pub struct InferState {
    /// Environment: name → scheme.
    pub env: TypeEnv,
    /// Current substitution.
    pub subst: Subst,
    /// Fresh-variable counter.
    counter: u64,
    /// ADT definitions and aliases.
    pub adts: AdtRegistry,
    /// Trait definitions and implementations.
    pub traits: TraitRegistry,
    /// Reusable accessor function types, keyed by field name plus the
    /// optional-accessor flag.
    accessor_cache: FxHashMap<(String, bool), Type>,
    /// Type names that may not be shadowed once the stdlib is loaded.
    protected_types: FxHashSet<String>,
    /// Names introduced by `mut` definitions, the only valid `:=` targets.
    pub mutables: FxHashSet<String>,
    /// Constraints merged onto a variable while it was still unbound.
    ///
    /// Constraint copies ride on `TypeVar` instances by value, so a merge
    /// performed through one instance is invisible to bare instances of
    /// the same variable elsewhere. This index records the merge under
    /// the surviving variable's name; binding that variable drains and
    /// verifies the entry.
    var_constraints: FxHashMap<String, Vec<Constraint>>,
}

impl InferState {
    pub fn new() -> InferState {
        InferState::default()
    }

    // ── Fresh variables ─────────────────────────────────────────────

    /// Allocate a fresh, unconstrained type variable.
    pub fn fresh(&mut self) -> Type {
        Type::Var(TypeVar::new(self.fresh_name()))
    }

    /// Allocate a fresh variable carrying constraints.
    pub fn fresh_with(&mut self, constraints: Vec<Constraint>) -> Type {
        let name = self.fresh_name();
        Type::Var(TypeVar {
            name,
            constraints,
        })
    }

    /// Allocate a fresh variable name without building the type.
    pub fn fresh_name(&mut self) -> String {
        let name = format!("α{}", self.counter);
        self.counter += 1;
        name
    }

    // ── Generalization ──────────────────────────────────────────────

    /// Generalize a type into a scheme: quantify the free variables of
    /// `σ(ty)` that do not occur free in `σ(env)`.
    pub fn generalize(&mut self, ty: &Type) -> Scheme {
        self.generalize_without(ty, None)
    }

    /// Like [`generalize`](Self::generalize), but ignores one environment
    /// entry — a definition must not be blocked from quantifying over the
    /// placeholder variable registered under its own name.
    pub fn generalize_without(&mut self, ty: &Type, skip: Option<&str>) -> Scheme {
        let applied = self.subst.apply(ty);
        let mut env_free = if let Some(name) = skip {
            let removed = self.env.remove(name);
            let free = self.env.free_type_vars(&mut self.subst);
            if let Some(scheme) = removed {
                self.env.insert(name, scheme);
            }
            free
        } else {
            self.env.free_type_vars(&mut self.subst)
        };
        // Never quantify a variable the substitution already binds.
        env_free.extend(
            self.subst
                .iter()
                .map(|(var, _)| var.clone())
                .collect::<Vec<_>>(),
        );
        let vars: Vec<String> = applied
            .free_vars()
            .into_iter()
            .filter(|v| !env_free.contains(v))
            .collect();
        Scheme {
            vars,
            ty: applied,
            effects: EffectSet::empty(),
        }
    }

    /// Generalize over every free variable of the type, regardless of the
    /// environment. Used for explicit annotations, which must not share
    /// variables with unrelated polymorphic definitions.
    pub fn generalize_all(&mut self, ty: &Type) -> Scheme {
        let applied = self.subst.apply(ty);
        Scheme {
            vars: applied.free_vars(),
            ty: applied,
            effects: EffectSet::empty(),
        }
    }

    // ── Instantiation ───────────────────────────────────────────────

    /// Instantiate a scheme: freshen exactly the quantified names,
    /// including their occurrences inside constraints. Returns the type
    /// and the scheme's effect annotation.
    pub fn instantiate(&mut self, scheme: &Scheme) -> (Type, EffectSet) {
        if scheme.vars.is_empty() {
            return (scheme.ty.clone(), scheme.effects);
        }
        let mapping: FxHashMap<String, String> = scheme
            .vars
            .iter()
            .map(|v| (v.clone(), self.fresh_name()))
            .collect();
        self.transfer_var_constraints(&mapping);
        (rename_vars(&scheme.ty, &mapping), scheme.effects)
    }

    /// Copy pending constraints recorded under old variable names onto
    /// their fresh images, so deferred trait obligations survive
    /// instantiation. The whole constraint is renamed through the
    /// mapping — inner field-type variables included — so separate
    /// instantiations never share a structural variable.
    fn transfer_var_constraints(&mut self, mapping: &FxHashMap<String, String>) {
        for (old, new) in mapping {
            if let Some(pending) = self.var_constraints.get(old).cloned() {
                let renamed: Vec<Constraint> = pending
                    .iter()
                    .map(|c| rename_constraint(c, mapping))
                    .collect();
                self.note_var_constraints(new, &renamed);
            }
        }
    }

    /// Rename every type variable in `ty` to a fresh name, extending
    /// `mapping` so repeated names stay consistent. Trait implementation
    /// inlining uses this so impl-side variables never alias caller
    /// variables.
    pub fn freshen_type_variables(
        &mut self,
        ty: &Type,
        mapping: &mut FxHashMap<String, String>,
    ) -> Type {
        for var in ty.free_vars() {
            if !mapping.contains_key(&var) {
                let fresh = self.fresh_name();
                mapping.insert(var, fresh);
            }
        }
        self.transfer_var_constraints(mapping);
        rename_vars(ty, mapping)
    }

    // ── Accessor cache ──────────────────────────────────────────────

    pub fn cached_accessor(&self, field: &str, optional: bool) -> Option<&Type> {
        self.accessor_cache
            .get(&(field.to_string(), optional))
    }

    pub fn cache_accessor(&mut self, field: &str, optional: bool, ty: Type) {
        if self.accessor_cache.len() >= ACCESSOR_CACHE_CAP {
            self.accessor_cache.clear();
        }
        self.accessor_cache
            .insert((field.to_string(), optional), ty);
    }

    // ── Pending variable constraints ────────────────────────────────

    /// Record constraints for a still-unbound variable name.
    pub fn note_var_constraints(&mut self, name: &str, constraints: &[Constraint]) {
        if constraints.is_empty() {
            return;
        }
        let entry = self.var_constraints.entry(name.to_string()).or_default();
        for c in constraints {
            let rekeyed = c.with_var(name);
            if !entry.contains(&rekeyed) {
                entry.push(rekeyed);
            }
        }
    }

    /// Drain the pending constraints recorded for a variable name.
    pub fn take_var_constraints(&mut self, name: &str) -> Vec<Constraint> {
        self.var_constraints.remove(name).unwrap_or_default()
    }

    // ── Protected type names ────────────────────────────────────────

    pub fn protect_type_name(&mut self, name: impl Into<String>) {
        self.protected_types.insert(name.into());
    }

    pub fn is_protected_type(&self, name: &str) -> bool {
        self.protected_types.contains(name)
    }
}

/// Structurally replace variable names according to `mapping`, descending
/// into constraints. Names absent from the mapping are untouched.
pub fn rename_vars(ty: &Type, mapping: &FxHashMap<String, String>) -> Type {
    match ty {
        Type::Prim(_) | Type::Unit | Type::Unknown => ty.clone(),
        Type::Var(tv) => Type::Var(TypeVar {
            name: mapping
                .get(&tv.name)
                .cloned()
                .unwrap_or_else(|| tv.name.clone()),
            constraints: tv
                .constraints
                .iter()
                .map(|c| rename_constraint(c, mapping))
                .collect(),
        }),
        Type::Function(f) => Type::Function(Box::new(FunctionType {
            params: f.params.iter().map(|p| rename_vars(p, mapping)).collect(),
            ret: rename_vars(&f.ret, mapping),
            effects: f.effects,
            constraints: f
                .constraints
                .iter()
                .map(|c| rename_constraint(c, mapping))
                .collect(),
        })),
        Type::List(elem) => Type::List(Box::new(rename_vars(elem, mapping))),
        Type::Tuple(items) => {
            Type::Tuple(items.iter().map(|i| rename_vars(i, mapping)).collect())
        }
        Type::Record(fields) => Type::Record(
            fields
                .iter()
                .map(|(k, v)| (k.clone(), rename_vars(v, mapping)))
                .collect(),
        ),
        Type::Variant { name, args } => Type::Variant {
            name: mapping.get(name).cloned().unwrap_or_else(|| name.clone()),
            args: args.iter().map(|a| rename_vars(a, mapping)).collect(),
        },
        Type::Union(alts) => {
            Type::Union(alts.iter().map(|a| rename_vars(a, mapping)).collect())
        }
        Type::Constrained { base, table } => Type::Constrained {
            base: Box::new(rename_vars(base, mapping)),
            table: table
                .iter()
                .map(|(var, constraints)| {
                    (
                        mapping.get(var).cloned().unwrap_or_else(|| var.clone()),
                        constraints
                            .iter()
                            .map(|c| rename_constraint(c, mapping))
                            .collect(),
                    )
                })
                .collect(),
        },
    }
}

fn rename_constraint(constraint: &Constraint, mapping: &FxHashMap<String, String>) -> Constraint {
    let rekey = |var: &String| mapping.get(var).cloned().unwrap_or_else(|| var.clone());
    match constraint {
        Constraint::Implements { var, trait_name } => Constraint::Implements {
            var: rekey(var),
            trait_name: trait_name.clone(),
        },
        Constraint::Is { var, pred } => Constraint::Is {
            var: rekey(var),
            pred: pred.clone(),
        },
        Constraint::Has { var, structure } => Constraint::Has {
            var: rekey(var),
            structure: rename_structure(structure, mapping),
        },
        Constraint::HasField { var, field, ty } => Constraint::HasField {
            var: rekey(var),
            field: field.clone(),
            ty: rename_vars(ty, mapping),
        },
        Constraint::Custom { name, args } => Constraint::Custom {
            name: name.clone(),
            args: args.iter().map(|a| rename_vars(a, mapping)).collect(),
        },
    }
}

fn rename_structure(
    structure: &RecordStructure,
    mapping: &FxHashMap<String, String>,
) -> RecordStructure {
    RecordStructure {
        fields: structure
            .fields
            .iter()
            .map(|(name, schema)| {
                let schema = match schema {
                    FieldSchema::Type(ty) => FieldSchema::Type(rename_vars(ty, mapping)),
                    FieldSchema::Nested(inner) => {
                        FieldSchema::Nested(rename_structure(inner, mapping))
                    }
                };
                (name.clone(), schema)
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ty::Scheme;

    #[test]
    fn fresh_names_are_distinct() {
        let mut state = InferState::new();
        let a = state.fresh();
        let b = state.fresh();
        assert_ne!(a, b);
    }

    #[test]
    fn generalize_quantifies_only_type_vars_absent_from_env() {
        let mut state = InferState::new();
        let a = state.fresh();
        let b = state.fresh();
        // `b` leaks into the environment; only `a` may be quantified.
        state.env.insert("leak", Scheme::mono(b.clone()));

        let ty = Type::func(vec![a.clone()], b.clone());
        let scheme = state.generalize(&ty);
        assert_eq!(scheme.vars.len(), 1);
        match &a {
            Type::Var(tv) => assert_eq!(scheme.vars[0], tv.name),
            _ => unreachable!(),
        }
    }

    #[test]
    fn generalize_then_instantiate_unifies_with_original() {
        let mut state = InferState::new();
        let a = state.fresh();
        let ty = Type::func(vec![a.clone()], a);
        let scheme = state.generalize(&ty);
        assert_eq!(scheme.vars.len(), 1);

        let (inst1, _) = state.instantiate(&scheme);
        let (inst2, _) = state.instantiate(&scheme);
        // Distinct instantiations must not share variables.
        assert_ne!(inst1, inst2);
    }

    #[test]
    fn instantiate_freshens_constraint_occurrences() {
        let mut state = InferState::new();
        let scheme = Scheme::poly(
            vec!["a"],
            Type::func_where(
                vec![Type::var("a"), Type::var("a")],
                Type::var("a"),
                vec![Constraint::Implements {
                    var: "a".into(),
                    trait_name: "Add".into(),
                }],
            ),
        );
        let (inst, _) = state.instantiate(&scheme);
        match inst {
            Type::Function(f) => {
                let param_name = match &f.params[0] {
                    Type::Var(tv) => tv.name.clone(),
                    other => panic!("expected var, got {:?}", other),
                };
                assert_ne!(param_name, "a", "quantified name must be freshened");
                match &f.constraints[0] {
                    Constraint::Implements { var, .. } => assert_eq!(*var, param_name),
                    other => panic!("expected Implements, got {:?}", other),
                }
            }
            other => panic!("expected function, got {:?}", other),
        }
    }

    #[test]
    fn freshen_type_variables_is_consistent() {
        let mut state = InferState::new();
        let ty = Type::func(vec![Type::var("x")], Type::var("x"));
        let mut mapping = FxHashMap::default();
        let fresh = state.freshen_type_variables(&ty, &mut mapping);
        match fresh {
            Type::Function(f) => assert_eq!(f.params[0], f.ret),
            other => panic!("expected function, got {:?}", other),
        }
    }

    #[test]
    fn adt_registry_round_trip() {
        let mut adts = AdtRegistry::new();
        let mut constructors = FxHashMap::default();
        constructors.insert("Just".to_string(), vec![Type::var("a")]);
        constructors.insert("Nothing".to_string(), vec![]);
        assert!(adts.register(AdtDef {
            name: "Maybe".into(),
            params: vec!["a".into()],
            constructors,
        }));

        let (adt, args) = adts.lookup_constructor("Just").unwrap();
        assert_eq!(adt.name, "Maybe");
        assert_eq!(args.len(), 1);
        assert!(adts.lookup_constructor("Missing").is_none());

        // Second registration under the same name is refused.
        assert!(!adts.register(AdtDef {
            name: "Maybe".into(),
            params: vec![],
            constructors: FxHashMap::default(),
        }));
    }
}
