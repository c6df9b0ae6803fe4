//! Substitution: variable-name → type bindings.
//!
//! The substitution only ever grows during inference; `apply` chases
//! bindings transitively, so the stored images never need rewriting. A
//! per-call visited set breaks chains that would revisit a variable (the
//! occurs check keeps such chains out of the map, but a walk must never
//! hang on one), and a small bounded cache memoizes the bare-variable fast
//! path that dominates real workloads.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::ty::{Constraint, FieldSchema, FunctionType, RecordStructure, Type};

/// Maximum number of memoized bare-variable lookups. The cache is dropped
/// wholesale when full; entries are invalidated by fingerprint, not by
/// eviction.
const SUBST_CACHE_CAP: usize = 1000;

/// A substitution from type-variable names to types.
#[derive(Clone, Debug, Default)]
pub struct Subst {
    map: FxHashMap<String, Type>,
    /// Monotone insert counter. The map only grows, so this uniquely
    /// fingerprints its contents and keys the cache.
    fingerprint: u64,
    cache: FxHashMap<(String, u64), Type>,
}

impl Subst {
    pub fn new() -> Subst {
        Subst::default()
    }

    pub fn get(&self, var: &str) -> Option<&Type> {
        self.map.get(var)
    }

    pub fn contains(&self, var: &str) -> bool {
        self.map.contains_key(var)
    }

    pub fn insert(&mut self, var: impl Into<String>, ty: Type) {
        self.map.insert(var.into(), ty);
        self.fingerprint += 1;
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Type)> {
        self.map.iter()
    }

    /// Apply the substitution to a type, chasing variable images
    /// transitively. The result contains no variable that the map binds
    /// (idempotence: `apply(apply(t)) == apply(t)`).
    pub fn apply(&mut self, ty: &Type) -> Type {
        // Bare-variable fast path with memoization.
        if let Type::Var(tv) = ty {
            if tv.constraints.is_empty() {
                let key = (tv.name.clone(), self.fingerprint);
                if let Some(hit) = self.cache.get(&key) {
                    return hit.clone();
                }
                let mut visited = FxHashSet::default();
                let result = self.apply_inner(ty, &mut visited);
                if self.cache.len() >= SUBST_CACHE_CAP {
                    self.cache.clear();
                }
                self.cache.insert(key, result.clone());
                return result;
            }
        }
        let mut visited = FxHashSet::default();
        self.apply_inner(ty, &mut visited)
    }

    fn apply_inner(&self, ty: &Type, visited: &mut FxHashSet<String>) -> Type {
        match ty {
            Type::Prim(_) | Type::Unit | Type::Unknown => ty.clone(),
            Type::Var(tv) => {
                if let Some(image) = self.map.get(&tv.name) {
                    if visited.insert(tv.name.clone()) {
                        let result = self.apply_inner(image, visited);
                        visited.remove(&tv.name);
                        return result;
                    }
                    // Revisit: a cycle slipped past the occurs check.
                    // Stop chasing rather than loop.
                    return Type::Var(tv.clone());
                }
                // Unbound: keep the variable, but substitute inside its
                // attached constraints.
                Type::Var(crate::ty::TypeVar {
                    name: tv.name.clone(),
                    constraints: tv
                        .constraints
                        .iter()
                        .map(|c| self.apply_constraint_inner(c, visited))
                        .collect(),
                })
            }
            Type::Function(f) => Type::Function(Box::new(FunctionType {
                params: f
                    .params
                    .iter()
                    .map(|p| self.apply_inner(p, visited))
                    .collect(),
                ret: self.apply_inner(&f.ret, visited),
                effects: f.effects,
                constraints: f
                    .constraints
                    .iter()
                    .map(|c| self.apply_constraint_inner(c, visited))
                    .collect(),
            })),
            Type::List(elem) => Type::List(Box::new(self.apply_inner(elem, visited))),
            Type::Tuple(items) => Type::Tuple(
                items
                    .iter()
                    .map(|item| self.apply_inner(item, visited))
                    .collect(),
            ),
            Type::Record(fields) => Type::Record(
                fields
                    .iter()
                    .map(|(name, ty)| (name.clone(), self.apply_inner(ty, visited)))
                    .collect(),
            ),
            Type::Variant { name, args } => {
                let args: Vec<Type> = args
                    .iter()
                    .map(|arg| self.apply_inner(arg, visited))
                    .collect();
                // A lowercase head is a constructor variable; its binding
                // names the constructor the application collapses into.
                if crate::ty::is_constructor_var(name) {
                    if let Some(image) = self.map.get(name) {
                        if visited.insert(name.clone()) {
                            let head = self.apply_inner(image, visited);
                            visited.remove(name);
                            match head {
                                Type::Variant {
                                    name: con,
                                    args: head_args,
                                } if head_args.is_empty() => {
                                    return Type::Variant { name: con, args };
                                }
                                Type::Var(tv) => {
                                    return Type::Variant {
                                        name: tv.name,
                                        args,
                                    };
                                }
                                _ => {}
                            }
                        }
                    }
                }
                Type::Variant {
                    name: name.clone(),
                    args,
                }
            }
            Type::Union(alts) => Type::Union(
                alts.iter()
                    .map(|alt| self.apply_inner(alt, visited))
                    .collect(),
            ),
            Type::Constrained { base, table } => Type::Constrained {
                base: Box::new(self.apply_inner(base, visited)),
                // Table keys are variable names chosen at annotation time;
                // they stay as written. Only the types inside move.
                table: table
                    .iter()
                    .map(|(var, constraints)| {
                        (
                            var.clone(),
                            constraints
                                .iter()
                                .map(|c| self.apply_constraint_inner(c, visited))
                                .collect(),
                        )
                    })
                    .collect(),
            },
        }
    }

    /// Apply the substitution to the field-types inside a constraint. The
    /// constraint's own variable key is left alone; re-keying is
    /// unification's job.
    pub fn apply_constraint(&mut self, constraint: &Constraint) -> Constraint {
        let mut visited = FxHashSet::default();
        self.apply_constraint_inner(constraint, &mut visited)
    }

    fn apply_constraint_inner(
        &self,
        constraint: &Constraint,
        visited: &mut FxHashSet<String>,
    ) -> Constraint {
        match constraint {
            Constraint::Implements { .. } | Constraint::Is { .. } => constraint.clone(),
            Constraint::Has { var, structure } => Constraint::Has {
                var: var.clone(),
                structure: self.apply_structure_inner(structure, visited),
            },
            Constraint::HasField { var, field, ty } => Constraint::HasField {
                var: var.clone(),
                field: field.clone(),
                ty: self.apply_inner(ty, visited),
            },
            Constraint::Custom { name, args } => Constraint::Custom {
                name: name.clone(),
                args: args
                    .iter()
                    .map(|arg| self.apply_inner(arg, visited))
                    .collect(),
            },
        }
    }

    fn apply_structure_inner(
        &self,
        structure: &RecordStructure,
        visited: &mut FxHashSet<String>,
    ) -> RecordStructure {
        RecordStructure {
            fields: structure
                .fields
                .iter()
                .map(|(name, schema)| {
                    let schema = match schema {
                        FieldSchema::Type(ty) => {
                            FieldSchema::Type(self.apply_inner(ty, visited))
                        }
                        FieldSchema::Nested(inner) => {
                            FieldSchema::Nested(self.apply_structure_inner(inner, visited))
                        }
                    };
                    (name.clone(), schema)
                })
                .collect(),
        }
    }

    /// `self ∘ other`: apply `other` first, then `self`.
    pub fn compose(&mut self, other: &Subst) -> Subst {
        let mut out = Subst::new();
        for (var, ty) in other.map.iter() {
            out.insert(var.clone(), self.apply(ty));
        }
        for (var, ty) in self.map.iter() {
            if !other.map.contains_key(var) {
                out.insert(var.clone(), ty.clone());
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ty::Constraint;

    #[test]
    fn apply_unbound_var_is_identity() {
        let mut subst = Subst::new();
        let a = Type::var("a");
        assert_eq!(subst.apply(&a), a);
    }

    #[test]
    fn apply_chases_transitively() {
        let mut subst = Subst::new();
        subst.insert("a", Type::var("b"));
        subst.insert("b", Type::float());

        assert_eq!(subst.apply(&Type::var("a")), Type::float());
        // Inside structure too.
        let listy = Type::list(Type::var("a"));
        assert_eq!(subst.apply(&listy), Type::list(Type::float()));
    }

    #[test]
    fn apply_is_idempotent() {
        let mut subst = Subst::new();
        subst.insert("a", Type::var("b"));
        subst.insert("b", Type::list(Type::var("c")));

        let ty = Type::func(vec![Type::var("a")], Type::var("b"));
        let once = subst.apply(&ty);
        let twice = subst.apply(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn apply_breaks_cycles() {
        // A cycle can only appear if the occurs check is bypassed; apply
        // must still terminate.
        let mut subst = Subst::new();
        subst.insert("a", Type::var("b"));
        subst.insert("b", Type::var("a"));

        let result = subst.apply(&Type::var("a"));
        assert!(result.is_var());
    }

    #[test]
    fn apply_rewrites_constraint_field_types() {
        let mut subst = Subst::new();
        subst.insert("f", Type::float());

        let ty = Type::func_where(
            vec![Type::var("r")],
            Type::var("f"),
            vec![Constraint::HasField {
                var: "r".into(),
                field: "age".into(),
                ty: Type::var("f"),
            }],
        );
        let applied = subst.apply(&ty);
        match applied {
            Type::Function(func) => {
                assert_eq!(func.ret, Type::float());
                match &func.constraints[0] {
                    Constraint::HasField { ty, .. } => assert_eq!(*ty, Type::float()),
                    other => panic!("expected HasField, got {:?}", other),
                }
            }
            other => panic!("expected function, got {:?}", other),
        }
    }

    #[test]
    fn cache_respects_new_insertions() {
        let mut subst = Subst::new();
        subst.insert("a", Type::var("b"));
        // First apply caches a -> b.
        assert_eq!(subst.apply(&Type::var("a")), Type::var("b"));
        // New binding must invalidate the cached answer.
        subst.insert("b", Type::string());
        assert_eq!(subst.apply(&Type::var("a")), Type::string());
    }

    #[test]
    fn compose_applies_left_to_right_images() {
        let mut first = Subst::new();
        first.insert("a", Type::var("b"));
        let mut second = Subst::new();
        second.insert("b", Type::float());

        let mut composed = second.compose(&first);
        assert_eq!(composed.apply(&Type::var("a")), Type::float());
        assert_eq!(composed.apply(&Type::var("b")), Type::float());
    }
}
