//! Type environment: name → scheme.
//!
//! The environment is a flat map rather than a scope stack. Scoping is by
//! value: the inferencer extends a clone for lambda bodies and `where`
//! blocks, and the clone is culled down to the identifiers the body
//! actually references (see the closure handling in `infer`), so cloning
//! stays cheap even for large global environments.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::subst::Subst;
use crate::ty::Scheme;

/// A type environment mapping names to their schemes.
#[derive(Clone, Debug, Default)]
pub struct TypeEnv {
    bindings: FxHashMap<String, Scheme>,
}

impl TypeEnv {
    pub fn new() -> TypeEnv {
        TypeEnv::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, scheme: Scheme) {
        self.bindings.insert(name.into(), scheme);
    }

    pub fn lookup(&self, name: &str) -> Option<&Scheme> {
        self.bindings.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<Scheme> {
        self.bindings.remove(name)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Scheme)> {
        self.bindings.iter()
    }

    /// The free (non-quantified) variable names of the substituted
    /// environment. Generalization quantifies exactly the variables of a
    /// type that do NOT appear here.
    pub fn free_type_vars(&self, subst: &mut Subst) -> FxHashSet<String> {
        let mut free = FxHashSet::default();
        for scheme in self.bindings.values() {
            let applied = subst.apply(&scheme.ty);
            for var in applied.free_vars() {
                if !scheme.vars.contains(&var) {
                    free.insert(var);
                }
            }
        }
        free
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ty::{Scheme, Type};

    #[test]
    fn insert_and_lookup() {
        let mut env = TypeEnv::new();
        env.insert("x", Scheme::mono(Type::float()));
        assert!(env.lookup("x").is_some());
        assert!(env.lookup("y").is_none());
    }

    #[test]
    fn free_type_vars_skip_quantified() {
        let mut env = TypeEnv::new();
        // id : forall a. a -> a  -- a is quantified, not free.
        env.insert(
            "id",
            Scheme::poly(vec!["a"], Type::func(vec![Type::var("a")], Type::var("a"))),
        );
        // pending : b  -- b is free.
        env.insert("pending", Scheme::mono(Type::var("b")));

        let mut subst = Subst::new();
        let free = env.free_type_vars(&mut subst);
        assert!(!free.contains("a"));
        assert!(free.contains("b"));
    }

    #[test]
    fn free_type_vars_follow_substitution() {
        let mut env = TypeEnv::new();
        env.insert("x", Scheme::mono(Type::var("a")));

        let mut subst = Subst::new();
        subst.insert("a", Type::list(Type::var("c")));
        let free = env.free_type_vars(&mut subst);
        assert!(free.contains("c"));
        assert!(!free.contains("a"));
    }
}
