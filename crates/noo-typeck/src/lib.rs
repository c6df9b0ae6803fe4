//! Noolang type checker: Hindley-Milner type inference with extensions.
//!
//! This crate implements type inference for the Noolang language. It
//! walks the AST produced by the parser, assigns types to all
//! expressions, and reports structured errors, supporting:
//!
//! - Hindley-Milner inference with let-polymorphism
//! - Unification with occurs check and record width-permissiveness
//! - Effect tracking (`!log` and friends) as a function-type annotation
//! - Algebraic data types with pattern matching
//! - Structural record constraints for field accessors
//! - A user-definable trait system with implementation dispatch
//!
//! # Architecture
//!
//! - [`ty`]: Core type representation (Type, Constraint, Scheme, effects)
//! - [`subst`]: Substitution with cycle guard and bounded memoization
//! - [`env`]: Type environment (name → scheme)
//! - [`state`]: The threaded inference state (environment, substitution,
//!   registries, fresh-variable counter)
//! - [`unify`]: Structural unification
//! - [`traits`]: Trait registry and dispatch
//! - [`resolve`]: Constraint discharge at application sites
//! - [`infer`]: The kind-dispatched inference engine
//! - [`builtins`]: Built-in environment and stdlib registration
//! - [`error`] / [`diagnostics`]: Error taxonomy and rendering

pub mod builtins;
pub mod diagnostics;
pub mod env;
pub mod error;
pub mod infer;
pub mod resolve;
pub mod state;
pub mod subst;
pub mod traits;
pub mod ty;
pub mod unify;

use noo_ast::Program;
use noo_common::Span;
use rustc_hash::FxHashMap;

use crate::infer::TypeMap;

pub use crate::error::TypeError;
pub use crate::state::InferState;
pub use crate::traits::TraitRegistry;
pub use crate::ty::{EffectSet, Scheme, Type};

// ── Imports ────────────────────────────────────────────────────────────

/// Pre-parsed modules supplied by the host, keyed by import path. The
/// core performs no file I/O: `import "path"` statements resolve through
/// this table and degrade to a fresh type variable when the path is
/// missing or the module fails to type.
#[derive(Clone, Debug, Default)]
pub struct ImportContext {
    modules: FxHashMap<String, Program>,
}

impl ImportContext {
    /// An empty context (single-file mode).
    pub fn empty() -> ImportContext {
        ImportContext::default()
    }

    pub fn insert(&mut self, path: impl Into<String>, program: Program) {
        self.modules.insert(path.into(), program);
    }

    pub fn get(&self, path: &str) -> Option<&Program> {
        self.modules.get(path)
    }

    /// A copy of the context without one path. The import inferrer
    /// recurses with this, so cyclic imports resolve as plain misses.
    pub fn without(&self, path: &str) -> ImportContext {
        let mut modules = self.modules.clone();
        modules.remove(path);
        ImportContext { modules }
    }
}

// ── Results ────────────────────────────────────────────────────────────

/// The result of typing a program: the final statement's type, the
/// accumulated effects, and the final state. The state carries the trait
/// and ADT registries the evaluator needs for runtime dispatch.
#[derive(Debug)]
pub struct Typecheck {
    pub ty: Type,
    pub effects: EffectSet,
    pub state: InferState,
}

/// A [`Typecheck`] plus the decoration map from expression spans to their
/// final substituted types.
#[derive(Debug)]
pub struct Decorated {
    pub ty: Type,
    pub effects: EffectSet,
    pub state: InferState,
    /// Expression span → final substituted type.
    pub types: FxHashMap<Span, Type>,
}

impl Decorated {
    /// The type of the innermost decorated expression containing the
    /// given byte offset — the LSP's hover query.
    pub fn type_at(&self, offset: u32) -> Option<&Type> {
        self.types
            .iter()
            .filter(|(span, _)| span.contains(offset))
            .min_by_key(|(span, _)| span.len())
            .map(|(_, ty)| ty)
    }
}

// ── Entry points ───────────────────────────────────────────────────────

/// Type-check a program: seed a fresh state with builtins and stdlib,
/// iterate the statements, and return the last statement's type plus
/// accumulated effects and the final state.
pub fn type_program(program: &Program) -> Result<Typecheck, TypeError> {
    type_program_with_imports(program, &ImportContext::empty())
}

/// Type-check a program with host-supplied modules for `import`.
pub fn type_program_with_imports(
    program: &Program,
    imports: &ImportContext,
) -> Result<Typecheck, TypeError> {
    let mut state = builtins::bootstrap_state();
    let mut types = TypeMap::default();
    let out = infer::infer_program(&mut state, program, imports, &mut types)?;
    Ok(Typecheck {
        ty: out.ty,
        effects: out.effects,
        state,
    })
}

/// Type-check a program and decorate every expression with its final
/// substituted type. An initial state may be supplied (REPL sessions
/// thread one through); otherwise a fresh bootstrapped state is used.
pub fn type_and_decorate(
    program: &Program,
    imports: &ImportContext,
    initial: Option<InferState>,
) -> Result<Decorated, TypeError> {
    let mut state = initial.unwrap_or_else(builtins::bootstrap_state);
    let mut types = TypeMap::default();
    let out = infer::infer_program(&mut state, program, imports, &mut types)?;
    // Re-apply the final substitution so early entries reflect everything
    // later statements learned.
    for ty in types.values_mut() {
        let resolved = state.subst.apply(ty);
        *ty = resolved;
    }
    Ok(Decorated {
        ty: out.ty,
        effects: out.effects,
        state,
        types,
    })
}
