//! Type representation for the Noolang type system.
//!
//! Defines the core `Type` union, constraints, polymorphic schemes, and the
//! effect algebra. These form the foundation of Hindley-Milner inference
//! with Noolang's extensions: effect tracking, structural record
//! constraints, and trait constraints.

use std::collections::BTreeMap;
use std::fmt;

// ── Effects ────────────────────────────────────────────────────────────

/// A named observable side effect.
///
/// Effects attach to function types and are unioned by sequencing and
/// application. The set of effects is closed; each maps to one bit of an
/// [`EffectSet`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, serde::Serialize)]
#[repr(u8)]
pub enum Effect {
    Log = 0,
    Read = 1,
    Write = 2,
    State = 3,
    Time = 4,
    Rand = 5,
    Ffi = 6,
}

/// All known effects, in discriminant order.
pub const ALL_EFFECTS: &[Effect] = &[
    Effect::Log,
    Effect::Read,
    Effect::Write,
    Effect::State,
    Effect::Time,
    Effect::Rand,
    Effect::Ffi,
];

impl Effect {
    #[inline]
    fn bit(self) -> u16 {
        1u16 << (self as u8)
    }

    /// The effect's source-level name (what follows `!` in annotations).
    pub fn name(self) -> &'static str {
        match self {
            Effect::Log => "log",
            Effect::Read => "read",
            Effect::Write => "write",
            Effect::State => "state",
            Effect::Time => "time",
            Effect::Rand => "rand",
            Effect::Ffi => "ffi",
        }
    }

    /// Parse a source-level effect name.
    pub fn from_name(name: &str) -> Option<Effect> {
        ALL_EFFECTS.iter().copied().find(|e| e.name() == name)
    }
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A finite set of effects, stored as a bitmask.
#[derive(Copy, Clone, Default, PartialEq, Eq, Hash, serde::Serialize)]
pub struct EffectSet(u16);

impl EffectSet {
    /// The empty (pure) effect set.
    pub fn empty() -> EffectSet {
        EffectSet(0)
    }

    /// A singleton set.
    pub fn single(effect: Effect) -> EffectSet {
        EffectSet(effect.bit())
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn contains(&self, effect: Effect) -> bool {
        self.0 & effect.bit() != 0
    }

    pub fn insert(&mut self, effect: Effect) {
        self.0 |= effect.bit();
    }

    /// Set union. Effects never conflict, so this is the only way two
    /// effect sets combine.
    pub fn union(self, other: EffectSet) -> EffectSet {
        EffectSet(self.0 | other.0)
    }

    pub fn is_subset(&self, other: &EffectSet) -> bool {
        self.0 & !other.0 == 0
    }

    /// Iterate the effects present, in discriminant order.
    pub fn iter(&self) -> impl Iterator<Item = Effect> + '_ {
        ALL_EFFECTS.iter().copied().filter(|e| self.contains(*e))
    }
}

impl fmt::Debug for EffectSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, e) in self.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", e)?;
        }
        write!(f, "}}")
    }
}

impl fmt::Display for EffectSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for e in self.iter() {
            write!(f, " !{}", e)?;
        }
        Ok(())
    }
}

// ── Constraints ────────────────────────────────────────────────────────

/// A nested record-shape description used by `Has` constraints.
///
/// Field schemas are either a plain type or a nested structure, which is
/// how multi-level accessor compositions (`@outer (@inner x)`) describe the
/// whole field walk in one constraint. Fields are kept in a `BTreeMap` so
/// display and iteration order are deterministic.
#[derive(Clone, Debug, PartialEq)]
pub struct RecordStructure {
    pub fields: BTreeMap<String, FieldSchema>,
}

impl RecordStructure {
    pub fn new() -> RecordStructure {
        RecordStructure {
            fields: BTreeMap::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, schema: FieldSchema) -> RecordStructure {
        self.fields.insert(name.into(), schema);
        self
    }
}

impl Default for RecordStructure {
    fn default() -> Self {
        Self::new()
    }
}

/// The shape required of a single field inside a [`RecordStructure`].
#[derive(Clone, Debug, PartialEq)]
pub enum FieldSchema {
    /// The field must unify with this type.
    Type(Type),
    /// The field must itself be a record of this shape.
    Nested(RecordStructure),
}

/// An atomic constraint attached to a type variable or a function type.
#[derive(Clone, Debug, PartialEq)]
pub enum Constraint {
    /// The type bound to `var` must implement the named trait.
    Implements { var: String, trait_name: String },
    /// The type bound to `var` must be a record containing the structure's
    /// fields (width-permissive).
    Has {
        var: String,
        structure: RecordStructure,
    },
    /// Single-field specialization of `Has`.
    HasField {
        var: String,
        field: String,
        ty: Type,
    },
    /// Legacy named predicate. Retained only for the operator sugar seeded
    /// by the builtins; new surfaces emit `Implements`.
    Is { var: String, pred: String },
    /// A user-named constraint over a list of types.
    Custom { name: String, args: Vec<Type> },
}

impl Constraint {
    /// The type-variable name this constraint is keyed on, if any.
    pub fn var_name(&self) -> Option<&str> {
        match self {
            Constraint::Implements { var, .. }
            | Constraint::Has { var, .. }
            | Constraint::HasField { var, .. }
            | Constraint::Is { var, .. } => Some(var),
            Constraint::Custom { .. } => None,
        }
    }

    /// Re-key the constraint onto a different variable name.
    pub fn with_var(&self, new_var: &str) -> Constraint {
        let mut c = self.clone();
        match &mut c {
            Constraint::Implements { var, .. }
            | Constraint::Has { var, .. }
            | Constraint::HasField { var, .. }
            | Constraint::Is { var, .. } => *var = new_var.to_string(),
            Constraint::Custom { .. } => {}
        }
        c
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constraint::Implements { var, trait_name } => {
                write!(f, "{} implements {}", var, trait_name)
            }
            Constraint::Has { var, structure } => {
                write!(f, "{} has {}", var, display_structure(structure))
            }
            Constraint::HasField { var, field, ty } => {
                write!(f, "{} has field @{} {}", var, field, ty)
            }
            Constraint::Is { var, pred } => write!(f, "{} is {}", var, pred),
            Constraint::Custom { name, args } => {
                write!(f, "{}", name)?;
                for arg in args {
                    write!(f, " {}", arg)?;
                }
                Ok(())
            }
        }
    }
}

fn display_structure(structure: &RecordStructure) -> String {
    let mut out = String::from("{");
    for (i, (name, schema)) in structure.fields.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        match schema {
            FieldSchema::Type(ty) => out.push_str(&format!("@{} {}", name, ty)),
            FieldSchema::Nested(inner) => {
                out.push_str(&format!("@{} {}", name, display_structure(inner)))
            }
        }
    }
    out.push('}');
    out
}

/// Per-variable constraint table carried by `Type::Constrained`.
pub type ConstraintTable = BTreeMap<String, Vec<Constraint>>;

// ── Types ──────────────────────────────────────────────────────────────

/// The atomic primitive types.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum PrimType {
    Float,
    String,
    Bool,
}

impl PrimType {
    pub fn name(self) -> &'static str {
        match self {
            PrimType::Float => "Float",
            PrimType::String => "String",
            PrimType::Bool => "Bool",
        }
    }
}

/// Whether a constructor-position name is a variable rather than a
/// declared type. Declared ADTs and primitives are capitalized; type
/// variables (user-written or fresh) are lowercase, so `f` in `f a` is a
/// constructor variable while `Option` in `Option a` is not.
pub fn is_constructor_var(name: &str) -> bool {
    name.chars().next().is_some_and(|c| c.is_lowercase())
}

/// A named type variable with its attached constraints.
///
/// Constraints ride on the variable itself so record-shape requirements
/// propagate when two variables unify before either is bound.
#[derive(Clone, Debug, PartialEq)]
pub struct TypeVar {
    pub name: String,
    pub constraints: Vec<Constraint>,
}

impl TypeVar {
    pub fn new(name: impl Into<String>) -> TypeVar {
        TypeVar {
            name: name.into(),
            constraints: Vec::new(),
        }
    }
}

/// A function type: parameters, return, effects, and optional constraints.
///
/// Lambdas produce right-nested curried chains (each link carries one
/// parameter); built-in schemes may declare several parameters per link.
/// Application flattens the chain as needed.
#[derive(Clone, Debug, PartialEq)]
pub struct FunctionType {
    pub params: Vec<Type>,
    pub ret: Type,
    pub effects: EffectSet,
    pub constraints: Vec<Constraint>,
}

/// A Noolang type.
#[derive(Clone, Debug, PartialEq)]
pub enum Type {
    /// A primitive atomic type.
    Prim(PrimType),
    /// A type variable, possibly carrying constraints.
    Var(TypeVar),
    /// A function type.
    Function(Box<FunctionType>),
    /// A homogeneous list.
    List(Box<Type>),
    /// An ordered tuple.
    Tuple(Vec<Type>),
    /// A record: finite field map, width-permissive under unification.
    Record(BTreeMap<String, Type>),
    /// A named constructor application (`Option a`, `Result e a`), also
    /// used for nullary ADTs (`Bool`).
    Variant { name: String, args: Vec<Type> },
    /// Disjoint alternatives, produced by type aliases of the form `A | B`.
    Union(Vec<Type>),
    /// The zero-information type. Unifies with the empty tuple and the
    /// empty record.
    Unit,
    /// Placeholder for literal-inference failure. Unifies with anything.
    Unknown,
    /// A base type with a per-variable constraint table. Exists only as a
    /// surface annotation result and is lowered during application.
    Constrained {
        base: Box<Type>,
        table: ConstraintTable,
    },
}

impl Type {
    pub fn float() -> Type {
        Type::Prim(PrimType::Float)
    }

    pub fn string() -> Type {
        Type::Prim(PrimType::String)
    }

    pub fn bool() -> Type {
        Type::Prim(PrimType::Bool)
    }

    pub fn var(name: impl Into<String>) -> Type {
        Type::Var(TypeVar::new(name))
    }

    /// A pure, unconstrained function type.
    pub fn func(params: Vec<Type>, ret: Type) -> Type {
        Type::Function(Box::new(FunctionType {
            params,
            ret,
            effects: EffectSet::empty(),
            constraints: Vec::new(),
        }))
    }

    /// A function type with effects.
    pub fn func_eff(params: Vec<Type>, ret: Type, effects: EffectSet) -> Type {
        Type::Function(Box::new(FunctionType {
            params,
            ret,
            effects,
            constraints: Vec::new(),
        }))
    }

    /// A function type with constraints.
    pub fn func_where(params: Vec<Type>, ret: Type, constraints: Vec<Constraint>) -> Type {
        Type::Function(Box::new(FunctionType {
            params,
            ret,
            effects: EffectSet::empty(),
            constraints,
        }))
    }

    pub fn list(elem: Type) -> Type {
        Type::List(Box::new(elem))
    }

    pub fn record<S: Into<String>>(fields: Vec<(S, Type)>) -> Type {
        Type::Record(fields.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn variant(name: impl Into<String>, args: Vec<Type>) -> Type {
        Type::Variant {
            name: name.into(),
            args,
        }
    }

    pub fn option(inner: Type) -> Type {
        Type::variant("Option", vec![inner])
    }

    /// `Result a b` — `Ok` carries the first argument, `Err` the second.
    pub fn result(ok: Type, err: Type) -> Type {
        Type::variant("Result", vec![ok, err])
    }

    /// Whether this type is a bare variable.
    pub fn is_var(&self) -> bool {
        matches!(self, Type::Var(_))
    }

    /// Whether the type contains no variables anywhere (after
    /// substitution, such a type is "fully concrete").
    pub fn is_concrete(&self) -> bool {
        let mut vars = Vec::new();
        self.collect_vars(&mut vars);
        vars.is_empty()
    }

    /// Whether the named variable occurs anywhere in this type. This is
    /// the workhorse of the occurs check.
    pub fn mentions_var(&self, name: &str) -> bool {
        let mut vars = Vec::new();
        self.collect_vars(&mut vars);
        vars.iter().any(|v| v == name)
    }

    /// Append every variable name in this type, in order of first
    /// appearance (with duplicates).
    pub fn collect_vars(&self, out: &mut Vec<String>) {
        match self {
            Type::Prim(_) | Type::Unit | Type::Unknown => {}
            Type::Var(tv) => {
                out.push(tv.name.clone());
                for c in &tv.constraints {
                    collect_constraint_vars(c, out);
                }
            }
            Type::Function(f) => {
                for p in &f.params {
                    p.collect_vars(out);
                }
                f.ret.collect_vars(out);
                for c in &f.constraints {
                    collect_constraint_vars(c, out);
                }
            }
            Type::List(elem) => elem.collect_vars(out),
            Type::Tuple(items) => {
                for item in items {
                    item.collect_vars(out);
                }
            }
            Type::Record(fields) => {
                for ty in fields.values() {
                    ty.collect_vars(out);
                }
            }
            Type::Variant { name, args } => {
                if is_constructor_var(name) {
                    out.push(name.clone());
                }
                for arg in args {
                    arg.collect_vars(out);
                }
            }
            Type::Union(alts) => {
                for alt in alts {
                    alt.collect_vars(out);
                }
            }
            Type::Constrained { base, table } => {
                base.collect_vars(out);
                for constraints in table.values() {
                    for c in constraints {
                        collect_constraint_vars(c, out);
                    }
                }
            }
        }
    }

    /// The free variable names of this type, deduplicated, in order of
    /// first appearance.
    pub fn free_vars(&self) -> Vec<String> {
        let mut all = Vec::new();
        self.collect_vars(&mut all);
        let mut seen = std::collections::HashSet::new();
        all.retain(|v| seen.insert(v.clone()));
        all
    }

    /// The constructor name used for trait dispatch: primitives and
    /// variants report their own name, lists report `List`, records,
    /// tuples, and unit report their kind names. Variables, unions, and
    /// the rest have no dispatchable name.
    pub fn dispatch_name(&self) -> Option<String> {
        match self {
            Type::Prim(p) => Some(p.name().to_string()),
            Type::Variant { name, .. } if !is_constructor_var(name) => Some(name.clone()),
            Type::Variant { .. } => None,
            Type::List(_) => Some("List".to_string()),
            Type::Record(_) => Some("Record".to_string()),
            Type::Tuple(_) => Some("Tuple".to_string()),
            Type::Unit => Some("Unit".to_string()),
            Type::Function(_) => Some("Function".to_string()),
            Type::Constrained { base, .. } => base.dispatch_name(),
            Type::Var(_) | Type::Union(_) | Type::Unknown => None,
        }
    }
}

fn collect_constraint_vars(constraint: &Constraint, out: &mut Vec<String>) {
    match constraint {
        Constraint::Implements { var, .. } | Constraint::Is { var, .. } => {
            out.push(var.clone());
        }
        Constraint::Has { var, structure } => {
            out.push(var.clone());
            collect_structure_vars(structure, out);
        }
        Constraint::HasField { var, ty, .. } => {
            out.push(var.clone());
            ty.collect_vars(out);
        }
        Constraint::Custom { args, .. } => {
            for arg in args {
                arg.collect_vars(out);
            }
        }
    }
}

fn collect_structure_vars(structure: &RecordStructure, out: &mut Vec<String>) {
    for schema in structure.fields.values() {
        match schema {
            FieldSchema::Type(ty) => ty.collect_vars(out),
            FieldSchema::Nested(inner) => collect_structure_vars(inner, out),
        }
    }
}

// ── Display ────────────────────────────────────────────────────────────

/// Whether a type needs parentheses when it appears as an argument of a
/// type constructor or on the left of an arrow.
fn needs_parens(ty: &Type) -> bool {
    match ty {
        Type::Function(_) | Type::List(_) | Type::Union(_) => true,
        Type::Variant { args, .. } => !args.is_empty(),
        _ => false,
    }
}

fn fmt_atom(ty: &Type, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if needs_parens(ty) {
        write!(f, "({})", ty)
    } else {
        write!(f, "{}", ty)
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Prim(p) => write!(f, "{}", p.name()),
            Type::Var(tv) => write!(f, "{}", tv.name),
            Type::Function(func) => {
                // Curried chains print as one right-associative arrow
                // spine; constraints accumulate across the walked links.
                let mut current = func;
                let mut constraints: Vec<&Constraint> = Vec::new();
                loop {
                    constraints.extend(current.constraints.iter());
                    for p in &current.params {
                        fmt_atom(p, f)?;
                        write!(f, " -> ")?;
                    }
                    match &current.ret {
                        Type::Function(inner) if current.effects.is_empty() => {
                            current = inner;
                        }
                        _ => break,
                    }
                }
                fmt_atom(&current.ret, f)?;
                write!(f, "{}", current.effects)?;
                if !constraints.is_empty() {
                    write!(f, " given ")?;
                    for (i, c) in constraints.iter().enumerate() {
                        if i > 0 {
                            write!(f, ", ")?;
                        }
                        write!(f, "{}", c)?;
                    }
                }
                Ok(())
            }
            Type::List(elem) => {
                write!(f, "List ")?;
                fmt_atom(elem, f)
            }
            Type::Tuple(items) => {
                write!(f, "{{")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "}}")
            }
            Type::Record(fields) => {
                write!(f, "{{")?;
                for (i, (name, ty)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "@{} {}", name, ty)?;
                }
                write!(f, "}}")
            }
            Type::Variant { name, args } => {
                write!(f, "{}", name)?;
                for arg in args {
                    write!(f, " ")?;
                    fmt_atom(arg, f)?;
                }
                Ok(())
            }
            Type::Union(alts) => {
                for (i, alt) in alts.iter().enumerate() {
                    if i > 0 {
                        write!(f, " | ")?;
                    }
                    write!(f, "{}", alt)?;
                }
                Ok(())
            }
            Type::Unit => write!(f, "Unit"),
            Type::Unknown => write!(f, "Unknown"),
            Type::Constrained { base, table } => {
                write!(f, "{}", base)?;
                let mut first = true;
                for constraints in table.values() {
                    for c in constraints {
                        if first {
                            write!(f, " given ")?;
                            first = false;
                        } else {
                            write!(f, ", ")?;
                        }
                        write!(f, "{}", c)?;
                    }
                }
                Ok(())
            }
        }
    }
}

// ── Schemes ────────────────────────────────────────────────────────────

/// A polymorphic type scheme: a type together with the variable names it
/// universally quantifies and the effect set inferred for its body.
#[derive(Clone, Debug, PartialEq)]
pub struct Scheme {
    /// The quantified (generic) variable names.
    pub vars: Vec<String>,
    /// The underlying type (may reference the quantified names).
    pub ty: Type,
    /// Effects observed when the scheme's value was inferred.
    pub effects: EffectSet,
}

impl Scheme {
    /// Create a monomorphic scheme (no quantified variables, pure).
    pub fn mono(ty: Type) -> Scheme {
        Scheme {
            vars: Vec::new(),
            ty,
            effects: EffectSet::empty(),
        }
    }

    /// Create a scheme quantifying the given names.
    pub fn poly<S: Into<String>>(vars: Vec<S>, ty: Type) -> Scheme {
        Scheme {
            vars: vars.into_iter().map(Into::into).collect(),
            ty,
            effects: EffectSet::empty(),
        }
    }
}

// ── Tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn effect_set_union_and_subset() {
        let mut a = EffectSet::empty();
        a.insert(Effect::Log);
        let mut b = EffectSet::empty();
        b.insert(Effect::Write);

        let ab = a.union(b);
        assert!(ab.contains(Effect::Log));
        assert!(ab.contains(Effect::Write));
        assert!(a.is_subset(&ab));
        assert!(b.is_subset(&ab));
        assert!(!ab.is_subset(&a));
    }

    #[test]
    fn effect_roundtrip_names() {
        for e in ALL_EFFECTS {
            assert_eq!(Effect::from_name(e.name()), Some(*e));
        }
        assert_eq!(Effect::from_name("nope"), None);
    }

    #[test]
    fn collect_vars_in_function_constraints() {
        let ty = Type::func_where(
            vec![Type::var("a")],
            Type::var("b"),
            vec![Constraint::Implements {
                var: "a".into(),
                trait_name: "Add".into(),
            }],
        );
        let free = ty.free_vars();
        assert_eq!(free, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn mentions_var_nested() {
        let ty = Type::list(Type::record(vec![("x", Type::var("a"))]));
        assert!(ty.mentions_var("a"));
        assert!(!ty.mentions_var("b"));
    }

    #[test]
    fn dispatch_names() {
        assert_eq!(Type::float().dispatch_name().as_deref(), Some("Float"));
        assert_eq!(
            Type::list(Type::float()).dispatch_name().as_deref(),
            Some("List")
        );
        assert_eq!(
            Type::option(Type::float()).dispatch_name().as_deref(),
            Some("Option")
        );
        assert_eq!(
            Type::record(vec![("x", Type::float())])
                .dispatch_name()
                .as_deref(),
            Some("Record")
        );
        assert_eq!(Type::var("a").dispatch_name(), None);
    }

    #[test]
    fn display_forms() {
        insta::assert_snapshot!(Type::float().to_string(), @"Float");
        insta::assert_snapshot!(
            Type::func(vec![Type::float()], Type::string()).to_string(),
            @"Float -> String"
        );
        insta::assert_snapshot!(
            Type::func(
                vec![Type::func(vec![Type::var("a")], Type::var("b"))],
                Type::list(Type::var("b")),
            )
            .to_string(),
            @"(a -> b) -> (List b)"
        );
        insta::assert_snapshot!(Type::list(Type::float()).to_string(), @"List Float");
        insta::assert_snapshot!(
            Type::record(vec![("age", Type::float()), ("name", Type::string())]).to_string(),
            @"{@age Float, @name String}"
        );
        insta::assert_snapshot!(
            Type::Tuple(vec![Type::float(), Type::string()]).to_string(),
            @"{Float, String}"
        );
        insta::assert_snapshot!(Type::option(Type::var("a")).to_string(), @"Option a");
        insta::assert_snapshot!(Type::Unit.to_string(), @"Unit");
    }

    #[test]
    fn display_function_with_effects_and_constraints() {
        let ty = Type::Function(Box::new(FunctionType {
            params: vec![Type::string()],
            ret: Type::Unit,
            effects: EffectSet::single(Effect::Log),
            constraints: Vec::new(),
        }));
        insta::assert_snapshot!(ty.to_string(), @"String -> Unit !log");

        let constrained = Type::func_where(
            vec![Type::var("a"), Type::var("a")],
            Type::var("a"),
            vec![Constraint::Implements {
                var: "a".into(),
                trait_name: "Add".into(),
            }],
        );
        insta::assert_snapshot!(
            constrained.to_string(),
            @"a -> a -> a given a implements Add"
        );
    }
}
