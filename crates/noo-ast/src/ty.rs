//! Surface type annotations.
//!
//! These are the type expressions the parser produces for `expr : T`
//! annotations, ADT constructor arguments, and trait signatures. The type
//! checker resolves them into its internal representation (looking up ADT
//! names, aliases, and turning lowercase names into type variables).

/// A surface type expression.
#[derive(Clone, Debug, PartialEq)]
pub enum TypeExpr {
    /// A bare name: a primitive (`Float`), an ADT or alias name
    /// (`Maybe`), or a type variable (lowercase, e.g. `a`).
    Name(String),
    /// A type constructor application: `Maybe a`, `Result e a`.
    App(String, Vec<TypeExpr>),
    /// A function type: `a -> b -> c`, optionally with effect names
    /// after `!`, e.g. `String -> Unit !log`.
    Function {
        params: Vec<TypeExpr>,
        ret: Box<TypeExpr>,
        effects: Vec<String>,
    },
    /// `List a`.
    List(Box<TypeExpr>),
    /// `{Float, String}`.
    Tuple(Vec<TypeExpr>),
    /// `{@name String, @age Float}`.
    Record(Vec<(String, TypeExpr)>),
    /// `Float | String` — alias right-hand sides.
    Union(Vec<TypeExpr>),
    /// `Unit`.
    Unit,
}

/// A surface constraint annotation, attached to a type with `given`.
///
/// Compound forms are kept as the parser saw them; the type checker
/// flattens them into a plain list when attaching to a type.
#[derive(Clone, Debug, PartialEq)]
pub enum ConstraintExpr {
    /// `a implements Show`.
    Implements { var: String, trait_name: String },
    /// `a has field name of type T`.
    HasField {
        var: String,
        field: String,
        ty: TypeExpr,
    },
    /// A user-named predicate over types.
    Custom { name: String, args: Vec<TypeExpr> },
    And(Box<ConstraintExpr>, Box<ConstraintExpr>),
    Or(Box<ConstraintExpr>, Box<ConstraintExpr>),
    Paren(Box<ConstraintExpr>),
}
