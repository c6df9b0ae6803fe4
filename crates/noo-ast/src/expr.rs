//! Expression nodes and programs.
//!
//! Noolang is expression-oriented: definitions, type declarations, trait
//! declarations, and imports are all expression kinds, and a program is a
//! sequence of semicolon-separated statements (each itself an expression).

use std::fmt;

use noo_common::Span;
use rustc_hash::FxHashSet;

use crate::pat::Pattern;
use crate::ty::{ConstraintExpr, TypeExpr};

/// A literal token as produced by the lexer.
#[derive(Clone, Debug, PartialEq)]
pub enum Literal {
    /// A numeric literal. Noolang has a single numeric type (`Float`).
    Number(f64),
    /// A string literal.
    String(String),
}

/// Binary operators, including the statement/pipeline sugar operators.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Lt,
    Gt,
    Le,
    Ge,
    Eq,
    Ne,
    /// `;` — statement sequencing. Right-associative in the parse tree.
    Seq,
    /// `|` — thrush: `x | f` applies `f` to `x`.
    Thrush,
    /// `$` — low-precedence application.
    Dollar,
    /// `|?` — safe thrush: monadic bind through `Option`/`Result`.
    SafeThrush,
}

impl BinOp {
    /// The operator's source symbol, as the lexer spells it.
    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Lt => "<",
            BinOp::Gt => ">",
            BinOp::Le => "<=",
            BinOp::Ge => ">=",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::Seq => ";",
            BinOp::Thrush => "|",
            BinOp::Dollar => "$",
            BinOp::SafeThrush => "|?",
        }
    }
}

impl fmt::Display for BinOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// Pipeline direction: `|>` composes left-to-right, `<|` right-to-left.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PipeDir {
    Forward,
    Backward,
}

/// One case of a `match` expression.
#[derive(Clone, Debug)]
pub struct MatchCase {
    pub pattern: Pattern,
    pub body: Expr,
}

/// One constructor of an ADT declaration, e.g. `Just a` in
/// `type Maybe a = Just a | Nothing`.
#[derive(Clone, Debug)]
pub struct VariantDef {
    pub name: String,
    pub args: Vec<TypeExpr>,
}

/// One function binding inside an `implement` block.
#[derive(Clone, Debug)]
pub struct ImplFunction {
    pub name: String,
    pub body: Expr,
}

/// An expression node: a kind plus its source span.
#[derive(Clone, Debug)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

/// All expression kinds the parser can produce.
#[derive(Clone, Debug)]
pub enum ExprKind {
    Literal(Literal),
    /// A variable reference.
    Var(String),
    /// `fn x y => body` — parameters curry right-to-left.
    Lambda { params: Vec<String>, body: Box<Expr> },
    /// Function application, possibly partial: `f a b`.
    App { func: Box<Expr>, args: Vec<Expr> },
    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    /// `f |> g |> h` or `h <| g <| f`. A pipeline node never mixes
    /// directions; the parser rejects mixed chains.
    Pipeline { dir: PipeDir, stages: Vec<Expr> },
    If {
        cond: Box<Expr>,
        then_branch: Box<Expr>,
        else_branch: Box<Expr>,
    },
    /// `name = value` — a top-level or sequenced definition.
    Definition { name: String, value: Box<Expr> },
    /// `mut name = value` — a mutable cell definition.
    MutDefinition { name: String, value: Box<Expr> },
    /// `name := value` — assignment into a mutable cell.
    Mutation { name: String, value: Box<Expr> },
    /// `{@name "Alice", @age 30}` — record literal.
    Record { fields: Vec<(String, Expr)> },
    /// `{1.0, "a"}` — tuple literal.
    Tuple { items: Vec<Expr> },
    /// `[1.0, 2.0]` — list literal.
    List { items: Vec<Expr> },
    /// `@name` — field accessor. `@name?` is the optional form, which
    /// tolerates absence and produces an `Option`.
    Accessor { field: String, optional: bool },
    /// `body where (x = e1, y = e2)`.
    Where {
        body: Box<Expr>,
        definitions: Vec<(String, Expr)>,
    },
    /// `expr : annotation`.
    Typed {
        expr: Box<Expr>,
        annotation: TypeExpr,
    },
    /// `expr : annotation given constraints`.
    Constrained {
        expr: Box<Expr>,
        annotation: TypeExpr,
        constraints: Vec<ConstraintExpr>,
    },
    Match {
        scrutinee: Box<Expr>,
        cases: Vec<MatchCase>,
    },
    /// `import "path"` — typed by the host-supplied module table.
    Import { path: String },
    /// `type Maybe a = Just a | Nothing`.
    TypeDefinition {
        name: String,
        params: Vec<String>,
        variants: Vec<VariantDef>,
    },
    /// `type Name = String` or `type Id = Float | String`.
    TypeAlias { name: String, aliased: TypeExpr },
    /// `constraint Show a ( show: a -> String )`.
    ConstraintDefinition {
        name: String,
        type_param: String,
        functions: Vec<(String, TypeExpr)>,
    },
    /// `implement Show Float ( show = toString )`, optionally with a
    /// `given` clause.
    ImplementDefinition {
        trait_name: String,
        target: TypeExpr,
        functions: Vec<ImplFunction>,
        given: Vec<ConstraintExpr>,
    },
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Expr { kind, span }
    }

    /// Collect the free identifiers of this expression: every `Var` name
    /// that is not bound by an enclosing lambda parameter, definition,
    /// `where` binding, or match pattern.
    ///
    /// The type checker uses this to build minimal closure environments
    /// instead of cloning the whole global scope per lambda.
    pub fn free_identifiers(&self) -> FxHashSet<String> {
        let mut free = FxHashSet::default();
        let mut bound = FxHashSet::default();
        collect_free(self, &mut bound, &mut free);
        free
    }
}

fn collect_free(expr: &Expr, bound: &mut FxHashSet<String>, free: &mut FxHashSet<String>) {
    match &expr.kind {
        ExprKind::Literal(_) | ExprKind::Accessor { .. } | ExprKind::Import { .. } => {}
        ExprKind::Var(name) => {
            if !bound.contains(name) {
                free.insert(name.clone());
            }
        }
        ExprKind::Lambda { params, body } => {
            let added: Vec<String> = params
                .iter()
                .filter(|p| bound.insert((*p).clone()))
                .cloned()
                .collect();
            collect_free(body, bound, free);
            for p in added {
                bound.remove(&p);
            }
        }
        ExprKind::App { func, args } => {
            collect_free(func, bound, free);
            for arg in args {
                collect_free(arg, bound, free);
            }
        }
        ExprKind::Binary { op: BinOp::Seq, lhs, rhs } => {
            // Definitions on the left of `;` are visible on the right.
            collect_free(lhs, bound, free);
            let added = statement_binding(lhs, bound);
            collect_free(rhs, bound, free);
            if let Some(name) = added {
                bound.remove(&name);
            }
        }
        ExprKind::Binary { lhs, rhs, .. } => {
            collect_free(lhs, bound, free);
            collect_free(rhs, bound, free);
        }
        ExprKind::Pipeline { stages, .. } => {
            for stage in stages {
                collect_free(stage, bound, free);
            }
        }
        ExprKind::If {
            cond,
            then_branch,
            else_branch,
        } => {
            collect_free(cond, bound, free);
            collect_free(then_branch, bound, free);
            collect_free(else_branch, bound, free);
        }
        ExprKind::Definition { name, value }
        | ExprKind::MutDefinition { name, value } => {
            // The name is in scope inside the value (recursion).
            let added = bound.insert(name.clone());
            collect_free(value, bound, free);
            if added {
                bound.remove(name);
            }
        }
        ExprKind::Mutation { name, value } => {
            if !bound.contains(name) {
                free.insert(name.clone());
            }
            collect_free(value, bound, free);
        }
        ExprKind::Record { fields } => {
            for (_, value) in fields {
                collect_free(value, bound, free);
            }
        }
        ExprKind::Tuple { items } | ExprKind::List { items } => {
            for item in items {
                collect_free(item, bound, free);
            }
        }
        ExprKind::Where { body, definitions } => {
            let mut added = Vec::new();
            for (name, _) in definitions {
                if bound.insert(name.clone()) {
                    added.push(name.clone());
                }
            }
            for (_, value) in definitions {
                collect_free(value, bound, free);
            }
            collect_free(body, bound, free);
            for name in added {
                bound.remove(&name);
            }
        }
        ExprKind::Typed { expr, .. } | ExprKind::Constrained { expr, .. } => {
            collect_free(expr, bound, free);
        }
        ExprKind::Match { scrutinee, cases } => {
            collect_free(scrutinee, bound, free);
            for case in cases {
                let mut names = Vec::new();
                case.pattern.binding_names(&mut names);
                let added: Vec<String> = names
                    .into_iter()
                    .filter(|n| bound.insert(n.clone()))
                    .collect();
                collect_free(&case.body, bound, free);
                for name in added {
                    bound.remove(&name);
                }
            }
        }
        ExprKind::TypeDefinition { .. }
        | ExprKind::TypeAlias { .. }
        | ExprKind::ConstraintDefinition { .. } => {}
        ExprKind::ImplementDefinition { functions, .. } => {
            for func in functions {
                collect_free(&func.body, bound, free);
            }
        }
    }
}

/// If `stmt` is a (possibly mutable) definition, bind its name and return it
/// when newly added.
fn statement_binding(stmt: &Expr, bound: &mut FxHashSet<String>) -> Option<String> {
    match &stmt.kind {
        ExprKind::Definition { name, .. } | ExprKind::MutDefinition { name, .. } => {
            if bound.insert(name.clone()) {
                Some(name.clone())
            } else {
                None
            }
        }
        _ => None,
    }
}

/// A parsed program: top-level statements in source order.
#[derive(Clone, Debug, Default)]
pub struct Program {
    pub statements: Vec<Expr>,
}

impl Program {
    pub fn new(statements: Vec<Expr>) -> Self {
        Program { statements }
    }
}
