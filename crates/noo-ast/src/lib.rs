//! Abstract syntax tree for the Noolang language.
//!
//! The parser lowers source text into the plain tagged unions defined here;
//! the type checker and the evaluator both consume them. Every node carries
//! a byte-offset [`Span`](noo_common::Span) into the original source.
//!
//! # Architecture
//!
//! - [`expr`]: Expressions, statements, match cases, and programs
//! - [`pat`]: Patterns for `match` cases
//! - [`ty`]: Surface type annotations and constraint annotations
//! - [`build`]: Span-free constructor helpers for hosts and tests

pub mod build;
pub mod expr;
pub mod pat;
pub mod ty;

pub use expr::{
    BinOp, Expr, ExprKind, ImplFunction, Literal, MatchCase, PipeDir, Program, VariantDef,
};
pub use pat::{Pattern, PatternKind};
pub use ty::{ConstraintExpr, TypeExpr};
