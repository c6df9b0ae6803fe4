//! Patterns for `match` expressions.

use noo_common::Span;

use crate::expr::Literal;

/// A pattern node: a kind plus its source span.
#[derive(Clone, Debug)]
pub struct Pattern {
    pub kind: PatternKind,
    pub span: Span,
}

/// All pattern kinds.
#[derive(Clone, Debug)]
pub enum PatternKind {
    /// `_` — matches anything, binds nothing.
    Wildcard,
    /// `x` — matches anything, binds the name.
    Var(String),
    /// `1.0` or `"a"`.
    Literal(Literal),
    /// `Just x` — an ADT constructor with argument patterns.
    Constructor { name: String, args: Vec<Pattern> },
    /// `{a, b}` — element-wise tuple match.
    Tuple(Vec<Pattern>),
    /// `{@name n, @age a}` — width-permissive record match.
    Record(Vec<(String, Pattern)>),
}

impl Pattern {
    pub fn new(kind: PatternKind, span: Span) -> Self {
        Pattern { kind, span }
    }

    /// Append every name this pattern binds, in left-to-right order.
    pub fn binding_names(&self, out: &mut Vec<String>) {
        match &self.kind {
            PatternKind::Wildcard | PatternKind::Literal(_) => {}
            PatternKind::Var(name) => out.push(name.clone()),
            PatternKind::Constructor { args, .. } => {
                for arg in args {
                    arg.binding_names(out);
                }
            }
            PatternKind::Tuple(items) => {
                for item in items {
                    item.binding_names(out);
                }
            }
            PatternKind::Record(fields) => {
                for (_, pat) in fields {
                    pat.binding_names(out);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::build::*;

    #[test]
    fn binding_names_nested() {
        let pat = con_pat(
            "Pair",
            vec![var_pat("a"), tuple_pat(vec![var_pat("b"), wild_pat()])],
        );
        let mut names = Vec::new();
        pat.binding_names(&mut names);
        assert_eq!(names, vec!["a".to_string(), "b".to_string()]);
    }
}
