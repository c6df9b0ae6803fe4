//! Type error types with provenance tracking.
//!
//! Every unification failure carries a [`UnifyContext`] recording where the
//! constraint came from, so diagnostics can say "argument 2 of `map`"
//! instead of just "expected Float, found String". Errors are fatal to the
//! statement being typed; the program loop stops at the first one.

use std::fmt;

use noo_common::Span;

use crate::ty::Type;

/// Where a unification constraint was generated.
#[derive(Clone, Debug)]
pub enum UnifyContext {
    /// An argument of a function application.
    FnArg { func: Option<String>, index: usize },
    /// An operand of a binary operator.
    Operator { op: String },
    /// The condition of an `if`.
    IfCondition,
    /// The two branches of an `if`.
    IfBranches,
    /// The bodies of `match` cases.
    MatchCases,
    /// A pattern against the scrutinee type.
    PatternMatch,
    /// Adjacent stages of a pipeline.
    Pipeline,
    /// An explicit type annotation.
    Annotation,
    /// A list element against the element type.
    ListElement { index: usize },
    /// A definition's placeholder against its inferred value type.
    Definition { name: String },
    /// Synthetic constraints from builtins and trait machinery.
    Builtin,
}

impl UnifyContext {
    /// A short hint sentence for diagnostics, or `None` when the context
    /// adds nothing over the message itself.
    pub fn hint(&self) -> Option<String> {
        match self {
            UnifyContext::FnArg { func, index } => Some(match func {
                Some(name) => format!("in argument {} of `{}`", index + 1, name),
                None => format!("in argument {} of this application", index + 1),
            }),
            UnifyContext::Operator { op } => {
                Some(format!("in the operands of `{}`", op))
            }
            UnifyContext::IfCondition => {
                Some("the condition of an `if` must be Bool".to_string())
            }
            UnifyContext::IfBranches => {
                Some("both branches of an `if` must have the same type".to_string())
            }
            UnifyContext::MatchCases => {
                Some("every case of a `match` must produce the same type".to_string())
            }
            UnifyContext::PatternMatch => {
                Some("this pattern does not fit the matched value".to_string())
            }
            UnifyContext::Pipeline => {
                Some("each stage must accept the previous stage's output".to_string())
            }
            UnifyContext::Annotation => {
                Some("the annotation and the inferred type disagree".to_string())
            }
            UnifyContext::ListElement { index } => {
                Some(format!("list element {} differs from the first element", index + 1))
            }
            UnifyContext::Definition { name } => {
                Some(format!("while typing the definition of `{}`", name))
            }
            UnifyContext::Builtin => None,
        }
    }
}

/// Which construct an arity mismatch was found in.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ArityContext {
    Function,
    Tuple,
    ConstructorPattern,
}

impl fmt::Display for ArityContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArityContext::Function => write!(f, "function"),
            ArityContext::Tuple => write!(f, "tuple"),
            ArityContext::ConstructorPattern => write!(f, "constructor pattern"),
        }
    }
}

/// A type error encountered during inference.
#[derive(Clone, Debug)]
pub enum TypeError {
    /// A variable is used but not defined in scope.
    UndefinedVariable { name: String, span: Span },
    /// A pattern names a constructor no ADT declares.
    UndefinedConstructor { name: String, span: Span },
    /// An annotation or implementation references an unknown type name.
    UndefinedTypeName { name: String, span: Span },
    /// An `implement` block names a trait that was never declared.
    UndefinedTrait { name: String, span: Span },
    /// Wrong number of arguments/elements for a function, tuple, or
    /// constructor pattern.
    ArityMismatch {
        expected: usize,
        found: usize,
        what: ArityContext,
        span: Span,
    },
    /// A value of the wrong kind: applying a non-function, projecting a
    /// non-record, and so on.
    KindMismatch {
        expected: &'static str,
        found: Type,
        span: Span,
    },
    /// Two types that should be equal are not.
    Mismatch {
        expected: Type,
        found: Type,
        span: Span,
        context: UnifyContext,
    },
    /// A type variable appears in its own binding (infinite type).
    OccursCheck { var: String, ty: Type, span: Span },
    /// A record lacks a field a structural constraint requires.
    MissingField {
        field: String,
        record: Type,
        span: Span,
    },
    /// A concrete type has no implementation of a required trait.
    TraitNotImplemented {
        trait_name: String,
        ty: Type,
        span: Span,
    },
    /// More than one trait implementation matches a function call.
    AmbiguousTraitFunction {
        function: String,
        candidates: Vec<String>,
        span: Span,
    },
    /// A second implementation for the same (trait, type) pair.
    DuplicateImplementation {
        trait_name: String,
        type_name: String,
        span: Span,
    },
    /// An implementation function's arity disagrees with the declared
    /// signature.
    ImplementationSignatureMismatch {
        trait_name: String,
        function: String,
        expected_params: usize,
        found_params: usize,
        span: Span,
    },
    /// An implementation provides a function the trait does not declare.
    ImplementationUnknownFunction {
        trait_name: String,
        function: String,
        span: Span,
    },
    /// A definition's name collides with a registered trait function.
    TraitFunctionShadowing {
        name: String,
        trait_name: String,
        span: Span,
    },
    /// An explicit annotation does not match the inferred type.
    AnnotationMismatch {
        annotated: Type,
        inferred: Type,
        span: Span,
    },
    /// `:=` on a name that is not a mutable definition.
    MutationTargetMissing { name: String, span: Span },
    /// `:=` with a value whose type differs from the cell's type.
    MutationTypeMismatch {
        name: String,
        expected: Type,
        found: Type,
        span: Span,
    },
    /// A type definition shadows a protected (stdlib) type name.
    TypeShadowing { name: String, span: Span },
    /// A second type definition with the same name.
    DuplicateTypeDefinition { name: String, span: Span },
}

impl TypeError {
    /// The primary source span of the error.
    pub fn span(&self) -> Span {
        match self {
            TypeError::UndefinedVariable { span, .. }
            | TypeError::UndefinedConstructor { span, .. }
            | TypeError::UndefinedTypeName { span, .. }
            | TypeError::UndefinedTrait { span, .. }
            | TypeError::ArityMismatch { span, .. }
            | TypeError::KindMismatch { span, .. }
            | TypeError::Mismatch { span, .. }
            | TypeError::OccursCheck { span, .. }
            | TypeError::MissingField { span, .. }
            | TypeError::TraitNotImplemented { span, .. }
            | TypeError::AmbiguousTraitFunction { span, .. }
            | TypeError::DuplicateImplementation { span, .. }
            | TypeError::ImplementationSignatureMismatch { span, .. }
            | TypeError::ImplementationUnknownFunction { span, .. }
            | TypeError::TraitFunctionShadowing { span, .. }
            | TypeError::AnnotationMismatch { span, .. }
            | TypeError::MutationTargetMissing { span, .. }
            | TypeError::MutationTypeMismatch { span, .. }
            | TypeError::TypeShadowing { span, .. }
            | TypeError::DuplicateTypeDefinition { span, .. } => *span,
        }
    }

    /// A hint sentence for diagnostics, when one exists.
    pub fn hint(&self) -> Option<String> {
        match self {
            TypeError::Mismatch { context, .. } => context.hint(),
            TypeError::TraitNotImplemented { trait_name, ty, .. } => Some(format!(
                "add `implement {} {}` or use a type that has one",
                trait_name,
                ty
            )),
            TypeError::AmbiguousTraitFunction { candidates, .. } => Some(format!(
                "qualify the call; candidate traits are [{}]",
                candidates.join(", ")
            )),
            TypeError::TraitFunctionShadowing { trait_name, .. } => Some(format!(
                "the name is reserved by trait `{}`",
                trait_name
            )),
            _ => None,
        }
    }
}

impl fmt::Display for TypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeError::UndefinedVariable { name, .. } => {
                write!(f, "undefined variable `{}`", name)
            }
            TypeError::UndefinedConstructor { name, .. } => {
                write!(f, "undefined constructor `{}`", name)
            }
            TypeError::UndefinedTypeName { name, .. } => {
                write!(f, "undefined type `{}`", name)
            }
            TypeError::UndefinedTrait { name, .. } => {
                write!(f, "undefined trait `{}`", name)
            }
            TypeError::ArityMismatch {
                expected,
                found,
                what,
                ..
            } => write!(
                f,
                "{} arity mismatch: expected {}, found {}",
                what, expected, found
            ),
            TypeError::KindMismatch {
                expected, found, ..
            } => write!(f, "expected a {}, found `{}`", expected, found),
            TypeError::Mismatch {
                expected, found, ..
            } => write!(
                f,
                "type mismatch: expected `{}`, found `{}`",
                expected, found
            ),
            TypeError::OccursCheck { var, ty, .. } => {
                write!(f, "infinite type: `{}` occurs in `{}`", var, ty)
            }
            TypeError::MissingField { field, record, .. } => {
                write!(f, "missing field `{}` in `{}`", field, record)
            }
            TypeError::TraitNotImplemented {
                trait_name, ty, ..
            } => write!(
                f,
                "no implementation of `{}` for `{}`",
                trait_name, ty
            ),
            TypeError::AmbiguousTraitFunction {
                function,
                candidates,
                ..
            } => write!(
                f,
                "ambiguous trait function `{}`: implementations found in [{}]",
                function,
                candidates.join(", ")
            ),
            TypeError::DuplicateImplementation {
                trait_name,
                type_name,
                ..
            } => write!(
                f,
                "duplicate implementation of `{}` for `{}`",
                trait_name, type_name
            ),
            TypeError::ImplementationSignatureMismatch {
                trait_name,
                function,
                expected_params,
                found_params,
                ..
            } => write!(
                f,
                "implementation of `{}` in `{}` takes {} parameters, the signature declares {}",
                function, trait_name, found_params, expected_params
            ),
            TypeError::ImplementationUnknownFunction {
                trait_name,
                function,
                ..
            } => write!(
                f,
                "`{}` is not a function of trait `{}`",
                function, trait_name
            ),
            TypeError::TraitFunctionShadowing { name, trait_name, .. } => write!(
                f,
                "cannot define `{}`: it is a function of trait `{}`",
                name, trait_name
            ),
            TypeError::AnnotationMismatch {
                annotated,
                inferred,
                ..
            } => write!(
                f,
                "annotation mismatch: annotated `{}`, inferred `{}`",
                annotated, inferred
            ),
            TypeError::MutationTargetMissing { name, .. } => {
                write!(f, "cannot mutate `{}`: no mutable definition in scope", name)
            }
            TypeError::MutationTypeMismatch {
                name,
                expected,
                found,
                ..
            } => write!(
                f,
                "cannot assign `{}` to `{}`: the cell holds `{}`",
                found, name, expected
            ),
            TypeError::TypeShadowing { name, .. } => {
                write!(f, "type `{}` shadows a protected type", name)
            }
            TypeError::DuplicateTypeDefinition { name, .. } => {
                write!(f, "type `{}` is already defined", name)
            }
        }
    }
}

impl std::error::Error for TypeError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_terse() {
        let err = TypeError::Mismatch {
            expected: Type::float(),
            found: Type::string(),
            span: Span::new(0, 1),
            context: UnifyContext::Builtin,
        };
        assert_eq!(
            err.to_string(),
            "type mismatch: expected `Float`, found `String`"
        );
    }

    #[test]
    fn operator_context_produces_hint() {
        let err = TypeError::Mismatch {
            expected: Type::float(),
            found: Type::string(),
            span: Span::new(0, 1),
            context: UnifyContext::Operator { op: "+".into() },
        };
        assert_eq!(err.hint().as_deref(), Some("in the operands of `+`"));
    }
}
