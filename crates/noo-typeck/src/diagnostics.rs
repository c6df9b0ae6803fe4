//! Ariadne-based diagnostic rendering for type errors.
//!
//! Renders `TypeError` variants into formatted, labeled reports, and
//! lowers them into a serializable [`Diagnostic`] for the LSP bridge.
//! Output is terse; a fix hint is attached when the error carries one.

use std::ops::Range;

use ariadne::{Color, Config, Label, Report, ReportKind, Source};
use serde::Serialize;

use noo_common::Span;

use crate::error::TypeError;

// ── Error codes ────────────────────────────────────────────────────────

/// Assign a stable error code to each `TypeError` variant.
pub fn error_code(err: &TypeError) -> &'static str {
    match err {
        TypeError::Mismatch { .. } => "E0001",
        TypeError::OccursCheck { .. } => "E0002",
        TypeError::ArityMismatch { .. } => "E0003",
        TypeError::UndefinedVariable { .. } => "E0004",
        TypeError::KindMismatch { .. } => "E0005",
        TypeError::UndefinedConstructor { .. } => "E0006",
        TypeError::UndefinedTypeName { .. } => "E0007",
        TypeError::UndefinedTrait { .. } => "E0008",
        TypeError::MissingField { .. } => "E0009",
        TypeError::TraitNotImplemented { .. } => "E0010",
        TypeError::AmbiguousTraitFunction { .. } => "E0011",
        TypeError::DuplicateImplementation { .. } => "E0012",
        TypeError::ImplementationSignatureMismatch { .. } => "E0013",
        TypeError::ImplementationUnknownFunction { .. } => "E0014",
        TypeError::TraitFunctionShadowing { .. } => "E0015",
        TypeError::AnnotationMismatch { .. } => "E0016",
        TypeError::MutationTargetMissing { .. } => "E0017",
        TypeError::MutationTypeMismatch { .. } => "E0018",
        TypeError::TypeShadowing { .. } => "E0019",
        TypeError::DuplicateTypeDefinition { .. } => "E0020",
    }
}

/// A short machine-readable name for each variant.
pub fn error_kind(err: &TypeError) -> &'static str {
    match err {
        TypeError::Mismatch { .. } => "unification-failure",
        TypeError::OccursCheck { .. } => "occurs-check",
        TypeError::ArityMismatch { .. } => "arity-mismatch",
        TypeError::UndefinedVariable { .. } => "undefined-variable",
        TypeError::KindMismatch { .. } => "kind-mismatch",
        TypeError::UndefinedConstructor { .. } => "undefined-constructor",
        TypeError::UndefinedTypeName { .. } => "undefined-type",
        TypeError::UndefinedTrait { .. } => "undefined-trait",
        TypeError::MissingField { .. } => "missing-field",
        TypeError::TraitNotImplemented { .. } => "missing-trait-implementation",
        TypeError::AmbiguousTraitFunction { .. } => "ambiguous-trait-dispatch",
        TypeError::DuplicateImplementation { .. } => "duplicate-trait-implementation",
        TypeError::ImplementationSignatureMismatch { .. } => "implementation-signature-mismatch",
        TypeError::ImplementationUnknownFunction { .. } => "implementation-unknown-function",
        TypeError::TraitFunctionShadowing { .. } => "trait-function-shadowing",
        TypeError::AnnotationMismatch { .. } => "annotation-mismatch",
        TypeError::MutationTargetMissing { .. } => "mutation-target-missing",
        TypeError::MutationTypeMismatch { .. } => "mutation-type-mismatch",
        TypeError::TypeShadowing { .. } => "type-shadowing",
        TypeError::DuplicateTypeDefinition { .. } => "duplicate-type-definition",
    }
}

// ── Structured form ────────────────────────────────────────────────────

/// The structured shape every failure path produces: a kind, a location,
/// a message, and an optional hint. The CLI serializes the message with
/// the `TypeError:` prefix the LSP's scraper recognizes.
#[derive(Clone, Debug, Serialize)]
pub struct Diagnostic {
    pub code: &'static str,
    pub kind: &'static str,
    pub span: Span,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl Diagnostic {
    pub fn from_error(err: &TypeError) -> Diagnostic {
        Diagnostic {
            code: error_code(err),
            kind: error_kind(err),
            span: err.span(),
            message: err.to_string(),
            hint: err.hint(),
        }
    }

    /// The CLI's one-line form, prefixed for regex-based scraping.
    pub fn cli_message(&self) -> String {
        format!("TypeError: {}", self.message)
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).expect("diagnostics serialize without fallible fields")
    }
}

// ── Rendering ──────────────────────────────────────────────────────────

/// Options controlling diagnostic rendering.
#[derive(Clone, Debug)]
pub struct DiagnosticOptions {
    pub color: bool,
}

impl DiagnosticOptions {
    /// Colorless output, for tests and non-tty consumers.
    pub fn colorless() -> DiagnosticOptions {
        DiagnosticOptions { color: false }
    }
}

impl Default for DiagnosticOptions {
    fn default() -> Self {
        DiagnosticOptions { color: true }
    }
}

/// Render a type error into a formatted diagnostic string using ariadne.
pub fn render_diagnostic(
    error: &TypeError,
    source: &str,
    _filename: &str,
    options: &DiagnosticOptions,
) -> String {
    let config = Config::default().with_color(options.color);
    let source_len = source.len();

    // Clamp the span to the source bounds; ariadne needs a non-empty
    // range inside the text.
    let clamp = |span: Span| -> Range<usize> {
        let s = (span.start as usize).min(source_len);
        let e = (span.end as usize).min(source_len).max(s);
        if s == e {
            s..e.saturating_add(1).min(source_len)
        } else {
            s..e
        }
    };

    let range = clamp(error.span());
    let mut builder = Report::build(ReportKind::Error, range.clone())
        .with_code(error_code(error))
        .with_message(error.to_string())
        .with_config(config);

    builder.add_label(
        Label::new(range)
            .with_message(label_message(error))
            .with_color(Color::Red),
    );
    if let Some(hint) = error.hint() {
        builder.set_help(hint);
    }

    let report = builder.finish();
    let mut buf = Vec::new();
    report
        .write(Source::from(source), &mut buf)
        .expect("failed to write diagnostic");
    String::from_utf8(buf).expect("diagnostic output should be valid UTF-8")
}

/// The primary label text under the offending span.
fn label_message(error: &TypeError) -> String {
    match error {
        TypeError::Mismatch {
            expected, found, ..
        } => format!("expected `{}`, found `{}`", expected, found),
        TypeError::OccursCheck { .. } => "recursive type here".to_string(),
        TypeError::UndefinedVariable { .. } => "not found in this scope".to_string(),
        TypeError::UndefinedConstructor { .. } => "no ADT declares this constructor".to_string(),
        TypeError::KindMismatch { expected, .. } => format!("expected a {} here", expected),
        TypeError::MissingField { field, .. } => format!("no field `{}`", field),
        TypeError::TraitNotImplemented { trait_name, .. } => {
            format!("`{}` is not implemented here", trait_name)
        }
        TypeError::AnnotationMismatch { .. } => "annotation disagrees here".to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::UnifyContext;
    use crate::ty::Type;

    fn mismatch() -> TypeError {
        TypeError::Mismatch {
            expected: Type::float(),
            found: Type::string(),
            span: Span::new(0, 7),
            context: UnifyContext::Annotation,
        }
    }

    #[test]
    fn diagnostic_carries_code_kind_and_hint() {
        let diag = Diagnostic::from_error(&mismatch());
        assert_eq!(diag.code, "E0001");
        assert_eq!(diag.kind, "unification-failure");
        assert!(diag.hint.is_some());
        assert_eq!(
            diag.cli_message(),
            "TypeError: type mismatch: expected `Float`, found `String`"
        );
    }

    #[test]
    fn diagnostic_serializes_to_json() {
        let json = Diagnostic::from_error(&mismatch()).to_json();
        assert!(json.contains("\"code\":\"E0001\""));
        assert!(json.contains("\"span\""));
        assert!(json.contains("Float"));
    }

    #[test]
    fn rendered_report_contains_code_and_message() {
        let out = render_diagnostic(
            &mismatch(),
            "\"hello\"",
            "test.noo",
            &DiagnosticOptions::colorless(),
        );
        assert!(out.contains("E0001"));
        assert!(out.contains("expected `Float`, found `String`"));
    }
}
