//! Generator error type.

use span::Span;

#[derive(Clone, Debug, thiserror::Error)]
pub enum Error {
  #[error("undefined name `{name}`")]
  Undefined { name: String, span: Span },

  #[error("redefinition of `{name}`")]
  Redefinition { name: String, span: Span },

  #[error("duplicate path `{name}`")]
  DuplicatePath { name: String, span: Span },

  /// Unsupported-but-recognized constructs: string patterns, cross-module
  /// access, cons-in-pattern.
  #[error("not yet implemented: {what}")]
  NotYetImplemented { what: &'static str, span: Span },

  /// An AST shape the generator never expects to see here.
  #[error("internal error: unexpected {node_kind} node")]
  Internal { node_kind: &'static str, span: Span },
}

impl Error {
  pub fn span(&self) -> Span {
    match self {
      Error::Undefined { span, .. }
      | Error::Redefinition { span, .. }
      | Error::DuplicatePath { span, .. }
      | Error::NotYetImplemented { span, .. }
      | Error::Internal { span, .. } => *span,
    }
  }

  pub fn report<'a>(&self, source: impl Into<diag::Source<'a>>) -> String {
    diag::Report::error()
      .source(source)
      .message(format!("{self}"))
      .span(self.span())
      .build()
      .emit_to_string()
      .unwrap()
  }

  pub fn report_to<'a, W: std::fmt::Write>(
    &self,
    source: impl Into<diag::Source<'a>>,
    w: &mut W,
  ) {
    diag::Report::error()
      .source(source)
      .message(format!("{self}"))
      .span(self.span())
      .build()
      .emit(w)
      .unwrap()
  }
}
