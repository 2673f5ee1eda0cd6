//! AST node types produced by this crate's external parser. The generator
//! only ever borrows these; it never constructs or mutates them.
//! Node shapes mirror a small functional, pattern-matching expression
//! language: blocks, paths, clauses, bindings, match/select, tuples and
//! lists, cons cells, and the small set of arithmetic/comparison operators.

use span::{Span, Spanned};

/// The root of a module: a block whose children are all path declarations.
#[derive(Debug)]
pub struct Module {
  pub paths: Vec<Path>,
}

/// `OPATH` — a named top-level definition, currently with exactly one clause.
#[derive(Debug)]
pub struct Path {
  pub name: Spanned<String>,
  pub clause: Clause,
  pub span: Span,
}

/// `OCLAUSE` — a parameter pattern plus a body block.
#[derive(Debug)]
pub struct Clause {
  pub param: Pattern,
  pub body: Vec<Expr>,
  pub span: Span,
}

/// A pattern node. Used both as a path clause's parameter pattern and as a
/// `select`-arm pattern; both contexts share this vocabulary.
#[derive(Debug, Clone)]
pub enum Pattern {
  Tuple(Vec<Pattern>, Span),
  Ident(Spanned<String>),
  Atom(Spanned<String>),
  Number(Spanned<String>),
  List(Vec<Pattern>, Span),
  /// `ORANGE lval` — binds (or re-references) `lval` with the range
  /// quantifier bit set.
  Range(Box<Pattern>, Span),
  /// `OSTRING` — not supported by this generator; always rejected with
  /// `NotYetImplemented`.
  String(Span),
  /// `OCONS` in pattern position — not supported by this generator; always
  /// rejected with `NotYetImplemented`.
  Cons(Span),
}

impl Pattern {
  pub fn span(&self) -> Span {
    match self {
      Pattern::Tuple(_, s) | Pattern::List(_, s) | Pattern::Range(_, s) | Pattern::String(s) | Pattern::Cons(s) => *s,
      Pattern::Ident(sp) | Pattern::Atom(sp) | Pattern::Number(sp) => sp.span,
    }
  }
}

/// `OACCESS`'s left-hand module reference. Only `Current` (`.name`) is
/// implemented; `Named` is recognized syntactically and rejected with
/// `NotYetImplemented` (cross-module linking is a non-goal).
#[derive(Debug, Clone)]
pub enum ModuleRef {
  Current,
  Named(String),
}

/// One arm of a `select` expression.
#[derive(Debug)]
pub struct SelectClause {
  pub pattern: Option<Pattern>,
  pub guards: Vec<Expr>,
  pub body: Vec<Expr>,
  pub span: Span,
}

#[derive(Debug)]
pub enum Expr {
  /// `OBLOCK`.
  Block(Vec<Expr>, Span),
  /// `ONUMBER`, keyed by its source lexeme.
  Number(Spanned<String>),
  /// `OATOM`, keyed by its source lexeme.
  Atom(Spanned<String>),
  /// `OLIST` — always the empty list; non-empty literals desugar to `Cons`
  /// chains.
  List(Span),
  /// `OCONS` — `head` is `None` for `[...| tail]`-style holes; `tail` is
  /// `None` at the end of a literal list, which triggers a fresh `LIST`.
  Cons { head: Option<Box<Expr>>, tail: Option<Box<Expr>>, span: Span },
  /// `OTUPLE`.
  Tuple(Vec<Expr>, Span),
  /// `OIDENT`.
  Ident(Spanned<String>),
  /// `OADD`.
  Add(Box<Expr>, Box<Expr>, Span),
  /// `OSUB`.
  Sub(Box<Expr>, Box<Expr>, Span),
  /// `OGT`.
  Gt(Box<Expr>, Box<Expr>, Span),
  /// `OLT`.
  Lt(Box<Expr>, Box<Expr>, Span),
  /// `OACCESS` — `name` is restricted to an identifier.
  Access { module: ModuleRef, name: Spanned<String>, span: Span },
  /// `OAPPLY`.
  Apply { callee: Box<Expr>, arg: Box<Expr>, span: Span },
  /// `OBIND` — `name` is restricted to an identifier for this version.
  Bind { name: Spanned<String>, value: Box<Expr>, span: Span },
  /// `OMATCH`.
  Match(Box<Expr>, Box<Expr>, Span),
  /// `OSELECT`.
  Select { arg: Option<Box<Expr>>, clauses: Vec<SelectClause>, span: Span },
}

impl Expr {
  pub fn span(&self) -> Span {
    match self {
      Expr::Block(_, s)
      | Expr::List(s)
      | Expr::Cons { span: s, .. }
      | Expr::Tuple(_, s)
      | Expr::Add(_, _, s)
      | Expr::Sub(_, _, s)
      | Expr::Gt(_, _, s)
      | Expr::Lt(_, _, s)
      | Expr::Access { span: s, .. }
      | Expr::Apply { span: s, .. }
      | Expr::Bind { span: s, .. }
      | Expr::Match(_, _, s)
      | Expr::Select { span: s, .. } => *s,
      Expr::Number(sp) | Expr::Atom(sp) | Expr::Ident(sp) => sp.span,
    }
  }
}
