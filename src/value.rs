//! The tagged value universe shared by this compiler and the VM it targets:
//! numbers, atoms, tuples, lists, path identifiers, and the two pattern-only
//! variants (`Var`, `Any`) that carry a register index instead of data. Also
//! hosts the per-clause constant table.

use std::collections::HashMap;
use std::rc::Rc;

use crate::instruction::RegOrK;

/// Quantifier bit OR'd onto a pattern value's tag. Currently only `Q_RANGE`
/// exists, set on `Var`/`Any` produced from an `ORANGE` pattern node.
pub const Q_RANGE: u8 = 0x80;

/// Tag bytes written as a `ConstantBlock`'s `type_tag`. Distinct from the
/// smaller tag vocabulary used by `PatternBlock` (see `image::pattern_tag`),
/// which encodes the raw clause-parameter AST node rather than a converted
/// `Value`.
pub mod constant_tag {
  pub const NUMBER: u8 = 0;
  pub const ATOM: u8 = 1;
  pub const TUPLE: u8 = 2;
  pub const LIST: u8 = 3;
  pub const PATHID: u8 = 4;
  pub const VAR: u8 = 5;
  pub const ANY: u8 = 6;
  pub const STRING: u8 = 7;
  pub const BIN: u8 = 8;
}

#[derive(Clone, Debug, PartialEq)]
pub enum Value {
  Number(i32),
  Atom(Rc<str>),
  Tuple(Vec<Value>),
  List(Vec<Value>),
  PathId { module: Rc<str>, path: Rc<str> },
  /// A register already bound by an enclosing pattern or scope, referenced
  /// again in a nested pattern.
  Var { register: u32, range: bool },
  /// A fresh pattern-bound register.
  Any { register: u32, range: bool },
}

impl Value {
  /// The tag byte written to a `ConstantBlock`, including any quantifier bit.
  pub fn type_tag(&self) -> u8 {
    use constant_tag::*;
    match self {
      Value::Number(_) => NUMBER,
      Value::Atom(_) => ATOM,
      Value::Tuple(_) => TUPLE,
      Value::List(_) => LIST,
      Value::PathId { .. } => PATHID,
      Value::Var { range, .. } => VAR | if *range { Q_RANGE } else { 0 },
      Value::Any { range, .. } => ANY | if *range { Q_RANGE } else { 0 },
    }
  }
}

/// A string interner shared by the whole generation run, giving atoms
/// pointer-identity sharing without a garbage collector (grounded on the
/// teacher's `Context::intern`, minus its GC-pointer payload).
#[derive(Default)]
pub struct Interner {
  table: HashMap<Rc<str>, Rc<str>>,
}

impl Interner {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn intern(&mut self, s: &str) -> Rc<str> {
    if let Some(existing) = self.table.get(s) {
      return existing.clone();
    }
    let rc: Rc<str> = Rc::from(s);
    self.table.insert(rc.clone(), rc.clone());
    rc
  }
}

/// Per-clause constant table (`kheader`/`ktable`/`kindex` in the original).
/// Values keyed on a non-empty source lexeme are deduplicated; anonymous
/// values (pattern values, path identifiers) always allocate a fresh slot.
#[derive(Default)]
pub struct ConstantPool {
  values: Vec<Value>,
  keyed: HashMap<String, u8>,
}

impl ConstantPool {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn len(&self) -> usize {
    self.values.len()
  }

  pub fn values(&self) -> &[Value] {
    &self.values
  }

  fn allocate(&mut self, value: Value) -> RegOrK {
    let index = self.values.len();
    // Constant indices are 7-bit (the high bit is the K flag), so this pool
    // holds at most 128 entries per clause. The original never checks this
    // either; a clause overflowing it is an internal-invariant violation,
    // not a user error, so it aborts rather than threading a `Result`
    // through every interning call site.
    assert!(index < 128, "clause constant table overflow (> 127 constants)");
    self.values.push(value);
    RegOrK::k(index as u8)
  }

  /// Interns `value` under a source-text key, reusing the existing slot on a
  /// repeat lexeme (e.g. the same numeric literal appearing twice).
  pub fn intern_keyed(&mut self, key: &str, value: Value) -> RegOrK {
    if let Some(&index) = self.keyed.get(key) {
      return RegOrK::k(index);
    }
    let k = self.allocate(value);
    self.keyed.insert(key.to_string(), k.index());
    k
  }

  /// Always allocates a fresh slot, for constants with no stable source key
  /// (constructed pattern values, path identifiers).
  pub fn intern_anon(&mut self, value: Value) -> RegOrK {
    self.allocate(value)
  }
}

impl std::fmt::Display for Value {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Value::Number(n) => write!(f, "{n}"),
      Value::Atom(name) => write!(f, ":{name}"),
      Value::Tuple(items) => {
        write!(f, "(")?;
        for (i, item) in items.iter().enumerate() {
          if i > 0 {
            write!(f, ", ")?;
          }
          write!(f, "{item}")?;
        }
        write!(f, ")")
      }
      Value::List(items) => {
        write!(f, "[")?;
        for (i, item) in items.iter().enumerate() {
          if i > 0 {
            write!(f, ", ")?;
          }
          write!(f, "{item}")?;
        }
        write!(f, "]")
      }
      Value::PathId { module, path } => write!(f, "{module}.{path}"),
      Value::Var { register, range } => write!(f, "var(r{register}{})", if *range { "..." } else { "" }),
      Value::Any { register, range } => write!(f, "any(r{register}{})", if *range { "..." } else { "" }),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn keyed_interning_is_idempotent() {
    let mut pool = ConstantPool::new();
    let a = pool.intern_keyed("42", Value::Number(42));
    let b = pool.intern_keyed("42", Value::Number(42));
    assert_eq!(a.index(), b.index());
    assert_eq!(pool.len(), 1);
  }

  #[test]
  fn anonymous_constants_always_allocate() {
    let mut pool = ConstantPool::new();
    let a = pool.intern_anon(Value::Any { register: 0, range: false });
    let b = pool.intern_anon(Value::Any { register: 0, range: false });
    assert_ne!(a.index(), b.index());
    assert_eq!(pool.len(), 2);
  }

  #[test]
  fn interner_shares_identity() {
    let mut interner = Interner::new();
    let a = interner.intern("ok");
    let b = interner.intern("ok");
    assert!(Rc::ptr_eq(&a, &b));
  }
}
