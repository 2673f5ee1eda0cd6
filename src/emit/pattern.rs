//! Turning a parameter or `select`-arm pattern into declared locals
//! (`declare_pattern_locals`) and into a `Value` for the constant table
//! (`make_pattern`). Grounded on `generator.c`'s `gen_pattern`/`dump_pattern`
//! pair, which keeps these two concerns — binding and value construction —
//! bundled; kept separate here per the design note on pattern compilation.

use super::{ClauseBuilder, Error, Generator};
use crate::ast::Pattern;
use crate::symtab::VarSymbol;
use crate::value::Value;

impl Generator {
  /// Walks a clause's parameter pattern, emitting no code but declaring a
  /// fresh local for every unbound identifier (and recursing into tuples
  /// and lists). A literal parameter is lowered normally here — interned
  /// into the clause's constant table — rather than waiting for the body to
  /// reference it, since the body may never mention it at all.
  pub(super) fn declare_pattern_locals(&mut self, cb: &mut ClauseBuilder, pattern: &Pattern) -> Result<(), Error> {
    match pattern {
      Pattern::Tuple(members, _) | Pattern::List(members, _) => {
        for member in members {
          self.declare_pattern_locals(cb, member)?;
        }
        Ok(())
      }
      Pattern::Ident(name) => {
        if self.lookup_ident(name).is_none() {
          let r = cb.regs.alloc();
          self.symtab.vars.insert(name.to_string(), VarSymbol { register: r });
          cb.nlocals += 1;
        }
        Ok(())
      }
      Pattern::Range(inner, _) => self.declare_pattern_locals(cb, inner),
      Pattern::Number(lexeme) => {
        let value: i32 = lexeme
          .parse()
          .map_err(|_| Error::Internal { node_kind: "malformed number literal", span: pattern.span() })?;
        cb.constants.intern_keyed(lexeme, Value::Number(value));
        Ok(())
      }
      Pattern::Atom(lexeme) => {
        let atom = self.interner.intern(lexeme);
        cb.constants.intern_keyed(lexeme, Value::Atom(atom));
        Ok(())
      }
      Pattern::String(span) => Err(Error::NotYetImplemented { what: "string pattern", span: *span }),
      Pattern::Cons(span) => Err(Error::NotYetImplemented { what: "cons pattern", span: *span }),
    }
  }

  /// Converts a pattern AST node into the `Value` stored in the constant
  /// table — patterns never emit instructions themselves.
  pub(super) fn make_pattern(&mut self, cb: &mut ClauseBuilder, pattern: &Pattern) -> Result<Value, Error> {
    match pattern {
      Pattern::Tuple(members, _) => {
        let values = members.iter().map(|m| self.make_pattern(cb, m)).collect::<Result<Vec<_>, _>>()?;
        Ok(Value::Tuple(values))
      }
      Pattern::List(members, _) => {
        let values = members.iter().map(|m| self.make_pattern(cb, m)).collect::<Result<Vec<_>, _>>()?;
        Ok(Value::List(values))
      }
      Pattern::Range(inner, _) => self.make_binding_value(cb, inner, true),
      Pattern::Ident(_) => self.make_binding_value(cb, pattern, false),
      Pattern::Atom(lexeme) => Ok(Value::Atom(self.interner.intern(lexeme))),
      Pattern::Number(lexeme) => {
        let value: i32 = lexeme
          .parse()
          .map_err(|_| Error::Internal { node_kind: "malformed number literal", span: pattern.span() })?;
        Ok(Value::Number(value))
      }
      Pattern::String(span) => Err(Error::NotYetImplemented { what: "string pattern", span: *span }),
      Pattern::Cons(span) => Err(Error::NotYetImplemented { what: "cons pattern", span: *span }),
    }
  }

  /// Shared by `OIDENT` and `ORANGE lval`: if the name is already bound,
  /// produces `Var` carrying its register; otherwise declares a fresh local
  /// and produces `Any` carrying the new register. `range` sets `Q_RANGE`.
  fn make_binding_value(&mut self, cb: &mut ClauseBuilder, pattern: &Pattern, range: bool) -> Result<Value, Error> {
    let Pattern::Ident(name) = pattern else {
      return Err(Error::Internal { node_kind: "non-identifier operand of a binding pattern", span: pattern.span() });
    };
    if let Some(reg) = self.lookup_ident(name) {
      Ok(Value::Var { register: reg.0 as u32, range })
    } else {
      let r = cb.regs.alloc();
      self.symtab.vars.insert(name.to_string(), VarSymbol { register: r });
      cb.nlocals += 1;
      Ok(Value::Any { register: r.0 as u32, range })
    }
  }
}
