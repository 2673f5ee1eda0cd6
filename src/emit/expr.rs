//! Per-node-kind expression lowering. Grounded on `generator.c`'s `gen_*`
//! functions, one method per AST shape.

use span::Spanned;

use super::{ClauseBuilder, Error, Generator, Operand};
use crate::ast::{self, ModuleRef};
use crate::bytecode::opcode::Opcode;
use crate::instruction::{Instruction, Reg, RegOrK};
use crate::value::Value;

impl Generator {
  pub(super) fn emit_expr(&mut self, cb: &mut ClauseBuilder, expr: &ast::Expr, is_tail: bool) -> Result<Operand, Error> {
    match expr {
      ast::Expr::Block(exprs, _) => self.emit_block(cb, exprs, is_tail),
      ast::Expr::Number(lexeme) => self.emit_number(cb, lexeme),
      ast::Expr::Atom(lexeme) => self.emit_atom(cb, lexeme),
      ast::Expr::List(span) => Ok(self.emit_list(cb, *span)),
      ast::Expr::Cons { head, tail, span } => self.emit_cons(cb, head.as_deref(), tail.as_deref(), *span),
      ast::Expr::Tuple(members, span) => self.emit_tuple(cb, members, *span),
      ast::Expr::Ident(name) => self.emit_ident_defined(name),
      ast::Expr::Add(lhs, rhs, span) => self.emit_binop(cb, Opcode::Add, lhs, rhs, *span),
      ast::Expr::Sub(lhs, rhs, span) => self.emit_binop(cb, Opcode::Sub, lhs, rhs, *span),
      ast::Expr::Gt(lhs, rhs, span) => self.emit_compare(cb, lhs, rhs, false, *span),
      ast::Expr::Lt(lhs, rhs, span) => self.emit_compare(cb, lhs, rhs, true, *span),
      ast::Expr::Access { module, name, span } => self.emit_access(cb, module, name, *span),
      ast::Expr::Apply { callee, arg, span } => self.emit_apply(cb, callee, arg, is_tail, *span),
      ast::Expr::Bind { name, value, span } => self.emit_bind(cb, name, value, *span),
      ast::Expr::Match(lhs, rhs, span) => self.emit_match(cb, lhs, rhs, *span),
      ast::Expr::Select { arg, clauses, span } => self.emit_select(cb, arg.as_deref(), clauses, is_tail, *span),
    }
  }

  fn emit_number(&mut self, cb: &mut ClauseBuilder, lexeme: &Spanned<String>) -> Result<Operand, Error> {
    let value: i32 = lexeme
      .parse()
      .map_err(|_| Error::Internal { node_kind: "malformed number literal", span: lexeme.span })?;
    let k = cb.constants.intern_keyed(lexeme, Value::Number(value));
    Ok(Operand::K(k))
  }

  fn emit_atom(&mut self, cb: &mut ClauseBuilder, lexeme: &Spanned<String>) -> Result<Operand, Error> {
    let atom = self.interner.intern(lexeme);
    let k = cb.constants.intern_keyed(lexeme, Value::Atom(atom));
    Ok(Operand::K(k))
  }

  fn emit_list(&mut self, cb: &mut ClauseBuilder, _span: span::Span) -> Operand {
    let r = cb.regs.alloc();
    cb.code.emit(Instruction::abc(Opcode::List, r, 0u8, 0u8));
    Operand::Reg(r)
  }

  fn emit_cons(
    &mut self,
    cb: &mut ClauseBuilder,
    head: Option<&ast::Expr>,
    tail: Option<&ast::Expr>,
    span: span::Span,
  ) -> Result<Operand, Error> {
    let list_reg = match tail {
      Some(tail_expr) => {
        let operand = self.emit_expr(cb, tail_expr, false)?;
        self.materialize(cb, operand, tail_expr.span())?
      }
      None => {
        let r = cb.regs.alloc();
        cb.code.emit(Instruction::abc(Opcode::List, r, 0u8, 0u8));
        r
      }
    };
    if let Some(head_expr) = head {
      let head_operand = self.emit_expr(cb, head_expr, false)?;
      let head_rk = self.to_rk(head_operand, head_expr.span())?;
      cb.code.emit(Instruction::abc(Opcode::Cons, list_reg, RegOrK::reg(list_reg.0), head_rk));
    }
    let _ = span;
    Ok(Operand::Reg(list_reg))
  }

  fn emit_tuple(&mut self, cb: &mut ClauseBuilder, members: &[ast::Expr], span: span::Span) -> Result<Operand, Error> {
    let arity = u8::try_from(members.len())
      .map_err(|_| Error::Internal { node_kind: "tuple arity over 255 members", span })?;
    let r = cb.regs.alloc();
    cb.code.emit(Instruction::abc(Opcode::Tuple, r, arity, 0u8));
    for (i, member) in members.iter().enumerate() {
      let operand = self.emit_expr(cb, member, false)?;
      let rk = self.to_rk(operand, member.span())?;
      cb.code.emit(Instruction::abc(Opcode::SetTuple, r, i as u8, rk));
    }
    Ok(Operand::Reg(r))
  }

  fn emit_ident_defined(&mut self, name: &Spanned<String>) -> Result<Operand, Error> {
    match self.lookup_ident(name) {
      Some(reg) => Ok(Operand::Reg(reg)),
      None => Err(Error::Undefined { name: name.to_string(), span: name.span }),
    }
  }

  fn emit_binop(
    &mut self,
    cb: &mut ClauseBuilder,
    op: Opcode,
    lhs: &ast::Expr,
    rhs: &ast::Expr,
    _span: span::Span,
  ) -> Result<Operand, Error> {
    let lval = self.emit_expr(cb, lhs, false)?;
    let rval = self.emit_expr(cb, rhs, false)?;
    let lrk = self.to_rk(lval, lhs.span())?;
    let rrk = self.to_rk(rval, rhs.span())?;
    let r = cb.regs.alloc();
    cb.code.emit(Instruction::abc(op, r, lrk, rrk));
    Ok(Operand::Reg(r))
  }

  /// `>` emits `GT lval, rval` directly; `<` emits the same `GT` opcode with
  /// its operands swapped — there is no dedicated `LT` opcode. Neither
  /// produces a value: the result is a predicate consumed by the jump
  /// emitted immediately after, by whichever caller wanted a guard.
  fn emit_compare(
    &mut self,
    cb: &mut ClauseBuilder,
    lhs: &ast::Expr,
    rhs: &ast::Expr,
    swap_for_lt: bool,
    _span: span::Span,
  ) -> Result<Operand, Error> {
    let lval = self.emit_expr(cb, lhs, false)?;
    let rval = self.emit_expr(cb, rhs, false)?;
    let lrk = self.to_rk(lval, lhs.span())?;
    let rrk = self.to_rk(rval, rhs.span())?;
    let (b, c) = if swap_for_lt { (rrk, lrk) } else { (lrk, rrk) };
    cb.code.emit(Instruction::abc(Opcode::Gt, Reg(0), b, c));
    Ok(Operand::NoValue)
  }

  fn emit_access(
    &mut self,
    cb: &mut ClauseBuilder,
    module: &ModuleRef,
    name: &Spanned<String>,
    span: span::Span,
  ) -> Result<Operand, Error> {
    match module {
      ModuleRef::Current => {
        let module_name = self.module_name.clone();
        let path_name = self.interner.intern(name);
        let k = cb.constants.intern_anon(Value::PathId { module: module_name, path: path_name });
        Ok(Operand::K(k))
      }
      ModuleRef::Named(_) => Err(Error::NotYetImplemented { what: "cross-module access", span }),
    }
  }

  fn emit_apply(
    &mut self,
    cb: &mut ClauseBuilder,
    callee: &ast::Expr,
    arg: &ast::Expr,
    is_tail: bool,
    _span: span::Span,
  ) -> Result<Operand, Error> {
    let lval = self.emit_expr(cb, callee, false)?;
    let rval = self.emit_expr(cb, arg, false)?;
    let lrk = self.to_rk(lval, callee.span())?;
    let rrk = self.to_rk(rval, arg.span())?;

    let is_recursive_call = matches!(
      callee,
      ast::Expr::Access { module: ModuleRef::Current, name, .. }
        if self.active_path_name.as_deref() == Some(name.as_str())
    );

    let rr = cb.regs.alloc();
    if is_tail && is_recursive_call {
      cb.code.emit(Instruction::abc(Opcode::TailCall, rr, 0u8, rrk));
    } else {
      cb.code.emit(Instruction::abc(Opcode::Call, rr, lrk, rrk));
    }
    Ok(Operand::Reg(rr))
  }

  fn emit_bind(
    &mut self,
    cb: &mut ClauseBuilder,
    name: &Spanned<String>,
    value: &ast::Expr,
    span: span::Span,
  ) -> Result<Operand, Error> {
    if self.symtab.vars.is_bound_locally(name) {
      return Err(Error::Redefinition { name: name.to_string(), span });
    }
    let operand = self.emit_expr(cb, value, false)?;
    let r = cb.regs.alloc();
    match operand {
      Operand::K(k) => {
        cb.code.emit(Instruction::ad(Opcode::LoadK, r, k.index()));
      }
      Operand::Reg(src) => {
        cb.code.emit(Instruction::abc(Opcode::Move, r, RegOrK::reg(src.0), RegOrK::reg(0)));
      }
      Operand::Unbound | Operand::NoValue => {
        return Err(Error::Internal { node_kind: "bind right-hand side produced no value", span });
      }
    }
    self.symtab.vars.insert(name.to_string(), crate::symtab::VarSymbol { register: r });
    cb.nlocals += 1;
    Ok(Operand::Reg(r))
  }

  /// Emits `MATCH 0, lval, rval` followed by a placeholder `JUMP 0, 0`
  /// reserved for a bad-match diagnostic the VM does not implement yet.
  /// That jump is never patched — it is a permanent no-op, not a forward
  /// reference awaiting a target, so it bypasses the `JumpSite` machinery
  /// entirely and is written directly.
  fn emit_match(&mut self, cb: &mut ClauseBuilder, lhs: &ast::Expr, rhs: &ast::Expr, _span: span::Span) -> Result<Operand, Error> {
    let lval = self.emit_expr(cb, lhs, false)?;
    let rval = self.emit_expr(cb, rhs, false)?;
    let lrk = self.to_rk(lval, lhs.span())?;
    let rrk = self.to_rk(rval, rhs.span())?;
    cb.code.emit(Instruction::abc(Opcode::Match, Reg(0), lrk, rrk));
    cb.code.emit(Instruction::aj(Opcode::Jump, 0, 0));
    Ok(Operand::NoValue)
  }
}
