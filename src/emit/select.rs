//! `select`: the pattern-match-with-guards expression. Two-pass patching —
//! each clause's skip-on-mismatch jumps are bound once the clause's own code
//! is known, without a second traversal over the clause list. Grounded on
//! `generator.c`'s `gen_select`, the one `gen_*` function in the original
//! that does its own backpatching instead of delegating to a single
//! structured jump helper.

use span::Span;

use super::{ClauseBuilder, Error, Generator, Operand};
use crate::ast::{self, Pattern};
use crate::bytecode::builder::JumpSiteList;
use crate::bytecode::opcode::Opcode;
use crate::instruction::{Instruction, Reg, RegOrK};

impl Generator {
  pub(super) fn emit_select(
    &mut self,
    cb: &mut ClauseBuilder,
    arg: Option<&ast::Expr>,
    clauses: &[ast::SelectClause],
    is_tail: bool,
    _span: Span,
  ) -> Result<Operand, Error> {
    let subject = match arg {
      Some(expr) => {
        let operand = self.emit_expr(cb, expr, false)?;
        Some(self.materialize(cb, operand, expr.span())?)
      }
      None => None,
    };

    let result = cb.regs.alloc();
    let mut end_of_select = JumpSiteList::new();

    for (i, clause) in clauses.iter().enumerate() {
      let is_last = i + 1 == clauses.len();
      self.symtab.vars.enter_scope();

      let pattern_jump = match (&clause.pattern, subject) {
        (Some(pattern), Some(subject_reg)) => Some(self.emit_pattern_check(cb, pattern, subject_reg)?),
        _ => None,
      };

      let mut guard_jumps = Vec::new();
      for guard in &clause.guards {
        self.emit_expr(cb, guard, false)?;
        guard_jumps.push(cb.code.emit_jump_placeholder());
      }

      self.symtab.vars.enter_scope();
      let body_operand = self.emit_block(cb, &clause.body, is_tail)?;
      self.symtab.vars.exit_scope();

      let arm_tail_called = cb.code.last().and_then(Instruction::opcode) == Some(Opcode::TailCall);
      if !arm_tail_called {
        match body_operand {
          Operand::K(k) => {
            cb.code.emit(Instruction::ad(Opcode::LoadK, result, k.index()));
          }
          Operand::Reg(r) => {
            cb.code.emit(Instruction::abc(Opcode::Move, result, RegOrK::reg(r.0), RegOrK::reg(0)));
          }
          Operand::Unbound | Operand::NoValue => {
            return Err(Error::Internal { node_kind: "select arm produced no value", span: clause.span });
          }
        }
        if !is_last {
          end_of_select.push(cb.code.emit_jump_placeholder());
        }
      }

      let skip_target = cb.code.pc();
      if let Some(site) = pattern_jump {
        cb.code.patch(site, skip_target);
      }
      for site in guard_jumps {
        cb.code.patch(site, skip_target);
      }

      self.symtab.vars.exit_scope();
    }

    if is_tail {
      end_of_select.patch_all_as_return(&mut cb.code, result);
    } else {
      let after_select = cb.code.pc();
      end_of_select.patch_all(&mut cb.code, after_select);
    }

    Ok(Operand::Reg(result))
  }

  /// Builds the arm's pattern `Value`, chooses `EQ` for a number literal
  /// pattern and `MATCH` for everything else, and reserves the jump taken
  /// when the subject doesn't match.
  fn emit_pattern_check(
    &mut self,
    cb: &mut ClauseBuilder,
    pattern: &Pattern,
    subject: Reg,
  ) -> Result<crate::bytecode::builder::JumpSite, Error> {
    let value = self.make_pattern(cb, pattern)?;
    let op = if matches!(pattern, Pattern::Number(_)) { Opcode::Eq } else { Opcode::Match };
    let k = cb.constants.intern_anon(value);
    let scratch = cb.regs.alloc();
    cb.code.emit(Instruction::abc(op, scratch, k, RegOrK::reg(subject.0)));
    Ok(cb.code.emit_jump_placeholder())
  }
}
