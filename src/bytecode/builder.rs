//! The growable per-clause code buffer and its forward-jump patch sites.
//! Stores each pending jump's referring instruction offset and computes the
//! relative jump once the target is known, cut down to what this fixed-width,
//! always-16-bit-offset format needs — there is no variable-width jump to
//! upgrade here.

use crate::bytecode::opcode::Opcode;
use crate::instruction::{Instruction, Reg, RegOrK};

/// A pending forward jump: the PC of its placeholder word, not yet patched.
pub struct JumpSite(usize);

#[derive(Default)]
pub struct CodeBuffer {
  code: Vec<Instruction>,
}

impl CodeBuffer {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn pc(&self) -> usize {
    self.code.len()
  }

  /// Appends `instr`, returning the PC it was written at.
  pub fn emit(&mut self, instr: Instruction) -> usize {
    let pc = self.code.len();
    self.code.push(instr);
    pc
  }

  /// Emits a zero placeholder and returns a handle to patch it later.
  pub fn emit_jump_placeholder(&mut self) -> JumpSite {
    JumpSite(self.emit(Instruction::zero()))
  }

  /// Rewrites a placeholder into `JUMP 0, offset`, the offset being relative
  /// to the PC right after the jump instruction.
  pub fn patch(&mut self, site: JumpSite, target_pc: usize) {
    let offset = target_pc as i64 - (site.0 as i64 + 1);
    let offset = i16::try_from(offset).expect("jump offset does not fit in 16 bits");
    self.code[site.0] = Instruction::aj(Opcode::Jump, 0, offset);
  }

  /// Rewrites a placeholder into `RETURN result, 0, 0` instead of a jump —
  /// used when a `select`'s end-of-arm jump turns out to be in tail position
  /// of the enclosing clause.
  pub fn patch_as_return(&mut self, site: JumpSite, result: Reg) {
    self.code[site.0] = Instruction::abc(Opcode::Return, result, RegOrK::reg(0), RegOrK::reg(0));
  }

  pub fn last(&self) -> Option<Instruction> {
    self.code.last().copied()
  }

  pub fn words(&self) -> &[Instruction] {
    &self.code
  }

  pub fn into_words(self) -> Vec<Instruction> {
    self.code
  }
}

/// Several jump sites that all resolve to the same eventual target — used by
/// `select`'s end-of-arm jumps, one per non-last clause.
#[derive(Default)]
pub struct JumpSiteList(Vec<JumpSite>);

impl JumpSiteList {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn push(&mut self, site: JumpSite) {
    self.0.push(site);
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }

  pub fn patch_all(self, code: &mut CodeBuffer, target_pc: usize) {
    for site in self.0 {
      code.patch(site, target_pc);
    }
  }

  pub fn patch_all_as_return(self, code: &mut CodeBuffer, result: Reg) {
    for site in self.0 {
      code.patch_as_return(site, result);
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn patch_computes_relative_offset() {
    let mut code = CodeBuffer::new();
    code.emit(Instruction::abc(Opcode::Move, Reg(0), RegOrK::reg(0), RegOrK::reg(0)));
    let site = code.emit_jump_placeholder();
    code.emit(Instruction::abc(Opcode::Move, Reg(0), RegOrK::reg(0), RegOrK::reg(0)));
    let target = code.pc();
    code.patch(site, target);
    assert_eq!(code.words()[1].opcode(), Some(Opcode::Jump));
    assert_eq!(code.words()[1].j(), 1);
  }

  #[test]
  fn jump_site_list_patches_every_referrer() {
    let mut code = CodeBuffer::new();
    let mut sites = JumpSiteList::new();
    sites.push(code.emit_jump_placeholder());
    sites.push(code.emit_jump_placeholder());
    let target = code.pc();
    sites.patch_all(&mut code, target);
    for word in code.words() {
      assert_eq!(word.opcode(), Some(Opcode::Jump));
      assert_eq!(word.j(), 0);
    }
  }

  #[test]
  fn jump_site_list_can_become_returns() {
    let mut code = CodeBuffer::new();
    let mut sites = JumpSiteList::new();
    sites.push(code.emit_jump_placeholder());
    sites.patch_all_as_return(&mut code, Reg(3));
    assert_eq!(code.words()[0].opcode(), Some(Opcode::Return));
    assert_eq!(code.words()[0].a(), 3);
  }
}
