//! Human-readable disassembly of a clause's code buffer. Grounded on the
//! teacher's `Disassemble` trait / `Instruction` `Display` wrapper, adapted
//! from its variable-width decode loop to this format's fixed-width words,
//! which need no decode loop at all — just an index.

use std::fmt;

use crate::bytecode::opcode::Form;
use crate::instruction::{Instruction, Reg};
use crate::util::num_digits;
use crate::value::Value;

pub struct Disassembly<'a> {
  code: &'a [Instruction],
  constants: &'a [Value],
}

impl<'a> Disassembly<'a> {
  pub fn new(code: &'a [Instruction], constants: &'a [Value]) -> Self {
    Self { code, constants }
  }
}

impl<'a> fmt::Display for Disassembly<'a> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let width = num_digits(self.code.len());
    for (pc, instr) in self.code.iter().enumerate() {
      writeln!(
        f,
        "{pc:width$} | {}",
        DisassembledInstruction { instr: *instr, constants: self.constants }
      )?;
    }
    Ok(())
  }
}

struct DisassembledInstruction<'a> {
  instr: Instruction,
  constants: &'a [Value],
}

impl<'a> fmt::Display for DisassembledInstruction<'a> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let Some(op) = self.instr.opcode() else {
      return write!(f, "<invalid opcode>");
    };

    let mut constant = None;
    match op.form() {
      Form::Abc => {
        let (a, b, c) = (Reg(self.instr.a()), self.instr.b(), self.instr.c());
        write!(f, "{op} {a} {b} {c}")?;
        if b.is_k() {
          constant = self.constants.get(b.index() as usize);
        } else if c.is_k() {
          constant = self.constants.get(c.index() as usize);
        }
      }
      Form::Ad => {
        let (a, d) = (Reg(self.instr.a()), self.instr.d());
        write!(f, "{op} {a} {d}")?;
        if d.is_k() {
          constant = self.constants.get(d.index() as usize);
        }
      }
      Form::Aj => {
        write!(f, "{op} {} {}", self.instr.a(), self.instr.j())?;
      }
    }
    if let Some(constant) = constant {
      write!(f, "; {constant}")?;
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::bytecode::opcode::Opcode;
  use crate::instruction::RegOrK;

  #[test]
  fn renders_ad_with_constant() {
    let constants = vec![Value::Number(42)];
    let code = vec![Instruction::ad(Opcode::LoadK, Reg(0), 0)];
    let text = Disassembly::new(&code, &constants).to_string();
    assert_eq!(text.trim(), "0 | LOADK r0 k0; 42");
  }

  #[test]
  fn renders_abc_with_constant() {
    let constants = vec![Value::Number(7)];
    let code = vec![Instruction::abc(Opcode::Add, Reg(2), RegOrK::reg(0), RegOrK::k(0))];
    let text = Disassembly::new(&code, &constants).to_string();
    assert_eq!(text.trim(), "0 | ADD r2 r0 k0; 7");
  }

  #[test]
  fn renders_jump_offset() {
    let code = vec![Instruction::aj(Opcode::Jump, 0, -3)];
    let text = Disassembly::new(&code, &[]).to_string();
    assert_eq!(text.trim(), "0 | JUMP 0 -3");
  }
}
