//! Opcodes for the fixed-width `ABC`/`AD`/`AJ` instruction encoding.

use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Opcode {
  Move = 0,
  LoadK = 1,
  Add = 2,
  Sub = 3,
  Gt = 4,
  Eq = 5,
  Match = 6,
  Jump = 7,
  Call = 8,
  TailCall = 9,
  Return = 10,
  Tuple = 11,
  SetTuple = 12,
  List = 13,
  Cons = 14,
}

impl Opcode {
  pub fn from_u8(v: u8) -> Option<Self> {
    use Opcode::*;
    Some(match v {
      0 => Move,
      1 => LoadK,
      2 => Add,
      3 => Sub,
      4 => Gt,
      5 => Eq,
      6 => Match,
      7 => Jump,
      8 => Call,
      9 => TailCall,
      10 => Return,
      11 => Tuple,
      12 => SetTuple,
      13 => List,
      14 => Cons,
      _ => return None,
    })
  }

  pub fn name(self) -> &'static str {
    use Opcode::*;
    match self {
      Move => "MOVE",
      LoadK => "LOADK",
      Add => "ADD",
      Sub => "SUB",
      Gt => "GT",
      Eq => "EQ",
      Match => "MATCH",
      Jump => "JUMP",
      Call => "CALL",
      TailCall => "TAILCALL",
      Return => "RETURN",
      Tuple => "TUPLE",
      SetTuple => "SETTUPLE",
      List => "LIST",
      Cons => "CONS",
    }
  }

  /// Encoding form, used by the disassembler to know which fields to print.
  pub fn form(self) -> Form {
    match self {
      Opcode::LoadK => Form::Ad,
      Opcode::Jump => Form::Aj,
      _ => Form::Abc,
    }
  }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Form {
  Abc,
  Ad,
  Aj,
}

impl fmt::Display for Opcode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.name())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn round_trips_every_opcode() {
    for v in 0..=14u8 {
      let op = Opcode::from_u8(v).unwrap();
      assert_eq!(op as u8, v);
    }
    assert!(Opcode::from_u8(15).is_none());
  }
}
