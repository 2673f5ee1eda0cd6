//! The on-disk bytecode container: a little-endian binary format with a
//! module header, one `PathBlock` per path, one `ClauseBlock` per clause
//! (parameter pattern, constant table, code words), and a recursive
//! `ConstantBlock` encoding for pattern-derived constant values. Grounded on
//! `generator.c`'s `dump_*` family (`dump_atom`, `dump_number`, `dump_pattern`,
//! `dump_constant`, `dump_clause`, `dump_path`), which only ever writes this
//! format; the reader has no counterpart there and is new, built to make the
//! write-then-read round trip checkable.

use std::io::{self, Read, Write};
use std::rc::Rc;

use crate::ast::Pattern;
use crate::emit::{ClauseEntry, Image, PathEntry};
use crate::instruction::Instruction;
use crate::value::{constant_tag, Value, Q_RANGE};

const MAGIC: u8 = 0xA7;
const VERSION: u32 = 0xFFFFFF;
const PATH_MARKER: u8 = 0xFF;

/// Tag bytes for a `PatternBlock` node. A smaller vocabulary than
/// `value::constant_tag`: a pattern tree describes the raw clause-parameter
/// shape, not a constant table entry, so it has no `PATHID`/`VAR` tags of its
/// own (`ANY` alone carries an identifier's meaning here).
pub mod pattern_tag {
  pub const STRING: u8 = 0;
  pub const ATOM: u8 = 1;
  pub const NUMBER: u8 = 2;
  pub const TUPLE: u8 = 3;
  pub const LIST: u8 = 4;
  pub const ANY: u8 = 5;
}

#[derive(Debug, thiserror::Error)]
pub enum ImageError {
  #[error("bad magic byte: expected {MAGIC:#x}, found {0:#x}")]
  BadMagic(u8),
  #[error("unsupported image version")]
  BadVersion,
  #[error("bad path marker: expected {PATH_MARKER:#x}, found {0:#x}")]
  BadPathMarker(u8),
  #[error("pattern node {0:#x} is not valid in a clause parameter position")]
  UnsupportedPatternTag(u8),
  #[error("constant node {0:#x} is not a storable constant")]
  UnsupportedConstantTag(u8),
  #[error("name or atom bytes are not valid UTF-8")]
  InvalidUtf8,
  #[error(transparent)]
  Io(#[from] io::Error),
}

/// Writes `image` in the on-disk format. The module name itself is never
/// written — it is derived from the source path at load time, not carried in
/// the container.
pub fn write<W: Write>(image: &Image, w: &mut W) -> io::Result<()> {
  w.write_all(&[MAGIC])?;
  write_u24(w, VERSION)?;
  write_u32(w, image.paths.len() as u32)?;
  for path in &image.paths {
    write_path(w, path)?;
  }
  Ok(())
}

/// Convenience wrapper returning an owned byte buffer.
pub fn to_bytes(image: &Image) -> Vec<u8> {
  let mut buf = Vec::new();
  write(image, &mut buf).expect("writing to a Vec<u8> never fails");
  buf
}

/// Reads an image back into its paths. There is no module name to recover —
/// see `write`'s note — so callers that need one must supply it separately.
pub fn read<R: Read>(r: &mut R) -> Result<Vec<PathEntry>, ImageError> {
  let magic = read_u8(r)?;
  if magic != MAGIC {
    return Err(ImageError::BadMagic(magic));
  }
  let version = read_u24(r)?;
  if version != VERSION {
    return Err(ImageError::BadVersion);
  }
  let path_count = read_u32(r)?;
  let mut paths = Vec::with_capacity(path_count as usize);
  for i in 0..path_count {
    let mut path = read_path(r)?;
    path.index = i;
    paths.push(path);
  }
  Ok(paths)
}

fn write_path<W: Write>(w: &mut W, path: &PathEntry) -> io::Result<()> {
  w.write_all(&[PATH_MARKER])?;
  let name_bytes = path.name.as_bytes();
  w.write_all(&[name_bytes.len() as u8])?;
  w.write_all(name_bytes)?;
  w.write_all(&[path.clauses.len() as u8])?;
  for clause in &path.clauses {
    write_clause(w, clause)?;
  }
  Ok(())
}

fn read_path<R: Read>(r: &mut R) -> Result<PathEntry, ImageError> {
  let marker = read_u8(r)?;
  if marker != PATH_MARKER {
    return Err(ImageError::BadPathMarker(marker));
  }
  let name_len = read_u8(r)? as usize;
  let name = read_str_of_len(r, name_len)?;
  let clause_count = read_u8(r)?;
  let mut clauses = Vec::with_capacity(clause_count as usize);
  for _ in 0..clause_count {
    clauses.push(read_clause(r)?);
  }
  Ok(PathEntry { name: Rc::from(name), index: 0, clauses })
}

fn write_clause<W: Write>(w: &mut W, clause: &ClauseEntry) -> io::Result<()> {
  write_pattern(w, &clause.param)?;
  w.write_all(&[clause.nreg])?;
  w.write_all(&[clause.constants.len() as u8])?;
  for constant in &clause.constants {
    write_constant(w, constant)?;
  }
  write_u32(w, clause.code.len() as u32)?;
  for instr in &clause.code {
    write_u32(w, instr.to_u32())?;
  }
  Ok(())
}

fn read_clause<R: Read>(r: &mut R) -> Result<ClauseEntry, ImageError> {
  let param = read_pattern(r)?;
  let nreg = read_u8(r)?;
  let constant_count = read_u8(r)?;
  let mut constants = Vec::with_capacity(constant_count as usize);
  for _ in 0..constant_count {
    constants.push(read_constant(r)?);
  }
  let code_length = read_u32(r)?;
  let mut code = Vec::with_capacity(code_length as usize);
  for _ in 0..code_length {
    code.push(Instruction::from_u32(read_u32(r)?));
  }
  Ok(ClauseEntry { param, constants, code, nreg, nlocals: 0 })
}

/// Writes a clause parameter pattern as a recursive `PatternBlock` tree.
/// `Range`/`String`/`Cons` never reach a clause parameter (the generator
/// rejects them during `declare_pattern_locals`), so encountering one here is
/// an `io::Error`, not a silent miscount.
fn write_pattern<W: Write>(w: &mut W, pattern: &Pattern) -> io::Result<()> {
  match pattern {
    Pattern::Tuple(members, _) => {
      w.write_all(&[pattern_tag::TUPLE])?;
      w.write_all(&[members.len() as u8])?;
      for member in members {
        write_pattern(w, member)?;
      }
      Ok(())
    }
    Pattern::List(members, _) => {
      w.write_all(&[pattern_tag::LIST])?;
      w.write_all(&[members.len() as u8])?;
      for member in members {
        write_pattern(w, member)?;
      }
      Ok(())
    }
    Pattern::Ident(_) => w.write_all(&[pattern_tag::ANY]),
    Pattern::Atom(lexeme) => {
      w.write_all(&[pattern_tag::ATOM])?;
      let bytes = lexeme.as_bytes();
      w.write_all(&[bytes.len() as u8 + 1])?;
      w.write_all(bytes)?;
      w.write_all(&[0])
    }
    Pattern::Number(lexeme) => {
      w.write_all(&[pattern_tag::NUMBER])?;
      let value: i32 = lexeme
        .parse()
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "malformed number literal in clause pattern"))?;
      write_i32(w, value)
    }
    Pattern::Range(_, _) | Pattern::String(_) | Pattern::Cons(_) => {
      Err(io::Error::new(io::ErrorKind::InvalidData, "pattern shape not valid in a clause parameter position"))
    }
  }
}

fn read_pattern<R: Read>(r: &mut R) -> Result<Pattern, ImageError> {
  use span::Span;
  let zero_span = Span::from(0..0);
  let tag = read_u8(r)?;
  match tag {
    pattern_tag::TUPLE => {
      let arity = read_u8(r)?;
      let members = (0..arity).map(|_| read_pattern(r)).collect::<Result<Vec<_>, _>>()?;
      Ok(Pattern::Tuple(members, zero_span))
    }
    pattern_tag::LIST => {
      let arity = read_u8(r)?;
      let members = (0..arity).map(|_| read_pattern(r)).collect::<Result<Vec<_>, _>>()?;
      Ok(Pattern::List(members, zero_span))
    }
    pattern_tag::ANY => Ok(Pattern::Ident(span::Spanned::new(zero_span, String::new()))),
    pattern_tag::ATOM => {
      let stored_len = read_u8(r)? as usize;
      let name = read_str_of_len(r, stored_len.saturating_sub(1))?;
      let terminator = read_u8(r)?;
      debug_assert_eq!(terminator, 0);
      Ok(Pattern::Atom(span::Spanned::new(zero_span, name)))
    }
    pattern_tag::NUMBER => {
      let value = read_i32(r)?;
      Ok(Pattern::Number(span::Spanned::new(zero_span, value.to_string())))
    }
    pattern_tag::STRING => Err(ImageError::UnsupportedPatternTag(tag)),
    other => Err(ImageError::UnsupportedPatternTag(other)),
  }
}

fn write_constant<W: Write>(w: &mut W, value: &Value) -> io::Result<()> {
  w.write_all(&[value.type_tag()])?;
  match value {
    Value::Number(n) => write_i32(w, *n),
    Value::Atom(s) => write_cstr(w, s),
    Value::Tuple(items) => {
      w.write_all(&[items.len() as u8])?;
      for item in items {
        write_constant(w, item)?;
      }
      Ok(())
    }
    Value::List(items) => {
      write_u32(w, items.len() as u32)?;
      for item in items {
        write_constant(w, item)?;
      }
      Ok(())
    }
    Value::PathId { module, path } => {
      write_cstr(w, module)?;
      write_cstr(w, path)
    }
    Value::Var { register, .. } | Value::Any { register, .. } => write_u32(w, *register),
  }
}

fn read_constant<R: Read>(r: &mut R) -> Result<Value, ImageError> {
  let tag = read_u8(r)?;
  let range = tag & Q_RANGE != 0;
  match tag & !Q_RANGE {
    constant_tag::NUMBER => Ok(Value::Number(read_i32(r)?)),
    constant_tag::ATOM => Ok(Value::Atom(Rc::from(read_cstr(r)?.as_str()))),
    constant_tag::TUPLE => {
      let arity = read_u8(r)?;
      let items = (0..arity).map(|_| read_constant(r)).collect::<Result<Vec<_>, _>>()?;
      Ok(Value::Tuple(items))
    }
    constant_tag::LIST => {
      let len = read_u32(r)?;
      let items = (0..len).map(|_| read_constant(r)).collect::<Result<Vec<_>, _>>()?;
      Ok(Value::List(items))
    }
    constant_tag::PATHID => {
      let module = read_cstr(r)?;
      let path = read_cstr(r)?;
      Ok(Value::PathId { module: Rc::from(module.as_str()), path: Rc::from(path.as_str()) })
    }
    constant_tag::VAR => Ok(Value::Var { register: read_u32(r)?, range }),
    constant_tag::ANY => Ok(Value::Any { register: read_u32(r)?, range }),
    other => Err(ImageError::UnsupportedConstantTag(other)),
  }
}

fn write_u24<W: Write>(w: &mut W, value: u32) -> io::Result<()> {
  let bytes = value.to_le_bytes();
  w.write_all(&bytes[..3])
}

fn read_u24<R: Read>(r: &mut R) -> Result<u32, ImageError> {
  let mut buf = [0u8; 4];
  r.read_exact(&mut buf[..3])?;
  Ok(u32::from_le_bytes(buf))
}

fn write_u32<W: Write>(w: &mut W, value: u32) -> io::Result<()> {
  w.write_all(&value.to_le_bytes())
}

fn read_u32<R: Read>(r: &mut R) -> Result<u32, ImageError> {
  let mut buf = [0u8; 4];
  r.read_exact(&mut buf)?;
  Ok(u32::from_le_bytes(buf))
}

fn write_i32<W: Write>(w: &mut W, value: i32) -> io::Result<()> {
  w.write_all(&value.to_le_bytes())
}

fn read_i32<R: Read>(r: &mut R) -> Result<i32, ImageError> {
  let mut buf = [0u8; 4];
  r.read_exact(&mut buf)?;
  Ok(i32::from_le_bytes(buf))
}

fn read_u8<R: Read>(r: &mut R) -> Result<u8, ImageError> {
  let mut buf = [0u8; 1];
  r.read_exact(&mut buf)?;
  Ok(buf[0])
}

fn read_str_of_len<R: Read>(r: &mut R, len: usize) -> Result<String, ImageError> {
  let mut buf = vec![0u8; len];
  r.read_exact(&mut buf)?;
  String::from_utf8(buf).map_err(|_| ImageError::InvalidUtf8)
}

fn write_cstr<W: Write>(w: &mut W, s: &str) -> io::Result<()> {
  w.write_all(s.as_bytes())?;
  w.write_all(&[0])
}

fn read_cstr<R: Read>(r: &mut R) -> Result<String, ImageError> {
  let mut bytes = Vec::new();
  loop {
    let b = read_u8(r)?;
    if b == 0 {
      break;
    }
    bytes.push(b);
  }
  String::from_utf8(bytes).map_err(|_| ImageError::InvalidUtf8)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::instruction::{Instruction, Reg, RegOrK};
  use crate::bytecode::opcode::Opcode;
  use span::Spanned;

  fn sample_clause() -> ClauseEntry {
    ClauseEntry {
      param: Pattern::Ident(Spanned::new(0..0, "x".to_string())),
      constants: vec![Value::Number(42), Value::Atom(Rc::from("ok"))],
      code: vec![
        Instruction::ad(Opcode::LoadK, Reg(1), 0),
        Instruction::abc(Opcode::Return, Reg(1), RegOrK::reg(0), RegOrK::reg(0)),
        Instruction::zero(),
      ],
      nreg: 2,
      nlocals: 1,
    }
  }

  #[test]
  fn round_trips_a_single_path_image() {
    let image = Image {
      module_name: Rc::from("mod"),
      paths: vec![PathEntry { name: Rc::from("f"), index: 0, clauses: vec![sample_clause()] }],
    };
    let bytes = to_bytes(&image);
    let paths = read(&mut &bytes[..]).unwrap();

    assert_eq!(paths.len(), 1);
    assert_eq!(&*paths[0].name, "f");
    assert_eq!(paths[0].clauses.len(), 1);
    assert_eq!(paths[0].clauses[0].constants, image.paths[0].clauses[0].constants);
    assert_eq!(paths[0].clauses[0].code, image.paths[0].clauses[0].code);
    assert_eq!(paths[0].clauses[0].nreg, 2);
  }

  #[test]
  fn round_trips_tuple_and_list_constants() {
    let clause = ClauseEntry {
      param: Pattern::Tuple(
        vec![Pattern::Ident(Spanned::new(0..0, "a".to_string())), Pattern::Ident(Spanned::new(0..0, "b".to_string()))],
        span::Span::from(0..0),
      ),
      constants: vec![
        Value::Tuple(vec![Value::Number(1), Value::Any { register: 0, range: false }]),
        Value::List(vec![Value::Atom(Rc::from("x")), Value::Var { register: 1, range: true }]),
      ],
      code: vec![Instruction::zero()],
      nreg: 3,
      nlocals: 2,
    };
    let image = Image { module_name: Rc::from("mod"), paths: vec![PathEntry { name: Rc::from("pair"), index: 0, clauses: vec![clause] }] };
    let bytes = to_bytes(&image);
    let paths = read(&mut &bytes[..]).unwrap();
    assert_eq!(paths[0].clauses[0].constants, image.paths[0].clauses[0].constants);
    match &paths[0].clauses[0].param {
      Pattern::Tuple(members, _) => assert_eq!(members.len(), 2),
      other => panic!("expected a tuple pattern, got {other:?}"),
    }
  }

  #[test]
  fn rejects_bad_magic() {
    let bytes = [0x00u8, 0xFF, 0xFF, 0xFF, 0, 0, 0, 0];
    let err = read(&mut &bytes[..]).unwrap_err();
    assert!(matches!(err, ImageError::BadMagic(0x00)));
  }

  #[test]
  fn rejects_bad_version() {
    let bytes = [MAGIC, 0x01, 0x00, 0x00, 0, 0, 0, 0];
    let err = read(&mut &bytes[..]).unwrap_err();
    assert!(matches!(err, ImageError::BadVersion));
  }

  #[test]
  fn truncated_input_fails_instead_of_panicking() {
    let bytes = [MAGIC, 0xFF, 0xFF, 0xFF, 1, 0];
    let err = read(&mut &bytes[..]).unwrap_err();
    assert!(matches!(err, ImageError::Io(_)));
  }
}
