//! The generator: walks a borrowed AST and lowers it into bytecode images,
//! one clause buffer at a time. The per-run `Generator` state and its
//! top-level entry point follow a `State`/`Function`-style compiler struct;
//! the node-by-node lowering rules (tail-call detection, pattern
//! construction, `select`'s two-pass patching) are the component's own.

mod expr;
pub mod error;
mod pattern;
pub mod regalloc;
mod select;

pub use error::Error;

use std::rc::Rc;

use span::Span;

use crate::ast;
use crate::bytecode::builder::CodeBuffer;
use crate::bytecode::opcode::Opcode;
use crate::instruction::{Instruction, Reg, RegOrK};
use crate::symtab::{PathSymbol, SymbolTable};
use crate::value::{ConstantPool, Interner, Value};
use regalloc::RegAlloc;

/// One function clause's finished artifact: its parameter pattern (kept for
/// the image writer), constant table, code, and register/local counts.
#[derive(Debug)]
pub struct ClauseEntry {
  pub param: ast::Pattern,
  pub constants: Vec<Value>,
  pub code: Vec<Instruction>,
  pub nreg: u8,
  pub nlocals: u32,
}

/// A named top-level definition. Currently always exactly one clause; the
/// array shape is kept because the image format reserves a count.
#[derive(Debug)]
pub struct PathEntry {
  pub name: Rc<str>,
  pub index: u32,
  pub clauses: Vec<ClauseEntry>,
}

/// The complete output of one generation run, ready for `image::write`.
#[derive(Debug)]
pub struct Image {
  pub module_name: Rc<str>,
  pub paths: Vec<PathEntry>,
}

/// What one expression lowering hands back to its caller: either an operand
/// usable directly in another instruction's B/C slot, or a marker for the
/// two cases where there is no value at all.
#[derive(Clone, Copy)]
pub(crate) enum Operand {
  Reg(Reg),
  K(RegOrK),
  /// An identifier lookup that failed in a context that tolerates it
  /// (pattern analysis walks call this instead of erroring outright).
  Unbound,
  /// The result of a comparison or `OMATCH`: a predicate consumed by the
  /// jump emitted right after it, not a value a caller can use.
  NoValue,
}

/// Per-clause mutable state: the pieces owned by `ClauseEntry` plus the
/// register allocator and growing code buffer used while building it.
#[derive(Default)]
pub(crate) struct ClauseBuilder {
  pub(crate) regs: RegAlloc,
  pub(crate) code: CodeBuffer,
  pub(crate) constants: ConstantPool,
  pub(crate) nlocals: u32,
}

/// Generation-wide state: symbol tables, the atom/path-name interner, and
/// the paths lowered so far. There is one of these per `generate` call; it
/// never survives past that call's `Result`.
struct Generator {
  symtab: SymbolTable,
  interner: Interner,
  module_name: Rc<str>,
  /// The path currently being lowered, used for tail-call detection: a call
  /// is a tail call only if its callee's name matches this one.
  active_path_name: Option<Rc<str>>,
  paths: Vec<PathEntry>,
}

impl Generator {
  fn new(module_name: Rc<str>) -> Self {
    Self {
      symtab: SymbolTable::new(),
      interner: Interner::new(),
      module_name,
      active_path_name: None,
      paths: Vec::new(),
    }
  }

  fn emit_path(&mut self, path: &ast::Path) -> Result<(), Error> {
    let name = path.name.to_string();
    if self.symtab.paths.lookup(&name).is_some() {
      return Err(Error::DuplicatePath { name, span: path.span });
    }
    let index = self.paths.len() as u32;
    self.symtab.paths.insert(name.clone(), PathSymbol { index });

    let interned_name = self.interner.intern(&name);
    self.active_path_name = Some(interned_name.clone());
    let clause = self.emit_clause(&path.clause)?;
    self.active_path_name = None;

    self.paths.push(PathEntry { name: interned_name, index, clauses: vec![clause] });
    Ok(())
  }

  fn emit_clause(&mut self, clause_ast: &ast::Clause) -> Result<ClauseEntry, Error> {
    self.symtab.vars.enter_scope();
    let mut cb = ClauseBuilder::default();
    self.declare_pattern_locals(&mut cb, &clause_ast.param)?;
    let body_operand = self.emit_block(&mut cb, &clause_ast.body, true)?;
    self.symtab.vars.exit_scope();

    if cb.code.last().and_then(Instruction::opcode) != Some(Opcode::TailCall) {
      let result = self.materialize(&mut cb, body_operand, clause_ast.span)?;
      cb.code.emit(Instruction::abc(Opcode::Return, result, RegOrK::reg(0), RegOrK::reg(0)));
    }
    cb.code.emit(Instruction::zero());

    Ok(ClauseEntry {
      param: clause_ast.param.clone(),
      constants: cb.constants.values().to_vec(),
      code: cb.code.into_words(),
      nreg: cb.regs.high_water(),
      nlocals: cb.nlocals,
    })
  }

  /// Lowers each child in order; the last child's operand is the block's
  /// operand. `is_tail` is threaded down only to the last child, and only
  /// when `self` is itself in tail position — this is how tail-call
  /// detection propagates through nested blocks without comparing pointers.
  pub(crate) fn emit_block(
    &mut self,
    cb: &mut ClauseBuilder,
    exprs: &[ast::Expr],
    is_tail: bool,
  ) -> Result<Operand, Error> {
    let mut result = Operand::NoValue;
    for (i, expr) in exprs.iter().enumerate() {
      let last = i + 1 == exprs.len();
      result = self.emit_expr(cb, expr, is_tail && last)?;
    }
    Ok(result)
  }

  /// Forces an operand into a plain register, emitting `LOADK` for a
  /// constant operand. Fails if the operand carries no value at all.
  pub(crate) fn materialize(&mut self, cb: &mut ClauseBuilder, operand: Operand, span: Span) -> Result<Reg, Error> {
    match operand {
      Operand::Reg(r) => Ok(r),
      Operand::K(k) => {
        let r = cb.regs.alloc();
        cb.code.emit(Instruction::ad(Opcode::LoadK, r, k.index()));
        Ok(r)
      }
      Operand::Unbound | Operand::NoValue => {
        Err(Error::Internal { node_kind: "value used where none was produced", span })
      }
    }
  }

  /// Converts an operand into a `RegOrK` byte for direct use in an
  /// instruction's B/C slot, without forcing a `LOADK`.
  pub(crate) fn to_rk(&mut self, operand: Operand, span: Span) -> Result<RegOrK, Error> {
    match operand {
      Operand::Reg(r) => Ok(RegOrK::reg(r.0)),
      Operand::K(k) => Ok(k),
      Operand::Unbound | Operand::NoValue => {
        Err(Error::Internal { node_kind: "value used where none was produced", span })
      }
    }
  }

  pub(crate) fn lookup_ident(&self, name: &str) -> Option<Reg> {
    self.symtab.vars.lookup(name).map(|sym| sym.register)
  }
}

/// Lowers `module` into a bytecode image. `module_name` becomes the image's
/// module name and the identity an `OACCESS .name` self-reference resolves
/// against.
pub fn generate(module_name: impl Into<Rc<str>>, module: &ast::Module) -> Result<Image, Error> {
  let mut gen = Generator::new(module_name.into());
  for path in &module.paths {
    gen.emit_path(path)?;
  }
  Ok(Image { module_name: gen.module_name, paths: gen.paths })
}
