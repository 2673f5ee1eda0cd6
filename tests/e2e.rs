use bough::ast::{Clause, Expr, ModuleRef, Module, Path, Pattern, SelectClause};
use bough::bytecode::opcode::Opcode;
use bough::{generate, image, Error};
use span::{Span, Spanned};

fn sp() -> Span {
  Span::from(0..0)
}

fn ident_pattern(name: &str) -> Pattern {
  Pattern::Ident(Spanned::new(sp(), name.to_string()))
}

fn number_pattern(lexeme: &str) -> Pattern {
  Pattern::Number(Spanned::new(sp(), lexeme.to_string()))
}

fn ident_expr(name: &str) -> Expr {
  Expr::Ident(Spanned::new(sp(), name.to_string()))
}

fn number_expr(lexeme: &str) -> Expr {
  Expr::Number(Spanned::new(sp(), lexeme.to_string()))
}

fn self_call(path_name: &str, arg: Expr) -> Expr {
  Expr::Apply {
    callee: Box::new(Expr::Access { module: ModuleRef::Current, name: Spanned::new(sp(), path_name.to_string()), span: sp() }),
    arg: Box::new(arg),
    span: sp(),
  }
}

fn module_of(paths: Vec<Path>) -> Module {
  Module { paths }
}

fn path(name: &str, param: Pattern, body: Vec<Expr>) -> Path {
  Path { name: Spanned::new(sp(), name.to_string()), clause: Clause { param, body, span: sp() }, span: sp() }
}

/// Every clause's code ends with an all-zero terminator word, which decodes
/// the same as `MOVE r0,r0,r0` (there is no separate tag bit for it) — excluded
/// here so tests can compare against the real instruction sequence.
fn opcodes(code: &[bough::instruction::Instruction]) -> Vec<Opcode> {
  code.iter().filter(|i| !i.is_zero()).filter_map(|i| i.opcode()).collect()
}

#[test]
fn identity_clause_returns_its_argument() {
  let module = module_of(vec![path("f", ident_pattern("X"), vec![ident_expr("X")])]);
  let image = generate("m", &module).unwrap();

  assert_eq!(image.paths.len(), 1);
  let clause = &image.paths[0].clauses[0];
  assert_eq!(opcodes(&clause.code), vec![Opcode::Return]);
  // r0 is reserved for comparison predicates; the parameter itself is r1.
  assert_eq!(clause.nreg, 2);
}

#[test]
fn add_clause_destructures_a_tuple_parameter() {
  let module = module_of(vec![path(
    "add",
    Pattern::Tuple(vec![ident_pattern("X"), ident_pattern("Y")], sp()),
    vec![Expr::Add(Box::new(ident_expr("X")), Box::new(ident_expr("Y")), sp())],
  )]);
  let image = generate("m", &module).unwrap();

  let clause = &image.paths[0].clauses[0];
  assert_eq!(opcodes(&clause.code), vec![Opcode::Add, Opcode::Return]);
  // r0 reserved, X = r1, Y = r2, the ADD result = r3.
  assert_eq!(clause.nreg, 4);
}

#[test]
fn pair_clause_builds_a_two_element_tuple() {
  let module = module_of(vec![path(
    "pair",
    Pattern::Tuple(vec![ident_pattern("X"), ident_pattern("Y")], sp()),
    vec![Expr::Tuple(vec![ident_expr("X"), ident_expr("Y")], sp())],
  )]);
  let image = generate("m", &module).unwrap();

  let clause = &image.paths[0].clauses[0];
  assert_eq!(
    opcodes(&clause.code),
    vec![Opcode::Tuple, Opcode::SetTuple, Opcode::SetTuple, Opcode::Return]
  );
}

#[test]
fn select_in_tail_position_emits_tailcall_in_the_recursive_arm() {
  // countdown(N): select N { 0 -> 0 ; M -> .countdown(M - 1) }
  let select = Expr::Select {
    arg: Some(Box::new(ident_expr("N"))),
    clauses: vec![
      SelectClause { pattern: Some(number_pattern("0")), guards: vec![], body: vec![number_expr("0")], span: sp() },
      SelectClause {
        pattern: Some(ident_pattern("M")),
        guards: vec![],
        body: vec![self_call("countdown", Expr::Sub(Box::new(ident_expr("M")), Box::new(number_expr("1")), sp()))],
        span: sp(),
      },
    ],
    span: sp(),
  };
  let module = module_of(vec![path("countdown", ident_pattern("N"), vec![select])]);
  let image = generate("m", &module).unwrap();

  let clause = &image.paths[0].clauses[0];
  let ops = opcodes(&clause.code);
  assert!(ops.contains(&Opcode::TailCall), "expected a TAILCALL in {ops:?}");
  assert!(ops.contains(&Opcode::Return), "the non-recursive arm still returns a value: {ops:?}");
  // TAILCALL unconditionally ends the frame, so it is the last real
  // instruction before the all-zero clause terminator.
  assert!(clause.code.last().unwrap().is_zero());
  assert_eq!(clause.code[clause.code.len() - 2].opcode(), Some(Opcode::TailCall));
}

#[test]
fn duplicate_path_names_are_rejected() {
  let module = module_of(vec![
    path("f", ident_pattern("X"), vec![ident_expr("X")]),
    path("f", ident_pattern("Y"), vec![ident_expr("Y")]),
  ]);
  let err = generate("m", &module).unwrap_err();
  assert!(matches!(err, Error::DuplicatePath { .. }));
}

#[test]
fn undefined_identifiers_are_rejected() {
  let module = module_of(vec![path("g", ident_pattern("X"), vec![ident_expr("not_bound")])]);
  let err = generate("m", &module).unwrap_err();
  assert!(matches!(err, Error::Undefined { .. }));
}

#[test]
fn image_round_trips_through_bytes() {
  let module = module_of(vec![path(
    "pair",
    Pattern::Tuple(vec![ident_pattern("X"), ident_pattern("Y")], sp()),
    vec![Expr::Tuple(vec![ident_expr("X"), ident_expr("Y")], sp())],
  )]);
  let built = generate("m", &module).unwrap();

  let bytes = image::to_bytes(&built);
  let read_back = image::read(&mut &bytes[..]).unwrap();

  assert_eq!(read_back.len(), built.paths.len());
  assert_eq!(&*read_back[0].name, &*built.paths[0].name);
  assert_eq!(read_back[0].clauses[0].code, built.paths[0].clauses[0].code);
  assert_eq!(read_back[0].clauses[0].constants, built.paths[0].clauses[0].constants);
  assert_eq!(read_back[0].clauses[0].nreg, built.paths[0].clauses[0].nreg);
}
