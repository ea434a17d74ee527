use inspect_js::program::build::*;
use inspect_js::program::Expr;
use inspect_js::program::IfStmt;
use inspect_js::program::Stmt;
use inspect_js::DeclKind;
use inspect_js::InspectedValue;
use inspect_js::Observer;
use inspect_js::Pause;
use inspect_js::Program;
use inspect_js::Recovery;
use inspect_js::SimError;
use inspect_js::SimOptions;
use inspect_js::Simulator;
use inspect_js::SnapshotRecorder;
use inspect_js::Value;

fn record(body: Vec<Stmt>) -> SnapshotRecorder {
  let mut program = Program::new(body);
  let mut sim = Simulator::new(&mut program, SimOptions::default()).unwrap();
  let mut recorder = SnapshotRecorder::new();
  sim.run(&mut recorder).unwrap();
  recorder
}

#[test]
fn var_is_visible_before_its_declaration() {
  // function f() { debugger; { { var deep = 1; } } debugger; } f();
  let recorder = record(vec![
    func_decl(
      "f",
      &[],
      vec![
        debugger("before"),
        block(vec![block(vec![var("deep", num(1.0))])]),
        debugger("after"),
      ],
    ),
    expr(call_id("f", vec![])),
  ]);
  let before = recorder.first_at("before").unwrap();
  let deep = before.get("deep").unwrap();
  assert_eq!(deep.kind, DeclKind::Var);
  assert_eq!(deep.value.value(), Some(&Value::Undefined));
  let after = recorder.first_at("after").unwrap();
  assert_eq!(after.value("deep"), Some(&Value::Number(1.0)));
}

#[test]
fn lexical_binding_is_uninitialized_until_declared() {
  // { debugger; let x = 1; debugger; }
  let recorder = record(vec![block(vec![
    debugger("before"),
    let_("x", num(1.0)),
    debugger("after"),
  ])]);
  let before = recorder.first_at("before").unwrap();
  assert_eq!(before.get("x").unwrap().value, InspectedValue::Uninitialized);
  let after = recorder.first_at("after").unwrap();
  assert_eq!(after.value("x"), Some(&Value::Number(1.0)));
}

#[test]
fn reading_in_dead_zone_fails() {
  // var r = y; let y = 1;
  let mut program = Program::new(vec![var("r", id("y")), let_("y", num(1.0))]);
  let mut sim = Simulator::new(&mut program, SimOptions::default()).unwrap();
  assert_eq!(
    sim.run_to_end().unwrap_err(),
    SimError::UninitializedBindingAccess {
      name: "y".to_string()
    }
  );
}

struct SkipErrors {
  skipped: Vec<SimError>,
}

impl Observer for SkipErrors {
  fn on_error(&mut self, _pause: &Pause<'_>, error: &SimError) -> Recovery {
    self.skipped.push(error.clone());
    Recovery::SkipStatement
  }
}

#[test]
fn dead_zone_error_can_be_skipped() {
  let mut program = Program::new(vec![
    var("r", id("y")),
    let_("y", num(1.0)),
    expr(assign("r", add(id("y"), num(1.0)))),
  ]);
  let mut sim = Simulator::new(&mut program, SimOptions::default()).unwrap();
  let mut observer = SkipErrors {
    skipped: Vec::new(),
  };
  sim.run(&mut observer).unwrap();
  assert_eq!(observer.skipped.len(), 1);
  assert_eq!(sim.global("r").unwrap(), Value::Number(2.0));
  assert_eq!(sim.global("y").unwrap(), Value::Number(1.0));
}

#[test]
fn unresolved_names_are_never_skipped() {
  let mut program = Program::new(vec![expr(id("missing"))]);
  let mut sim = Simulator::new(&mut program, SimOptions::default()).unwrap();
  let mut observer = SkipErrors {
    skipped: Vec::new(),
  };
  assert!(matches!(
    sim.run(&mut observer),
    Err(SimError::Unresolved { .. })
  ));
  assert!(observer.skipped.is_empty());
}

#[test]
fn lexical_and_hoisted_var_conflict_in_either_order() {
  // let a; { var a; }
  let mut program = Program::new(vec![let_("a", None), block(vec![var("a", None)])]);
  assert!(matches!(
    Simulator::new(&mut program, SimOptions::default()),
    Err(SimError::DuplicateDeclaration { name, .. }) if name == "a"
  ));
  // { var a; } let a;
  let mut program = Program::new(vec![block(vec![var("a", None)]), let_("a", None)]);
  assert!(matches!(
    Simulator::new(&mut program, SimOptions::default()),
    Err(SimError::DuplicateDeclaration { name, .. }) if name == "a"
  ));
  // var a; { let a; } is fine.
  let mut program = Program::new(vec![var("a", None), block(vec![let_("a", None)])]);
  assert!(Simulator::new(&mut program, SimOptions::default()).is_ok());
}

#[test]
fn block_function_is_created_on_block_entry() {
  // var before = typeof g; { function g() { return 1; } } var after = g();
  let mut program = Program::new(vec![
    var("before", unary(inspect_js::program::UnaryOp::Typeof, id("g"))),
    block(vec![func_decl("g", &[], vec![ret(num(1.0))])]),
    var("after", call_id("g", vec![])),
  ]);
  let mut sim = Simulator::new(&mut program, SimOptions::default()).unwrap();
  sim.run_to_end().unwrap();
  assert_eq!(
    sim.global("before").unwrap(),
    Value::String("undefined".to_string())
  );
  assert_eq!(sim.global("after").unwrap(), Value::Number(1.0));
}

#[test]
fn function_as_bare_if_branch_is_created_when_taken() {
  // if (true) function g() { return 1; } else function h() {}
  // if (false) function k() {}
  // var r = g(); var sh = typeof h; var sk = typeof k;
  let bare_if = |test: Expr, consequent: Stmt, alternate: Option<Stmt>| {
    Stmt::If(IfStmt {
      test,
      consequent: Box::new(consequent),
      alternate: alternate.map(Box::new),
    })
  };
  let mut program = Program::new(vec![
    bare_if(
      boolean(true),
      func_decl("g", &[], vec![ret(num(1.0))]),
      Some(func_decl("h", &[], vec![])),
    ),
    bare_if(boolean(false), func_decl("k", &[], vec![]), None),
    var("r", call_id("g", vec![])),
    var("sh", unary(inspect_js::program::UnaryOp::Typeof, id("h"))),
    var("sk", unary(inspect_js::program::UnaryOp::Typeof, id("k"))),
  ]);
  let mut sim = Simulator::new(&mut program, SimOptions::default()).unwrap();
  sim.run_to_end().unwrap();
  assert_eq!(sim.global("r").unwrap(), Value::Number(1.0));
  assert_eq!(sim.global("sh").unwrap(), Value::from("undefined"));
  assert_eq!(sim.global("sk").unwrap(), Value::from("undefined"));
}

#[test]
fn implicit_globals_are_opt_in() {
  // function f() { ghost = 5; } f();
  let body = || {
    vec![
      func_decl("f", &[], vec![expr(assign("ghost", num(5.0)))]),
      expr(call_id("f", vec![])),
    ]
  };
  let mut program = Program::new(body());
  let mut sim = Simulator::new(&mut program, SimOptions::default()).unwrap();
  assert_eq!(
    sim.run_to_end().unwrap_err(),
    SimError::Unresolved {
      name: "ghost".to_string()
    }
  );

  let mut program = Program::new(body());
  let options = SimOptions {
    implicit_globals: true,
    ..SimOptions::default()
  };
  let mut sim = Simulator::new(&mut program, options).unwrap();
  sim.run_to_end().unwrap();
  assert_eq!(sim.global("ghost").unwrap(), Value::Number(5.0));
  let global = sim.env().chain(sim.stack().top().unwrap().scope).last().unwrap();
  let ghost = sim.env().find(global, "ghost").unwrap();
  assert!(sim.env().binding(ghost).implicit);
}
