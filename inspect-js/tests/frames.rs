mod common;

use common::assert_json_eq;
use inspect_js::program::build::*;
use inspect_js::Category;
use inspect_js::Control;
use inspect_js::FrameId;
use inspect_js::Observer;
use inspect_js::Pause;
use inspect_js::PauseEvent;
use inspect_js::Program;
use inspect_js::ScopeKind;
use inspect_js::ScopeViewKind;
use inspect_js::SimError;
use inspect_js::SimOptions;
use inspect_js::Simulator;
use inspect_js::Snapshot;
use inspect_js::SnapshotRecorder;
use inspect_js::Value;
use serde_json::json;

/// Takes every view twice at each `debugger` and checks they agree.
#[derive(Default)]
struct TwiceObserver {
  snapshots: Vec<Snapshot>,
  chains: Vec<Vec<ScopeViewKind>>,
}

impl Observer for TwiceObserver {
  fn on_debugger(&mut self, pause: &Pause<'_>, _label: Option<&str>) -> Control {
    let first = pause.inspector.snapshot(pause.frame).unwrap();
    let second = pause.inspector.snapshot(pause.frame).unwrap();
    assert_eq!(first, second);
    assert_eq!(pause.inspector.current().unwrap(), first);
    let chain = pause.inspector.scope_chain(pause.frame).unwrap();
    assert_eq!(chain, pause.inspector.scope_chain(pause.frame).unwrap());
    self.chains.push(chain.iter().map(|view| view.kind).collect());
    self.snapshots.push(first);
    Control::Continue
  }
}

fn observe(body: Vec<inspect_js::program::Stmt>) -> TwiceObserver {
  let mut program = Program::new(body);
  let mut sim = Simulator::new(&mut program, SimOptions::default()).unwrap();
  let mut observer = TwiceObserver::default();
  sim.run(&mut observer).unwrap();
  observer
}

#[test]
fn snapshot_lists_innermost_scope_first() {
  // var g = 1; function f(p) { var local = 2; { let inner = 3; debugger; } } f(0);
  let observer = observe(vec![
    var("g", num(1.0)),
    func_decl(
      "f",
      &["p"],
      vec![
        var("local", num(2.0)),
        block(vec![let_("inner", num(3.0)), debugger("in block")]),
      ],
    ),
    expr(call_id("f", vec![num(0.0)])),
  ]);
  let snapshot = &observer.snapshots[0];
  assert_eq!(snapshot.function, "f");
  assert_eq!(snapshot.names(), ["inner", "p", "local", "g", "f"]);
  assert_eq!(
    observer.chains[0],
    [ScopeViewKind::Block, ScopeViewKind::Local, ScopeViewKind::Global]
  );
}

#[test]
fn inner_binding_shadows_outer() {
  // var x = "global"; function f() { var x = "local"; debugger; } f(); debugger;
  let observer = observe(vec![
    var("x", str_("global")),
    func_decl(
      "f",
      &[],
      vec![var("x", str_("local")), debugger("in f")],
    ),
    expr(call_id("f", vec![])),
    debugger("at top"),
  ]);
  let in_f = &observer.snapshots[0];
  assert_eq!(in_f.entries.iter().filter(|e| e.name == "x").count(), 1);
  let x = in_f.get("x").unwrap();
  assert_eq!(x.scope_kind, ScopeKind::Function);
  assert_eq!(x.value.value(), Some(&Value::String("local".to_string())));

  let at_top = &observer.snapshots[1];
  assert_eq!(at_top.function, inspect_js::GLOBAL_FRAME_NAME);
  assert_eq!(
    at_top.value("x"),
    Some(&Value::String("global".to_string()))
  );
  assert_eq!(observer.chains[1], [ScopeViewKind::Global]);
}

#[test]
fn scope_chain_marks_captured_scopes_as_closure() {
  // function outer() { var v = 1; function inner() { var w = v; debugger; } inner(); } outer();
  let observer = observe(vec![
    func_decl(
      "outer",
      &[],
      vec![
        var("v", num(1.0)),
        func_decl("inner", &[], vec![var("w", id("v")), debugger("inner")]),
        expr(call_id("inner", vec![])),
      ],
    ),
    expr(call_id("outer", vec![])),
  ]);
  assert_eq!(
    observer.chains[0],
    [
      ScopeViewKind::Local,
      ScopeViewKind::Closure,
      ScopeViewKind::Global
    ]
  );
  assert_eq!(observer.snapshots[0].value("w"), Some(&Value::Number(1.0)));
}

#[test]
fn snapshot_serializes_with_remote_values() {
  // function f(p) { let q = "s"; debugger; } f(7);
  let observer = observe(vec![
    func_decl(
      "f",
      &["p"],
      vec![let_("q", str_("s")), debugger("in f")],
    ),
    expr(call_id("f", vec![num(7.0)])),
  ]);
  assert_json_eq(
    json!({
      "frame": 1,
      "function": "f",
      "entries": [
        {
          "name": "p",
          "kind": "param",
          "scope": 1,
          "scopeKind": "function",
          "value": {
            "state": "initialized",
            "value": 7.0,
            "remote": {
              "category": { "category": "integerNumber" },
              "type": "number",
              "description": "7"
            }
          }
        },
        {
          "name": "q",
          "kind": "let",
          "scope": 1,
          "scopeKind": "function",
          "value": {
            "state": "initialized",
            "value": "s",
            "remote": {
              "category": { "category": "string" },
              "type": "string",
              "description": "s"
            }
          }
        },
        {
          "name": "f",
          "kind": "function",
          "scope": 0,
          "scopeKind": "global",
          "value": {
            "state": "initialized",
            "value": { "object": 0 },
            "remote": {
              "category": { "category": "function" },
              "type": "function",
              "className": "Function",
              "description": "function f( { [js code] }",
              "object": 0
            }
          }
        }
      ]
    }),
    &observer.snapshots[0],
  );
}

#[test]
fn recorder_sees_calls_and_returns() {
  // function f(n) { debugger; return n * 2; } f(1); f(2);
  let mut program = Program::new(vec![
    func_decl(
      "f",
      &["n"],
      vec![debugger("body"), ret(mul(id("n"), num(2.0)))],
    ),
    expr(call_id("f", vec![num(1.0)])),
    expr(call_id("f", vec![num(2.0)])),
  ]);
  let mut sim = Simulator::new(&mut program, SimOptions::default()).unwrap();
  let mut recorder = SnapshotRecorder::with_calls();
  sim.run(&mut recorder).unwrap();

  let events: Vec<_> = recorder
    .records()
    .iter()
    .map(|r| match &r.event {
      PauseEvent::Debugger { .. } => "debugger",
      PauseEvent::Call => "call",
      PauseEvent::Return { .. } => "return",
    })
    .collect();
  assert_eq!(
    events,
    ["call", "debugger", "return", "call", "debugger", "return"]
  );

  let frames: Vec<_> = recorder.at("body").map(|s| s.frame).collect();
  assert_eq!(frames.len(), 2);
  assert!(frames[0] < frames[1]);
  assert!(frames.iter().all(|f| *f != FrameId::GLOBAL));

  match &recorder.records()[5].event {
    PauseEvent::Return { value } => {
      assert_eq!(value.category, Category::IntegerNumber);
      assert_eq!(value.description, "4");
    }
    other => panic!("unexpected event {other:?}"),
  }

  // Frames that have returned can no longer be inspected.
  let inspector = sim.inspector();
  assert_eq!(
    inspector.snapshot(frames[0]).unwrap_err(),
    SimError::UnknownFrame(frames[0])
  );
  assert!(inspector.snapshot(FrameId::GLOBAL).is_ok());
}

#[test]
fn frame_records_arguments_and_caller() {
  struct Check {
    checked: bool,
  }

  impl Observer for Check {
    fn on_debugger(&mut self, pause: &Pause<'_>, _label: Option<&str>) -> Control {
      let stack = pause.inspector.stack();
      assert_eq!(pause.depth, 3);
      let names: Vec<_> = stack.iter().map(|f| f.name.as_str()).collect();
      assert_eq!(names, [inspect_js::GLOBAL_FRAME_NAME, "a", "b"]);
      let top = stack.top().unwrap();
      assert_eq!(top.id, pause.frame);
      assert_eq!(top.arguments, [Value::Number(5.0), Value::Undefined]);
      let caller = stack.get(top.caller.unwrap()).unwrap();
      assert_eq!(caller.name, "a");
      assert_eq!(caller.caller, Some(FrameId::GLOBAL));
      self.checked = true;
      Control::Continue
    }
  }

  // function b(x, y) { debugger; } function a() { b(5, undefined); } a();
  let mut program = Program::new(vec![
    func_decl("b", &["x", "y"], vec![debugger("b")]),
    func_decl(
      "a",
      &[],
      vec![expr(call_id("b", vec![num(5.0), undefined()]))],
    ),
    expr(call_id("a", vec![])),
  ]);
  let mut sim = Simulator::new(&mut program, SimOptions::default()).unwrap();
  let mut check = Check { checked: false };
  sim.run(&mut check).unwrap();
  assert!(check.checked);
}

#[test]
fn runs_are_deterministic() {
  let body = || {
    vec![
      var("acc", array(vec![])),
      func_decl(
        "f",
        &["i"],
        vec![
          let_("sq", mul(id("i"), id("i"))),
          expr(method(id("acc"), "push", vec![id("sq")])),
          debugger("f"),
        ],
      ),
      for_(
        Some(let_("i", num(0.0))),
        Some(lt(id("i"), num(4.0))),
        Some(inc("i")),
        vec![expr(call_id("f", vec![id("i")]))],
      ),
    ]
  };
  let run = || {
    let mut program = Program::new(body());
    let mut sim = Simulator::new(&mut program, SimOptions::default()).unwrap();
    let mut recorder = SnapshotRecorder::with_calls();
    sim.run(&mut recorder).unwrap();
    serde_json::to_value(recorder.records()).unwrap()
  };
  assert_eq!(run(), run());

  // Running the same simulator twice starts from scratch.
  let mut program = Program::new(body());
  let mut sim = Simulator::new(&mut program, SimOptions::default()).unwrap();
  let mut first = SnapshotRecorder::new();
  sim.run(&mut first).unwrap();
  let mut second = SnapshotRecorder::new();
  sim.run(&mut second).unwrap();
  assert_eq!(first.records(), second.records());
}
