mod common;

use common::assert_json_eq;
use inspect_js::program::build::*;
use inspect_js::program::UnaryOp;
use inspect_js::Builtin;
use inspect_js::Category;
use inspect_js::ContainerKind;
use inspect_js::EntryRange;
use inspect_js::Program;
use inspect_js::Signedness;
use inspect_js::SimOptions;
use inspect_js::Simulator;
use inspect_js::SnapshotRecorder;
use inspect_js::TypedArrayKind;
use inspect_js::Value;
use serde_json::json;

fn typed(kind: TypedArrayKind) -> Builtin {
  Builtin::TypedArray(kind)
}

fn container(kind: ContainerKind) -> Builtin {
  Builtin::Container(kind)
}

// var o = { foo: function () { var n1 = 10; ...; debugger; } }; o.foo();
fn variables_program() -> Program {
  let body = vec![
    var("n1", num(10.0)),
    var("n2", num(1.5)),
    var("n3", construct(Builtin::Number, vec![num(999.0)])),
    var("s1", str_("str")),
    var("s2", construct(Builtin::String, vec![str_("ab")])),
    var("b1", boolean(true)),
    var("b2", construct(Builtin::Boolean, vec![boolean(false)])),
    var("u", None),
    var("nl", null()),
    var("obj", object(vec![("a", num(1.0))])),
    var("arr", array(vec![num(1.0), num(2.0), num(3.0)])),
    func_decl("fn", &[], vec![]),
    var("re", regex("ab+c", "gi")),
    var("buf", construct(Builtin::ArrayBuffer, vec![num(12.0)])),
    var("view", construct(Builtin::DataView, vec![id("buf"), num(4.0)])),
    var(
      "i8",
      construct(
        typed(TypedArrayKind::Int8),
        vec![array(vec![num(1.0), num(-1.0)])],
      ),
    ),
    var("big", bigint("9007199254740993")),
    var(
      "m",
      construct(
        Builtin::Map,
        vec![array(vec![
          array(vec![num(1.0), str_("one")]),
          array(vec![str_("k"), id("obj")]),
        ])],
      ),
    ),
    var(
      "st",
      construct(Builtin::Set, vec![array(vec![num(1.0), str_("x"), num(1.0)])]),
    ),
    var("wm", construct(Builtin::WeakMap, vec![])),
    expr(method(id("wm"), "set", vec![id("obj"), num(1.0)])),
    var("ws", construct(Builtin::WeakSet, vec![])),
    var("list", construct(container(ContainerKind::ArrayList), vec![])),
    expr(method(id("list"), "add", vec![num(1.0)])),
    expr(method(id("list"), "add", vec![num(2.0)])),
    var("tree", construct(container(ContainerKind::TreeMap), vec![])),
    expr(method(id("tree"), "set", vec![str_("b"), num(2.0)])),
    expr(method(id("tree"), "set", vec![str_("a"), num(1.0)])),
    debugger("vars"),
  ];
  Program::new(vec![
    var("o", object(vec![("foo", func_expr(None, &[], body))])),
    expr(method(id("o"), "foo", vec![])),
  ])
}

#[test]
fn variables_are_classified_and_described() {
  let mut program = variables_program();
  let mut sim = Simulator::new(&mut program, SimOptions::default()).unwrap();
  let mut recorder = SnapshotRecorder::new();
  sim.run(&mut recorder).unwrap();
  let snapshot = recorder.first_at("vars").unwrap();

  let expected = [
    ("n1", Category::IntegerNumber, "10"),
    ("n2", Category::FloatNumber, "1.5"),
    (
      "n3",
      Category::BoxedNumber,
      "Number{[[PrimitiveValue]]: 999}",
    ),
    ("s1", Category::String, "str"),
    ("s2", Category::BoxedString, "String{[[PrimitiveValue]]: ab}"),
    ("b1", Category::Boolean, "true"),
    (
      "b2",
      Category::BoxedBoolean,
      "Boolean{[[PrimitiveValue]]: false}",
    ),
    ("u", Category::Undefined, "undefined"),
    ("nl", Category::Null, "null"),
    ("obj", Category::ObjectLiteral, "Object"),
    ("arr", Category::Array, "Array(3)"),
    ("fn", Category::Function, "function fn( { [js code] }"),
    ("re", Category::RegularExpression, "/ab+c/gi"),
    ("buf", Category::ByteBuffer, "ArrayBuffer(12)"),
    ("view", Category::DataView, "Object"),
    (
      "i8",
      Category::FixedWidthNumericArray {
        kind: TypedArrayKind::Int8,
        element_width: 1,
        signedness: Signedness::Signed,
      },
      "Int8Array(2)",
    ),
    ("big", Category::BigInteger, "9007199254740993n"),
    ("m", Category::OrderedMap, "Map(2) {1 => 'one', 'k' => Object}"),
    ("st", Category::OrderedSet, "Set(2) {1, 'x'}"),
    ("wm", Category::WeakMap, "WeakMap(1)"),
    ("ws", Category::WeakSet, "WeakSet(0)"),
    (
      "list",
      Category::LinkedContainerVariant {
        kind: ContainerKind::ArrayList,
      },
      "ArrayList(2)",
    ),
    (
      "tree",
      Category::LinkedContainerVariant {
        kind: ContainerKind::TreeMap,
      },
      "TreeMap(2)",
    ),
  ];
  for (name, category, description) in expected {
    let remote = snapshot
      .get(name)
      .and_then(|e| e.value.remote())
      .unwrap_or_else(|| panic!("{name} is not visible"));
    assert_eq!(remote.category, category, "category of {name}");
    assert_eq!(remote.description, description, "description of {name}");
  }

  let buf = snapshot.get("buf").unwrap().value.remote().unwrap();
  assert_eq!(buf.class_name.as_deref(), Some("Arraybuffer"));
  assert_eq!(buf.subtype, Some("arraybuffer"));
}

#[test]
fn entries_list_contents() {
  let mut program = variables_program();
  let mut sim = Simulator::new(&mut program, SimOptions::default()).unwrap();
  let mut recorder = SnapshotRecorder::new();
  sim.run(&mut recorder).unwrap();
  let snapshot = recorder.first_at("vars").unwrap();
  let inspector = sim.inspector();
  let value = |name: &str| snapshot.value(name).cloned().unwrap();

  let names = |name: &str| -> Vec<String> {
    inspector
      .entries(&value(name), None)
      .entries
      .into_iter()
      .map(|e| e.name)
      .collect()
  };
  let descriptions = |name: &str| -> Vec<String> {
    inspector
      .entries(&value(name), None)
      .entries
      .into_iter()
      .map(|e| e.value.description)
      .collect()
  };

  assert_eq!(names("obj"), ["a"]);
  assert_eq!(names("s2"), ["0", "1"]);
  assert_eq!(descriptions("s2"), ["a", "b"]);
  assert_eq!(names("i8"), ["         0", "         1"]);
  assert_eq!(descriptions("i8"), ["1", "-1"]);
  assert_eq!(descriptions("list"), ["1", "2"]);

  // Tree-backed containers keep their keys sorted.
  let tree = inspector.entries(&value("tree"), None);
  let keys: Vec<_> = tree
    .entries
    .iter()
    .map(|e| e.key.as_ref().unwrap().description.clone())
    .collect();
  assert_eq!(keys, ["a", "b"]);

  let obj = value("obj").as_object().unwrap().raw();
  let map = inspector.entries(&value("m"), Some(EntryRange { start: 1, count: 1 }));
  assert_json_eq(
    json!({
      "total": 2,
      "start": 1,
      "entries": [
        {
          "name": "1",
          "key": {
            "category": { "category": "string" },
            "type": "string",
            "description": "k"
          },
          "value": {
            "category": { "category": "objectLiteral" },
            "type": "object",
            "className": "Object",
            "description": "Object",
            "object": obj
          }
        }
      ]
    }),
    &map,
  );

  // Primitives have no entries.
  assert_eq!(inspector.entries(&Value::Number(1.0), None).total, 0);
}

#[test]
fn collection_preview_is_truncated() {
  // var s = new Set([1, 2, 3, 4, 5, 6, 7]);
  let mut program = Program::new(vec![var(
    "s",
    construct(
      Builtin::Set,
      vec![array((1..=7).map(|i| num(i as f64)).collect())],
    ),
  )]);
  let mut sim = Simulator::new(&mut program, SimOptions::default()).unwrap();
  sim.run_to_end().unwrap();
  let s = sim.global("s").unwrap();
  assert_eq!(
    sim.inspector().describe(&s).description,
    "Set(7) {1, 2, 3, 4, 5, ...}"
  );
}

#[test]
fn bigint_typed_arrays_keep_their_signedness() {
  // var signed = new BigInt64Array([-1n]); var unsigned = new BigUint64Array(signed.buffer);
  let mut program = Program::new(vec![
    var(
      "signed",
      construct(
        typed(TypedArrayKind::BigInt64),
        vec![array(vec![unary(UnaryOp::Neg, bigint("1"))])],
      ),
    ),
    var(
      "unsigned",
      construct(
        typed(TypedArrayKind::BigUint64),
        vec![member(id("signed"), "buffer")],
      ),
    ),
  ]);
  let mut sim = Simulator::new(&mut program, SimOptions::default()).unwrap();
  sim.run_to_end().unwrap();
  let inspector = sim.inspector();

  let signed = sim.global("signed").unwrap();
  let unsigned = sim.global("unsigned").unwrap();
  assert_eq!(
    inspector.describe(&signed).category,
    Category::FixedWidthNumericArray {
      kind: TypedArrayKind::BigInt64,
      element_width: 8,
      signedness: Signedness::Signed,
    }
  );
  assert_eq!(
    inspector.describe(&unsigned).category,
    Category::FixedWidthNumericArray {
      kind: TypedArrayKind::BigUint64,
      element_width: 8,
      signedness: Signedness::Unsigned,
    }
  );
  let first = |value: &Value| inspector.entries(value, None).entries[0].value.description.clone();
  assert_eq!(first(&signed), "-1n");
  assert_eq!(first(&unsigned), "18446744073709551615n");
}

#[test]
fn buffer_views_depend_on_length() {
  let views: Vec<_> = inspect_js::typed_views(12)
    .iter()
    .map(|v| (v.name(), v.description()))
    .collect();
  assert_eq!(
    views,
    [
      ("[[Int8Array]]".to_string(), "Int8Array(12)".to_string()),
      ("[[Uint8Array]]".to_string(), "Uint8Array(12)".to_string()),
      ("[[Uint8ClampedArray]]".to_string(), "Object".to_string()),
      ("[[Int16Array]]".to_string(), "Int16Array(6)".to_string()),
      ("[[Uint16Array]]".to_string(), "Object".to_string()),
      ("[[Int32Array]]".to_string(), "Int32Array(3)".to_string()),
      ("[[Uint32Array]]".to_string(), "Object".to_string()),
      ("[[Float32Array]]".to_string(), "Object".to_string()),
    ]
  );
}

#[test]
fn buffers_and_views_describe_like_the_debugger() {
  let mut program = Program::new(vec![
    var("arraybuffer0", construct(Builtin::ArrayBuffer, vec![num(10.0)])),
    var(
      "uint8array0",
      construct(typed(TypedArrayKind::Uint8), vec![num(10.0)]),
    ),
    var(
      "clamped0",
      construct(typed(TypedArrayKind::Uint8Clamped), vec![num(4.0)]),
    ),
    var(
      "dataview0",
      construct(
        Builtin::DataView,
        vec![construct(Builtin::ArrayBuffer, vec![num(8.0)])],
      ),
    ),
  ]);
  let mut sim = Simulator::new(&mut program, SimOptions::default()).unwrap();
  sim.run_to_end().unwrap();
  let inspector = sim.inspector();
  let tuple = |name: &str| {
    let remote = inspector.describe(&sim.global(name).unwrap());
    (
      remote.type_name,
      remote.subtype,
      remote.class_name.unwrap_or_default(),
      remote.description,
    )
  };

  assert_eq!(
    tuple("arraybuffer0"),
    (
      "object",
      Some("arraybuffer"),
      "Arraybuffer".to_string(),
      "ArrayBuffer(10)".to_string()
    )
  );
  assert_eq!(
    tuple("uint8array0"),
    ("object", None, "Object".to_string(), "Uint8Array(10)".to_string())
  );
  assert_eq!(
    tuple("clamped0"),
    ("object", None, "Object".to_string(), "Object".to_string())
  );
  assert_eq!(
    tuple("dataview0"),
    ("object", None, "Object".to_string(), "Object".to_string())
  );

  let views: Vec<_> = inspect_js::typed_views(10)
    .iter()
    .map(|v| (v.name(), v.description()))
    .collect();
  assert_eq!(
    views,
    [
      ("[[Int8Array]]".to_string(), "Int8Array(10)".to_string()),
      ("[[Uint8Array]]".to_string(), "Uint8Array(10)".to_string()),
      ("[[Uint8ClampedArray]]".to_string(), "Object".to_string()),
      ("[[Int16Array]]".to_string(), "Int16Array(5)".to_string()),
      ("[[Uint16Array]]".to_string(), "Object".to_string()),
    ]
  );
}
