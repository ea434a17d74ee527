//! Classification and display of values for a debugger's variables view.
//!
//! [`classify`] maps a value to its [`Category`]. [`describe`] adds the type, subtype and
//! description strings a debugger renders next to a variable, and [`entries`] lists the contents
//! of arrays, collections and objects with optional paging.

use crate::heap::ContainerData;
use crate::heap::ContainerKind;
use crate::heap::Heap;
use crate::heap::ObjectId;
use crate::heap::ObjectKind;
use crate::heap::Signedness;
use crate::heap::TypedArrayKind;
use crate::value::number_to_string;
use crate::value::Value;
use serde::Deserialize;
use serde::Serialize;

/// Largest integer a double holds exactly.
const MAX_SAFE_INTEGER: f64 = 9007199254740992.0;
/// Number of collection elements rendered in a description before `...`.
const PREVIEW_LIMIT: usize = 5;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "category", rename_all = "camelCase")]
pub enum Category {
  IntegerNumber,
  FloatNumber,
  BoxedNumber,
  String,
  BoxedString,
  Boolean,
  BoxedBoolean,
  Undefined,
  Null,
  ObjectLiteral,
  Array,
  Function,
  Generator,
  RegularExpression,
  Date,
  ByteBuffer,
  DataView,
  #[serde(rename_all = "camelCase")]
  FixedWidthNumericArray {
    kind: TypedArrayKind,
    element_width: usize,
    signedness: Signedness,
  },
  BigInteger,
  OrderedMap,
  OrderedSet,
  WeakMap,
  WeakSet,
  LinkedContainerVariant {
    kind: ContainerKind,
  },
}

impl Category {
  fn typed_array(kind: TypedArrayKind) -> Self {
    Category::FixedWidthNumericArray {
      kind,
      element_width: kind.element_width(),
      signedness: kind.signedness(),
    }
  }
}

/// Classifies `value`. Never mutates the heap.
pub fn classify(heap: &Heap, value: &Value) -> Category {
  match value {
    Value::Undefined => Category::Undefined,
    Value::Null => Category::Null,
    Value::Bool(_) => Category::Boolean,
    Value::Number(n) => {
      if n.is_finite() && n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER {
        Category::IntegerNumber
      } else {
        Category::FloatNumber
      }
    }
    Value::String(_) => Category::String,
    Value::BigInt(_) => Category::BigInteger,
    Value::Object(id) => match heap.kind(*id) {
      ObjectKind::Plain => Category::ObjectLiteral,
      ObjectKind::Array(_) => Category::Array,
      ObjectKind::Function(closure) if closure.generator => Category::Generator,
      ObjectKind::Function(_) | ObjectKind::Builtin(_) => Category::Function,
      ObjectKind::Generator { .. } => Category::Generator,
      ObjectKind::Boxed(Value::Number(_)) => Category::BoxedNumber,
      ObjectKind::Boxed(Value::String(_)) => Category::BoxedString,
      ObjectKind::Boxed(Value::Bool(_)) => Category::BoxedBoolean,
      ObjectKind::Boxed(_) => Category::ObjectLiteral,
      ObjectKind::RegExp { .. } => Category::RegularExpression,
      ObjectKind::Date(_) => Category::Date,
      ObjectKind::ArrayBuffer(_) => Category::ByteBuffer,
      ObjectKind::DataView { .. } => Category::DataView,
      ObjectKind::TypedArray { kind, .. } => Category::typed_array(*kind),
      ObjectKind::Map(_) => Category::OrderedMap,
      ObjectKind::Set(_) => Category::OrderedSet,
      ObjectKind::WeakMap(_) => Category::WeakMap,
      ObjectKind::WeakSet(_) => Category::WeakSet,
      ObjectKind::Container { kind, .. } => Category::LinkedContainerVariant { kind: *kind },
    },
  }
}

/// A value as a debugger's remote object presents it.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteValue {
  pub category: Category,
  #[serde(rename = "type")]
  pub type_name: &'static str,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub subtype: Option<&'static str>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub class_name: Option<String>,
  pub description: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub object: Option<ObjectId>,
}

pub fn describe(heap: &Heap, value: &Value) -> RemoteValue {
  let category = classify(heap, value);
  let primitive = |type_name: &'static str, subtype: Option<&'static str>, description: String| {
    RemoteValue {
      category,
      type_name,
      subtype,
      class_name: None,
      description,
      object: None,
    }
  };
  let id = match value {
    Value::Undefined => return primitive("undefined", None, "undefined".to_string()),
    Value::Null => return primitive("object", Some("null"), "null".to_string()),
    Value::Bool(b) => return primitive("boolean", None, b.to_string()),
    Value::Number(n) => return primitive("number", None, number_to_string(*n)),
    Value::String(s) => return primitive("string", None, s.clone()),
    Value::BigInt(b) => return primitive("bigint", None, format!("{b}n")),
    Value::Object(id) => *id,
  };

  let (type_name, subtype, class_name, description): (_, _, String, _) = match heap.kind(id) {
    ObjectKind::Plain => ("object", None, "Object".into(), "Object".to_string()),
    ObjectKind::Array(elements) => (
      "object",
      Some("array"),
      "Array".into(),
      format!("Array({})", elements.len()),
    ),
    ObjectKind::Function(closure) => (
      "function",
      None,
      if closure.generator { "Generator" } else { "Function" }.into(),
      format!(
        "function{} {}( {{ [js code] }}",
        if closure.generator { "*" } else { "" },
        closure.name.as_deref().unwrap_or("")
      ),
    ),
    ObjectKind::Builtin(builtin) => (
      "function",
      None,
      "Function".into(),
      format!("function {}( {{ [native code] }}", builtin.name()),
    ),
    ObjectKind::Generator { name, .. } => (
      "object",
      Some("generator"),
      "Generator".into(),
      format!("{} {{<suspended>}}", name.as_deref().unwrap_or("")),
    ),
    ObjectKind::Boxed(inner) => {
      let (class, shown) = match inner {
        Value::Number(n) => ("Number", number_to_string(*n)),
        Value::String(s) => ("String", s.clone()),
        Value::Bool(b) => ("Boolean", b.to_string()),
        Value::BigInt(b) => ("BigInt", format!("{b}n")),
        other => ("Object", other.to_js_string()),
      };
      (
        "object",
        None,
        "Object".into(),
        format!("{class}{{[[PrimitiveValue]]: {shown}}}"),
      )
    }
    ObjectKind::RegExp { pattern, flags } => (
      "object",
      Some("regexp"),
      "RegExp".into(),
      format!("/{pattern}/{flags}"),
    ),
    ObjectKind::Date(_) => (
      "object",
      Some("date"),
      "Date".into(),
      heap.to_js_string(value),
    ),
    ObjectKind::ArrayBuffer(bytes) => (
      "object",
      Some("arraybuffer"),
      "Arraybuffer".into(),
      format!("ArrayBuffer({})", bytes.len()),
    ),
    ObjectKind::DataView { .. } => ("object", None, "Object".into(), "Object".to_string()),
    ObjectKind::TypedArray { kind, length, .. } => (
      "object",
      None,
      "Object".into(),
      typed_array_description(*kind, *length),
    ),
    ObjectKind::Map(entries) => (
      "object",
      Some("map"),
      "Map".into(),
      sized_preview(
        "Map",
        entries.len(),
        entries
          .iter()
          .map(|(k, v)| format!("{} => {}", preview(heap, k), preview(heap, v))),
      ),
    ),
    ObjectKind::Set(values) => (
      "object",
      Some("set"),
      "Set".into(),
      sized_preview("Set", values.len(), values.iter().map(|v| preview(heap, v))),
    ),
    ObjectKind::WeakMap(entries) => (
      "object",
      Some("weakmap"),
      "WeakMap".into(),
      format!("WeakMap({})", entries.len()),
    ),
    ObjectKind::WeakSet(values) => (
      "object",
      Some("weakset"),
      "WeakSet".into(),
      format!("WeakSet({})", values.len()),
    ),
    ObjectKind::Container { kind, data } => (
      "object",
      None,
      kind.name().into(),
      format!("{}({})", kind.name(), data.len()),
    ),
  };
  RemoteValue {
    category,
    type_name,
    subtype,
    class_name: Some(class_name),
    description,
    object: Some(id),
  }
}

/// Only the 8-bit and signed 16/32-bit integer arrays get a sized description; every other typed
/// array reads as a plain `Object`.
fn typed_array_description(kind: TypedArrayKind, length: usize) -> String {
  match kind {
    TypedArrayKind::Int8 | TypedArrayKind::Uint8 | TypedArrayKind::Int16 | TypedArrayKind::Int32 => {
      format!("{}({length})", kind.name())
    }
    _ => "Object".to_string(),
  }
}

// How an element appears inside a collection description.
fn preview(heap: &Heap, value: &Value) -> String {
  match value {
    Value::String(s) => format!("'{s}'"),
    Value::BigInt(b) => b.to_string(),
    Value::Object(_) => "Object".to_string(),
    other => heap.to_js_string(other),
  }
}

fn sized_preview(class: &str, size: usize, items: impl Iterator<Item = String>) -> String {
  if size == 0 {
    return format!("{class}(0)");
  }
  let mut shown: Vec<String> = items.take(PREVIEW_LIMIT).collect();
  if size > PREVIEW_LIMIT {
    shown.push("...".to_string());
  }
  format!("{class}({size}) {{{}}}", shown.join(", "))
}

/// A window into a listing, `[start, start + count)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryRange {
  pub start: usize,
  pub count: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Entry {
  pub name: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub key: Option<RemoteValue>,
  pub value: RemoteValue,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EntryPage {
  /// Number of entries the value holds, regardless of paging.
  pub total: usize,
  pub start: usize,
  pub entries: Vec<Entry>,
}

/// Lists the contents of `value`.
///
/// With a range, only `[start, min(start + count, total))` is returned. A range starting at or past
/// the end is ignored and the full listing is returned.
pub fn entries(heap: &Heap, value: &Value, range: Option<EntryRange>) -> EntryPage {
  let items = collect_entries(heap, value);
  let total = items.len();
  let (start, end) = match range {
    Some(range) if range.start < total => (range.start, total.min(range.start.saturating_add(range.count))),
    _ => (0, total),
  };
  let entries = items
    .into_iter()
    .skip(start)
    .take(end - start)
    .map(|(name, key, value)| Entry {
      name,
      key: key.map(|k| describe(heap, &k)),
      value: describe(heap, &value),
    })
    .collect();
  EntryPage {
    total,
    start,
    entries,
  }
}

fn collect_entries(heap: &Heap, value: &Value) -> Vec<(String, Option<Value>, Value)> {
  let indexed = |values: Vec<Value>| {
    values
      .into_iter()
      .enumerate()
      .map(|(i, v)| (i.to_string(), None, v))
      .collect::<Vec<_>>()
  };
  let keyed = |pairs: Vec<(Value, Value)>| {
    pairs
      .into_iter()
      .enumerate()
      .map(|(i, (k, v))| (i.to_string(), Some(k), v))
      .collect::<Vec<_>>()
  };
  let Value::Object(id) = value else {
    return Vec::new();
  };
  let properties = || {
    heap
      .get(*id)
      .properties
      .iter()
      .map(|(k, v)| (k.clone(), None, v.clone()))
      .collect::<Vec<_>>()
  };
  match heap.kind(*id) {
    ObjectKind::Array(elements) => indexed(elements.clone()),
    // Element names are right-aligned in a fixed 10-column field.
    ObjectKind::TypedArray { .. } => heap
      .typed_array_values(*id)
      .into_iter()
      .enumerate()
      .map(|(i, v)| (format!("{i:>10}"), None, v))
      .collect(),
    ObjectKind::Map(pairs) => keyed(pairs.clone()),
    ObjectKind::Set(values) => indexed(values.clone()),
    ObjectKind::WeakMap(pairs) => keyed(
      pairs
        .iter()
        .map(|(k, v)| (Value::Object(*k), v.clone()))
        .collect(),
    ),
    ObjectKind::WeakSet(values) => indexed(values.iter().map(|k| Value::Object(*k)).collect()),
    ObjectKind::Container {
      data: ContainerData::Values(values),
      ..
    } => indexed(values.clone()),
    ObjectKind::Container {
      data: ContainerData::Entries(pairs),
      ..
    } => keyed(pairs.clone()),
    ObjectKind::Boxed(Value::String(s)) => {
      indexed(s.chars().map(|c| Value::String(c.to_string())).collect())
    }
    _ => properties(),
  }
}

/// A typed-array view a debugger offers over an `ArrayBuffer`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct TypedView {
  pub kind: TypedArrayKind,
  pub length: usize,
}

impl TypedView {
  /// Internal property name, e.g. `[[Int16Array]]`.
  pub fn name(&self) -> String {
    format!("[[{}]]", self.kind.name())
  }

  pub fn description(&self) -> String {
    typed_array_description(self.kind, self.length)
  }
}

/// The views listed for a buffer of `byte_length` bytes: 8-bit views always, wider views only when
/// the length is a multiple of their element width.
pub fn typed_views(byte_length: usize) -> Vec<TypedView> {
  TypedArrayKind::ALL
    .into_iter()
    .filter(|kind| byte_length % kind.element_width() == 0)
    .map(|kind| TypedView {
      kind,
      length: byte_length / kind.element_width(),
    })
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn integers_must_be_exact() {
    let heap = Heap::new();
    assert_eq!(classify(&heap, &Value::Number(65535.0)), Category::IntegerNumber);
    assert_eq!(classify(&heap, &Value::Number(-0.0)), Category::IntegerNumber);
    assert_eq!(classify(&heap, &Value::Number(5e-324)), Category::FloatNumber);
    assert_eq!(classify(&heap, &Value::Number(1.23e47)), Category::FloatNumber);
    assert_eq!(classify(&heap, &Value::Number(f64::NAN)), Category::FloatNumber);
  }

  #[test]
  fn paging_ignores_out_of_range_start() {
    let mut heap = Heap::new();
    let array = Value::Object(heap.alloc(ObjectKind::Array(
      (0..10).map(|i| Value::Number(i as f64)).collect(),
    )));
    let page = entries(&heap, &array, Some(EntryRange { start: 8, count: 5 }));
    assert_eq!(page.total, 10);
    assert_eq!(page.start, 8);
    assert_eq!(page.entries.len(), 2);
    assert_eq!(page.entries[0].name, "8");

    let page = entries(&heap, &array, Some(EntryRange { start: 10, count: 5 }));
    assert_eq!(page.start, 0);
    assert_eq!(page.entries.len(), 10);
  }

  #[test]
  fn typed_views_follow_divisibility() {
    let names: Vec<_> = typed_views(10).iter().map(|v| v.description()).collect();
    assert_eq!(
      names,
      vec![
        "Int8Array(10)",
        "Uint8Array(10)",
        "Object",
        "Int16Array(5)",
        "Object"
      ]
    );
    assert_eq!(typed_views(8).len(), 11);
    assert_eq!(typed_views(3).len(), 3);
  }
}
