//! Host builtins: constructors, `print`, and the methods and accessors of builtin objects.
//!
//! Only the surface the debugger fixtures touch is modelled. Anything else reports
//! [`SimError::NotCallable`] or reads as `undefined`.

use crate::error::SimError;
use crate::heap::ContainerData;
use crate::heap::ContainerKind;
use crate::heap::Heap;
use crate::heap::ObjectId;
use crate::heap::ObjectKind;
use crate::heap::TypedArrayKind;
use crate::value::Value;
use ahash::AHashMap;
use itertools::Itertools;
use num_bigint::BigInt;
use once_cell::sync::Lazy;
use serde::Deserialize;
use serde::Serialize;
use std::cmp::Ordering;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Builtin {
  Object,
  Array,
  Number,
  String,
  Boolean,
  BigInt,
  Date,
  RegExp,
  Map,
  Set,
  WeakMap,
  WeakSet,
  ArrayBuffer,
  DataView,
  TypedArray(TypedArrayKind),
  Container(ContainerKind),
  Print,
}

static BY_NAME: Lazy<AHashMap<&'static str, Builtin>> = Lazy::new(|| {
  let mut map = AHashMap::new();
  for builtin in [
    Builtin::Object,
    Builtin::Array,
    Builtin::Number,
    Builtin::String,
    Builtin::Boolean,
    Builtin::BigInt,
    Builtin::Date,
    Builtin::RegExp,
    Builtin::Map,
    Builtin::Set,
    Builtin::WeakMap,
    Builtin::WeakSet,
    Builtin::ArrayBuffer,
    Builtin::DataView,
    Builtin::Print,
  ]
  .into_iter()
  .chain(TypedArrayKind::ALL.into_iter().map(Builtin::TypedArray))
  .chain(ContainerKind::ALL.into_iter().map(Builtin::Container))
  {
    map.insert(builtin.name(), builtin);
  }
  map
});

impl Builtin {
  /// Looks up a builtin by its global name, e.g. `"Uint8Array"` or `"LightWeightMap"`.
  pub fn from_name(name: &str) -> Option<Builtin> {
    BY_NAME.get(name).copied()
  }

  pub fn name(self) -> &'static str {
    match self {
      Builtin::Object => "Object",
      Builtin::Array => "Array",
      Builtin::Number => "Number",
      Builtin::String => "String",
      Builtin::Boolean => "Boolean",
      Builtin::BigInt => "BigInt",
      Builtin::Date => "Date",
      Builtin::RegExp => "RegExp",
      Builtin::Map => "Map",
      Builtin::Set => "Set",
      Builtin::WeakMap => "WeakMap",
      Builtin::WeakSet => "WeakSet",
      Builtin::ArrayBuffer => "ArrayBuffer",
      Builtin::DataView => "DataView",
      Builtin::TypedArray(kind) => kind.name(),
      Builtin::Container(kind) => kind.name(),
      Builtin::Print => "print",
    }
  }

  pub fn is_constructor(self) -> bool {
    !matches!(self, Builtin::BigInt | Builtin::Print)
  }

  /// `new Builtin(...args)`.
  pub fn construct(self, heap: &mut Heap, args: &[Value]) -> Result<Value, SimError> {
    let arg = |i: usize| args.get(i).cloned().unwrap_or(Value::Undefined);
    let kind = match self {
      Builtin::Object => return Ok(to_object(heap, arg(0))),
      Builtin::Array => ObjectKind::Array(array_from_args(args)?),
      Builtin::Number => ObjectKind::Boxed(Value::Number(match args.first() {
        Some(v) => heap.to_number(v),
        None => 0.0,
      })),
      Builtin::String => ObjectKind::Boxed(Value::String(match args.first() {
        Some(v) => heap.to_js_string(v),
        None => String::new(),
      })),
      Builtin::Boolean => ObjectKind::Boxed(Value::Bool(arg(0).to_boolean())),
      Builtin::Date => ObjectKind::Date(match args.first() {
        Some(v) if !v.is_nullish() => Some(heap.to_js_string(v)),
        _ => None,
      }),
      Builtin::RegExp => ObjectKind::RegExp {
        pattern: heap.to_js_string(&arg(0)),
        flags: match args.get(1) {
          Some(v) if !v.is_nullish() => heap.to_js_string(v),
          _ => String::new(),
        },
      },
      Builtin::Map => {
        let mut entries: Vec<(Value, Value)> = Vec::new();
        for item in iterate(heap, &arg(0))? {
          let pair = match &item {
            Value::Object(id) => match heap.kind(*id) {
              ObjectKind::Array(pair) => pair.clone(),
              _ => Vec::new(),
            },
            _ => {
              return Err(SimError::type_error(format!(
                "iterator value {} is not an entry object",
                heap.to_js_string(&item)
              )))
            }
          };
          let key = pair.first().cloned().unwrap_or(Value::Undefined);
          let value = pair.get(1).cloned().unwrap_or(Value::Undefined);
          map_insert(&mut entries, key, value);
        }
        ObjectKind::Map(entries)
      }
      Builtin::Set => {
        let mut values = Vec::new();
        for item in iterate(heap, &arg(0))? {
          set_insert(&mut values, item);
        }
        ObjectKind::Set(values)
      }
      Builtin::WeakMap => ObjectKind::WeakMap(Vec::new()),
      Builtin::WeakSet => ObjectKind::WeakSet(Vec::new()),
      Builtin::ArrayBuffer => ObjectKind::ArrayBuffer(alloc_bytes(to_length(heap, &arg(0))?)?),
      Builtin::DataView => {
        let Value::Object(buffer) = arg(0) else {
          return Err(SimError::type_error("DataView requires an ArrayBuffer"));
        };
        let byte_len = match heap.kind(buffer) {
          ObjectKind::ArrayBuffer(bytes) => bytes.len(),
          _ => return Err(SimError::type_error("DataView requires an ArrayBuffer")),
        };
        let offset = to_length(heap, &arg(1))?;
        if offset > byte_len {
          return Err(SimError::type_error("start offset is outside the bounds of the buffer"));
        }
        let length = match args.get(2) {
          Some(v) if !v.is_nullish() => to_length(heap, v)?,
          _ => byte_len - offset,
        };
        if offset.checked_add(length).map_or(true, |end| end > byte_len) {
          return Err(SimError::type_error("invalid DataView length"));
        }
        ObjectKind::DataView {
          buffer,
          offset,
          length,
        }
      }
      Builtin::TypedArray(kind) => return construct_typed_array(heap, kind, args),
      Builtin::Container(kind) => ObjectKind::Container {
        kind,
        data: if kind.is_keyed() {
          ContainerData::Entries(Vec::new())
        } else {
          ContainerData::Values(Vec::new())
        },
      },
      Builtin::BigInt | Builtin::Print => {
        return Err(SimError::NotConstructable(self.name().to_string()))
      }
    };
    Ok(Value::Object(heap.alloc(kind)))
  }

  /// `Builtin(...args)` without `new`. `print` appends a line to `output`.
  pub fn call(
    self,
    heap: &mut Heap,
    output: &mut Vec<String>,
    args: &[Value],
  ) -> Result<Value, SimError> {
    let arg = |i: usize| args.get(i).cloned().unwrap_or(Value::Undefined);
    match self {
      Builtin::Print => {
        let line = args.iter().map(|v| heap.to_js_string(v)).join(" ");
        output.push(line);
        Ok(Value::Undefined)
      }
      Builtin::Number => Ok(Value::Number(match args.first() {
        Some(Value::BigInt(b)) => crate::value::bigint_to_f64(b),
        Some(v) => heap.to_number(v),
        None => 0.0,
      })),
      Builtin::String => Ok(Value::String(match args.first() {
        Some(v) => heap.to_js_string(v),
        None => String::new(),
      })),
      Builtin::Boolean => Ok(Value::Bool(arg(0).to_boolean())),
      Builtin::BigInt => to_bigint(heap, &arg(0)).map(Value::BigInt),
      Builtin::Object | Builtin::Array | Builtin::RegExp => self.construct(heap, args),
      Builtin::Date => {
        let date = self.construct(heap, &[])?;
        Ok(Value::String(heap.to_js_string(&date)))
      }
      _ => Err(SimError::type_error(format!(
        "constructor {} requires 'new'",
        self.name()
      ))),
    }
  }
}

fn to_object(heap: &mut Heap, value: Value) -> Value {
  match value {
    Value::Object(_) => value,
    Value::Undefined | Value::Null => Value::Object(heap.alloc(ObjectKind::Plain)),
    primitive => Value::Object(heap.alloc(ObjectKind::Boxed(primitive))),
  }
}

fn array_from_args(args: &[Value]) -> Result<Vec<Value>, SimError> {
  match args {
    [Value::Number(n)] => {
      if n.fract() != 0.0 || *n < 0.0 || *n > u32::MAX as f64 {
        return Err(SimError::type_error("invalid array length"));
      }
      let len = *n as usize;
      if len > MAX_ALLOCATION / std::mem::size_of::<Value>() {
        return Err(SimError::type_error("array allocation failed"));
      }
      let mut values = Vec::new();
      values
        .try_reserve_exact(len)
        .map_err(|_| SimError::type_error("array allocation failed"))?;
      values.resize(len, Value::Undefined);
      Ok(values)
    }
    _ => Ok(args.to_vec()),
  }
}

/// Largest length `ToIndex` accepts: 2^53 - 1.
const MAX_SAFE_LENGTH: f64 = 9007199254740991.0;

/// Largest backing store, in bytes, the simulator will allocate for a buffer or dense array.
const MAX_ALLOCATION: usize = 1 << 30;

fn to_length(heap: &Heap, value: &Value) -> Result<usize, SimError> {
  let n = heap.to_number(value);
  if n.is_nan() {
    return Ok(0);
  }
  let n = n.trunc();
  if n < 0.0 || n > MAX_SAFE_LENGTH {
    return Err(SimError::type_error("invalid length"));
  }
  usize::try_from(n as u64).map_err(|_| SimError::type_error("invalid length"))
}

fn alloc_bytes(len: usize) -> Result<Vec<u8>, SimError> {
  if len > MAX_ALLOCATION {
    return Err(SimError::type_error("array buffer allocation failed"));
  }
  let mut bytes = Vec::new();
  bytes
    .try_reserve_exact(len)
    .map_err(|_| SimError::type_error("array buffer allocation failed"))?;
  bytes.resize(len, 0);
  Ok(bytes)
}

fn byte_length(length: usize, width: usize) -> Result<usize, SimError> {
  length
    .checked_mul(width)
    .ok_or_else(|| SimError::type_error("invalid typed array length"))
}

fn to_bigint(heap: &Heap, value: &Value) -> Result<BigInt, SimError> {
  match value {
    Value::BigInt(b) => Ok(b.clone()),
    Value::Bool(b) => Ok(BigInt::from(*b as u8)),
    Value::Number(n) if n.is_finite() && n.fract() == 0.0 => format!("{n:.0}")
      .parse()
      .map_err(|_| SimError::type_error("cannot convert number to a BigInt")),
    Value::String(s) => s
      .trim()
      .parse()
      .map_err(|_| SimError::type_error(format!("cannot convert {s} to a BigInt"))),
    Value::Object(id) => match heap.kind(*id) {
      ObjectKind::Boxed(inner) => to_bigint(heap, &inner.clone()),
      _ => Err(SimError::type_error("cannot convert object to a BigInt")),
    },
    other => Err(SimError::type_error(format!(
      "cannot convert {} to a BigInt",
      other.to_js_string()
    ))),
  }
}

fn construct_typed_array(
  heap: &mut Heap,
  kind: TypedArrayKind,
  args: &[Value],
) -> Result<Value, SimError> {
  let width = kind.element_width();
  let first = args.first().cloned().unwrap_or(Value::Undefined);
  let (buffer, offset, length, init) = match &first {
    Value::Object(id) => match heap.kind(*id).clone() {
      ObjectKind::ArrayBuffer(bytes) => {
        let offset = match args.get(1) {
          Some(v) => to_length(heap, v)?,
          None => 0,
        };
        if offset % width != 0 || offset > bytes.len() {
          return Err(SimError::type_error(format!(
            "start offset of {} should be a multiple of {width}",
            kind.name()
          )));
        }
        let length = match args.get(2) {
          Some(v) if !v.is_nullish() => to_length(heap, v)?,
          _ => {
            if (bytes.len() - offset) % width != 0 {
              return Err(SimError::type_error(format!(
                "byte length of {} should be a multiple of {width}",
                kind.name()
              )));
            }
            (bytes.len() - offset) / width
          }
        };
        let end = byte_length(length, width)?
          .checked_add(offset)
          .ok_or_else(|| SimError::type_error("invalid typed array length"))?;
        if end > bytes.len() {
          return Err(SimError::type_error("invalid typed array length"));
        }
        (*id, offset, length, Vec::new())
      }
      _ => {
        let values = iterate(heap, &first)?;
        let bytes = alloc_bytes(byte_length(values.len(), width)?)?;
        let buffer = heap.alloc(ObjectKind::ArrayBuffer(bytes));
        (buffer, 0, values.len(), values)
      }
    },
    Value::Undefined => (heap.alloc(ObjectKind::ArrayBuffer(Vec::new())), 0, 0, Vec::new()),
    other => {
      let length = to_length(heap, other)?;
      let bytes = alloc_bytes(byte_length(length, width)?)?;
      let buffer = heap.alloc(ObjectKind::ArrayBuffer(bytes));
      (buffer, 0, length, Vec::new())
    }
  };
  let id = heap.alloc(ObjectKind::TypedArray {
    kind,
    buffer,
    offset,
    length,
  });
  for (i, value) in init.iter().enumerate() {
    heap.typed_array_set(id, i, value)?;
  }
  Ok(Value::Object(id))
}

/// The values produced by iterating `value`. `undefined` and `null` iterate as empty, as they do
/// for collection constructors.
pub fn iterate(heap: &mut Heap, value: &Value) -> Result<Vec<Value>, SimError> {
  Ok(match value {
    Value::Undefined | Value::Null => Vec::new(),
    Value::String(s) => s.chars().map(|c| Value::String(c.to_string())).collect(),
    Value::Object(id) => match heap.kind(*id).clone() {
      ObjectKind::Array(elements) => elements,
      ObjectKind::Set(values) => values,
      ObjectKind::Boxed(Value::String(s)) => s.chars().map(|c| Value::String(c.to_string())).collect(),
      ObjectKind::TypedArray { .. } => heap.typed_array_values(*id),
      ObjectKind::Map(entries) => entries
        .into_iter()
        .map(|(k, v)| Value::Object(heap.alloc(ObjectKind::Array(vec![k, v]))))
        .collect(),
      ObjectKind::Container {
        data: ContainerData::Values(values),
        ..
      } => values,
      ObjectKind::Container {
        data: ContainerData::Entries(entries),
        ..
      } => entries
        .into_iter()
        .map(|(k, v)| Value::Object(heap.alloc(ObjectKind::Array(vec![k, v]))))
        .collect(),
      _ => {
        return Err(SimError::type_error(format!(
          "{} is not iterable",
          heap.to_js_string(value)
        )))
      }
    },
    other => {
      return Err(SimError::type_error(format!(
        "{} is not iterable",
        other.to_js_string()
      )))
    }
  })
}

fn map_insert(entries: &mut Vec<(Value, Value)>, key: Value, value: Value) {
  match entries.iter_mut().find(|(k, _)| k.same_value_zero(&key)) {
    Some((_, slot)) => *slot = value,
    None => entries.push((key, value)),
  }
}

fn set_insert(values: &mut Vec<Value>, value: Value) {
  if !values.iter().any(|v| v.same_value_zero(&value)) {
    values.push(value);
  }
}

/// Ordering used by the tree-backed containers: numbers numerically, everything else by string.
fn compare_keys(heap: &Heap, a: &Value, b: &Value) -> Ordering {
  match (a, b) {
    (Value::Number(a), Value::Number(b)) => a.partial_cmp(b).unwrap_or(Ordering::Equal),
    _ => heap.to_js_string(a).cmp(&heap.to_js_string(b)),
  }
}

fn array_index(key: &Value) -> Option<usize> {
  match key {
    Value::Number(n) if *n >= 0.0 && n.fract() == 0.0 && *n < u32::MAX as f64 => Some(*n as usize),
    Value::String(s) => s.parse::<u32>().ok().map(|n| n as usize),
    _ => None,
  }
}

/// Reads `object[key]`.
pub fn get_property(heap: &Heap, object: &Value, key: &Value) -> Result<Value, SimError> {
  let name = heap.to_js_string(key);
  let index = array_index(key);
  match object {
    Value::Undefined | Value::Null => Err(SimError::type_error(format!(
      "cannot read properties of {} (reading '{name}')",
      object.to_js_string()
    ))),
    Value::String(s) => Ok(string_property(s, &name, index)),
    Value::Object(id) => {
      if let Some(value) = heap.own_property(*id, &name) {
        return Ok(value.clone());
      }
      Ok(object_property(heap, *id, &name, index))
    }
    _ => Ok(Value::Undefined),
  }
}

fn string_property(s: &str, name: &str, index: Option<usize>) -> Value {
  if name == "length" {
    return Value::Number(s.chars().count() as f64);
  }
  index
    .and_then(|i| s.chars().nth(i))
    .map(|c| Value::String(c.to_string()))
    .unwrap_or(Value::Undefined)
}

fn object_property(heap: &Heap, id: ObjectId, name: &str, index: Option<usize>) -> Value {
  let number = |n: usize| Value::Number(n as f64);
  match (heap.kind(id), name) {
    (ObjectKind::Array(elements), "length") => number(elements.len()),
    (ObjectKind::Array(elements), _) => index
      .and_then(|i| elements.get(i).cloned())
      .unwrap_or(Value::Undefined),
    (ObjectKind::Boxed(Value::String(s)), _) => string_property(s, name, index),
    (ObjectKind::Function(closure), "name") => {
      Value::String(closure.name.clone().unwrap_or_default())
    }
    (ObjectKind::Builtin(builtin), "name") => Value::String(builtin.name().to_string()),
    (ObjectKind::Map(entries), "size") => number(entries.len()),
    (ObjectKind::Set(values), "size") => number(values.len()),
    (ObjectKind::ArrayBuffer(bytes), "byteLength") => number(bytes.len()),
    (ObjectKind::DataView { length, .. }, "byteLength") => number(*length),
    (ObjectKind::DataView { offset, .. }, "byteOffset") => number(*offset),
    (ObjectKind::DataView { buffer, .. }, "buffer") => Value::Object(*buffer),
    (ObjectKind::TypedArray { length, .. }, "length") => number(*length),
    (ObjectKind::TypedArray { kind, length, .. }, "byteLength") => {
      number(length * kind.element_width())
    }
    (ObjectKind::TypedArray { offset, .. }, "byteOffset") => number(*offset),
    (ObjectKind::TypedArray { buffer, .. }, "buffer") => Value::Object(*buffer),
    (ObjectKind::TypedArray { .. }, _) => index
      .and_then(|i| heap.typed_array_values(id).get(i).cloned())
      .unwrap_or(Value::Undefined),
    (ObjectKind::RegExp { pattern, .. }, "source") => Value::String(pattern.clone()),
    (ObjectKind::RegExp { flags, .. }, "flags") => Value::String(flags.clone()),
    (ObjectKind::RegExp { flags, .. }, flag) => match regexp_flag(flag) {
      Some(c) => Value::Bool(flags.contains(c)),
      None => Value::Undefined,
    },
    (ObjectKind::Container { data, .. }, "length" | "size") => number(data.len()),
    _ => Value::Undefined,
  }
}

fn regexp_flag(name: &str) -> Option<char> {
  Some(match name {
    "global" => 'g',
    "ignoreCase" => 'i',
    "multiline" => 'm',
    "dotAll" => 's',
    "hasIndices" => 'd',
    "unicode" => 'u',
    "sticky" => 'y',
    _ => return None,
  })
}

/// Writes `object[key] = value`.
pub fn set_property(heap: &mut Heap, object: &Value, key: &Value, value: Value) -> Result<(), SimError> {
  let Value::Object(id) = object else {
    if object.is_nullish() {
      return Err(SimError::type_error(format!(
        "cannot set properties of {}",
        object.to_js_string()
      )));
    }
    // Writes to primitives are dropped.
    return Ok(());
  };
  let id = *id;
  if let Some(i) = array_index(key) {
    if let ObjectKind::TypedArray { .. } = heap.kind(id) {
      return heap.typed_array_set(id, i, &value);
    }
    if let ObjectKind::Array(elements) = &mut heap.get_mut(id).kind {
      if i >= elements.len() {
        elements.resize(i + 1, Value::Undefined);
      }
      elements[i] = value;
      return Ok(());
    }
  }
  let name = heap.to_js_string(key);
  heap.set_own_property(id, &name, value);
  Ok(())
}

/// Calls a builtin method, `receiver.name(...args)`.
pub fn call_method(
  heap: &mut Heap,
  receiver: &Value,
  name: &str,
  args: &[Value],
) -> Result<Value, SimError> {
  let arg = |i: usize| args.get(i).cloned().unwrap_or(Value::Undefined);
  let not_callable = || SimError::NotCallable(name.to_string());

  let id = match receiver {
    Value::String(s) => return string_method(s, name, args).ok_or_else(not_callable),
    Value::Object(id) => *id,
    Value::Undefined | Value::Null => {
      return Err(SimError::type_error(format!(
        "cannot read properties of {} (reading '{name}')",
        receiver.to_js_string()
      )))
    }
    _ => return Err(not_callable()),
  };

  if name == "toString" {
    return Ok(Value::String(heap.to_js_string(receiver)));
  }

  let mut kind = heap.kind(id).clone();
  let result = match (&mut kind, name) {
    (ObjectKind::Boxed(Value::String(s)), _) => {
      return string_method(s, name, args).ok_or_else(not_callable)
    }
    (ObjectKind::Boxed(inner), "valueOf") => return Ok(inner.clone()),
    (ObjectKind::Array(elements), "push") => {
      elements.extend(args.iter().cloned());
      Value::Number(elements.len() as f64)
    }
    (ObjectKind::Array(elements), "pop") => elements.pop().unwrap_or(Value::Undefined),
    (ObjectKind::Array(elements), "join") => {
      let elements = elements.clone();
      return Ok(Value::String(match args.first() {
        Some(sep) if !sep.is_nullish() => {
          let sep = heap.to_js_string(sep);
          elements
            .iter()
            .map(|v| if v.is_nullish() { String::new() } else { heap.to_js_string(v) })
            .join(&sep)
        }
        _ => heap.join(&elements),
      }));
    }
    (ObjectKind::Map(entries), "set") => {
      map_insert(entries, arg(0), arg(1));
      receiver.clone()
    }
    (ObjectKind::Map(entries), "get") => entries
      .iter()
      .find(|(k, _)| k.same_value_zero(&arg(0)))
      .map(|(_, v)| v.clone())
      .unwrap_or(Value::Undefined),
    (ObjectKind::Map(entries), "has") => {
      Value::Bool(entries.iter().any(|(k, _)| k.same_value_zero(&arg(0))))
    }
    (ObjectKind::Map(entries), "delete") => {
      let before = entries.len();
      entries.retain(|(k, _)| !k.same_value_zero(&arg(0)));
      Value::Bool(entries.len() != before)
    }
    (ObjectKind::Map(entries), "clear") => {
      entries.clear();
      Value::Undefined
    }
    (ObjectKind::Set(values), "add") => {
      set_insert(values, arg(0));
      receiver.clone()
    }
    (ObjectKind::Set(values), "has") => Value::Bool(values.iter().any(|v| v.same_value_zero(&arg(0)))),
    (ObjectKind::Set(values), "delete") => {
      let before = values.len();
      values.retain(|v| !v.same_value_zero(&arg(0)));
      Value::Bool(values.len() != before)
    }
    (ObjectKind::Set(values), "clear") => {
      values.clear();
      Value::Undefined
    }
    (ObjectKind::WeakMap(entries), "set") => {
      let key = weak_key(&arg(0))?;
      match entries.iter_mut().find(|(k, _)| *k == key) {
        Some((_, slot)) => *slot = arg(1),
        None => entries.push((key, arg(1))),
      }
      receiver.clone()
    }
    (ObjectKind::WeakMap(entries), "get") => match arg(0) {
      Value::Object(key) => entries
        .iter()
        .find(|(k, _)| *k == key)
        .map(|(_, v)| v.clone())
        .unwrap_or(Value::Undefined),
      _ => Value::Undefined,
    },
    (ObjectKind::WeakMap(entries), "has") => {
      Value::Bool(matches!(arg(0), Value::Object(key) if entries.iter().any(|(k, _)| *k == key)))
    }
    (ObjectKind::WeakMap(entries), "delete") => {
      let before = entries.len();
      if let Value::Object(key) = arg(0) {
        entries.retain(|(k, _)| *k != key);
      }
      Value::Bool(entries.len() != before)
    }
    (ObjectKind::WeakSet(values), "add") => {
      let key = weak_key(&arg(0))?;
      if !values.contains(&key) {
        values.push(key);
      }
      receiver.clone()
    }
    (ObjectKind::WeakSet(values), "has") => {
      Value::Bool(matches!(arg(0), Value::Object(key) if values.contains(&key)))
    }
    (ObjectKind::WeakSet(values), "delete") => {
      let before = values.len();
      if let Value::Object(key) = arg(0) {
        values.retain(|k| *k != key);
      }
      Value::Bool(values.len() != before)
    }
    (ObjectKind::Container { kind, data }, _) => {
      match container_method(heap, *kind, data, name, args) {
        Some(result) => result,
        None => return Err(not_callable()),
      }
    }
    _ => return Err(not_callable()),
  };
  heap.get_mut(id).kind = kind;
  Ok(result)
}

fn weak_key(value: &Value) -> Result<ObjectId, SimError> {
  match value {
    Value::Object(id) => Ok(*id),
    other => Err(SimError::type_error(format!(
      "invalid value used as weak collection key: {}",
      other.to_js_string()
    ))),
  }
}

fn string_method(s: &str, name: &str, args: &[Value]) -> Option<Value> {
  let index = |i: usize| match args.get(i) {
    Some(v) => {
      let n = v.to_number();
      if n.is_nan() {
        0
      } else {
        n.trunc().max(0.0) as usize
      }
    }
    None => 0,
  };
  Some(match name {
    "charAt" => Value::String(s.chars().nth(index(0)).map(String::from).unwrap_or_default()),
    "toUpperCase" => Value::String(s.to_uppercase()),
    "toLowerCase" => Value::String(s.to_lowercase()),
    "toString" | "valueOf" => Value::String(s.to_string()),
    _ => return None,
  })
}

fn container_method(
  heap: &Heap,
  kind: ContainerKind,
  data: &mut ContainerData,
  name: &str,
  args: &[Value],
) -> Option<Value> {
  let arg = |i: usize| args.get(i).cloned().unwrap_or(Value::Undefined);
  let result = match data {
    ContainerData::Entries(entries) => match name {
      "set" | "add" => {
        let (key, value) = (arg(0), arg(1));
        match entries.iter_mut().find(|(k, _)| k.same_value_zero(&key)) {
          Some((_, slot)) => *slot = value,
          None => entries.push((key, value)),
        }
        if kind.is_sorted() {
          entries.sort_by(|(a, _), (b, _)| compare_keys(heap, a, b));
        }
        Value::Undefined
      }
      "get" => entries
        .iter()
        .find(|(k, _)| k.same_value_zero(&arg(0)))
        .map(|(_, v)| v.clone())
        .unwrap_or(Value::Undefined),
      "has" | "hasKey" => Value::Bool(entries.iter().any(|(k, _)| k.same_value_zero(&arg(0)))),
      "remove" | "delete" => {
        match entries.iter().position(|(k, _)| k.same_value_zero(&arg(0))) {
          Some(i) => entries.remove(i).1,
          None => Value::Undefined,
        }
      }
      "clear" => {
        entries.clear();
        Value::Undefined
      }
      _ => return None,
    },
    ContainerData::Values(values) => match name {
      "add" | "push" | "insertEnd" | "addLast" | "offer" => {
        let value = arg(0);
        if kind.is_set() && values.iter().any(|v| v.same_value_zero(&value)) {
          return Some(Value::Bool(false));
        }
        values.push(value);
        if kind.is_sorted() {
          values.sort_by(|a, b| compare_keys(heap, a, b));
        }
        match kind {
          ContainerKind::Stack => arg(0),
          ContainerKind::SendableArray => Value::Number(values.len() as f64),
          _ => Value::Bool(true),
        }
      }
      "insertFront" | "addFirst" | "unshift" => {
        values.insert(0, arg(0));
        Value::Undefined
      }
      "pop" => values.pop().unwrap_or(Value::Undefined),
      "get" => array_index(&arg(0))
        .and_then(|i| values.get(i).cloned())
        .unwrap_or(Value::Undefined),
      "has" => Value::Bool(values.iter().any(|v| v.same_value_zero(&arg(0)))),
      "clear" => {
        values.clear();
        Value::Undefined
      }
      _ => return None,
    },
  };
  Some(result)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn looks_up_builtins_by_name() {
    assert_eq!(Builtin::from_name("Map"), Some(Builtin::Map));
    assert_eq!(
      Builtin::from_name("BigUint64Array"),
      Some(Builtin::TypedArray(TypedArrayKind::BigUint64))
    );
    assert_eq!(
      Builtin::from_name("LightWeightSet"),
      Some(Builtin::Container(ContainerKind::LightWeightSet))
    );
    assert_eq!(Builtin::from_name("print"), Some(Builtin::Print));
    assert_eq!(Builtin::from_name("Proxy"), None);
  }

  #[test]
  fn oversized_lengths_are_rejected() {
    let mut heap = Heap::new();
    let is_type_error = |r: Result<Value, SimError>| matches!(r, Err(SimError::TypeError(_)));

    assert!(is_type_error(
      Builtin::ArrayBuffer.construct(&mut heap, &[Value::Number(1e20)])
    ));
    assert!(is_type_error(
      Builtin::ArrayBuffer.construct(&mut heap, &[Value::Number(2f64.powi(50))])
    ));
    assert!(is_type_error(
      Builtin::Array.construct(&mut heap, &[Value::Number(u32::MAX as f64)])
    ));

    let buffer = Builtin::ArrayBuffer
      .construct(&mut heap, &[Value::Number(4.0)])
      .unwrap();
    let uint16 = Builtin::TypedArray(TypedArrayKind::Uint16);
    for length in [2f64.powi(63), 2f64.powi(52), 3.0] {
      assert!(is_type_error(uint16.construct(
        &mut heap,
        &[buffer.clone(), Value::Number(0.0), Value::Number(length)]
      )));
    }
    assert!(uint16
      .construct(&mut heap, &[buffer.clone(), Value::Number(2.0), Value::Number(1.0)])
      .is_ok());

    let float64 = Builtin::TypedArray(TypedArrayKind::Float64);
    assert!(is_type_error(
      float64.construct(&mut heap, &[Value::Number(9007199254740991.0)])
    ));

    for (offset, length) in [(1.0, 9007199254740991.0), (0.0, 1e300), (5.0, 0.0)] {
      assert!(is_type_error(Builtin::DataView.construct(
        &mut heap,
        &[buffer.clone(), Value::Number(offset), Value::Number(length)]
      )));
    }
  }

  #[test]
  fn set_from_string_dedupes_characters() {
    let mut heap = Heap::new();
    let set = Builtin::Set
      .construct(&mut heap, &[Value::from("helloworld")])
      .unwrap();
    let size = get_property(&heap, &set, &Value::from("size")).unwrap();
    assert_eq!(size, Value::Number(7.0));
  }

  #[test]
  fn weak_collections_reject_primitive_keys() {
    let mut heap = Heap::new();
    let weak = Builtin::WeakMap.construct(&mut heap, &[]).unwrap();
    let err = call_method(&mut heap, &weak, "set", &[Value::Number(1.0), Value::Number(2.0)]);
    assert!(matches!(err, Err(SimError::TypeError(_))));
    let key = Builtin::Object
      .construct(&mut heap, &[Value::Number(1.0)])
      .unwrap();
    call_method(&mut heap, &weak, "set", &[key.clone(), Value::from("1")]).unwrap();
    assert_eq!(
      call_method(&mut heap, &weak, "get", &[key]).unwrap(),
      Value::from("1")
    );
  }

  #[test]
  fn tree_map_keeps_keys_sorted() {
    let mut heap = Heap::new();
    let tree = Builtin::Container(ContainerKind::TreeMap)
      .construct(&mut heap, &[])
      .unwrap();
    for key in ["b", "c", "a"] {
      call_method(&mut heap, &tree, "set", &[Value::from(key), Value::Number(0.0)]).unwrap();
    }
    let Value::Object(id) = tree else { unreachable!() };
    let ObjectKind::Container {
      data: ContainerData::Entries(entries),
      ..
    } = heap.kind(id)
    else {
      panic!("expected keyed container");
    };
    let keys: Vec<_> = entries.iter().map(|(k, _)| k.to_js_string()).collect();
    assert_eq!(keys, vec!["a", "b", "c"]);
  }

  #[test]
  fn number_and_string_coercions() {
    let mut heap = Heap::new();
    let mut out = Vec::new();
    let big = Value::BigInt(BigInt::from(999));
    assert_eq!(
      Builtin::Number.call(&mut heap, &mut out, &[big.clone()]).unwrap(),
      Value::Number(999.0)
    );
    let boxed = Builtin::Number.construct(&mut heap, &[big]).unwrap();
    assert_eq!(heap.to_number(&boxed), 999.0);
    assert_eq!(
      Builtin::BigInt
        .call(&mut heap, &mut out, &[Value::Number(5.0)])
        .unwrap(),
      Value::BigInt(BigInt::from(5))
    );
    assert!(Builtin::BigInt.construct(&mut heap, &[]).is_err());
    Builtin::Print
      .call(&mut heap, &mut out, &[Value::from("v1"), Value::Number(1.0)])
      .unwrap();
    assert_eq!(out, vec!["v1 1".to_string()]);
  }
}
