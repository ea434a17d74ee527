use crate::builtins::Builtin;
use crate::env::ScopeRef;
use crate::error::SimError;
use crate::scope::FunctionId;
use crate::value::Value;
use itertools::Itertools;
use num_bigint::BigInt;
use num_bigint::Sign;
use serde::Deserialize;
use serde::Serialize;

/// What a function value stringifies to; the source text of a function is never available.
pub const FUNCTION_SOURCE_UNAVAILABLE: &str = "Cannot get source code of funtion";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ObjectId(u32);

impl ObjectId {
  pub fn raw(self) -> u32 {
    self.0
  }
}

/// A function value: code plus the scope instance that was active where it was created.
#[derive(Clone, Debug, PartialEq)]
pub struct Closure {
  pub function: FunctionId,
  pub name: Option<String>,
  pub defining_scope: ScopeRef,
  pub generator: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypedArrayKind {
  Int8,
  Uint8,
  Uint8Clamped,
  Int16,
  Uint16,
  Int32,
  Uint32,
  Float32,
  Float64,
  BigInt64,
  BigUint64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Signedness {
  Signed,
  Unsigned,
  Clamped,
  Float,
}

impl TypedArrayKind {
  pub const ALL: [TypedArrayKind; 11] = [
    TypedArrayKind::Int8,
    TypedArrayKind::Uint8,
    TypedArrayKind::Uint8Clamped,
    TypedArrayKind::Int16,
    TypedArrayKind::Uint16,
    TypedArrayKind::Int32,
    TypedArrayKind::Uint32,
    TypedArrayKind::Float32,
    TypedArrayKind::Float64,
    TypedArrayKind::BigInt64,
    TypedArrayKind::BigUint64,
  ];

  /// Element size in bytes.
  pub fn element_width(self) -> usize {
    match self {
      TypedArrayKind::Int8 | TypedArrayKind::Uint8 | TypedArrayKind::Uint8Clamped => 1,
      TypedArrayKind::Int16 | TypedArrayKind::Uint16 => 2,
      TypedArrayKind::Int32 | TypedArrayKind::Uint32 | TypedArrayKind::Float32 => 4,
      TypedArrayKind::Float64 | TypedArrayKind::BigInt64 | TypedArrayKind::BigUint64 => 8,
    }
  }

  pub fn signedness(self) -> Signedness {
    match self {
      TypedArrayKind::Int8
      | TypedArrayKind::Int16
      | TypedArrayKind::Int32
      | TypedArrayKind::BigInt64 => Signedness::Signed,
      TypedArrayKind::Uint8
      | TypedArrayKind::Uint16
      | TypedArrayKind::Uint32
      | TypedArrayKind::BigUint64 => Signedness::Unsigned,
      TypedArrayKind::Uint8Clamped => Signedness::Clamped,
      TypedArrayKind::Float32 | TypedArrayKind::Float64 => Signedness::Float,
    }
  }

  pub fn is_bigint(self) -> bool {
    matches!(self, TypedArrayKind::BigInt64 | TypedArrayKind::BigUint64)
  }

  /// The constructor name, e.g. `Uint8ClampedArray`.
  pub fn name(self) -> &'static str {
    match self {
      TypedArrayKind::Int8 => "Int8Array",
      TypedArrayKind::Uint8 => "Uint8Array",
      TypedArrayKind::Uint8Clamped => "Uint8ClampedArray",
      TypedArrayKind::Int16 => "Int16Array",
      TypedArrayKind::Uint16 => "Uint16Array",
      TypedArrayKind::Int32 => "Int32Array",
      TypedArrayKind::Uint32 => "Uint32Array",
      TypedArrayKind::Float32 => "Float32Array",
      TypedArrayKind::Float64 => "Float64Array",
      TypedArrayKind::BigInt64 => "BigInt64Array",
      TypedArrayKind::BigUint64 => "BigUint64Array",
    }
  }

  /// Decodes one little-endian element.
  pub fn read(self, bytes: &[u8]) -> Value {
    let mut raw = [0u8; 8];
    raw[..bytes.len().min(8)].copy_from_slice(&bytes[..bytes.len().min(8)]);
    let bits = u64::from_le_bytes(raw);
    match self {
      TypedArrayKind::Int8 => Value::Number(bits as u8 as i8 as f64),
      TypedArrayKind::Uint8 | TypedArrayKind::Uint8Clamped => Value::Number(bits as u8 as f64),
      TypedArrayKind::Int16 => Value::Number(bits as u16 as i16 as f64),
      TypedArrayKind::Uint16 => Value::Number(bits as u16 as f64),
      TypedArrayKind::Int32 => Value::Number(bits as u32 as i32 as f64),
      TypedArrayKind::Uint32 => Value::Number(bits as u32 as f64),
      TypedArrayKind::Float32 => Value::Number(f32::from_bits(bits as u32) as f64),
      TypedArrayKind::Float64 => Value::Number(f64::from_bits(bits)),
      TypedArrayKind::BigInt64 => Value::BigInt(BigInt::from(bits as i64)),
      TypedArrayKind::BigUint64 => Value::BigInt(BigInt::from(bits)),
    }
  }

  /// Encodes `value` as one little-endian element, applying the kind's conversion.
  pub fn write(self, value: &Value) -> Result<Vec<u8>, SimError> {
    let width = self.element_width();
    let bits: u64 = match self {
      TypedArrayKind::BigInt64 | TypedArrayKind::BigUint64 => match value {
        Value::BigInt(b) => bigint_low_u64(b),
        other => {
          return Err(SimError::type_error(format!(
            "cannot convert {} to a BigInt",
            other.to_js_string()
          )))
        }
      },
      TypedArrayKind::Float32 => (value.to_number() as f32).to_bits() as u64,
      TypedArrayKind::Float64 => value.to_number().to_bits(),
      TypedArrayKind::Uint8Clamped => {
        let n = value.to_number();
        if n.is_nan() {
          0
        } else {
          round_half_even(n.clamp(0.0, 255.0)) as u64
        }
      }
      _ => {
        if let Value::BigInt(_) = value {
          return Err(SimError::type_error("cannot convert a BigInt to a number"));
        }
        to_uint_modulo(value.to_number(), width as u32 * 8)
      }
    };
    Ok(bits.to_le_bytes()[..width].to_vec())
  }
}

fn bigint_low_u64(value: &BigInt) -> u64 {
  let (sign, digits) = value.to_u64_digits();
  let low = digits.first().copied().unwrap_or(0);
  if sign == Sign::Minus {
    low.wrapping_neg()
  } else {
    low
  }
}

fn to_uint_modulo(n: f64, bits: u32) -> u64 {
  if !n.is_finite() {
    return 0;
  }
  let modulus = 2f64.powi(bits as i32);
  n.trunc().rem_euclid(modulus) as u64
}

fn round_half_even(n: f64) -> f64 {
  let floor = n.floor();
  let diff = n - floor;
  if diff > 0.5 || (diff == 0.5 && floor % 2.0 != 0.0) {
    floor + 1.0
  } else {
    floor
  }
}

/// Container classes loaded from the host runtime's private module, and the sendable collections.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContainerKind {
  ArrayList,
  Deque,
  HashMap,
  HashSet,
  LightWeightMap,
  LightWeightSet,
  LinkedList,
  List,
  PlainArray,
  Queue,
  Stack,
  TreeMap,
  TreeSet,
  Vector,
  SendableMap,
  SendableSet,
  SendableArray,
}

impl ContainerKind {
  pub const ALL: [ContainerKind; 17] = [
    ContainerKind::ArrayList,
    ContainerKind::Deque,
    ContainerKind::HashMap,
    ContainerKind::HashSet,
    ContainerKind::LightWeightMap,
    ContainerKind::LightWeightSet,
    ContainerKind::LinkedList,
    ContainerKind::List,
    ContainerKind::PlainArray,
    ContainerKind::Queue,
    ContainerKind::Stack,
    ContainerKind::TreeMap,
    ContainerKind::TreeSet,
    ContainerKind::Vector,
    ContainerKind::SendableMap,
    ContainerKind::SendableSet,
    ContainerKind::SendableArray,
  ];

  pub fn name(self) -> &'static str {
    match self {
      ContainerKind::ArrayList => "ArrayList",
      ContainerKind::Deque => "Deque",
      ContainerKind::HashMap => "HashMap",
      ContainerKind::HashSet => "HashSet",
      ContainerKind::LightWeightMap => "LightWeightMap",
      ContainerKind::LightWeightSet => "LightWeightSet",
      ContainerKind::LinkedList => "LinkedList",
      ContainerKind::List => "List",
      ContainerKind::PlainArray => "PlainArray",
      ContainerKind::Queue => "Queue",
      ContainerKind::Stack => "Stack",
      ContainerKind::TreeMap => "TreeMap",
      ContainerKind::TreeSet => "TreeSet",
      ContainerKind::Vector => "Vector",
      ContainerKind::SendableMap => "SendableMap",
      ContainerKind::SendableSet => "SendableSet",
      ContainerKind::SendableArray => "SendableArray",
    }
  }

  /// Whether entries are key/value pairs.
  pub fn is_keyed(self) -> bool {
    matches!(
      self,
      ContainerKind::HashMap
        | ContainerKind::LightWeightMap
        | ContainerKind::PlainArray
        | ContainerKind::TreeMap
        | ContainerKind::SendableMap
    )
  }

  /// Whether duplicate values are collapsed.
  pub fn is_set(self) -> bool {
    matches!(
      self,
      ContainerKind::HashSet
        | ContainerKind::LightWeightSet
        | ContainerKind::TreeSet
        | ContainerKind::SendableSet
    )
  }

  /// Whether entries are kept ordered by key (or value, for sets).
  pub fn is_sorted(self) -> bool {
    matches!(
      self,
      ContainerKind::TreeMap | ContainerKind::TreeSet | ContainerKind::PlainArray
    )
  }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ContainerData {
  Values(Vec<Value>),
  Entries(Vec<(Value, Value)>),
}

impl ContainerData {
  pub fn len(&self) -> usize {
    match self {
      ContainerData::Values(v) => v.len(),
      ContainerData::Entries(e) => e.len(),
    }
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ObjectKind {
  Plain,
  Array(Vec<Value>),
  Function(Closure),
  Builtin(Builtin),
  /// A `Number`, `String`, `Boolean` or `BigInt` wrapper object.
  Boxed(Value),
  RegExp {
    pattern: String,
    flags: String,
  },
  /// The constructor argument, if any; no clock or time zone is consulted.
  Date(Option<String>),
  ArrayBuffer(Vec<u8>),
  DataView {
    buffer: ObjectId,
    offset: usize,
    length: usize,
  },
  TypedArray {
    kind: TypedArrayKind,
    buffer: ObjectId,
    offset: usize,
    length: usize,
  },
  Map(Vec<(Value, Value)>),
  Set(Vec<Value>),
  WeakMap(Vec<(ObjectId, Value)>),
  WeakSet(Vec<ObjectId>),
  Container {
    kind: ContainerKind,
    data: ContainerData,
  },
  /// The object returned by calling a generator function. Its body never runs.
  Generator {
    function: FunctionId,
    name: Option<String>,
  },
}

#[derive(Clone, Debug, PartialEq)]
pub struct HeapObject {
  pub kind: ObjectKind,
  /// Own string-keyed properties in insertion order.
  pub properties: Vec<(String, Value)>,
}

/// Arena of every object created during a run. Objects are never freed.
#[derive(Clone, Debug, Default)]
pub struct Heap {
  objects: Vec<HeapObject>,
}

impl Heap {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn len(&self) -> usize {
    self.objects.len()
  }

  pub fn is_empty(&self) -> bool {
    self.objects.is_empty()
  }

  pub fn alloc(&mut self, kind: ObjectKind) -> ObjectId {
    self.alloc_with_properties(kind, Vec::new())
  }

  pub fn alloc_with_properties(
    &mut self,
    kind: ObjectKind,
    properties: Vec<(String, Value)>,
  ) -> ObjectId {
    let id = ObjectId(self.objects.len() as u32);
    self.objects.push(HeapObject { kind, properties });
    id
  }

  pub fn get(&self, id: ObjectId) -> &HeapObject {
    &self.objects[id.0 as usize]
  }

  pub fn get_mut(&mut self, id: ObjectId) -> &mut HeapObject {
    &mut self.objects[id.0 as usize]
  }

  pub fn kind(&self, id: ObjectId) -> &ObjectKind {
    &self.get(id).kind
  }

  pub fn closure(&self, value: &Value) -> Option<&Closure> {
    match value {
      Value::Object(id) => match self.kind(*id) {
        ObjectKind::Function(closure) => Some(closure),
        _ => None,
      },
      _ => None,
    }
  }

  pub fn own_property(&self, id: ObjectId, key: &str) -> Option<&Value> {
    self
      .get(id)
      .properties
      .iter()
      .find(|(k, _)| k == key)
      .map(|(_, v)| v)
  }

  pub fn set_own_property(&mut self, id: ObjectId, key: &str, value: Value) {
    let properties = &mut self.get_mut(id).properties;
    match properties.iter_mut().find(|(k, _)| k == key) {
      Some((_, slot)) => *slot = value,
      None => properties.push((key.to_string(), value)),
    }
  }

  pub fn buffer_bytes(&self, buffer: ObjectId) -> &[u8] {
    match self.kind(buffer) {
      ObjectKind::ArrayBuffer(bytes) => bytes,
      _ => &[],
    }
  }

  /// Decodes every element of a typed array through its buffer.
  pub fn typed_array_values(&self, id: ObjectId) -> Vec<Value> {
    let ObjectKind::TypedArray {
      kind,
      buffer,
      offset,
      length,
    } = *self.kind(id)
    else {
      return Vec::new();
    };
    let bytes = self.buffer_bytes(buffer);
    let width = kind.element_width();
    (0..length)
      .filter_map(|i| {
        let start = offset + i * width;
        bytes.get(start..start + width).map(|b| kind.read(b))
      })
      .collect()
  }

  pub fn typed_array_set(&mut self, id: ObjectId, index: usize, value: &Value) -> Result<(), SimError> {
    let ObjectKind::TypedArray {
      kind,
      buffer,
      offset,
      length,
    } = *self.kind(id)
    else {
      return Ok(());
    };
    // Out-of-range writes are silently dropped.
    if index >= length {
      return Ok(());
    }
    let encoded = kind.write(value)?;
    let start = offset + index * kind.element_width();
    if let ObjectKind::ArrayBuffer(bytes) = &mut self.get_mut(buffer).kind {
      if let Some(dest) = bytes.get_mut(start..start + encoded.len()) {
        dest.copy_from_slice(&encoded);
      }
    }
    Ok(())
  }

  /// ECMAScript `ToString`, extended to heap objects.
  pub fn to_js_string(&self, value: &Value) -> String {
    let Value::Object(id) = value else {
      return value.to_js_string();
    };
    match self.kind(*id) {
      ObjectKind::Plain | ObjectKind::Container { .. } => "[object Object]".to_string(),
      ObjectKind::Array(elements) => self.join(elements),
      ObjectKind::Function(_) | ObjectKind::Builtin(_) => FUNCTION_SOURCE_UNAVAILABLE.to_string(),
      ObjectKind::Boxed(inner) => inner.to_js_string(),
      ObjectKind::RegExp { pattern, flags } => format!("/{pattern}/{flags}"),
      ObjectKind::Date(Some(source)) => source.clone(),
      ObjectKind::Date(None) => "Invalid Date".to_string(),
      ObjectKind::ArrayBuffer(_) => "[object ArrayBuffer]".to_string(),
      ObjectKind::DataView { .. } => "[object DataView]".to_string(),
      ObjectKind::TypedArray { .. } => self.join(&self.typed_array_values(*id)),
      ObjectKind::Map(_) => "[object Map]".to_string(),
      ObjectKind::Set(_) => "[object Set]".to_string(),
      ObjectKind::WeakMap(_) => "[object WeakMap]".to_string(),
      ObjectKind::WeakSet(_) => "[object WeakSet]".to_string(),
      ObjectKind::Generator { .. } => "[object Generator]".to_string(),
    }
  }

  /// `Array.prototype.join` with the default separator.
  pub fn join(&self, elements: &[Value]) -> String {
    elements
      .iter()
      .map(|v| {
        if v.is_nullish() {
          String::new()
        } else {
          self.to_js_string(v)
        }
      })
      .join(",")
  }

  /// `ToNumber`, unwrapping boxed primitives.
  pub fn to_number(&self, value: &Value) -> f64 {
    match value {
      Value::Object(id) => match self.kind(*id) {
        ObjectKind::Boxed(inner) => inner.to_number(),
        ObjectKind::Date(_) => f64::NAN,
        _ => Value::String(self.to_js_string(value)).to_number(),
      },
      other => other.to_number(),
    }
  }
}
