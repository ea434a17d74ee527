use crate::heap::ObjectId;
use num_bigint::BigInt;
use num_bigint::Sign;
use serde::Serialize;
use serde::Serializer;

/// A simulated JavaScript value.
///
/// Primitives are held inline; everything else lives in the [`crate::heap::Heap`] and is referenced
/// by [`ObjectId`].
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
  Undefined,
  Null,
  Bool(bool),
  Number(f64),
  String(String),
  BigInt(BigInt),
  Object(ObjectId),
}

impl Value {
  pub fn is_nullish(&self) -> bool {
    matches!(self, Value::Undefined | Value::Null)
  }

  pub fn as_object(&self) -> Option<ObjectId> {
    match self {
      Value::Object(id) => Some(*id),
      _ => None,
    }
  }

  /// ECMAScript `ToBoolean`.
  pub fn to_boolean(&self) -> bool {
    match self {
      Value::Undefined | Value::Null => false,
      Value::Bool(b) => *b,
      Value::Number(n) => *n != 0.0 && !n.is_nan(),
      Value::String(s) => !s.is_empty(),
      Value::BigInt(b) => b.sign() != Sign::NoSign,
      Value::Object(_) => true,
    }
  }

  /// ECMAScript `ToNumber` for primitives. Objects convert to `NaN`; boxed primitives are unwrapped
  /// by the caller, which has the heap.
  pub fn to_number(&self) -> f64 {
    match self {
      Value::Undefined => f64::NAN,
      Value::Null => 0.0,
      Value::Bool(b) => {
        if *b {
          1.0
        } else {
          0.0
        }
      }
      Value::Number(n) => *n,
      Value::String(s) => string_to_number(s),
      Value::BigInt(b) => bigint_to_f64(b),
      Value::Object(_) => f64::NAN,
    }
  }

  /// ECMAScript `ToString` for primitives. Objects stringify to `"[object Object]"`.
  pub fn to_js_string(&self) -> String {
    match self {
      Value::Undefined => "undefined".to_string(),
      Value::Null => "null".to_string(),
      Value::Bool(b) => b.to_string(),
      Value::Number(n) => number_to_string(*n),
      Value::String(s) => s.clone(),
      Value::BigInt(b) => b.to_string(),
      Value::Object(_) => "[object Object]".to_string(),
    }
  }

  /// ECMAScript `IsStrictlyEqual`.
  pub fn strict_equals(&self, other: &Value) -> bool {
    match (self, other) {
      (Value::Number(a), Value::Number(b)) => a == b,
      _ => self == other,
    }
  }

  /// ECMAScript `IsLooselyEqual`, without `ToPrimitive` on objects.
  pub fn loose_equals(&self, other: &Value) -> bool {
    match (self, other) {
      (a, b) if a.is_nullish() && b.is_nullish() => true,
      (Value::Undefined | Value::Null, _) | (_, Value::Undefined | Value::Null) => false,
      (Value::Number(_), Value::String(_))
      | (Value::String(_), Value::Number(_))
      | (Value::Bool(_), _)
      | (_, Value::Bool(_)) => self.to_number() == other.to_number(),
      (Value::BigInt(a), Value::Number(b)) | (Value::Number(b), Value::BigInt(a)) => {
        b.fract() == 0.0 && bigint_to_f64(a) == *b
      }
      (Value::BigInt(a), Value::String(s)) | (Value::String(s), Value::BigInt(a)) => {
        s.trim().parse::<BigInt>().is_ok_and(|b| &b == a)
      }
      _ => self.strict_equals(other),
    }
  }

  /// ECMAScript `SameValueZero`, the key equality of `Map` and `Set`.
  pub fn same_value_zero(&self, other: &Value) -> bool {
    match (self, other) {
      (Value::Number(a), Value::Number(b)) if a.is_nan() && b.is_nan() => true,
      _ => self.strict_equals(other),
    }
  }
}

impl From<f64> for Value {
  fn from(value: f64) -> Self {
    Value::Number(value)
  }
}

impl From<bool> for Value {
  fn from(value: bool) -> Self {
    Value::Bool(value)
  }
}

impl From<&str> for Value {
  fn from(value: &str) -> Self {
    Value::String(value.to_string())
  }
}

impl From<String> for Value {
  fn from(value: String) -> Self {
    Value::String(value)
  }
}

impl From<BigInt> for Value {
  fn from(value: BigInt) -> Self {
    Value::BigInt(value)
  }
}

impl From<ObjectId> for Value {
  fn from(value: ObjectId) -> Self {
    Value::Object(value)
  }
}

// Primitives serialize as their JSON counterparts; objects as `{"object": id}`.
impl Serialize for Value {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    #[derive(Serialize)]
    struct ObjectRef {
      object: u32,
    }

    match self {
      Value::Undefined => serializer.serialize_unit(),
      Value::Null => serializer.serialize_none(),
      Value::Bool(b) => serializer.serialize_bool(*b),
      Value::Number(n) => serializer.serialize_f64(*n),
      Value::String(s) => serializer.serialize_str(s),
      Value::BigInt(b) => serializer.serialize_str(&format!("{b}n")),
      Value::Object(id) => ObjectRef { object: id.raw() }.serialize(serializer),
    }
  }
}

pub(crate) fn bigint_to_f64(value: &BigInt) -> f64 {
  value.to_string().parse().unwrap_or(f64::NAN)
}

fn string_to_number(s: &str) -> f64 {
  let s = s.trim();
  if s.is_empty() {
    return 0.0;
  }
  let radix = |prefix: &[&str], radix: u32| {
    prefix
      .iter()
      .find_map(|p| s.strip_prefix(p))
      .map(|digits| {
        u64::from_str_radix(digits, radix)
          .map(|v| v as f64)
          .unwrap_or(f64::NAN)
      })
  };
  if let Some(n) = radix(&["0x", "0X"], 16)
    .or_else(|| radix(&["0o", "0O"], 8))
    .or_else(|| radix(&["0b", "0B"], 2))
  {
    return n;
  }
  match s {
    "Infinity" | "+Infinity" => f64::INFINITY,
    "-Infinity" => f64::NEG_INFINITY,
    // Rust accepts spellings like "inf" and "NaN" that JS rejects.
    _ if s.chars().any(|c| c.is_ascii_alphabetic() && c != 'e' && c != 'E') => f64::NAN,
    _ => s.parse().unwrap_or(f64::NAN),
  }
}

/// ECMAScript `Number::toString(10)`.
///
/// `ryu` produces the shortest round-tripping digits; they are re-laid out using the
/// decimal/exponential thresholds of `Number.prototype.toString`.
pub fn number_to_string(n: f64) -> String {
  if n.is_nan() {
    return "NaN".to_string();
  }
  if n == 0.0 {
    return "0".to_string();
  }
  if n.is_infinite() {
    return if n < 0.0 { "-Infinity" } else { "Infinity" }.to_string();
  }

  let mut buf = ryu::Buffer::new();
  let formatted = buf.format_finite(n.abs());
  let (mantissa, exp) = match formatted.split_once('e') {
    Some((m, e)) => (m, e.parse::<i32>().unwrap_or(0)),
    None => (formatted, 0),
  };
  let (int_part, frac_part) = mantissa.split_once('.').unwrap_or((mantissa, ""));
  let mut digits: String = format!("{int_part}{frac_part}");
  // Position of the decimal point relative to the start of `digits`.
  let mut point = int_part.len() as i32 + exp;
  let leading_zeros = digits.len() - digits.trim_start_matches('0').len();
  digits.drain(..leading_zeros);
  point -= leading_zeros as i32;
  let digits = digits.trim_end_matches('0');
  let k = digits.len() as i32;

  let mut out = String::new();
  if n < 0.0 {
    out.push('-');
  }
  if k <= point && point <= 21 {
    out.push_str(digits);
    out.extend(std::iter::repeat('0').take((point - k) as usize));
  } else if 0 < point && point <= 21 {
    out.push_str(&digits[..point as usize]);
    out.push('.');
    out.push_str(&digits[point as usize..]);
  } else if -6 < point && point <= 0 {
    out.push_str("0.");
    out.extend(std::iter::repeat('0').take((-point) as usize));
    out.push_str(digits);
  } else {
    let e = point - 1;
    out.push_str(&digits[..1]);
    if k > 1 {
      out.push('.');
      out.push_str(&digits[1..]);
    }
    out.push('e');
    out.push(if e < 0 { '-' } else { '+' });
    out.push_str(&e.abs().to_string());
  }
  out
}
