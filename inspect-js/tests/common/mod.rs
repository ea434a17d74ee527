#![allow(dead_code)]

use inspect_js::Program;
use serde::Serialize;
use similar::ChangeTag;
use similar::TextDiff;
use std::path::PathBuf;

pub fn fixture(name: &str) -> Program {
  let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
    .join("tests")
    .join("fixtures")
    .join(name);
  let json = std::fs::read_to_string(&path)
    .unwrap_or_else(|err| panic!("failed to read {}: {err}", path.display()));
  Program::from_json(&json).unwrap_or_else(|err| panic!("invalid fixture {name}: {err}"))
}

/// Compares the JSON form of `actual` with `expected`, panicking with a line diff on mismatch.
pub fn assert_json_eq(expected: serde_json::Value, actual: &impl Serialize) {
  let actual = serde_json::to_value(actual).unwrap();
  if actual == expected {
    return;
  }
  let expected_fmt = serde_json::to_string_pretty(&expected).unwrap();
  let actual_fmt = serde_json::to_string_pretty(&actual).unwrap();
  let mut msg = String::from("JSON mismatch:\n");
  let diff = TextDiff::from_lines(&expected_fmt, &actual_fmt);
  for change in diff.iter_all_changes() {
    let sign = match change.tag() {
      ChangeTag::Delete => "-",
      ChangeTag::Insert => "+",
      ChangeTag::Equal => " ",
    };
    msg.push_str(sign);
    msg.push_str(change.as_str().unwrap());
    if change.missing_newline() {
      msg.push('\n');
    }
  }
  panic!("{msg}");
}
