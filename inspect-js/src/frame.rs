use crate::env::ScopeRef;
use crate::heap::ObjectId;
use crate::scope::FunctionId;
use crate::value::Value;
use serde::Serialize;
use std::fmt;

/// Invocation id of a call frame. Ids are handed out in increasing order and never reused, so a
/// restarted frame gets a new one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct FrameId(u32);

impl FrameId {
  /// The frame running top-level code.
  pub const GLOBAL: FrameId = FrameId(0);

  pub fn raw(self) -> u32 {
    self.0
  }
}

impl fmt::Display for FrameId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "#{}", self.0)
  }
}

#[derive(Clone, Debug)]
pub struct CallFrame {
  pub id: FrameId,
  /// `None` for the global frame.
  pub function: Option<FunctionId>,
  pub name: String,
  pub callee: Option<ObjectId>,
  pub arguments: Vec<Value>,
  pub function_scope: ScopeRef,
  /// The innermost scope currently active in this frame.
  pub scope: ScopeRef,
  pub caller: Option<FrameId>,
  // Length of the write journal when the frame was entered.
  pub(crate) journal_mark: usize,
}

/// A frame as reported in a termination.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct StackFrame {
  pub frame: FrameId,
  pub function: String,
}

#[derive(Clone, Debug, Default)]
pub struct CallStack {
  frames: Vec<CallFrame>,
  next_id: u32,
}

impl CallStack {
  pub fn new() -> Self {
    Self::default()
  }

  pub(crate) fn next_id(&mut self) -> FrameId {
    let id = FrameId(self.next_id);
    self.next_id += 1;
    id
  }

  pub(crate) fn push(&mut self, frame: CallFrame) {
    self.frames.push(frame);
  }

  pub(crate) fn pop(&mut self) -> Option<CallFrame> {
    self.frames.pop()
  }

  pub fn depth(&self) -> usize {
    self.frames.len()
  }

  pub fn top(&self) -> Option<&CallFrame> {
    self.frames.last()
  }

  pub(crate) fn top_mut(&mut self) -> Option<&mut CallFrame> {
    self.frames.last_mut()
  }

  pub fn get(&self, id: FrameId) -> Option<&CallFrame> {
    self.frames.iter().find(|f| f.id == id)
  }

  /// Frames from outermost to innermost.
  pub fn iter(&self) -> impl DoubleEndedIterator<Item = &CallFrame> {
    self.frames.iter()
  }

  pub fn summary(&self) -> Vec<StackFrame> {
    self
      .frames
      .iter()
      .map(|f| StackFrame {
        frame: f.id,
        function: f.name.clone(),
      })
      .collect()
  }
}
