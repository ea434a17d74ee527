//! Read-only inspection of a paused simulation, and an observer that records it.

use crate::classify::describe;
use crate::classify::entries;
use crate::classify::EntryPage;
use crate::classify::EntryRange;
use crate::classify::RemoteValue;
use crate::closure::closure_scope;
use crate::closure::ClosureSnapshot;
use crate::env::BindingRef;
use crate::env::ScopeArena;
use crate::env::ScopeRef;
use crate::error::SimError;
use crate::exec::Control;
use crate::exec::Observer;
use crate::exec::Pause;
use crate::frame::CallFrame;
use crate::frame::CallStack;
use crate::frame::FrameId;
use crate::heap::Heap;
use crate::program::DeclKind;
use crate::scope::FunctionId;
use crate::scope::ScopeKind;
use crate::scope::ScopeTree;
use crate::value::Value;
use ahash::AHashMap;
use ahash::AHashSet;
use serde::Serialize;

/// The value of a binding as a debugger shows it.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum InspectedValue {
  /// A `let`/`const` whose declaration has not run.
  Uninitialized,
  Initialized { value: Value, remote: RemoteValue },
}

impl InspectedValue {
  pub fn value(&self) -> Option<&Value> {
    match self {
      InspectedValue::Uninitialized => None,
      InspectedValue::Initialized { value, .. } => Some(value),
    }
  }

  pub fn remote(&self) -> Option<&RemoteValue> {
    match self {
      InspectedValue::Uninitialized => None,
      InspectedValue::Initialized { remote, .. } => Some(remote),
    }
  }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotEntry {
  pub name: String,
  pub kind: DeclKind,
  pub scope: ScopeRef,
  pub scope_kind: ScopeKind,
  pub value: InspectedValue,
}

/// Every binding visible from a frame, innermost scope first, then in declaration order. A name
/// appears once, from the innermost scope that binds it.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Snapshot {
  pub frame: FrameId,
  pub function: String,
  pub entries: Vec<SnapshotEntry>,
}

impl Snapshot {
  pub fn get(&self, name: &str) -> Option<&SnapshotEntry> {
    self.entries.iter().find(|e| e.name == name)
  }

  /// The value bound to `name`, if visible and initialized.
  pub fn value(&self, name: &str) -> Option<&Value> {
    self.get(name).and_then(|e| e.value.value())
  }

  pub fn names(&self) -> Vec<&str> {
    self.entries.iter().map(|e| e.name.as_str()).collect()
  }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum ScopeViewKind {
  Local,
  Block,
  Closure,
  Global,
}

/// One scope of a frame's scope chain, as listed by a debugger's scope pane.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ScopeView {
  pub kind: ScopeViewKind,
  pub scope: ScopeRef,
  pub entries: Vec<SnapshotEntry>,
}

/// Read-only access to the state of a simulation.
///
/// Nothing here mutates the simulation, so taking the same snapshot twice gives equal results.
#[derive(Clone, Copy)]
pub struct Inspector<'a> {
  pub(crate) tree: &'a ScopeTree,
  pub(crate) env: &'a ScopeArena,
  pub(crate) heap: &'a Heap,
  pub(crate) stack: &'a CallStack,
  pub(crate) free_variables: &'a AHashMap<FunctionId, Vec<String>>,
}

impl<'a> Inspector<'a> {
  pub fn tree(&self) -> &'a ScopeTree {
    self.tree
  }

  pub fn env(&self) -> &'a ScopeArena {
    self.env
  }

  pub fn heap(&self) -> &'a Heap {
    self.heap
  }

  pub fn stack(&self) -> &'a CallStack {
    self.stack
  }

  fn frame(&self, frame: FrameId) -> Result<&'a CallFrame, SimError> {
    self.stack.get(frame).ok_or(SimError::UnknownFrame(frame))
  }

  fn entry(&self, binding: BindingRef) -> SnapshotEntry {
    let b = self.env.binding(binding);
    let value = if b.initialized {
      InspectedValue::Initialized {
        value: b.value.clone(),
        remote: describe(self.heap, &b.value),
      }
    } else {
      InspectedValue::Uninitialized
    };
    SnapshotEntry {
      name: b.name.clone(),
      kind: b.kind,
      scope: binding.scope,
      scope_kind: self.env.get(binding.scope).kind,
      value,
    }
  }

  pub fn snapshot(&self, frame: FrameId) -> Result<Snapshot, SimError> {
    let call = self.frame(frame)?;
    let mut seen = AHashSet::new();
    let entries = self
      .env
      .chain(call.scope)
      .flat_map(|scope| self.env.bindings_of(scope))
      .filter(|b| seen.insert(self.env.binding(*b).name.as_str()))
      .map(|b| self.entry(b))
      .collect();
    Ok(Snapshot {
      frame,
      function: call.name.clone(),
      entries,
    })
  }

  /// Snapshot of the innermost frame.
  pub fn current(&self) -> Result<Snapshot, SimError> {
    let top = self.stack.top().ok_or(SimError::UnknownFrame(FrameId::GLOBAL))?;
    self.snapshot(top.id)
  }

  /// The scope chain of `frame`, grouped per scope. Scopes entered by the frame itself are `Local`
  /// (its function scope) or `Block`; scopes it inherited through its closure are `Closure`.
  /// Shadowing is not applied across scopes.
  pub fn scope_chain(&self, frame: FrameId) -> Result<Vec<ScopeView>, SimError> {
    let call = self.frame(frame)?;
    let mut past_local = false;
    let mut views = Vec::new();
    for scope in self.env.chain(call.scope) {
      let kind = if self.env.get(scope).kind == ScopeKind::Global {
        ScopeViewKind::Global
      } else if past_local {
        ScopeViewKind::Closure
      } else if scope == call.function_scope {
        past_local = true;
        ScopeViewKind::Local
      } else {
        ScopeViewKind::Block
      };
      views.push(ScopeView {
        kind,
        scope,
        entries: self.env.bindings_of(scope).map(|b| self.entry(b)).collect(),
      });
    }
    Ok(views)
  }

  /// Reads `name` as code running in `frame` would.
  pub fn lookup(&self, frame: FrameId, name: &str) -> Result<Value, SimError> {
    let call = self.frame(frame)?;
    self.env.lookup(call.scope, name)
  }

  pub fn describe(&self, value: &Value) -> RemoteValue {
    describe(self.heap, value)
  }

  pub fn entries(&self, value: &Value, range: Option<EntryRange>) -> EntryPage {
    entries(self.heap, value, range)
  }

  pub fn closure(&self, function: &Value) -> Result<ClosureSnapshot<'a>, SimError> {
    ClosureSnapshot::new(self.heap, self.env, function)
  }

  /// The "Closure" scope of a function value: its free variables as currently bound.
  pub fn closure_scope(&self, function: &Value) -> Result<Vec<SnapshotEntry>, SimError> {
    let snapshot = self.closure(function)?;
    let names = self
      .free_variables
      .get(&snapshot.function())
      .map(Vec::as_slice)
      .unwrap_or_default();
    Ok(
      closure_scope(self.heap, self.env, function, names)?
        .into_iter()
        .map(|b| self.entry(b))
        .collect(),
    )
  }
}

/// What caused a recorded pause.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum PauseEvent {
  Debugger { label: Option<String> },
  Call,
  Return { value: RemoteValue },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Record {
  pub event: PauseEvent,
  pub snapshot: Snapshot,
}

/// Records a snapshot at every `debugger` statement, and optionally at every call and return.
#[derive(Debug, Default)]
pub struct SnapshotRecorder {
  record_calls: bool,
  records: Vec<Record>,
}

impl SnapshotRecorder {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_calls() -> Self {
    Self {
      record_calls: true,
      records: Vec::new(),
    }
  }

  pub fn records(&self) -> &[Record] {
    &self.records
  }

  pub fn into_records(self) -> Vec<Record> {
    self.records
  }

  /// Snapshots taken at `debugger` statements labelled `label`, in execution order.
  pub fn at<'s>(&'s self, label: &'s str) -> impl Iterator<Item = &'s Snapshot> + 's {
    self.records.iter().filter_map(move |r| match &r.event {
      PauseEvent::Debugger { label: Some(l) } if l == label => Some(&r.snapshot),
      _ => None,
    })
  }

  pub fn first_at<'s>(&'s self, label: &'s str) -> Option<&'s Snapshot> {
    self.at(label).next()
  }

  fn record(&mut self, pause: &Pause<'_>, event: PauseEvent) {
    // The paused frame is always on the stack.
    if let Ok(snapshot) = pause.inspector.snapshot(pause.frame) {
      self.records.push(Record { event, snapshot });
    }
  }
}

impl Observer for SnapshotRecorder {
  fn on_debugger(&mut self, pause: &Pause<'_>, label: Option<&str>) -> Control {
    self.record(
      pause,
      PauseEvent::Debugger {
        label: label.map(str::to_string),
      },
    );
    Control::Continue
  }

  fn on_call(&mut self, pause: &Pause<'_>) -> Control {
    if self.record_calls {
      self.record(pause, PauseEvent::Call);
    }
    Control::Continue
  }

  fn on_return(&mut self, pause: &Pause<'_>, value: &Value) -> Control {
    if self.record_calls {
      let value = pause.inspector.describe(value);
      self.record(pause, PauseEvent::Return { value });
    }
    Control::Continue
  }
}
