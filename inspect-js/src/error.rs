use crate::frame::FrameId;
use crate::frame::StackFrame;
use crate::scope::ScopeId;
use std::fmt::Display;

/// Errors produced while declaring or simulating a program.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SimError {
  /// A lexical declaration collides with another declaration of the same name in an overlapping
  /// scope. Raised by [`crate::scope::declare`] before anything executes.
  #[error("identifier `{name}` has already been declared")]
  DuplicateDeclaration { name: String, scope: ScopeId },

  /// A `let`/`const` binding was read or written before its declaration statement executed.
  #[error("cannot access `{name}` before initialization")]
  UninitializedBindingAccess { name: String },

  /// No scope in the chain declares the name.
  #[error("`{name}` is not defined")]
  Unresolved { name: String },

  #[error("assignment to constant binding `{name}`")]
  ConstAssignment { name: String },

  #[error("type error: {0}")]
  TypeError(String),

  /// The frame is not on the call stack.
  #[error("no active frame {0}")]
  UnknownFrame(FrameId),

  /// Attempted to call a non-callable value.
  #[error("{0} is not a function")]
  NotCallable(String),

  /// Attempted to construct a non-constructable value.
  #[error("{0} is not a constructor")]
  NotConstructable(String),

  /// A non-recoverable condition that ends the whole run (fuel exhausted, host interrupt, observer
  /// abort, etc).
  #[error("{0}")]
  Termination(Termination),
}

impl SimError {
  /// Whether a host may choose to skip the failing statement and keep executing.
  pub fn is_recoverable(&self) -> bool {
    matches!(self, SimError::UninitializedBindingAccess { .. })
  }

  pub(crate) fn type_error(msg: impl Into<String>) -> Self {
    SimError::TypeError(msg.into())
  }
}

/// A non-recoverable error that terminates execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Termination {
  pub reason: TerminationReason,
  /// The call stack at the point of termination, innermost frame last.
  pub stack: Vec<StackFrame>,
}

impl Termination {
  pub fn new(reason: TerminationReason, stack: Vec<StackFrame>) -> Self {
    Self { reason, stack }
  }
}

impl Display for Termination {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{reason}", reason = self.reason)
  }
}

/// The reason execution terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TerminationReason {
  OutOfFuel,
  Interrupted,
  StackOverflow,
  /// An observer returned [`crate::Control::Abort`].
  Aborted,
}

impl Display for TerminationReason {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      TerminationReason::OutOfFuel => f.write_str("execution terminated: out of fuel"),
      TerminationReason::Interrupted => f.write_str("execution terminated: interrupted"),
      TerminationReason::StackOverflow => f.write_str("execution terminated: stack overflow"),
      TerminationReason::Aborted => f.write_str("execution terminated: aborted by observer"),
    }
  }
}
