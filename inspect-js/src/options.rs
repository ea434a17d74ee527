use serde::Deserialize;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

/// Construction-time simulator options.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SimOptions {
  /// Calls nested deeper than this terminate with
  /// [`crate::TerminationReason::StackOverflow`].
  pub max_stack_depth: usize,
  /// Statements a run may execute before terminating with
  /// [`crate::TerminationReason::OutOfFuel`]. `None` is unlimited.
  pub fuel: Option<u64>,
  /// Assigning to an undeclared name creates a global `var` instead of failing.
  pub implicit_globals: bool,
  /// Journal binding writes so a frame can be dropped and restarted.
  pub record_writes: bool,
  /// Optional shared interrupt flag.
  ///
  /// If provided, the simulator polls this flag so hosts can cancel a run by setting it to `true`.
  #[serde(skip)]
  pub interrupt_flag: Option<Arc<AtomicBool>>,
}

impl Default for SimOptions {
  fn default() -> Self {
    Self {
      max_stack_depth: 1024,
      fuel: None,
      implicit_globals: false,
      record_writes: true,
      interrupt_flag: None,
    }
  }
}

impl SimOptions {
  pub fn budget(&self) -> Budget {
    Budget { fuel: self.fuel }
  }
}

/// Per-run execution budget.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Budget {
  pub fuel: Option<u64>,
}

impl Budget {
  pub fn unlimited() -> Self {
    Self { fuel: None }
  }

  /// Consumes one tick. Returns `false` once the fuel is exhausted.
  pub(crate) fn tick(&mut self) -> bool {
    match &mut self.fuel {
      Some(0) => false,
      Some(fuel) => {
        *fuel -= 1;
        true
      }
      None => true,
    }
  }
}
