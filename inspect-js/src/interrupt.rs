use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;

/// A flag the simulator polls at every statement boundary.
#[derive(Debug, Clone)]
pub struct InterruptToken {
  interrupted: Arc<AtomicBool>,
}

impl InterruptToken {
  pub fn new() -> (Self, InterruptHandle) {
    Self::from_shared_flag(Arc::new(AtomicBool::new(false)))
  }

  /// Observes a flag owned by the host.
  pub fn from_shared_flag(interrupted: Arc<AtomicBool>) -> (Self, InterruptHandle) {
    (
      Self {
        interrupted: interrupted.clone(),
      },
      InterruptHandle { interrupted },
    )
  }

  pub fn is_interrupted(&self) -> bool {
    self.interrupted.load(Ordering::Relaxed)
  }
}

/// A host handle used to stop a run from another thread.
#[derive(Debug, Clone)]
pub struct InterruptHandle {
  interrupted: Arc<AtomicBool>,
}

impl InterruptHandle {
  /// The run terminates with [`crate::TerminationReason::Interrupted`] at the next statement.
  pub fn interrupt(&self) {
    self.interrupted.store(true, Ordering::Relaxed);
  }

  pub fn reset(&self) {
    self.interrupted.store(false, Ordering::Relaxed);
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn handle_is_send() {
    fn assert_send<T: Send + Sync>() {}
    assert_send::<InterruptHandle>();
  }

  #[test]
  fn shared_flag_is_observed() {
    let flag = Arc::new(AtomicBool::new(false));
    let (token, handle) = InterruptToken::from_shared_flag(flag.clone());
    flag.store(true, Ordering::Relaxed);
    assert!(token.is_interrupted());
    handle.reset();
    assert!(!token.is_interrupted());
  }
}
