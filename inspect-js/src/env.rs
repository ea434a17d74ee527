use crate::error::SimError;
use crate::frame::FrameId;
use crate::program::DeclKind;
use crate::scope::ScopeId;
use crate::scope::ScopeKind;
use crate::scope::ScopeTree;
use crate::value::Value;
use serde::Serialize;

/// Index of a scope instance in the [`ScopeArena`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ScopeRef(u32);

impl ScopeRef {
  pub fn raw(self) -> u32 {
    self.0
  }
}

/// A binding slot inside a scope instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct BindingRef {
  pub scope: ScopeRef,
  pub slot: u32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Binding {
  pub name: String,
  pub kind: DeclKind,
  pub value: Value,
  /// `false` for a `let`/`const` whose declaration has not run yet.
  pub initialized: bool,
  /// Created by assigning to an undeclared name.
  pub implicit: bool,
}

/// A runtime instance of a static scope.
#[derive(Clone, Debug, PartialEq)]
pub struct EnvScope {
  pub kind: ScopeKind,
  pub static_scope: ScopeId,
  pub parent: Option<ScopeRef>,
  pub bindings: Vec<Binding>,
  /// The frame that created this instance.
  pub frame: FrameId,
}

impl EnvScope {
  fn slot(&self, name: &str) -> Option<u32> {
    self
      .bindings
      .iter()
      .position(|b| b.name == name)
      .map(|i| i as u32)
  }
}

/// Every scope instance created during a run. Instances are never freed, so a closure's defining
/// scope stays readable after its frame returns.
#[derive(Clone, Debug, Default)]
pub struct ScopeArena {
  scopes: Vec<EnvScope>,
}

impl ScopeArena {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn len(&self) -> usize {
    self.scopes.len()
  }

  pub fn is_empty(&self) -> bool {
    self.scopes.is_empty()
  }

  /// Instantiates `static_scope`: hoisted bindings start initialized to `undefined`, lexical ones
  /// start uninitialized.
  pub fn instantiate(
    &mut self,
    tree: &ScopeTree,
    static_scope: ScopeId,
    parent: Option<ScopeRef>,
    frame: FrameId,
  ) -> ScopeRef {
    let data = tree.scope(static_scope);
    let bindings = data
      .declarations
      .iter()
      .map(|decl| Binding {
        name: decl.name.clone(),
        kind: decl.kind,
        value: Value::Undefined,
        initialized: decl.kind.is_hoisted(),
        implicit: false,
      })
      .collect();
    self.push(EnvScope {
      kind: data.kind,
      static_scope,
      parent,
      bindings,
      frame,
    })
  }

  /// Creates a sibling instance with the same parent and a copy of every binding, as a `for (let
  /// ...)` loop does for each iteration.
  pub fn copy(&mut self, scope: ScopeRef) -> ScopeRef {
    let copy = self.get(scope).clone();
    self.push(copy)
  }

  fn push(&mut self, scope: EnvScope) -> ScopeRef {
    let id = ScopeRef(self.scopes.len() as u32);
    self.scopes.push(scope);
    id
  }

  pub fn get(&self, scope: ScopeRef) -> &EnvScope {
    &self.scopes[scope.0 as usize]
  }

  pub fn binding(&self, binding: BindingRef) -> &Binding {
    &self.get(binding.scope).bindings[binding.slot as usize]
  }

  fn binding_mut(&mut self, binding: BindingRef) -> &mut Binding {
    &mut self.scopes[binding.scope.0 as usize].bindings[binding.slot as usize]
  }

  /// Walks from `scope` through its parents.
  pub fn chain(&self, scope: ScopeRef) -> impl Iterator<Item = ScopeRef> + '_ {
    std::iter::successors(Some(scope), move |s| self.get(*s).parent)
  }

  pub fn bindings_of(&self, scope: ScopeRef) -> impl Iterator<Item = BindingRef> + '_ {
    (0..self.get(scope).bindings.len()).map(move |slot| BindingRef {
      scope,
      slot: slot as u32,
    })
  }

  pub fn find(&self, scope: ScopeRef, name: &str) -> Option<BindingRef> {
    self
      .get(scope)
      .slot(name)
      .map(|slot| BindingRef { scope, slot })
  }

  /// Resolves `name` from `scope` outward.
  pub fn resolve(&self, scope: ScopeRef, name: &str) -> Result<BindingRef, SimError> {
    self
      .chain(scope)
      .find_map(|s| self.find(s, name))
      .ok_or_else(|| SimError::Unresolved {
        name: name.to_string(),
      })
  }

  /// Reads a binding, failing if it is still in its temporal dead zone.
  pub fn read(&self, binding: BindingRef) -> Result<&Value, SimError> {
    let b = self.binding(binding);
    if !b.initialized {
      return Err(SimError::UninitializedBindingAccess {
        name: b.name.clone(),
      });
    }
    Ok(&b.value)
  }

  pub fn lookup(&self, scope: ScopeRef, name: &str) -> Result<Value, SimError> {
    let binding = self.resolve(scope, name)?;
    self.read(binding).cloned()
  }

  /// Runs a declaration: sets the value and ends the temporal dead zone. Returns the previous
  /// state.
  pub fn initialize(&mut self, binding: BindingRef, value: Value) -> (Value, bool) {
    let b = self.binding_mut(binding);
    let previous = std::mem::replace(&mut b.value, value);
    let was_initialized = std::mem::replace(&mut b.initialized, true);
    (previous, was_initialized)
  }

  /// Assigns to an existing binding. Returns the previous value.
  pub fn assign(&mut self, binding: BindingRef, value: Value) -> Result<Value, SimError> {
    let b = self.binding_mut(binding);
    if !b.initialized {
      return Err(SimError::UninitializedBindingAccess {
        name: b.name.clone(),
      });
    }
    if b.kind == DeclKind::Const {
      return Err(SimError::ConstAssignment {
        name: b.name.clone(),
      });
    }
    Ok(std::mem::replace(&mut b.value, value))
  }

  /// Puts a binding back into an earlier state, bypassing `const` and dead zone checks.
  pub fn restore(&mut self, binding: BindingRef, value: Value, initialized: bool) {
    let b = self.binding_mut(binding);
    b.value = value;
    b.initialized = initialized;
  }

  /// Adds an implicit `var` to `scope`.
  pub fn declare_implicit(&mut self, scope: ScopeRef, name: &str, value: Value) -> BindingRef {
    let bindings = &mut self.scopes[scope.0 as usize].bindings;
    bindings.push(Binding {
      name: name.to_string(),
      kind: DeclKind::Var,
      value,
      initialized: true,
      implicit: true,
    });
    BindingRef {
      scope,
      slot: (bindings.len() - 1) as u32,
    }
  }

  /// Removes the binding created by [`ScopeArena::declare_implicit`], which must be the last one in
  /// its scope.
  pub fn remove_implicit(&mut self, binding: BindingRef) {
    let bindings = &mut self.scopes[binding.scope.0 as usize].bindings;
    if bindings.len() == binding.slot as usize + 1 && bindings[binding.slot as usize].implicit {
      bindings.pop();
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::program::build::*;
  use crate::program::Program;
  use crate::scope::declare;

  fn arena_for(body: Vec<crate::program::Stmt>) -> (ScopeTree, ScopeArena, ScopeRef) {
    let mut program = Program::new(body);
    let tree = declare(&mut program).unwrap();
    let mut arena = ScopeArena::new();
    let global = arena.instantiate(&tree, tree.root(), None, FrameId::GLOBAL);
    (tree, arena, global)
  }

  #[test]
  fn lexical_bindings_start_in_dead_zone() {
    let (_, mut arena, global) = arena_for(vec![var("a", None), let_("b", None)]);
    assert_eq!(arena.lookup(global, "a").unwrap(), Value::Undefined);
    assert_eq!(
      arena.lookup(global, "b").unwrap_err(),
      SimError::UninitializedBindingAccess {
        name: "b".to_string()
      }
    );
    let b = arena.resolve(global, "b").unwrap();
    arena.initialize(b, Value::Number(1.0));
    assert_eq!(arena.lookup(global, "b").unwrap(), Value::Number(1.0));
  }

  #[test]
  fn const_rejects_assignment() {
    let (_, mut arena, global) = arena_for(vec![const_("c", num(1.0))]);
    let c = arena.resolve(global, "c").unwrap();
    arena.initialize(c, Value::Number(1.0));
    assert_eq!(
      arena.assign(c, Value::Number(2.0)).unwrap_err(),
      SimError::ConstAssignment {
        name: "c".to_string()
      }
    );
  }

  #[test]
  fn copies_are_independent() {
    let (tree, mut arena, global) = arena_for(vec![for_(
      Some(let_("i", num(0.0))),
      None,
      None,
      vec![],
    )]);
    let header = tree.scope(tree.root()).children[0];
    let first = arena.instantiate(&tree, header, Some(global), FrameId::GLOBAL);
    let i = arena.resolve(first, "i").unwrap();
    arena.initialize(i, Value::Number(0.0));
    let second = arena.copy(first);
    let i2 = arena.resolve(second, "i").unwrap();
    arena.assign(i2, Value::Number(1.0)).unwrap();
    assert_eq!(arena.lookup(first, "i").unwrap(), Value::Number(0.0));
    assert_eq!(arena.lookup(second, "i").unwrap(), Value::Number(1.0));
    assert_eq!(arena.get(second).parent, Some(global));
  }

  #[test]
  fn implicit_bindings_can_be_removed() {
    let (_, mut arena, global) = arena_for(vec![]);
    let x = arena.declare_implicit(global, "x", Value::Number(1.0));
    assert_eq!(arena.lookup(global, "x").unwrap(), Value::Number(1.0));
    arena.remove_implicit(x);
    assert!(matches!(
      arena.lookup(global, "x"),
      Err(SimError::Unresolved { .. })
    ));
  }
}
