//! Static lexical scopes of a program description.
//!
//! [`declare()`] walks a [`crate::program::Program`] once, allocates a [`ScopeId`] for every
//! scope-introducing node and registers every declaration on the scope that owns it:
//! - `var`, function declarations and parameters bind to the nearest [`ScopeKind::Function`] or
//!   [`ScopeKind::Global`] scope, however deep the declaring block is.
//! - `let`/`const` bind to the innermost scope and start out uninitialized.
//! - A named function expression gets a dedicated [`ScopeKind::FunctionName`] scope between its
//!   defining scope and its function scope.
//! - The header of a `for` statement is its own [`ScopeKind::Block`] scope, separate from the body.
//!
//! Scope and function ids are dense indices assigned in pre-order, so the same description always
//! produces the same tree.

use crate::error::SimError;
use crate::program::DeclKind;
use serde::Serialize;

pub mod declare;

pub use declare::declare;
pub use declare::declare_with_diagnostics;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ScopeId(pub(crate) u32);

impl ScopeId {
  pub fn raw(self) -> u32 {
    self.0
  }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct FunctionId(pub(crate) u32);

impl FunctionId {
  pub fn raw(self) -> u32 {
    self.0
  }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ScopeKind {
  Global,
  Function,
  Block,
  FunctionName,
}

impl ScopeKind {
  /// Whether `var` declarations stop at this scope.
  pub fn is_var_scope(self) -> bool {
    matches!(self, ScopeKind::Global | ScopeKind::Function)
  }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Declaration {
  pub name: String,
  pub kind: DeclKind,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScopeData {
  pub parent: Option<ScopeId>,
  pub kind: ScopeKind,
  pub children: Vec<ScopeId>,
  /// Declarations owned by this scope, in declaration order.
  pub declarations: Vec<Declaration>,
  /// The function whose body (or own name) this scope holds.
  pub function: Option<FunctionId>,
  // Names of `var` declarations that were hoisted through this scope from a nested block.
  pub(crate) var_names: Vec<String>,
}

impl ScopeData {
  pub(crate) fn new(parent: Option<ScopeId>, kind: ScopeKind) -> Self {
    Self {
      parent,
      kind,
      children: Vec::new(),
      declarations: Vec::new(),
      function: None,
      var_names: Vec::new(),
    }
  }

  pub fn declaration(&self, name: &str) -> Option<&Declaration> {
    self.declarations.iter().find(|d| d.name == name)
  }

  pub fn has_declarations(&self) -> bool {
    !self.declarations.is_empty()
  }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FunctionData {
  pub name: Option<String>,
  pub params: Vec<String>,
  pub generator: bool,
  /// The scope the function is defined in.
  pub parent_scope: ScopeId,
  pub scope: ScopeId,
  pub name_scope: Option<ScopeId>,
}

/// The static scope tree built by [`declare()`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScopeTree {
  pub(crate) scopes: Vec<ScopeData>,
  pub(crate) functions: Vec<FunctionData>,
}

impl ScopeTree {
  pub fn root(&self) -> ScopeId {
    ScopeId(0)
  }

  pub fn scope(&self, id: ScopeId) -> &ScopeData {
    &self.scopes[id.0 as usize]
  }

  pub fn scopes(&self) -> impl Iterator<Item = (ScopeId, &ScopeData)> {
    self
      .scopes
      .iter()
      .enumerate()
      .map(|(i, s)| (ScopeId(i as u32), s))
  }

  pub fn function(&self, id: FunctionId) -> &FunctionData {
    &self.functions[id.0 as usize]
  }

  pub fn functions(&self) -> impl Iterator<Item = (FunctionId, &FunctionData)> {
    self
      .functions
      .iter()
      .enumerate()
      .map(|(i, f)| (FunctionId(i as u32), f))
  }

  /// Walks from `scope` to the root.
  pub fn ancestors(&self, scope: ScopeId) -> impl Iterator<Item = ScopeId> + '_ {
    std::iter::successors(Some(scope), move |s| self.scope(*s).parent)
  }

  /// Whether `scope` is `ancestor` or nested inside it.
  pub fn is_within(&self, scope: ScopeId, ancestor: ScopeId) -> bool {
    self.ancestors(scope).any(|s| s == ancestor)
  }

  /// The nearest scope at or above `scope` that `var` declarations bind to.
  pub fn var_scope(&self, scope: ScopeId) -> ScopeId {
    self
      .ancestors(scope)
      .find(|s| self.scope(*s).kind.is_var_scope())
      .unwrap_or(self.root())
  }

  /// The function a scope belongs to, or `None` for global code.
  pub fn enclosing_function(&self, scope: ScopeId) -> Option<FunctionId> {
    self.ancestors(scope).find_map(|s| {
      let data = self.scope(s);
      match data.kind {
        ScopeKind::Function => data.function,
        _ => None,
      }
    })
  }

  /// Resolves `name` from `scope` outward through its parents.
  pub fn resolve(&self, scope: ScopeId, name: &str) -> Result<(ScopeId, &Declaration), SimError> {
    self
      .ancestors(scope)
      .find_map(|s| self.scope(s).declaration(name).map(|d| (s, d)))
      .ok_or_else(|| SimError::Unresolved {
        name: name.to_string(),
      })
  }
}
