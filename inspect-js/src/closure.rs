//! Closure capture: what a function value can see, and what it actually uses.

use crate::env::BindingRef;
use crate::env::ScopeArena;
use crate::env::ScopeRef;
use crate::error::SimError;
use crate::heap::Closure;
use crate::heap::Heap;
use crate::program::Function;
use crate::program::IdExpr;
use crate::program::Program;
use crate::scope::FunctionId;
use crate::scope::ScopeId;
use crate::scope::ScopeTree;
use crate::value::Value;
use ahash::AHashMap;
use ahash::AHashSet;
use derive_visitor::Drive;
use derive_visitor::Visitor;

fn closure_of<'h>(heap: &'h Heap, function: &Value) -> Result<&'h Closure, SimError> {
  heap
    .closure(function)
    .ok_or_else(|| SimError::NotCallable(heap.to_js_string(function)))
}

/// Every binding reachable from the defining scope of `function`, innermost scope first. Shadowed
/// bindings are included.
pub fn captured(heap: &Heap, env: &ScopeArena, function: &Value) -> Result<Vec<BindingRef>, SimError> {
  let closure = closure_of(heap, function)?;
  Ok(
    env
      .chain(closure.defining_scope)
      .flat_map(|scope| env.bindings_of(scope))
      .collect(),
  )
}

/// Read-only view over the scope chain captured by a function value.
#[derive(Clone, Copy, Debug)]
pub struct ClosureSnapshot<'a> {
  env: &'a ScopeArena,
  function: FunctionId,
  defining_scope: ScopeRef,
}

impl<'a> ClosureSnapshot<'a> {
  pub fn new(heap: &Heap, env: &'a ScopeArena, function: &Value) -> Result<Self, SimError> {
    let closure = closure_of(heap, function)?;
    Ok(Self {
      env,
      function: closure.function,
      defining_scope: closure.defining_scope,
    })
  }

  pub fn function(&self) -> FunctionId {
    self.function
  }

  pub fn defining_scope(&self) -> ScopeRef {
    self.defining_scope
  }

  pub fn scopes(&self) -> impl Iterator<Item = ScopeRef> + 'a {
    self.env.chain(self.defining_scope)
  }

  /// Visible bindings: like [`captured`], but a name shadowed by an inner scope is listed once.
  pub fn bindings(&self) -> Vec<BindingRef> {
    let mut seen = AHashSet::new();
    self
      .scopes()
      .flat_map(|scope| self.env.bindings_of(scope))
      .filter(|b| seen.insert(self.env.binding(*b).name.as_str()))
      .collect()
  }

  /// Reads `name` as the function body would. Fails for a `let`/`const` still in its dead zone.
  pub fn get(&self, name: &str) -> Result<Value, SimError> {
    self.env.lookup(self.defining_scope, name)
  }
}

#[derive(Default, Visitor)]
#[visitor(IdExpr(enter))]
struct References {
  found: Vec<(String, ScopeId)>,
}

impl References {
  fn enter_id_expr(&mut self, id: &IdExpr) {
    if let Some(scope) = id.scope {
      self.found.push((id.name.clone(), scope));
    }
  }
}

/// Names referenced in the body of a declared `function` that bind to a scope outside it. Global
/// bindings and the function's own name are not free. Names are in order of first reference.
pub fn free_variables(tree: &ScopeTree, function: &Function) -> Vec<String> {
  let Some(scope) = function.assoc.scope else {
    return Vec::new();
  };
  let mut references = References::default();
  function.drive(&mut references);

  let mut seen = AHashSet::new();
  references
    .found
    .into_iter()
    .filter(|(name, used_in)| match tree.resolve(*used_in, name) {
      Ok((declared_in, _)) => {
        !tree.is_within(declared_in, scope)
          && declared_in != tree.root()
          && Some(declared_in) != function.assoc.name_scope
      }
      Err(_) => false,
    })
    .filter_map(|(name, _)| seen.insert(name.clone()).then_some(name))
    .collect()
}

#[derive(Default, Visitor)]
#[visitor(Function(enter))]
struct FunctionNodes {
  functions: Vec<(FunctionId, Function)>,
}

impl FunctionNodes {
  fn enter_function(&mut self, function: &Function) {
    if let Some(id) = function.assoc.id {
      self.functions.push((id, function.clone()));
    }
  }
}

/// [`free_variables`] of every function in a declared program.
pub fn free_variable_table(tree: &ScopeTree, program: &Program) -> AHashMap<FunctionId, Vec<String>> {
  let mut nodes = FunctionNodes::default();
  program.drive(&mut nodes);
  nodes
    .functions
    .iter()
    .map(|(id, function)| (*id, free_variables(tree, function)))
    .collect()
}

/// The bindings a debugger lists in a function value's "Closure" scope: its free variables,
/// resolved from the defining scope.
pub fn closure_scope(
  heap: &Heap,
  env: &ScopeArena,
  function: &Value,
  free_variables: &[String],
) -> Result<Vec<BindingRef>, SimError> {
  let closure = closure_of(heap, function)?;
  free_variables
    .iter()
    .map(|name| env.resolve(closure.defining_scope, name))
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::program::build::*;
  use crate::program::Stmt;
  use crate::scope::declare;

  fn function_at(program: &Program, path: &[usize]) -> Function {
    let mut body = &program.body;
    let mut found = None;
    for i in path {
      match &body[*i] {
        Stmt::Function(f) => {
          found = Some(f.clone());
          body = &f.body;
        }
        other => panic!("expected function, got {other:?}"),
      }
    }
    found.unwrap()
  }

  #[test]
  fn free_variables_exclude_locals_and_globals() {
    let mut program = Program::new(vec![
      var("g", num(1.0)),
      func_decl(
        "outer",
        &["p"],
        vec![
          var("a", num(1.0)),
          var("b", num(2.0)),
          func_decl(
            "inner",
            &[],
            vec![
              var("own", num(0.0)),
              expr(add(id("b"), id("g"))),
              expr(add(id("p"), id("own"))),
              expr(id("b")),
            ],
          ),
        ],
      ),
    ]);
    let tree = declare(&mut program).unwrap();
    let inner = function_at(&program, &[1, 2]);
    assert_eq!(free_variables(&tree, &inner), vec!["b", "p"]);
    let outer = function_at(&program, &[1]);
    assert!(free_variables(&tree, &outer).is_empty());
  }

  #[test]
  fn nested_references_count_for_the_enclosing_function() {
    let mut program = Program::new(vec![func_decl(
      "a",
      &[],
      vec![
        var("x", num(1.0)),
        func_decl(
          "b",
          &[],
          vec![func_decl("c", &[], vec![expr(id("x"))])],
        ),
      ],
    )]);
    let tree = declare(&mut program).unwrap();
    let table = free_variable_table(&tree, &program);
    let b = function_at(&program, &[0, 1]).assoc.id.unwrap();
    let c = function_at(&program, &[0, 1, 0]).assoc.id.unwrap();
    assert_eq!(table[&b], vec!["x"]);
    assert_eq!(table[&c], vec!["x"]);
  }
}
