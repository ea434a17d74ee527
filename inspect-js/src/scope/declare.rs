use super::Declaration;
use super::FunctionData;
use super::FunctionId;
use super::ScopeData;
use super::ScopeId;
use super::ScopeKind;
use super::ScopeTree;
use crate::error::SimError;
use crate::program::BlockStmt;
use crate::program::DeclKind;
use crate::program::Expr;
use crate::program::ForStmt;
use crate::program::Function;
use crate::program::FunctionAssoc;
use crate::program::IdExpr;
use crate::program::Program;
use crate::program::Stmt;
use crate::program::VarDecl;
use derive_visitor::{DriveMut, VisitorMut};
use tracing::debug;
use tracing::debug_span;

/// Builds the static scope tree of `program` and attaches scope and function ids to its nodes.
///
/// Returns the first declaration error, if any. Use [`declare_with_diagnostics`] to collect all of
/// them.
pub fn declare(program: &mut Program) -> Result<ScopeTree, SimError> {
  let (tree, mut errors) = declare_with_diagnostics(program);
  if errors.is_empty() {
    Ok(tree)
  } else {
    Err(errors.swap_remove(0))
  }
}

pub fn declare_with_diagnostics(program: &mut Program) -> (ScopeTree, Vec<SimError>) {
  let _span = debug_span!("inspect_js.declare").entered();
  let mut visitor = DeclareVisitor::new();
  program.scope = Some(visitor.current_scope());
  program.drive_mut(&mut visitor);
  let (tree, errors) = visitor.builder.finish();
  debug!(
    scopes = tree.scopes.len(),
    functions = tree.functions.len(),
    errors = errors.len(),
    "declared program"
  );
  (tree, errors)
}

struct TreeBuilder {
  scopes: Vec<ScopeData>,
  functions: Vec<FunctionData>,
  errors: Vec<SimError>,
}

impl TreeBuilder {
  fn new() -> Self {
    Self {
      scopes: vec![ScopeData::new(None, ScopeKind::Global)],
      functions: Vec::new(),
      errors: Vec::new(),
    }
  }

  fn data(&mut self, id: ScopeId) -> &mut ScopeData {
    &mut self.scopes[id.0 as usize]
  }

  fn new_scope(&mut self, parent: ScopeId, kind: ScopeKind) -> ScopeId {
    let id = ScopeId(self.scopes.len() as u32);
    self.scopes.push(ScopeData::new(Some(parent), kind));
    self.data(parent).children.push(id);
    id
  }

  fn duplicate(&mut self, scope: ScopeId, name: &str) {
    self.errors.push(SimError::DuplicateDeclaration {
      name: name.to_string(),
      scope,
    });
  }

  /// Registers a `var`, parameter or function declaration on the nearest var scope at or above
  /// `from`, checking every scope on the way for lexical declarations of the same name.
  fn declare_hoisted(&mut self, from: ScopeId, name: &str, kind: DeclKind) {
    let mut current = from;
    loop {
      let data = self.data(current);
      if data.kind.is_var_scope() {
        break;
      }
      if data.declaration(name).is_some() {
        self.duplicate(current, name);
        return;
      }
      if !data.var_names.iter().any(|n| n == name) {
        data.var_names.push(name.to_string());
      }
      match data.parent {
        Some(parent) => current = parent,
        None => break,
      }
    }

    let declarations = &mut self.data(current).declarations;
    match declarations.iter().position(|d| d.name == name) {
      Some(i) if declarations[i].kind.is_lexical() => self.duplicate(current, name),
      // Repeated `var` is idempotent; a function declaration takes over the binding.
      Some(i) => {
        if kind == DeclKind::Function {
          declarations[i].kind = DeclKind::Function;
        }
      }
      None => declarations.push(Declaration {
        name: name.to_string(),
        kind,
      }),
    }
  }

  fn declare_lexical(&mut self, scope: ScopeId, name: &str, kind: DeclKind) {
    let data = self.data(scope);
    if data.declaration(name).is_some() || data.var_names.iter().any(|n| n == name) {
      self.duplicate(scope, name);
      return;
    }
    data.declarations.push(Declaration {
      name: name.to_string(),
      kind,
    });
  }

  fn finish(self) -> (ScopeTree, Vec<SimError>) {
    (
      ScopeTree {
        scopes: self.scopes,
        functions: self.functions,
      },
      self.errors,
    )
  }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum FunctionOrigin {
  Declaration,
  Expression,
}

#[derive(VisitorMut)]
#[visitor(
  BlockStmt(enter, exit),
  Expr(enter),
  ForStmt(enter, exit),
  Function(enter, exit),
  IdExpr(enter),
  Stmt(enter),
  VarDecl(enter)
)]
struct DeclareVisitor {
  builder: TreeBuilder,
  scope_stack: Vec<ScopeId>,
  pending_origin: Option<FunctionOrigin>,
  // Whether each open function pushed a name scope that must be popped with it.
  name_scope_stack: Vec<bool>,
}

impl DeclareVisitor {
  fn new() -> Self {
    Self {
      builder: TreeBuilder::new(),
      scope_stack: vec![ScopeId(0)],
      pending_origin: None,
      name_scope_stack: Vec::new(),
    }
  }

  fn current_scope(&self) -> ScopeId {
    self.scope_stack.last().copied().unwrap_or(ScopeId(0))
  }

  fn push_scope(&mut self, kind: ScopeKind) -> ScopeId {
    let parent = self.current_scope();
    let id = self.builder.new_scope(parent, kind);
    self.scope_stack.push(id);
    id
  }

  fn pop_scope(&mut self) {
    self.scope_stack.pop();
  }

  fn enter_stmt(&mut self, stmt: &mut Stmt) {
    if let Stmt::Function(func) = stmt {
      self.pending_origin = Some(FunctionOrigin::Declaration);
      if let Some(name) = &func.name {
        let scope = self.current_scope();
        self
          .builder
          .declare_hoisted(scope, name, DeclKind::Function);
      }
    }
  }

  fn enter_expr(&mut self, expr: &mut Expr) {
    if let Expr::Function(_) = expr {
      self.pending_origin = Some(FunctionOrigin::Expression);
    }
  }

  fn enter_function(&mut self, func: &mut Function) {
    let origin = self
      .pending_origin
      .take()
      .unwrap_or(FunctionOrigin::Expression);
    let id = FunctionId(self.builder.functions.len() as u32);
    let parent_scope = self.current_scope();

    let name_scope = match (&func.name, origin) {
      (Some(name), FunctionOrigin::Expression) => {
        let scope = self.push_scope(ScopeKind::FunctionName);
        let data = self.builder.data(scope);
        data.function = Some(id);
        data.declarations.push(Declaration {
          name: name.clone(),
          kind: DeclKind::Function,
        });
        Some(scope)
      }
      _ => None,
    };
    self.name_scope_stack.push(name_scope.is_some());

    let scope = self.push_scope(ScopeKind::Function);
    let data = self.builder.data(scope);
    data.function = Some(id);
    for param in func.params.iter() {
      if data.declaration(param).is_none() {
        data.declarations.push(Declaration {
          name: param.clone(),
          kind: DeclKind::Param,
        });
      }
    }

    self.builder.functions.push(FunctionData {
      name: func.name.clone(),
      params: func.params.clone(),
      generator: func.generator,
      parent_scope,
      scope,
      name_scope,
    });
    func.assoc = FunctionAssoc {
      id: Some(id),
      scope: Some(scope),
      name_scope,
    };
  }

  fn exit_function(&mut self, _func: &mut Function) {
    self.pop_scope();
    if self.name_scope_stack.pop().unwrap_or(false) {
      self.pop_scope();
    }
  }

  fn enter_block_stmt(&mut self, block: &mut BlockStmt) {
    block.scope = Some(self.push_scope(ScopeKind::Block));
  }

  fn exit_block_stmt(&mut self, _block: &mut BlockStmt) {
    self.pop_scope();
  }

  fn enter_for_stmt(&mut self, stmt: &mut ForStmt) {
    stmt.scope = Some(self.push_scope(ScopeKind::Block));
  }

  fn exit_for_stmt(&mut self, _stmt: &mut ForStmt) {
    self.pop_scope();
  }

  fn enter_var_decl(&mut self, decl: &mut VarDecl) {
    let scope = self.current_scope();
    if decl.kind.is_lexical() {
      self.builder.declare_lexical(scope, &decl.name, decl.kind);
    } else {
      self.builder.declare_hoisted(scope, &decl.name, decl.kind);
    }
  }

  fn enter_id_expr(&mut self, id: &mut IdExpr) {
    id.scope = Some(self.current_scope());
  }
}
