//! Simulated execution of a declared program.
//!
//! [`Simulator`] evaluates a [`Program`] statement by statement against the scope arena and heap,
//! pushing a [`CallFrame`] per invocation. An [`Observer`] is consulted at every statement
//! boundary, at `debugger` statements, and around calls; it can inspect the paused state through
//! [`Pause::inspector`] and steer the run with a [`Control`].

use crate::builtins;
use crate::builtins::Builtin;
use crate::closure::free_variable_table;
use crate::env::BindingRef;
use crate::env::ScopeArena;
use crate::env::ScopeRef;
use crate::error::SimError;
use crate::error::Termination;
use crate::error::TerminationReason;
use crate::frame::CallFrame;
use crate::frame::CallStack;
use crate::frame::FrameId;
use crate::heap::Closure;
use crate::heap::Heap;
use crate::heap::ObjectId;
use crate::heap::ObjectKind;
use crate::interrupt::InterruptHandle;
use crate::interrupt::InterruptToken;
use crate::options::Budget;
use crate::options::SimOptions;
use crate::program::AssignExpr;
use crate::program::BinaryOp;
use crate::program::CallExpr;
use crate::program::DeclKind;
use crate::program::Expr;
use crate::program::ForStmt;
use crate::program::Function;
use crate::program::Literal;
use crate::program::NewExpr;
use crate::program::Program;
use crate::program::Stmt;
use crate::program::UnaryExpr;
use crate::program::UnaryOp;
use crate::program::UpdateExpr;
use crate::program::UpdateOp;
use crate::program::VarDecl;
use crate::recorder::Inspector;
use crate::scope::declare;
use crate::scope::FunctionId;
use crate::scope::ScopeId;
use crate::scope::ScopeTree;
use crate::value::bigint_to_f64;
use crate::value::Value;
use ahash::AHashMap;
use num_bigint::BigInt;
use num_bigint::Sign;
use std::cmp::Ordering;
use tracing::debug;
use tracing::debug_span;
use tracing::trace;
use tracing::warn;

/// Name reported for the frame running top-level code.
pub const GLOBAL_FRAME_NAME: &str = "(global)";

/// What to do after a pause.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Control {
  #[default]
  Continue,
  /// Terminate the run with [`TerminationReason::Aborted`].
  Abort,
  /// Revert the innermost function frame's binding writes and restart it. Ignored in global code.
  DropFrame,
}

/// What to do with a recoverable error.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Recovery {
  #[default]
  Propagate,
  /// Treat the failing statement as completed and continue with the next one.
  SkipStatement,
}

/// The state of a paused run.
pub struct Pause<'a> {
  /// The innermost frame.
  pub frame: FrameId,
  pub depth: usize,
  pub inspector: Inspector<'a>,
}

/// Receives pause events. Every method defaults to continuing.
pub trait Observer {
  fn on_statement(&mut self, _pause: &Pause<'_>) -> Control {
    Control::Continue
  }

  fn on_debugger(&mut self, _pause: &Pause<'_>, _label: Option<&str>) -> Control {
    Control::Continue
  }

  /// Called after the callee's frame is pushed and its parameters are bound.
  fn on_call(&mut self, _pause: &Pause<'_>) -> Control {
    Control::Continue
  }

  /// Called before the callee's frame is popped.
  fn on_return(&mut self, _pause: &Pause<'_>, _value: &Value) -> Control {
    Control::Continue
  }

  /// Only consulted for errors where [`SimError::is_recoverable`] holds.
  fn on_error(&mut self, _pause: &Pause<'_>, _error: &SimError) -> Recovery {
    Recovery::Propagate
  }
}

impl Observer for () {}

#[derive(Debug)]
enum Completion {
  Normal,
  Return(Value),
  Break,
  Continue,
  /// The innermost function frame is being dropped.
  Restart,
}

#[derive(Debug)]
enum JournalEntry {
  Write {
    binding: BindingRef,
    previous: Value,
    initialized: bool,
  },
  Created {
    binding: BindingRef,
  },
}

enum Place<'p> {
  Binding(&'p str),
  Property(Value, Value),
}

pub struct Simulator<'p> {
  program: &'p Program,
  tree: ScopeTree,
  free_variables: AHashMap<FunctionId, Vec<String>>,
  functions: AHashMap<FunctionId, &'p Function>,
  options: SimOptions,
  budget: Budget,
  interrupt: InterruptToken,
  interrupt_handle: InterruptHandle,
  env: ScopeArena,
  heap: Heap,
  stack: CallStack,
  builtins: AHashMap<Builtin, ObjectId>,
  journal: Vec<JournalEntry>,
  output: Vec<String>,
  global: Option<ScopeRef>,
}

impl<'p> Simulator<'p> {
  /// Declares `program` and prepares a run. Fails with the first declaration error.
  pub fn new(program: &'p mut Program, options: SimOptions) -> Result<Self, SimError> {
    let tree = declare(program)?;
    let program: &'p Program = program;
    let free_variables = free_variable_table(&tree, program);
    let (interrupt, interrupt_handle) = match &options.interrupt_flag {
      Some(flag) => InterruptToken::from_shared_flag(flag.clone()),
      None => InterruptToken::new(),
    };
    Ok(Self {
      program,
      tree,
      free_variables,
      functions: AHashMap::new(),
      budget: options.budget(),
      options,
      interrupt,
      interrupt_handle,
      env: ScopeArena::new(),
      heap: Heap::new(),
      stack: CallStack::new(),
      builtins: AHashMap::new(),
      journal: Vec::new(),
      output: Vec::new(),
      global: None,
    })
  }

  pub fn tree(&self) -> &ScopeTree {
    &self.tree
  }

  pub fn env(&self) -> &ScopeArena {
    &self.env
  }

  pub fn heap(&self) -> &Heap {
    &self.heap
  }

  pub fn stack(&self) -> &CallStack {
    &self.stack
  }

  pub fn options(&self) -> &SimOptions {
    &self.options
  }

  /// Lines written by `print`.
  pub fn output(&self) -> &[String] {
    &self.output
  }

  pub fn free_variables(&self, function: FunctionId) -> &[String] {
    self
      .free_variables
      .get(&function)
      .map(Vec::as_slice)
      .unwrap_or_default()
  }

  pub fn interrupt_handle(&self) -> InterruptHandle {
    self.interrupt_handle.clone()
  }

  /// Replaces the remaining budget. Runs do not refill it.
  pub fn set_budget(&mut self, budget: Budget) {
    self.budget = budget;
  }

  pub fn inspector(&self) -> Inspector<'_> {
    Inspector {
      tree: &self.tree,
      env: &self.env,
      heap: &self.heap,
      stack: &self.stack,
      free_variables: &self.free_variables,
    }
  }

  /// Reads a global binding after (or during) a run.
  pub fn global(&self, name: &str) -> Result<Value, SimError> {
    let global = self.global.ok_or(SimError::UnknownFrame(FrameId::GLOBAL))?;
    self.env.lookup(global, name)
  }

  pub fn run_to_end(&mut self) -> Result<(), SimError> {
    self.run(&mut ())
  }

  /// Runs the program from the start. State from a previous run is discarded; the state left by
  /// this run stays inspectable afterwards, including after an error.
  pub fn run(&mut self, observer: &mut dyn Observer) -> Result<(), SimError> {
    self.reset();
    let _span = debug_span!("inspect_js.run").entered();
    let id = self.stack.next_id();
    let global = self.env.instantiate(&self.tree, self.tree.root(), None, id);
    self.global = Some(global);
    self.stack.push(CallFrame {
      id,
      function: None,
      name: GLOBAL_FRAME_NAME.to_string(),
      callee: None,
      arguments: Vec::new(),
      function_scope: global,
      scope: global,
      caller: None,
      journal_mark: 0,
    });
    let program = self.program;
    self.exec_stmts(&program.body, global, observer)?;
    debug!(
      scopes = self.env.len(),
      objects = self.heap.len(),
      "run completed"
    );
    Ok(())
  }

  fn reset(&mut self) {
    self.env = ScopeArena::new();
    self.heap = Heap::new();
    self.stack = CallStack::new();
    self.builtins.clear();
    self.journal.clear();
    self.output.clear();
    self.global = None;
  }

  fn pause(&self) -> Pause<'_> {
    Pause {
      frame: self.current_frame(),
      depth: self.stack.depth(),
      inspector: self.inspector(),
    }
  }

  fn current_frame(&self) -> FrameId {
    self.stack.top().map(|f| f.id).unwrap_or(FrameId::GLOBAL)
  }

  fn set_scope(&mut self, scope: ScopeRef) {
    if let Some(top) = self.stack.top_mut() {
      top.scope = scope;
    }
  }

  fn enter_scope(&mut self, scope: ScopeId, parent: ScopeRef) -> ScopeRef {
    let instance = self
      .env
      .instantiate(&self.tree, scope, Some(parent), self.current_frame());
    self.set_scope(instance);
    instance
  }

  fn terminate(&self, reason: TerminationReason) -> SimError {
    SimError::Termination(Termination::new(reason, self.stack.summary()))
  }

  fn tick(&mut self) -> Result<(), SimError> {
    if !self.budget.tick() {
      return Err(self.terminate(TerminationReason::OutOfFuel));
    }
    if self.interrupt.is_interrupted() {
      return Err(self.terminate(TerminationReason::Interrupted));
    }
    Ok(())
  }

  fn handle_control(&mut self, control: Control) -> Result<Option<Completion>, SimError> {
    match control {
      Control::Continue => Ok(None),
      Control::Abort => Err(self.terminate(TerminationReason::Aborted)),
      Control::DropFrame if self.stack.depth() <= 1 => {
        warn!("cannot drop the global frame");
        Ok(None)
      }
      Control::DropFrame => Ok(Some(Completion::Restart)),
    }
  }

  fn journaling(&self) -> bool {
    self.options.record_writes && self.stack.depth() > 1
  }

  fn write(&mut self, binding: BindingRef, value: Value, initialize: bool) -> Result<(), SimError> {
    let (previous, initialized) = if initialize {
      self.env.initialize(binding, value)
    } else {
      (self.env.assign(binding, value)?, true)
    };
    trace!(
      name = %self.env.binding(binding).name,
      scope = binding.scope.raw(),
      "write binding"
    );
    if self.journaling() {
      self.journal.push(JournalEntry::Write {
        binding,
        previous,
        initialized,
      });
    }
    Ok(())
  }

  fn assign_name(&mut self, scope: ScopeRef, name: &str, value: Value) -> Result<(), SimError> {
    match self.env.resolve(scope, name) {
      Ok(binding) => self.write(binding, value, false),
      Err(SimError::Unresolved { .. }) if self.options.implicit_globals => {
        let global = self.env.chain(scope).last().unwrap_or(scope);
        let binding = self.env.declare_implicit(global, name, value);
        debug!(name, "created implicit global");
        if self.journaling() {
          self.journal.push(JournalEntry::Created { binding });
        }
        Ok(())
      }
      Err(error) => Err(error),
    }
  }

  fn revert_to(&mut self, mark: usize) {
    let entries: Vec<_> = self.journal.drain(mark.min(self.journal.len())..).collect();
    for entry in entries.into_iter().rev() {
      match entry {
        JournalEntry::Write {
          binding,
          previous,
          initialized,
        } => {
          trace!(
            name = %self.env.binding(binding).name,
            scope = binding.scope.raw(),
            "revert binding"
          );
          self.env.restore(binding, previous, initialized);
        }
        JournalEntry::Created { binding } => self.env.remove_implicit(binding),
      }
    }
  }

  fn pop_frame(&mut self) {
    self.stack.pop();
    if self.stack.depth() <= 1 {
      self.journal.clear();
    }
  }

  fn drop_frame(&mut self) {
    let Some(frame) = self.stack.pop() else {
      return;
    };
    debug!(
      frame = %frame.id,
      function = %frame.name,
      reverted = self.journal.len().saturating_sub(frame.journal_mark),
      "dropped frame"
    );
    self.revert_to(frame.journal_mark);
  }

  fn exec_stmts(
    &mut self,
    body: &'p [Stmt],
    scope: ScopeRef,
    observer: &mut dyn Observer,
  ) -> Result<Completion, SimError> {
    self.instantiate_functions(body, scope)?;
    for stmt in body {
      match self.exec_stmt(stmt, scope, observer)? {
        Completion::Normal => {}
        other => return Ok(other),
      }
    }
    Ok(Completion::Normal)
  }

  // Function declarations of a statement list are created on entry, closing over the list's scope.
  fn instantiate_functions(&mut self, body: &'p [Stmt], scope: ScopeRef) -> Result<(), SimError> {
    for stmt in body {
      let Stmt::Function(function) = stmt else {
        continue;
      };
      let Some(name) = function.name.as_deref() else {
        continue;
      };
      let value = self.make_closure(function, scope)?;
      let binding = self.env.resolve(scope, name)?;
      self.write(binding, value, true)?;
    }
    Ok(())
  }

  fn exec_stmt(
    &mut self,
    stmt: &'p Stmt,
    scope: ScopeRef,
    observer: &mut dyn Observer,
  ) -> Result<Completion, SimError> {
    let compound = matches!(
      stmt,
      Stmt::Block(_) | Stmt::For(_) | Stmt::If(_) | Stmt::While(_)
    );
    if !matches!(stmt, Stmt::Block(_) | Stmt::Function(_)) {
      self.tick()?;
      let control = observer.on_statement(&self.pause());
      if let Some(completion) = self.handle_control(control)? {
        return Ok(completion);
      }
    }
    match self.exec_stmt_inner(stmt, scope, observer) {
      Err(error) if !compound && error.is_recoverable() => {
        match observer.on_error(&self.pause(), &error) {
          Recovery::SkipStatement => {
            debug!(%error, "skipped statement");
            Ok(Completion::Normal)
          }
          Recovery::Propagate => Err(error),
        }
      }
      result => result,
    }
  }

  fn exec_stmt_inner(
    &mut self,
    stmt: &'p Stmt,
    scope: ScopeRef,
    observer: &mut dyn Observer,
  ) -> Result<Completion, SimError> {
    match stmt {
      Stmt::Block(block) => {
        let inner = match block.scope {
          Some(s) if self.tree.scope(s).has_declarations() => self.enter_scope(s, scope),
          _ => scope,
        };
        let result = self.exec_stmts(&block.body, inner, observer);
        self.set_scope(scope);
        result
      }
      Stmt::Break(_) => Ok(Completion::Break),
      Stmt::Continue(_) => Ok(Completion::Continue),
      Stmt::Debugger(debugger) => {
        let control = observer.on_debugger(&self.pause(), debugger.label.as_deref());
        Ok(self.handle_control(control)?.unwrap_or(Completion::Normal))
      }
      Stmt::Expr(stmt) => {
        self.eval(&stmt.expr, scope, observer)?;
        Ok(Completion::Normal)
      }
      Stmt::For(stmt) => {
        let header = match stmt.scope {
          Some(s) if self.tree.scope(s).has_declarations() => self.enter_scope(s, scope),
          _ => scope,
        };
        let result = self.exec_for(stmt, header, header != scope, observer);
        self.set_scope(scope);
        result
      }
      Stmt::Function(_) => Ok(Completion::Normal),
      Stmt::If(stmt) => {
        let branch = if self.eval(&stmt.test, scope, observer)?.to_boolean() {
          &stmt.consequent
        } else if let Some(alternate) = &stmt.alternate {
          alternate
        } else {
          return Ok(Completion::Normal);
        };
        // `if (c) function f() {}` behaves as if the declaration were wrapped in a block.
        self.instantiate_functions(std::slice::from_ref(&**branch), scope)?;
        self.exec_stmt(branch, scope, observer)
      }
      Stmt::Return(stmt) => {
        let value = match &stmt.value {
          Some(value) => self.eval(value, scope, observer)?,
          None => Value::Undefined,
        };
        Ok(Completion::Return(value))
      }
      Stmt::VarDecl(decl) => {
        self.exec_var_decl(decl, scope, observer)?;
        Ok(Completion::Normal)
      }
      Stmt::While(stmt) => loop {
        self.tick()?;
        if !self.eval(&stmt.test, scope, observer)?.to_boolean() {
          return Ok(Completion::Normal);
        }
        match self.exec_stmt(&stmt.body, scope, observer)? {
          Completion::Break => return Ok(Completion::Normal),
          Completion::Normal | Completion::Continue => {}
          other => return Ok(other),
        }
      },
    }
  }

  // A header scope holding `let`/`const` bindings is copied for every iteration, so closures
  // created by different iterations see different bindings.
  fn exec_for(
    &mut self,
    stmt: &'p ForStmt,
    header: ScopeRef,
    own_scope: bool,
    observer: &mut dyn Observer,
  ) -> Result<Completion, SimError> {
    let per_iteration = own_scope
      && self
        .env
        .get(header)
        .bindings
        .iter()
        .any(|b| b.kind.is_lexical());
    if let Some(init) = &stmt.init {
      self.exec_stmt(init, header, observer)?;
    }
    let mut iteration = if per_iteration {
      self.env.copy(header)
    } else {
      header
    };
    loop {
      self.tick()?;
      self.set_scope(iteration);
      if let Some(test) = &stmt.test {
        if !self.eval(test, iteration, observer)?.to_boolean() {
          return Ok(Completion::Normal);
        }
      }
      match self.exec_stmt(&stmt.body, iteration, observer)? {
        Completion::Break => return Ok(Completion::Normal),
        Completion::Normal | Completion::Continue => {}
        other => return Ok(other),
      }
      if per_iteration {
        iteration = self.env.copy(iteration);
        self.set_scope(iteration);
      }
      if let Some(update) = &stmt.update {
        self.eval(update, iteration, observer)?;
      }
    }
  }

  fn exec_var_decl(
    &mut self,
    decl: &'p VarDecl,
    scope: ScopeRef,
    observer: &mut dyn Observer,
  ) -> Result<(), SimError> {
    let value = match &decl.init {
      Some(init) => {
        let value = self.eval(init, scope, observer)?;
        if let Expr::Function(Function { name: None, .. }) = init {
          self.name_function(&value, &decl.name);
        }
        Some(value)
      }
      None => None,
    };
    let binding = self.env.resolve(scope, &decl.name)?;
    match (decl.kind, value) {
      (DeclKind::Let | DeclKind::Const, value) => {
        self.write(binding, value.unwrap_or(Value::Undefined), true)
      }
      (_, Some(value)) => self.write(binding, value, true),
      (_, None) => Ok(()),
    }
  }

  // `var f = function () {}` names the function `f`.
  fn name_function(&mut self, value: &Value, name: &str) {
    if let Value::Object(id) = value {
      if let ObjectKind::Function(closure) = &mut self.heap.get_mut(*id).kind {
        closure.name.get_or_insert_with(|| name.to_string());
      }
    }
  }

  fn make_closure(&mut self, function: &'p Function, scope: ScopeRef) -> Result<Value, SimError> {
    let id = function
      .assoc
      .id
      .ok_or_else(|| SimError::type_error("function has no declaration"))?;
    self.functions.insert(id, function);
    let defining_scope = match function.assoc.name_scope {
      Some(name_scope) => {
        self
          .env
          .instantiate(&self.tree, name_scope, Some(scope), self.current_frame())
      }
      None => scope,
    };
    let object = self.heap.alloc(ObjectKind::Function(Closure {
      function: id,
      name: function.name.clone(),
      defining_scope,
      generator: function.generator,
    }));
    if function.assoc.name_scope.is_some() {
      if let Some(binding) = function
        .name
        .as_deref()
        .and_then(|name| self.env.find(defining_scope, name))
      {
        self.env.initialize(binding, Value::Object(object));
      }
    }
    Ok(Value::Object(object))
  }

  fn call_value(
    &mut self,
    callee: &Value,
    args: Vec<Value>,
    name: &str,
    observer: &mut dyn Observer,
  ) -> Result<Value, SimError> {
    let Value::Object(id) = callee else {
      return Err(SimError::NotCallable(name.to_string()));
    };
    match self.heap.kind(*id) {
      ObjectKind::Function(closure) => {
        let closure = closure.clone();
        self.call_function(*id, closure, args, observer)
      }
      ObjectKind::Builtin(builtin) => {
        let builtin = *builtin;
        builtin.call(&mut self.heap, &mut self.output, &args)
      }
      _ => Err(SimError::NotCallable(name.to_string())),
    }
  }

  fn call_function(
    &mut self,
    callee: ObjectId,
    closure: Closure,
    args: Vec<Value>,
    observer: &mut dyn Observer,
  ) -> Result<Value, SimError> {
    if closure.generator {
      return Ok(Value::Object(self.heap.alloc(ObjectKind::Generator {
        function: closure.function,
        name: closure.name,
      })));
    }
    let code: &'p Function = self
      .functions
      .get(&closure.function)
      .copied()
      .ok_or_else(|| SimError::NotCallable(closure.name.clone().unwrap_or_default()))?;
    let function_scope = self.tree.function(closure.function).scope;
    let name = closure.name.as_deref().unwrap_or("anonymous");

    loop {
      // Restarts of a dropped frame count against the budget too.
      self.tick()?;
      if self.stack.depth() >= self.options.max_stack_depth {
        return Err(self.terminate(TerminationReason::StackOverflow));
      }
      let id = self.stack.next_id();
      let span = debug_span!("inspect_js.call", function = name, invocation = id.raw());
      let _enter = span.enter();

      let scope = self.env.instantiate(
        &self.tree,
        function_scope,
        Some(closure.defining_scope),
        id,
      );
      for (i, param) in code.params.iter().enumerate() {
        if let Some(binding) = self.env.find(scope, param) {
          self
            .env
            .initialize(binding, args.get(i).cloned().unwrap_or(Value::Undefined));
        }
      }
      self.stack.push(CallFrame {
        id,
        function: Some(closure.function),
        name: name.to_string(),
        callee: Some(callee),
        arguments: args.clone(),
        function_scope: scope,
        scope,
        caller: self.stack.top().map(|f| f.id),
        journal_mark: self.journal.len(),
      });

      let control = observer.on_call(&self.pause());
      let completion = match self.handle_control(control) {
        Ok(Some(completion)) => Ok(completion),
        Ok(None) => self.exec_stmts(&code.body, scope, observer),
        Err(error) => Err(error),
      };
      let value = match completion {
        Ok(Completion::Restart) => {
          self.drop_frame();
          continue;
        }
        Ok(Completion::Return(value)) => value,
        Ok(_) => Value::Undefined,
        Err(error) => {
          self.pop_frame();
          return Err(error);
        }
      };

      let control = observer.on_return(&self.pause(), &value);
      match self.handle_control(control) {
        Ok(Some(_)) => {
          self.drop_frame();
          continue;
        }
        Ok(None) => {}
        Err(error) => {
          self.pop_frame();
          return Err(error);
        }
      }
      self.pop_frame();
      return Ok(value);
    }
  }

  fn builtin(&mut self, builtin: Builtin) -> Value {
    let heap = &mut self.heap;
    let id = *self
      .builtins
      .entry(builtin)
      .or_insert_with(|| heap.alloc(ObjectKind::Builtin(builtin)));
    Value::Object(id)
  }

  fn eval_args(
    &mut self,
    args: &'p [Expr],
    scope: ScopeRef,
    observer: &mut dyn Observer,
  ) -> Result<Vec<Value>, SimError> {
    let mut values = Vec::with_capacity(args.len());
    for arg in args {
      values.push(self.eval(arg, scope, observer)?);
    }
    Ok(values)
  }

  fn eval(
    &mut self,
    expr: &'p Expr,
    scope: ScopeRef,
    observer: &mut dyn Observer,
  ) -> Result<Value, SimError> {
    match expr {
      Expr::Array(array) => {
        let elements = self.eval_args(&array.elements, scope, observer)?;
        Ok(Value::Object(self.heap.alloc(ObjectKind::Array(elements))))
      }
      Expr::Assign(assign) => self.eval_assign(assign, scope, observer),
      Expr::Binary(binary) => {
        let left = self.eval(&binary.left, scope, observer)?;
        match binary.operator {
          BinaryOp::And if !left.to_boolean() => Ok(left),
          BinaryOp::Or if left.to_boolean() => Ok(left),
          BinaryOp::And | BinaryOp::Or => self.eval(&binary.right, scope, observer),
          operator => {
            let right = self.eval(&binary.right, scope, observer)?;
            self.binary(operator, &left, &right)
          }
        }
      }
      Expr::Builtin(builtin) => Ok(self.builtin(builtin.builtin)),
      Expr::Call(call) => self.eval_call(call, scope, observer),
      Expr::Function(function) => self.make_closure(function, scope),
      Expr::Id(id) => self.env.lookup(scope, &id.name),
      Expr::Index(index) => {
        let object = self.eval(&index.object, scope, observer)?;
        let key = self.eval(&index.index, scope, observer)?;
        builtins::get_property(&self.heap, &object, &key)
      }
      Expr::Lit(lit) => literal(&lit.value),
      Expr::Member(member) => {
        let object = self.eval(&member.object, scope, observer)?;
        builtins::get_property(&self.heap, &object, &Value::String(member.property.clone()))
      }
      Expr::New(new) => self.eval_new(new, scope, observer),
      Expr::Object(object) => {
        let mut properties = Vec::with_capacity(object.properties.len());
        for property in &object.properties {
          let value = self.eval(&property.value, scope, observer)?;
          match properties.iter_mut().find(|(k, _)| *k == property.key) {
            Some((_, existing)) => *existing = value,
            None => properties.push((property.key.clone(), value)),
          }
        }
        Ok(Value::Object(
          self.heap.alloc_with_properties(ObjectKind::Plain, properties),
        ))
      }
      Expr::Regex(regex) => Ok(Value::Object(self.heap.alloc(ObjectKind::RegExp {
        pattern: regex.pattern.clone(),
        flags: regex.flags.clone(),
      }))),
      Expr::Unary(unary) => self.eval_unary(unary, scope, observer),
      Expr::Update(update) => self.eval_update(update, scope, observer),
    }
  }

  fn place(
    &mut self,
    target: &'p Expr,
    scope: ScopeRef,
    observer: &mut dyn Observer,
  ) -> Result<Place<'p>, SimError> {
    match target {
      Expr::Id(id) => Ok(Place::Binding(&id.name)),
      Expr::Member(member) => {
        let object = self.eval(&member.object, scope, observer)?;
        Ok(Place::Property(
          object,
          Value::String(member.property.clone()),
        ))
      }
      Expr::Index(index) => {
        let object = self.eval(&index.object, scope, observer)?;
        let key = self.eval(&index.index, scope, observer)?;
        Ok(Place::Property(object, key))
      }
      _ => Err(SimError::type_error("invalid assignment target")),
    }
  }

  fn read_place(&self, place: &Place<'p>, scope: ScopeRef) -> Result<Value, SimError> {
    match place {
      Place::Binding(name) => self.env.lookup(scope, name),
      Place::Property(object, key) => builtins::get_property(&self.heap, object, key),
    }
  }

  fn write_place(&mut self, place: Place<'p>, scope: ScopeRef, value: Value) -> Result<(), SimError> {
    match place {
      Place::Binding(name) => self.assign_name(scope, name, value),
      Place::Property(object, key) => builtins::set_property(&mut self.heap, &object, &key, value),
    }
  }

  fn eval_assign(
    &mut self,
    assign: &'p AssignExpr,
    scope: ScopeRef,
    observer: &mut dyn Observer,
  ) -> Result<Value, SimError> {
    let place = self.place(&assign.target, scope, observer)?;
    let value = match assign.operator {
      None => self.eval(&assign.value, scope, observer)?,
      Some(operator) => {
        let current = self.read_place(&place, scope)?;
        let value = self.eval(&assign.value, scope, observer)?;
        self.binary(operator, &current, &value)?
      }
    };
    self.write_place(place, scope, value.clone())?;
    Ok(value)
  }

  fn eval_update(
    &mut self,
    update: &'p UpdateExpr,
    scope: ScopeRef,
    observer: &mut dyn Observer,
  ) -> Result<Value, SimError> {
    let place = self.place(&update.target, scope, observer)?;
    let old = self.to_numeric(&self.read_place(&place, scope)?);
    let new = match (&old, update.operator) {
      (Value::BigInt(b), UpdateOp::Increment) => Value::BigInt(b + BigInt::from(1)),
      (Value::BigInt(b), UpdateOp::Decrement) => Value::BigInt(b - BigInt::from(1)),
      (v, UpdateOp::Increment) => Value::Number(v.to_number() + 1.0),
      (v, UpdateOp::Decrement) => Value::Number(v.to_number() - 1.0),
    };
    self.write_place(place, scope, new.clone())?;
    Ok(if update.prefix { new } else { old })
  }

  fn eval_unary(
    &mut self,
    unary: &'p UnaryExpr,
    scope: ScopeRef,
    observer: &mut dyn Observer,
  ) -> Result<Value, SimError> {
    // `typeof undeclared` is not an error.
    if let (UnaryOp::Typeof, Expr::Id(id)) = (unary.operator, &*unary.argument) {
      if let Err(SimError::Unresolved { .. }) = self.env.resolve(scope, &id.name) {
        return Ok(Value::String("undefined".to_string()));
      }
    }
    let value = self.eval(&unary.argument, scope, observer)?;
    Ok(match unary.operator {
      UnaryOp::Neg => match self.to_numeric(&value) {
        Value::BigInt(b) => Value::BigInt(-b),
        other => Value::Number(-other.to_number()),
      },
      UnaryOp::Plus => match self.to_numeric(&value) {
        Value::BigInt(_) => {
          return Err(SimError::type_error(
            "cannot convert a BigInt value to a number",
          ))
        }
        other => other,
      },
      UnaryOp::Not => Value::Bool(!value.to_boolean()),
      UnaryOp::Typeof => Value::String(self.type_of(&value).to_string()),
    })
  }

  fn eval_call(
    &mut self,
    call: &'p CallExpr,
    scope: ScopeRef,
    observer: &mut dyn Observer,
  ) -> Result<Value, SimError> {
    if let Expr::Member(member) = &*call.callee {
      let receiver = self.eval(&member.object, scope, observer)?;
      let args = self.eval_args(&call.arguments, scope, observer)?;
      let own = match &receiver {
        Value::Object(id) => self.heap.own_property(*id, &member.property).cloned(),
        _ => None,
      };
      return match own {
        Some(function) => self.call_value(&function, args, &member.property, observer),
        None => builtins::call_method(&mut self.heap, &receiver, &member.property, &args),
      };
    }
    let callee = self.eval(&call.callee, scope, observer)?;
    let args = self.eval_args(&call.arguments, scope, observer)?;
    self.call_value(&callee, args, &callee_name(&call.callee), observer)
  }

  fn eval_new(
    &mut self,
    new: &'p NewExpr,
    scope: ScopeRef,
    observer: &mut dyn Observer,
  ) -> Result<Value, SimError> {
    let callee = self.eval(&new.callee, scope, observer)?;
    let args = self.eval_args(&new.arguments, scope, observer)?;
    let not_constructable = || SimError::NotConstructable(callee_name(&new.callee));
    let Value::Object(id) = callee else {
      return Err(not_constructable());
    };
    match self.heap.kind(id) {
      ObjectKind::Builtin(builtin) if builtin.is_constructor() => {
        let builtin = *builtin;
        builtin.construct(&mut self.heap, &args)
      }
      ObjectKind::Function(closure) if !closure.generator => {
        let closure = closure.clone();
        match self.call_function(id, closure, args, observer)? {
          result @ Value::Object(_) => Ok(result),
          _ => Ok(Value::Object(self.heap.alloc(ObjectKind::Plain))),
        }
      }
      _ => Err(not_constructable()),
    }
  }

  fn type_of(&self, value: &Value) -> &'static str {
    match value {
      Value::Undefined => "undefined",
      Value::Null => "object",
      Value::Bool(_) => "boolean",
      Value::Number(_) => "number",
      Value::String(_) => "string",
      Value::BigInt(_) => "bigint",
      Value::Object(id) => match self.heap.kind(*id) {
        ObjectKind::Function(_) | ObjectKind::Builtin(_) => "function",
        _ => "object",
      },
    }
  }

  fn to_primitive(&self, value: &Value) -> Value {
    match value {
      Value::Object(id) => match self.heap.kind(*id) {
        ObjectKind::Boxed(inner) => inner.clone(),
        _ => Value::String(self.heap.to_js_string(value)),
      },
      other => other.clone(),
    }
  }

  fn to_numeric(&self, value: &Value) -> Value {
    match self.to_primitive(value) {
      big @ Value::BigInt(_) => big,
      other => Value::Number(other.to_number()),
    }
  }

  fn loose_equals(&self, left: &Value, right: &Value) -> bool {
    match (left, right) {
      (Value::Object(_), Value::Object(_)) => left == right,
      (Value::Object(_), other) if !other.is_nullish() => self.to_primitive(left).loose_equals(other),
      (other, Value::Object(_)) if !other.is_nullish() => other.loose_equals(&self.to_primitive(right)),
      _ => left.loose_equals(right),
    }
  }

  fn binary(&self, operator: BinaryOp, left: &Value, right: &Value) -> Result<Value, SimError> {
    Ok(match operator {
      BinaryOp::And => {
        if left.to_boolean() {
          right.clone()
        } else {
          left.clone()
        }
      }
      BinaryOp::Or => {
        if left.to_boolean() {
          left.clone()
        } else {
          right.clone()
        }
      }
      BinaryOp::Eq => Value::Bool(self.loose_equals(left, right)),
      BinaryOp::NotEq => Value::Bool(!self.loose_equals(left, right)),
      BinaryOp::StrictEq => Value::Bool(left.strict_equals(right)),
      BinaryOp::StrictNotEq => Value::Bool(!left.strict_equals(right)),
      BinaryOp::Add => {
        let (left, right) = (self.to_primitive(left), self.to_primitive(right));
        if matches!(left, Value::String(_)) || matches!(right, Value::String(_)) {
          Value::String(format!("{}{}", left.to_js_string(), right.to_js_string()))
        } else {
          numeric(operator, &self.to_numeric(&left), &self.to_numeric(&right))?
        }
      }
      BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem | BinaryOp::Exp => {
        numeric(operator, &self.to_numeric(left), &self.to_numeric(right))?
      }
      BinaryOp::Lt | BinaryOp::LtEq | BinaryOp::Gt | BinaryOp::GtEq => {
        self.compare(operator, left, right)
      }
    })
  }

  fn compare(&self, operator: BinaryOp, left: &Value, right: &Value) -> Value {
    let (left, right) = (self.to_primitive(left), self.to_primitive(right));
    let as_number = |v: &Value| match v {
      Value::BigInt(b) => bigint_to_f64(b),
      other => other.to_number(),
    };
    let ordering = match (&left, &right) {
      (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
      (Value::BigInt(a), Value::BigInt(b)) => Some(a.cmp(b)),
      _ => as_number(&left).partial_cmp(&as_number(&right)),
    };
    Value::Bool(match (operator, ordering) {
      (_, None) => false,
      (BinaryOp::Lt, Some(o)) => o == Ordering::Less,
      (BinaryOp::LtEq, Some(o)) => o != Ordering::Greater,
      (BinaryOp::Gt, Some(o)) => o == Ordering::Greater,
      (BinaryOp::GtEq, Some(o)) => o != Ordering::Less,
      _ => false,
    })
  }
}

fn callee_name(callee: &Expr) -> String {
  match callee {
    Expr::Id(id) => id.name.clone(),
    Expr::Member(member) => member.property.clone(),
    Expr::Builtin(builtin) => builtin.builtin.name().to_string(),
    _ => "expression".to_string(),
  }
}

fn literal(value: &Literal) -> Result<Value, SimError> {
  Ok(match value {
    Literal::Undefined => Value::Undefined,
    Literal::Null => Value::Null,
    Literal::Bool(b) => Value::Bool(*b),
    Literal::Number(n) => Value::Number(*n),
    Literal::String(s) => Value::String(s.clone()),
    Literal::BigInt(digits) => Value::BigInt(
      digits
        .parse::<BigInt>()
        .map_err(|_| SimError::type_error(format!("invalid BigInt literal {digits}")))?,
    ),
  })
}

fn numeric(operator: BinaryOp, left: &Value, right: &Value) -> Result<Value, SimError> {
  match (left, right) {
    (Value::BigInt(a), Value::BigInt(b)) => bigint_arithmetic(operator, a, b).map(Value::BigInt),
    (Value::BigInt(_), _) | (_, Value::BigInt(_)) => Err(SimError::type_error(
      "cannot mix BigInt and other types, use explicit conversions",
    )),
    _ => {
      let (a, b) = (left.to_number(), right.to_number());
      Ok(Value::Number(match operator {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div => a / b,
        BinaryOp::Rem => a % b,
        BinaryOp::Exp => a.powf(b),
        _ => f64::NAN,
      }))
    }
  }
}

fn bigint_arithmetic(operator: BinaryOp, a: &BigInt, b: &BigInt) -> Result<BigInt, SimError> {
  Ok(match operator {
    BinaryOp::Add => a + b,
    BinaryOp::Sub => a - b,
    BinaryOp::Mul => a * b,
    BinaryOp::Div | BinaryOp::Rem if b.sign() == Sign::NoSign => {
      return Err(SimError::type_error("division by zero"))
    }
    BinaryOp::Div => a / b,
    BinaryOp::Rem => a % b,
    BinaryOp::Exp => {
      let exponent =
        u32::try_from(b).map_err(|_| SimError::type_error("exponent must be a small non-negative BigInt"))?;
      a.pow(exponent)
    }
    other => return Err(SimError::type_error(format!("unsupported BigInt operator {other:?}"))),
  })
}
