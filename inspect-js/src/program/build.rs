//! Terse constructors for program descriptions, used by hosts that lower their own parse trees and
//! by tests.
//!
//! ```
//! use inspect_js::program::build::*;
//! use inspect_js::program::Program;
//!
//! // var d = 1; function f() { d = d * 2; } f();
//! let program = Program::new(vec![
//!   var("d", num(1.0)),
//!   func_decl("f", &[], vec![expr(assign("d", mul(id("d"), num(2.0))))]),
//!   expr(call_id("f", vec![])),
//! ]);
//! assert_eq!(program.body.len(), 3);
//! ```

use super::*;

pub fn var(name: &str, init: impl Into<Option<Expr>>) -> Stmt {
  decl(DeclKind::Var, name, init)
}

pub fn let_(name: &str, init: impl Into<Option<Expr>>) -> Stmt {
  decl(DeclKind::Let, name, init)
}

pub fn const_(name: &str, init: Expr) -> Stmt {
  decl(DeclKind::Const, name, Some(init))
}

pub fn decl(kind: DeclKind, name: &str, init: impl Into<Option<Expr>>) -> Stmt {
  Stmt::VarDecl(VarDecl {
    kind,
    name: name.to_string(),
    init: init.into(),
  })
}

pub fn function(name: Option<&str>, params: &[&str], body: Vec<Stmt>) -> Function {
  Function {
    name: name.map(str::to_string),
    params: params.iter().map(|p| p.to_string()).collect(),
    body,
    generator: false,
    assoc: FunctionAssoc::default(),
  }
}

pub fn func_decl(name: &str, params: &[&str], body: Vec<Stmt>) -> Stmt {
  Stmt::Function(function(Some(name), params, body))
}

pub fn generator_decl(name: &str, params: &[&str], body: Vec<Stmt>) -> Stmt {
  let mut func = function(Some(name), params, body);
  func.generator = true;
  Stmt::Function(func)
}

pub fn func_expr(name: Option<&str>, params: &[&str], body: Vec<Stmt>) -> Expr {
  Expr::Function(function(name, params, body))
}

pub fn expr(expr: Expr) -> Stmt {
  Stmt::Expr(ExprStmt { expr })
}

pub fn block(body: Vec<Stmt>) -> Stmt {
  Stmt::Block(BlockStmt { body, scope: None })
}

pub fn if_(test: Expr, consequent: Vec<Stmt>, alternate: Option<Vec<Stmt>>) -> Stmt {
  Stmt::If(IfStmt {
    test,
    consequent: Box::new(block(consequent)),
    alternate: alternate.map(|alt| Box::new(block(alt))),
  })
}

pub fn for_(
  init: Option<Stmt>,
  test: Option<Expr>,
  update: Option<Expr>,
  body: Vec<Stmt>,
) -> Stmt {
  Stmt::For(ForStmt {
    init: init.map(Box::new),
    test,
    update,
    body: Box::new(block(body)),
    scope: None,
  })
}

pub fn while_(test: Expr, body: Vec<Stmt>) -> Stmt {
  Stmt::While(WhileStmt {
    test,
    body: Box::new(block(body)),
  })
}

pub fn ret(value: impl Into<Option<Expr>>) -> Stmt {
  Stmt::Return(ReturnStmt {
    value: value.into(),
  })
}

pub fn brk() -> Stmt {
  Stmt::Break(BreakStmt {})
}

pub fn cont() -> Stmt {
  Stmt::Continue(ContinueStmt {})
}

pub fn debugger(label: &str) -> Stmt {
  Stmt::Debugger(DebuggerStmt {
    label: Some(label.to_string()),
  })
}

pub fn id(name: &str) -> Expr {
  Expr::Id(IdExpr {
    name: name.to_string(),
    scope: None,
  })
}

pub fn lit(value: Literal) -> Expr {
  Expr::Lit(LitExpr { value })
}

pub fn num(value: f64) -> Expr {
  lit(Literal::Number(value))
}

pub fn str_(value: &str) -> Expr {
  lit(Literal::String(value.to_string()))
}

pub fn boolean(value: bool) -> Expr {
  lit(Literal::Bool(value))
}

pub fn bigint(digits: &str) -> Expr {
  lit(Literal::BigInt(digits.to_string()))
}

pub fn undefined() -> Expr {
  lit(Literal::Undefined)
}

pub fn null() -> Expr {
  lit(Literal::Null)
}

pub fn assign(name: &str, value: Expr) -> Expr {
  assign_to(id(name), value)
}

pub fn assign_to(target: Expr, value: Expr) -> Expr {
  Expr::Assign(AssignExpr {
    operator: None,
    target: Box::new(target),
    value: Box::new(value),
  })
}

pub fn assign_op(name: &str, operator: BinaryOp, value: Expr) -> Expr {
  Expr::Assign(AssignExpr {
    operator: Some(operator),
    target: Box::new(id(name)),
    value: Box::new(value),
  })
}

pub fn binary(operator: BinaryOp, left: Expr, right: Expr) -> Expr {
  Expr::Binary(BinaryExpr {
    operator,
    left: Box::new(left),
    right: Box::new(right),
  })
}

pub fn add(left: Expr, right: Expr) -> Expr {
  binary(BinaryOp::Add, left, right)
}

pub fn sub(left: Expr, right: Expr) -> Expr {
  binary(BinaryOp::Sub, left, right)
}

pub fn mul(left: Expr, right: Expr) -> Expr {
  binary(BinaryOp::Mul, left, right)
}

pub fn lt(left: Expr, right: Expr) -> Expr {
  binary(BinaryOp::Lt, left, right)
}

pub fn lt_eq(left: Expr, right: Expr) -> Expr {
  binary(BinaryOp::LtEq, left, right)
}

pub fn unary(operator: UnaryOp, argument: Expr) -> Expr {
  Expr::Unary(UnaryExpr {
    operator,
    argument: Box::new(argument),
  })
}

/// Postfix `name++`.
pub fn inc(name: &str) -> Expr {
  Expr::Update(UpdateExpr {
    operator: UpdateOp::Increment,
    prefix: false,
    target: Box::new(id(name)),
  })
}

pub fn call(callee: Expr, arguments: Vec<Expr>) -> Expr {
  Expr::Call(CallExpr {
    callee: Box::new(callee),
    arguments,
  })
}

pub fn call_id(name: &str, arguments: Vec<Expr>) -> Expr {
  call(id(name), arguments)
}

pub fn method(object: Expr, name: &str, arguments: Vec<Expr>) -> Expr {
  call(member(object, name), arguments)
}

pub fn new_(callee: Expr, arguments: Vec<Expr>) -> Expr {
  Expr::New(NewExpr {
    callee: Box::new(callee),
    arguments,
  })
}

pub fn builtin(builtin: Builtin) -> Expr {
  Expr::Builtin(BuiltinExpr { builtin })
}

pub fn construct(class: Builtin, arguments: Vec<Expr>) -> Expr {
  new_(builtin(class), arguments)
}

pub fn print(arguments: Vec<Expr>) -> Expr {
  call(builtin(Builtin::Print), arguments)
}

pub fn member(object: Expr, property: &str) -> Expr {
  Expr::Member(MemberExpr {
    object: Box::new(object),
    property: property.to_string(),
  })
}

pub fn index(object: Expr, index: Expr) -> Expr {
  Expr::Index(IndexExpr {
    object: Box::new(object),
    index: Box::new(index),
  })
}

pub fn object(properties: Vec<(&str, Expr)>) -> Expr {
  Expr::Object(ObjectExpr {
    properties: properties
      .into_iter()
      .map(|(key, value)| Property {
        key: key.to_string(),
        value,
      })
      .collect(),
  })
}

pub fn array(elements: Vec<Expr>) -> Expr {
  Expr::Array(ArrayExpr { elements })
}

pub fn regex(pattern: &str, flags: &str) -> Expr {
  Expr::Regex(RegexExpr {
    pattern: pattern.to_string(),
    flags: flags.to_string(),
  })
}
