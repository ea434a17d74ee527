//! Program descriptions consumed by the simulator.
//!
//! A description is the output contract of an external parser: a tree of statements, blocks and
//! functions, each block carrying its declarations and executable statements in source order. It
//! can be deserialized from JSON (variants are internally tagged by `"$t"`) or assembled with the
//! helpers in [`build`].
//!
//! [`crate::scope::declare`] walks the tree once and writes the static [`ScopeId`]/[`FunctionId`]
//! of each scope-introducing node into the node itself, the same way scope ids are attached to
//! AST nodes elsewhere in this workspace. Those attachments are skipped by serde.

use crate::builtins::Builtin;
use crate::scope::FunctionId;
use crate::scope::ScopeId;
use derive_more::derive::{From, TryInto};
use derive_visitor::{Drive, DriveMut};
use serde::{Deserialize, Serialize};

pub mod build;

/// Declaration kind of a binding.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeclKind {
  Var,
  Let,
  Const,
  Function,
  Param,
}

impl DeclKind {
  /// `var`, `function` and parameter bindings are hoisted to their closure scope and initialized
  /// on entry.
  pub fn is_hoisted(self) -> bool {
    matches!(self, DeclKind::Var | DeclKind::Function | DeclKind::Param)
  }

  pub fn is_lexical(self) -> bool {
    matches!(self, DeclKind::Let | DeclKind::Const)
  }
}

#[derive(Debug, Clone, Default, Drive, DriveMut, Serialize, Deserialize)]
pub struct Program {
  pub body: Vec<Stmt>,
  #[drive(skip)]
  #[serde(skip)]
  pub scope: Option<ScopeId>,
}

impl Program {
  pub fn new(body: Vec<Stmt>) -> Self {
    Self { body, scope: None }
  }

  pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
    serde_json::from_str(json)
  }
}

/// Static ids attached to a [`Function`] node by declaration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FunctionAssoc {
  pub id: Option<FunctionId>,
  pub scope: Option<ScopeId>,
  /// Only present for named function expressions: the scope holding the expression's own name.
  pub name_scope: Option<ScopeId>,
}

#[derive(Debug, Clone, Drive, DriveMut, Serialize, Deserialize)]
pub struct Function {
  #[drive(skip)]
  #[serde(default)]
  pub name: Option<String>,
  #[drive(skip)]
  #[serde(default)]
  pub params: Vec<String>,
  pub body: Vec<Stmt>,
  #[drive(skip)]
  #[serde(default)]
  pub generator: bool,
  #[drive(skip)]
  #[serde(skip)]
  pub assoc: FunctionAssoc,
}

#[derive(Debug, Clone, Drive, DriveMut, From, Serialize, Deserialize, TryInto)]
#[serde(tag = "$t")]
pub enum Stmt {
  Block(BlockStmt),
  Break(BreakStmt),
  Continue(ContinueStmt),
  Debugger(DebuggerStmt),
  Expr(ExprStmt),
  For(ForStmt),
  Function(Function),
  If(IfStmt),
  Return(ReturnStmt),
  VarDecl(VarDecl),
  While(WhileStmt),
}

#[derive(Debug, Clone, Drive, DriveMut, Serialize, Deserialize)]
pub struct BlockStmt {
  pub body: Vec<Stmt>,
  #[drive(skip)]
  #[serde(skip)]
  pub scope: Option<ScopeId>,
}

#[derive(Debug, Clone, Drive, DriveMut, Serialize, Deserialize)]
pub struct BreakStmt {}

#[derive(Debug, Clone, Drive, DriveMut, Serialize, Deserialize)]
pub struct ContinueStmt {}

/// A pause request. Observers receive the label through [`crate::Observer::on_debugger`].
#[derive(Debug, Clone, Drive, DriveMut, Serialize, Deserialize)]
pub struct DebuggerStmt {
  #[drive(skip)]
  #[serde(default)]
  pub label: Option<String>,
}

#[derive(Debug, Clone, Drive, DriveMut, Serialize, Deserialize)]
pub struct ExprStmt {
  pub expr: Expr,
}

// The header scope of a `for` statement starts before the body's braces, so it gets its own scope
// separate from the body block.
#[derive(Debug, Clone, Drive, DriveMut, Serialize, Deserialize)]
pub struct ForStmt {
  #[serde(default)]
  pub init: Option<Box<Stmt>>,
  #[serde(default)]
  pub test: Option<Expr>,
  #[serde(default)]
  pub update: Option<Expr>,
  pub body: Box<Stmt>,
  #[drive(skip)]
  #[serde(skip)]
  pub scope: Option<ScopeId>,
}

#[derive(Debug, Clone, Drive, DriveMut, Serialize, Deserialize)]
pub struct IfStmt {
  pub test: Expr,
  pub consequent: Box<Stmt>,
  #[serde(default)]
  pub alternate: Option<Box<Stmt>>,
}

#[derive(Debug, Clone, Drive, DriveMut, Serialize, Deserialize)]
pub struct ReturnStmt {
  #[serde(default)]
  pub value: Option<Expr>,
}

#[derive(Debug, Clone, Drive, DriveMut, Serialize, Deserialize)]
pub struct VarDecl {
  #[drive(skip)]
  pub kind: DeclKind,
  #[drive(skip)]
  pub name: String,
  #[serde(default)]
  pub init: Option<Expr>,
}

#[derive(Debug, Clone, Drive, DriveMut, Serialize, Deserialize)]
pub struct WhileStmt {
  pub test: Expr,
  pub body: Box<Stmt>,
}

#[derive(Debug, Clone, Drive, DriveMut, From, Serialize, Deserialize, TryInto)]
#[serde(tag = "$t")]
pub enum Expr {
  Array(ArrayExpr),
  Assign(AssignExpr),
  Binary(BinaryExpr),
  Builtin(BuiltinExpr),
  Call(CallExpr),
  Function(Function),
  Id(IdExpr),
  Index(IndexExpr),
  Lit(LitExpr),
  Member(MemberExpr),
  New(NewExpr),
  Object(ObjectExpr),
  Regex(RegexExpr),
  Unary(UnaryExpr),
  Update(UpdateExpr),
}

#[derive(Debug, Clone, Drive, DriveMut, Serialize, Deserialize)]
pub struct ArrayExpr {
  pub elements: Vec<Expr>,
}

/// `target = value`, or `target op= value` when `operator` is set.
#[derive(Debug, Clone, Drive, DriveMut, Serialize, Deserialize)]
pub struct AssignExpr {
  #[drive(skip)]
  #[serde(default)]
  pub operator: Option<BinaryOp>,
  pub target: Box<Expr>,
  pub value: Box<Expr>,
}

#[derive(Debug, Clone, Drive, DriveMut, Serialize, Deserialize)]
pub struct BinaryExpr {
  #[drive(skip)]
  pub operator: BinaryOp,
  pub left: Box<Expr>,
  pub right: Box<Expr>,
}

/// A reference to a host builtin: a constructor, a container class loaded from the host, or
/// `print`.
#[derive(Debug, Clone, Drive, DriveMut, Serialize, Deserialize)]
pub struct BuiltinExpr {
  #[drive(skip)]
  pub builtin: Builtin,
}

#[derive(Debug, Clone, Drive, DriveMut, Serialize, Deserialize)]
pub struct CallExpr {
  pub callee: Box<Expr>,
  #[serde(default)]
  pub arguments: Vec<Expr>,
}

#[derive(Debug, Clone, Drive, DriveMut, Serialize, Deserialize)]
pub struct IdExpr {
  #[drive(skip)]
  pub name: String,
  /// The static scope the reference appears in.
  #[drive(skip)]
  #[serde(skip)]
  pub scope: Option<ScopeId>,
}

#[derive(Debug, Clone, Drive, DriveMut, Serialize, Deserialize)]
pub struct IndexExpr {
  pub object: Box<Expr>,
  pub index: Box<Expr>,
}

#[derive(Debug, Clone, Drive, DriveMut, Serialize, Deserialize)]
pub struct LitExpr {
  #[drive(skip)]
  pub value: Literal,
}

#[derive(Debug, Clone, Drive, DriveMut, Serialize, Deserialize)]
pub struct MemberExpr {
  pub object: Box<Expr>,
  #[drive(skip)]
  pub property: String,
}

#[derive(Debug, Clone, Drive, DriveMut, Serialize, Deserialize)]
pub struct NewExpr {
  pub callee: Box<Expr>,
  #[serde(default)]
  pub arguments: Vec<Expr>,
}

#[derive(Debug, Clone, Drive, DriveMut, Serialize, Deserialize)]
pub struct ObjectExpr {
  pub properties: Vec<Property>,
}

#[derive(Debug, Clone, Drive, DriveMut, Serialize, Deserialize)]
pub struct Property {
  #[drive(skip)]
  pub key: String,
  pub value: Expr,
}

#[derive(Debug, Clone, Drive, DriveMut, Serialize, Deserialize)]
pub struct RegexExpr {
  #[drive(skip)]
  pub pattern: String,
  #[drive(skip)]
  #[serde(default)]
  pub flags: String,
}

#[derive(Debug, Clone, Drive, DriveMut, Serialize, Deserialize)]
pub struct UnaryExpr {
  #[drive(skip)]
  pub operator: UnaryOp,
  pub argument: Box<Expr>,
}

#[derive(Debug, Clone, Drive, DriveMut, Serialize, Deserialize)]
pub struct UpdateExpr {
  #[drive(skip)]
  pub operator: UpdateOp,
  #[drive(skip)]
  #[serde(default)]
  pub prefix: bool,
  pub target: Box<Expr>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Literal {
  Undefined,
  Null,
  Bool(bool),
  Number(f64),
  String(String),
  /// Decimal digits of a BigInt literal, without the `n` suffix.
  BigInt(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOp {
  Add,
  Sub,
  Mul,
  Div,
  Rem,
  Exp,
  Lt,
  LtEq,
  Gt,
  GtEq,
  Eq,
  NotEq,
  StrictEq,
  StrictNotEq,
  And,
  Or,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnaryOp {
  Neg,
  Plus,
  Not,
  Typeof,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UpdateOp {
  Increment,
  Decrement,
}
