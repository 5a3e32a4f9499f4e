/*
 * ==========================================================================
 * RELAY - runtime core
 * ==========================================================================
 *
 * Author:   Sam Wilcox
 * Github:   https://github.com/samwilcox/pawx
 *
 * License: dual MIT / Apache-2.0, see LICENSE files.
 * ==========================================================================
 */

//! The AST contract consumed from the parser.
//!
//! The lexer and parser are out of scope for this crate; this
//! module only declares the shapes the evaluator is handed, so that a
//! parser built against this contract needs no adapter layer.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    NotEq,
    Lt,
    Lte,
    Gt,
    Gte,
    And,
    Or,
    Coalesce,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    Neg,
    Not,
}

#[derive(Debug, Clone)]
pub enum Literal {
    Number(f64),
    String(String),
    Bool(bool),
    Nil,
    Array(Vec<Expr>),
}

/// One link in a `PrimaryExpr`'s access chain.
#[derive(Debug, Clone)]
pub enum Accessor {
    MethodCall { name: String, args: Vec<Expr> },
    FieldAccess { name: String },
    FuncCall { args: Vec<Expr> },
}

#[derive(Debug, Clone)]
pub struct Param {
    pub name: String,
    pub default: Option<Expr>,
}

#[derive(Debug, Clone)]
pub struct FunctionExpr {
    pub name: Option<String>,
    pub params: Vec<Param>,
    pub body: Block,
}

#[derive(Debug, Clone)]
pub struct FieldDecl {
    pub name: String,
    pub type_name: String,
}

#[derive(Debug, Clone)]
pub struct StructDefExpr {
    pub name: String,
    pub fields: Vec<FieldDecl>,
}

#[derive(Debug, Clone)]
pub struct StructConstructorExpr {
    pub name: String,
    pub fields: Vec<(String, Expr)>,
}

#[derive(Debug, Clone)]
pub struct ObjectLiteralExpr {
    pub fields: Vec<(String, Expr)>,
}

#[derive(Debug, Clone)]
pub struct IfExpr {
    pub condition: Box<Expr>,
    pub then_block: Block,
    pub else_block: Option<Block>,
}

#[derive(Debug, Clone)]
pub struct SetExpr {
    pub variable: String,
    pub value: Box<Expr>,
}

#[derive(Debug, Clone)]
pub struct ReturnExpr {
    pub value: Option<Box<Expr>>,
}

#[derive(Debug, Clone)]
pub struct SendExpr {
    pub target: String,
    pub method: String,
    pub args: Option<ObjectLiteralExpr>,
}

/// `receive fn m(...) -> T { ... }` inside a server definition.
#[derive(Debug, Clone)]
pub struct ReceiveDef {
    pub name: String,
    pub params: Vec<Param>,
    pub return_type: Option<String>,
    pub body: Block,
}

/// `state { field: type = default, ... }` inside a server definition.
#[derive(Debug, Clone)]
pub struct StateFieldDecl {
    pub name: String,
    pub type_name: Option<String>,
    pub default: Option<Expr>,
}

#[derive(Debug, Clone)]
pub struct ServerDefExpr {
    pub name: String,
    pub state: Vec<StateFieldDecl>,
    pub receives: Vec<ReceiveDef>,
}

#[derive(Debug, Clone)]
pub struct BinaryExpr {
    pub left: Box<Expr>,
    pub rest: Vec<(BinOp, Expr)>,
}

#[derive(Debug, Clone)]
pub struct UnaryExpr {
    pub op: Option<UnOp>,
    pub primary: Box<Expr>,
}

#[derive(Debug, Clone)]
pub struct PrimaryExpr {
    pub base: Box<Expr>,
    pub chain: Vec<Accessor>,
}

/// `block { expressions: [...] }`. The value of a block is the
/// value of its last expression, unless a `return` short-circuits it.
#[derive(Debug, Clone, Default)]
pub struct Block {
    pub expressions: Vec<Expr>,
}

impl Block {
    pub fn new(expressions: Vec<Expr>) -> Self {
        Block { expressions }
    }
}

/// Every expression form the evaluator handles.
#[derive(Debug, Clone)]
pub enum Expr {
    Literal(Literal),
    Identifier(String),
    Binary(BinaryExpr),
    Unary(UnaryExpr),
    Primary(PrimaryExpr),
    Function(FunctionExpr),
    StructDef(StructDefExpr),
    ServerDef(ServerDefExpr),
    StructConstructor(StructConstructorExpr),
    ObjectLiteral(ObjectLiteralExpr),
    If(IfExpr),
    Set(SetExpr),
    Return(ReturnExpr),
    Send(SendExpr),
    Grouping(Box<Expr>),
    Block(Block),
}

