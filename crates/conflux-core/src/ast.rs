//! Syntax tree for conflux source files

use std::fmt;

use crate::error::CoreError;
use crate::fileset::Pos;

/// Identifier of a syntax node, unique within one [`crate::FileSet`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    pub fn new(raw: u32) -> Self {
        NodeId(raw)
    }

    pub fn raw(self) -> u32 {
        self.0
    }
}

/// One parsed source file
#[derive(Debug, Clone, PartialEq)]
pub struct SourceFile {
    pub id: NodeId,
    /// File name as registered in the file set
    pub name: String,
    /// The `package` clause
    pub package: Ident,
    pub imports: Vec<ImportSpec>,
    pub decls: Vec<Decl>,
    pub pos: Pos,
    pub end: Pos,
}

impl SourceFile {
    pub fn package_name(&self) -> &str {
        &self.package.name
    }

    /// Import paths in declaration order
    pub fn import_paths(&self) -> impl Iterator<Item = &str> {
        self.imports.iter().map(|spec| spec.path.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Ident {
    pub id: NodeId,
    pub name: String,
    pub pos: Pos,
}

impl Ident {
    /// Exported names start with an upper-case letter
    pub fn is_exported(&self) -> bool {
        is_exported(&self.name)
    }
}

pub fn is_exported(name: &str) -> bool {
    name.chars().next().is_some_and(|c| c.is_uppercase())
}

/// Import paths are relative, `/`-separated and stay below their root:
/// no empty, `.` or `..` segments, no backslashes or drive prefixes.
pub fn validate_import_path(path: &str) -> Result<(), CoreError> {
    let invalid = |reason| {
        Err(CoreError::InvalidImportPath {
            path: path.to_string(),
            reason,
        })
    };
    if path.is_empty() {
        return invalid("empty path");
    }
    if path.starts_with('/') || path.contains(':') {
        return invalid("path must be relative");
    }
    if path.contains('\\') {
        return invalid("backslash in path");
    }
    for segment in path.split('/') {
        match segment {
            "" => return invalid("empty path segment"),
            "." | ".." => return invalid("relative path segment"),
            _ => {}
        }
    }
    Ok(())
}

/// `import [alias] "path"`
#[derive(Debug, Clone, PartialEq)]
pub struct ImportSpec {
    pub id: NodeId,
    pub alias: Option<Ident>,
    pub path: String,
    pub pos: Pos,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Decl {
    Const(ValueDecl),
    Var(ValueDecl),
    Func(FuncDecl),
}

impl Decl {
    pub fn name(&self) -> &Ident {
        match self {
            Decl::Const(d) | Decl::Var(d) => &d.name,
            Decl::Func(f) => &f.name,
        }
    }

    pub fn pos(&self) -> Pos {
        match self {
            Decl::Const(d) | Decl::Var(d) => d.pos,
            Decl::Func(f) => f.pos,
        }
    }
}

/// `const`/`var` declaration, at package level or inside a block
#[derive(Debug, Clone, PartialEq)]
pub struct ValueDecl {
    pub id: NodeId,
    pub name: Ident,
    pub ty: Option<TypeExpr>,
    pub value: Expr,
    pub pos: Pos,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FuncDecl {
    pub id: NodeId,
    pub name: Ident,
    pub params: Vec<Param>,
    pub result: Option<TypeExpr>,
    pub body: Block,
    pub pos: Pos,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: Ident,
    pub ty: TypeExpr,
}

/// A named type such as `int`
#[derive(Debug, Clone, PartialEq)]
pub struct TypeExpr {
    pub name: Ident,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub id: NodeId,
    pub stmts: Vec<Stmt>,
    pub pos: Pos,
    pub end: Pos,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Var(ValueDecl),
    Return { value: Option<Expr>, pos: Pos },
    Expr(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub id: NodeId,
    pub kind: ExprKind,
    pub pos: Pos,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Int(i64),
    Str(String),
    Bool(bool),
    Ident(Ident),
    /// `base.sel`; the base must name an imported package
    Selector { base: Box<Expr>, sel: Ident },
    Call { func: Box<Expr>, args: Vec<Expr> },
    Unary { op: UnaryOp, operand: Box<Expr> },
    Binary { op: BinaryOp, lhs: Box<Expr>, rhs: Box<Expr> },
    Paren(Box<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    Ne,
    Lt,
    Gt,
    And,
    Or,
}

impl BinaryOp {
    /// Binding power, higher binds tighter
    pub fn precedence(self) -> u8 {
        match self {
            BinaryOp::Or => 1,
            BinaryOp::And => 2,
            BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Gt => 3,
            BinaryOp::Add | BinaryOp::Sub => 4,
            BinaryOp::Mul | BinaryOp::Div => 5,
        }
    }

    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Gt
        )
    }
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            UnaryOp::Neg => "-",
            UnaryOp::Not => "!",
        })
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Gt => ">",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
        })
    }
}
