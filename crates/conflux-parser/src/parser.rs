//! Recursive-descent parser producing [`SourceFile`] trees

use std::ops::Range;
use std::sync::Arc;

use conflux_core::ast::{
    BinaryOp, Block, Decl, Expr, ExprKind, FuncDecl, Ident, ImportSpec, Param, SourceFile, Stmt,
    TypeExpr, UnaryOp, ValueDecl,
};
use conflux_core::{FileSet, Pos, SourceMap};

use crate::error::ParserError;
use crate::lexer::{tokenize, Spanned, Token};

type PResult<T> = Result<T, ParserError>;

pub(crate) struct Parser<'a> {
    fset: &'a FileSet,
    map: Arc<SourceMap>,
    src: &'a str,
    tokens: Vec<Spanned>,
    cursor: usize,
}

impl<'a> Parser<'a> {
    /// Register `src` in the file set and tokenize it
    pub(crate) fn new(fset: &'a FileSet, filename: &str, src: &'a str) -> PResult<Self> {
        let map = fset.add_file(filename, src)?;
        let tokens = tokenize(src).map_err(|span| ParserError::Lex {
            position: map.position(map.pos(span.start)),
            text: src[span].to_string(),
        })?;
        Ok(Self {
            fset,
            map,
            src,
            tokens,
            cursor: 0,
        })
    }

    pub(crate) fn parse_file(mut self) -> PResult<SourceFile> {
        let id = self.fset.next_node_id();
        let pos = self.map.pos(0);

        self.expect(Token::Package)?;
        let package = self.ident()?;
        self.skip_semis();

        let mut imports = Vec::new();
        while self.at(&Token::Import) {
            self.import_decl(&mut imports)?;
            self.skip_semis();
        }

        let mut decls = Vec::new();
        while self.peek().is_some() {
            decls.push(self.decl()?);
            self.skip_semis();
        }

        Ok(SourceFile {
            id,
            name: self.map.name().to_string(),
            package,
            imports,
            decls,
            pos,
            end: self.map.pos(self.src.len()),
        })
    }

    // ---------- token helpers ----------

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.cursor).map(|(t, _)| t)
    }

    fn at(&self, tok: &Token) -> bool {
        self.peek() == Some(tok)
    }

    /// Position of the current token, or end of file
    fn pos(&self) -> Pos {
        self.tokens
            .get(self.cursor)
            .map(|(_, span)| self.map.pos(span.start))
            .unwrap_or_else(|| self.map.pos(self.src.len()))
    }

    fn span(&self) -> Option<Range<usize>> {
        self.tokens.get(self.cursor).map(|(_, span)| span.clone())
    }

    fn eat(&mut self, tok: &Token) -> bool {
        if self.at(tok) {
            self.cursor += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, tok: Token) -> PResult<()> {
        if self.eat(&tok) {
            Ok(())
        } else {
            Err(self.unexpected(&tok.to_string()))
        }
    }

    fn skip_semis(&mut self) {
        while self.eat(&Token::Semi) {}
    }

    fn unexpected(&self, wanted: &str) -> ParserError {
        let found = match self.peek() {
            Some(tok) => tok.to_string(),
            None => "end of file".to_string(),
        };
        self.error_at(self.pos(), format!("expected {}, found {}", wanted, found))
    }

    fn error_at(&self, pos: Pos, message: String) -> ParserError {
        ParserError::Syntax {
            position: self.map.position(pos),
            message,
        }
    }

    /// Whether a line break separates the previous token from the current one
    fn newline_before_current(&self) -> bool {
        let Some(current) = self.span() else {
            return true;
        };
        let prev_end = self
            .cursor
            .checked_sub(1)
            .and_then(|i| self.tokens.get(i))
            .map(|(_, span)| span.end)
            .unwrap_or(0);
        self.src[prev_end..current.start].contains('\n')
    }

    fn ident(&mut self) -> PResult<Ident> {
        let pos = self.pos();
        match self.peek() {
            Some(Token::Ident(name)) => {
                let name = name.clone();
                self.cursor += 1;
                Ok(Ident {
                    id: self.fset.next_node_id(),
                    name,
                    pos,
                })
            }
            _ => Err(self.unexpected("identifier")),
        }
    }

    // ---------- declarations ----------

    fn import_decl(&mut self, imports: &mut Vec<ImportSpec>) -> PResult<()> {
        self.expect(Token::Import)?;
        if self.eat(&Token::LParen) {
            self.skip_semis();
            while !self.eat(&Token::RParen) {
                imports.push(self.import_spec()?);
                self.skip_semis();
            }
            return Ok(());
        }
        imports.push(self.import_spec()?);
        Ok(())
    }

    fn import_spec(&mut self) -> PResult<ImportSpec> {
        let pos = self.pos();
        let alias = match self.peek() {
            Some(Token::Ident(_)) => Some(self.ident()?),
            _ => None,
        };
        let path_pos = self.pos();
        let path = match self.peek() {
            Some(Token::Str(path)) => path.clone(),
            _ => return Err(self.unexpected("import path")),
        };
        self.cursor += 1;
        if path.is_empty() {
            return Err(self.error_at(path_pos, "empty import path".to_string()));
        }
        Ok(ImportSpec {
            id: self.fset.next_node_id(),
            alias,
            path,
            pos,
        })
    }

    fn decl(&mut self) -> PResult<Decl> {
        match self.peek() {
            Some(Token::Const) => Ok(Decl::Const(self.value_decl(Token::Const)?)),
            Some(Token::Var) => Ok(Decl::Var(self.value_decl(Token::Var)?)),
            Some(Token::Func) => Ok(Decl::Func(self.func_decl()?)),
            Some(Token::Import) => Err(self.error_at(
                self.pos(),
                "imports must appear before other declarations".to_string(),
            )),
            _ => Err(self.unexpected("declaration")),
        }
    }

    fn value_decl(&mut self, keyword: Token) -> PResult<ValueDecl> {
        let pos = self.pos();
        self.expect(keyword)?;
        let name = self.ident()?;
        let ty = if self.at(&Token::Assign) {
            None
        } else {
            Some(self.type_expr()?)
        };
        self.expect(Token::Assign)?;
        let value = self.expr()?;
        Ok(ValueDecl {
            id: self.fset.next_node_id(),
            name,
            ty,
            value,
            pos,
        })
    }

    fn type_expr(&mut self) -> PResult<TypeExpr> {
        match self.peek() {
            Some(Token::Ident(_)) => Ok(TypeExpr { name: self.ident()? }),
            _ => Err(self.unexpected("type")),
        }
    }

    fn func_decl(&mut self) -> PResult<FuncDecl> {
        let pos = self.pos();
        self.expect(Token::Func)?;
        let name = self.ident()?;

        self.expect(Token::LParen)?;
        let mut params = Vec::new();
        if !self.eat(&Token::RParen) {
            loop {
                let param_name = self.ident()?;
                let ty = self.type_expr()?;
                params.push(Param {
                    name: param_name,
                    ty,
                });
                if self.eat(&Token::RParen) {
                    break;
                }
                self.expect(Token::Comma)?;
            }
        }

        let result = if self.at(&Token::LBrace) {
            None
        } else {
            Some(self.type_expr()?)
        };
        let body = self.block()?;

        Ok(FuncDecl {
            id: self.fset.next_node_id(),
            name,
            params,
            result,
            body,
            pos,
        })
    }

    fn block(&mut self) -> PResult<Block> {
        let pos = self.pos();
        self.expect(Token::LBrace)?;
        let mut stmts = Vec::new();
        self.skip_semis();
        while !self.at(&Token::RBrace) {
            if self.peek().is_none() {
                return Err(self.unexpected("'}'"));
            }
            stmts.push(self.stmt()?);
            self.skip_semis();
        }
        let end = self.pos();
        self.expect(Token::RBrace)?;
        Ok(Block {
            id: self.fset.next_node_id(),
            stmts,
            pos,
            end,
        })
    }

    fn stmt(&mut self) -> PResult<Stmt> {
        match self.peek() {
            Some(Token::Var) => Ok(Stmt::Var(self.value_decl(Token::Var)?)),
            Some(Token::Return) => {
                let pos = self.pos();
                self.cursor += 1;
                // A result must start on the same line as `return`.
                let has_value = !matches!(self.peek(), None | Some(Token::RBrace | Token::Semi))
                    && !self.newline_before_current();
                let value = if has_value { Some(self.expr()?) } else { None };
                Ok(Stmt::Return { value, pos })
            }
            _ => Ok(Stmt::Expr(self.expr()?)),
        }
    }

    // ---------- expressions ----------

    pub(crate) fn expr(&mut self) -> PResult<Expr> {
        self.binary_expr(1)
    }

    fn binary_op(&self) -> Option<BinaryOp> {
        Some(match self.peek()? {
            Token::Plus => BinaryOp::Add,
            Token::Minus => BinaryOp::Sub,
            Token::Star => BinaryOp::Mul,
            Token::Slash => BinaryOp::Div,
            Token::EqEq => BinaryOp::Eq,
            Token::NotEq => BinaryOp::Ne,
            Token::Lt => BinaryOp::Lt,
            Token::Gt => BinaryOp::Gt,
            Token::AndAnd => BinaryOp::And,
            Token::OrOr => BinaryOp::Or,
            _ => return None,
        })
    }

    /// Precedence climbing; all binary operators are left-associative
    fn binary_expr(&mut self, min_prec: u8) -> PResult<Expr> {
        let mut lhs = self.unary_expr()?;
        while let Some(op) = self.binary_op() {
            if op.precedence() < min_prec {
                break;
            }
            self.cursor += 1;
            let rhs = self.binary_expr(op.precedence() + 1)?;
            let pos = lhs.pos;
            lhs = Expr {
                id: self.fset.next_node_id(),
                kind: ExprKind::Binary {
                    op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                },
                pos,
            };
        }
        Ok(lhs)
    }

    fn unary_expr(&mut self) -> PResult<Expr> {
        let pos = self.pos();
        let op = match self.peek() {
            Some(Token::Minus) => UnaryOp::Neg,
            Some(Token::Bang) => UnaryOp::Not,
            _ => return self.postfix_expr(),
        };
        self.cursor += 1;
        let operand = self.unary_expr()?;
        Ok(Expr {
            id: self.fset.next_node_id(),
            kind: ExprKind::Unary {
                op,
                operand: Box::new(operand),
            },
            pos,
        })
    }

    fn postfix_expr(&mut self) -> PResult<Expr> {
        let mut expr = self.primary_expr()?;
        loop {
            if self.eat(&Token::Dot) {
                let sel = self.ident()?;
                let pos = expr.pos;
                expr = Expr {
                    id: self.fset.next_node_id(),
                    kind: ExprKind::Selector {
                        base: Box::new(expr),
                        sel,
                    },
                    pos,
                };
            } else if self.at(&Token::LParen) && !self.newline_before_current() {
                self.cursor += 1;
                let mut args = Vec::new();
                if !self.eat(&Token::RParen) {
                    loop {
                        args.push(self.expr()?);
                        if self.eat(&Token::RParen) {
                            break;
                        }
                        self.expect(Token::Comma)?;
                    }
                }
                let pos = expr.pos;
                expr = Expr {
                    id: self.fset.next_node_id(),
                    kind: ExprKind::Call {
                        func: Box::new(expr),
                        args,
                    },
                    pos,
                };
            } else {
                return Ok(expr);
            }
        }
    }

    fn primary_expr(&mut self) -> PResult<Expr> {
        let pos = self.pos();
        let kind = match self.peek() {
            Some(Token::Int(v)) => {
                let v = *v;
                self.cursor += 1;
                ExprKind::Int(v)
            }
            Some(Token::Str(s)) => {
                let s = s.clone();
                self.cursor += 1;
                ExprKind::Str(s)
            }
            Some(Token::True) => {
                self.cursor += 1;
                ExprKind::Bool(true)
            }
            Some(Token::False) => {
                self.cursor += 1;
                ExprKind::Bool(false)
            }
            Some(Token::Ident(_)) => ExprKind::Ident(self.ident()?),
            Some(Token::LParen) => {
                self.cursor += 1;
                let inner = self.expr()?;
                self.expect(Token::RParen)?;
                ExprKind::Paren(Box::new(inner))
            }
            _ => return Err(self.unexpected("expression")),
        };
        Ok(Expr {
            id: self.fset.next_node_id(),
            kind,
            pos,
        })
    }

    #[cfg(test)]
    pub(crate) fn is_done(&self) -> bool {
        self.peek().is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse_expr(src: &str) -> Expr {
        let fset = FileSet::new();
        let mut parser = Parser::new(&fset, "expr.cfx", src).unwrap();
        let expr = parser.expr().unwrap();
        assert!(parser.is_done(), "trailing tokens in {:?}", src);
        expr
    }

    fn render(expr: &Expr) -> String {
        match &expr.kind {
            ExprKind::Int(v) => v.to_string(),
            ExprKind::Str(s) => format!("{:?}", s),
            ExprKind::Bool(b) => b.to_string(),
            ExprKind::Ident(id) => id.name.clone(),
            ExprKind::Selector { base, sel } => format!("{}.{}", render(base), sel.name),
            ExprKind::Call { func, args } => format!(
                "{}({})",
                render(func),
                args.iter().map(render).collect::<Vec<_>>().join(", ")
            ),
            ExprKind::Unary { op, operand } => format!("({}{})", op, render(operand)),
            ExprKind::Binary { op, lhs, rhs } => {
                format!("({} {} {})", render(lhs), op, render(rhs))
            }
            ExprKind::Paren(inner) => render(inner),
        }
    }

    #[test]
    fn test_precedence() {
        assert_eq!(render(&parse_expr("1 + 2 * 3")), "(1 + (2 * 3))");
        assert_eq!(render(&parse_expr("1 - 2 - 3")), "((1 - 2) - 3)");
        assert_eq!(
            render(&parse_expr("a < b && !c || d == 4")),
            "(((a < b) && (!c)) || (d == 4))"
        );
        assert_eq!(render(&parse_expr("-(1 + 2)")), "(-(1 + 2))");
    }

    #[test]
    fn test_selectors_and_calls() {
        assert_eq!(
            render(&parse_expr("fmt.Sprint(x, strs.Join(\"a\", y))")),
            "fmt.Sprint(x, strs.Join(\"a\", y))"
        );
    }

    #[test]
    fn test_error_position() {
        let fset = FileSet::new();
        let err = Parser::new(&fset, "bad.cfx", "package p\nconst = 1")
            .unwrap()
            .parse_file()
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "bad.cfx:2:7: expected identifier, found '='"
        );
    }
}
