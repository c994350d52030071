//! Tokenizer built on logos

use std::fmt;
use std::ops::Range;

use logos::Logos;

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n\f]+")]
#[logos(skip r"//[^\n]*")]
pub enum Token {
    // Keywords (must come before identifiers)
    #[token("package")]
    Package,

    #[token("import")]
    Import,

    #[token("const")]
    Const,

    #[token("var")]
    Var,

    #[token("func")]
    Func,

    #[token("return")]
    Return,

    #[token("true")]
    True,

    #[token("false")]
    False,

    #[regex(r"[A-Za-z_][A-Za-z0-9_]*", |lex| lex.slice().to_string())]
    Ident(String),

    #[regex(r"[0-9]+", |lex| lex.slice().parse::<i64>().ok())]
    Int(i64),

    #[regex(r#""([^"\\\n]|\\.)*""#, unquote)]
    Str(String),

    #[token("(")]
    LParen,

    #[token(")")]
    RParen,

    #[token("{")]
    LBrace,

    #[token("}")]
    RBrace,

    #[token(",")]
    Comma,

    #[token(".")]
    Dot,

    #[token(";")]
    Semi,

    #[token("=")]
    Assign,

    #[token("+")]
    Plus,

    #[token("-")]
    Minus,

    #[token("*")]
    Star,

    #[token("/")]
    Slash,

    #[token("==")]
    EqEq,

    #[token("!=")]
    NotEq,

    #[token("<")]
    Lt,

    #[token(">")]
    Gt,

    #[token("&&")]
    AndAnd,

    #[token("||")]
    OrOr,

    #[token("!")]
    Bang,
}

fn unquote(lex: &mut logos::Lexer<Token>) -> Option<String> {
    let raw = lex.slice();
    let inner = &raw[1..raw.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next()? {
            'n' => out.push('\n'),
            't' => out.push('\t'),
            '\\' => out.push('\\'),
            '"' => out.push('"'),
            _ => return None,
        }
    }
    Some(out)
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Package => f.write_str("'package'"),
            Token::Import => f.write_str("'import'"),
            Token::Const => f.write_str("'const'"),
            Token::Var => f.write_str("'var'"),
            Token::Func => f.write_str("'func'"),
            Token::Return => f.write_str("'return'"),
            Token::True => f.write_str("'true'"),
            Token::False => f.write_str("'false'"),
            Token::Ident(name) => write!(f, "identifier {}", name),
            Token::Int(v) => write!(f, "literal {}", v),
            Token::Str(s) => write!(f, "literal {:?}", s),
            Token::LParen => f.write_str("'('"),
            Token::RParen => f.write_str("')'"),
            Token::LBrace => f.write_str("'{'"),
            Token::RBrace => f.write_str("'}'"),
            Token::Comma => f.write_str("','"),
            Token::Dot => f.write_str("'.'"),
            Token::Semi => f.write_str("';'"),
            Token::Assign => f.write_str("'='"),
            Token::Plus => f.write_str("'+'"),
            Token::Minus => f.write_str("'-'"),
            Token::Star => f.write_str("'*'"),
            Token::Slash => f.write_str("'/'"),
            Token::EqEq => f.write_str("'=='"),
            Token::NotEq => f.write_str("'!='"),
            Token::Lt => f.write_str("'<'"),
            Token::Gt => f.write_str("'>'"),
            Token::AndAnd => f.write_str("'&&'"),
            Token::OrOr => f.write_str("'||'"),
            Token::Bang => f.write_str("'!'"),
        }
    }
}

/// A token and its byte range in the source
pub type Spanned = (Token, Range<usize>);

/// Tokenize `src`; on failure returns the byte range of the offending text
pub fn tokenize(src: &str) -> Result<Vec<Spanned>, Range<usize>> {
    Token::lexer(src)
        .spanned()
        .map(|(tok, span)| tok.map(|t| (t, span.clone())).map_err(|_| span))
        .collect()
}

/// Read only the `package` clause of a file, skipping comments.
/// Returns `None` if the file does not start with one.
pub fn read_package_clause(src: &str) -> Option<String> {
    let mut lex = Token::lexer(src);
    match (lex.next(), lex.next()) {
        (Some(Ok(Token::Package)), Some(Ok(Token::Ident(name)))) => Some(name),
        _ => None,
    }
}
