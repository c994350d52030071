//! Whole-file parsing through the public parser interface

use conflux_core::ast::{Decl, ExprKind, Stmt};
use conflux_core::FileSet;
use conflux_parser::{ConfluxParser, ParserError, SourceParser};
use pretty_assertions::assert_eq;

const LIB: &str = r#"// Package lib exposes a greeting.
package lib

import (
    "strs"
    f "fmt"
)

const Answer = 40 + 2
var greeting string = "hello"

func Greet(name string) string {
    var sep = ", "
    return strs.Join(greeting, sep) + name
}

func Log(msg string) {
    f.Print(msg)
    return
}
"#;

#[test]
fn test_parse_package_imports_and_decls() -> Result<(), Box<dyn std::error::Error>> {
    let fset = FileSet::new();
    let file = ConfluxParser::new().parse_file(&fset, "lib.cfx", LIB)?;

    assert_eq!(file.package_name(), "lib");
    assert_eq!(file.import_paths().collect::<Vec<_>>(), vec!["strs", "fmt"]);
    assert_eq!(
        file.imports[1].alias.as_ref().map(|a| a.name.as_str()),
        Some("f")
    );

    let names: Vec<_> = file.decls.iter().map(|d| d.name().name.as_str()).collect();
    assert_eq!(names, vec!["Answer", "greeting", "Greet", "Log"]);

    let Decl::Func(greet) = &file.decls[2] else {
        panic!("expected func decl");
    };
    assert_eq!(greet.params.len(), 1);
    assert_eq!(greet.result.as_ref().map(|t| t.name.name.as_str()), Some("string"));
    assert_eq!(greet.body.stmts.len(), 2);
    assert!(matches!(greet.body.stmts[0], Stmt::Var(_)));

    let Decl::Func(log) = &file.decls[3] else {
        panic!("expected func decl");
    };
    assert!(log.result.is_none());
    match &log.body.stmts[..] {
        [Stmt::Expr(call), Stmt::Return { value: None, .. }] => {
            assert!(matches!(call.kind, ExprKind::Call { .. }));
        }
        other => panic!("unexpected statements: {:?}", other),
    }

    let pos = fset.position(file.decls[0].pos())?;
    assert_eq!(pos.to_string(), "lib.cfx:9:1");
    Ok(())
}

#[test]
fn test_bare_return_before_next_statement() -> Result<(), Box<dyn std::error::Error>> {
    let src = "package p\nfunc F() {\n    return\n}\nfunc G() int { return 1 }\n";
    let fset = FileSet::new();
    let file = ConfluxParser::new().parse_file(&fset, "p.cfx", src)?;
    assert_eq!(file.decls.len(), 2);
    Ok(())
}

#[test]
fn test_missing_package_clause() {
    let fset = FileSet::new();
    let err = ConfluxParser::new()
        .parse_file(&fset, "x.cfx", "import \"fmt\"")
        .unwrap_err();
    assert!(matches!(err, ParserError::Syntax { .. }));
    assert_eq!(
        err.to_string(),
        "x.cfx:1:1: expected 'package', found 'import'"
    );
}

#[test]
fn test_late_import_is_rejected() {
    let fset = FileSet::new();
    let err = ConfluxParser::new()
        .parse_file(&fset, "x.cfx", "package x\nconst A = 1\nimport \"fmt\"\n")
        .unwrap_err();
    assert!(err.to_string().contains("imports must appear before"));
}

#[test]
fn test_lex_error_reports_position() {
    let fset = FileSet::new();
    let err = ConfluxParser::new()
        .parse_file(&fset, "x.cfx", "package x\nconst A = 1 # 2\n")
        .unwrap_err();
    assert_eq!(err.position().map(|p| (p.line, p.column)), Some((2, 13)));
}

#[test]
fn test_files_share_one_file_set() -> Result<(), Box<dyn std::error::Error>> {
    let fset = FileSet::new();
    let parser = ConfluxParser::new();
    let a = parser.parse_file(&fset, "a.cfx", "package p\nconst A = 1\n")?;
    let b = parser.parse_file(&fset, "b.cfx", "package p\nconst B = A\n")?;

    assert_eq!(fset.file_count(), 2);
    assert_ne!(a.decls[0].name().id, b.decls[0].name().id);
    assert_eq!(fset.file(b.pos).map(|f| f.name().to_string()).as_deref(), Some("b.cfx"));
    Ok(())
}
