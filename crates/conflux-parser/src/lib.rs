//! Lexer and parser for conflux source files

pub mod error;
pub mod lexer;
mod parser;

use conflux_core::ast::SourceFile;
use conflux_core::FileSet;

pub use error::ParserError;
pub use lexer::read_package_clause;

/// Source file extension
pub const SOURCE_EXT: &str = "cfx";

/// Suffix (before the extension) marking test files
pub const TEST_SUFFIX: &str = "_test";

/// Common trait for source parsers
///
/// A parser registers the file in `fset` before producing its tree, so
/// that every position in the result resolves through the same set.
pub trait SourceParser: Send + Sync {
    fn parse_file(
        &self,
        fset: &FileSet,
        filename: &str,
        src: &str,
    ) -> Result<SourceFile, ParserError>;
}

/// Parser for the conflux source language
#[derive(Debug, Default, Clone, Copy)]
pub struct ConfluxParser;

impl ConfluxParser {
    pub fn new() -> Self {
        Self
    }
}

impl SourceParser for ConfluxParser {
    fn parse_file(
        &self,
        fset: &FileSet,
        filename: &str,
        src: &str,
    ) -> Result<SourceFile, ParserError> {
        tracing::trace!("parsing {} ({} bytes)", filename, src.len());
        parser::Parser::new(fset, filename, src)?.parse_file()
    }
}

/// Whether `filename` names a test source file, e.g. `fmt_test.cfx`
pub fn is_test_file(filename: &str) -> bool {
    filename
        .strip_suffix(SOURCE_EXT)
        .and_then(|stem| stem.strip_suffix('.'))
        .is_some_and(|stem| stem.ends_with(TEST_SUFFIX))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_test_file() {
        assert!(is_test_file("fmt_test.cfx"));
        assert!(!is_test_file("fmt.cfx"));
        assert!(!is_test_file("fmt_test.go"));
        assert!(!is_test_file("testdata.cfx"));
    }
}
