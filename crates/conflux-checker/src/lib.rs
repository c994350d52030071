//! Type checking for conflux packages
//!
//! The checker never resolves imports on its own. Every import it meets is
//! handed to an [`Importer`] supplied by the caller, which decides whether
//! the package comes from source or from symbol data and keeps the
//! canonical path-to-package mapping.

pub mod checker;
pub mod constant;
pub mod error;
pub mod symbols;

use std::fmt;
use std::sync::Arc;

use conflux_core::ast::SourceFile;
use conflux_core::{FileSet, PackageRef, TypeInfo};

pub use checker::Checker;
pub use error::{ImportError, SymbolError, TypeError};
pub use symbols::{BinaryImporter, SymbolFile, SymbolImporter, SYMBOL_EXT};

/// Receiver for every diagnostic, in the order they are found
pub type ErrorSink = Arc<dyn Fn(&TypeError) + Send + Sync>;

/// Import callback used by the checker
pub trait Importer {
    fn import(&mut self, path: &str) -> Result<PackageRef, ImportError>;
}

#[derive(Clone, Default)]
pub struct CheckOptions {
    /// Check declarations only, skipping function bodies
    pub ignore_func_bodies: bool,
    /// Called for each diagnostic; when unset only the first is kept
    pub error_sink: Option<ErrorSink>,
}

impl fmt::Debug for CheckOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CheckOptions")
            .field("ignore_func_bodies", &self.ignore_func_bodies)
            .field("error_sink", &self.error_sink.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

/// Common trait for package type checkers
pub trait TypeChecker: Send + Sync {
    /// Check one package made of `files`, in the given order.
    ///
    /// Always returns a package handle, even when diagnostics were
    /// reported; the second element is the first diagnostic, if any.
    fn check(
        &self,
        opts: &CheckOptions,
        path: &str,
        fset: &FileSet,
        files: &[SourceFile],
        info: &mut TypeInfo,
        importer: &mut dyn Importer,
    ) -> (PackageRef, Option<TypeError>);
}
