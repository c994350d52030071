//! Core syntax tree, file set and type model for conflux

pub mod ast;
pub mod error;
pub mod fileset;
pub mod types;

pub use ast::validate_import_path;
pub use error::CoreError;
pub use fileset::{FileSet, Pos, Position, SourceMap};
pub use types::{
    ConstValue, ImportMap, Object, ObjectKind, ObjectRef, Package, PackageRef, Scope, ScopeKind,
    ScopeRef, Selection, Signature, Type, TypeInfo,
};
