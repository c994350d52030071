use std::path::PathBuf;

use conflux_checker::ImportError;
use conflux_core::CoreError;
use conflux_parser::ParserError;
use thiserror::Error;

/// Failure locating the files of a package
#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error(transparent)]
    InvalidImportPath(CoreError),

    #[error("cannot find package {path:?} in {}", dir.display())]
    NotFound { path: String, dir: PathBuf },

    #[error("no source files in {}", dir.display())]
    NoSourceFiles { path: String, dir: PathBuf },

    #[error("found packages {first} and {second} in {}", dir.display())]
    MultiplePackages {
        dir: PathBuf,
        first: String,
        second: String,
    },

    #[error("failed to list {}: {message}", dir.display())]
    Walk { dir: PathBuf, message: String },

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("cannot load {path}: {source}")]
    Discovery {
        path: String,
        #[source]
        source: DiscoveryError,
    },

    #[error(transparent)]
    Parse(#[from] ParserError),

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot import {path}: {source}")]
    Import {
        path: String,
        #[source]
        source: ImportError,
    },

    #[error("no initial packages were specified")]
    NoPackages,

    #[error("files of one package disagree on its name: {first} and {second}")]
    PackageNameMismatch { first: String, second: String },

    #[error("at most one package may be augmented with tests, found: {}", .0.join(", "))]
    MultipleAugmented(Vec<String>),

    #[error("couldn't load packages due to errors: {}", .0.join(", "))]
    TypeErrors(Vec<String>),
}
