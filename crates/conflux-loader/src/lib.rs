//! Whole-program loading for conflux
//!
//! A [`Config`] names the initial packages, either by import path or as
//! lists of files. [`Config::load`] parses and type checks them together
//! with every package they import, transitively, and returns a
//! [`Program`]. Dependencies that are not initial are read from symbol
//! data unless `source_imports` is set.
//!
//! ```no_run
//! use conflux_loader::Config;
//!
//! let mut conf = Config::new("src");
//! conf.import("app");
//! let program = conf.load()?;
//! for info in program.dependency_order() {
//!     println!("{}", info.path());
//! }
//! # Ok::<(), conflux_loader::LoadError>(())
//! ```

pub mod config;
pub mod context;
pub mod error;
mod importer;
pub mod program;

pub use config::{Config, FuncBodyFilter, FROM_ARGS_USAGE};
pub use context::{BuildContext, FileSelection, FsContext};
pub use error::{DiscoveryError, LoadError};
pub use program::{PackageInfo, Program};
