//! Import resolution and package construction
//!
//! The resolver lives for exactly one load. Each import path is resolved
//! at most once: a `Pending` record is stored before any work starts, so a
//! request that re-enters through the checker's import callback observes
//! it and reports a cycle instead of recursing forever.

use std::collections::HashMap;
use std::sync::Arc;

use conflux_checker::{ImportError, Importer, TypeError};
use conflux_core::ast::SourceFile;
use conflux_core::{ImportMap, PackageRef, TypeInfo};
use tracing::{debug, instrument, trace};

use crate::config::Config;
use crate::context::FileSelection;
use crate::error::LoadError;
use crate::program::PackageInfo;

/// Resolution record for one import path
#[derive(Debug)]
pub(crate) enum ImportState {
    Pending,
    Resolved(Arc<PackageInfo>),
    Failed(ImportError),
}

pub(crate) struct Resolver<'a> {
    conf: &'a Config,
    records: HashMap<String, ImportState>,
    pub(crate) import_map: ImportMap,
    pub(crate) all_packages: HashMap<PackageRef, Arc<PackageInfo>>,
    /// First structural failure; once set, nothing new is resolved
    fatal: Option<LoadError>,
}

impl<'a> Resolver<'a> {
    pub(crate) fn new(conf: &'a Config) -> Self {
        Self {
            conf,
            records: HashMap::new(),
            import_map: conf.import_map.clone(),
            all_packages: HashMap::new(),
            fatal: None,
        }
    }

    pub(crate) fn take_fatal(&mut self) -> Option<LoadError> {
        self.fatal.take()
    }

    /// Return the package for `path`, constructing it on first request
    #[instrument(level = "debug", skip(self))]
    pub(crate) fn resolve(&mut self, path: &str) -> Result<Arc<PackageInfo>, ImportError> {
        if self.fatal.is_some() {
            return Err(ImportError::Aborted(path.to_string()));
        }
        match self.records.get(path) {
            Some(ImportState::Resolved(info)) => {
                trace!("cache hit for {}", path);
                return Ok(info.clone());
            }
            Some(ImportState::Failed(err)) => return Err(err.clone()),
            Some(ImportState::Pending) => {
                debug!("{} is already being constructed", path);
                return Err(ImportError::Cycle(path.to_string()));
            }
            None => {}
        }
        self.records.insert(path.to_string(), ImportState::Pending);

        let from_source = self.conf.import_pkgs.contains_key(path) || self.conf.source_imports;
        let result = if from_source {
            self.load_from_source(path)
        } else {
            self.load_from_binary(path)
        };

        let state = match &result {
            Ok(info) => ImportState::Resolved(info.clone()),
            Err(err) => ImportState::Failed(err.clone()),
        };
        self.records.insert(path.to_string(), state);
        result
    }

    fn load_from_source(&mut self, path: &str) -> Result<Arc<PackageInfo>, ImportError> {
        let augment = self.conf.import_pkgs.get(path).copied().unwrap_or(false);
        let selection = if augment {
            FileSelection::ProductionAndTests
        } else {
            FileSelection::Production
        };
        debug!("loading {} from source ({:?})", path, selection);

        let files = match self.conf.parse_package_files(path, selection) {
            Ok(files) => files,
            Err(err) => {
                let reason = err.to_string();
                if self.fatal.is_none() {
                    self.fatal = Some(err);
                }
                return Err(ImportError::Source {
                    path: path.to_string(),
                    reason,
                });
            }
        };

        let info = Arc::new(self.create_package(path, files, true));
        self.import_map.insert(path.to_string(), info.pkg.clone());
        self.all_packages.insert(info.pkg.clone(), info.clone());
        Ok(info)
    }

    fn load_from_binary(&mut self, path: &str) -> Result<Arc<PackageInfo>, ImportError> {
        debug!("loading {} from symbol data", path);
        let pkg = self
            .conf
            .binary_importer
            .import_package(&mut self.import_map, path)?;
        let info = Arc::new(PackageInfo::from_handle(pkg.clone()));
        self.all_packages.insert(pkg, info.clone());
        Ok(info)
    }

    /// Type check `files` as the package `path`. Never fails: diagnostics
    /// are forwarded to the error sink and the first one is kept.
    pub(crate) fn create_package(
        &mut self,
        path: &str,
        files: Vec<SourceFile>,
        importable: bool,
    ) -> PackageInfo {
        let conf = self.conf;
        let mut opts = conf.check_options.clone();
        opts.ignore_func_bodies = !conf.checks_func_bodies(path);

        let sink = opts.error_sink.take();
        let unit = path.to_string();
        opts.error_sink = Some(Arc::new(move |err: &TypeError| {
            debug!("{}: {}", unit, err);
            match &sink {
                Some(sink) => sink(err),
                None => eprintln!("{}", err),
            }
        }));

        let mut info = TypeInfo::new();
        let (pkg, error) = conf
            .type_checker
            .check(&opts, path, &conf.fset, &files, &mut info, self);
        debug!(
            "constructed {} ({} files{})",
            path,
            files.len(),
            if error.is_some() { ", with errors" } else { "" }
        );
        PackageInfo::from_source(pkg, files, info, importable, error)
    }
}

impl Importer for Resolver<'_> {
    fn import(&mut self, path: &str) -> Result<PackageRef, ImportError> {
        self.resolve(path).map(|info| info.pkg.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conflux_test_fixtures::{FixtureType, TestFixtures};

    #[test]
    fn test_resolve_is_idempotent() {
        let fixtures = TestFixtures::with(FixtureType::LibAndSub);
        let conf = Config::new(fixtures.root()).with_source_imports(true);
        let mut resolver = Resolver::new(&conf);

        let first = resolver.resolve("lib/sub").unwrap();
        let second = resolver.resolve("lib/sub").unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        // lib reaches sub through the import callback and gets the same handle
        let lib = resolver.resolve("lib").unwrap();
        assert!(PackageRef::ptr_eq(&lib.pkg.imports()[0], &first.pkg));
        assert_eq!(resolver.all_packages.len(), 2);
    }

    #[test]
    fn test_reentrant_request_reports_cycle() {
        let fixtures = TestFixtures::with(FixtureType::LibAndSub);
        let conf = Config::new(fixtures.root());
        let mut resolver = Resolver::new(&conf);
        resolver
            .records
            .insert("lib".to_string(), ImportState::Pending);

        assert_eq!(
            resolver.resolve("lib").unwrap_err(),
            ImportError::Cycle("lib".to_string())
        );
    }

    #[test]
    fn test_structural_failure_aborts_later_resolutions() {
        let fixtures = TestFixtures::with(FixtureType::LibAndSub);
        let conf = Config::new(fixtures.root()).with_source_imports(true);
        let mut resolver = Resolver::new(&conf);

        let err = resolver.resolve("missing").unwrap_err();
        assert!(matches!(err, ImportError::Source { ref path, .. } if path == "missing"));
        assert_eq!(
            resolver.resolve("lib").unwrap_err(),
            ImportError::Aborted("lib".to_string())
        );
        assert!(matches!(
            resolver.take_fatal(),
            Some(LoadError::Discovery { ref path, .. }) if path == "missing"
        ));
    }

    #[test]
    fn test_failed_binary_import_is_replayed() {
        let fixtures = TestFixtures::new();
        let conf = Config::new(fixtures.root());
        let mut resolver = Resolver::new(&conf);

        let first = resolver.resolve("nowhere").unwrap_err();
        assert!(matches!(first, ImportError::Binary { .. }));
        assert_eq!(resolver.resolve("nowhere").unwrap_err(), first);
        assert!(resolver.take_fatal().is_none());
    }
}
