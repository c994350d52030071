//! Load configuration and program assembly

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use conflux_checker::{
    BinaryImporter, CheckOptions, Checker, ErrorSink, SymbolImporter, TypeChecker,
};
use conflux_core::ast::SourceFile;
use conflux_core::{FileSet, ImportMap, PackageRef};
use conflux_parser::{ConfluxParser, SourceParser, SOURCE_EXT};
use indexmap::IndexMap;
use tracing::{debug, info, warn};

use crate::context::{BuildContext, FileSelection, FsContext};
use crate::error::LoadError;
use crate::importer::Resolver;
use crate::program::{canonical, PackageInfo, Program};

/// Decides, per import path, whether function bodies are type checked
pub type FuncBodyFilter = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// Help text for the arguments accepted by [`Config::from_args`]
pub const FROM_ARGS_USAGE: &str = "
<args> is a list of arguments denoting a set of initial packages.
It may take one of two forms:

1. A list of *.cfx source files, separated by commas.

   All of the specified files are loaded, parsed and type-checked
   as a single package. All the files must belong to the same
   package.

2. A list of import paths, each denoting a package.

   The package's directory is found relative to the source root.
   The package is augmented by any *_test.cfx files in its
   directory that belong to the same package, and any files in
   the `<name>_test` package are loaded as a separate package.
   Only the first package named this way is augmented.

   An import path prefixed with \"notest:\" is loaded without its
   test files.

A '--' argument terminates the list of packages.
";

/// Configuration of one whole-program load
///
/// Collaborators default to the conflux parser, checker, filesystem
/// discovery and symbol-file importer, all rooted at the same directory.
#[derive(Clone)]
pub struct Config {
    /// Shared file set; every parsed file is registered here
    pub fset: Arc<FileSet>,
    /// Ad-hoc packages, each a list of parsed files
    pub create_pkgs: Vec<Vec<SourceFile>>,
    /// Initial import paths, with their "augment with tests" flag
    pub import_pkgs: IndexMap<String, bool>,
    /// Load every dependency from source instead of symbol data
    pub source_imports: bool,
    /// When unset, every function body is checked
    pub type_check_func_bodies: Option<FuncBodyFilter>,
    pub build: Arc<dyn BuildContext>,
    pub parser: Arc<dyn SourceParser>,
    pub type_checker: Arc<dyn TypeChecker>,
    pub binary_importer: Arc<dyn BinaryImporter>,
    /// Base options for every checker invocation
    pub check_options: CheckOptions,
    /// Packages known before the load starts
    pub import_map: ImportMap,
}

impl Default for Config {
    fn default() -> Self {
        Self::new(".")
    }
}

impl Config {
    /// Configuration reading sources and symbol files below `root`
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        let root = root.as_ref();
        Self {
            fset: Arc::new(FileSet::new()),
            create_pkgs: Vec::new(),
            import_pkgs: IndexMap::new(),
            source_imports: false,
            type_check_func_bodies: None,
            build: Arc::new(FsContext::new(root)),
            parser: Arc::new(ConfluxParser::new()),
            type_checker: Arc::new(Checker::new()),
            binary_importer: Arc::new(SymbolImporter::new(root)),
            check_options: CheckOptions::default(),
            import_map: ImportMap::new(),
        }
    }

    pub fn with_source_imports(mut self, source_imports: bool) -> Self {
        self.source_imports = source_imports;
        self
    }

    pub fn with_build_context(mut self, build: Arc<dyn BuildContext>) -> Self {
        self.build = build;
        self
    }

    pub fn with_parser(mut self, parser: Arc<dyn SourceParser>) -> Self {
        self.parser = parser;
        self
    }

    pub fn with_type_checker(mut self, type_checker: Arc<dyn TypeChecker>) -> Self {
        self.type_checker = type_checker;
        self
    }

    pub fn with_binary_importer(mut self, importer: Arc<dyn BinaryImporter>) -> Self {
        self.binary_importer = importer;
        self
    }

    pub fn with_func_body_filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        self.type_check_func_bodies = Some(Arc::new(filter));
        self
    }

    pub fn with_error_sink(mut self, sink: ErrorSink) -> Self {
        self.check_options.error_sink = Some(sink);
        self
    }

    pub fn with_import_map(mut self, import_map: ImportMap) -> Self {
        self.import_map = import_map;
        self
    }

    pub(crate) fn checks_func_bodies(&self, path: &str) -> bool {
        self.type_check_func_bodies
            .as_ref()
            .map_or(true, |filter| filter(path))
    }

    /// The import path currently holding the augmentation slot
    pub fn augmented_path(&self) -> Option<&str> {
        self.import_pkgs
            .iter()
            .find(|(_, augment)| **augment)
            .map(|(path, _)| path.as_str())
    }

    /// Parse one file, registering it in this configuration's file set
    pub fn parse_file(&self, filename: &str, src: &str) -> Result<SourceFile, LoadError> {
        Ok(self.parser.parse_file(&self.fset, filename, src)?)
    }

    fn parse_paths(&self, paths: &[PathBuf]) -> Result<Vec<SourceFile>, LoadError> {
        paths
            .iter()
            .map(|path| {
                let src = self.build.read_file(path).map_err(|source| LoadError::Io {
                    path: path.clone(),
                    source,
                })?;
                self.parse_file(&path.to_string_lossy(), &src)
            })
            .collect()
    }

    /// Discover, read and parse the files of `path`
    pub(crate) fn parse_package_files(
        &self,
        path: &str,
        selection: FileSelection,
    ) -> Result<Vec<SourceFile>, LoadError> {
        let paths = self
            .build
            .package_files(path, selection)
            .map_err(|source| LoadError::Discovery {
                path: path.to_string(),
                source,
            })?;
        self.parse_paths(&paths)
    }

    /// Add an ad-hoc package made of the named files
    pub fn create_from_filenames<P: AsRef<Path>>(
        &mut self,
        filenames: &[P],
    ) -> Result<(), LoadError> {
        let paths: Vec<PathBuf> = filenames.iter().map(|p| p.as_ref().to_path_buf()).collect();
        let files = self.parse_paths(&paths)?;
        self.create_from_files(files);
        Ok(())
    }

    /// Add an ad-hoc package made of already parsed files
    pub fn create_from_files(&mut self, files: Vec<SourceFile>) {
        self.create_pkgs.push(files);
    }

    /// Load `path` from source, without test files unless already requested
    pub fn import(&mut self, path: &str) {
        self.import_pkgs.entry(path.to_string()).or_insert(false);
    }

    /// Load `path` from source together with its test files, and its
    /// external test package as an ad-hoc package.
    ///
    /// Only one package can be augmented; later requests load the package
    /// without tests.
    pub fn import_with_tests(&mut self, path: &str) -> Result<(), LoadError> {
        self.import(path);
        if let Some(augmented) = self.augmented_path() {
            if augmented != path {
                warn!(
                    "{} is already augmented with tests; loading {} without them",
                    augmented, path
                );
            }
            return Ok(());
        }

        let external = self.parse_package_files(path, FileSelection::ExternalTests)?;
        if !external.is_empty() {
            debug!("{}: {} external test files", path, external.len());
            self.create_from_files(external);
        }
        self.import_pkgs.insert(path.to_string(), true);
        Ok(())
    }

    /// Configure initial packages from command-line style arguments; see
    /// [`FROM_ARGS_USAGE`]. Returns the arguments following `--`.
    pub fn from_args<S: AsRef<str>>(&mut self, args: &[S]) -> Result<Vec<String>, LoadError> {
        let mut args = args.iter().map(AsRef::as_ref);
        while let Some(arg) = args.next() {
            if arg == "--" {
                return Ok(args.map(str::to_string).collect());
            }
            if arg.ends_with(&format!(".{}", SOURCE_EXT)) {
                let filenames: Vec<&str> = arg.split(',').filter(|f| !f.is_empty()).collect();
                self.create_from_filenames(&filenames)?;
            } else if let Some(path) = arg.strip_prefix("notest:") {
                self.import(path);
            } else {
                self.import_with_tests(arg)?;
            }
        }
        Ok(Vec::new())
    }

    /// Load, parse and type check the initial packages and everything
    /// they depend on
    pub fn load(&self) -> Result<Program, LoadError> {
        let augmented: Vec<String> = self
            .import_pkgs
            .iter()
            .filter(|(_, augment)| **augment)
            .map(|(path, _)| path.clone())
            .collect();
        if augmented.len() > 1 {
            return Err(LoadError::MultipleAugmented(augmented));
        }

        info!(
            "loading {} import paths and {} ad-hoc packages",
            self.import_pkgs.len(),
            self.create_pkgs.len()
        );
        let mut resolver = Resolver::new(self);

        let mut imported = IndexMap::new();
        for path in self.import_pkgs.keys() {
            let result = resolver.resolve(path);
            if let Some(err) = resolver.take_fatal() {
                return Err(err);
            }
            let info = result.map_err(|source| LoadError::Import {
                path: path.clone(),
                source,
            })?;
            imported.insert(path.clone(), info);
        }

        let mut created = Vec::with_capacity(self.create_pkgs.len());
        for files in &self.create_pkgs {
            let name = package_name(files)?;
            let info = Arc::new(resolver.create_package(&name, files.clone(), false));
            if let Some(err) = resolver.take_fatal() {
                return Err(err);
            }
            resolver.all_packages.insert(info.pkg.clone(), info.clone());
            created.push(info);
        }

        if created.is_empty() && imported.is_empty() {
            return Err(LoadError::NoPackages);
        }

        let mut failed: Vec<String> = resolver
            .all_packages
            .values()
            .filter(|info| info.error().is_some())
            .map(|info| info.path().to_string())
            .collect();
        if !failed.is_empty() {
            failed.sort();
            failed.dedup();
            return Err(LoadError::TypeErrors(failed));
        }

        // Packages mentioned by symbol data but never loaded themselves.
        // Handles superseded in the import map are not packages of their own.
        let import_map = resolver.import_map;
        let mut all_packages = resolver.all_packages;
        let mut pending: Vec<PackageRef> = import_map.values().cloned().collect();
        pending.extend(all_packages.keys().flat_map(|pkg| pkg.imports().to_vec()));
        while let Some(pkg) = pending.pop() {
            let pkg = canonical(&import_map, &pkg).clone();
            if all_packages.contains_key(&pkg) {
                continue;
            }
            pending.extend(pkg.imports().iter().cloned());
            all_packages.insert(pkg.clone(), Arc::new(PackageInfo::from_handle(pkg)));
        }

        info!(
            "loaded {} packages ({} initial)",
            all_packages.len(),
            created.len() + imported.len()
        );
        Ok(Program {
            fset: self.fset.clone(),
            created,
            imported,
            import_map,
            all_packages,
        })
    }
}

/// Name shared by all files of an ad-hoc package
fn package_name(files: &[SourceFile]) -> Result<String, LoadError> {
    let Some(first) = files.first() else {
        return Ok(String::new());
    };
    for file in &files[1..] {
        if file.package_name() != first.package_name() {
            return Err(LoadError::PackageNameMismatch {
                first: first.package_name().to_string(),
                second: file.package_name().to_string(),
            });
        }
    }
    Ok(first.package_name().to_string())
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("create_pkgs", &self.create_pkgs.len())
            .field("import_pkgs", &self.import_pkgs)
            .field("source_imports", &self.source_imports)
            .field(
                "type_check_func_bodies",
                &self.type_check_func_bodies.as_ref().map(|_| "<fn>"),
            )
            .field("check_options", &self.check_options)
            .field("import_map", &self.import_map.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_import_never_downgrades() {
        let mut conf = Config::default();
        conf.import_pkgs.insert("lib".to_string(), true);
        conf.import("lib");
        conf.import("other");
        assert_eq!(conf.augmented_path(), Some("lib"));
        assert_eq!(
            conf.import_pkgs.keys().cloned().collect::<Vec<_>>(),
            vec!["lib".to_string(), "other".to_string()]
        );
    }

    #[test]
    fn test_load_rejects_multiple_augmented() {
        let mut conf = Config::default();
        conf.import_pkgs.insert("a".to_string(), true);
        conf.import_pkgs.insert("b".to_string(), true);
        match conf.load() {
            Err(LoadError::MultipleAugmented(paths)) => {
                assert_eq!(paths, vec!["a".to_string(), "b".to_string()])
            }
            other => panic!("expected MultipleAugmented, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_config_has_no_packages() {
        assert!(matches!(
            Config::default().load(),
            Err(LoadError::NoPackages)
        ));
    }

    #[test]
    fn test_ad_hoc_package_name_mismatch() {
        let mut conf = Config::default();
        let a = conf.parse_file("a.cfx", "package a\n").unwrap();
        let b = conf.parse_file("b.cfx", "package b\n").unwrap();
        conf.create_from_files(vec![a, b]);
        assert!(matches!(
            conf.load(),
            Err(LoadError::PackageNameMismatch { ref first, ref second })
                if first == "a" && second == "b"
        ));
    }

    #[test]
    fn test_func_body_filter() {
        let conf = Config::default().with_func_body_filter(|path| path != "vendor/big");
        assert!(conf.checks_func_bodies("app"));
        assert!(!conf.checks_func_bodies("vendor/big"));
        assert!(Config::default().checks_func_bodies("anything"));
    }
}
