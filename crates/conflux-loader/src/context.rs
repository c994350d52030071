//! Package discovery
//!
//! An import path names a directory under the source root. The `*.cfx`
//! files directly inside it form the package; `*_test.cfx` files are test
//! files and belong either to the package itself or, when their package
//! clause carries the `_test` suffix, to its external test package.

use std::io;
use std::path::{Path, PathBuf};

use conflux_core::validate_import_path;
use conflux_parser::{is_test_file, read_package_clause, SOURCE_EXT, TEST_SUFFIX};
use walkdir::WalkDir;

use crate::error::DiscoveryError;

/// Which files of a package directory to list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileSelection {
    /// Non-test files only
    Production,
    /// Non-test files plus test files of the same package
    ProductionAndTests,
    /// Test files of the `<name>_test` package
    ExternalTests,
}

/// Access to package source files
pub trait BuildContext: Send + Sync {
    /// Files of `import_path` matching `selection`, sorted by file name
    fn package_files(
        &self,
        import_path: &str,
        selection: FileSelection,
    ) -> Result<Vec<PathBuf>, DiscoveryError>;

    fn read_file(&self, path: &Path) -> io::Result<String>;
}

/// Build context over a directory tree: `<root>/<import path>/*.cfx`
#[derive(Debug, Clone)]
pub struct FsContext {
    root: PathBuf,
}

#[derive(Debug, Default)]
struct Listing {
    name: Option<String>,
    production: Vec<PathBuf>,
    tests: Vec<PathBuf>,
    external: Vec<PathBuf>,
}

impl FsContext {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory of `import_path`; paths that would leave the root are
    /// rejected
    pub fn package_dir(&self, import_path: &str) -> Result<PathBuf, DiscoveryError> {
        validate_import_path(import_path).map_err(DiscoveryError::InvalidImportPath)?;
        Ok(self.root.join(import_path))
    }

    fn list(&self, import_path: &str) -> Result<Listing, DiscoveryError> {
        let dir = self.package_dir(import_path)?;
        if !dir.is_dir() {
            return Err(DiscoveryError::NotFound {
                path: import_path.to_string(),
                dir,
            });
        }

        let mut sources = Vec::new();
        for entry in WalkDir::new(&dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
        {
            let entry = entry.map_err(|err| DiscoveryError::Walk {
                dir: dir.clone(),
                message: err.to_string(),
            })?;
            let is_source = entry.file_type().is_file()
                && entry.path().extension().is_some_and(|ext| ext == SOURCE_EXT);
            if is_source {
                sources.push(entry.into_path());
            }
        }
        if sources.is_empty() {
            return Err(DiscoveryError::NoSourceFiles {
                path: import_path.to_string(),
                dir,
            });
        }

        let mut listing = Listing::default();
        let mut test_clauses = Vec::new();
        for path in sources {
            let filename = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let src = self.read_file(&path).map_err(|source| DiscoveryError::Io {
                path: path.clone(),
                source,
            })?;
            // Files without a readable clause are kept; parsing reports them.
            let clause = read_package_clause(&src);

            if is_test_file(&filename) {
                test_clauses.push((path, clause));
                continue;
            }
            if let Some(clause) = clause {
                match &listing.name {
                    Some(first) if *first != clause => {
                        return Err(DiscoveryError::MultiplePackages {
                            dir,
                            first: first.clone(),
                            second: clause,
                        });
                    }
                    Some(_) => {}
                    None => listing.name = Some(clause),
                }
            }
            listing.production.push(path);
        }

        for (path, clause) in test_clauses {
            let external = match (&listing.name, &clause) {
                (Some(name), Some(clause)) => clause.strip_suffix(TEST_SUFFIX) == Some(name.as_str()),
                (None, Some(clause)) => clause.ends_with(TEST_SUFFIX),
                (_, None) => false,
            };
            if external {
                listing.external.push(path);
            } else {
                listing.tests.push(path);
            }
        }
        Ok(listing)
    }
}

impl BuildContext for FsContext {
    fn package_files(
        &self,
        import_path: &str,
        selection: FileSelection,
    ) -> Result<Vec<PathBuf>, DiscoveryError> {
        let listing = self.list(import_path)?;
        tracing::trace!(
            "{}: {} production, {} test, {} external test files",
            import_path,
            listing.production.len(),
            listing.tests.len(),
            listing.external.len()
        );

        let files = match selection {
            FileSelection::Production => listing.production,
            FileSelection::ProductionAndTests => {
                let mut files = listing.production;
                files.extend(listing.tests);
                files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
                files
            }
            FileSelection::ExternalTests => return Ok(listing.external),
        };
        if files.is_empty() {
            return Err(DiscoveryError::NoSourceFiles {
                path: import_path.to_string(),
                dir: self.root.join(import_path),
            });
        }
        Ok(files)
    }

    fn read_file(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn tree(files: &[(&str, &str)]) -> TempDir {
        let dir = TempDir::new().unwrap();
        for (rel, src) in files {
            let path = dir.path().join(rel);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, src).unwrap();
        }
        dir
    }

    fn names(files: &[PathBuf]) -> Vec<String> {
        files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_selections() {
        let dir = tree(&[
            ("fmt/print.cfx", "package fmt\n"),
            ("fmt/format.cfx", "package fmt\n"),
            ("fmt/print_test.cfx", "package fmt\n"),
            ("fmt/example_test.cfx", "// examples\npackage fmt_test\n"),
            ("fmt/notes.txt", "not source"),
        ]);
        let ctx = FsContext::new(dir.path());

        let prod = ctx.package_files("fmt", FileSelection::Production).unwrap();
        assert_eq!(names(&prod), vec!["format.cfx", "print.cfx"]);

        let with_tests = ctx
            .package_files("fmt", FileSelection::ProductionAndTests)
            .unwrap();
        assert_eq!(
            names(&with_tests),
            vec!["format.cfx", "print.cfx", "print_test.cfx"]
        );

        let external = ctx.package_files("fmt", FileSelection::ExternalTests).unwrap();
        assert_eq!(names(&external), vec!["example_test.cfx"]);
    }

    #[test]
    fn test_missing_and_empty_packages() {
        let dir = tree(&[("empty/readme.txt", "nothing here")]);
        let ctx = FsContext::new(dir.path());

        assert!(matches!(
            ctx.package_files("absent", FileSelection::Production),
            Err(DiscoveryError::NotFound { .. })
        ));
        assert!(matches!(
            ctx.package_files("empty", FileSelection::Production),
            Err(DiscoveryError::NoSourceFiles { .. })
        ));
    }

    #[test]
    fn test_conflicting_package_clauses() {
        let dir = tree(&[("mixed/a.cfx", "package a\n"), ("mixed/b.cfx", "package b\n")]);
        let err = FsContext::new(dir.path())
            .package_files("mixed", FileSelection::Production)
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            format!(
                "found packages a and b in {}",
                dir.path().join("mixed").display()
            )
        );
    }

    #[test]
    fn test_import_paths_outside_root_are_rejected() {
        let dir = tree(&[("src/app/app.cfx", "package app\n"), ("outside/o.cfx", "package o\n")]);
        let ctx = FsContext::new(dir.path().join("src"));

        for path in ["../outside", "app/../../outside", "/etc"] {
            let err = ctx.package_files(path, FileSelection::Production).unwrap_err();
            assert!(
                matches!(err, DiscoveryError::InvalidImportPath(_)),
                "{}: {:?}",
                path,
                err
            );
        }
        assert!(ctx.package_files("app", FileSelection::Production).is_ok());
    }

    #[test]
    fn test_external_tests_without_any() {
        let dir = tree(&[("lib/lib.cfx", "package lib\n")]);
        let ctx = FsContext::new(dir.path());
        assert!(ctx
            .package_files("lib", FileSelection::ExternalTests)
            .unwrap()
            .is_empty());
    }
}
