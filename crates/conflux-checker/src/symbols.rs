//! Precompiled symbol data
//!
//! A symbol file describes the exported surface of one package as JSON:
//!
//! ```json
//! {
//!   "path": "text/strs",
//!   "name": "strs",
//!   "objects": [
//!     { "name": "Sep", "kind": "const", "type": "string", "value": ", " },
//!     { "name": "Join", "kind": "func",
//!       "type": { "func": { "params": ["string", "string"], "result": "string" } } }
//!   ],
//!   "imports": [ { "path": "text/runes", "name": "runes" } ]
//! }
//! ```
//!
//! Dependencies listed under `imports` are registered as incomplete
//! packages unless the caller's map already holds them.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use conflux_core::{
    validate_import_path, ConstValue, ImportMap, Object, ObjectKind, Package, PackageRef, Pos, Scope, ScopeKind, Type,
};
use serde::{Deserialize, Serialize};

use crate::error::{ImportError, SymbolError};

/// Symbol file extension
pub const SYMBOL_EXT: &str = "cfxsym";

/// Loads packages from precompiled symbol data
pub trait BinaryImporter: Send + Sync {
    /// Return the package for `path`, registering it (and any packages it
    /// mentions) in `packages`
    fn import_package(
        &self,
        packages: &mut ImportMap,
        path: &str,
    ) -> Result<PackageRef, ImportError>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolFile {
    pub path: String,
    pub name: String,
    #[serde(default)]
    pub objects: Vec<SymbolObject>,
    #[serde(default)]
    pub imports: Vec<SymbolImport>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolObject {
    pub name: String,
    pub kind: ObjectKind,
    #[serde(rename = "type")]
    pub ty: Type,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<ConstValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolImport {
    pub path: String,
    pub name: String,
}

impl SymbolFile {
    /// Export the exported objects of a checked package
    pub fn from_package(pkg: &Package) -> Self {
        Self {
            path: pkg.path().to_string(),
            name: pkg.name().to_string(),
            objects: pkg
                .scope()
                .objects()
                .filter(|obj| obj.is_exported())
                .map(|obj| SymbolObject {
                    name: obj.name.clone(),
                    kind: obj.kind,
                    ty: obj.ty.clone(),
                    value: obj.value.clone(),
                })
                .collect(),
            imports: pkg
                .imports()
                .iter()
                .map(|dep| SymbolImport {
                    path: dep.path().to_string(),
                    name: dep.name().to_string(),
                })
                .collect(),
        }
    }

    pub fn read(path: &Path) -> Result<Self, SymbolError> {
        let data = std::fs::read_to_string(path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                SymbolError::NotFound {
                    path: path.to_path_buf(),
                }
            } else {
                SymbolError::Io {
                    path: path.to_path_buf(),
                    source,
                }
            }
        })?;
        serde_json::from_str(&data).map_err(|source| SymbolError::Json {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn write(&self, path: &Path) -> Result<(), SymbolError> {
        let data = serde_json::to_string_pretty(self).map_err(|source| SymbolError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        std::fs::write(path, data).map_err(|source| SymbolError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Build the package handle, registering it and its dependencies in `packages`
    pub fn install(self, packages: &mut ImportMap) -> PackageRef {
        let imports = self
            .imports
            .iter()
            .map(|dep| {
                packages
                    .entry(dep.path.clone())
                    .or_insert_with(|| {
                        PackageRef::new(Package::incomplete(dep.path.clone(), dep.name.clone()))
                    })
                    .clone()
            })
            .collect();

        let mut scope = Scope::new(ScopeKind::Package);
        for sym in self.objects {
            let mut obj = Object::new(sym.name, sym.kind, sym.ty, Pos::NONE).in_package(&self.path);
            obj.value = sym.value;
            scope.replace(Arc::new(obj));
        }

        let pkg = PackageRef::new(Package::new(self.path.clone(), self.name, scope, imports));
        packages.insert(self.path, pkg.clone());
        pkg
    }
}

/// Reads `<root>/<import path>.cfxsym` files
#[derive(Debug, Clone)]
pub struct SymbolImporter {
    root: PathBuf,
}

impl SymbolImporter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Location of the symbol file for `path`; paths that would leave the
    /// root are rejected
    pub fn symbol_path(&self, path: &str) -> Result<PathBuf, SymbolError> {
        validate_import_path(path).map_err(SymbolError::InvalidImportPath)?;
        Ok(self.root.join(format!("{}.{}", path, SYMBOL_EXT)))
    }

    fn load(&self, packages: &mut ImportMap, path: &str) -> Result<PackageRef, SymbolError> {
        let file = SymbolFile::read(&self.symbol_path(path)?)?;
        if file.path != path {
            return Err(SymbolError::PathMismatch {
                expected: path.to_string(),
                found: file.path,
            });
        }
        Ok(file.install(packages))
    }
}

impl BinaryImporter for SymbolImporter {
    fn import_package(
        &self,
        packages: &mut ImportMap,
        path: &str,
    ) -> Result<PackageRef, ImportError> {
        if let Some(pkg) = packages.get(path).filter(|pkg| pkg.is_complete()) {
            tracing::trace!("symbol data for {} already loaded", path);
            return Ok(pkg.clone());
        }

        tracing::debug!("reading symbol data for {}", path);
        self.load(packages, path)
            .map_err(|err| ImportError::Binary {
                path: path.to_string(),
                reason: err.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conflux_core::Signature;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    const STRS: &str = r#"{
        "path": "text/strs",
        "name": "strs",
        "objects": [
            { "name": "Sep", "kind": "const", "type": "string", "value": ", " },
            { "name": "Join", "kind": "func",
              "type": { "func": { "params": ["string", "string"], "result": "string" } } }
        ],
        "imports": [ { "path": "text/runes", "name": "runes" } ]
    }"#;

    fn write_symbols(dir: &TempDir, rel: &str, json: &str) {
        let path = dir.path().join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, json).unwrap();
    }

    #[test]
    fn test_import_registers_package_and_dependencies() {
        let dir = TempDir::new().unwrap();
        write_symbols(&dir, "text/strs.cfxsym", STRS);

        let importer = SymbolImporter::new(dir.path());
        let mut packages = ImportMap::new();
        let pkg = importer.import_package(&mut packages, "text/strs").unwrap();

        assert_eq!(pkg.name(), "strs");
        assert!(pkg.is_complete());
        assert_eq!(
            packages.keys().cloned().collect::<Vec<_>>(),
            vec!["text/runes".to_string(), "text/strs".to_string()]
        );
        assert!(!packages["text/runes"].is_complete());
        assert!(PackageRef::ptr_eq(&pkg.imports()[0], &packages["text/runes"]));

        let join = pkg.scope().lookup("Join").unwrap();
        assert_eq!(
            join.ty,
            Type::Func(Signature {
                params: vec![Type::String, Type::String],
                result: Some(Box::new(Type::String)),
            })
        );
        let sep = pkg.scope().lookup("Sep").unwrap();
        assert_eq!(sep.value, Some(ConstValue::Str(", ".to_string())));
        assert_eq!(sep.pkg.as_deref(), Some("text/strs"));

        // A second import returns the registered handle
        let again = importer.import_package(&mut packages, "text/strs").unwrap();
        assert!(PackageRef::ptr_eq(&pkg, &again));
    }

    #[test]
    fn test_missing_and_mismatched_symbol_data() {
        let dir = TempDir::new().unwrap();
        write_symbols(&dir, "other.cfxsym", STRS);
        let importer = SymbolImporter::new(dir.path());
        let mut packages = ImportMap::new();

        let err = importer.import_package(&mut packages, "absent").unwrap_err();
        assert!(matches!(err, ImportError::Binary { ref path, .. } if path == "absent"));
        assert!(err.to_string().contains("no symbol data"));

        let err = importer.import_package(&mut packages, "other").unwrap_err();
        assert!(err
            .to_string()
            .contains("symbol data describes package text/strs, expected other"));
        assert!(packages.is_empty());
    }

    #[test]
    fn test_symbol_paths_stay_below_root() {
        let dir = TempDir::new().unwrap();
        write_symbols(&dir, "outside.cfxsym", STRS);
        let importer = SymbolImporter::new(dir.path().join("symbols"));
        let mut packages = ImportMap::new();

        assert!(matches!(
            importer.symbol_path("../outside"),
            Err(SymbolError::InvalidImportPath(_))
        ));
        let err = importer.import_package(&mut packages, "../outside").unwrap_err();
        assert!(err.to_string().contains("invalid import path"), "{}", err);
        assert_eq!(
            importer.symbol_path("text/strs").unwrap(),
            dir.path().join("symbols").join("text/strs.cfxsym")
        );
    }

    #[test]
    fn test_export_skips_unexported_objects() {
        let mut scope = Scope::new(ScopeKind::Package);
        scope.replace(Arc::new(Object::new("Max", ObjectKind::Const, Type::Int, Pos::NONE)
            .with_value(ConstValue::Int(9))));
        scope.replace(Arc::new(Object::new("min", ObjectKind::Const, Type::Int, Pos::NONE)));
        let pkg = Package::new("num", "num", scope, Vec::new());

        let file = SymbolFile::from_package(&pkg);
        assert_eq!(file.objects.len(), 1);
        assert_eq!(file.objects[0].name, "Max");

        let json = serde_json::to_value(&file).unwrap();
        assert_eq!(json["objects"][0]["type"], "int");
        assert_eq!(json["objects"][0]["value"], 9);

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("num.cfxsym");
        file.write(&path).unwrap();
        assert_eq!(SymbolFile::read(&path).unwrap(), file);
    }
}
