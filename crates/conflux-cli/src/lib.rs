//! Library interface for the conflux command-line tool

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use conflux_checker::{SymbolFile, SymbolImporter};
use conflux_loader::{PackageInfo, Program};
use serde::Serialize;
use tracing::{debug, info};

/// Serializable view of a loaded program
#[derive(Debug, Serialize)]
pub struct ProgramSummary {
    /// Initial packages, created ones first
    pub initial: Vec<PackageSummary>,
    /// Every package in dependency order
    pub packages: Vec<PackageSummary>,
}

#[derive(Debug, Serialize)]
pub struct PackageSummary {
    pub path: String,
    pub name: String,
    pub importable: bool,
    /// False for packages known only through symbol data
    pub from_source: bool,
    pub files: Vec<String>,
    pub imports: Vec<String>,
    pub exports: Vec<String>,
}

impl PackageSummary {
    pub fn new(info: &PackageInfo) -> Self {
        let mut exports: Vec<String> = info
            .pkg
            .scope()
            .objects()
            .filter(|obj| obj.is_exported())
            .map(|obj| obj.name.clone())
            .collect();
        exports.sort();

        Self {
            path: info.path().to_string(),
            name: info.name().to_string(),
            importable: info.importable,
            from_source: !info.files.is_empty(),
            files: info.files.iter().map(|f| f.name.clone()).collect(),
            imports: info
                .pkg
                .imports()
                .iter()
                .map(|dep| dep.path().to_string())
                .collect(),
            exports,
        }
    }
}

impl ProgramSummary {
    pub fn new(program: &Program) -> Self {
        Self {
            initial: program
                .initial_packages()
                .into_iter()
                .map(|info| PackageSummary::new(info))
                .collect(),
            packages: program
                .dependency_order()
                .iter()
                .map(|info| PackageSummary::new(info))
                .collect(),
        }
    }
}

/// Write symbol data for every importable package loaded from source,
/// laid out as `<out>/<import path>.cfxsym`. Returns the written files.
pub fn export_symbols(program: &Program, out: &Path) -> Result<Vec<PathBuf>> {
    let layout = SymbolImporter::new(out);
    let mut written = Vec::new();
    for info in program.dependency_order() {
        if !info.importable || info.files.is_empty() {
            debug!("skipping {}: nothing to export", info.path());
            continue;
        }

        let target = layout
            .symbol_path(info.path())
            .with_context(|| format!("Refusing to export {}", info.path()))?;
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        SymbolFile::from_package(&info.pkg)
            .write(&target)
            .with_context(|| format!("Failed to export symbols for {}", info.path()))?;
        info!("exported {} to {}", info.path(), target.display());
        written.push(target);
    }
    Ok(written)
}
