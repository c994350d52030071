//! Result of a whole-program load

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use conflux_checker::TypeError;
use conflux_core::ast::SourceFile;
use conflux_core::{FileSet, ImportMap, PackageRef, Pos, TypeInfo};
use indexmap::IndexMap;
use petgraph::algo::toposort;
use petgraph::graph::DiGraph;

/// One constructed package: its syntax, its type information and its
/// handle in the type system
#[derive(Debug)]
pub struct PackageInfo {
    pub pkg: PackageRef,
    /// Syntax trees, in the order the checker saw them; empty for packages
    /// loaded from symbol data
    pub files: Vec<SourceFile>,
    pub info: TypeInfo,
    /// False for ad-hoc packages built from explicit file lists
    pub importable: bool,
    pub(crate) error: Option<TypeError>,
}

impl PackageInfo {
    pub(crate) fn from_source(
        pkg: PackageRef,
        files: Vec<SourceFile>,
        info: TypeInfo,
        importable: bool,
        error: Option<TypeError>,
    ) -> Self {
        Self {
            pkg,
            files,
            info,
            importable,
            error,
        }
    }

    /// Package known only through its handle, e.g. from symbol data
    pub(crate) fn from_handle(pkg: PackageRef) -> Self {
        Self {
            pkg,
            files: Vec::new(),
            info: TypeInfo::new(),
            importable: true,
            error: None,
        }
    }

    /// First diagnostic reported while checking this package
    pub fn error(&self) -> Option<&TypeError> {
        self.error.as_ref()
    }

    pub fn name(&self) -> &str {
        self.pkg.name()
    }

    pub fn path(&self) -> &str {
        self.pkg.path()
    }
}

impl fmt::Display for PackageInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.pkg.path())
    }
}

/// All packages reachable from the initial ones, type checked
pub struct Program {
    pub fset: Arc<FileSet>,
    /// Ad-hoc packages, in configuration order
    pub created: Vec<Arc<PackageInfo>>,
    /// Initial packages loaded by import path, in configuration order
    pub imported: IndexMap<String, Arc<PackageInfo>>,
    /// Canonical path to package mapping used during the load
    pub import_map: ImportMap,
    /// Every package seen, initial or not
    pub all_packages: HashMap<PackageRef, Arc<PackageInfo>>,
}

impl Program {
    /// Created packages followed by imported ones
    pub fn initial_packages(&self) -> Vec<&Arc<PackageInfo>> {
        self.created.iter().chain(self.imported.values()).collect()
    }

    /// Importable package for `path`
    pub fn package(&self, path: &str) -> Option<&Arc<PackageInfo>> {
        self.import_map
            .get(path)
            .and_then(|pkg| self.all_packages.get(pkg))
    }

    /// Package and file whose source range covers `pos`
    pub fn file_containing(&self, pos: Pos) -> Option<(&Arc<PackageInfo>, &SourceFile)> {
        self.all_packages.values().find_map(|info| {
            info.files
                .iter()
                .find(|file| file.pos <= pos && pos <= file.end)
                .map(|file| (info, file))
        })
    }

    /// Packages ordered so that each one follows everything it imports
    pub fn dependency_order(&self) -> Vec<Arc<PackageInfo>> {
        let mut infos: Vec<&Arc<PackageInfo>> = self.all_packages.values().collect();
        infos.sort_by(|a, b| a.path().cmp(b.path()).then(a.importable.cmp(&b.importable)));

        let mut graph = DiGraph::<Arc<PackageInfo>, ()>::new();
        let mut nodes = HashMap::new();
        for info in &infos {
            nodes.insert(info.pkg.clone(), graph.add_node(Arc::clone(info)));
        }
        for info in &infos {
            for dep in info.pkg.imports() {
                let dep = canonical(&self.import_map, dep);
                if let (Some(&from), Some(&to)) = (nodes.get(dep), nodes.get(&info.pkg)) {
                    graph.add_edge(from, to, ());
                }
            }
        }

        match toposort(&graph, None) {
            Ok(sorted) => sorted.into_iter().map(|idx| graph[idx].clone()).collect(),
            Err(cycle) => {
                tracing::warn!(
                    "import graph has a cycle through {}; using path order",
                    graph[cycle.node_id()].path()
                );
                infos.into_iter().cloned().collect()
            }
        }
    }
}

/// The handle `import_map` holds for `pkg`'s path, or `pkg` itself when the
/// path is unmapped. Symbol data can leave packages pointing at a
/// placeholder that a complete handle later replaced.
pub(crate) fn canonical<'a>(import_map: &'a ImportMap, pkg: &'a PackageRef) -> &'a PackageRef {
    import_map.get(pkg.path()).unwrap_or(pkg)
}

impl fmt::Debug for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut paths: Vec<_> = self.all_packages.values().map(|i| i.path()).collect();
        paths.sort_unstable();
        f.debug_struct("Program")
            .field("created", &self.created.iter().map(|i| i.path()).collect::<Vec<_>>())
            .field("imported", &self.imported.keys().collect::<Vec<_>>())
            .field("all_packages", &paths)
            .finish()
    }
}
