//! File set and source positions
//!
//! Every file parsed during a load is registered in one shared [`FileSet`].
//! Each file occupies a disjoint range of global offsets, so a single
//! [`Pos`] identifies both the file and the byte offset inside it. The set
//! also hands out syntax node identifiers, which keeps them unique across
//! every file of a program.

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::ast::NodeId;
use crate::error::CoreError;

/// A global position within a [`FileSet`]. `Pos::NONE` means "no position".
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct Pos(u32);

impl Pos {
    pub const NONE: Pos = Pos(0);

    pub fn new(raw: u32) -> Self {
        Pos(raw)
    }

    pub fn raw(self) -> u32 {
        self.0
    }

    pub fn is_valid(self) -> bool {
        self.0 != 0
    }
}

/// A resolved, human-readable source location
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub filename: String,
    /// 1-based line number
    pub line: u32,
    /// 1-based column, in bytes
    pub column: u32,
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.filename, self.line, self.column)
    }
}

/// Offsets and line table for one registered file
#[derive(Debug)]
pub struct SourceMap {
    name: String,
    base: u32,
    size: u32,
    line_starts: Vec<u32>,
}

impl SourceMap {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn base(&self) -> u32 {
        self.base
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    /// Global position of a byte offset inside this file
    pub fn pos(&self, offset: usize) -> Pos {
        let offset = (offset as u32).min(self.size);
        Pos(self.base + offset)
    }

    /// Whether `pos` falls inside this file (the end-of-file position included)
    pub fn contains(&self, pos: Pos) -> bool {
        pos.0 >= self.base && pos.0 <= self.base + self.size
    }

    pub fn position(&self, pos: Pos) -> Position {
        let offset = pos.0.saturating_sub(self.base);
        let line_idx = match self.line_starts.binary_search(&offset) {
            Ok(idx) => idx,
            Err(idx) => idx - 1,
        };
        Position {
            filename: self.name.clone(),
            line: line_idx as u32 + 1,
            column: offset - self.line_starts[line_idx] + 1,
        }
    }
}

#[derive(Debug)]
struct Files {
    next_base: u32,
    files: Vec<Arc<SourceMap>>,
}

/// Registry of all source files seen during a load
#[derive(Debug)]
pub struct FileSet {
    files: RwLock<Files>,
    next_node: AtomicU32,
}

impl Default for FileSet {
    fn default() -> Self {
        Self::new()
    }
}

impl FileSet {
    pub fn new() -> Self {
        Self {
            files: RwLock::new(Files {
                next_base: 1,
                files: Vec::new(),
            }),
            next_node: AtomicU32::new(0),
        }
    }

    /// Register a file and return its source map. Positions of the new file
    /// start at the current base of the set. Fails once the set's offset
    /// space is exhausted.
    pub fn add_file(&self, name: &str, src: &str) -> Result<Arc<SourceMap>, CoreError> {
        let full = || CoreError::FileSetFull(name.to_string());
        let size = u32::try_from(src.len()).map_err(|_| full())?;

        let mut files = self.files.write();
        let base = files.next_base;
        // One extra offset so that end-of-file positions stay distinct.
        let next_base = base
            .checked_add(size)
            .and_then(|end| end.checked_add(1))
            .ok_or_else(full)?;

        let mut line_starts = vec![0u32];
        line_starts.extend(
            src.bytes()
                .enumerate()
                .filter(|(_, b)| *b == b'\n')
                .map(|(i, _)| i as u32 + 1),
        );
        let map = Arc::new(SourceMap {
            name: name.to_string(),
            base,
            size,
            line_starts,
        });
        files.next_base = next_base;
        files.files.push(map.clone());
        Ok(map)
    }

    /// Find the file containing `pos`
    pub fn file(&self, pos: Pos) -> Option<Arc<SourceMap>> {
        if !pos.is_valid() {
            return None;
        }
        let files = self.files.read();
        let idx = files.files.partition_point(|f| f.base <= pos.0);
        idx.checked_sub(1)
            .map(|i| files.files[i].clone())
            .filter(|f| f.contains(pos))
    }

    pub fn position(&self, pos: Pos) -> Result<Position, CoreError> {
        self.file(pos)
            .map(|f| f.position(pos))
            .ok_or(CoreError::PositionOutOfRange(pos))
    }

    pub fn file_count(&self) -> usize {
        self.files.read().files.len()
    }

    /// Allocate a fresh syntax node identifier
    pub fn next_node_id(&self) -> NodeId {
        NodeId::new(self.next_node.fetch_add(1, Ordering::Relaxed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_positions_across_files() {
        let fset = FileSet::new();
        let a = fset.add_file("a.cfx", "package a\nconst X = 1\n").unwrap();
        let b = fset.add_file("b.cfx", "package a\n").unwrap();

        assert!(b.base() > a.base() + a.size());

        let pos = a.pos(10);
        assert_eq!(
            fset.position(pos).unwrap(),
            Position {
                filename: "a.cfx".to_string(),
                line: 2,
                column: 1,
            }
        );

        let pos = b.pos(8);
        assert_eq!(fset.position(pos).unwrap().to_string(), "b.cfx:1:9");
    }

    #[test]
    fn test_no_position() {
        let fset = FileSet::new();
        fset.add_file("a.cfx", "package a").unwrap();
        assert!(fset.file(Pos::NONE).is_none());
        assert!(matches!(
            fset.position(Pos::new(10_000)),
            Err(CoreError::PositionOutOfRange(_))
        ));
    }

    #[test]
    fn test_exhausted_offset_space() {
        let fset = FileSet::new();
        fset.files.write().next_base = u32::MAX - 8;
        let err = fset.add_file("fits.cfx", "package a").unwrap_err();
        assert_eq!(err, CoreError::FileSetFull("fits.cfx".to_string()));

        fset.files.write().next_base = u32::MAX - 16;
        let fits = fset.add_file("fits.cfx", "package a").unwrap();
        assert_eq!(fits.base(), u32::MAX - 16);
        assert!(matches!(
            fset.add_file("next.cfx", "package b"),
            Err(CoreError::FileSetFull(ref name)) if name == "next.cfx"
        ));
        assert_eq!(fset.file_count(), 1);
    }

    #[test]
    fn test_node_ids_are_unique() {
        let fset = FileSet::new();
        let first = fset.next_node_id();
        let second = fset.next_node_id();
        assert_ne!(first, second);
    }

    proptest::proptest! {
        #[test]
        fn prop_every_offset_maps_back_to_its_file(src in "[a-z\n ]{0,64}", offset in 0usize..64) {
            let fset = FileSet::new();
            fset.add_file("lead.cfx", "package lead\n").unwrap();
            let map = fset.add_file("p.cfx", &src).unwrap();
            let pos = map.pos(offset);
            let found = fset.file(pos).expect("position inside file");
            proptest::prop_assert_eq!(found.name(), "p.cfx");
            let position = found.position(pos);
            proptest::prop_assert!(position.line as usize <= map.line_count());
        }
    }
}
