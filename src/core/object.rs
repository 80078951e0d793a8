//! Object and file records for the program model.
//!
//! An `Object` is one linker symbol (function or data blob) with its address,
//! size, and outgoing references. A `File` is a source file with the
//! file-level image of the object graph.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Dense identifier of an [`Object`].
///
/// Ids start at 1 and are assigned in creation order; 0 is reserved to mean
/// "none" inside the dominator engine's arrays.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct ObjectId(pub u32);

impl ObjectId {
    /// Position of this object in the program's arena.
    pub fn index(self) -> usize {
        self.0 as usize - 1
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Dense identifier of a [`File`], assigned in creation order from 1.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct FileId(pub u32);

impl FileId {
    pub fn index(self) -> usize {
        self.0 as usize - 1
    }
}

/// One linker symbol: a function or a data blob.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Object {
    /// Raw linker symbol; unique within a program.
    pub name: String,
    /// Human-readable label, after demangling and collision resolution.
    pub pretty_name: String,
    pub id: ObjectId,
    /// Virtual address of the symbol's first byte.
    pub vmaddr: u64,
    /// Byte size in the image.
    pub size: u64,
    /// True for data-segment symbols; these are vtable-scan candidates.
    pub data: bool,
    /// Outgoing reference edges, deduplicated.
    pub refs: BTreeSet<ObjectId>,
    pub file: Option<FileId>,
    /// Own size plus every dominated subtree's size. Defaults to the own
    /// size until the weight pass refines it; objects the pass never
    /// reaches keep that default.
    pub weight: u64,
    /// Maximum weight over this object and everything reachable from it
    /// along `refs`. Same default as `weight`.
    pub max_weight: u64,
}

/// A source file associated with zero or more objects.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct File {
    pub name: String,
    /// File-level image of the object reference edges.
    pub refs: BTreeSet<FileId>,
    /// Aggregate line weight supplied by the parser.
    pub source_line_weight: u64,
}

/// Tracing knobs threaded through ingestion and analysis.
///
/// `watch_symbol` names one symbol whose every appearance (creation, edge
/// addition, vtable scan, reachability visit) is traced on stderr; `verbose`
/// turns on per-edge diagnostics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TraceConfig {
    pub watch_symbol: Option<String>,
    pub verbose: bool,
}

impl TraceConfig {
    /// Whether `name` is the watched symbol.
    pub fn watches(&self, name: &str) -> bool {
        self.watch_symbol.as_deref() == Some(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_index_is_zero_based() {
        assert_eq!(ObjectId(1).index(), 0);
        assert_eq!(ObjectId(42).index(), 41);
        assert_eq!(FileId(1).index(), 0);
    }

    #[test]
    fn test_trace_config_watches() {
        let trace = TraceConfig {
            watch_symbol: Some("main".to_string()),
            verbose: false,
        };
        assert!(trace.watches("main"));
        assert!(!trace.watches("other"));
        assert!(!TraceConfig::default().watches("main"));
    }
}
