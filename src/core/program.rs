//! The in-memory program model.
//!
//! `Program` owns every object and file discovered in one binary, the
//! address → object index, and the per-segment file-offset table. It
//! mediates edge insertion and pretty-name resolution during ingestion and
//! becomes read-only once analysis starts.

use std::collections::{BTreeSet, HashMap};

use tracing::debug;

use crate::core::object::{File, FileId, Object, ObjectId, TraceConfig};
use crate::core::range_map::RangeMap;
use crate::demangle::{strip_params, Demangler};
use crate::error::Result;

/// The narrow facade the symbol/disassembly parser drives.
///
/// Handles are dense ids, valid for the lifetime of the program they came
/// from.
pub trait ProgramSink {
    fn add_object(&mut self, name: &str, vmaddr: u64, size: u64, data: bool) -> Result<ObjectId>;
    fn find_object_by_name(&self, name: &str) -> Option<ObjectId>;
    fn find_object_by_addr(&self, vmaddr: u64) -> Option<ObjectId>;
    fn add_ref(&mut self, from: ObjectId, to: ObjectId);
    fn try_add_ref(&mut self, from: Option<ObjectId>, vmaddr: u64);
    fn set_entry_point(&mut self, obj: ObjectId);
    fn add_file_mapping(&mut self, vmaddr: u64, fileoff: u64, filesize: u64);
    fn get_file(&mut self, name: &str) -> FileId;
    fn attach_file(&mut self, obj: ObjectId, file: FileId);
    fn object_file(&self, obj: ObjectId) -> Option<FileId>;
    fn add_source_line_weight(&mut self, file: FileId, lines: u64);
}

/// Container for one binary's objects, files, and lookup indices.
pub struct Program {
    objects: Vec<Object>,
    by_name: HashMap<String, ObjectId>,
    files: Vec<File>,
    files_by_name: HashMap<String, FileId>,
    objects_by_addr: RangeMap<ObjectId>,
    /// Per-segment `vmaddr - fileoff` deltas keyed by segment range.
    file_offsets: RangeMap<u64>,
    /// Stripped pretty name → first claimant. A `None` slot means the name
    /// already collided and later claimants keep their full form.
    stripped_pretty_names: HashMap<String, Option<ObjectId>>,
    entry: Option<ObjectId>,
    total_size: u64,
    max_weight: u64,
    demangler: Box<dyn Demangler>,
    trace: TraceConfig,
}

impl Program {
    pub fn new(demangler: Box<dyn Demangler>, trace: TraceConfig) -> Self {
        Self {
            objects: Vec::new(),
            by_name: HashMap::new(),
            files: Vec::new(),
            files_by_name: HashMap::new(),
            objects_by_addr: RangeMap::new(),
            file_offsets: RangeMap::new(),
            stripped_pretty_names: HashMap::new(),
            entry: None,
            total_size: 0,
            max_weight: 0,
            demangler,
            trace,
        }
    }

    /// Register one symbol.
    ///
    /// A name seen before keeps its id; the address fields are overwritten
    /// and `total_size` tracks the delta. Pretty-name resolution runs on
    /// every registration: the first symbol to claim a stripped form owns
    /// it until a second claimant appears, at which point both (and every
    /// later claimant) fall back to their full demangled form.
    pub fn add_object(
        &mut self,
        name: &str,
        vmaddr: u64,
        size: u64,
        data: bool,
    ) -> Result<ObjectId> {
        if self.trace.watches(name) {
            eprintln!("Adding object {} addr={:#x}, size={:#x}", name, vmaddr, size);
        }

        let id = match self.by_name.get(name) {
            Some(&id) => {
                let obj = &mut self.objects[id.index()];
                self.total_size = self.total_size - obj.size + size;
                obj.vmaddr = vmaddr;
                obj.size = size;
                obj.data = data;
                obj.weight = size;
                obj.max_weight = size;
                id
            }
            None => {
                let id = ObjectId(self.objects.len() as u32 + 1);
                self.objects.push(Object {
                    name: name.to_string(),
                    pretty_name: String::new(),
                    id,
                    vmaddr,
                    size,
                    data,
                    refs: BTreeSet::new(),
                    file: None,
                    // Until the weight pass runs (and for objects it never
                    // reaches), an object's weight is its own size.
                    weight: size,
                    max_weight: size,
                });
                self.by_name.insert(name.to_string(), id);
                self.total_size += size;
                id
            }
        };
        self.objects_by_addr.add(vmaddr, size, id);

        let demangled = self.demangler.demangle(name)?;
        match strip_params(&demangled) {
            Some(stripped) => {
                if self.stripped_pretty_names.contains_key(stripped) {
                    // Collision: this overload keeps its full form, and the
                    // prior claimant (if still recorded) is re-demangled to
                    // its full form too.
                    self.objects[id.index()].pretty_name = demangled.clone();
                    let prior = self
                        .stripped_pretty_names
                        .get_mut(stripped)
                        .and_then(Option::take);
                    if let Some(prior) = prior {
                        let prior_name = self.objects[prior.index()].name.clone();
                        let full = self.demangler.demangle(&prior_name)?;
                        self.objects[prior.index()].pretty_name = full;
                    }
                } else {
                    self.stripped_pretty_names
                        .insert(stripped.to_string(), Some(id));
                    self.objects[id.index()].pretty_name = stripped.to_string();
                }
            }
            None => self.objects[id.index()].pretty_name = demangled,
        }

        Ok(id)
    }

    /// Record that `[vmaddr, vmaddr + filesize)` is backed by the file range
    /// starting at `fileoff`.
    ///
    /// The stored delta wraps when `fileoff > vmaddr`; the subtraction in
    /// [`try_get_file_offset`](Self::try_get_file_offset) wraps back.
    pub fn add_file_mapping(&mut self, vmaddr: u64, fileoff: u64, filesize: u64) {
        self.file_offsets
            .add(vmaddr, filesize, vmaddr.wrapping_sub(fileoff));
    }

    /// File offset backing `vmaddr`, if any segment covers it.
    pub fn try_get_file_offset(&self, vmaddr: u64) -> Option<u64> {
        self.file_offsets
            .try_get(vmaddr)
            .map(|diff| vmaddr.wrapping_sub(diff))
    }

    pub fn set_entry_point(&mut self, obj: ObjectId) {
        self.entry = Some(obj);
    }

    pub fn entry_point(&self) -> Option<ObjectId> {
        self.entry
    }

    /// Add an edge `from → vmaddr` when the address resolves to a known
    /// object; otherwise ignore the datum.
    pub fn try_add_ref(&mut self, from: Option<ObjectId>, vmaddr: u64) {
        let Some(from) = from else { return };
        let Some(to) = self.objects_by_addr.try_get(vmaddr) else {
            return;
        };
        if self.trace.verbose {
            eprintln!(
                "Added ref! {} -> {}",
                self.objects[from.index()].name,
                self.objects[to.index()].name
            );
        }
        self.insert_ref(from, to);
    }

    /// Direct edge insertion for resolved targets.
    pub fn add_ref(&mut self, from: ObjectId, to: ObjectId) {
        if self.trace.watches(&self.objects[from.index()].name) {
            eprintln!(
                "  Add ref from {} to {}",
                self.objects[from.index()].name,
                self.objects[to.index()].name
            );
        }
        self.insert_ref(from, to);
    }

    fn insert_ref(&mut self, from: ObjectId, to: ObjectId) {
        self.objects[from.index()].refs.insert(to);
        let from_file = self.objects[from.index()].file;
        let to_file = self.objects[to.index()].file;
        if let (Some(ff), Some(tf)) = (from_file, to_file) {
            self.files[ff.index()].refs.insert(tf);
        }
    }

    /// Get or create the file record for `name`.
    pub fn get_file(&mut self, name: &str) -> FileId {
        if let Some(&id) = self.files_by_name.get(name) {
            return id;
        }
        let id = FileId(self.files.len() as u32 + 1);
        self.files.push(File {
            name: name.to_string(),
            refs: BTreeSet::new(),
            source_line_weight: 0,
        });
        self.files_by_name.insert(name.to_string(), id);
        debug!(file = name, "new source file");
        id
    }

    pub fn attach_file(&mut self, obj: ObjectId, file: FileId) {
        self.objects[obj.index()].file = Some(file);
    }

    pub fn add_source_line_weight(&mut self, file: FileId, lines: u64) {
        self.files[file.index()].source_line_weight += lines;
    }

    pub fn find_object_by_name(&self, name: &str) -> Option<ObjectId> {
        self.by_name.get(name).copied()
    }

    pub fn find_object_by_addr(&self, vmaddr: u64) -> Option<ObjectId> {
        self.objects_by_addr.try_get(vmaddr)
    }

    pub fn object(&self, id: ObjectId) -> &Object {
        &self.objects[id.index()]
    }

    pub(crate) fn object_mut(&mut self, id: ObjectId) -> &mut Object {
        &mut self.objects[id.index()]
    }

    pub fn objects(&self) -> impl Iterator<Item = &Object> {
        self.objects.iter()
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    /// The next id that would be assigned; dominator arrays are sized by
    /// this so ids index them directly.
    pub fn next_id(&self) -> u32 {
        self.objects.len() as u32 + 1
    }

    pub fn file(&self, id: FileId) -> &File {
        &self.files[id.index()]
    }

    pub fn files(&self) -> impl Iterator<Item = &File> {
        self.files.iter()
    }

    pub fn file_ids(&self) -> impl Iterator<Item = FileId> {
        (1..=self.files.len() as u32).map(FileId)
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    pub fn has_files(&self) -> bool {
        !self.files.is_empty()
    }

    /// Sum of every object's size.
    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    /// The entry object's `max_weight`, recorded by the weight pass.
    pub fn max_weight(&self) -> u64 {
        self.max_weight
    }

    pub(crate) fn set_max_weight(&mut self, max_weight: u64) {
        self.max_weight = max_weight;
    }

    pub fn trace(&self) -> &TraceConfig {
        &self.trace
    }

    /// Toggle per-edge diagnostics; the vtable scanner raises this while
    /// walking a watched object.
    pub fn set_verbose(&mut self, verbose: bool) {
        self.trace.verbose = verbose;
    }
}

impl ProgramSink for Program {
    fn add_object(&mut self, name: &str, vmaddr: u64, size: u64, data: bool) -> Result<ObjectId> {
        Program::add_object(self, name, vmaddr, size, data)
    }

    fn find_object_by_name(&self, name: &str) -> Option<ObjectId> {
        Program::find_object_by_name(self, name)
    }

    fn find_object_by_addr(&self, vmaddr: u64) -> Option<ObjectId> {
        Program::find_object_by_addr(self, vmaddr)
    }

    fn add_ref(&mut self, from: ObjectId, to: ObjectId) {
        Program::add_ref(self, from, to)
    }

    fn try_add_ref(&mut self, from: Option<ObjectId>, vmaddr: u64) {
        Program::try_add_ref(self, from, vmaddr)
    }

    fn set_entry_point(&mut self, obj: ObjectId) {
        Program::set_entry_point(self, obj)
    }

    fn add_file_mapping(&mut self, vmaddr: u64, fileoff: u64, filesize: u64) {
        Program::add_file_mapping(self, vmaddr, fileoff, filesize)
    }

    fn get_file(&mut self, name: &str) -> FileId {
        Program::get_file(self, name)
    }

    fn attach_file(&mut self, obj: ObjectId, file: FileId) {
        Program::attach_file(self, obj, file)
    }

    fn object_file(&self, obj: ObjectId) -> Option<FileId> {
        self.object(obj).file
    }

    fn add_source_line_weight(&mut self, file: FileId, lines: u64) {
        Program::add_source_line_weight(self, file, lines)
    }
}
