//! Reachability ("garbage") analysis from the entry point.
//!
//! Every object starts in the garbage set and is removed when the traversal
//! first reaches it; the removal doubles as the visited mark, so cycles
//! terminate. Whatever survives was never reachable.

use std::collections::BTreeSet;

use crate::core::object::{FileId, ObjectId};
use crate::core::program::Program;
use crate::error::{Error, Result};

/// What the garbage pass found.
#[derive(Debug, Clone)]
pub struct GarbageReport {
    pub total_objects: usize,
    /// Objects never reached from the entry point.
    pub garbage_objects: BTreeSet<ObjectId>,
    pub total_files: usize,
    /// Files never reached from the entry object's file; `None` when the
    /// entry object has no file association.
    pub garbage_files: Option<BTreeSet<FileId>>,
}

/// Walk the reference graph from the entry point and report what was never
/// visited. Fails when no entry point has been set.
pub fn collect_garbage(program: &Program) -> Result<GarbageReport> {
    let entry = program.entry_point().ok_or(Error::MissingEntryPoint)?;

    let mut garbage: BTreeSet<ObjectId> = program.objects().map(|o| o.id).collect();
    mark_objects(program, entry, &mut garbage);

    let garbage_files = program.object(entry).file.map(|entry_file| {
        let mut files: BTreeSet<FileId> = program.file_ids().collect();
        mark_files(program, entry_file, &mut files);
        files
    });

    Ok(GarbageReport {
        total_objects: program.object_count(),
        garbage_objects: garbage,
        total_files: program.file_count(),
        garbage_files,
    })
}

/// Depth-first marking with an explicit stack; the stack holds the current
/// traversal path, which is exactly what the watch trace prints.
fn mark_objects(program: &Program, entry: ObjectId, garbage: &mut BTreeSet<ObjectId>) {
    if !garbage.remove(&entry) {
        return;
    }
    let mut stack: Vec<(ObjectId, Vec<ObjectId>, usize)> =
        vec![(entry, successors(program, entry), 0)];
    maybe_trace_path(program, &stack);

    while !stack.is_empty() {
        let step = {
            let (_, succ, cursor) = stack.last_mut().expect("stack is non-empty");
            if *cursor < succ.len() {
                let child = succ[*cursor];
                *cursor += 1;
                Some(child)
            } else {
                None
            }
        };
        match step {
            Some(child) => {
                if garbage.remove(&child) {
                    stack.push((child, successors(program, child), 0));
                    maybe_trace_path(program, &stack);
                }
            }
            None => {
                stack.pop();
            }
        }
    }
}

fn mark_files(program: &Program, entry: FileId, garbage: &mut BTreeSet<FileId>) {
    if !garbage.remove(&entry) {
        return;
    }
    let mut stack = vec![entry];
    while let Some(file) = stack.pop() {
        for &child in &program.file(file).refs {
            if garbage.remove(&child) {
                stack.push(child);
            }
        }
    }
}

fn successors(program: &Program, id: ObjectId) -> Vec<ObjectId> {
    program.object(id).refs.iter().copied().collect()
}

/// When the object just reached is the watched symbol, dump the whole path
/// that led here, indented one step per frame.
fn maybe_trace_path(program: &Program, path: &[(ObjectId, Vec<ObjectId>, usize)]) {
    let (last, _, _) = path.last().expect("path is non-empty");
    if !program.trace().watches(&program.object(*last).name) {
        return;
    }
    let mut indent = String::new();
    for (id, _, _) in path {
        indent.push_str("  ");
        eprintln!("{}-> {}", indent, program.object(*id).name);
    }
}
