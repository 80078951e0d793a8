//! Ranked size reports and the dot-graph rendering.
//!
//! stdout carries the tables; diagnostics go through tracing to stderr; the
//! dot graph lands in `graph.dot` in the working directory.

use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufWriter, Write};

use tracing::{info, warn};

use crate::analysis::reachability::{self, GarbageReport};
use crate::analysis::{dominators, weights};
use crate::core::object::ObjectId;
use crate::core::program::Program;
use crate::error::Result;

/// How many symbols the transitive-weight ranking prints.
const TOP_WEIGHT_COUNT: usize = 40;
/// Subtrees whose `max_weight` is at or below this are pruned from the dot
/// graph.
const DOT_WEIGHT_CUTOFF: u64 = 30_000;
/// File the dot graph is written to, in the working directory.
const DOT_PATH: &str = "graph.dot";

/// Run the reachability pass and report the counts. Fails without an entry
/// point.
pub fn print_garbage(program: &Program) -> Result<GarbageReport> {
    let report = reachability::collect_garbage(program)?;
    if let Some(files) = &report.garbage_files {
        info!(
            total_files = report.total_files,
            garbage_files = files.len(),
            "file reachability"
        );
    }
    info!(
        total_objects = report.total_objects,
        garbage_objects = report.garbage_objects.len(),
        "object reachability"
    );
    Ok(report)
}

/// Compute dominators and weights, print the top-weight ranking, and write
/// the dot graph.
///
/// Without an entry point the weight pass cannot run; that is reported and
/// the ranking is skipped so the plain size tables can still print.
pub fn print_symbols_by_transitive_weight<W: Write>(
    program: &mut Program,
    out: &mut W,
) -> Result<()> {
    let entry = match program.entry_point() {
        Some(entry) => entry,
        None => {
            warn!("transitive weight ranking requires an entry point; skipping");
            return Ok(());
        }
    };

    let dominators = dominators::immediate_dominators(program, entry);
    weights::calculate_weights(program, &dominators)?;

    let mut ranked: Vec<ObjectId> = program.objects().map(|o| o.id).collect();
    ranked.sort_by(|a, b| program.object(*b).weight.cmp(&program.object(*a).weight));

    for &id in ranked.iter().take(TOP_WEIGHT_COUNT) {
        let obj = program.object(id);
        writeln!(out, " {:7} {}", obj.weight, obj.pretty_name)?;
    }

    let dot = File::create(DOT_PATH)?;
    let mut dot = BufWriter::new(dot);
    write_dot_graph(program, &mut dot)?;
    Ok(())
}

/// Render the heavy part of the reference graph rooted at the entry point.
///
/// Only edges into subtrees above the weight cutoff are drawn. Pen width
/// scales with the target's share of the total weight; font size with the
/// node's share of the total size.
pub fn write_dot_graph<W: Write>(program: &Program, out: &mut W) -> Result<()> {
    writeln!(out, "digraph weights {{")?;
    if let Some(entry) = program.entry_point() {
        let total_size = program.total_size();
        let max_weight = program.max_weight();

        let mut seen = BTreeSet::new();
        seen.insert(entry);
        write_dot_node(program, entry, total_size, out)?;

        let mut stack = vec![(entry, heavy_targets(program, entry), 0usize)];
        while !stack.is_empty() {
            let step = {
                let (v, targets, cursor) = stack.last_mut().expect("stack is non-empty");
                if *cursor < targets.len() {
                    let t = targets[*cursor];
                    *cursor += 1;
                    Some((*v, t))
                } else {
                    None
                }
            };
            match step {
                Some((v, t)) => {
                    let penwidth =
                        (program.object(t).weight as f64 * 100.0 / max_weight as f64).powf(0.6);
                    writeln!(
                        out,
                        "  \"{}\" -> \"{}\" [penwidth={}];",
                        program.object(v).name,
                        program.object(t).name,
                        penwidth
                    )?;
                    if seen.insert(t) {
                        write_dot_node(program, t, total_size, out)?;
                        stack.push((t, heavy_targets(program, t), 0));
                    }
                }
                None => {
                    stack.pop();
                }
            }
        }
    }
    writeln!(out, "}}")?;
    Ok(())
}

fn write_dot_node<W: Write>(
    program: &Program,
    id: ObjectId,
    total_size: u64,
    out: &mut W,
) -> Result<()> {
    let obj = program.object(id);
    let fontsize = (obj.size as f64 * 80000.0 / total_size as f64).max(9.0);
    writeln!(
        out,
        "  \"{}\" [label=\"{}\\nsize: {}\\nweight: {}\", fontsize={}];",
        obj.name, obj.pretty_name, obj.size, obj.weight, fontsize
    )?;
    Ok(())
}

fn heavy_targets(program: &Program, id: ObjectId) -> Vec<ObjectId> {
    program
        .object(id)
        .refs
        .iter()
        .copied()
        .filter(|&t| program.object(t).max_weight > DOT_WEIGHT_CUTOFF)
        .collect()
}

/// All objects sorted by own size, with share and cumulative-share columns.
pub fn print_symbols<W: Write>(program: &Program, out: &mut W) -> Result<()> {
    let total: u64 = program.objects().map(|o| o.size).sum();
    let total_f = total as f64;

    let mut object_list: Vec<ObjectId> = program.objects().map(|o| o.id).collect();
    object_list.sort_by(|a, b| program.object(*b).size.cmp(&program.object(*a).size));

    let mut cumulative = 0u64;
    for &id in &object_list {
        let obj = program.object(id);
        cumulative += obj.size;
        writeln!(
            out,
            "{:5.1}% {:5.1}%  {:6} {}",
            obj.size as f64 / total_f * 100.0,
            cumulative as f64 / total_f * 100.0,
            obj.size,
            obj.pretty_name
        )?;
    }
    writeln!(out, "{:5.1}%  {:6} {}", 100.0, total, "TOTAL")?;
    Ok(())
}

/// All files sorted by source-line weight, same columnar format.
pub fn print_files<W: Write>(program: &Program, out: &mut W) -> Result<()> {
    let total: u64 = program.files().map(|f| f.source_line_weight).sum();
    let total_f = total as f64;

    let mut file_list: Vec<&crate::core::object::File> = program.files().collect();
    file_list.sort_by(|a, b| b.source_line_weight.cmp(&a.source_line_weight));

    let mut cumulative = 0u64;
    for file in &file_list {
        cumulative += file.source_line_weight;
        writeln!(
            out,
            "{:5.1}% {:5.1}%  {:6} {}",
            file.source_line_weight as f64 / total_f * 100.0,
            cumulative as f64 / total_f * 100.0,
            file.source_line_weight,
            file.name
        )?;
    }
    writeln!(out, "{:5.1}%  {:6} {}", 100.0, total, "TOTAL")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::object::TraceConfig;
    use crate::demangle::LibraryDemangler;

    fn program_with(objects: &[(&str, u64)], edges: &[(usize, usize)]) -> (Program, Vec<ObjectId>) {
        let mut p = Program::new(Box::new(LibraryDemangler), TraceConfig::default());
        let ids: Vec<ObjectId> = objects
            .iter()
            .enumerate()
            .map(|(i, (name, size))| {
                p.add_object(name, 0x1000 * (i as u64 + 1), *size, false)
                    .unwrap()
            })
            .collect();
        for &(from, to) in edges {
            p.add_ref(ids[from], ids[to]);
        }
        (p, ids)
    }

    #[test]
    fn test_print_symbols_sorted_with_cumulative_shares() {
        let (p, _) = program_with(&[("small", 100), ("big", 300)], &[]);
        let mut out = Vec::new();
        print_symbols(&p, &mut out).unwrap();

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].contains("big"));
        assert!(lines[0].contains("75.0%"));
        assert!(lines[1].contains("small"));
        assert!(lines[1].contains("25.0%"));
        assert!(lines[1].contains("100.0%"));
        assert!(lines[2].contains("TOTAL"));
        assert!(lines[2].contains("400"));
    }

    #[test]
    fn test_print_files_sorted_by_line_weight() {
        let (mut p, _) = program_with(&[("a", 1)], &[]);
        let fa = p.get_file("a.cc");
        let fb = p.get_file("b.cc");
        p.add_source_line_weight(fa, 10);
        p.add_source_line_weight(fb, 30);

        let mut out = Vec::new();
        print_files(&p, &mut out).unwrap();

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines[0].contains("b.cc"));
        assert!(lines[1].contains("a.cc"));
        assert!(lines[2].contains("TOTAL"));
    }

    #[test]
    fn test_weight_ranking_is_non_increasing_and_capped() {
        let count = 50;
        let objects: Vec<(String, u64)> = (0..count)
            .map(|i| (format!("sym{:02}", i), (i as u64 + 1) * 10))
            .collect();
        let refs: Vec<(&str, u64)> = objects
            .iter()
            .map(|(n, s)| (n.as_str(), *s))
            .collect();
        let (mut p, ids) = program_with(&refs, &[]);
        // Chain them so everything is reachable from the first.
        for window in ids.windows(2) {
            p.add_ref(window[0], window[1]);
        }
        p.set_entry_point(ids[0]);

        let mut out = Vec::new();
        print_symbols_by_transitive_weight(&mut p, &mut out).unwrap();

        let text = String::from_utf8(out).unwrap();
        let weights: Vec<u64> = text
            .lines()
            .map(|l| l.split_whitespace().next().unwrap().parse().unwrap())
            .collect();
        assert_eq!(weights.len(), 40);
        assert!(weights.windows(2).all(|w| w[0] >= w[1]));
    }

    #[test]
    fn test_weight_ranking_without_entry_prints_nothing() {
        let (mut p, _) = program_with(&[("a", 1)], &[]);
        let mut out = Vec::new();
        print_symbols_by_transitive_weight(&mut p, &mut out).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_dot_graph_prunes_light_subtrees() {
        let (mut p, ids) = program_with(
            &[("root", 50_000), ("heavy", 40_000), ("light", 10)],
            &[(0, 1), (0, 2)],
        );
        p.set_entry_point(ids[0]);
        let dominators = dominators::immediate_dominators(&p, ids[0]);
        weights::calculate_weights(&mut p, &dominators).unwrap();

        let mut out = Vec::new();
        write_dot_graph(&p, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.starts_with("digraph weights {"));
        assert!(text.contains("\"root\" -> \"heavy\""));
        assert!(!text.contains("-> \"light\""));
        assert!(text.contains("weight: 40000"));
        assert!(text.trim_end().ends_with('}'));
    }

    #[test]
    fn test_dot_graph_handles_shared_targets_once() {
        let (mut p, ids) = program_with(
            &[("root", 50_000), ("a", 40_000), ("b", 40_000), ("shared", 35_000)],
            &[(0, 1), (0, 2), (1, 3), (2, 3)],
        );
        p.set_entry_point(ids[0]);
        let dominators = dominators::immediate_dominators(&p, ids[0]);
        weights::calculate_weights(&mut p, &dominators).unwrap();

        let mut out = Vec::new();
        write_dot_graph(&p, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();

        // Two edges into the shared node, one node line for it.
        assert_eq!(text.matches("-> \"shared\"").count(), 2);
        assert_eq!(text.matches("\"shared\" [label=").count(), 1);
    }
}
