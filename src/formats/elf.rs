//! ELF ingestion: symbols, file mappings, and disassembly-derived edges.
//!
//! Symbols and loadable segments come from the `object` parser. Reference
//! edges come from an external `objdump -d -l` child read line by line:
//! function headers select the current source object, `<symbol>` operands
//! become direct edges, resolved address comments become address edges, and
//! `file:line` markers attach source files.

use std::io::{BufRead, BufReader};
use std::path::Path;
use std::process::{Command, Stdio};

use object::{ObjectSegment, ObjectSymbol, SymbolKind};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

use crate::core::object::ObjectId;
use crate::core::program::ProgramSink;
use crate::error::{Error, Result};

/// `0000000000001230 <main>:`
static RE_FUNC_HEADER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9a-f]+ <(.+)>:\s*$").expect("valid header regex"));
/// `<symbol>` or `<symbol+0x18>` operands on instruction lines.
static RE_SYM_OPERAND: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<([^<>+]+)(?:\+0x[0-9a-f]+)?>").expect("valid operand regex"));
/// Resolved rip-relative targets: `# 2004 <...>` or `# 0x2004`.
static RE_ADDR_COMMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"#\s*(?:0x)?([0-9a-f]+)").expect("valid comment regex"));
/// `-l` source markers: `/path/to/file.cc:123`, optionally with a
/// discriminator suffix.
static RE_SRC_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(/.+):(\d+)(?:\s+\(discriminator \d+\))?$").expect("valid source regex"));

/// Pointer width in bytes declared by the ELF class.
pub fn word_size(data: &[u8]) -> Result<usize> {
    use object::read::Object as _;
    let file = object::read::File::parse(data).map_err(|e| Error::InvalidFormat(e.to_string()))?;
    Ok(if file.is_64() { 8 } else { 4 })
}

/// Feed every named, defined symbol into the sink and resolve the entry
/// point by name (`main`, falling back to `_start`).
pub fn read_symbols(data: &[u8], sink: &mut impl ProgramSink) -> Result<()> {
    use object::read::Object as _;
    let file = object::read::File::parse(data).map_err(|e| Error::InvalidFormat(e.to_string()))?;

    let mut count = 0usize;
    for sym in file.symbols() {
        let name = match sym.name() {
            Ok(name) if !name.is_empty() => name,
            _ => continue,
        };
        if sym.is_undefined() {
            continue;
        }
        match sym.kind() {
            SymbolKind::Text | SymbolKind::Data | SymbolKind::Unknown => {}
            _ => continue,
        }
        sink.add_object(name, sym.address(), sym.size(), sym.kind() == SymbolKind::Data)?;
        count += 1;
    }
    debug!(symbols = count, "symbol table ingested");

    for entry_name in ["main", "_start"] {
        if let Some(id) = sink.find_object_by_name(entry_name) {
            sink.set_entry_point(id);
            break;
        }
    }
    Ok(())
}

/// Record one `vmaddr → fileoff` mapping per loadable segment.
pub fn read_file_mappings(data: &[u8], sink: &mut impl ProgramSink) -> Result<()> {
    use object::read::Object as _;
    let file = object::read::File::parse(data).map_err(|e| Error::InvalidFormat(e.to_string()))?;

    for segment in file.segments() {
        let (fileoff, filesize) = segment.file_range();
        if filesize == 0 {
            continue;
        }
        sink.add_file_mapping(segment.address(), fileoff, filesize);
    }
    Ok(())
}

/// Pipe `objdump -d -l` and turn its text into reference edges and source
/// attachments. A missing objdump is a warning, not a failure; the graph
/// simply has fewer edges.
pub fn read_disassembly_refs(path: &Path, sink: &mut impl ProgramSink) -> Result<()> {
    let mut child = match Command::new("objdump")
        .arg("-d")
        .arg("-l")
        .arg(path)
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
    {
        Ok(child) => child,
        Err(e) => {
            warn!(error = %e, "objdump unavailable; reference edges will be incomplete");
            return Ok(());
        }
    };

    let stdout = child.stdout.take().expect("stdout was piped");
    let mut current: Option<ObjectId> = None;
    for line in BufReader::new(stdout).lines() {
        process_line(&line?, &mut current, sink);
    }

    let status = child.wait()?;
    if !status.success() {
        warn!(%status, "objdump exited with failure");
    }
    Ok(())
}

fn process_line(line: &str, current: &mut Option<ObjectId>, sink: &mut impl ProgramSink) {
    if let Some(caps) = RE_FUNC_HEADER.captures(line) {
        *current = sink.find_object_by_name(&caps[1]);
        return;
    }

    if let Some(caps) = RE_SRC_LINE.captures(line) {
        let file = sink.get_file(&caps[1]);
        if let Some(obj) = *current {
            if sink.object_file(obj).is_none() {
                sink.attach_file(obj, file);
            }
        }
        sink.add_source_line_weight(file, 1);
        return;
    }

    // Everything else of interest is an indented instruction line.
    if !line.starts_with(char::is_whitespace) {
        return;
    }

    for caps in RE_SYM_OPERAND.captures_iter(line) {
        if let (Some(from), Some(to)) = (*current, sink.find_object_by_name(&caps[1])) {
            sink.add_ref(from, to);
        }
    }
    if let Some(caps) = RE_ADDR_COMMENT.captures(line) {
        if let Ok(addr) = u64::from_str_radix(&caps[1], 16) {
            sink.try_add_ref(*current, addr);
        }
    }
}
