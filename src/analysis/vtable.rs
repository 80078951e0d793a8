//! VTable scanning: recover reference edges hidden in data segments.
//!
//! Vtables, function-pointer tables, and similar blobs carry addresses the
//! disassembly never mentions. Every data object whose address maps to a
//! file offset is walked as an array of native-endian machine words; each
//! word that resolves to a known object becomes an edge. Words that match
//! nothing are silently dropped.

use tracing::debug;

use crate::core::object::ObjectId;
use crate::core::program::Program;
use crate::error::{Error, Result};
use crate::io::BinaryData;

/// Scan every data object. `word_size` is the target's pointer width in
/// bytes (8 for 64-bit, 4 for 32-bit); byte order follows the host, which
/// is assumed to match the target.
pub fn scan_vtables(program: &mut Program, binary: &BinaryData, word_size: usize) -> Result<()> {
    if word_size != 4 && word_size != 8 {
        return Err(Error::InvalidFormat(format!(
            "unsupported pointer width {}",
            word_size
        )));
    }

    let data_objects: Vec<ObjectId> = program
        .objects()
        .filter(|o| o.data)
        .map(|o| o.id)
        .collect();
    debug!(candidates = data_objects.len(), "vtable scan");

    let base_verbose = program.trace().verbose;
    for id in data_objects {
        let (vmaddr, size, watched) = {
            let obj = program.object(id);
            (obj.vmaddr, obj.size, program.trace().watches(&obj.name))
        };
        if watched {
            eprintln!("VTable scanning {}", program.object(id).name);
        }
        program.set_verbose(base_verbose || watched);

        let Some(base) = program.try_get_file_offset(vmaddr) else {
            continue;
        };

        let words = size / word_size as u64;
        for i in 0..words {
            let bytes = binary.slice(base + i * word_size as u64, word_size)?;
            let addr = read_word(bytes);
            if program.trace().verbose {
                eprintln!("  Try add ref to: {:#x}", addr);
            }
            program.try_add_ref(Some(id), addr);
        }
    }
    program.set_verbose(base_verbose);

    Ok(())
}

fn read_word(bytes: &[u8]) -> u64 {
    match bytes.len() {
        4 => u32::from_ne_bytes(bytes.try_into().expect("4-byte word")) as u64,
        _ => u64::from_ne_bytes(bytes.try_into().expect("8-byte word")),
    }
}
