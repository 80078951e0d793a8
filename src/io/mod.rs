//! Bounded, memory-mapped access to the analyzed binary.
//!
//! The vtable scanner and the ELF parser both consume byte slices from a
//! single read-only map of the input file. Out-of-range reads surface as
//! truncation errors rather than silent short reads.

use memmap2::Mmap;
use std::fs::File;
use std::path::Path;

use crate::error::{Error, Result};

/// Read-only view of the binary being analyzed.
pub struct BinaryData {
    // None when the file is empty; memmap cannot map zero-length files.
    mmap: Option<Mmap>,
}

impl BinaryData {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        let len = file.metadata()?.len();
        let mmap = if len == 0 {
            None
        } else {
            // Safety: read-only map of a regular file we just opened.
            Some(unsafe { Mmap::map(&file)? })
        };
        Ok(Self { mmap })
    }

    /// The whole file.
    pub fn bytes(&self) -> &[u8] {
        self.mmap.as_deref().unwrap_or(&[])
    }

    pub fn len(&self) -> u64 {
        self.bytes().len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.bytes().is_empty()
    }

    /// `len` bytes starting at `offset`.
    ///
    /// A range past the end of the file means the symbol table and the file
    /// contents disagree; that is corrupt input, not a recoverable miss.
    pub fn slice(&self, offset: u64, len: usize) -> Result<&[u8]> {
        let bytes = self.bytes();
        let truncated = Error::Truncated {
            offset,
            wanted: len,
            len: bytes.len() as u64,
        };
        let start = usize::try_from(offset).map_err(|_| truncated)?;
        match start.checked_add(len).and_then(|end| bytes.get(start..end)) {
            Some(slice) => Ok(slice),
            None => Err(Error::Truncated {
                offset,
                wanted: len,
                len: bytes.len() as u64,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn binary_with(content: &[u8]) -> (tempfile::NamedTempFile, BinaryData) {
        let mut f = tempfile::NamedTempFile::new().expect("temp file");
        f.write_all(content).expect("write");
        f.flush().expect("flush");
        let data = BinaryData::open(f.path()).expect("open");
        (f, data)
    }

    #[test]
    fn test_slice_within_bounds() {
        let (_f, data) = binary_with(b"0123456789");
        assert_eq!(data.slice(0, 4).unwrap(), b"0123");
        assert_eq!(data.slice(6, 4).unwrap(), b"6789");
    }

    #[test]
    fn test_slice_past_end_is_truncated() {
        let (_f, data) = binary_with(b"0123456789");
        assert!(matches!(
            data.slice(8, 4),
            Err(Error::Truncated { offset: 8, wanted: 4, len: 10 })
        ));
        assert!(data.slice(100, 1).is_err());
    }

    #[test]
    fn test_empty_file_maps_to_empty_slice() {
        let (_f, data) = binary_with(b"");
        assert!(data.is_empty());
        assert_eq!(data.slice(0, 0).unwrap(), b"");
        assert!(data.slice(0, 1).is_err());
    }
}
