//! Executable-format ingestion.
//!
//! Parsers feed the program model exclusively through the
//! [`ProgramSink`](crate::core::program::ProgramSink) facade. Only ELF is
//! wired up; the sink keeps other formats pluggable.

pub mod elf;
