//! Symbol demangling and pretty-name stripping.
//!
//! The program model consumes demangling through the [`Demangler`] trait so
//! the gateway can be an in-process library binding or an external `c++filt`
//! child exchanging newline-framed symbols over pipes.

use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

use crate::error::{Error, Result};

/// Capability the program model uses to turn a raw linker symbol into a
/// human-readable name. Calls are serialized; implementations may hold a
/// child process or other exclusive resource.
pub trait Demangler {
    fn demangle(&mut self, symbol: &str) -> Result<String>;
}

/// Strip a demangled name's parameter list: everything from the first `(`.
///
/// Returns `None` when the name carries no parameter list. Overloads
/// sharing the stripped form collide deliberately; the program model
/// resolves the collision.
pub fn strip_params(name: &str) -> Option<&str> {
    name.find('(').map(|paren| &name[..paren])
}

/// In-process demangler backed by the rustc and Itanium demanglers.
///
/// Symbols neither demangler recognizes come back unchanged, matching
/// `c++filt`'s behavior for plain names.
#[derive(Debug, Default)]
pub struct LibraryDemangler;

impl Demangler for LibraryDemangler {
    fn demangle(&mut self, symbol: &str) -> Result<String> {
        if let Ok(dm) = rustc_demangle::try_demangle(symbol) {
            return Ok(dm.to_string());
        }
        if let Ok(sym) = cpp_demangle::Symbol::new(symbol) {
            return Ok(sym.to_string());
        }
        Ok(symbol.to_string())
    }
}

/// Long-lived external demangler child (`c++filt` by convention).
///
/// One request is in flight at a time: a symbol followed by `\n` goes down
/// the child's stdin and one newline-terminated answer comes back. The
/// child is killed and reaped on drop. Any failure of the child
/// mid-session is fatal to the analysis.
pub struct ToolDemangler {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

impl ToolDemangler {
    pub fn spawn(program: &str) -> Result<Self> {
        let mut child = Command::new(program)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| Error::Demangler(format!("failed to spawn {}: {}", program, e)))?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::Demangler("child stdin unavailable".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Demangler("child stdout unavailable".to_string()))?;
        Ok(Self {
            child,
            stdin,
            stdout: BufReader::new(stdout),
        })
    }
}

impl Demangler for ToolDemangler {
    fn demangle(&mut self, symbol: &str) -> Result<String> {
        self.stdin
            .write_all(symbol.as_bytes())
            .and_then(|_| self.stdin.write_all(b"\n"))
            .and_then(|_| self.stdin.flush())
            .map_err(|e| Error::Demangler(format!("write failed: {}", e)))?;

        let mut line = String::new();
        let n = self
            .stdout
            .read_line(&mut line)
            .map_err(|e| Error::Demangler(format!("read failed: {}", e)))?;
        if n == 0 {
            return Err(Error::Demangler("child closed its pipe".to_string()));
        }
        while line.ends_with('\n') || line.ends_with('\r') {
            line.pop();
        }
        Ok(line)
    }
}

impl Drop for ToolDemangler {
    fn drop(&mut self) {
        // std exposes no graceful signal; kill and reap.
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}
