use crate::generator::DocumentResult;
use log::debug;
use std::io::{self, Write};

/// Delivers a finished document: bytes go to `out` untouched, written
/// files produce no output at all
pub fn emit<W: Write>(result: &DocumentResult, out: &mut W) -> io::Result<()> {
    match result {
        DocumentResult::Bytes(bytes) => {
            out.write_all(bytes)?;
            out.flush()
        }
        DocumentResult::Written(path) => {
            debug!("Document written to {}", path.display());
            Ok(())
        }
    }
}

/// [`emit`] on the process's standard output
pub fn emit_stdout(result: &DocumentResult) -> io::Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    emit(result, &mut handle)
}

/// The single diagnostic line reported on failure
pub fn diagnostic(error: &dyn std::fmt::Display) -> String {
    format!("error in script: {}", error)
}
