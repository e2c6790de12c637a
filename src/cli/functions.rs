//! Standard library listing

use crate::Toolchain;

/// One line per standard library signature, grouped by name.
pub fn list_functions() -> Vec<String> {
    let toolchain = Toolchain::new();
    let mut lines: Vec<String> = toolchain.signatures().iter().map(ToString::to_string).collect();
    lines.sort();
    lines
}
