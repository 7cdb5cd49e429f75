use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};

/// Reads an entire file as bytes, with the path in the error message.
pub fn slurp_file<P: AsRef<Path>>(path: P) -> Result<Vec<u8>> {
    let path = path.as_ref();
    fs_err::read(path).with_context(|| format!("slurping {}", path.display()))
}

/// Writes bytes to a file, creating parent directories as needed.
pub fn write_file<P: AsRef<Path>>(path: P, contents: &[u8]) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        fs_err::create_dir_all(parent)?;
    }
    let mut file = fs_err::File::create(path)?;
    file.write_all(contents)
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}
