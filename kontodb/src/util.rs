use crate::error::Result;
use std::io::Write;
use std::path::Path;

/// Replace `path` with `contents` so readers see either the old or the new file.
/// Writes a temporary file next to the target, syncs it, then renames it over.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(contents)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
