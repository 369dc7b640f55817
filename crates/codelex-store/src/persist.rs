use std::io::{self, Write};
use std::path::Path;

use tempfile::NamedTempFile;

/// Replace `path` with `bytes` via write-then-rename, so readers never see
/// a partially written file.
pub(crate) fn replace_file(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let dir = path.parent().filter(|p| !p.as_os_str().is_empty());
    let mut tmp = match dir {
        Some(dir) => NamedTempFile::new_in(dir)?,
        None => NamedTempFile::new_in(".")?,
    };
    tmp.write_all(bytes)?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
