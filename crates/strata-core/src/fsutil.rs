//! Filesystem utilities for crash-safe writes.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::StrataResult;

/// Suffix of in-flight temp files; never reported by directory listings.
pub const TMP_SUFFIX: &str = ".strata-tmp";

/// Write data to a file atomically using temp-file-then-rename.
///
/// On POSIX, `rename()` within the same filesystem is atomic: either the
/// old file or the new file is visible, never a partial write. The temp
/// file is fsynced before the rename.
pub fn atomic_write(path: &Path, data: &[u8]) -> StrataResult<()> {
    let tmp = temp_path(path);
    let mut file = File::create(&tmp)?;
    file.write_all(data)?;
    file.sync_data()?;
    fs::rename(&tmp, path)?;
    Ok(())
}

/// `dir/name` -> `dir/.name.strata-tmp`
fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}{TMP_SUFFIX}"))
}
