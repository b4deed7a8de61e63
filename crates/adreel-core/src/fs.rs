//! Filesystem helpers shared by the JSON stores.

use crate::error::Result;
use fs2::FileExt;
use std::fmt::Write as _;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

/// Write `data` to `path` so readers never observe a partial file.
///
/// Writes a sibling temp file, syncs it, then renames over the target.
pub fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "record".into());
    let tmp = path.with_file_name(format!(".{file_name}.{}.tmp", std::process::id()));
    {
        let mut file = std::fs::File::create(&tmp)?;
        file.write_all(data)?;
        file.sync_all()?;
    }
    if let Err(e) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(e.into());
    }
    Ok(())
}

/// Run `op` while holding an exclusive OS lock on `lock_path`.
///
/// The lock is advisory and held across processes, so a read-check-write
/// inside `op` is atomic with respect to every other caller using the same
/// lock file. The lock file is created if missing and never removed.
pub fn with_file_lock<T, E>(lock_path: &Path, op: impl FnOnce() -> std::result::Result<T, E>) -> std::result::Result<T, E>
where
    E: From<std::io::Error>,
{
    if let Some(parent) = lock_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let lock_file = OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .truncate(false)
        .open(lock_path)?;
    FileExt::lock_exclusive(&lock_file)?;
    let result = op();
    // Closing the file releases the lock as well.
    let _ = FileExt::unlock(&lock_file);
    result
}

/// Encode an id as a file stem without collisions.
///
/// ASCII letters, digits and `-` are kept; every other byte becomes `_XX`
/// (uppercase hex), so distinct ids always map to distinct stems.
pub fn encode_file_stem(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for byte in raw.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' {
            out.push(byte as char);
        } else {
            let _ = write!(out, "_{byte:02X}");
        }
    }
    out
}
