//! Destination naming and the physical copy/move into the library

use crate::config::FileOperation;
use crate::error::{Error, Result};
use crate::time::TimestampKey;
use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Copy buffer size (256KB)
const COPY_BUFFER_SIZE: usize = 256 * 1024;

/// Suffix inserted before the extension when a name is already taken
const DUPLICATE_SUFFIX: &str = "_duplicated_";

/// `target_root/YYYY/YYYY_MM`
pub fn destination_dir(target_root: &Path, key: &TimestampKey) -> PathBuf {
    target_root
        .join(key.year())
        .join(format!("{}_{}", key.year(), key.month()))
}

/// Pick a destination for `source` that does not exist yet
///
/// The base name is kept unless it is taken, in which case
/// `<stem>_duplicated_<n><.ext>` is probed for n = 1, 2, ...
pub fn unique_destination(target_root: &Path, key: &TimestampKey, source: &Path) -> Result<PathBuf> {
    let filename = source
        .file_name()
        .ok_or_else(|| Error::Config(format!("{} has no file name", source.display())))?;

    let dir = destination_dir(target_root, key);
    let preferred = dir.join(filename);
    if !preferred.exists() {
        return Ok(preferred);
    }

    debug!(existing = ?preferred, ?source, "Destination name taken, renaming");

    let (stem, extension) = split_name(Path::new(filename));
    let mut n: u64 = 1;
    loop {
        let mut name = stem.clone();
        name.push(format!("{}{}", DUPLICATE_SUFFIX, n));
        if let Some(ext) = &extension {
            name.push(".");
            name.push(ext);
        }

        let candidate = dir.join(name);
        if !candidate.exists() {
            debug!(?candidate, "New filename");
            return Ok(candidate);
        }
        debug!(?candidate, "Duplicated");
        n += 1;
    }
}

/// Split a base name at its last dot, ignoring a leading dot
fn split_name(name: &Path) -> (OsString, Option<OsString>) {
    let stem = name
        .file_stem()
        .map(|s| s.to_os_string())
        .unwrap_or_else(|| name.as_os_str().to_os_string());
    let extension = name.extension().map(|e| e.to_os_string());
    (stem, extension)
}

/// Copy or move `source` to `dest`
///
/// If the first attempt fails because the destination directory is missing,
/// the directory is created and the transfer retried once. Any remaining
/// failure is a [`Error::Transfer`].
pub fn transfer(source: &Path, dest: &Path, operation: FileOperation) -> Result<()> {
    let first = perform_file_operation(source, dest, operation);
    let Err(first_error) = first else {
        return Ok(());
    };

    let parent = dest.parent().filter(|p| !p.as_os_str().is_empty());
    match parent {
        Some(parent) if !parent.exists() => {
            debug!(dir = ?parent, "Creating destination directory");
            fs::create_dir_all(parent).map_err(|e| transfer_error(source, dest, e))?;
            perform_file_operation(source, dest, operation).map_err(|e| transfer_error(source, dest, e))
        }
        _ => Err(transfer_error(source, dest, first_error)),
    }
}

fn transfer_error(source: &Path, dest: &Path, error: io::Error) -> Error {
    Error::Transfer {
        from: source.to_path_buf(),
        to: dest.to_path_buf(),
        source: error,
    }
}

fn perform_file_operation(source: &Path, dest: &Path, operation: FileOperation) -> io::Result<()> {
    let mtime = fs::metadata(source).and_then(|m| m.modified()).ok();

    if operation == FileOperation::Move {
        if dest.exists() {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                "destination already exists",
            ));
        }
        // Same filesystem: a rename keeps the mtime as-is
        if fs::rename(source, dest).is_ok() {
            return Ok(());
        }
    }

    copy_file(source, dest)?;

    // Preserve modification time
    if let Some(mtime) = mtime {
        let _ = filetime::set_file_mtime(dest, filetime::FileTime::from_system_time(mtime));
    }

    if operation == FileOperation::Move
        && let Err(e) = fs::remove_file(source)
    {
        // The copy would be left in the library without an index entry
        discard_partial(dest);
        return Err(e);
    }

    Ok(())
}

/// Copy file with buffered I/O, refusing to replace an existing file
///
/// A destination created here is removed again if the copy fails.
fn copy_file(source: &Path, dest: &Path) -> io::Result<()> {
    let src_file = File::open(source)?;
    let dest_file = OpenOptions::new().write(true).create_new(true).open(dest)?;

    let result = copy_contents(src_file, dest_file);
    if result.is_err() {
        discard_partial(dest);
    }
    result
}

fn copy_contents(src_file: File, dest_file: File) -> io::Result<()> {
    let mut reader = BufReader::with_capacity(COPY_BUFFER_SIZE, src_file);
    let mut writer = BufWriter::with_capacity(COPY_BUFFER_SIZE, dest_file);

    let mut buffer = vec![0u8; COPY_BUFFER_SIZE];
    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        writer.write_all(&buffer[..bytes_read])?;
    }

    writer.flush()?;
    Ok(())
}

fn discard_partial(dest: &Path) {
    match fs::remove_file(dest) {
        Ok(()) => debug!(?dest, "Removed incomplete destination"),
        Err(e) => warn!(?dest, error = %e, "Failed to remove incomplete destination"),
    }
}
