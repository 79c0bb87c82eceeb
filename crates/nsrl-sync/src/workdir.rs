//! Helpers for the shared working directory.
//!
//! Every file that becomes visible under its final name was first written
//! in full to a sibling `.part` file and then renamed into place.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::BLOCK_SIZE;

/// The in-progress sibling of `path`: `<path>.part`.
pub fn part_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".part");
    path.with_file_name(name)
}

/// Remove a file, treating "already gone" as success.
pub fn remove_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

/// Discard everything left in `dir` by an earlier run and recreate it empty.
pub fn reset(dir: &Path) -> io::Result<()> {
    match fs::remove_dir_all(dir) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }
    fs::create_dir_all(dir)
}

/// Move a completed `.part` file onto its final name, replacing whatever
/// was there before.
pub fn promote(part: &Path, destination: &Path) -> io::Result<()> {
    remove_if_exists(destination)?;
    fs::rename(part, destination)
}

/// Stream `write` into `<destination>.part`, then promote it. On any error
/// the partial file is removed and `destination` is left untouched.
pub fn write_atomically<F>(destination: &Path, write: F) -> io::Result<u64>
where
    F: FnOnce(&mut BufWriter<File>) -> io::Result<u64>,
{
    let part = part_path(destination);

    let result = File::create(&part).and_then(|file| {
        let mut writer = BufWriter::with_capacity(BLOCK_SIZE, file);
        let written = write(&mut writer)?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
        Ok(written)
    });

    match result.and_then(|written| promote(&part, destination).map(|()| written)) {
        Ok(written) => Ok(written),
        Err(e) => {
            let _ = remove_if_exists(&part);
            Err(e)
        }
    }
}
