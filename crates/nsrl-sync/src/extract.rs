//! Pulls the flat hash list out of a downloaded container.
//!
//! All functions here do blocking I/O. The archive they read is always
//! deleted afterwards, whether extraction succeeded or not.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::ExtractionError;
use crate::source::{ContainerKind, SourceDescriptor};
use crate::workdir::{self, remove_if_exists};

/// The ZIP every NSRL ISO image carries at its root.
pub const ISO_NESTED_ZIP: &str = "/NSRLFILE.ZIP";

/// Extract `source`'s hash list from its artifact in `work_dir` and return
/// the path of the flat file.
///
/// On failure every working file of the source is removed.
pub fn extract(source: &SourceDescriptor, work_dir: &Path) -> Result<PathBuf, ExtractionError> {
    let kind = source.container_kind();
    if !kind.is_container() {
        return Err(ExtractionError::NotAContainer(kind));
    }

    let artifact = source.artifact_path(work_dir);
    let destination = source.extracted_path(work_dir);

    let result = match source.pattern.as_deref() {
        None => Err(ExtractionError::MissingPattern { kind }),
        Some(pattern) if kind == ContainerKind::Iso => extract_iso(
            &artifact,
            pattern,
            &source.nested_zip_path(work_dir),
            &destination,
        ),
        Some(pattern) => extract_zip(&artifact, pattern, &destination),
    };

    match result {
        Ok(()) => Ok(destination),
        Err(e) => {
            for path in [
                &artifact,
                &source.nested_zip_path(work_dir),
                &destination,
                &workdir::part_path(&destination),
            ] {
                let _ = remove_if_exists(path);
            }
            Err(e)
        }
    }
}

/// Copy the entry named `pattern` out of a ZIP archive to `destination`,
/// then delete the archive.
pub fn extract_zip(
    archive: &Path,
    pattern: &str,
    destination: &Path,
) -> Result<(), ExtractionError> {
    info!(archive = %archive.display(), pattern, "unzipping");
    let copied = copy_zip_entry(archive, pattern, destination);
    remove_if_exists(archive)?;
    let bytes = copied?;
    info!(destination = %destination.display(), bytes, "unzip finished");
    Ok(())
}

/// Pull [`ISO_NESTED_ZIP`] out of an ISO9660 image into `nested_zip`,
/// delete the image, then extract `pattern` from the nested ZIP.
pub fn extract_iso(
    image: &Path,
    pattern: &str,
    nested_zip: &Path,
    destination: &Path,
) -> Result<(), ExtractionError> {
    info!(image = %image.display(), entry = ISO_NESTED_ZIP, "extracting from ISO");
    let copied = copy_iso_entry(image, ISO_NESTED_ZIP, nested_zip);
    remove_if_exists(image)?;
    copied?;
    extract_zip(nested_zip, pattern, destination)
}

fn copy_zip_entry(
    archive: &Path,
    pattern: &str,
    destination: &Path,
) -> Result<u64, ExtractionError> {
    let file = File::open(archive)?;
    let mut zip = zip::ZipArchive::new(file).map_err(|e| corrupt(archive, e))?;

    let mut entry = match zip.by_name(pattern) {
        Ok(entry) => entry,
        Err(zip::result::ZipError::FileNotFound) => {
            return Err(ExtractionError::MissingEntry {
                archive: archive.to_path_buf(),
                entry: pattern.to_owned(),
            });
        }
        Err(e) => return Err(corrupt(archive, e)),
    };

    debug!(entry = entry.name(), size = entry.size(), "found archive entry");
    let written = workdir::write_atomically(destination, |out| io::copy(&mut entry, out))?;
    Ok(written)
}

fn copy_iso_entry(
    image: &Path,
    entry_path: &str,
    destination: &Path,
) -> Result<u64, ExtractionError> {
    let file = File::open(image)?;
    let iso = cdfs::ISO9660::new(file).map_err(|e| corrupt(image, e))?;

    match iso.open(entry_path).map_err(|e| corrupt(image, e))? {
        Some(cdfs::DirectoryEntry::File(entry)) => {
            let mut reader = entry.read();
            let written = workdir::write_atomically(destination, |out| io::copy(&mut reader, out))?;
            Ok(written)
        }
        _ => Err(ExtractionError::MissingEntry {
            archive: image.to_path_buf(),
            entry: entry_path.to_owned(),
        }),
    }
}

fn corrupt(archive: &Path, e: impl std::fmt::Display) -> ExtractionError {
    ExtractionError::Corrupt {
        archive: archive.to_path_buf(),
        message: e.to_string(),
    }
}
