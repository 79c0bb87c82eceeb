use std::path::Path;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info};

use crate::BLOCK_SIZE;
use crate::error::ImportError;
use crate::store::HashSetStore;

/// Number of hashes sent to the store per call.
pub const BATCH_SIZE: usize = 10_000;

/// Import every record of a flat hash list into the set under `set_key`.
///
/// The first line is a header and is skipped, as are blank lines. The file
/// is streamed line by line and deleted once every record is in the store.
/// If the import stops partway, hashes already added stay in the store and
/// the file is kept for the next attempt.
///
/// Lines are handled as raw bytes. Only the first field has to be ASCII;
/// the rest of a record may be in any encoding.
///
/// Returns the number of records imported, counting ones that were
/// already present.
pub async fn load(
    path: &Path,
    store: &dyn HashSetStore,
    set_key: &str,
) -> Result<u64, ImportError> {
    let io_error = |source| ImportError::Io {
        path: path.to_path_buf(),
        source,
    };

    let file = tokio::fs::File::open(path).await.map_err(io_error)?;
    let mut reader = BufReader::with_capacity(BLOCK_SIZE, file);
    let mut line = Vec::new();

    let mut line_number = 0u64;
    let mut imported = 0u64;
    let mut batch = Vec::with_capacity(BATCH_SIZE);

    loop {
        line.clear();
        if reader.read_until(b'\n', &mut line).await.map_err(io_error)? == 0 {
            break;
        }
        line_number += 1;
        if line_number == 1 || line.trim_ascii().is_empty() {
            continue;
        }

        let hash = parse_record(&line).ok_or_else(|| ImportError::MalformedRecord {
            path: path.to_path_buf(),
            line: line_number,
        })?;
        batch.push(hash);

        if batch.len() >= BATCH_SIZE {
            store.add_members(set_key, &batch).await?;
            imported += batch.len() as u64;
            debug!(imported, "batch imported");
            batch.clear();
        }
    }

    if !batch.is_empty() {
        store.add_members(set_key, &batch).await?;
        imported += batch.len() as u64;
    }

    tokio::fs::remove_file(path).await.map_err(io_error)?;
    info!(path = %path.display(), imported, "import finished");

    Ok(imported)
}

/// The uppercase hash in the first comma-separated field of a record, or
/// `None` if that field is empty or not hex.
pub fn parse_record(line: &[u8]) -> Option<String> {
    let field = line.split(|&b| b == b',').next()?.trim_ascii();
    let field = field.strip_prefix(b"\"").unwrap_or(field);
    let field = field.strip_suffix(b"\"").unwrap_or(field).trim_ascii();

    if field.is_empty() || !field.iter().all(u8::is_ascii_hexdigit) {
        return None;
    }

    Some(field.iter().map(|b| char::from(b.to_ascii_uppercase())).collect())
}
