//! Builders for artifacts shaped like the ones NSRL publishes.

use std::io::{Cursor, Write};

use zip::write::SimpleFileOptions;

const SECTOR: usize = 2048;

const NSRL_HEADER: &str = concat!(
    "\"SHA-1\",\"MD5\",\"CRC32\",\"FileName\",",
    "\"FileSize\",\"ProductCode\",\"OpSystemCode\",\"SpecialCode\"",
);

/// A flat hash list: the NSRL header line followed by one record per hash.
pub fn hash_list(hashes: &[&str]) -> String {
    let mut out = String::from(NSRL_HEADER);
    out.push('\n');
    for (i, hash) in hashes.iter().enumerate() {
        out.push_str(&format!(
            "\"{hash}\",\"{md5}\",\"00000000\",\"file{i}.bin\",1024,1,\"358\",\"\"\n",
            md5 = "0".repeat(32),
        ));
    }
    out
}

/// An in-memory ZIP archive holding `entries` as `(name, content)` pairs.
pub fn zip_with_entries(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for (name, content) in entries {
        writer.start_file(*name, SimpleFileOptions::default()).unwrap();
        writer.write_all(content).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// A minimal ISO9660 image whose root directory holds a single file.
///
/// Layout: system area in sectors 0-15, the primary volume descriptor in
/// 16, the set terminator in 17, the root directory in 18, the L and M
/// path tables in 19 and 20, and the file data from 21 on.
pub fn iso_with_file(ident: &str, content: &[u8]) -> Vec<u8> {
    const ROOT_LBA: u32 = 18;
    const L_TABLE_LBA: u32 = 19;
    const M_TABLE_LBA: u32 = 20;
    const DATA_LBA: u32 = 21;

    let data_sectors = content.len().div_ceil(SECTOR).max(1);
    let total_sectors = DATA_LBA as usize + data_sectors;
    let mut image = vec![0u8; total_sectors * SECTOR];

    // Primary volume descriptor.
    let pvd = &mut image[16 * SECTOR..17 * SECTOR];
    pvd[0] = 1;
    pvd[1..6].copy_from_slice(b"CD001");
    pvd[6] = 1;
    pvd[8..72].fill(b' ');
    both_u32(&mut pvd[80..88], total_sectors as u32);
    both_u16(&mut pvd[120..124], 1);
    both_u16(&mut pvd[124..128], 1);
    both_u16(&mut pvd[128..132], SECTOR as u16);
    both_u32(&mut pvd[132..140], PATH_TABLE_LEN as u32);
    pvd[140..144].copy_from_slice(&L_TABLE_LBA.to_le_bytes());
    pvd[148..152].copy_from_slice(&M_TABLE_LBA.to_be_bytes());
    pvd[156..190].copy_from_slice(&dir_record(&[0], ROOT_LBA, SECTOR as u32, true));
    pvd[190..813].fill(b' ');
    for offset in [813, 830, 847, 864] {
        pvd[offset..offset + 16].copy_from_slice(b"2024010100000000");
        pvd[offset + 16] = 0;
    }
    pvd[881] = 1;

    // Volume descriptor set terminator.
    let terminator = &mut image[17 * SECTOR..18 * SECTOR];
    terminator[0] = 255;
    terminator[1..6].copy_from_slice(b"CD001");
    terminator[6] = 1;

    // Root directory: ".", "..", then the file.
    let file_id = format!("{ident};1");
    let mut root = Vec::new();
    root.extend(dir_record(&[0], ROOT_LBA, SECTOR as u32, true));
    root.extend(dir_record(&[1], ROOT_LBA, SECTOR as u32, true));
    root.extend(dir_record(file_id.as_bytes(), DATA_LBA, content.len() as u32, false));
    let root_start = ROOT_LBA as usize * SECTOR;
    image[root_start..root_start + root.len()].copy_from_slice(&root);

    // Path tables with the root as the only directory.
    let l_start = L_TABLE_LBA as usize * SECTOR;
    image[l_start..l_start + PATH_TABLE_LEN]
        .copy_from_slice(&path_table(ROOT_LBA.to_le_bytes(), 1u16.to_le_bytes()));
    let m_start = M_TABLE_LBA as usize * SECTOR;
    image[m_start..m_start + PATH_TABLE_LEN]
        .copy_from_slice(&path_table(ROOT_LBA.to_be_bytes(), 1u16.to_be_bytes()));

    let data_start = DATA_LBA as usize * SECTOR;
    image[data_start..data_start + content.len()].copy_from_slice(content);

    image
}

const PATH_TABLE_LEN: usize = 10;

fn path_table(extent: [u8; 4], parent: [u8; 2]) -> [u8; PATH_TABLE_LEN] {
    let mut record = [0u8; PATH_TABLE_LEN];
    record[0] = 1;
    record[2..6].copy_from_slice(&extent);
    record[6..8].copy_from_slice(&parent);
    record
}

fn dir_record(id: &[u8], lba: u32, len: u32, directory: bool) -> Vec<u8> {
    let padding = usize::from(id.len() % 2 == 0);
    let record_len = 33 + id.len() + padding;
    let mut record = vec![0u8; record_len];
    record[0] = record_len as u8;
    both_u32(&mut record[2..10], lba);
    both_u32(&mut record[10..18], len);
    record[18..25].copy_from_slice(&[124, 1, 1, 0, 0, 0, 0]);
    record[25] = if directory { 2 } else { 0 };
    both_u16(&mut record[28..32], 1);
    record[32] = id.len() as u8;
    record[33..33 + id.len()].copy_from_slice(id);
    record
}

fn both_u32(out: &mut [u8], value: u32) {
    out[..4].copy_from_slice(&value.to_le_bytes());
    out[4..8].copy_from_slice(&value.to_be_bytes());
}

fn both_u16(out: &mut [u8], value: u16) {
    out[..2].copy_from_slice(&value.to_le_bytes());
    out[2..4].copy_from_slice(&value.to_be_bytes());
}
