//! Reads the 100-byte header of a database file.

use byteorder::{BigEndian, ReadBytesExt};
use std::io::{Read, Seek, SeekFrom};

#[derive(thiserror::Error, Debug, Clone)]
pub enum Error {
    #[error("The magic bytes for this file are wrong.")]
    WrongMagic,
    #[error("The page size in the file header is not a valid SQLite page size.")]
    UnsupportedPagesize,
    #[error("This file uses a write-ahead-log format, which is not supported.")]
    UnsupportedFileFormat,
    #[error("Error reading file.")]
    ReadFailed,
}

pub const SQLITE_DB_HEADER_BYTES: usize = 100;
const SQLITE3_MAGIC_STRING: &[u8] = &[
    0x53, 0x51, 0x4c, 0x69, 0x74, 0x65, 0x20, 0x66, 0x6f, 0x72, 0x6d, 0x61, 0x74, 0x20, 0x33, 0x00,
];

/// The fields of the 100-byte file header this crate actually relies on.
/// Other header fields (freelist state, schema cookie, text encoding,
/// application id) are real SQLite file header fields but are not validated
/// here: a file produced by any SQLite version may set them to values this
/// from-scratch reader has no reason to reject.
#[derive(Debug, Clone)]
pub struct DbfileHeader {
    pub pagesize: u32,
    pub numpages: u32,
    pub changecnt: u32,
}

fn bytes_identical<T: Eq>(a: &[T], b: &[T]) -> bool {
    a == b
}

pub fn get_header_clone(f: &mut std::fs::File) -> Result<DbfileHeader, Error> {
    let mut v = vec![0_u8; SQLITE_DB_HEADER_BYTES];
    f.seek(SeekFrom::Start(0)).map_err(|_| Error::ReadFailed)?;
    f.read_exact(&mut v[..]).map_err(|_| Error::ReadFailed)?;
    let mut c = std::io::Cursor::new(v);
    get_header(&mut c)
}

pub fn get_header<R: Read + Seek>(f: &mut R) -> Result<DbfileHeader, Error> {
    f.seek(SeekFrom::Start(0)).map_err(|_| Error::ReadFailed)?;

    // Offset 0, 16 bytes: the header string "SQLite format 3\000".
    let mut fileid_buffer = [0; 16];
    f.read_exact(&mut fileid_buffer)
        .map_err(|_| Error::ReadFailed)?;
    if !bytes_identical(&fileid_buffer, SQLITE3_MAGIC_STRING) {
        return Err(Error::WrongMagic);
    }

    // Offset 16, 2 bytes: page size, a power of two 512..=32768, or 1 meaning 65536.
    let pagesize: u32 = match f.read_u16::<BigEndian>().map_err(|_| Error::ReadFailed)? {
        1 => 65536,
        x if x.is_power_of_two() && (512..=32768).contains(&x) => x as u32,
        _ => return Err(Error::UnsupportedPagesize),
    };

    // Offset 18/19, 1 byte each: file format write/read version. 1 = legacy, 2 = WAL.
    let write_version = f.read_u8().map_err(|_| Error::ReadFailed)?;
    let read_version = f.read_u8().map_err(|_| Error::ReadFailed)?;
    if write_version != 0x01 || read_version != 0x01 {
        return Err(Error::UnsupportedFileFormat);
    }

    // Offset 20..24: reserved-space/payload-fraction bytes, not checked.
    let mut skip4 = [0u8; 4];
    f.read_exact(&mut skip4).map_err(|_| Error::ReadFailed)?;

    // Offset 24, 4 bytes: file change counter.
    // Offset 28, 4 bytes: size of the database file in pages.
    let changecnt: u32 = f.read_u32::<BigEndian>().map_err(|_| Error::ReadFailed)?;
    let numpages: u32 = f.read_u32::<BigEndian>().map_err(|_| Error::ReadFailed)?;

    f.seek(SeekFrom::Start(0)).map_err(|_| Error::ReadFailed)?;
    Ok(DbfileHeader {
        pagesize,
        changecnt,
        numpages,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_header(pagesize_bytes: [u8; 2]) -> Vec<u8> {
        let mut v = vec![0u8; SQLITE_DB_HEADER_BYTES];
        v[0..16].copy_from_slice(SQLITE3_MAGIC_STRING);
        v[16..18].copy_from_slice(&pagesize_bytes);
        v[18] = 0x01;
        v[19] = 0x01;
        v
    }

    #[test]
    fn test_get_header_ok() {
        let mut v = minimal_header([0x10, 0x00]); // 4096
        v[24..28].copy_from_slice(&7u32.to_be_bytes());
        v[28..32].copy_from_slice(&3u32.to_be_bytes());
        let mut c = std::io::Cursor::new(v);
        let hdr = get_header(&mut c).unwrap();
        assert_eq!(hdr.pagesize, 4096);
        assert_eq!(hdr.changecnt, 7);
        assert_eq!(hdr.numpages, 3);
    }

    #[test]
    fn test_get_header_pagesize_one_means_65536() {
        let v = minimal_header([0x00, 0x01]);
        let mut c = std::io::Cursor::new(v);
        assert_eq!(get_header(&mut c).unwrap().pagesize, 65536);
    }

    #[test]
    fn test_get_header_wrong_magic() {
        let mut v = minimal_header([0x10, 0x00]);
        v[0] = 0x00;
        let mut c = std::io::Cursor::new(v);
        assert!(matches!(get_header(&mut c), Err(Error::WrongMagic)));
    }

    #[test]
    fn test_get_header_bad_pagesize() {
        let v = minimal_header([0x00, 0x03]); // 3 is not a valid page size.
        let mut c = std::io::Cursor::new(v);
        assert!(matches!(get_header(&mut c), Err(Error::UnsupportedPagesize)));
    }

    #[test]
    fn test_get_header_wal_format_unsupported() {
        let mut v = minimal_header([0x10, 0x00]);
        v[18] = 0x02;
        let mut c = std::io::Cursor::new(v);
        assert!(matches!(get_header(&mut c), Err(Error::UnsupportedFileFormat)));
    }
}
