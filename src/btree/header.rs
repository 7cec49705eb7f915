//! Reads the header of a btree page.
//! A b-tree page is divided into regions in the following order:
//! 1. The 100-byte database file header (found on page 1 only)
//! 2. The 8 or 12 byte b-tree page header
//! 3. The cell pointer array
//! 4. Unallocated space
//! 5. The cell content area
//! 6. The reserved region (assumed empty; reserved-space-per-page is not validated)

use super::PageType;
use byteorder::{BigEndian, ReadBytesExt};
use std::io::{Cursor, Seek, SeekFrom};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Page was too short to contain a btree page header.")]
    Truncated,
    #[error("Unrecognized btree page type byte: {0}")]
    InvalidPageType(u8),
}

#[derive(Debug, Clone)]
pub struct Header {
    pub btree_page_type: PageType,
    pub freeblock_start: u32,
    pub num_cells: u32,
    pub cell_content_start: u32,
    pub rightmost_pointer: Option<u32>,
}

pub fn check_header(page: &[u8], non_btree_header_bytes: usize) -> Result<Header, Error> {
    let mut c = Cursor::new(page);
    if non_btree_header_bytes > 0 {
        c.seek(SeekFrom::Current(non_btree_header_bytes as i64))
            .map_err(|_| Error::Truncated)?;
    }

    // Offset 0, 1 byte: the b-tree page type flag.
    let type_byte = c.read_u8().map_err(|_| Error::Truncated)?;
    let btree_page_type = match type_byte {
        0x02 => PageType::IndexInterior,
        0x05 => PageType::TableInterior,
        0x0a => PageType::IndexLeaf,
        0x0d => PageType::TableLeaf,
        b => return Err(Error::InvalidPageType(b)),
    };

    // Offset 1, 2 bytes: start of the first freeblock, or 0 if none.
    let freeblock_start: u32 = c.read_u16::<BigEndian>().map_err(|_| Error::Truncated)? as u32;
    // Offset 3, 2 bytes: number of cells on the page.
    let num_cells: u32 = c.read_u16::<BigEndian>().map_err(|_| Error::Truncated)? as u32;
    // Offset 5, 2 bytes: start of the cell content area. 0 means 65536.
    let cell_content_start: u32 = match c.read_u16::<BigEndian>().map_err(|_| Error::Truncated)? {
        0 => 65536,
        x => x as u32,
    };
    // Offset 7, 1 byte: number of fragmented free bytes in the cell content area. Unused here.
    let _ = c.read_u8().map_err(|_| Error::Truncated)?;

    // Offset 8, 4 bytes: right-most child pointer. Interior pages only.
    let rightmost_pointer = match btree_page_type {
        PageType::IndexInterior | PageType::TableInterior => {
            Some(c.read_u32::<BigEndian>().map_err(|_| Error::Truncated)?)
        }
        PageType::IndexLeaf | PageType::TableLeaf => None,
    };

    Ok(Header {
        btree_page_type,
        freeblock_start,
        num_cells,
        cell_content_start,
        rightmost_pointer,
    })
}
