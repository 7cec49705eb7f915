//! Iterates over the cells of a single btree page, without interpreting
//! their contents. Used by `leaf`, `table`, and `index`.

use byteorder::{BigEndian, ReadBytesExt};
use std::io::{Cursor, Seek, SeekFrom};
use std::rc::Rc;

use super::header;
use super::PageType;

pub struct Iterator {
    page: Rc<Vec<u8>>,
    cell_idx: usize,
    cell_offsets: Vec<usize>,
    cell_lengths: Vec<usize>,
}

impl Iterator {
    /// An iterator with no cells, for a page past the end of the file that a
    /// trailing child/right-most pointer legitimately points to.
    pub fn empty() -> Iterator {
        Iterator {
            page: Rc::new(vec![]),
            cell_idx: 0,
            cell_offsets: vec![],
            cell_lengths: vec![],
        }
    }

    /// Builds an iterator over the cells of `page`. `non_btree_header_bytes`
    /// is 100 on page 1 (which carries the file header ahead of the btree
    /// page header) and 0 elsewhere.
    pub fn new(
        page: Rc<Vec<u8>>,
        non_btree_header_bytes: usize,
        page_size: u32,
    ) -> Result<Iterator, header::Error> {
        let hdr = header::check_header(&page, non_btree_header_bytes)?;
        let btree_header_bytes: usize = match hdr.btree_page_type {
            PageType::IndexInterior | PageType::TableInterior => 12,
            PageType::IndexLeaf | PageType::TableLeaf => 8,
        };

        let mut c = Cursor::new(page.as_slice());
        c.seek(SeekFrom::Start(
            (btree_header_bytes + non_btree_header_bytes) as u64,
        ))
        .map_err(|_| header::Error::Truncated)?;

        // The cell pointer array holds K 2-byte offsets in key order,
        // left-most cell first. Each cell runs from its offset to the start
        // of the previous cell (or the end of the page, for the first one
        // read, which is the right-most cell on the page).
        let mut cell_offsets = Vec::with_capacity(hdr.num_cells as usize);
        let mut cell_lengths = Vec::with_capacity(hdr.num_cells as usize);
        let mut last_offset: usize = page_size as usize;
        for _ in 0..hdr.num_cells {
            let off = c.read_u16::<BigEndian>().map_err(|_| header::Error::Truncated)? as usize;
            cell_offsets.push(off);
            cell_lengths.push(last_offset.saturating_sub(off));
            last_offset = off;
        }

        Ok(Iterator {
            page,
            cell_idx: 0,
            cell_offsets,
            cell_lengths,
        })
    }
}

impl core::iter::Iterator for Iterator {
    // Each item is a copy of the cell's bytes. Pages are cached by the pager
    // rather than re-read, so this copy is the only one made per access.
    type Item = Vec<u8>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cell_idx >= self.cell_offsets.len() {
            return None;
        }
        let b = self.cell_offsets[self.cell_idx];
        let e = b + self.cell_lengths[self.cell_idx];
        self.cell_idx += 1;
        Some(self.page[b..e].to_vec())
    }
}

// From command: xxd resources/test/multipage-512B-page.db
#[cfg(test)]
const TEST_PAGE: &str = "0d00 0000 0a01 ce00 01fb 01f6 01f1 01ec
01e7 01e2 01dd 01d8 01d3 01ce 0000 0000
0000 0000 0000 0000 0000 0000 0000 0000
0000 0000 0000 0000 0000 0000 0000 0000
0000 0000 0000 0000 0000 0000 0000 0000
0000 0000 0000 0000 0000 0000 0000 0000
0000 0000 0000 0000 0000 0000 0000 0000
0000 0000 0000 0000 0000 0000 0000 0000
0000 0000 0000 0000 0000 0000 0000 0000
0000 0000 0000 0000 0000 0000 0000 0000
0000 0000 0000 0000 0000 0000 0000 0000
0000 0000 0000 0000 0000 0000 0000 0000
0000 0000 0000 0000 0000 0000 0000 0000
0000 0000 0000 0000 0000 0000 0000 0000
0000 0000 0000 0000 0000 0000 0000 0000
0000 0000 0000 0000 0000 0000 0000 0000
0000 0000 0000 0000 0000 0000 0000 0000
0000 0000 0000 0000 0000 0000 0000 0000
0000 0000 0000 0000 0000 0000 0000 0000
0000 0000 0000 0000 0000 0000 0000 0000
0000 0000 0000 0000 0000 0000 0000 0000
0000 0000 0000 0000 0000 0000 0000 0000
0000 0000 0000 0000 0000 0000 0000 0000
0000 0000 0000 0000 0000 0000 0000 0000
0000 0000 0000 0000 0000 0000 0000 0000
0000 0000 0000 0000 0000 0000 0000 0000
0000 0000 0000 0000 0000 0000 0000 0000
0000 0000 0000 0000 0000 0000 0000 030a
020f 4a03 0902 0f49 0308 020f 4803 0702
0f47 0306 020f 4603 0502 0f45 0304 020f
4403 0302 0f43 0302 020f 4203 0102 0f41";

#[test]
fn test_cell_iterator() {
    use hex::FromHex;
    let p: Vec<u8> = Vec::from_hex(TEST_PAGE.replace([' ', '\n'], "")).expect("Invalid Hex String");
    assert_eq!(p.len(), 512);
    let mut ci = Iterator::new(std::rc::Rc::new(p), 0, 512).unwrap();
    assert_eq!(ci.next().unwrap(), Vec::from_hex("0301020f41").unwrap());
    assert_eq!(ci.next().unwrap(), Vec::from_hex("0302020f42").unwrap());
    assert_eq!(ci.next().unwrap(), Vec::from_hex("0303020f43").unwrap());
    assert_eq!(ci.next().unwrap(), Vec::from_hex("0304020f44").unwrap());
    assert_eq!(ci.next().unwrap(), Vec::from_hex("0305020f45").unwrap());
    assert_eq!(ci.next().unwrap(), Vec::from_hex("0306020f46").unwrap());
    assert_eq!(ci.next().unwrap(), Vec::from_hex("0307020f47").unwrap());
    assert_eq!(ci.next().unwrap(), Vec::from_hex("0308020f48").unwrap());
    assert_eq!(ci.next().unwrap(), Vec::from_hex("0309020f49").unwrap());
    assert_eq!(ci.next().unwrap(), Vec::from_hex("030a020f4a").unwrap());
    assert_eq!(ci.next(), None);
}

// Cell Formats from https://www.sqlite.org/fileformat2.html#b_tree_pages
//
// Table B-Tree Leaf Cell (header 0x0d):
// A varint which is the total number of bytes of payload, including any overflow
// A varint which is the integer key, a.k.a. "rowid"
// The initial portion of the payload that does not spill to overflow pages.
// A 4-byte big-endian integer page number for the first page of the overflow page list - omitted if all payload fits on the b-tree page.
//
// Table B-Tree Interior Cell (header 0x05):
// A 4-byte big-endian page number which is the left child pointer.
// A varint which is the integer key
//
// Index B-Tree Leaf Cell (header 0x0a):
// A varint which is the total number of bytes of key payload, including any overflow
// The initial portion of the payload that does not spill to overflow pages.
// A 4-byte big-endian integer page number for the first page of the overflow page list - omitted if all payload fits on the b-tree page.
//
// Index B-Tree Interior Cell (header 0x02):
// A 4-byte big-endian page number which is the left child pointer.
// A varint which is the total number of bytes of key payload, including any overflow
// The initial portion of the payload that does not spill to overflow pages.
// A 4-byte big-endian integer page number for the first page of the overflow page list - omitted if all payload fits on the b-tree page.
