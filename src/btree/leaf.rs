//! Iterates over the cells of a table b-tree leaf page, decoding each cell's
//! rowid and payload bytes.

use super::cell;
use super::RowId;

#[derive(thiserror::Error, Debug, Clone)]
pub enum Error {
    #[error("Cell was truncated before its rowid/payload-length varints: {0}")]
    Varint(#[from] crate::varint::Error),
    #[error("Payload spills to an overflow page, which this crate does not read.")]
    Overflow,
}

pub struct Iterator {
    ci: cell::Iterator,
}

impl Iterator {
    pub fn new(ci: cell::Iterator) -> Iterator {
        Iterator { ci }
    }
}

impl core::iter::Iterator for Iterator {
    type Item = Result<(RowId, Vec<u8>), Error>;

    fn next(&mut self) -> Option<Self::Item> {
        let cell = self.ci.next()?;
        Some(decode_leaf_cell(&cell))
    }
}

pub(crate) fn decode_leaf_cell(cell: &[u8]) -> Result<(RowId, Vec<u8>), Error> {
    let (payload_len, n1) = crate::varint::read_varint_from_slice(cell)?;
    let (rowid, n2) = crate::varint::read_varint_from_slice(&cell[n1..])?;
    let offset = n1 + n2;
    if cell.len() - offset != payload_len as usize {
        return Err(Error::Overflow);
    }
    Ok((rowid as RowId, cell[offset..].to_vec()))
}

#[cfg(test)]
fn one_cell_leaf_page() -> Vec<u8> {
    // A 512-byte table-leaf page with a single cell: rowid 1, payload is a
    // one-column record holding the 1-byte int 42.
    let mut page = vec![0u8; 512];
    page[0] = 0x0d;
    page[3..5].copy_from_slice(&1u16.to_be_bytes());
    let cell: &[u8] = &[0x03, 0x01, 0x02, 0x01, 42];
    let cell_start = 512 - cell.len();
    page[5..7].copy_from_slice(&(cell_start as u16).to_be_bytes());
    page[8..10].copy_from_slice(&(cell_start as u16).to_be_bytes());
    page[cell_start..512].copy_from_slice(cell);
    page
}

#[test]
fn test_leaf_iterator_single_cell() {
    let page = std::rc::Rc::new(one_cell_leaf_page());
    let ci = cell::Iterator::new(page, 0, 512).unwrap();
    let mut li = Iterator::new(ci);

    let (rowid, payload) = li.next().unwrap().unwrap();
    assert_eq!(rowid, 1);
    assert_eq!(payload, vec![0x02, 0x01, 42]);
    assert!(li.next().is_none());
}
