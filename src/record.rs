//! Decodes the SQLite record format: a header of serial-type varints followed
//! by the column bytes those serial types describe.
//! See: https://www.sqlite.org/fileformat.html#record_format.

use crate::{serial_type, varint};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Varint in record was truncated: {0}")]
    Varint(#[from] varint::Error),
    #[error("Bad serial type in record: {0}")]
    SerialType(#[from] serial_type::Error),
    #[error("Record has fewer columns than requested: wanted index {wanted}, has {have}.")]
    ColumnOutOfRange { wanted: usize, have: usize },
}

/// Iterates over the serial-type codes in a record's header.
///
/// `s` is the byte slice for the whole record (header length varint through
/// the last column byte).
pub struct HeaderIterator<'a> {
    data: &'a [u8],
    offset: usize,
    hdr_len: usize,
}

impl<'a> HeaderIterator<'a> {
    pub fn new(s: &'a [u8]) -> HeaderIterator<'a> {
        let (hdr_len, hdr_len_len) = varint::read_varint_from_slice(s).unwrap_or((0, 0));
        HeaderIterator {
            data: s,
            offset: hdr_len_len,
            hdr_len: hdr_len as usize,
        }
    }
}

impl<'a> Iterator for HeaderIterator<'a> {
    type Item = i64;

    fn next(&mut self) -> Option<Self::Item> {
        if self.offset >= self.hdr_len {
            return None;
        }
        let (serial_type, bytes_read) =
            varint::read_varint_from_slice(&self.data[self.offset..]).ok()?;
        self.offset += bytes_read;
        Some(serial_type)
    }
}

/// Iterates over `(serial_type, value_bytes)` pairs in a record's body.
pub struct ValueIterator<'a> {
    data: &'a [u8],
    hdr_offset: usize,
    hdr_len: usize,
    value_offset: usize,
}

impl<'a> ValueIterator<'a> {
    pub fn new(s: &'a [u8]) -> ValueIterator<'a> {
        let (hdr_len, hdr_len_len) = varint::read_varint_from_slice(s).unwrap_or((0, 0));
        ValueIterator {
            data: s,
            hdr_offset: hdr_len_len,
            hdr_len: hdr_len as usize,
            value_offset: hdr_len as usize,
        }
    }
}

impl<'a> Iterator for ValueIterator<'a> {
    type Item = (i64, &'a [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        if self.hdr_offset >= self.hdr_len {
            return None;
        }
        let (serial_type, bytes_read) =
            varint::read_varint_from_slice(&self.data[self.hdr_offset..]).ok()?;
        self.hdr_offset += bytes_read;
        let value_len = serial_type::byte_len(serial_type).ok()?;
        let old_value_offset = self.value_offset;
        self.value_offset += value_len;
        if self.value_offset > self.data.len() {
            return None;
        }
        Some((serial_type, &self.data[old_value_offset..self.value_offset]))
    }
}

/// Splits an index-leaf or index-interior payload record into the key bytes
/// (every column but the last) and the trailing rowid column.
///
/// Walks the header varints in order and slices by the computed byte ranges;
/// does not rely on the first serial type happening to be single-byte.
pub fn split_index_key_record(record: &[u8]) -> Result<(&[u8], i64), Error> {
    let serial_types: Vec<i64> = HeaderIterator::new(record).collect();
    if serial_types.is_empty() {
        return Err(Error::ColumnOutOfRange { wanted: 0, have: 0 });
    }
    let (hdr_len, _) = varint::read_varint_from_slice(record)?;
    let mut offsets = Vec::with_capacity(serial_types.len() + 1);
    let mut pos = hdr_len as usize;
    offsets.push(pos);
    for st in &serial_types {
        pos += serial_type::byte_len(*st)?;
        offsets.push(pos);
    }
    let last = serial_types.len() - 1;
    let key_bytes = &record[offsets[0]..offsets[last]];
    let rowid_serial_type = serial_types[last];
    let rowid_bytes = &record[offsets[last]..offsets[last + 1]];
    let rowid = match serial_type::to_sql_value(&rowid_serial_type, rowid_bytes)? {
        crate::sql_value::SqlValue::Int(i) => i,
        _ => {
            return Err(Error::ColumnOutOfRange {
                wanted: last,
                have: last,
            })
        }
    };
    Ok((key_bytes, rowid))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_iterator_literal_one() {
        let test_record: &[u8] = &[0x02, 0x09];
        let mut hi = HeaderIterator::new(test_record);
        assert_eq!(hi.next(), Some(9));
        assert_eq!(hi.next(), None);
    }

    #[test]
    fn test_header_iterator_five_one_byte_ints_value_ten() {
        let test_record: &[u8] = &[
            0x06, 0x01, 0x01, 0x01, 0x01, 0x01, 0x0a, 0x0a, 0x0a, 0x0a, 0x0a,
        ];
        let mut hi = HeaderIterator::new(test_record);
        for _ in 0..5 {
            assert_eq!(hi.next(), Some(1));
        }
        assert_eq!(hi.next(), None);
    }

    #[test]
    fn test_header_iterator_various_types() {
        let test_record: &[u8] = &[
            0x06, 0x08, 0x09, 0x07, 0x13, 0x00, 0x40, 0x09, 0x21, 0xca, 0xc0, 0x83, 0x12, 0x6f,
            0x54, 0x65, 0x6e,
        ];
        let mut hi = HeaderIterator::new(test_record);
        assert_eq!(hi.next(), Some(8));
        assert_eq!(hi.next(), Some(9));
        assert_eq!(hi.next(), Some(7));
        assert_eq!(hi.next(), Some(0x13));
        assert_eq!(hi.next(), Some(0));
        assert_eq!(hi.next(), None);
    }

    #[test]
    fn test_value_iterator_one_byte_int() {
        let test_record: &[u8] = &[0x02, 0x09];
        let mut hi = ValueIterator::new(test_record);
        assert_eq!(hi.next(), Some((9, &[][..])));
        assert_eq!(hi.next(), None);
    }

    #[test]
    fn test_value_iterator_five_one_byte_ints() {
        let test_record: &[u8] = &[0x06, 0x01, 0x01, 0x01, 0x01, 0x01, 0x0a, 0x0b, 0x0c, 0x0d, 0x0e];
        let mut hi = ValueIterator::new(test_record);
        assert_eq!(hi.next(), Some((1, &[10][..])));
        assert_eq!(hi.next(), Some((1, &[11][..])));
        assert_eq!(hi.next(), Some((1, &[12][..])));
        assert_eq!(hi.next(), Some((1, &[13][..])));
        assert_eq!(hi.next(), Some((1, &[14][..])));
        assert_eq!(hi.next(), None);
    }

    #[test]
    fn test_value_iterator_various_types() {
        let test_record: &[u8] = &[
            0x06, 0x08, 0x09, 0x07, 0x13, 0x00, 0x40, 0x09, 0x21, 0xca, 0xc0, 0x83, 0x12, 0x6f,
            0x54, 0x65, 0x6e,
        ];
        let mut hi = ValueIterator::new(test_record);
        assert_eq!(hi.next(), Some((8, &[][..])));
        assert_eq!(hi.next(), Some((9, &[][..])));
        assert_eq!(
            hi.next(),
            Some((7, &[0x40, 0x09, 0x21, 0xca, 0xc0, 0x83, 0x12, 0x6f][..]))
        );
        assert_eq!(hi.next(), Some((0x13, &b"Ten"[..])));
        assert_eq!(hi.next(), Some((0, &[][..])));
        assert_eq!(hi.next(), None);
    }

    #[test]
    fn test_split_index_key_record_single_column_key() {
        // header: len=4, serial types [0x13 ("Ten", len 3), 0x01 (1 byte int)]
        // body: "Ten" then rowid byte 42.
        let record: &[u8] = &[0x04, 0x13, 0x01, b'T', b'e', b'n', 42];
        let (key, rowid) = split_index_key_record(record).unwrap();
        assert_eq!(key, b"Ten");
        assert_eq!(rowid, 42);
    }

    #[test]
    fn test_split_index_key_record_multibyte_first_serial_type() {
        // Regression case for the off-by-one slicing bug this replaces:
        // first serial type itself needs two header bytes to encode (text of
        // length 70 => serial type 153, which needs a 2-byte varint).
        let text_len = 70;
        let serial_type_text = 13 + 2 * text_len;
        let mut record = vec![];
        // header length: 1 (self) + 2 (text serial type varint) + 1 (rowid serial type) = 4
        record.push(4u8);
        // varint-encode serial_type_text (153) as two bytes: 0x81 0x19
        let hi = ((serial_type_text >> 7) & 0x7f) as u8 | 0x80;
        let lo = (serial_type_text & 0x7f) as u8;
        record.push(hi);
        record.push(lo);
        record.push(0x01); // rowid serial type: 1-byte int
        record.extend(std::iter::repeat(b'x').take(text_len as usize));
        record.push(99); // rowid value
        let (key, rowid) = split_index_key_record(&record).unwrap();
        assert_eq!(key, vec![b'x'; text_len as usize]);
        assert_eq!(rowid, 99);
    }
}
