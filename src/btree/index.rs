//! Searches an index b-tree for rows whose indexed column equals a target
//! key, without scanning the table it indexes.
//!
//! Keys are compared byte-wise (lexicographic), matching SQLite's default
//! BINARY collation and this crate's WHERE-equality support, which only
//! ever searches for a quoted text literal.

use super::{cell, header, PageType};
use crate::pager::{PageNum, Pager};
use crate::sql_value::SqlValue;
use std::cmp::Ordering;
use std::rc::Rc;

type RowId = i64;

#[derive(thiserror::Error, Debug, Clone)]
pub enum Error {
    #[error("Error reading page: {0}")]
    Pager(#[from] crate::pager::Error),
    #[error("Error reading btree page header: {0}")]
    Header(#[from] header::Error),
    #[error("Error decoding varint in index cell: {0}")]
    Varint(#[from] crate::varint::Error),
    #[error("Error decoding index key value: {0}")]
    SerialType(#[from] crate::serial_type::Error),
    #[error("Index key payload spills to an overflow page, which this crate does not read.")]
    Overflow,
    #[error("Index key record had no columns.")]
    EmptyKey,
    #[error("Index key record's trailing column did not decode as the rowid integer.")]
    MalformedRowid,
    #[error("Interior index btree page had no rightmost pointer.")]
    MissingRightmostPointer,
    #[error("Encountered a table page while walking an index btree.")]
    UnexpectedTablePage,
}

fn btree_start_offset(pgnum: PageNum) -> usize {
    match pgnum {
        1 => 100,
        _ => 0,
    }
}

/// An index cell's payload is an ordinary record: the indexed column
/// followed by a trailing rowid column. Returns the indexed column's raw
/// bytes and the decoded rowid.
fn decode_index_payload(payload: &[u8]) -> Result<(Vec<u8>, RowId), Error> {
    let cols: Vec<(i64, &[u8])> = crate::record::ValueIterator::new(payload).collect();
    let (_, first_data) = *cols.first().ok_or(Error::EmptyKey)?;
    let (last_st, last_data) = *cols.last().ok_or(Error::EmptyKey)?;
    let rowid = match crate::serial_type::to_sql_value(&last_st, last_data)? {
        SqlValue::Int(i) => i,
        _ => return Err(Error::MalformedRowid),
    };
    Ok((first_data.to_vec(), rowid))
}

fn decode_leaf_cell(cell: &[u8]) -> Result<(Vec<u8>, RowId), Error> {
    let (payload_len, n) = crate::varint::read_varint_from_slice(cell)?;
    let payload = &cell[n..];
    if payload.len() != payload_len as usize {
        return Err(Error::Overflow);
    }
    decode_index_payload(payload)
}

fn decode_interior_cell(cell: &[u8]) -> Result<(PageNum, Vec<u8>, RowId), Error> {
    let left_child = u32::from_be_bytes(cell[0..4].try_into().unwrap()) as PageNum;
    let (payload_len, n) = crate::varint::read_varint_from_slice(&cell[4..])?;
    let payload = &cell[4 + n..];
    if payload.len() != payload_len as usize {
        return Err(Error::Overflow);
    }
    let (key, rowid) = decode_index_payload(payload)?;
    Ok((left_child, key, rowid))
}

/// Returns the rowids of every index entry whose key equals `target`.
pub fn search_equal(pager: &Pager, root_page: PageNum, target: &[u8]) -> Result<Vec<RowId>, Error> {
    let mut out = Vec::new();
    visit(pager, root_page, target, &mut out)?;
    Ok(out)
}

fn visit(pager: &Pager, pgnum: PageNum, target: &[u8], out: &mut Vec<RowId>) -> Result<(), Error> {
    if pgnum as u32 > pager.get_num_pages() {
        return Ok(());
    }
    let page = pager.get_page_ro(pgnum)?;
    let hdr = header::check_header(&page, btree_start_offset(pgnum))?;
    match hdr.btree_page_type {
        PageType::IndexLeaf => {
            let ci = cell::Iterator::new(
                Rc::clone(&page),
                btree_start_offset(pgnum),
                pager.get_page_size(),
            )?;
            for raw in ci {
                let (key, rowid) = decode_leaf_cell(&raw)?;
                match key.as_slice().cmp(target) {
                    Ordering::Equal => out.push(rowid),
                    // Index entries are sorted ascending; nothing past this can match.
                    Ordering::Greater => break,
                    Ordering::Less => {}
                }
            }
            Ok(())
        }
        PageType::IndexInterior => {
            let rmp = hdr.rightmost_pointer.ok_or(Error::MissingRightmostPointer)? as PageNum;
            let ci = cell::Iterator::new(
                Rc::clone(&page),
                btree_start_offset(pgnum),
                pager.get_page_size(),
            )?;
            let mut entries = Vec::new();
            for raw in ci {
                entries.push(decode_interior_cell(&raw)?);
            }
            if entries.is_empty() {
                return visit(pager, rmp, target, out);
            }
            if target.cmp(entries[0].1.as_slice()) == Ordering::Less {
                return visit(pager, entries[0].0, target, out);
            }
            if target.cmp(entries[entries.len() - 1].1.as_slice()) == Ordering::Greater {
                return visit(pager, rmp, target, out);
            }
            let mut found_larger = false;
            for (child, key, rowid) in &entries {
                match key.as_slice().cmp(target) {
                    Ordering::Equal => {
                        out.push(*rowid);
                        visit(pager, *child, target, out)?;
                    }
                    Ordering::Greater => {
                        visit(pager, *child, target, out)?;
                        found_larger = true;
                        break;
                    }
                    Ordering::Less => {}
                }
            }
            if !found_larger {
                visit(pager, rmp, target, out)?;
            }
            Ok(())
        }
        PageType::TableInterior | PageType::TableLeaf => Err(Error::UnexpectedTablePage),
    }
}
