//! Iterates over the records of a table b-tree, hiding the fact that the
//! tree spans several pages, and supports jumping directly to a row by its
//! rowid without a full scan.

use super::{cell, header, leaf, PageType, RowId};
use crate::pager::{PageNum, Pager};
use std::rc::Rc;

#[derive(thiserror::Error, Debug, Clone)]
pub enum Error {
    #[error("Error reading page: {0}")]
    Pager(#[from] crate::pager::Error),
    #[error("Error reading btree page header: {0}")]
    Header(#[from] header::Error),
    #[error("Error decoding leaf cell: {0}")]
    Leaf(#[from] leaf::Error),
    #[error("Error decoding varint in interior cell: {0}")]
    Varint(#[from] crate::varint::Error),
    #[error("Interior table btree page had no rightmost pointer.")]
    MissingRightmostPointer,
    #[error("Encountered an index page while walking a table btree.")]
    UnexpectedIndexPage,
}

fn btree_start_offset(pgnum: PageNum) -> usize {
    match pgnum {
        1 => 100,
        _ => 0,
    }
}

/// Parses a table-interior page into its (key, left_child) entries, in key
/// order, plus the right-most child pointer.
fn parse_interior_cells(
    page: &Rc<Vec<u8>>,
    pgnum: PageNum,
    page_size: u32,
) -> Result<(Vec<(RowId, PageNum)>, PageNum), Error> {
    let hdr = header::check_header(page, btree_start_offset(pgnum))?;
    let rmp = hdr.rightmost_pointer.ok_or(Error::MissingRightmostPointer)? as PageNum;
    let ci = cell::Iterator::new(Rc::clone(page), btree_start_offset(pgnum), page_size)?;
    let mut entries = Vec::new();
    for cell in ci {
        let left_child = u32::from_be_bytes(cell[0..4].try_into().unwrap()) as PageNum;
        let (key, _) = crate::varint::read_varint_from_slice(&cell[4..])?;
        entries.push((key, left_child));
    }
    Ok((entries, rmp))
}

struct InteriorChildren {
    child_pagenums: Vec<PageNum>,
    idx: usize,
}

impl InteriorChildren {
    fn new(page: &Rc<Vec<u8>>, pgnum: PageNum, page_size: u32) -> Result<Self, Error> {
        let (entries, rmp) = parse_interior_cells(page, pgnum, page_size)?;
        let mut child_pagenums: Vec<PageNum> = entries.into_iter().map(|(_, c)| c).collect();
        child_pagenums.push(rmp);
        Ok(InteriorChildren {
            child_pagenums,
            idx: 0,
        })
    }
}

impl core::iter::Iterator for InteriorChildren {
    type Item = PageNum;
    fn next(&mut self) -> Option<PageNum> {
        let v = self.child_pagenums.get(self.idx).copied()?;
        self.idx += 1;
        Some(v)
    }
}

enum EitherIter {
    Leaf(leaf::Iterator),
    Interior(InteriorChildren),
}

/// Performs a full, in-order scan of every row in a table btree.
pub struct Iterator<'p> {
    root_page: PageNum,
    pager: &'p Pager,
    stack: Vec<EitherIter>,
}

impl<'p> Iterator<'p> {
    pub fn new(root_page: PageNum, pager: &'p Pager) -> Iterator<'p> {
        Iterator {
            root_page,
            pager,
            stack: vec![],
        }
    }

    fn seek_leftmost_leaf(&mut self, starting_page: PageNum) -> Result<(), Error> {
        let mut next_page = starting_page;
        loop {
            if next_page as u32 > self.pager.get_num_pages() {
                self.stack.push(EitherIter::Leaf(leaf::Iterator::new(cell::Iterator::empty())));
                return Ok(());
            }
            let page = self.pager.get_page_ro(next_page)?;
            let hdr = header::check_header(&page, btree_start_offset(next_page))?;
            match hdr.btree_page_type {
                PageType::TableLeaf => {
                    let ci = cell::Iterator::new(
                        Rc::clone(&page),
                        btree_start_offset(next_page),
                        self.pager.get_page_size(),
                    )?;
                    self.stack.push(EitherIter::Leaf(leaf::Iterator::new(ci)));
                    return Ok(());
                }
                PageType::TableInterior => {
                    let mut children =
                        InteriorChildren::new(&page, next_page, self.pager.get_page_size())?;
                    let first_child = children
                        .next()
                        .expect("an interior page always has at least one child");
                    self.stack.push(EitherIter::Interior(children));
                    next_page = first_child;
                }
                PageType::IndexInterior | PageType::IndexLeaf => {
                    return Err(Error::UnexpectedIndexPage);
                }
            }
        }
    }
}

impl<'p> core::iter::Iterator for Iterator<'p> {
    type Item = Result<(RowId, Vec<u8>), Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.stack.is_empty() {
            if let Err(e) = self.seek_leftmost_leaf(self.root_page) {
                return Some(Err(e));
            }
        }
        while !self.stack.is_empty() {
            match self.stack.last_mut().unwrap() {
                EitherIter::Leaf(l) => match l.next() {
                    Some(Ok(x)) => return Some(Ok(x)),
                    Some(Err(e)) => return Some(Err(e.into())),
                    None => {
                        self.stack.pop();
                        continue;
                    }
                },
                EitherIter::Interior(i) => match i.next() {
                    Some(child) => {
                        if let Err(e) = self.seek_leftmost_leaf(child) {
                            return Some(Err(e));
                        }
                        continue;
                    }
                    None => {
                        self.stack.pop();
                        continue;
                    }
                },
            }
        }
        None
    }
}

/// Looks up a single row by rowid without scanning the rest of the table.
///
/// At each interior page, does a binary search for the smallest cell whose
/// key is >= `target`, and descends into that cell's left child (or the
/// right-most pointer, if `target` is greater than every key on the page).
/// This does not special-case the first/last key on a page: the search
/// naturally lands on the right-most pointer when `target` exceeds every
/// key, and on the first child when it is less than every key.
pub fn seek_to_rowid(
    pager: &Pager,
    root_page: PageNum,
    target: RowId,
) -> Result<Option<Vec<u8>>, Error> {
    let mut pgnum = root_page;
    loop {
        if pgnum as u32 > pager.get_num_pages() {
            return Ok(None);
        }
        let page = pager.get_page_ro(pgnum)?;
        let hdr = header::check_header(&page, btree_start_offset(pgnum))?;
        match hdr.btree_page_type {
            PageType::TableLeaf => {
                let ci = cell::Iterator::new(
                    Rc::clone(&page),
                    btree_start_offset(pgnum),
                    pager.get_page_size(),
                )?;
                for raw_cell in ci {
                    let (rowid, payload) = leaf::decode_leaf_cell(&raw_cell)?;
                    if rowid == target {
                        return Ok(Some(payload));
                    }
                }
                return Ok(None);
            }
            PageType::TableInterior => {
                let (entries, rmp) = parse_interior_cells(&page, pgnum, pager.get_page_size())?;
                let pos = entries.partition_point(|(key, _)| *key < target);
                pgnum = match entries.get(pos) {
                    Some((_, child)) => *child,
                    None => rmp,
                };
            }
            PageType::IndexInterior | PageType::IndexLeaf => {
                return Err(Error::UnexpectedIndexPage);
            }
        }
    }
}

/// Counts the rows in a table without decoding any row's payload: sums
/// `num_cells` over every leaf-table page reachable from `root_page`.
pub fn count_rows(pager: &Pager, root_page: PageNum) -> Result<i64, Error> {
    if root_page as u32 > pager.get_num_pages() {
        return Ok(0);
    }
    let page = pager.get_page_ro(root_page)?;
    let hdr = header::check_header(&page, btree_start_offset(root_page))?;
    match hdr.btree_page_type {
        PageType::TableLeaf => Ok(hdr.num_cells as i64),
        PageType::TableInterior => {
            let (entries, rmp) = parse_interior_cells(&page, root_page, pager.get_page_size())?;
            let mut total = 0i64;
            for (_, child) in entries {
                total += count_rows(pager, child)?;
            }
            total += count_rows(pager, rmp)?;
            Ok(total)
        }
        PageType::IndexInterior | PageType::IndexLeaf => Err(Error::UnexpectedIndexPage),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn one_cell_leaf_page() -> Vec<u8> {
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
    fn test_interior_children_all_have_rightmost() {
        // Single interior page with no cells, rightmost pointer to page 5.
        let mut page = vec![0u8; 512];
        page[0] = 0x05;
        page[8..12].copy_from_slice(&5u32.to_be_bytes());
        let rc = Rc::new(page);
        let mut children = InteriorChildren::new(&rc, 2, 512).unwrap();
        assert_eq!(children.next(), Some(5));
        assert_eq!(children.next(), None);
    }

    #[test]
    fn test_leaf_page_decodes_via_cell_module() {
        let page = Rc::new(one_cell_leaf_page());
        let ci = cell::Iterator::new(page, 0, 512).unwrap();
        let mut li = leaf::Iterator::new(ci);
        let (rowid, payload) = li.next().unwrap().unwrap();
        assert_eq!(rowid, 1);
        assert_eq!(payload, vec![0x02, 0x01, 42]);
    }

    fn minimal_one_page_db(path: &std::path::Path) {
        let mut buf = vec![0u8; 512];
        buf[0..16].copy_from_slice(b"SQLite format 3\0");
        buf[16..18].copy_from_slice(&512u16.to_be_bytes());
        buf[18] = 1;
        buf[19] = 1;
        buf[28..32].copy_from_slice(&1u32.to_be_bytes());
        buf[100] = 0x0d;
        std::fs::write(path, &buf).unwrap();
    }

    /// A child/right-most pointer past the last allocated page is treated as
    /// an empty subtree rather than a fatal error.
    #[test]
    fn test_count_rows_and_seek_past_eof_are_empty() {
        let path = std::env::temp_dir().join(format!("litequery_table_eof_{}.db", std::process::id()));
        minimal_one_page_db(&path);
        let pager = crate::pager::Pager::open(path.to_str().unwrap()).unwrap();
        assert_eq!(count_rows(&pager, 5).unwrap(), 0);
        assert_eq!(seek_to_rowid(&pager, 5, 1).unwrap(), None);
        std::fs::remove_file(&path).unwrap();
    }
}
