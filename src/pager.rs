//! Manages pages from a sqlite3 file as defined at https://www.sqlite.org/fileformat.html
//! Supports a simplified, read-only subset of the file format: table and index
//! b-tree pages. Freelist pages, pointer-map pages, and overflow pages are not
//! produced by any database this crate creates, and are not read either.
//!
//! The pager owns the data in each page it has read and hands out cheap
//! clones of an `Rc` so callers don't re-read a page already in memory.
//! Pages are loaded on demand. All pages in a given file have the same size,
//! which is read from the file's own header rather than assumed.

use std::cell::RefCell;
use std::io::{Read, Seek, SeekFrom};
use std::rc::Rc;

pub struct Pager {
    f: RefCell<std::fs::File>,
    pages: RefCell<Vec<Option<Rc<Vec<u8>>>>>,
    page_size: u32,
    num_pages: u32,
}

#[derive(thiserror::Error, Debug, Clone)]
pub enum Error {
    #[error("The page number is higher than the file contains or the code supports.")]
    PageNumberBeyondLimits,
    #[error("Error reading file.")]
    ReadFailed,
    #[error("Error opening file: {0}")]
    OpenFailed(String),
    #[error("Bad database file header: {0}")]
    Header(#[from] crate::dbheader::Error),
}

/// Page numbers are 1-based, to match how SQLite numbers pages.
pub type PageNum = usize;

// 10_000 pages is plenty for the databases this crate is meant to read, and
// keeps a pathological page count from blowing up the page cache.
const MAX_PAGE_NUM: PageNum = 10_000;

impl Pager {
    /// Opens `path` and reads its file header to learn the page size and page
    /// count used for the rest of this pager's lifetime.
    pub fn open(path: &str) -> Result<Self, Error> {
        let mut f = std::fs::OpenOptions::new()
            .read(true)
            .write(false)
            .create(false)
            .open(path)
            .map_err(|e| Error::OpenFailed(e.to_string()))?;
        let hdr = crate::dbheader::get_header_clone(&mut f)?;
        if hdr.numpages > MAX_PAGE_NUM as u32 {
            return Err(Error::PageNumberBeyondLimits);
        }
        Ok(Pager {
            f: RefCell::new(f),
            pages: RefCell::new(vec![None; hdr.numpages as usize]),
            page_size: hdr.pagesize,
            num_pages: hdr.numpages,
        })
    }

    pub fn get_page_size(&self) -> u32 {
        self.page_size
    }

    pub fn get_num_pages(&self) -> u32 {
        self.num_pages
    }

    fn read_page_from_file(&self, pn: PageNum) -> Result<Vec<u8>, Error> {
        let mut v = vec![0_u8; self.page_size as usize];
        let mut f = self.f.borrow_mut();
        f.seek(SeekFrom::Start((pn - 1) as u64 * self.page_size as u64))
            .map_err(|_| Error::ReadFailed)?;
        f.read_exact(&mut v[..]).map_err(|_| Error::ReadFailed)?;
        Ok(v)
    }

    /// Returns the bytes of page `pn`, loading it from disk on first access
    /// and serving later requests from the in-memory cache.
    ///
    /// A page number past `num_pages` is a hard error here: a trailing
    /// child/right-most pointer that legitimately has nowhere left to point
    /// is a btree-traversal-level concept (callers check `get_num_pages()`
    /// before descending), not something this layer can distinguish from a
    /// truncated or corrupt file by the page number alone.
    pub fn get_page_ro(&self, pn: PageNum) -> Result<Rc<Vec<u8>>, Error> {
        if pn == 0 || pn > MAX_PAGE_NUM {
            return Err(Error::PageNumberBeyondLimits);
        }
        if let Some(Some(p)) = self.pages.borrow().get(pn - 1) {
            return Ok(Rc::clone(p));
        }
        let data = Rc::new(self.read_page_from_file(pn)?);
        let mut pages = self.pages.borrow_mut();
        if pn > pages.len() {
            pages.resize(pn, None);
        }
        pages[pn - 1] = Some(Rc::clone(&data));
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    /// Builds a minimal one-page database file: a valid 100-byte header
    /// (page size 512, legacy format) followed by an empty table-leaf page.
    fn write_minimal_db(path: &std::path::Path) {
        let mut buf = vec![0u8; 512];
        buf[0..16].copy_from_slice(b"SQLite format 3\0");
        buf[16..18].copy_from_slice(&512u16.to_be_bytes());
        buf[18] = 1;
        buf[19] = 1;
        buf[28..32].copy_from_slice(&1u32.to_be_bytes());
        buf[100] = 0x0d; // table leaf page header, right at the 100-byte offset.
        let mut f = std::fs::File::create(path).unwrap();
        f.write_all(&buf).unwrap();
    }

    fn temp_db_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("litequery_pager_test_{}_{}.db", name, std::process::id()))
    }

    #[test]
    fn test_open_minimal_db() {
        let path = temp_db_path("open");
        write_minimal_db(&path);
        let pager = Pager::open(path.to_str().unwrap()).expect("Should have opened db.");
        assert_eq!(pager.get_page_size(), 512);
        assert_eq!(pager.get_num_pages(), 1);
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_get_page_ro_caches() {
        let path = temp_db_path("cache");
        write_minimal_db(&path);
        let pager = Pager::open(path.to_str().unwrap()).expect("Should have opened db.");
        let p1 = pager.get_page_ro(1).unwrap();
        let p2 = pager.get_page_ro(1).unwrap();
        assert!(Rc::ptr_eq(&p1, &p2));
        std::fs::remove_file(&path).unwrap();
    }
}
