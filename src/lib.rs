//! Top-level query executor: resolves table/index names through the schema
//! page, picks a full scan or an index-driven plan, and materializes rows.

mod ast;
mod btree;
mod dbheader;
pub mod pager;
pub mod parser;
mod pt_to_ast;
mod record;
mod serial_type;
mod sql_value;
mod varint;

extern crate pest;
#[macro_use]
extern crate pest_derive;

use sql_value::SqlValue;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Error reading page: {0}")]
    Pager(#[from] pager::Error),
    #[error("Error walking table btree: {0}")]
    Table(#[from] btree::table::Error),
    #[error("Error walking index btree: {0}")]
    Index(#[from] btree::index::Error),
    #[error("Error reading btree page header: {0}")]
    Header(#[from] btree::header::Error),
    #[error("Error decoding record: {0}")]
    Record(#[from] record::Error),
    #[error("Error decoding value: {0}")]
    SerialType(#[from] serial_type::Error),
    #[error("No such table: {0}")]
    SchemaNotFound(String),
    #[error("Error parsing SQL: {0}")]
    Parse(#[from] anyhow::Error),
    #[error("No column named {0} in table {1}")]
    NoSuchColumn(String, String),
    #[error("Unsupported SELECT list: {0}")]
    UnsupportedQuery(String),
}

// Page 1 is always a btree page, and is the root page of the schema table.
const SCHEMA_TABLE_NAME: &str = "sqlite_schema";
const SCHEMA_BTREE_ROOT_PAGENUM: pager::PageNum = 1;
const SCHEMA_SCHEMA: &str =
    "CREATE TABLE sqlite_schema (type text, name text, tbl_name text, rootpage integer, sql text)";
const SCHEMA_TABLE_TYPE_COLIDX: usize = 0;
const SCHEMA_TABLE_NAME_COLIDX: usize = 1;
const SCHEMA_TABLE_TBL_NAME_COLIDX: usize = 2;
const SCHEMA_TABLE_ROOTPAGE_COLIDX: usize = 3;
const SCHEMA_TABLE_SQL_COLIDX: usize = 4;

struct SchemaRecord {
    kind: String,
    rootpage: pager::PageNum,
    sql: String,
}

fn read_schema_records(pgr: &pager::Pager) -> Result<Vec<SchemaRecord>, Error> {
    let mut out = vec![];
    for item in new_table_iterator(pgr, SCHEMA_BTREE_ROOT_PAGENUM) {
        let (_, payload) = item?;
        let vi = record::ValueIterator::new(&payload);
        let row = vi.collect::<Vec<(i64, &[u8])>>();
        let kind = serial_type::value_to_string(&row[SCHEMA_TABLE_TYPE_COLIDX].0, row[SCHEMA_TABLE_TYPE_COLIDX].1);
        let rootpage = serial_type::value_to_i64(
            &row[SCHEMA_TABLE_ROOTPAGE_COLIDX].0,
            row[SCHEMA_TABLE_ROOTPAGE_COLIDX].1,
        )? as pager::PageNum;
        let sql = serial_type::value_to_string(&row[SCHEMA_TABLE_SQL_COLIDX].0, row[SCHEMA_TABLE_SQL_COLIDX].1);
        out.push(SchemaRecord { kind, rootpage, sql });
    }
    Ok(out)
}

/// Looks up the root page number and recorded `CREATE TABLE` text for
/// `table_name`, scanning the schema table if it's not `sqlite_schema` itself.
pub fn get_creation_sql_and_root_pagenum(
    pgr: &pager::Pager,
    table_name: &str,
) -> Result<Option<(pager::PageNum, String)>, Error> {
    if table_name == SCHEMA_TABLE_NAME {
        return Ok(Some((SCHEMA_BTREE_ROOT_PAGENUM, String::from(SCHEMA_SCHEMA))));
    }
    for item in new_table_iterator(pgr, SCHEMA_BTREE_ROOT_PAGENUM) {
        let (_, payload) = item?;
        let vi = record::ValueIterator::new(&payload);
        let row = vi.collect::<Vec<(i64, &[u8])>>();
        let this_table_name =
            serial_type::value_to_string(&row[SCHEMA_TABLE_TBL_NAME_COLIDX].0, row[SCHEMA_TABLE_TBL_NAME_COLIDX].1);
        if this_table_name != table_name {
            continue;
        }
        let root_pagenum = serial_type::value_to_i64(
            &row[SCHEMA_TABLE_ROOTPAGE_COLIDX].0,
            row[SCHEMA_TABLE_ROOTPAGE_COLIDX].1,
        )? as pager::PageNum;
        let creation_sql =
            serial_type::value_to_string(&row[SCHEMA_TABLE_SQL_COLIDX].0, row[SCHEMA_TABLE_SQL_COLIDX].1);
        return Ok(Some((root_pagenum, creation_sql)));
    }
    Ok(None)
}

/// Finds an index over `column` of `table`, if the schema has one, by
/// parsing each `CREATE INDEX` record's own text rather than matching on
/// the index's name.
fn find_index_on_column(
    pgr: &pager::Pager,
    table_name: &str,
    column: &str,
) -> Result<Option<pager::PageNum>, Error> {
    for rec in read_schema_records(pgr)? {
        if rec.kind != "index" {
            continue;
        }
        let Ok(idx) = pt_to_ast::pt_create_index_statement_to_ast(&rec.sql) else {
            continue;
        };
        if idx.tablename == table_name && idx.colname.name == column {
            return Ok(Some(rec.rootpage));
        }
    }
    Ok(None)
}

pub fn new_table_iterator(pgr: &pager::Pager, pgnum: pager::PageNum) -> btree::table::Iterator<'_> {
    btree::table::Iterator::new(pgnum, pgr)
}

/// Reports the page size and the number of entries in the schema table,
/// matching what `.dbinfo` prints.
pub fn dbinfo(pgr: &pager::Pager) -> Result<(u32, i64), Error> {
    let page = pgr.get_page_ro(SCHEMA_BTREE_ROOT_PAGENUM)?;
    let hdr = btree::header::check_header(&page, 100)?;
    Ok((pgr.get_page_size(), hdr.num_cells as i64))
}

/// Lists user table names (schema records of type `table`), alphabetized.
pub fn table_names(pgr: &pager::Pager) -> Result<Vec<String>, Error> {
    let mut names: Vec<String> = vec![];
    for item in new_table_iterator(pgr, SCHEMA_BTREE_ROOT_PAGENUM) {
        let (_, payload) = item?;
        let vi = record::ValueIterator::new(&payload);
        let row = vi.collect::<Vec<(i64, &[u8])>>();
        let kind = serial_type::value_to_string(&row[SCHEMA_TABLE_TYPE_COLIDX].0, row[SCHEMA_TABLE_TYPE_COLIDX].1);
        if kind != "table" {
            continue;
        }
        let name = serial_type::value_to_string(&row[SCHEMA_TABLE_NAME_COLIDX].0, row[SCHEMA_TABLE_NAME_COLIDX].1);
        names.push(name);
    }
    names.sort();
    Ok(names)
}

/// Runs a parsed `SELECT` statement and returns its rows as already-rendered
/// columns, in final emission order.
pub fn run_select(pgr: &pager::Pager, query: &str) -> Result<Vec<Vec<String>>, Error> {
    let stmt = pt_to_ast::pt_select_statement_to_ast(query).map_err(Error::Parse)?;

    let (root_pagenum, create_statement) = get_creation_sql_and_root_pagenum(pgr, &stmt.from.tablename)?
        .ok_or_else(|| Error::SchemaNotFound(stmt.from.tablename.clone()))?;
    let (_, col_names) = pt_to_ast::parse_create_statement(&create_statement).map_err(Error::Parse)?;

    if stmt.select.items == [ast::SelItem::CountStar] {
        let n = btree::table::count_rows(pgr, root_pagenum)?;
        return Ok(vec![vec![n.to_string()]]);
    }

    let projected_idxs: Vec<usize> = match &stmt.select.items[..] {
        [ast::SelItem::Star] => (0..col_names.len()).collect(),
        items => items
            .iter()
            .map(|it| match it {
                ast::SelItem::ColName(c) => col_names
                    .iter()
                    .position(|n| n == &c.name)
                    .ok_or_else(|| Error::NoSuchColumn(c.name.clone(), stmt.from.tablename.clone())),
                ast::SelItem::CountStar => Err(Error::UnsupportedQuery(
                    "count(*) cannot be mixed with other select items".to_string(),
                )),
                ast::SelItem::Star => Err(Error::UnsupportedQuery(
                    "* cannot be mixed with other select items".to_string(),
                )),
            })
            .collect::<Result<Vec<_>, _>>()?,
    };

    let where_colidx = match &stmt.r#where {
        Some(w) => Some(
            col_names
                .iter()
                .position(|n| n == &w.colname.name)
                .ok_or_else(|| Error::NoSuchColumn(w.colname.name.clone(), stmt.from.tablename.clone()))?,
        ),
        None => None,
    };

    let mut rows: Vec<(i64, Vec<u8>)> = vec![];
    if let (Some(w), Some(colidx)) = (&stmt.r#where, where_colidx) {
        if let Some(index_root) = find_index_on_column(pgr, &stmt.from.tablename, &w.colname.name)? {
            let mut rowids = btree::index::search_equal(pgr, index_root, w.value.as_bytes())?;
            rowids.sort_unstable();
            for rowid in rowids {
                if let Some(payload) = btree::table::seek_to_rowid(pgr, root_pagenum, rowid)? {
                    rows.push((rowid, payload));
                }
            }
        } else {
            for item in new_table_iterator(pgr, root_pagenum) {
                let (rowid, payload) = item?;
                if row_matches_where(rowid, &payload, colidx, &col_names[colidx], &w.value)? {
                    rows.push((rowid, payload));
                }
            }
        }
    } else {
        for item in new_table_iterator(pgr, root_pagenum) {
            rows.push(item?);
        }
    }

    let mut out = Vec::with_capacity(rows.len());
    for (rowid, payload) in rows {
        let vi = record::ValueIterator::new(&payload);
        let vals: Vec<(i64, &[u8])> = vi.collect();
        let mut rendered = Vec::with_capacity(projected_idxs.len());
        for &i in &projected_idxs {
            rendered.push(render_column(rowid, &col_names[i], &vals[i]));
        }
        out.push(rendered);
    }
    Ok(out)
}

/// Renders one column's value, substituting the cell's rowid for an `id`
/// column stored as NULL. This is how `INTEGER PRIMARY KEY` is encoded on
/// disk: SQLite aliases that column to the rowid rather than storing it twice.
fn render_column(rowid: i64, col_name: &str, &(serial_type, data): &(i64, &[u8])) -> String {
    if serial_type == 0 && col_name.eq_ignore_ascii_case("id") {
        return rowid.to_string();
    }
    serial_type::value_to_string(&serial_type, data)
}

fn row_matches_where(rowid: i64, payload: &[u8], colidx: usize, col_name: &str, target: &str) -> Result<bool, Error> {
    let vi = record::ValueIterator::new(payload);
    let vals: Vec<(i64, &[u8])> = vi.collect();
    let (serial_type, data) = vals[colidx];
    let actual = if serial_type == 0 && col_name.eq_ignore_ascii_case("id") {
        rowid.to_string()
    } else {
        match serial_type::to_sql_value(&serial_type, data)? {
            SqlValue::Text(s) => s,
            v => v.to_string(),
        }
    };
    Ok(actual.to_lowercase() == target.to_lowercase())
}
