//! Crate-level scenarios against small, synthetic database images assembled
//! in-test. No binary `.db` fixtures ship with this crate; every image here
//! is built byte-by-byte from the SQLite file format this crate reads.

use std::io::Write;

enum Val<'a> {
    Int(i64),
    Text(&'a str),
    Null,
}

fn encode_value(v: &Val) -> (u8, Vec<u8>) {
    match v {
        Val::Int(i) => (1, vec![*i as u8]),
        Val::Text(s) => (13 + 2 * s.len() as u8, s.as_bytes().to_vec()),
        Val::Null => (0, vec![]),
    }
}

fn record_bytes(cols: &[Val]) -> Vec<u8> {
    let encoded: Vec<(u8, Vec<u8>)> = cols.iter().map(encode_value).collect();
    let header_len = encoded.len() as u8 + 1;
    let mut out = vec![header_len];
    for (st, _) in &encoded {
        out.push(*st);
    }
    for (_, data) in &encoded {
        out.extend(data);
    }
    out
}

fn table_leaf_cell(rowid: i64, cols: &[Val]) -> Vec<u8> {
    let payload = record_bytes(cols);
    let mut out = vec![payload.len() as u8, rowid as u8];
    out.extend(payload);
    out
}

fn index_leaf_cell(key: &str, rowid: i64) -> Vec<u8> {
    let payload = record_bytes(&[Val::Text(key), Val::Int(rowid)]);
    let mut out = vec![payload.len() as u8];
    out.extend(payload);
    out
}

/// Lays out a single leaf page (table or index) with the given cells,
/// placing the btree page header at `header_offset` (100 for page 1, else
/// 0) and writing cells back-to-front from the end of the page.
fn leaf_page(page_size: usize, header_offset: usize, page_type: u8, cells: Vec<Vec<u8>>) -> Vec<u8> {
    let mut page = vec![0u8; page_size];
    page[header_offset] = page_type;
    page[header_offset + 3..header_offset + 5].copy_from_slice(&(cells.len() as u16).to_be_bytes());

    let mut cursor = page_size;
    let mut offsets = vec![];
    for cell in &cells {
        cursor -= cell.len();
        page[cursor..cursor + cell.len()].copy_from_slice(cell);
        offsets.push(cursor as u16);
    }
    page[header_offset + 5..header_offset + 7].copy_from_slice(&(cursor as u16).to_be_bytes());

    let ptr_start = header_offset + 8;
    for (i, off) in offsets.iter().enumerate() {
        page[ptr_start + i * 2..ptr_start + i * 2 + 2].copy_from_slice(&off.to_be_bytes());
    }
    page
}

fn db_header(page_size: u16, num_pages: u32) -> Vec<u8> {
    let mut h = vec![0u8; 100];
    h[0..16].copy_from_slice(b"SQLite format 3\0");
    h[16..18].copy_from_slice(&page_size.to_be_bytes());
    h[18] = 1;
    h[19] = 1;
    h[28..32].copy_from_slice(&num_pages.to_be_bytes());
    h
}

/// Builds a 3-page database: page 1 is the schema table (one user table,
/// one index over its `color` column); page 2 is the `apples` table with
/// two rows; page 3 is the index over `color`.
fn write_apples_db(path: &std::path::Path) {
    const PAGE_SIZE: usize = 512;

    let schema_row_table = table_leaf_cell(
        1,
        &[
            Val::Text("table"),
            Val::Text("apples"),
            Val::Text("apples"),
            Val::Int(2),
            Val::Text("CREATE TABLE apples (name text, color text)"),
        ],
    );
    let schema_row_index = table_leaf_cell(
        2,
        &[
            Val::Text("index"),
            Val::Text("idx_apples_color"),
            Val::Text("apples"),
            Val::Int(3),
            Val::Text("CREATE INDEX idx_apples_color ON apples (color)"),
        ],
    );
    let mut page1 = leaf_page(PAGE_SIZE, 100, 0x0d, vec![schema_row_table, schema_row_index]);
    page1[0..100].copy_from_slice(&db_header(PAGE_SIZE as u16, 3));

    let apples_row1 = table_leaf_cell(1, &[Val::Text("fuji"), Val::Text("red")]);
    let apples_row2 = table_leaf_cell(2, &[Val::Text("gala"), Val::Text("green")]);
    let page2 = leaf_page(PAGE_SIZE, 0, 0x0d, vec![apples_row1, apples_row2]);

    // Index entries are stored in ascending key order.
    let idx_row_green = index_leaf_cell("green", 2);
    let idx_row_red = index_leaf_cell("red", 1);
    let page3 = leaf_page(PAGE_SIZE, 0, 0x0a, vec![idx_row_green, idx_row_red]);

    let mut f = std::fs::File::create(path).unwrap();
    f.write_all(&page1).unwrap();
    f.write_all(&page2).unwrap();
    f.write_all(&page3).unwrap();
}

/// Builds a single-page database with one table, `widgets(id int, name
/// text)`, whose `id` column is stored as NULL in every row, the way SQLite
/// encodes an `INTEGER PRIMARY KEY` column that aliases the rowid.
fn write_widgets_db(path: &std::path::Path) {
    const PAGE_SIZE: usize = 512;

    let schema_row = table_leaf_cell(
        1,
        &[
            Val::Text("table"),
            Val::Text("widgets"),
            Val::Text("widgets"),
            Val::Int(2),
            Val::Text("CREATE TABLE widgets (id int, name text)"),
        ],
    );
    let mut page1 = leaf_page(PAGE_SIZE, 100, 0x0d, vec![schema_row]);
    page1[0..100].copy_from_slice(&db_header(PAGE_SIZE as u16, 2));

    let row1 = table_leaf_cell(1, &[Val::Null, Val::Text("sprocket")]);
    let row2 = table_leaf_cell(2, &[Val::Null, Val::Text("gizmo")]);
    let page2 = leaf_page(PAGE_SIZE, 0, 0x0d, vec![row1, row2]);

    let mut f = std::fs::File::create(path).unwrap();
    f.write_all(&page1).unwrap();
    f.write_all(&page2).unwrap();
}

fn temp_db_path(name: &str) -> std::path::PathBuf {
    std::env::temp_dir().join(format!("litequery_integration_{}_{}.db", name, std::process::id()))
}

#[test]
fn test_dbinfo() {
    let path = temp_db_path("dbinfo");
    write_apples_db(&path);
    let pager = litequery::pager::Pager::open(path.to_str().unwrap()).unwrap();
    let (page_size, num_entries) = litequery::dbinfo(&pager).unwrap();
    assert_eq!(page_size, 512);
    assert_eq!(num_entries, 2);
    std::fs::remove_file(&path).unwrap();
}

#[test]
fn test_tables_lists_only_user_tables_alphabetized() {
    let path = temp_db_path("tables");
    write_apples_db(&path);
    let pager = litequery::pager::Pager::open(path.to_str().unwrap()).unwrap();
    assert_eq!(litequery::table_names(&pager).unwrap(), vec!["apples".to_string()]);
    std::fs::remove_file(&path).unwrap();
}

#[test]
fn test_select_star_full_scan() {
    let path = temp_db_path("star");
    write_apples_db(&path);
    let pager = litequery::pager::Pager::open(path.to_str().unwrap()).unwrap();
    let rows = litequery::run_select(&pager, "SELECT * FROM apples").unwrap();
    assert_eq!(
        rows,
        vec![
            vec!["fuji".to_string(), "red".to_string()],
            vec!["gala".to_string(), "green".to_string()],
        ]
    );
    std::fs::remove_file(&path).unwrap();
}

#[test]
fn test_select_with_where_uses_index() {
    let path = temp_db_path("where_index");
    write_apples_db(&path);
    let pager = litequery::pager::Pager::open(path.to_str().unwrap()).unwrap();
    let rows = litequery::run_select(&pager, "SELECT name,color FROM apples WHERE color='red'").unwrap();
    assert_eq!(rows, vec![vec!["fuji".to_string(), "red".to_string()]]);
    std::fs::remove_file(&path).unwrap();
}

#[test]
fn test_select_where_is_case_insensitive_on_full_scan() {
    // `name` has no index, so this exercises the full-scan WHERE path
    // rather than the index-accelerated one.
    let path = temp_db_path("case_insensitive");
    write_apples_db(&path);
    let pager = litequery::pager::Pager::open(path.to_str().unwrap()).unwrap();
    let rows = litequery::run_select(&pager, "SELECT color FROM apples WHERE name='FUJI'").unwrap();
    assert_eq!(rows, vec![vec!["red".to_string()]]);
    std::fs::remove_file(&path).unwrap();
}

#[test]
fn test_select_count_star() {
    let path = temp_db_path("count");
    write_apples_db(&path);
    let pager = litequery::pager::Pager::open(path.to_str().unwrap()).unwrap();
    let rows = litequery::run_select(&pager, "SELECT COUNT(*) FROM apples").unwrap();
    assert_eq!(rows, vec![vec!["2".to_string()]]);
    std::fs::remove_file(&path).unwrap();
}

#[test]
fn test_select_integer_primary_key_aliases_rowid() {
    let path = temp_db_path("id_alias");
    write_widgets_db(&path);
    let pager = litequery::pager::Pager::open(path.to_str().unwrap()).unwrap();
    let rows = litequery::run_select(&pager, "SELECT id,name FROM widgets").unwrap();
    assert_eq!(
        rows,
        vec![
            vec!["1".to_string(), "sprocket".to_string()],
            vec!["2".to_string(), "gizmo".to_string()],
        ]
    );
    std::fs::remove_file(&path).unwrap();
}

#[test]
fn test_select_unknown_table_errors() {
    let path = temp_db_path("unknown_table");
    write_apples_db(&path);
    let pager = litequery::pager::Pager::open(path.to_str().unwrap()).unwrap();
    assert!(litequery::run_select(&pager, "SELECT * FROM oranges").is_err());
    std::fs::remove_file(&path).unwrap();
}
