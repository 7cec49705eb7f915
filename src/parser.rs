//! Wraps the pest-generated parser for the grammar in `sql.pest`.
//! `pt_to_ast` turns the resulting parse tree into this crate's AST.

use pest::Parser;

#[derive(Parser)]
#[grammar = "sql.pest"]
pub struct SQLParser;
