//! Converts pest parse trees into this crate's AST.
//! A pest parse tree has one enum for all possible terminals and
//! non-terminals; the AST groups related terminals and discards lexical
//! detail like case and position in the input.

use anyhow::{bail, Result};

use pest::Parser;

use crate::ast;
use crate::parser::Rule;
use crate::parser::SQLParser;

fn remove_single_quoting(s: &str) -> String {
    let unescaped = s.replace("''", "'");
    if unescaped.len() >= 2 {
        unescaped[1..unescaped.len() - 1].to_string()
    } else {
        unescaped
    }
}

#[test]
fn test_remove_single_quoting() {
    let cases = [
        ("''", ""),
        ("'hi'", "hi"),
        ("'h''i'", "hi"),
    ];
    for (input, expected) in cases {
        assert_eq!(remove_single_quoting(input), expected);
    }
}

fn literal_to_string(pair: pest::iterators::Pair<'_, Rule>) -> String {
    match pair.as_rule() {
        Rule::single_quoted_string => remove_single_quoting(pair.as_str()),
        Rule::integer_literal => pair.as_str().to_string(),
        _ => unreachable!("literal rule can only be single_quoted_string or integer_literal"),
    }
}

pub fn pt_create_statement_to_ast(c: &str) -> Result<ast::CreateStatement> {
    let create_stmt = SQLParser::parse(Rule::create_stmt, c)?.next().unwrap();

    let mut coldefs: Vec<ast::ColDef> = vec![];
    let mut tablename = String::new();
    for pair in create_stmt.into_inner() {
        match pair.as_rule() {
            Rule::table_identifier => tablename = pair.as_str().to_string(),
            Rule::column_defs => {
                for column_def in pair.into_inner() {
                    let mut inner = column_def.into_inner();
                    let colname = inner.next().unwrap().as_str().to_string();
                    let coltype = inner.next().unwrap().as_str().to_string();
                    coldefs.push(ast::ColDef {
                        colname: ast::ColName { name: colname },
                        coltype,
                    });
                }
            }
            Rule::EOI => (),
            _ => bail!("Unexpected syntax in CREATE TABLE statement: {:?}", pair.as_rule()),
        }
    }
    Ok(ast::CreateStatement { tablename, coldefs })
}

#[test]
fn test_pt_create_statement_to_ast() {
    let input = "CREATE TABLE t (a int, b text)";
    let actual = pt_create_statement_to_ast(input).unwrap();
    let expected = ast::CreateStatement {
        tablename: "t".to_string(),
        coldefs: vec![
            ast::ColDef {
                colname: ast::ColName { name: "a".to_string() },
                coltype: "int".to_string(),
            },
            ast::ColDef {
                colname: ast::ColName { name: "b".to_string() },
                coltype: "text".to_string(),
            },
        ],
    };
    assert_eq!(actual, expected);
}

pub fn ast_create_statement_to_tuple(c: &ast::CreateStatement) -> (String, Vec<String>) {
    (
        c.tablename.clone(),
        c.coldefs.iter().map(|x| x.colname.name.clone()).collect(),
    )
}

/// Parses a `CREATE TABLE` statement's own recorded SQL text back into the
/// table name and its column names, in declaration order.
pub fn parse_create_statement(c: &str) -> Result<(String, Vec<String>)> {
    let ast = pt_create_statement_to_ast(c)?;
    Ok(ast_create_statement_to_tuple(&ast))
}

#[test]
fn test_parse_create_statement() {
    let cases = vec![
        (
            "CREATE TABLE t (a int, b integer, c text, d string, e real)",
            ("t", vec!["a", "b", "c", "d", "e"]),
        ),
        (
            "CREATE TABLE Tbl_Two(a int,b int)",
            ("Tbl_Two", vec!["a", "b"]),
        ),
    ];
    for (input, (tbl, cols)) in cases {
        let actual = parse_create_statement(input).unwrap();
        let expected = (
            tbl.to_string(),
            cols.iter().map(|x| x.to_string()).collect::<Vec<_>>(),
        );
        assert_eq!(actual, expected);
    }
}

pub fn pt_create_index_statement_to_ast(c: &str) -> Result<ast::CreateIndexStatement> {
    let stmt = SQLParser::parse(Rule::create_index_stmt, c)?.next().unwrap();

    let mut indexname = String::new();
    let mut tablename = String::new();
    let mut colname = String::new();
    for pair in stmt.into_inner() {
        match pair.as_rule() {
            Rule::index_identifier => indexname = pair.as_str().to_string(),
            Rule::table_identifier => tablename = pair.as_str().to_string(),
            Rule::column_identifier => colname = pair.as_str().to_string(),
            Rule::EOI => (),
            _ => bail!("Unexpected syntax in CREATE INDEX statement: {:?}", pair.as_rule()),
        }
    }
    Ok(ast::CreateIndexStatement {
        indexname,
        tablename,
        colname: ast::ColName { name: colname },
    })
}

#[test]
fn test_pt_create_index_statement_to_ast() {
    let input = "CREATE INDEX idx_companies_country ON companies (country)";
    let actual = pt_create_index_statement_to_ast(input).unwrap();
    let expected = ast::CreateIndexStatement {
        indexname: "idx_companies_country".to_string(),
        tablename: "companies".to_string(),
        colname: ast::ColName { name: "country".to_string() },
    };
    assert_eq!(actual, expected);
}

pub fn pt_select_statement_to_ast(query: &str) -> Result<ast::SelectStatement> {
    let select_stmt = SQLParser::parse(Rule::select_stmt, query)?.next().unwrap();

    let mut items = vec![];
    let mut tablename = None;
    let mut r#where = None;

    for pair in select_stmt.into_inner() {
        match pair.as_rule() {
            Rule::select_items => {
                for item in pair.into_inner() {
                    let inner = item.into_inner().next().unwrap();
                    items.push(match inner.as_rule() {
                        Rule::column_identifier => {
                            ast::SelItem::ColName(ast::ColName { name: inner.as_str().to_string() })
                        }
                        Rule::count_star => ast::SelItem::CountStar,
                        Rule::star => ast::SelItem::Star,
                        _ => bail!("Parse error in select item: {:?}", inner.as_rule()),
                    });
                }
            }
            Rule::table_identifier => tablename = Some(pair.as_str().to_string()),
            Rule::where_clause => {
                let mut inner = pair.into_inner();
                let colname = inner.next().unwrap().as_str().to_string();
                let literal = inner.next().unwrap();
                let value = literal_to_string(literal);
                r#where = Some(ast::WhereClause {
                    colname: ast::ColName { name: colname },
                    value,
                });
            }
            Rule::EOI => (),
            _ => bail!("Unable to parse SELECT statement near: {}", pair.as_str()),
        }
    }

    Ok(ast::SelectStatement {
        select: ast::SelectClause { items },
        from: ast::FromClause {
            tablename: tablename.ok_or_else(|| anyhow::anyhow!("SELECT statement has no FROM clause"))?,
        },
        r#where,
    })
}

#[test]
fn test_parse_select_statement_basic() {
    let ast = pt_select_statement_to_ast("SELECT a,b,c FROM tbl").unwrap();
    assert_eq!(ast.from.tablename, "tbl");
    assert_eq!(
        ast.select.items,
        vec![
            ast::SelItem::ColName(ast::ColName { name: "a".to_string() }),
            ast::SelItem::ColName(ast::ColName { name: "b".to_string() }),
            ast::SelItem::ColName(ast::ColName { name: "c".to_string() }),
        ]
    );
    assert!(ast.r#where.is_none());
}

#[test]
fn test_parse_select_statement_star() {
    let ast = pt_select_statement_to_ast("select * from tbl").unwrap();
    assert_eq!(ast.select.items, vec![ast::SelItem::Star]);
}

#[test]
fn test_parse_select_statement_count_star() {
    let ast = pt_select_statement_to_ast("SELECT COUNT(*) FROM big_table").unwrap();
    assert_eq!(ast.select.items, vec![ast::SelItem::CountStar]);
    assert_eq!(ast.from.tablename, "big_table");
}

#[test]
fn test_parse_select_statement_where_equality() {
    let ast = pt_select_statement_to_ast("SELECT name,color FROM apples WHERE color='red'").unwrap();
    assert_eq!(
        ast.r#where,
        Some(ast::WhereClause {
            colname: ast::ColName { name: "color".to_string() },
            value: "red".to_string(),
        })
    );
}

#[test]
fn test_parse_select_statement_case_insensitive_keywords() {
    let ast = pt_select_statement_to_ast("select name From Apples where color = 'red'").unwrap();
    assert_eq!(ast.from.tablename, "Apples");
    assert_eq!(ast.r#where.unwrap().value, "red");
}
