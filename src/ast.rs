//! Abstract syntax tree (AST) types for the subset of SQL this crate
//! understands: CREATE TABLE, CREATE INDEX, and SELECT with at most one
//! equality WHERE clause.

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColName {
    pub name: String,
}

impl std::fmt::Display for ColName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.name.fmt(f)
    }
}

/// One item of a SELECT's projection list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelItem {
    ColName(ColName),
    CountStar,
    Star,
}

impl std::fmt::Display for SelItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SelItem::ColName(x) => x.fmt(f),
            SelItem::CountStar => "count(*)".fmt(f),
            SelItem::Star => "*".fmt(f),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectClause {
    pub items: Vec<SelItem>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FromClause {
    pub tablename: String,
}

/// A single `col = 'value'` equality filter. The value has had its
/// surrounding quotes stripped already.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WhereClause {
    pub colname: ColName,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectStatement {
    pub select: SelectClause,
    pub from: FromClause,
    pub r#where: Option<WhereClause>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColDef {
    pub colname: ColName,
    pub coltype: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateStatement {
    pub tablename: String,
    pub coldefs: Vec<ColDef>,
}

/// `CREATE INDEX idx ON t (col)`. Only ever consulted, never executed as a
/// standalone command: the executor uses it to decide whether a WHERE
/// equality filter can be answered by an index instead of a full scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateIndexStatement {
    pub indexname: String,
    pub tablename: String,
    pub colname: ColName,
}
