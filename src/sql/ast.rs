//! Abstract Syntax Tree (AST) definitions for SQL statements
//!
//! Each statement kind is its own variant carrying only the fields it needs.

use crate::catalog::FieldType;
use std::fmt;

/// SQL Statement
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// CREATE TABLE statement
    CreateTable(CreateTableStatement),
    /// CREATE [UNIQUE] INDEX statement
    CreateIndex(CreateIndexStatement),
    /// CREATE USER statement
    CreateUser(CreateUserStatement),
    /// ALTER TABLE statement
    AlterTable(AlterTableStatement),
    /// DROP TABLE statement
    DropTable(String),
    /// DROP USER statement
    DropUser(String),
    /// RENAME TABLE old TO new
    RenameTable { old_name: String, new_name: String },
    /// INSERT statement
    Insert(InsertStatement),
    /// UPDATE statement
    Update(UpdateStatement),
    /// DELETE statement
    Delete(DeleteStatement),
    /// SELECT statement
    Select(SelectStatement),
    /// GRANT statement
    Grant(PrivilegeStatement),
    /// REVOKE statement
    Revoke(PrivilegeStatement),
    /// BEGIN
    Begin,
    /// COMMIT
    Commit,
    /// ROLLBACK
    Rollback,
}

// ========== DDL ==========

/// Field definition: `name TYPE[(length)] [PRIMARY KEY] [NOT NULL]`
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDef {
    pub name: String,
    pub field_type: FieldType,
    pub length: i32,
    pub primary_key: bool,
    pub nullable: bool,
}

/// CREATE TABLE statement
#[derive(Debug, Clone, PartialEq)]
pub struct CreateTableStatement {
    pub table_name: String,
    pub fields: Vec<FieldDef>,
}

/// CREATE INDEX statement
#[derive(Debug, Clone, PartialEq)]
pub struct CreateIndexStatement {
    pub index_name: String,
    pub table_name: String,
    pub column_name: String,
    pub unique: bool,
}

/// ALTER TABLE statement
#[derive(Debug, Clone, PartialEq)]
pub struct AlterTableStatement {
    pub table_name: String,
    pub action: AlterAction,
}

/// ALTER TABLE actions
#[derive(Debug, Clone, PartialEq)]
pub enum AlterAction {
    AddColumn(FieldDef),
    DropColumn(String),
    ModifyColumn {
        column: String,
        field_type: FieldType,
        length: i32,
    },
    RenameColumn {
        old_name: String,
        new_name: String,
    },
}

/// CREATE USER statement
#[derive(Debug, Clone, PartialEq)]
pub struct CreateUserStatement {
    pub username: String,
    pub password: String,
}

/// GRANT / REVOKE statement
#[derive(Debug, Clone, PartialEq)]
pub struct PrivilegeStatement {
    pub permissions: Vec<String>,
    pub username: String,
}

// ========== DML ==========

/// INSERT statement
#[derive(Debug, Clone, PartialEq)]
pub struct InsertStatement {
    pub table_name: String,
    pub columns: Option<Vec<String>>,
    pub values: Vec<Vec<Literal>>,
}

/// UPDATE statement
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateStatement {
    pub table_name: String,
    pub assignments: Vec<Assignment>,
    pub where_clause: Option<Condition>,
}

/// Assignment in UPDATE SET
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub column: String,
    pub value: SetValue,
}

/// Right-hand side of an assignment
#[derive(Debug, Clone, PartialEq)]
pub enum SetValue {
    /// A literal value
    Literal(Literal),
    /// `column OP number`, resolved against the row being updated
    Arithmetic {
        column: String,
        op: ArithmeticOp,
        operand: f64,
    },
}

/// Arithmetic operators allowed in UPDATE expressions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithmeticOp {
    Add,
    Sub,
    Mul,
    Div,
}

/// DELETE statement
#[derive(Debug, Clone, PartialEq)]
pub struct DeleteStatement {
    pub table_name: String,
    pub where_clause: Option<Condition>,
}

// ========== SELECT ==========

/// SELECT statement
#[derive(Debug, Clone, PartialEq)]
pub struct SelectStatement {
    pub columns: Vec<SelectItem>,
    pub from: FromClause,
    pub where_clause: Option<Condition>,
    pub group_by: Vec<ColumnRef>,
    pub order_by: Vec<OrderByItem>,
}

/// Item in SELECT list
#[derive(Debug, Clone, PartialEq)]
pub enum SelectItem {
    /// *
    Wildcard,
    /// Expression with optional alias
    Expr {
        expr: SelectExpr,
        alias: Option<String>,
    },
}

/// Projectable expressions
#[derive(Debug, Clone, PartialEq)]
pub enum SelectExpr {
    Column(ColumnRef),
    Aggregate {
        func: AggregateFunc,
        arg: AggregateArg,
    },
    Subquery(Box<SelectStatement>),
}

/// Aggregate functions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateFunc {
    Count,
    Sum,
    Avg,
    Max,
    Min,
}

/// Aggregate argument: `*` or a column
#[derive(Debug, Clone, PartialEq)]
pub enum AggregateArg {
    Star,
    Column(ColumnRef),
}

/// FROM clause. `tables` is in textual order and defines the layout of
/// joined rows.
#[derive(Debug, Clone, PartialEq)]
pub struct FromClause {
    pub tables: Vec<TableRef>,
    pub joins: Vec<JoinClause>,
}

/// Table reference with optional alias
#[derive(Debug, Clone, PartialEq)]
pub struct TableRef {
    pub name: String,
    pub alias: Option<String>,
}

impl TableRef {
    /// Name this table is referenced by in the query
    pub fn reference_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}

/// Explicit `[INNER|LEFT|RIGHT] JOIN table ON left = right`
#[derive(Debug, Clone, PartialEq)]
pub struct JoinClause {
    pub join_type: JoinType,
    /// Position of the joined table in `FromClause::tables`
    pub table_index: usize,
    pub left: ColumnRef,
    pub right: ColumnRef,
}

/// JOIN type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    Inner,
    Left,
    Right,
}

/// ORDER BY item
#[derive(Debug, Clone, PartialEq)]
pub struct OrderByItem {
    pub column: ColumnRef,
    pub ascending: bool,
}

/// Column reference (possibly qualified)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColumnRef {
    pub table: Option<String>,
    pub column: String,
}

impl ColumnRef {
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            table: None,
            column: column.into(),
        }
    }

    pub fn qualified(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            table: Some(table.into()),
            column: column.into(),
        }
    }
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.table {
            Some(table) => write!(f, "{}.{}", table, self.column),
            None => write!(f, "{}", self.column),
        }
    }
}

// ========== WHERE ==========

/// WHERE condition tree
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    And(Box<Condition>, Box<Condition>),
    Or(Box<Condition>, Box<Condition>),
    /// `column OP operand`
    Compare {
        column: ColumnRef,
        op: CompareOp,
        operand: Operand,
    },
    /// `column LIKE 'pattern'`
    Like { column: ColumnRef, pattern: String },
    /// `column BETWEEN low AND high` (inclusive)
    Between {
        column: ColumnRef,
        low: Literal,
        high: Literal,
    },
    /// `column [NOT] IN (SELECT ...)`
    InSubquery {
        column: ColumnRef,
        query: Box<SelectStatement>,
        negated: bool,
    },
}

/// Comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    NotEq,
    Lt,
    Gt,
    LtEq,
    GtEq,
}

/// Right-hand side of a comparison
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Literal(Literal),
    /// Another column, e.g. `a.id = b.a_id`
    Column(ColumnRef),
    /// Scalar subquery
    Subquery(Box<SelectStatement>),
}

/// Literal value
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Null,
    Integer(i64),
    Float(f64),
    String(String),
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Null => write!(f, "NULL"),
            Literal::Integer(n) => write!(f, "{}", n),
            Literal::Float(n) => write!(f, "{}", n),
            Literal::String(s) => write!(f, "'{}'", s),
        }
    }
}

impl fmt::Display for AggregateFunc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AggregateFunc::Count => write!(f, "COUNT"),
            AggregateFunc::Sum => write!(f, "SUM"),
            AggregateFunc::Avg => write!(f, "AVG"),
            AggregateFunc::Max => write!(f, "MAX"),
            AggregateFunc::Min => write!(f, "MIN"),
        }
    }
}

impl fmt::Display for SelectExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectExpr::Column(col) => write!(f, "{}", col),
            SelectExpr::Aggregate { func, arg } => match arg {
                AggregateArg::Star => write!(f, "{}(*)", func),
                AggregateArg::Column(col) => write!(f, "{}({})", func, col),
            },
            SelectExpr::Subquery(_) => write!(f, "(subquery)"),
        }
    }
}

impl SelectStatement {
    /// True if any select item is an aggregate call
    pub fn has_aggregates(&self) -> bool {
        self.columns.iter().any(|item| {
            matches!(
                item,
                SelectItem::Expr {
                    expr: SelectExpr::Aggregate { .. },
                    ..
                }
            )
        })
    }
}
