//! Row scopes and WHERE evaluation
//!
//! A [`Scope`] describes the column layout of a (possibly joined) row.
//! A [`Binding`] pairs a scope with one concrete row and, for subqueries,
//! the binding of the enclosing query so correlated references resolve
//! outward.

use super::result::QueryResult;
use crate::catalog::{Database, Field};
use crate::error::{Error, Result};
use crate::sql::{ColumnRef, CompareOp, Condition, FromClause, Literal, Operand, SelectStatement};
use crate::storage::Value;
use std::cmp::Ordering;

/// One table's slice of a row
#[derive(Debug, Clone)]
pub struct ScopeTable {
    /// Name the query refers to the table by (alias or table name)
    pub alias: String,
    /// Real table name
    pub name: String,
    pub fields: Vec<Field>,
    /// Position of the first field in the joined row
    pub offset: usize,
}

/// Column layout of the rows a query works on
#[derive(Debug, Clone, Default)]
pub struct Scope {
    pub tables: Vec<ScopeTable>,
}

impl Scope {
    /// Scope over a single table, referenced by its own name
    pub fn single(name: &str, fields: &[Field]) -> Self {
        Self {
            tables: vec![ScopeTable {
                alias: name.to_string(),
                name: name.to_string(),
                fields: fields.to_vec(),
                offset: 0,
            }],
        }
    }

    /// Scope over every table of a FROM clause, in textual order
    pub fn from_clause(db: &Database, from: &FromClause) -> Result<Self> {
        let mut scope = Scope::default();
        let mut offset = 0;

        for table_ref in &from.tables {
            let table = db.require_table(&table_ref.name)?;
            let alias = table_ref.reference_name().to_string();

            if scope
                .tables
                .iter()
                .any(|t| t.alias.eq_ignore_ascii_case(&alias))
            {
                return Err(Error::ValidationError(format!(
                    "table name or alias '{}' is used more than once",
                    alias
                )));
            }

            scope.tables.push(ScopeTable {
                alias,
                name: table.name.clone(),
                fields: table.fields.clone(),
                offset,
            });
            offset += table.fields.len();
        }

        Ok(scope)
    }

    /// Total number of values in a row of this scope
    pub fn width(&self) -> usize {
        self.tables.iter().map(|t| t.fields.len()).sum()
    }

    /// Row position of a column. A qualifier matches the name the table is
    /// referenced by; an aliased table does not answer to its real name.
    /// Unqualified references take the first table that has the column.
    pub fn resolve(&self, col: &ColumnRef) -> Option<usize> {
        self.locate(col).map(|(_, pos)| pos)
    }

    /// Like [`Scope::resolve`], also returning the table's position
    pub fn locate(&self, col: &ColumnRef) -> Option<(usize, usize)> {
        self.tables.iter().enumerate().find_map(|(i, t)| {
            let qualifies = match &col.table {
                Some(q) => t.alias.eq_ignore_ascii_case(q),
                None => true,
            };
            if !qualifies {
                return None;
            }
            t.fields
                .iter()
                .position(|f| f.is_named(&col.column))
                .map(|p| (i, t.offset + p))
        })
    }

    /// Table names for error messages
    pub fn describe(&self) -> String {
        self.tables
            .iter()
            .map(|t| t.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// A row bound to its scope, with an optional enclosing binding
#[derive(Debug, Clone, Copy)]
pub struct Binding<'a> {
    pub scope: &'a Scope,
    pub row: &'a [Value],
    pub outer: Option<&'a Binding<'a>>,
}

impl<'a> Binding<'a> {
    pub fn new(scope: &'a Scope, row: &'a [Value], outer: Option<&'a Binding<'a>>) -> Self {
        Self { scope, row, outer }
    }

    /// Check a column resolves here or in an enclosing scope
    pub fn resolves(&self, col: &ColumnRef) -> bool {
        self.scope.resolve(col).is_some() || self.outer.map(|o| o.resolves(col)).unwrap_or(false)
    }

    /// Value of a column, searching enclosing bindings outward
    pub fn lookup(&self, col: &ColumnRef) -> Result<Value> {
        if let Some(pos) = self.scope.resolve(col) {
            return Ok(self.row.get(pos).cloned().unwrap_or(Value::Null));
        }
        match self.outer {
            Some(outer) => outer.lookup(col),
            None => Err(Error::ColumnNotFound(col.to_string(), self.scope.describe())),
        }
    }

    /// Fail with `ColumnNotFound` unless the column resolves
    pub fn check(&self, col: &ColumnRef) -> Result<()> {
        if self.resolves(col) {
            Ok(())
        } else {
            Err(Error::ColumnNotFound(col.to_string(), self.scope.describe()))
        }
    }
}

/// Executes nested SELECTs on behalf of predicate evaluation
pub trait SubqueryRunner {
    fn run_subquery(&mut self, query: &SelectStatement, outer: &Binding<'_>) -> Result<QueryResult>;
}

/// Check every column a condition references, outside nested subqueries
pub fn check_condition(cond: &Condition, binding: &Binding<'_>) -> Result<()> {
    match cond {
        Condition::And(l, r) | Condition::Or(l, r) => {
            check_condition(l, binding)?;
            check_condition(r, binding)
        }
        Condition::Compare {
            column, operand, ..
        } => {
            binding.check(column)?;
            if let Operand::Column(other) = operand {
                binding.check(other)?;
            }
            Ok(())
        }
        Condition::Like { column, .. }
        | Condition::Between { column, .. }
        | Condition::InSubquery { column, .. } => binding.check(column),
    }
}

/// Value of a parsed literal, without any field coercion
pub fn literal_value(literal: &Literal) -> Value {
    match literal {
        Literal::Null => Value::Null,
        Literal::Integer(n) => Value::Int(*n),
        Literal::Float(n) => Value::Float(*n),
        Literal::String(s) => Value::Text(s.clone()),
    }
}

/// Evaluate a WHERE condition against one row
pub fn eval_condition(
    cond: &Condition,
    binding: &Binding<'_>,
    runner: &mut dyn SubqueryRunner,
) -> Result<bool> {
    match cond {
        Condition::And(l, r) => {
            Ok(eval_condition(l, binding, runner)? && eval_condition(r, binding, runner)?)
        }
        Condition::Or(l, r) => {
            Ok(eval_condition(l, binding, runner)? || eval_condition(r, binding, runner)?)
        }
        Condition::Compare {
            column,
            op,
            operand,
        } => {
            let left = binding.lookup(column)?;
            let right = match operand {
                Operand::Literal(lit) => literal_value(lit),
                Operand::Column(other) => binding.lookup(other)?,
                Operand::Subquery(query) => runner.run_subquery(query, binding)?.scalar(),
            };
            Ok(compare_values(&left, *op, &right))
        }
        Condition::Like { column, pattern } => {
            let value = binding.lookup(column)?;
            Ok(match value {
                Value::Null => false,
                Value::Text(s) => like_matches(&s, pattern),
                other => like_matches(&other.to_string(), pattern),
            })
        }
        Condition::Between { column, low, high } => {
            let value = binding.lookup(column)?;
            let (low, high) = (literal_value(low), literal_value(high));
            if value.is_null() || low.is_null() || high.is_null() {
                return Ok(false);
            }
            Ok(value.compare(&low) != Ordering::Less && value.compare(&high) != Ordering::Greater)
        }
        Condition::InSubquery {
            column,
            query,
            negated,
        } => {
            let value = binding.lookup(column)?;
            if value.is_null() {
                return Ok(false);
            }
            let result = runner.run_subquery(query, binding)?;
            let found = result
                .rows
                .iter()
                .filter_map(|row| row.first())
                .any(|candidate| !candidate.is_null() && candidate.loosely_equals(&value));
            Ok(found != *negated)
        }
    }
}

/// Apply a comparison operator. A NULL on either side only satisfies `=`
/// against another NULL.
pub fn compare_values(left: &Value, op: CompareOp, right: &Value) -> bool {
    if left.is_null() || right.is_null() {
        return op == CompareOp::Eq && left.is_null() && right.is_null();
    }

    let ord = left.compare(right);
    match op {
        CompareOp::Eq => ord == Ordering::Equal,
        CompareOp::NotEq => ord != Ordering::Equal,
        CompareOp::Lt => ord == Ordering::Less,
        CompareOp::Gt => ord == Ordering::Greater,
        CompareOp::LtEq => ord != Ordering::Greater,
        CompareOp::GtEq => ord != Ordering::Less,
    }
}

/// SQL LIKE: `%` matches any run, `_` matches exactly one character
pub fn like_matches(text: &str, pattern: &str) -> bool {
    let text: Vec<char> = text.chars().collect();
    let pattern: Vec<char> = pattern.chars().collect();

    let (mut t, mut p) = (0, 0);
    let mut star: Option<(usize, usize)> = None;

    while t < text.len() {
        if p < pattern.len() && (pattern[p] == '_' || pattern[p] == text[t]) {
            t += 1;
            p += 1;
        } else if p < pattern.len() && pattern[p] == '%' {
            star = Some((p, t));
            p += 1;
        } else if let Some((sp, st)) = star {
            p = sp + 1;
            t = st + 1;
            star = Some((sp, st + 1));
        } else {
            return false;
        }
    }

    pattern[p..].iter().all(|c| *c == '%')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::FieldType;

    struct NoSubqueries;

    impl SubqueryRunner for NoSubqueries {
        fn run_subquery(&mut self, _: &SelectStatement, _: &Binding<'_>) -> Result<QueryResult> {
            Err(Error::Internal("no subqueries here".into()))
        }
    }

    fn scope() -> Scope {
        let mut scope = Scope::single(
            "emp",
            &[
                Field::new("id", FieldType::Int, 4),
                Field::new("name", FieldType::Varchar, 20),
            ],
        );
        scope.tables.push(ScopeTable {
            alias: "d".into(),
            name: "dept".into(),
            fields: vec![
                Field::new("id", FieldType::Int, 4),
                Field::new("title", FieldType::Varchar, 20),
            ],
            offset: 2,
        });
        scope
    }

    fn eval(sql_where: &str, row: &[Value]) -> bool {
        let stmt = crate::sql::parse(&format!("SELECT * FROM emp WHERE {}", sql_where)).unwrap();
        let cond = match stmt {
            crate::sql::Statement::Select(s) => s.where_clause.unwrap(),
            _ => panic!("Expected SELECT statement"),
        };
        let scope = scope();
        let binding = Binding::new(&scope, row, None);
        eval_condition(&cond, &binding, &mut NoSubqueries).unwrap()
    }

    fn row(id: i64, name: &str) -> Vec<Value> {
        vec![Value::Int(id), Value::from(name), Value::Int(9), Value::from("ops")]
    }

    #[test]
    fn test_resolve() {
        let scope = scope();
        assert_eq!(scope.resolve(&ColumnRef::new("id")), Some(0));
        assert_eq!(scope.resolve(&ColumnRef::qualified("d", "id")), Some(2));
        assert_eq!(scope.resolve(&ColumnRef::qualified("d", "title")), Some(3));
        assert_eq!(scope.resolve(&ColumnRef::qualified("dept", "title")), None);
        assert_eq!(scope.resolve(&ColumnRef::qualified("emp", "title")), None);
        assert_eq!(scope.width(), 4);
    }

    #[test]
    fn test_range_and_between() {
        assert!(eval("id > 20 AND id <= 30", &row(30, "x")));
        assert!(!eval("id > 20 AND id <= 30", &row(20, "x")));
        assert!(eval("id BETWEEN 10 AND 20", &row(10, "x")));
        assert!(eval("id BETWEEN 10 AND 20", &row(20, "x")));
        assert!(!eval("id BETWEEN 10 AND 20", &row(21, "x")));
    }

    #[test]
    fn test_like_and_or() {
        assert!(eval("name LIKE 'A%'", &row(1, "Alice")));
        assert!(!eval("name LIKE 'A%'", &row(1, "bob")));
        assert!(eval("name LIKE 'b_b' OR id = 99", &row(1, "bob")));
        assert!(eval("(id = 1 OR id = 2) AND d.title = 'ops'", &row(2, "z")));
    }

    #[test]
    fn test_null_semantics() {
        let null_row = vec![Value::Null, Value::Null, Value::Null, Value::Null];
        assert!(!eval("id = 1", &null_row));
        assert!(!eval("id != 1", &null_row));
        assert!(eval("id = NULL", &null_row));
        assert!(!eval("name LIKE '%'", &null_row));
    }

    #[test]
    fn test_column_operand() {
        assert!(!eval("emp.id = d.id", &row(1, "x")));
        assert!(eval("emp.id = d.id", &row(9, "x")));
    }

    #[test]
    fn test_like_matcher() {
        assert!(like_matches("hello", "h%o"));
        assert!(like_matches("hello", "%"));
        assert!(like_matches("", "%"));
        assert!(like_matches("abc", "a_c"));
        assert!(!like_matches("abbc", "a_c"));
        assert!(like_matches("mississippi", "%iss%pi"));
        assert!(!like_matches("abc", "abcd"));
    }

    #[test]
    fn test_outer_lookup() {
        let outer_scope = scope();
        let outer_row = row(5, "x");
        let outer = Binding::new(&outer_scope, &outer_row, None);

        let inner_scope = Scope::single("t", &[Field::new("v", FieldType::Int, 4)]);
        let inner_row = vec![Value::Int(1)];
        let inner = Binding::new(&inner_scope, &inner_row, Some(&outer));

        assert_eq!(inner.lookup(&ColumnRef::new("v")).unwrap(), Value::Int(1));
        assert_eq!(inner.lookup(&ColumnRef::qualified("emp", "id")).unwrap(), Value::Int(5));
        assert!(inner.lookup(&ColumnRef::new("nope")).is_err());
    }
}
