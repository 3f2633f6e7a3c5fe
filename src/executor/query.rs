//! SELECT execution
//!
//! Rows are loaded fully into memory (one scan per table, or an index
//! lookup for `column = literal` on a single table), joined with a
//! left-deep nested loop, filtered, then projected or aggregated and
//! finally sorted.

use super::predicate::{
    check_condition, compare_values, eval_condition, Binding, Scope, ScopeTable, SubqueryRunner,
};
use super::result::QueryResult;
use crate::catalog::validate;
use crate::catalog::Table;
use crate::error::{Error, Result};
use crate::sql::{
    AggregateArg, AggregateFunc, ColumnRef, CompareOp, Condition, JoinType, Literal, Operand,
    OrderByItem, SelectExpr, SelectItem, SelectStatement,
};
use crate::storage::{Record, Storage, Value};
use indexmap::IndexMap;
use std::cmp::Ordering;
use std::collections::HashMap;
use tracing::debug;

/// Read-only executor for one statement.
///
/// Results of uncorrelated subqueries are cached by AST node for the
/// lifetime of the executor, so an executor must not outlive the
/// statement it runs.
pub struct QueryExecutor<'s> {
    storage: &'s Storage,
    cache: HashMap<usize, QueryResult>,
}

/// A projected row with the source row it came from, for ORDER BY keys
type OutputRow = (Vec<Value>, Vec<Value>);

/// Equality between two columns of a joined row
#[derive(Debug, Clone, Copy)]
struct JoinCondition {
    left: usize,
    right: usize,
    /// Join step at which both sides are available
    step: usize,
}

#[derive(Debug, Clone, Copy)]
enum SortKey {
    Output(usize),
    Source(usize),
}

impl<'s> QueryExecutor<'s> {
    pub fn new(storage: &'s Storage) -> Self {
        Self {
            storage,
            cache: HashMap::new(),
        }
    }

    /// Execute a top-level SELECT
    pub fn select(&mut self, stmt: &SelectStatement) -> Result<QueryResult> {
        self.cache.clear();
        self.execute_select(stmt, None)
    }

    /// Execute a SELECT, resolving unknown columns against `outer`
    pub fn execute_select(
        &mut self,
        stmt: &SelectStatement,
        outer: Option<&Binding<'_>>,
    ) -> Result<QueryResult> {
        let scope = Scope::from_clause(self.storage.database(), &stmt.from)?;
        check_columns(stmt, &Binding::new(&scope, &[], outer))?;

        debug!(tables = %scope.describe(), correlated = outer.is_some(), "executing select");

        let rows = self.load_rows(stmt, &scope)?;

        let mut filtered = Vec::with_capacity(rows.len());
        for row in rows {
            let keep = match &stmt.where_clause {
                Some(cond) => {
                    let binding = Binding::new(&scope, &row, outer);
                    eval_condition(cond, &binding, self)?
                }
                None => true,
            };
            if keep {
                filtered.push(row);
            }
        }

        let labels = output_labels(stmt, &scope);
        let mut output = if stmt.has_aggregates() || !stmt.group_by.is_empty() {
            self.aggregate(stmt, &scope, filtered, outer)?
        } else {
            self.project(stmt, &scope, filtered, outer)?
        };

        if !stmt.order_by.is_empty() {
            let keys = resolve_order(&stmt.order_by, &labels, &scope)?;
            output.sort_by(|a, b| compare_rows(a, b, &keys));
        }

        Ok(QueryResult::rows(
            labels,
            output.into_iter().map(|(row, _)| row).collect(),
        ))
    }

    /// Active records of `table` matching `cond`, with their offsets
    pub fn matching_records(
        &mut self,
        table: &Table,
        cond: Option<&Condition>,
    ) -> Result<Vec<(u64, Record)>> {
        let scope = Scope::single(&table.name, &table.fields);
        if let Some(cond) = cond {
            check_condition(cond, &Binding::new(&scope, &[], None))?;
        }

        let records = self
            .storage
            .record_file(&table.name)
            .scan_logged(&table.fields)?;

        let Some(cond) = cond else {
            return Ok(records);
        };

        let mut matched = Vec::new();
        for (offset, record) in records {
            let binding = Binding::new(&scope, record.values(), None);
            if eval_condition(cond, &binding, self)? {
                matched.push((offset, record));
            }
        }
        Ok(matched)
    }

    fn load_rows(&self, stmt: &SelectStatement, scope: &Scope) -> Result<Vec<Vec<Value>>> {
        match scope.tables.as_slice() {
            [] => Ok(Vec::new()),
            [single] => match self.index_lookup(stmt, scope, single)? {
                Some(rows) => Ok(rows),
                None => self.scan(single),
            },
            _ => self.join(stmt, scope),
        }
    }

    fn scan(&self, table: &ScopeTable) -> Result<Vec<Vec<Value>>> {
        Ok(self
            .storage
            .record_file(&table.name)
            .scan_logged(&table.fields)?
            .into_iter()
            .map(|(_, record)| record.into_values())
            .collect())
    }

    /// Rows for `WHERE column = literal` on an indexed column, or `None`
    /// when the statement does not qualify
    fn index_lookup(
        &self,
        stmt: &SelectStatement,
        scope: &Scope,
        source: &ScopeTable,
    ) -> Result<Option<Vec<Vec<Value>>>> {
        let Some(Condition::Compare {
            column,
            op: CompareOp::Eq,
            operand: Operand::Literal(literal),
        }) = &stmt.where_clause
        else {
            return Ok(None);
        };
        if matches!(literal, Literal::Null) {
            return Ok(None);
        }

        let Some(pos) = scope.resolve(column) else {
            return Ok(None);
        };
        let field = &source.fields[pos];
        let table = self.storage.table(&source.name)?;
        let Some(index) = table.indexes_on(&field.name).next() else {
            return Ok(None);
        };
        let key = match validate::convert_literal(literal, field) {
            Ok(key) if !key.is_null() => key,
            _ => return Ok(None),
        };

        let offsets = index.lookup(&key);
        debug!(index = %index.name, key = %key, hits = offsets.len(), "index lookup");

        let file = self.storage.record_file(&source.name);
        let mut rows = Vec::with_capacity(offsets.len());
        for &offset in offsets {
            let record = file.read_at(&source.fields, offset)?;
            if !record.deleted {
                rows.push(record.into_values());
            }
        }
        Ok(Some(rows))
    }

    fn join(&self, stmt: &SelectStatement, scope: &Scope) -> Result<Vec<Vec<Value>>> {
        let conditions = join_conditions(stmt, scope)?;

        let mut tables = scope
            .tables
            .iter()
            .map(|t| self.scan(t))
            .collect::<Result<Vec<_>>>()?
            .into_iter();

        let mut acc = tables.next().unwrap_or_default();
        let mut acc_width = scope.tables[0].fields.len();

        for (step, right) in tables.enumerate().map(|(i, rows)| (i + 1, rows)) {
            let right_width = scope.tables[step].fields.len();
            let join_type = stmt
                .from
                .joins
                .iter()
                .find(|j| j.table_index == step)
                .map(|j| j.join_type)
                .unwrap_or(JoinType::Inner);
            let conds: Vec<JoinCondition> = conditions
                .iter()
                .filter(|c| c.step == step)
                .copied()
                .collect();

            let matches = |l: &[Value], r: &[Value]| {
                conds.iter().all(|c| {
                    compare_values(
                        value_at(l, r, c.left, acc_width),
                        CompareOp::Eq,
                        value_at(l, r, c.right, acc_width),
                    )
                })
            };

            let mut next = Vec::new();
            match join_type {
                JoinType::Inner | JoinType::Left => {
                    for l in &acc {
                        let mut matched = false;
                        for r in &right {
                            if matches(l, r) {
                                next.push(concat(l, r));
                                matched = true;
                            }
                        }
                        if !matched && join_type == JoinType::Left {
                            next.push(concat(l, &vec![Value::Null; right_width]));
                        }
                    }
                }
                JoinType::Right => {
                    let mut right_matched = vec![false; right.len()];
                    for l in &acc {
                        for (i, r) in right.iter().enumerate() {
                            if matches(l, r) {
                                next.push(concat(l, r));
                                right_matched[i] = true;
                            }
                        }
                    }
                    let padding = vec![Value::Null; acc_width];
                    for (r, _) in right.iter().zip(&right_matched).filter(|(_, m)| !**m) {
                        next.push(concat(&padding, r));
                    }
                }
            }

            debug!(step, ?join_type, rows = next.len(), "join step");
            acc = next;
            acc_width += right_width;
        }

        Ok(acc)
    }

    fn project(
        &mut self,
        stmt: &SelectStatement,
        scope: &Scope,
        rows: Vec<Vec<Value>>,
        outer: Option<&Binding<'_>>,
    ) -> Result<Vec<OutputRow>> {
        let mut output = Vec::with_capacity(rows.len());
        for row in rows {
            let values = self.project_row(stmt, scope, &row, outer, |_, _| Ok(Value::Null))?;
            output.push((values, row));
        }
        Ok(output)
    }

    fn aggregate(
        &mut self,
        stmt: &SelectStatement,
        scope: &Scope,
        rows: Vec<Vec<Value>>,
        outer: Option<&Binding<'_>>,
    ) -> Result<Vec<OutputRow>> {
        let key_positions = stmt
            .group_by
            .iter()
            .map(|col| {
                scope
                    .resolve(col)
                    .ok_or_else(|| Error::ColumnNotFound(col.to_string(), scope.describe()))
            })
            .collect::<Result<Vec<_>>>()?;

        let mut groups: IndexMap<String, Vec<&Vec<Value>>> = IndexMap::new();
        if key_positions.is_empty() {
            groups.insert(String::new(), rows.iter().collect());
        } else {
            for row in &rows {
                let key = key_positions
                    .iter()
                    .map(|&p| row[p].to_string())
                    .collect::<Vec<_>>()
                    .join("|");
                groups.entry(key).or_default().push(row);
            }
        }

        debug!(groups = groups.len(), rows = rows.len(), "aggregating");

        let mut output = Vec::with_capacity(groups.len());
        for members in groups.values() {
            let first = members
                .first()
                .map(|r| (*r).clone())
                .unwrap_or_else(|| vec![Value::Null; scope.width()]);

            let values = self.project_row(stmt, scope, &first, outer, |func, arg| {
                aggregate_value(func, arg, scope, members)
            })?;
            output.push((values, first));
        }
        Ok(output)
    }

    fn project_row(
        &mut self,
        stmt: &SelectStatement,
        scope: &Scope,
        row: &[Value],
        outer: Option<&Binding<'_>>,
        mut aggregate: impl FnMut(AggregateFunc, &AggregateArg) -> Result<Value>,
    ) -> Result<Vec<Value>> {
        let binding = Binding::new(scope, row, outer);
        let mut values = Vec::new();

        for item in &stmt.columns {
            match item {
                SelectItem::Wildcard => values.extend_from_slice(row),
                SelectItem::Expr { expr, .. } => values.push(match expr {
                    SelectExpr::Column(col) => binding.lookup(col)?,
                    SelectExpr::Aggregate { func, arg } => aggregate(*func, arg)?,
                    SelectExpr::Subquery(query) => self.run_subquery(query, &binding)?.scalar(),
                }),
            }
        }
        Ok(values)
    }

    /// Whether a subquery reads columns of an enclosing query
    fn is_correlated(&self, query: &SelectStatement) -> bool {
        let Ok(scope) = Scope::from_clause(self.storage.database(), &query.from) else {
            return true;
        };

        let mut refs = Vec::new();
        let mut nested = false;
        collect_refs(query, &mut refs, &mut nested);

        nested || refs.iter().any(|col| scope.resolve(col).is_none())
    }
}

impl SubqueryRunner for QueryExecutor<'_> {
    fn run_subquery(&mut self, query: &SelectStatement, outer: &Binding<'_>) -> Result<QueryResult> {
        let key = query as *const SelectStatement as usize;
        if let Some(hit) = self.cache.get(&key) {
            return Ok(hit.clone());
        }

        let result = self.execute_select(query, Some(outer))?;
        if !self.is_correlated(query) {
            self.cache.insert(key, result.clone());
        }
        Ok(result)
    }
}

/// Validate every column the statement references, outside subqueries
fn check_columns(stmt: &SelectStatement, binding: &Binding<'_>) -> Result<()> {
    let local = |col: &ColumnRef| -> Result<()> {
        binding
            .scope
            .resolve(col)
            .map(|_| ())
            .ok_or_else(|| Error::ColumnNotFound(col.to_string(), binding.scope.describe()))
    };

    for item in &stmt.columns {
        match item {
            SelectItem::Expr {
                expr: SelectExpr::Column(col),
                ..
            } => binding.check(col)?,
            SelectItem::Expr {
                expr: SelectExpr::Aggregate { func, arg },
                ..
            } => match arg {
                AggregateArg::Column(col) => local(col)?,
                AggregateArg::Star if *func != AggregateFunc::Count => {
                    return Err(Error::ValidationError(format!(
                        "{}(*) is not supported",
                        func
                    )))
                }
                AggregateArg::Star => {}
            },
            _ => {}
        }
    }

    if let Some(cond) = &stmt.where_clause {
        check_condition(cond, binding)?;
    }
    for col in &stmt.group_by {
        local(col)?;
    }
    for join in &stmt.from.joins {
        local(&join.left)?;
        local(&join.right)?;
    }
    Ok(())
}

/// Join conditions from explicit ON clauses, or when there are none,
/// the top-level `a.x = b.y` conjuncts of WHERE
fn join_conditions(stmt: &SelectStatement, scope: &Scope) -> Result<Vec<JoinCondition>> {
    let locate = |col: &ColumnRef| {
        scope
            .locate(col)
            .ok_or_else(|| Error::ColumnNotFound(col.to_string(), scope.describe()))
    };

    let mut conditions = Vec::new();

    if !stmt.from.joins.is_empty() {
        for join in &stmt.from.joins {
            let (lt, lp) = locate(&join.left)?;
            let (rt, rp) = locate(&join.right)?;
            conditions.push(JoinCondition {
                left: lp,
                right: rp,
                step: lt.max(rt).max(1),
            });
        }
        return Ok(conditions);
    }

    let mut conjuncts = Vec::new();
    if let Some(cond) = &stmt.where_clause {
        flatten_and(cond, &mut conjuncts);
    }

    for cond in conjuncts {
        if let Condition::Compare {
            column,
            op: CompareOp::Eq,
            operand: Operand::Column(other),
        } = cond
        {
            if let (Some((lt, lp)), Some((rt, rp))) = (scope.locate(column), scope.locate(other)) {
                if lt != rt {
                    conditions.push(JoinCondition {
                        left: lp,
                        right: rp,
                        step: lt.max(rt),
                    });
                }
            }
        }
    }

    debug!(implicit = conditions.len(), "extracted join conditions from WHERE");
    Ok(conditions)
}

fn flatten_and<'a>(cond: &'a Condition, out: &mut Vec<&'a Condition>) {
    match cond {
        Condition::And(l, r) => {
            flatten_and(l, out);
            flatten_and(r, out);
        }
        other => out.push(other),
    }
}

fn value_at<'a>(left: &'a [Value], right: &'a [Value], pos: usize, split: usize) -> &'a Value {
    if pos < split {
        &left[pos]
    } else {
        &right[pos - split]
    }
}

fn concat(left: &[Value], right: &[Value]) -> Vec<Value> {
    let mut row = Vec::with_capacity(left.len() + right.len());
    row.extend_from_slice(left);
    row.extend_from_slice(right);
    row
}

fn aggregate_value(
    func: AggregateFunc,
    arg: &AggregateArg,
    scope: &Scope,
    rows: &[&Vec<Value>],
) -> Result<Value> {
    let col = match arg {
        AggregateArg::Star => return Ok(Value::Int(rows.len() as i64)),
        AggregateArg::Column(col) => col,
    };
    let pos = scope
        .resolve(col)
        .ok_or_else(|| Error::ColumnNotFound(col.to_string(), scope.describe()))?;

    let values = rows.iter().map(|r| &r[pos]).filter(|v| !v.is_null());

    Ok(match func {
        AggregateFunc::Count => Value::Int(values.count() as i64),
        AggregateFunc::Sum => Value::Float(values.filter_map(Value::as_f64).sum()),
        AggregateFunc::Avg => {
            let nums: Vec<f64> = values.filter_map(Value::as_f64).collect();
            if nums.is_empty() {
                Value::Float(0.0)
            } else {
                Value::Float(nums.iter().sum::<f64>() / nums.len() as f64)
            }
        }
        AggregateFunc::Max => values
            .max_by(|a, b| a.compare(b))
            .cloned()
            .unwrap_or(Value::Null),
        AggregateFunc::Min => values
            .min_by(|a, b| a.compare(b))
            .cloned()
            .unwrap_or(Value::Null),
    })
}

/// Column labels of the result set
fn output_labels(stmt: &SelectStatement, scope: &Scope) -> Vec<String> {
    let qualify = scope.tables.len() > 1;
    let mut labels = Vec::new();

    for item in &stmt.columns {
        match item {
            SelectItem::Wildcard => {
                for table in &scope.tables {
                    for field in &table.fields {
                        labels.push(if qualify {
                            format!("{}.{}", table.alias, field.name)
                        } else {
                            field.name.clone()
                        });
                    }
                }
            }
            SelectItem::Expr { expr, alias } => {
                labels.push(alias.clone().unwrap_or_else(|| expr.to_string()));
            }
        }
    }
    labels
}

/// ORDER BY keys name an output label first, then a source column
fn resolve_order(
    order_by: &[OrderByItem],
    labels: &[String],
    scope: &Scope,
) -> Result<Vec<(SortKey, bool)>> {
    order_by
        .iter()
        .map(|item| {
            let text = item.column.to_string();
            let key = if let Some(i) = labels.iter().position(|l| l.eq_ignore_ascii_case(&text)) {
                SortKey::Output(i)
            } else if let Some(pos) = scope.resolve(&item.column) {
                SortKey::Source(pos)
            } else {
                return Err(Error::ColumnNotFound(text, scope.describe()));
            };
            Ok((key, item.ascending))
        })
        .collect()
}

fn compare_rows(a: &OutputRow, b: &OutputRow, keys: &[(SortKey, bool)]) -> Ordering {
    for (key, ascending) in keys {
        let (x, y) = match key {
            SortKey::Output(i) => (&a.0[*i], &b.0[*i]),
            SortKey::Source(i) => (&a.1[*i], &b.1[*i]),
        };
        let ord = x.compare(y);
        let ord = if *ascending { ord } else { ord.reverse() };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

fn collect_refs<'a>(query: &'a SelectStatement, refs: &mut Vec<&'a ColumnRef>, nested: &mut bool) {
    for item in &query.columns {
        if let SelectItem::Expr { expr, .. } = item {
            match expr {
                SelectExpr::Column(col) => refs.push(col),
                SelectExpr::Aggregate {
                    arg: AggregateArg::Column(col),
                    ..
                } => refs.push(col),
                SelectExpr::Aggregate { .. } => {}
                SelectExpr::Subquery(_) => *nested = true,
            }
        }
    }
    if let Some(cond) = &query.where_clause {
        collect_condition_refs(cond, refs, nested);
    }
    refs.extend(query.group_by.iter());
    for join in &query.from.joins {
        refs.push(&join.left);
        refs.push(&join.right);
    }
}

fn collect_condition_refs<'a>(cond: &'a Condition, refs: &mut Vec<&'a ColumnRef>, nested: &mut bool) {
    match cond {
        Condition::And(l, r) | Condition::Or(l, r) => {
            collect_condition_refs(l, refs, nested);
            collect_condition_refs(r, refs, nested);
        }
        Condition::Compare {
            column, operand, ..
        } => {
            refs.push(column);
            match operand {
                Operand::Column(other) => refs.push(other),
                Operand::Subquery(_) => *nested = true,
                Operand::Literal(_) => {}
            }
        }
        Condition::Like { column, .. } | Condition::Between { column, .. } => refs.push(column),
        Condition::InSubquery { column, .. } => {
            refs.push(column);
            *nested = true;
        }
    }
}
