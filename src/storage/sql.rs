//! The SQL subset understood by the memory store, on top of `sqlparser`.

use super::catalog::Catalog;
use super::table::{Column, Table, Value};
use crate::core::{StoreError, StoreResult};
use sqlparser::ast as sql_ast;
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;

/// Executes migration statements and evaluates guards against a [`Catalog`].
#[derive(Debug)]
pub struct SqlAdapter {
    dialect: PostgreSqlDialect,
}

impl SqlAdapter {
    pub fn new() -> Self {
        Self {
            dialect: PostgreSqlDialect {},
        }
    }

    pub fn parse(&self, sql: &str) -> StoreResult<Vec<sql_ast::Statement>> {
        let statements = Parser::parse_sql(&self.dialect, sql)
            .map_err(|e| StoreError::ParseError(e.to_string()))?;
        if statements.is_empty() {
            return Err(StoreError::ParseError(format!("No statement in '{}'", sql.trim())));
        }
        Ok(statements)
    }

    /// Applies every statement in `sql`, in order. Returns how many ran.
    pub fn execute(&self, catalog: &mut Catalog, sql: &str) -> StoreResult<usize> {
        let statements = self.parse(sql)?;
        for statement in &statements {
            self.apply(catalog, statement)?;
            catalog.log_statement(statement.to_string());
        }
        Ok(statements.len())
    }

    /// Evaluates a guard query to a boolean.
    ///
    /// A literal projection yields its truthiness; a query over a table holds
    /// when the table has rows (which is also when `COUNT(*)` is non-zero).
    pub fn evaluate(&self, catalog: &Catalog, guard: &str) -> StoreResult<bool> {
        let statements = self.parse(guard)?;
        let [sql_ast::Statement::Query(query)] = statements.as_slice() else {
            return Err(StoreError::UnsupportedStatement(format!(
                "Guard must be a single SELECT: {}",
                guard.trim()
            )));
        };
        let sql_ast::SetExpr::Select(select) = query.body.as_ref() else {
            return Err(StoreError::UnsupportedStatement(format!(
                "Only SELECT guards are supported: {}",
                guard.trim()
            )));
        };
        if select.selection.is_some() {
            return Err(StoreError::UnsupportedStatement(
                "WHERE clauses are not supported in guards".into(),
            ));
        }

        match select.from.as_slice() {
            [] => {
                let [item] = select.projection.as_slice() else {
                    return Err(StoreError::UnsupportedStatement(
                        "A guard without FROM must select exactly one literal".into(),
                    ));
                };
                match item {
                    sql_ast::SelectItem::UnnamedExpr(expr)
                    | sql_ast::SelectItem::ExprWithAlias { expr, .. } => literal_truth(expr),
                    _ => Err(StoreError::UnsupportedStatement(format!(
                        "Unsupported guard projection: {}",
                        item
                    ))),
                }
            }
            [from] if from.joins.is_empty() => {
                let name = table_factor_name(&from.relation)?;
                Ok(catalog.table(&name)?.row_count() > 0)
            }
            _ => Err(StoreError::UnsupportedStatement(
                "Guards may read from a single table only".into(),
            )),
        }
    }

    fn apply(&self, catalog: &mut Catalog, statement: &sql_ast::Statement) -> StoreResult<()> {
        match statement {
            sql_ast::Statement::CreateTable(create) => {
                let name = extract_table_name(&create.name)?;
                let columns = create
                    .columns
                    .iter()
                    .map(|col| Column::new(col.name.value.clone(), col.data_type.to_string()))
                    .collect();
                catalog.create_table(Table::new(name, columns), create.if_not_exists)
            }
            sql_ast::Statement::Drop {
                object_type,
                names,
                if_exists,
                ..
            } => {
                if !matches!(object_type, sql_ast::ObjectType::Table) {
                    return Err(StoreError::UnsupportedStatement(format!(
                        "Only DROP TABLE is supported: {}",
                        statement
                    )));
                }
                for name in names {
                    catalog.drop_table(&extract_table_name(name)?, *if_exists)?;
                }
                Ok(())
            }
            sql_ast::Statement::Insert(insert) => {
                let sql_ast::TableObject::TableName(name) = &insert.table else {
                    return Err(StoreError::UnsupportedStatement(format!(
                        "INSERT into a table function is not supported: {}",
                        insert.table
                    )));
                };
                let table_name = extract_table_name(name)?;
                let columns: Vec<String> = insert.columns.iter().map(|id| id.value.clone()).collect();
                let Some(source) = &insert.source else {
                    return Err(StoreError::UnsupportedStatement(
                        "INSERT requires a VALUES clause".into(),
                    ));
                };
                let sql_ast::SetExpr::Values(vals) = source.body.as_ref() else {
                    return Err(StoreError::UnsupportedStatement(
                        "Only VALUES clause supported".into(),
                    ));
                };

                let table = catalog.table_mut(&table_name)?;
                for row in &vals.rows {
                    let values = row.iter().map(convert_value).collect::<StoreResult<Vec<_>>>()?;
                    let column_list = (!columns.is_empty()).then_some(columns.as_slice());
                    table.insert(column_list, values)?;
                }
                Ok(())
            }
            sql_ast::Statement::Delete(delete) => {
                if delete.selection.is_some() {
                    return Err(StoreError::UnsupportedStatement(
                        "DELETE with a WHERE clause is not supported".into(),
                    ));
                }
                let tables = match &delete.from {
                    sql_ast::FromTable::WithFromKeyword(tables)
                    | sql_ast::FromTable::WithoutKeyword(tables) => tables,
                };
                let [from] = tables.as_slice() else {
                    return Err(StoreError::ParseError("DELETE requires exactly one table".into()));
                };
                let name = table_factor_name(&from.relation)?;
                catalog.table_mut(&name)?.clear();
                Ok(())
            }
            sql_ast::Statement::CreateIndex(ci) => {
                let table_name = extract_table_name(&ci.table_name)?;
                let table = catalog.table_mut(&table_name)?;
                let index_name = match &ci.name {
                    Some(name) => extract_table_name(name)?,
                    None => format!("{}_idx_{}", table_name, table.indexes().count()),
                };
                table.add_index(index_name, ci.if_not_exists)
            }
            other => Err(StoreError::UnsupportedStatement(other.to_string())),
        }
    }
}

impl Default for SqlAdapter {
    fn default() -> Self {
        Self::new()
    }
}

fn literal_truth(expr: &sql_ast::Expr) -> StoreResult<bool> {
    match expr {
        sql_ast::Expr::Nested(inner) => literal_truth(inner),
        sql_ast::Expr::UnaryOp {
            op: sql_ast::UnaryOperator::Not,
            expr,
        } => Ok(!literal_truth(expr)?),
        _ => match convert_value(expr)? {
            Value::Null => Ok(false),
            Value::Boolean(b) => Ok(b),
            Value::Number(n) => n
                .parse::<f64>()
                .map(|number| number != 0.0)
                .map_err(|_| StoreError::ParseError(format!("Invalid number: {}", n))),
            Value::Text(s) => Err(StoreError::ExecutionError(format!(
                "Text literal '{}' is not a boolean guard",
                s
            ))),
        },
    }
}

fn convert_value(expr: &sql_ast::Expr) -> StoreResult<Value> {
    match expr {
        sql_ast::Expr::Value(value_with_span) => match &value_with_span.value {
            sql_ast::Value::Number(n, _) => Ok(Value::Number(n.to_string())),
            sql_ast::Value::SingleQuotedString(s) | sql_ast::Value::DoubleQuotedString(s) => {
                Ok(Value::Text(s.clone()))
            }
            sql_ast::Value::Boolean(b) => Ok(Value::Boolean(*b)),
            sql_ast::Value::Null => Ok(Value::Null),
            other => Err(StoreError::UnsupportedStatement(format!("Unsupported value: {}", other))),
        },
        sql_ast::Expr::UnaryOp {
            op: sql_ast::UnaryOperator::Minus,
            expr,
        } => match convert_value(expr)? {
            Value::Number(n) => Ok(Value::Number(format!("-{}", n))),
            other => Err(StoreError::ExecutionError(format!("Cannot negate {}", other))),
        },
        other => Err(StoreError::UnsupportedStatement(format!(
            "Only literal values are supported, got: {}",
            other
        ))),
    }
}

fn table_factor_name(factor: &sql_ast::TableFactor) -> StoreResult<String> {
    match factor {
        sql_ast::TableFactor::Table { name, .. } => extract_table_name(name),
        other => Err(StoreError::UnsupportedStatement(format!(
            "Complex table references are not supported: {}",
            other
        ))),
    }
}

/// Last part of a possibly schema-qualified name. Unquoted identifiers fold
/// to lower case, quoted ones are kept as written.
fn extract_table_name(name: &sql_ast::ObjectName) -> StoreResult<String> {
    match name.0.last() {
        Some(sql_ast::ObjectNamePart::Identifier(ident)) if ident.quote_style.is_none() => {
            Ok(ident.value.to_ascii_lowercase())
        }
        Some(sql_ast::ObjectNamePart::Identifier(ident)) => Ok(ident.value.clone()),
        _ => Err(StoreError::ParseError(format!("Invalid table name: {}", name))),
    }
}
