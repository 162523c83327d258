use std::collections::BTreeMap;

use crate::dialect::Dialect;
use crate::error::{StoreError, StoreResult};
use crate::plan::{Predicate, Projection, QueryPlan};
use crate::schema::{ColumnType, TableDef};
use crate::value::{EncodedRow, SqlValue};

/// Rendered statement: SQL text plus binds in placeholder order.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlQuery {
    pub sql: String,
    pub binds: Vec<SqlValue>,
}

struct Binder {
    dialect: Dialect,
    binds: Vec<SqlValue>,
}

impl Binder {
    fn new(dialect: Dialect) -> Self {
        Binder { dialect, binds: Vec::new() }
    }

    fn push(&mut self, value: SqlValue) -> String {
        self.binds.push(value);
        self.dialect.placeholder(self.binds.len())
    }

    fn finish(self, sql: String) -> SqlQuery {
        SqlQuery { sql, binds: self.binds }
    }
}

fn render_predicate(dialect: Dialect, predicate: &Predicate, binder: &mut Binder) -> String {
    match predicate {
        Predicate::Eq { field, value } => {
            let ph = binder.push(value.clone());
            format!("{} = {}", dialect.quote_ident(field), ph)
        }
        Predicate::In { field, values } => {
            let placeholders: Vec<String> =
                values.iter().map(|v| binder.push(v.clone())).collect();
            format!("{} IN ({})", dialect.quote_ident(field), placeholders.join(", "))
        }
        Predicate::Cmp { field, op, value } => {
            let ph = binder.push(value.clone());
            format!("{} {} {}", dialect.quote_ident(field), op.sql(), ph)
        }
        Predicate::Match { field, keyword, negated } => {
            let ph = binder.push(SqlValue::Text(keyword.clone()));
            format!(
                "{} {} {}",
                dialect.quote_ident(field),
                dialect.like_operator(*negated),
                ph
            )
        }
        Predicate::Any(alternatives) => {
            let parts: Vec<String> = alternatives
                .iter()
                .map(|p| render_predicate(dialect, p, binder))
                .collect();
            format!("({})", parts.join(" OR "))
        }
    }
}

fn render_where(
    dialect: Dialect,
    table: &TableDef,
    plan: &QueryPlan,
    binder: &mut Binder,
) -> String {
    let mut parts: Vec<String> = plan
        .filter
        .iter()
        .map(|p| render_predicate(dialect, p, binder))
        .collect();

    // Last-row-per-group keeps only rows whose primary key is the group
    // maximum, via a correlated subquery against the same table.
    if let Projection::LastPerGroup { group, .. } = &plan.projection {
        let pk = dialect.quote_ident(primary_key(table));
        let t = dialect.quote_ident(&table.name);
        let g = dialect.quote_ident(group);
        parts.push(format!(
            "{pk} = (SELECT MAX(latest.{pk}) FROM {t} AS latest WHERE latest.{g} = {t}.{g})",
        ));
    }

    if parts.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", parts.join(" AND "))
    }
}

fn primary_key(table: &TableDef) -> &str {
    table
        .columns
        .iter()
        .find(|c| c.primary_key)
        .map(|c| c.name.as_str())
        .unwrap_or("id")
}

fn render_projection(dialect: Dialect, plan: &QueryPlan) -> String {
    match &plan.projection {
        Projection::All => "*".to_string(),
        Projection::Columns(columns) => columns
            .iter()
            .map(|c| dialect.quote_ident(c))
            .collect::<Vec<_>>()
            .join(", "),
        Projection::Distinct(field) => format!("DISTINCT {}", dialect.quote_ident(field)),
        Projection::LastPerGroup { columns, bool_columns, .. } => columns
            .iter()
            .map(|c| {
                let quoted = dialect.quote_ident(c);
                if bool_columns.contains(c) {
                    format!("{} AS {}", dialect.bool_to_int_expr(&quoted), quoted)
                } else {
                    quoted
                }
            })
            .collect::<Vec<_>>()
            .join(", "),
        Projection::CountBy(field) => format!(
            "{}, COUNT(*) AS {}",
            dialect.quote_ident(field),
            dialect.quote_ident("count")
        ),
    }
}

pub fn render_select(dialect: Dialect, table: &TableDef, plan: &QueryPlan) -> SqlQuery {
    let mut binder = Binder::new(dialect);
    let mut sql = format!(
        "SELECT {} FROM {}",
        render_projection(dialect, plan),
        dialect.quote_ident(&table.name)
    );
    sql.push_str(&render_where(dialect, table, plan, &mut binder));

    if let Projection::CountBy(field) = &plan.projection {
        sql.push_str(&format!(" GROUP BY {}", dialect.quote_ident(field)));
    }

    if !plan.order.is_empty() {
        let clauses: Vec<String> = plan
            .order
            .iter()
            .map(|(col, dir)| format!("{} {}", dialect.quote_ident(col), dir.sql()))
            .collect();
        sql.push_str(&format!(" ORDER BY {}", clauses.join(", ")));
    }

    if let Some(limit) = plan.limit {
        sql.push_str(&format!(" LIMIT {}", limit));
        if let Some(offset) = plan.offset {
            sql.push_str(&format!(" OFFSET {}", offset));
        }
    }

    binder.finish(sql)
}

/// COUNT variant of the same plan: same filter, no ordering or pagination.
pub fn render_count(dialect: Dialect, table: &TableDef, plan: &QueryPlan) -> SqlQuery {
    let mut binder = Binder::new(dialect);
    let mut sql = format!("SELECT COUNT(*) FROM {}", dialect.quote_ident(&table.name));
    sql.push_str(&render_where(dialect, table, plan, &mut binder));
    binder.finish(sql)
}

pub fn render_find_by_pk(dialect: Dialect, table: &TableDef, pk: &SqlValue) -> SqlQuery {
    let mut binder = Binder::new(dialect);
    let ph = binder.push(pk.clone());
    let sql = format!(
        "SELECT * FROM {} WHERE {} = {} LIMIT 1",
        dialect.quote_ident(&table.name),
        dialect.quote_ident(primary_key(table)),
        ph
    );
    binder.finish(sql)
}

pub fn render_insert(dialect: Dialect, table: &TableDef, row: &EncodedRow) -> SqlQuery {
    let mut binder = Binder::new(dialect);
    let columns: Vec<String> = row.keys().map(|k| dialect.quote_ident(k)).collect();
    let placeholders: Vec<String> = row.values().map(|v| binder.push(v.clone())).collect();
    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        dialect.quote_ident(&table.name),
        columns.join(", "),
        placeholders.join(", ")
    );
    binder.finish(sql)
}

/// Partial update keyed by primary key; the key column itself is never
/// part of the SET list.
pub fn render_update(
    dialect: Dialect,
    table: &TableDef,
    row: &EncodedRow,
    pk: &SqlValue,
) -> SqlQuery {
    let pk_field = primary_key(table).to_string();
    let mut binder = Binder::new(dialect);
    let assignments: Vec<String> = row
        .iter()
        .filter(|(name, _)| **name != pk_field)
        .map(|(name, value)| {
            let ph = binder.push(value.clone());
            format!("{} = {}", dialect.quote_ident(name), ph)
        })
        .collect();
    let ph = binder.push(pk.clone());
    let sql = format!(
        "UPDATE {} SET {} WHERE {} = {}",
        dialect.quote_ident(&table.name),
        assignments.join(", "),
        dialect.quote_ident(&pk_field),
        ph
    );
    binder.finish(sql)
}

pub fn render_delete(dialect: Dialect, table: &TableDef, pk: &SqlValue) -> SqlQuery {
    let mut binder = Binder::new(dialect);
    let ph = binder.push(pk.clone());
    let sql = format!(
        "DELETE FROM {} WHERE {} = {}",
        dialect.quote_ident(&table.name),
        dialect.quote_ident(primary_key(table)),
        ph
    );
    binder.finish(sql)
}

fn column_type_sql(dialect: Dialect, ctype: ColumnType) -> String {
    match ctype {
        ColumnType::VarChar(n) => format!("VARCHAR({})", n),
        ColumnType::Text => "TEXT".to_string(),
        ColumnType::MediumText => match dialect {
            Dialect::Mysql => "MEDIUMTEXT".to_string(),
            _ => "TEXT".to_string(),
        },
        ColumnType::Timestamp => "TIMESTAMP".to_string(),
        ColumnType::Double => match dialect {
            Dialect::Postgres => "DOUBLE PRECISION".to_string(),
            _ => "DOUBLE".to_string(),
        },
        ColumnType::Boolean => "BOOLEAN".to_string(),
        ColumnType::Blob => match dialect {
            Dialect::Postgres => "BYTEA".to_string(),
            _ => "BLOB".to_string(),
        },
    }
}

/// DDL for one physical table: a CREATE TABLE plus index statements.
/// Synchronization is additive; everything is IF NOT EXISTS.
pub fn render_ddl(dialect: Dialect, table: &TableDef) -> Vec<String> {
    let quoted_table = dialect.quote_ident(&table.name);
    let mut body: Vec<String> = table
        .columns
        .iter()
        .map(|column| {
            let quoted = dialect.quote_ident(&column.name);
            if column.primary_key && column.auto_increment {
                dialect.autoincrement_pk(&quoted)
            } else {
                match column.ctype {
                    Some(ctype) => format!("{} {}", quoted, column_type_sql(dialect, ctype)),
                    // untyped column: defer to the engine default. SQLite
                    // accepts a bare name; the others need a type.
                    None => match dialect {
                        Dialect::Sqlite => quoted,
                        _ => format!("{} TEXT", quoted),
                    },
                }
            }
        })
        .collect();

    if let Some(unique) = &table.unique_constraint {
        let columns: Vec<String> =
            unique.columns.iter().map(|c| dialect.quote_ident(c)).collect();
        body.push(format!(
            "CONSTRAINT {} UNIQUE ({})",
            dialect.quote_ident(&unique.name),
            columns.join(", ")
        ));
    }

    let mut statements = Vec::new();
    if dialect.inline_index_ddl() {
        for index in &table.indexes {
            body.push(format!(
                "INDEX {} ({})",
                dialect.quote_ident(&format!("{}_{}_idx", table.name, index)),
                dialect.quote_ident(index)
            ));
        }
        statements.push(format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            quoted_table,
            body.join(", ")
        ));
    } else {
        statements.push(format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            quoted_table,
            body.join(", ")
        ));
        for index in &table.indexes {
            statements.push(format!(
                "CREATE INDEX IF NOT EXISTS {} ON {} ({})",
                dialect.quote_ident(&format!("{}_{}_idx", table.name, index)),
                quoted_table,
                dialect.quote_ident(index)
            ));
        }
    }
    statements
}

/// Substitute `:name` replacements in a raw query with positional
/// placeholders, binding values in order of appearance. `::` is left alone
/// so Postgres casts survive.
pub fn bind_named(
    dialect: Dialect,
    sql: &str,
    replacements: &BTreeMap<String, SqlValue>,
) -> StoreResult<SqlQuery> {
    let mut out = String::with_capacity(sql.len());
    let mut binds: Vec<SqlValue> = Vec::new();
    let mut chars = sql.chars().peekable();

    while let Some(c) = chars.next() {
        if c != ':' {
            out.push(c);
            continue;
        }
        if chars.peek() == Some(&':') {
            chars.next();
            out.push_str("::");
            continue;
        }
        let mut name = String::new();
        while let Some(&next) = chars.peek() {
            if next.is_ascii_alphanumeric() || next == '_' {
                name.push(next);
                chars.next();
            } else {
                break;
            }
        }
        if name.is_empty() {
            out.push(':');
            continue;
        }
        let value = replacements
            .get(&name)
            .ok_or(StoreError::MissingReplacement { name: name.clone() })?;
        binds.push(value.clone());
        out.push_str(&dialect.placeholder(binds.len()));
    }

    Ok(SqlQuery { sql: out, binds })
}
