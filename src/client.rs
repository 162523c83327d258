use std::collections::BTreeMap;

use async_trait::async_trait;
use sqlx::any::{install_default_drivers, AnyPoolOptions, AnyRow};
use sqlx::AnyPool;
use sqlx::{Column, Row};

use crate::dialect::Dialect;
use crate::error::StoreResult;
use crate::plan::{Predicate, QueryPlan};
use crate::schema::TableDef;
use crate::sql::{self, SqlQuery};
use crate::value::{EncodedRow, SqlValue};

/// The relational engine seam. One implementation per backing driver; the
/// adapter never talks SQL itself, only plans and rows.
///
/// A single client (one pool) is shared by every operation on an adapter
/// instance. Failures propagate unmodified; the client never retries.
#[async_trait]
pub trait RelationalClient: Send + Sync {
    fn dialect(&self) -> Dialect;

    /// Create-or-alter every physical table. Additive only.
    async fn sync(&self, tables: &[TableDef]) -> StoreResult<()>;

    async fn find_by_pk(&self, table: &TableDef, pk: &SqlValue)
        -> StoreResult<Option<EncodedRow>>;

    async fn find_one(
        &self,
        table: &TableDef,
        filter: Vec<Predicate>,
    ) -> StoreResult<Option<EncodedRow>>;

    async fn find_all(&self, table: &TableDef, plan: &QueryPlan)
        -> StoreResult<Vec<EncodedRow>>;

    async fn find_and_count(
        &self,
        table: &TableDef,
        plan: &QueryPlan,
    ) -> StoreResult<(u64, Vec<EncodedRow>)>;

    async fn insert(&self, table: &TableDef, row: &EncodedRow) -> StoreResult<()>;

    async fn update(&self, table: &TableDef, row: &EncodedRow, pk: &SqlValue)
        -> StoreResult<u64>;

    async fn delete(&self, table: &TableDef, pk: &SqlValue) -> StoreResult<u64>;

    /// Execute a pre-written query with named `:name` replacements.
    async fn raw(
        &self,
        sql: &str,
        replacements: &BTreeMap<String, SqlValue>,
    ) -> StoreResult<Vec<EncodedRow>>;
}

/// sqlx-backed client over a single `AnyPool`, so one binary can reach
/// Postgres, SQLite, or MySQL depending on the connection URL.
pub struct SqlxClient {
    pool: AnyPool,
    dialect: Dialect,
}

impl SqlxClient {
    pub fn new(pool: AnyPool, dialect: Dialect) -> Self {
        SqlxClient { pool, dialect }
    }

    pub async fn connect(dialect: Dialect, url: &str) -> StoreResult<Self> {
        install_default_drivers();
        let pool = AnyPoolOptions::new()
            .max_connections(5)
            .connect(url)
            .await?;
        Ok(SqlxClient { pool, dialect })
    }

    pub fn pool(&self) -> &AnyPool {
        &self.pool
    }

    async fn fetch(&self, query: &SqlQuery) -> StoreResult<Vec<EncodedRow>> {
        let mut q = sqlx::query(&query.sql);
        for value in &query.binds {
            q = bind_value(q, value);
        }
        let rows = q.fetch_all(&self.pool).await?;
        Ok(rows.iter().map(row_to_encoded).collect())
    }

    async fn execute(&self, query: &SqlQuery) -> StoreResult<u64> {
        let mut q = sqlx::query(&query.sql);
        for value in &query.binds {
            q = bind_value(q, value);
        }
        let result = q.execute(&self.pool).await?;
        Ok(result.rows_affected())
    }
}

type AnyQuery<'q> = sqlx::query::Query<'q, sqlx::Any, sqlx::any::AnyArguments<'q>>;

fn bind_value<'q>(query: AnyQuery<'q>, value: &SqlValue) -> AnyQuery<'q> {
    match value {
        SqlValue::Null => query.bind(Option::<String>::None),
        SqlValue::Integer(i) => query.bind(*i),
        SqlValue::Real(r) => query.bind(*r),
        SqlValue::Text(s) => query.bind(s.clone()),
        SqlValue::Boolean(b) => query.bind(*b),
        // the Any driver has no byte-array bindings; blobs travel as hex
        SqlValue::Blob(b) => query.bind(hex::encode(b)),
    }
}

fn row_to_encoded(row: &AnyRow) -> EncodedRow {
    let mut out = EncodedRow::new();
    for (index, column) in row.columns().iter().enumerate() {
        let value = if let Ok(v) = row.try_get::<Option<i64>, _>(index) {
            v.map(SqlValue::Integer).unwrap_or(SqlValue::Null)
        } else if let Ok(v) = row.try_get::<Option<f64>, _>(index) {
            v.map(SqlValue::Real).unwrap_or(SqlValue::Null)
        } else if let Ok(v) = row.try_get::<Option<bool>, _>(index) {
            v.map(SqlValue::Boolean).unwrap_or(SqlValue::Null)
        } else if let Ok(v) = row.try_get::<Option<String>, _>(index) {
            v.map(SqlValue::Text).unwrap_or(SqlValue::Null)
        } else {
            SqlValue::Null
        };
        out.insert(column.name().to_string(), value);
    }
    out
}

#[async_trait]
impl RelationalClient for SqlxClient {
    fn dialect(&self) -> Dialect {
        self.dialect
    }

    async fn sync(&self, tables: &[TableDef]) -> StoreResult<()> {
        for table in tables {
            for statement in sql::render_ddl(self.dialect, table) {
                sqlx::query(&statement).execute(&self.pool).await?;
            }
        }
        Ok(())
    }

    async fn find_by_pk(
        &self,
        table: &TableDef,
        pk: &SqlValue,
    ) -> StoreResult<Option<EncodedRow>> {
        let query = sql::render_find_by_pk(self.dialect, table, pk);
        Ok(self.fetch(&query).await?.into_iter().next())
    }

    async fn find_one(
        &self,
        table: &TableDef,
        filter: Vec<Predicate>,
    ) -> StoreResult<Option<EncodedRow>> {
        let mut plan = QueryPlan::equality(filter);
        plan.limit = Some(1);
        let query = sql::render_select(self.dialect, table, &plan);
        Ok(self.fetch(&query).await?.into_iter().next())
    }

    async fn find_all(
        &self,
        table: &TableDef,
        plan: &QueryPlan,
    ) -> StoreResult<Vec<EncodedRow>> {
        let query = sql::render_select(self.dialect, table, plan);
        self.fetch(&query).await
    }

    async fn find_and_count(
        &self,
        table: &TableDef,
        plan: &QueryPlan,
    ) -> StoreResult<(u64, Vec<EncodedRow>)> {
        let count_query = sql::render_count(self.dialect, table, plan);
        let counted = self.fetch(&count_query).await?;
        let count = counted
            .first()
            .and_then(|row| row.values().next().and_then(|v| v.as_integer()))
            .unwrap_or(0) as u64;
        let rows = self.find_all(table, plan).await?;
        Ok((count, rows))
    }

    async fn insert(&self, table: &TableDef, row: &EncodedRow) -> StoreResult<()> {
        let query = sql::render_insert(self.dialect, table, row);
        self.execute(&query).await?;
        Ok(())
    }

    async fn update(
        &self,
        table: &TableDef,
        row: &EncodedRow,
        pk: &SqlValue,
    ) -> StoreResult<u64> {
        let query = sql::render_update(self.dialect, table, row, pk);
        self.execute(&query).await
    }

    async fn delete(&self, table: &TableDef, pk: &SqlValue) -> StoreResult<u64> {
        let query = sql::render_delete(self.dialect, table, pk);
        self.execute(&query).await
    }

    async fn raw(
        &self,
        sql_text: &str,
        replacements: &BTreeMap<String, SqlValue>,
    ) -> StoreResult<Vec<EncodedRow>> {
        let query = sql::bind_named(self.dialect, sql_text, replacements)?;
        self.fetch(&query).await
    }
}
