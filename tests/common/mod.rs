use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use relstore::plan::{Predicate, QueryPlan};
use relstore::schema::TableDef;
use relstore::value::{EncodedRow, SqlValue};
use relstore::{Dialect, RelationalClient, StoreResult};

/// One recorded client invocation, in argument order.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Sync { tables: Vec<String> },
    FindByPk { table: String, pk: SqlValue },
    FindOne { table: String, filter: Vec<Predicate> },
    FindAll { table: String, plan: QueryPlan },
    FindAndCount { table: String, plan: QueryPlan },
    Insert { table: String, row: EncodedRow },
    Update { table: String, row: EncodedRow, pk: SqlValue },
    Delete { table: String, pk: SqlValue },
    Raw { sql: String, replacements: BTreeMap<String, SqlValue> },
}

/// In-memory stand-in for a relational engine: records every call and
/// replays canned rows.
pub struct MockClient {
    dialect: Dialect,
    calls: Mutex<Vec<Call>>,
    rows: Vec<EncodedRow>,
    count: u64,
}

impl MockClient {
    pub fn new(dialect: Dialect) -> Self {
        MockClient { dialect, calls: Mutex::new(Vec::new()), rows: Vec::new(), count: 0 }
    }

    pub fn with_rows(mut self, rows: Vec<EncodedRow>) -> Self {
        self.rows = rows;
        self
    }

    pub fn with_count(mut self, count: u64) -> Self {
        self.count = count;
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl RelationalClient for MockClient {
    fn dialect(&self) -> Dialect {
        self.dialect
    }

    async fn sync(&self, tables: &[TableDef]) -> StoreResult<()> {
        self.record(Call::Sync {
            tables: tables.iter().map(|t| t.name.clone()).collect(),
        });
        Ok(())
    }

    async fn find_by_pk(
        &self,
        table: &TableDef,
        pk: &SqlValue,
    ) -> StoreResult<Option<EncodedRow>> {
        self.record(Call::FindByPk { table: table.name.clone(), pk: pk.clone() });
        Ok(self.rows.first().cloned())
    }

    async fn find_one(
        &self,
        table: &TableDef,
        filter: Vec<Predicate>,
    ) -> StoreResult<Option<EncodedRow>> {
        self.record(Call::FindOne { table: table.name.clone(), filter });
        Ok(self.rows.first().cloned())
    }

    async fn find_all(
        &self,
        table: &TableDef,
        plan: &QueryPlan,
    ) -> StoreResult<Vec<EncodedRow>> {
        self.record(Call::FindAll { table: table.name.clone(), plan: plan.clone() });
        Ok(self.rows.clone())
    }

    async fn find_and_count(
        &self,
        table: &TableDef,
        plan: &QueryPlan,
    ) -> StoreResult<(u64, Vec<EncodedRow>)> {
        self.record(Call::FindAndCount { table: table.name.clone(), plan: plan.clone() });
        Ok((self.count, self.rows.clone()))
    }

    async fn insert(&self, table: &TableDef, row: &EncodedRow) -> StoreResult<()> {
        self.record(Call::Insert { table: table.name.clone(), row: row.clone() });
        Ok(())
    }

    async fn update(
        &self,
        table: &TableDef,
        row: &EncodedRow,
        pk: &SqlValue,
    ) -> StoreResult<u64> {
        self.record(Call::Update {
            table: table.name.clone(),
            row: row.clone(),
            pk: pk.clone(),
        });
        Ok(1)
    }

    async fn delete(&self, table: &TableDef, pk: &SqlValue) -> StoreResult<u64> {
        self.record(Call::Delete { table: table.name.clone(), pk: pk.clone() });
        Ok(1)
    }

    async fn raw(
        &self,
        sql: &str,
        replacements: &BTreeMap<String, SqlValue>,
    ) -> StoreResult<Vec<EncodedRow>> {
        self.record(Call::Raw { sql: sql.to_string(), replacements: replacements.clone() });
        Ok(self.rows.clone())
    }
}
