use std::collections::{BTreeMap, HashMap};

use serde_json::{json, Value as Json};
use tempfile::TempDir;

use relstore::scan::ScanRequest;
use relstore::{
    Dialect, DialectQuery, FieldSpec, FieldType, ModelDescriptor, QueryRequest, Record,
    RecordRequest, RelationalAdapter, ScanResult, StoreConfig,
};

fn items_model() -> ModelDescriptor {
    ModelDescriptor::new(
        "items",
        vec![
            FieldSpec::new("id", FieldType::Number),
            FieldSpec::new("name", FieldType::Str),
            FieldSpec::new("num", FieldType::Number),
            FieldSpec::new("bool", FieldType::Boolean),
            FieldSpec::new("arr", FieldType::Array),
        ],
    )
    .with_indexes(vec!["name".to_string()], vec!["name".to_string()])
}

fn record(value: Json) -> Record {
    value.as_object().cloned().unwrap()
}

async fn file_backed_adapter(dir: &TempDir) -> RelationalAdapter {
    let _ = env_logger::builder().is_test(true).try_init();
    let config = StoreConfig {
        database: dir.path().join("store.db").display().to_string(),
        dialect: Some(Dialect::Sqlite),
        ..Default::default()
    };
    let mut registry = HashMap::new();
    registry.insert("items".to_string(), items_model());
    RelationalAdapter::connect(config, registry)
        .await
        .expect("sqlite connect")
}

#[tokio::test]
async fn test_sqlite_end_to_end() {
    let dir = TempDir::new().unwrap();
    let adapter = file_backed_adapter(&dir).await;
    adapter.setup("true").await.unwrap();

    // Three rows, two sharing a name.
    for (id, name, flag) in [(1, "foo", true), (2, "bar", false), (3, "bar", true)] {
        adapter
            .save(&RecordRequest::new(
                "items",
                record(json!({
                    "id": id,
                    "name": name,
                    "bool": flag,
                    "arr": [id, id + 1],
                })),
            ))
            .await
            .unwrap();
    }

    // Fetch by primary key, with structured and boolean fields restored.
    let got = adapter
        .get(&RecordRequest::new("items", record(json!({"id": 2}))))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(got["name"], json!("bar"));
    assert_eq!(got["bool"], json!(false));
    assert_eq!(got["arr"], json!([2, 3]));

    // Absent rows come back as None.
    let absent = adapter
        .get(&RecordRequest::new("items", record(json!({"id": 999}))))
        .await
        .unwrap();
    assert_eq!(absent, None);

    // Default listing order is primary key, newest first.
    let result = adapter.scan(&ScanRequest::for_table("items")).await.unwrap();
    let ids: Vec<&Json> = result.rows().iter().map(|r| &r["id"]).collect();
    assert_eq!(ids, vec![&json!(3), &json!(2), &json!(1)]);

    // Equality filter.
    let mut req = ScanRequest::for_table("items");
    req.params = Some(record(json!({"name": "bar"})));
    let result = adapter.scan(&req).await.unwrap();
    assert_eq!(result.rows().len(), 2);

    // One-indexed pagination.
    let mut req = ScanRequest::for_table("items");
    req.count = Some(1);
    req.page = Some(2);
    let result = adapter.scan(&req).await.unwrap();
    assert_eq!(result.rows()[0]["id"], json!(2));

    // Combined count and page.
    let mut req = ScanRequest::for_table("items");
    req.get_count = true;
    req.count = Some(2);
    match adapter.scan(&req).await.unwrap() {
        ScanResult::Counted { count, rows } => {
            assert_eq!(count, 3);
            assert_eq!(rows.len(), 2);
        }
        other => panic!("expected counted result, got {:?}", other),
    }

    // Distinct values of one field.
    let mut req = ScanRequest::for_table("items");
    req.params = Some(record(json!({"distinct": "name"})));
    let result = adapter.scan(&req).await.unwrap();
    let names: Vec<&Json> = result.rows().iter().map(|r| &r["name"]).collect();
    assert_eq!(names, vec![&json!("foo"), &json!("bar")]);

    // Update, then observe the new value.
    adapter
        .update(&RecordRequest::new("items", record(json!({"id": 2, "name": "baz"}))))
        .await
        .unwrap();
    let got = adapter
        .get(&RecordRequest::new("items", record(json!({"id": 2}))))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(got["name"], json!("baz"));

    // Raw query with named replacements, picking the sqlite entry.
    let mut replacements = BTreeMap::new();
    replacements.insert("min".to_string(), json!(1));
    let req = QueryRequest {
        table: "items".to_string(),
        queries: vec![
            DialectQuery {
                dialect: Dialect::Postgres,
                query: "SELECT * FROM items WHERE id > :min".to_string(),
            },
            DialectQuery {
                dialect: Dialect::Sqlite,
                query: "SELECT * FROM items WHERE id > :min".to_string(),
            },
        ],
        replacements,
        raw_response: false,
    };
    let rows = adapter.query(&req).await.unwrap();
    assert_eq!(rows.len(), 2);

    // Remove, then the row is gone.
    adapter
        .remove(&RecordRequest::new("items", record(json!({"id": 1}))))
        .await
        .unwrap();
    let result = adapter.scan(&ScanRequest::for_table("items")).await.unwrap();
    assert_eq!(result.rows().len(), 2);
}

#[tokio::test]
async fn test_sqlite_setup_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let adapter = file_backed_adapter(&dir).await;

    adapter.setup("true").await.unwrap();
    adapter.setup("true").await.unwrap();

    adapter
        .save(&RecordRequest::new(
            "items",
            record(json!({"id": 1, "name": "foo"})),
        ))
        .await
        .unwrap();
    let result = adapter.scan(&ScanRequest::for_table("items")).await.unwrap();
    assert_eq!(result.rows().len(), 1);
}
