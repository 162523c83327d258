//! Schema-driven storage adapter for relational engines.
//!
//! A set of model descriptors is turned into physical table definitions
//! once, at construction; after that the adapter exposes a small record
//! API (`get`/`save`/`update`/`remove`), a rich `scan` listing operation,
//! and a dialect-keyed raw query escape hatch. Postgres, SQLite, and
//! MySQL are reached through one sqlx `AnyPool`; dialect differences are
//! concentrated in [`dialect::Dialect`] and the SQL renderer.

pub mod adapter;
pub mod client;
pub mod dialect;
pub mod error;
pub mod plan;
pub mod scan;
pub mod schema;
pub mod sql;
pub mod transcode;
pub mod value;

pub use adapter::{
    DialectQuery, QueryRequest, RecordRequest, RelationalAdapter, ScanResult, StoreConfig,
};
pub use client::{RelationalClient, SqlxClient};
pub use dialect::Dialect;
pub use error::{StoreError, StoreResult};
pub use scan::ScanRequest;
pub use schema::{FieldRules, FieldSpec, FieldType, ModelDescriptor, TableDef};
pub use transcode::Record;
pub use value::{EncodedRow, SqlValue};
