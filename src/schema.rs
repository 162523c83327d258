use serde::{Deserialize, Serialize};

use crate::dialect::Dialect;

/// The literal field name that becomes the auto-increment primary key.
pub const PRIMARY_KEY_FIELD: &str = "id";

/// Closed set of semantic field types a model may declare.
///
/// Both the type mapper and the transcoder match on this exhaustively, so
/// adding a type is a compile-checked change in both places at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    #[serde(rename = "string")]
    Str,
    Number,
    Date,
    Boolean,
    Binary,
    Array,
    Object,
    Alternatives,
    /// Explicitly untyped; the column type defers to the engine default.
    Any,
}

/// Normalized validation surface, handed over pre-digested by the schema
/// registry. Only used to size string columns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldRules {
    pub length: Option<u32>,
    pub max: Option<u32>,
    /// Rules of each alternative, in declaration order, for union fields.
    pub alternatives: Vec<FieldRules>,
}

impl FieldRules {
    pub fn with_max(max: u32) -> Self {
        FieldRules { max: Some(max), ..Default::default() }
    }

    fn bound(&self) -> Option<u32> {
        self.length.or(self.max)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub ftype: FieldType,
    #[serde(default)]
    pub rules: FieldRules,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, ftype: FieldType) -> Self {
        FieldSpec { name: name.into(), ftype, rules: FieldRules::default() }
    }

    pub fn with_rules(mut self, rules: FieldRules) -> Self {
        self.rules = rules;
        self
    }
}

/// Declarative storage shape of one logical entity, supplied wholesale by
/// the schema registry at construction time and immutable thereafter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    #[serde(rename = "tableName")]
    pub table_name: String,
    pub fields: Vec<FieldSpec>,
    /// Field names forming the model's uniqueness constraint.
    #[serde(default)]
    pub keys: Vec<String>,
    /// Fields eligible as secondary sort/filter keys.
    #[serde(default)]
    pub indexes: Vec<String>,
    /// Parallel to `indexes`: the sort key to use when the corresponding
    /// index field appears as a filter.
    #[serde(default, rename = "rangeKeys")]
    pub range_keys: Vec<String>,
}

impl ModelDescriptor {
    pub fn new(table_name: impl Into<String>, fields: Vec<FieldSpec>) -> Self {
        ModelDescriptor {
            table_name: table_name.into(),
            fields,
            keys: Vec::new(),
            indexes: Vec::new(),
            range_keys: Vec::new(),
        }
    }

    pub fn with_keys(mut self, keys: Vec<String>) -> Self {
        self.keys = keys;
        self
    }

    pub fn with_indexes(mut self, indexes: Vec<String>, range_keys: Vec<String>) -> Self {
        self.indexes = indexes;
        self.range_keys = range_keys;
        self
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    /// The range key bound to `field`, when `field` is a declared index.
    pub fn range_key_for(&self, field: &str) -> Option<&str> {
        self.indexes
            .iter()
            .position(|i| i == field)
            .and_then(|pos| self.range_keys.get(pos))
            .map(|s| s.as_str())
    }
}

/// Concrete column types the mapper can produce. Rendering to engine
/// syntax happens in the SQL layer, per dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnType {
    VarChar(u32),
    Text,
    MediumText,
    Timestamp,
    Double,
    Boolean,
    Blob,
}

/// Map a declared semantic type plus its validation rules to a column
/// type. Pure; identical inputs always yield the identical output.
///
/// `None` means "explicitly untyped" — the engine default applies.
pub fn map_type(dialect: Dialect, ftype: FieldType, rules: &FieldRules) -> Option<ColumnType> {
    let _ = dialect; // all supported engines share these mappings today
    match ftype {
        FieldType::Str => Some(match rules.bound() {
            Some(n) => ColumnType::VarChar(n),
            None => ColumnType::Text,
        }),
        // Structured values are JSON-serialized by the transcoder, so the
        // column is plain text on every dialect. Keeping this symmetric
        // with the transcoder matters more than native JSON columns.
        FieldType::Array | FieldType::Object => Some(ColumnType::Text),
        FieldType::Date => Some(ColumnType::Timestamp),
        FieldType::Number => Some(ColumnType::Double),
        FieldType::Boolean => Some(ColumnType::Boolean),
        FieldType::Binary => Some(ColumnType::Blob),
        // Unions are stored as strings sized from the first alternative.
        FieldType::Alternatives => Some(match rules.alternatives.first().and_then(|r| r.bound()) {
            Some(n) => ColumnType::VarChar(n),
            None => ColumnType::MediumText,
        }),
        FieldType::Any => None,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    /// `None` is a deliberately untyped column.
    pub ctype: Option<ColumnType>,
    pub primary_key: bool,
    pub auto_increment: bool,
}

/// Physical table derived 1:1 from a model descriptor plus the configured
/// name prefix. Owned by the adapter; built once at construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableDef {
    pub name: String,
    pub columns: Vec<ColumnDef>,
    /// One named multi-column constraint covering all `keys` fields.
    pub unique_constraint: Option<UniqueConstraint>,
    pub indexes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UniqueConstraint {
    pub name: String,
    pub columns: Vec<String>,
}

impl TableDef {
    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }
}

/// Derive the physical table for one model. Invoked once per model at
/// adapter construction; the result is never recreated.
pub fn build_table(dialect: Dialect, model: &ModelDescriptor, prefix: &str) -> TableDef {
    let name = format!("{}{}", prefix, model.table_name);

    let columns = model
        .fields
        .iter()
        .map(|field| {
            if field.name == PRIMARY_KEY_FIELD {
                // Structural override: the primary-key field is always an
                // auto-increment integer key, whatever its declared type.
                ColumnDef {
                    name: field.name.clone(),
                    ctype: None,
                    primary_key: true,
                    auto_increment: true,
                }
            } else {
                ColumnDef {
                    name: field.name.clone(),
                    ctype: map_type(dialect, field.ftype, &field.rules),
                    primary_key: false,
                    auto_increment: false,
                }
            }
        })
        .collect();

    // All `keys` columns share one named constraint, so the engine builds a
    // single composite unique constraint rather than several per-column ones.
    let unique_constraint = if model.keys.is_empty() {
        None
    } else {
        Some(UniqueConstraint {
            name: format!("{}_keys_unique", name),
            columns: model.keys.clone(),
        })
    };

    TableDef {
        name,
        columns,
        unique_constraint,
        indexes: model.indexes.clone(),
    }
}
