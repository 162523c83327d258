use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};

use crate::error::{StoreError, StoreResult};
use crate::plan::{CmpOp, Predicate, Projection, QueryPlan, SortDir};
use crate::schema::{FieldType, ModelDescriptor, PRIMARY_KEY_FIELD};
use crate::value::SqlValue;

/// Reserved pseudo-param switching a scan to a distinct-values projection.
const DISTINCT_PARAM: &str = "distinct";

/// Conventional creation-time field for time-range filters.
pub const DEFAULT_TIME_KEY: &str = "createdAt";

/// A value that may be given singular or as a list in a request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    pub fn as_slice(&self) -> &[T] {
        match self {
            OneOrMany::One(v) => std::slice::from_ref(v),
            OneOrMany::Many(v) => v.as_slice(),
        }
    }
}

/// Keyword search over one or more fields. List-valued `field`/`keyword`
/// expand to all (field, keyword) pairs, combined with OR.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchSpec {
    pub field: OneOrMany<String>,
    pub keyword: OneOrMany<Json>,
    #[serde(default)]
    pub inverse: bool,
}

/// Caller-supplied scan request. Every field name referenced anywhere in
/// here must exist in the target model, or the request is rejected before
/// any query executes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScanRequest {
    pub table: String,
    pub params: Option<Map<String, Json>>,
    pub search: Option<SearchSpec>,
    /// `"ascending"` sorts ascending; anything else sorts descending.
    pub sort: Option<String>,
    pub sort_by: Option<String>,
    pub start_time: Option<Json>,
    pub end_time: Option<Json>,
    pub time_key: Option<String>,
    pub count: Option<u64>,
    pub page: Option<u64>,
    pub group_by: Option<String>,
    pub exclude: Vec<String>,
    pub aggregation_field: Option<String>,
    pub get_count: bool,
}

impl ScanRequest {
    pub fn for_table(table: impl Into<String>) -> Self {
        ScanRequest { table: table.into(), ..Default::default() }
    }
}

/// `"<op>:<value>"` filter syntax. The remainder after the token stays
/// textual; it is not coerced to a number.
fn parse_op_token(raw: &str) -> Option<(CmpOp, &str)> {
    let (token, rest) = raw.split_once(':')?;
    CmpOp::from_token(token).map(|op| (op, rest))
}

/// A keyword that is a plain integer degrades the pattern match to exact
/// equality.
fn integer_keyword(keyword: &Json) -> Option<i64> {
    match keyword {
        Json::Number(n) => n.as_i64(),
        Json::String(s) => s.parse::<i64>().ok(),
        _ => None,
    }
}

fn keyword_text(keyword: &Json) -> String {
    match keyword {
        Json::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Sort-key precedence: explicit `sortBy`, then an index-triggered range
/// key, then the primary key.
fn resolve_sort_key(index_key: Option<String>, explicit: Option<&str>) -> String {
    explicit
        .map(str::to_string)
        .or(index_key)
        .unwrap_or_else(|| PRIMARY_KEY_FIELD.to_string())
}

/// Interpret a scan request against a model, producing the validated,
/// dialect-neutral query plan. Fails without touching the backend when any
/// referenced field is unknown.
pub fn build_plan(model: &ModelDescriptor, req: &ScanRequest) -> StoreResult<QueryPlan> {
    let mut plan = QueryPlan::new();
    let mut index_sort_key: Option<String> = None;
    let mut distinct: Option<String> = None;

    if let Some(params) = &req.params {
        for (name, value) in params {
            if name == DISTINCT_PARAM {
                let target = value
                    .as_str()
                    .ok_or_else(|| StoreError::InvalidDistinct { name: value.to_string() })?;
                if !model.has_field(target) {
                    return Err(StoreError::InvalidDistinct { name: target.to_string() });
                }
                distinct = Some(target.to_string());
                continue;
            }
            if !model.has_field(name) {
                return Err(StoreError::invalid_param(name));
            }

            let predicate = match value {
                Json::Array(items) => Predicate::In {
                    field: name.clone(),
                    values: items.iter().map(SqlValue::from_json).collect(),
                },
                Json::String(s) => match parse_op_token(s) {
                    Some((op, rest)) => Predicate::Cmp {
                        field: name.clone(),
                        op,
                        value: SqlValue::Text(rest.to_string()),
                    },
                    None => Predicate::Eq {
                        field: name.clone(),
                        value: SqlValue::Text(s.clone()),
                    },
                },
                other => Predicate::Eq {
                    field: name.clone(),
                    value: SqlValue::from_json(other),
                },
            };
            plan.filter.push(predicate);

            // Filtering on a declared index rebinds the default sort key to
            // the index's range key.
            if let Some(range_key) = model.range_key_for(name) {
                index_sort_key = Some(range_key.to_string());
            }
        }
    }

    if let Some(search) = &req.search {
        for field in search.field.as_slice() {
            if !model.has_field(field) {
                return Err(StoreError::InvalidSearchField { name: field.clone() });
            }
        }
        let mut pairs = Vec::new();
        for field in search.field.as_slice() {
            for keyword in search.keyword.as_slice() {
                let pair = match integer_keyword(keyword) {
                    Some(n) => Predicate::Eq {
                        field: field.clone(),
                        value: SqlValue::Integer(n),
                    },
                    None => Predicate::Match {
                        field: field.clone(),
                        keyword: keyword_text(keyword),
                        negated: search.inverse,
                    },
                };
                pairs.push(pair);
            }
        }
        if pairs.len() == 1 {
            plan.filter.extend(pairs);
        } else if !pairs.is_empty() {
            plan.filter.push(Predicate::Any(pairs));
        }
    }

    let time_key = req.time_key.as_deref().unwrap_or(DEFAULT_TIME_KEY);
    if let Some(start) = &req.start_time {
        plan.filter.push(Predicate::Cmp {
            field: time_key.to_string(),
            op: CmpOp::Gte,
            value: SqlValue::from_json(start),
        });
    }
    if let Some(end) = &req.end_time {
        plan.filter.push(Predicate::Cmp {
            field: time_key.to_string(),
            op: CmpOp::Lte,
            value: SqlValue::from_json(end),
        });
    }

    if let Some(sort_by) = &req.sort_by {
        if !model.has_field(sort_by) {
            return Err(StoreError::InvalidSortBy { name: sort_by.clone() });
        }
    }
    if let Some(group_by) = &req.group_by {
        if !model.has_field(group_by) {
            return Err(StoreError::InvalidGroupBy { name: group_by.clone() });
        }
    }

    let direction = match req.sort.as_deref() {
        Some("ascending") => SortDir::Asc,
        _ => SortDir::Desc,
    };
    let sort_key = resolve_sort_key(index_sort_key, req.sort_by.as_deref());

    if let Some(count) = req.count {
        plan.limit = Some(count);
        let page = req.page.unwrap_or(1).max(1);
        // caller-controlled values; saturate rather than overflow
        plan.offset = Some(count.saturating_mul(page - 1));
    }

    let included: Vec<String> = model
        .field_names()
        .filter(|name| !req.exclude.iter().any(|e| e == name))
        .map(str::to_string)
        .collect();

    if let Some(aggregation_field) = &req.aggregation_field {
        // True aggregate: count rows per value, ordering dropped.
        plan.projection = Projection::CountBy(aggregation_field.clone());
        plan.order = Vec::new();
        return Ok(plan);
    }

    if let Some(field) = distinct {
        // DISTINCT projections can only order by the projected field.
        plan.projection = Projection::Distinct(field.clone());
        plan.order = vec![(field, direction)];
        return Ok(plan);
    }

    if let Some(group) = &req.group_by {
        // Latest-row-per-group, not a statistical aggregate: the rendered
        // query keeps only rows whose primary key is the group maximum.
        let bool_columns = included
            .iter()
            .filter(|name| {
                model
                    .field(name)
                    .map(|f| f.ftype == FieldType::Boolean)
                    .unwrap_or(false)
            })
            .cloned()
            .collect();
        plan.projection = Projection::LastPerGroup {
            group: group.clone(),
            columns: included,
            bool_columns,
        };
    } else if !req.exclude.is_empty() {
        plan.projection = Projection::Columns(included);
    }

    plan.order = vec![(sort_key, direction)];

    Ok(plan)
}
