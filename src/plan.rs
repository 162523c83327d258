use serde::{Deserialize, Serialize};

use crate::value::SqlValue;

/// Relational comparison operators reachable through the `"<op>:<value>"`
/// filter syntax and the time-range clauses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CmpOp {
    Gt,
    Gte,
    Lt,
    Lte,
    Ne,
}

impl CmpOp {
    /// Token accepted in a `"<op>:<value>"` filter parameter.
    pub fn from_token(token: &str) -> Option<CmpOp> {
        match token {
            "gt" => Some(CmpOp::Gt),
            "gte" => Some(CmpOp::Gte),
            "lt" => Some(CmpOp::Lt),
            "lte" => Some(CmpOp::Lte),
            "ne" => Some(CmpOp::Ne),
            _ => None,
        }
    }

    pub fn sql(&self) -> &'static str {
        match self {
            CmpOp::Gt => ">",
            CmpOp::Gte => ">=",
            CmpOp::Lt => "<",
            CmpOp::Lte => "<=",
            CmpOp::Ne => "<>",
        }
    }
}

/// One node of the dialect-neutral predicate tree. Top-level predicates in
/// a plan are combined with AND.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Predicate {
    Eq {
        field: String,
        value: SqlValue,
    },
    In {
        field: String,
        values: Vec<SqlValue>,
    },
    Cmp {
        field: String,
        op: CmpOp,
        value: SqlValue,
    },
    /// Pattern match; the concrete operator (LIKE vs ILIKE) is a dialect
    /// decision taken at render time.
    Match {
        field: String,
        keyword: String,
        negated: bool,
    },
    /// OR-group of alternatives.
    Any(Vec<Predicate>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortDir {
    Asc,
    Desc,
}

impl SortDir {
    pub fn sql(&self) -> &'static str {
        match self {
            SortDir::Asc => "ASC",
            SortDir::Desc => "DESC",
        }
    }
}

/// What the query projects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Projection {
    /// Every column of the table.
    All,
    /// A plain column subset (the `exclude` path).
    Columns(Vec<String>),
    /// Distinct values of one field.
    Distinct(String),
    /// Latest row per group: rows whose primary key is the group maximum.
    /// Boolean columns are projected as integer casts for cross-dialect
    /// comparability.
    LastPerGroup {
        group: String,
        columns: Vec<String>,
        bool_columns: Vec<String>,
    },
    /// Count-by-group aggregate: the field plus a `count` alias.
    CountBy(String),
}

/// Validated, dialect-neutral intermediate built by the query builder.
/// Lives only for the duration of one scan call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryPlan {
    /// Conjunction of predicates.
    pub filter: Vec<Predicate>,
    pub order: Vec<(String, SortDir)>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    pub projection: Projection,
}

impl QueryPlan {
    pub fn new() -> Self {
        QueryPlan {
            filter: Vec::new(),
            order: Vec::new(),
            limit: None,
            offset: None,
            projection: Projection::All,
        }
    }

    /// Equality-only plan, used by the find-one CRUD path.
    pub fn equality(filter: Vec<Predicate>) -> Self {
        QueryPlan { filter, ..QueryPlan::new() }
    }
}

impl Default for QueryPlan {
    fn default() -> Self {
        QueryPlan::new()
    }
}
