//! Predicate-recording query builder.
//!
//! The filter compiler emits predicates into a `Query`, which the external
//! document source interprets against its own store. For in-memory sources
//! (and tests) the query can also evaluate itself directly against JSON
//! documents via [`Query::matches`] and [`Query::sort_and_page`].

use serde_json::Value;

/// A scalar predicate operand.
///
/// Numbers are `f64` so that failed numeric casts compile to `NaN` literals
/// (which match nothing) instead of being rejected; validation belongs to the
/// caller's validation layer, not here.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Number(f64),
    Bool(bool),
    Text(String),
    Null,
}

impl FilterValue {
    fn matches_eq(&self, field: &Value) -> bool {
        match self {
            Self::Number(n) => field.as_f64().is_some_and(|f| f == *n),
            Self::Bool(b) => field.as_bool().is_some_and(|f| f == *b),
            Self::Text(t) => field.as_str().is_some_and(|f| f == t),
            Self::Null => field.is_null(),
        }
    }

    fn partial_cmp_field(&self, field: &Value) -> Option<std::cmp::Ordering> {
        match self {
            Self::Number(n) => field.as_f64().and_then(|f| f.partial_cmp(n)),
            Self::Text(t) => field.as_str().map(|f| f.cmp(t.as_str())),
            Self::Bool(_) | Self::Null => None,
        }
    }
}

/// Comparison operators understood natively by the query layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    Like,
}

impl CompareOp {
    /// Map a raw operator token to its native form, when one exists.
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "=" => Some(Self::Eq),
            "!=" => Some(Self::Ne),
            ">" => Some(Self::Gt),
            ">=" => Some(Self::Gte),
            "<" => Some(Self::Lt),
            "<=" => Some(Self::Lte),
            "like" => Some(Self::Like),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

/// A compiled query predicate.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Cmp {
        column: String,
        op: CompareOp,
        value: FilterValue,
    },
    /// One OR-group: the predicate holds when any member matches.
    Or(Vec<Predicate>),
    In {
        column: String,
        values: Vec<FilterValue>,
    },
    Between {
        column: String,
        low: FilterValue,
        high: FilterValue,
    },
    IsNull {
        column: String,
    },
    NotNull {
        column: String,
    },
}

/// A recorded query: predicates plus ordering and pagination modifiers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    predicates: Vec<Predicate>,
    order: Vec<(String, SortDirection)>,
    limit: Option<usize>,
    page: Option<(usize, usize)>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn where_cmp(&mut self, column: impl Into<String>, op: CompareOp, value: FilterValue) {
        self.predicates.push(Predicate::Cmp {
            column: column.into(),
            op,
            value,
        });
    }

    pub fn where_any(&mut self, columns: Vec<String>, op: CompareOp, value: FilterValue) {
        self.predicates.push(Predicate::Or(
            columns
                .into_iter()
                .map(|column| Predicate::Cmp {
                    column,
                    op,
                    value: value.clone(),
                })
                .collect(),
        ));
    }

    pub fn where_or(&mut self, members: Vec<Predicate>) {
        self.predicates.push(Predicate::Or(members));
    }

    pub(crate) fn push_predicate(&mut self, predicate: Predicate) {
        self.predicates.push(predicate);
    }

    pub fn where_in(&mut self, column: impl Into<String>, values: Vec<FilterValue>) {
        self.predicates.push(Predicate::In {
            column: column.into(),
            values,
        });
    }

    pub fn where_between(&mut self, column: impl Into<String>, low: FilterValue, high: FilterValue) {
        self.predicates.push(Predicate::Between {
            column: column.into(),
            low,
            high,
        });
    }

    pub fn where_null(&mut self, column: impl Into<String>) {
        self.predicates.push(Predicate::IsNull {
            column: column.into(),
        });
    }

    pub fn where_not_null(&mut self, column: impl Into<String>) {
        self.predicates.push(Predicate::NotNull {
            column: column.into(),
        });
    }

    pub fn order_by(&mut self, column: impl Into<String>, direction: SortDirection) {
        self.order.push((column.into(), direction));
    }

    pub fn limit(&mut self, limit: usize) {
        self.limit = Some(limit);
    }

    pub fn paginate(&mut self, page: usize, per_page: usize) {
        self.page = Some((page.max(1), per_page));
    }

    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    pub fn order(&self) -> &[(String, SortDirection)] {
        &self.order
    }

    pub fn limit_value(&self) -> Option<usize> {
        self.limit
    }

    pub fn pagination(&self) -> Option<(usize, usize)> {
        self.page
    }

    /// Evaluate every predicate against a JSON document (top-level fields).
    pub fn matches(&self, doc: &Value) -> bool {
        self.predicates.iter().all(|p| predicate_matches(p, doc))
    }

    /// Apply ordering, limit, and pagination to a matched document set.
    pub fn sort_and_page(&self, mut docs: Vec<Value>) -> Vec<Value> {
        for (column, direction) in self.order.iter().rev() {
            docs.sort_by(|a, b| {
                let ordering = compare_values(a.get(column.as_str()), b.get(column.as_str()));
                match direction {
                    SortDirection::Asc => ordering,
                    SortDirection::Desc => ordering.reverse(),
                }
            });
        }

        if let Some((page, per_page)) = self.page {
            let start = (page - 1).saturating_mul(per_page);
            docs = docs.into_iter().skip(start).take(per_page).collect();
        } else if let Some(limit) = self.limit {
            docs.truncate(limit);
        }
        docs
    }
}

fn predicate_matches(predicate: &Predicate, doc: &Value) -> bool {
    match predicate {
        Predicate::Cmp { column, op, value } => {
            field(doc, column).is_some_and(|f| compare(f, *op, value))
        }
        Predicate::Or(members) => members.iter().any(|p| predicate_matches(p, doc)),
        Predicate::In { column, values } => {
            field(doc, column).is_some_and(|f| values.iter().any(|v| v.matches_eq(f)))
        }
        Predicate::Between { column, low, high } => field(doc, column).is_some_and(|f| {
            low.partial_cmp_field(f).is_some_and(|o| o.is_ge())
                && high.partial_cmp_field(f).is_some_and(|o| o.is_le())
        }),
        Predicate::IsNull { column } => field(doc, column).is_none_or(Value::is_null),
        Predicate::NotNull { column } => field(doc, column).is_some_and(|f| !f.is_null()),
    }
}

fn field<'a>(doc: &'a Value, column: &str) -> Option<&'a Value> {
    doc.get(column)
}

fn compare(field: &Value, op: CompareOp, value: &FilterValue) -> bool {
    match op {
        CompareOp::Eq => value.matches_eq(field),
        CompareOp::Ne => !value.matches_eq(field),
        CompareOp::Gt => value.partial_cmp_field(field).is_some_and(|o| o.is_gt()),
        CompareOp::Gte => value.partial_cmp_field(field).is_some_and(|o| o.is_ge()),
        CompareOp::Lt => value.partial_cmp_field(field).is_some_and(|o| o.is_lt()),
        CompareOp::Lte => value.partial_cmp_field(field).is_some_and(|o| o.is_le()),
        CompareOp::Like => match value {
            FilterValue::Text(pattern) => field.as_str().is_some_and(|f| like_match(f, pattern)),
            _ => false,
        },
    }
}

/// SQL-style LIKE with `%` as a multi-character wildcard.
fn like_match(text: &str, pattern: &str) -> bool {
    let parts: Vec<&str> = pattern.split('%').collect();
    if parts.len() == 1 {
        return text == pattern;
    }

    let mut rest = text;
    for (i, part) in parts.iter().enumerate() {
        if part.is_empty() {
            continue;
        }
        if i == 0 {
            match rest.strip_prefix(part) {
                Some(stripped) => rest = stripped,
                None => return false,
            }
        } else if i == parts.len() - 1 {
            return rest.ends_with(part);
        } else {
            match rest.find(part) {
                Some(at) => rest = &rest[at + part.len()..],
                None => return false,
            }
        }
    }
    true
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> std::cmp::Ordering {
    use std::cmp::Ordering;
    match (a, b) {
        (Some(a), Some(b)) => {
            if let (Some(x), Some(y)) = (a.as_f64(), b.as_f64()) {
                x.partial_cmp(&y).unwrap_or(Ordering::Equal)
            } else if let (Some(x), Some(y)) = (a.as_str(), b.as_str()) {
                x.cmp(y)
            } else {
                Ordering::Equal
            }
        }
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (None, None) => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn eq_predicate_matches_numbers() {
        let mut query = Query::new();
        query.where_cmp("id", CompareOp::Eq, FilterValue::Number(7.0));

        assert!(query.matches(&json!({"id": 7})));
        assert!(!query.matches(&json!({"id": 8})));
        assert!(!query.matches(&json!({"id": "7"})));
    }

    #[test]
    fn nan_literal_matches_nothing() {
        let mut query = Query::new();
        query.where_cmp("id", CompareOp::Eq, FilterValue::Number(f64::NAN));

        assert!(!query.matches(&json!({"id": 1})));
        assert!(!query.matches(&json!({"id": f64::NAN})));
    }

    #[test]
    fn any_of_is_an_or_group() {
        let mut query = Query::new();
        query.where_any(
            vec!["title".to_string(), "body".to_string()],
            CompareOp::Eq,
            FilterValue::Text("hit".to_string()),
        );

        assert!(query.matches(&json!({"title": "hit", "body": "x"})));
        assert!(query.matches(&json!({"title": "x", "body": "hit"})));
        assert!(!query.matches(&json!({"title": "x", "body": "y"})));
    }

    #[test]
    fn in_predicate_matches_any_element() {
        let mut query = Query::new();
        query.where_in(
            "id",
            vec![FilterValue::Number(1.0), FilterValue::Number(2.0)],
        );

        assert!(query.matches(&json!({"id": 2})));
        assert!(!query.matches(&json!({"id": 3})));
    }

    #[test]
    fn between_is_inclusive() {
        let mut query = Query::new();
        query.where_between(
            "day",
            FilterValue::Text("2024-01-01".to_string()),
            FilterValue::Text("2024-01-31".to_string()),
        );

        assert!(query.matches(&json!({"day": "2024-01-01"})));
        assert!(query.matches(&json!({"day": "2024-01-15"})));
        assert!(query.matches(&json!({"day": "2024-01-31"})));
        assert!(!query.matches(&json!({"day": "2024-02-01"})));
    }

    #[test]
    fn null_predicates() {
        let mut is_null = Query::new();
        is_null.where_null("deleted_at");
        assert!(is_null.matches(&json!({"deleted_at": null})));
        assert!(is_null.matches(&json!({})));
        assert!(!is_null.matches(&json!({"deleted_at": "2024-01-01"})));

        let mut not_null = Query::new();
        not_null.where_not_null("deleted_at");
        assert!(not_null.matches(&json!({"deleted_at": "2024-01-01"})));
        assert!(!not_null.matches(&json!({"deleted_at": null})));
        assert!(!not_null.matches(&json!({})));
    }

    #[test]
    fn like_wildcards() {
        let mut query = Query::new();
        query.where_cmp(
            "title",
            CompareOp::Like,
            FilterValue::Text("%rust%".to_string()),
        );

        assert!(query.matches(&json!({"title": "learning rust today"})));
        assert!(!query.matches(&json!({"title": "learning go today"})));
    }

    #[test]
    fn sort_and_page_orders_then_slices() {
        let mut query = Query::new();
        query.order_by("id", SortDirection::Desc);
        query.paginate(2, 2);

        let docs = vec![
            json!({"id": 1}),
            json!({"id": 2}),
            json!({"id": 3}),
            json!({"id": 4}),
            json!({"id": 5}),
        ];
        let paged = query.sort_and_page(docs);
        assert_eq!(paged, vec![json!({"id": 3}), json!({"id": 2})]);
    }

    #[test]
    fn limit_without_pagination_truncates() {
        let mut query = Query::new();
        query.order_by("id", SortDirection::Asc);
        query.limit(2);

        let docs = vec![json!({"id": 3}), json!({"id": 1}), json!({"id": 2})];
        let limited = query.sort_and_page(docs);
        assert_eq!(limited, vec![json!({"id": 1}), json!({"id": 2})]);
    }
}
