//! Declarative filter compilation.
//!
//! A repository declares a per-field `FilterSpec` map; at call time the
//! runtime option values are compiled into query predicates. Compilation is
//! deliberately permissive: values are cast, never validated (a non-numeric
//! string fed to a numeric tag compiles to a `NaN` literal that matches
//! nothing), and an unrecognized operator tag compiles to nothing at all.
//! Validation is the job of the caller's validation layer.
//!
//! Fields compile in declaration order, not runtime-argument order, so the
//! emitted predicate sequence is deterministic and inspectable.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::query::{CompareOp, FilterValue, Predicate, Query};

/// How one option field maps onto query predicates.
#[derive(Clone)]
pub enum FilterSpec {
    /// Operator tag; the column is the field name itself.
    Op(&'static str),
    /// Operator tag with an explicit column.
    Column(&'static str, &'static str),
    /// Operator tag applied across several columns as one OR-group.
    Columns(&'static str, Vec<&'static str>),
    /// Custom predicate builder; bypasses column resolution entirely.
    Custom(Arc<dyn Fn(&Value, &mut Query) + Send + Sync>),
}

impl FilterSpec {
    pub fn custom(f: impl Fn(&Value, &mut Query) + Send + Sync + 'static) -> Self {
        Self::Custom(Arc::new(f))
    }
}

impl fmt::Debug for FilterSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Op(tag) => write!(f, "Op({tag})"),
            Self::Column(tag, column) => write!(f, "Column({tag}, {column})"),
            Self::Columns(tag, columns) => write!(f, "Columns({tag}, {columns:?})"),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// An insertion-ordered set of field filter specifications.
///
/// Declared once at repository construction and immutable afterwards.
#[derive(Debug, Clone, Default)]
pub struct FilterSet {
    fields: Vec<(String, FilterSpec)>,
}

impl FilterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// The fixed built-in filter set every repository starts from.
    pub fn defaults() -> Self {
        Self::new()
            .with("id", FilterSpec::Op("int"))
            .with("ids", FilterSpec::Column("inInt", "id"))
            .with("except", FilterSpec::Column("!int", "id"))
            .with("createdBy", FilterSpec::Column("int", "created_by"))
            .with("isActive", FilterSpec::Column("boolean", "is_active"))
    }

    /// Add or override a field spec. An override keeps the field's original
    /// declaration position.
    pub fn with(mut self, field: impl Into<String>, spec: FilterSpec) -> Self {
        let field = field.into();
        match self.fields.iter_mut().find(|(name, _)| *name == field) {
            Some((_, existing)) => *existing = spec,
            None => self.fields.push((field, spec)),
        }
        self
    }

    /// Merge declared specs over this set (the built-in defaults stay first).
    pub fn merge(mut self, declared: FilterSet) -> Self {
        for (field, spec) in declared.fields {
            self = self.with(field, spec);
        }
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FilterSpec)> {
        self.fields.iter().map(|(name, spec)| (name.as_str(), spec))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Compile every declared field whose runtime value is present.
pub fn compile(set: &FilterSet, values: &[(String, Value)], query: &mut Query) {
    for (field, spec) in set.iter() {
        let Some(value) = values
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, value)| value)
        else {
            continue;
        };

        match spec {
            FilterSpec::Op(tag) => apply(tag, &[field], value, query),
            FilterSpec::Column(tag, column) => apply(tag, &[column], value, query),
            FilterSpec::Columns(tag, columns) => apply(tag, columns, value, query),
            FilterSpec::Custom(f) => f(value, query),
        }
    }
}

/// Dispatch one operator tag onto the matching predicate builder.
fn apply(tag: &str, columns: &[&str], value: &Value, query: &mut Query) {
    let emitted: Option<Vec<Predicate>> = match tag {
        "int" | "integer" | "number" | "float" | "double" => {
            Some(cmp_each(columns, CompareOp::Eq, numeric_cast(value)))
        }
        "!int" => Some(cmp_each(columns, CompareOp::Ne, numeric_cast(value))),

        "inInt" | "inNumber" => Some(in_each(columns, cast_elements(value, numeric_cast))),
        "inDate" => Some(in_each(columns, cast_elements(value, date_cast))),
        "inDateTime" => Some(in_each(columns, cast_elements(value, datetime_cast))),

        "int>" => Some(cmp_each(columns, CompareOp::Gt, numeric_cast(value))),
        "int>=" => Some(cmp_each(columns, CompareOp::Gte, numeric_cast(value))),
        "int<" => Some(cmp_each(columns, CompareOp::Lt, numeric_cast(value))),
        "int<=" => Some(cmp_each(columns, CompareOp::Lte, numeric_cast(value))),

        "date>" => Some(cmp_each(columns, CompareOp::Gt, date_cast(value))),
        "date>=" => Some(cmp_each(columns, CompareOp::Gte, date_cast(value))),
        "date<" => Some(cmp_each(columns, CompareOp::Lt, date_cast(value))),
        "date<=" => Some(cmp_each(columns, CompareOp::Lte, date_cast(value))),

        "dateTime>" => Some(cmp_each(columns, CompareOp::Gt, datetime_cast(value))),
        "dateTime>=" => Some(cmp_each(columns, CompareOp::Gte, datetime_cast(value))),
        "dateTime<" => Some(cmp_each(columns, CompareOp::Lt, datetime_cast(value))),
        "dateTime<=" => Some(cmp_each(columns, CompareOp::Lte, datetime_cast(value))),

        "dateBetween" => between_each(columns, value, date_cast),
        "dateTimeBetween" => between_each(columns, value, datetime_cast),

        "null" => Some(
            columns
                .iter()
                .map(|c| Predicate::IsNull {
                    column: c.to_string(),
                })
                .collect(),
        ),
        "notNull" | "!null" => Some(
            columns
                .iter()
                .map(|c| Predicate::NotNull {
                    column: c.to_string(),
                })
                .collect(),
        ),

        "bool" | "boolean" => Some(cmp_each(
            columns,
            CompareOp::Eq,
            FilterValue::Bool(boolean_cast(value)),
        )),

        raw => match CompareOp::from_token(raw) {
            Some(op) => Some(cmp_each(columns, op, raw_cast(value))),
            None => {
                // Preserved permissive behavior: unknown tags compile to
                // nothing rather than erroring. Logged so silently-wrong
                // filters stay discoverable.
                debug!(tag, "Unknown filter operator tag; compiled as no-op");
                None
            }
        },
    };

    match emitted {
        // Single-column forms emit one direct predicate; only the
        // multi-column form wraps in an OR-group.
        Some(mut predicates) if predicates.len() == 1 => {
            query.push_predicate(predicates.remove(0));
        }
        Some(predicates) if !predicates.is_empty() => query.where_or(predicates),
        _ => {}
    }
}

fn cmp_each(columns: &[&str], op: CompareOp, value: FilterValue) -> Vec<Predicate> {
    columns
        .iter()
        .map(|column| Predicate::Cmp {
            column: column.to_string(),
            op,
            value: value.clone(),
        })
        .collect()
}

fn in_each(columns: &[&str], values: Vec<FilterValue>) -> Vec<Predicate> {
    columns
        .iter()
        .map(|column| Predicate::In {
            column: column.to_string(),
            values: values.clone(),
        })
        .collect()
}

fn between_each(
    columns: &[&str],
    value: &Value,
    cast: fn(&Value) -> FilterValue,
) -> Option<Vec<Predicate>> {
    // A range needs exactly two endpoints; anything else compiles to nothing.
    let elements = value.as_array()?;
    if elements.len() != 2 {
        debug!(
            elements = elements.len(),
            "Range filter requires exactly two endpoints; compiled as no-op"
        );
        return None;
    }
    let low = cast(&elements[0]);
    let high = cast(&elements[1]);
    Some(
        columns
            .iter()
            .map(|column| Predicate::Between {
                column: column.to_string(),
                low: low.clone(),
                high: high.clone(),
            })
            .collect(),
    )
}

fn cast_elements(value: &Value, cast: fn(&Value) -> FilterValue) -> Vec<FilterValue> {
    match value {
        Value::Array(elements) => elements.iter().map(cast).collect(),
        scalar => vec![cast(scalar)],
    }
}

/// Numeric cast. Non-numeric input becomes `NaN` and is compiled as a literal
/// predicate that matches nothing; no validation is performed here.
fn numeric_cast(value: &Value) -> FilterValue {
    let number = match value {
        Value::Number(n) => n.as_f64().unwrap_or(f64::NAN),
        Value::String(s) => s.trim().parse::<f64>().unwrap_or(f64::NAN),
        Value::Bool(true) => 1.0,
        Value::Bool(false) => 0.0,
        _ => f64::NAN,
    };
    FilterValue::Number(number)
}

/// Date cast: normalize to the `YYYY-MM-DD` prefix of the textual value.
fn date_cast(value: &Value) -> FilterValue {
    let text = text_of(value);
    let day = text
        .split(['T', ' '])
        .next()
        .unwrap_or(text.as_str())
        .to_string();
    FilterValue::Text(day)
}

/// Datetime cast: textual pass-through (ISO-8601 ordering is lexicographic).
fn datetime_cast(value: &Value) -> FilterValue {
    FilterValue::Text(text_of(value))
}

/// Boolean cast: the literal string `"0"` is false; everything else
/// truthy-casts.
fn boolean_cast(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Null => false,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !(s.is_empty() || s == "0"),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Cast for raw where-operator passthrough: the value goes through untouched.
fn raw_cast(value: &Value) -> FilterValue {
    match value {
        Value::Number(n) => FilterValue::Number(n.as_f64().unwrap_or(f64::NAN)),
        Value::Bool(b) => FilterValue::Bool(*b),
        Value::String(s) => FilterValue::Text(s.clone()),
        Value::Null => FilterValue::Null,
        composite => FilterValue::Text(composite.to_string()),
    }
}

fn text_of(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
