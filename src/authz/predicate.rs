use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

/// A named edge from one record to another, e.g. `download.view`.
///
/// `name` is the key of the related record in a resource's JSON closure;
/// `table`/`local_key`/`foreign_key` describe the same edge for the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Relation {
    pub name: &'static str,
    pub table: &'static str,
    pub local_key: &'static str,
    pub foreign_key: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Scalar {
    Text(String),
    Int(i64),
    Bool(bool),
}

impl Scalar {
    fn matches(&self, value: &Value) -> bool {
        match self {
            Scalar::Text(expected) => value.as_str() == Some(expected.as_str()),
            Scalar::Int(expected) => value.as_i64() == Some(*expected),
            Scalar::Bool(expected) => value.as_bool() == Some(*expected),
        }
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Scalar::Text(value.to_string())
    }
}

impl From<String> for Scalar {
    fn from(value: String) -> Self {
        Scalar::Text(value)
    }
}

impl From<Uuid> for Scalar {
    fn from(value: Uuid) -> Self {
        Scalar::Text(value.to_string())
    }
}

impl From<i64> for Scalar {
    fn from(value: i64) -> Self {
        Scalar::Int(value)
    }
}

impl From<bool> for Scalar {
    fn from(value: bool) -> Self {
        Scalar::Bool(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Comparison {
    Eq,
    Ne,
}

/// Boolean filter over a resource and the records reachable from it.
///
/// Predicates are plain data: they are evaluated in memory against a JSON
/// closure of the resource, or translated to SQL by `db::sql`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Predicate {
    Always,
    Never,
    All(Vec<Predicate>),
    Any(Vec<Predicate>),
    Not(Box<Predicate>),
    Compare {
        field: &'static str,
        op: Comparison,
        value: Scalar,
    },
    In {
        field: &'static str,
        values: Vec<Scalar>,
    },
    Related {
        relation: Relation,
        predicate: Box<Predicate>,
    },
}

pub fn eq(field: &'static str, value: impl Into<Scalar>) -> Predicate {
    Predicate::Compare {
        field,
        op: Comparison::Eq,
        value: value.into(),
    }
}

pub fn ne(field: &'static str, value: impl Into<Scalar>) -> Predicate {
    Predicate::Compare {
        field,
        op: Comparison::Ne,
        value: value.into(),
    }
}

pub fn is_in<S: Into<Scalar>>(field: &'static str, values: impl IntoIterator<Item = S>) -> Predicate {
    Predicate::In {
        field,
        values: values.into_iter().map(Into::into).collect(),
    }
}

pub fn all(predicates: impl IntoIterator<Item = Predicate>) -> Predicate {
    let mut parts: Vec<Predicate> = predicates
        .into_iter()
        .filter(|p| *p != Predicate::Always)
        .collect();

    if parts.iter().any(|p| *p == Predicate::Never) {
        return Predicate::Never;
    }

    match parts.len() {
        0 => Predicate::Always,
        1 => parts.remove(0),
        _ => Predicate::All(parts),
    }
}

pub fn any(predicates: impl IntoIterator<Item = Predicate>) -> Predicate {
    let mut parts: Vec<Predicate> = predicates
        .into_iter()
        .filter(|p| *p != Predicate::Never)
        .collect();

    if parts.iter().any(|p| *p == Predicate::Always) {
        return Predicate::Always;
    }

    match parts.len() {
        0 => Predicate::Never,
        1 => parts.remove(0),
        _ => Predicate::Any(parts),
    }
}

pub fn not(predicate: Predicate) -> Predicate {
    match predicate {
        Predicate::Always => Predicate::Never,
        Predicate::Never => Predicate::Always,
        Predicate::Not(inner) => *inner,
        other => Predicate::Not(Box::new(other)),
    }
}

pub fn related(relation: Relation, predicate: Predicate) -> Predicate {
    Predicate::Related {
        relation,
        predicate: Box::new(predicate),
    }
}

impl Predicate {
    /// Evaluate against a resource's relational closure.
    ///
    /// Missing fields and missing relations never match; a to-many relation
    /// (JSON array) matches when any element does.
    pub fn evaluate(&self, resource: &Value) -> bool {
        match self {
            Predicate::Always => true,
            Predicate::Never => false,
            Predicate::All(parts) => parts.iter().all(|p| p.evaluate(resource)),
            Predicate::Any(parts) => parts.iter().any(|p| p.evaluate(resource)),
            Predicate::Not(inner) => !inner.evaluate(resource),
            Predicate::Compare { field, op, value } => match resource.get(*field) {
                None | Some(Value::Null) => false,
                Some(actual) => match op {
                    Comparison::Eq => value.matches(actual),
                    Comparison::Ne => !value.matches(actual),
                },
            },
            Predicate::In { field, values } => match resource.get(*field) {
                None | Some(Value::Null) => false,
                Some(actual) => values.iter().any(|v| v.matches(actual)),
            },
            Predicate::Related { relation, predicate } => match resource.get(relation.name) {
                Some(Value::Array(items)) => items.iter().any(|item| predicate.evaluate(item)),
                Some(obj @ Value::Object(_)) => predicate.evaluate(obj),
                _ => false,
            },
        }
    }

}
