//! Conjunctive query predicates.
//!
//! A query is a list of `(column, operator, value)` triples joined with AND.
//! There is no OR and no nesting.

use crate::error::MetadataResult;
use crate::record::{FieldValue, TableDescriptor};
use std::fmt;

/// Comparison operator of a predicate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operator {
    Equal,
    Greater,
    Less,
    GreaterOrEqual,
    LessOrEqual,
    NotEqual,
    IsNull,
}

impl Operator {
    pub fn symbol(self) -> &'static str {
        match self {
            Operator::Equal => "=",
            Operator::Greater => ">",
            Operator::Less => "<",
            Operator::GreaterOrEqual => ">=",
            Operator::LessOrEqual => "<=",
            Operator::NotEqual => "<>",
            Operator::IsNull => "is null",
        }
    }
}

/// One predicate of a conjunction.
#[derive(Clone, Debug, PartialEq)]
pub struct WhereClause {
    column: String,
    operator: Operator,
    value: Option<FieldValue>,
}

impl WhereClause {
    /// Build a predicate. A `None` (or [`FieldValue::Null`]) value always
    /// tests for null, whatever operator was asked for.
    pub fn new(
        column: impl Into<String>,
        operator: Operator,
        value: Option<impl Into<FieldValue>>,
    ) -> Self {
        let value = value.map(Into::into).filter(|v| *v != FieldValue::Null);
        let operator = if value.is_none() {
            Operator::IsNull
        } else {
            operator
        };
        Self {
            column: column.into(),
            operator,
            value,
        }
    }

    pub fn eq(column: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Self::new(column, Operator::Equal, Some(value))
    }

    pub fn is_null(column: impl Into<String>) -> Self {
        Self::new(column, Operator::IsNull, None::<FieldValue>)
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    pub fn operator(&self) -> Operator {
        self.operator
    }

    pub fn value(&self) -> Option<&FieldValue> {
        self.value.as_ref()
    }

    /// Predicates with a blank column name contribute nothing.
    pub fn is_empty(&self) -> bool {
        self.column.trim().is_empty()
    }

    /// Literal SQL form, e.g. `a = 'b'` or `xyz is null`.
    pub fn render(&self) -> String {
        match &self.value {
            None => format!("{} {}", self.column, Operator::IsNull.symbol()),
            Some(value) => format!(
                "{} {} {}",
                self.column,
                self.operator.symbol(),
                value.literal()
            ),
        }
    }

    /// Reject columns the table does not declare.
    pub fn validate(&self, table: &TableDescriptor) -> MetadataResult<()> {
        table.require_field(self.column.trim()).map(|_| ())
    }
}

impl fmt::Display for WhereClause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

/// Literal WHERE clause for a conjunction, or `""` when nothing applies.
pub fn render_where(predicates: &[WhereClause]) -> String {
    let parts: Vec<String> = predicates
        .iter()
        .filter(|p| !p.is_empty())
        .map(WhereClause::render)
        .collect();
    if parts.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", parts.join(" AND "))
    }
}
