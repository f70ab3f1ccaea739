//! SQL statement construction shared by the SQLite and PostgreSQL stores.
//!
//! Statements carry their values as bind parameters; the literal rendering in
//! [`crate::predicate`] exists for logs only.

use crate::error::{MetadataError, MetadataResult};
use crate::predicate::WhereClause;
use crate::record::{FieldDescriptor, FieldType, FieldValue, TableDescriptor};

/// SQL dialect of a backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Dialect {
    Sqlite,
    Postgres,
}

impl Dialect {
    /// Column type for a field, or `UnsupportedType` naming the Rust type.
    pub fn column_type(
        self,
        table: &TableDescriptor,
        field: &FieldDescriptor,
    ) -> MetadataResult<&'static str> {
        let ty = match (self, field.ty) {
            (Dialect::Sqlite, FieldType::Integer | FieldType::Enum) => "INTEGER",
            (Dialect::Sqlite, FieldType::Text) => "TEXT",
            (Dialect::Sqlite, FieldType::Boolean) => "BOOLEAN",
            (Dialect::Sqlite, FieldType::Float) => "REAL",
            (Dialect::Sqlite, FieldType::Timestamp) => "DATETIME",
            (Dialect::Sqlite, FieldType::Uuid) => "BLOB",
            (Dialect::Postgres, FieldType::Integer | FieldType::Enum) => "BIGINT",
            (Dialect::Postgres, FieldType::Text) => "TEXT",
            (Dialect::Postgres, FieldType::Boolean) => "BOOLEAN",
            (Dialect::Postgres, FieldType::Float) => "DOUBLE PRECISION",
            (Dialect::Postgres, FieldType::Timestamp) => "TIMESTAMPTZ",
            (Dialect::Postgres, FieldType::Uuid) => "UUID",
            (_, FieldType::Unmapped(rust_type)) => {
                return Err(MetadataError::UnsupportedType {
                    table: table.name,
                    field: field.name,
                    rust_type,
                });
            }
        };
        Ok(ty)
    }

    /// Bind placeholder for the `n`th (1-based) parameter.
    pub fn placeholder(self, n: usize) -> String {
        match self {
            Dialect::Sqlite => "?".to_string(),
            Dialect::Postgres => format!("${n}"),
        }
    }
}

/// SQL text plus its bind values in placeholder order.
#[derive(Clone, Debug, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub binds: Vec<FieldValue>,
}

impl Statement {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            binds: Vec::new(),
        }
    }
}

/// `CREATE TABLE IF NOT EXISTS` derived from the descriptor.
pub fn create_table(dialect: Dialect, table: &TableDescriptor) -> MetadataResult<Statement> {
    table.check_supported()?;
    let columns = table
        .fields
        .iter()
        .map(|field| {
            let ty = dialect.column_type(table, field)?;
            Ok(match (field.optional, field.unique) {
                (_, true) => format!("{} {} NOT NULL UNIQUE", field.name, ty),
                (true, false) => format!("{} {}", field.name, ty),
                (false, false) => format!("{} {} NOT NULL", field.name, ty),
            })
        })
        .collect::<MetadataResult<Vec<_>>>()?;
    Ok(Statement::new(format!(
        "CREATE TABLE IF NOT EXISTS {} ({})",
        table.name,
        columns.join(", ")
    )))
}

pub fn drop_table(table: &TableDescriptor) -> Statement {
    Statement::new(format!("DROP TABLE IF EXISTS {}", table.name))
}

/// Sparse insert: optional fields that are null or blank are left out.
///
/// A blank required field or a value of the wrong type rejects the row.
pub fn insert(
    dialect: Dialect,
    table: &TableDescriptor,
    values: Vec<FieldValue>,
) -> MetadataResult<Statement> {
    if values.len() != table.fields.len() {
        return Err(MetadataError::InvalidArgument(format!(
            "{} expects {} values, got {}",
            table.name,
            table.fields.len(),
            values.len()
        )));
    }

    let mut columns = Vec::new();
    let mut binds = Vec::new();
    for (field, value) in table.fields.iter().zip(values) {
        if value.is_blank() {
            if field.optional {
                continue;
            }
            return Err(MetadataError::InvalidArgument(format!(
                "required field {}.{} is blank",
                table.name, field.name
            )));
        }
        if !value.fits(field.ty) {
            return Err(MetadataError::InvalidArgument(format!(
                "value {:?} does not fit {}.{} ({})",
                value,
                table.name,
                field.name,
                field.ty.type_name()
            )));
        }
        columns.push(field.name);
        binds.push(value);
    }

    let sql = if columns.is_empty() {
        format!("INSERT INTO {} DEFAULT VALUES", table.name)
    } else {
        let placeholders: Vec<String> = (1..=binds.len()).map(|n| dialect.placeholder(n)).collect();
        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            table.name,
            columns.join(", "),
            placeholders.join(", ")
        )
    };
    Ok(Statement { sql, binds })
}

/// Parameterized WHERE clause, starting bind numbering after `offset`.
///
/// Returns `None` when no predicate applies. Null-valued predicates become
/// `IS NULL` and bind nothing.
pub fn where_clause(
    dialect: Dialect,
    table: &TableDescriptor,
    predicates: &[WhereClause],
    offset: usize,
) -> MetadataResult<Option<(String, Vec<FieldValue>)>> {
    let mut parts = Vec::new();
    let mut binds = Vec::new();
    for predicate in predicates.iter().filter(|p| !p.is_empty()) {
        let field = table.require_field(predicate.column().trim())?;
        match predicate.value() {
            None => parts.push(format!("{} IS NULL", field.name)),
            Some(value) => {
                if !value.fits(field.ty) {
                    return Err(MetadataError::InvalidArgument(format!(
                        "predicate value {:?} does not fit {}.{} ({})",
                        value,
                        table.name,
                        field.name,
                        field.ty.type_name()
                    )));
                }
                binds.push(value.clone());
                parts.push(format!(
                    "{} {} {}",
                    field.name,
                    predicate.operator().symbol(),
                    dialect.placeholder(offset + binds.len())
                ));
            }
        }
    }
    if parts.is_empty() {
        return Ok(None);
    }
    Ok(Some((format!("WHERE {}", parts.join(" AND ")), binds)))
}

/// Explicit column list; never `SELECT *`, so decoding follows the descriptor.
pub fn select(
    dialect: Dialect,
    table: &TableDescriptor,
    predicates: &[WhereClause],
) -> MetadataResult<Statement> {
    let base = format!("SELECT {} FROM {}", table.column_list(), table.name);
    Ok(match where_clause(dialect, table, predicates, 0)? {
        Some((clause, binds)) => Statement {
            sql: format!("{base} {clause}"),
            binds,
        },
        None => Statement::new(base),
    })
}

/// Predicated delete, or `None` when no predicate applies.
pub fn delete(
    dialect: Dialect,
    table: &TableDescriptor,
    predicates: &[WhereClause],
) -> MetadataResult<Option<Statement>> {
    Ok(
        where_clause(dialect, table, predicates, 0)?.map(|(clause, binds)| Statement {
            sql: format!("DELETE FROM {} {}", table.name, clause),
            binds,
        }),
    )
}

pub fn truncate(table: &TableDescriptor) -> Statement {
    Statement::new(format!("DELETE FROM {}", table.name))
}
