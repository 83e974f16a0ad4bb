//! Static table descriptors and the `Entity` trait that maps a Rust struct to
//! one of them.
//!
//! Every entity hands out a `&'static TableShape`; the helpers in
//! `db::sqlite` build their SQL from it instead of inspecting types at
//! runtime.

use sqlx::query::Query;
use sqlx::sqlite::{SqliteArguments, SqliteRow};
use sqlx::{Decode, Row, Sqlite, Type};

/// Storage class used when rendering DDL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlType {
    Integer,
    Real,
    Text,
}

impl SqlType {
    pub fn as_sql(self) -> &'static str {
        match self {
            SqlType::Integer => "INTEGER",
            SqlType::Real => "REAL",
            SqlType::Text => "TEXT",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    pub name: &'static str,
    pub sql_type: SqlType,
    pub primary_key: bool,
    pub auto_increment: bool,
}

impl Column {
    pub const fn new(name: &'static str, sql_type: SqlType) -> Self {
        Self {
            name,
            sql_type,
            primary_key: false,
            auto_increment: false,
        }
    }

    /// `INTEGER PRIMARY KEY AUTOINCREMENT`: keys are never reused in a table.
    pub const fn auto_pk(name: &'static str) -> Self {
        Self {
            name,
            sql_type: SqlType::Integer,
            primary_key: true,
            auto_increment: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationKind {
    /// The target table holds a column pointing back at the owner's key.
    HasOne,
}

#[derive(Debug)]
pub struct Relation {
    /// Name callers pass to `get_all`, e.g. `"Profile"`.
    pub name: &'static str,
    /// SQL alias of the joined table; also the column prefix of its fields.
    pub alias: &'static str,
    pub kind: RelationKind,
    pub target: &'static TableShape,
    /// Column on the owning table.
    pub base_column: &'static str,
    /// Column on the target table.
    pub join_column: &'static str,
}

impl Relation {
    /// Prefix under which joined columns are selected (`profile__id`, ...).
    pub fn prefix(&self) -> String {
        format!("{}__", self.alias)
    }
}

#[derive(Debug)]
pub struct TableShape {
    /// Entity name, e.g. `"User"`.
    pub name: &'static str,
    pub table: &'static str,
    /// Alias used in generated `SELECT`s, e.g. `"user"`.
    pub alias: &'static str,
    pub columns: &'static [Column],
    pub relations: &'static [Relation],
}

impl TableShape {
    pub fn primary_key(&self) -> Option<&'static Column> {
        self.columns.iter().find(|c| c.primary_key)
    }

    pub fn column(&self, name: &str) -> Option<&'static Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn relation(&self, name: &str) -> Option<&'static Relation> {
        self.relations.iter().find(|r| r.name == name)
    }
}

/// A single bindable column value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(v.into())
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Real(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

pub(crate) fn bind_value<'q>(
    query: Query<'q, Sqlite, SqliteArguments<'q>>,
    value: &Value,
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    match value {
        Value::Null => query.bind(None::<i64>),
        Value::Integer(v) => query.bind(*v),
        Value::Real(v) => query.bind(*v),
        Value::Text(v) => query.bind(v.clone()),
    }
}

/// Read `<prefix><name>` from a row, mapping SQL NULL to the type's zero value.
pub fn column_or_default<'r, T>(
    row: &'r SqliteRow,
    prefix: &str,
    name: &str,
) -> Result<T, sqlx::Error>
where
    T: Decode<'r, Sqlite> + Type<Sqlite> + Default,
{
    let key = format!("{prefix}{name}");
    let value: Option<T> = row.try_get(key.as_str())?;
    Ok(value.unwrap_or_default())
}

/// A record type backed by one table.
///
/// `Default` is the zero value returned by lenient single-row lookups that
/// match nothing.
pub trait Entity: Default + Send + 'static {
    fn shape() -> &'static TableShape;

    /// Column values, in the order of `shape().columns`.
    fn values(&self) -> Vec<Value>;

    fn set_primary_key(&mut self, id: i64);

    /// Decode the entity's own columns, each selected as `<prefix><column>`.
    fn from_row(row: &SqliteRow, prefix: &str) -> Result<Self, sqlx::Error>;

    /// Populate the relation `name` from joined columns carrying `prefix`.
    fn attach(&mut self, name: &str, _row: &SqliteRow, _prefix: &str) -> Result<(), sqlx::Error> {
        Err(sqlx::Error::Protocol(format!(
            "{} declares relation {name} but cannot attach it",
            Self::shape().name
        )))
    }
}
