use crate::db::entity::{Column, Entity, Relation, TableShape, Value, bind_value};
use crate::db::query::{count_placeholders, insert_sql, select_sql, select_where_sql};
use crate::db::schema::{create_table_sql, quote, validate};
use crate::error::RowkitError;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Pool, Row, Sqlite, ValueRef};
use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::{Arc, RwLock};
use tracing::{debug, info, warn};

pub type SqlitePool = Pool<Sqlite>;

/// What `get_where` does when nothing matches or the query fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WhereMode {
    /// Return the zero value for both a miss and a query error (the error is logged).
    #[default]
    Lenient,
    /// Surface `NotFound` and `Query` errors.
    Strict,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseOptions {
    pub url: String,
    pub shared_cache: bool,
    pub where_mode: WhereMode,
}

impl Default for DatabaseOptions {
    fn default() -> Self {
        Self {
            url: "sqlite:sql.sqlite".to_string(),
            shared_cache: true,
            where_mode: WhereMode::Lenient,
        }
    }
}

impl DatabaseOptions {
    pub fn in_memory() -> Self {
        Self {
            url: "sqlite::memory:".to_string(),
            ..Default::default()
        }
    }
}

/// The one connection to the store plus the registry of entity shapes.
///
/// The pool is capped at a single connection that is never idled out, so
/// every helper call runs on the same SQLite session as an auto-committed
/// statement. There is no locking beyond that; the handle is `Clone` but
/// is meant to be driven from one task.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
    models: Arc<RwLock<BTreeMap<&'static str, &'static TableShape>>>,
    where_mode: WhereMode,
}

impl Database {
    /// Open (creating if missing) the store described by `opts`.
    pub async fn connect(opts: &DatabaseOptions) -> Result<Self, RowkitError> {
        let connect_opts = SqliteConnectOptions::from_str(&opts.url)
            .map_err(RowkitError::Connection)?
            .create_if_missing(true)
            .shared_cache(opts.shared_cache);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(connect_opts)
            .await
            .map_err(RowkitError::Connection)?;

        info!(url = %opts.url, shared_cache = opts.shared_cache, "Database Setup Complete!");

        Ok(Self {
            pool,
            models: Arc::default(),
            where_mode: opts.where_mode,
        })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn where_mode(&self) -> WhereMode {
        self.where_mode
    }

    pub async fn ping(&self) -> Result<(), RowkitError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(RowkitError::Connection)?;
        Ok(())
    }

    /// Close the connection. Outstanding clones become unusable.
    pub async fn close(self) {
        self.pool.close().await;
        debug!("database connection closed");
    }

    /// Look up a registered shape by entity name or table name.
    pub fn shape(&self, name: &str) -> Option<&'static TableShape> {
        let models = self.models.read().unwrap_or_else(|e| e.into_inner());
        models
            .get(name)
            .copied()
            .or_else(|| models.values().copied().find(|s| s.table == name))
    }

    /// Entity names registered so far.
    pub fn registered(&self) -> Vec<&'static str> {
        let models = self.models.read().unwrap_or_else(|e| e.into_inner());
        models.keys().copied().collect()
    }

    fn register(&self, shape: &'static TableShape) {
        let mut models = self.models.write().unwrap_or_else(|e| e.into_inner());
        models.entry(shape.name).or_insert(shape);
    }

    /// Create `T`'s table if it does not exist yet, then register its shape.
    pub async fn ensure_table<T: Entity>(&self) -> Result<(), RowkitError> {
        let shape = T::shape();
        validate(shape)?;

        let ddl = create_table_sql(shape);
        debug!(sql = %ddl, "create table");
        sqlx::query(&ddl)
            .execute(&self.pool)
            .await
            .map_err(|source| RowkitError::SchemaDdl {
                entity: shape.name.to_string(),
                source,
            })?;
        self.register(shape);

        info!("Created Table {}", shape.name);
        Ok(())
    }

    pub async fn create_table_if_not_exists<T: Entity>(&self) -> Result<(), RowkitError> {
        self.ensure_table::<T>().await
    }

    /// Insert one row. An autoincrement key left at 0 is assigned by the
    /// store and written back into `record`.
    pub async fn insert<T: Entity>(&self, record: &mut T) -> Result<(), RowkitError> {
        let shape = T::shape();
        let values = record.values();
        if values.len() != shape.columns.len() {
            return Err(RowkitError::Schema {
                entity: shape.name.to_string(),
                reason: format!(
                    "{} values for {} columns",
                    values.len(),
                    shape.columns.len()
                ),
            });
        }
        let row: Vec<(&'static Column, Value)> = shape.columns.iter().zip(values).collect();
        let id = self.insert_columns(shape, row).await?;
        if let Some(pk) = shape.primary_key().filter(|pk| pk.auto_increment) {
            debug!(table = shape.table, column = pk.name, id, "assigned key");
            record.set_primary_key(id);
        }
        Ok(())
    }

    /// Insert raw column values into `shape`'s table and return the rowid.
    pub(crate) async fn insert_columns(
        &self,
        shape: &TableShape,
        row: Vec<(&'static Column, Value)>,
    ) -> Result<i64, RowkitError> {
        let (columns, values): (Vec<&Column>, Vec<Value>) = row
            .into_iter()
            .filter(|(c, v)| !(c.auto_increment && matches!(v, Value::Integer(0) | Value::Null)))
            .unzip();

        let sql = insert_sql(shape.table, &columns);
        debug!(sql = %sql, "insert");
        let mut query = sqlx::query(&sql);
        for value in &values {
            query = bind_value(query, value);
        }
        let result = query
            .execute(&self.pool)
            .await
            .map_err(|source| RowkitError::Write {
                table: shape.table.to_string(),
                source,
            })?;
        Ok(result.last_insert_rowid())
    }

    /// Remove every row of `shape`'s table. Keys keep counting from where they were.
    pub(crate) async fn truncate_table(&self, shape: &TableShape) -> Result<u64, RowkitError> {
        let sql = format!("DELETE FROM {}", quote(shape.table));
        debug!(sql = %sql, "truncate");
        let result = sqlx::query(&sql)
            .execute(&self.pool)
            .await
            .map_err(|source| RowkitError::Write {
                table: shape.table.to_string(),
                source,
            })?;
        Ok(result.rows_affected())
    }

    /// Fetch every row of `T`. A non-empty `relation` eager-loads that
    /// has-one relation; row order is whatever SQLite yields.
    pub async fn get_all<T: Entity>(&self, relation: &str) -> Result<Vec<T>, RowkitError> {
        let shape = T::shape();
        let rel = if relation.is_empty() {
            None
        } else {
            Some(
                shape
                    .relation(relation)
                    .ok_or_else(|| RowkitError::UnknownRelation {
                        entity: shape.name.to_string(),
                        relation: relation.to_string(),
                    })?,
            )
        };

        let sql = select_sql(shape, rel);
        debug!(sql = %sql, "select");
        let query_err = |source: sqlx::Error| RowkitError::Query {
            table: shape.table.to_string(),
            source,
        };
        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(query_err)?;

        rows.iter()
            .map(|row| decode::<T>(row, rel))
            .collect::<Result<Vec<_>, _>>()
            .map_err(query_err)
    }

    /// Fetch at most one row matching `condition`, with `?` placeholders
    /// bound from `values` in order. See [`WhereMode`] for misses and errors.
    pub async fn get_where<T: Entity>(
        &self,
        condition: &str,
        values: &[Value],
    ) -> Result<T, RowkitError> {
        let fetched = self.fetch_where::<T>(condition, values).await;
        match (self.where_mode, fetched) {
            (_, Ok(Some(row))) => Ok(row),
            (WhereMode::Lenient, Ok(None)) => Ok(T::default()),
            (WhereMode::Strict, Ok(None)) => Err(RowkitError::NotFound {
                entity: T::shape().name.to_string(),
                condition: condition.to_string(),
            }),
            (_, Err(e @ RowkitError::PlaceholderMismatch { .. })) => Err(e),
            (WhereMode::Lenient, Err(e)) => {
                warn!(error = %e, condition, "get_where failed; returning zero value");
                Ok(T::default())
            }
            (WhereMode::Strict, Err(e)) => Err(e),
        }
    }

    /// Like `get_where`, but a miss is `Ok(None)` and errors always surface.
    pub async fn find_where<T: Entity>(
        &self,
        condition: &str,
        values: &[Value],
    ) -> Result<Option<T>, RowkitError> {
        self.fetch_where::<T>(condition, values).await
    }

    async fn fetch_where<T: Entity>(
        &self,
        condition: &str,
        values: &[Value],
    ) -> Result<Option<T>, RowkitError> {
        let placeholders = count_placeholders(condition);
        if placeholders != values.len() {
            return Err(RowkitError::PlaceholderMismatch {
                condition: condition.to_string(),
                placeholders,
                values: values.len(),
            });
        }

        let shape = T::shape();
        let sql = select_where_sql(shape, condition);
        debug!(sql = %sql, "select where");
        let query_err = |source: sqlx::Error| RowkitError::Query {
            table: shape.table.to_string(),
            source,
        };
        let mut query = sqlx::query(&sql);
        for value in values {
            query = bind_value(query, value);
        }
        let row = query
            .fetch_optional(&self.pool)
            .await
            .map_err(query_err)?;
        row.map(|row| T::from_row(&row, ""))
            .transpose()
            .map_err(query_err)
    }
}

fn decode<T: Entity>(row: &SqliteRow, relation: Option<&Relation>) -> Result<T, sqlx::Error> {
    let mut item = T::from_row(row, "")?;
    let Some(rel) = relation else {
        return Ok(item);
    };
    let prefix = rel.prefix();
    let key_column = rel
        .target
        .primary_key()
        .map(|pk| format!("{prefix}{}", pk.name))
        .ok_or_else(|| sqlx::Error::Protocol(format!("{} has no primary key", rel.target.name)))?;
    // LEFT JOIN: a NULL key means the owner has no related row.
    if !row.try_get_raw(key_column.as_str())?.is_null() {
        item.attach(rel.name, row, &prefix)?;
    }
    Ok(item)
}
