#![allow(dead_code)]

use rowkit::service::init_schema;
use rowkit::{Database, DatabaseOptions, WhereMode};

pub async fn memory_db(where_mode: WhereMode) -> Database {
    let opts = DatabaseOptions {
        where_mode,
        ..DatabaseOptions::in_memory()
    };
    let db = Database::connect(&opts)
        .await
        .expect("failed to open in-memory database");
    init_schema(&db).await.expect("failed to create tables");
    db
}

pub async fn table_ddl(db: &Database, table: &str) -> String {
    let (sql,): (String,) =
        sqlx::query_as("SELECT sql FROM sqlite_master WHERE type = 'table' AND name = ?")
            .bind(table)
            .fetch_one(db.pool())
            .await
            .expect("table missing from sqlite_master");
    sql
}

pub async fn row_count(db: &Database, table: &str) -> i64 {
    let (n,): (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM \"{table}\""))
        .fetch_one(db.pool())
        .await
        .expect("count failed");
    n
}
