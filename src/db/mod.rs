//! Database module: entity shapes and the SQLite-backed helpers.
//!
//! Layout:
//! - `entity.rs`: `Entity` trait, table/column/relation descriptors, bind values
//! - `models.rs`: the `User` and `Profile` entities
//! - `schema.rs`: DDL rendering and shape validation
//! - `query.rs`: SELECT / INSERT text and placeholder counting
//! - `sqlite.rs`: the connection and the generic data-access helpers

pub mod entity;
pub mod models;
pub mod query;
pub mod schema;
pub mod sqlite;

pub use entity::{Column, Entity, Relation, RelationKind, SqlType, TableShape, Value};
pub use models::{Profile, User};
pub use sqlite::{Database, DatabaseOptions, SqlitePool, WhereMode};
