pub mod config;
pub mod db;
pub mod error;
pub mod service;

pub use config::Config;
pub use db::{Database, DatabaseOptions, Entity, Profile, User, Value, WhereMode};
pub use error::{RowkitError, Stage};
