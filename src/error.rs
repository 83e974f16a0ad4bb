use sqlx::Error as SqlxError;
use std::fmt;
use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum RowkitError {
    #[error("Connection error: {0}")]
    Connection(#[source] SqlxError),

    #[error("Schema error for {entity}: {reason}")]
    Schema { entity: String, reason: String },

    #[error("Schema DDL for {entity} failed: {source}")]
    SchemaDdl {
        entity: String,
        #[source]
        source: SqlxError,
    },

    #[error("Fixture error: {0}")]
    Fixture(String),

    #[error("Insert into {table} failed: {source}")]
    Write {
        table: String,
        #[source]
        source: SqlxError,
    },

    #[error("Query on {table} failed: {source}")]
    Query {
        table: String,
        #[source]
        source: SqlxError,
    },

    #[error("{entity} has no relation named {relation:?}")]
    UnknownRelation { entity: String, relation: String },

    #[error("Condition {condition:?} has {placeholders} placeholder(s) but {values} value(s) were given")]
    PlaceholderMismatch {
        condition: String,
        placeholders: usize,
        values: usize,
    },

    #[error("No {entity} row matches {condition:?}")]
    NotFound { entity: String, condition: String },

    #[error("Config error: {0}")]
    Config(#[from] figment::Error),

    #[error("{stage} failed: {source}")]
    Startup {
        stage: Stage,
        #[source]
        source: Box<RowkitError>,
    },
}

impl RowkitError {
    pub fn fixture(msg: impl Into<String>) -> Self {
        RowkitError::Fixture(msg.into())
    }

    /// Tag an error with the startup step it came from.
    pub fn at(self, stage: Stage) -> Self {
        RowkitError::Startup {
            stage,
            source: Box::new(self),
        }
    }
}

/// Process lifecycle. Transitions only move forward; any failure aborts.
///
/// Startup errors are tagged with the stage that was being entered, so the
/// `Display` form names the step that produces it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Uninitialized,
    Connected,
    SchemaReady,
    FixturesLoaded,
    Ready,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Uninitialized => "startup",
            Stage::Connected => "connect",
            Stage::SchemaReady => "schema initialization",
            Stage::FixturesLoaded => "fixture load",
            Stage::Ready => "connection check",
        };
        f.write_str(name)
    }
}
