use crate::config::Config;
use crate::db::{Database, Profile, User};
use crate::error::{RowkitError, Stage};
use crate::service::fixture_loader::{FixtureOptions, load_fixtures};
use tracing::{debug, info};

/// Create the tables of every declared entity.
pub async fn init_schema(db: &Database) -> Result<(), RowkitError> {
    db.create_table_if_not_exists::<User>().await?;
    db.create_table_if_not_exists::<Profile>().await?;
    Ok(())
}

/// Connect, initialize the schema, optionally load fixtures and check the
/// connection. Errors are tagged with the stage that failed.
pub async fn bootstrap(cfg: &Config) -> Result<Database, RowkitError> {
    let mut stage = Stage::Uninitialized;
    debug!(%stage, "bootstrap starting");

    let db = Database::connect(&cfg.database_options())
        .await
        .map_err(|e| e.at(Stage::Connected))?;
    stage = advance(stage, Stage::Connected);

    init_schema(&db).await.map_err(|e| e.at(Stage::SchemaReady))?;
    stage = advance(stage, Stage::SchemaReady);

    if cfg.load_fixtures {
        let options = FixtureOptions {
            truncate_tables: cfg.truncate_tables,
        };
        let stats = load_fixtures(&db, &cfg.fixture_dir, &cfg.fixture_file, options)
            .await
            .map_err(|e| e.at(Stage::FixturesLoaded))?;
        info!(rows = stats.total(), "fixture rows inserted");
        stage = advance(stage, Stage::FixturesLoaded);
    }

    db.ping().await.map_err(|e| e.at(Stage::Ready))?;
    advance(stage, Stage::Ready);

    Ok(db)
}

fn advance(from: Stage, to: Stage) -> Stage {
    debug_assert!(from < to, "lifecycle moves forward only");
    debug!(%from, %to, "lifecycle advanced");
    to
}
