use mimalloc::MiMalloc;
use rowkit::{Config, User};
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    let cfg = match Config::load() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cfg.loglevel.clone()));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_level(true)
                .with_target(false),
        )
        .init();

    info!(
        database_url = %cfg.database_url,
        fixture = %cfg.fixture_dir.join(&cfg.fixture_file).display(),
        load_fixtures = cfg.load_fixtures,
        truncate_tables = cfg.truncate_tables,
        where_mode = ?cfg.where_mode,
        loglevel = %cfg.loglevel
    );

    match run(&cfg).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "aborting");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cfg: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let db = rowkit::service::bootstrap(cfg).await?;

    let users = db.get_all::<User>(&cfg.relation).await?;
    println!("{}", serde_json::to_string_pretty(&users)?);

    db.close().await;
    Ok(())
}
