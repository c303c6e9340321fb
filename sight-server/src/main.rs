use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use sight_server::cache::{CacheConfig, CachedSightEngine};
use sight_server::gtfs::{LoaderConfig, load_feeds};
use sight_server::sights::{SightConfig, SightEngine};
use sight_server::store::MemoryStore;
use sight_server::web::{AppState, create_router};

const DEFAULT_LOADER_CONFIG: &str = "feeds.json";
const DEFAULT_TIME_ZONE: &str = "Europe/Paris";
const DEFAULT_BIND: &str = "127.0.0.1:3000";

type StartupError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("sight_server=info")),
        )
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), StartupError> {
    let loader_path = env_or("SIGHTS_LOADER_CONFIG", DEFAULT_LOADER_CONFIG);
    let time_zone = env_or("SIGHTS_TIME_ZONE", DEFAULT_TIME_ZONE);
    let addr: SocketAddr = env_or("SIGHTS_BIND", DEFAULT_BIND).parse()?;

    // Fail on a bad zone before spending time on feeds
    let engine_config = SightConfig::new(time_zone);
    engine_config.tz()?;

    let loader_config = LoaderConfig::from_file(&loader_path)?;
    info!(config = %loader_path, "loading feeds");

    let store = Arc::new(MemoryStore::default());
    let summary = load_feeds(&loader_config, Arc::clone(&store)).await?;
    let (_, trips, stops, days) = store.counts()?;
    info!(
        feeds = summary.feeds,
        trips,
        stops,
        service_days = days,
        "feeds loaded"
    );

    let engine = SightEngine::new(store, engine_config)?;
    let cached = CachedSightEngine::new(engine, &CacheConfig::default());
    let app = create_router(AppState::new(cached));

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "sight server listening");
    info!("  GET /health");
    info!("  GET /api/sights?lat&lon&start&end | ?lat&lon&days");
    info!("  GET /api/trips/:feed_id/:trip_id/sights?date&lateness_mins");
    info!("  GET /api/stops/search?q");

    axum::serve(listener, app).await?;
    Ok(())
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
