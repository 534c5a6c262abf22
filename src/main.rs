use phono::config::Config;
use phono::db::Database;
use phono::library::{LibraryManager, SharedLibraryManager};
use phono::server::{create_router, AppState};
use phono::transcode::FfmpegTranscoder;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            error!("configuration error: {}", e);
            std::process::exit(1);
        }
    };

    let database = match Database::new(&config.db_path).await {
        Ok(database) => database,
        Err(e) => {
            error!("failed to open catalog database: {}", e);
            std::process::exit(1);
        }
    };

    let library = SharedLibraryManager::new(LibraryManager::new(database));
    let transcoder = Arc::new(FfmpegTranscoder::from_config(&config));

    let state = AppState {
        library,
        transcoder,
        media_root: config.music_dir.clone(),
        auth_token: config.auth_token.clone(),
    };
    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("failed to bind {}: {}", addr, e);
            std::process::exit(1);
        }
    };

    info!("serving music from {}", config.music_dir.display());
    info!("listening on {}", addr);

    if let Err(e) = axum::serve(listener, app).await {
        error!("server error: {}", e);
        std::process::exit(1);
    }
}
