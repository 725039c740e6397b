use std::error::Error;

use sqlx::postgres::PgPoolOptions;
use tokio::signal::{
    ctrl_c,
    unix::{signal, SignalKind},
};
use tracing_subscriber::{fmt, EnvFilter};

use recipe_share::{api, config::Config, context::Context, MIGRATOR};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let _ = dotenvy::dotenv();
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::load()?;
    let address = config.socket_addr()?;

    log::info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.database_url)
        .await?;

    MIGRATOR.run(&pool).await?;
    log::info!("Database migrations applied");

    let ctx = Context::new(pool.clone(), &config);
    let (bound, server) =
        warp::serve(api::routes(ctx)).try_bind_with_graceful_shutdown(address, shutdown_signal())?;

    log::info!("Server running on {bound}");
    server.await;

    pool.close().await;
    log::info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = ctrl_c().await {
            log::error!("Failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
        log::info!("Received Ctrl+C, shutting down");
    };

    let terminate = async {
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                log::info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                log::error!("Failed to install signal handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
