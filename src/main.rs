use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use figment::{Figment, providers::Env};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use clipper::broker::Broker;
use clipper::config::Config;
use clipper::db::DbContext;
use clipper::events::ObserverRegistry;
use clipper::scheduler::SchedulerService;
use clipper::scraper::HttpScraper;
use clipper::services::fanout::FanoutService;
use clipper::services::manager::ServiceManager;
use clipper::services::web::WebService;
use clipper::services::ServiceResult;
use clipper::state::AppState;

/// Clipper - distributed scrape-job scheduling service
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Override the configured number of scrape workers
    #[arg(long)]
    workers: Option<usize>,
}

async fn shutdown_and_report(manager: &mut ServiceManager, timeout: Duration) -> i32 {
    match manager.shutdown(timeout).await {
        Ok(elapsed) => {
            info!(
                remaining = format!("{:.2?}", timeout.saturating_sub(elapsed)),
                "graceful shutdown complete"
            );
            0
        }
        Err(pending) => {
            warn!(
                pending_services = ?pending,
                "graceful shutdown elapsed - {} service(s) did not complete",
                pending.len()
            );
            2
        }
    }
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Load configuration first to get the log level
    let mut config: Config = Figment::new()
        .merge(Env::raw())
        .extract()
        .expect("Failed to load config");
    if let Some(workers) = args.workers {
        config.worker_count = workers;
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("warn,clipper={}", config.log_level)));
    let subscriber = FmtSubscriber::builder()
        .with_target(true)
        .with_env_filter(filter)
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    info!(
        version = env!("CARGO_PKG_VERSION"),
        port = config.api_port,
        workers = config.worker_count,
        shutdown_timeout = format!("{:.2?}", config.shutdown_timeout),
        "starting clipper"
    );

    // Create the database pool and apply migrations
    let connect_options = SqliteConnectOptions::from_str(&config.database_url)
        .expect("Invalid database URL")
        .create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect_with(connect_options)
        .await
        .expect("Failed to create database pool");
    sqlx::migrate!()
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    let config = Arc::new(config);
    let db = DbContext::new(pool);
    let broker = Arc::new(Broker::new());
    let observers = Arc::new(ObserverRegistry::new());
    let scraper =
        Arc::new(HttpScraper::new(config.scrape_timeout).expect("Failed to build HTTP client"));
    let state = AppState::new(db.clone(), broker.clone(), observers.clone(), config.clone());

    let mut manager = ServiceManager::new();
    manager.spawn(Box::new(WebService::new(state)));
    manager.spawn(Box::new(SchedulerService::new(
        db,
        broker.clone(),
        scraper,
        config.clone(),
    )));
    manager.spawn(Box::new(FanoutService::new(broker, observers)));

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install CTRL+C signal handler");
        info!("received ctrl+c, gracefully shutting down...");
    };

    #[cfg(unix)]
    let sigterm = async {
        use tokio::signal::unix::{SignalKind, signal};
        let mut sigterm_stream =
            signal(SignalKind::terminate()).expect("Failed to install SIGTERM signal handler");
        sigterm_stream.recv().await;
        info!("received SIGTERM, gracefully shutting down...");
    };

    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    let shutdown_timeout = config.shutdown_timeout;
    let mut exit_code = 0;

    tokio::select! {
        (service_name, result) = manager.wait_any() => {
            match result {
                ServiceResult::GracefulShutdown => {
                    info!(service = service_name, "service completed gracefully");
                }
                ServiceResult::NormalCompletion => {
                    warn!(service = service_name, "service completed unexpectedly");
                    exit_code = 1;
                }
                ServiceResult::Error(e) => {
                    error!(service = service_name, error = ?e, "service failed");
                    exit_code = 1;
                }
            }
            let shutdown_code = shutdown_and_report(&mut manager, shutdown_timeout).await;
            if exit_code == 0 {
                exit_code = shutdown_code;
            }
        }
        _ = ctrl_c => {
            exit_code = shutdown_and_report(&mut manager, shutdown_timeout).await;
        }
        _ = sigterm => {
            exit_code = shutdown_and_report(&mut manager, shutdown_timeout).await;
        }
    }

    info!(exit_code, "application shutdown complete");
    std::process::exit(exit_code);
}
