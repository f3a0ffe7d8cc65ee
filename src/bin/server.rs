use std::{env, fs::OpenOptions, net::SocketAddr, sync::Arc};

use axum::{
    Router,
    extract::{MatchedPath, Request},
};
use axum_server::Handle;
use clap::Parser;
use rusqlite::Connection;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{
    EnvFilter, Layer, filter::LevelFilter, layer::SubscriberExt, util::SubscriberInitExt,
};

use ken_kash::{AppState, build_router, find_balance_drift, graceful_shutdown};

/// The HTTP server for Ken Kash.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// File path to the application SQLite database.
    #[arg(long)]
    db_path: String,

    /// The port to serve the API from.
    #[arg(short, long, default_value_t = 3000)]
    port: u16,

    /// The IP address to listen on.
    #[arg(short, long, default_value = "127.0.0.1")]
    address: String,
}

#[tokio::main]
async fn main() {
    setup_logging();

    let args = Args::parse();

    let addr: SocketAddr = format!("{}:{}", args.address, args.port)
        .parse()
        .expect("Could not parse the address and port");

    let secret = env::var("SECRET").expect("The environment variable 'SECRET' must be set");
    let cron_secret =
        env::var("CRON_SECRET").expect("The environment variable 'CRON_SECRET' must be set");

    let conn = Connection::open(&args.db_path)
        .unwrap_or_else(|error| panic!("Could not open the database at {}: {error}", args.db_path));
    let state = AppState::new(conn, &secret, &cron_secret)
        .expect("Could not initialize the application state");

    check_balances(&state);

    let handle = Handle::new();
    tokio::spawn(graceful_shutdown(handle.clone()));

    let router = add_tracing_layer(build_router(state));

    #[cfg(debug_assertions)]
    let router = router.layer(axum::middleware::from_fn(ken_kash::logging_middleware));

    tracing::info!("HTTP server listening on {}", addr);
    axum_server::bind(addr)
        .handle(handle)
        .serve(router.into_make_service())
        .await
        .expect("Server stopped unexpectedly");
}

/// Log any account whose cached balance disagrees with its ledger.
fn check_balances(state: &AppState) {
    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("Could not acquire database lock to check balances: {error}");
            return;
        }
    };

    match find_balance_drift(&connection) {
        Ok(drift) if drift.is_empty() => tracing::info!("Account balances match the ledger"),
        Ok(drift) => {
            for account in drift {
                tracing::warn!(
                    "Account {} has a cached balance of {} but its ledger sums to {}",
                    account.account_id,
                    account.cached,
                    account.ledger
                );
            }
        }
        Err(error) => tracing::error!("Could not check account balances: {error}"),
    }
}

fn setup_logging() {
    let stdout_log = tracing_subscriber::fmt::layer().pretty().with_filter(
        EnvFilter::builder()
            .with_default_directive(LevelFilter::INFO.into())
            .from_env_lossy(),
    );

    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open("debug.log")
        .expect("Could not create log file");

    let debug_log = tracing_subscriber::fmt::layer()
        .pretty()
        .with_ansi(false)
        .with_writer(Arc::new(log_file))
        .with_filter(LevelFilter::DEBUG);

    tracing_subscriber::registry()
        .with(stdout_log)
        .with(debug_log)
        .init();
}

fn add_tracing_layer(router: Router) -> Router {
    let tracing_layer = TraceLayer::new_for_http()
        .make_span_with(|req: &Request| {
            let method = req.method();
            let uri = req.uri();

            let matched_path = req
                .extensions()
                .get::<MatchedPath>()
                .map(|matched_path| matched_path.as_str());

            tracing::debug_span!("request", %method, %uri, matched_path)
        })
        // Handlers log their own errors.
        .on_failure(());

    router.layer(tracing_layer)
}
