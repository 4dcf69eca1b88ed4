//! FlipLens — resale-arbitrage tracking backend
//!
//! Usage:
//!   fliplens serve --port 5000        — Launch the JSON API server

mod error;
mod extract;
mod ratelimit;
mod routes;
mod state;

use axum::http::{HeaderValue, Method, StatusCode, Uri};
use axum::routing::get;
use axum::{middleware, Json, Router};
use clap::{Parser, Subcommand};
use engine::{AppConfig, EbayClient};
use ratelimit::RateLimiter;
use routes::health::APP_VERSION;
use state::AppState;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "fliplens")]
#[command(about = "Resale-arbitrage tracking backend", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Launch the API server
    Serve {
        /// Host to bind to
        #[arg(long, default_value = "0.0.0.0")]
        host: String,
        /// Port to listen on
        #[arg(short, long, default_value_t = 5000)]
        port: u16,
    },
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("debug,engine=debug,fliplens=debug")
    } else {
        EnvFilter::new("info,engine=info,fliplens=info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).compact())
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    dotenvy::dotenv().ok();

    match cli.command {
        Commands::Serve { host, port } => cmd_serve(&host, port).await?,
    }

    Ok(())
}

async fn cmd_serve(host: &str, port: u16) -> anyhow::Result<()> {
    info!("FlipLens v{} starting...", APP_VERSION);

    let config = AppConfig::from_env().map_err(|e| {
        error!("Configuration error: {}", e);
        anyhow::anyhow!("Configuration error: {}", e)
    })?;
    error::set_production_mode(config.is_production());

    let db = persistence::Database::new(&config.database_path)
        .await
        .map_err(|e| {
            error!("Failed to initialize database: {}", e);
            anyhow::anyhow!("Database initialization failed: {}", e)
        })?;
    info!("Database initialized: {}", config.database_path);

    let ebay = match &config.ebay_api_key {
        Some(key) => {
            info!(
                sandbox = config.ebay_use_sandbox,
                "Marketplace client configured"
            );
            Some(EbayClient::new(config.ebay_base_url(), key))
        }
        None => {
            warn!("EBAY_API_KEY not set; /api/search will answer 503");
            None
        }
    };

    let limiter = RateLimiter::new(
        config.rate_limit_enabled,
        config.rate_limit_requests,
        config.rate_limit_window_secs,
    );

    let state = AppState {
        db: Arc::new(db),
        config: Arc::new(config.clone()),
        ebay: Arc::new(ebay),
        limiter: Arc::new(limiter),
    };

    let cors = if config.cors_origins.iter().any(|o| o == "*") {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<HeaderValue> = config
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers(Any)
    };

    let api_routes = routes::api_router().layer(middleware::from_fn_with_state(
        state.clone(),
        ratelimit::middleware,
    ));

    let app = Router::new()
        .route("/", get(home))
        .nest("/api", api_routes)
        .fallback(not_found)
        .layer(cors)
        .with_state(state);

    let addr: std::net::SocketAddr = format!("{}:{}", host, port).parse()?;
    println!("\n=== FlipLens v{} ===", APP_VERSION);
    println!("Resale-arbitrage tracking API");
    println!("Listening on http://{}", addr);
    println!("\nEndpoints:");
    println!("  GET  /api/health                  - Health check");
    println!("  POST /api/auth/register           - Create an account");
    println!("  POST /api/auth/login              - Log in (JWT bearer token)");
    println!("  POST /api/search                  - Marketplace search");
    println!("  CRUD /api/saved-items[/<id>]      - Bookmarked listings");
    println!("  CRUD /api/portfolio[/<id>]        - Owned items");
    println!("  CRUD /api/alerts[/<id>][/toggle]  - Price alerts");
    println!("  GET  /api/market-trends/<item>    - Price history & summary");
    println!("  GET/PUT /api/settings             - Preferences");
    println!("  GET/PUT /api/profile              - Account profile");
    println!("\n  Database: {}", config.database_path);
    println!("\nPress Ctrl+C to stop\n");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await?;

    Ok(())
}

/// GET /
async fn home(axum::extract::State(state): axum::extract::State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "message": "FlipLens API is running",
        "version": APP_VERSION,
        "environment": state.config.environment_name(),
        "sandbox": state.config.ebay_use_sandbox,
    }))
}

/// JSON 404 for unknown paths
async fn not_found(uri: Uri) -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({
            "error": "Not Found",
            "message": "The requested resource was not found",
            "path": uri.path(),
            "status": "error",
        })),
    )
}
