use axum::{
    http::HeaderValue,
    routing::get,
    Json, Router,
};
use fyyur_db::AppState;
use sea_orm_migration::MigratorTrait;
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    set_header::SetResponseHeaderLayer,
    trace::TraceLayer,
};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

mod api;

#[derive(Serialize)]
struct ApiStatus {
    status: &'static str,
    version: &'static str,
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let db_config = fyyur_db::DatabaseConfig::from_env();
    tracing::info!("connecting to database...");
    let db = fyyur_db::connect(&db_config)
        .await
        .expect("failed to connect to database");

    tracing::info!("running database migrations...");
    fyyur_migration::Migrator::up(&db, None)
        .await
        .expect("failed to run migrations");
    tracing::info!("migrations complete");

    let state = Arc::new(AppState { db });

    let api_routes = Router::new()
        .route(
            "/venues",
            get(api::venues::list_venues).post(api::venues::create_venue),
        )
        .route("/venues/search", get(api::venues::search_venues))
        .route(
            "/venues/{id}",
            get(api::venues::get_venue)
                .put(api::venues::update_venue)
                .delete(api::venues::delete_venue),
        )
        .route(
            "/artists",
            get(api::artists::list_artists).post(api::artists::create_artist),
        )
        .route("/artists/search", get(api::artists::search_artists))
        .route(
            "/artists/{id}",
            get(api::artists::get_artist).put(api::artists::update_artist),
        )
        .route(
            "/shows",
            get(api::shows::list_shows).post(api::shows::create_show),
        );

    let allowed_methods = [
        axum::http::Method::GET,
        axum::http::Method::POST,
        axum::http::Method::PUT,
        axum::http::Method::DELETE,
        axum::http::Method::OPTIONS,
    ];

    // CORS configuration — restrict to configured origins
    let cors = {
        let allowed_origins_str = std::env::var("CORS_ORIGINS").unwrap_or_default();
        if allowed_origins_str.is_empty() {
            tracing::warn!(
                "CORS_ORIGINS not set — allowing http://localhost:3000 only. \
                 Set CORS_ORIGINS to a comma-separated origin list in production."
            );
            CorsLayer::new()
                .allow_origin(AllowOrigin::exact(HeaderValue::from_static(
                    "http://localhost:3000",
                )))
                .allow_methods(allowed_methods)
                .allow_headers(tower_http::cors::Any)
        } else {
            let origins: Vec<HeaderValue> = allowed_origins_str
                .split(',')
                .filter_map(|s| HeaderValue::from_str(s.trim()).ok())
                .collect();
            tracing::info!("CORS allowed origins: {:?}", origins);
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods(allowed_methods)
                .allow_headers(tower_http::cors::Any)
        }
    };

    let app = Router::new()
        .route("/healthz", get(healthz))
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(SetResponseHeaderLayer::overriding(
            axum::http::header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            axum::http::header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .with_state(state);

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(8080);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!(%addr, "server started");

    axum::serve(tokio::net::TcpListener::bind(addr).await.unwrap(), app)
        .await
        .unwrap();
}

async fn healthz() -> Json<ApiStatus> {
    Json(ApiStatus {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}
