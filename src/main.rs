use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    routing::{get, patch, post},
    Router,
};
use tower_http::cors::{AllowHeaders, AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ssmg_api::{config::Config, db, middleware::auth::JwtSecret, routes, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    let config = Arc::new(config);

    let pool = db::create_pool(&config.database_url).await?;
    db::run_migrations(&pool).await?;
    info!("Database connected and migrations applied");

    let state = AppState {
        db: pool,
        config: config.clone(),
    };

    // CORS: allow the configured app base URL, plus localhost for development.
    let cors_origin = {
        let base = config.app_base_url.clone();
        AllowOrigin::predicate(move |origin: &HeaderValue, _| {
            let o = match origin.to_str() {
                Ok(s) => s,
                Err(_) => return false,
            };
            o.starts_with("http://localhost") || o.starts_with("http://127.0.0.1") || o == base
        })
    };

    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(AllowHeaders::list([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            header::ACCEPT,
        ]))
        .allow_origin(cors_origin);

    let jwt_secret = JwtSecret(config.jwt_secret.clone());

    let app = Router::new()
        .route("/health", get(routes::health::health_check))
        // Auth
        .route("/auth/login", post(routes::auth::login))
        .route("/auth/token/refresh", post(routes::auth::refresh_token))
        .route("/auth/token/verify", post(routes::auth::verify_token))
        // Users
        .route("/auth/users", get(routes::users::list_users).post(routes::users::create_user))
        .route("/auth/users/get_profile", get(routes::users::get_profile))
        .route("/auth/users/get_service", get(routes::users::get_service))
        .route("/auth/users/change_password", post(routes::users::change_password))
        .route("/auth/users/dashboard", get(routes::dashboard::dashboard))
        .route("/auth/users/analytics", get(routes::dashboard::analytics))
        .route(
            "/auth/users/create-campaign-manager",
            post(routes::users::create_campaign_manager),
        )
        .route(
            "/auth/users/{id}",
            get(routes::users::get_user)
                .put(routes::users::update_user)
                .delete(routes::users::delete_user),
        )
        .route(
            "/auth/users/{id}/update-campaign-manager",
            patch(routes::users::update_campaign_manager),
        )
        // Services
        .route(
            "/auth/services",
            get(routes::services::list_services).post(routes::services::create_service),
        )
        .route(
            "/auth/services/{id}",
            get(routes::services::get_service)
                .put(routes::services::update_service)
                .delete(routes::services::delete_service),
        )
        // Campaign catalog
        .route("/campaigns/all", get(routes::campaigns::all_campaigns))
        .route(
            "/campaigns/{kind}",
            get(routes::campaigns::list_campaigns).post(routes::campaigns::create_campaign),
        )
        .route(
            "/campaigns/{kind}/submissions",
            get(routes::submissions::list_submissions).post(routes::submissions::create_submission),
        )
        .route(
            "/campaigns/{kind}/submissions/{id}",
            get(routes::submissions::get_submission)
                .put(routes::submissions::update_submission)
                .delete(routes::submissions::delete_submission),
        )
        .route(
            "/campaigns/{kind}/submissions/{id}/files",
            post(routes::submissions::upload_submission_files),
        )
        .route(
            "/campaigns/{kind}/{id}",
            get(routes::campaigns::get_campaign)
                .put(routes::campaigns::update_campaign)
                .delete(routes::campaigns::delete_campaign),
        )
        .route("/campaigns/{kind}/{id}/icon", post(routes::campaigns::upload_icon))
        // Stored files
        .route("/media/{*path}", get(routes::media::serve_media))
        .layer(axum::Extension(jwt_secret))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        // Global body size limit of 25 MB (covers picture uploads)
        .layer(DefaultBodyLimit::max(25 * 1024 * 1024))
        .with_state(state);

    let addr = format!("{}:{}", config.host, config.port);
    info!("SSMG API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
