mod config;
mod handlers;
mod infra;
mod memory_store;
mod routes;
mod uploads;

use std::sync::Arc;

use axum::routing::{get, post, put};
use axum::Router;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use abs_import_core::ProgressTracker;

use config::Config;
use infra::AppState;
use memory_store::{InMemoryCatalogStore, InMemoryImportRepository};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Arc::new(Config::from_env()?);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "abs_import_server=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(dev_mode = config.dev_mode, "abs-import-server configuration loaded");

    let catalog = if config.dev_mode {
        info!("dev mode enabled, seeding in-memory catalog with demo users and books");
        Arc::new(InMemoryCatalogStore::seeded_for_dev())
    } else {
        Arc::new(InMemoryCatalogStore::new())
    };

    let state = AppState {
        config: config.clone(),
        catalog,
        imports: Arc::new(InMemoryImportRepository::new()),
        progress: Arc::new(ProgressTracker::new()),
    };

    let app = create_app(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    info!("starting abs-import-server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn create_app(state: AppState) -> Router {
    Router::new()
        .route(routes::v1::uploads::ARCHIVE, post(handlers::upload::upload_archive_handler))
        .route(
            routes::v1::imports::COLLECTION,
            post(handlers::imports::create_import_handler).get(handlers::imports::list_imports_handler),
        )
        .route(
            routes::v1::imports::ITEM,
            get(handlers::imports::get_import_handler).delete(handlers::imports::delete_import_handler),
        )
        .route(
            routes::v1::imports::EXECUTE,
            post(handlers::imports::execute_import_handler),
        )
        .route(
            routes::v1::imports::LEGACY_IMPORT,
            post(handlers::imports::legacy_import_handler),
        )
        .route(
            routes::v1::imports::users::COLLECTION,
            get(handlers::mappings::list_imported_users_handler),
        )
        .route(
            routes::v1::imports::users::MAPPING,
            put(handlers::mappings::map_user_handler),
        )
        .route(
            routes::v1::imports::books::COLLECTION,
            get(handlers::mappings::list_imported_books_handler),
        )
        .route(
            routes::v1::imports::books::MAPPING,
            put(handlers::mappings::map_book_handler),
        )
        .route(
            routes::v1::imports::sessions::COLLECTION,
            get(handlers::sessions::list_imported_sessions_handler),
        )
        .route(
            routes::v1::imports::sessions::SKIP,
            post(handlers::sessions::skip_session_handler),
        )
        .route(
            routes::v1::analysis::START,
            post(handlers::analysis::start_analysis_handler),
        )
        .route(
            routes::v1::analysis::ONE_SHOT,
            post(handlers::analysis::one_shot_analyze_handler),
        )
        .route(
            routes::v1::analysis::ITEM,
            get(handlers::analysis::get_analysis_handler),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    fn test_state() -> AppState {
        AppState {
            config: Arc::new(Config {
                server: config::ServerConfig {
                    host: "127.0.0.1".into(),
                    port: 0,
                },
                uploads_dir: std::env::temp_dir().join("abs-import-server-tests"),
                max_upload_bytes: 1 << 20,
                dev_mode: false,
            }),
            catalog: Arc::new(InMemoryCatalogStore::new()),
            imports: Arc::new(InMemoryImportRepository::new()),
            progress: Arc::new(ProgressTracker::new()),
        }
    }

    #[tokio::test]
    async fn listing_imports_on_an_empty_store_returns_an_empty_array() {
        let app = create_app(test_state());

        let response = app
            .oneshot(
                Request::builder()
                    .uri(routes::v1::imports::COLLECTION)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn unknown_import_returns_404() {
        let app = create_app(test_state());
        let uri = routes::v1::imports::ITEM.replace("{id}", &uuid::Uuid::new_v4().to_string());

        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
