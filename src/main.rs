use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use screening_core::config::Settings;
use screening_core::core::{SessionCoordinator, SignalingRelay};
use screening_core::routes::{self, handle_json_payload_error, handle_query_payload_error, AppState};
use screening_core::services::{LogNotifier, MemoryStore, Notifier, PostgresStore, Store, TokenVerifier, WebhookNotifier};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

fn init_logging(level: &str, format: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(true);

    if format == "pretty" {
        subscriber.pretty().init();
    } else {
        subscriber.init();
    }
}

fn io_error(context: &str, err: impl std::fmt::Display) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::Other, format!("{}: {}", context, err))
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load .env file if present
    dotenv::dotenv().ok();

    let settings = Settings::load().map_err(|e| io_error("Configuration error", e))?;

    init_logging(&settings.logging.level, &settings.logging.format);

    info!("Starting screening core...");

    let store: Arc<dyn Store> = match &settings.database.url {
        Some(url) => {
            let store = PostgresStore::from_settings(
                url,
                settings.database.max_connections,
                settings.database.min_connections,
            )
            .await
            .map_err(|e| {
                error!("Failed to connect to PostgreSQL: {}", e);
                io_error("PostgreSQL connection error", e)
            })?;
            info!("PostgreSQL store initialized");
            Arc::new(store)
        }
        None => {
            warn!("No database configured, using the in-memory store");
            Arc::new(MemoryStore::new())
        }
    };

    let notifier: Arc<dyn Notifier> = match &settings.notifications.webhook_url {
        Some(url) => {
            let timeout = settings.notifications.timeout_secs.unwrap_or(10);
            let notifier = WebhookNotifier::new(url.clone(), timeout)
                .map_err(|e| io_error("Notifier configuration error", e))?;
            info!("Webhook notifier initialized (timeout: {}s)", timeout);
            Arc::new(notifier)
        }
        None => {
            info!("No notification webhook configured, notifications are logged only");
            Arc::new(LogNotifier)
        }
    };

    let coordinator = SessionCoordinator::new(
        Arc::clone(&store),
        notifier,
        Arc::new(SignalingRelay::new()),
        (&settings.session).into(),
    );

    info!(
        "Session coordinator initialized (call duration: {}s)",
        settings.session.call_duration_secs
    );

    let app_state = AppState::new(store, coordinator.clone());
    let verifier = web::Data::new(TokenVerifier::new(&settings.auth.jwt_secret));

    // Configure HTTP server
    let host = settings.server.host.clone();
    let port = settings.server.port;
    let workers = settings.server.workers.unwrap_or(4);

    info!("Starting HTTP server on {}:{}", host, port);

    let result = HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .app_data(verifier.clone())
            .app_data(web::JsonConfig::default().error_handler(handle_json_payload_error))
            .app_data(web::QueryConfig::default().error_handler(handle_query_payload_error))
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .wrap(middleware::Compress::default())
            .configure(routes::configure_routes)
    })
    .workers(workers)
    .bind((host, port))?
    .run()
    .await;

    coordinator.shutdown().await;

    result
}
