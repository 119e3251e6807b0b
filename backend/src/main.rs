mod config;
mod db;
mod error;
mod indexer;
mod models;
mod notify;
mod routes;
mod search;
mod upstream;
mod wazuh;

use std::fs;

use actix_cors::Cors;
use actix_web::{App, HttpServer, middleware::Logger, web};
use config::AppConfig;
use db::{init_pool, prepare_schema};
use indexer::IndexerClient;
use notify::Notifier;
use routes::register;
use sqlx::PgPool;
use tracing::{info, warn};
use tracing_appender::rolling;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};
use upstream::Remote;
use wazuh::WazuhClient;

pub struct AppState {
    pub pool: PgPool,
    pub indexer: IndexerClient,
    pub wazuh: WazuhClient,
    pub notifier: Option<Notifier>,
    pub alert_min_level: i64,
    pub debug_query: bool,
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env().expect("failed to load config");

    fs::create_dir_all(&config.log_dir).expect("failed to create log directory");
    let file_appender = rolling::never(&config.log_dir, "backend.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);
    let _guard = guard;

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .expect("failed to init logging filter");

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer())
        .with(fmt::layer().with_ansi(false).with_writer(file_writer))
        .init();

    let pool = init_pool(&config.database_url).expect("failed to init postgres pool");
    prepare_schema(&pool, config.reset_db)
        .await
        .expect("failed to prepare database schema");

    let http =
        upstream::build_client(&config, Remote::Siem).expect("failed to build http client");
    let notifier = match config.telegram.as_ref() {
        Some(telegram) => {
            let notify_http = upstream::build_client(&config, Remote::Telegram)
                .expect("failed to build notification client");
            Some(Notifier::new(notify_http, telegram, config.notify_attempts))
        }
        None => {
            warn!("TELEGRAM_TOKEN or TELEGRAM_CHAT_ID missing, alerts are disabled");
            None
        }
    };

    info!(
        host = %config.host,
        port = config.port,
        indexer = %config.indexer.url,
        index_pattern = %config.index_pattern,
        "starting sentry backend"
    );

    let bind_addr = format!("{}:{}", config.host, config.port);
    let shared_state = web::Data::new(AppState {
        pool,
        indexer: IndexerClient::new(
            http.clone(),
            config.indexer.clone(),
            config.index_pattern.clone(),
        ),
        wazuh: WazuhClient::new(http, config.wazuh_api.clone()),
        notifier,
        alert_min_level: config.alert_min_level,
        debug_query: config.debug_query,
    });

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(Cors::permissive())
            .app_data(shared_state.clone())
            .configure(register)
    })
    .bind(bind_addr)?
    .run()
    .await
}
