mod config;
mod db;
mod frame;
mod rate_limit;
mod routes;
mod services;
mod state;

use tracing_subscriber::EnvFilter;

use crate::services::mailer::Mailer;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = config::AppConfig::from_env().expect("invalid configuration");

    let pool = db::init_pool(&config.database_url)
        .await
        .expect("database init failed");

    // Mail is optional: without it, access codes are only logged at debug level.
    let mailer = match config.mail.clone() {
        Some(mail) => {
            tracing::info!(from = %mail.from, "mail delivery enabled");
            Some(Mailer::new(mail, config.app_base_url.clone()))
        }
        None => {
            tracing::warn!("RESEND_API_KEY not set, mail delivery disabled");
            None
        }
    };

    let state = state::AppState::new(pool, mailer, config.cookie_secure);

    let _sweeper = services::sweeper::spawn_sweeper(state.clone());

    let app = routes::app(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port))
        .await
        .expect("failed to bind");

    tracing::info!(port = config.port, "focusboard listening");
    axum::serve(listener, app).await.expect("server failed");
}
