// src/main.rs -----------------------------------------------------------------
mod calendar;
mod config;
mod credentials;
mod engine;
mod error;
mod generation;
mod google;
mod mail;
mod models;
mod normalize;
mod oauth;
mod prompt;
mod routes;

use std::sync::Arc;

use anyhow::Context;
use axum::Server;
use tracing_subscriber::EnvFilter;

use calendar::GoogleCalendar;
use config::Config;
use credentials::{CredentialFile, CredentialStore};
use engine::TodoEngine;
use generation::ChatGenerator;
use mail::GmailSource;
use oauth::GoogleOAuth;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // ── 1. configuration ───────────────────────────────────────────────
    let config = Config::load().context("loading configuration")?;

    // ── 2. wire components ─────────────────────────────────────────────
    let client = google::https_client();
    let credentials = CredentialStore::new(
        CredentialFile::new(&config.auth.token_path),
        Arc::new(GoogleOAuth::new(client.clone(), &config.auth)),
        config.auth.scopes.clone(),
    );
    let engine = TodoEngine {
        credentials,
        mail:        Arc::new(GmailSource::new(client.clone(), &config.mail)),
        calendar:    Arc::new(GoogleCalendar::new(client, &config.calendar)),
        generator:   Arc::new(ChatGenerator::new(&config.generation)),
        mail_limit:  config.mail.max_results,
        event_limit: config.calendar.max_results,
    };

    // ── 3. serve ───────────────────────────────────────────────────────
    let app = routes::router(Arc::new(engine));
    tracing::info!(addr = %config.listen, "serving GET /todos");
    Server::bind(&config.listen)
        .serve(app.into_make_service())
        .await
        .context("http server failed")?;

    Ok(())
}
