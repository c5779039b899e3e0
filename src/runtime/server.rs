//! Server mode
//!
//! Builds the storage backend and the shortener, then serves HTTP until
//! SIGINT/SIGTERM. actix-web installs the signal handlers and stops gracefully;
//! the backend is closed afterwards.

use std::sync::Arc;
use std::time::Duration;

use actix_web::{App, HttpServer, middleware::Compress, web};
use anyhow::{Context, Result};
use tracing::{info, warn};

use super::shutdown::close_shortener;
use crate::api::{self, AppState};
use crate::config::StaticConfig;
use crate::services::{ShortenerOptions, UrlShortener};
use crate::storage::StorageFactory;

pub async fn run_server(config: Arc<StaticConfig>) -> Result<()> {
    let storage = match StorageFactory::create(&config).await {
        Ok(storage) => storage,
        Err(e) => {
            eprintln!("{}", e.format_colored());
            return Err(e).context("failed to initialize storage");
        }
    };
    info!("Using storage backend: {}", storage.backend_name());

    let shortener = Arc::new(UrlShortener::new(
        storage,
        ShortenerOptions::from_config(&config),
    ));

    let state = match AppState::from_config(shortener.clone(), &config.server) {
        Ok(state) => state,
        Err(e) => {
            close_shortener(&shortener).await;
            return Err(e).context("invalid server configuration");
        }
    };
    if state.trusted_subnet().is_none() {
        info!("Trusted subnet not configured, /api/internal/stats is disabled");
    }

    let bind_address = config.server.address.clone();
    let server = HttpServer::new(move || {
        App::new()
            .wrap(Compress::default())
            .app_data(web::Data::new(state.clone()))
            .configure(api::configure)
    })
    .keep_alive(Duration::from_secs(30))
    .bind(&bind_address);

    let server = match server {
        Ok(server) => server,
        Err(e) => {
            close_shortener(&shortener).await;
            return Err(e).with_context(|| format!("failed to bind {}", bind_address));
        }
    };

    warn!("Starting server at http://{}", bind_address);
    let served = server.run().await;

    close_shortener(&shortener).await;
    served.context("HTTP server error")
}
