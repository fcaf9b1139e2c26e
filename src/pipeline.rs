//! # Refresh Pipeline Module
//!
//! Runs the full data refresh: authenticate, fetch, save the raw document,
//! normalize and write the CSV summary. Progress is reported to a
//! [`RefreshObserver`] so the chat front-end can post status messages and
//! the CLI can log them.

use std::path::PathBuf;

use async_trait::async_trait;
use log::{info, warn};

use crate::config::AppConfig;
use crate::errors::Result;
use crate::history::OrderStore;
use crate::normalize::{normalize, OrderRecord};
use crate::orders::OrderFetcher;
use crate::session::{HttpSession, LoginProgress, SessionAuthenticator};

/// Milestones of a refresh run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshStage {
    LoggingIn,
    TokenObtained,
    LoggedIn,
    Fetched { orders: usize },
    Saved { csv_path: PathBuf, records: usize },
}

/// Receives refresh progress
#[async_trait]
pub trait RefreshObserver: Send + Sync {
    async fn on_stage(&self, stage: RefreshStage);
}

/// Observer that only logs
pub struct LogObserver;

#[async_trait]
impl RefreshObserver for LogObserver {
    async fn on_stage(&self, stage: RefreshStage) {
        info!("Refresh stage: {stage:?}");
    }
}

/// Forwards the CSRF milestone of the login to a refresh observer
struct StageProgress<'a>(&'a dyn RefreshObserver);

#[async_trait]
impl<'a> LoginProgress for StageProgress<'a> {
    async fn csrf_obtained(&self) {
        self.0.on_stage(RefreshStage::TokenObtained).await;
    }
}

/// Result of a successful refresh
#[derive(Debug, Clone)]
pub struct RefreshReport {
    pub json_path: PathBuf,
    pub csv_path: PathBuf,
    pub records: Vec<OrderRecord>,
}

/// Log in, fetch fresh orders and rewrite both artifacts
pub async fn refresh_orders(
    config: &AppConfig,
    store: &OrderStore,
    observer: &dyn RefreshObserver,
) -> Result<RefreshReport> {
    let credentials = config.require_credentials()?;
    let session = HttpSession::new(&config.http)?;
    let authenticator =
        SessionAuthenticator::new(&session, &config.endpoints, config.fetch.login_fallback);

    observer.on_stage(RefreshStage::LoggingIn).await;
    let login = authenticator
        .authenticate_with_progress(credentials, &StageProgress(observer))
        .await;

    // Cookies are dumped whether or not the login succeeded
    let cookies = match &login {
        Ok(tokens) => tokens.cookies.clone(),
        Err(_) => session.cookies_for(&config.endpoints.site_url),
    };
    if let Err(e) = store.save_cookies(&cookies) {
        warn!("Could not save login cookies: {e}");
    }
    let tokens = login?;
    observer.on_stage(RefreshStage::LoggedIn).await;

    let fetcher = OrderFetcher::new(&session, &config.endpoints);
    let raw_orders = fetcher
        .fetch_all(&tokens.access_token, config.fetch.page_size, config.fetch.max_pages)
        .await?;
    let json_path = store.save_raw_orders(&raw_orders)?;
    observer
        .on_stage(RefreshStage::Fetched {
            orders: raw_orders.len(),
        })
        .await;

    let records = normalize(&raw_orders);
    let csv_path = store.write_records(&records)?;
    observer
        .on_stage(RefreshStage::Saved {
            csv_path: csv_path.clone(),
            records: records.len(),
        })
        .await;

    Ok(RefreshReport {
        json_path,
        csv_path,
        records,
    })
}

/// Rebuild the CSV summary from the saved raw document
pub fn reparse_orders(store: &OrderStore) -> Result<RefreshReport> {
    let raw_orders = store.load_raw_orders()?;
    let records = normalize(&raw_orders);
    let csv_path = store.write_records(&records)?;
    Ok(RefreshReport {
        json_path: store.orders_json_path(),
        csv_path,
        records,
    })
}
