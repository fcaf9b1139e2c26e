//! # Order Fetcher Module
//!
//! Reads the order history API with a bearer token obtained by
//! [`crate::session::SessionAuthenticator`]. Orders are kept as opaque JSON;
//! only [`crate::normalize`] looks inside them.

use log::{debug, info};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::Endpoints;
use crate::errors::{truncate_body, Error, Result};
use crate::session::HttpSession;

/// One order exactly as returned by the remote API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawOrder(pub Value);

impl RawOrder {
    fn str_at(&self, pointer: &str) -> Option<&str> {
        self.0.pointer(pointer).and_then(Value::as_str)
    }

    pub fn product_name(&self) -> Option<&str> {
        self.str_at("/product/name")
    }

    pub fn store_name(&self) -> Option<&str> {
        self.str_at("/store/name")
    }

    /// Total price as found in the payload, either a number or a string
    pub fn total_price(&self) -> Option<&Value> {
        self.0.pointer("/price/totalPrice")
    }

    /// Composite `"date / time"` string
    pub fn order_date(&self) -> Option<&str> {
        self.str_at("/orderDate")
    }

    pub fn status_text(&self) -> Option<&str> {
        self.str_at("/status/statusText")
    }
}

/// Top-level shape of the orders API response and of `orders_data.json`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrdersDocument {
    pub orders: Vec<RawOrder>,
}

/// Fetches order pages with an authenticated session
pub struct OrderFetcher<'a> {
    session: &'a HttpSession,
    endpoints: &'a Endpoints,
}

impl<'a> OrderFetcher<'a> {
    pub fn new(session: &'a HttpSession, endpoints: &'a Endpoints) -> Self {
        Self { session, endpoints }
    }

    /// Fetch a single page of orders
    pub async fn fetch_orders(
        &self,
        access_token: &str,
        page: u32,
        page_size: u32,
    ) -> Result<Vec<RawOrder>> {
        let site = self.endpoints.site_url.trim_end_matches('/');
        info!("Fetching orders page {page} (size {page_size})");

        let response = self
            .session
            .client()
            .get(self.endpoints.orders())
            .query(&[("page", page), ("pageSize", page_size)])
            .bearer_auth(access_token)
            .header(reqwest::header::ACCEPT, "application/json, text/plain, */*")
            .header(reqwest::header::ORIGIN, site)
            .header(reqwest::header::REFERER, format!("{site}/"))
            .send()
            .await
            .map_err(|e| Error::Fetch {
                status: None,
                body: e.to_string(),
            })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| Error::Fetch {
            status: Some(status.as_u16()),
            body: e.to_string(),
        })?;

        if !status.is_success() {
            return Err(Error::Fetch {
                status: Some(status.as_u16()),
                body: truncate_body(&text),
            });
        }

        let document: OrdersDocument = serde_json::from_str(&text).map_err(|e| Error::Fetch {
            status: Some(status.as_u16()),
            body: format!("malformed orders payload ({e}): {}", truncate_body(&text)),
        })?;

        debug!("Orders page {page} returned {} orders", document.orders.len());
        Ok(document.orders)
    }

    /// Walk pages from 1 until a short page or `max_pages` is reached
    pub async fn fetch_all(
        &self,
        access_token: &str,
        page_size: u32,
        max_pages: u32,
    ) -> Result<Vec<RawOrder>> {
        let mut orders = Vec::new();

        for page in 1..=max_pages.max(1) {
            let batch = self.fetch_orders(access_token, page, page_size).await?;
            let short_page = batch.len() < page_size as usize;
            orders.extend(batch);
            if short_page {
                break;
            }
        }

        info!("Fetched {} orders in total", orders.len());
        Ok(orders)
    }
}
