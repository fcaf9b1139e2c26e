//! # Order History Store Module
//!
//! On-disk artifacts shared by the pipeline stages and both front-ends:
//! the raw orders document, the normalized CSV summary, the diagnostic
//! cookie dump and saved recommendation texts. Every write goes through a
//! temporary file in the same directory and is renamed into place, so a
//! reader never observes a half-written artifact.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use log::info;
use tempfile::NamedTempFile;

use crate::errors::{Error, Result};
use crate::normalize::OrderRecord;
use crate::orders::{OrdersDocument, RawOrder};

pub const ORDERS_JSON_FILE: &str = "orders_data.json";
pub const ORDERS_CSV_FILE: &str = "orders_summary.csv";
pub const COOKIES_FILE: &str = "login_cookies.json";
pub const TEMPLATE_RECOMMENDATION_FILE: &str = "food_recommendation.txt";
pub const EXTERNAL_RECOMMENDATION_FILE: &str = "claude_recommendation.txt";

/// Artifact directory handle
#[derive(Debug, Clone)]
pub struct OrderStore {
    dir: PathBuf,
}

impl OrderStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn orders_json_path(&self) -> PathBuf {
        self.dir.join(ORDERS_JSON_FILE)
    }

    pub fn orders_csv_path(&self) -> PathBuf {
        self.dir.join(ORDERS_CSV_FILE)
    }

    pub fn cookies_path(&self) -> PathBuf {
        self.dir.join(COOKIES_FILE)
    }

    pub fn has_history(&self) -> bool {
        self.orders_csv_path().is_file()
    }

    /// Save the raw orders as a pretty-printed `{"orders": [...]}` document
    pub fn save_raw_orders(&self, orders: &[RawOrder]) -> Result<PathBuf> {
        let document = OrdersDocument {
            orders: orders.to_vec(),
        };
        let path = self.orders_json_path();
        let bytes = serde_json::to_vec_pretty(&document)?;
        write_atomic(&path, &bytes)?;
        info!("Saved {} raw orders to {}", orders.len(), path.display());
        Ok(path)
    }

    /// Load the raw orders document
    pub fn load_raw_orders(&self) -> Result<Vec<RawOrder>> {
        let path = self.orders_json_path();
        let bytes = fs::read(&path).map_err(|e| Error::artifact(&path, e))?;
        let document: OrdersDocument = serde_json::from_slice(&bytes)?;
        Ok(document.orders)
    }

    /// Write normalized records to the CSV summary
    pub fn write_records(&self, records: &[OrderRecord]) -> Result<PathBuf> {
        let path = self.orders_csv_path();

        let mut writer = csv::Writer::from_writer(Vec::new());
        for record in records {
            writer.serialize(record)?;
        }
        // An empty record set still gets the header row
        if records.is_empty() {
            writer.write_record(CSV_HEADER)?;
        }
        let bytes = writer
            .into_inner()
            .map_err(|e| Error::artifact(&path, e.into_error()))?;

        write_atomic(&path, &bytes)?;
        info!("CSV file created successfully: {}", path.display());
        Ok(path)
    }

    /// Read every record from the CSV summary
    pub fn read_records(&self) -> Result<Vec<OrderRecord>> {
        self.read_records_limited(usize::MAX)
    }

    /// Read at most `limit` records from the CSV summary
    pub fn read_records_limited(&self, limit: usize) -> Result<Vec<OrderRecord>> {
        let path = self.orders_csv_path();
        if !path.is_file() {
            return Err(Error::MissingHistory { path });
        }

        let mut reader = csv::Reader::from_path(&path)?;
        let records = reader
            .deserialize::<OrderRecord>()
            .take(limit)
            .collect::<std::result::Result<Vec<_>, _>>()?;

        info!("Loaded {} orders from {}", records.len(), path.display());
        Ok(records)
    }

    /// Dump session cookies for diagnostic reuse
    pub fn save_cookies(&self, cookies: &BTreeMap<String, String>) -> Result<PathBuf> {
        let path = self.cookies_path();
        write_atomic(&path, &serde_json::to_vec_pretty(cookies)?)?;
        info!("Login cookies saved to {}", path.display());
        Ok(path)
    }

    /// Save a generated recommendation under the given file name
    pub fn save_recommendation(&self, file_name: &str, text: &str) -> Result<PathBuf> {
        let path = self.dir.join(file_name);
        write_atomic(&path, text.as_bytes())?;
        Ok(path)
    }
}

const CSV_HEADER: [&str; 7] = [
    "Item Name",
    "Restaurant Name",
    "Restaurant Location",
    "Date",
    "Time",
    "Price (TL)",
    "Status",
];

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir).map_err(|e| Error::artifact(dir, e))?;

    let mut temp = NamedTempFile::new_in(dir).map_err(|e| Error::artifact(dir, e))?;
    temp.write_all(bytes).map_err(|e| Error::artifact(path, e))?;
    temp.as_file().sync_all().map_err(|e| Error::artifact(path, e))?;
    temp.persist(path).map_err(|e| Error::artifact(path, e.error))?;
    Ok(())
}
