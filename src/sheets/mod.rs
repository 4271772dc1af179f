// src/sheets/mod.rs

use anyhow::Result;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

use crate::process::RawRow;

pub mod google;

pub use google::GoogleSheets;

#[derive(Debug, Error)]
pub enum SheetError {
    #[error("not a spreadsheet URL: {0}")]
    InvalidUrl(String),
    #[error("spreadsheet API returned {status}: {message}")]
    Api { status: u16, message: String },
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("spreadsheet {0} has no sheets")]
    NoSheets(String),
}

/// Anything that can hand back the cells of a spreadsheet's first sheet.
#[async_trait]
pub trait SheetSource: Send + Sync {
    async fn read_first_sheet(&self, url: &str) -> Result<Vec<RawRow>>;
}

static SHEET_ID_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"/spreadsheets/(?:u/\d+/)?d/([A-Za-z0-9_-]+)").expect("sheet id regex")
});

/// Pull the document id out of a `docs.google.com/spreadsheets[/u/N]/d/<id>/...` URL.
pub fn spreadsheet_id(url: &str) -> Result<&str, SheetError> {
    SHEET_ID_RE
        .captures(url)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .ok_or_else(|| SheetError::InvalidUrl(url.to_string()))
}
