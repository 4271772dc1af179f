// src/sheets/google.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::Value;
use std::path::Path;
use tracing::{debug, info, instrument};
use url::Url;
use yup_oauth2::{
    authenticator::DefaultAuthenticator, read_service_account_key, ServiceAccountAuthenticator,
};

use super::{spreadsheet_id, SheetError, SheetSource};
use crate::process::RawRow;

const API_BASE: &str = "https://sheets.googleapis.com/v4/spreadsheets";

static SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/spreadsheets.readonly",
    "https://www.googleapis.com/auth/drive.readonly",
];

#[derive(Debug, Deserialize)]
struct SpreadsheetMeta {
    #[serde(default)]
    sheets: Vec<SheetMeta>,
}

#[derive(Debug, Deserialize)]
struct SheetMeta {
    properties: SheetProperties,
}

#[derive(Debug, Deserialize)]
struct SheetProperties {
    title: String,
    #[serde(default)]
    index: u32,
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// Google Sheets v4 reader, authenticated once with a service-account key.
///
/// The authenticator keeps the access token and refreshes it on expiry, so
/// every sheet read in a run shares the same credentials.
pub struct GoogleSheets {
    client: Client,
    auth: DefaultAuthenticator,
}

impl GoogleSheets {
    #[instrument(level = "info", skip(client, key_path), fields(key = %key_path.as_ref().display()))]
    pub async fn from_key_file(client: Client, key_path: impl AsRef<Path>) -> Result<Self> {
        let key_path = key_path.as_ref();
        let key = read_service_account_key(key_path)
            .await
            .with_context(|| format!("reading service account key {}", key_path.display()))?;
        let auth = ServiceAccountAuthenticator::builder(key)
            .build()
            .await
            .context("building service account authenticator")?;
        info!("spreadsheet client ready");
        Ok(Self { client, auth })
    }

    async fn bearer(&self) -> Result<String, SheetError> {
        let token = self
            .auth
            .token(SCOPES)
            .await
            .map_err(|e| SheetError::Auth(e.to_string()))?;
        token
            .token()
            .map(str::to_string)
            .ok_or_else(|| SheetError::Auth("empty access token".into()))
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        debug!(%url, "GET");
        let resp = self
            .client
            .get(url.clone())
            .bearer_auth(self.bearer().await?)
            .send()
            .await
            .with_context(|| format!("GET {} failed", url))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorBody>(&body)
                .map(|b| b.error.message)
                .unwrap_or(body);
            return Err(SheetError::Api {
                status: status.as_u16(),
                message,
            }
            .into());
        }

        resp.json::<T>()
            .await
            .with_context(|| format!("decoding response from {}", url))
    }

    fn endpoint(id: &str, tail: &[&str]) -> Result<Url> {
        let mut url = Url::parse(API_BASE)?;
        url.path_segments_mut()
            .map_err(|_| anyhow::anyhow!("API base cannot be a base URL"))?
            .push(id)
            .extend(tail);
        Ok(url)
    }

    async fn first_sheet_title(&self, id: &str) -> Result<String> {
        let mut url = Self::endpoint(id, &[])?;
        url.query_pairs_mut()
            .append_pair("fields", "sheets.properties(title,index)");
        let meta: SpreadsheetMeta = self.get_json(url).await?;
        meta.sheets
            .into_iter()
            .map(|s| s.properties)
            .min_by_key(|p| p.index)
            .map(|p| p.title)
            .ok_or_else(|| SheetError::NoSheets(id.to_string()).into())
    }
}

/// A1 range covering a whole sheet; titles are always quoted.
fn whole_sheet_range(title: &str) -> String {
    format!("'{}'", title.replace('\'', "''"))
}

fn cell_text(v: Value) -> String {
    match v {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[async_trait]
impl SheetSource for GoogleSheets {
    #[instrument(level = "debug", skip(self))]
    async fn read_first_sheet(&self, url: &str) -> Result<Vec<RawRow>> {
        let id = spreadsheet_id(url)?;
        let title = self.first_sheet_title(id).await?;

        let range = whole_sheet_range(&title);
        let mut values_url = Self::endpoint(id, &["values", &range])?;
        values_url
            .query_pairs_mut()
            .append_pair("majorDimension", "ROWS")
            .append_pair("valueRenderOption", "FORMATTED_VALUE");

        let body: ValueRange = self.get_json(values_url).await?;
        let rows: Vec<RawRow> = body
            .values
            .into_iter()
            .map(|row| row.into_iter().map(cell_text).collect())
            .collect();
        debug!(sheet = %title, rows = rows.len(), "read sheet");
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_quotes_titles() {
        assert_eq!(whole_sheet_range("Feuille 1"), "'Feuille 1'");
        assert_eq!(whole_sheet_range("L'équipe"), "'L''équipe'");
    }

    #[test]
    fn endpoint_encodes_segments() {
        let url = GoogleSheets::endpoint("abc", &["values", "'Feuille 1'"]).unwrap();
        assert_eq!(
            url.as_str(),
            "https://sheets.googleapis.com/v4/spreadsheets/abc/values/'Feuille%201'"
        );
    }

    #[test]
    fn value_range_decodes_mixed_cells() {
        let body: ValueRange =
            serde_json::from_str(r#"{"range":"A1:C2","values":[["a",1,true],["b"]]}"#).unwrap();
        let rows: Vec<RawRow> = body
            .values
            .into_iter()
            .map(|r| r.into_iter().map(cell_text).collect())
            .collect();
        assert_eq!(rows, vec![vec!["a", "1", "true"], vec!["b"]]);

        let empty: ValueRange = serde_json::from_str(r#"{"range":"A1"}"#).unwrap();
        assert!(empty.values.is_empty());
    }

    #[test]
    fn api_error_message_is_extracted() {
        let body = r#"{"error":{"code":429,"message":"Quota exceeded","status":"RESOURCE_EXHAUSTED"}}"#;
        let parsed: ApiErrorBody = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.error.message, "Quota exceeded");
    }
}
