// src/fetch/links.rs
use anyhow::{Context, Result};
use reqwest::Client;
use scraper::{Html, Selector};
use tracing::{debug, info, instrument};
use url::Url;

/// Every `href` in `html` that contains `pattern`, in document order.
pub fn extract_links(html: &str, pattern: &str) -> Vec<String> {
    let selector = Selector::parse("a[href]").expect("CSS selector for links should be valid");
    Html::parse_document(html)
        .select(&selector)
        .filter_map(|e| e.value().attr("href"))
        .filter(|href| href.contains(pattern))
        .map(str::to_string)
        .collect()
}

/// Fetch `page_url` and return the spreadsheet links it contains.
///
/// No retry: a failure here aborts the run before any sheet is touched.
#[instrument(level = "info", skip(client))]
pub async fn discover_sheet_links(
    client: &Client,
    page_url: &str,
    pattern: &str,
) -> Result<Vec<String>> {
    let url = Url::parse(page_url).with_context(|| format!("parsing page URL {}", page_url))?;
    let html = client
        .get(url.clone())
        .send()
        .await
        .with_context(|| format!("GET {}", url))?
        .error_for_status()
        .with_context(|| format!("Non-success status {}", url))?
        .text()
        .await
        .with_context(|| format!("reading body from {}", url))?;
    debug!(bytes = html.len(), "fetched page");

    let links = extract_links(&html, pattern);
    info!(count = links.len(), "discovered spreadsheet links");
    Ok(links)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<html><body>
        <p>Listes des étudiants</p>
        <a href="https://docs.google.com/spreadsheets/d/AAA/edit#gid=0">L1 MI</a>
        <a href="https://example.org/about">About</a>
        <a>no target</a>
        <ul>
          <li><a href="https://docs.google.com/spreadsheets/d/BBB/edit">L2 ISIL</a></li>
          <li><a href="https://drive.google.com/file/d/CCC">PDF</a></li>
        </ul>
        <a href="https://docs.google.com/spreadsheets/d/AAA/edit#gid=0">L1 MI (again)</a>
    </body></html>"#;

    #[test]
    fn keeps_matching_links_in_order() {
        let links = extract_links(PAGE, "docs.google.com/spreadsheets");
        assert_eq!(
            links,
            vec![
                "https://docs.google.com/spreadsheets/d/AAA/edit#gid=0",
                "https://docs.google.com/spreadsheets/d/BBB/edit",
                "https://docs.google.com/spreadsheets/d/AAA/edit#gid=0",
            ]
        );
    }

    #[test]
    fn no_matches_is_empty() {
        assert!(extract_links(PAGE, "sharepoint.com").is_empty());
        assert!(extract_links("", "docs.google.com").is_empty());
    }
}
