//! # Page scraping
//!
//! Fetches a web page and boils it down to plain text ready for embedding:
//! script/style/noscript elements are dropped, the remaining text nodes are
//! concatenated, runs of whitespace collapse to single spaces, and the result
//! is split into fixed-size character chunks.
//!
//! This is best-effort extraction — no readability heuristics, no boilerplate
//! removal beyond the non-content tags. The original page markup is not kept.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use std::error::Error;
use tracing::debug;

static NON_CONTENT: Lazy<Selector> =
    Lazy::new(|| Selector::parse("script, style, noscript").expect("valid selector"));

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Fetch a URL and return the response body.
///
/// # Errors
/// Fails on connection errors and non-success HTTP statuses.
pub async fn fetch(url: &str) -> Result<String, Box<dyn Error>> {
    debug!("Fetching {url}");
    let response = reqwest::get(url).await?.error_for_status()?;
    Ok(response.text().await?)
}

/// Extract the visible text of an HTML document.
///
/// Non-content elements (`script`, `style`, `noscript`) are detached before
/// text extraction, and all whitespace runs are collapsed to single spaces.
pub fn extract_text(html: &str) -> String {
    let mut document = Html::parse_document(html);

    let non_content: Vec<_> = document
        .select(&NON_CONTENT)
        .map(|element| element.id())
        .collect();
    for node_id in non_content {
        if let Some(mut node) = document.tree.get_mut(node_id) {
            node.detach();
        }
    }

    let text: String = document
        .root_element()
        .text()
        .collect::<Vec<_>>()
        .join(" ");
    WHITESPACE.replace_all(&text, " ").trim().to_string()
}

/// Split text into chunks of at most `size` characters, in order.
///
/// Splits on character boundaries only — chunk edges may fall mid-word, as
/// the chunks are embedding fodder rather than display text.
pub fn chunk_text(text: &str, size: usize) -> Vec<String> {
    if text.is_empty() || size == 0 {
        return Vec::new();
    }
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(size)
        .map(|chunk| chunk.iter().collect())
        .collect()
}
