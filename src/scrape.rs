//! Batch URL scraping with best-effort HTML text extraction.
//!
//! Fetches are fanned out in parallel, each bounded by the configured
//! timeout; a slow or failing fetch reports failure for its own URL and
//! never blocks or fails the rest of the batch. Extraction is tag-soup
//! tolerant: it walks the markup as a stream of events, drops script and
//! style content, and stops at the first unrecoverable parse error,
//! keeping whatever text was already collected.

use anyhow::{Context, Result};
use serde::Serialize;
use std::time::Duration;
use tokio::task::JoinSet;

use crate::config::ScrapeConfig;

/// Tags whose text content is never prose.
const SKIPPED_TAGS: &[&[u8]] = &[b"script", b"style", b"noscript", b"svg", b"template"];

/// Tags that imply a line break between text runs.
const BLOCK_TAGS: &[&[u8]] = &[
    b"p", b"div", b"br", b"li", b"ul", b"ol", b"tr", b"table", b"section", b"article",
    b"header", b"footer", b"blockquote", b"pre", b"h1", b"h2", b"h3", b"h4", b"h5", b"h6",
];

/// Per-URL scrape outcome. One entry per requested URL, in request order.
#[derive(Debug, Clone, Serialize)]
pub struct ScrapeResult {
    pub url: String,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ScrapeResult {
    fn failure(url: String, status: Option<u16>, error: impl Into<String>) -> Self {
        Self {
            url,
            ok: false,
            status,
            text: None,
            error: Some(error.into()),
        }
    }
}

/// Deduplicate (order-preserving) and cap the requested URL batch.
pub fn prepare_urls(urls: &[String], max_urls: usize) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    urls.iter()
        .map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty())
        .filter(|u| seen.insert(u.clone()))
        .take(max_urls)
        .collect()
}

/// Fetch every URL in the batch concurrently and extract plain text from
/// each successful response.
pub async fn scrape_urls(config: &ScrapeConfig, urls: &[String]) -> Result<Vec<ScrapeResult>> {
    let targets = prepare_urls(urls, config.max_urls);

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()
        .context("Failed to build scrape HTTP client")?;

    let mut tasks = JoinSet::new();
    for (idx, url) in targets.iter().cloned().enumerate() {
        let client = client.clone();
        let max_text_bytes = config.max_text_bytes;
        tasks.spawn(async move { (idx, fetch_one(&client, &url, max_text_bytes).await) });
    }

    let mut slots: Vec<Option<ScrapeResult>> = targets.iter().map(|_| None).collect();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((idx, result)) => slots[idx] = Some(result),
            Err(e) => eprintln!("Warning: scrape task aborted: {}", e),
        }
    }

    Ok(slots
        .into_iter()
        .zip(targets)
        .map(|(slot, url)| {
            slot.unwrap_or_else(|| ScrapeResult::failure(url, None, "fetch task aborted"))
        })
        .collect())
}

async fn fetch_one(client: &reqwest::Client, url: &str, max_text_bytes: usize) -> ScrapeResult {
    let response = match client.get(url).send().await {
        Ok(r) => r,
        // Covers unparseable URLs, DNS failures, and timeouts alike
        Err(e) => return ScrapeResult::failure(url.to_string(), None, e.to_string()),
    };

    let status = response.status();
    if !status.is_success() {
        return ScrapeResult::failure(
            url.to_string(),
            Some(status.as_u16()),
            format!("HTTP {}", status),
        );
    }

    let body = match response.text().await {
        Ok(b) => b,
        Err(e) => {
            return ScrapeResult::failure(url.to_string(), Some(status.as_u16()), e.to_string())
        }
    };

    let mut text = html_to_text(&body);
    truncate_on_char_boundary(&mut text, max_text_bytes);

    ScrapeResult {
        url: url.to_string(),
        ok: true,
        status: Some(status.as_u16()),
        text: Some(text),
        error: None,
    }
}

/// Best-effort plain-text extraction from HTML.
///
/// Walks the markup as a stream of events with end-name checking off so
/// unbalanced tags (void elements, hand-written pages) pass through.
/// Script/style subtrees are dropped, block-level boundaries become
/// newlines, and a parse error ends extraction with the text collected so
/// far.
pub fn html_to_text(html: &str) -> String {
    let mut reader = quick_xml::Reader::from_reader(html.as_bytes());
    reader.config_mut().trim_text(true);
    reader.config_mut().check_end_names = false;

    let mut out = String::new();
    let mut skip_depth = 0usize;
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Start(e)) => {
                let name = e.local_name().as_ref().to_ascii_lowercase();
                if SKIPPED_TAGS.contains(&name.as_slice()) {
                    skip_depth += 1;
                } else if skip_depth == 0 && BLOCK_TAGS.contains(&name.as_slice()) {
                    push_break(&mut out);
                }
            }
            Ok(quick_xml::events::Event::Empty(e)) => {
                let name = e.local_name().as_ref().to_ascii_lowercase();
                if skip_depth == 0 && BLOCK_TAGS.contains(&name.as_slice()) {
                    push_break(&mut out);
                }
            }
            Ok(quick_xml::events::Event::End(e)) => {
                let name = e.local_name().as_ref().to_ascii_lowercase();
                if SKIPPED_TAGS.contains(&name.as_slice()) {
                    skip_depth = skip_depth.saturating_sub(1);
                } else if skip_depth == 0 && BLOCK_TAGS.contains(&name.as_slice()) {
                    push_break(&mut out);
                }
            }
            Ok(quick_xml::events::Event::Text(t)) if skip_depth == 0 => {
                let fragment = match t.unescape() {
                    Ok(cow) => cow.into_owned(),
                    // Bare ampersands and HTML-only entities: keep the raw bytes
                    Err(_) => String::from_utf8_lossy(&t).into_owned(),
                };
                push_text(&mut out, &fragment);
            }
            Ok(quick_xml::events::Event::Eof) => break,
            Err(_) => break,
            _ => {}
        }
        buf.clear();
    }
    out.trim().to_string()
}

fn push_break(out: &mut String) {
    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
}

fn push_text(out: &mut String, fragment: &str) {
    let fragment = fragment.trim();
    if fragment.is_empty() {
        return;
    }
    if !out.is_empty() && !out.ends_with('\n') {
        out.push(' ');
    }
    out.push_str(fragment);
}

fn truncate_on_char_boundary(text: &mut String, max_bytes: usize) {
    if text.len() <= max_bytes {
        return;
    }
    let mut cut = max_bytes;
    while cut > 0 && !text.is_char_boundary(cut) {
        cut -= 1;
    }
    text.truncate(cut);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_html_to_text_extracts_prose() {
        let html = "<html><body><h1>Title</h1><p>First para.</p><p>Second para.</p></body></html>";
        let text = html_to_text(html);
        assert_eq!(text, "Title\nFirst para.\nSecond para.");
    }

    #[test]
    fn test_html_to_text_drops_script_and_style() {
        let html = concat!(
            "<body><style>.x { color: red }</style>",
            "<script>var a = 1;</script>",
            "<p>Visible</p></body>"
        );
        let text = html_to_text(html);
        assert_eq!(text, "Visible");
    }

    #[test]
    fn test_html_to_text_unescapes_entities() {
        let text = html_to_text("<p>Fish &amp; chips</p>");
        assert_eq!(text, "Fish & chips");
    }

    #[test]
    fn test_html_to_text_tolerates_unclosed_tags() {
        let text = html_to_text("<p>One<br>Two");
        assert!(text.contains("One"));
        assert!(text.contains("Two"));
    }

    #[test]
    fn test_html_to_text_inline_tags_join_with_space() {
        let text = html_to_text("<p>Read the <a href=\"/docs\">manual</a> first</p>");
        assert_eq!(text, "Read the manual first");
    }

    #[test]
    fn test_prepare_urls_dedups_preserving_order() {
        let urls = vec![
            "https://a.example".to_string(),
            "https://b.example".to_string(),
            "https://a.example".to_string(),
        ];
        assert_eq!(
            prepare_urls(&urls, 10),
            vec!["https://a.example".to_string(), "https://b.example".to_string()]
        );
    }

    #[test]
    fn test_prepare_urls_caps_batch() {
        let urls: Vec<String> = (0..20).map(|i| format!("https://h{}.example", i)).collect();
        assert_eq!(prepare_urls(&urls, 10).len(), 10);
    }

    #[test]
    fn test_prepare_urls_drops_blank_entries() {
        let urls = vec!["  ".to_string(), "https://a.example".to_string()];
        assert_eq!(prepare_urls(&urls, 10), vec!["https://a.example".to_string()]);
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        let mut text = "héllo".to_string();
        truncate_on_char_boundary(&mut text, 2);
        assert_eq!(text, "h");
    }
}
