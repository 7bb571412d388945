// src/ingest/normalize.rs
//! Raw feed entries → canonical articles.
//!
//! Entries arrive with an open set of optional fields; the mapping to the
//! closed `NewArticle` schema is total, with explicit defaulting rules:
//! title+link required, summary falls back to title, dates try RFC-2822
//! then ISO-8601 then "now", and everything is normalized to UTC.

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use url::Url;

use crate::error::ExtractionError;
use crate::model::NewArticle;

/// One entry as parsed from a feed, before validation.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize, PartialEq)]
pub struct RawEntry {
    pub title: Option<String>,
    pub link: Option<String>,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub published: Option<String>,
    pub pub_date: Option<String>,
    pub updated: Option<String>,
    pub author: Option<String>,
    pub image_url: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Normalize text: decode HTML entities, strip tags, fold curly quotes,
/// collapse whitespace, trim trailing sentence punctuation, cap length.
pub fn normalize_text(s: &str) -> String {
    let mut out = html_escape::decode_html_entities(s).to_string();

    static RE_TAGS: once_cell::sync::OnceCell<regex::Regex> = once_cell::sync::OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").unwrap());
    out = re_tags.replace_all(&out, "").to_string();

    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    static RE_WS: once_cell::sync::OnceCell<regex::Regex> = once_cell::sync::OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").unwrap());
    out = re_ws.replace_all(&out, " ").to_string();
    out = out.trim().to_string();

    while let Some(last) = out.chars().last() {
        if matches!(last, '!' | '?' | '.' | ',') {
            out.pop();
        } else {
            break;
        }
    }

    // Length cap: 1500 chars
    if out.chars().count() > 1500 {
        out = out.chars().take(1500).collect();
    }

    out
}

/// Lighter cleanup for full article bodies: entity decode, tag strip,
/// whitespace collapse. No punctuation trim, no length cap.
pub fn strip_html(s: &str) -> String {
    let mut out = html_escape::decode_html_entities(s).to_string();

    static RE_TAGS: once_cell::sync::OnceCell<regex::Regex> = once_cell::sync::OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").unwrap());
    out = re_tags.replace_all(&out, " ").to_string();

    static RE_WS: once_cell::sync::OnceCell<regex::Regex> = once_cell::sync::OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").unwrap());
    re_ws.replace_all(&out, " ").trim().to_string()
}

/// Deterministic content fingerprint: sha256 hex of
/// `lowercase(title) + lowercase(summary)`.
pub fn content_fingerprint(title: &str, summary: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(title.to_lowercase().as_bytes());
    hasher.update(summary.to_lowercase().as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(64);
    for b in digest.iter() {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

/// Parse a feed timestamp: RFC-2822 first, then RFC-3339/ISO-8601.
/// Result is always UTC.
pub fn parse_feed_date(raw: &str) -> Option<DateTime<Utc>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(&trimmed.replace("Z", "+00:00")) {
        return Some(dt.with_timezone(&Utc));
    }
    None
}

/// Resolve a possibly relative or protocol-relative link against the
/// feed's own URL. Only http(s) results are accepted.
pub fn resolve_link(raw: &str, base: &str) -> Result<String, ExtractionError> {
    let joined = match Url::parse(raw) {
        Ok(u) => u,
        Err(_) => {
            let base_url = Url::parse(base).map_err(|e| ExtractionError::InvalidUrl {
                url: base.to_string(),
                reason: e.to_string(),
            })?;
            base_url
                .join(raw)
                .map_err(|e| ExtractionError::InvalidUrl {
                    url: raw.to_string(),
                    reason: e.to_string(),
                })?
        }
    };
    match joined.scheme() {
        "http" | "https" => Ok(joined.to_string()),
        other => Err(ExtractionError::InvalidUrl {
            url: raw.to_string(),
            reason: format!("unsupported scheme `{other}`"),
        }),
    }
}

/// Build a canonical article from a raw entry, or reject it.
pub fn normalize_entry(
    entry: RawEntry,
    source: &str,
    category: &str,
    feed_url: &str,
    now: DateTime<Utc>,
) -> Result<NewArticle, ExtractionError> {
    let title = normalize_text(entry.title.as_deref().unwrap_or_default());
    if title.is_empty() {
        return Err(ExtractionError::MissingField("title"));
    }

    let link = entry
        .link
        .as_deref()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .ok_or(ExtractionError::MissingField("link"))?;
    let url = resolve_link(link, feed_url)?;

    let mut summary = normalize_text(
        entry
            .summary
            .as_deref()
            .or(entry.description.as_deref())
            .unwrap_or_default(),
    );
    if summary.is_empty() {
        summary = title.clone();
    }

    // First present field wins; total parse failure falls back to `now`.
    let published_at = [&entry.published, &entry.pub_date, &entry.updated]
        .into_iter()
        .flatten()
        .find_map(|raw| parse_feed_date(raw))
        .unwrap_or(now);

    let content_hash = content_fingerprint(&title, &summary);

    Ok(NewArticle {
        title,
        summary,
        url,
        published_at,
        source: source.to_string(),
        content_hash,
        author: entry.author.filter(|a| !a.trim().is_empty()),
        image_url: entry.image_url.filter(|u| !u.trim().is_empty()),
        tags: entry.tags,
        category: category.to_string(),
    })
}
