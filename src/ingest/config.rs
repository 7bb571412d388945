// src/ingest/config.rs
//! Feed registry and reference-data loading.
//!
//! Lookup order follows the same convention everywhere:
//! 1) explicit env var path, 2) `config/<name>.toml` (feeds only),
//! 3) `config/<name>.json`, 4) embedded defaults.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::model::{Sector, Ticker};

pub const ENV_FEEDS_PATH: &str = "NEWS_FEEDS_PATH";
pub const ENV_TICKERS_PATH: &str = "NEWS_TICKERS_PATH";
pub const ENV_SECTORS_PATH: &str = "NEWS_SECTORS_PATH";

/// One configured feed source.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FeedSpec {
    pub key: String,
    pub name: String,
    pub url: String,
    pub category: String,
}

#[derive(Debug, Deserialize)]
struct FeedsFile {
    #[serde(default)]
    feeds: Vec<FeedSpec>,
}

/// Built-in registry of Indian financial news feeds, used when no
/// config file is present.
pub fn default_feeds() -> Vec<FeedSpec> {
    const DEFAULTS: &[(&str, &str, &str, &str)] = &[
        (
            "economic_times_markets",
            "Economic Times - Markets",
            "https://economictimes.indiatimes.com/markets/rssfeeds/1977021501.cms",
            "markets",
        ),
        (
            "economic_times_industry",
            "Economic Times - Industry",
            "https://economictimes.indiatimes.com/industry/rssfeeds/13352306.cms",
            "industry",
        ),
        (
            "business_standard_markets",
            "Business Standard - Markets",
            "https://www.business-standard.com/rss/markets-106.rss",
            "markets",
        ),
        (
            "livemint_markets",
            "LiveMint - Markets",
            "https://www.livemint.com/rss/markets",
            "markets",
        ),
        (
            "livemint_companies",
            "LiveMint - Companies",
            "https://www.livemint.com/rss/companies",
            "companies",
        ),
        (
            "moneycontrol_news",
            "MoneyControl - Latest News",
            "https://www.moneycontrol.com/rss/latestnews.xml",
            "general",
        ),
        (
            "the_hindu_markets",
            "The Hindu - Markets",
            "https://www.thehindu.com/business/markets/feeder/default.rss",
            "markets",
        ),
        (
            "toi_business",
            "Times of India - Business",
            "https://timesofindia.indiatimes.com/rssfeeds/1898055.cms",
            "business",
        ),
    ];
    DEFAULTS
        .iter()
        .map(|(key, name, url, category)| FeedSpec {
            key: (*key).to_string(),
            name: (*name).to_string(),
            url: (*url).to_string(),
            category: (*category).to_string(),
        })
        .collect()
}

/// Load the feed registry from an explicit path (TOML or JSON).
pub fn load_feeds_from(path: &Path) -> Result<Vec<FeedSpec>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading feeds from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    let feeds = if ext == "json" {
        serde_json::from_str::<Vec<FeedSpec>>(&content).context("parsing feeds json")?
    } else {
        toml::from_str::<FeedsFile>(&content)
            .context("parsing feeds toml")?
            .feeds
    };
    if feeds.is_empty() {
        return Err(anyhow!("feed registry at {} is empty", path.display()));
    }
    Ok(feeds)
}

/// Env var path, then config/feeds.toml, then config/feeds.json,
/// then the built-in registry.
pub fn load_feeds_default() -> Result<Vec<FeedSpec>> {
    if let Ok(p) = std::env::var(ENV_FEEDS_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return load_feeds_from(&pb);
        }
        return Err(anyhow!("{ENV_FEEDS_PATH} points to non-existent path"));
    }
    let toml_p = PathBuf::from("config/feeds.toml");
    if toml_p.exists() {
        return load_feeds_from(&toml_p);
    }
    let json_p = PathBuf::from("config/feeds.json");
    if json_p.exists() {
        return load_feeds_from(&json_p);
    }
    Ok(default_feeds())
}

/// Ticker reference rows from `config/tickers.json` (or env override).
/// Missing file just means no ticker matching until data is seeded.
pub fn load_tickers_default() -> Result<Vec<Ticker>> {
    let path = match std::env::var(ENV_TICKERS_PATH) {
        Ok(p) => PathBuf::from(p),
        Err(_) => PathBuf::from("config/tickers.json"),
    };
    if !path.exists() {
        return Ok(Vec::new());
    }
    let content = fs::read_to_string(&path)
        .with_context(|| format!("reading tickers from {}", path.display()))?;
    serde_json::from_str(&content).context("parsing tickers json")
}

/// Sector reference rows; embedded defaults cover the NSE sector map.
pub fn load_sectors_default() -> Result<Vec<Sector>> {
    let path = match std::env::var(ENV_SECTORS_PATH) {
        Ok(p) => PathBuf::from(p),
        Err(_) => PathBuf::from("config/sectors.json"),
    };
    if path.exists() {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("reading sectors from {}", path.display()))?;
        return serde_json::from_str(&content).context("parsing sectors json");
    }
    embedded_sectors()
}

fn embedded_sectors() -> Result<Vec<Sector>> {
    let raw = include_str!("../../config/default_sectors.json");
    serde_json::from_str(raw).context("parsing embedded sector defaults")
}
