// src/ingest/rss.rs
//! RSS XML → raw entries, via quick-xml's serde deserializer.

use anyhow::{Context, Result};
use metrics::{counter, histogram};
use quick_xml::de::from_str;
use serde::Deserialize;

use crate::ingest::normalize::RawEntry;

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    item: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    description: Option<String>,
    summary: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    published: Option<String>,
    updated: Option<String>,
    author: Option<String>,
    #[serde(rename = "category", default)]
    category: Vec<String>,
    enclosure: Option<Enclosure>,
}

#[derive(Debug, Deserialize)]
struct Enclosure {
    #[serde(rename = "@url")]
    url: Option<String>,
}

/// Parse a feed document into raw entries. Entries keep their optional
/// fields as-is; validation happens in the normalizer.
pub fn parse_feed(body: &str) -> Result<Vec<RawEntry>> {
    let t0 = std::time::Instant::now();
    let xml_clean = scrub_html_entities_for_xml(body);
    let rss: Rss = from_str(&xml_clean).context("parsing rss xml")?;

    let out: Vec<RawEntry> = rss
        .channel
        .item
        .into_iter()
        .map(|it| RawEntry {
            title: it.title,
            link: it.link,
            summary: it.summary,
            description: it.description,
            published: it.published,
            pub_date: it.pub_date,
            updated: it.updated,
            author: it.author,
            image_url: it.enclosure.and_then(|e| e.url),
            tags: it.category,
        })
        .collect();

    let ms = t0.elapsed().as_secs_f64() * 1_000.0;
    histogram!("ingest_parse_ms").record(ms);
    counter!("ingest_events_total").increment(out.len() as u64);
    Ok(out)
}

fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>Example Markets</title>
    <item>
      <title>Sensex ends higher&nbsp;on bank rally</title>
      <link>https://news.example.com/a/1</link>
      <description>Benchmark indices closed in the green.</description>
      <pubDate>Sat, 15 Nov 2025 10:00:00 +0000</pubDate>
      <category>markets</category>
      <category>banking</category>
    </item>
    <item>
      <title>Broken entry without link</title>
    </item>
  </channel>
</rss>"#;

    #[test]
    fn parses_items_with_optional_fields() {
        let entries = parse_feed(SAMPLE).unwrap();
        assert_eq!(entries.len(), 2);

        let first = &entries[0];
        assert_eq!(first.link.as_deref(), Some("https://news.example.com/a/1"));
        assert_eq!(first.tags, vec!["markets", "banking"]);
        assert!(first.title.as_deref().unwrap().contains("Sensex"));
        assert!(entries[1].link.is_none());
    }

    #[test]
    fn invalid_xml_is_a_parse_error() {
        assert!(parse_feed("this is not xml").is_err());
    }

    #[test]
    fn empty_channel_yields_no_entries() {
        let xml = r#"<rss version="2.0"><channel><title>empty</title></channel></rss>"#;
        assert!(parse_feed(xml).unwrap().is_empty());
    }
}
