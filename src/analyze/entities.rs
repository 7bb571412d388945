// src/analyze/entities.rs
//! Ticker and sector recognition.
//!
//! Ticker matching runs three tiers, each only adding symbols the earlier
//! tiers missed: exact uppercase symbol tokens, company-name variants
//! (canonical name, legal-suffix-stripped form, distinctive lead word,
//! initialism, configured aliases), and fuzzy sliding-window phrases.

use std::collections::{HashMap, HashSet};

use once_cell::sync::OnceCell;
use regex::Regex;
use serde::Serialize;

use crate::model::{Sector, Ticker};

/// Recognition knobs; thresholds are tunable, not constants.
#[derive(Debug, Clone, Copy)]
pub struct RecognizerConfig {
    /// Minimum similarity for the fuzzy tier.
    pub fuzzy_threshold: f64,
    /// Longest sliding window, in words.
    pub max_window: usize,
    /// Phrases and variants shorter than this are skipped in fuzzy matching.
    pub min_phrase_len: usize,
}

impl Default for RecognizerConfig {
    fn default() -> Self {
        Self {
            fuzzy_threshold: 0.85,
            max_window: 4,
            min_phrase_len: 4,
        }
    }
}

/// Which tier produced a match; earlier tiers are higher confidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchTier {
    ExactSymbol,
    CompanyName,
    Fuzzy,
}

#[derive(Debug, Clone, Serialize)]
pub struct TickerMatch {
    pub symbol: String,
    pub name: String,
    pub tier: MatchTier,
    /// Present only for fuzzy matches.
    pub similarity: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RecognizedEntities {
    pub tickers: Vec<TickerMatch>,
    pub sectors: Vec<String>,
}

impl RecognizedEntities {
    pub fn ticker_symbols(&self) -> Vec<String> {
        self.tickers.iter().map(|t| t.symbol.clone()).collect()
    }
}

fn symbol_token_re() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"\b[A-Z]{2,10}\b").unwrap())
}

fn legal_suffix_re() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\s+(ltd|limited|pvt|private|corporation|corp|inc|company)\.?\s*$").unwrap()
    })
}

pub struct TickerRecognizer {
    by_symbol: HashMap<String, Ticker>,
    /// Lowercase variant → symbol. Single-word variants are matched on
    /// word boundaries, multi-word ones by substring.
    variants: Vec<(String, String)>,
    config: RecognizerConfig,
}

impl TickerRecognizer {
    pub fn new(tickers: &[Ticker]) -> Self {
        Self::with_config(tickers, RecognizerConfig::default())
    }

    pub fn with_config(tickers: &[Ticker], config: RecognizerConfig) -> Self {
        let mut by_symbol = HashMap::new();
        let mut variants: Vec<(String, String)> = Vec::new();

        for t in tickers {
            by_symbol.insert(t.symbol.clone(), t.clone());
            for v in company_variants(t) {
                variants.push((v, t.symbol.clone()));
            }
        }
        variants.sort();
        variants.dedup();

        Self {
            by_symbol,
            variants,
            config,
        }
    }

    /// Run all three tiers over `text`, collapsing duplicate symbols to
    /// the highest-confidence tier.
    pub fn find_tickers(&self, text: &str) -> Vec<TickerMatch> {
        let mut found: Vec<TickerMatch> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        let text_lower = text.to_lowercase();

        // Tier 1: exact uppercase symbol tokens.
        for m in symbol_token_re().find_iter(text) {
            if let Some(t) = self.by_symbol.get(m.as_str()) {
                if seen.insert(t.symbol.clone()) {
                    found.push(TickerMatch {
                        symbol: t.symbol.clone(),
                        name: t.name.clone(),
                        tier: MatchTier::ExactSymbol,
                        similarity: None,
                    });
                }
            }
        }

        // Tier 2: company-name variants.
        let words: Vec<&str> = text_lower
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .collect();
        for (variant, symbol) in &self.variants {
            if seen.contains(symbol) {
                continue;
            }
            let hit = if variant.contains(' ') {
                text_lower.contains(variant.as_str())
            } else {
                words.iter().any(|w| w == variant)
            };
            if hit {
                if let Some(t) = self.by_symbol.get(symbol) {
                    seen.insert(symbol.clone());
                    found.push(TickerMatch {
                        symbol: t.symbol.clone(),
                        name: t.name.clone(),
                        tier: MatchTier::CompanyName,
                        similarity: None,
                    });
                }
            }
        }

        // Tier 3: fuzzy phrase windows.
        for window in 1..=self.config.max_window {
            if words.len() < window {
                break;
            }
            for start in 0..=(words.len() - window) {
                let phrase = words[start..start + window].join(" ");
                if phrase.len() < self.config.min_phrase_len {
                    continue;
                }
                for (variant, symbol) in &self.variants {
                    if variant.len() < self.config.min_phrase_len || seen.contains(symbol) {
                        continue;
                    }
                    let similarity = strsim::normalized_levenshtein(&phrase, variant);
                    if similarity >= self.config.fuzzy_threshold {
                        if let Some(t) = self.by_symbol.get(symbol) {
                            seen.insert(symbol.clone());
                            found.push(TickerMatch {
                                symbol: t.symbol.clone(),
                                name: t.name.clone(),
                                tier: MatchTier::Fuzzy,
                                similarity: Some(similarity),
                            });
                        }
                    }
                }
            }
        }

        found
    }
}

/// Searchable lowercase variants for one company.
fn company_variants(t: &Ticker) -> Vec<String> {
    let mut out = Vec::new();
    let name_lower = t.name.trim().to_lowercase();
    if !name_lower.is_empty() {
        out.push(name_lower.clone());
    }

    let stripped = legal_suffix_re().replace(t.name.trim(), "").to_string();
    let stripped_lower = stripped.trim().to_lowercase();
    if !stripped_lower.is_empty() && stripped_lower != name_lower {
        out.push(stripped_lower.clone());
    }

    let words: Vec<&str> = stripped_lower.split_whitespace().collect();
    if words.len() > 1 {
        // Distinctive lead word: lets "Reliance Industries Ltd" match a
        // bare "Reliance" mention without drowning in short generics.
        if words[0].len() >= 5 {
            out.push(words[0].to_string());
        }
        let initialism: String = words.iter().filter_map(|w| w.chars().next()).collect();
        if initialism.len() >= 3 {
            out.push(initialism);
        }
    }

    for alias in &t.aliases {
        let a = alias.trim().to_lowercase();
        if !a.is_empty() {
            out.push(a);
        }
    }

    out.retain(|v| v.len() >= 3);
    out.sort();
    out.dedup();
    out
}

pub struct SectorMatcher {
    sectors: Vec<Sector>,
}

impl SectorMatcher {
    pub fn new(sectors: &[Sector]) -> Self {
        Self {
            sectors: sectors.to_vec(),
        }
    }

    /// A sector is included once any one of its keywords appears.
    pub fn find_sectors(&self, text: &str) -> Vec<String> {
        let text_lower = text.to_lowercase();
        self.sectors
            .iter()
            .filter(|s| {
                s.keywords
                    .iter()
                    .any(|k| !k.is_empty() && text_lower.contains(&k.to_lowercase()))
            })
            .map(|s| s.name.clone())
            .collect()
    }
}

/// Convenience wrapper combining both matchers.
pub struct EntityRecognizer {
    tickers: TickerRecognizer,
    sectors: SectorMatcher,
}

impl EntityRecognizer {
    pub fn new(tickers: &[Ticker], sectors: &[Sector]) -> Self {
        Self {
            tickers: TickerRecognizer::new(tickers),
            sectors: SectorMatcher::new(sectors),
        }
    }

    pub fn recognize(&self, text: &str) -> RecognizedEntities {
        RecognizedEntities {
            tickers: self.tickers.find_tickers(text),
            sectors: self.sectors.find_sectors(text),
        }
    }
}
