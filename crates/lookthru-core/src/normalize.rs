//! Name and ticker normalization for cascading lookup.
//!
//! Loose security references arrive in many shapes ("NVIDIA CORP",
//! "Alphabet Inc Class A", "NVDA US", "BRK/B"). Normalization
//! canonicalizes them and generates ordered variant lists so cache and
//! external lookups can cascade from most to least specific.

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

/// Legal-entity, share-class and ADR suffix tokens stripped from
/// company names. Multi-token sequences first so they match before
/// their single-token components.
const SUFFIX_SEQUENCES: &[&[&str]] = &[
    &["SPONSORED", "ADR"],
    &["UNSPONSORED", "ADR"],
    &["CLASS", "A"],
    &["CLASS", "B"],
    &["CLASS", "C"],
    &["CL", "A"],
    &["CL", "B"],
    &["CL", "C"],
    &["INCORPORATED"],
    &["CORPORATION"],
    &["REGISTERED"],
    &["HOLDINGS"],
    &["ORDINARY"],
    &["LIMITED"],
    &["COMPANY"],
    &["COMMON"],
    &["CORP"],
    &["ADR"],
    &["ADS"],
    &["GDR"],
    &["REG"],
    &["INC"],
    &["LTD"],
    &["PLC"],
    &["LLC"],
    &["LLP"],
    &["CO"],
    &["AG"],
    &["SA"],
    &["NV"],
    &["SE"],
    &["AB"],
    &["AS"],
    &["KK"],
    &["BV"],
    &["CV"],
    &["LP"],
];

// "& CO" is part of the company name (JPMORGAN CHASE & CO), not a
// suffix. The token pair is fused before stripping and restored after.
const AND_CO_FUSED: &str = "&CO";

/// Canonical normalized form of a company name: uppercased,
/// punctuation stripped (except `&`), whitespace collapsed, legal
/// suffixes removed until stable.
#[must_use]
pub fn normalize_name(name: &str) -> String {
    let mut tokens = tokenize(name);
    fuse_and_co(&mut tokens);

    loop {
        let before = tokens.len();
        for sequence in SUFFIX_SEQUENCES {
            strip_sequence(&mut tokens, sequence);
        }
        if tokens.len() == before {
            break;
        }
    }

    let restored: Vec<&str> = tokens
        .iter()
        .map(|token| {
            if token == AND_CO_FUSED {
                "& CO"
            } else {
                token.as_str()
            }
        })
        .collect();
    restored.join(" ")
}

/// Ordered, de-duplicated search variants for a name, most specific
/// first: original cleaned, normalized, first token (three or more
/// characters), and the normalized form without a leading "THE ".
#[must_use]
pub fn name_variants(name: &str) -> Vec<String> {
    let mut variants = Vec::new();
    let mut push = |candidate: String| {
        let trimmed = candidate.trim().to_string();
        if !trimmed.is_empty() && !variants.contains(&trimmed) {
            variants.push(trimmed);
        }
    };

    let original = name
        .to_uppercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    push(original);

    let normalized = normalize_name(name);
    push(normalized.clone());

    if let Some(first) = normalized.split_whitespace().next() {
        if first.chars().count() >= 3 {
            push(first.to_string());
        }
    }

    if let Some(stripped) = normalized.strip_prefix("THE ") {
        push(stripped.to_string());
    }

    variants
}

fn tokenize(name: &str) -> Vec<String> {
    let mut cleaned = String::with_capacity(name.len());
    for ch in name.to_uppercase().chars() {
        if ch.is_alphanumeric() || ch == '&' {
            cleaned.push(ch);
        } else {
            cleaned.push(' ');
        }
    }
    cleaned.split_whitespace().map(str::to_string).collect()
}

fn fuse_and_co(tokens: &mut Vec<String>) {
    let mut index = 0;
    while index + 1 < tokens.len() {
        if tokens[index] == "&" && tokens[index + 1] == "CO" {
            tokens.splice(index..index + 2, [AND_CO_FUSED.to_string()]);
        }
        index += 1;
    }
}

fn strip_sequence(tokens: &mut Vec<String>, sequence: &[&str]) {
    let mut index = 0;
    while index + sequence.len() <= tokens.len() {
        let window = &tokens[index..index + sequence.len()];
        if window.iter().zip(sequence).all(|(token, want)| token == want) {
            tokens.drain(index..index + sequence.len());
        } else {
            index += 1;
        }
    }
}

/// Ticker source format, classified for observability only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TickerFormat {
    Bloomberg,
    Reuters,
    YahooDash,
    Numeric,
    Plain,
}

impl TickerFormat {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Bloomberg => "bloomberg",
            Self::Reuters => "reuters",
            Self::YahooDash => "yahoo_dash",
            Self::Numeric => "numeric",
            Self::Plain => "plain",
        }
    }
}

impl Display for TickerFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bloomberg suffix to country/market hint.
const BLOOMBERG_EXCHANGES: &[(&str, &str)] = &[
    ("US", "US"),
    ("UN", "US"),
    ("UQ", "US"),
    ("TT", "TW"),
    ("LN", "GB"),
    ("GR", "DE"),
    ("FP", "FR"),
    ("JP", "JP"),
    ("HK", "HK"),
    ("CN", "CA"),
    ("AU", "AU"),
];

/// Reuters suffix to exchange hint.
const REUTERS_EXCHANGES: &[(&str, &str)] = &[
    ("OQ", "NASDAQ"),
    ("O", "NYSE"),
    ("N", "NYSE"),
    ("L", "LSE"),
    ("DE", "XETRA"),
    ("PA", "EURONEXT"),
    ("T", "TSE"),
    ("HK", "HKEX"),
    ("KS", "KRX"),
    ("TW", "TWSE"),
];

/// Single letters that are exchange codes, not share classes.
const SINGLE_LETTER_EXCHANGES: &[&str] = &["O", "N", "L", "T"];

fn lookup(table: &[(&'static str, &'static str)], key: &str) -> Option<&'static str> {
    table
        .iter()
        .find(|(candidate, _)| *candidate == key)
        .map(|(_, value)| *value)
}

/// Parse a ticker into root symbol and exchange hint.
///
/// Recognizes Bloomberg ("NVDA US"), Reuters ("NVDA.OQ") and
/// Yahoo-dash share classes ("BRK-B", kept intact). Everything else is
/// treated as a local symbol.
#[must_use]
pub fn parse_ticker(ticker: &str) -> (String, Option<String>) {
    let ticker = ticker.trim().to_uppercase();
    if ticker.is_empty() {
        return (String::new(), None);
    }

    if let Some((root, suffix)) = bloomberg_parts(&ticker) {
        let hint = lookup(BLOOMBERG_EXCHANGES, suffix).unwrap_or(suffix);
        return (root.to_string(), Some(hint.to_string()));
    }

    if let Some((root, suffix)) = reuters_parts(&ticker) {
        // Single letters A, B, C are share classes, not exchanges.
        if suffix.len() == 2 || SINGLE_LETTER_EXCHANGES.contains(&suffix) {
            let hint = lookup(REUTERS_EXCHANGES, suffix).unwrap_or(suffix);
            return (root.to_string(), Some(hint.to_string()));
        }
        return (ticker.clone(), None);
    }

    // Dash share classes ("BRK-B") and local symbols pass through.
    (ticker, None)
}

fn bloomberg_parts(ticker: &str) -> Option<(&str, &str)> {
    let mut parts = ticker.split_whitespace();
    let root = parts.next()?;
    let suffix = parts.next()?;
    if parts.next().is_some() {
        return None;
    }
    let root_ok = root
        .chars()
        .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '/' | '.' | '-'));
    let suffix_ok = suffix.len() == 2 && suffix.chars().all(|ch| ch.is_ascii_alphabetic());
    (root_ok && suffix_ok).then_some((root, suffix))
}

fn reuters_parts(ticker: &str) -> Option<(&str, &str)> {
    let (root, suffix) = ticker.rsplit_once('.')?;
    let root_ok = !root.is_empty()
        && root
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '/' | '-'));
    let suffix_ok = (1..=2).contains(&suffix.len())
        && suffix.chars().all(|ch| ch.is_ascii_alphabetic());
    (root_ok && suffix_ok).then_some((root, suffix))
}

fn yahoo_dash_parts(ticker: &str) -> Option<(&str, &str)> {
    let (root, suffix) = ticker.split_once('-')?;
    let root_ok = !root.is_empty() && root.chars().all(|ch| ch.is_ascii_alphabetic());
    let suffix_ok = suffix.len() == 1 && suffix.chars().all(|ch| ch.is_ascii_alphabetic());
    (root_ok && suffix_ok).then_some((root, suffix))
}

/// Classify a ticker's source format. Logged with each resolution
/// attempt; never affects the resolution outcome.
#[must_use]
pub fn detect_format(ticker: &str) -> TickerFormat {
    let ticker = ticker.trim().to_uppercase();
    if bloomberg_parts(&ticker).is_some() {
        return TickerFormat::Bloomberg;
    }
    if let Some((_, suffix)) = reuters_parts(&ticker) {
        if suffix.len() == 2 || SINGLE_LETTER_EXCHANGES.contains(&suffix) {
            return TickerFormat::Reuters;
        }
    }
    if yahoo_dash_parts(&ticker).is_some() {
        return TickerFormat::YahooDash;
    }
    if !ticker.is_empty() && ticker.chars().all(|ch| ch.is_ascii_digit()) {
        return TickerFormat::Numeric;
    }
    TickerFormat::Plain
}

/// Ordered, de-duplicated ticker variants for cascade lookup:
/// original, root, separator substitutions, and common US suffixes for
/// US-like roots.
#[must_use]
pub fn ticker_variants(ticker: &str) -> Vec<String> {
    let ticker = ticker.trim().to_uppercase();
    if ticker.is_empty() {
        return Vec::new();
    }

    let (root, exchange) = parse_ticker(&ticker);

    let mut variants = Vec::new();
    let mut push = |candidate: String| {
        let cleaned = candidate.trim().to_uppercase();
        if !cleaned.is_empty() && !variants.contains(&cleaned) {
            variants.push(cleaned);
        }
    };

    push(ticker.clone());
    push(root.clone());

    for separator in ['/', '-', '.'] {
        if root.contains(separator) {
            push(root.replace(separator, ""));
            for replacement in ['/', '-', '.'] {
                if replacement != separator {
                    push(root.replace(separator, &replacement.to_string()));
                }
            }
        }
    }

    if exchange.as_deref().is_none() || exchange.as_deref() == Some("US") {
        push(format!("{root}.US"));
        push(format!("{root} US"));
    }

    variants
}
