//! Content fingerprinting: stable identity hashes for a news candidate.
//!
//! Two independent keys are derived:
//! - `url_hash` from the normalized URL (tracking params and fragment removed)
//! - `content_hash` from the normalized title + summary (stopwords removed)
//!
//! Everything here is pure and deterministic.

use std::collections::HashSet;
use std::fmt::Write as _;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use url::Url;

/// Number of hex chars kept from the SHA-256 digest.
pub const HASH_LEN: usize = 16;

/// Query keys dropped during URL normalization (in addition to any `utm_*`).
const TRACKING_PARAMS: &[&str] = &["fbclid", "gclid", "ref", "source", "campaign"];

/// Tokens shorter than this are ignored for content hashing.
const MIN_TOKEN_CHARS: usize = 3;

/// Function words plus club/topic words that appear in nearly every story.
static STOPWORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "bir", "bu", "şu", "o", "ve", "ile", "için", "da", "de", "ta", "te", "den", "dan", "ten",
        "tan", "nin", "nın", "nun", "nün", "in", "ın", "un", "ün", "e", "a", "ye", "ya", "i", "ı",
        "u", "ü", "olan", "oldu", "olur", "olacak", "var", "yok", "gibi", "kadar", "daha", "en",
        "çok", "az", "galatasaray", "fenerbahçe", "beşiktaş", "trabzonspor", "transfer", "futbol",
        "maç", "takım", "oyuncu", "teknik", "direktör", "antrenör", "sezon", "lig", "süper", "spor",
        "haber", "son",
    ]
    .into_iter()
    .collect()
});

static RE_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\w+").expect("static regex"));

/// Derived `(url_hash, content_hash)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint {
    pub url_hash: String,
    pub content_hash: String,
}

/// Hash of content that normalizes to nothing (only stopwords or short tokens).
static EMPTY_CONTENT_HASH: Lazy<String> = Lazy::new(|| short_hash(""));

impl Fingerprint {
    /// False when title and summary carried no substantive tokens; such
    /// content hashes collide with each other and must not be matched.
    pub fn has_content(&self) -> bool {
        self.content_hash != *EMPTY_CONTENT_HASH
    }
}

fn is_tracking_param(key: &str) -> bool {
    let k = key.to_ascii_lowercase();
    k.starts_with("utm_") || TRACKING_PARAMS.contains(&k.as_str())
}

fn strip_fragment(s: &str) -> &str {
    s.split('#').next().unwrap_or_default()
}

/// Canonical form of a URL for dedup purposes.
///
/// The whole URL is lowercased, tracking parameters and the fragment are
/// dropped, and the remaining query pairs keep their original order.
/// Input that doesn't parse as an absolute URL with a host is only
/// lowercased and stripped of its fragment.
pub fn normalize_url(url: &str) -> String {
    let lowered = url.trim().to_lowercase();
    let fallback = || strip_fragment(&lowered).trim_end().to_string();
    let Ok(parsed) = Url::parse(&lowered) else {
        return fallback();
    };
    // mailto:, data: and friends have no authority to rebuild
    let Some(host) = parsed.host_str().filter(|_| !parsed.cannot_be_a_base()) else {
        return fallback();
    };

    let mut out = format!("{}://{host}", parsed.scheme());
    if let Some(port) = parsed.port() {
        let _ = write!(out, ":{port}");
    }
    out.push_str(parsed.path());

    let kept: Vec<(String, String)> = parsed
        .query_pairs()
        .filter(|(k, _)| !is_tracking_param(k))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    if !kept.is_empty() {
        let query = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(kept)
            .finish();
        out.push('?');
        out.push_str(&query);
    }

    // percent-encoding emits uppercase hex
    out.to_lowercase()
}

/// Substantive text of an item: lowercase word tokens without stopwords
/// or very short tokens, joined by single spaces.
pub fn normalize_content(title: &str, summary: &str) -> String {
    let joined = format!("{title} {summary}").to_lowercase();
    RE_WORD
        .find_iter(&joined)
        .map(|m| m.as_str())
        .filter(|t| t.chars().count() >= MIN_TOKEN_CHARS && !STOPWORDS.contains(t))
        .collect::<Vec<_>>()
        .join(" ")
}

fn short_hash(s: &str) -> String {
    let digest = Sha256::digest(s.as_bytes());
    let mut hex = hex::encode(digest);
    hex.truncate(HASH_LEN);
    hex
}

pub fn fingerprint(url: &str, title: &str, summary: &str) -> Fingerprint {
    Fingerprint {
        url_hash: short_hash(&normalize_url(url)),
        content_hash: short_hash(&normalize_content(title, summary)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stopword_only_content_has_no_content() {
        assert!(!fingerprint("https://a.test/1", "Transfer", "ve bu da").has_content());
        assert!(fingerprint("https://a.test/1", "Kaleci imzaladı", "").has_content());
    }

    #[test]
    fn strips_tracking_params_and_fragment() {
        assert_eq!(
            normalize_url("HTTPS://News.Example.com/Transfer/123?utm_source=tw&id=7&fbclid=abc#top"),
            "https://news.example.com/transfer/123?id=7"
        );
    }

    #[test]
    fn keeps_query_order() {
        assert_eq!(
            normalize_url("https://a.com/x?b=2&ref=home&a=1"),
            "https://a.com/x?b=2&a=1"
        );
    }

    #[test]
    fn drops_empty_query() {
        assert_eq!(
            normalize_url("https://a.com/x?utm_medium=social"),
            "https://a.com/x"
        );
    }

    #[test]
    fn keeps_explicit_port() {
        assert_eq!(normalize_url("http://a.com:8080/x"), "http://a.com:8080/x");
        assert_eq!(normalize_url("https://a.com:443/x"), "https://a.com/x");
    }

    #[test]
    fn unparseable_url_falls_back() {
        assert_eq!(normalize_url("  Not A Url#frag "), "not a url");
    }

    #[test]
    fn content_drops_stopwords_and_short_tokens() {
        let out = normalize_content(
            "Galatasaray yeni FORVETINI açıkladı",
            "Bu  transfer  için   anlaşma tamam, 3 yıl",
        );
        assert_eq!(out, "yeni forvetini açıkladı anlaşma tamam yıl");
    }

    #[test]
    fn hashes_are_truncated_hex() {
        let fp = fingerprint("https://a.com/x", "Title here", "Summary text");
        assert_eq!(fp.url_hash.len(), HASH_LEN);
        assert_eq!(fp.content_hash.len(), HASH_LEN);
        assert!(fp.url_hash.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
