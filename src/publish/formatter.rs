//! Builds post text for short-form platforms.
//!
//! Layout: `title`, blank line, `summary`, blank line, footer (`Kaynak: domain`),
//! then hashtags on the same line as the footer. URLs count as 23 chars, the
//! way the platform's link shortener counts them.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::ingest::types::CandidateItem;

pub const DEFAULT_MAX_LENGTH: usize = 280;
pub const DEFAULT_FOOTER: &str = "Kaynak: {source}";
const SHORT_URL_LEN: usize = 23;
const ELLIPSIS: &str = "...";

static RE_URL: Lazy<Regex> = Lazy::new(|| Regex::new(r"https?://\S+").expect("static regex"));
static RE_TAG_CHARS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w#]").expect("static regex"));

#[derive(Debug, Clone)]
pub struct PostFormatter {
    pub max_length: usize,
    /// `{source}` is replaced with the item's domain.
    pub footer: String,
    pub hashtags: Vec<String>,
}

impl Default for PostFormatter {
    fn default() -> Self {
        Self {
            max_length: DEFAULT_MAX_LENGTH,
            footer: DEFAULT_FOOTER.to_string(),
            hashtags: vec!["#futbol".into(), "#transfer".into()],
        }
    }
}

/// Host without a leading `www.`; the input itself if it doesn't parse.
pub fn extract_domain(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_ascii_lowercase))
        .map(|h| h.strip_prefix("www.").map(str::to_string).unwrap_or(h))
        .unwrap_or_else(|| url.to_string())
}

/// Length as the platform counts it.
pub fn effective_length(text: &str) -> usize {
    let url_chars: usize = RE_URL.find_iter(text).map(|m| m.as_str().chars().count()).sum();
    let urls = RE_URL.find_iter(text).count();
    text.chars().count() - url_chars + urls * SHORT_URL_LEN
}

/// Cut at a word boundary so the result (ellipsis included) fits `max`
/// as measured by [`effective_length`]. URLs are never split.
pub fn truncate_text(text: &str, max: usize) -> String {
    if effective_length(text) <= max {
        return text.to_string();
    }
    // room for " ..." so a trailing link keeps its boundary
    let Some(budget) = max.checked_sub(ELLIPSIS.len() + 1) else {
        return String::new();
    };
    let mut out = String::new();
    let mut used = 0usize;
    for word in text.split_whitespace() {
        let extra = usize::from(!out.is_empty());
        let weight = effective_length(word);
        if used + extra + weight > budget {
            break;
        }
        if extra == 1 {
            out.push(' ');
        }
        out.push_str(word);
        used += extra + weight;
    }
    if out.is_empty() {
        // single word longer than the budget; links are dropped whole
        let first = text.split_whitespace().next().unwrap_or_default();
        if !RE_URL.is_match(first) {
            out = first.chars().take(budget).collect();
        }
    }
    if out.split_whitespace().last().is_some_and(|w| RE_URL.is_match(w)) {
        out.push(' ');
    }
    out.push_str(ELLIPSIS);
    out
}

impl PostFormatter {
    pub fn format_hashtags(&self) -> String {
        self.hashtags
            .iter()
            .map(|t| {
                let tag = if t.starts_with('#') {
                    t.clone()
                } else {
                    format!("#{t}")
                };
                RE_TAG_CHARS.replace_all(&tag, "").to_string()
            })
            .filter(|t| t.len() > 1)
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn format(&self, item: &CandidateItem) -> String {
        let body = if item.summary.is_empty() || item.summary == item.title {
            item.title.trim().to_string()
        } else {
            format!("{}\n\n{}", item.title.trim(), item.summary.trim())
        };

        let footer = self.footer.replace("{source}", &extract_domain(&item.url));
        let footer = if footer.is_empty() {
            String::new()
        } else {
            format!("\n\n{footer}")
        };
        let tags = self.format_hashtags();
        let tags = if tags.is_empty() {
            String::new()
        } else {
            format!(" {tags}")
        };

        let full = format!("{body}{footer}{tags}");
        if effective_length(&full) <= self.max_length {
            return full;
        }
        let without_tags = format!("{body}{footer}");
        if effective_length(&without_tags) <= self.max_length {
            return without_tags;
        }
        let budget = self.max_length.saturating_sub(effective_length(&footer));
        format!("{}{footer}", truncate_text(&body, budget))
    }
}
