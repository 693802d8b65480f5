// src/ingest/mod.rs
pub mod providers;
pub mod types;

use chrono::{DateTime, Duration, Utc};
use metrics::{counter, describe_counter, describe_histogram};
use once_cell::sync::{Lazy, OnceCell};
use regex::Regex;

use crate::ingest::types::{CandidateItem, SourceFeed};

/// One-time metrics registration (so series show up on /metrics).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("ingest_items_total", "Items parsed from feeds.");
        describe_counter!(
            "ingest_dropped_total",
            "Items dropped before the pipeline (empty or stale)."
        );
        describe_counter!("ingest_feed_errors_total", "Feed fetch/parse errors.");
        describe_histogram!("ingest_parse_ms", "Feed parse time in milliseconds.");
    });
}

static RE_TAGS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)</?[^>]+>").expect("static regex"));
static RE_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("static regex"));

/// Max chars kept from a feed field.
const MAX_FIELD_CHARS: usize = 1500;

/// Normalize feed text: decode entities, strip tags, ASCII quotes, collapse whitespace.
pub fn normalize_text(s: &str) -> String {
    // 1) HTML entity decode
    let mut out = html_escape::decode_html_entities(s).to_string();

    // 2) Strip HTML tags
    out = RE_TAGS.replace_all(&out, "").to_string();

    // 3) Normalize “ ” ‘ ’ « » to ASCII quotes; drop Unicode line/paragraph separators
    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'")
        .replace(['\u{2028}', '\u{2029}'], " ");

    // 4) Collapse whitespace
    out = RE_WS.replace_all(&out, " ").trim().to_string();

    // 5) Length cap
    if out.chars().count() > MAX_FIELD_CHARS {
        out = out.chars().take(MAX_FIELD_CHARS).collect();
    }

    out
}

#[derive(Debug, Clone, Copy)]
pub struct IngestCfg {
    /// Items published longer ago than this are dropped; undated items are kept.
    pub max_age_hours: i64,
    /// Upper bound on items handed to the pipeline per run.
    pub max_items: usize,
}

impl Default for IngestCfg {
    fn default() -> Self {
        Self {
            max_age_hours: 24,
            max_items: 10,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub fetched: usize,
    pub empty: usize,
    pub stale: usize,
    pub feed_errors: usize,
}

/// Drop empty/stale items, order newest first (undated last) and cap.
pub fn select_candidates(
    now: DateTime<Utc>,
    raw: Vec<CandidateItem>,
    cfg: &IngestCfg,
) -> (Vec<CandidateItem>, usize, usize) {
    let cutoff = now - Duration::hours(cfg.max_age_hours.max(0));
    let mut empty = 0usize;
    let mut stale = 0usize;

    let mut keep = Vec::with_capacity(raw.len());
    for mut it in raw {
        it.title = normalize_text(&it.title);
        it.summary = normalize_text(&it.summary);
        it.url = it.url.trim().to_string();
        if it.title.is_empty() || it.url.is_empty() {
            empty += 1;
            continue;
        }
        if it.published_at.is_some_and(|ts| ts < cutoff) {
            stale += 1;
            continue;
        }
        keep.push(it);
    }

    // stable: feed order is kept among equal timestamps
    keep.sort_by(|a, b| b.published_at.cmp(&a.published_at));
    keep.truncate(cfg.max_items);
    (keep, empty, stale)
}

/// Fetch every feed in order. A failing feed is logged and skipped.
pub async fn collect(
    feeds: &[Box<dyn SourceFeed>],
    cfg: &IngestCfg,
    now: DateTime<Utc>,
) -> (Vec<CandidateItem>, IngestReport) {
    ensure_metrics_described();

    let mut report = IngestReport::default();
    let mut raw = Vec::new();
    for f in feeds {
        match f.fetch().await {
            Ok(mut v) => {
                tracing::debug!(target: "ingest", feed = f.name(), items = v.len(), "feed fetched");
                raw.append(&mut v);
            }
            Err(e) => {
                tracing::warn!(target: "ingest", error = %e, feed = f.name(), "feed error");
                counter!("ingest_feed_errors_total").increment(1);
                report.feed_errors += 1;
            }
        }
    }
    report.fetched = raw.len();

    let (kept, empty, stale) = select_candidates(now, raw, cfg);
    report.empty = empty;
    report.stale = stale;

    counter!("ingest_dropped_total").increment((empty + stale) as u64);
    tracing::info!(
        target: "ingest",
        fetched = report.fetched,
        kept = kept.len(),
        stale,
        feed_errors = report.feed_errors,
        "ingest finished"
    );

    (kept, report)
}
