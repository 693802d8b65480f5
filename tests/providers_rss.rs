// tests/providers_rss.rs
use football_news_relay::ingest::providers::rss::RssFeed;
use football_news_relay::ingest::types::SourceFeed;

const FOOTBALL_XML: &str = include_str!("fixtures/football_rss.xml");

#[tokio::test]
async fn fixture_parses_into_candidates() {
    let feed = RssFeed::from_fixture("Example Spor", FOOTBALL_XML);
    let items = feed.fetch().await.expect("rss parse ok");

    assert_eq!(items.len(), 3);
    assert!(items.iter().all(|i| i.source == "Example Spor"));
    assert!(items.iter().all(|i| !i.title.is_empty()));

    let first = &items[0];
    assert_eq!(first.title, "Kaleci transferinde imzalar atıldı");
    assert_eq!(
        first.url,
        "https://www.example-spor.test/haber/kaleci-imza?utm_source=rss&id=41"
    );
    assert_eq!(
        first.summary,
        r#"Kulüp, yeni kalecisiyle 3 yıllık sözleşme imzaladığını "resmen" açıkladı."#
    );
    assert_eq!(
        first.published_at.map(|t| t.to_rfc3339()).as_deref(),
        Some("2025-09-06T09:30:00+00:00")
    );
}

#[tokio::test]
async fn missing_pub_date_is_none() {
    let feed = RssFeed::from_fixture("Example Spor", FOOTBALL_XML);
    let items = feed.fetch().await.unwrap();
    let undated = items
        .iter()
        .find(|i| i.url.ends_with("milli-kadro"))
        .expect("item present");
    assert!(undated.published_at.is_none());
}

#[test]
fn feed_name_is_reported() {
    let feed = RssFeed::from_fixture("Example Spor", FOOTBALL_XML);
    assert_eq!(feed.name(), "Example Spor");
}
