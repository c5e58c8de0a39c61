// tests/providers_rss.rs
use crisis_ingest::classify::{Category, Region};
use crisis_ingest::ingest;
use crisis_ingest::ingest::providers::rss::RssAdapter;
use crisis_ingest::ingest::types::SourceAdapter;

const RSS_XML: &str = include_str!("fixtures/rss.xml");

#[tokio::test]
async fn feed_name_is_the_source() {
    let adapter = RssAdapter::from_fixture("BBC News", RSS_XML);
    let raw = adapter.fetch().await.expect("rss parse ok");

    assert_eq!(raw.len(), 3, "item without <link> is skipped");
    assert!(raw.iter().all(|r| r.source == "BBC News"));
}

#[tokio::test]
async fn collect_keeps_relevant_items_and_cleans_text() {
    let adapter = RssAdapter::from_fixture("BBC News", RSS_XML);
    let events = ingest::collect(&adapter).await.expect("collect ok");

    assert_eq!(events.len(), 2, "{events:#?}");

    let cyber = &events[0];
    assert_eq!(cyber.headline, "Cyber attack disrupts EU ports");
    assert_eq!(cyber.description, r#"Officials say the "breach" began overnight."#);
    // "attack" sits in an earlier row than "cyber".
    assert_eq!(cyber.category, Category::Military);
    assert_eq!(cyber.region, Region::Europe);
    assert_eq!(cyber.credibility, 89);
    assert_eq!(cyber.timestamp.to_rfc3339(), "2024-01-15T11:30:00+00:00");

    let talks = &events[1];
    assert_eq!(talks.category, Category::Political);
    assert_eq!(talks.region, Region::Africa);
}

#[tokio::test]
async fn unknown_feed_gets_default_credibility() {
    let adapter = RssAdapter::from_fixture("Daily Obscure Gazette", RSS_XML);
    let events = ingest::collect(&adapter).await.expect("collect ok");
    assert!(events.iter().all(|e| e.credibility == 75));
}

#[tokio::test]
async fn broken_xml_is_malformed() {
    let adapter = RssAdapter::from_fixture("BBC News", "<html><body>nope</body></html>");
    let err = adapter.fetch().await.expect_err("non-rss xml must fail");
    assert_eq!(err.kind(), "malformed");
    assert_eq!(err.provider(), "BBC News");
}

const MARKUP_RSS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>Markup feed</title>
    <item>
      <title>Bakery wins prize</title>
      <link>https://rss.test/m1</link>
      <description>&lt;p&gt;Bread lovers rejoice.&lt;/p&gt;&lt;a href="https://cdn.test/war-room/canada"&gt;more&lt;/a&gt;</description>
    </item>
    <item>
      <title>Sanctions debate continues</title>
      <link>https://rss.test/m2</link>
      <description>&lt;img src="https://cdn.test/china.png"/&gt;&lt;a href="https://x.test/canada"&gt;link&lt;/a&gt;</description>
    </item>
  </channel>
</rss>"#;

#[tokio::test]
async fn keywords_hidden_in_markup_are_ignored() {
    let adapter = RssAdapter::from_fixture("BBC News", MARKUP_RSS);
    let events = ingest::collect(&adapter).await.expect("collect ok");

    // "war" and "canada" only appear inside the first item's href.
    assert_eq!(events.len(), 1, "{events:#?}");

    let ev = &events[0];
    assert_eq!(ev.url, "https://rss.test/m2");
    assert_eq!(ev.description, "link");
    assert_eq!(ev.category, Category::Economic);
    assert_eq!(ev.region, Region::Global);
}
