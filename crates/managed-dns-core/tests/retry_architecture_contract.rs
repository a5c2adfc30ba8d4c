//! Contract Test: Retry Architecture
//!
//! Retrying is the watcher's job, done one tick at a time. Sources and
//! providers are single-shot.
//!
//! Constraints verified:
//! - A failed publish leaves the cache untouched so the next tick retries
//! - A failed change keeps the last good value as the baseline
//! - A rate-limited publish skips exactly one extra tick
//! - Sources are tried in order, the first success wins
//! - A hung source cannot use up the fetch time of the sources after it
//! - Every record type gets its own fetch budget
//! - When every source fails the tick is abandoned without touching the provider
//!
//! If this test fails, someone has added retry loops below the watcher or
//! broken the published-value cache.

mod common;

use common::*;
use managed_dns_core::config::IpVersions;
use managed_dns_core::traits::{IpVersion, ValueSource};
use managed_dns_core::{ProviderErrorCode, RecordType, Supervisor, WatcherEvent, WatcherState};
use std::time::Duration;

#[tokio::test(start_paused = true)]
async fn failed_publish_is_retried_next_tick() {
    let value = ip("198.51.100.30");
    let provider = RecordingProvider::new().failing_with([ProviderErrorCode::Transient]);
    let record = v4_record(
        "home.example.com",
        vec![ScriptedSource::fixed("fixed", value)],
        &provider,
    );

    let (mut supervisor, mut events) = Supervisor::new(vec![record], test_supervisor_config());
    supervisor.start().unwrap();

    tokio::time::sleep(INTERVAL / 2).await;
    assert_eq!(provider.attempts(), 1);
    assert!(provider.upserts().is_empty());

    tokio::time::sleep(INTERVAL).await;
    supervisor.stop().await.unwrap();

    assert_eq!(provider.attempts(), 2);
    assert_eq!(provider.upserted_values(), vec![value]);

    let events = drain(&mut events);
    assert!(events.iter().any(|e| matches!(
        e,
        WatcherEvent::PublishFailed {
            rate_limited: false,
            ..
        }
    )));
}

#[tokio::test(start_paused = true)]
async fn failed_change_is_retried_against_last_good_value() {
    let first = ip("198.51.100.34");
    let second = ip("198.51.100.35");
    let source = ScriptedSource::new("changing", vec![Some(first), Some(second)]);
    let provider =
        RecordingProvider::new().with_outcomes([None, Some(ProviderErrorCode::Transient)]);
    let record = v4_record("home.example.com", vec![source], &provider);

    let (mut supervisor, mut events) = Supervisor::new(vec![record], test_supervisor_config());
    supervisor.start().unwrap();

    // 0s publishes the first value, 60s fails the change, 120s retries it
    tokio::time::sleep(INTERVAL * 2 + INTERVAL / 2).await;
    supervisor.stop().await.unwrap();

    assert_eq!(provider.attempts(), 3);
    assert_eq!(provider.upserted_values(), vec![first, second]);

    let events = drain(&mut events);
    assert!(!events.iter().any(|e| matches!(e, WatcherEvent::Skipped { .. })));
    assert!(events.contains(&WatcherEvent::Published {
        hostname: "home.example.com".to_string(),
        record_type: RecordType::A,
        value: second,
        previous: Some(first),
    }));
}

#[tokio::test(start_paused = true)]
async fn rate_limit_skips_one_tick() {
    let value = ip("198.51.100.31");
    let provider = RecordingProvider::new().failing_with([ProviderErrorCode::RateLimited]);
    let record = v4_record(
        "home.example.com",
        vec![ScriptedSource::fixed("fixed", value)],
        &provider,
    );

    let (mut supervisor, mut events) = Supervisor::new(vec![record], test_supervisor_config());
    supervisor.start().unwrap();

    // Tick at 60s is skipped
    tokio::time::sleep(INTERVAL + INTERVAL / 2).await;
    assert_eq!(provider.attempts(), 1);

    // Tick at 120s retries
    tokio::time::sleep(INTERVAL).await;
    assert_eq!(provider.attempts(), 2);
    assert_eq!(provider.upserted_values(), vec![value]);

    supervisor.stop().await.unwrap();

    let skipped = drain(&mut events)
        .into_iter()
        .filter(|e| matches!(e, WatcherEvent::TickSkipped { .. }))
        .count();
    assert_eq!(skipped, 1);
}

#[tokio::test(start_paused = true)]
async fn sources_are_tried_in_order() {
    let value = ip("198.51.100.32");
    let broken = ScriptedSource::failing("broken");
    let working = ScriptedSource::fixed("working", value);
    let unused = ScriptedSource::fixed("unused", ip("198.51.100.99"));
    let provider = RecordingProvider::new();

    let record = v4_record(
        "home.example.com",
        vec![broken.clone(), working.clone(), unused.clone()],
        &provider,
    );

    let (mut supervisor, mut events) = Supervisor::new(vec![record], test_supervisor_config());
    supervisor.start().unwrap();
    tokio::time::sleep(INTERVAL / 2).await;
    supervisor.stop().await.unwrap();

    assert_eq!(broken.calls(), 1);
    assert_eq!(working.calls(), 1);
    assert_eq!(unused.calls(), 0);
    assert_eq!(provider.upserted_values(), vec![value]);

    assert!(drain(&mut events).iter().any(|e| matches!(
        e,
        WatcherEvent::Fetched { source, .. } if source == "working"
    )));
}

#[tokio::test(start_paused = true)]
async fn all_sources_failing_abandons_tick() {
    let first = ScriptedSource::failing("first");
    let second = ScriptedSource::failing("second");
    let provider = RecordingProvider::new();

    let record = v4_record(
        "home.example.com",
        vec![first.clone(), second.clone()],
        &provider,
    );

    let (mut supervisor, mut events) = Supervisor::new(vec![record], test_supervisor_config());
    supervisor.start().unwrap();

    tokio::time::sleep(INTERVAL + INTERVAL / 2).await;
    assert_eq!(
        supervisor.states(),
        vec![("home.example.com".to_string(), WatcherState::Sleeping)],
        "the loop keeps running after failed ticks"
    );
    supervisor.stop().await.unwrap();

    assert_eq!(first.calls(), 2);
    assert_eq!(second.calls(), 2);
    assert_eq!(provider.attempts(), 0);

    let failures = drain(&mut events)
        .into_iter()
        .filter(|e| matches!(e, WatcherEvent::FetchFailed { .. }))
        .count();
    assert_eq!(failures, 2);
}

#[tokio::test(start_paused = true)]
async fn recovered_source_publishes() {
    let value = ip("198.51.100.33");
    let source = ScriptedSource::new("flaky", vec![None, Some(value)]);
    let provider = RecordingProvider::new();

    let record = v4_record("home.example.com", vec![source], &provider);
    let (mut supervisor, _events) = Supervisor::new(vec![record], test_supervisor_config());
    supervisor.start().unwrap();

    tokio::time::sleep(INTERVAL + INTERVAL / 2).await;
    supervisor.stop().await.unwrap();

    assert_eq!(provider.upserted_values(), vec![value]);
}

#[tokio::test(start_paused = true)]
async fn hung_source_does_not_block_fallback() {
    let value = ip("198.51.100.36");
    let provider = RecordingProvider::new();
    let sources: Vec<Box<dyn ValueSource>> = vec![
        Box::new(DelayedSource::hung("hung")),
        Box::new(DelayedSource::new("healthy", Duration::from_millis(50), vec![value])),
    ];
    let record = record_with(
        "home.example.com",
        IpVersions::only(IpVersion::V4),
        sources,
        &provider,
    );

    let (mut supervisor, mut events) = Supervisor::new(vec![record], test_supervisor_config());
    supervisor.start().unwrap();

    tokio::time::sleep(INTERVAL * 3 + INTERVAL / 2).await;
    supervisor.stop().await.unwrap();

    assert_eq!(provider.upserted_values(), vec![value]);

    let events = drain(&mut events);
    assert!(!events.iter().any(|e| matches!(e, WatcherEvent::FetchFailed { .. })));
    let fetched_from_healthy = events
        .iter()
        .filter(|e| matches!(e, WatcherEvent::Fetched { source, .. } if source == "healthy"))
        .count();
    assert_eq!(fetched_from_healthy, 4);
}

#[tokio::test(start_paused = true)]
async fn stalled_ipv4_does_not_starve_ipv6() {
    let v6 = ip("2001:db8::36");
    let provider = RecordingProvider::new();
    let source = DelayedSource::new("split", Duration::from_millis(50), vec![v6])
        .hanging_on(IpVersion::V4);
    let record = record_with(
        "home.example.com",
        IpVersions::default(),
        vec![Box::new(source)],
        &provider,
    );

    let (mut supervisor, mut events) = Supervisor::new(vec![record], test_supervisor_config());
    supervisor.start().unwrap();

    tokio::time::sleep(INTERVAL / 2).await;
    supervisor.stop().await.unwrap();

    assert_eq!(
        provider.upserts(),
        vec![("home.example.com".to_string(), RecordType::Aaaa, v6)]
    );
    assert!(drain(&mut events).contains(&WatcherEvent::FetchFailed {
        hostname: "home.example.com".to_string(),
        record_type: RecordType::A,
        error: "No source available for home.example.com (1 attempted)".to_string(),
    }));
}
