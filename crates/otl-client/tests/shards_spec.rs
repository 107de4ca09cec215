//! Worker-pool bound, ordering and fail-fast behaviour of shard downloads.

mod support;

use std::time::Duration;

use otl_client::{Deadline, OtlError, Session, api::ShardFetcher};
use support::{Reply, ScriptedTransport};

fn locations(count: usize) -> Vec<String> {
    (0..count).map(|idx| format!("results/42/part-{idx}")).collect()
}

fn session() -> Session {
    Session::new(support::SESSION_COOKIE)
}

#[tokio::test(start_paused = true)]
async fn never_more_workers_than_parallelism() {
    let transport = ScriptedTransport::new(|request| {
        Reply::slow(
            Duration::from_millis(100),
            Reply::Text(format!("{{\"path\": \"{}\"}}\n", request.path)),
        )
    });
    let fetcher = ShardFetcher::new(transport.clone(), 3);
    let locations = locations(10);

    let payloads = fetcher
        .fetch_all(&locations, &session(), &Deadline::after(Duration::from_secs(30)))
        .await
        .unwrap();

    assert_eq!(transport.peak_in_flight(), 3);
    assert_eq!(payloads.len(), 10);
    for (payload, location) in payloads.iter().zip(&locations) {
        assert_eq!(&payload.location, location);
        assert!(payload.text().unwrap().contains(location.as_str()));
    }
}

#[tokio::test(start_paused = true)]
async fn small_batches_use_one_worker_per_shard() {
    let transport = ScriptedTransport::new(|_| {
        Reply::slow(Duration::from_millis(50), Reply::Text(String::new()))
    });
    let fetcher = ShardFetcher::new(transport.clone(), 16);

    fetcher
        .fetch_all(&locations(2), &session(), &Deadline::after(Duration::from_secs(5)))
        .await
        .unwrap();
    assert_eq!(transport.peak_in_flight(), 2);
}

#[tokio::test(start_paused = true)]
async fn empty_location_list_makes_no_requests() {
    let transport = ScriptedTransport::new(|_| Reply::Status(500));
    let fetcher = ShardFetcher::new(transport.clone(), 4);

    let payloads = fetcher
        .fetch_all(&[], &session(), &Deadline::after(Duration::from_secs(1)))
        .await
        .unwrap();
    assert!(payloads.is_empty());
    assert!(transport.paths().is_empty());
}

#[tokio::test(start_paused = true)]
async fn first_failure_aborts_remaining_downloads() {
    let transport = ScriptedTransport::new(|request| {
        if request.path.ends_with("part-0") {
            Reply::Status(500)
        } else {
            Reply::slow(Duration::from_secs(60), Reply::Text(String::new()))
        }
    });
    let fetcher = ShardFetcher::new(transport.clone(), 2);
    let started = tokio::time::Instant::now();

    let err = fetcher
        .fetch_all(&locations(8), &session(), &Deadline::after(Duration::from_secs(600)))
        .await
        .unwrap_err();

    match &err {
        OtlError::ShardFetch { location, source } => {
            assert_eq!(location, "results/42/part-0");
            assert_eq!(source.status(), Some(500));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(started.elapsed() < Duration::from_secs(60));
    assert!(transport.paths().len() < 8);
}
