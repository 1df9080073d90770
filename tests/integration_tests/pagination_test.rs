//! Sequential pagination scenarios

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use revharvest::crawler::{PaginationDriver, StopReason};
use revharvest::models::SessionStatus;
use revharvest::provider::{Cursor, Page, Strategy};

use super::fixtures::{domains, page, pipeline, services, settings, unavailable, StubProvider};

fn page_number(cursor: &Cursor) -> u32 {
    match cursor {
        Cursor::Page(n) => *n,
        other => panic!("unexpected cursor: {other:?}"),
    }
}

#[tokio::test]
async fn test_two_full_pages_then_empty_streak() {
    let provider = StubProvider::new(|_, cursor| {
        Ok(match page_number(cursor) {
            1 => page(domains("first", 0..10)),
            2 => page(domains("second", 0..10)),
            _ => Page::empty(),
        })
    });
    let services = services(settings());
    let mut pipeline = pipeline(&services, Strategy::Paginate);

    let stop = PaginationDriver::new(&provider, &services.settings)
        .run(&pipeline.job().query(), &mut pipeline)
        .await
        .unwrap();

    assert_eq!(stop, StopReason::EmptyStreak);
    assert_eq!(provider.request_count(), 5);
    assert_eq!(services.repository.count_domains().unwrap(), 20);

    let session = services
        .sessions
        .get(&pipeline.job().session_id)
        .unwrap()
        .unwrap();
    assert_eq!(session.status, SessionStatus::Complete);
    assert_eq!(session.total_domains, 20);
    // last page that returned data
    assert_eq!(session.pages_fetched, 2);
    assert!(session.completed_at.is_some());

    let snapshot = services.progress.get(&pipeline.job().session_id).unwrap();
    assert_eq!(snapshot.page, 2);
    assert_eq!(snapshot.total_domains, 20);
}

#[tokio::test]
async fn test_max_pages_bounds_requests() {
    let provider = StubProvider::new(|_, cursor| {
        let n = page_number(cursor) as usize;
        Ok(page(domains(&format!("p{n}-"), 0..3)))
    });
    let services = services(settings());
    let mut pipeline = pipeline(&services, Strategy::Paginate);

    let stop = PaginationDriver::new(&provider, &services.settings)
        .with_max_pages(Some(4))
        .run(&pipeline.job().query(), &mut pipeline)
        .await
        .unwrap();

    assert_eq!(stop, StopReason::PageCap);
    assert_eq!(provider.request_count(), 4);
    assert_eq!(pipeline.inserted(), 12);
    assert_eq!(pipeline.pages_fetched(), 4);
}

#[tokio::test]
async fn test_zero_max_pages_is_unbounded() {
    let provider = StubProvider::new(|_, cursor| {
        Ok(if page_number(cursor) <= 6 {
            page(domains(&format!("p{}-", page_number(cursor)), 0..1))
        } else {
            Page::empty()
        })
    });
    let services = services(settings());
    let mut pipeline = pipeline(&services, Strategy::Paginate);

    PaginationDriver::new(&provider, &services.settings)
        .with_max_pages(Some(0))
        .run(&pipeline.job().query(), &mut pipeline)
        .await
        .unwrap();

    assert_eq!(provider.request_count(), 9);
    assert_eq!(pipeline.inserted(), 6);
}

#[tokio::test]
async fn test_failures_count_as_empty_pages() {
    let provider = StubProvider::new(|_, cursor| match page_number(cursor) {
        1 => Ok(page(domains("ok", 0..5))),
        _ => Err(unavailable()),
    });
    let services = services(settings());
    let mut pipeline = pipeline(&services, Strategy::Paginate);

    let stop = PaginationDriver::new(&provider, &services.settings)
        .run(&pipeline.job().query(), &mut pipeline)
        .await
        .unwrap();

    assert_eq!(stop, StopReason::EmptyStreak);
    assert_eq!(provider.request_count(), 4);

    let report = pipeline.report(stop);
    assert_eq!(report.failed_requests, 3);
    assert_eq!(report.new_records, 5);

    let session = services
        .sessions
        .get(&pipeline.job().session_id)
        .unwrap()
        .unwrap();
    assert_eq!(session.status, SessionStatus::Complete);
}

#[tokio::test]
async fn test_empty_streak_resets_on_data() {
    let provider = StubProvider::new(|_, cursor| {
        Ok(match page_number(cursor) {
            1 => page(domains("a", 0..2)),
            4 => page(domains("b", 0..2)),
            _ => Page::empty(),
        })
    });
    let services = services(settings());
    let mut pipeline = pipeline(&services, Strategy::Paginate);

    PaginationDriver::new(&provider, &services.settings)
        .run(&pipeline.job().query(), &mut pipeline)
        .await
        .unwrap();

    assert_eq!(provider.request_count(), 7);
    assert_eq!(pipeline.pages_fetched(), 4);
    assert_eq!(pipeline.inserted(), 4);
}

#[tokio::test]
async fn test_stops_at_provider_max_page() {
    let provider = StubProvider::new(|_, cursor| {
        let n = page_number(cursor);
        Ok(Page {
            max_page: Some(2),
            ..page(domains(&format!("p{n}-"), 0..5))
        })
    });
    let services = services(settings());
    let mut pipeline = pipeline(&services, Strategy::Paginate);

    let stop = PaginationDriver::new(&provider, &services.settings)
        .run(&pipeline.job().query(), &mut pipeline)
        .await
        .unwrap();

    assert_eq!(stop, StopReason::ProviderMaxPage);
    assert_eq!(provider.request_count(), 2);
    assert_eq!(pipeline.inserted(), 10);
}

#[tokio::test]
async fn test_repeated_page_is_not_empty() {
    // The provider ignores the page number and keeps serving the same rows
    let calls = Arc::new(AtomicU32::new(0));
    let counter = calls.clone();
    let provider = StubProvider::new(move |_, _| {
        let n = counter.fetch_add(1, Ordering::SeqCst);
        Ok(if n < 3 {
            page(domains("same", 0..4))
        } else {
            Page::empty()
        })
    });
    let services = services(settings());
    let mut pipeline = pipeline(&services, Strategy::Paginate);

    PaginationDriver::new(&provider, &services.settings)
        .run(&pipeline.job().query(), &mut pipeline)
        .await
        .unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 6);
    assert_eq!(pipeline.inserted(), 4);
    assert_eq!(pipeline.counters().duplicates, 8);
    assert_eq!(pipeline.pages_fetched(), 3);
}
