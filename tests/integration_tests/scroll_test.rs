//! Scroll crawling scenarios

use revharvest::crawler::{HarvestReport, HarvestServices, HarvestSettings, ScrollCrawler, StopReason};
use revharvest::models::SessionStatus;
use revharvest::provider::{Cursor, Page, Strategy};
use revharvest::utils::error::FetchError;

use super::fixtures::{
    domains, page, pipeline, scroll_page, services, settings, unavailable, StubProvider,
};

/// Scroll provider that accepts the first endpoint and answers continuations via `next`
fn scroll_provider<F>(open: Page, next: F) -> StubProvider
where
    F: Fn(&str) -> Result<Page, FetchError> + Send + Sync + 'static,
{
    StubProvider::new(move |_, cursor| match cursor {
        Cursor::OpenScroll(_) => Ok(open.clone()),
        Cursor::Continue(token) => next(token.as_str()),
        Cursor::Page(_) => panic!("scroll crawl fell back to pagination"),
    })
    .preferring(Strategy::Scroll)
    .with_scroll_endpoints(3)
}

async fn crawl(
    provider: &StubProvider,
    settings: HarvestSettings,
) -> (StopReason, HarvestServices, HarvestReport) {
    let services = services(settings);
    let mut pipeline = pipeline(&services, Strategy::Scroll);
    let stop = ScrollCrawler::new(provider, &services.settings)
        .run(&pipeline.job().query(), &mut pipeline)
        .await
        .unwrap();
    let report = pipeline.report(stop);
    (stop, services, report)
}

#[tokio::test]
async fn test_stops_without_continuation_token() {
    let provider = scroll_provider(scroll_page(domains("a", 0..5), None, None), |_| {
        panic!("no continuation expected")
    });

    let (stop, services, report) = crawl(&provider, settings()).await;

    assert_eq!(stop, StopReason::NoContinuation);
    assert_eq!(provider.request_count(), 1);
    assert_eq!(report.new_records, 5);
    assert_eq!(report.pages_fetched, 1);

    let session = services.sessions.get(&report.session_id).unwrap().unwrap();
    assert_eq!(session.status, SessionStatus::Complete);
}

#[tokio::test]
async fn test_stops_at_declared_total() {
    let provider = scroll_provider(
        scroll_page(domains("open", 0..2), Some("t1"), Some(4)),
        |token| {
            assert_eq!(token, "t1");
            Ok(scroll_page(domains("next", 0..2), Some("t2"), Some(4)))
        },
    );

    let (stop, _, report) = crawl(&provider, settings()).await;

    assert_eq!(stop, StopReason::DeclaredTotalReached);
    assert_eq!(provider.request_count(), 2);
    assert_eq!(report.new_records, 4);
    assert_eq!(report.pages_fetched, 2);
}

#[tokio::test]
async fn test_stops_at_batch_ceiling() {
    let provider = scroll_provider(scroll_page(domains("open", 0..1), Some("t0"), None), |token| {
        Ok(scroll_page(domains(token, 0..1), Some("more"), None))
    });
    let settings = HarvestSettings {
        scroll_batch_ceiling: 3,
        ..settings()
    };

    let (stop, _, report) = crawl(&provider, settings).await;

    assert_eq!(stop, StopReason::BatchCeiling);
    // one opening request plus three continuations
    assert_eq!(provider.request_count(), 4);
    assert_eq!(report.pages_fetched, 4);
}

#[tokio::test]
async fn test_continuation_failure_keeps_earlier_records() {
    let provider = scroll_provider(scroll_page(domains("open", 0..3), Some("t1"), None), |_| {
        Err(unavailable())
    });

    let (stop, services, report) = crawl(&provider, settings()).await;

    assert_eq!(stop, StopReason::ContinuationFailed);
    assert_eq!(report.new_records, 3);
    assert_eq!(services.repository.count_domains().unwrap(), 3);

    let session = services.sessions.get(&report.session_id).unwrap().unwrap();
    assert_eq!(session.status, SessionStatus::Complete);
    assert_eq!(session.total_domains, 3);
}

#[tokio::test]
async fn test_empty_continuation_ends_scroll() {
    let provider = scroll_provider(scroll_page(domains("open", 0..3), Some("t1"), None), |_| {
        Ok(scroll_page(Vec::new(), Some("t2"), None))
    });

    let (stop, _, report) = crawl(&provider, settings()).await;

    assert_eq!(stop, StopReason::Exhausted);
    assert_eq!(provider.request_count(), 2);
    assert_eq!(report.pages_fetched, 1);
}

#[tokio::test]
async fn test_falls_through_rejected_endpoints() {
    let provider = StubProvider::new(|_, cursor| match cursor {
        Cursor::OpenScroll(endpoint) if endpoint.index < 2 => Err(unavailable()),
        Cursor::OpenScroll(_) => Ok(scroll_page(domains("legacy", 0..2), None, None)),
        other => panic!("unexpected cursor: {other:?}"),
    })
    .with_scroll_endpoints(3);

    let (stop, _, report) = crawl(&provider, settings()).await;

    assert_eq!(stop, StopReason::NoContinuation);
    let opened: Vec<usize> = provider
        .requests()
        .iter()
        .filter_map(|(_, cursor)| match cursor {
            Cursor::OpenScroll(e) => Some(e.index),
            _ => None,
        })
        .collect();
    assert_eq!(opened, vec![0, 1, 2]);
    assert_eq!(report.new_records, 2);
    assert_eq!(report.strategy, Strategy::Scroll);
}

#[tokio::test]
async fn test_degrades_to_pagination() {
    let provider = StubProvider::new(|_, cursor| match cursor {
        Cursor::OpenScroll(_) => Err(unavailable()),
        Cursor::Page(1) => Ok(page(domains("paged", 0..4))),
        Cursor::Page(_) => Ok(Page::empty()),
        Cursor::Continue(_) => panic!("no scroll was opened"),
    })
    .with_scroll_endpoints(3);

    let (stop, services, report) = crawl(&provider, settings()).await;

    assert_eq!(stop, StopReason::EmptyStreak);
    // three rejected opens, one page of data, three empty pages
    assert_eq!(provider.request_count(), 7);
    assert_eq!(report.strategy, Strategy::Paginate);
    assert_eq!(report.new_records, 4);
    assert_eq!(report.pages_fetched, 1);

    let session = services.sessions.get(&report.session_id).unwrap().unwrap();
    assert_eq!(session.status, SessionStatus::Complete);
}

#[tokio::test]
async fn test_provider_without_scroll_support_paginates() {
    let provider = StubProvider::new(|_, cursor| match cursor {
        Cursor::Page(1) => Ok(page(domains("only", 0..1))),
        Cursor::Page(_) => Ok(Page::empty()),
        other => panic!("unexpected cursor: {other:?}"),
    });

    let (_, _, report) = crawl(&provider, settings()).await;

    assert_eq!(provider.request_count(), 4);
    assert_eq!(report.strategy, Strategy::Paginate);
}
