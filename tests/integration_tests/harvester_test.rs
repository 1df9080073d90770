//! End-to-end harvests through the public interface

use std::sync::Arc;

use tempfile::TempDir;

use revharvest::crawler::{HarvestRequest, Harvester};
use revharvest::error::Error;
use revharvest::models::{RecordFilter, RecordType, SessionStatus};
use revharvest::provider::{Cursor, LookupQuery, Page, ProviderRegistry, Strategy};
use revharvest::utils::error::FetchError;
use revharvest::storage::{create_mock_repository, create_sqlite_repository};

use super::fixtures::{domains, page, scroll_page, settings, shared, StubProvider, STUB_PROVIDER};

/// Page 1 holds three domains derived from the server name
fn per_server_provider() -> StubProvider {
    StubProvider::new(|query, cursor| {
        Ok(match cursor {
            Cursor::Page(1) => page(domains(&format!("{}-", query.server), 0..3)),
            _ => Page::empty(),
        })
    })
}

fn harvester_with(provider: Arc<StubProvider>) -> Harvester {
    Harvester::new(
        create_mock_repository(),
        ProviderRegistry::new().with(provider),
        settings(),
        STUB_PROVIDER,
    )
}

#[tokio::test]
async fn test_harvest_lifecycle_on_sqlite() {
    let dir = TempDir::new().unwrap();
    let repository = create_sqlite_repository(dir.path().join("domains.db")).unwrap();
    let provider = shared(per_server_provider());
    let harvester = Harvester::new(
        repository,
        ProviderRegistry::new().with(provider.clone()),
        settings(),
        STUB_PROVIDER,
    );

    let id = harvester
        .start_harvest(HarvestRequest::new("  mx.example.com ", RecordType::Mx))
        .unwrap();
    assert!(id.starts_with("stub_mx_mx.example.com_"));
    assert!(harvester.wait(&id).await);

    let session = harvester.get_session(&id).unwrap().unwrap();
    assert_eq!(session.status, SessionStatus::Complete);
    assert_eq!(session.server, "mx.example.com");
    assert_eq!(session.total_domains, 3);
    assert_eq!(session.pages_fetched, 1);

    let progress = harvester.get_progress(&id).unwrap();
    assert_eq!(progress.total_domains, 3);
    assert_eq!(progress.record_type, RecordType::Mx);

    let records = harvester.list_records(&RecordFilter::default()).unwrap();
    assert_eq!(records.len(), 3);
    assert!(records
        .iter()
        .all(|r| r.mx.as_deref() == Some("mx.example.com") && r.ns.is_none()));
    assert!(records.iter().all(|r| r.domain.starts_with("http://")));
    assert!(records.iter().all(|r| r.session_id.as_deref() == Some(id.as_str())));

    let stats = harvester.get_stats().unwrap();
    assert_eq!(stats.total_records, 3);
    assert_eq!(stats.by_type.mx, 3);
    assert_eq!(stats.recent_sessions.len(), 1);

    // a second run finds nothing new
    let again = harvester
        .start_harvest(HarvestRequest::new("mx.example.com", RecordType::Mx))
        .unwrap();
    harvester.wait(&again).await;
    assert_eq!(harvester.get_session(&again).unwrap().unwrap().total_domains, 0);
    assert_eq!(harvester.get_stats().unwrap().total_records, 3);
}

#[tokio::test]
async fn test_concurrent_harvests_stay_separate() {
    let provider = shared(per_server_provider());
    let harvester = harvester_with(provider);

    let first = harvester
        .start_harvest(HarvestRequest::new("mx1.example.com", RecordType::Mx))
        .unwrap();
    let second = harvester
        .start_harvest(HarvestRequest::new("ns1.example.com", RecordType::Ns))
        .unwrap();
    assert_ne!(first, second);

    harvester.wait(&first).await;
    harvester.wait(&second).await;

    for id in [&first, &second] {
        let session = harvester.get_session(id).unwrap().unwrap();
        assert_eq!(session.status, SessionStatus::Complete);
        assert_eq!(session.total_domains, 3);
    }

    let mx_progress = harvester.get_progress(&first).unwrap();
    assert_eq!(mx_progress.server, "mx1.example.com");
    assert_eq!(mx_progress.record_type, RecordType::Mx);
    assert_eq!(mx_progress.total_domains, 3);

    let ns_progress = harvester.get_progress(&second).unwrap();
    assert_eq!(ns_progress.server, "ns1.example.com");
    assert_eq!(ns_progress.record_type, RecordType::Ns);
    assert_eq!(ns_progress.total_domains, 3);

    let ns_only = harvester
        .list_records(&RecordFilter {
            record_type: Some(RecordType::Ns),
            server: None,
        })
        .unwrap();
    assert_eq!(ns_only.len(), 3);
    assert!(ns_only.iter().all(|r| r.domain.contains("ns1.example.com-")));

    let by_server = harvester
        .list_records(&RecordFilter {
            record_type: None,
            server: Some("mx1.example.com".to_string()),
        })
        .unwrap();
    assert_eq!(by_server.len(), 3);
}

#[tokio::test]
async fn test_panicking_crawl_marks_session_failed() {
    let provider = shared(StubProvider::new(|_, _| panic!("provider exploded")));
    let harvester = harvester_with(provider);

    let id = harvester
        .start_harvest(HarvestRequest::new("mx.example.com", RecordType::Mx))
        .unwrap();
    harvester.wait(&id).await;

    let session = harvester.get_session(&id).unwrap().unwrap();
    assert_eq!(session.status, SessionStatus::Error);
    assert!(session.completed_at.is_some());
}

#[tokio::test]
async fn test_default_strategy_follows_provider() {
    let provider = shared(
        StubProvider::new(|_, cursor| match cursor {
            Cursor::OpenScroll(_) => Ok(scroll_page(domains("s", 0..2), None, None)),
            other => panic!("unexpected cursor: {other:?}"),
        })
        .preferring(Strategy::Scroll)
        .with_scroll_endpoints(1),
    );
    let harvester = harvester_with(provider.clone());

    let id = harvester
        .start_harvest(HarvestRequest::new("mx.example.com", RecordType::Mx))
        .unwrap();
    harvester.wait(&id).await;

    assert_eq!(provider.request_count(), 1);
    let session = harvester.get_session(&id).unwrap().unwrap();
    assert_eq!(session.status, SessionStatus::Complete);
    assert_eq!(session.total_domains, 2);
}

#[tokio::test]
async fn test_forced_strategy_and_max_pages() {
    let provider = shared(StubProvider::new(|_, cursor| match cursor {
        Cursor::Page(n) => Ok(page(domains(&format!("p{n}-"), 0..1))),
        other => panic!("unexpected cursor: {other:?}"),
    }));
    let harvester = harvester_with(provider.clone());

    let id = harvester
        .start_harvest(
            HarvestRequest::new("mx.example.com", RecordType::Mx)
                .with_strategy(Strategy::Paginate)
                .with_max_pages(5),
        )
        .unwrap();
    harvester.wait(&id).await;

    assert_eq!(provider.request_count(), 5);
    assert_eq!(harvester.get_session(&id).unwrap().unwrap().pages_fetched, 5);
}

#[tokio::test]
async fn test_invalid_requests_create_no_session() {
    let harvester = harvester_with(shared(per_server_provider()));

    let err = harvester
        .start_harvest(HarvestRequest::new("", RecordType::Mx))
        .unwrap_err();
    assert!(matches!(err, Error::InvalidRequest(_)));

    let err = harvester
        .start_harvest(HarvestRequest::new("mx.example.com", RecordType::Mx).with_provider("missing"))
        .unwrap_err();
    assert!(matches!(err, Error::Config(_)));

    assert!(harvester.get_stats().unwrap().recent_sessions.is_empty());
}

#[tokio::test]
async fn test_clear_all_resets_everything() {
    let harvester = harvester_with(shared(per_server_provider()));
    let id = harvester
        .start_harvest(HarvestRequest::new("mx.example.com", RecordType::Mx))
        .unwrap();
    harvester.wait(&id).await;

    let summary = harvester.clear_all().unwrap();
    assert_eq!(summary.domains_removed, 3);
    assert_eq!(summary.sessions_removed, 1);

    assert!(harvester.get_progress(&id).is_none());
    assert!(harvester.get_session(&id).unwrap().is_none());
    assert_eq!(harvester.get_stats().unwrap().total_records, 0);
}

/// Prefix `a*` holds two domains; every other filter combination is empty
fn segmented_responder(query: &LookupQuery, cursor: &Cursor) -> Result<Page, FetchError> {
    Ok(match (query.hostname_prefix.as_deref(), cursor) {
        (Some("a*"), Cursor::Page(1)) => page(domains("alpha", 0..2)),
        (None, Cursor::Page(1)) if query.page_size.is_none() => page(domains("plain", 0..2)),
        _ => Page::empty(),
    })
}

#[tokio::test]
async fn test_bypass_falls_back_to_pagination_without_segmentation() {
    let provider = shared(StubProvider::new(segmented_responder));
    let harvester = harvester_with(provider.clone());

    let id = harvester
        .start_harvest(
            HarvestRequest::new("mx.example.com", RecordType::Mx).with_strategy(Strategy::Bypass),
        )
        .unwrap();
    harvester.wait(&id).await;

    // one productive page then the empty streak, with no filters at all
    assert_eq!(provider.request_count(), 4);
    assert!(provider
        .requests()
        .iter()
        .all(|(q, _)| q.hostname_prefix.is_none() && q.page_size.is_none()));

    let session = harvester.get_session(&id).unwrap().unwrap();
    assert_eq!(session.status, SessionStatus::Complete);
    assert_eq!(session.total_domains, 2);
}

#[tokio::test]
async fn test_bypass_runs_segments_when_supported() {
    let provider = shared(StubProvider::new(segmented_responder).with_segmentation());
    let harvester = harvester_with(provider.clone());

    let id = harvester
        .start_harvest(
            HarvestRequest::new("mx.example.com", RecordType::Mx).with_strategy(Strategy::Bypass),
        )
        .unwrap();
    harvester.wait(&id).await;

    assert_eq!(provider.requests_for_prefix("a*"), 3);
    assert_eq!(provider.requests_for_prefix("z*"), 2);
    assert_eq!(harvester.get_session(&id).unwrap().unwrap().total_domains, 2);
}
