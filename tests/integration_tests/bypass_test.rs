//! Bypass crawling scenarios

use revharvest::crawler::{HarvestSettings, MultiStrategyCrawler, StopReason};
use revharvest::models::{NewDomainRecord, RecordType, SessionStatus};
use revharvest::provider::{Cursor, Page, Strategy};

use super::fixtures::{domains, page, pipeline, services, settings, StubProvider, SERVER, STUB_PROVIDER};

fn page_number(cursor: &Cursor) -> u32 {
    match cursor {
        Cursor::Page(n) => *n,
        other => panic!("unexpected cursor: {other:?}"),
    }
}

#[tokio::test]
async fn test_only_new_domains_are_persisted() {
    let services = services(settings());
    let existing: Vec<NewDomainRecord> = (0..5)
        .map(|i| {
            NewDomainRecord::new(
                format!("http://old{i}.com"),
                RecordType::Mx,
                SERVER,
                STUB_PROVIDER,
            )
        })
        .collect();
    services.repository.insert_domains(&existing).unwrap();

    let provider = StubProvider::new(|query, cursor| {
        Ok(
            if query.page_size == Some(500) && page_number(cursor) == 1 {
                let mut records = domains("old", 0..5);
                records.extend(domains("new", 0..3));
                page(records)
            } else {
                Page::empty()
            },
        )
    });

    let mut pipeline = pipeline(&services, Strategy::Bypass);
    assert_eq!(pipeline.seed_existing().unwrap(), 5);

    let stop = MultiStrategyCrawler::new(&provider, &services.settings)
        .run(&pipeline.job().query(), &mut pipeline)
        .await
        .unwrap();

    assert_eq!(stop, StopReason::SegmentsExhausted);
    let report = pipeline.report(stop);
    assert_eq!(report.new_records, 3);
    assert_eq!(report.unique_observed, 8);
    assert_eq!(report.counters.already_stored, 5);
    assert_eq!(services.repository.count_domains().unwrap(), 8);

    let session = services
        .sessions
        .get(&report.session_id)
        .unwrap()
        .unwrap();
    assert_eq!(session.status, SessionStatus::Complete);
    assert_eq!(session.total_domains, 3);
}

#[tokio::test]
async fn test_seeded_domains_spread_across_segments() {
    let services = services(settings());
    let existing: Vec<NewDomainRecord> = (0..5)
        .map(|i| {
            NewDomainRecord::new(
                format!("http://old{i}.com"),
                RecordType::Mx,
                SERVER,
                STUB_PROVIDER,
            )
        })
        .collect();
    services.repository.insert_domains(&existing).unwrap();

    let provider = StubProvider::new(|query, cursor| {
        Ok(match (query.hostname_prefix.as_deref(), page_number(cursor)) {
            (Some("o*"), 1) => page(domains("old", 0..5)),
            (Some("n*"), 1) => page(domains("new", 0..3)),
            _ => Page::empty(),
        })
    });

    let mut pipeline = pipeline(&services, Strategy::Bypass);
    pipeline.seed_existing().unwrap();
    let stop = MultiStrategyCrawler::new(&provider, &services.settings)
        .run(&pipeline.job().query(), &mut pipeline)
        .await
        .unwrap();

    let report = pipeline.report(stop);
    assert_eq!(report.new_records, 3);
    assert_eq!(report.counters.already_stored, 5);
    assert_eq!(services.repository.count_domains().unwrap(), 8);
    assert_eq!(provider.requests_for_prefix("n*"), 3);
    assert_eq!(provider.requests_for_prefix("o*"), 3);

    let session = services
        .sessions
        .get(&report.session_id)
        .unwrap()
        .unwrap();
    assert_eq!(session.total_domains, 3);
}

#[tokio::test]
async fn test_segments_stop_after_two_empty_pages() {
    let provider = StubProvider::new(|query, cursor| {
        Ok(
            if query.hostname_prefix.as_deref() == Some("a*") && page_number(cursor) == 1 {
                page(domains("alpha", 0..2))
            } else {
                Page::empty()
            },
        )
    });
    let services = services(settings());
    let mut pipeline = pipeline(&services, Strategy::Bypass);

    MultiStrategyCrawler::new(&provider, &services.settings)
        .run(&pipeline.job().query(), &mut pipeline)
        .await
        .unwrap();

    assert_eq!(provider.requests_for_prefix("a*"), 3);
    assert_eq!(provider.requests_for_prefix("b*"), 2);
    assert_eq!(provider.requests_for_prefix("9*"), 2);

    // page-size probes use the sequential threshold of three
    let probes = provider
        .requests()
        .iter()
        .filter(|(q, _)| q.page_size.is_some())
        .count();
    assert_eq!(probes, 6);
    assert_eq!(provider.request_count(), 6 + 3 + 35 * 2);
    assert_eq!(pipeline.inserted(), 2);
}

#[tokio::test]
async fn test_prefix_order() {
    let provider = StubProvider::new(|_, _| Ok(Page::empty()));
    let services = services(settings());
    let mut pipeline = pipeline(&services, Strategy::Bypass);

    MultiStrategyCrawler::new(&provider, &services.settings)
        .run(&pipeline.job().query(), &mut pipeline)
        .await
        .unwrap();

    let mut prefixes: Vec<String> = Vec::new();
    for (query, _) in provider.requests() {
        if let Some(prefix) = query.hostname_prefix {
            if prefixes.last() != Some(&prefix) {
                prefixes.push(prefix);
            }
        }
    }
    assert_eq!(prefixes.len(), 36);
    assert_eq!(prefixes.first().map(String::as_str), Some("a*"));
    assert_eq!(prefixes[26], "0*");
    assert_eq!(prefixes.last().map(String::as_str), Some("9*"));
}

#[tokio::test]
async fn test_domain_ceiling_skips_remaining_segments() {
    let provider = StubProvider::new(|query, cursor| {
        Ok(if query.page_size == Some(500) && page_number(cursor) == 1 {
            page(domains("bulk", 0..6))
        } else {
            Page::empty()
        })
    });
    let settings = HarvestSettings {
        soft_domain_ceiling: 5,
        ..settings()
    };
    let services = services(settings);
    let mut pipeline = pipeline(&services, Strategy::Bypass);

    let stop = MultiStrategyCrawler::new(&provider, &services.settings)
        .run(&pipeline.job().query(), &mut pipeline)
        .await
        .unwrap();

    assert_eq!(stop, StopReason::DomainCeiling);
    assert!(provider
        .requests()
        .iter()
        .all(|(q, _)| q.page_size == Some(500)));
    assert_eq!(pipeline.inserted(), 6);

    let session = services
        .sessions
        .get(&pipeline.job().session_id)
        .unwrap()
        .unwrap();
    assert_eq!(session.status, SessionStatus::Complete);
}

#[tokio::test]
async fn test_domain_ceiling_ignores_stored_and_needs_excess() {
    let services = services(HarvestSettings {
        soft_domain_ceiling: 5,
        ..settings()
    });
    let existing: Vec<NewDomainRecord> = (0..4)
        .map(|i| {
            NewDomainRecord::new(
                format!("http://bulk{i}.com"),
                RecordType::Mx,
                SERVER,
                STUB_PROVIDER,
            )
        })
        .collect();
    services.repository.insert_domains(&existing).unwrap();

    // nine distinct domains, four already stored: five new is not above the ceiling
    let provider = StubProvider::new(|query, cursor| {
        Ok(if query.page_size == Some(500) && page_number(cursor) == 1 {
            page(domains("bulk", 0..9))
        } else {
            Page::empty()
        })
    });

    let mut pipeline = pipeline(&services, Strategy::Bypass);
    pipeline.seed_existing().unwrap();
    let stop = MultiStrategyCrawler::new(&provider, &services.settings)
        .run(&pipeline.job().query(), &mut pipeline)
        .await
        .unwrap();

    assert_eq!(stop, StopReason::SegmentsExhausted);
    assert_eq!(pipeline.inserted(), 5);
    assert_eq!(provider.requests_for_prefix("9*"), 2);
}

#[tokio::test]
async fn test_segment_page_cap() {
    let provider = StubProvider::new(|query, cursor| {
        let n = page_number(cursor);
        Ok(if query.page_size == Some(500) {
            page(domains(&format!("p{n}-"), 0..2))
        } else {
            Page::empty()
        })
    });
    let settings = HarvestSettings {
        bypass_page_cap: 3,
        ..settings()
    };
    let services = services(settings);
    let mut pipeline = pipeline(&services, Strategy::Bypass);

    MultiStrategyCrawler::new(&provider, &services.settings)
        .run(&pipeline.job().query(), &mut pipeline)
        .await
        .unwrap();

    let capped = provider
        .requests()
        .iter()
        .filter(|(q, _)| q.page_size == Some(500))
        .count();
    assert_eq!(capped, 3);
    assert_eq!(pipeline.inserted(), 6);
    // cumulative: one per productive page
    assert_eq!(pipeline.pages_fetched(), 3);
}
