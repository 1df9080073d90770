//! SecurityTrails domain search
//!
//! Offset pages go through `POST /domains/list` with a structured filter.
//! Scrolls are opened against the first endpoint that accepts the query DSL
//! (`mx = 'host'`), then continued with `GET /scroll/{token}`.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use super::envelope::parse_records;
use super::{Cursor, LookupQuery, Page, ReverseLookupProvider, ScrollEndpoint, Strategy};
use crate::crawler::fetcher::ApiFetcher;
use crate::utils::error::FetchError;

pub const PROVIDER_NAME: &str = "securitytrails";

/// Credential header
pub const API_KEY_HEADER: &str = "APIKEY";

/// Request shape of a scroll-opening endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OpenStyle {
    /// `{query}` body, scroll switched on through query parameters
    QueryParams,
    /// `{query, scroll: true, include_inactive: false}` body
    Body,
}

struct OpenEndpoint {
    label: &'static str,
    path: &'static str,
    style: OpenStyle,
}

const OPEN_ENDPOINTS: [OpenEndpoint; 3] = [
    OpenEndpoint {
        label: "domains/list (scroll)",
        path: "domains/list",
        style: OpenStyle::QueryParams,
    },
    OpenEndpoint {
        label: "search/list",
        path: "search/list",
        style: OpenStyle::Body,
    },
    OpenEndpoint {
        label: "domains/list-backup",
        path: "domains/list-backup",
        style: OpenStyle::Body,
    },
];

pub struct SecurityTrailsProvider {
    fetcher: ApiFetcher,
}

impl SecurityTrailsProvider {
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self, FetchError> {
        let fetcher = ApiFetcher::new(base_url, timeout)?.with_header(API_KEY_HEADER, api_key)?;
        Ok(Self { fetcher })
    }

    pub fn with_user_agent(mut self, user_agent: &str) -> Result<Self, FetchError> {
        self.fetcher = self.fetcher.with_user_agent(user_agent)?;
        Ok(self)
    }

    /// Query DSL expression for the scroll endpoints
    pub fn dsl_query(query: &LookupQuery) -> String {
        let server = query.server.replace('\\', "\\\\").replace('\'', "\\'");
        format!("{} = '{server}'", query.record_type.as_str())
    }

    /// Structured filter body for offset pages
    pub fn filter_body(query: &LookupQuery, page: u32) -> Value {
        let mut filter = Map::new();
        filter.insert(query.record_type.as_str().to_string(), json!(query.server));
        if let Some(prefix) = &query.hostname_prefix {
            filter.insert("hostname".to_string(), json!(prefix));
        }

        let mut body = json!({
            "filter": filter,
            "page": page,
            "scroll": false,
        });
        if let Some(limit) = query.page_size {
            body["limit"] = json!(limit);
        }
        body
    }

    async fn fetch_offset(&self, query: &LookupQuery, page: u32) -> Result<Page, FetchError> {
        let body = Self::filter_body(query, page);
        let value = self.fetcher.post_json("domains/list", &[], &body).await?;
        let mut parsed = parse_records(&value)?;
        // Offset pages never continue as a scroll
        parsed.next = None;
        Ok(parsed)
    }

    async fn open_scroll(
        &self,
        query: &LookupQuery,
        endpoint: &ScrollEndpoint,
    ) -> Result<Page, FetchError> {
        let endpoint_def = OPEN_ENDPOINTS.get(endpoint.index).ok_or_else(|| {
            FetchError::InvalidUrl(format!("unknown scroll endpoint #{}", endpoint.index))
        })?;
        let dsl = Self::dsl_query(query);

        let value = match endpoint_def.style {
            OpenStyle::QueryParams => {
                let params = [("include_ips", "false"), ("page", "1"), ("scroll", "true")];
                self.fetcher
                    .post_json(endpoint_def.path, &params, &json!({ "query": dsl }))
                    .await?
            }
            OpenStyle::Body => {
                let body = json!({
                    "query": dsl,
                    "scroll": true,
                    "include_inactive": false,
                });
                self.fetcher.post_json(endpoint_def.path, &[], &body).await?
            }
        };
        parse_records(&value)
    }

    async fn continue_scroll(&self, token: &str) -> Result<Page, FetchError> {
        let value = self
            .fetcher
            .get_json(&format!("scroll/{token}"), &[])
            .await?;
        parse_records(&value)
    }
}

#[async_trait]
impl ReverseLookupProvider for SecurityTrailsProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    fn preferred_strategy(&self) -> Strategy {
        Strategy::Scroll
    }

    fn supports_segmentation(&self) -> bool {
        true
    }

    fn scroll_endpoints(&self) -> Vec<ScrollEndpoint> {
        OPEN_ENDPOINTS
            .iter()
            .enumerate()
            .map(|(index, e)| ScrollEndpoint {
                index,
                label: e.label.to_string(),
            })
            .collect()
    }

    async fn fetch_page(&self, query: &LookupQuery, cursor: &Cursor) -> Result<Page, FetchError> {
        match cursor {
            Cursor::Page(page) => self.fetch_offset(query, *page).await,
            Cursor::OpenScroll(endpoint) => self.open_scroll(query, endpoint).await,
            Cursor::Continue(token) => self.continue_scroll(token).await,
        }
    }
}
