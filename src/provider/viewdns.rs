//! ViewDNS reverse MX / reverse NS lookups
//!
//! `GET {base}/reversemx/?mx=<server>&apikey=<key>&output=json&page=<n>`
//! (`/reversens/?ns=` for name servers). Offset pages only.

use std::time::Duration;

use async_trait::async_trait;

use super::envelope::parse_simple;
use super::{Cursor, LookupQuery, Page, ReverseLookupProvider};
use crate::crawler::fetcher::ApiFetcher;
use crate::models::RecordType;
use crate::utils::error::FetchError;

pub const PROVIDER_NAME: &str = "viewdns";

pub struct ViewDnsProvider {
    fetcher: ApiFetcher,
    api_key: String,
}

impl ViewDnsProvider {
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self, FetchError> {
        Ok(Self {
            fetcher: ApiFetcher::new(base_url, timeout)?,
            api_key: api_key.to_string(),
        })
    }

    pub fn with_user_agent(mut self, user_agent: &str) -> Result<Self, FetchError> {
        self.fetcher = self.fetcher.with_user_agent(user_agent)?;
        Ok(self)
    }

    fn endpoint(record_type: RecordType) -> &'static str {
        match record_type {
            RecordType::Mx => "reversemx/",
            RecordType::Ns => "reversens/",
        }
    }
}

#[async_trait]
impl ReverseLookupProvider for ViewDnsProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    async fn fetch_page(&self, query: &LookupQuery, cursor: &Cursor) -> Result<Page, FetchError> {
        let Cursor::Page(page) = cursor else {
            return Err(FetchError::UnsupportedCursor {
                provider: PROVIDER_NAME.to_string(),
                cursor: cursor.kind(),
            });
        };

        if query.hostname_prefix.is_some() || query.page_size.is_some() {
            tracing::debug!(query = %query.label(), "ViewDNS ignores hostname and page size filters");
        }

        let page = page.to_string();
        let params = [
            (query.record_type.as_str(), query.server.as_str()),
            ("apikey", self.api_key.as_str()),
            ("output", "json"),
            ("page", page.as_str()),
        ];

        let value = self
            .fetcher
            .get_json(Self::endpoint(query.record_type), &params)
            .await?;
        parse_simple(&value)
    }
}
