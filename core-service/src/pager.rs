//! # Pagination
//!
//! List endpoints answer in one of two shapes:
//!
//! - cursor style: `{"results": [...], "next": "<absolute url>"}`
//! - page style: `{"items": [...], "page": 1, "pages": 4, "size": 50}`
//!
//! [`Pager`] reads the items of a page and works out where the next page
//! lives. The retrieval methods on [`SimbaRequest`] drive it: the lazy
//! variants fetch pages one at a time in order and stop at the first empty
//! page; the eager variants return only the first page.
//!
//! Nothing is cached. Iterating again starts from page one with a new
//! client.

use bridge_traits::{
    connection::ConnectionConfig,
    http::{BlockingHttpClient, HttpClient, HttpMethod},
};
use core_runtime::{RetryingBlockingHttpClient, RetryingHttpClient};
use futures::stream::{self, BoxStream, StreamExt};
use serde_json::Value;
use std::collections::HashMap;
use tracing::debug;

use crate::error::{Result, SimbaError};
use crate::filter::QueryParams;
use crate::request::{decode, RequestOptions, SimbaRequest};

const DEFAULT_PAGE_SIZE: u64 = 50;

/// Where the next page is fetched from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextPage {
    /// Absolute URL supplied by the server, query included
    Url(String),
    /// Same endpoint with updated query parameters
    Query(QueryParams),
}

/// Reads both pagination shapes.
#[derive(Debug, Clone, Copy, Default)]
pub struct Pager;

impl Pager {
    /// Items on `page`; empty when neither `results` nor `items` has any.
    pub fn items(page: &Value) -> Vec<Value> {
        non_empty_list(page, "results")
            .or_else(|| non_empty_list(page, "items"))
            .cloned()
            .unwrap_or_default()
    }

    /// Location of the page after `page`, or `None` when it was the last.
    pub fn next(page: &Value, query: &QueryParams) -> Option<NextPage> {
        if non_empty_list(page, "results").is_some() {
            return page
                .get("next")
                .and_then(Value::as_str)
                .filter(|next| !next.is_empty())
                .map(|next| NextPage::Url(next.to_string()));
        }

        if non_empty_list(page, "items").is_some() {
            let current = number_field(page, "page").unwrap_or(1);
            let total = number_field(page, "pages").unwrap_or(1);
            if current < total {
                let size = number_field(page, "size").unwrap_or(DEFAULT_PAGE_SIZE);
                let mut query = query.clone();
                query.insert("page".to_string(), (current + 1).to_string());
                query.insert("size".to_string(), size.to_string());
                return Some(NextPage::Query(query));
            }
        }

        None
    }
}

fn non_empty_list<'v>(page: &'v Value, key: &str) -> Option<&'v Vec<Value>> {
    page.get(key)
        .and_then(Value::as_array)
        .filter(|list| !list.is_empty())
}

/// Numeric field that may arrive as a number or a numeric string.
fn number_field(page: &Value, key: &str) -> Option<u64> {
    match page.get(key)? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Iteration state shared by the stream and the blocking iterator.
struct PageCursor<'a, C> {
    request: SimbaRequest<'a>,
    headers: HashMap<String, String>,
    config: ConnectionConfig,
    client: Option<C>,
    query: QueryParams,
    next_url: Option<String>,
}

impl<'a, C> PageCursor<'a, C> {
    fn new(request: SimbaRequest<'a>, options: RequestOptions) -> Result<Self> {
        let config = request.connection_config(&options);
        let query = request.query.clone();
        let next_url = Some(request.url()?);
        Ok(Self {
            request,
            headers: options.headers,
            config,
            client: None,
            query,
            next_url,
        })
    }

    /// Record the page just fetched and return its items, or `None` when
    /// iteration is over.
    fn advance(&mut self, body: &Value) -> Result<Option<Vec<Value>>> {
        let items = Pager::items(body);
        if items.is_empty() {
            self.next_url = None;
            return Ok(None);
        }

        self.next_url = match Pager::next(body, &self.query) {
            Some(NextPage::Url(url)) => Some(url),
            Some(NextPage::Query(query)) => {
                self.query = query;
                Some(self.request.url_with(&self.query)?)
            }
            None => None,
        };
        debug!(
            items = items.len(),
            more = self.next_url.is_some(),
            "Fetched page"
        );
        Ok(Some(items))
    }

    fn missing_client() -> SimbaError {
        SimbaError::Unknown("Page client was not initialised".to_string())
    }
}

impl<'a> PageCursor<'a, RetryingHttpClient> {
    async fn fetch(&mut self, url: String) -> Result<Value> {
        if self.client.is_none() {
            self.request.authorize(&mut self.headers, &self.config).await?;
            self.client = Some(RetryingHttpClient::from_config(
                &self.config,
                self.request.ctx.factory(),
            )?);
        }
        let request = self.request.build(
            HttpMethod::Get,
            url,
            self.headers.clone(),
            None,
            None,
            &self.config,
        )?;
        let client = self.client.as_ref().ok_or_else(Self::missing_client)?;
        let response = client.execute(request).await?;
        decode(&response)
    }
}

impl<'a> PageCursor<'a, RetryingBlockingHttpClient> {
    fn fetch_blocking(&mut self, url: String) -> Result<Value> {
        if self.client.is_none() {
            self.request
                .authorize_blocking(&mut self.headers, &self.config)?;
            self.client = Some(RetryingBlockingHttpClient::from_config(
                &self.config,
                self.request.ctx.factory(),
            )?);
        }
        let request = self.request.build(
            HttpMethod::Get,
            url,
            self.headers.clone(),
            None,
            None,
            &self.config,
        )?;
        let client = self.client.as_ref().ok_or_else(Self::missing_client)?;
        let response = client.execute(request)?;
        decode(&response)
    }
}

/// Blocking page iterator returned by
/// [`SimbaRequest::retrieve_iter_blocking`].
///
/// Yields pages in order and ends after the last page, the first empty
/// page, or the first error.
pub struct PageIter<'a> {
    cursor: Option<PageCursor<'a, RetryingBlockingHttpClient>>,
    error: Option<SimbaError>,
}

impl Iterator for PageIter<'_> {
    type Item = Result<Vec<Value>>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(err) = self.error.take() {
            return Some(Err(err));
        }
        let cursor = self.cursor.as_mut()?;
        let Some(url) = cursor.next_url.take() else {
            self.cursor = None;
            return None;
        };

        let page = cursor
            .fetch_blocking(url)
            .and_then(|body| cursor.advance(&body));
        match page {
            Ok(Some(items)) => Some(Ok(items)),
            Ok(None) => {
                self.cursor = None;
                None
            }
            Err(err) => {
                self.cursor = None;
                Some(Err(err))
            }
        }
    }
}

impl<'a> SimbaRequest<'a> {
    /// Lazily fetch every page, in order.
    ///
    /// Login happens when the first page is polled. The stream ends after
    /// the last page or the first empty one, and after yielding an error.
    pub fn retrieve_iter(self, options: RequestOptions) -> BoxStream<'a, Result<Vec<Value>>> {
        let cursor = match PageCursor::<RetryingHttpClient>::new(self, options) {
            Ok(cursor) => cursor,
            Err(err) => return stream::once(async move { Err::<Vec<Value>, _>(err) }).boxed(),
        };

        stream::try_unfold(cursor, |mut cursor| async move {
            let Some(url) = cursor.next_url.take() else {
                return Ok(None);
            };
            let body = cursor.fetch(url).await?;
            Ok(cursor.advance(&body)?.map(|items| (items, cursor)))
        })
        .boxed()
    }

    /// Blocking variant of [`retrieve_iter`](Self::retrieve_iter).
    pub fn retrieve_iter_blocking(self, options: RequestOptions) -> PageIter<'a> {
        match PageCursor::new(self, options) {
            Ok(cursor) => PageIter {
                cursor: Some(cursor),
                error: None,
            },
            Err(err) => PageIter {
                cursor: None,
                error: Some(err),
            },
        }
    }

    /// Items of the first page only.
    pub async fn retrieve(&self, options: RequestOptions) -> Result<Vec<Value>> {
        let body = self
            .clone()
            .with_method(HttpMethod::Get)
            .send(options)
            .await?;
        Ok(Pager::items(&body))
    }

    /// Blocking variant of [`retrieve`](Self::retrieve).
    pub fn retrieve_blocking(&self, options: RequestOptions) -> Result<Vec<Value>> {
        let body = self
            .clone()
            .with_method(HttpMethod::Get)
            .send_blocking(options)?;
        Ok(Pager::items(&body))
    }
}
