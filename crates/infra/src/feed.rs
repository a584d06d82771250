//! Paged query iteration.

use std::marker::PhantomData;

use serde::de::DeserializeOwned;

use crate::client::DocumentClient;
use crate::store::{ContainerHandle, FeedPage, QueryOptions, StoreError};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum PagerState {
    NotStarted,
    InProgress,
    Done,
}

/// Forward-only pages of a query, fetched on demand.
///
/// Each [`next_page`](FeedPager::next_page) call issues at most one request
/// per page. Empty pages are skipped (their charge is carried into the next page
/// returned). After the last page, or after an error, the pager yields `None`
/// forever; it cannot be rewound.
pub struct FeedPager<'a, T> {
    client: &'a DocumentClient,
    container: ContainerHandle,
    query: String,
    options: QueryOptions,
    continuation: Option<String>,
    state: PagerState,
    carried_charge: f64,
    total_charge: f64,
    _item: PhantomData<fn() -> T>,
}

impl<'a, T: DeserializeOwned> FeedPager<'a, T> {
    pub(crate) fn new(
        client: &'a DocumentClient,
        container: ContainerHandle,
        query: String,
        options: QueryOptions,
    ) -> Self {
        Self {
            client,
            container,
            query,
            options,
            continuation: None,
            state: PagerState::NotStarted,
            carried_charge: 0.0,
            total_charge: 0.0,
            _item: PhantomData,
        }
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn is_done(&self) -> bool {
        self.state == PagerState::Done
    }

    /// Request units charged for every page fetched so far, skipped ones included.
    pub fn total_request_charge(&self) -> f64 {
        self.total_charge
    }

    pub async fn next_page(&mut self) -> Option<Result<FeedPage<T>, StoreError>> {
        loop {
            let continuation = match self.state {
                PagerState::Done => return None,
                PagerState::NotStarted => None,
                PagerState::InProgress => self.continuation.clone(),
            };

            let client = self.client;
            let store = match client.store() {
                Ok(store) => store,
                Err(e) => {
                    self.state = PagerState::Done;
                    return Some(Err(e));
                }
            };

            let page = match store
                .query_page(&self.container, &self.query, &self.options, continuation.as_deref())
                .await
            {
                Ok(page) => page,
                Err(e) => {
                    self.state = PagerState::Done;
                    return Some(Err(e));
                }
            };

            self.total_charge += page.request_charge;
            self.continuation = page.continuation.clone();
            self.state = if self.continuation.is_some() {
                PagerState::InProgress
            } else {
                PagerState::Done
            };

            if page.items.is_empty() {
                self.carried_charge += page.request_charge;
                continue;
            }

            let carried = std::mem::take(&mut self.carried_charge);
            let typed = page.try_map(|item| {
                serde_json::from_value::<T>(item)
                    .map_err(|e| StoreError::Serialization(e.to_string()))
            });
            return Some(match typed {
                Ok(mut page) => {
                    page.request_charge += carried;
                    Ok(page)
                }
                Err(e) => {
                    self.state = PagerState::Done;
                    Err(e)
                }
            });
        }
    }

    /// Drain the remaining pages into one list of items.
    pub async fn collect_items(mut self) -> Result<Vec<T>, StoreError> {
        let mut items = Vec::new();
        while let Some(page) = self.next_page().await {
            items.extend(page?.items);
        }
        Ok(items)
    }
}
