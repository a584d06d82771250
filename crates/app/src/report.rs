//! Human-readable reporting of operation outcomes.
//!
//! Everything here only logs or aggregates; nothing feeds back into control flow.

use std::time::Duration;

use tracing::{debug, error, info};

/// Render ids as `[a, b, c]`.
pub fn format_ids<S: AsRef<str>>(ids: &[S]) -> String {
    let joined = ids.iter().map(AsRef::as_ref).collect::<Vec<_>>().join(", ");
    format!("[{joined}]")
}

pub fn sample_ids<S: AsRef<str>>(ids: &[S]) {
    info!(count = ids.len(), "Generated item ids {}", format_ids(ids));
}

pub fn database_ready(id: &str, created: bool, request_charge: f64) {
    info!(database = id, created, request_charge, "Checking database {id} completed!");
}

pub fn container_ready(id: &str, created: bool, request_charge: f64) {
    info!(container = id, created, request_charge, "Checking container {id} completed!");
}

pub fn item_created(id: &str, request_charge: f64, duration: Duration) {
    info!(
        item = id,
        request_charge,
        "Created item with request charge of {request_charge} within duration {duration:?}"
    );
}

pub fn items_created(count: usize, total_request_charge: f64) {
    info!(
        count,
        total_request_charge,
        "Created {count} items with total request charge of {total_request_charge}"
    );
}

pub fn item_read(id: &str, request_charge: f64, duration: Duration) {
    info!(
        item = id,
        request_charge,
        "Item successfully read with id {id} with a charge of {request_charge} within {duration:?}"
    );
}

pub fn item_read_failed(id: &str, err: &dyn std::error::Error) {
    error!(item = id, error = %err, "Read Item failed with {err}");
}

pub fn run_failed(err: &anyhow::Error) {
    error!(error = %format!("{err:#}"), "Demo failed with {err:#}");
}

/// Running totals over the pages of one query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuerySummary {
    pub pages: usize,
    pub items: usize,
    /// Sum of the page charges seen so far.
    pub request_charge: f64,
    pub item_ids: Vec<String>,
}

impl QuerySummary {
    /// Fold one page into the totals and log it.
    pub fn record_page(&mut self, ids: Vec<String>, request_charge: f64, metrics: Option<&str>) {
        self.pages += 1;
        self.items += ids.len();
        self.request_charge += request_charge;

        info!(
            page = self.pages,
            items = ids.len(),
            request_charge,
            cumulative_request_charge = self.request_charge,
            "Got a page of query result with {} item(s) and request charge of {}",
            ids.len(),
            request_charge
        );
        info!("Item Ids {}", format_ids(&ids));
        if let Some(metrics) = metrics {
            debug!(page = self.pages, metrics, "query metrics");
        }

        self.item_ids.extend(ids);
    }

    /// Settle the total on what the query was charged overall, including pages
    /// that came back empty, and log it.
    pub fn finish(&mut self, total_request_charge: f64) {
        self.request_charge = total_request_charge;
        info!(
            pages = self.pages,
            items = self.items,
            request_charge = self.request_charge,
            "Query returned {} item(s) in {} page(s)",
            self.items,
            self.pages
        );
    }
}
