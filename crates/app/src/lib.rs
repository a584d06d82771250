//! `cosmosdemo-app` — sample run against a document store: ensure the `MainDB`
//! database and `Employee` container, then insert, read and query the sample
//! employees.

pub mod demo;
pub mod report;

pub use demo::{Demo, RunReport, Stage};
pub use report::QuerySummary;

use cosmosdemo_infra::{BackendConnector, Settings};

/// Load settings from the environment and run the demo once.
///
/// Configuration errors are handled like any other failure: logged, and
/// reported in the returned [`RunReport`].
pub async fn run_from_env() -> RunReport {
    match Settings::from_env() {
        Ok(settings) => {
            let connector = BackendConnector::from_settings(&settings);
            Demo::new(settings, connector).run().await
        }
        Err(err) => {
            let err = anyhow::Error::new(err).context("loading settings");
            report::run_failed(&err);
            tracing::info!("Closing the client");
            RunReport {
                stage: Stage::Closed,
                failure: Some(format!("{err:#}")),
                ..RunReport::default()
            }
        }
    }
}
