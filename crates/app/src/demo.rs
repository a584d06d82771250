//! Demo orchestration: connect, ensure schema, then insert/read/query the
//! sample employees.

use anyhow::Context;
use tracing::{debug, info};

use cosmosdemo_core::employee::PARTITION_KEY_PATH;
use cosmosdemo_core::{Employee, EmployeeId, Entity, employees};
use cosmosdemo_infra::{
    ContainerHandle, ContainerProperties, Connector, DocumentClient, QueryOptions, Settings,
    Throughput,
};

use crate::report::{self, QuerySummary};

pub const DATABASE_NAME: &str = "MainDB";
pub const CONTAINER_NAME: &str = "Employee";
pub const THROUGHPUT_RU: u32 = 400;
pub const QUERY_TEXT: &str = "SELECT * FROM Family";

/// Where a run got to. Stages only move forward.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum Stage {
    #[default]
    Start,
    ClientBuilt,
    DatabaseEnsured,
    ContainerEnsured,
    ItemsCreated,
    InsertSkipped,
    Read,
    Queried,
    Closed,
}

/// Outcome of one run.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    /// Current stage; `Closed` once `run` returns.
    pub stage: Stage,
    /// Last stage completed before cleanup started.
    pub completed: Stage,
    /// Whether a client was released during cleanup.
    pub released: bool,
    /// Top-level failure, rendered with its causes.
    pub failure: Option<String>,
    pub database_created: Option<bool>,
    pub container_created: Option<bool>,
    pub generated_ids: Vec<EmployeeId>,
    pub items_created: usize,
    pub items_read: usize,
    pub query: Option<QuerySummary>,
}

impl RunReport {
    pub fn succeeded(&self) -> bool {
        self.failure.is_none()
    }

    /// Process exit status. Always `0`: failures are logged, not signalled.
    pub fn exit_status(&self) -> u8 {
        0
    }
}

/// Runs the demo against whatever store `connector` yields.
pub struct Demo<C> {
    settings: Settings,
    connector: C,
    client: Option<DocumentClient>,
    report: RunReport,
}

impl<C: Connector> Demo<C> {
    pub fn new(settings: Settings, connector: C) -> Self {
        Self {
            settings,
            connector,
            client: None,
            report: RunReport::default(),
        }
    }

    /// Run every enabled step, then release the client whatever happened.
    pub async fn run(mut self) -> RunReport {
        info!("Starting demo");
        match self.get_started().await {
            Ok(()) => info!("Demo complete, please hold while resources are released"),
            Err(err) => {
                report::run_failed(&err);
                self.report.failure = Some(format!("{err:#}"));
            }
        }

        info!("Closing the client");
        self.close();
        self.report
    }

    fn advance(&mut self, stage: Stage) {
        debug!(from = ?self.report.stage, to = ?stage, "stage");
        self.report.stage = stage;
    }

    fn client(&self) -> anyhow::Result<&DocumentClient> {
        self.client.as_ref().context("client not built")
    }

    async fn get_started(&mut self) -> anyhow::Result<()> {
        info!("Using endpoint: {}", self.settings.client.endpoint);

        let client = self
            .connector
            .connect(&self.settings.client)
            .await
            .context("building client")?;
        self.client = Some(client);
        self.advance(Stage::ClientBuilt);

        let container = self.create_database_and_container().await?;

        let employees = employees::sample_employees();
        self.report.generated_ids = employees.iter().map(|e| e.id().clone()).collect();
        report::sample_ids(&self.report.generated_ids);

        if self.settings.create_items {
            self.create_employees(&container, &employees).await?;
            self.advance(Stage::ItemsCreated);
        } else {
            debug!("item creation disabled");
            self.advance(Stage::InsertSkipped);
        }

        info!("Reading items.");
        self.read_items(&container, &employees).await;
        self.advance(Stage::Read);

        info!("Querying items.");
        self.query_items(&container).await?;
        self.advance(Stage::Queried);

        Ok(())
    }

    async fn create_database_and_container(&mut self) -> anyhow::Result<ContainerHandle> {
        info!("Create database {DATABASE_NAME} if not exists.");
        let (database, db_created) = {
            let client = self.client()?;
            let response = client
                .create_database_if_not_exists(DATABASE_NAME)
                .await
                .with_context(|| format!("creating database {DATABASE_NAME}"))?;
            report::database_ready(
                &response.resource.id,
                response.created,
                response.request_charge,
            );
            (client.database(response.resource.id), response.created)
        };
        self.report.database_created = Some(db_created);
        self.advance(Stage::DatabaseEnsured);

        info!("Create container {CONTAINER_NAME} if not exists.");
        let (container, container_created) = {
            let client = self.client()?;
            let properties = ContainerProperties::new(CONTAINER_NAME, PARTITION_KEY_PATH);
            let response = client
                .create_container_if_not_exists(
                    &database,
                    &properties,
                    Throughput::Manual(THROUGHPUT_RU),
                )
                .await
                .with_context(|| format!("creating container {CONTAINER_NAME}"))?;
            report::container_ready(
                &response.resource.id,
                response.created,
                response.request_charge,
            );
            (client.container(&database, response.resource.id), response.created)
        };
        self.report.container_created = Some(container_created);
        self.advance(Stage::ContainerEnsured);

        Ok(container)
    }

    async fn create_employees(
        &mut self,
        container: &ContainerHandle,
        employees: &[Employee],
    ) -> anyhow::Result<()> {
        {
            let client = self.client()?;
            let mut total_request_charge = 0.0;
            for employee in employees {
                let response = client
                    .create_item(container, &employee.partition_key(), employee)
                    .await
                    .with_context(|| format!("creating item {}", employee.id()))?;
                report::item_created(
                    employee.id_str(),
                    response.request_charge,
                    response.duration,
                );
                total_request_charge += response.request_charge;
            }
            report::items_created(employees.len(), total_request_charge);
        }
        self.report.items_created = employees.len();
        Ok(())
    }

    /// Point reads by id + partition key. Failures are logged per item and never
    /// abort the run.
    async fn read_items(&mut self, container: &ContainerHandle, employees: &[Employee]) {
        if !self.settings.read_items {
            debug!("point reads disabled");
            return;
        }
        let Some(client) = self.client.as_ref() else {
            return;
        };

        let mut read = 0;
        for employee in employees {
            match client
                .read_item::<Employee>(container, employee.id_str(), &employee.partition_key())
                .await
            {
                Ok(response) => {
                    read += 1;
                    report::item_read(
                        response.resource.id_str(),
                        response.request_charge,
                        response.duration,
                    );
                }
                Err(err) => report::item_read_failed(employee.id_str(), &err),
            }
        }
        self.report.items_read = read;
    }

    async fn query_items(&mut self, container: &ContainerHandle) -> anyhow::Result<()> {
        let options = QueryOptions {
            max_item_count: self.settings.page_size,
            populate_query_metrics: true,
            partition_key: None,
        };

        let summary = {
            let client = self.client()?;
            let mut pager = client.query_items::<Employee>(container, QUERY_TEXT, options);
            let mut summary = QuerySummary::default();
            while let Some(page) = pager.next_page().await {
                let page = page.with_context(|| format!("querying '{QUERY_TEXT}'"))?;
                let ids = page.items.iter().map(|e| e.id_str().to_string()).collect();
                summary.record_page(ids, page.request_charge, page.query_metrics.as_deref());
            }
            summary.finish(pager.total_request_charge());
            summary
        };

        self.report.query = Some(summary);
        Ok(())
    }

    /// Release the client if one was built. Runs once per demo.
    fn close(&mut self) {
        if let Some(client) = self.client.take() {
            self.report.released = client.close();
        }
        self.report.completed = self.report.stage;
        self.advance(Stage::Closed);
    }
}
