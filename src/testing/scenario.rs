//! Create, read back, update, search and delete one record

use super::assertions::{assert_read_result, assert_write_ok, contains_record};
use crate::cancel::CancellationToken;
use crate::connector::{Connector, DeleteParams, Filter, ReadParams, SearchParams, WriteParams, WriteResult};
use crate::types::JsonValue;
use anyhow::{ensure, Context, Result};
use tracing::{debug, info};

const DEFAULT_MAX_PAGES: usize = 5;

/// A record lifecycle to run against a connector
#[derive(Debug, Clone)]
pub struct CrudScenario {
    object: String,
    create: JsonValue,
    update: JsonValue,
    id_field: String,
    fields: Vec<String>,
    search: Option<Filter>,
    max_pages: usize,
}

/// What a scenario observed
#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioReport {
    /// Id of the created record
    pub record_id: String,
    pub created: WriteResult,
    pub updated: WriteResult,
    /// Pages read before the record was found (or the page limit hit)
    pub pages_read: usize,
    /// Whether the read-back found the record
    pub found_in_read: bool,
    /// Rows returned by the search step, when one was configured
    pub search_rows: Option<usize>,
    pub deleted: bool,
}

impl CrudScenario {
    /// Scenario that creates `create`, then applies `update`
    pub fn new(object: impl Into<String>, create: JsonValue, update: JsonValue) -> Self {
        Self {
            object: object.into(),
            create,
            update,
            id_field: "id".to_string(),
            fields: Vec::new(),
            search: None,
            max_pages: DEFAULT_MAX_PAGES,
        }
    }

    /// Record key compared against the created id during read-back
    #[must_use]
    pub fn id_field(mut self, field: impl Into<String>) -> Self {
        self.id_field = field.into();
        self
    }

    /// Fields requested by the read and search steps
    #[must_use]
    pub fn fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Run a search step with this filter
    #[must_use]
    pub fn search(mut self, filter: Filter) -> Self {
        self.search = Some(filter);
        self
    }

    /// Pages to scan while looking for the created record
    #[must_use]
    pub fn max_pages(mut self, pages: usize) -> Self {
        self.max_pages = pages.max(1);
        self
    }

    /// Run every step, stopping at the first failure
    pub async fn run(&self, connector: &dyn Connector, ctx: &CancellationToken) -> Result<ScenarioReport> {
        info!(provider = connector.provider(), object = %self.object, "Running CRUD scenario");

        let created = connector
            .write(ctx, &WriteParams::create(&self.object, self.create.clone()))
            .await
            .with_context(|| format!("create {}", self.object))?;
        assert_write_ok(&created).context("create")?;
        let record_id = created.record_id.clone();
        debug!(%record_id, "Created record");

        let (pages_read, found_in_read) = self.read_back(connector, ctx, &record_id).await?;

        let updated = connector
            .write(ctx, &WriteParams::update(&self.object, &record_id, self.update.clone()))
            .await
            .with_context(|| format!("update {} {record_id}", self.object))?;
        assert_write_ok(&updated).context("update")?;
        ensure!(
            updated.record_id == record_id,
            "update returned record id {} instead of {record_id}",
            updated.record_id
        );

        let search_rows = match &self.search {
            Some(filter) => {
                let params = SearchParams::new(&self.object)
                    .fields(self.fields.iter().cloned())
                    .filter(filter.clone());
                let page = connector
                    .search(ctx, &params)
                    .await
                    .with_context(|| format!("search {}", self.object))?;
                assert_read_result(&page).context("search")?;
                Some(page.rows)
            }
            None => None,
        };

        let deleted = connector
            .delete(ctx, &DeleteParams::new(&self.object, &record_id))
            .await
            .with_context(|| format!("delete {} {record_id}", self.object))?
            .success;
        ensure!(deleted, "delete of {record_id} reported failure");

        Ok(ScenarioReport {
            record_id,
            created,
            updated,
            pages_read,
            found_in_read,
            search_rows,
            deleted,
        })
    }

    async fn read_back(
        &self,
        connector: &dyn Connector,
        ctx: &CancellationToken,
        record_id: &str,
    ) -> Result<(usize, bool)> {
        let mut params = ReadParams::new(&self.object).fields(self.fields.iter().cloned());
        for page_number in 1..=self.max_pages {
            let page = connector
                .read(ctx, &params)
                .await
                .with_context(|| format!("read {} page {page_number}", self.object))?;
            assert_read_result(&page).with_context(|| format!("read page {page_number}"))?;

            if contains_record(&page, &self.id_field, record_id) {
                return Ok((page_number, true));
            }
            if page.done {
                return Ok((page_number, false));
            }
            params = params.next_page(page.next_page);
        }
        Ok((self.max_pages, false))
    }
}
