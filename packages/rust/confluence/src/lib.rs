//! Report publisher for a Confluence space.
//!
//! Pages are organised as `parent page > year container > monthly report`.
//! Titles are unique within a space, so re-publishing the same month updates
//! the existing page instead of creating a second one.

mod client;
mod store;

use chrono::{Datelike, NaiveDate};
use tracing::{info, instrument};

use recruitreport_shared::{ConfluenceConfig, Result};

pub use client::{ConfluenceStore, site_root};
pub use store::{DocumentStore, PageRef};

/// Body of a newly created year container.
const YEAR_PAGE_BODY: &str = "<p>Monthly analysis report archive</p>";

/// Where reports are published.
#[derive(Debug, Clone)]
pub struct PublishTarget {
    /// Site root used to build page URLs.
    pub site_url: String,
    /// Space key.
    pub space: String,
    /// Root page year containers are created under; space root when `None`.
    pub parent_page_id: Option<String>,
}

impl PublishTarget {
    pub fn from_config(config: &ConfluenceConfig) -> Self {
        Self {
            site_url: config.url.as_deref().map(site_root).unwrap_or_default(),
            space: config.space.clone(),
            parent_page_id: config.parent_page_id.clone(),
        }
    }
}

/// Outcome of a publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedDocument {
    pub id: String,
    pub title: String,
    pub url: String,
    /// `false` when an existing page was updated in place.
    pub created: bool,
}

/// Title of the year container for `date`.
pub fn year_title(date: NaiveDate) -> String {
    format!("{} Monthly Reports", date.year())
}

/// Title of the monthly report page for `date`.
pub fn month_title(date: NaiveDate) -> String {
    format!(
        "{}-{:02} Recruitment Performance Report",
        date.year(),
        date.month()
    )
}

/// Places converted reports in a [`DocumentStore`].
pub struct Publisher<S> {
    store: S,
    target: PublishTarget,
}

impl<S: DocumentStore> Publisher<S> {
    pub fn new(store: S, target: PublishTarget) -> Self {
        Self { store, target }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Convert `report` and create or update the page for `date`'s month.
    #[instrument(skip(self, report), fields(space = %self.target.space, report_len = report.len()))]
    pub async fn publish(&self, report: &str, date: NaiveDate) -> Result<PublishedDocument> {
        let year_page_id = self.year_container(date).await?;

        let title = month_title(date);
        let body = recruitreport_markdown::to_storage_format(report);

        let (page, created) = match self.store.find_by_title(&self.target.space, &title).await? {
            Some(existing) => {
                let page = self.store.update(&existing, &title, &body).await?;
                info!(%title, id = %page.id, "updated existing report page");
                (page, false)
            }
            None => {
                let page = self
                    .store
                    .create(&self.target.space, &title, &body, Some(&year_page_id))
                    .await?;
                info!(%title, id = %page.id, "created report page");
                (page, true)
            }
        };

        Ok(PublishedDocument {
            url: self.page_url(&page.id),
            id: page.id,
            title,
            created,
        })
    }

    /// Find or create the year container, returning its id.
    async fn year_container(&self, date: NaiveDate) -> Result<String> {
        let title = year_title(date);

        if let Some(page) = self.store.find_by_title(&self.target.space, &title).await? {
            return Ok(page.id);
        }

        let page = self
            .store
            .create(
                &self.target.space,
                &title,
                YEAR_PAGE_BODY,
                self.target.parent_page_id.as_deref(),
            )
            .await?;
        info!(%title, id = %page.id, "created year container");
        Ok(page.id)
    }

    /// `{site}/wiki/spaces/{space}/pages/{id}`
    pub fn page_url(&self, id: &str) -> String {
        format!(
            "{}/wiki/spaces/{}/pages/{id}",
            self.target.site_url, self.target.space
        )
    }
}
