//! Stage seams of the report pipeline and their production adapters.

use async_trait::async_trait;
use chrono::NaiveDate;

use recruitreport_confluence::{DocumentStore, PublishedDocument, Publisher};
use recruitreport_sheets::SheetsClient;
use recruitreport_shared::{Result, SheetsConfig, SourceData};
use recruitreport_slack::SlackClient;

use crate::analyzer::AnalysisContext;
use crate::narrative::{Report, ReportGenerator};

/// Stage 1: fetch the three source tables.
#[async_trait]
pub trait SourceReader: Send + Sync {
    async fn read_all(&self) -> Result<SourceData>;
}

/// Stage 3: turn the analysis context into prose.
#[async_trait]
pub trait NarrativeGenerator: Send + Sync {
    async fn generate_report(&self, context: &AnalysisContext) -> Result<Report>;

    /// Condensed chat summary of an already generated report.
    async fn generate_summary(&self, report: &Report) -> Result<String>;
}

/// Stage 4: create or update the month's page.
#[async_trait]
pub trait ReportPublisher: Send + Sync {
    async fn publish(&self, report: &Report, date: NaiveDate) -> Result<PublishedDocument>;
}

/// Stage 5 and the failure path.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, summary: &str, url: &str) -> Result<()>;

    async fn notify_error(&self, message: &str) -> Result<()>;
}

/// Sheets reader that authenticates when the stage runs, so credential
/// problems surface as a stage failure.
pub struct SheetsSource {
    config: SheetsConfig,
}

impl SheetsSource {
    pub fn new(config: SheetsConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl SourceReader for SheetsSource {
    async fn read_all(&self) -> Result<SourceData> {
        SheetsClient::connect(&self.config).await?.read_all().await
    }
}

#[async_trait]
impl NarrativeGenerator for ReportGenerator {
    async fn generate_report(&self, context: &AnalysisContext) -> Result<Report> {
        ReportGenerator::generate_report(self, context).await
    }

    async fn generate_summary(&self, report: &Report) -> Result<String> {
        ReportGenerator::generate_summary(self, report).await
    }
}

#[async_trait]
impl<S: DocumentStore> ReportPublisher for Publisher<S> {
    async fn publish(&self, report: &Report, date: NaiveDate) -> Result<PublishedDocument> {
        Publisher::publish(self, report.as_str(), date).await
    }
}

#[async_trait]
impl Notifier for SlackClient {
    async fn notify(&self, summary: &str, url: &str) -> Result<()> {
        self.send_report(summary, url).await
    }

    async fn notify_error(&self, message: &str) -> Result<()> {
        self.send_error(message).await
    }
}
