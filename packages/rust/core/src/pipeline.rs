//! Monthly report pipeline: read → analyze → generate → publish → notify.

use std::time::{Duration, Instant};

use chrono::NaiveDate;
use tracing::{error, info, instrument, warn};

use recruitreport_shared::{ReportError, Result, RunId};

use crate::analyzer::Analyzer;
use crate::stages::{NarrativeGenerator, Notifier, ReportPublisher, SourceReader};

/// Number of pipeline stages, for progress display.
pub const STAGE_COUNT: usize = 5;

/// The adapters one run goes through.
pub struct Stages<'a> {
    pub source: &'a dyn SourceReader,
    pub generator: &'a dyn NarrativeGenerator,
    pub publisher: &'a dyn ReportPublisher,
    pub notifier: &'a dyn Notifier,
}

/// Result of a successful run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub run_id: RunId,
    /// Latest month found in the monthly table.
    pub report_month: String,
    pub page_title: String,
    pub url: String,
    /// `false` when the page was updated instead of created.
    pub created: bool,
    /// `false` when the chat post failed.
    pub notified: bool,
    pub elapsed: Duration,
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering stage `step` (1-based).
    fn stage(&self, step: usize, name: &str);
    /// Called after a stage finished, with an optional one-line detail.
    fn stage_done(&self, detail: Option<&str>);
    /// Called when the pipeline completes.
    fn done(&self, summary: &RunSummary);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn stage(&self, _step: usize, _name: &str) {}
    fn stage_done(&self, _detail: Option<&str>) {}
    fn done(&self, _summary: &RunSummary) {}
}

/// Run every stage once for the month of `report_date`.
///
/// Any failure in stages 1 to 4 aborts the run. A failed chat post in stage 5
/// is logged and recorded in [`RunSummary::notified`], since the report is
/// already published by then.
#[instrument(skip_all, fields(%run_id, %report_date))]
pub async fn run_pipeline(
    stages: &Stages<'_>,
    run_id: RunId,
    report_date: NaiveDate,
    progress: &dyn ProgressReporter,
) -> Result<RunSummary> {
    let start = Instant::now();
    info!("starting report pipeline");

    // --- Stage 1: Read ---
    progress.stage(1, "Reading source tables");
    let data = stages.source.read_all().await?;
    progress.stage_done(None);

    // --- Stage 2: Analyze ---
    progress.stage(2, "Analyzing data");
    let analyzer = Analyzer::new(data);
    let report_month = analyzer.latest_month()?;
    let context = analyzer.build_context()?;
    info!(%report_month, context_len = context.as_str().len(), "analysis complete");
    progress.stage_done(Some(&format!("report month: {report_month}")));

    // --- Stage 3: Generate ---
    progress.stage(3, "Generating narrative");
    let report = stages.generator.generate_report(&context).await?;
    let summary = stages.generator.generate_summary(&report).await?;
    progress.stage_done(None);

    // --- Stage 4: Publish ---
    progress.stage(4, "Publishing report");
    let document = stages.publisher.publish(&report, report_date).await?;
    info!(url = %document.url, created = document.created, "report published");
    progress.stage_done(Some(&document.url));

    // --- Stage 5: Notify ---
    progress.stage(5, "Sending chat notification");
    let notified = match stages.notifier.notify(&summary, &document.url).await {
        Ok(()) => true,
        Err(e) => {
            warn!(error = %e, "chat notification failed; report is already published");
            false
        }
    };
    progress.stage_done(None);

    let result = RunSummary {
        run_id,
        report_month,
        page_title: document.title,
        url: document.url,
        created: document.created,
        notified,
        elapsed: start.elapsed(),
    };

    info!(
        url = %result.url,
        notified,
        elapsed_ms = result.elapsed.as_millis() as u64,
        "report pipeline complete"
    );
    progress.done(&result);

    Ok(result)
}

/// One-line message posted to chat for a failed run.
pub fn failure_message(err: &ReportError) -> String {
    format!("{}: {err}", err.kind())
}

/// Post a best-effort failure notice. The notifier's own error is logged only.
pub async fn report_failure(notifier: &dyn Notifier, err: &ReportError) {
    error!(kind = err.kind(), error = %err, "report pipeline failed");
    if let Err(notify_err) = notifier.notify_error(&failure_message(err)).await {
        warn!(error = %notify_err, "failure notification could not be delivered");
    }
}

/// [`run_pipeline`] plus exactly one failure notification on error. The
/// original error is returned unchanged.
pub async fn run_and_report_failure(
    stages: &Stages<'_>,
    run_id: RunId,
    report_date: NaiveDate,
    progress: &dyn ProgressReporter,
) -> Result<RunSummary> {
    match run_pipeline(stages, run_id, report_date, progress).await {
        Ok(summary) => Ok(summary),
        Err(err) => {
            report_failure(stages.notifier, &err).await;
            Err(err)
        }
    }
}
