//! Statistical summary of the source tables.
//!
//! Raw text rows are coerced into typed rows with a per-table list of numeric
//! columns. Values that do not parse become missing, and missing values are
//! skipped by every sum. The analyzer then derives month-over-month KPI deltas
//! and assembles the bounded text context handed to the narrative generator.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use tracing::{debug, instrument};

use recruitreport_shared::{ReportError, Result, Row, SourceData, Table, TableKind};

/// Month identifier columns of the monthly table, in lookup order.
pub const MONTHLY_MONTH_COLUMNS: &[&str] = &["report_month", "month"];

/// Numeric columns of the monthly table.
pub const MONTHLY_NUMERIC: &[&str] = &[
    "total_sales",
    "hire_cnt",
    "pass_cnt",
    "matchup_cnt",
    "new_com_accept",
    "recruit_fee",
    "flat_rate_fee",
    "ad_sales",
    "working_days",
];

/// Numeric columns of the hire-based detail table.
pub const HIRE_NUMERIC: &[&str] = &[
    "hire_count",
    "lead_time_to_doc_pass",
    "lead_time_doc_pass_to_hire",
    "total_lead_time",
];

/// Numeric columns of the application-based detail table.
pub const APPLY_NUMERIC: &[&str] = &["applicant_count", "doc_pass_count", "hire_count"];

/// Column detail rows are grouped by.
pub const CATEGORY_COLUMN: &str = "job_category";

/// Group label for rows with no category.
pub const UNCLASSIFIED: &str = "unclassified";

/// Monthly rows shown in the context.
pub const RECENT_MONTHS: usize = 4;

/// Category groups kept per detail table.
pub const TOP_CATEGORIES: usize = 15;

/// Raw detail rows appended per detail table.
pub const RAW_ROW_LIMIT: usize = 50;

// ---------------------------------------------------------------------------
// Coercion
// ---------------------------------------------------------------------------

/// A typed cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Text(String),
    Number(f64),
    Missing,
}

/// A row after coercion. Columns absent from the source row are absent here too.
pub type TypedRow = BTreeMap<String, Cell>;

/// Parse a numeric cell. Anything unparseable (including blanks and
/// non-finite values) is `None`.
pub fn parse_number(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Coerce `numeric` columns to numbers; every other column stays text.
pub fn coerce_row(raw: &Row, numeric: &[&str]) -> TypedRow {
    raw.iter()
        .map(|(column, value)| {
            let cell = if numeric.contains(&column.as_str()) {
                parse_number(value).map_or(Cell::Missing, Cell::Number)
            } else {
                Cell::Text(value.clone())
            };
            (column.clone(), cell)
        })
        .collect()
}

fn number(row: &TypedRow, column: &str) -> Option<f64> {
    match row.get(column) {
        Some(Cell::Number(v)) => Some(*v),
        _ => None,
    }
}

fn text<'a>(row: &'a TypedRow, column: &str) -> Option<&'a str> {
    match row.get(column) {
        Some(Cell::Text(s)) => Some(s.as_str()),
        _ => None,
    }
}

/// A table with both raw and coerced rows.
#[derive(Debug, Clone, Default)]
pub struct TypedTable {
    pub columns: Vec<String>,
    pub raw: Vec<Row>,
    pub rows: Vec<TypedRow>,
}

impl TypedTable {
    pub fn coerce(table: Table, numeric: &[&str]) -> Self {
        let rows = table.rows.iter().map(|r| coerce_row(r, numeric)).collect();
        Self {
            columns: table.columns,
            raw: table.rows,
            rows,
        }
    }

    fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }
}

// ---------------------------------------------------------------------------
// Summary statistics
// ---------------------------------------------------------------------------

/// Latest value and month-over-month change of one KPI.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KpiStat {
    /// Latest value truncated to an integer; missing is 0.
    pub latest: i64,
    /// Percent change vs. the previous month, 1 decimal.
    pub mom: f64,
}

/// Headline KPIs for the latest month.
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryStats {
    pub report_month: String,
    pub total_sales: KpiStat,
    pub hire_cnt: KpiStat,
    pub pass_cnt: KpiStat,
    pub new_com_accept: KpiStat,
}

/// `(current - previous) / previous * 100`, rounded to 1 decimal.
///
/// 0 when either side is missing or `previous` is zero. Negative previous
/// values are not special-cased.
pub fn mom_change(current: Option<f64>, previous: Option<f64>) -> f64 {
    match (current, previous) {
        (Some(c), Some(p)) if p != 0.0 => round1((c - p) / p * 100.0),
        _ => 0.0,
    }
}

fn round1(value: f64) -> f64 {
    // `+ 0.0` turns a rounded -0.0 into 0.0
    (value * 10.0).round() / 10.0 + 0.0
}

fn kpi(latest: &TypedRow, previous: &TypedRow, column: &str) -> KpiStat {
    let current = number(latest, column);
    KpiStat {
        latest: current.map_or(0, |v| v.trunc() as i64),
        mom: mom_change(current, number(previous, column)),
    }
}

// ---------------------------------------------------------------------------
// Category grouping
// ---------------------------------------------------------------------------

/// How a detail table is filtered, grouped and ranked.
#[derive(Debug, Clone, Copy)]
pub struct DetailSpec {
    pub kind: TableKind,
    pub month_column: &'static str,
    pub numeric: &'static [&'static str],
    /// Summed per category; the first entry ranks the groups.
    pub sum_columns: &'static [&'static str],
}

pub const HIRE_SPEC: DetailSpec = DetailSpec {
    kind: TableKind::Hire,
    month_column: "hire_month",
    numeric: HIRE_NUMERIC,
    sum_columns: &["hire_count"],
};

pub const APPLY_SPEC: DetailSpec = DetailSpec {
    kind: TableKind::Apply,
    month_column: "apply_month",
    numeric: APPLY_NUMERIC,
    sum_columns: &["applicant_count", "doc_pass_count", "hire_count"],
};

/// One category group.
#[derive(Debug, Clone, PartialEq)]
pub struct CategorySummary {
    pub category: String,
    /// Number of detail rows in the group.
    pub rows: usize,
    /// Sums aligned with [`DetailSpec::sum_columns`]; missing values skipped.
    pub totals: Vec<f64>,
}

/// Group `rows` by category, rank by the first sum column (descending) and
/// keep the top `limit`. Blank or absent categories, and rows already labelled
/// [`UNCLASSIFIED`], form one [`UNCLASSIFIED`] group, ordered after named
/// groups before ranking.
pub fn group_by_category<'a>(
    rows: impl IntoIterator<Item = &'a TypedRow>,
    sum_columns: &[&str],
    limit: usize,
) -> Vec<CategorySummary> {
    let empty = || CategorySummary {
        category: String::new(),
        rows: 0,
        totals: vec![0.0; sum_columns.len()],
    };

    let mut named: BTreeMap<String, CategorySummary> = BTreeMap::new();
    let mut unclassified: Option<CategorySummary> = None;

    for row in rows {
        let category = text(row, CATEGORY_COLUMN)
            .map(str::trim)
            .filter(|c| !c.is_empty() && !c.eq_ignore_ascii_case(UNCLASSIFIED));
        let group = match category {
            Some(category) => named.entry(category.to_string()).or_insert_with(|| CategorySummary {
                category: category.to_string(),
                ..empty()
            }),
            None => unclassified.get_or_insert_with(|| CategorySummary {
                category: UNCLASSIFIED.to_string(),
                ..empty()
            }),
        };

        group.rows += 1;
        for (total, column) in group.totals.iter_mut().zip(sum_columns) {
            if let Some(v) = number(row, column) {
                *total += v;
            }
        }
    }

    let mut groups: Vec<CategorySummary> = named.into_values().chain(unclassified).collect();
    groups.sort_by(|a, b| {
        let key = |g: &CategorySummary| g.totals.first().copied().unwrap_or(0.0);
        key(b).total_cmp(&key(a))
    });
    groups.truncate(limit);
    groups
}

// ---------------------------------------------------------------------------
// Analysis context
// ---------------------------------------------------------------------------

/// The bounded text blob handed to the narrative generator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisContext(String);

impl AnalysisContext {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for AnalysisContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Analyzer
// ---------------------------------------------------------------------------

/// Typed view over the three source tables.
#[derive(Debug, Clone)]
pub struct Analyzer {
    monthly: TypedTable,
    hire: TypedTable,
    apply: TypedTable,
}

impl Analyzer {
    /// Coerce every table. Tables missing from `data` are treated as empty.
    pub fn new(mut data: SourceData) -> Self {
        Self {
            monthly: TypedTable::coerce(data.take(TableKind::Monthly), MONTHLY_NUMERIC),
            hire: TypedTable::coerce(data.take(TableKind::Hire), HIRE_NUMERIC),
            apply: TypedTable::coerce(data.take(TableKind::Apply), APPLY_NUMERIC),
        }
    }

    /// Month identifier of the last monthly row.
    pub fn latest_month(&self) -> Result<String> {
        let last = self.monthly.rows.last().ok_or_else(|| {
            ReportError::InsufficientData("monthly table has no rows".into())
        })?;
        month_of(last).map(str::to_string).ok_or_else(|| {
            ReportError::InsufficientData(format!(
                "monthly table has no month column (expected one of {})",
                MONTHLY_MONTH_COLUMNS.join(", ")
            ))
        })
    }

    /// Latest KPIs with MoM change. With a single row the previous month is
    /// the latest one, so every change is 0.
    pub fn summary_stats(&self) -> Result<SummaryStats> {
        let report_month = self.latest_month()?;
        let rows = &self.monthly.rows;
        let latest = &rows[rows.len() - 1];
        let previous = rows.len().checked_sub(2).map_or(latest, |i| &rows[i]);

        Ok(SummaryStats {
            report_month,
            total_sales: kpi(latest, previous, "total_sales"),
            hire_cnt: kpi(latest, previous, "hire_cnt"),
            pass_cnt: kpi(latest, previous, "pass_cnt"),
            new_com_accept: kpi(latest, previous, "new_com_accept"),
        })
    }

    /// Category groups of a detail table for the latest month.
    pub fn category_summary(&self, spec: &DetailSpec) -> Result<Vec<CategorySummary>> {
        let month = self.latest_month()?;
        let table = self.detail(spec.kind);
        let indices = latest_rows(table, spec.month_column, &month);
        Ok(group_by_category(
            indices.iter().map(|&i| &table.rows[i]),
            spec.sum_columns,
            TOP_CATEGORIES,
        ))
    }

    /// Assemble the narrative context.
    #[instrument(skip(self))]
    pub fn build_context(&self) -> Result<AnalysisContext> {
        let stats = self.summary_stats()?;
        let month = &stats.report_month;
        let mut out = String::new();

        let recent_start = self.monthly.rows.len().saturating_sub(RECENT_MONTHS);
        let _ = writeln!(out, "## Monthly Overview (last {RECENT_MONTHS} months)");
        let _ = writeln!(
            out,
            "{}\n",
            typed_table(&self.monthly.columns, &self.monthly.rows[recent_start..])
        );

        let _ = writeln!(out, "## Hires by Job Category ({month}, hire basis)");
        let _ = writeln!(
            out,
            "{}\n",
            category_table(&self.category_summary(&HIRE_SPEC)?, HIRE_SPEC.sum_columns)
        );

        let _ = writeln!(out, "## Applications by Job Category ({month}, application basis)");
        let _ = writeln!(
            out,
            "{}\n",
            category_table(&self.category_summary(&APPLY_SPEC)?, APPLY_SPEC.sum_columns)
        );

        let _ = writeln!(out, "## Key Metrics");
        let _ = writeln!(out, "{}", stats_lines(&stats));

        for (spec, label) in [(HIRE_SPEC, "Hire Basis"), (APPLY_SPEC, "Application Basis")] {
            let table = self.detail(spec.kind);
            let indices = latest_rows(table, spec.month_column, month);
            let _ = writeln!(out, "## Raw Data: {label} (first {RAW_ROW_LIMIT} rows)");
            let _ = writeln!(
                out,
                "{}\n",
                raw_table(
                    &table.columns,
                    indices.iter().take(RAW_ROW_LIMIT).map(|&i| &table.raw[i])
                )
            );
        }

        debug!(len = out.len(), "analysis context built");
        Ok(AnalysisContext(out.trim_end().to_string()))
    }

    fn detail(&self, kind: TableKind) -> &TypedTable {
        match kind {
            TableKind::Hire => &self.hire,
            TableKind::Apply => &self.apply,
            TableKind::Monthly => &self.monthly,
        }
    }
}

fn month_of(row: &TypedRow) -> Option<&str> {
    MONTHLY_MONTH_COLUMNS.iter().find_map(|c| text(row, c))
}

/// Indices of rows for `month`, or every row when the table has no month column.
fn latest_rows(table: &TypedTable, month_column: &str, month: &str) -> Vec<usize> {
    if !table.has_column(month_column) {
        return (0..table.rows.len()).collect();
    }
    table
        .rows
        .iter()
        .enumerate()
        .filter(|(_, row)| text(row, month_column).map(str::trim) == Some(month.trim()))
        .map(|(i, _)| i)
        .collect()
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

fn stats_lines(stats: &SummaryStats) -> String {
    [
        format!("- Report month: {}", stats.report_month),
        format!(
            "- Total sales: {} KRW (MoM {:+.1}%)",
            group_thousands(stats.total_sales.latest),
            stats.total_sales.mom
        ),
        format!("- Hires: {} (MoM {:+.1}%)", stats.hire_cnt.latest, stats.hire_cnt.mom),
        format!(
            "- Document passes: {} (MoM {:+.1}%)",
            stats.pass_cnt.latest, stats.pass_cnt.mom
        ),
        format!(
            "- New company sign-ups: {} (MoM {:+.1}%)",
            stats.new_com_accept.latest, stats.new_com_accept.mom
        ),
    ]
    .join("\n")
}

/// `1234567` -> `1,234,567`.
pub fn group_thousands(value: i64) -> String {
    let digits = value.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if value < 0 {
        out.push('-');
    }
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

fn format_number(value: f64) -> String {
    format!("{value}")
}

fn escape_cell(cell: &str) -> String {
    cell.replace('|', "\\|").replace(['\n', '\r'], " ")
}

/// Render a pipe table; an empty header renders as a no-data marker.
fn pipe_table<I>(headers: &[String], rows: I) -> String
where
    I: IntoIterator<Item = Vec<String>>,
{
    if headers.is_empty() {
        return "_(no data)_".to_string();
    }

    let mut out = String::new();
    let header: Vec<String> = headers.iter().map(|h| escape_cell(h)).collect();
    let _ = writeln!(out, "| {} |", header.join(" | "));
    let _ = write!(out, "|{}|", vec!["---"; headers.len()].join("|"));
    for row in rows {
        let cells: Vec<String> = row.iter().map(|c| escape_cell(c)).collect();
        let _ = write!(out, "\n| {} |", cells.join(" | "));
    }
    out
}

fn typed_table(columns: &[String], rows: &[TypedRow]) -> String {
    pipe_table(
        columns,
        rows.iter().map(|row| {
            columns
                .iter()
                .map(|c| match row.get(c) {
                    Some(Cell::Text(s)) => s.clone(),
                    Some(Cell::Number(v)) => format_number(*v),
                    Some(Cell::Missing) | None => String::new(),
                })
                .collect()
        }),
    )
}

fn raw_table<'a>(columns: &[String], rows: impl Iterator<Item = &'a Row>) -> String {
    pipe_table(
        columns,
        rows.map(|row| {
            columns
                .iter()
                .map(|c| row.get(c).cloned().unwrap_or_default())
                .collect()
        }),
    )
}

fn category_table(groups: &[CategorySummary], sum_columns: &[&str]) -> String {
    let headers: Vec<String> = [CATEGORY_COLUMN, "rows"]
        .iter()
        .chain(sum_columns)
        .map(|s| s.to_string())
        .collect();

    pipe_table(
        &headers,
        groups.iter().map(|g| {
            [g.category.clone(), g.rows.to_string()]
                .into_iter()
                .chain(g.totals.iter().map(|v| format_number(*v)))
                .collect()
        }),
    )
}
