//! Line and inline passes applied to non-code Markdown text.
//!
//! Each pass is a function `&str -> String` applied in sequence by
//! [`run_pipeline`]. Code blocks have already been swapped for placeholders.

use std::sync::LazyLock;

use regex::Regex;

/// Run every text pass, in order.
pub(crate) fn run_pipeline(md: &str) -> String {
    let mut result = escape_xml(md);

    result = convert_headers(&result);
    result = convert_bold(&result);
    result = convert_italic(&result);
    result = convert_tables(&result);
    result = convert_paragraphs(&result);

    result
}

// ---------------------------------------------------------------------------
// Pass 1: Escape markup-significant characters
// ---------------------------------------------------------------------------

/// Storage format is XHTML, so bare `&`, `<` and `>` must be entities.
pub(crate) fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            other => out.push(other),
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Pass 2: Headers
// ---------------------------------------------------------------------------

/// `#`, `##`, `###` at line start become `<h1>`..`<h3>`.
fn convert_headers(md: &str) -> String {
    static H3_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?m)^### (.+)$").expect("valid regex"));
    static H2_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?m)^## (.+)$").expect("valid regex"));
    static H1_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?m)^# (.+)$").expect("valid regex"));

    let result = H3_RE.replace_all(md, "<h3>$1</h3>");
    let result = H2_RE.replace_all(&result, "<h2>$1</h2>");
    H1_RE.replace_all(&result, "<h1>$1</h1>").into_owned()
}

// ---------------------------------------------------------------------------
// Pass 3-4: Emphasis
// ---------------------------------------------------------------------------

fn convert_bold(md: &str) -> String {
    static BOLD_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\*\*(.+?)\*\*").expect("valid regex"));

    BOLD_RE.replace_all(md, "<strong>$1</strong>").into_owned()
}

/// Runs after bold, so any remaining single-star pair is italic.
fn convert_italic(md: &str) -> String {
    static ITALIC_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\*(.+?)\*").expect("valid regex"));

    ITALIC_RE.replace_all(md, "<em>$1</em>").into_owned()
}

// ---------------------------------------------------------------------------
// Pass 5: Pipe tables
// ---------------------------------------------------------------------------

/// Consecutive `| ... |` lines become one `<table>`; separator rows are dropped.
fn convert_tables(md: &str) -> String {
    let mut lines: Vec<String> = Vec::new();
    let mut in_table = false;

    for line in md.split('\n') {
        let trimmed = line.trim();

        if is_table_line(trimmed) {
            if !in_table {
                lines.push("<table>".to_string());
                in_table = true;
            }

            if is_separator_row(trimmed) {
                continue;
            }

            let cells: String = table_cells(trimmed)
                .map(|cell| format!("<td>{cell}</td>"))
                .collect();
            lines.push(format!("<tr>{cells}</tr>"));
        } else {
            if in_table {
                lines.push("</table>".to_string());
                in_table = false;
            }
            lines.push(line.to_string());
        }
    }

    if in_table {
        lines.push("</table>".to_string());
    }

    lines.join("\n")
}

fn is_table_line(trimmed: &str) -> bool {
    trimmed.len() >= 2 && trimmed.starts_with('|') && trimmed.ends_with('|')
}

/// `|---|:--:|` style header separators. Expects an already trimmed line.
fn is_separator_row(trimmed: &str) -> bool {
    static SEPARATOR_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"^\|[\s\-:|]+\|$").expect("valid regex"));

    trimmed.contains('-') && SEPARATOR_RE.is_match(trimmed)
}

/// Inner cells of a trimmed `| a | b |` line, each trimmed.
fn table_cells(trimmed: &str) -> impl Iterator<Item = &str> {
    let inner = &trimmed[1..trimmed.len() - 1];
    inner.split('|').map(str::trim)
}

// ---------------------------------------------------------------------------
// Pass 6: Paragraphs
// ---------------------------------------------------------------------------

/// A blank line separates paragraphs; the whole body is wrapped in `<p>`.
fn convert_paragraphs(md: &str) -> String {
    format!("<p>{}</p>", md.replace("\n\n", "</p><p>"))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
