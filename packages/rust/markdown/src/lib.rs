//! Markdown to Confluence storage-format conversion.
//!
//! A small deterministic rule set, not a full CommonMark renderer:
//! headers (`#`..`###`), bold, italic, pipe tables, fenced code blocks and
//! paragraph breaks. Fenced code is lifted out before any other pass and put
//! back last, so nothing inside a fence is ever rewritten.

mod passes;

use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, instrument};

/// Delimiters around code block placeholders. Private-use code points so
/// report text cannot collide with them.
const PLACEHOLDER_OPEN: char = '\u{E000}';
const PLACEHOLDER_CLOSE: char = '\u{E001}';

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// A fenced code block lifted out of the source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeBlock {
    /// Info string after the opening fence, if any (e.g. `python`).
    pub language: Option<String>,
    /// Text between the fence lines, verbatim.
    pub content: String,
}

// ---------------------------------------------------------------------------
// Converter
// ---------------------------------------------------------------------------

/// Convert report Markdown into Confluence storage format.
///
/// 1. Replace fenced code blocks with placeholders
/// 2. Escape `& < >` in the remaining text
/// 3. Headers, bold, italic
/// 4. Pipe tables (separator rows dropped)
/// 5. Paragraph breaks
/// 6. Reinsert code blocks as `code` macros
#[instrument(skip_all, fields(len = markdown.len()))]
pub fn to_storage_format(markdown: &str) -> String {
    let (text, blocks) = extract_code_blocks(markdown);
    let converted = passes::run_pipeline(&text);
    let restored = restore_code_blocks(&converted, &blocks);

    debug!(
        code_blocks = blocks.len(),
        out_len = restored.len(),
        "storage conversion complete"
    );
    restored
}

/// Replace each fenced block with a placeholder, returning the blocks in order.
pub fn extract_code_blocks(markdown: &str) -> (String, Vec<CodeBlock>) {
    static FENCE_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"```[\s\S]*?```").expect("valid regex"));

    let mut blocks = Vec::new();
    let text = FENCE_RE
        .replace_all(markdown, |caps: &regex::Captures| {
            let fenced = &caps[0];
            blocks.push(parse_fence(&fenced[3..fenced.len() - 3]));
            placeholder(blocks.len() - 1)
        })
        .into_owned();

    (text, blocks)
}

/// Split the inside of a fence into info string and content.
///
/// The first line is the info string; a fence with no newline at all is
/// inline code with no language.
fn parse_fence(inner: &str) -> CodeBlock {
    match inner.split_once('\n') {
        Some((info, body)) => {
            let info = info.trim();
            let content = body.strip_suffix('\n').unwrap_or(body);
            CodeBlock {
                language: (!info.is_empty()).then(|| info.to_string()),
                content: content.strip_suffix('\r').unwrap_or(content).to_string(),
            }
        }
        None => CodeBlock {
            language: None,
            content: inner.to_string(),
        },
    }
}

fn placeholder(index: usize) -> String {
    format!("{PLACEHOLDER_OPEN}CODE_BLOCK_{index}{PLACEHOLDER_CLOSE}")
}

/// Put code blocks back as Confluence `code` macros with CDATA bodies.
fn restore_code_blocks(converted: &str, blocks: &[CodeBlock]) -> String {
    let mut result = converted.to_string();
    for (index, block) in blocks.iter().enumerate() {
        result = result.replacen(&placeholder(index), &code_macro(block), 1);
    }
    result
}

/// Render one code block. The content is emitted verbatim inside CDATA;
/// only a literal `]]>` needs splitting across two sections.
pub fn code_macro(block: &CodeBlock) -> String {
    let language = block
        .language
        .as_deref()
        .map(sanitize_language)
        .filter(|l| !l.is_empty())
        .map(|l| format!(r#"<ac:parameter ac:name="language">{l}</ac:parameter>"#))
        .unwrap_or_default();

    let body = block.content.replace("]]>", "]]]]><![CDATA[>");

    format!(
        r#"<ac:structured-macro ac:name="code">{language}<ac:plain-text-body><![CDATA[{body}]]></ac:plain-text-body></ac:structured-macro>"#
    )
}

fn sanitize_language(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '+' | '#'))
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
