//! Pure text rules applied to summarization replies.
//!
//! Nothing in here touches the network or the PDF engine, so every rule is
//! unit-testable in isolation.
//!
//! ## Bullet grammar
//!
//! ```text
//! block  := line ( "\n" line )*
//! line   := ws* ( "- " ws* )? item ws*
//! ```
//!
//! Lines are trimmed, blank lines dropped, then one leading `"- "` marker
//! stripped. Blank lines go before the marker does, so a bare `-` line has
//! no marker to strip and stays as the item `-`. Order is preserved.
//!
//! ## Reply shapes
//!
//! LLM replies arrive in one of two shapes, tried in order:
//!
//! 1. A JSON object `{"summary": "...", "bulletPoints": ...}`, possibly
//!    wrapped in a Markdown code fence. `bulletPoints` may be a
//!    newline-delimited string or an array of strings.
//! 2. Plain text: the first paragraph is the summary, the rest is the bullet
//!    block.

use crate::summarizer::SummaryResponse;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

/// Parse a newline-delimited bullet block into ordered bullet items.
pub fn parse_bullet_points(block: &str) -> Vec<String> {
    block
        .split('\n')
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| match line.strip_prefix("- ") {
            Some(rest) => rest.trim_start().to_string(),
            None => line.to_string(),
        })
        .collect()
}

/// Interpret a raw LLM reply as a [`SummaryResponse`].
///
/// Returns `None` when no non-empty summary can be recovered.
pub fn parse_summary_reply(raw: &str) -> Option<SummaryResponse> {
    let body = strip_outer_fence(raw.trim());

    if let Some(reply) = parse_json_reply(body) {
        return reply.into_response();
    }

    let (summary, bullets) = split_plain_reply(body);
    if summary.is_empty() {
        return None;
    }
    Some(SummaryResponse {
        summary,
        bullet_points: bullets,
    })
}

// ── Fences ───────────────────────────────────────────────────────────────

static OUTER_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```[A-Za-z0-9_-]*[ \t]*\r?\n(.*?)\r?\n?```\s*$").unwrap());

/// Remove a single code fence that wraps the whole reply.
fn strip_outer_fence(text: &str) -> &str {
    match OUTER_FENCE.captures(text).and_then(|c| c.get(1)) {
        Some(inner) => inner.as_str().trim(),
        None => text,
    }
}

// ── JSON replies ─────────────────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(untagged)]
enum BulletField {
    Block(String),
    List(Vec<String>),
}

#[derive(Deserialize)]
struct JsonReply {
    summary: String,
    #[serde(rename = "bulletPoints", alias = "bullet_points", alias = "bullets")]
    bullet_points: Option<BulletField>,
}

impl JsonReply {
    fn into_response(self) -> Option<SummaryResponse> {
        let summary = self.summary.trim().to_string();
        if summary.is_empty() {
            return None;
        }
        let bullet_points = match self.bullet_points {
            Some(BulletField::Block(block)) => block,
            Some(BulletField::List(items)) => items
                .iter()
                .map(|item| format!("- {}", item.trim()))
                .collect::<Vec<_>>()
                .join("\n"),
            None => String::new(),
        };
        Some(SummaryResponse {
            summary,
            bullet_points,
        })
    }
}

/// `None` when the body is not a JSON reply at all.
fn parse_json_reply(body: &str) -> Option<JsonReply> {
    if !body.starts_with('{') {
        return None;
    }
    serde_json::from_str(body).ok()
}

// ── Plain-text replies ───────────────────────────────────────────────────

static SECTION_LABEL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^(?:#+\s*)?\**\s*(?:summary|bullet points|key points|key findings)\s*\**\s*(?::\s*\**\s*|$)",
    )
    .unwrap()
});

/// Split plain text into `(summary, bullet block)`.
///
/// The summary runs until the first blank line or the first line that
/// looks like a bullet; section labels such as `Summary:` or
/// `Bullet points:` are removed.
fn split_plain_reply(body: &str) -> (String, String) {
    let lines: Vec<&str> = body.lines().collect();
    let mut summary_parts: Vec<String> = Vec::new();
    let mut rest_from = lines.len();

    for (i, line) in lines.iter().enumerate() {
        let trimmed = line.trim();
        let is_bullet = trimmed.starts_with("- ") || trimmed.starts_with("* ");
        if is_bullet || (trimmed.is_empty() && !summary_parts.is_empty()) {
            rest_from = i;
            break;
        }
        let text = SECTION_LABEL.replace(trimmed, "");
        if !text.trim().is_empty() {
            summary_parts.push(text.trim().to_string());
        }
    }

    let bullets = lines[rest_from..]
        .iter()
        .map(|l| l.trim())
        .filter(|l| !SECTION_LABEL.replace(l, "").trim().is_empty())
        .map(|l| match l.strip_prefix("* ") {
            Some(rest) => format!("- {rest}"),
            None => l.to_string(),
        })
        .collect::<Vec<_>>()
        .join("\n");

    (summary_parts.join(" "), bullets)
}
