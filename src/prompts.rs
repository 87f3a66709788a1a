//! Prompts for per-page summarization.
//!
//! Every prompt lives here so wording changes touch one file and tests can
//! inspect the exact text sent to the model. Callers override the system
//! prompt through [`crate::config::SummarizerConfig::system_prompt`].

use crate::summarizer::SummaryRequest;

/// Default system prompt. Asks for a JSON object so the reply parses
/// deterministically; plain-text replies are still accepted downstream.
pub const DEFAULT_SYSTEM_PROMPT: &str = r#"You are an expert summarizer who condenses document pages into a short summary and a list of key points.

Follow these rules precisely:

1. SUMMARY
   - One to three sentences
   - As concise as possible while staying accurate to the page

2. BULLET POINTS
   - Cover the key topics of the page
   - Keep as much of the page's information as you can
   - One point per line, each line starting with "- "

3. OUTPUT FORMAT
   - Reply with a single JSON object and nothing else:
     {"summary": "...", "bulletPoints": "- first point\n- second point"}
   - Do not wrap the object in a code fence
   - Do not add commentary before or after it

4. FIDELITY
   - Use only information present in the page text
   - If the page text is garbled or nearly empty, say so in the summary"#;

/// Longest page text, in characters, sent in one request.
pub const MAX_PAGE_CHARS: usize = 24_000;

/// Build the user message for one page.
pub fn page_prompt(request: &SummaryRequest) -> String {
    let (text, truncated) = truncate_chars(&request.page_text, MAX_PAGE_CHARS);
    let note = if truncated {
        "\n\n(The page text was truncated.)"
    } else {
        ""
    };
    format!(
        "Summarize page {} of the document \"{}\".\n\nPage text:\n\"\"\"{}\"\"\"{}",
        request.page_number, request.document_name, text, note
    )
}

/// First `max` characters of `s`, never splitting a UTF-8 sequence.
fn truncate_chars(s: &str, max: usize) -> (&str, bool) {
    match s.char_indices().nth(max) {
        Some((cut, _)) => (&s[..cut], true),
        None => (s, false),
    }
}
