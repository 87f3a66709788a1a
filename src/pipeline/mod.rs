//! Pipeline stages for turning an uploaded PDF into page summaries.
//!
//! Each submodule implements exactly one step, so each is independently
//! testable and the PDF engine or the summarization backend can be swapped
//! without touching the others.
//!
//! ## Data Flow
//!
//! ```text
//! loader ──▶ extract ──▶ dispatch ──▶ postprocess
//! (bytes)    (surface)   (N × LLM)    (bullets)
//! ```
//!
//! 1. [`loader`]: signature check, then page count and encryption check via the
//!    [`backend`]; runs in `spawn_blocking` because pdfium is not async-safe
//! 2. [`extract`]: paint each page onto the shared [`surface`], encode it as
//!    PNG and join its text runs; strictly one page at a time
//! 3. [`dispatch`]: one summarization request per page, concurrently, folded
//!    by the aggregation policy; [`llm`] is the production summarizer
//! 4. [`postprocess`]: deterministic parsing of replies and bullet blocks

pub mod backend;
pub mod dispatch;
pub mod extract;
pub mod llm;
pub mod loader;
pub mod postprocess;
pub mod surface;
