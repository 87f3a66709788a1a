//! Document loading: validate an uploaded buffer and expose its pages.
//!
//! The `%PDF-` signature is checked before the PDF engine sees a byte.
//! Everything the engine then refuses (corrupt structure, encryption) is
//! reported as the same `InvalidDocument` error, with the engine's reason
//! attached. Encryption is left to the engine: only it can tell an
//! `/Encrypt` trailer entry from the same bytes inside page content.

use crate::error::{BackendError, PipelineError};
use crate::pipeline::backend::{PdfBackend, RenderParams};
use crate::pipeline::surface::RenderSurface;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// Every accepted buffer starts with these bytes.
pub const PDF_SIGNATURE: &[u8] = b"%PDF-";

/// Reason a buffer fails the pre-parse checks, or `None` if it passes.
pub fn precheck(bytes: &[u8]) -> Option<String> {
    if bytes.is_empty() {
        return Some("buffer is empty".into());
    }
    if !bytes.starts_with(PDF_SIGNATURE) {
        let magic = &bytes[..bytes.len().min(PDF_SIGNATURE.len())];
        return Some(format!("missing %PDF- header (starts with {:02X?})", magic));
    }
    None
}

/// Opens uploaded buffers through a [`PdfBackend`].
#[derive(Clone)]
pub struct DocumentLoader {
    backend: Arc<dyn PdfBackend>,
}

impl fmt::Debug for DocumentLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentLoader")
            .field("backend", &self.backend.name())
            .finish()
    }
}

impl DocumentLoader {
    pub fn new(backend: Arc<dyn PdfBackend>) -> Self {
        Self { backend }
    }

    /// Validate and open a buffer.
    ///
    /// Fails with [`PipelineError::InvalidDocument`] if the buffer is not a
    /// PDF, is corrupt, is encrypted, or has no pages.
    pub async fn load(
        &self,
        source_name: &str,
        bytes: impl Into<Arc<[u8]>>,
    ) -> Result<LoadedDocument, PipelineError> {
        let bytes: Arc<[u8]> = bytes.into();
        let invalid = |reason: String| PipelineError::InvalidDocument {
            source_name: source_name.to_string(),
            reason,
        };

        if let Some(reason) = precheck(&bytes) {
            return Err(invalid(reason));
        }

        let backend = Arc::clone(&self.backend);
        let buffer = Arc::clone(&bytes);
        let page_count = tokio::task::spawn_blocking(move || backend.page_count(&buffer))
            .await
            .map_err(|e| PipelineError::Internal(format!("Load task panicked: {}", e)))?
            .map_err(|e| invalid(e.to_string()))?;

        if page_count == 0 {
            return Err(invalid("document has no pages".into()));
        }

        info!(
            "Loaded '{}' ({} bytes, {} pages) via {}",
            source_name,
            bytes.len(),
            page_count,
            self.backend.name()
        );

        Ok(LoadedDocument {
            source_name: source_name.to_string(),
            bytes,
            page_count,
            backend: Arc::clone(&self.backend),
        })
    }
}

/// A parsed document. Cheap to clone; the buffer is shared.
#[derive(Clone)]
pub struct LoadedDocument {
    source_name: String,
    bytes: Arc<[u8]>,
    page_count: usize,
    backend: Arc<dyn PdfBackend>,
}

impl fmt::Debug for LoadedDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedDocument")
            .field("source_name", &self.source_name)
            .field("bytes", &self.bytes.len())
            .field("page_count", &self.page_count)
            .field("backend", &self.backend.name())
            .finish()
    }
}

impl LoadedDocument {
    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    pub fn page_count(&self) -> usize {
        self.page_count
    }

    /// Handle for 1-indexed page `number`.
    pub fn page(&self, number: usize) -> Result<PageHandle, PipelineError> {
        if number == 0 || number > self.page_count {
            return Err(PipelineError::PageOutOfRange {
                page: number,
                total: self.page_count,
            });
        }
        debug!("Page handle {}/{}", number, self.page_count);
        Ok(PageHandle {
            number,
            bytes: Arc::clone(&self.bytes),
            backend: Arc::clone(&self.backend),
        })
    }

    /// Handles for every page, in order.
    pub fn pages(&self) -> impl Iterator<Item = PageHandle> + '_ {
        (1..=self.page_count).map(move |number| PageHandle {
            number,
            bytes: Arc::clone(&self.bytes),
            backend: Arc::clone(&self.backend),
        })
    }
}

/// One page of a [`LoadedDocument`], ready to be rendered.
#[derive(Clone)]
pub struct PageHandle {
    number: usize,
    bytes: Arc<[u8]>,
    backend: Arc<dyn PdfBackend>,
}

impl fmt::Debug for PageHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PageHandle")
            .field("number", &self.number)
            .finish_non_exhaustive()
    }
}

impl PageHandle {
    /// 1-indexed page number.
    pub fn number(&self) -> usize {
        self.number
    }

    /// Blocking: paint this page onto `surface` and return its text runs.
    pub(crate) fn render_blocking(
        &self,
        params: RenderParams,
        surface: &mut RenderSurface,
    ) -> Result<Vec<String>, BackendError> {
        self.backend
            .render_page(&self.bytes, self.number, params, surface)
    }
}
