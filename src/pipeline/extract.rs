//! Page extraction: one page in, one [`PageArtifact`] out.
//!
//! Every page is rendered onto the extractor's single [`SharedSurface`].
//! A page holds the surface lease from the moment it starts rendering until
//! its PNG has been encoded, so two pages of the same extractor never overlap
//! even if callers invoke [`PageExtractor::extract`] concurrently.

use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::output::PageArtifact;
use crate::pipeline::backend::RenderParams;
use crate::pipeline::loader::{LoadedDocument, PageHandle};
use crate::pipeline::surface::{SharedSurface, SurfaceLease};
use tracing::{debug, info};

/// Join text runs with single spaces, skipping empty runs.
pub fn join_text_runs<S: AsRef<str>>(runs: &[S]) -> String {
    runs.iter()
        .map(AsRef::as_ref)
        .filter(|run| !run.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Renders pages and reads their text through one shared surface.
#[derive(Debug, Clone)]
pub struct PageExtractor {
    surface: SharedSurface,
    params: RenderParams,
}

impl PageExtractor {
    pub fn new(params: RenderParams) -> Self {
        Self {
            surface: SharedSurface::new(),
            params,
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(RenderParams {
            scale: config.scale,
            max_edge_pixels: config.max_edge_pixels,
        })
    }

    pub fn params(&self) -> RenderParams {
        self.params
    }

    /// The surface every page is painted onto.
    pub fn surface(&self) -> &SharedSurface {
        &self.surface
    }

    /// Render one page and read its text.
    ///
    /// Waits for the surface if another page holds it.
    pub async fn extract(&self, page: &PageHandle) -> Result<PageArtifact, PipelineError> {
        let lease = self.surface.lease().await;
        let page = page.clone();
        let params = self.params;

        tokio::task::spawn_blocking(move || extract_blocking(&page, params, lease))
            .await
            .map_err(|e| PipelineError::Internal(format!("Extraction task panicked: {}", e)))?
    }

    /// Extract every page of `document` in order.
    ///
    /// `checkpoint(done)` runs before each page and once after the last one,
    /// with the number of pages finished so far; an error from it stops the
    /// loop. The first failing page aborts the whole pass and nothing
    /// extracted so far is returned.
    pub async fn extract_all<F>(
        &self,
        document: &LoadedDocument,
        mut checkpoint: F,
    ) -> Result<Vec<PageArtifact>, PipelineError>
    where
        F: FnMut(usize) -> Result<(), PipelineError>,
    {
        let total = document.page_count();
        let mut artifacts = Vec::with_capacity(total);

        for page in document.pages() {
            checkpoint(artifacts.len())?;
            artifacts.push(self.extract(&page).await?);
        }
        checkpoint(artifacts.len())?;

        info!(
            "Extracted {} pages from '{}'",
            artifacts.len(),
            document.source_name()
        );
        Ok(artifacts)
    }
}

/// Blocking half of [`PageExtractor::extract`]. The lease drops on return.
fn extract_blocking(
    page: &PageHandle,
    params: RenderParams,
    mut lease: SurfaceLease,
) -> Result<PageArtifact, PipelineError> {
    let number = page.number();
    let extraction = |detail: String| PipelineError::Extraction {
        page: number,
        detail,
    };

    let runs = page
        .render_blocking(params, &mut lease)
        .map_err(|e| extraction(e.to_string()))?;
    if lease.is_blank() {
        return Err(extraction("renderer produced an empty raster".into()));
    }
    let image = lease
        .snapshot()
        .map_err(|e| extraction(format!("PNG encoding failed: {}", e)))?;
    let text = join_text_runs(&runs);

    debug!(
        "Page {}: {}x{} px, {} chars of text",
        number,
        image.width,
        image.height,
        text.len()
    );

    Ok(PageArtifact {
        index: number,
        image,
        text,
    })
}
