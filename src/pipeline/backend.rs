//! The PDF engine seam and its pdfium implementation.
//!
//! ## Why a trait?
//!
//! The loader and extractor only need two things from an engine: how many
//! pages a buffer has, and "paint page N onto this surface and give me its
//! text runs". [`PdfBackend`] captures exactly that, so tests drive the whole
//! pipeline with an in-memory backend and no native library.
//!
//! ## Why reopen per call?
//!
//! A pdfium document borrows its `Pdfium` instance and is not `Send`, so it
//! cannot be parked across `.await` points or handed between blocking
//! threads. Reopening from the shared byte buffer inside each blocking call
//! keeps every pdfium object on one thread for its whole life.

use crate::error::BackendError;
use crate::pipeline::surface::RenderSurface;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Rasterisation parameters for one page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderParams {
    /// Viewport scale factor.
    pub scale: f32,
    /// Cap on the longest rendered edge, in pixels.
    pub max_edge_pixels: u32,
}

/// A synchronous PDF engine. Calls are made from blocking threads.
pub trait PdfBackend: Send + Sync {
    /// Short engine name for logs.
    fn name(&self) -> &'static str;

    /// Parse `bytes` and report the page count.
    fn page_count(&self, bytes: &[u8]) -> Result<usize, BackendError>;

    /// Paint 1-indexed `page` onto `surface` and return its text runs in
    /// content-stream order.
    fn render_page(
        &self,
        bytes: &[u8],
        page: usize,
        params: RenderParams,
        surface: &mut RenderSurface,
    ) -> Result<Vec<String>, BackendError>;
}

/// Environment variable naming the pdfium library file or its directory.
pub const PDFIUM_LIB_PATH_ENV: &str = "PDFIUM_LIB_PATH";

/// [`PdfBackend`] on top of the pdfium C++ library.
///
/// Library lookup order: an explicit path (or [`PDFIUM_LIB_PATH_ENV`]), the
/// current directory, then the system library search path.
#[derive(Debug, Clone, Default)]
pub struct PdfiumBackend {
    library_path: Option<PathBuf>,
}

impl PdfiumBackend {
    /// Backend that honours `PDFIUM_LIB_PATH` when set.
    pub fn new() -> Self {
        Self {
            library_path: std::env::var_os(PDFIUM_LIB_PATH_ENV).map(PathBuf::from),
        }
    }

    pub fn with_library_path(path: impl Into<PathBuf>) -> Self {
        Self {
            library_path: Some(path.into()),
        }
    }

    /// Check that the native library can be bound at all.
    pub fn probe(&self) -> Result<(), BackendError> {
        self.bind().map(|_| ())
    }

    fn bind(&self) -> Result<Pdfium, BackendError> {
        let explicit = match &self.library_path {
            Some(path) => Pdfium::bind_to_library(library_file(path)),
            None => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./")),
        };
        let bindings = explicit
            .or_else(|_| Pdfium::bind_to_system_library())
            .map_err(|e| BackendError::Unavailable(format!("{e:?}")))?;
        Ok(Pdfium::new(bindings))
    }
}

/// A directory gets the platform library name appended; a file is used as is.
fn library_file(path: &Path) -> PathBuf {
    if path.is_dir() {
        Pdfium::pdfium_platform_library_name_at_path(path)
    } else {
        path.to_path_buf()
    }
}

/// Refuse any document carrying a security handler.
///
/// Owner-password-only files open without a password, so the load error
/// alone does not catch them.
fn ensure_unprotected(document: &PdfDocument) -> Result<(), BackendError> {
    match document.permissions().security_handler_revision() {
        Ok(PdfSecurityHandlerRevision::Unprotected) => Ok(()),
        Ok(revision) => {
            debug!("Document has security handler {:?}", revision);
            Err(BackendError::PasswordRequired)
        }
        Err(e) => Err(BackendError::Malformed(format!("{:?}", e))),
    }
}

/// Map a pdfium load error. Password failures are recognised by name since
/// pdfium reports them through its generic error code.
fn classify_load_error(e: PdfiumError) -> BackendError {
    let err_str = format!("{:?}", e);
    if err_str.contains("Password") || err_str.contains("password") {
        BackendError::PasswordRequired
    } else {
        BackendError::Malformed(err_str)
    }
}

impl PdfBackend for PdfiumBackend {
    fn name(&self) -> &'static str {
        "pdfium"
    }

    fn page_count(&self, bytes: &[u8]) -> Result<usize, BackendError> {
        let pdfium = self.bind()?;
        let document = pdfium
            .load_pdf_from_byte_slice(bytes, None)
            .map_err(classify_load_error)?;
        ensure_unprotected(&document)?;
        let total = document.pages().len() as usize;
        info!("PDF loaded: {} pages", total);
        Ok(total)
    }

    fn render_page(
        &self,
        bytes: &[u8],
        page: usize,
        params: RenderParams,
        surface: &mut RenderSurface,
    ) -> Result<Vec<String>, BackendError> {
        let index = page
            .checked_sub(1)
            .and_then(|i| u16::try_from(i).ok())
            .ok_or_else(|| BackendError::Render(format!("page {page} has no pdfium index")))?;

        let pdfium = self.bind()?;
        let document = pdfium
            .load_pdf_from_byte_slice(bytes, None)
            .map_err(classify_load_error)?;
        let pdf_page = document
            .pages()
            .get(index)
            .map_err(|e| BackendError::Render(format!("{:?}", e)))?;

        let max_edge = params.max_edge_pixels as i32;
        let render_config = PdfRenderConfig::new()
            .scale_page_by_factor(params.scale)
            .set_maximum_width(max_edge)
            .set_maximum_height(max_edge);

        let bitmap = pdf_page
            .render_with_config(&render_config)
            .map_err(|e| BackendError::Render(format!("{:?}", e)))?;
        surface.present(bitmap.as_image().into_rgba8());

        let (w, h) = surface.dimensions();
        debug!("Rendered page {} → {}x{} px", page, w, h);

        let text = pdf_page
            .text()
            .map_err(|e| BackendError::Text(format!("{:?}", e)))?;
        let runs: Vec<String> = text.segments().iter().map(|segment| segment.text()).collect();
        debug!("Page {}: {} text runs", page, runs.len());

        Ok(runs)
    }
}
