//! The shared drawing surface pages are rasterised into.
//!
//! A [`RenderSurface`] holds the canvas for the page currently being
//! rendered plus a reusable PNG scratch buffer. The extractor owns exactly one
//! of them behind a [`SharedSurface`]; each page takes a [`SurfaceLease`],
//! and dropping the lease clears the canvas and hands the surface to the next
//! page. Because only one lease can exist at a time, extraction of pages that
//! share a surface is sequential by construction rather than by convention.

use crate::output::PageImage;
use image::{ImageFormat, RgbaImage};
use std::fmt;
use std::io::Cursor;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

/// Canvas plus encode buffer.
#[derive(Default)]
pub struct RenderSurface {
    canvas: RgbaImage,
    scratch: Vec<u8>,
    frames: u64,
}

impl fmt::Debug for RenderSurface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderSurface")
            .field("dimensions", &self.dimensions())
            .field("scratch_bytes", &self.scratch.capacity())
            .field("frames", &self.frames)
            .finish()
    }
}

impl RenderSurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the canvas with a freshly rendered frame.
    pub fn present(&mut self, frame: RgbaImage) {
        self.canvas = frame;
        self.frames += 1;
    }

    /// Width and height of the current canvas; `(0, 0)` when blank.
    pub fn dimensions(&self) -> (u32, u32) {
        self.canvas.dimensions()
    }

    pub fn is_blank(&self) -> bool {
        let (w, h) = self.dimensions();
        w == 0 || h == 0
    }

    /// Number of frames presented over the surface's lifetime.
    pub fn frames_presented(&self) -> u64 {
        self.frames
    }

    /// Drop the current frame. The scratch allocation is kept for reuse.
    pub fn clear(&mut self) {
        self.canvas = RgbaImage::default();
        self.scratch.clear();
    }

    /// Encode the current canvas as PNG.
    ///
    /// PNG is lossless: text stays crisp for display and later OCR.
    pub fn snapshot(&mut self) -> Result<PageImage, image::ImageError> {
        let (width, height) = self.dimensions();
        self.scratch.clear();
        self.canvas
            .write_to(&mut Cursor::new(&mut self.scratch), ImageFormat::Png)?;
        debug!("Encoded {}x{} canvas → {} bytes PNG", width, height, self.scratch.len());
        Ok(PageImage {
            png: self.scratch.clone(),
            width,
            height,
        })
    }
}

/// One [`RenderSurface`] shared by every page of an extractor.
#[derive(Debug, Clone, Default)]
pub struct SharedSurface {
    inner: Arc<Mutex<RenderSurface>>,
}

impl SharedSurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive use of the surface.
    pub async fn lease(&self) -> SurfaceLease {
        SurfaceLease {
            guard: Arc::clone(&self.inner).lock_owned().await,
        }
    }

    /// True while some page holds the lease.
    pub fn is_leased(&self) -> bool {
        self.inner.try_lock().is_err()
    }
}

/// Exclusive access to a [`RenderSurface`] for the duration of one page.
///
/// The lease is `'static` and `Send`, so it can move into `spawn_blocking`.
/// Dropping it, on success, error or unwind, clears the canvas.
pub struct SurfaceLease {
    guard: OwnedMutexGuard<RenderSurface>,
}

impl fmt::Debug for SurfaceLease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SurfaceLease")
            .field("dimensions", &self.guard.dimensions())
            .field("frames", &self.guard.frames_presented())
            .finish()
    }
}

impl Deref for SurfaceLease {
    type Target = RenderSurface;

    fn deref(&self) -> &RenderSurface {
        &self.guard
    }
}

impl DerefMut for SurfaceLease {
    fn deref_mut(&mut self) -> &mut RenderSurface {
        &mut self.guard
    }
}

impl Drop for SurfaceLease {
    fn drop(&mut self) {
        self.guard.clear();
    }
}
