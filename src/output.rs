//! Output types: per-page artifacts, analysis results, and the view records
//! handed to the presentation layer.

use crate::pipeline::postprocess::parse_bullet_points;
use crate::state::PipelineStatus;
use crate::summarizer::SummaryResponse;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};

/// A rendered page raster, PNG-encoded.
#[derive(Clone, PartialEq, Eq)]
pub struct PageImage {
    pub png: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl PageImage {
    /// The image as a `data:` URI, ready for an `<img src>` attribute.
    pub fn data_uri(&self) -> String {
        format!("data:image/png;base64,{}", STANDARD.encode(&self.png))
    }
}

impl std::fmt::Debug for PageImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageImage")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("png_bytes", &self.png.len())
            .finish()
    }
}

impl Serialize for PageImage {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("PageImage", 3)?;
        s.serialize_field("width", &self.width)?;
        s.serialize_field("height", &self.height)?;
        s.serialize_field("data_uri", &self.data_uri())?;
        s.end()
    }
}

/// Rendered image and extracted text of one page.
///
/// Produced by the page extractor and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageArtifact {
    /// 1-indexed page number.
    pub index: usize,
    pub image: PageImage,
    /// Text runs in source order joined by single spaces.
    pub text: String,
}

/// Parsed summary and bullet points for one page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub page_index: usize,
    pub summary: String,
    pub bullet_points: Vec<String>,
}

impl AnalysisResult {
    /// Build a result from a raw capability response.
    ///
    /// The summary is trimmed; the bullet block goes through
    /// [`parse_bullet_points`].
    pub fn from_response(page_index: usize, response: &SummaryResponse) -> Self {
        Self {
            page_index,
            summary: response.summary.trim().to_string(),
            bullet_points: parse_bullet_points(&response.bullet_points),
        }
    }
}

/// One record of the presentation model: a page with its analysis, if any.
#[derive(Debug, Clone, Serialize)]
pub struct PageView {
    pub page_number: usize,
    pub image: PageImage,
    pub text: String,
    /// `None` when the page has no analysis (service failure, or a page
    /// dropped under the best-effort policy).
    pub summary: Option<String>,
    pub bullet_points: Vec<String>,
}

/// Everything the presentation layer needs to draw one generation.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentView {
    pub generation: u64,
    pub source_name: String,
    pub status: PipelineStatus,
    pub pages: Vec<PageView>,
}

impl DocumentView {
    /// Number of pages that carry an analysis.
    pub fn analysed_pages(&self) -> usize {
        self.pages.iter().filter(|p| p.summary.is_some()).count()
    }
}
