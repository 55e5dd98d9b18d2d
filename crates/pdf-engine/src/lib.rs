mod content;
pub mod layout;
pub mod matrix;

use lopdf::content::Content;
use lopdf::{Document, Object, ObjectId};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

pub use layout::{
    fragment_from_item, page_fragments, page_layout, AverageAdvance, PageLayout, TextMeasure, Viewport,
};
pub use matrix::Matrix;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DocumentHandle(u64);

impl DocumentHandle {
    /// For engines other than [`LopdfEngine`] that hand out their own ids.
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

/// Page bounds in PDF user space (points, y up).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MediaBox {
    pub left: f32,
    pub bottom: f32,
    pub right: f32,
    pub top: f32,
}

impl MediaBox {
    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    pub fn height(&self) -> f32 {
        self.top - self.bottom
    }
}

impl Default for MediaBox {
    fn default() -> Self {
        Self { left: 0.0, bottom: 0.0, right: 612.0, top: 792.0 }
    }
}

/// A text-showing operation as the renderer saw it.
///
/// `transform` is the text rendering matrix: it maps glyph space (font size
/// included) to PDF user space, with the baseline start at `(e, f)`.
#[derive(Debug, Clone, PartialEq)]
pub struct RawTextItem {
    pub text: String,
    pub transform: Matrix,
    pub font_size: f32,
    pub font: Option<String>,
}

#[derive(Debug, Clone)]
pub enum OpenSource {
    Path(PathBuf),
    Bytes(Vec<u8>),
}

impl From<PathBuf> for OpenSource {
    fn from(value: PathBuf) -> Self {
        Self::Path(value)
    }
}

impl From<&Path> for OpenSource {
    fn from(value: &Path) -> Self {
        Self::Path(value.to_path_buf())
    }
}

impl From<Vec<u8>> for OpenSource {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PdfEngineError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("PDF parse error: {0}")]
    Parse(#[from] lopdf::Error),
    #[error("invalid handle {0}")]
    InvalidHandle(u64),
    #[error("page {page} out of range (page_count={page_count})")]
    PageOutOfRange { page: u32, page_count: u32 },
    #[error("encrypted PDFs are not supported")]
    EncryptedUnsupported,
    #[error("backend error: {0}")]
    Backend(String),
}

/// Renderer collaborator: page geometry and positioned text items.
///
/// Page indices are 0-based.
pub trait PdfEngine {
    fn open(&mut self, source: OpenSource) -> Result<DocumentHandle, PdfEngineError>;
    fn page_count(&self, handle: DocumentHandle) -> Result<u32, PdfEngineError>;
    fn media_box(
        &self,
        handle: DocumentHandle,
        page_index: u32,
    ) -> Result<MediaBox, PdfEngineError>;
    fn text_items(
        &self,
        handle: DocumentHandle,
        page_index: u32,
    ) -> Result<Vec<RawTextItem>, PdfEngineError>;
    fn close(&mut self, handle: DocumentHandle) -> Result<(), PdfEngineError>;
}

#[derive(Debug)]
struct DocumentRecord {
    document: Document,
    pages: Vec<ObjectId>,
    media_boxes: Vec<MediaBox>,
}

#[derive(Debug, Default)]
pub struct LopdfEngine {
    next_handle: u64,
    docs: HashMap<DocumentHandle, DocumentRecord>,
    measure: AverageAdvance,
}

impl LopdfEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_measure(measure: AverageAdvance) -> Self {
        Self { measure, ..Self::default() }
    }

    pub fn measure(&self) -> AverageAdvance {
        self.measure
    }

    fn parse(bytes: &[u8]) -> Result<DocumentRecord, PdfEngineError> {
        if bytes.windows("/Encrypt".len()).any(|window| window == b"/Encrypt") {
            return Err(PdfEngineError::EncryptedUnsupported);
        }

        let document = Document::load_mem(bytes)?;
        let pages: Vec<ObjectId> = document.get_pages().into_values().collect();

        if pages.is_empty() {
            return Err(PdfEngineError::Backend("document has no pages".to_owned()));
        }

        let media_boxes = pages.iter().map(|page_id| media_box(&document, *page_id)).collect();

        Ok(DocumentRecord { document, pages, media_boxes })
    }

    fn record(&self, handle: DocumentHandle) -> Result<&DocumentRecord, PdfEngineError> {
        self.docs.get(&handle).ok_or(PdfEngineError::InvalidHandle(handle.raw()))
    }

    fn page_id(&self, handle: DocumentHandle, page_index: u32) -> Result<ObjectId, PdfEngineError> {
        let record = self.record(handle)?;
        record.pages.get(page_index as usize).copied().ok_or(PdfEngineError::PageOutOfRange {
            page: page_index + 1,
            page_count: record.pages.len() as u32,
        })
    }
}

/// Reads `/MediaBox`, walking up `/Parent` for inherited boxes.
fn media_box(document: &Document, page_id: ObjectId) -> MediaBox {
    let mut current = Some(page_id);

    while let Some(id) = current {
        let Ok(dict) = document.get_dictionary(id) else {
            break;
        };

        let parsed =
            dict.get(b"MediaBox").ok().and_then(|obj| obj.as_array().ok()).and_then(|array| {
                if array.len() != 4 {
                    return None;
                }
                let x0 = array[0].as_float().ok()?;
                let y0 = array[1].as_float().ok()?;
                let x1 = array[2].as_float().ok()?;
                let y1 = array[3].as_float().ok()?;
                Some(MediaBox {
                    left: x0.min(x1),
                    bottom: y0.min(y1),
                    right: x0.max(x1),
                    top: y0.max(y1),
                })
            });

        if let Some(media_box) = parsed {
            return media_box;
        }

        current = dict.get(b"Parent").ok().and_then(|obj| match obj {
            Object::Reference(parent) => Some(*parent),
            _ => None,
        });
    }

    MediaBox::default()
}

impl PdfEngine for LopdfEngine {
    fn open(&mut self, source: OpenSource) -> Result<DocumentHandle, PdfEngineError> {
        let bytes = match source {
            OpenSource::Path(path) => fs::read(path)?,
            OpenSource::Bytes(bytes) => bytes,
        };

        let record = Self::parse(&bytes)?;

        self.next_handle += 1;
        let handle = DocumentHandle(self.next_handle);
        tracing::debug!(handle = handle.raw(), pages = record.pages.len(), "opened document");
        self.docs.insert(handle, record);

        Ok(handle)
    }

    fn page_count(&self, handle: DocumentHandle) -> Result<u32, PdfEngineError> {
        Ok(self.record(handle)?.pages.len() as u32)
    }

    fn media_box(
        &self,
        handle: DocumentHandle,
        page_index: u32,
    ) -> Result<MediaBox, PdfEngineError> {
        let record = self.record(handle)?;
        record.media_boxes.get(page_index as usize).copied().ok_or(PdfEngineError::PageOutOfRange {
            page: page_index + 1,
            page_count: record.media_boxes.len() as u32,
        })
    }

    fn text_items(
        &self,
        handle: DocumentHandle,
        page_index: u32,
    ) -> Result<Vec<RawTextItem>, PdfEngineError> {
        let page_id = self.page_id(handle, page_index)?;
        let record = self.record(handle)?;

        let data = record.document.get_page_content(page_id)?;
        let decoded = Content::decode(&data)?;
        let items = content::TextInterpreter::new(&self.measure).run(&decoded.operations);

        tracing::trace!(page_index, items = items.len(), "extracted text items");
        Ok(items)
    }

    fn close(&mut self, handle: DocumentHandle) -> Result<(), PdfEngineError> {
        self.docs.remove(&handle).map(|_| ()).ok_or(PdfEngineError::InvalidHandle(handle.raw()))
    }
}

pub fn default_engine() -> LopdfEngine {
    LopdfEngine::new()
}
