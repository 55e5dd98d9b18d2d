//! Adaptation of raw text items into page-viewport fragments
//!
//! The renderer reports each text item with its text rendering matrix in PDF
//! user space (origin bottom-left, y up). Fragments live in viewport space:
//! origin top-left, y down, scaled by the viewport scale.

use crate::matrix::{self, Matrix};
use crate::{DocumentHandle, MediaBox, PdfEngine, PdfEngineError, RawTextItem};
use doc_model::{PageNumber, Point, TextFragment};

/// Measures text advances in ems.
pub trait TextMeasure {
    fn advance_em(&self, text: &str) -> f32;
}

/// Fixed per-character advance, for documents whose font metrics are not
/// consulted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AverageAdvance {
    pub em_per_char: f32,
}

impl Default for AverageAdvance {
    fn default() -> Self {
        Self { em_per_char: 0.5 }
    }
}

impl TextMeasure for AverageAdvance {
    fn advance_em(&self, text: &str) -> f32 {
        text.chars().count() as f32 * self.em_per_char
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub scale: f32,
    pub width: f32,
    pub height: f32,
    pub transform: Matrix,
}

impl Viewport {
    pub fn for_page(media_box: MediaBox, scale: f32) -> Self {
        let scale = if scale <= 0.0 { 1.0 } else { scale };

        Self {
            scale,
            width: media_box.width() * scale,
            height: media_box.height() * scale,
            transform: [scale, 0.0, 0.0, -scale, -media_box.left * scale, media_box.top * scale],
        }
    }

    pub fn to_viewport_point(&self, x: f32, y: f32) -> Point {
        let (vx, vy) = matrix::apply(&self.transform, x, y);
        Point::new(vx, vy)
    }
}

/// Converts one raw item into a fragment.
///
/// The item transform puts the baseline at `tx[5]`; the fragment's top edge
/// is one font height above it.
pub fn fragment_from_item<M: TextMeasure + ?Sized>(
    page_number: PageNumber,
    item: &RawTextItem,
    viewport: &Viewport,
    measure: &M,
) -> TextFragment {
    let tx = matrix::multiply(&item.transform, &viewport.transform);
    let font_height = tx[2].hypot(tx[3]);
    let font_width = tx[0].hypot(tx[1]);

    TextFragment::new(
        page_number,
        item.text.clone(),
        Point::new(tx[4], tx[5] - font_height),
        measure.advance_em(&item.text) * font_width,
        font_height,
    )
}

/// One page adapted to viewport space.
#[derive(Debug, Clone, PartialEq)]
pub struct PageLayout {
    pub viewport: Viewport,
    pub fragments: Vec<TextFragment>,
}

/// Reads the page geometry and adapts every text item, in emission order.
pub fn page_layout<E, M>(
    engine: &E,
    handle: DocumentHandle,
    page_number: PageNumber,
    scale: f32,
    measure: &M,
) -> Result<PageLayout, PdfEngineError>
where
    E: PdfEngine + ?Sized,
    M: TextMeasure + ?Sized,
{
    let Some(page_index) = page_number.checked_sub(1) else {
        return Err(PdfEngineError::PageOutOfRange {
            page: page_number,
            page_count: engine.page_count(handle)?,
        });
    };

    let viewport = Viewport::for_page(engine.media_box(handle, page_index)?, scale);
    let items = engine.text_items(handle, page_index)?;
    let fragments =
        items.iter().map(|item| fragment_from_item(page_number, item, &viewport, measure)).collect();

    Ok(PageLayout { viewport, fragments })
}

pub fn page_fragments<E, M>(
    engine: &E,
    handle: DocumentHandle,
    page_number: PageNumber,
    scale: f32,
    measure: &M,
) -> Result<Vec<TextFragment>, PdfEngineError>
where
    E: PdfEngine + ?Sized,
    M: TextMeasure + ?Sized,
{
    page_layout(engine, handle, page_number, scale, measure).map(|layout| layout.fragments)
}
